use std::fmt;
use std::hash::{Hash, Hasher};

use pkgwalk_util::errors::PkgResult;

use crate::version::{PackageVersion, VersionRange};

/// A package id together with the version range it was requested with.
///
/// Two identities are the same package when their ids match
/// case-insensitively and their minimum versions are equal, so `Foo 1.3`
/// and `foo [1.3.0, 2.0)` denote one node of the dependency graph.
#[derive(Debug, Clone)]
pub struct PackageIdentity {
    id: String,
    range: VersionRange,
    min_version: PackageVersion,
}

impl PackageIdentity {
    /// Parse `version` as a range after expanding environment references.
    pub fn new(id: &str, version: &str) -> PkgResult<Self> {
        let range = VersionRange::parse(&crate::env::expand(version))?;
        Ok(Self::from_range(id, range))
    }

    pub fn from_range(id: &str, range: VersionRange) -> Self {
        let min_version = range.min_version();
        Self {
            id: id.trim().to_string(),
            range,
            min_version,
        }
    }

    /// Identity pinned to `>= version`.
    pub fn at_least(id: &str, version: PackageVersion) -> Self {
        Self::from_range(id, VersionRange::at_least(version))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn range(&self) -> &VersionRange {
        &self.range
    }

    pub fn min_version(&self) -> &PackageVersion {
        &self.min_version
    }

    /// Case-insensitive id comparison.
    pub fn has_id(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id.to_uppercase() == other.id.to_uppercase() && self.min_version == other.min_version
    }
}

impl Eq for PackageIdentity {}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.to_uppercase().hash(state);
        self.min_version.hash(state);
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} V{}", self.id, self.min_version)
    }
}
