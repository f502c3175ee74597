use std::fmt;

use crate::identity::PackageIdentity;
use crate::version::VersionRange;

/// A dependency edge as declared by a package manifest.
#[derive(Debug, Clone)]
pub struct PackageDependency {
    pub id: String,
    pub range: VersionRange,
}

impl PackageDependency {
    pub fn new(id: &str, range: VersionRange) -> Self {
        Self {
            id: id.to_string(),
            range,
        }
    }

    /// The identity the walker resolves for this edge: the id at the range minimum.
    pub fn target_identity(&self) -> PackageIdentity {
        PackageIdentity::from_range(&self.id, self.range.clone())
    }
}

impl fmt::Display for PackageDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.range.pretty_print())
    }
}

/// A dependency of an installed package.
///
/// `force_min_version` is inherited from the root request that caused the
/// owning package to be installed.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub target: PackageDependency,
    pub force_min_version: bool,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.target.fmt(f)
    }
}
