use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use pkgwalk_util::errors::{PkgError, PkgResult};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::asset::AssetKind;
use crate::dependency::Dependency;
use crate::identity::PackageIdentity;
use crate::platform::Platform;

/// How a requested package's content is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    /// Typed assets resolved against the target platform.
    #[default]
    DotNet,
    /// Opaque content, used as-is.
    Custom,
}

/// A root package to install.
#[derive(Debug, Clone)]
pub struct PackageRequest {
    pub identity: PackageIdentity,
    pub source: Url,
    pub dependency_sources: Vec<Url>,
    pub package_type: PackageType,
    pub cache_root: PathBuf,
    /// Propagated to the dependencies of every package this request installs.
    pub dependencies_force_min_version: bool,
    /// Sub-path of the package root used as content of custom packages.
    pub custom_content_path: Option<String>,
    /// Extra environment key receiving the content path.
    pub env_key: Option<String>,
}

impl PackageRequest {
    pub fn new(identity: PackageIdentity, source: Url, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            identity,
            source,
            dependency_sources: Vec::new(),
            package_type: PackageType::DotNet,
            cache_root: cache_root.into(),
            dependencies_force_min_version: true,
            custom_content_path: None,
            env_key: None,
        }
    }

    pub fn with_dependency_sources(mut self, sources: Vec<Url>) -> Self {
        self.dependency_sources = sources;
        self
    }

    pub fn with_package_type(mut self, package_type: PackageType) -> Self {
        self.package_type = package_type;
        self
    }

    pub fn with_force_min_version(mut self, force: bool) -> Self {
        self.dependencies_force_min_version = force;
        self
    }

    pub fn with_content_path(mut self, path: Option<String>) -> Self {
        self.custom_content_path = path;
        self
    }

    pub fn with_env_key(mut self, key: Option<String>) -> Self {
        self.env_key = key;
        self
    }

    /// The request's own source followed by its dependency sources.
    pub fn sources(&self) -> Vec<Url> {
        let mut sources = vec![self.source.clone()];
        sources.extend(self.dependency_sources.iter().cloned());
        sources
    }
}

/// Directory of a package inside the cache: `{cache_root}/{id}.{min_version}`.
pub fn package_dir(cache_root: &Path, identity: &PackageIdentity) -> PathBuf {
    cache_root.join(format!("{}.{}", identity.id(), identity.min_version()))
}

/// Where a package's content folder lives inside its package root.
#[derive(Debug, Clone, Copy)]
enum ContentCandidate {
    /// `{kind}/{platform folder}`
    KindPlatform,
    /// `{kind}`
    Kind,
    /// The package root itself.
    PackageRoot,
    /// `{kind}/{literal}`
    KindLiteral(&'static str),
}

/// Platforms whose content folder may not follow `{kind}/{platform folder}`,
/// with the candidates tried in order.
const CONTENT_ALIASES: &[(&str, &[ContentCandidate])] = &[
    (
        "Any,Version=v0.0",
        &[
            ContentCandidate::KindPlatform,
            ContentCandidate::Kind,
            ContentCandidate::PackageRoot,
        ],
    ),
    (
        ".NETPortable,Version=v0.0,Profile=Profile328",
        &[
            ContentCandidate::KindPlatform,
            ContentCandidate::KindLiteral("portable-net4+sl5+netcore45+wpa81+wp8"),
        ],
    ),
];

/// Resolve the content folder of a typed package.
pub fn content_path(
    package_root: &Path,
    kind: AssetKind,
    platform: &Platform,
    identity: &PackageIdentity,
) -> PkgResult<PathBuf> {
    let folder = kind.folder().unwrap_or_default();
    let candidate_path = |candidate: &ContentCandidate| match candidate {
        ContentCandidate::KindPlatform => package_root.join(folder).join(platform.folder_name()),
        ContentCandidate::Kind => package_root.join(folder),
        ContentCandidate::PackageRoot => package_root.to_path_buf(),
        ContentCandidate::KindLiteral(literal) => package_root.join(folder).join(literal),
    };

    let framework = platform.framework_name();
    let candidates: &[ContentCandidate] = CONTENT_ALIASES
        .iter()
        .find(|(name, _)| *name == framework)
        .map(|(_, candidates)| *candidates)
        .unwrap_or(&[ContentCandidate::KindPlatform]);

    if let Some(path) = candidates.iter().map(&candidate_path).find(|p| p.is_dir()) {
        return Ok(path);
    }
    Err(PkgError::InvalidAssemblyPath {
        package: identity.to_string(),
        path: candidate_path(&candidates[0]).display().to_string(),
    })
}

/// Everything known about a package at the moment it is materialized.
#[derive(Debug, Clone)]
pub struct InstallRecord {
    pub identity: PackageIdentity,
    pub asset_kind: AssetKind,
    pub platform: Platform,
    pub source: Url,
    pub dependency_sources: Vec<Url>,
    pub dependencies: Vec<Dependency>,
    pub package_root: PathBuf,
    pub custom_content_path: Option<String>,
    pub env_key: Option<String>,
}

/// A package installed during a session. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    pub identity: PackageIdentity,
    pub asset_kind: AssetKind,
    pub platform: Platform,
    pub source: Url,
    pub dependency_sources: Vec<Url>,
    pub dependencies: Vec<Dependency>,
    pub package_root: PathBuf,
    pub content_path: PathBuf,
    pub files: Vec<PathBuf>,
    pub environment: BTreeMap<String, String>,
}

impl ResolvedPackage {
    /// Locate the content folder, list its files and build the environment map.
    pub fn materialize(record: InstallRecord) -> PkgResult<Self> {
        let content_path = match record.asset_kind {
            AssetKind::Opaque => match &record.custom_content_path {
                Some(sub) if !sub.trim().is_empty() => record.package_root.join(sub.trim()),
                _ => record.package_root.clone(),
            },
            kind => content_path(&record.package_root, kind, &record.platform, &record.identity)?,
        };

        let files = if content_path.is_dir() {
            pkgwalk_util::fs::list_files(&content_path)?
        } else {
            Vec::new()
        };

        let id = record.identity.id();
        let path_text = content_path.display().to_string();
        let mut environment = BTreeMap::new();
        environment.insert(crate::env::package_key(id), path_text.clone());
        environment.insert(
            crate::env::version_key(id),
            record.identity.min_version().to_string(),
        );
        environment.insert(crate::env::framework_key(id), record.platform.folder_name());
        if let Some(key) = record.env_key.as_deref().filter(|k| !k.is_empty()) {
            environment.insert(key.to_string(), path_text);
        }

        Ok(Self {
            identity: record.identity,
            asset_kind: record.asset_kind,
            platform: record.platform,
            source: record.source,
            dependency_sources: record.dependency_sources,
            dependencies: record.dependencies,
            package_root: record.package_root,
            content_path,
            files,
            environment,
        })
    }

    pub fn id(&self) -> &str {
        self.identity.id()
    }
}

impl fmt::Display for ResolvedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.identity, self.platform)
    }
}
