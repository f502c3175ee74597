use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use pkgwalk_util::errors::{PkgError, PkgResult};

use crate::identity::PackageIdentity;
use crate::package::{PackageRequest, PackageType};
use crate::platform::Platform;
use crate::source::parse_source;

/// File name of the request manifest.
pub const MANIFEST_FILE: &str = "Packages.toml";

/// The parsed representation of a `Packages.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestManifest {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default, rename = "package")]
    pub packages: Vec<PackageEntry>,
}

/// Session-wide settings from `[settings]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Cache directory, relative to the manifest directory. Falls back to the
    /// global cache when absent.
    #[serde(default)]
    pub cache: Option<String>,
    #[serde(default = "default_true", rename = "resolve-dependencies")]
    pub resolve_dependencies: bool,
    #[serde(default)]
    pub strict: bool,
    #[serde(default = "default_true")]
    pub check: bool,
    #[serde(default, rename = "ignore-dependencies")]
    pub ignore_dependencies: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            cache: None,
            resolve_dependencies: true,
            strict: false,
            check: true,
            ignore_dependencies: false,
        }
    }
}

fn default_platform() -> String {
    "any".to_string()
}

fn default_true() -> bool {
    true
}

/// One `[[package]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageEntry {
    pub id: String,
    pub version: String,
    pub source: String,
    #[serde(default, rename = "dependency-sources")]
    pub dependency_sources: Vec<String>,
    #[serde(default, rename = "type")]
    pub package_type: PackageType,
    #[serde(default = "default_true", rename = "force-min-version")]
    pub force_min_version: bool,
    #[serde(default, rename = "content-path")]
    pub content_path: Option<String>,
    #[serde(default, rename = "env-key")]
    pub env_key: Option<String>,
}

impl RequestManifest {
    /// Load and parse a `Packages.toml` file from the given path.
    pub fn from_path(path: &Path) -> PkgResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PkgError::Manifest {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> PkgResult<Self> {
        toml::from_str(content).map_err(|e| PkgError::Manifest {
            message: format!("Failed to parse {MANIFEST_FILE}: {e}"),
        })
    }

    pub fn platform(&self) -> Platform {
        Platform::parse(&self.settings.platform)
    }

    /// The cache directory, resolved against `manifest_dir`, if configured.
    pub fn cache_dir(&self, manifest_dir: &Path) -> Option<PathBuf> {
        self.settings
            .cache
            .as_deref()
            .map(|c| manifest_dir.join(crate::env::expand(c)))
    }

    /// Turn every entry into a request. `fallback_sources` are appended after
    /// each entry's own dependency sources.
    pub fn to_requests(
        &self,
        manifest_dir: &Path,
        cache_root: &Path,
        fallback_sources: &[String],
    ) -> PkgResult<Vec<PackageRequest>> {
        self.packages
            .iter()
            .map(|entry| entry.to_request(manifest_dir, cache_root, fallback_sources))
            .collect()
    }
}

impl PackageEntry {
    pub fn to_request(
        &self,
        manifest_dir: &Path,
        cache_root: &Path,
        fallback_sources: &[String],
    ) -> PkgResult<PackageRequest> {
        let identity = PackageIdentity::new(&self.id, &self.version)?;
        let source = parse_source(&self.source, manifest_dir)?;

        let mut dependency_sources = Vec::new();
        for s in self.dependency_sources.iter().chain(fallback_sources) {
            let url = parse_source(s, manifest_dir)?;
            if url != source && !dependency_sources.contains(&url) {
                dependency_sources.push(url);
            }
        }

        tracing::debug!(
            "Request {identity} from {source} ({} dependency sources)",
            dependency_sources.len()
        );
        Ok(PackageRequest::new(identity, source, cache_root)
            .with_dependency_sources(dependency_sources)
            .with_package_type(self.package_type)
            .with_force_min_version(self.force_min_version)
            .with_content_path(self.content_path.clone())
            .with_env_key(self.env_key.clone()))
    }
}
