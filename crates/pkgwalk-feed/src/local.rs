//! Local folder feeds: `{id}.{version}.nupkg` files, flat or nested as
//! `{id}/{version}/`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pkgwalk_core::identity::PackageIdentity;
use pkgwalk_core::platform::Platform;
use pkgwalk_core::version::PackageVersion;
use pkgwalk_util::errors::{PkgError, PkgResult};
use url::Url;

use crate::archive::read_package;
use crate::source::{DependencyInfo, PackageSource};

const ARCHIVE_EXTENSION: &str = "nupkg";

#[derive(Debug, Clone)]
pub struct LocalFeed {
    uri: Url,
    root: PathBuf,
}

impl LocalFeed {
    pub fn new(uri: Url) -> PkgResult<Self> {
        let root = uri.to_file_path().map_err(|()| PkgError::InvalidSource {
            source_uri: uri.to_string(),
            message: "not a local path".to_string(),
        })?;
        Ok(Self { uri, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locate the archive of `identity`; ids match case-insensitively and
    /// versions numerically.
    pub fn find_archive(&self, identity: &PackageIdentity) -> PkgResult<Option<PathBuf>> {
        if !self.root.is_dir() {
            return Err(PkgError::SourceUnavailable {
                package: identity.to_string(),
                source_uri: self.uri.to_string(),
                message: format!("{} is not a directory", self.root.display()),
            });
        }

        for path in pkgwalk_util::fs::list_files(&self.root)? {
            if archive_matches(&path, identity) {
                return Ok(Some(path));
            }
        }

        let nested = std::fs::read_dir(&self.root)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .find(|p| {
                p.is_dir()
                    && p.file_name()
                        .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(identity.id()))
            });
        let Some(package_dir) = nested else {
            return Ok(None);
        };

        for entry in std::fs::read_dir(&package_dir)?.filter_map(|e| e.ok()) {
            let version_dir = entry.path();
            let version_matches = version_dir
                .file_name()
                .and_then(|n| PackageVersion::parse(&n.to_string_lossy()).ok())
                .is_some_and(|v| &v == identity.min_version());
            if !version_dir.is_dir() || !version_matches {
                continue;
            }
            for path in pkgwalk_util::fs::list_files(&version_dir)? {
                if archive_matches(&path, identity) {
                    return Ok(Some(path));
                }
            }
        }
        Ok(None)
    }
}

/// `{id}.{version}.nupkg` naming `identity`.
fn archive_matches(path: &Path, identity: &PackageIdentity) -> bool {
    let is_archive = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(ARCHIVE_EXTENSION));
    let Some(stem) = path.file_stem().map(|s| s.to_string_lossy()) else {
        return false;
    };
    let id = identity.id();
    if !is_archive || stem.len() <= id.len() + 1 || !stem.is_char_boundary(id.len()) {
        return false;
    }
    let (name, rest) = stem.split_at(id.len());
    name.eq_ignore_ascii_case(id)
        && rest
            .strip_prefix('.')
            .and_then(|v| PackageVersion::parse(v).ok())
            .is_some_and(|v| &v == identity.min_version())
}

#[async_trait]
impl PackageSource for LocalFeed {
    fn uri(&self) -> &Url {
        &self.uri
    }

    async fn find_dependency_info(
        &self,
        identity: &PackageIdentity,
        platform: &Platform,
    ) -> PkgResult<Option<DependencyInfo>> {
        let Some(path) = self.find_archive(identity)? else {
            return Ok(None);
        };
        let package = read_package(&path).map_err(|e| PkgError::SourceUnavailable {
            package: identity.to_string(),
            source_uri: self.uri.to_string(),
            message: e.to_string(),
        })?;

        tracing::debug!("Found {identity} in {}", path.display());
        Ok(Some(DependencyInfo {
            identity: identity.clone(),
            version: package.nuspec.version.clone(),
            dependencies: package.nuspec.dependencies_for(platform),
            asset_groups: package.asset_groups(),
            source: self.uri.clone(),
        }))
    }

    async fn fetch_artifact(&self, identity: &PackageIdentity) -> PkgResult<Option<PathBuf>> {
        self.find_archive(identity)
    }
}
