//! The package source abstraction the resolver talks to.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use pkgwalk_core::asset::AssetGroups;
use pkgwalk_core::dependency::PackageDependency;
use pkgwalk_core::identity::PackageIdentity;
use pkgwalk_core::platform::Platform;
use pkgwalk_core::version::PackageVersion;
use pkgwalk_util::errors::PkgResult;
use url::Url;

/// What a source knows about one package version.
#[derive(Debug, Clone)]
pub struct DependencyInfo {
    /// The identity that was asked for.
    pub identity: PackageIdentity,
    /// The version the source actually serves.
    pub version: PackageVersion,
    /// Dependencies of the group nearest to the requested platform.
    pub dependencies: Vec<PackageDependency>,
    pub asset_groups: AssetGroups,
    /// The source that answered.
    pub source: Url,
}

/// A package feed.
///
/// `find_dependency_info` returns `Ok(None)` when the feed does not have
/// the package. Errors are either `SourceFatal` (resolution must stop) or
/// `SourceUnavailable` (the next source may still answer).
#[async_trait]
pub trait PackageSource: Send + Sync {
    fn uri(&self) -> &Url;

    async fn find_dependency_info(
        &self,
        identity: &PackageIdentity,
        platform: &Platform,
    ) -> PkgResult<Option<DependencyInfo>>;

    /// Local path of the package archive, downloading it first if needed.
    async fn fetch_artifact(&self, identity: &PackageIdentity) -> PkgResult<Option<PathBuf>>;

    /// Unpack an archive obtained from [`PackageSource::fetch_artifact`].
    fn extract(&self, archive: &Path, dest: &Path) -> PkgResult<PathBuf> {
        crate::archive::extract_package(archive, dest)?;
        Ok(dest.to_path_buf())
    }
}

/// Opens package sources by URL.
pub trait SourceProvider: Send + Sync {
    fn open(&self, url: &Url) -> PkgResult<Arc<dyn PackageSource>>;
}
