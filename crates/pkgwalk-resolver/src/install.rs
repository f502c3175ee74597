//! Per-root installation: walk, fetch, extract and materialize each newly
//! discovered package exactly once per session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pkgwalk_core::asset::AssetKind;
use pkgwalk_core::dependency::Dependency;
use pkgwalk_core::identity::PackageIdentity;
use pkgwalk_core::package::{package_dir, InstallRecord, PackageRequest, PackageType, ResolvedPackage};
use pkgwalk_core::platform::Platform;
use pkgwalk_core::source::same_source;
use pkgwalk_core::version::VersionRange;
use pkgwalk_feed::source::{DependencyInfo, PackageSource, SourceProvider};
use pkgwalk_util::errors::{PkgError, PkgResult};
use tokio_util::sync::CancellationToken;

use crate::selector::select_assets;
use crate::walker::{AvailableSet, GraphWalker, WalkDepth};

/// Options shared by every root of a session.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Walk transitive dependencies; otherwise only the roots are installed.
    pub resolve_dependencies: bool,
    pub cancel: Option<CancellationToken>,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            resolve_dependencies: true,
            cancel: None,
        }
    }
}

struct WorkerContext {
    platform: Platform,
    provider: Arc<dyn SourceProvider>,
    options: InstallOptions,
}

impl WorkerContext {
    fn check_cancelled(&self) -> PkgResult<()> {
        match &self.options.cancel {
            Some(token) if token.is_cancelled() => Err(PkgError::Cancelled),
            _ => Ok(()),
        }
    }

    fn open_sources(&self, urls: &[url::Url]) -> PkgResult<Vec<Arc<dyn PackageSource>>> {
        urls.iter().map(|url| self.provider.open(url)).collect()
    }
}

/// State carried from one root to the next. Moved into the worker task
/// for the duration of a root.
#[derive(Default)]
struct SessionState {
    available: AvailableSet,
    installed: Vec<ResolvedPackage>,
}

/// Installs root package requests for one platform.
///
/// Packages discovered by earlier roots are neither queried nor installed
/// again, so installing the same root twice is a no-op.
pub struct ResolutionSession {
    ctx: Arc<WorkerContext>,
    state: SessionState,
}

impl ResolutionSession {
    pub fn new(platform: Platform, provider: Arc<dyn SourceProvider>, options: InstallOptions) -> Self {
        Self {
            ctx: Arc::new(WorkerContext {
                platform,
                provider,
                options,
            }),
            state: SessionState::default(),
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.ctx.platform
    }

    /// Packages installed so far, in installation order.
    pub fn installed(&self) -> &[ResolvedPackage] {
        &self.state.installed
    }

    pub fn into_installed(self) -> Vec<ResolvedPackage> {
        self.state.installed
    }

    pub fn available(&self) -> &AvailableSet {
        &self.state.available
    }

    /// Install `requests` in order, one worker task per root.
    ///
    /// `progress` is called once per completed root. The first failing
    /// root stops the session with `PackageInstallationFailed`; packages
    /// installed before it are kept, even when its worker panics.
    pub async fn install<F>(&mut self, requests: &[PackageRequest], mut progress: F) -> PkgResult<()>
    where
        F: FnMut(&str),
    {
        for request in requests {
            let ctx = Arc::clone(&self.ctx);
            let installed = self.state.installed.clone();
            let available = self.state.available.clone();
            let mut state = std::mem::take(&mut self.state);
            let owned = request.clone();
            let handle = tokio::spawn(async move {
                let result = install_root(&ctx, &owned, &mut state).await;
                (state, result)
            });

            let result = match handle.await {
                Ok((state, result)) => {
                    self.state = state;
                    result
                }
                Err(join) => {
                    self.state = SessionState { available, installed };
                    Err(PkgError::WorkerFailed {
                        message: join.to_string(),
                    })
                }
            };

            if let Err(cause) = result {
                return Err(PkgError::PackageInstallationFailed {
                    package: request.identity.to_string(),
                    cause: Box::new(cause),
                });
            }

            let mut message = format!("Installed: {}", request.identity);
            if self.ctx.options.resolve_dependencies {
                message.push_str(" and its dependencies");
            }
            progress(&message);
        }
        Ok(())
    }
}

async fn install_root(
    ctx: &WorkerContext,
    request: &PackageRequest,
    state: &mut SessionState,
) -> PkgResult<()> {
    let sources = ctx.open_sources(&request.sources())?;
    let depth = if ctx.options.resolve_dependencies {
        WalkDepth::Unlimited
    } else {
        WalkDepth::Levels(0)
    };

    let before = state.available.len();
    let result = install_discovered(ctx, request, &sources, depth, before, state).await;
    if result.is_err() {
        state.available.truncate(before);
    }
    result
}

async fn install_discovered(
    ctx: &WorkerContext,
    request: &PackageRequest,
    sources: &[Arc<dyn PackageSource>],
    depth: WalkDepth,
    before: usize,
    state: &mut SessionState,
) -> PkgResult<()> {
    GraphWalker::new(&ctx.platform, sources, &state.installed)
        .with_cancellation(ctx.options.cancel.as_ref())
        .walk(&request.identity, depth, &mut state.available)
        .await?;

    let discovered: Vec<DependencyInfo> = state.available.since(before).to_vec();
    if discovered.is_empty() {
        tracing::debug!("{} was resolved earlier in this session", request.identity);
    }
    for info in &discovered {
        ctx.check_cancelled()?;
        let is_root = info.identity == request.identity;
        if let Some(package) = install_package(ctx, request, info, is_root, &state.installed).await? {
            tracing::info!("Installed {package}");
            state.installed.push(package);
        }
    }
    Ok(())
}

/// Install one discovered package unless a compatible one is already installed.
async fn install_package(
    ctx: &WorkerContext,
    request: &PackageRequest,
    info: &DependencyInfo,
    is_root: bool,
    installed: &[ResolvedPackage],
) -> PkgResult<Option<ResolvedPackage>> {
    let id = info.identity.id();
    let pinned = VersionRange::at_least(info.version.clone());
    if let Some(existing) = installed
        .iter()
        .find(|p| p.identity.has_id(id) && pinned.satisfies(p.identity.min_version()))
    {
        tracing::debug!("{} is already installed as {existing}", info.identity);
        return Ok(None);
    }

    let identity = if is_root {
        request.identity.clone()
    } else {
        PackageIdentity::at_least(id, info.version.clone())
    };
    // Content from the wrong source must never reach the cache.
    if is_root && !same_source(&request.source, &info.source) {
        return Err(PkgError::DependencyConfusion {
            package: identity.to_string(),
            requested: request.source.to_string(),
            found: info.source.to_string(),
        });
    }

    let package_root = package_dir(&request.cache_root, &PackageIdentity::at_least(id, info.version.clone()));
    if !package_root.is_dir() {
        unpack(ctx, info, &package_root).await?;
    }

    let (asset_kind, platform) = if is_root && request.package_type == PackageType::Custom {
        (AssetKind::Opaque, Platform::Any)
    } else {
        select_assets(&identity, &ctx.platform, &info.asset_groups)?
    };

    let dependencies = info
        .dependencies
        .iter()
        .map(|target| Dependency {
            target: target.clone(),
            force_min_version: request.dependencies_force_min_version,
        })
        .collect();

    let record = InstallRecord {
        identity,
        asset_kind,
        platform,
        source: info.source.clone(),
        dependency_sources: request.dependency_sources.clone(),
        dependencies,
        package_root,
        custom_content_path: request.custom_content_path.clone().filter(|_| is_root),
        env_key: request.env_key.clone().filter(|_| is_root),
    };
    Ok(Some(ResolvedPackage::materialize(record)?))
}

/// Fetch the archive from the source that answered and extract it.
async fn unpack(ctx: &WorkerContext, info: &DependencyInfo, package_root: &Path) -> PkgResult<PathBuf> {
    let source = ctx.provider.open(&info.source)?;
    let archive = source
        .fetch_artifact(&info.identity)
        .await?
        .ok_or_else(|| PkgError::PackageNotFound {
            package: info.identity.to_string(),
            sources: info.source.to_string(),
        })?;
    tracing::debug!("Extracting {} into {}", archive.display(), package_root.display());
    source.extract(&archive, package_root)
}

/// Download a root package's archive into `dest` without installing it.
///
/// Only the root is resolved. Returns the path of the copied archive.
pub async fn download_package(
    provider: Arc<dyn SourceProvider>,
    request: &PackageRequest,
    platform: &Platform,
    dest: &Path,
) -> PkgResult<PathBuf> {
    let sources: Vec<Arc<dyn PackageSource>> = request
        .sources()
        .iter()
        .map(|url| provider.open(url))
        .collect::<PkgResult<_>>()?;

    let mut available = AvailableSet::new();
    GraphWalker::new(platform, &sources, &[])
        .walk(&request.identity, WalkDepth::Levels(0), &mut available)
        .await?;
    let info = available
        .get(&request.identity)
        .ok_or_else(|| PkgError::PackageNotFound {
            package: request.identity.to_string(),
            sources: request.source.to_string(),
        })?;

    let source = provider.open(&info.source)?;
    let archive = source
        .fetch_artifact(&info.identity)
        .await?
        .ok_or_else(|| PkgError::PackageNotFound {
            package: info.identity.to_string(),
            sources: info.source.to_string(),
        })?;

    pkgwalk_util::fs::ensure_dir(dest)?;
    let target = dest.join(format!(
        "{}.{}.nupkg",
        info.identity.id(),
        info.version.normalized()
    ));
    if pkgwalk_util::fs::copy_if_missing(&archive, &target)? {
        tracing::info!("Downloaded {} to {}", info.identity, target.display());
    }
    Ok(target)
}
