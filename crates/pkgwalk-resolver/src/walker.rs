//! Depth-first dependency discovery through package sources.

use std::collections::HashMap;
use std::sync::Arc;

use pkgwalk_core::dependency::PackageDependency;
use pkgwalk_core::identity::PackageIdentity;
use pkgwalk_core::package::ResolvedPackage;
use pkgwalk_core::platform::Platform;
use pkgwalk_feed::source::{DependencyInfo, PackageSource};
use pkgwalk_util::errors::{PkgError, PkgResult};
use tokio_util::sync::CancellationToken;

/// How many dependency levels below a root are walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkDepth {
    Unlimited,
    /// `Levels(0)` is the root alone.
    Levels(u32),
}

impl WalkDepth {
    fn allows_children(self) -> bool {
        !matches!(self, WalkDepth::Levels(0))
    }

    fn descend(self) -> Self {
        match self {
            WalkDepth::Unlimited => WalkDepth::Unlimited,
            WalkDepth::Levels(n) => WalkDepth::Levels(n.saturating_sub(1)),
        }
    }
}

/// Dependency info discovered so far, in discovery order, keyed by identity.
#[derive(Debug, Clone, Default)]
pub struct AvailableSet {
    infos: Vec<DependencyInfo>,
    index: HashMap<PackageIdentity, usize>,
}

impl AvailableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &PackageIdentity) -> bool {
        self.index.contains_key(identity)
    }

    /// Returns `false` when the identity is already present.
    pub fn insert(&mut self, info: DependencyInfo) -> bool {
        if self.contains(&info.identity) {
            return false;
        }
        self.index.insert(info.identity.clone(), self.infos.len());
        self.infos.push(info);
        true
    }

    pub fn get(&self, identity: &PackageIdentity) -> Option<&DependencyInfo> {
        self.index.get(identity).map(|&i| &self.infos[i])
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Entries discovered after the first `start`.
    pub fn since(&self, start: usize) -> &[DependencyInfo] {
        self.infos.get(start..).unwrap_or(&[])
    }

    /// Forget everything discovered after the first `len` entries.
    pub fn truncate(&mut self, len: usize) {
        for info in self.infos.drain(len.min(self.infos.len())..) {
            self.index.remove(&info.identity);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DependencyInfo> {
        self.infos.iter()
    }
}

/// One pending node of the walk.
struct Visit {
    identity: PackageIdentity,
    parent: Option<PackageIdentity>,
    depth: WalkDepth,
}

/// Walks a root's dependency graph, querying sources in order.
pub struct GraphWalker<'a> {
    platform: &'a Platform,
    sources: &'a [Arc<dyn PackageSource>],
    installed: &'a [ResolvedPackage],
    cancel: Option<&'a CancellationToken>,
}

impl<'a> GraphWalker<'a> {
    /// Dependencies already satisfied by a package in `installed` are not walked.
    pub fn new(
        platform: &'a Platform,
        sources: &'a [Arc<dyn PackageSource>],
        installed: &'a [ResolvedPackage],
    ) -> Self {
        Self {
            platform,
            sources,
            installed,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: Option<&'a CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Discover `root` and, within `depth`, its transitive dependencies.
    ///
    /// Newly found nodes are appended to `available` in depth-first
    /// pre-order; nodes already present are neither queried nor expanded.
    pub async fn walk(
        &self,
        root: &PackageIdentity,
        depth: WalkDepth,
        available: &mut AvailableSet,
    ) -> PkgResult<()> {
        let mut stack = vec![Visit {
            identity: root.clone(),
            parent: None,
            depth,
        }];

        while let Some(visit) = stack.pop() {
            if available.contains(&visit.identity) {
                continue;
            }

            let info = self.query_sources(&visit.identity).await?.ok_or_else(|| {
                self.not_found(&visit.identity, visit.parent.as_ref())
            })?;
            let dependencies = info.dependencies.clone();
            available.insert(info);

            if !visit.depth.allows_children() {
                continue;
            }
            let child_depth = visit.depth.descend();
            let mut children = Vec::new();
            for dependency in &dependencies {
                if self.installed_satisfies(dependency) {
                    tracing::debug!(
                        "{dependency} of {} is already installed",
                        visit.identity
                    );
                    continue;
                }
                children.push(Visit {
                    identity: dependency.target_identity(),
                    parent: Some(visit.identity.clone()),
                    depth: child_depth,
                });
            }
            // Reversed so the first declared dependency is visited first.
            stack.extend(children.into_iter().rev());
        }
        Ok(())
    }

    fn installed_satisfies(&self, dependency: &PackageDependency) -> bool {
        self.installed.iter().any(|p| {
            p.identity.has_id(&dependency.id) && dependency.range.satisfies(p.identity.min_version())
        })
    }

    async fn query_sources(&self, identity: &PackageIdentity) -> PkgResult<Option<DependencyInfo>> {
        for source in self.sources {
            if self.cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(PkgError::Cancelled);
            }
            match self.query(source.as_ref(), identity).await {
                Ok(Some(info)) => {
                    tracing::debug!("Found {identity} in {}", source.uri());
                    return Ok(Some(info));
                }
                Ok(None) => {
                    tracing::debug!("{identity} not found in {}", source.uri());
                }
                Err(e @ (PkgError::SourceFatal { .. } | PkgError::Cancelled)) => return Err(e),
                Err(e) => {
                    tracing::error!("{e}");
                }
            }
        }
        Ok(None)
    }

    async fn query(
        &self,
        source: &dyn PackageSource,
        identity: &PackageIdentity,
    ) -> PkgResult<Option<DependencyInfo>> {
        let lookup = source.find_dependency_info(identity, self.platform);
        match self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(PkgError::Cancelled),
                result = lookup => result,
            },
            None => lookup.await,
        }
    }

    fn not_found(&self, identity: &PackageIdentity, parent: Option<&PackageIdentity>) -> PkgError {
        let sources = self.sources_tried();
        match parent {
            None => PkgError::PackageNotFound {
                package: identity.to_string(),
                sources,
            },
            Some(parent) => PkgError::DependencyNotFound {
                message: format!(
                    "Dependency {identity} of {parent} not found in any of the provided sources: {sources}"
                ),
            },
        }
    }

    fn sources_tried(&self) -> String {
        self.sources
            .iter()
            .map(|s| s.uri().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
