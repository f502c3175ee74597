//! Asset selection: which kind and platform folder of a package to use.

use pkgwalk_core::asset::{AssetGroups, AssetKind};
use pkgwalk_core::identity::PackageIdentity;
use pkgwalk_core::platform::Platform;
use pkgwalk_util::errors::{PkgError, PkgResult};

/// Pick the nearest compatible asset group for `platform`.
///
/// Implementation assemblies are preferred over compile-time assemblies. A
/// package without any asset group is a collector package (dependencies
/// only) and maps to implementation assemblies for `any`.
pub fn select_assets(
    package: &PackageIdentity,
    platform: &Platform,
    groups: &AssetGroups,
) -> PkgResult<(AssetKind, Platform)> {
    if groups.is_empty() {
        tracing::debug!("{package} has no assets, treating it as a collector package");
        return Ok((AssetKind::ImplementationAssembly, Platform::Any));
    }

    for kind in AssetKind::TYPED {
        let candidates = groups.get(kind);
        if candidates.is_empty() {
            continue;
        }
        if let Some(nearest) = platform.nearest(candidates.iter().map(|g| &g.platform)) {
            tracing::debug!("Selected {kind} assets of {package} for {nearest}");
            return Ok((kind, nearest.clone()));
        }
    }

    let available: Vec<String> = AssetKind::TYPED
        .into_iter()
        .flat_map(|k| groups.get(k).iter().map(|g| g.platform.folder_name()))
        .collect();
    Err(PkgError::TargetFrameworkNotFound {
        message: format!(
            "{package} has no assets compatible with {platform} (available: {})",
            available.join(", ")
        ),
    })
}
