//! Operation: install every package listed in `Packages.toml`.

use std::collections::BTreeMap;
use std::path::Path;

use pkgwalk_core::config::GlobalConfig;
use pkgwalk_core::package::ResolvedPackage;
use pkgwalk_resolver::consistency::CheckOptions;
use pkgwalk_resolver::install::{InstallOptions, ResolutionSession};
use pkgwalk_util::progress::{spinner, status, status_line, StatusKind};

use crate::{ops_check, Project};

/// Install with the user's global configuration.
pub async fn install(project_root: &Path, verbose: bool) -> miette::Result<Vec<ResolvedPackage>> {
    let config = GlobalConfig::load().unwrap_or_default();
    install_with(project_root, &config, verbose).await
}

/// Resolve and install all requested packages, then run the consistency
/// check when `[settings] check` is enabled.
pub async fn install_with(
    project_root: &Path,
    config: &GlobalConfig,
    verbose: bool,
) -> miette::Result<Vec<ResolvedPackage>> {
    let project = Project::load(project_root, config)?;
    let settings = &project.manifest.settings;
    let platform = project.manifest.platform();

    let mut session = ResolutionSession::new(
        platform.clone(),
        project.provider.clone(),
        InstallOptions {
            resolve_dependencies: settings.resolve_dependencies,
            cancel: None,
        },
    );

    let sp = spinner(&format!("Resolving {} packages...", project.requests.len()));
    let result = session
        .install(&project.requests, |message| {
            let (label, rest) = message.split_once(": ").unwrap_or(("Installed", message));
            sp.suspend(|| status(label, rest));
        })
        .await;
    sp.finish_and_clear();
    result?;

    let packages = session.into_installed();
    if settings.check {
        ops_check::check(
            &packages,
            CheckOptions {
                strict: settings.strict,
                ignore_dependencies: settings.ignore_dependencies,
            },
        )?;
    }

    if verbose {
        for (key, value) in environment(&packages) {
            status_line(StatusKind::Info, "Env", &format!("{key}={value}"));
        }
    }
    status(
        "Finished",
        &format!(
            "{} packages for {} in {}",
            packages.len(),
            platform.folder_name(),
            project.cache_root.display()
        ),
    );
    Ok(packages)
}

/// Merge the environment maps of all packages; later packages win.
pub fn environment(packages: &[ResolvedPackage]) -> BTreeMap<String, String> {
    packages
        .iter()
        .flat_map(|p| p.environment.iter().map(|(k, v)| (k.clone(), v.clone())))
        .collect()
}
