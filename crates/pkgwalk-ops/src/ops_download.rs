//! Operation: download the requested package archives without installing them.

use std::path::{Path, PathBuf};

use pkgwalk_core::config::GlobalConfig;
use pkgwalk_resolver::install::download_package;
use pkgwalk_util::progress::{spinner, status};

use crate::Project;

/// Copy the archive of every root package in `Packages.toml` into `dest`.
/// Dependencies are not downloaded.
pub async fn download(project_root: &Path, dest: &Path) -> miette::Result<Vec<PathBuf>> {
    let config = GlobalConfig::load().unwrap_or_default();
    download_with(project_root, dest, &config).await
}

pub async fn download_with(
    project_root: &Path,
    dest: &Path,
    config: &GlobalConfig,
) -> miette::Result<Vec<PathBuf>> {
    let project = Project::load(project_root, config)?;
    let platform = project.manifest.platform();

    let mut archives = Vec::with_capacity(project.requests.len());
    for request in &project.requests {
        let sp = spinner(&format!("Downloading {}...", request.identity));
        let result = download_package(project.provider.clone(), request, &platform, dest).await;
        sp.finish_and_clear();
        let archive = result?;
        status("Downloaded", &request.identity.to_string());
        archives.push(archive);
    }
    Ok(archives)
}
