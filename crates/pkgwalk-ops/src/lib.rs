pub mod ops_check;
pub mod ops_download;
pub mod ops_install;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pkgwalk_core::config::GlobalConfig;
use pkgwalk_core::manifest::{RequestManifest, MANIFEST_FILE};
use pkgwalk_core::package::PackageRequest;
use pkgwalk_feed::download::HttpSettings;
use pkgwalk_feed::provider::FeedFactory;

/// HTTP client settings from the `[http]` section of the global config.
pub fn http_settings(config: &GlobalConfig) -> HttpSettings {
    HttpSettings {
        timeout: Duration::from_secs(config.http.timeout_secs),
        retries: config.http.retries,
        ..HttpSettings::default()
    }
}

/// Everything an operation needs from `Packages.toml` and the global config.
pub(crate) struct Project {
    pub manifest: RequestManifest,
    pub cache_root: PathBuf,
    pub requests: Vec<PackageRequest>,
    pub provider: Arc<FeedFactory>,
}

impl Project {
    pub fn load(project_root: &Path, config: &GlobalConfig) -> miette::Result<Self> {
        let manifest = RequestManifest::from_path(&project_root.join(MANIFEST_FILE))?;
        let cache_root = manifest
            .cache_dir(project_root)
            .unwrap_or_else(|| config.cache_dir());
        let requests =
            manifest.to_requests(project_root, &cache_root, &config.fallback_sources())?;
        let provider = Arc::new(FeedFactory::new(
            cache_root.join(".downloads"),
            http_settings(config),
        ));
        tracing::debug!(
            "{} requests, cache at {}",
            requests.len(),
            cache_root.display()
        );
        Ok(Self {
            manifest,
            cache_root,
            requests,
            provider,
        })
    }
}
