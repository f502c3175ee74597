//! Remote feeds speaking the flat-container protocol: a service index that
//! points at a `PackageBaseAddress/3.0.0` resource, under which archives
//! live at `{id}/{version}/{id}.{version}.nupkg` (all lowercase).

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::OnceCell;
use url::Url;

use pkgwalk_core::identity::PackageIdentity;
use pkgwalk_core::platform::Platform;
use pkgwalk_util::errors::{PkgError, PkgResult};

use crate::archive::read_package;
use crate::download::{build_client, download_bytes, DownloadFailure, HttpSettings};
use crate::source::{DependencyInfo, PackageSource};

const PACKAGE_BASE_ADDRESS: &str = "PackageBaseAddress/3.0.0";

#[derive(Debug, Deserialize)]
struct ServiceIndex {
    #[serde(default)]
    resources: Vec<ServiceResource>,
}

#[derive(Debug, Deserialize)]
struct ServiceResource {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    kind: String,
}

pub struct HttpFeed {
    uri: Url,
    client: Client,
    settings: HttpSettings,
    download_dir: PathBuf,
    base_address: OnceCell<Url>,
}

impl HttpFeed {
    /// `download_dir` receives the archives fetched from this feed.
    pub fn new(uri: Url, download_dir: PathBuf, settings: HttpSettings) -> PkgResult<Self> {
        Ok(Self {
            client: build_client(&settings)?,
            uri,
            settings,
            download_dir,
            base_address: OnceCell::new(),
        })
    }

    fn fatal(&self, identity: &PackageIdentity, message: String) -> PkgError {
        PkgError::SourceFatal {
            package: identity.to_string(),
            source_uri: self.uri.to_string(),
            message,
        }
    }

    fn failure(&self, identity: &PackageIdentity, failure: DownloadFailure) -> PkgError {
        match failure {
            DownloadFailure::Fatal(message) => self.fatal(identity, message),
            DownloadFailure::Unavailable(message) => PkgError::SourceUnavailable {
                package: identity.to_string(),
                source_uri: self.uri.to_string(),
                message,
            },
        }
    }

    /// Resolve the package base address from the service index, once.
    async fn base_address(&self, identity: &PackageIdentity) -> PkgResult<&Url> {
        self.base_address
            .get_or_try_init(|| async {
                let body = download_bytes(&self.client, self.uri.as_str(), &self.settings)
                    .await
                    .map_err(|f| self.failure(identity, f))?
                    .ok_or_else(|| self.fatal(identity, "service index not found".to_string()))?;
                let index: ServiceIndex = serde_json::from_slice(&body)
                    .map_err(|e| self.fatal(identity, format!("invalid service index: {e}")))?;
                let resource = index
                    .resources
                    .iter()
                    .find(|r| r.kind == PACKAGE_BASE_ADDRESS)
                    .ok_or_else(|| {
                        self.fatal(
                            identity,
                            format!("service index has no {PACKAGE_BASE_ADDRESS} resource"),
                        )
                    })?;
                let mut base = resource.id.clone();
                if !base.ends_with('/') {
                    base.push('/');
                }
                tracing::debug!("Package base address of {}: {base}", self.uri);
                Url::parse(&base).map_err(|e| self.fatal(identity, format!("invalid base address: {e}")))
            })
            .await
    }

    fn archive_name(identity: &PackageIdentity) -> (String, String) {
        let id = identity.id().to_lowercase();
        let version = identity.min_version().normalized().to_lowercase();
        let file = format!("{id}.{version}.nupkg");
        (format!("{id}/{version}/{file}"), file)
    }

    /// Download the archive into the feed's download directory, once.
    async fn download_archive(&self, identity: &PackageIdentity) -> PkgResult<Option<PathBuf>> {
        let (relative, file) = Self::archive_name(identity);
        let target = self.download_dir.join(&file);
        if target.is_file() {
            return Ok(Some(target));
        }

        let base = self.base_address(identity).await?;
        let url = base
            .join(&relative)
            .map_err(|e| self.fatal(identity, format!("invalid package url: {e}")))?;

        let Some(bytes) = download_bytes(&self.client, url.as_str(), &self.settings)
            .await
            .map_err(|f| self.failure(identity, f))?
        else {
            return Ok(None);
        };

        pkgwalk_util::fs::ensure_dir(&self.download_dir)?;
        let partial = self.download_dir.join(format!("{file}.part"));
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, &target).await?;
        tracing::info!("Downloaded {identity} from {url}");
        Ok(Some(target))
    }
}

#[async_trait]
impl PackageSource for HttpFeed {
    fn uri(&self) -> &Url {
        &self.uri
    }

    async fn find_dependency_info(
        &self,
        identity: &PackageIdentity,
        platform: &Platform,
    ) -> PkgResult<Option<DependencyInfo>> {
        let Some(path) = self.download_archive(identity).await? else {
            return Ok(None);
        };
        let package = read_package(&path).map_err(|e| self.fatal(identity, e.to_string()))?;

        Ok(Some(DependencyInfo {
            identity: identity.clone(),
            version: package.nuspec.version.clone(),
            dependencies: package.nuspec.dependencies_for(platform),
            asset_groups: package.asset_groups(),
            source: self.uri.clone(),
        }))
    }

    async fn fetch_artifact(&self, identity: &PackageIdentity) -> PkgResult<Option<PathBuf>> {
        self.download_archive(identity).await
    }
}
