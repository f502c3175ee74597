//! HTTP downloads with timeout and retries.

use std::time::Duration;

use reqwest::Client;

use pkgwalk_util::errors::{PkgError, PkgResult};

/// Client and retry settings for remote feeds.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Why a download failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadFailure {
    /// Timeouts, refused connections or server errors, after all retries.
    Unavailable(String),
    /// Any other failure; retrying will not help.
    Fatal(String),
}

/// Build a shared reqwest client for feed requests.
pub fn build_client(settings: &HttpSettings) -> PkgResult<Client> {
    Client::builder()
        .timeout(settings.timeout)
        .user_agent(concat!("pkgwalk/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PkgError::Network {
            message: format!("Failed to create HTTP client: {e}"),
        })
}

/// Download raw bytes from a URL, with retries.
///
/// Returns `Ok(None)` for 404 (package not in this feed).
pub async fn download_bytes(
    client: &Client,
    url: &str,
    settings: &HttpSettings,
) -> Result<Option<Vec<u8>>, DownloadFailure> {
    let mut last_err = String::new();
    let attempts = settings.retries.max(1);

    for attempt in 0..attempts {
        if attempt > 0 {
            tokio::time::sleep(settings.retry_delay * attempt).await;
            tracing::debug!("Retrying {url} (attempt {})", attempt + 1);
        }

        match client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if status.is_server_error() {
                    last_err = format!("HTTP {status} from {url}");
                    continue;
                }
                if !status.is_success() {
                    return Err(DownloadFailure::Fatal(format!("HTTP {status} fetching {url}")));
                }

                let bytes = resp.bytes().await.map_err(|e| {
                    DownloadFailure::Unavailable(format!("Failed to read response from {url}: {e}"))
                })?;
                return Ok(Some(bytes.to_vec()));
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                last_err = format!("{e}");
                continue;
            }
            Err(e) => {
                return Err(DownloadFailure::Fatal(format!("Request to {url} failed: {e}")));
            }
        }
    }

    Err(DownloadFailure::Unavailable(format!(
        "Failed after {attempts} attempts for {url}: {last_err}"
    )))
}
