use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use pkgwalk_util::errors::{PkgError, PkgResult};
use url::Url;

use crate::download::HttpSettings;
use crate::http::HttpFeed;
use crate::local::LocalFeed;
use crate::source::{PackageSource, SourceProvider};

/// Opens `file://` URLs as [`LocalFeed`]s and `http(s)://` URLs as
/// [`HttpFeed`]s, reusing one instance per URL.
pub struct FeedFactory {
    download_root: PathBuf,
    http: HttpSettings,
    feeds: Mutex<HashMap<Url, Arc<dyn PackageSource>>>,
}

impl FeedFactory {
    /// Remote feeds download into per-feed folders under `download_root`.
    pub fn new(download_root: PathBuf, http: HttpSettings) -> Self {
        Self {
            download_root,
            http,
            feeds: Mutex::new(HashMap::new()),
        }
    }

    /// One folder per feed URL: scheme, host, port and path all take part,
    /// so two feeds on one host never share downloaded archives.
    fn download_dir(&self, url: &Url) -> PathBuf {
        let port = url
            .port_or_known_default()
            .map(|p| p.to_string())
            .unwrap_or_default();
        let raw = format!(
            "{}_{}_{}{}",
            url.scheme(),
            url.host_str().unwrap_or("feed"),
            port,
            url.path()
        );
        let key: String = raw
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
            .collect();
        self.download_root.join(key.trim_matches('_'))
    }

    fn create(&self, url: &Url) -> PkgResult<Arc<dyn PackageSource>> {
        match url.scheme() {
            "file" => Ok(Arc::new(LocalFeed::new(url.clone())?)),
            "http" | "https" => Ok(Arc::new(HttpFeed::new(
                url.clone(),
                self.download_dir(url),
                self.http.clone(),
            )?)),
            other => Err(PkgError::InvalidSource {
                source_uri: url.to_string(),
                message: format!("unsupported scheme '{other}'"),
            }),
        }
    }
}

impl SourceProvider for FeedFactory {
    fn open(&self, url: &Url) -> PkgResult<Arc<dyn PackageSource>> {
        let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(feed) = feeds.get(url) {
            return Ok(Arc::clone(feed));
        }
        let feed = self.create(url)?;
        tracing::debug!("Opened package source {url}");
        feeds.insert(url.clone(), Arc::clone(&feed));
        Ok(feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> FeedFactory {
        FeedFactory::new(PathBuf::from("/tmp/pkgwalk-downloads"), HttpSettings::default())
    }

    #[test]
    fn reuses_feeds_per_url() {
        let factory = factory();
        let url = Url::parse("file:///srv/feed/").unwrap();
        let a = factory.open(&url).unwrap();
        let b = factory.open(&url).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn http_feeds_get_their_own_download_dir() {
        let factory = factory();
        let url = Url::parse("https://api.nuget.org/v3/index.json").unwrap();
        let feed = factory.open(&url).unwrap();
        assert_eq!(feed.uri(), &url);
        assert_eq!(
            factory.download_dir(&url),
            PathBuf::from("/tmp/pkgwalk-downloads/https_api.nuget.org_443_v3_index.json")
        );
    }

    #[test]
    fn scheme_and_port_separate_download_dirs() {
        let factory = factory();
        let dirs: Vec<PathBuf> = [
            "http://127.0.0.1:8080/v3/index.json",
            "http://127.0.0.1:8081/v3/index.json",
            "https://127.0.0.1:8080/v3/index.json",
        ]
        .iter()
        .map(|u| factory.download_dir(&Url::parse(u).unwrap()))
        .collect();
        assert_ne!(dirs[0], dirs[1]);
        assert_ne!(dirs[0], dirs[2]);
    }

    #[test]
    fn unknown_scheme_is_invalid() {
        let err = factory()
            .open(&Url::parse("ftp://example.com/feed").unwrap())
            .err()
            .unwrap();
        assert!(matches!(err, PkgError::InvalidSource { .. }));
    }
}
