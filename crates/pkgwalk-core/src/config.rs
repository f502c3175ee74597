use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use pkgwalk_util::errors::{PkgError, PkgResult};

/// The public package feed, appended to every request's sources only when
/// `public-fallback` is enabled.
pub const PUBLIC_SOURCE_URL: &str = "https://api.nuget.org/v3/index.json";

/// Global user configuration loaded from `~/.pkgwalk/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

/// Fallback sources from `[sources]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Appended after each request's own sources.
    #[serde(default)]
    pub fallback: Vec<String>,
    #[serde(default, rename = "public-fallback")]
    pub public_fallback: bool,
}

/// Package cache configuration from `[cache]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> String {
    "~/.pkgwalk/packages".to_string()
}

/// HTTP client settings from `[http]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs", rename = "timeout-secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_retries() -> u32 {
    3
}

impl GlobalConfig {
    /// Load the global configuration from `~/.pkgwalk/config.toml`, or return defaults if the file doesn't exist.
    pub fn load() -> PkgResult<Self> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> PkgResult<Self> {
        if !path.is_file() {
            tracing::debug!("No global config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| PkgError::Config {
            message: format!("Failed to read global config: {e}"),
        })?;
        toml::from_str(&content).map_err(|e| PkgError::Config {
            message: format!("Failed to parse global config: {e}"),
        })
    }

    /// Returns the default path to the global config file.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// Fallback source strings, with the public feed last when enabled.
    pub fn fallback_sources(&self) -> Vec<String> {
        let mut sources = self.sources.fallback.clone();
        if self.sources.public_fallback {
            sources.push(PUBLIC_SOURCE_URL.to_string());
        }
        sources
    }

    /// The cache directory with `~` and environment references expanded.
    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(
            shellexpand::full(&self.cache.dir)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| self.cache.dir.clone()),
        )
    }
}

/// Returns the path to the pkgwalk data directory (`~/.pkgwalk/`).
pub fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".pkgwalk")
}
