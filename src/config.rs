// src/config.rs

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{RateLimit, Strategy};

pub const DEFAULT_HTTPS_SOURCE: &str =
    "https://cdn.jsdelivr.net/gh/ngosang/trackerslist@master/trackers_all_https.txt";
pub const DEFAULT_WS_SOURCE: &str =
    "https://cdn.jsdelivr.net/gh/ngosang/trackerslist@master/trackers_all_ws.txt";
pub const DEFAULT_HTTP_SOURCE: &str =
    "https://cdn.jsdelivr.net/gh/ngosang/trackerslist@master/trackers_all_http.txt";

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub trackers: TrackerConfig,
    pub sync: SyncConfig,
}

/// Where tracker lists come from and how long a built directory stays fresh.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    pub https_source: String,
    pub ws_source: String,
    pub http_source: String,
    pub cache_ttl_secs: u64,
    /// TTL used when every source failed and the directory is all fallback.
    pub fallback_ttl_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            https_source: DEFAULT_HTTPS_SOURCE.to_string(),
            ws_source: DEFAULT_WS_SOURCE.to_string(),
            http_source: DEFAULT_HTTP_SOURCE.to_string(),
            cache_ttl_secs: 6 * 60 * 60,
            fallback_ttl_secs: 30 * 60,
            request_timeout_secs: 10,
        }
    }
}

impl TrackerConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fallback_ttl(&self) -> Duration {
        Duration::from_secs(self.fallback_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Session synchronizer settings. Speeds are KiB/s, `None` meaning unlimited.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    pub max_download_speed: Option<u64>,
    pub max_upload_speed: Option<u64>,
    pub metadata_timeout_secs: u64,
    pub tick_interval_ms: u64,
    pub boost_by_default: bool,
    /// Piece selection handed to the engine with every new source.
    pub strategy: Strategy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_download_speed: None,
            max_upload_speed: None,
            metadata_timeout_secs: 120,
            tick_interval_ms: 1000,
            boost_by_default: false,
            strategy: Strategy::Sequential,
        }
    }
}

impl SyncConfig {
    pub fn download_limit(&self) -> RateLimit {
        RateLimit::from_kib(self.max_download_speed)
    }

    pub fn upload_limit(&self) -> RateLimit {
        RateLimit::from_kib(self.max_upload_speed)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

const CONFIG_FILE_NAME: &str = "config.toml";

/// `config.toml` in the platform config dir; the dir is created if needed.
pub fn get_config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "SwarmSync", "SwarmSync")
        .context("No home directory to place the config in")?;
    let dir = dirs.config_dir();
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create config dir: {}", dir.display()))?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Parse config text. Every section and key is optional.
pub fn parse_config(text: &str) -> Result<AppConfig> {
    Ok(toml::from_str(text)?)
}

/// A missing file is not an error: it yields the defaults.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    match fs::read_to_string(path) {
        Ok(text) => parse_config(&text)
            .with_context(|| format!("Invalid config file: {}", path.display())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("Config: {} not found, using defaults", path.display());
            Ok(AppConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read config file: {}", path.display())),
    }
}

pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
    }
    let text = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, text)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}
