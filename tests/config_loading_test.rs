// tests/config_loading_test.rs

use std::path::PathBuf;
use std::sync::Arc;

use swarmsync::config::{load_config, save_config, AppConfig, DEFAULT_HTTPS_SOURCE};
use swarmsync::engine::RateLimit;
use swarmsync::trackers::{HttpFetcher, TrackerCache, TrackerSource};
use tempfile::tempdir;

// Helper to create a temporary config file
fn create_temp_config(dir: &tempfile::TempDir, content: &str) -> std::io::Result<PathBuf> {
    let config_dir = dir.path().join(".config").join("swarmsync"); // Mimic structure
    std::fs::create_dir_all(&config_dir)?;
    let config_path = config_dir.join("config.toml");
    std::fs::write(&config_path, content)?;
    Ok(config_path)
}

#[test]
fn test_load_valid_config_integration() {
    let dir = tempdir().unwrap();
    let config_content = r#"
[trackers]
https_source = "https://lists.example/https.txt"
cache_ttl_secs = 600

[sync]
max_download_speed = 2048
tick_interval_ms = 250
boost_by_default = true
"#;
    let config_path = create_temp_config(&dir, config_content).unwrap();

    let loaded = load_config(&config_path).unwrap();
    assert_eq!(loaded.trackers.https_source, "https://lists.example/https.txt");
    assert_eq!(loaded.trackers.cache_ttl().as_secs(), 600);
    // Untouched keys keep their defaults
    assert_eq!(loaded.trackers.fallback_ttl_secs, 1800);
    assert_eq!(loaded.sync.download_limit(), RateLimit::BytesPerSec(2048 * 1024));
    assert_eq!(loaded.sync.upload_limit(), RateLimit::Unlimited);
    assert_eq!(loaded.sync.tick_interval().as_millis(), 250);
    assert!(loaded.sync.boost_by_default);
}

#[test]
fn test_round_trip_through_disk() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    let mut config = AppConfig::default();
    config.sync.max_upload_speed = Some(64);
    config.trackers.request_timeout_secs = 3;
    save_config(&config, &config_path).unwrap();

    assert_eq!(load_config(&config_path).unwrap(), config);
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let loaded = load_config(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(loaded, AppConfig::default());
    assert_eq!(loaded.trackers.https_source, DEFAULT_HTTPS_SOURCE);
}

#[tokio::test]
async fn test_sources_follow_the_loaded_config() {
    let dir = tempdir().unwrap();
    let config_path = create_temp_config(
        &dir,
        "[trackers]\nws_source = \"https://lists.example/ws.txt\"\n",
    )
    .unwrap();
    let loaded = load_config(&config_path).unwrap();

    let sources = TrackerSource::from_config(&loaded.trackers);
    assert_eq!(sources.len(), 3);
    assert_eq!(sources[1].url, "https://lists.example/ws.txt");

    // Building a cache from the loaded config does not fetch anything yet
    let cache = TrackerCache::new(&loaded.trackers, Arc::new(HttpFetcher::new().unwrap()));
    assert!(!cache.stats().await.cached);
}
