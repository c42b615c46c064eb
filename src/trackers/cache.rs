// src/trackers/cache.rs

//! Process-wide tracker directory service.
//!
//! Built once at startup and shared by `Arc`. Every failure mode degrades to
//! built-in fallback data; no operation here returns an error.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::config::TrackerConfig;
use crate::engine::TorrentHandle;

use super::directory::{TierSelector, TrackerDirectory, TrackerStats};
use super::fetcher::TrackerFetcher;
use super::magnet;
use super::parse::{parse_records, Scheme, TrackerRecord};

/// One remote list and the schemes it is trusted to contribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSource {
    pub url: String,
    pub schemes: Vec<Scheme>,
}

impl TrackerSource {
    pub fn new(url: impl Into<String>, schemes: &[Scheme]) -> Self {
        Self {
            url: url.into(),
            schemes: schemes.to_vec(),
        }
    }

    /// The https, ws and http lists named in the config.
    pub fn from_config(config: &TrackerConfig) -> Vec<Self> {
        vec![
            Self::new(&config.https_source, &[Scheme::Https]),
            Self::new(&config.ws_source, &[Scheme::Wss, Scheme::Ws]),
            Self::new(&config.http_source, &[Scheme::Http]),
        ]
    }
}

/// Directory view restricted to a tier selector.
#[derive(Debug, Clone)]
pub struct TrackerSlice {
    directory: Arc<TrackerDirectory>,
    selector: TierSelector,
}

impl TrackerSlice {
    pub fn directory(&self) -> &Arc<TrackerDirectory> {
        &self.directory
    }

    pub fn selector(&self) -> TierSelector {
        self.selector
    }

    /// Endpoints of one scheme; empty for unsafe schemes under `Safe`.
    pub fn bucket(&self, scheme: Scheme) -> &[TrackerRecord] {
        if self.selector.includes(scheme.tier()) {
            self.directory.bucket(scheme)
        } else {
            &[]
        }
    }

    pub fn flatten(&self) -> Vec<String> {
        self.directory.flatten(self.selector)
    }
}

pub struct TrackerCache {
    fetcher: Arc<dyn TrackerFetcher>,
    sources: Vec<TrackerSource>,
    ttl: Duration,
    fallback_ttl: Duration,
    request_timeout: Duration,
    current: Mutex<Option<Arc<TrackerDirectory>>>,
}

impl TrackerCache {
    pub fn new(config: &TrackerConfig, fetcher: Arc<dyn TrackerFetcher>) -> Self {
        Self::with_sources(config, TrackerSource::from_config(config), fetcher)
    }

    pub fn with_sources(
        config: &TrackerConfig,
        sources: Vec<TrackerSource>,
        fetcher: Arc<dyn TrackerFetcher>,
    ) -> Self {
        Self {
            fetcher,
            sources,
            ttl: config.cache_ttl(),
            fallback_ttl: config.fallback_ttl(),
            request_timeout: config.request_timeout(),
            current: Mutex::new(None),
        }
    }

    /// Cached directory if still fresh, otherwise a rebuilt one.
    ///
    /// The lock is held across the rebuild so concurrent callers share it.
    pub async fn get(&self, selector: TierSelector) -> TrackerSlice {
        let mut current = self.current.lock().await;
        if let Some(dir) = current.as_ref().filter(|dir| dir.is_fresh(Instant::now())) {
            log::debug!("Trackers: using cached directory");
            return TrackerSlice {
                directory: dir.clone(),
                selector,
            };
        }
        let directory = Arc::new(self.build().await);
        *current = Some(directory.clone());
        TrackerSlice {
            directory,
            selector,
        }
    }

    /// Rebuild regardless of TTL.
    pub async fn refresh(&self) -> Arc<TrackerDirectory> {
        let mut current = self.current.lock().await;
        let dir = Arc::new(self.build().await);
        *current = Some(dir.clone());
        dir
    }

    /// Drop the cached directory; the next `get` fetches again.
    pub async fn teardown(&self) {
        self.current.lock().await.take();
    }

    pub async fn flatten(&self, include_unsafe: bool) -> Vec<String> {
        self.get(TierSelector::from_include_unsafe(include_unsafe))
            .await
            .flatten()
    }

    /// Endpoints from `flatten` not already present in `existing`, in order.
    pub async fn missing_from(&self, existing: &HashSet<String>, include_unsafe: bool) -> Vec<String> {
        self.flatten(include_unsafe)
            .await
            .into_iter()
            .filter(|endpoint| !existing.contains(endpoint))
            .collect()
    }

    /// Append directory endpoints the locator does not already carry.
    /// Returns the input unchanged when there is nothing new or it cannot be
    /// parsed.
    pub async fn append_to_identifier(&self, identifier: &str, include_unsafe: bool) -> String {
        let Some(existing) = magnet::existing_trackers(identifier) else {
            log::warn!("Trackers: not appending to an invalid magnet locator");
            return identifier.to_string();
        };
        let new_trackers = self.missing_from(&existing, include_unsafe).await;
        if new_trackers.is_empty() {
            log::debug!("Trackers: all trackers already present in locator");
            return identifier.to_string();
        }
        log::info!(
            "Trackers: appended {} new trackers to locator ({})",
            new_trackers.len(),
            if include_unsafe { "including unsafe" } else { "safe only" }
        );
        magnet::append_trackers(identifier, &new_trackers)
    }

    /// Push directory endpoints into a live handle's announce list.
    /// Returns how many were actually added.
    pub async fn inject_into(&self, handle: &dyn TorrentHandle, include_unsafe: bool) -> usize {
        let existing: HashSet<String> = handle.announce().into_iter().collect();
        let new_trackers = self.missing_from(&existing, include_unsafe).await;
        if new_trackers.is_empty() {
            log::debug!("Trackers: no new trackers for {}", handle.name());
            return 0;
        }
        handle.add_announce(&new_trackers);
        if !handle.restart_discovery() {
            log::debug!("Trackers: engine offers no discovery restart hook");
        }
        log::info!(
            "Trackers: added {} trackers to {} ({})",
            new_trackers.len(),
            handle.name(),
            if include_unsafe { "including unsafe" } else { "safe only" }
        );
        new_trackers.len()
    }

    /// Counts of the cached directory; never triggers a fetch.
    pub async fn stats(&self) -> TrackerStats {
        match self.current.lock().await.as_ref() {
            Some(dir) => dir.stats(Instant::now()),
            None => TrackerStats::default(),
        }
    }

    async fn build(&self) -> TrackerDirectory {
        log::info!("Trackers: fetching {} tracker lists", self.sources.len());
        let payloads = self.fetch_all().await;

        let records: Vec<TrackerRecord> = self
            .sources
            .iter()
            .zip(payloads.iter())
            .flat_map(|(source, payload)| {
                let records = parse_records(payload, &source.schemes);
                log::debug!("Trackers: {} valid trackers from {}", records.len(), source.url);
                records
            })
            .collect();

        let directory = TrackerDirectory::build(records, self.ttl, self.fallback_ttl);
        if directory.from_fallback() {
            log::warn!(
                "Trackers: every source failed, caching fallback trackers for {:?}",
                directory.ttl()
            );
        } else {
            let stats = directory.stats(Instant::now());
            log::info!(
                "Trackers: cached {} safe and {} unsafe trackers",
                stats.safe_count,
                stats.unsafe_count
            );
        }
        directory
    }

    /// One payload per source, in source order. Failed sources yield "".
    async fn fetch_all(&self) -> Vec<String> {
        let mut set = JoinSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            let fetcher = self.fetcher.clone();
            let url = source.url.clone();
            let timeout = self.request_timeout;
            set.spawn(async move { (index, fetcher.fetch(&url, timeout).await) });
        }

        let mut payloads = vec![String::new(); self.sources.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(text))) => payloads[index] = text,
                Ok((_, Err(e))) => log::warn!("Trackers: {}", e),
                Err(e) => log::warn!("Trackers: fetch task failed: {}", e),
            }
        }
        payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MapFetcher {
        bodies: HashMap<String, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TrackerFetcher for MapFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bodies.get(url).cloned().ok_or_else(|| FetchError::Network {
                url: url.to_string(),
                reason: "HTTP 404".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_source_only_contributes_declared_schemes() {
        let config = TrackerConfig::default();
        let mut bodies = HashMap::new();
        bodies.insert(
            config.https_source.clone(),
            "https://a.example/announce\nwss://sneaky.example\n".to_string(),
        );
        let fetcher = Arc::new(MapFetcher {
            bodies,
            calls: AtomicUsize::new(0),
        });
        let cache = TrackerCache::new(&config, fetcher.clone());

        let slice = cache.get(TierSelector::Safe).await;
        assert_eq!(slice.bucket(Scheme::Https).len(), 1);
        assert!(slice
            .bucket(Scheme::Wss)
            .iter()
            .all(|r| r.url() != "wss://sneaky.example"));
        assert!(slice.bucket(Scheme::Http).is_empty());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stats_before_first_build() {
        let fetcher = Arc::new(MapFetcher {
            bodies: HashMap::new(),
            calls: AtomicUsize::new(0),
        });
        let cache = TrackerCache::new(&TrackerConfig::default(), fetcher.clone());
        let stats = cache.stats().await;
        assert!(!stats.cached);
        assert_eq!(stats.total_count, 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }
}
