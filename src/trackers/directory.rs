// src/trackers/directory.rs

//! The tiered endpoint set produced by one directory build.

use std::collections::HashSet;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::time::Instant;

use super::parse::{Scheme, Tier, TrackerRecord};

const FALLBACK_HTTPS: &[&str] = &[
    "https://tracker.opentrackr.org:443/announce",
    "https://open.tracker.cl:443/announce",
    "https://tracker.tamersunion.org:443/announce",
    "https://opentracker.i2p.rocks:443/announce",
    "https://tracker.gbitt.info:443/announce",
    "https://1337.abcvg.info:443/announce",
    "https://explodie.org:6969/announce",
    "https://tracker.torrent.eu.org:443/announce",
    "https://tracker.moeking.me:443/announce",
    "https://tracker.srv00.com:443/announce",
];

const FALLBACK_WSS: &[&str] = &[
    "wss://tracker.openwebtorrent.com",
    "wss://tracker.btorrent.xyz",
    "wss://tracker.fastcast.nz",
    "wss://tracker.webtorrent.dev",
    "wss://tracker.files.fm:7073/announce",
];

const FALLBACK_HTTP: &[&str] = &[
    "http://tracker.opentrackr.org:1337/announce",
    "http://open.tracker.cl:1337/announce",
    "http://tracker.openbittorrent.com:80/announce",
    "http://tracker.gbitt.info:80/announce",
    "http://explodie.org:6969/announce",
];

const FALLBACK_WS: &[&str] = &[
    "ws://tracker.openwebtorrent.com",
    "ws://tracker.btorrent.xyz",
    "ws://tracker.fastcast.nz",
];

/// Built-in endpoints used when a bucket comes back empty.
pub fn fallback_list(scheme: Scheme) -> &'static [&'static str] {
    match scheme {
        Scheme::Https => FALLBACK_HTTPS,
        Scheme::Wss => FALLBACK_WSS,
        Scheme::Http => FALLBACK_HTTP,
        Scheme::Ws => FALLBACK_WS,
    }
}

fn fallback_records(scheme: Scheme) -> Vec<TrackerRecord> {
    fallback_list(scheme)
        .iter()
        .filter_map(|url| TrackerRecord::parse(url))
        .collect()
}

/// Which part of the directory a caller wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierSelector {
    Safe,
    All,
}

impl TierSelector {
    pub fn from_include_unsafe(include_unsafe: bool) -> Self {
        if include_unsafe {
            TierSelector::All
        } else {
            TierSelector::Safe
        }
    }

    pub fn includes(self, tier: Tier) -> bool {
        match self {
            TierSelector::All => true,
            TierSelector::Safe => tier == Tier::Safe,
        }
    }
}

/// Cached, tiered endpoint set. Immutable once built.
#[derive(Debug, Clone)]
pub struct TrackerDirectory {
    wss: Vec<TrackerRecord>,
    https: Vec<TrackerRecord>,
    ws: Vec<TrackerRecord>,
    http: Vec<TrackerRecord>,
    fetched_at: Instant,
    fetched_at_wall: SystemTime,
    ttl: Duration,
    from_fallback: bool,
}

impl TrackerDirectory {
    /// Build from records already classified by the fetch step.
    ///
    /// Duplicates are removed across buckets in security order, then every
    /// empty bucket is filled from the built-in list. When nothing at all was
    /// supplied the directory is marked as fallback and gets `fallback_ttl`.
    pub fn build(records: Vec<TrackerRecord>, ttl: Duration, fallback_ttl: Duration) -> Self {
        let from_fallback = records.is_empty();
        let mut seen: HashSet<String> = HashSet::new();
        let mut buckets: [Vec<TrackerRecord>; 4] = Default::default();

        for (slot, scheme) in Scheme::ALL.iter().enumerate() {
            for record in records.iter().filter(|r| r.scheme() == *scheme) {
                if seen.insert(record.url().to_string()) {
                    buckets[slot].push(record.clone());
                }
            }
        }

        for (slot, scheme) in Scheme::ALL.iter().enumerate() {
            if buckets[slot].is_empty() {
                log::info!("Trackers: using fallback {} trackers", scheme);
                buckets[slot] = fallback_records(*scheme)
                    .into_iter()
                    .filter(|r| seen.insert(r.url().to_string()))
                    .collect();
            }
        }

        let [wss, https, ws, http] = buckets;
        Self {
            wss,
            https,
            ws,
            http,
            fetched_at: Instant::now(),
            fetched_at_wall: SystemTime::now(),
            ttl: if from_fallback { fallback_ttl } else { ttl },
            from_fallback,
        }
    }

    pub fn bucket(&self, scheme: Scheme) -> &[TrackerRecord] {
        match scheme {
            Scheme::Wss => &self.wss,
            Scheme::Https => &self.https,
            Scheme::Ws => &self.ws,
            Scheme::Http => &self.http,
        }
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < self.ttl
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    /// True when every source failed and the directory is all built-in data.
    pub fn from_fallback(&self) -> bool {
        self.from_fallback
    }

    /// wss, https, then (if selected) ws, http.
    pub fn flatten(&self, selector: TierSelector) -> Vec<String> {
        Scheme::ALL
            .iter()
            .filter(|scheme| selector.includes(scheme.tier()))
            .flat_map(|scheme| self.bucket(*scheme).iter().map(|r| r.url().to_string()))
            .collect()
    }

    pub fn stats(&self, now: Instant) -> TrackerStats {
        let https_count = self.https.len();
        let wss_count = self.wss.len();
        let http_count = self.http.len();
        let ws_count = self.ws.len();
        let safe_count = https_count + wss_count;
        let unsafe_count = http_count + ws_count;
        TrackerStats {
            cached: self.is_fresh(now),
            last_fetched: Some(self.fetched_at_wall),
            from_fallback: self.from_fallback,
            https_count,
            wss_count,
            http_count,
            ws_count,
            total_count: safe_count + unsafe_count,
            safe_count,
            unsafe_count,
        }
    }
}

/// Counts of a cached directory, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct TrackerStats {
    pub cached: bool,
    pub last_fetched: Option<SystemTime>,
    pub from_fallback: bool,
    pub https_count: usize,
    pub wss_count: usize,
    pub http_count: usize,
    pub ws_count: usize,
    pub total_count: usize,
    pub safe_count: usize,
    pub unsafe_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(url: &str) -> TrackerRecord {
        TrackerRecord::parse(url).unwrap()
    }

    #[tokio::test]
    async fn test_empty_build_is_all_fallback() {
        let dir = TrackerDirectory::build(
            Vec::new(),
            Duration::from_secs(100),
            Duration::from_secs(10),
        );
        assert!(dir.from_fallback());
        assert_eq!(dir.ttl(), Duration::from_secs(10));
        for scheme in Scheme::ALL {
            assert!(!dir.bucket(scheme).is_empty(), "{} bucket empty", scheme);
            assert_eq!(dir.bucket(scheme).len(), fallback_list(scheme).len());
        }
    }

    #[tokio::test]
    async fn test_only_empty_buckets_are_filled() {
        let dir = TrackerDirectory::build(
            vec![rec("wss://one.example"), rec("https://two.example/announce")],
            Duration::from_secs(100),
            Duration::from_secs(10),
        );
        assert!(!dir.from_fallback());
        assert_eq!(dir.ttl(), Duration::from_secs(100));
        assert_eq!(dir.bucket(Scheme::Wss).len(), 1);
        assert_eq!(dir.bucket(Scheme::Https).len(), 1);
        assert_eq!(dir.bucket(Scheme::Ws).len(), FALLBACK_WS.len());
        assert_eq!(dir.bucket(Scheme::Http).len(), FALLBACK_HTTP.len());
    }

    #[tokio::test]
    async fn test_duplicates_across_sources_collapse() {
        let dir = TrackerDirectory::build(
            vec![
                rec("wss://one.example"),
                rec("wss://one.example"),
                rec("https://two.example/announce"),
                rec("https://two.example/announce"),
            ],
            Duration::from_secs(100),
            Duration::from_secs(10),
        );
        let flat = dir.flatten(TierSelector::All);
        let unique: HashSet<&String> = flat.iter().collect();
        assert_eq!(flat.len(), unique.len());
    }

    #[tokio::test]
    async fn test_flatten_order_and_selector() {
        let dir = TrackerDirectory::build(
            vec![
                rec("http://d.example/announce"),
                rec("ws://c.example"),
                rec("https://b.example/announce"),
                rec("wss://a.example"),
            ],
            Duration::from_secs(100),
            Duration::from_secs(10),
        );
        assert_eq!(
            dir.flatten(TierSelector::Safe),
            vec!["wss://a.example", "https://b.example/announce"]
        );
        assert_eq!(
            dir.flatten(TierSelector::All),
            vec![
                "wss://a.example",
                "https://b.example/announce",
                "ws://c.example",
                "http://d.example/announce",
            ]
        );
    }

    #[tokio::test]
    async fn test_stats_counts() {
        let dir = TrackerDirectory::build(
            vec![rec("wss://a.example"), rec("wss://b.example")],
            Duration::from_secs(100),
            Duration::from_secs(10),
        );
        let stats = dir.stats(Instant::now());
        assert!(stats.cached);
        assert_eq!(stats.wss_count, 2);
        assert_eq!(stats.https_count, FALLBACK_HTTPS.len());
        assert_eq!(stats.safe_count, 2 + FALLBACK_HTTPS.len());
        assert_eq!(stats.unsafe_count, FALLBACK_HTTP.len() + FALLBACK_WS.len());
        assert_eq!(stats.total_count, stats.safe_count + stats.unsafe_count);
    }
}
