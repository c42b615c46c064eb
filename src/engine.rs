// src/engine.rs

//! Narrow capability interface over the external P2P engine.
//!
//! The synchronizer only ever talks to these traits. The engine may mutate its
//! counters concurrently on its own threads; the core just polls them.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Content submitted to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A magnet locator with repeatable `tr` endpoint fields.
    Magnet(String),
    /// Raw bytes of a metainfo file.
    TorrentFile(Bytes),
}

/// Throughput cap in bytes per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateLimit {
    Unlimited,
    BytesPerSec(u64),
}

impl RateLimit {
    /// Build from a KiB/s setting where `None` means unlimited.
    pub fn from_kib(kib: Option<u64>) -> Self {
        match kib {
            Some(kib) => RateLimit::BytesPerSec(kib.saturating_mul(1024)),
            None => RateLimit::Unlimited,
        }
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimit::Unlimited => write!(f, "unlimited"),
            RateLimit::BytesPerSec(n) => write!(f, "{} B/s", n),
        }
    }
}

/// Piece selection strategy passed through to the engine untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Sequential,
    Rarest,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddOptions {
    pub announce: Vec<String>,
    pub strategy: Strategy,
}

/// Events a handle emits over its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Metadata,
    Ready,
    Error(String),
    Warning(String),
    Done,
    Peer(String),
    NoPeers(String),
}

/// Per-file view the engine exposes once metadata is known.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineFile {
    pub name: String,
    pub path: String,
    pub length: u64,
    pub progress: f64,
    pub downloaded: u64,
}

/// One content transfer inside the engine.
pub trait TorrentHandle: Send + Sync {
    fn info_hash(&self) -> String;
    fn name(&self) -> String;
    fn length(&self) -> u64;
    fn files(&self) -> Vec<EngineFile>;
    /// Fraction in `0.0..=1.0`.
    fn progress(&self) -> f64;
    /// Bytes per second.
    fn download_speed(&self) -> f64;
    /// Bytes per second.
    fn upload_speed(&self) -> f64;
    fn downloaded(&self) -> u64;
    fn uploaded(&self) -> u64;
    fn num_peers(&self) -> u32;
    fn done(&self) -> bool;
    fn ready(&self) -> bool;
    fn announce(&self) -> Vec<String>;
    fn add_announce(&self, endpoints: &[String]);

    /// Ask the handle to re-run tracker discovery. Returns `false` when the
    /// engine has no such hook.
    fn restart_discovery(&self) -> bool {
        false
    }
}

/// A freshly added transfer and the stream of its events.
pub struct Added {
    pub handle: Arc<dyn TorrentHandle>,
    pub events: mpsc::UnboundedReceiver<EngineEvent>,
}

/// The engine client. Throughput caps are engine-wide.
pub trait Engine: Send + Sync {
    fn add(&self, source: Source, options: AddOptions) -> Result<Added, String>;
    fn throttle_download(&self, rate: RateLimit);
    fn throttle_upload(&self, rate: RateLimit);
    fn remove(&self, handle: &dyn TorrentHandle);
    /// Release every engine resource. Called once at teardown.
    fn destroy(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_from_kib() {
        assert_eq!(RateLimit::from_kib(None), RateLimit::Unlimited);
        assert_eq!(RateLimit::from_kib(Some(2)), RateLimit::BytesPerSec(2048));
        assert_eq!(RateLimit::BytesPerSec(1024).to_string(), "1024 B/s");
        assert_eq!(RateLimit::Unlimited.to_string(), "unlimited");
    }
}
