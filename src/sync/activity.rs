// src/sync/activity.rs

//! Peer-count driven estimate of how many trackers are "active".
//!
//! This is not a liveness check: no tracker is ever contacted to build it.
//! It exists for display only and nothing should branch on it.

use std::collections::HashSet;
use std::time::SystemTime;

use serde::Serialize;

/// Peers assumed per responding tracker.
const PEERS_PER_TRACKER: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct TrackerGroup {
    pub total: usize,
    pub active: usize,
    pub trackers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerActivity {
    /// Endpoints supplied by the tracker directory.
    pub external: TrackerGroup,
    /// Endpoints the source or engine already carried.
    pub internal: TrackerGroup,
    pub total_active: usize,
    pub last_updated: SystemTime,
}

/// Announce endpoints of a session split by origin.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackerSplit {
    pub external: Vec<String>,
    pub internal: Vec<String>,
}

impl TrackerSplit {
    pub fn from_announce(announce: &[String], directory: &HashSet<String>) -> Self {
        let (external, internal) = announce
            .iter()
            .cloned()
            .partition(|endpoint| directory.contains(endpoint));
        Self { external, internal }
    }
}

/// Split `ceil(num_peers / 5)` proportionally across the two groups.
pub fn estimate(split: &TrackerSplit, num_peers: u32) -> TrackerActivity {
    let external_total = split.external.len();
    let internal_total = split.internal.len();
    let total = external_total + internal_total;
    let cap = num_peers.div_ceil(PEERS_PER_TRACKER) as usize;

    let (external_active, internal_active) = if total == 0 {
        (0, 0)
    } else {
        let external_share = (cap * external_total).div_ceil(total);
        let external_active = external_share.min(external_total);
        let internal_active = cap.saturating_sub(external_active).min(internal_total);
        (external_active, internal_active)
    };

    TrackerActivity {
        external: TrackerGroup {
            total: external_total,
            active: external_active,
            trackers: split.external.clone(),
        },
        internal: TrackerGroup {
            total: internal_total,
            active: internal_active,
            trackers: split.internal.clone(),
        },
        total_active: external_active + internal_active,
        last_updated: SystemTime::now(),
    }
}
