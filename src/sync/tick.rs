// src/sync/tick.rs

//! One reconciliation cycle: read engine counters, derive fields, merge.

use crate::engine::TorrentHandle;

use super::activity;
use super::registry::SessionRecord;
use super::status::LifecycleStatus;
use super::types::{LiveMetrics, SessionFile};

/// Seconds until done, or `f64::INFINITY` when there is no meaningful
/// estimate (paused, stalled, or nothing left while not done).
pub fn time_remaining(length: u64, downloaded: u64, download_speed: f64, done: bool, paused: bool) -> f64 {
    if paused {
        return f64::INFINITY;
    }
    let remaining = i128::from(length) - i128::from(downloaded);
    if download_speed <= 0.0 || !download_speed.is_finite() || (remaining <= 0 && !done) {
        return f64::INFINITY;
    }
    remaining.max(0) as f64 / download_speed
}

pub fn read_metrics(handle: &dyn TorrentHandle, length: u64, paused: bool) -> LiveMetrics {
    let download_speed = handle.download_speed();
    let downloaded = handle.downloaded();
    let done = handle.done();
    LiveMetrics {
        progress: handle.progress(),
        download_speed,
        upload_speed: handle.upload_speed(),
        downloaded,
        uploaded: handle.uploaded(),
        num_peers: handle.num_peers(),
        time_remaining: time_remaining(length, downloaded, download_speed, done, paused),
        ready: handle.ready(),
        done,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// `done` flipped to true on this tick.
    Completed,
}

/// Merge one tick into `record`. Static fields (name, length, file names)
/// are kept; only live fields are overwritten.
pub fn apply_tick(record: &mut SessionRecord) -> TickOutcome {
    let state = &mut record.state;
    let was_done = state.metrics.done;
    let metrics = read_metrics(record.handle.as_ref(), state.length, state.is_paused());

    let files = record.handle.files();
    if files.len() == state.files.len() {
        for (current, live) in state.files.iter_mut().zip(files) {
            current.progress = live.progress;
            current.downloaded = live.downloaded;
        }
    } else if !files.is_empty() {
        state.files = files.into_iter().map(SessionFile::from).collect();
    }

    state.tracker_activity = activity::estimate(&record.split, metrics.num_peers);
    let newly_done = metrics.done && !was_done;
    state.metrics = metrics;

    if newly_done {
        state.status = LifecycleStatus::Completed;
        state.pause_mode = None;
        TickOutcome::Completed
    } else {
        TickOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_remaining() {
        assert_eq!(time_remaining(1000, 500, 100.0, false, false), 5.0);
        assert_eq!(time_remaining(1000, 500, 0.0, false, false), f64::INFINITY);
        assert_eq!(time_remaining(1000, 500, 100.0, false, true), f64::INFINITY);
        assert_eq!(time_remaining(1000, 1000, 100.0, false, false), f64::INFINITY);
        assert_eq!(time_remaining(1000, 1200, 100.0, true, false), 0.0);
        assert_eq!(time_remaining(1000, 1000, 0.0, true, false), f64::INFINITY);
    }
}
