// src/sync/throttle.rs

//! Simulated pause through the engine's global throughput caps.
//!
//! The engine has no per-session pause, so pausing swaps the engine-wide caps
//! for a tiny positive limit. Pausing one session therefore slows every
//! session. The engine stays clamped exactly while at least one session is
//! paused; the caps in effect before the first pause are kept aside and put
//! back when the last paused session is released.

use std::collections::HashSet;

use crate::engine::{Engine, RateLimit};

/// Cap applied while paused. Positive so peer connections stay open.
pub const PAUSED_RATE: RateLimit = RateLimit::BytesPerSec(1024);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caps {
    pub download: RateLimit,
    pub upload: RateLimit,
}

impl Caps {
    pub const PAUSED: Caps = Caps {
        download: PAUSED_RATE,
        upload: PAUSED_RATE,
    };
}

/// Caps currently applied to the engine, plus who is holding it clamped.
#[derive(Debug)]
pub struct ThrottleState {
    configured: Caps,
    current: Caps,
    /// Caps to restore once nobody is paused. `Some` iff `paused` is non-empty.
    pre_pause: Option<Caps>,
    paused: HashSet<String>,
}

impl ThrottleState {
    pub fn new(configured: Caps) -> Self {
        Self {
            configured,
            current: configured,
            pre_pause: None,
            paused: HashSet::new(),
        }
    }

    pub fn current(&self) -> Caps {
        self.current
    }

    pub fn configured(&self) -> Caps {
        self.configured
    }

    pub fn is_clamped(&self) -> bool {
        !self.paused.is_empty()
    }

    /// Replace the user-configured caps. While clamped they become the caps
    /// restored on release; otherwise they are applied right away.
    pub fn set_configured(&mut self, engine: &dyn Engine, caps: Caps) {
        self.configured = caps;
        if self.is_clamped() {
            self.pre_pause = Some(caps);
        } else {
            self.apply(engine, caps);
        }
    }

    fn apply(&mut self, engine: &dyn Engine, caps: Caps) {
        engine.throttle_download(caps.download);
        engine.throttle_upload(caps.upload);
        self.current = caps;
    }

    /// Clamp the engine on behalf of `id`. Only the first pause remembers
    /// what was in effect; later ones join the existing clamp.
    pub fn pause(&mut self, engine: &dyn Engine, id: &str) {
        if !self.paused.insert(id.to_string()) {
            return;
        }
        if self.pre_pause.is_none() {
            self.pre_pause = Some(self.current);
            self.apply(engine, Caps::PAUSED);
        }
    }

    /// Drop `id`'s hold on the clamp (resume, completion, delete, error).
    /// Returns the caps now in effect.
    pub fn release(&mut self, engine: &dyn Engine, id: &str) -> Caps {
        if self.paused.remove(id) && self.paused.is_empty() {
            let caps = self.pre_pause.take().unwrap_or(self.configured);
            self.apply(engine, caps);
        }
        self.current
    }

    /// Forget every hold without touching the engine. Used at teardown.
    pub fn clear(&mut self) {
        self.paused.clear();
        self.pre_pause = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AddOptions, Added, Source, TorrentHandle};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingEngine {
        applied: Mutex<Vec<(RateLimit, RateLimit)>>,
        last_download: Mutex<Option<RateLimit>>,
    }

    impl Engine for RecordingEngine {
        fn add(&self, _source: Source, _options: AddOptions) -> Result<Added, String> {
            Err("not used".to_string())
        }

        fn throttle_download(&self, rate: RateLimit) {
            *self.last_download.lock() = Some(rate);
        }

        fn throttle_upload(&self, rate: RateLimit) {
            let download = self.last_download.lock().unwrap_or(RateLimit::Unlimited);
            self.applied.lock().push((download, rate));
        }

        fn remove(&self, _handle: &dyn TorrentHandle) {}
    }

    fn configured() -> Caps {
        Caps {
            download: RateLimit::BytesPerSec(500_000),
            upload: RateLimit::BytesPerSec(100_000),
        }
    }

    #[test]
    fn test_pause_release_round_trip() {
        let engine = RecordingEngine::default();
        let mut state = ThrottleState::new(configured());

        state.pause(&engine, "a");
        assert_eq!(state.current(), Caps::PAUSED);
        assert!(state.is_clamped());

        assert_eq!(state.release(&engine, "a"), configured());
        assert!(!state.is_clamped());

        let applied = engine.applied.lock().clone();
        assert_eq!(
            applied,
            vec![
                (PAUSED_RATE, PAUSED_RATE),
                (RateLimit::BytesPerSec(500_000), RateLimit::BytesPerSec(100_000)),
            ]
        );
    }

    #[test]
    fn test_clamp_holds_until_last_release() {
        let engine = RecordingEngine::default();
        let mut state = ThrottleState::new(configured());

        state.pause(&engine, "a");
        state.pause(&engine, "b");
        state.pause(&engine, "b");
        assert_eq!(state.release(&engine, "a"), Caps::PAUSED);
        assert_eq!(state.release(&engine, "b"), configured());
        // Only one clamp and one restore reached the engine
        assert_eq!(engine.applied.lock().len(), 2);
    }

    #[test]
    fn test_release_of_unpaused_id_is_a_noop() {
        let engine = RecordingEngine::default();
        let mut state = ThrottleState::new(configured());
        state.pause(&engine, "a");
        assert_eq!(state.release(&engine, "other"), Caps::PAUSED);
        assert!(state.is_clamped());
    }

    #[test]
    fn test_configured_change_while_clamped_applies_on_release() {
        let engine = RecordingEngine::default();
        let mut state = ThrottleState::new(configured());
        let updated = Caps {
            download: RateLimit::Unlimited,
            upload: RateLimit::BytesPerSec(42),
        };

        state.pause(&engine, "a");
        state.set_configured(&engine, updated);
        assert_eq!(state.current(), Caps::PAUSED);
        assert_eq!(state.release(&engine, "a"), updated);

        state.set_configured(&engine, configured());
        assert_eq!(state.current(), configured());
    }

    #[test]
    fn test_paused_rate_is_positive() {
        assert!(matches!(PAUSED_RATE, RateLimit::BytesPerSec(n) if n > 0));
    }
}
