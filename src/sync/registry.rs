// src/sync/registry.rs

//! Authoritative set of live sessions keyed by id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::TorrentHandle;

use super::activity::TrackerSplit;
use super::types::SessionState;

/// A session's observable state plus the engine handle it exclusively owns.
pub struct SessionRecord {
    pub state: SessionState,
    pub handle: Arc<dyn TorrentHandle>,
    pub split: TrackerSplit,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record. Returns `false` and leaves the map alone if the id
    /// is already present.
    pub fn insert(&self, record: SessionRecord) -> bool {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&record.state.id) {
            return false;
        }
        sessions.insert(record.state.id.clone(), record);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.lock().contains_key(id)
    }

    pub fn snapshot(&self, id: &str) -> Option<SessionState> {
        self.sessions.lock().get(id).map(|record| record.state.clone())
    }

    /// All sessions, ordered by name for stable display.
    pub fn snapshots(&self) -> Vec<SessionState> {
        let mut states: Vec<SessionState> = self
            .sessions
            .lock()
            .values()
            .map(|record| record.state.clone())
            .collect();
        states.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        states
    }

    pub fn handle(&self, id: &str) -> Option<Arc<dyn TorrentHandle>> {
        self.sessions.lock().get(id).map(|record| record.handle.clone())
    }

    /// Run `f` against the record under the lock. `None` if the id is gone.
    pub fn with_record<R>(&self, id: &str, f: impl FnOnce(&mut SessionRecord) -> R) -> Option<R> {
        self.sessions.lock().get_mut(id).map(f)
    }

    pub fn remove(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.lock().remove(id)
    }

    pub fn drain(&self) -> Vec<SessionRecord> {
        self.sessions.lock().drain().map(|(_, record)| record).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
