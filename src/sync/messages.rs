// src/sync/messages.rs

//! Events pushed from the session manager to its observer.

use tokio::sync::mpsc;

use crate::error::SessionError;

use super::types::SessionState;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Full current state, once per tick.
    Snapshot(SessionState),
    /// `done` was observed; ticking has stopped.
    Completed(SessionState),
    /// Explicitly deleted.
    Removed { id: String },
    /// Terminal failure. `id` is `None` when the failure happened before
    /// metadata, i.e. before the session had an identity.
    Error { id: Option<String>, error: SessionError },
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Send to the observer; a gone observer is logged, not fatal.
pub fn send_session_event(tx: &EventSender, event: SessionEvent) {
    if tx.send(event).is_err() {
        log::debug!("Sync: observer dropped, event discarded");
    }
}
