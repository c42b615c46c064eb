// src/error.rs

//! Error types shared by the tracker directory and the session synchronizer.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single tracker-list fetch.
///
/// Never escapes the directory cache: a failed source simply contributes no
/// endpoints for the current build.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} timed out after {timeout:?}")]
    TimedOut { url: String, timeout: Duration },
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },
}

/// Session-layer failures.
///
/// `MetadataTimeout` and `EngineFatal` are terminal for the session they
/// concern and are reported to the observer exactly once.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid locator: {0}")]
    InvalidLocator(String),
    #[error("no metadata received within {0:?}")]
    MetadataTimeout(Duration),
    #[error("engine error: {0}")]
    EngineFatal(String),
    #[error("engine rejected the source: {0}")]
    Engine(String),
    #[error("unknown session {0}")]
    UnknownSession(String),
    #[error("session {id} cannot {action} while {status}")]
    InvalidTransition {
        id: String,
        action: &'static str,
        status: crate::sync::status::LifecycleStatus,
    },
    #[error("session manager has shut down")]
    ShutDown,
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("a timer is already registered for {0}")]
    AlreadyRegistered(String),
}
