// src/sync/status.rs
// Lifecycle of one session as seen by observers.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum LifecycleStatus {
    #[default]
    Pending,
    Active,
    Paused,
    Completed,
    Error,
    Removed,
}

impl LifecycleStatus {
    /// Completed, Error and Removed accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LifecycleStatus::Completed | LifecycleStatus::Error | LifecycleStatus::Removed
        )
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleStatus::Pending => "pending",
            LifecycleStatus::Active => "active",
            LifecycleStatus::Paused => "paused",
            LifecycleStatus::Completed => "completed",
            LifecycleStatus::Error => "error",
            LifecycleStatus::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// How a paused session is actually held back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PauseMode {
    /// The engine only has engine-wide caps, so every session is slowed.
    GlobalThrottle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!LifecycleStatus::Pending.is_terminal());
        assert!(!LifecycleStatus::Active.is_terminal());
        assert!(!LifecycleStatus::Paused.is_terminal());
        assert!(LifecycleStatus::Completed.is_terminal());
        assert!(LifecycleStatus::Error.is_terminal());
        assert!(LifecycleStatus::Removed.is_terminal());
    }

    #[test]
    fn test_status_text() {
        assert_eq!(LifecycleStatus::Pending.to_string(), "pending");
        assert_eq!(LifecycleStatus::Paused.to_string(), "paused");
    }
}
