// src/sync/mod.rs

// Live session synchronization over the engine
pub mod activity;
pub mod manager;
pub mod messages;
pub mod registry;
pub mod scheduler;
pub mod status;
pub mod throttle;
pub mod tick;
pub mod types;

pub use manager::SessionManager;
pub use messages::{EventSender, SessionEvent};
pub use status::{LifecycleStatus, PauseMode};
pub use throttle::{Caps, PAUSED_RATE};
pub use types::{FileKind, LiveMetrics, SessionFile, SessionState};
