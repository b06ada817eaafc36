//! Runtime state of the sync manager.

use serde::{Deserialize, Serialize};

/// Lifecycle of the sync manager.
///
/// ```text
/// Idle ──► Syncing ──► Idle            (success)
///             │
///             └──► Backoff ──► Syncing  (failure, retried forever)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// Waiting for a new height or the polling timer.
    Idle,
    /// A sync attempt is running.
    Syncing,
    /// The last attempt failed; waiting before the retry.
    Backoff,
    /// Shut down.
    Stopped,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Syncing => write!(f, "syncing"),
            Self::Backoff => write!(f, "backoff"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
