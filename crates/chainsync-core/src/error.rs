//! Error types for the sync pipeline.

use thiserror::Error;

use crate::types::Height;

/// Errors that abort a sync attempt.
///
/// Every variant propagates up to the sync manager's retry loop, which logs
/// it and schedules another attempt after backoff.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Failed to fetch height {height}: {reason}")]
    Fetch { height: Height, reason: String },

    #[error("Failed to parse height {height}: {reason}")]
    Parse { height: Height, reason: String },

    #[error("Command {name} v{version} failed at height {height}: {reason}")]
    Command {
        height: Height,
        name: String,
        version: u32,
        reason: String,
    },

    #[error("Handler error in '{handler}': {reason}")]
    Handler { handler: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// The height the error is attributed to, if any.
    pub fn height(&self) -> Option<Height> {
        match self {
            Self::Fetch { height, .. } | Self::Parse { height, .. } | Self::Command { height, .. } => {
                Some(*height)
            }
            _ => None,
        }
    }

    /// Returns `true` for errors that retrying cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_attribution() {
        let err = SyncError::Fetch {
            height: 42,
            reason: "timeout".into(),
        };
        assert_eq!(err.height(), Some(42));
        assert_eq!(SyncError::Rpc("boom".into()).height(), None);
    }

    #[test]
    fn only_config_errors_are_fatal() {
        assert!(SyncError::Config("window_size must be > 0".into()).is_fatal());
        assert!(!SyncError::Storage("locked".into()).is_fatal());
    }
}
