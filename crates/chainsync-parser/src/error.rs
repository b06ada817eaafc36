//! Error types for block parsing and command execution.

use chainsync_core::types::Height;
use chainsync_core::SyncError;
use thiserror::Error;

/// Errors raised while turning raw chain data into commands.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("Block {height}: {reason}")]
    Block { height: Height, reason: String },

    #[error("Genesis section '{section}': {reason}")]
    Genesis { section: String, reason: String },

    #[error("Unknown message type {type_url} in tx {tx_hash} at height {height}")]
    UnknownMessage {
        height: Height,
        tx_hash: String,
        type_url: String,
    },

    #[error("Invalid base64 event attribute at height {height}: {reason}")]
    Base64 { height: Height, reason: String },
}

impl ParseError {
    pub fn into_sync_error(self, height: Height) -> SyncError {
        SyncError::Parse {
            height,
            reason: self.to_string(),
        }
    }
}

/// A command failed to produce its event.
///
/// Carries the command name and version so failures can be attributed
/// precisely in logs.
#[derive(Debug, Clone, Error)]
#[error("{name} v{version}: {reason}")]
pub struct CommandError {
    pub name: String,
    pub version: u32,
    pub reason: String,
}

impl CommandError {
    pub fn new(name: impl Into<String>, version: u32, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version,
            reason: reason.into(),
        }
    }

    pub fn into_sync_error(self, height: Height) -> SyncError {
        SyncError::Command {
            height,
            name: self.name,
            version: self.version,
            reason: self.reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_keeps_attribution() {
        let err = CommandError::new("CreateMsgSend", 1, "missing field `amount`");
        assert_eq!(err.to_string(), "CreateMsgSend v1: missing field `amount`");
        match err.into_sync_error(12) {
            SyncError::Command { height, name, version, .. } => {
                assert_eq!((height, name.as_str(), version), (12, "CreateMsgSend", 1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
