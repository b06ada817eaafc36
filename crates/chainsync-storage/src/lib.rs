//! chainsync-storage — durable [`EventHandler`] backends for ChainSync.
//!
//! Backends:
//! - `memory` — [`MemoryEventHandler`] from `chainsync-core` (no persistence)
//! - [`sqlite`] — SQLite via `sqlx` (single-file persistence)
//! - [`postgres`] — PostgreSQL via `sqlx`
//!
//! Every backend applies a height's events and advances its cursor in one
//! database transaction.

use std::str::FromStr;
use std::sync::Arc;

use chainsync_core::{EventHandler, MemoryEventHandler, SyncError};

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub use postgres::PostgresEventHandler;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteEventHandler;

/// Where committed events go, parsed from the `storage` config value.
///
/// Accepted forms: `memory`, `sqlite:<path>` (or `sqlite::memory:`),
/// `postgres://…` / `postgresql://…`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    Memory,
    Sqlite(String),
    Postgres(String),
}

impl FromStr for StorageTarget {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "memory" {
            Ok(Self::Memory)
        } else if let Some(path) = s.strip_prefix("sqlite:") {
            Ok(Self::Sqlite(path.to_string()))
        } else if s.starts_with("postgres://") || s.starts_with("postgresql://") {
            Ok(Self::Postgres(s.to_string()))
        } else {
            Err(SyncError::Config(format!("unsupported storage target '{s}'")))
        }
    }
}

/// Open the handler for `target`, creating its schema if needed.
pub async fn open_handler(
    target: &StorageTarget,
    handler_id: &str,
) -> Result<Arc<dyn EventHandler>, SyncError> {
    match target {
        StorageTarget::Memory => Ok(Arc::new(MemoryEventHandler::new(handler_id))),
        #[cfg(feature = "sqlite")]
        StorageTarget::Sqlite(path) => {
            let handler = if path == ":memory:" {
                SqliteEventHandler::in_memory(handler_id).await?
            } else {
                SqliteEventHandler::open(path, handler_id).await?
            };
            Ok(Arc::new(handler))
        }
        #[cfg(feature = "postgres")]
        StorageTarget::Postgres(url) => Ok(Arc::new(
            PostgresEventHandler::connect(url, handler_id).await?,
        )),
        #[allow(unreachable_patterns)]
        other => Err(SyncError::Config(format!(
            "storage backend {other:?} not compiled in"
        ))),
    }
}
