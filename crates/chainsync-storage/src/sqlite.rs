//! SQLite event handler.
//!
//! Persists committed events and the handler cursor to a single SQLite file.
//!
//! # Usage
//! ```rust,no_run
//! use chainsync_storage::sqlite::SqliteEventHandler;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let handler = SqliteEventHandler::open("./chainsync.db", "hub-indexer").await?;
//!
//! // In-memory (tests / ephemeral)
//! let handler = SqliteEventHandler::in_memory("hub-indexer").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use chainsync_core::handler::ensure_advances;
use chainsync_core::types::Height;
use chainsync_core::{Event, EventHandler, SyncError};

fn storage_err(e: impl std::fmt::Display) -> SyncError {
    SyncError::Storage(e.to_string())
}

fn to_i64(height: Height) -> Result<i64, SyncError> {
    i64::try_from(height).map_err(|_| SyncError::Storage(format!("height {height} out of range")))
}

/// SQLite-backed [`EventHandler`].
pub struct SqliteEventHandler {
    id: String,
    pool: SqlitePool,
}

impl SqliteEventHandler {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./chainsync.db"`) or a full
    /// SQLite URL (`"sqlite:./chainsync.db?mode=rwc"`).
    pub async fn open(path: &str, handler_id: &str) -> Result<Self, SyncError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        let handler = Self {
            id: handler_id.to_string(),
            pool,
        };
        handler.init_schema().await?;
        Ok(handler)
    }

    /// Open an in-memory database. All data is lost when the handler is dropped.
    pub async fn in_memory(handler_id: &str) -> Result<Self, SyncError> {
        // every connection to `:memory:` is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;
        let handler = Self {
            id: handler_id.to_string(),
            pool,
        };
        handler.init_schema().await?;
        Ok(handler)
    }

    async fn init_schema(&self) -> Result<(), SyncError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chainsync_events (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                handler_id TEXT    NOT NULL,
                height     INTEGER NOT NULL,
                seq        INTEGER NOT NULL,
                name       TEXT    NOT NULL,
                version    INTEGER NOT NULL,
                payload    TEXT    NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chainsync_events_height
             ON chainsync_events (handler_id, height, seq);",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chainsync_cursor (
                handler_id TEXT    PRIMARY KEY,
                height     INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    /// Events committed at `height`, in emission order.
    pub async fn events_at(&self, height: Height) -> Result<Vec<Event>, SyncError> {
        let rows = sqlx::query(
            "SELECT height, name, version, payload FROM chainsync_events
             WHERE handler_id = ? AND height = ? ORDER BY seq",
        )
        .bind(&self.id)
        .bind(to_i64(height)?)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter()
            .map(|row| -> Result<Event, SyncError> {
                let payload: String = row.get("payload");
                Ok(Event {
                    height: row.get::<i64, _>("height") as u64,
                    name: row.get("name"),
                    version: row.get::<i64, _>("version") as u32,
                    payload: serde_json::from_str(&payload).map_err(storage_err)?,
                })
            })
            .collect()
    }

    /// Total number of events committed by this handler.
    pub async fn event_count(&self) -> Result<u64, SyncError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM chainsync_events WHERE handler_id = ?")
            .bind(&self.id)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }
}

#[async_trait]
impl EventHandler for SqliteEventHandler {
    fn id(&self) -> &str {
        &self.id
    }

    async fn last_handled_event_height(&self) -> Result<Option<Height>, SyncError> {
        let row = sqlx::query("SELECT height FROM chainsync_cursor WHERE handler_id = ?")
            .bind(&self.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.map(|r| r.get::<i64, _>("height") as u64))
    }

    async fn handle_events(&self, height: Height, events: &[Event]) -> Result<(), SyncError> {
        let h = to_i64(height)?;
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let cursor = sqlx::query("SELECT height FROM chainsync_cursor WHERE handler_id = ?")
            .bind(&self.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_err)?
            .map(|r| r.get::<i64, _>("height") as u64);
        ensure_advances(&self.id, cursor, height)?;

        for (seq, event) in events.iter().enumerate() {
            let payload = serde_json::to_string(&event.payload).map_err(storage_err)?;
            sqlx::query(
                "INSERT INTO chainsync_events (handler_id, height, seq, name, version, payload)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&self.id)
            .bind(h)
            .bind(seq as i64)
            .bind(&event.name)
            .bind(i64::from(event.version))
            .bind(&payload)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        sqlx::query(
            "INSERT INTO chainsync_cursor (handler_id, height, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT (handler_id) DO UPDATE SET
                height     = excluded.height,
                updated_at = excluded.updated_at",
        )
        .bind(&self.id)
        .bind(h)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        debug!(handler = %self.id, height, events = events.len(), "events committed");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chainsync_core::event::{EventPayload, PowerChanged};

    fn power_event(height: Height, power: i64) -> Event {
        Event::new(
            height,
            1,
            EventPayload::PowerChanged(PowerChanged {
                pub_key_type: "ed25519".into(),
                pub_key: "AAAA".into(),
                power,
            }),
        )
    }

    #[tokio::test]
    async fn fresh_database_has_no_cursor() {
        let h = SqliteEventHandler::in_memory("idx").await.unwrap();
        assert_eq!(h.last_handled_event_height().await.unwrap(), None);
        assert_eq!(h.event_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn events_and_cursor_commit_together() {
        let h = SqliteEventHandler::in_memory("idx").await.unwrap();
        h.handle_events(0, &[power_event(0, 1)]).await.unwrap();
        h.handle_events(1, &[power_event(1, 2), power_event(1, 3)]).await.unwrap();

        assert_eq!(h.last_handled_event_height().await.unwrap(), Some(1));
        let at_1 = h.events_at(1).await.unwrap();
        assert_eq!(at_1, vec![power_event(1, 2), power_event(1, 3)]);
        assert_eq!(h.event_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn empty_height_still_advances() {
        let h = SqliteEventHandler::in_memory("idx").await.unwrap();
        h.handle_events(4, &[]).await.unwrap();
        assert_eq!(h.last_handled_event_height().await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn rejected_height_writes_nothing() {
        let h = SqliteEventHandler::in_memory("idx").await.unwrap();
        h.handle_events(5, &[power_event(5, 1)]).await.unwrap();

        let err = h.handle_events(5, &[power_event(5, 9)]).await.unwrap_err();
        assert!(matches!(err, SyncError::Handler { .. }));
        assert!(h.handle_events(3, &[power_event(3, 9)]).await.is_err());

        assert_eq!(h.event_count().await.unwrap(), 1);
        assert_eq!(h.last_handled_event_height().await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn cursor_survives_reopen() {
        let path = std::env::temp_dir().join(format!(
            "chainsync-test-{}-{}.db",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let path = path.to_string_lossy().to_string();

        let h = SqliteEventHandler::open(&path, "idx").await.unwrap();
        h.handle_events(7, &[power_event(7, 1)]).await.unwrap();
        drop(h);

        let reopened = SqliteEventHandler::open(&path, "idx").await.unwrap();
        assert_eq!(reopened.last_handled_event_height().await.unwrap(), Some(7));
        let other = SqliteEventHandler::open(&path, "other").await.unwrap();
        assert_eq!(other.last_handled_event_height().await.unwrap(), None);
        assert_eq!(other.event_count().await.unwrap(), 0);
    }
}
