//! PostgreSQL event handler.
//!
//! # Feature Flag
//! Requires the `postgres` feature:
//! ```toml
//! chainsync-storage = { version = "0.2", features = ["postgres"] }
//! ```
//!
//! # Schema
//! Created automatically on first connect:
//! - `chainsync_events` — committed events, payload as JSONB
//! - `chainsync_cursor` — last handled height per handler id

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use chainsync_core::handler::ensure_advances;
use chainsync_core::types::Height;
use chainsync_core::{Event, EventHandler, SyncError};

fn storage_err(e: impl std::fmt::Display) -> SyncError {
    SyncError::Storage(e.to_string())
}

fn to_i64(height: Height) -> Result<i64, SyncError> {
    i64::try_from(height).map_err(|_| SyncError::Storage(format!("height {height} out of range")))
}

/// Connection options for the Postgres handler.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    /// Maximum number of connections in the pool (default: 5)
    pub max_connections: u32,
    /// Connection timeout in seconds (default: 30)
    pub connect_timeout_secs: u64,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            connect_timeout_secs: 30,
        }
    }
}

/// PostgreSQL-backed [`EventHandler`]. Cheap to clone.
#[derive(Clone)]
pub struct PostgresEventHandler {
    id: String,
    pool: PgPool,
}

impl PostgresEventHandler {
    /// Connect with default pool options and initialize the schema.
    ///
    /// URL format: `postgresql://[user[:password]@][host][:port][/dbname]`
    pub async fn connect(database_url: &str, handler_id: &str) -> Result<Self, SyncError> {
        Self::connect_with_options(database_url, handler_id, PostgresOptions::default()).await
    }

    pub async fn connect_with_options(
        database_url: &str,
        handler_id: &str,
        opts: PostgresOptions,
    ) -> Result<Self, SyncError> {
        let pool = PgPoolOptions::new()
            .max_connections(opts.max_connections)
            .acquire_timeout(Duration::from_secs(opts.connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| SyncError::Storage(format!("postgres connect: {e}")))?;

        let handler = Self {
            id: handler_id.to_string(),
            pool,
        };
        handler.init_schema().await?;
        info!(handler = %handler.id, "postgres event handler ready");
        Ok(handler)
    }

    async fn init_schema(&self) -> Result<(), SyncError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chainsync_events (
                id         BIGSERIAL PRIMARY KEY,
                handler_id TEXT      NOT NULL,
                height     BIGINT    NOT NULL,
                seq        INTEGER   NOT NULL,
                name       TEXT      NOT NULL,
                version    INTEGER   NOT NULL,
                payload    JSONB     NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chainsync_events_height
             ON chainsync_events (handler_id, height, seq)",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chainsync_cursor (
                handler_id TEXT        PRIMARY KEY,
                height     BIGINT      NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )",
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
             WHERE handler_id = $1 AND height = $2 ORDER BY seq",
        )
        .bind(&self.id)
        .bind(to_i64(height)?)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter()
            .map(|row| -> Result<Event, SyncError> {
                let payload: serde_json::Value = row.get("payload");
                Ok(Event {
                    height: row.get::<i64, _>("height") as u64,
                    name: row.get("name"),
                    version: row.get::<i32, _>("version") as u32,
                    payload: serde_json::from_value(payload).map_err(storage_err)?,
                })
            })
            .collect()
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EventHandler for PostgresEventHandler {
    fn id(&self) -> &str {
        &self.id
    }

    async fn last_handled_event_height(&self) -> Result<Option<Height>, SyncError> {
        let row = sqlx::query("SELECT height FROM chainsync_cursor WHERE handler_id = $1")
            .bind(&self.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.map(|r| r.get::<i64, _>("height") as u64))
    }

    async fn handle_events(&self, height: Height, events: &[Event]) -> Result<(), SyncError> {
        let h = to_i64(height)?;
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        // cursor row stays locked until commit
        let cursor = sqlx::query(
            "SELECT height FROM chainsync_cursor WHERE handler_id = $1 FOR UPDATE",
        )
        .bind(&self.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_err)?
        .map(|r| r.get::<i64, _>("height") as u64);
        ensure_advances(&self.id, cursor, height)?;

        for (seq, event) in events.iter().enumerate() {
            let payload = serde_json::to_value(&event.payload).map_err(storage_err)?;
            sqlx::query(
                "INSERT INTO chainsync_events (handler_id, height, seq, name, version, payload)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&self.id)
            .bind(h)
            .bind(seq as i32)
            .bind(&event.name)
            .bind(event.version as i32)
            .bind(payload)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        sqlx::query(
            "INSERT INTO chainsync_cursor (handler_id, height, updated_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (handler_id)
             DO UPDATE SET
                height     = EXCLUDED.height,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(&self.id)
        .bind(h)
        .bind(chrono::Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit()
            .await
            .map_err(|e| SyncError::Storage(format!("commit height {height}: {e}")))?;
        debug!(handler = %self.id, height, events = events.len(), "events committed");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
//
// Require a running server: `CHAINSYNC_TEST_POSTGRES=postgres://… cargo test
// --features postgres -- --ignored`.
