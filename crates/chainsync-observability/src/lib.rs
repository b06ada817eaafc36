//! # chainsync-observability
//!
//! ## Built-in metrics
//! - `heights_synced`     — heights whose events were committed
//! - `events_handled`     — events handed to the event handler
//! - `sync_failures`      — aborted sync attempts
//! - `txs_fetched`        — transactions resolved through the app RPC
//! - `last_synced_height` — gauge, highest committed height
//!
//! ## Structured logging
//! JSON or human-readable logs with per-component levels, see [`LogConfig`].

pub mod metrics;
pub mod tracing_setup;

pub use metrics::{SyncMetrics, SyncMetricsSnapshot};
pub use tracing_setup::{init_tracing, LogConfig};
