//! chainsync-engine — the orchestrator of the ChainSync indexer.
//!
//! ```text
//!                     ┌──────────────┐  latest height (watch)
//!   ChainRpc ───────► │ HeightTracker│ ─────────────────────┐
//!                     └──────────────┘                      ▼
//!                                                    ┌─────────────┐
//!   EventHandler ── last handled height ───────────► │ SyncManager │
//!        ▲                                           └──────┬──────┘
//!        │                                                  │ window [h, h+W-1]
//!        │                                                  ▼
//!        │                                        WindowSyncStrategy
//!        │                                                  │ one task per height
//!        │                                                  ▼
//!        │          ChainRpc + AppRpc ──────────►   HeightFetcher ──► Vec<Command>
//!        │                                                  │
//!        └──── handle_events(h, events) ◄── execute() ◄─────┘   (ascending height)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use chainsync_engine::{SyncConfig, SyncManager};
//!
//! # async fn example() -> Result<(), chainsync_core::SyncError> {
//! let config = SyncConfig::from_file("chainsync.yaml")?;
//! let manager = SyncManager::from_config(config).await?;
//! manager.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod fetcher;
pub mod manager;
pub mod tracker;

pub use builder::SyncConfigBuilder;
pub use config::SyncConfig;
pub use fetcher::HeightFetcher;
pub use manager::{resume_height, target_height, SyncManager};
pub use tracker::HeightTracker;
