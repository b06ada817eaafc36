//! chainsync-core — foundation types for the ChainSync indexing engine.
//!
//! # Architecture
//!
//! ```text
//! SyncManager ──► WindowSyncStrategy ──► fetch(height) ──► Vec<Command>
//!      │                                                       │
//!      │                                              Command::execute()
//!      ▼                                                       ▼
//!  EventHandler ◄──────────── handle_events(height, &[Event]) ─┘
//! ```
//!
//! This crate defines the chain data model (blocks, block results, resolved
//! transactions, genesis), the [`Event`] stream handed to an
//! [`EventHandler`], and the [`WindowSyncStrategy`] used to fetch height
//! ranges with bounded concurrency.

pub mod error;
pub mod event;
pub mod handler;
pub mod msg;
pub mod serde_helpers;
pub mod state;
pub mod types;
pub mod window;

pub use error::SyncError;
pub use event::{Event, EventPayload};
pub use handler::{EventHandler, MemoryEventHandler};
pub use state::SyncState;
pub use types::{
    AbciEvent, Block, BlockHeader, BlockResults, ChainStatus, Coin, Genesis, Height, RawTx, Tx,
};
pub use window::{HeightCommands, WindowSyncResult, WindowSyncStrategy};
