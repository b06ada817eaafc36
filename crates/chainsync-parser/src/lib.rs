//! chainsync-parser — turns fetched chain data into ordered commands.
//!
//! ```text
//! Genesis ───────────────────────► parse_genesis_commands ──┐
//!                                                            ├──► Vec<Command> ──► execute() ──► Event
//! Block + BlockResults + Vec<Tx> ─► parse_block_to_commands ─┘
//!                 │
//!                 └─► ParserRegistry (type URL → MsgKind, by protocol version)
//! ```
//!
//! Parsing never performs I/O; every transaction is resolved by the caller
//! before the block is parsed.

pub mod abci;
pub mod block;
pub mod command;
pub mod error;
pub mod genesis;
pub mod registry;

use std::sync::Arc;

pub use abci::AddressPrefixes;
pub use block::parse_block_to_commands;
pub use command::{BlockEventKind, Command, MsgCommand, MsgContext};
pub use error::{CommandError, ParseError};
pub use genesis::parse_genesis_commands;
pub use registry::{MsgKind, MsgRoute, ParserRegistry, UpgradeSchedule};

/// Chain-specific parsing options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    pub prefixes: AddressPrefixes,
    /// Bond denom checked on staking messages; empty disables the check.
    pub staking_denom: String,
    /// Fail on a malformed genesis section instead of skipping it.
    pub strict_genesis_parsing: bool,
    /// Fail the block on a message type with no registered parser.
    pub strict_messages: bool,
    /// Block-level event attributes are base64 (Tendermint 0.34 and older).
    pub base64_encoded_event_attributes: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            prefixes: AddressPrefixes::default(),
            staking_denom: "uatom".into(),
            strict_genesis_parsing: false,
            strict_messages: false,
            base64_encoded_event_attributes: false,
        }
    }
}

impl ParserConfig {
    pub fn msg_context(&self) -> Arc<MsgContext> {
        Arc::new(MsgContext {
            prefixes: self.prefixes.clone(),
            staking_denom: self.staking_denom.clone(),
        })
    }
}
