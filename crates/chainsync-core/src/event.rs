//! Events: the immutable output of executing a command.
//!
//! One height yields an ordered `Vec<Event>` that an [`EventHandler`]
//! applies atomically together with the cursor advance.
//!
//! [`EventHandler`]: crate::handler::EventHandler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::msg::{CommissionRates, MsgBase, MsgParams, ValidatorDescription};
use crate::types::{CommitSignature, Coin, Fee, Height};

/// A committed unit of indexer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub height: Height,
    /// Event name, e.g. `BlockCreated` or `MsgSendCreated`.
    pub name: String,
    /// Payload schema version.
    pub version: u32,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(height: Height, version: u32, payload: EventPayload) -> Self {
        Self {
            height,
            name: payload.event_name(),
            version,
            payload,
        }
    }
}

// ─── Payloads ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    GenesisCreated(GenesisCreated),
    GenesisValidatorCreated(GenesisValidatorCreated),
    GenesisAccountBalanceCreated(GenesisAccountBalanceCreated),
    BlockCreated(BlockCreated),
    TransactionCreated(TransactionCreated),
    TransactionFailed(TransactionCreated),
    Msg(MsgEvent),
    MintMinted(MintMinted),
    BlockProposerRewarded(BlockReward),
    BlockRewarded(BlockReward),
    BlockCommissioned(BlockReward),
    ValidatorSlashed(ValidatorSlashed),
    UnbondingCompleted(UnbondingCompleted),
    PowerChanged(PowerChanged),
}

impl EventPayload {
    pub fn event_name(&self) -> String {
        match self {
            Self::GenesisCreated(_) => "GenesisCreated".into(),
            Self::GenesisValidatorCreated(_) => "GenesisValidatorCreated".into(),
            Self::GenesisAccountBalanceCreated(_) => "GenesisAccountBalanceCreated".into(),
            Self::BlockCreated(_) => "BlockCreated".into(),
            Self::TransactionCreated(_) => "TransactionCreated".into(),
            Self::TransactionFailed(_) => "TransactionFailed".into(),
            Self::Msg(m) => format!("{}Created", m.params.name()),
            Self::MintMinted(_) => "MintMinted".into(),
            Self::BlockProposerRewarded(_) => "BlockProposerRewarded".into(),
            Self::BlockRewarded(_) => "BlockRewarded".into(),
            Self::BlockCommissioned(_) => "BlockCommissioned".into(),
            Self::ValidatorSlashed(_) => "ValidatorSlashed".into(),
            Self::UnbondingCompleted(_) => "UnbondingCompleted".into(),
            Self::PowerChanged(_) => "PowerChanged".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisCreated {
    pub chain_id: String,
    pub genesis_time: DateTime<Utc>,
    pub initial_height: Height,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisValidatorCreated {
    pub operator_address: String,
    /// Empty when the validator comes from the staking section.
    pub delegator_address: String,
    pub consensus_pubkey: serde_json::Value,
    pub description: ValidatorDescription,
    pub commission: CommissionRates,
    pub min_self_delegation: String,
    pub tokens: String,
    pub jailed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccountBalanceCreated {
    pub address: String,
    pub coins: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCreated {
    pub hash: String,
    pub time: DateTime<Utc>,
    pub proposer_address: String,
    pub app_hash: String,
    pub tx_count: usize,
    pub signatures: Vec<CommitSignature>,
    pub evidence_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCreated {
    pub hash: String,
    pub index: usize,
    pub success: bool,
    pub code: u32,
    pub codespace: String,
    pub log: String,
    pub fee: Fee,
    pub gas_wanted: i64,
    pub gas_used: i64,
    pub memo: String,
    pub timeout_height: u64,
    /// `@type` of every message, in order.
    pub message_types: Vec<String>,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgEvent {
    pub base: MsgBase,
    pub params: MsgParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintMinted {
    pub bonded_ratio: String,
    pub inflation: String,
    pub annual_provisions: String,
    pub amount: String,
}

/// Reward or commission credited to a validator during block execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReward {
    pub validator: String,
    pub amount: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSlashed {
    /// Consensus address of the slashed validator.
    pub address: String,
    pub power: String,
    pub reason: String,
    pub jailed: Option<String>,
    pub burned: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingCompleted {
    pub delegator: String,
    pub validator: String,
    pub amount: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerChanged {
    pub pub_key_type: String,
    pub pub_key: String,
    pub power: i64,
}
