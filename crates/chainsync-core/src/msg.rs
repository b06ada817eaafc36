//! Typed parameters of the Cosmos SDK messages the indexer understands.
//!
//! Each struct deserializes straight from the message's REST JSON form
//! (snake_case fields, string-encoded integers). Fields that only exist in
//! the execution logs (withdrawn amounts, completion times, proposal ids) are
//! `#[serde(default)]` and filled in by the command that produces the event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Coin;

/// Context shared by every message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgBase {
    pub tx_hash: String,
    pub tx_index: usize,
    pub msg_index: usize,
}

// ─── bank ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSendParams {
    pub from_address: String,
    pub to_address: String,
    pub amount: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSendEntry {
    pub address: String,
    pub coins: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgMultiSendParams {
    pub inputs: Vec<MultiSendEntry>,
    pub outputs: Vec<MultiSendEntry>,
}

// ─── staking ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDelegateParams {
    pub delegator_address: String,
    pub validator_address: String,
    pub amount: Coin,
    /// Rewards auto-withdrawn by the delegation change.
    #[serde(default)]
    pub auto_claimed_rewards: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUndelegateParams {
    pub delegator_address: String,
    pub validator_address: String,
    pub amount: Coin,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_claimed_rewards: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgBeginRedelegateParams {
    pub delegator_address: String,
    pub validator_src_address: String,
    pub validator_dst_address: String,
    pub amount: Coin,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_claimed_rewards: Vec<Coin>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorDescription {
    #[serde(default)]
    pub moniker: String,
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub security_contact: String,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRates {
    pub rate: String,
    pub max_rate: String,
    pub max_change_rate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgCreateValidatorParams {
    pub description: ValidatorDescription,
    pub commission: CommissionRates,
    pub min_self_delegation: String,
    /// Empty on SDK 0.50+, where the operator is the delegator.
    #[serde(default)]
    pub delegator_address: String,
    pub validator_address: String,
    /// Consensus public key as an `Any` JSON object.
    pub pubkey: serde_json::Value,
    pub value: Coin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgEditValidatorParams {
    pub description: ValidatorDescription,
    pub validator_address: String,
    #[serde(default)]
    pub commission_rate: Option<String>,
    #[serde(default)]
    pub min_self_delegation: Option<String>,
}

// ─── distribution ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgWithdrawDelegatorRewardParams {
    pub delegator_address: String,
    pub validator_address: String,
    /// Withdrawn amount, read from the `withdraw_rewards` event.
    #[serde(default)]
    pub amount: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgWithdrawValidatorCommissionParams {
    pub validator_address: String,
    /// Withdrawn amount, read from the `withdraw_commission` event.
    #[serde(default)]
    pub amount: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSetWithdrawAddressParams {
    pub delegator_address: String,
    pub withdraw_address: String,
}

// ─── gov ──────────────────────────────────────────────────────────────────────

/// `cosmos.gov.v1beta1.MsgSubmitProposal`: a single `content` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgSubmitProposalParams {
    pub content: serde_json::Value,
    #[serde(default)]
    pub initial_deposit: Vec<Coin>,
    pub proposer: String,
    /// Assigned on execution, read from the `submit_proposal` event.
    #[serde(default)]
    pub proposal_id: Option<u64>,
}

/// `cosmos.gov.v1.MsgSubmitProposal`: a list of executable messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgSubmitProposalV1Params {
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
    #[serde(default)]
    pub initial_deposit: Vec<Coin>,
    pub proposer: String,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub proposal_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgVoteParams {
    #[serde(with = "crate::serde_helpers::string_u64")]
    pub proposal_id: u64,
    pub voter: String,
    /// e.g. `VOTE_OPTION_YES`.
    pub option: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDepositParams {
    #[serde(with = "crate::serde_helpers::string_u64")]
    pub proposal_id: u64,
    pub depositor: String,
    pub amount: Vec<Coin>,
}

// ─── slashing ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUnjailParams {
    pub validator_addr: String,
}

// ─── MsgParams ────────────────────────────────────────────────────────────────

/// Parameters of one decoded message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", content = "params")]
pub enum MsgParams {
    Send(MsgSendParams),
    MultiSend(MsgMultiSendParams),
    Delegate(MsgDelegateParams),
    Undelegate(MsgUndelegateParams),
    BeginRedelegate(MsgBeginRedelegateParams),
    WithdrawDelegatorReward(MsgWithdrawDelegatorRewardParams),
    WithdrawValidatorCommission(MsgWithdrawValidatorCommissionParams),
    SetWithdrawAddress(MsgSetWithdrawAddressParams),
    CreateValidator(MsgCreateValidatorParams),
    EditValidator(MsgEditValidatorParams),
    SubmitProposal(MsgSubmitProposalParams),
    SubmitProposalV1(MsgSubmitProposalV1Params),
    Vote(MsgVoteParams),
    Deposit(MsgDepositParams),
    Unjail(MsgUnjailParams),
}

impl MsgParams {
    /// Short message name, e.g. `MsgSend`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Send(_) => "MsgSend",
            Self::MultiSend(_) => "MsgMultiSend",
            Self::Delegate(_) => "MsgDelegate",
            Self::Undelegate(_) => "MsgUndelegate",
            Self::BeginRedelegate(_) => "MsgBeginRedelegate",
            Self::WithdrawDelegatorReward(_) => "MsgWithdrawDelegatorReward",
            Self::WithdrawValidatorCommission(_) => "MsgWithdrawValidatorCommission",
            Self::SetWithdrawAddress(_) => "MsgSetWithdrawAddress",
            Self::CreateValidator(_) => "MsgCreateValidator",
            Self::EditValidator(_) => "MsgEditValidator",
            Self::SubmitProposal(_) | Self::SubmitProposalV1(_) => "MsgSubmitProposal",
            Self::Vote(_) => "MsgVote",
            Self::Deposit(_) => "MsgDeposit",
            Self::Unjail(_) => "MsgUnjail",
        }
    }
}
