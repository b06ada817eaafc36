//! Cosmos SDK REST response shapes.

use chainsync_core::serde_helpers::{string_i64, string_u64};
use chainsync_core::types::{
    AuthInfo, Coin, Fee, MessageLog, SignerInfo, Tx, TxBody, TxExecution,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tendermint::{convert_events, EventWire};

// ─── tx ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct GetTxResponse {
    tx: TxWire,
    tx_response: TxResponseWire,
}

#[derive(Debug, Deserialize)]
struct TxWire {
    body: BodyWire,
    auth_info: AuthInfoWire,
    #[serde(default)]
    signatures: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BodyWire {
    #[serde(default)]
    messages: Vec<Value>,
    #[serde(default)]
    memo: String,
    #[serde(default, with = "string_u64")]
    timeout_height: u64,
}

#[derive(Debug, Deserialize)]
struct AuthInfoWire {
    #[serde(default)]
    signer_infos: Vec<SignerInfoWire>,
    fee: FeeWire,
}

#[derive(Debug, Deserialize)]
struct SignerInfoWire {
    #[serde(default)]
    public_key: Option<Value>,
    #[serde(default, with = "string_u64")]
    sequence: u64,
}

#[derive(Debug, Deserialize)]
struct FeeWire {
    #[serde(default)]
    amount: Vec<Coin>,
    #[serde(default, with = "string_u64")]
    gas_limit: u64,
    #[serde(default)]
    payer: String,
    #[serde(default)]
    granter: String,
}

#[derive(Debug, Deserialize)]
struct TxResponseWire {
    #[serde(with = "string_u64")]
    height: u64,
    txhash: String,
    #[serde(default)]
    codespace: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
    #[serde(default)]
    logs: Option<Vec<MessageLogWire>>,
    #[serde(default, with = "string_i64")]
    gas_wanted: i64,
    #[serde(default, with = "string_i64")]
    gas_used: i64,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    events: Option<Vec<EventWire>>,
}

#[derive(Debug, Deserialize)]
struct MessageLogWire {
    #[serde(default)]
    msg_index: usize,
    #[serde(default)]
    events: Option<Vec<EventWire>>,
}

impl GetTxResponse {
    /// Convert into the core model. The block position is not part of the
    /// REST response and is supplied by the caller.
    pub(crate) fn into_tx(self, index: usize) -> Tx {
        let r = self.tx_response;
        Tx {
            height: r.height,
            index,
            hash: r.txhash,
            body: TxBody {
                messages: self.tx.body.messages,
                memo: self.tx.body.memo,
                timeout_height: self.tx.body.timeout_height,
            },
            auth_info: AuthInfo {
                fee: Fee {
                    amount: self.tx.auth_info.fee.amount,
                    gas_limit: self.tx.auth_info.fee.gas_limit,
                    payer: self.tx.auth_info.fee.payer,
                    granter: self.tx.auth_info.fee.granter,
                },
                signer_infos: self
                    .tx
                    .auth_info
                    .signer_infos
                    .into_iter()
                    .map(|s| SignerInfo {
                        public_key: s.public_key,
                        sequence: s.sequence,
                    })
                    .collect(),
            },
            signatures: self.tx.signatures,
            result: TxExecution {
                code: r.code,
                codespace: r.codespace,
                raw_log: r.raw_log,
                gas_wanted: r.gas_wanted,
                gas_used: r.gas_used,
                timestamp: r.timestamp,
                logs: r
                    .logs
                    .unwrap_or_default()
                    .into_iter()
                    .map(|l| MessageLog {
                        msg_index: l.msg_index,
                        events: convert_events(l.events),
                    })
                    .collect(),
                events: convert_events(r.events),
            },
        }
    }
}

// ─── staking / distribution ───────────────────────────────────────────────────

/// One delegation with its current balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator_address: String,
    pub validator_address: String,
    pub shares: String,
    pub balance: Coin,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DelegationResponseWire {
    pub delegation: DelegationWire,
    pub balance: Coin,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DelegationWire {
    pub delegator_address: String,
    pub validator_address: String,
    #[serde(default)]
    pub shares: String,
}

impl From<DelegationResponseWire> for Delegation {
    fn from(d: DelegationResponseWire) -> Self {
        Delegation {
            delegator_address: d.delegation.delegator_address,
            validator_address: d.delegation.validator_address,
            shares: d.delegation.shares,
            balance: d.balance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnbondingEntry {
    #[serde(with = "string_u64")]
    pub creation_height: u64,
    pub completion_time: DateTime<Utc>,
    pub initial_balance: String,
    pub balance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnbondingDelegation {
    pub delegator_address: String,
    pub validator_address: String,
    #[serde(default)]
    pub entries: Vec<UnbondingEntry>,
}

impl UnbondingDelegation {
    /// Sum of the remaining entry balances; entries that fail to parse are skipped.
    pub fn total_balance(&self) -> u128 {
        self.entries
            .iter()
            .filter_map(|e| e.balance.parse::<u128>().ok())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorDescriptionWire {
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionRatesWire {
    pub rate: String,
    pub max_rate: String,
    pub max_change_rate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorCommission {
    pub commission_rates: CommissionRatesWire,
    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
}

/// A validator as returned by `/cosmos/staking/v1beta1/validators/{addr}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    pub operator_address: String,
    #[serde(default)]
    pub consensus_pubkey: Value,
    #[serde(default)]
    pub jailed: bool,
    /// e.g. `BOND_STATUS_BONDED`.
    pub status: String,
    pub tokens: String,
    pub delegator_shares: String,
    pub description: ValidatorDescriptionWire,
    #[serde(default, with = "string_u64")]
    pub unbonding_height: u64,
    pub commission: ValidatorCommission,
    #[serde(default)]
    pub min_self_delegation: String,
}

// ─── gov ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TallyResult {
    #[serde(alias = "yes_count")]
    pub yes: String,
    #[serde(alias = "abstain_count")]
    pub abstain: String,
    #[serde(alias = "no_count")]
    pub no: String,
    #[serde(alias = "no_with_veto_count")]
    pub no_with_veto: String,
}

/// A gov v1beta1 proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(with = "string_u64")]
    pub proposal_id: u64,
    #[serde(default)]
    pub content: Value,
    /// e.g. `PROPOSAL_STATUS_VOTING_PERIOD`.
    pub status: String,
    #[serde(default)]
    pub final_tally_result: TallyResult,
    pub submit_time: DateTime<Utc>,
    pub deposit_end_time: DateTime<Utc>,
    #[serde(default)]
    pub total_deposit: Vec<Coin>,
    #[serde(default)]
    pub voting_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub voting_end_time: Option<DateTime<Utc>>,
}

impl Proposal {
    /// `true` once the proposal can no longer change.
    pub fn is_final(&self) -> bool {
        matches!(
            self.status.as_str(),
            "PROPOSAL_STATUS_PASSED" | "PROPOSAL_STATUS_REJECTED" | "PROPOSAL_STATUS_FAILED"
        )
    }
}

/// Which `/cosmos/gov/v1beta1/params/{kind}` section to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovParamsKind {
    Deposit,
    Voting,
    Tallying,
}

impl GovParamsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Voting => "voting",
            Self::Tallying => "tallying",
        }
    }
}
