//! Chain data model shared by the RPC clients, the parser and the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifies one committed block. Height 0 is genesis.
pub type Height = u64;

// ─── Block ────────────────────────────────────────────────────────────────────

/// Header fields the indexer cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub chain_id: String,
    pub height: Height,
    pub time: DateTime<Utc>,
    /// Hex-encoded consensus address of the proposer.
    pub proposer_address: String,
    pub app_hash: String,
    pub last_block_hash: String,
}

/// One entry of the block's last commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSignature {
    /// Hex-encoded consensus address; empty for absent votes.
    pub validator_address: String,
    pub timestamp: Option<DateTime<Utc>>,
    /// `true` when the validator signed for this block (`BLOCK_ID_FLAG_COMMIT`).
    pub signed: bool,
}

/// Raw transaction bytes as included in a block.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTx(pub Vec<u8>);

impl RawTx {
    /// Transaction hash as used by Tendermint and the Cosmos REST API:
    /// upper-case hex of the SHA-256 of the raw bytes.
    pub fn hash(&self) -> String {
        hex::encode_upper(Sha256::digest(&self.0))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for RawTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawTx({} bytes)", self.0.len())
    }
}

/// A committed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub hash: String,
    pub header: BlockHeader,
    /// Transactions in block order.
    pub txs: Vec<RawTx>,
    pub signatures: Vec<CommitSignature>,
    pub evidence_count: usize,
}

impl Block {
    pub fn height(&self) -> Height {
        self.header.height
    }

    /// Hashes of all transactions, in block order.
    pub fn tx_hashes(&self) -> Vec<String> {
        self.txs.iter().map(RawTx::hash).collect()
    }
}

// ─── Block results ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbciAttribute {
    pub key: String,
    pub value: String,
}

/// An ABCI event emitted during block or transaction execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbciEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<AbciAttribute>,
}

impl AbciEvent {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: vec![],
        }
    }

    /// Builder-style attribute append, mostly for tests.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(AbciAttribute {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// First value for `key`, if present.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

/// Per-transaction execution result as reported by `block_results`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub code: u32,
    pub codespace: String,
    pub log: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
    pub events: Vec<AbciEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    /// e.g. `ed25519`.
    pub pub_key_type: String,
    /// Base64-encoded public key.
    pub pub_key: String,
    pub power: i64,
}

/// Execution side effects of one block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockResults {
    pub height: Height,
    /// Indexed by the transaction's position in the block.
    pub txs_results: Vec<TxResult>,
    pub begin_block_events: Vec<AbciEvent>,
    pub end_block_events: Vec<AbciEvent>,
    /// Populated by CometBFT 0.38+ instead of begin/end block events.
    pub finalize_block_events: Vec<AbciEvent>,
    pub validator_updates: Vec<ValidatorUpdate>,
}

impl BlockResults {
    /// All block-level events in execution order.
    pub fn block_events(&self) -> impl Iterator<Item = &AbciEvent> {
        self.begin_block_events
            .iter()
            .chain(self.end_block_events.iter())
            .chain(self.finalize_block_events.iter())
    }
}

// ─── Resolved transactions ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    /// Integer or decimal amount, kept as a string to avoid precision loss.
    pub amount: String,
}

impl Coin {
    pub fn new(amount: impl Into<String>, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }
}

impl std::fmt::Display for Coin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Vec<Coin>,
    pub gas_limit: u64,
    pub payer: String,
    pub granter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignerInfo {
    pub public_key: Option<serde_json::Value>,
    pub sequence: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxBody {
    /// Messages as `Any` JSON objects carrying an `@type` field.
    pub messages: Vec<serde_json::Value>,
    pub memo: String,
    pub timeout_height: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub fee: Fee,
    pub signer_infos: Vec<SignerInfo>,
}

/// Events emitted by a single message of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLog {
    pub msg_index: usize,
    pub events: Vec<AbciEvent>,
}

/// Execution response attached to a resolved transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxExecution {
    pub code: u32,
    pub codespace: String,
    pub raw_log: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
    pub timestamp: DateTime<Utc>,
    pub logs: Vec<MessageLog>,
    pub events: Vec<AbciEvent>,
}

/// A fully resolved transaction: decoded body plus its execution response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tx {
    pub height: Height,
    /// Position of the transaction within its block.
    pub index: usize,
    pub hash: String,
    pub body: TxBody,
    pub auth_info: AuthInfo,
    pub signatures: Vec<String>,
    pub result: TxExecution,
}

impl Tx {
    pub fn is_success(&self) -> bool {
        self.result.code == 0
    }

    /// Events attributed to message `msg_index`.
    ///
    /// Uses the per-message logs when the node still returns them (SDK < 0.50),
    /// otherwise falls back to the flat event list filtered by the
    /// `msg_index` attribute.
    pub fn message_events(&self, msg_index: usize) -> Vec<&AbciEvent> {
        if let Some(log) = self.result.logs.iter().find(|l| l.msg_index == msg_index) {
            return log.events.iter().collect();
        }
        let idx = msg_index.to_string();
        self.result
            .events
            .iter()
            .filter(|e| e.attribute("msg_index") == Some(idx.as_str()))
            .collect()
    }

    /// Signer address of the fee payer, if set.
    pub fn fee_payer(&self) -> Option<&str> {
        Some(self.auth_info.fee.payer.as_str()).filter(|p| !p.is_empty())
    }
}

// ─── Genesis & status ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genesis {
    pub genesis_time: DateTime<Utc>,
    pub chain_id: String,
    pub initial_height: Height,
    /// Raw application state; parsed section by section.
    pub app_state: serde_json::Value,
}

/// Node status as reported by the consensus RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStatus {
    pub network: String,
    pub latest_block_height: Height,
    pub latest_block_time: DateTime<Utc>,
    pub catching_up: bool,
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_tx_hash_is_upper_hex_sha256() {
        let tx = RawTx(b"hello".to_vec());
        assert_eq!(
            tx.hash(),
            "2CF24DBA5FB0A30E26E83B2AC5B9E29E1B161E5C1FA7425E73043362938B9824"
        );
    }

    #[test]
    fn abci_attribute_lookup() {
        let ev = AbciEvent::new("transfer")
            .with("recipient", "cosmos1abc")
            .with("amount", "10uatom");
        assert_eq!(ev.attribute("amount"), Some("10uatom"));
        assert_eq!(ev.attribute("sender"), None);
    }

    #[test]
    fn abci_event_uses_type_key() {
        let ev: AbciEvent =
            serde_json::from_str(r#"{"type":"mint","attributes":[{"key":"amount","value":"5"}]}"#)
                .unwrap();
        assert_eq!(ev.kind, "mint");
        assert_eq!(ev.attribute("amount"), Some("5"));
    }

    #[test]
    fn block_events_in_execution_order() {
        let results = BlockResults {
            begin_block_events: vec![AbciEvent::new("mint")],
            end_block_events: vec![AbciEvent::new("complete_unbonding")],
            finalize_block_events: vec![AbciEvent::new("rewards")],
            ..Default::default()
        };
        let kinds: Vec<_> = results.block_events().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, ["mint", "complete_unbonding", "rewards"]);
    }

    fn tx_with(logs: Vec<MessageLog>, events: Vec<AbciEvent>) -> Tx {
        Tx {
            height: 1,
            index: 0,
            hash: "AA".into(),
            body: TxBody::default(),
            auth_info: AuthInfo::default(),
            signatures: vec![],
            result: TxExecution {
                code: 0,
                codespace: String::new(),
                raw_log: String::new(),
                gas_wanted: 0,
                gas_used: 0,
                timestamp: DateTime::<Utc>::UNIX_EPOCH,
                logs,
                events,
            },
        }
    }

    #[test]
    fn message_events_prefers_logs() {
        let tx = tx_with(
            vec![MessageLog {
                msg_index: 1,
                events: vec![AbciEvent::new("withdraw_rewards")],
            }],
            vec![],
        );
        assert_eq!(tx.message_events(1).len(), 1);
        assert!(tx.message_events(0).is_empty());
    }

    #[test]
    fn message_events_falls_back_to_msg_index_attribute() {
        let tx = tx_with(
            vec![],
            vec![
                AbciEvent::new("tx").with("fee", "1uatom"),
                AbciEvent::new("unbond").with("msg_index", "0"),
                AbciEvent::new("unbond").with("msg_index", "1"),
            ],
        );
        let evs = tx.message_events(1);
        assert_eq!(evs.len(), 1);
        assert_eq!(evs[0].attribute("msg_index"), Some("1"));
    }
}
