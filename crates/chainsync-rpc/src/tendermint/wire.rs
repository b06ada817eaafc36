//! Tendermint / CometBFT RPC response shapes and their conversion into the
//! core data model.
//!
//! Integers arrive as strings, absent lists as `null`, and transactions as
//! base64 strings.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chainsync_core::serde_helpers::{string_i64, string_u64};
use chainsync_core::types::{
    AbciAttribute, AbciEvent, Block, BlockHeader, BlockResults, ChainStatus, CommitSignature,
    Genesis, RawTx, TxResult, ValidatorUpdate,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::RpcError;

// ─── status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct StatusResult {
    node_info: NodeInfo,
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
    #[serde(default)]
    network: String,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    #[serde(with = "string_u64")]
    latest_block_height: u64,
    latest_block_time: DateTime<Utc>,
    #[serde(default)]
    catching_up: bool,
}

impl From<StatusResult> for ChainStatus {
    fn from(s: StatusResult) -> Self {
        ChainStatus {
            network: s.node_info.network,
            latest_block_height: s.sync_info.latest_block_height,
            latest_block_time: s.sync_info.latest_block_time,
            catching_up: s.sync_info.catching_up,
        }
    }
}

// ─── genesis ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct GenesisResult {
    pub genesis: GenesisDoc,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenesisDoc {
    genesis_time: DateTime<Utc>,
    chain_id: String,
    #[serde(default, with = "string_u64")]
    initial_height: u64,
    #[serde(default)]
    app_state: Value,
}

impl From<GenesisDoc> for Genesis {
    fn from(g: GenesisDoc) -> Self {
        Genesis {
            genesis_time: g.genesis_time,
            chain_id: g.chain_id,
            initial_height: g.initial_height,
            app_state: g.app_state,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenesisChunkResult {
    #[serde(with = "string_u64")]
    pub total: u64,
    pub data: String,
}

// ─── block ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct BlockResult {
    block_id: BlockId,
    block: BlockWire,
}

#[derive(Debug, Default, Deserialize)]
struct BlockId {
    #[serde(default)]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct BlockWire {
    header: HeaderWire,
    data: DataWire,
    #[serde(default)]
    evidence: Option<EvidenceWire>,
    #[serde(default)]
    last_commit: Option<CommitWire>,
}

#[derive(Debug, Deserialize)]
struct HeaderWire {
    chain_id: String,
    #[serde(with = "string_u64")]
    height: u64,
    time: DateTime<Utc>,
    #[serde(default)]
    last_block_id: Option<BlockId>,
    #[serde(default)]
    app_hash: String,
    #[serde(default)]
    proposer_address: String,
}

#[derive(Debug, Deserialize)]
struct DataWire {
    #[serde(default)]
    txs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct EvidenceWire {
    #[serde(default)]
    evidence: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct CommitWire {
    #[serde(default)]
    signatures: Option<Vec<CommitSigWire>>,
}

#[derive(Debug, Deserialize)]
struct CommitSigWire {
    block_id_flag: Value,
    #[serde(default)]
    validator_address: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// `BLOCK_ID_FLAG_COMMIT`, as a number (RPC) or enum name (gRPC gateway).
fn is_commit_flag(flag: &Value) -> bool {
    match flag {
        Value::Number(n) => n.as_u64() == Some(2),
        Value::String(s) => s == "BLOCK_ID_FLAG_COMMIT" || s == "2",
        _ => false,
    }
}

impl TryFrom<BlockResult> for Block {
    type Error = RpcError;

    fn try_from(r: BlockResult) -> Result<Self, Self::Error> {
        let txs = r
            .block
            .data
            .txs
            .unwrap_or_default()
            .iter()
            .map(|encoded| {
                STANDARD
                    .decode(encoded)
                    .map(RawTx)
                    .map_err(|e| RpcError::Decode(format!("tx bytes: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let signatures = r
            .block
            .last_commit
            .and_then(|c| c.signatures)
            .unwrap_or_default()
            .into_iter()
            .map(|s| CommitSignature {
                signed: is_commit_flag(&s.block_id_flag),
                validator_address: s.validator_address.unwrap_or_default(),
                timestamp: s.timestamp,
            })
            .collect();

        let header = r.block.header;
        Ok(Block {
            hash: r.block_id.hash,
            header: BlockHeader {
                chain_id: header.chain_id,
                height: header.height,
                time: header.time,
                proposer_address: header.proposer_address,
                app_hash: header.app_hash,
                last_block_hash: header.last_block_id.unwrap_or_default().hash,
            },
            txs,
            signatures,
            evidence_count: r
                .block
                .evidence
                .and_then(|e| e.evidence)
                .map_or(0, |e| e.len()),
        })
    }
}

// ─── block_results ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct BlockResultsWire {
    #[serde(with = "string_u64")]
    height: u64,
    #[serde(default)]
    txs_results: Option<Vec<TxResultWire>>,
    #[serde(default)]
    begin_block_events: Option<Vec<EventWire>>,
    #[serde(default)]
    end_block_events: Option<Vec<EventWire>>,
    #[serde(default)]
    finalize_block_events: Option<Vec<EventWire>>,
    #[serde(default)]
    validator_updates: Option<Vec<ValidatorUpdateWire>>,
}

#[derive(Debug, Deserialize)]
struct TxResultWire {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    codespace: String,
    #[serde(default)]
    log: String,
    #[serde(default, with = "string_i64")]
    gas_wanted: i64,
    #[serde(default, with = "string_i64")]
    gas_used: i64,
    #[serde(default)]
    events: Option<Vec<EventWire>>,
}

/// Event with possibly-null attribute keys and values; shared with the
/// Cosmos REST responses.
#[derive(Debug, Deserialize)]
pub(crate) struct EventWire {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attributes: Option<Vec<AttributeWire>>,
}

#[derive(Debug, Deserialize)]
struct AttributeWire {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

impl From<EventWire> for AbciEvent {
    fn from(e: EventWire) -> Self {
        AbciEvent {
            kind: e.kind,
            attributes: e
                .attributes
                .unwrap_or_default()
                .into_iter()
                .map(|a| AbciAttribute {
                    key: a.key.unwrap_or_default(),
                    value: a.value.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

pub(crate) fn convert_events(events: Option<Vec<EventWire>>) -> Vec<AbciEvent> {
    events
        .unwrap_or_default()
        .into_iter()
        .map(AbciEvent::from)
        .collect()
}

#[derive(Debug, Deserialize)]
struct ValidatorUpdateWire {
    pub_key: Value,
    #[serde(with = "string_i64")]
    power: i64,
}

/// Extract `(key_type, base64_key)` from the public key shapes used across
/// Tendermint versions:
///
/// - `{"type": "tendermint/PubKeyEd25519", "value": "..."}`
/// - `{"Sum": {"type": "...", "value": {"ed25519": "..."}}}`
/// - `{"ed25519": "..."}`
fn pub_key_parts(v: &Value) -> (String, String) {
    if let (Some(t), Some(val)) = (
        v.get("type").and_then(Value::as_str),
        v.get("value").and_then(Value::as_str),
    ) {
        let short = t.rsplit('/').next().unwrap_or(t);
        let short = short.strip_prefix("PubKey").unwrap_or(short);
        return (short.to_lowercase(), val.to_string());
    }
    let inner = v
        .get("Sum")
        .and_then(|s| s.get("value"))
        .and_then(Value::as_object)
        .or_else(|| v.as_object());
    inner
        .and_then(|obj| obj.iter().next())
        .map(|(k, val)| (k.clone(), val.as_str().unwrap_or_default().to_string()))
        .unwrap_or_default()
}

impl From<BlockResultsWire> for BlockResults {
    fn from(r: BlockResultsWire) -> Self {
        BlockResults {
            height: r.height,
            txs_results: r
                .txs_results
                .unwrap_or_default()
                .into_iter()
                .map(|t| TxResult {
                    code: t.code,
                    codespace: t.codespace,
                    log: t.log,
                    gas_wanted: t.gas_wanted,
                    gas_used: t.gas_used,
                    events: convert_events(t.events),
                })
                .collect(),
            begin_block_events: convert_events(r.begin_block_events),
            end_block_events: convert_events(r.end_block_events),
            finalize_block_events: convert_events(r.finalize_block_events),
            validator_updates: r
                .validator_updates
                .unwrap_or_default()
                .into_iter()
                .map(|u| {
                    let (pub_key_type, pub_key) = pub_key_parts(&u.pub_key);
                    ValidatorUpdate {
                        pub_key_type,
                        pub_key,
                        power: u.power,
                    }
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pub_key_shapes() {
        assert_eq!(
            pub_key_parts(&json!({"type": "tendermint/PubKeyEd25519", "value": "AAA="})),
            ("ed25519".to_string(), "AAA=".to_string())
        );
        assert_eq!(
            pub_key_parts(&json!({"Sum": {"type": "tendermint.crypto.PublicKey_Ed25519", "value": {"ed25519": "BBB="}}})),
            ("ed25519".to_string(), "BBB=".to_string())
        );
        assert_eq!(
            pub_key_parts(&json!({"secp256k1": "CCC="})),
            ("secp256k1".to_string(), "CCC=".to_string())
        );
    }

    #[test]
    fn commit_flag_forms() {
        assert!(is_commit_flag(&json!(2)));
        assert!(is_commit_flag(&json!("BLOCK_ID_FLAG_COMMIT")));
        assert!(!is_commit_flag(&json!(1)));
        assert!(!is_commit_flag(&json!("BLOCK_ID_FLAG_ABSENT")));
    }

    #[test]
    fn block_with_null_txs() {
        let r: BlockResult = serde_json::from_value(json!({
            "block_id": {"hash": "ABCD"},
            "block": {
                "header": {
                    "chain_id": "test-1",
                    "height": "3",
                    "time": "2023-05-01T10:00:00.123456789Z",
                    "last_block_id": {"hash": "PREV"},
                    "app_hash": "APP",
                    "proposer_address": "PROP"
                },
                "data": {"txs": null},
                "evidence": {"evidence": []},
                "last_commit": {"signatures": [
                    {"block_id_flag": 2, "validator_address": "V1", "timestamp": "2023-05-01T09:59:59Z", "signature": "x"},
                    {"block_id_flag": 1, "validator_address": "", "timestamp": "0001-01-01T00:00:00Z", "signature": null}
                ]}
            }
        }))
        .unwrap();
        let block = Block::try_from(r).unwrap();
        assert_eq!(block.height(), 3);
        assert!(block.txs.is_empty());
        assert_eq!(block.header.last_block_hash, "PREV");
        assert_eq!(block.signatures.len(), 2);
        assert!(block.signatures[0].signed);
        assert!(!block.signatures[1].signed);
    }

    #[test]
    fn bad_tx_base64_is_decode_error() {
        let r: BlockResult = serde_json::from_value(json!({
            "block_id": {"hash": "H"},
            "block": {
                "header": {"chain_id": "c", "height": "1", "time": "2023-01-01T00:00:00Z"},
                "data": {"txs": ["***"]}
            }
        }))
        .unwrap();
        assert!(matches!(Block::try_from(r), Err(RpcError::Decode(_))));
    }
}
