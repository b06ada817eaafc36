//! Block → commands.

use std::sync::Arc;

use chainsync_core::msg::MsgBase;
use chainsync_core::types::{AbciEvent, Block, BlockResults, Height, Tx};
use serde_json::Value;
use tracing::debug;

use crate::abci::decode_base64_event;
use crate::command::{BlockEventKind, Command, MsgCommand};
use crate::error::ParseError;
use crate::registry::{MsgKind, ParserRegistry};
use crate::ParserConfig;

/// Parse one block into its ordered command list.
///
/// Order: `CreateBlock`, begin-block events, then per transaction (in block
/// order) `CreateTransaction` followed by one command per recognised message
/// of a successful transaction, end-block events, finalize-block events and
/// finally validator power changes.
///
/// `txs` must hold the resolved transactions in block order with
/// `tx.index == position`.
pub fn parse_block_to_commands(
    registry: &ParserRegistry,
    block: &Block,
    results: &BlockResults,
    txs: &[Tx],
    config: &ParserConfig,
) -> Result<Vec<Command>, ParseError> {
    let height = block.height();
    let invalid = |reason: String| ParseError::Block { height, reason };

    if results.height != height {
        return Err(invalid(format!(
            "block results are for height {}",
            results.height
        )));
    }
    if txs.len() != block.txs.len() {
        return Err(invalid(format!(
            "{} transactions in block, {} resolved",
            block.txs.len(),
            txs.len()
        )));
    }

    let mut commands = Vec::with_capacity(1 + txs.len() * 2);
    commands.push(Command::CreateBlock(Arc::new(block.clone())));

    push_block_events(&mut commands, height, &results.begin_block_events, config)?;

    let context = config.msg_context();
    for (i, (tx, raw)) in txs.iter().zip(&block.txs).enumerate() {
        if tx.index != i {
            return Err(invalid(format!("transaction {} has index {}", i, tx.index)));
        }
        if !tx.hash.eq_ignore_ascii_case(&raw.hash()) {
            return Err(invalid(format!(
                "transaction {i} resolved as {} but block has {}",
                tx.hash,
                raw.hash()
            )));
        }

        commands.push(Command::CreateTransaction {
            height,
            tx: tx.clone(),
        });
        if !tx.is_success() {
            continue;
        }

        for (msg_index, msg) in tx.body.messages.iter().enumerate() {
            let type_url = msg.get("@type").and_then(Value::as_str).unwrap_or_default();
            let route = registry.resolve(type_url, height);
            if route.kind == MsgKind::Unknown {
                if config.strict_messages {
                    return Err(ParseError::UnknownMessage {
                        height,
                        tx_hash: tx.hash.clone(),
                        type_url: type_url.to_string(),
                    });
                }
                debug!(height, tx = %tx.hash, msg_index, type_url, "skipping unrecognised message");
                continue;
            }
            commands.push(Command::CreateMsg(MsgCommand {
                height,
                base: MsgBase {
                    tx_hash: tx.hash.clone(),
                    tx_index: i,
                    msg_index,
                },
                kind: route.kind,
                version: route.command_version,
                msg: msg.clone(),
                events: tx.message_events(msg_index).into_iter().cloned().collect(),
                context: Arc::clone(&context),
            }));
        }
    }

    push_block_events(&mut commands, height, &results.end_block_events, config)?;
    push_block_events(&mut commands, height, &results.finalize_block_events, config)?;

    commands.extend(
        results
            .validator_updates
            .iter()
            .cloned()
            .map(|update| Command::ChangePower { height, update }),
    );

    Ok(commands)
}

fn push_block_events(
    commands: &mut Vec<Command>,
    height: Height,
    events: &[AbciEvent],
    config: &ParserConfig,
) -> Result<(), ParseError> {
    for raw in events {
        let Some(kind) = BlockEventKind::from_event_type(&raw.kind) else {
            continue;
        };
        let event = if config.base64_encoded_event_attributes {
            decode_base64_event(raw).map_err(|reason| ParseError::Base64 { height, reason })?
        } else {
            raw.clone()
        };
        commands.push(Command::CreateBlockEvent {
            height,
            kind,
            event,
        });
    }
    Ok(())
}
