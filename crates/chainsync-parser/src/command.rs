//! Commands: the unit of work between parsing and event emission.
//!
//! Parsing decides *what* happened at a height and produces an ordered list of
//! commands; executing a command turns it into exactly one [`Event`]. Execution
//! is pure: everything a command needs is captured when it is built.

use std::sync::Arc;

use chainsync_core::event::{
    BlockCreated, BlockReward, Event, EventPayload, GenesisAccountBalanceCreated, GenesisCreated,
    GenesisValidatorCreated, MintMinted, MsgEvent, PowerChanged, TransactionCreated,
    UnbondingCompleted, ValidatorSlashed,
};
use chainsync_core::msg::{
    MsgBase, MsgBeginRedelegateParams, MsgCreateValidatorParams, MsgDelegateParams,
    MsgDepositParams, MsgEditValidatorParams, MsgMultiSendParams, MsgParams, MsgSendParams,
    MsgSetWithdrawAddressParams, MsgSubmitProposalParams, MsgSubmitProposalV1Params,
    MsgUndelegateParams, MsgUnjailParams, MsgVoteParams, MsgWithdrawDelegatorRewardParams,
    MsgWithdrawValidatorCommissionParams,
};
use chainsync_core::serde_helpers::parse_u64;
use chainsync_core::types::{AbciEvent, Block, Coin, Height, Tx, ValidatorUpdate};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::abci::{collect_coins, find_attr, parse_dec_coins, parse_time, AddressPrefixes};
use crate::error::CommandError;
use crate::registry::MsgKind;

/// Chain settings message commands validate against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgContext {
    pub prefixes: AddressPrefixes,
    /// Bond denom; an empty string disables the check.
    pub staking_denom: String,
}

// ─── Block-level ABCI events ──────────────────────────────────────────────────

/// Block-level ABCI event types that produce an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEventKind {
    Mint,
    ProposerReward,
    Rewards,
    Commission,
    Slash,
    CompleteUnbonding,
}

impl BlockEventKind {
    pub fn from_event_type(kind: &str) -> Option<Self> {
        Some(match kind {
            "mint" => Self::Mint,
            "proposer_reward" => Self::ProposerReward,
            "rewards" => Self::Rewards,
            "commission" => Self::Commission,
            "slash" => Self::Slash,
            "complete_unbonding" => Self::CompleteUnbonding,
            _ => return None,
        })
    }

    fn command_name(&self) -> &'static str {
        match self {
            Self::Mint => "CreateMint",
            Self::ProposerReward => "CreateBlockProposerReward",
            Self::Rewards => "CreateBlockReward",
            Self::Commission => "CreateBlockCommission",
            Self::Slash => "CreateValidatorSlash",
            Self::CompleteUnbonding => "CompleteUnbonding",
        }
    }
}

// ─── Message commands ─────────────────────────────────────────────────────────

/// One recognised message of a successful transaction.
#[derive(Debug, Clone)]
pub struct MsgCommand {
    pub height: Height,
    pub base: MsgBase,
    pub kind: MsgKind,
    pub version: u32,
    /// The message as an `Any` JSON object.
    pub msg: Value,
    /// Events attributed to this message by the execution logs.
    pub events: Vec<AbciEvent>,
    pub context: Arc<MsgContext>,
}

impl MsgCommand {
    fn execute(&self) -> Result<Event, CommandError> {
        let params = self
            .decode()
            .map_err(|reason| CommandError::new(self.kind.command_name(), self.version, reason))?;
        Ok(Event::new(
            self.height,
            self.version,
            EventPayload::Msg(MsgEvent {
                base: self.base.clone(),
                params,
            }),
        ))
    }

    fn decode(&self) -> Result<MsgParams, String> {
        let prefixes = &self.context.prefixes;
        let events: Vec<&AbciEvent> = self.events.iter().collect();
        let completion_time = |kind: &str| -> Result<_, String> {
            find_attr(&events, kind, "completion_time")
                .map(parse_time)
                .transpose()
        };
        let claimed = || collect_coins(&events, "withdraw_rewards", "amount");

        Ok(match self.kind {
            MsgKind::Send => {
                let p: MsgSendParams = de(&self.msg)?;
                prefixes.check_account(&p.from_address)?;
                prefixes.check_account(&p.to_address)?;
                MsgParams::Send(p)
            }
            MsgKind::MultiSend => {
                let p: MsgMultiSendParams = de(&self.msg)?;
                for entry in p.inputs.iter().chain(p.outputs.iter()) {
                    prefixes.check_account(&entry.address)?;
                }
                MsgParams::MultiSend(p)
            }
            MsgKind::Delegate => {
                let mut p: MsgDelegateParams = de(&self.msg)?;
                prefixes.check_account(&p.delegator_address)?;
                prefixes.check_validator(&p.validator_address)?;
                self.check_denom(&p.amount)?;
                p.auto_claimed_rewards = claimed()?;
                MsgParams::Delegate(p)
            }
            MsgKind::Undelegate => {
                let mut p: MsgUndelegateParams = de(&self.msg)?;
                prefixes.check_account(&p.delegator_address)?;
                prefixes.check_validator(&p.validator_address)?;
                self.check_denom(&p.amount)?;
                p.completion_time = completion_time("unbond")?;
                p.auto_claimed_rewards = claimed()?;
                MsgParams::Undelegate(p)
            }
            MsgKind::BeginRedelegate => {
                let mut p: MsgBeginRedelegateParams = de(&self.msg)?;
                prefixes.check_account(&p.delegator_address)?;
                prefixes.check_validator(&p.validator_src_address)?;
                prefixes.check_validator(&p.validator_dst_address)?;
                self.check_denom(&p.amount)?;
                p.completion_time = completion_time("redelegate")?;
                p.auto_claimed_rewards = claimed()?;
                MsgParams::BeginRedelegate(p)
            }
            MsgKind::WithdrawDelegatorReward => {
                let mut p: MsgWithdrawDelegatorRewardParams = de(&self.msg)?;
                prefixes.check_account(&p.delegator_address)?;
                prefixes.check_validator(&p.validator_address)?;
                p.amount = claimed()?;
                MsgParams::WithdrawDelegatorReward(p)
            }
            MsgKind::WithdrawValidatorCommission => {
                let mut p: MsgWithdrawValidatorCommissionParams = de(&self.msg)?;
                prefixes.check_validator(&p.validator_address)?;
                p.amount = collect_coins(&events, "withdraw_commission", "amount")?;
                MsgParams::WithdrawValidatorCommission(p)
            }
            MsgKind::SetWithdrawAddress => {
                let p: MsgSetWithdrawAddressParams = de(&self.msg)?;
                prefixes.check_account(&p.delegator_address)?;
                prefixes.check_account(&p.withdraw_address)?;
                MsgParams::SetWithdrawAddress(p)
            }
            MsgKind::CreateValidator => {
                let p: MsgCreateValidatorParams = de(&self.msg)?;
                if !p.delegator_address.is_empty() {
                    prefixes.check_account(&p.delegator_address)?;
                }
                prefixes.check_validator(&p.validator_address)?;
                self.check_denom(&p.value)?;
                MsgParams::CreateValidator(p)
            }
            MsgKind::EditValidator => {
                let p: MsgEditValidatorParams = de(&self.msg)?;
                prefixes.check_validator(&p.validator_address)?;
                MsgParams::EditValidator(p)
            }
            MsgKind::SubmitProposal => {
                let proposal_id = find_attr(&events, "submit_proposal", "proposal_id")
                    .map(|v| parse_u64(v).map_err(|e| format!("invalid proposal_id {v:?}: {e}")))
                    .transpose()?;
                if self.version >= 2 {
                    let mut p: MsgSubmitProposalV1Params = de(&self.msg)?;
                    prefixes.check_account(&p.proposer)?;
                    p.proposal_id = proposal_id;
                    MsgParams::SubmitProposalV1(p)
                } else {
                    let mut p: MsgSubmitProposalParams = de(&self.msg)?;
                    prefixes.check_account(&p.proposer)?;
                    p.proposal_id = proposal_id;
                    MsgParams::SubmitProposal(p)
                }
            }
            MsgKind::Vote => {
                let p: MsgVoteParams = de(&self.msg)?;
                prefixes.check_account(&p.voter)?;
                MsgParams::Vote(p)
            }
            MsgKind::Deposit => {
                let p: MsgDepositParams = de(&self.msg)?;
                prefixes.check_account(&p.depositor)?;
                MsgParams::Deposit(p)
            }
            MsgKind::Unjail => {
                let p: MsgUnjailParams = de(&self.msg)?;
                prefixes.check_validator(&p.validator_addr)?;
                MsgParams::Unjail(p)
            }
            MsgKind::Unknown => return Err("no parser registered for message".into()),
        })
    }

    fn check_denom(&self, coin: &Coin) -> Result<(), String> {
        let want = &self.context.staking_denom;
        if !want.is_empty() && &coin.denom != want {
            return Err(format!("expected staking denom {want}, got {}", coin.denom));
        }
        Ok(())
    }
}

fn de<T: DeserializeOwned>(msg: &Value) -> Result<T, String> {
    T::deserialize(msg).map_err(|e| e.to_string())
}

// ─── Command ──────────────────────────────────────────────────────────────────

/// A parsed unit of work that produces exactly one event.
#[derive(Debug, Clone)]
pub enum Command {
    CreateGenesis(GenesisCreated),
    CreateGenesisValidator(GenesisValidatorCreated),
    CreateGenesisAccountBalance(GenesisAccountBalanceCreated),
    CreateBlock(Arc<Block>),
    CreateTransaction { height: Height, tx: Tx },
    CreateMsg(MsgCommand),
    CreateBlockEvent {
        height: Height,
        kind: BlockEventKind,
        event: AbciEvent,
    },
    ChangePower {
        height: Height,
        update: ValidatorUpdate,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateGenesis(_) => "CreateGenesis",
            Self::CreateGenesisValidator(_) => "CreateGenesisValidator",
            Self::CreateGenesisAccountBalance(_) => "CreateGenesisAccountBalance",
            Self::CreateBlock(_) => "CreateBlock",
            Self::CreateTransaction { .. } => "CreateTransaction",
            Self::CreateMsg(m) => m.kind.command_name(),
            Self::CreateBlockEvent { kind, .. } => kind.command_name(),
            Self::ChangePower { .. } => "ChangePower",
        }
    }

    pub fn version(&self) -> u32 {
        match self {
            Self::CreateMsg(m) => m.version,
            _ => 1,
        }
    }

    pub fn height(&self) -> Height {
        match self {
            Self::CreateGenesis(_)
            | Self::CreateGenesisValidator(_)
            | Self::CreateGenesisAccountBalance(_) => 0,
            Self::CreateBlock(block) => block.height(),
            Self::CreateTransaction { height, .. }
            | Self::CreateBlockEvent { height, .. }
            | Self::ChangePower { height, .. } => *height,
            Self::CreateMsg(m) => m.height,
        }
    }

    /// Produce this command's event.
    pub fn execute(&self) -> Result<Event, CommandError> {
        let height = self.height();
        let version = self.version();
        let fail = |reason: String| CommandError::new(self.name(), version, reason);

        let payload = match self {
            Self::CreateGenesis(g) => EventPayload::GenesisCreated(g.clone()),
            Self::CreateGenesisValidator(v) => EventPayload::GenesisValidatorCreated(v.clone()),
            Self::CreateGenesisAccountBalance(b) => {
                EventPayload::GenesisAccountBalanceCreated(b.clone())
            }
            Self::CreateBlock(block) => EventPayload::BlockCreated(BlockCreated {
                hash: block.hash.clone(),
                time: block.header.time,
                proposer_address: block.header.proposer_address.clone(),
                app_hash: block.header.app_hash.clone(),
                tx_count: block.txs.len(),
                signatures: block.signatures.clone(),
                evidence_count: block.evidence_count,
            }),
            Self::CreateTransaction { tx, .. } => {
                let created = transaction_created(tx);
                if created.success {
                    EventPayload::TransactionCreated(created)
                } else {
                    EventPayload::TransactionFailed(created)
                }
            }
            Self::CreateMsg(m) => return m.execute(),
            Self::CreateBlockEvent { kind, event, .. } => block_event(*kind, event).map_err(fail)?,
            Self::ChangePower { update, .. } => EventPayload::PowerChanged(PowerChanged {
                pub_key_type: update.pub_key_type.clone(),
                pub_key: update.pub_key.clone(),
                power: update.power,
            }),
        };
        Ok(Event::new(height, version, payload))
    }
}

fn transaction_created(tx: &Tx) -> TransactionCreated {
    TransactionCreated {
        hash: tx.hash.clone(),
        index: tx.index,
        success: tx.is_success(),
        code: tx.result.code,
        codespace: tx.result.codespace.clone(),
        log: tx.result.raw_log.clone(),
        fee: tx.auth_info.fee.clone(),
        gas_wanted: tx.result.gas_wanted,
        gas_used: tx.result.gas_used,
        memo: tx.body.memo.clone(),
        timeout_height: tx.body.timeout_height,
        message_types: tx
            .body
            .messages
            .iter()
            .map(|m| m.get("@type").and_then(Value::as_str).unwrap_or_default().to_string())
            .collect(),
        time: tx.result.timestamp,
    }
}

fn required<'a>(event: &'a AbciEvent, key: &str) -> Result<&'a str, String> {
    event
        .attribute(key)
        .ok_or_else(|| format!("{} event without '{key}'", event.kind))
}

fn block_event(kind: BlockEventKind, event: &AbciEvent) -> Result<EventPayload, String> {
    let attr = |key: &str| event.attribute(key).unwrap_or_default().to_string();
    let reward = || -> Result<BlockReward, String> {
        Ok(BlockReward {
            validator: required(event, "validator")?.to_string(),
            amount: parse_dec_coins(event.attribute("amount").unwrap_or_default())?,
        })
    };

    Ok(match kind {
        BlockEventKind::Mint => EventPayload::MintMinted(MintMinted {
            bonded_ratio: attr("bonded_ratio"),
            inflation: attr("inflation"),
            annual_provisions: attr("annual_provisions"),
            amount: required(event, "amount")?.to_string(),
        }),
        BlockEventKind::ProposerReward => EventPayload::BlockProposerRewarded(reward()?),
        BlockEventKind::Rewards => EventPayload::BlockRewarded(reward()?),
        BlockEventKind::Commission => EventPayload::BlockCommissioned(reward()?),
        BlockEventKind::Slash => {
            // jail-only slash events carry the address under `jailed`
            let jailed = event.attribute("jailed").map(str::to_string);
            let address = match event.attribute("address") {
                Some(a) => a.to_string(),
                None => jailed
                    .clone()
                    .ok_or_else(|| "slash event without 'address' or 'jailed'".to_string())?,
            };
            EventPayload::ValidatorSlashed(ValidatorSlashed {
                address,
                power: attr("power"),
                reason: attr("reason"),
                jailed,
                burned: event.attribute("burned_coins").map(str::to_string),
            })
        }
        BlockEventKind::CompleteUnbonding => EventPayload::UnbondingCompleted(UnbondingCompleted {
            delegator: required(event, "delegator")?.to_string(),
            validator: required(event, "validator")?.to_string(),
            amount: parse_dec_coins(event.attribute("amount").unwrap_or_default())?,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    const DELEGATOR: &str = "cosmos1qyqszqgpqyqszqgpqyqszqgpqyqszqgpjnp7du";
    const VALIDATOR: &str = "cosmosvaloper1qyqszqgpqyqszqgpqyqszqgpqyqszqgp8apuhz";

    fn ctx() -> Arc<MsgContext> {
        Arc::new(MsgContext {
            prefixes: AddressPrefixes::default(),
            staking_denom: "uatom".into(),
        })
    }

    fn msg(kind: MsgKind, version: u32, msg: Value, events: Vec<AbciEvent>) -> Command {
        Command::CreateMsg(MsgCommand {
            height: 42,
            base: MsgBase {
                tx_hash: "ABCD".into(),
                tx_index: 3,
                msg_index: 1,
            },
            kind,
            version,
            msg,
            events,
            context: ctx(),
        })
    }

    #[test]
    fn send_event() {
        let cmd = msg(
            MsgKind::Send,
            1,
            json!({
                "@type": "/cosmos.bank.v1beta1.MsgSend",
                "from_address": DELEGATOR,
                "to_address": DELEGATOR,
                "amount": [{"denom": "uatom", "amount": "5"}]
            }),
            vec![],
        );
        assert_eq!(cmd.name(), "CreateMsgSend");
        let ev = cmd.execute().unwrap();
        assert_eq!((ev.height, ev.name.as_str(), ev.version), (42, "MsgSendCreated", 1));
        match ev.payload {
            EventPayload::Msg(m) => assert_eq!(m.base.tx_index, 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn undelegate_reads_completion_time_and_claimed_rewards() {
        let cmd = msg(
            MsgKind::Undelegate,
            1,
            json!({
                "delegator_address": DELEGATOR,
                "validator_address": VALIDATOR,
                "amount": {"denom": "uatom", "amount": "100"}
            }),
            vec![
                AbciEvent::new("withdraw_rewards").with("amount", "7uatom"),
                AbciEvent::new("unbond").with("completion_time", "2024-03-22T10:00:00Z"),
            ],
        );
        let ev = cmd.execute().unwrap();
        let EventPayload::Msg(MsgEvent { params: MsgParams::Undelegate(p), .. }) = ev.payload else {
            panic!("unexpected payload");
        };
        assert_eq!(p.auto_claimed_rewards, vec![Coin::new("7", "uatom")]);
        assert_eq!(
            p.completion_time,
            Some("2024-03-22T10:00:00Z".parse::<DateTime<Utc>>().unwrap())
        );
    }

    #[test]
    fn delegate_rejects_foreign_denom() {
        let cmd = msg(
            MsgKind::Delegate,
            1,
            json!({
                "delegator_address": DELEGATOR,
                "validator_address": VALIDATOR,
                "amount": {"denom": "uosmo", "amount": "100"}
            }),
            vec![],
        );
        let err = cmd.execute().unwrap_err();
        assert_eq!((err.name.as_str(), err.version), ("CreateMsgDelegate", 1));
        assert!(err.reason.contains("uosmo"));
    }

    #[test]
    fn wrong_prefix_fails() {
        let cmd = msg(
            MsgKind::Vote,
            1,
            json!({"proposal_id": "1", "voter": "osmo1abc", "option": "VOTE_OPTION_NO"}),
            vec![],
        );
        assert!(cmd.execute().is_err());
    }

    #[test]
    fn submit_proposal_versions() {
        let events = vec![AbciEvent::new("submit_proposal").with("proposal_id", "17")];
        let v1 = msg(
            MsgKind::SubmitProposal,
            2,
            json!({"messages": [], "initial_deposit": [], "proposer": DELEGATOR, "title": "t"}),
            events.clone(),
        );
        let ev = v1.execute().unwrap();
        assert_eq!((ev.name.as_str(), ev.version), ("MsgSubmitProposalCreated", 2));
        let EventPayload::Msg(MsgEvent { params: MsgParams::SubmitProposalV1(p), .. }) = ev.payload else {
            panic!("expected gov v1 params");
        };
        assert_eq!(p.proposal_id, Some(17));

        let v1beta1 = msg(
            MsgKind::SubmitProposal,
            1,
            json!({"content": {"@type": "/cosmos.gov.v1beta1.TextProposal"}, "proposer": DELEGATOR}),
            events,
        );
        let ev = v1beta1.execute().unwrap();
        assert!(matches!(
            ev.payload,
            EventPayload::Msg(MsgEvent { params: MsgParams::SubmitProposal(_), .. })
        ));
    }

    #[test]
    fn slash_event_variants() {
        let slash = Command::CreateBlockEvent {
            height: 9,
            kind: BlockEventKind::Slash,
            event: AbciEvent::new("slash")
                .with("address", "cosmosvalcons1x")
                .with("power", "10")
                .with("reason", "missing_signature"),
        };
        let jail = Command::CreateBlockEvent {
            height: 9,
            kind: BlockEventKind::Slash,
            event: AbciEvent::new("slash").with("jailed", "cosmosvalcons1x"),
        };
        let empty = Command::CreateBlockEvent {
            height: 9,
            kind: BlockEventKind::Slash,
            event: AbciEvent::new("slash"),
        };
        assert_eq!(slash.execute().unwrap().name, "ValidatorSlashed");
        match jail.execute().unwrap().payload {
            EventPayload::ValidatorSlashed(s) => {
                assert_eq!(s.address, "cosmosvalcons1x");
                assert_eq!(s.jailed.as_deref(), Some("cosmosvalcons1x"));
            }
            other => panic!("unexpected {other:?}"),
        }
        let err = empty.execute().unwrap_err();
        assert_eq!(err.name, "CreateValidatorSlash");
    }

    #[test]
    fn rewards_with_empty_amount() {
        let cmd = Command::CreateBlockEvent {
            height: 5,
            kind: BlockEventKind::Rewards,
            event: AbciEvent::new("rewards").with("validator", VALIDATOR).with("amount", ""),
        };
        match cmd.execute().unwrap().payload {
            EventPayload::BlockRewarded(r) => assert!(r.amount.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(BlockEventKind::from_event_type("transfer"), None);
    }
}
