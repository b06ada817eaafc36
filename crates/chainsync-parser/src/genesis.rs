//! Genesis → commands.

use std::collections::HashSet;

use chainsync_core::event::{GenesisAccountBalanceCreated, GenesisCreated, GenesisValidatorCreated};
use chainsync_core::msg::{CommissionRates, MsgCreateValidatorParams, ValidatorDescription};
use chainsync_core::types::{Coin, Genesis};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::command::Command;
use crate::error::ParseError;
use crate::ParserConfig;

const CREATE_VALIDATOR: &str = "/cosmos.staking.v1beta1.MsgCreateValidator";

#[derive(Debug, Deserialize)]
struct StakingValidator {
    operator_address: String,
    #[serde(default)]
    consensus_pubkey: Value,
    #[serde(default)]
    jailed: bool,
    #[serde(default)]
    tokens: String,
    #[serde(default)]
    description: ValidatorDescription,
    commission: StakingCommission,
    #[serde(default)]
    min_self_delegation: String,
}

#[derive(Debug, Deserialize)]
struct StakingCommission {
    commission_rates: CommissionRates,
}

#[derive(Debug, Deserialize)]
struct GenTx {
    body: GenTxBody,
}

#[derive(Debug, Deserialize)]
struct GenTxBody {
    #[serde(default)]
    messages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Balance {
    address: String,
    #[serde(default)]
    coins: Vec<Coin>,
}

/// Parse the genesis document into its ordered command list:
/// `CreateGenesis`, validators from the staking section, validators created
/// by genesis transactions (skipping operators already seen), then one
/// `CreateGenesisAccountBalance` per bank balance.
///
/// Absent sections produce nothing. A malformed section fails the parse when
/// `strict_genesis_parsing` is set and is skipped with a warning otherwise.
pub fn parse_genesis_commands(
    genesis: &Genesis,
    config: &ParserConfig,
) -> Result<Vec<Command>, ParseError> {
    let mut commands = vec![Command::CreateGenesis(GenesisCreated {
        chain_id: genesis.chain_id.clone(),
        genesis_time: genesis.genesis_time,
        initial_height: genesis.initial_height,
    })];
    let app_state = &genesis.app_state;
    let mut operators = HashSet::new();

    let validators: Vec<StakingValidator> =
        section(app_state, &["staking", "validators"], config)?.unwrap_or_default();
    for v in validators {
        let checked = config.prefixes.check_validator(&v.operator_address);
        if accept(config, "staking.validators", checked)?.is_none() {
            continue;
        }
        operators.insert(v.operator_address.clone());
        commands.push(Command::CreateGenesisValidator(GenesisValidatorCreated {
            operator_address: v.operator_address,
            delegator_address: String::new(),
            consensus_pubkey: v.consensus_pubkey,
            description: v.description,
            commission: v.commission.commission_rates,
            min_self_delegation: v.min_self_delegation,
            tokens: v.tokens,
            jailed: v.jailed,
        }));
    }

    let gen_txs: Vec<GenTx> =
        section(app_state, &["genutil", "gen_txs"], config)?.unwrap_or_default();
    for msg in gen_txs.into_iter().flat_map(|tx| tx.body.messages) {
        if msg.get("@type").and_then(Value::as_str) != Some(CREATE_VALIDATOR) {
            continue;
        }
        let parsed = MsgCreateValidatorParams::deserialize(&msg)
            .map_err(|e| e.to_string())
            .and_then(|p| config.prefixes.check_validator(&p.validator_address).map(|_| p));
        let Some(p) = accept(config, "genutil.gen_txs", parsed)? else {
            continue;
        };
        if !operators.insert(p.validator_address.clone()) {
            debug!(operator = %p.validator_address, "gentx validator already in staking state");
            continue;
        }
        commands.push(Command::CreateGenesisValidator(GenesisValidatorCreated {
            operator_address: p.validator_address,
            delegator_address: p.delegator_address,
            consensus_pubkey: p.pubkey,
            description: p.description,
            commission: p.commission,
            min_self_delegation: p.min_self_delegation,
            tokens: p.value.amount,
            jailed: false,
        }));
    }

    let balances: Vec<Balance> =
        section(app_state, &["bank", "balances"], config)?.unwrap_or_default();
    for b in balances {
        let checked = config.prefixes.check_account(&b.address);
        if accept(config, "bank.balances", checked)?.is_none() {
            continue;
        }
        commands.push(Command::CreateGenesisAccountBalance(
            GenesisAccountBalanceCreated {
                address: b.address,
                coins: b.coins,
            },
        ));
    }

    Ok(commands)
}

/// Deserialize `app_state.<path>`; `None` when absent or skipped.
fn section<T: DeserializeOwned>(
    app_state: &Value,
    path: &[&str],
    config: &ParserConfig,
) -> Result<Option<T>, ParseError> {
    let Some(raw) = path.iter().try_fold(app_state, |v, key| v.get(key)) else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    accept(config, &path.join("."), T::deserialize(raw).map_err(|e| e.to_string()))
}

/// Apply the strictness setting to one fallible genesis item.
fn accept<T>(
    config: &ParserConfig,
    section: &str,
    item: Result<T, String>,
) -> Result<Option<T>, ParseError> {
    match item {
        Ok(v) => Ok(Some(v)),
        Err(reason) if config.strict_genesis_parsing => Err(ParseError::Genesis {
            section: section.to_string(),
            reason,
        }),
        Err(reason) => {
            warn!(section, %reason, "skipping malformed genesis entry");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsync_core::event::EventPayload;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    const OPERATOR: &str = "cosmosvaloper1qyqszqgpqyqszqgpqyqszqgpqyqszqgp8apuhz";
    const GENTX_OPERATOR: &str = "cosmosvaloper1zgfprpxyqszqgpqyqszqgpqyqszqgpl2wgsa";
    const ACCOUNT: &str = "cosmos1qyqszqgpqyqszqgpqyqszqgpqyqszqgpjnp7du";

    fn genesis(app_state: Value) -> Genesis {
        Genesis {
            genesis_time: DateTime::<Utc>::UNIX_EPOCH,
            chain_id: "testhub-1".into(),
            initial_height: 1,
            app_state,
        }
    }

    fn create_validator(operator: &str) -> Value {
        json!({
            "@type": CREATE_VALIDATOR,
            "description": {"moniker": "gentx"},
            "commission": {"rate": "0.1", "max_rate": "0.2", "max_change_rate": "0.01"},
            "min_self_delegation": "1",
            "delegator_address": ACCOUNT,
            "validator_address": operator,
            "pubkey": {"@type": "/cosmos.crypto.ed25519.PubKey", "key": "AAAA"},
            "value": {"denom": "uatom", "amount": "1000"}
        })
    }

    fn full_state() -> Value {
        json!({
            "staking": {"validators": [{
                "operator_address": OPERATOR,
                "consensus_pubkey": {"@type": "/cosmos.crypto.ed25519.PubKey", "key": "BBBB"},
                "jailed": false,
                "tokens": "5000",
                "description": {"moniker": "staked"},
                "commission": {"commission_rates": {"rate": "0.05", "max_rate": "0.2", "max_change_rate": "0.01"}},
                "min_self_delegation": "1"
            }]},
            "genutil": {"gen_txs": [
                {"body": {"messages": [create_validator(OPERATOR)]}},
                {"body": {"messages": [create_validator(GENTX_OPERATOR)]}}
            ]},
            "bank": {"balances": [
                {"address": ACCOUNT, "coins": [{"denom": "uatom", "amount": "42"}]}
            ]}
        })
    }

    #[test]
    fn genesis_command_order() {
        let cmds = parse_genesis_commands(&genesis(full_state()), &ParserConfig::default()).unwrap();
        let names: Vec<_> = cmds.iter().map(Command::name).collect();
        assert_eq!(
            names,
            [
                "CreateGenesis",
                "CreateGenesisValidator",
                "CreateGenesisValidator",
                "CreateGenesisAccountBalance"
            ]
        );
        assert!(cmds.iter().all(|c| c.height() == 0));
        match cmds[2].execute().unwrap().payload {
            EventPayload::GenesisValidatorCreated(v) => {
                assert_eq!(v.operator_address, GENTX_OPERATOR);
                assert_eq!(v.tokens, "1000");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_sections_are_empty() {
        let cmds = parse_genesis_commands(&genesis(json!({})), &ParserConfig::default()).unwrap();
        assert_eq!(cmds.len(), 1);
        let ev = cmds[0].execute().unwrap();
        assert_eq!((ev.height, ev.name.as_str()), (0, "GenesisCreated"));
    }

    #[test]
    fn malformed_section_strictness() {
        let state = json!({
            "bank": {"balances": "not-a-list"},
            "staking": {"validators": []}
        });
        let lenient = parse_genesis_commands(&genesis(state.clone()), &ParserConfig::default()).unwrap();
        assert_eq!(lenient.len(), 1);

        let strict = ParserConfig {
            strict_genesis_parsing: true,
            ..Default::default()
        };
        let err = parse_genesis_commands(&genesis(state), &strict).unwrap_err();
        assert!(matches!(err, ParseError::Genesis { ref section, .. } if section == "bank.balances"));
    }

    #[test]
    fn foreign_prefix_balances() {
        let state = json!({"bank": {"balances": [
            {"address": "osmo1qyqszqgpqyqszqgp", "coins": []},
            {"address": ACCOUNT, "coins": []}
        ]}});
        let cmds = parse_genesis_commands(&genesis(state.clone()), &ParserConfig::default()).unwrap();
        assert_eq!(cmds.len(), 2);

        let strict = ParserConfig {
            strict_genesis_parsing: true,
            ..Default::default()
        };
        assert!(parse_genesis_commands(&genesis(state), &strict).is_err());
    }
}
