//! Account decoding keyed by the `@type` URL of the `Any` JSON object.
//!
//! Known account kinds decode into typed variants; anything else becomes
//! [`Account::Unknown`] instead of an error.

use chainsync_core::serde_helpers::{string_i64, string_u64};
use chainsync_core::types::Coin;
use serde::Deserialize;
use serde_json::Value;

use crate::error::RpcError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BaseAccount {
    pub address: String,
    #[serde(default)]
    pub pub_key: Option<Value>,
    #[serde(default, with = "string_u64")]
    pub account_number: u64,
    #[serde(default, with = "string_u64")]
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BaseVestingAccount {
    pub base_account: BaseAccount,
    #[serde(default)]
    pub original_vesting: Vec<Coin>,
    #[serde(default)]
    pub delegated_free: Vec<Coin>,
    #[serde(default)]
    pub delegated_vesting: Vec<Coin>,
    /// Unix seconds.
    #[serde(default, with = "string_i64")]
    pub end_time: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VestingPeriod {
    /// Seconds.
    #[serde(with = "string_i64")]
    pub length: i64,
    #[serde(default)]
    pub amount: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Account {
    Base(BaseAccount),
    Module {
        base: BaseAccount,
        name: String,
        permissions: Vec<String>,
    },
    ContinuousVesting {
        vesting: BaseVestingAccount,
        start_time: i64,
    },
    DelayedVesting(BaseVestingAccount),
    PeriodicVesting {
        vesting: BaseVestingAccount,
        start_time: i64,
        periods: Vec<VestingPeriod>,
    },
    Unknown {
        type_url: String,
        raw: Value,
    },
}

// Wire shapes of the composite account kinds.

#[derive(Deserialize)]
struct ModuleWire {
    base_account: BaseAccount,
    #[serde(default)]
    name: String,
    #[serde(default)]
    permissions: Vec<String>,
}

#[derive(Deserialize)]
struct ContinuousWire {
    base_vesting_account: BaseVestingAccount,
    #[serde(default, with = "string_i64")]
    start_time: i64,
}

#[derive(Deserialize)]
struct DelayedWire {
    base_vesting_account: BaseVestingAccount,
}

#[derive(Deserialize)]
struct PeriodicWire {
    base_vesting_account: BaseVestingAccount,
    #[serde(default, with = "string_i64")]
    start_time: i64,
    #[serde(default)]
    vesting_periods: Vec<VestingPeriod>,
}

/// Known account type URLs.
pub mod type_url {
    pub const BASE: &str = "/cosmos.auth.v1beta1.BaseAccount";
    pub const MODULE: &str = "/cosmos.auth.v1beta1.ModuleAccount";
    pub const CONTINUOUS_VESTING: &str = "/cosmos.vesting.v1beta1.ContinuousVestingAccount";
    pub const DELAYED_VESTING: &str = "/cosmos.vesting.v1beta1.DelayedVestingAccount";
    pub const PERIODIC_VESTING: &str = "/cosmos.vesting.v1beta1.PeriodicVestingAccount";
}

impl Account {
    /// Decode an account `Any` JSON object.
    ///
    /// Unknown type URLs yield [`Account::Unknown`]; a known type URL with a
    /// malformed body is an error.
    pub fn from_any(value: Value) -> Result<Self, RpcError> {
        let kind = value
            .get("@type")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::Decode("account without @type".into()))?
            .to_string();

        let decode_err = |e: serde_json::Error| RpcError::Decode(format!("{kind}: {e}"));
        let account = match kind.as_str() {
            type_url::BASE => Self::Base(serde_json::from_value(value).map_err(decode_err)?),
            type_url::MODULE => {
                let m: ModuleWire = serde_json::from_value(value).map_err(decode_err)?;
                Self::Module {
                    base: m.base_account,
                    name: m.name,
                    permissions: m.permissions,
                }
            }
            type_url::CONTINUOUS_VESTING => {
                let c: ContinuousWire = serde_json::from_value(value).map_err(decode_err)?;
                Self::ContinuousVesting {
                    vesting: c.base_vesting_account,
                    start_time: c.start_time,
                }
            }
            type_url::DELAYED_VESTING => {
                let d: DelayedWire = serde_json::from_value(value).map_err(decode_err)?;
                Self::DelayedVesting(d.base_vesting_account)
            }
            type_url::PERIODIC_VESTING => {
                let p: PeriodicWire = serde_json::from_value(value).map_err(decode_err)?;
                Self::PeriodicVesting {
                    vesting: p.base_vesting_account,
                    start_time: p.start_time,
                    periods: p.vesting_periods,
                }
            }
            _ => Self::Unknown {
                type_url: kind.clone(),
                raw: value,
            },
        };
        Ok(account)
    }

    /// The underlying base account, if the kind has one.
    pub fn base(&self) -> Option<&BaseAccount> {
        match self {
            Self::Base(b) | Self::Module { base: b, .. } => Some(b),
            Self::ContinuousVesting { vesting, .. }
            | Self::DelayedVesting(vesting)
            | Self::PeriodicVesting { vesting, .. } => Some(&vesting.base_account),
            Self::Unknown { .. } => None,
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.base().map(|b| b.address.as_str())
    }

    pub fn is_vesting(&self) -> bool {
        matches!(
            self,
            Self::ContinuousVesting { .. } | Self::DelayedVesting(_) | Self::PeriodicVesting { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_base_account() {
        let acc = Account::from_any(json!({
            "@type": "/cosmos.auth.v1beta1.BaseAccount",
            "address": "cosmos1abc",
            "pub_key": null,
            "account_number": "17",
            "sequence": "4"
        }))
        .unwrap();
        let base = acc.base().unwrap();
        assert_eq!(base.account_number, 17);
        assert_eq!(base.sequence, 4);
        assert!(!acc.is_vesting());
    }

    #[test]
    fn decodes_module_account() {
        let acc = Account::from_any(json!({
            "@type": "/cosmos.auth.v1beta1.ModuleAccount",
            "base_account": {"address": "cosmos1fee", "account_number": "7", "sequence": "0"},
            "name": "fee_collector",
            "permissions": []
        }))
        .unwrap();
        assert!(matches!(acc, Account::Module { ref name, .. } if name == "fee_collector"));
        assert_eq!(acc.address(), Some("cosmos1fee"));
    }

    #[test]
    fn decodes_periodic_vesting() {
        let acc = Account::from_any(json!({
            "@type": "/cosmos.vesting.v1beta1.PeriodicVestingAccount",
            "base_vesting_account": {
                "base_account": {"address": "cosmos1vest", "account_number": "9", "sequence": "1"},
                "original_vesting": [{"denom": "uatom", "amount": "1000"}],
                "delegated_free": [],
                "delegated_vesting": [],
                "end_time": "1700000000"
            },
            "start_time": "1600000000",
            "vesting_periods": [{"length": "86400", "amount": [{"denom": "uatom", "amount": "500"}]}]
        }))
        .unwrap();
        match acc {
            Account::PeriodicVesting { vesting, start_time, periods } => {
                assert_eq!(vesting.end_time, 1_700_000_000);
                assert_eq!(start_time, 1_600_000_000);
                assert_eq!(periods[0].length, 86_400);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let acc = Account::from_any(json!({
            "@type": "/ethermint.types.v1.EthAccount",
            "base_account": {"address": "evmos1x"}
        }))
        .unwrap();
        assert!(matches!(acc, Account::Unknown { ref type_url, .. } if type_url == "/ethermint.types.v1.EthAccount"));
        assert!(acc.address().is_none());
    }

    #[test]
    fn malformed_known_type_is_an_error() {
        let err = Account::from_any(json!({
            "@type": "/cosmos.auth.v1beta1.BaseAccount",
            "account_number": "1"
        }))
        .unwrap_err();
        assert!(matches!(err, RpcError::Decode(_)));
    }
}
