//! ABCI event and coin-string helpers.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chainsync_core::types::{AbciAttribute, AbciEvent, Coin};
use chrono::{DateTime, Utc};

// ─── Coins ────────────────────────────────────────────────────────────────────

/// Split a coin string into amount and denom.
/// e.g. `"1000000uatom"` → `("1000000", "uatom")`, `"9ibc/ABC"` → `("9", "ibc/ABC")`.
fn split_denom(s: &str) -> (&str, &str) {
    let end = s
        .find(|c: char| c.is_alphabetic() || c == '/')
        .unwrap_or(s.len());
    (&s[..end], &s[end..])
}

/// Parse a comma-separated (decimal) coin list as found in event attributes,
/// e.g. `"12.5uatom,3ibc/27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2"`.
///
/// An empty string yields an empty list.
pub fn parse_dec_coins(s: &str) -> Result<Vec<Coin>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (amount, denom) = split_denom(part);
            if amount.is_empty() || denom.is_empty() {
                return Err(format!("invalid coin {part:?}"));
            }
            if !amount.chars().all(|c| c.is_ascii_digit() || c == '.') {
                return Err(format!("invalid coin amount {amount:?}"));
            }
            Ok(Coin::new(amount, denom))
        })
        .collect()
}

// ─── Event lookup ─────────────────────────────────────────────────────────────

/// First value of `key` on the first event of type `kind`.
pub fn find_attr<'a>(events: &[&'a AbciEvent], kind: &str, key: &str) -> Option<&'a str> {
    events
        .iter()
        .filter(|e| e.kind == kind)
        .find_map(|e| e.attribute(key))
}

/// Coins summed across every `kind` event's `key` attribute, in order of appearance.
pub fn collect_coins(events: &[&AbciEvent], kind: &str, key: &str) -> Result<Vec<Coin>, String> {
    let mut out = Vec::new();
    for ev in events.iter().filter(|e| e.kind == kind) {
        if let Some(v) = ev.attribute(key) {
            out.extend(parse_dec_coins(v)?);
        }
    }
    Ok(out)
}

pub fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp {s:?}: {e}"))
}

/// Decode base64-encoded attribute keys and values (Tendermint ≤ 0.34).
pub fn decode_base64_event(event: &AbciEvent) -> Result<AbciEvent, String> {
    let decode = |s: &str| -> Result<String, String> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| format!("{}: {s:?}: {e}", event.kind))?;
        String::from_utf8(bytes).map_err(|e| format!("{}: {e}", event.kind))
    };
    let attributes = event
        .attributes
        .iter()
        .map(|a| {
            Ok(AbciAttribute {
                key: decode(&a.key)?,
                value: decode(&a.value)?,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;
    Ok(AbciEvent {
        kind: event.kind.clone(),
        attributes,
    })
}

// ─── Address prefixes ─────────────────────────────────────────────────────────

/// Bech32 human-readable prefixes of the indexed chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPrefixes {
    /// e.g. `cosmos`.
    pub account: String,
    /// e.g. `cosmosvaloper`.
    pub validator: String,
    /// e.g. `cosmosvalcons`.
    pub consensus: String,
}

impl AddressPrefixes {
    /// Derive the conventional validator / consensus prefixes from an account prefix.
    pub fn from_account_prefix(account: &str) -> Self {
        Self {
            account: account.to_string(),
            validator: format!("{account}valoper"),
            consensus: format!("{account}valcons"),
        }
    }

    pub fn check_account(&self, address: &str) -> Result<(), String> {
        check_prefix(address, &self.account, "account")
    }

    pub fn check_validator(&self, address: &str) -> Result<(), String> {
        check_prefix(address, &self.validator, "validator")
    }

    pub fn check_consensus(&self, address: &str) -> Result<(), String> {
        check_prefix(address, &self.consensus, "consensus")
    }
}

impl Default for AddressPrefixes {
    fn default() -> Self {
        Self::from_account_prefix("cosmos")
    }
}

/// `address` must be `<prefix>1<data>` with non-empty lower-case data.
fn check_prefix(address: &str, prefix: &str, what: &str) -> Result<(), String> {
    let data = address
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('1'))
        .filter(|d| !d.is_empty())
        .ok_or_else(|| format!("{what} address {address:?} does not start with {prefix}1"))?;
    if !data.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
        return Err(format!("{what} address {address:?} has invalid characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dec_coin_lists() {
        assert_eq!(
            parse_dec_coins("12.5uatom,3ibc/ABC").unwrap(),
            vec![Coin::new("12.5", "uatom"), Coin::new("3", "ibc/ABC")]
        );
        assert!(parse_dec_coins("").unwrap().is_empty());
        assert!(parse_dec_coins("uatom").is_err());
        assert!(parse_dec_coins("100").is_err());
    }

    #[test]
    fn attribute_lookup_across_events() {
        let a = AbciEvent::new("transfer").with("amount", "1uatom");
        let b = AbciEvent::new("withdraw_rewards").with("amount", "2uatom");
        let c = AbciEvent::new("withdraw_rewards").with("amount", "3uatom,4uosmo");
        let events = vec![&a, &b, &c];
        assert_eq!(find_attr(&events, "withdraw_rewards", "amount"), Some("2uatom"));
        assert_eq!(collect_coins(&events, "withdraw_rewards", "amount").unwrap().len(), 3);
    }

    #[test]
    fn legacy_base64_attributes() {
        let ev = AbciEvent::new("mint").with("YW1vdW50", "MTAw");
        let decoded = decode_base64_event(&ev).unwrap();
        assert_eq!(decoded.attribute("amount"), Some("100"));
        assert!(decode_base64_event(&AbciEvent::new("mint").with("***", "x")).is_err());
    }

    #[test]
    fn prefix_checks() {
        let p = AddressPrefixes::from_account_prefix("osmo");
        assert_eq!(p.validator, "osmovaloper");
        assert!(p.check_account("osmo1qyqszqgpqyqszqgpqyqszqgpqyqszqgpjnp7du").is_ok());
        assert!(p.check_account("cosmos1qyqszqgpqyqszqgp").is_err());
        assert!(p.check_account("osmo1").is_err());
        assert!(p.check_account("osmo1ABC").is_err());
        assert!(p.check_validator("osmovaloper1abc").is_ok());
        assert!(p.check_consensus("osmovalcons1abc").is_ok());
    }

    #[test]
    fn rfc3339_times() {
        assert!(parse_time("2024-03-01T12:00:00.123456789Z").is_ok());
        assert!(parse_time("yesterday").is_err());
    }
}
