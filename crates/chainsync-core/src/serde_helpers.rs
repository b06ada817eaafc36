//! Serde helpers for the string-encoded integers used by Tendermint and the
//! Cosmos REST API (`"height": "12345"`).

use serde::{de, Deserialize, Deserializer, Serializer};

/// `u64` encoded as a JSON string (plain numbers are accepted as well).
pub mod string_u64 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        match StringOrNumber::deserialize(d)? {
            StringOrNumber::String(s) if s.is_empty() => Ok(0),
            StringOrNumber::String(s) => s.parse().map_err(de::Error::custom),
            StringOrNumber::Number(n) => Ok(n as u64),
        }
    }
}

/// `i64` encoded as a JSON string (plain numbers are accepted as well).
pub mod string_i64 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &i64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        match StringOrNumber::deserialize(d)? {
            StringOrNumber::String(s) if s.is_empty() => Ok(0),
            StringOrNumber::String(s) => s.parse().map_err(de::Error::custom),
            StringOrNumber::Number(n) => Ok(n),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(i64),
}

/// Parse a string-encoded `u64`, treating an empty string as zero.
pub fn parse_u64(s: &str) -> Result<u64, std::num::ParseIntError> {
    if s.is_empty() {
        Ok(0)
    } else {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Wrapped {
        #[serde(with = "super::string_u64")]
        height: u64,
        #[serde(with = "super::string_i64")]
        power: i64,
    }

    #[test]
    fn accepts_strings_and_numbers() {
        let a: Wrapped = serde_json::from_str(r#"{"height":"12","power":"-3"}"#).unwrap();
        let b: Wrapped = serde_json::from_str(r#"{"height":12,"power":-3}"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.height, 12);
        assert_eq!(a.power, -3);
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&Wrapped { height: 7, power: 1 }).unwrap();
        assert_eq!(json, r#"{"height":"7","power":"1"}"#);
    }

    #[test]
    fn empty_string_is_zero() {
        let w: Wrapped = serde_json::from_str(r#"{"height":"","power":""}"#).unwrap();
        assert_eq!(w.height, 0);
        assert_eq!(w.power, 0);
    }
}
