//! JSON-RPC 2.0 response envelope used by the Tendermint RPC.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC 2.0 error object.
///
/// Tendermint puts the useful detail in `data`, usually as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// `message` followed by `data` when present.
    pub fn detail(&self) -> String {
        match &self.data {
            Some(Value::String(s)) => format!("{}: {s}", self.message),
            Some(other) => format!("{}: {other}", self.message),
            None => self.message.clone(),
        }
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.detail())
    }
}

/// A JSON-RPC 2.0 response. The `id` is kept raw since Tendermint answers
/// plain GET requests with `-1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse<T = Value> {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default = "none", skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

fn none<T>() -> Option<T> {
    None
}

/// Either an error object or a missing result.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeError {
    Rpc(JsonRpcError),
    MissingResult,
}

impl<T> JsonRpcResponse<T> {
    /// Unwrap the result value or return the error.
    pub fn into_result(self) -> Result<T, EnvelopeError> {
        if let Some(err) = self.error {
            return Err(EnvelopeError::Rpc(err));
        }
        self.result.ok_or(EnvelopeError::MissingResult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_result_ok() {
        let resp: JsonRpcResponse<u32> =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":-1,"result":7}"#).unwrap();
        assert_eq!(resp.into_result().unwrap(), 7);
    }

    #[test]
    fn into_result_err_keeps_data() {
        let resp: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":-1,"error":{"code":-32603,"message":"Internal error","data":"height 10 must be less than or equal to the current blockchain height 5"}}"#,
        )
        .unwrap();
        match resp.into_result() {
            Err(EnvelopeError::Rpc(e)) => {
                assert_eq!(e.code, -32603);
                assert!(e.detail().contains("current blockchain height 5"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_result() {
        let resp: JsonRpcResponse = serde_json::from_str(r#"{"jsonrpc":"2.0","id":1}"#).unwrap();
        assert_eq!(resp.into_result().unwrap_err(), EnvelopeError::MissingResult);
    }
}
