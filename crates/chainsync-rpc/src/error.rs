//! Transport and API error types for the chain and app clients.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur while talking to the consensus node or the app API.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// Connection refused, reset, DNS failure and similar.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Non-success HTTP status without a recognised error body.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// HTTP 404 for the given path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Too many redirects or a redirect loop.
    #[error("Redirect error: {0}")]
    Redirect(String),

    /// Certificate or handshake failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Endpoint URL with a scheme other than http / https.
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Endpoint URL that does not parse.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// JSON-RPC error object returned by the consensus node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Embedded `{code, message}` error returned by the app API.
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account has no delegation: {0}")]
    AccountNoDelegation(String),

    /// Response body could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Payload could not be decoded (base64, timestamps, integers).
    #[error("Decode error: {0}")]
    Decode(String),
}

/// gRPC `NOT_FOUND`, surfaced by the Cosmos REST gateway as an embedded code.
pub const CODE_NOT_FOUND: i64 = 5;

impl RpcError {
    /// Returns `true` if this error is retryable (transient).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` for the "resource does not exist" family.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::AccountNotFound(_))
            || matches!(self, Self::Api { code, .. } if *code == CODE_NOT_FOUND)
    }

    /// Classify a `reqwest` failure.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            return Self::Timeout { ms: timeout_ms };
        }
        if err.is_redirect() {
            return Self::Redirect(err.to_string());
        }
        if err.is_builder() {
            return Self::InvalidUrl(err.to_string());
        }
        if source_chain_mentions(&err, &["certificate", "tls", "handshake"]) {
            return Self::Tls(err.to_string());
        }
        if err.is_decode() {
            return Self::Deserialization(err.to_string());
        }
        Self::Http(err.to_string())
    }
}

fn source_chain_mentions(err: &(dyn std::error::Error + 'static), needles: &[&str]) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        let msg = e.to_string().to_lowercase();
        if needles.iter().any(|n| msg.contains(n)) {
            return true;
        }
        current = e.source();
    }
    false
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        Self::Deserialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(RpcError::Http("connection refused".into()).is_retryable());
        assert!(RpcError::Timeout { ms: 100 }.is_retryable());
        assert!(RpcError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(RpcError::Status { status: 503, body: String::new() }.is_retryable());

        assert!(!RpcError::Status { status: 400, body: String::new() }.is_retryable());
        assert!(!RpcError::NotFound("/block".into()).is_retryable());
        assert!(!RpcError::Redirect("loop".into()).is_retryable());
        assert!(!RpcError::Tls("bad certificate".into()).is_retryable());
        assert!(!RpcError::UnsupportedScheme("ftp".into()).is_retryable());
        assert!(!RpcError::Api { code: 5, message: "not found".into() }.is_retryable());
    }

    #[test]
    fn not_found_family() {
        assert!(RpcError::NotFound("/x".into()).is_not_found());
        assert!(RpcError::Api { code: 5, message: String::new() }.is_not_found());
        assert!(!RpcError::Api { code: 3, message: String::new() }.is_not_found());
        assert!(!RpcError::AccountNoDelegation("a".into()).is_not_found());
    }
}
