//! Shared HTTP GET transport for the chain and app clients.
//!
//! Features:
//! - Automatic retry with exponential backoff for transient errors
//! - Embedded error detection (`{"error": {...}}` and `{"code": n, "message": ...}`)
//! - Endpoint paths joined onto a base URL that may carry a path prefix

use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::error::RpcError;
use crate::policy::{RetryConfig, RetryPolicy};
use crate::request::JsonRpcError;

/// Configuration shared by `HttpChainClient` and `HttpAppClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub retry: RetryConfig,
    pub request_timeout: Duration,
    /// Maximum redirects followed before failing with `RpcError::Redirect`.
    pub max_redirects: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(30),
            max_redirects: 5,
        }
    }
}

/// GET-only JSON transport with retry.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base: Url,
    http: reqwest::Client,
    retry: RetryPolicy,
    timeout_ms: u64,
}

impl HttpTransport {
    pub fn new(url: &str, config: HttpClientConfig) -> Result<Self, RpcError> {
        let mut base = Url::parse(url).map_err(|e| RpcError::InvalidUrl(format!("{url}: {e}")))?;
        match base.scheme() {
            "http" | "https" => {}
            other => return Err(RpcError::UnsupportedScheme(other.to_string())),
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| RpcError::Http(e.to_string()))?;

        Ok(Self {
            base,
            http,
            retry: RetryPolicy::new(config.retry),
            timeout_ms: config.request_timeout.as_millis() as u64,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve `path` against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, RpcError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| RpcError::InvalidUrl(format!("{path}: {e}")))
    }

    /// GET `path?query`, retrying transient failures.
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, RpcError> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.get_once(&url).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            url = %url,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(attempt, error = %e, url = %url, "max retries exceeded");
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(&self, url: &Url) -> Result<Value, RpcError> {
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(e, self.timeout_ms))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| RpcError::from_reqwest(e, self.timeout_ms))?;
        let json: Option<Value> = serde_json::from_str(&body).ok();
        let embedded = json.as_ref().and_then(embedded_error);

        if is_transient(status) {
            // Tendermint answers every handled JSON-RPC error with a 500.
            if let Some(err @ RpcError::Rpc(_)) = embedded {
                if status == reqwest::StatusCode::INTERNAL_SERVER_ERROR {
                    return Err(err);
                }
            }
            return Err(RpcError::Status {
                status: status.as_u16(),
                body: truncate(&body, 512),
            });
        }
        if let Some(err) = embedded {
            return Err(err);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RpcError::NotFound(url.path().to_string()));
        }
        if !status.is_success() {
            return Err(RpcError::Status {
                status: status.as_u16(),
                body: truncate(&body, 512),
            });
        }

        json.ok_or_else(|| {
            RpcError::Deserialization(format!("non-JSON body from {}: {}", url, truncate(&body, 128)))
        })
    }
}

fn is_transient(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Detect error payloads that may arrive with any HTTP status.
fn embedded_error(value: &Value) -> Option<RpcError> {
    if let Some(err) = value.get("error").filter(|e| e.is_object()) {
        if let Ok(rpc) = serde_json::from_value::<JsonRpcError>(err.clone()) {
            return Some(RpcError::Rpc(rpc));
        }
    }
    let code = value.get("code").and_then(Value::as_i64)?;
    if code == 0 {
        return None;
    }
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(RpcError::Api { code, message })
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn fast_config(max_retries: u32) -> HttpClientConfig {
        HttpClientConfig {
            retry: RetryConfig {
                max_retries: Some(max_retries),
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
                multiplier: 2.0,
                jitter_fraction: 0.0,
            },
            request_timeout: Duration::from_secs(5),
            max_redirects: 5,
        }
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let err = HttpTransport::new("ftp://node:26657", fast_config(0)).unwrap_err();
        assert!(matches!(err, RpcError::UnsupportedScheme(s) if s == "ftp"));
        assert!(matches!(
            HttpTransport::new("not a url", fast_config(0)).unwrap_err(),
            RpcError::InvalidUrl(_)
        ));
    }

    #[test]
    fn endpoint_keeps_path_prefix() {
        let t = HttpTransport::new("http://gateway:1317/cosmoshub", fast_config(0)).unwrap();
        let url = t.endpoint("/cosmos/tx/v1beta1/txs/AB").unwrap();
        assert_eq!(url.as_str(), "http://gateway:1317/cosmoshub/cosmos/tx/v1beta1/txs/AB");
    }

    #[test]
    fn embedded_errors() {
        assert!(matches!(
            embedded_error(&json!({"code": 5, "message": "account not found"})),
            Some(RpcError::Api { code: 5, .. })
        ));
        assert!(matches!(
            embedded_error(&json!({"jsonrpc": "2.0", "error": {"code": -32603, "message": "x"}})),
            Some(RpcError::Rpc(_))
        ));
        assert!(embedded_error(&json!({"code": 0, "message": ""})).is_none());
        assert!(embedded_error(&json!({"result": {}})).is_none());
    }

    #[tokio::test]
    async fn retries_server_errors_then_gives_up() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/status");
                then.status(503).body("unavailable");
            })
            .await;

        let t = HttpTransport::new(&server.base_url(), fast_config(2)).unwrap();
        let err = t.get_json("status", &[]).await.unwrap_err();
        assert!(matches!(err, RpcError::Status { status: 503, .. }));
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn retries_server_errors_with_json_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/cosmos/tx/v1beta1/txs/AB");
                then.status(503)
                    .json_body(json!({"code": 14, "message": "unavailable", "details": []}));
            })
            .await;

        let t = HttpTransport::new(&server.base_url(), fast_config(2)).unwrap();
        let err = t.get_json("cosmos/tx/v1beta1/txs/AB", &[]).await.unwrap_err();
        assert!(matches!(err, RpcError::Status { status: 503, .. }));
        assert!(err.is_retryable());
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn retries_rate_limited_json_rpc_error() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/status");
                then.status(429).json_body(json!({
                    "jsonrpc": "2.0", "id": -1,
                    "error": {"code": -32000, "message": "too many requests"}
                }));
            })
            .await;

        let t = HttpTransport::new(&server.base_url(), fast_config(1)).unwrap();
        let err = t.get_json("status", &[]).await.unwrap_err();
        assert!(matches!(err, RpcError::Status { status: 429, .. }));
        mock.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn embedded_api_error_with_client_status_is_final() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/cosmos/auth/v1beta1/accounts/x");
                then.status(400)
                    .json_body(json!({"code": 3, "message": "invalid address", "details": []}));
            })
            .await;

        let t = HttpTransport::new(&server.base_url(), fast_config(3)).unwrap();
        let err = t.get_json("cosmos/auth/v1beta1/accounts/x", &[]).await.unwrap_err();
        assert!(matches!(err, RpcError::Api { code: 3, .. }));
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404).body("404 page not found");
            })
            .await;

        let t = HttpTransport::new(&server.base_url(), fast_config(3)).unwrap();
        let err = t.get_json("/missing", &[]).await.unwrap_err();
        assert!(matches!(err, RpcError::NotFound(_)));
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn passes_query_parameters() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/block").query_param("height", "12");
                then.status(200).json_body(json!({"result": {"ok": true}}));
            })
            .await;

        let t = HttpTransport::new(&server.base_url(), fast_config(0)).unwrap();
        let v = t.get_json("block", &[("height", "12".into())]).await.unwrap();
        assert_eq!(v["result"]["ok"], true);
        mock.assert_async().await;
    }
}
