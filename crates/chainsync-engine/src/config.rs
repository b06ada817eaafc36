//! Engine configuration.
//!
//! ```yaml
//! chain_rpc_url: http://localhost:26657
//! app_rpc_url: http://localhost:1317
//! window_size: 20
//! starting_block_height: 1500000
//! storage: sqlite:./chainsync.db
//! log:
//!   level: info
//!   components:
//!     chainsync-engine: debug
//! ```
//!
//! Every field has a default, so a file only needs the keys it overrides.

use std::path::Path;
use std::time::Duration;

use chainsync_core::types::Height;
use chainsync_core::SyncError;
use chainsync_observability::LogConfig;
use chainsync_parser::{AddressPrefixes, ParserConfig};
use chainsync_rpc::{CacheConfig, HttpClientConfig, RetryConfig};
use chainsync_storage::StorageTarget;
use serde::{Deserialize, Serialize};

/// Configuration for a [`SyncManager`](crate::SyncManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Cursor key of the event handler.
    pub handler_id: String,
    /// Tendermint RPC endpoint.
    pub chain_rpc_url: String,
    /// Cosmos SDK REST endpoint.
    pub app_rpc_url: String,
    /// Heights fetched concurrently per window.
    pub window_size: u64,
    pub polling_interval_ms: u64,
    /// First backoff delay after a failed attempt.
    pub initial_retry_interval_ms: u64,
    /// Cap on the backoff delay.
    pub max_retry_interval_ms: u64,
    /// Heights below this are skipped once genesis has been indexed.
    pub starting_block_height: Height,
    /// Transaction lookups in flight per height.
    pub tx_concurrency: usize,
    pub account_address_prefix: String,
    /// Defaults to `<account prefix>valoper` when empty.
    pub validator_address_prefix: String,
    /// Defaults to `<account prefix>valcons` when empty.
    pub con_node_address_prefix: String,
    pub staking_denom: String,
    pub strict_genesis_parsing: bool,
    pub strict_messages: bool,
    pub base64_encoded_event_attributes: bool,
    pub request_timeout_ms: u64,
    /// Per-request retries of the HTTP clients.
    pub rpc_max_retries: u32,
    pub cache_short_ttl_secs: u64,
    pub cache_long_ttl_secs: u64,
    /// `memory`, `sqlite:<path>` or `postgres://…`.
    pub storage: String,
    pub log: LogConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            handler_id: "chainsync".into(),
            chain_rpc_url: "http://localhost:26657".into(),
            app_rpc_url: "http://localhost:1317".into(),
            window_size: 10,
            polling_interval_ms: 5_000,
            initial_retry_interval_ms: 1_000,
            max_retry_interval_ms: 60_000,
            starting_block_height: 0,
            tx_concurrency: 10,
            account_address_prefix: "cosmos".into(),
            validator_address_prefix: String::new(),
            con_node_address_prefix: String::new(),
            staking_denom: "uatom".into(),
            strict_genesis_parsing: false,
            strict_messages: false,
            base64_encoded_event_attributes: false,
            request_timeout_ms: 30_000,
            rpc_max_retries: 3,
            cache_short_ttl_secs: 10,
            cache_long_ttl_secs: 600,
            storage: "memory".into(),
            log: LogConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, SyncError> {
        serde_yaml::from_str(yaml).map_err(|e| SyncError::Config(format!("invalid config: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&yaml)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), SyncError> {
        let fail = |msg: &str| Err(SyncError::Config(msg.to_string()));
        if self.chain_rpc_url.trim().is_empty() {
            return fail("chain_rpc_url must not be empty");
        }
        if self.app_rpc_url.trim().is_empty() {
            return fail("app_rpc_url must not be empty");
        }
        if self.window_size == 0 {
            return fail("window_size must be > 0");
        }
        if self.tx_concurrency == 0 {
            return fail("tx_concurrency must be > 0");
        }
        if self.account_address_prefix.is_empty() {
            return fail("account_address_prefix must not be empty");
        }
        if self.initial_retry_interval_ms > self.max_retry_interval_ms {
            return fail("initial_retry_interval_ms must not exceed max_retry_interval_ms");
        }
        self.storage_target().map(|_| ())
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn prefixes(&self) -> AddressPrefixes {
        let mut prefixes = AddressPrefixes::from_account_prefix(&self.account_address_prefix);
        if !self.validator_address_prefix.is_empty() {
            prefixes.validator = self.validator_address_prefix.clone();
        }
        if !self.con_node_address_prefix.is_empty() {
            prefixes.consensus = self.con_node_address_prefix.clone();
        }
        prefixes
    }

    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            prefixes: self.prefixes(),
            staking_denom: self.staking_denom.clone(),
            strict_genesis_parsing: self.strict_genesis_parsing,
            strict_messages: self.strict_messages,
            base64_encoded_event_attributes: self.base64_encoded_event_attributes,
        }
    }

    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            retry: RetryConfig {
                max_retries: Some(self.rpc_max_retries),
                ..RetryConfig::default()
            },
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            ..HttpClientConfig::default()
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            short_ttl: Duration::from_secs(self.cache_short_ttl_secs),
            long_ttl: Duration::from_secs(self.cache_long_ttl_secs),
            ..CacheConfig::default()
        }
    }

    /// Unbounded backoff used between failed sync attempts.
    pub fn backoff_config(&self) -> RetryConfig {
        RetryConfig::unbounded(
            Duration::from_millis(self.initial_retry_interval_ms),
            Duration::from_millis(self.max_retry_interval_ms),
        )
    }

    pub fn storage_target(&self) -> Result<StorageTarget, SyncError> {
        self.storage.parse()
    }
}
