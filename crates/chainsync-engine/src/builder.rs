//! Fluent builder for [`SyncConfig`].
//!
//! # Example
//!
//! ```rust
//! use chainsync_engine::SyncConfigBuilder;
//!
//! let config = SyncConfigBuilder::new()
//!     .chain_rpc_url("http://localhost:26657")
//!     .app_rpc_url("http://localhost:1317")
//!     .window_size(20)
//!     .starting_height(1_500_000)
//!     .address_prefix("osmo")
//!     .build_config();
//! assert_eq!(config.window_size, 20);
//! ```

use chainsync_core::types::Height;

use crate::config::SyncConfig;

#[derive(Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
        }
    }

    /// Set the handler ID (used as the cursor key).
    pub fn handler_id(mut self, id: impl Into<String>) -> Self {
        self.config.handler_id = id.into();
        self
    }

    pub fn chain_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.config.chain_rpc_url = url.into();
        self
    }

    pub fn app_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.config.app_rpc_url = url.into();
        self
    }

    /// Set the number of heights fetched concurrently.
    pub fn window_size(mut self, size: u64) -> Self {
        self.config.window_size = size;
        self
    }

    pub fn polling_interval_ms(mut self, ms: u64) -> Self {
        self.config.polling_interval_ms = ms;
        self
    }

    /// Set the backoff bounds between failed attempts.
    pub fn retry_interval_ms(mut self, initial: u64, max: u64) -> Self {
        self.config.initial_retry_interval_ms = initial;
        self.config.max_retry_interval_ms = max;
        self
    }

    pub fn starting_height(mut self, height: Height) -> Self {
        self.config.starting_block_height = height;
        self
    }

    pub fn tx_concurrency(mut self, n: usize) -> Self {
        self.config.tx_concurrency = n;
        self
    }

    /// Set the account prefix; validator and consensus prefixes follow it.
    pub fn address_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.account_address_prefix = prefix.into();
        self.config.validator_address_prefix.clear();
        self.config.con_node_address_prefix.clear();
        self
    }

    pub fn staking_denom(mut self, denom: impl Into<String>) -> Self {
        self.config.staking_denom = denom.into();
        self
    }

    pub fn strict_genesis_parsing(mut self, strict: bool) -> Self {
        self.config.strict_genesis_parsing = strict;
        self
    }

    pub fn strict_messages(mut self, strict: bool) -> Self {
        self.config.strict_messages = strict;
        self
    }

    pub fn base64_encoded_event_attributes(mut self, encoded: bool) -> Self {
        self.config.base64_encoded_event_attributes = encoded;
        self
    }

    /// `memory`, `sqlite:<path>` or a Postgres URL.
    pub fn storage(mut self, target: impl Into<String>) -> Self {
        self.config.storage = target.into();
        self
    }

    pub fn build_config(self) -> SyncConfig {
        self.config
    }
}
