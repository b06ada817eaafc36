//! chainsync-rpc — clients for a Tendermint consensus node and the Cosmos SDK
//! REST API.
//!
//! # Architecture
//!
//! ```text
//! HttpChainClient ─┐                  ┌─► RetryPolicy (429 / 5xx / network)
//!                  ├─► HttpTransport ─┤
//! HttpAppClient ───┘                  └─► embedded error detection
//!        │
//!        └─► ResponseCache (short / long TTL)
//! ```
//!
//! Both clients sit behind traits ([`ChainRpc`], [`AppRpc`]) so the sync
//! engine can be driven by in-process fakes in tests.

pub mod account;
pub mod cache;
pub mod cosmos;
pub mod error;
pub mod http;
pub mod policy;
pub mod request;
pub mod tendermint;

pub use account::Account;
pub use cache::{CacheConfig, CacheTtl, ResponseCache};
pub use cosmos::{AppRpc, HttpAppClient};
pub use error::RpcError;
pub use http::HttpClientConfig;
pub use policy::{RetryConfig, RetryPolicy};
pub use tendermint::{ChainRpc, HttpChainClient};
