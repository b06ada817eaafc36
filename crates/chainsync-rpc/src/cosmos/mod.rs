//! Cosmos SDK REST (gRPC gateway) client.
//!
//! Transaction lookups are never cached since each transaction is fetched
//! exactly once per sync attempt. Everything else goes through the
//! [`ResponseCache`] with a TTL class chosen per endpoint.

mod types;

pub use types::{
    CommissionRatesWire, Delegation, GovParamsKind, Proposal, TallyResult, UnbondingDelegation,
    UnbondingEntry, Validator, ValidatorCommission, ValidatorDescriptionWire,
};

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chainsync_core::types::{Coin, Tx};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::account::Account;
use crate::cache::{CacheTtl, ResponseCache};
use crate::error::{RpcError, CODE_NOT_FOUND};
use crate::http::{HttpClientConfig, HttpTransport};

use types::{DelegationResponseWire, GetTxResponse};

/// Read access to the application's REST API.
#[async_trait]
pub trait AppRpc: Send + Sync {
    /// Resolved transaction by hash. The returned `index` is 0; the caller
    /// knows the block position.
    async fn tx(&self, hash: &str) -> Result<Tx, RpcError>;

    /// Fails with `RpcError::AccountNotFound` for unknown addresses.
    async fn account(&self, address: &str) -> Result<Account, RpcError>;

    async fn balances(&self, address: &str) -> Result<Vec<Coin>, RpcError>;

    /// Fails with `RpcError::AccountNoDelegation` when the node reports none.
    async fn bonded_balance(&self, address: &str) -> Result<Vec<Delegation>, RpcError>;

    async fn unbonding_balance(&self, address: &str)
        -> Result<Vec<UnbondingDelegation>, RpcError>;

    /// Total outstanding rewards across validators (decimal amounts).
    async fn total_rewards(&self, address: &str) -> Result<Vec<Coin>, RpcError>;

    async fn commission(&self, validator: &str) -> Result<Vec<Coin>, RpcError>;

    async fn validator(&self, validator: &str) -> Result<Option<Validator>, RpcError>;

    async fn proposal(&self, id: u64) -> Result<Option<Proposal>, RpcError>;

    async fn proposal_tally(&self, id: u64) -> Result<TallyResult, RpcError>;

    async fn gov_params(&self, kind: GovParamsKind) -> Result<Value, RpcError>;
}

/// HTTP client for the Cosmos SDK REST API.
#[derive(Clone)]
pub struct HttpAppClient {
    transport: HttpTransport,
    cache: Arc<ResponseCache>,
}

impl HttpAppClient {
    pub fn new(url: &str, config: HttpClientConfig, cache: Arc<ResponseCache>) -> Result<Self, RpcError> {
        Ok(Self {
            transport: HttpTransport::new(url, config)?,
            cache,
        })
    }

    pub fn url(&self) -> &str {
        self.transport.base_url().as_str()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    async fn cached<F, Fut>(&self, key: String, ttl: CacheTtl, fetch: F) -> Result<Value, RpcError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Value, RpcError>> + Send,
    {
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let value = fetch().await?;
        self.cache.insert(key, ttl, value.clone());
        Ok(value)
    }

    /// Follow `pagination.next_key` until exhausted, concatenating `field`.
    async fn get_paginated(&self, path: &str, field: &str) -> Result<Vec<Value>, RpcError> {
        let mut items = Vec::new();
        let mut key = String::new();
        loop {
            let page = self
                .transport
                .get_json(path, &[("pagination.key", key.clone())])
                .await?;
            if let Some(arr) = page.get(field).and_then(Value::as_array) {
                items.extend(arr.iter().cloned());
            }
            match page.pointer("/pagination/next_key").and_then(Value::as_str) {
                Some(next) if !next.is_empty() && next != key => key = next.to_string(),
                _ => break,
            }
        }
        Ok(items)
    }

    async fn paginated_cached(&self, path: String, field: &'static str) -> Result<Value, RpcError> {
        self.cached(path.clone(), CacheTtl::Short, || async move {
            Ok::<_, RpcError>(Value::Array(self.get_paginated(&path, field).await?))
        })
        .await
    }
}

fn field<T: DeserializeOwned>(value: &Value, pointer: &str) -> Result<T, RpcError> {
    let v = value
        .pointer(pointer)
        .ok_or_else(|| RpcError::Deserialization(format!("missing {pointer}")))?;
    Ok(serde_json::from_value(v.clone())?)
}

fn no_delegation(address: &str) -> impl FnOnce(RpcError) -> RpcError + '_ {
    move |e| match e {
        RpcError::Api { code, .. } if code == CODE_NOT_FOUND => {
            RpcError::AccountNoDelegation(address.to_string())
        }
        other => other,
    }
}

fn optional<T>(result: Result<T, RpcError>) -> Result<Option<T>, RpcError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl AppRpc for HttpAppClient {
    async fn tx(&self, hash: &str) -> Result<Tx, RpcError> {
        let value = self
            .transport
            .get_json(&format!("cosmos/tx/v1beta1/txs/{hash}"), &[])
            .await?;
        let resp: GetTxResponse = serde_json::from_value(value)?;
        Ok(resp.into_tx(0))
    }

    async fn account(&self, address: &str) -> Result<Account, RpcError> {
        let path = format!("cosmos/auth/v1beta1/accounts/{address}");
        let value = self
            .cached(path.clone(), CacheTtl::Short, || self.transport.get_json(&path, &[]))
            .await
            .map_err(|e| match e {
                RpcError::Api { code, .. } if code == CODE_NOT_FOUND => {
                    RpcError::AccountNotFound(address.to_string())
                }
                other => other,
            })?;
        Account::from_any(field(&value, "/account")?)
    }

    async fn balances(&self, address: &str) -> Result<Vec<Coin>, RpcError> {
        let value = self
            .paginated_cached(format!("cosmos/bank/v1beta1/balances/{address}"), "balances")
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn bonded_balance(&self, address: &str) -> Result<Vec<Delegation>, RpcError> {
        let value = self
            .paginated_cached(
                format!("cosmos/staking/v1beta1/delegations/{address}"),
                "delegation_responses",
            )
            .await
            .map_err(no_delegation(address))?;
        let wire: Vec<DelegationResponseWire> = serde_json::from_value(value)?;
        Ok(wire.into_iter().map(Delegation::from).collect())
    }

    async fn unbonding_balance(
        &self,
        address: &str,
    ) -> Result<Vec<UnbondingDelegation>, RpcError> {
        let value = self
            .paginated_cached(
                format!("cosmos/staking/v1beta1/delegators/{address}/unbonding_delegations"),
                "unbonding_responses",
            )
            .await
            .map_err(no_delegation(address))?;
        Ok(serde_json::from_value(value)?)
    }

    async fn total_rewards(&self, address: &str) -> Result<Vec<Coin>, RpcError> {
        let path = format!("cosmos/distribution/v1beta1/delegators/{address}/rewards");
        let value = self
            .cached(path.clone(), CacheTtl::Short, || self.transport.get_json(&path, &[]))
            .await
            .map_err(no_delegation(address))?;
        match value.get("total") {
            Some(Value::Null) | None => Ok(vec![]),
            Some(total) => Ok(serde_json::from_value(total.clone())?),
        }
    }

    async fn commission(&self, validator: &str) -> Result<Vec<Coin>, RpcError> {
        let path = format!("cosmos/distribution/v1beta1/validators/{validator}/commission");
        let value = self
            .cached(path.clone(), CacheTtl::Short, || self.transport.get_json(&path, &[]))
            .await?;
        match value.pointer("/commission/commission") {
            Some(Value::Null) | None => Ok(vec![]),
            Some(coins) => Ok(serde_json::from_value(coins.clone())?),
        }
    }

    async fn validator(&self, validator: &str) -> Result<Option<Validator>, RpcError> {
        let path = format!("cosmos/staking/v1beta1/validators/{validator}");
        let value = optional(
            self.cached(path.clone(), CacheTtl::Long, || self.transport.get_json(&path, &[]))
                .await,
        )?;
        value.map(|v| field(&v, "/validator")).transpose()
    }

    async fn proposal(&self, id: u64) -> Result<Option<Proposal>, RpcError> {
        let path = format!("cosmos/gov/v1beta1/proposals/{id}");
        if let Some(hit) = self.cache.get(&path) {
            return Ok(Some(field(&hit, "/proposal")?));
        }
        let Some(value) = optional(self.transport.get_json(&path, &[]).await)? else {
            return Ok(None);
        };
        let proposal: Proposal = field(&value, "/proposal")?;
        let ttl = if proposal.is_final() {
            CacheTtl::Long
        } else {
            CacheTtl::Short
        };
        self.cache.insert(path, ttl, value);
        Ok(Some(proposal))
    }

    async fn proposal_tally(&self, id: u64) -> Result<TallyResult, RpcError> {
        let path = format!("cosmos/gov/v1beta1/proposals/{id}/tally");
        let value = self
            .cached(path.clone(), CacheTtl::Short, || self.transport.get_json(&path, &[]))
            .await?;
        field(&value, "/tally")
    }

    async fn gov_params(&self, kind: GovParamsKind) -> Result<Value, RpcError> {
        let path = format!("cosmos/gov/v1beta1/params/{}", kind.as_str());
        self.cached(path.clone(), CacheTtl::Long, || self.transport.get_json(&path, &[]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RetryConfig;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn client(server: &MockServer) -> HttpAppClient {
        HttpAppClient::new(
            &server.base_url(),
            HttpClientConfig {
                retry: RetryConfig {
                    max_retries: Some(0),
                    ..Default::default()
                },
                request_timeout: Duration::from_secs(5),
                max_redirects: 5,
            },
            Arc::new(ResponseCache::default()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn tx_detail_is_resolved() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cosmos/tx/v1beta1/txs/ABC");
                then.status(200).json_body(json!({
                    "tx": {
                        "body": {
                            "messages": [{
                                "@type": "/cosmos.bank.v1beta1.MsgSend",
                                "from_address": "cosmos1from",
                                "to_address": "cosmos1to",
                                "amount": [{"denom": "uatom", "amount": "5"}]
                            }],
                            "memo": "hi",
                            "timeout_height": "0"
                        },
                        "auth_info": {
                            "signer_infos": [{"public_key": null, "sequence": "3"}],
                            "fee": {"amount": [{"denom": "uatom", "amount": "500"}], "gas_limit": "200000", "payer": "", "granter": ""}
                        },
                        "signatures": ["c2ln"]
                    },
                    "tx_response": {
                        "height": "2",
                        "txhash": "ABC",
                        "codespace": "",
                        "code": 0,
                        "raw_log": "[]",
                        "logs": [],
                        "gas_wanted": "200000",
                        "gas_used": "65000",
                        "timestamp": "2024-01-01T00:00:02Z",
                        "events": [{"type": "transfer", "attributes": [{"key": "amount", "value": "5uatom", "index": true}]}]
                    }
                }));
            })
            .await;

        let tx = client(&server).tx("ABC").await.unwrap();
        assert_eq!(tx.height, 2);
        assert_eq!(tx.hash, "ABC");
        assert!(tx.is_success());
        assert_eq!(tx.body.memo, "hi");
        assert_eq!(tx.auth_info.fee.gas_limit, 200_000);
        assert_eq!(tx.auth_info.signer_infos[0].sequence, 3);
        assert_eq!(tx.result.events[0].attribute("amount"), Some("5uatom"));
    }

    #[tokio::test]
    async fn account_not_found_code() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cosmos/auth/v1beta1/accounts/cosmos1nobody");
                then.status(404).json_body(json!({
                    "code": 5,
                    "message": "rpc error: code = NotFound desc = account cosmos1nobody not found: key not found",
                    "details": []
                }));
            })
            .await;

        let err = client(&server).account("cosmos1nobody").await.unwrap_err();
        assert!(matches!(err, RpcError::AccountNotFound(ref a) if a == "cosmos1nobody"));
    }

    #[tokio::test]
    async fn delegation_code_maps_to_no_delegation() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/cosmos/staking/v1beta1/delegators/cosmos1d/unbonding_delegations");
                then.status(404).json_body(json!({"code": 5, "message": "no delegation", "details": []}));
            })
            .await;

        let err = client(&server).unbonding_balance("cosmos1d").await.unwrap_err();
        assert!(matches!(err, RpcError::AccountNoDelegation(_)));
    }

    #[tokio::test]
    async fn balances_follow_next_key_and_are_cached() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/cosmos/bank/v1beta1/balances/cosmos1a")
                    .query_param("pagination.key", "");
                then.status(200).json_body(json!({
                    "balances": [{"denom": "uatom", "amount": "10"}],
                    "pagination": {"next_key": "cGFnZTI", "total": "2"}
                }));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/cosmos/bank/v1beta1/balances/cosmos1a")
                    .query_param("pagination.key", "cGFnZTI");
                then.status(200).json_body(json!({
                    "balances": [{"denom": "uosmo", "amount": "20"}],
                    "pagination": {"next_key": null, "total": "2"}
                }));
            })
            .await;

        let c = client(&server);
        let coins = c.balances("cosmos1a").await.unwrap();
        assert_eq!(coins, vec![Coin::new("10", "uatom"), Coin::new("20", "uosmo")]);

        // Served from cache the second time.
        let again = c.balances("cosmos1a").await.unwrap();
        assert_eq!(again.len(), 2);
        first.assert_hits_async(1).await;
        second.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn missing_proposal_is_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cosmos/gov/v1beta1/proposals/999");
                then.status(404).json_body(json!({"code": 5, "message": "proposal 999 doesn't exist", "details": []}));
            })
            .await;

        assert!(client(&server).proposal(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rewards_total_and_commission() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cosmos/distribution/v1beta1/delegators/cosmos1d/rewards");
                then.status(200).json_body(json!({
                    "rewards": [{"validator_address": "cosmosvaloper1v", "reward": [{"denom": "uatom", "amount": "1.500000000000000000"}]}],
                    "total": [{"denom": "uatom", "amount": "1.500000000000000000"}]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cosmos/distribution/v1beta1/validators/cosmosvaloper1v/commission");
                then.status(200).json_body(json!({"commission": {"commission": [{"denom": "uatom", "amount": "7.0"}]}}));
            })
            .await;

        let c = client(&server);
        assert_eq!(c.total_rewards("cosmos1d").await.unwrap()[0].amount, "1.500000000000000000");
        assert_eq!(c.commission("cosmosvaloper1v").await.unwrap()[0].amount, "7.0");
    }
}
