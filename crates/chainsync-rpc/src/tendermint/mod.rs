//! Consensus node client: `status`, `genesis`, `block`, `block_results`.

mod wire;

pub(crate) use wire::{convert_events, EventWire};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chainsync_core::types::{Block, BlockResults, ChainStatus, Genesis, Height};
use serde::de::DeserializeOwned;

use crate::error::RpcError;
use crate::http::{HttpClientConfig, HttpTransport};
use crate::request::{EnvelopeError, JsonRpcResponse};

use wire::{BlockResult, BlockResultsWire, GenesisChunkResult, GenesisDoc, GenesisResult, StatusResult};

/// Read access to a Tendermint / CometBFT node.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn status(&self) -> Result<ChainStatus, RpcError>;

    async fn genesis(&self) -> Result<Genesis, RpcError>;

    async fn block(&self, height: Height) -> Result<Block, RpcError>;

    async fn block_results(&self, height: Height) -> Result<BlockResults, RpcError>;

    /// Latest committed height, as reported by `status`.
    async fn latest_height(&self) -> Result<Height, RpcError> {
        Ok(self.status().await?.latest_block_height)
    }
}

/// HTTP client for the Tendermint RPC's GET (URI) interface.
#[derive(Debug, Clone)]
pub struct HttpChainClient {
    transport: HttpTransport,
}

impl HttpChainClient {
    pub fn new(url: &str, config: HttpClientConfig) -> Result<Self, RpcError> {
        Ok(Self {
            transport: HttpTransport::new(url, config)?,
        })
    }

    pub fn url(&self) -> &str {
        self.transport.base_url().as_str()
    }

    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RpcError> {
        let value = self.transport.get_json(path, query).await?;
        let envelope: JsonRpcResponse<T> = serde_json::from_value(value)?;
        envelope.into_result().map_err(|e| match e {
            EnvelopeError::Rpc(err) => RpcError::Rpc(err),
            EnvelopeError::MissingResult => {
                RpcError::Deserialization(format!("{path}: response has no result"))
            }
        })
    }

    /// Large genesis files are only served in base64 chunks.
    async fn genesis_chunked(&self) -> Result<Genesis, RpcError> {
        let mut bytes = Vec::new();
        let mut chunk = 0u64;
        loop {
            let part: GenesisChunkResult = self
                .call("genesis_chunked", &[("chunk", chunk.to_string())])
                .await?;
            let decoded = STANDARD
                .decode(&part.data)
                .map_err(|e| RpcError::Decode(format!("genesis chunk {chunk}: {e}")))?;
            bytes.extend_from_slice(&decoded);
            chunk += 1;
            if chunk >= part.total {
                break;
            }
        }
        tracing::debug!(chunks = chunk, bytes = bytes.len(), "genesis assembled from chunks");
        let doc: GenesisDoc = serde_json::from_slice(&bytes)?;
        Ok(doc.into())
    }
}

#[async_trait]
impl ChainRpc for HttpChainClient {
    async fn status(&self) -> Result<ChainStatus, RpcError> {
        let result: StatusResult = self.call("status", &[]).await?;
        Ok(result.into())
    }

    async fn genesis(&self) -> Result<Genesis, RpcError> {
        match self.call::<GenesisResult>("genesis", &[]).await {
            Ok(result) => Ok(result.genesis.into()),
            Err(RpcError::Rpc(e)) if e.detail().contains("genesis_chunked") => {
                tracing::info!("genesis too large for a single response, fetching chunks");
                self.genesis_chunked().await
            }
            Err(e) => Err(e),
        }
    }

    async fn block(&self, height: Height) -> Result<Block, RpcError> {
        let result: BlockResult = self.call("block", &[("height", height.to_string())]).await?;
        result.try_into()
    }

    async fn block_results(&self, height: Height) -> Result<BlockResults, RpcError> {
        let result: BlockResultsWire = self
            .call("block_results", &[("height", height.to_string())])
            .await?;
        Ok(result.into())
    }
}
