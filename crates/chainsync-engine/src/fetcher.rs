//! Per-height fetch worker.
//!
//! Height 0 → genesis document → genesis commands.
//! Height h → block, block results, then every transaction resolved through
//! the app client (bounded by `tx_concurrency`) → block commands.

use std::sync::Arc;

use chainsync_core::types::{Block, Height, Tx};
use chainsync_core::SyncError;
use chainsync_observability::SyncMetrics;
use chainsync_parser::{
    parse_block_to_commands, parse_genesis_commands, Command, ParserConfig, ParserRegistry,
};
use chainsync_rpc::{AppRpc, ChainRpc, RpcError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

fn fetch_err(height: Height, what: &str) -> impl FnOnce(RpcError) -> SyncError + '_ {
    move |e| SyncError::Fetch {
        height,
        reason: format!("{what}: {e}"),
    }
}

/// Fetches and parses a single height. Cheap to clone.
#[derive(Clone)]
pub struct HeightFetcher {
    chain: Arc<dyn ChainRpc>,
    app: Arc<dyn AppRpc>,
    registry: Arc<ParserRegistry>,
    parser: Arc<ParserConfig>,
    tx_concurrency: usize,
    metrics: Arc<SyncMetrics>,
}

impl HeightFetcher {
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        app: Arc<dyn AppRpc>,
        registry: Arc<ParserRegistry>,
        parser: ParserConfig,
        tx_concurrency: usize,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            chain,
            app,
            registry,
            parser: Arc::new(parser),
            tx_concurrency: tx_concurrency.max(1),
            metrics,
        }
    }

    pub(crate) fn set_registry(&mut self, registry: Arc<ParserRegistry>) {
        self.registry = registry;
    }

    /// Ordered commands for `height`.
    pub async fn fetch(&self, height: Height) -> Result<Vec<Command>, SyncError> {
        if height == 0 {
            return self.fetch_genesis().await;
        }

        let block = self
            .chain
            .block(height)
            .await
            .map_err(fetch_err(height, "block"))?;
        if block.height() != height {
            return Err(SyncError::Fetch {
                height,
                reason: format!("node returned block {}", block.height()),
            });
        }
        let results = self
            .chain
            .block_results(height)
            .await
            .map_err(fetch_err(height, "block_results"))?;
        let txs = self.fetch_txs(&block).await?;

        let commands =
            parse_block_to_commands(&self.registry, &block, &results, &txs, &self.parser)
                .map_err(|e| e.into_sync_error(height))?;
        tracing::trace!(height, txs = txs.len(), commands = commands.len(), "height fetched");
        Ok(commands)
    }

    async fn fetch_genesis(&self) -> Result<Vec<Command>, SyncError> {
        let genesis = self.chain.genesis().await.map_err(fetch_err(0, "genesis"))?;
        tracing::info!(chain_id = %genesis.chain_id, "genesis fetched");
        parse_genesis_commands(&genesis, &self.parser).map_err(|e| e.into_sync_error(0))
    }

    /// Resolve every transaction of `block`, in block order.
    ///
    /// One task per transaction, at most `tx_concurrency` lookups in flight.
    /// Any failure fails the height; the remaining lookups still run to
    /// completion and their results are dropped.
    async fn fetch_txs(&self, block: &Block) -> Result<Vec<Tx>, SyncError> {
        let height = block.height();
        let hashes = block.tx_hashes();
        if hashes.is_empty() {
            return Ok(vec![]);
        }

        let permits = Arc::new(Semaphore::new(self.tx_concurrency));
        let mut tasks = JoinSet::new();
        for (index, hash) in hashes.iter().cloned().enumerate() {
            let app = Arc::clone(&self.app);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| SyncError::Other(e.to_string()))?;
                let tx = app.tx(&hash).await.map_err(|e| SyncError::Fetch {
                    height,
                    reason: format!("tx {hash}: {e}"),
                })?;
                Ok::<_, SyncError>((index, tx))
            });
        }

        let mut slots: Vec<Option<Tx>> = vec![None; hashes.len()];
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| SyncError::Fetch {
                height,
                reason: format!("tx task failed: {e}"),
            });
            match outcome.and_then(|r| r) {
                Ok((index, mut tx)) => {
                    if tx.height != height {
                        first_error.get_or_insert(SyncError::Fetch {
                            height,
                            reason: format!("tx {} reported at height {}", tx.hash, tx.height),
                        });
                        continue;
                    }
                    tx.index = index;
                    slots[index] = Some(tx);
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let txs: Vec<Tx> = slots.into_iter().flatten().collect();
        if txs.len() != hashes.len() {
            return Err(SyncError::Fetch {
                height,
                reason: format!("{} of {} transactions resolved", txs.len(), hashes.len()),
            });
        }
        self.metrics.record_txs_fetched(txs.len());
        Ok(txs)
    }
}
