//! Block height tracker — polls the node and publishes the latest height.
//!
//! The height lives in a `watch` channel: subscribers only ever see the most
//! recent value, and a value is only published when it is strictly higher
//! than the one before it.

use std::sync::Arc;
use std::time::Duration;

use chainsync_core::types::Height;
use chainsync_rpc::ChainRpc;
use tokio::sync::watch;

pub struct HeightTracker {
    chain: Arc<dyn ChainRpc>,
    interval: Duration,
    latest: watch::Sender<Option<Height>>,
}

impl HeightTracker {
    pub fn new(chain: Arc<dyn ChainRpc>, interval: Duration) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            chain,
            interval,
            latest,
        }
    }

    /// Last published height, without waiting.
    pub fn current(&self) -> Option<Height> {
        *self.latest.borrow()
    }

    /// Receiver notified on every height increase.
    pub fn subscribe(&self) -> watch::Receiver<Option<Height>> {
        self.latest.subscribe()
    }

    /// Latest height, polling until the node has answered at least once.
    pub async fn latest_height(&self) -> Height {
        loop {
            if let Some(height) = self.current() {
                return height;
            }
            if self.poll_once().await.is_none() {
                tokio::time::sleep(self.interval).await;
            }
        }
    }

    /// Ask the node for its height once and publish it if it moved forward.
    ///
    /// Returns the height reported by the node, or `None` on RPC failure.
    pub async fn poll_once(&self) -> Option<Height> {
        match self.chain.latest_height().await {
            Ok(height) => {
                let advanced = self.latest.send_if_modified(|current| {
                    if current.map_or(true, |c| height > c) {
                        *current = Some(height);
                        true
                    } else {
                        false
                    }
                });
                if advanced {
                    tracing::debug!(height, "new chain height");
                }
                Some(height)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to poll chain height");
                None
            }
        }
    }

    /// Poll forever at the configured interval.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chainsync_core::types::{Block, BlockResults, ChainStatus, Genesis};
    use chainsync_rpc::RpcError;
    use std::sync::Mutex;

    /// Replays a scripted sequence of heights; `None` is an RPC failure.
    struct ScriptedChain {
        heights: Mutex<Vec<Option<Height>>>,
    }

    impl ScriptedChain {
        fn new(mut heights: Vec<Option<Height>>) -> Arc<Self> {
            heights.reverse();
            Arc::new(Self {
                heights: Mutex::new(heights),
            })
        }
    }

    #[async_trait]
    impl ChainRpc for ScriptedChain {
        async fn status(&self) -> Result<ChainStatus, RpcError> {
            match self.heights.lock().unwrap().pop().flatten() {
                Some(h) => Ok(ChainStatus {
                    network: "testhub-1".into(),
                    latest_block_height: h,
                    latest_block_time: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
                    catching_up: false,
                }),
                None => Err(RpcError::Http("connection refused".into())),
            }
        }

        async fn genesis(&self) -> Result<Genesis, RpcError> {
            Err(RpcError::Http("unused".into()))
        }

        async fn block(&self, _height: Height) -> Result<Block, RpcError> {
            Err(RpcError::Http("unused".into()))
        }

        async fn block_results(&self, _height: Height) -> Result<BlockResults, RpcError> {
            Err(RpcError::Http("unused".into()))
        }
    }

    #[tokio::test]
    async fn only_higher_heights_are_published() {
        let tracker = HeightTracker::new(
            ScriptedChain::new(vec![Some(10), Some(8), Some(12)]),
            Duration::from_millis(1),
        );
        let mut rx = tracker.subscribe();

        assert_eq!(tracker.poll_once().await, Some(10));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Some(10));

        assert_eq!(tracker.poll_once().await, Some(8));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(tracker.current(), Some(10));

        tracker.poll_once().await;
        assert_eq!(*rx.borrow_and_update(), Some(12));
    }

    #[tokio::test]
    async fn latest_height_waits_through_failures() {
        let tracker = HeightTracker::new(
            ScriptedChain::new(vec![None, None, Some(7)]),
            Duration::from_millis(1),
        );
        assert_eq!(tracker.current(), None);
        assert_eq!(tracker.latest_height().await, 7);
        assert_eq!(tracker.current(), Some(7));
    }
}
