//! The sync manager drives the indexer from the handler's cursor up to the
//! chain head.
//!
//! # Attempt
//! 1. Resume at `last_handled + 1` (or genesis on a fresh handler), never
//!    below `starting_block_height` once genesis is indexed.
//! 2. Pick the target: the latest height, or on a retry the resume height
//!    itself so a flaky range is re-approached one height at a time.
//! 3. Walk `[current, target]` window by window. Each height of a window is
//!    fetched concurrently; then, in ascending order, its commands are
//!    executed and the resulting events handed to the handler.
//!
//! # Loop
//! Success → `Idle` until the tracker reports a new height or the polling
//! interval elapses. Failure → `Backoff` for an exponentially growing delay
//! (capped at `max_retry_interval_ms`), then a retry. Attempts are retried
//! forever.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chainsync_core::types::Height;
use chainsync_core::{Event, EventHandler, SyncError, SyncState, WindowSyncStrategy};
use chainsync_observability::SyncMetrics;
use chainsync_parser::{Command, ParserRegistry};
use chainsync_rpc::{AppRpc, ChainRpc, HttpAppClient, HttpChainClient, ResponseCache, RetryPolicy};
use chainsync_storage::open_handler;

use crate::config::SyncConfig;
use crate::fetcher::HeightFetcher;
use crate::tracker::HeightTracker;

/// First height an attempt should fetch, given the handler's cursor.
///
/// `None` only when the cursor is already at `Height::MAX`.
pub fn resume_height(last_handled: Option<Height>, starting_height: Height) -> Option<Height> {
    match last_handled {
        None => Some(0),
        Some(h) => h.checked_add(1).map(|next| next.max(starting_height)),
    }
}

/// Last height an attempt should fetch.
///
/// A retry narrows the target to the resume height (clamped to the starting
/// height); if the node has fallen behind the cursor the result is below
/// `current` and the attempt has nothing to do.
pub fn target_height(
    latest: Height,
    current: Height,
    starting_height: Height,
    is_retry: bool,
) -> Height {
    if is_retry {
        latest.min(current).max(starting_height)
    } else {
        latest
    }
}

pub struct SyncManager {
    config: SyncConfig,
    fetcher: HeightFetcher,
    handler: Arc<dyn EventHandler>,
    tracker: Arc<HeightTracker>,
    window: WindowSyncStrategy,
    backoff: RetryPolicy,
    metrics: Arc<SyncMetrics>,
    state: Mutex<SyncState>,
}

impl SyncManager {
    /// Build a manager over existing clients and handler.
    pub fn new(
        config: SyncConfig,
        chain: Arc<dyn ChainRpc>,
        app: Arc<dyn AppRpc>,
        handler: Arc<dyn EventHandler>,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        let metrics = Arc::new(SyncMetrics::new());
        let fetcher = HeightFetcher::new(
            Arc::clone(&chain),
            app,
            Arc::new(ParserRegistry::cosmos_sdk()),
            config.parser_config(),
            config.tx_concurrency,
            Arc::clone(&metrics),
        );
        Ok(Self {
            tracker: Arc::new(HeightTracker::new(chain, config.polling_interval())),
            window: WindowSyncStrategy::new(config.window_size),
            backoff: RetryPolicy::new(config.backoff_config()),
            fetcher,
            handler,
            metrics,
            state: Mutex::new(SyncState::Idle),
            config,
        })
    }

    /// Build the HTTP clients and open the configured storage backend.
    pub async fn from_config(config: SyncConfig) -> Result<Self, SyncError> {
        config.validate()?;
        let http = config.http_config();
        let chain = HttpChainClient::new(&config.chain_rpc_url, http.clone())
            .map_err(|e| SyncError::Config(format!("chain_rpc_url: {e}")))?;
        let cache = Arc::new(ResponseCache::new(config.cache_config()));
        let app = HttpAppClient::new(&config.app_rpc_url, http, cache)
            .map_err(|e| SyncError::Config(format!("app_rpc_url: {e}")))?;
        let handler = open_handler(&config.storage_target()?, &config.handler_id).await?;

        tracing::info!(
            chain_rpc = %config.chain_rpc_url,
            app_rpc = %config.app_rpc_url,
            storage = %config.storage,
            handler = handler.id(),
            "sync manager configured"
        );
        Self::new(config, Arc::new(chain), Arc::new(app), handler)
    }

    /// Replace the message registry (custom modules, upgrade schedules).
    pub fn with_registry(mut self, registry: ParserRegistry) -> Self {
        self.fetcher.set_registry(Arc::new(registry));
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock().unwrap()
    }

    pub fn metrics(&self) -> Arc<SyncMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn handler(&self) -> &Arc<dyn EventHandler> {
        &self.handler
    }

    pub fn tracker(&self) -> &Arc<HeightTracker> {
        &self.tracker
    }

    fn set_state(&self, next: SyncState) {
        let mut state = self.state.lock().unwrap();
        let prev = *state;
        if prev != next {
            tracing::debug!(from = %prev, to = %next, "sync state changed");
            *state = next;
        }
    }

    /// Run forever.
    pub async fn run(&self) {
        self.run_until(std::future::pending()).await
    }

    /// Run until `shutdown` resolves.
    ///
    /// An attempt in progress is dropped at its next await point; each
    /// height is committed atomically by the handler, so nothing is
    /// half-applied.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let poller = tokio::spawn(Arc::clone(&self.tracker).run());
        let mut heights = self.tracker.subscribe();
        let mut failures: u32 = 0;

        tracing::info!(
            handler = self.handler.id(),
            window_size = self.config.window_size,
            starting_height = self.config.starting_block_height,
            "sync manager started"
        );

        loop {
            heights.borrow_and_update();
            self.set_state(SyncState::Syncing);

            let outcome = tokio::select! {
                _ = &mut shutdown => break,
                outcome = self.sync_once(failures > 0) => outcome,
            };

            match outcome {
                Ok(_) => {
                    failures = 0;
                    self.set_state(SyncState::Idle);
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = heights.changed() => {}
                        _ = tokio::time::sleep(self.config.polling_interval()) => {}
                    }
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    self.metrics.record_failure();
                    let delay = self.retry_delay(failures);
                    tracing::error!(
                        error = %e,
                        height = e.height(),
                        attempt = failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "sync attempt failed"
                    );
                    self.set_state(SyncState::Backoff);
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        poller.abort();
        self.set_state(SyncState::Stopped);
        tracing::info!(handler = self.handler.id(), "sync manager stopped");
    }

    fn retry_delay(&self, failures: u32) -> Duration {
        self.backoff
            .next_delay(failures)
            .unwrap_or(self.backoff.config.max_backoff)
    }

    /// One sync attempt.
    ///
    /// Returns the highest height committed, or `None` when there was
    /// nothing to do. Heights committed before a failure stay committed.
    pub async fn sync_once(&self, is_retry: bool) -> Result<Option<Height>, SyncError> {
        let starting = self.config.starting_block_height;
        let last_handled = self.handler.last_handled_event_height().await?;
        let Some(current) = resume_height(last_handled, starting) else {
            return Ok(None);
        };
        let latest = self.tracker.latest_height().await;
        let target = target_height(latest, current, starting, is_retry);
        if current > target {
            tracing::debug!(current, target, latest, "nothing to sync");
            return Ok(None);
        }

        tracing::info!(from = current, to = target, retry = is_retry, "sync attempt started");
        let synced = self.sync_range(current, target).await?;
        tracing::info!(to = target, "sync attempt complete");
        Ok(synced)
    }

    async fn sync_range(&self, from: Height, to: Height) -> Result<Option<Height>, SyncError> {
        let starting = self.config.starting_block_height;
        let mut committed = None;
        let mut current = from;

        while current <= to {
            let end = if current == 0 {
                0
            } else {
                current.saturating_add(self.window.window_size() - 1).min(to)
            };

            let fetcher = self.fetcher.clone();
            let result = self
                .window
                .sync(current, end, move |height| {
                    let fetcher = fetcher.clone();
                    async move { fetcher.fetch(height).await }
                })
                .await;

            for fetched in result.heights {
                self.commit(fetched.height, &fetched.commands).await?;
                committed = Some(fetched.height);
            }
            if let Some(e) = result.error {
                return Err(e);
            }

            tracing::debug!(from = current, to = end, "window committed");
            match resume_height(Some(end), starting) {
                Some(next) => current = next,
                None => break,
            }
        }

        Ok(committed)
    }

    /// Execute a height's commands and hand the events to the handler.
    async fn commit(&self, height: Height, commands: &[Command]) -> Result<(), SyncError> {
        let events = commands
            .iter()
            .map(|command| command.execute().map_err(|e| e.into_sync_error(height)))
            .collect::<Result<Vec<Event>, _>>()?;

        self.handler.handle_events(height, &events).await?;
        self.metrics.record_height(height, events.len());
        tracing::debug!(height, events = events.len(), "height handled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_point() {
        assert_eq!(resume_height(None, 0), Some(0));
        assert_eq!(resume_height(None, 100), Some(0));
        assert_eq!(resume_height(Some(0), 100), Some(100));
        assert_eq!(resume_height(Some(0), 0), Some(1));
        assert_eq!(resume_height(Some(149), 100), Some(150));
        assert_eq!(resume_height(Some(Height::MAX), 0), None);
    }

    #[test]
    fn first_attempt_targets_latest() {
        assert_eq!(target_height(500, 150, 100, false), 500);
        assert_eq!(target_height(500, 0, 100, false), 500);
    }

    #[test]
    fn retry_narrows_to_current() {
        assert_eq!(target_height(500, 150, 100, true), 150);
        // fresh handler: genesis plus the starting height
        assert_eq!(target_height(500, 0, 100, true), 100);
    }

    #[test]
    fn retry_when_node_is_behind_cursor() {
        let target = target_height(500, 601, 100, true);
        assert_eq!(target, 500);
        assert!(601 > target);
    }
}
