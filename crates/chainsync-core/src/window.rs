//! Window sync strategy — concurrent, contiguous fetch of a height range.
//!
//! `[start, end]` is split into batches of at most `window_size` heights.
//! Every height of a batch is fetched by its own task; results are written
//! into a slot array indexed by `height - batch_start`, so they come back in
//! ascending height order whatever the completion order was.
//!
//! A batch succeeds or fails as a whole. On failure the strategy stops and
//! returns only the results of the fully successful batches before it.
//! Height 0 (genesis) is always fetched as a batch of its own.

use std::future::Future;

use tokio::task::JoinSet;

use crate::error::SyncError;
use crate::types::Height;

/// The commands (or any per-height output) fetched for one height.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightCommands<T> {
    pub height: Height,
    pub commands: Vec<T>,
}

/// Outcome of [`WindowSyncStrategy::sync`].
#[derive(Debug)]
pub struct WindowSyncResult<T> {
    /// Results of every fully successful batch, ascending by height.
    pub heights: Vec<HeightCommands<T>>,
    /// Highest height synced contiguously from `start`.
    pub synced_height: Option<Height>,
    /// Error of the first failed batch, if any.
    pub error: Option<SyncError>,
}

impl<T> WindowSyncResult<T> {
    fn empty() -> Self {
        Self {
            heights: vec![],
            synced_height: None,
            error: None,
        }
    }

    /// Convert into a `Result`, discarding partial progress on error.
    pub fn into_result(self) -> Result<Vec<HeightCommands<T>>, SyncError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.heights),
        }
    }
}

/// Splits a height range into bounded-concurrency batches.
#[derive(Debug, Clone, Copy)]
pub struct WindowSyncStrategy {
    window_size: u64,
}

impl WindowSyncStrategy {
    /// A window size of 0 is treated as 1.
    pub fn new(window_size: u64) -> Self {
        Self {
            window_size: window_size.max(1),
        }
    }

    pub fn window_size(&self) -> u64 {
        self.window_size
    }

    /// The inclusive batches `[start, end]` is split into.
    pub fn batches(&self, start: Height, end: Height) -> Vec<(Height, Height)> {
        let mut out = vec![];
        let mut cursor = start;
        while cursor <= end {
            let batch_end = if cursor == 0 {
                0
            } else {
                cursor.saturating_add(self.window_size - 1).min(end)
            };
            out.push((cursor, batch_end));
            match batch_end.checked_add(1) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        out
    }

    /// Fetch every height of `[start, end]` with `fetch_one`.
    pub async fn sync<T, F, Fut>(&self, start: Height, end: Height, fetch_one: F) -> WindowSyncResult<T>
    where
        T: Send + 'static,
        F: Fn(Height) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>, SyncError>> + Send + 'static,
    {
        let mut result = WindowSyncResult::empty();

        for (batch_start, batch_end) in self.batches(start, end) {
            match Self::sync_batch(batch_start, batch_end, &fetch_one).await {
                Ok(heights) => {
                    tracing::debug!(from = batch_start, to = batch_end, "window batch fetched");
                    result.heights.extend(heights);
                    result.synced_height = Some(batch_end);
                }
                Err(e) => {
                    tracing::warn!(
                        from = batch_start,
                        to = batch_end,
                        error = %e,
                        "window batch failed, discarding its results"
                    );
                    result.error = Some(e);
                    break;
                }
            }
        }

        result
    }

    async fn sync_batch<T, F, Fut>(
        start: Height,
        end: Height,
        fetch_one: &F,
    ) -> Result<Vec<HeightCommands<T>>, SyncError>
    where
        T: Send + 'static,
        F: Fn(Height) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>, SyncError>> + Send + 'static,
    {
        let size = (end - start + 1) as usize;
        let mut slots: Vec<Option<Vec<T>>> = (0..size).map(|_| None).collect();

        let mut tasks = JoinSet::new();
        for height in start..=end {
            let fetch = fetch_one.clone();
            tasks.spawn(async move { (height, fetch(height).await) });
        }

        // Siblings of a failed height are drained, their results dropped.
        let mut failure: Option<(Height, SyncError)> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((height, Ok(commands))) => {
                    slots[(height - start) as usize] = Some(commands);
                }
                Ok((height, Err(e))) => {
                    if failure.as_ref().map_or(true, |(h, _)| height < *h) {
                        failure = Some((height, e));
                    }
                }
                Err(join_err) => {
                    if failure.is_none() {
                        failure = Some((
                            Height::MAX,
                            SyncError::Other(format!("fetch task failed: {join_err}")),
                        ));
                    }
                }
            }
        }

        if let Some((_, e)) = failure {
            return Err(e);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(offset, slot)| {
                let height = start + offset as u64;
                slot.map(|commands| HeightCommands { height, commands })
                    .ok_or_else(|| SyncError::Fetch {
                        height,
                        reason: "no result recorded".into(),
                    })
            })
            .collect()
    }
}
