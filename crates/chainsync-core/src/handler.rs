//! The durable write side of the indexer.
//!
//! An [`EventHandler`] owns the "last handled height" cursor. Each call to
//! [`EventHandler::handle_events`] applies one height's events and advances
//! the cursor atomically: either both happen or neither does.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::event::Event;
use crate::types::Height;

/// Durable sink for committed events.
///
/// Implementations include [`MemoryEventHandler`] and the SQLite / Postgres
/// handlers in `chainsync-storage`. A single sync manager is assumed to be
/// the only writer.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable identifier, used as the cursor key.
    fn id(&self) -> &str;

    /// Highest height whose events were durably applied, `None` if nothing
    /// has been indexed yet.
    async fn last_handled_event_height(&self) -> Result<Option<Height>, SyncError>;

    /// Apply `events` for `height` and move the cursor to `height`.
    ///
    /// Must reject `height <= cursor` so the cursor only moves forward.
    async fn handle_events(&self, height: Height, events: &[Event]) -> Result<(), SyncError>;
}

/// Shared forward-only check used by every handler implementation.
pub fn ensure_advances(
    handler: &str,
    cursor: Option<Height>,
    height: Height,
) -> Result<(), SyncError> {
    match cursor {
        Some(c) if height <= c => Err(SyncError::Handler {
            handler: handler.to_string(),
            reason: format!("height {height} is not above cursor {c}"),
        }),
        _ => Ok(()),
    }
}

// ─── In-memory handler (for testing) ──────────────────────────────────────────

#[derive(Default)]
struct MemoryState {
    cursor: Option<Height>,
    events: BTreeMap<Height, Vec<Event>>,
    calls: u64,
}

/// In-memory handler for tests and ephemeral runs.
pub struct MemoryEventHandler {
    id: String,
    state: Mutex<MemoryState>,
}

impl MemoryEventHandler {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// A handler that behaves as if `height` had already been handled.
    pub fn resume_from(id: impl Into<String>, height: Height) -> Self {
        let handler = Self::new(id);
        handler.state.lock().unwrap().cursor = Some(height);
        handler
    }

    /// Events committed for `height`, if any.
    pub fn events_at(&self, height: Height) -> Option<Vec<Event>> {
        self.state.lock().unwrap().events.get(&height).cloned()
    }

    /// Committed heights in ascending order.
    pub fn committed_heights(&self) -> Vec<Height> {
        self.state.lock().unwrap().events.keys().copied().collect()
    }

    /// Every committed event, ordered by height then position.
    pub fn all_events(&self) -> Vec<Event> {
        self.state
            .lock()
            .unwrap()
            .events
            .values()
            .flat_map(|evs| evs.iter().cloned())
            .collect()
    }

    /// Number of successful `handle_events` calls.
    pub fn handled_calls(&self) -> u64 {
        self.state.lock().unwrap().calls
    }
}

#[async_trait]
impl EventHandler for MemoryEventHandler {
    fn id(&self) -> &str {
        &self.id
    }

    async fn last_handled_event_height(&self) -> Result<Option<Height>, SyncError> {
        Ok(self.state.lock().unwrap().cursor)
    }

    async fn handle_events(&self, height: Height, events: &[Event]) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap();
        ensure_advances(&self.id, state.cursor, height)?;
        state.events.insert(height, events.to_vec());
        state.cursor = Some(height);
        state.calls += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventPayload, PowerChanged};

    fn power_event(height: Height, power: i64) -> Event {
        Event::new(
            height,
            1,
            EventPayload::PowerChanged(PowerChanged {
                pub_key_type: "ed25519".into(),
                pub_key: "AAAA".into(),
                power,
            }),
        )
    }

    #[tokio::test]
    async fn memory_handler_roundtrip() {
        let handler = MemoryEventHandler::new("test");
        assert_eq!(handler.last_handled_event_height().await.unwrap(), None);

        handler.handle_events(0, &[]).await.unwrap();
        handler
            .handle_events(1, &[power_event(1, 5), power_event(1, 6)])
            .await
            .unwrap();

        assert_eq!(handler.last_handled_event_height().await.unwrap(), Some(1));
        assert_eq!(handler.committed_heights(), vec![0, 1]);
        assert_eq!(handler.events_at(1).unwrap().len(), 2);
        assert_eq!(handler.handled_calls(), 2);
    }

    #[tokio::test]
    async fn cursor_only_moves_forward() {
        let handler = MemoryEventHandler::resume_from("test", 10);
        let err = handler.handle_events(10, &[]).await.unwrap_err();
        assert!(matches!(err, SyncError::Handler { .. }));
        assert!(handler.handle_events(9, &[]).await.is_err());

        // Nothing was applied by the rejected calls.
        assert!(handler.committed_heights().is_empty());
        assert_eq!(handler.last_handled_event_height().await.unwrap(), Some(10));

        handler.handle_events(11, &[]).await.unwrap();
        assert_eq!(handler.last_handled_event_height().await.unwrap(), Some(11));
    }

    #[test]
    fn ensure_advances_without_cursor() {
        assert!(ensure_advances("h", None, 0).is_ok());
        assert!(ensure_advances("h", Some(3), 4).is_ok());
        assert!(ensure_advances("h", Some(3), 3).is_err());
    }
}
