//! Read-through response cache for the app client.
//!
//! Entries are keyed by request path plus query and expire after one of two
//! TTLs. Nothing is ever invalidated explicitly: the indexer never writes to
//! the chain, so a stale entry only lives until its TTL runs out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

/// TTL class of a cached response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// Fast-moving data: balances, rewards, tallies.
    Short,
    /// Slow-moving data: validators, params, finished proposals.
    Long,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub short_ttl: Duration,
    pub long_ttl: Duration,
    /// Upper bound on stored entries. Expired entries go first, then the
    /// oldest fresh ones.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            short_ttl: Duration::from_secs(10),
            long_ttl: Duration::from_secs(600),
            max_entries: 10_000,
        }
    }
}

struct Entry {
    stored_at: Instant,
    ttl: Duration,
    value: Value,
}

impl Entry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }
}

pub struct ResponseCache {
    config: CacheConfig,
    entries: Mutex<HashMap<String, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fresh cached value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap();
        match entries.get(key).filter(|e| e.is_fresh(now)) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: impl Into<String>, ttl: CacheTtl, value: Value) {
        let ttl = match ttl {
            CacheTtl::Short => self.config.short_ttl,
            CacheTtl::Long => self.config.long_ttl,
        };
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let key = key.into();
        if !entries.contains_key(&key) && entries.len() >= self.config.max_entries {
            entries.retain(|_, e| e.is_fresh(now));
            while entries.len() >= self.config.max_entries.max(1) {
                let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, e)| e.stored_at)
                    .map(|(k, _)| k.clone())
                else {
                    break;
                };
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            Entry {
                stored_at: now,
                ttl,
                value,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
