//! Process-local cache bounded by capacity and entry age.
//!
//! Backed by `lru_time_cache`: inserting past capacity evicts the least
//! recently used entry, and every insert purges entries older than the
//! cache-wide time to live. A shorter per-call TTL is honored on read.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru_time_cache::LruCache;

use crate::Cache;

/// Entries kept when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 10_000;

type Entry = (String, Option<Instant>);

pub struct MemoryCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryCache {
    /// Unexpiring cache holding up to [`DEFAULT_CAPACITY`] entries.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_CAPACITY, None)
    }

    /// `ttl = None` keeps entries until they are evicted for capacity.
    pub fn with_limits(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = capacity.max(1);
        let entries = match ttl {
            Some(ttl) => LruCache::with_expiry_duration_and_capacity(ttl, capacity),
            None => LruCache::with_capacity(capacity),
        };
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        let key = key.to_string();
        let (value, expires) = entries.get(&key)?.clone();
        if expires.is_some_and(|at| at <= Instant::now()) {
            entries.remove(&key);
            return None;
        }
        Some(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        if let Ok(mut entries) = self.entries.lock() {
            let expires = ttl.map(|ttl| Instant::now() + ttl);
            entries.insert(key.to_string(), (value.to_string(), expires));
        }
    }

    async fn delete(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(&key.to_string());
        }
    }
}
