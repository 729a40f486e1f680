//! Best-effort key/value cache in front of the store.
//!
//! A [`Cache`] never fails: an unreachable backend turns reads into misses
//! and writes into no-ops, with a warning logged. Callers always fall back
//! to the store, so the cache only ever saves work.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

pub mod memory;
pub mod redis;

pub use memory::MemoryCache;
pub use redis::RedisCache;

/// Errors raised while setting up a cache backend. Operations on a
/// connected cache never return errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value. `ttl = None` keeps it until deleted or evicted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>);

    async fn delete(&self, key: &str);
}

/// A cache that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) {}

    async fn delete(&self, _key: &str) {}
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

pub fn commit_key(commit_id: Uuid) -> String {
    format!("commit:{commit_id}")
}

pub fn commit_metadata_key(commit_id: Uuid) -> String {
    format!("commit:metadata:{commit_id}")
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

/// Read and decode a JSON value. An undecodable entry is dropped and
/// reported as a miss.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    let raw = cache.get(key).await?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
            cache.delete(key).await;
            None
        }
    }
}

pub async fn set_json<T: Serialize + Sync>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) {
    match serde_json::to_string(value) {
        Ok(raw) => cache.set(key, &raw, ttl).await,
        Err(e) => tracing::warn!(key, error = %e, "Failed to encode cache entry"),
    }
}
