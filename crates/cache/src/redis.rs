//! Redis-backed cache.

use std::sync::Mutex;
use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Client, RedisResult};
use async_trait::async_trait;

use crate::{Cache, CacheError};

/// Upper bound on a single cache round trip.
const OP_TIMEOUT: Duration = Duration::from_millis(500);

/// Cache over a Redis server.
///
/// Holds one multiplexed connection shared by all callers. A failed
/// operation drops it so the next call reconnects.
pub struct RedisCache {
    url: String,
    client: Client,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisCache {
    /// Open a client and verify the server answers.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        let mut conn = tokio::time::timeout(OP_TIMEOUT, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| CacheError::ConnectTimeout(url.to_string()))??;
        let _: Option<String> = conn.get("vidgit:ping").await?;

        tracing::info!(url, "Redis cache connected");
        Ok(Self {
            url: url.to_string(),
            client,
            conn: Mutex::new(Some(conn)),
        })
    }

    async fn connection(&self) -> Option<MultiplexedConnection> {
        let cached = self.conn.lock().ok().and_then(|slot| (*slot).clone());
        if cached.is_some() {
            return cached;
        }
        match tokio::time::timeout(OP_TIMEOUT, self.client.get_multiplexed_async_connection()).await
        {
            Ok(Ok(conn)) => {
                if let Ok(mut slot) = self.conn.lock() {
                    *slot = Some(conn.clone());
                }
                Some(conn)
            }
            Ok(Err(e)) => {
                tracing::warn!(url = %self.url, error = %e, "Redis reconnect failed");
                None
            }
            Err(_) => {
                tracing::warn!(url = %self.url, "Redis reconnect timed out");
                None
            }
        }
    }

    fn reset(&self) {
        if let Ok(mut slot) = self.conn.lock() {
            *slot = None;
        }
    }

    /// Run one command with a deadline. Any failure is logged, resets the
    /// connection and yields `None`.
    async fn run<T, F, Fut>(&self, op: &'static str, key: &str, f: F) -> Option<T>
    where
        F: FnOnce(MultiplexedConnection) -> Fut + Send,
        Fut: std::future::Future<Output = RedisResult<T>> + Send,
    {
        let conn = self.connection().await?;
        match tokio::time::timeout(OP_TIMEOUT, f(conn)).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(op, key, error = %e, "Redis cache operation failed");
                self.reset();
                None
            }
            Err(_) => {
                tracing::warn!(op, key, "Redis cache operation timed out");
                self.reset();
                None
            }
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        let owned = key.to_string();
        self.run("get", key, |mut conn| async move {
            conn.get::<_, Option<String>>(owned).await
        })
        .await
        .flatten()
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let owned = key.to_string();
        let value = value.to_string();
        self.run("set", key, |mut conn| async move {
            match ttl {
                Some(ttl) => conn.set_ex::<_, _, ()>(owned, value, ttl.as_secs().max(1)).await,
                None => conn.set::<_, _, ()>(owned, value).await,
            }
        })
        .await;
    }

    async fn delete(&self, key: &str) {
        let owned = key.to_string();
        self.run("delete", key, |mut conn| async move {
            conn.del::<_, ()>(owned).await
        })
        .await;
    }
}
