//! Key store contract and its Redis implementation
//!
//! The cache only needs a handful of primitives from the remote store: point reads,
//! writes with an expiry, a server-side atomic increment and deletion. Prefix deletion is
//! optional; stores without it leave retired generations to their TTL.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

use crate::{CacheConfig, CacheError};

/// Remote key/value store with per-key expiry.
#[async_trait]
pub trait KeyStore: Send + Sync + 'static {
    /// Read a string value, `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write a value that expires after `ttl`.
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Atomically increment the integer at `key` (absent counts as 0) and return the new value.
    async fn incr(&self, key: &str) -> Result<u64, CacheError>;

    /// Delete the given keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Delete every key starting with `prefix`.
    async fn delete_prefix(&self, _prefix: &str) -> Result<u64, CacheError> {
        Err(CacheError::Unsupported("prefix delete"))
    }
}

/// [`KeyStore`] backed by a Redis connection manager.
///
/// Every round trip is bounded by `op_timeout`; an elapsed timeout surfaces as
/// [`CacheError::Timeout`] and is handled like any other unavailable-store error.
#[derive(Clone)]
pub struct RedisKeyStore {
    conn: ConnectionManager,
    op_timeout: Duration,
    scan_batch: usize,
}

impl RedisKeyStore {
    /// Connect to Redis using the timeouts from `config`.
    pub async fn connect(
        redis_client: redis::Client,
        config: &CacheConfig,
    ) -> Result<Self, CacheError> {
        let conn = tokio::time::timeout(config.op_timeout, ConnectionManager::new(redis_client))
            .await
            .map_err(|_| CacheError::Timeout {
                op: "CONNECT",
                after: config.op_timeout,
            })??;
        Ok(Self::from_manager(conn, config))
    }

    /// Wrap an existing connection manager.
    pub fn from_manager(conn: ConnectionManager, config: &CacheConfig) -> Self {
        Self {
            conn,
            op_timeout: config.op_timeout,
            scan_batch: config.scan_batch.max(1),
        }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheError::Timeout {
                op,
                after: self.op_timeout,
            }),
        }
    }
}

#[async_trait]
impl KeyStore for RedisKeyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        self.bounded("GET", conn.get::<_, Option<String>>(key)).await
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let ttl_seconds = ttl.as_secs().max(1);
        self.bounded("SETEX", conn.set_ex::<_, _, ()>(key, value, ttl_seconds))
            .await
    }

    async fn incr(&self, key: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let value: i64 = self.bounded("INCR", conn.incr(key, 1i64)).await?;
        u64::try_from(value).map_err(|_| CacheError::InvalidCounter {
            key: key.to_owned(),
            value: value.to_string(),
        })
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        self.bounded("UNLINK", conn.unlink::<_, u64>(keys)).await
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let pattern = format!("{}*", escape_glob(prefix));
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut deleted = 0;

        // Cursor-based SCAN keeps the server responsive, unlike KEYS.
        loop {
            let (next, keys): (u64, Vec<String>) = self
                .bounded(
                    "SCAN",
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(self.scan_batch)
                        .query_async(&mut conn),
                )
                .await?;

            if !keys.is_empty() {
                deleted += self.delete(&keys).await?;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!("Deleted {} keys matching {}", deleted, pattern);
        Ok(deleted)
    }
}

/// Escape Redis glob metacharacters so `raw` only matches itself.
fn escape_glob(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\' | '^') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
