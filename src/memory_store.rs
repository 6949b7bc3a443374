//! In-process key store
//!
//! A [`KeyStore`] living inside one process. Counters kept here are only shared between
//! tasks of that process, so it suits single-instance deployments and tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};

use crate::{CacheError, KeyStore};

#[derive(Debug, Clone)]
struct StoredValue {
    value: Arc<str>,
    ttl: Option<Duration>,
}

/// Expires each entry after the TTL it was written with; counters never expire.
struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// Moka-backed [`KeyStore`] with per-key expiry and atomic increments.
#[derive(Clone)]
pub struct MemoryKeyStore {
    entries: Cache<String, StoredValue>,
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().expire_after(PerEntryTtl).build(),
        }
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).await.map(|v| v.value.to_string()))
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(
                key.to_owned(),
                StoredValue {
                    value: value.into(),
                    ttl: Some(ttl),
                },
            )
            .await;
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<u64, CacheError> {
        let result = self
            .entries
            .entry(key.to_owned())
            .and_compute_with(|current| {
                let op = match current.map(|entry| entry.into_value()) {
                    None => Op::Put(StoredValue {
                        value: "1".into(),
                        ttl: None,
                    }),
                    Some(stored) => match stored.value.parse::<u64>() {
                        Ok(n) => Op::Put(StoredValue {
                            value: n.saturating_add(1).to_string().into(),
                            ttl: stored.ttl,
                        }),
                        Err(_) => Op::Nop,
                    },
                };
                std::future::ready(op)
            })
            .await;

        match result {
            CompResult::Inserted(entry) | CompResult::ReplacedWith(entry) => entry
                .value()
                .value
                .parse::<u64>()
                .map_err(|_| invalid_counter(key, &entry.value().value)),
            CompResult::Unchanged(entry) => Err(invalid_counter(key, &entry.value().value)),
            CompResult::Removed(_) | CompResult::StillNone(_) => Err(invalid_counter(key, "")),
        }
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        let mut deleted = 0;
        for key in keys {
            if self.entries.remove(key).await.is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| String::clone(&key))
            .collect();
        self.delete(&matching).await
    }
}

fn invalid_counter(key: &str, value: &str) -> CacheError {
    CacheError::InvalidCounter {
        key: key.to_owned(),
        value: value.to_owned(),
    }
}
