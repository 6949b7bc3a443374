//! Versioned read-through cache
//!
//! Lookups go through two tiers:
//! - L1: optional in-process Moka cache (fastest, per instance)
//! - L2: the shared [`KeyStore`]
//!
//! and fall back to a caller-supplied fetch on a miss. Both tiers are keyed by the
//! version-qualified key, so an entry from a retired generation is never addressed again
//! and simply ages out.
//!
//! The cache is an optimization only. Any key store failure turns into a miss, and a
//! failed write-back is logged and dropped; the only error a caller can see is the one
//! its own fetch returned.

use std::future::Future;
use std::sync::Arc;

use moka::future::Cache;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::keys::CacheKeyBuilder;
use crate::query::Query;
use crate::version::VersionCounter;
use crate::{CacheConfig, KeyStore};

/// Trait for types that can be cached
pub trait Cacheable: Serialize + DeserializeOwned + Send + Sync + 'static {}
impl<T> Cacheable for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Read-through cache over a [`KeyStore`].
pub struct ReadThroughCache<S: KeyStore> {
    inner: Arc<ReadThroughInner<S>>,
}

struct ReadThroughInner<S: KeyStore> {
    l1_cache: Option<Cache<String, Arc<str>>>,
    store: Arc<S>,
    versions: VersionCounter<S>,
    config: CacheConfig,
}

impl<S: KeyStore> Clone for ReadThroughCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: KeyStore> ReadThroughCache<S> {
    pub fn new(store: Arc<S>, config: CacheConfig) -> Self {
        let l1_cache = config.l1_enabled.then(|| {
            Cache::builder()
                .max_capacity(config.l1_max_capacity)
                .time_to_live(config.l1_ttl)
                .build()
        });

        Self {
            inner: Arc::new(ReadThroughInner {
                l1_cache,
                versions: VersionCounter::new(Arc::clone(&store)),
                store,
                config,
            }),
        }
    }

    pub fn versions(&self) -> &VersionCounter<S> {
        &self.inner.versions
    }

    /// Serve `query` for `user_id` from the cache, or run `fetch` and cache its result.
    ///
    /// Concurrent misses on the same key may each run `fetch`; the last write wins.
    pub async fn get<V, E, F, Fut>(&self, user_id: &str, query: &Query, fetch: F) -> Result<V, E>
    where
        V: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let domain = query.kind().domain();
        let version = match self.inner.versions.current_version(user_id, domain).await {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    "Could not read {} version for user {} ({}). Bypassing cache.",
                    domain, user_id, e
                );
                return fetch().await;
            }
        };

        let key = CacheKeyBuilder::build_key(query, user_id, version);

        if let Some(value) = self.lookup::<V>(&key).await {
            return Ok(value);
        }

        let value = fetch().await?;
        debug!("Cache miss - fetched from backend for key: {}", key);
        self.populate(&key, &value).await;
        Ok(value)
    }

    async fn lookup<V: Cacheable>(&self, key: &str) -> Option<V> {
        if let Some(l1) = &self.inner.l1_cache
            && let Some(json) = l1.get(key).await
        {
            match serde_json::from_str::<V>(&json) {
                Ok(value) => {
                    debug!("Cache hit L1 for key: {}", key);
                    return Some(value);
                }
                Err(e) => {
                    warn!("Failed to decode L1 entry for key {}: {}. Dropping it.", key, e);
                    l1.invalidate(key).await;
                }
            }
        }

        let cached = match self.inner.store.get(key).await {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    "L2 GET error for key {} ({}). Falling back to backend.",
                    key, e
                );
                return None;
            }
        };

        let Some(json) = cached else {
            debug!("Cache miss L2 for key: {}", key);
            return None;
        };

        match serde_json::from_str::<V>(&json) {
            Ok(value) => {
                debug!("Cache hit L2 for key: {}", key);
                if let Some(l1) = &self.inner.l1_cache {
                    l1.insert(key.to_owned(), Arc::from(json)).await;
                }
                Some(value)
            }
            Err(e) => {
                warn!(
                    "Failed to deserialize cached value for key {}: {}. Deleting corrupt entry.",
                    key, e
                );
                if let Err(del_err) = self.inner.store.delete(&[key.to_owned()]).await {
                    warn!("Failed to delete corrupt L2 entry for key {}: {}", key, del_err);
                }
                None
            }
        }
    }

    async fn populate<V: Cacheable>(&self, key: &str, value: &V) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize value for key {}: {}. Not caching.", key, e);
                return;
            }
        };

        if let Some(l1) = &self.inner.l1_cache {
            l1.insert(key.to_owned(), Arc::from(json.as_str())).await;
        }

        if let Err(e) = self
            .inner
            .store
            .set_ex(key, json, self.inner.config.entry_ttl)
            .await
        {
            warn!("L2 SETEX error for key {}: {}. Continuing.", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Domain;
    use crate::query::{CategoryFilter, DateRange};
    use crate::test_support::{CounterOnlyStore, FailingStore, balance_query};
    use crate::{CacheError, MemoryKeyStore};
    use serde::Deserialize;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Balance {
        income: i64,
        expense: i64,
    }

    fn config(l1_enabled: bool) -> CacheConfig {
        CacheConfig {
            l1_enabled,
            purge_previous_generation: false,
            ..CacheConfig::default()
        }
    }

    async fn counted_fetch<V>(calls: &AtomicUsize, value: V) -> Result<V, CacheError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[tokio::test]
    async fn test_cold_then_warm() {
        for l1 in [false, true] {
            let store = Arc::new(MemoryKeyStore::new());
            let cache = ReadThroughCache::new(Arc::clone(&store), config(l1));
            let calls = AtomicUsize::new(0);
            let query = balance_query();
            let fresh = Balance {
                income: 500,
                expense: 200,
            };

            let first = cache
                .get("u1", &query, || counted_fetch(&calls, fresh.clone()))
                .await
                .unwrap();
            let second = cache
                .get("u1", &query, || counted_fetch(&calls, fresh.clone()))
                .await
                .unwrap();

            assert_eq!(first, fresh);
            assert_eq!(second, fresh);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert_eq!(
                store
                    .get("statsBalance:u1:0:2024-01-01:2024-01-31")
                    .await
                    .unwrap()
                    .as_deref(),
                Some(r#"{"income":500,"expense":200}"#)
            );
        }
    }

    #[tokio::test]
    async fn test_bumped_version_misses() {
        let store = Arc::new(MemoryKeyStore::new());
        let cache = ReadThroughCache::new(Arc::clone(&store), config(true));
        let calls = AtomicUsize::new(0);
        let query = balance_query();

        let before = Balance {
            income: 500,
            expense: 200,
        };
        let after = Balance {
            income: 500,
            expense: 260,
        };

        cache
            .get("u1", &query, || counted_fetch(&calls, before.clone()))
            .await
            .unwrap();
        cache.versions().bump("u1", Domain::Transactions).await.unwrap();
        let served = cache
            .get("u1", &query, || counted_fetch(&calls, after.clone()))
            .await
            .unwrap();

        assert_eq!(served, after);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(
            store
                .get("statsBalance:u1:1:2024-01-01:2024-01-31")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_other_domain_bump_keeps_entry() {
        let cache = ReadThroughCache::new(Arc::new(MemoryKeyStore::new()), config(false));
        let calls = AtomicUsize::new(0);
        let value = Balance {
            income: 1,
            expense: 2,
        };
        let query = balance_query();

        cache
            .get("u1", &query, || counted_fetch(&calls, value.clone()))
            .await
            .unwrap();
        cache.versions().bump("u1", Domain::Categories).await.unwrap();
        cache
            .get("u1", &query, || counted_fetch(&calls, value.clone()))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parameters_are_part_of_the_key() {
        let cache = ReadThroughCache::new(Arc::new(MemoryKeyStore::new()), config(true));
        let calls = AtomicUsize::new(0);
        let value = Balance {
            income: 1,
            expense: 2,
        };
        let jan = balance_query();
        let feb = Query::StatsBalance {
            range: DateRange::new(
                chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                chrono::NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            )
            .unwrap(),
        };

        for query in [jan, feb, jan, feb] {
            cache
                .get("u1", &query, || counted_fetch(&calls, value.clone()))
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_open() {
        let cache = ReadThroughCache::new(Arc::new(FailingStore), config(true));
        let calls = AtomicUsize::new(0);
        let value = Balance {
            income: 7,
            expense: 3,
        };
        let query = balance_query();

        for _ in 0..2 {
            let served = cache
                .get("u1", &query, || counted_fetch(&calls, value.clone()))
                .await
                .unwrap();
            assert_eq!(served, value);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let store = Arc::new(MemoryKeyStore::new());
        store
            .set_ex(
                "statsBalance:u1:0:2024-01-01:2024-01-31",
                "{not json".to_owned(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        let cache = ReadThroughCache::new(Arc::clone(&store), config(false));
        let calls = AtomicUsize::new(0);
        let value = Balance {
            income: 10,
            expense: 0,
        };

        let served = cache
            .get("u1", &balance_query(), || counted_fetch(&calls, value.clone()))
            .await
            .unwrap();

        assert_eq!(served, value);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let repaired = store
            .get("statsBalance:u1:0:2024-01-01:2024-01-31")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(serde_json::from_str::<Balance>(&repaired).unwrap(), value);
    }

    #[tokio::test]
    async fn test_fetch_error_is_returned_and_not_cached() {
        let store = Arc::new(MemoryKeyStore::new());
        let cache = ReadThroughCache::new(Arc::clone(&store), config(true));
        let query = Query::Categories {
            filter: CategoryFilter::All,
        };

        let failed: Result<Vec<String>, &str> =
            cache.get("u1", &query, || async { Err("db down") }).await;
        assert_eq!(failed, Err("db down"));
        assert_eq!(store.get("categories:u1:0:all").await.unwrap(), None);

        let ok: Result<Vec<String>, &str> = cache
            .get("u1", &query, || async { Ok(vec!["Food".to_owned()]) })
            .await;
        assert_eq!(ok, Ok(vec!["Food".to_owned()]));
    }

    #[tokio::test]
    async fn test_entry_read_and_write_errors_fall_through_to_fetch() {
        let store = Arc::new(CounterOnlyStore::default());
        let cache = ReadThroughCache::new(Arc::clone(&store), config(false));
        let calls = AtomicUsize::new(0);
        let query = balance_query();
        let fresh = Balance {
            income: 7,
            expense: 3,
        };

        for expected_calls in 1..=2 {
            let served = cache
                .get("u1", &query, || counted_fetch(&calls, fresh.clone()))
                .await
                .unwrap();
            assert_eq!(served, fresh);
            assert_eq!(calls.load(Ordering::SeqCst), expected_calls);
        }

        // Counter reads still work, so the keyed path was taken rather than the bypass.
        assert_eq!(cache.versions().bump("u1", Domain::Transactions).await.unwrap(), 1);
        let served = cache
            .get("u1", &query, || counted_fetch(&calls, fresh.clone()))
            .await
            .unwrap();
        assert_eq!(served, fresh);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unserializable_value_is_returned_and_not_cached() {
        for l1 in [false, true] {
            let store = Arc::new(MemoryKeyStore::new());
            let cache = ReadThroughCache::new(Arc::clone(&store), config(l1));
            let calls = AtomicUsize::new(0);
            let query = balance_query();
            // JSON object keys must be strings, so tuple keys fail to serialize.
            let value: HashMap<(u8, u8), u8> = HashMap::from([((1, 2), 3)]);

            for expected_calls in 1..=2 {
                let served = cache
                    .get("u1", &query, || counted_fetch(&calls, value.clone()))
                    .await
                    .unwrap();
                assert_eq!(served, value);
                assert_eq!(calls.load(Ordering::SeqCst), expected_calls);
            }
            assert_eq!(
                store
                    .get("statsBalance:u1:0:2024-01-01:2024-01-31")
                    .await
                    .unwrap(),
                None
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cold_reads_settle_on_valid_entry() {
        let store = Arc::new(MemoryKeyStore::new());
        let cache = ReadThroughCache::new(Arc::clone(&store), config(false));
        let query = balance_query();
        let value = Balance {
            income: 42,
            expense: 24,
        };

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let value = value.clone();
                tokio::spawn(async move {
                    cache
                        .get("u1", &query, || async move { Ok::<_, CacheError>(value) })
                        .await
                        .unwrap()
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), value);
        }
        let stored = store
            .get("statsBalance:u1:0:2024-01-01:2024-01-31")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(serde_json::from_str::<Balance>(&stored).unwrap(), value);
    }
}
