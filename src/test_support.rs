//! Shared test doubles

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::query::{DateRange, Query};
use crate::{CacheError, KeyStore, MemoryKeyStore};

/// A key store whose every call times out, as if the server were unreachable.
pub(crate) struct FailingStore;

fn unreachable_store(op: &'static str) -> CacheError {
    CacheError::Timeout {
        op,
        after: Duration::from_millis(1),
    }
}

#[async_trait]
impl KeyStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(unreachable_store("GET"))
    }

    async fn set_ex(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Err(unreachable_store("SETEX"))
    }

    async fn incr(&self, _key: &str) -> Result<u64, CacheError> {
        Err(unreachable_store("INCR"))
    }

    async fn delete(&self, _keys: &[String]) -> Result<u64, CacheError> {
        Err(unreachable_store("UNLINK"))
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<u64, CacheError> {
        Err(unreachable_store("SCAN"))
    }
}

/// Serves generation counters from memory while every entry read and write fails.
#[derive(Default)]
pub(crate) struct CounterOnlyStore {
    counters: MemoryKeyStore,
}

#[async_trait]
impl KeyStore for CounterOnlyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if key.contains("Version:") {
            self.counters.get(key).await
        } else {
            Err(unreachable_store("GET"))
        }
    }

    async fn set_ex(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Err(unreachable_store("SETEX"))
    }

    async fn incr(&self, key: &str) -> Result<u64, CacheError> {
        self.counters.incr(key).await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        self.counters.delete(keys).await
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        self.counters.delete_prefix(prefix).await
    }
}

/// Balance stats for January 2024.
pub(crate) fn balance_query() -> Query {
    Query::StatsBalance {
        range: january_2024(),
    }
}

pub(crate) fn january_2024() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
    .unwrap()
}
