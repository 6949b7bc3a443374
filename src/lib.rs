//! fincache - Versioned read-through cache for personal finance aggregates
//!
//! Aggregate reads (category lists, transaction pages and history, balance and category
//! stats, history charts) are cached in a shared key store with a long TTL and keyed by a
//! per-user generation number:
//! - Reads compute `{kind}:{user}:{version}:{params}` and fall back to the backend on a miss
//! - Writes bump the generation of the affected domain after they commit
//! - Superseded generations are purged best-effort and otherwise expire by TTL
//!
//! The cache never fails a request: an unreachable or misbehaving key store only makes
//! reads slower or briefly stale.

mod config;
mod error;
pub mod finance_cache;
mod invalidation;
mod key_store;
pub mod keys;
mod memory_store;
pub mod models;
pub mod query;
mod read_through;
mod version;

#[cfg(test)]
mod test_support;

pub use config::{CacheConfig, ENTRY_TTL};
pub use error::{BackendError, CacheError, QueryError};
pub use finance_cache::{FinanceBackend, FinanceCache};
pub use invalidation::InvalidationTrigger;
pub use key_store::{KeyStore, RedisKeyStore};
pub use keys::{CacheKeyBuilder, Domain, PurgeTarget, ResourceKind};
pub use memory_store::MemoryKeyStore;
pub use query::{CategoryFilter, DateRange, HistoryPeriod, Page, Query};
pub use read_through::{Cacheable, ReadThroughCache};
pub use version::VersionCounter;

// Re-export async_trait for convenience
pub use async_trait::async_trait;
