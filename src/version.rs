//! Per-user generation counters

use std::sync::Arc;

use tracing::debug;

use crate::keys::{CacheKeyBuilder, Domain};
use crate::{CacheError, KeyStore};

/// Reads and bumps the generation counter of a `(user, domain)` pair.
///
/// Counters live in the key store, never in process memory, and are only ever changed
/// through the store's atomic increment.
pub struct VersionCounter<S: KeyStore> {
    store: Arc<S>,
}

impl<S: KeyStore> Clone for VersionCounter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyStore> VersionCounter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Current generation; a counter that was never bumped is generation 0.
    pub async fn current_version(&self, user_id: &str, domain: Domain) -> Result<u64, CacheError> {
        let key = CacheKeyBuilder::counter_key(user_id, domain);
        match self.store.get(&key).await? {
            None => Ok(0),
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| CacheError::InvalidCounter { key, value: raw }),
        }
    }

    /// Start a new generation and return its number.
    pub async fn bump(&self, user_id: &str, domain: Domain) -> Result<u64, CacheError> {
        let key = CacheKeyBuilder::counter_key(user_id, domain);
        let version = self.store.incr(&key).await?;
        debug!("Bumped {} to generation {}", key, version);
        Ok(version)
    }
}
