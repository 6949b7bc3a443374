//! Post-commit invalidation
//!
//! Bumping a domain's counter is the invalidation: every later read computes keys for
//! the new generation. Deleting the previous generation afterwards only reclaims space
//! and runs detached; whatever it misses expires through the entry TTL.
//!
//! Call [`InvalidationTrigger::invalidate`] only after the mutation is durably committed.
//! Bumping first lets a reader fetch pre-mutation data into the new generation.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, warn};

use crate::keys::{CacheKeyBuilder, Domain, PurgeTarget};
use crate::version::VersionCounter;
use crate::{CacheConfig, CacheError, KeyStore};

pub struct InvalidationTrigger<S: KeyStore> {
    store: Arc<S>,
    versions: VersionCounter<S>,
    purge_previous_generation: bool,
}

impl<S: KeyStore> Clone for InvalidationTrigger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            versions: self.versions.clone(),
            purge_previous_generation: self.purge_previous_generation,
        }
    }
}

impl<S: KeyStore> InvalidationTrigger<S> {
    pub fn new(store: Arc<S>, config: &CacheConfig) -> Self {
        Self {
            versions: VersionCounter::new(Arc::clone(&store)),
            store,
            purge_previous_generation: config.purge_previous_generation,
        }
    }

    /// Retire the current generation of `domain` for `user_id`.
    ///
    /// Returns the new generation, or `None` when the counter could not be bumped. In that
    /// case cached reads stay stale until their TTL runs out; the write itself has already
    /// succeeded and is not failed because of it.
    pub async fn invalidate(&self, user_id: &str, domain: Domain) -> Option<u64> {
        let version = match self.versions.bump(user_id, domain).await {
            Ok(v) => v,
            Err(e) => {
                error!(
                    "Failed to bump {} version for user {}: {}. Cached reads stay stale until TTL expiry.",
                    domain, user_id, e
                );
                return None;
            }
        };

        if self.purge_previous_generation && version > 0 {
            let trigger = self.clone();
            let user_id = user_id.to_owned();
            tokio::spawn(async move {
                trigger.purge_generation(&user_id, domain, version - 1).await;
            });
        }

        Some(version)
    }

    /// Delete the keys of generation `version`, returning how many were removed.
    ///
    /// Best effort: failures are logged and counted as nothing deleted.
    pub async fn purge_generation(&self, user_id: &str, domain: Domain, version: u64) -> u64 {
        let targets = CacheKeyBuilder::generation_targets(domain, user_id, version);
        let results = join_all(targets.iter().map(|target| self.purge_target(target))).await;

        let deleted: u64 = results.into_iter().sum();
        debug!(
            "Purged {} keys of {} generation {} for user {}",
            deleted, domain, version, user_id
        );
        deleted
    }

    async fn purge_target(&self, target: &PurgeTarget) -> u64 {
        let result = match target {
            PurgeTarget::Key(key) => self.store.delete(std::slice::from_ref(key)).await,
            PurgeTarget::Prefix(prefix) => self.store.delete_prefix(prefix).await,
        };
        match result {
            Ok(n) => n,
            Err(CacheError::Unsupported(what)) => {
                debug!("Key store lacks {}; leaving {:?} to TTL expiry", what, target);
                0
            }
            Err(e) => {
                warn!("Failed to purge {:?}: {}. Leaving it to TTL expiry.", target, e);
                0
            }
        }
    }
}
