//! Cache configuration

use std::time::Duration;

/// Lifetime of every cached query result (2 days).
pub const ENTRY_TTL: Duration = Duration::from_secs(2 * 24 * 60 * 60);

/// Configuration for the versioned read-through cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live for entries written to the key store
    pub entry_ttl: Duration,
    /// Keep an in-process copy of recently read entries
    pub l1_enabled: bool,
    /// Maximum number of entries in the in-process tier
    pub l1_max_capacity: u64,
    /// Time-to-live for in-process entries
    pub l1_ttl: Duration,
    /// Delete the superseded generation's keys after a version bump
    ///
    /// Each bump of the transactions domain runs one cursor SCAN over the whole Redis
    /// keyspace per parameterized resource kind (five of them), plus a point UNLINK. On
    /// large or shared databases turn this off and let retired generations expire by
    /// `entry_ttl`.
    pub purge_previous_generation: bool,
    /// Upper bound for a single key store round trip
    pub op_timeout: Duration,
    /// COUNT hint for SCAN during prefix deletion
    pub scan_batch: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: ENTRY_TTL,
            l1_enabled: true,
            l1_max_capacity: 1000,
            l1_ttl: Duration::from_secs(300), // 5 minutes
            purge_previous_generation: true,
            op_timeout: Duration::from_secs(2),
            scan_batch: 200,
        }
    }
}
