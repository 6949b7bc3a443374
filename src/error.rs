//! Cache error types

use std::time::Duration;

use redis::RedisError;

/// Errors coming from the data source behind the cache.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Cache-related errors
///
/// None of these ever reach a caller of [`crate::ReadThroughCache`] or
/// [`crate::InvalidationTrigger`]; they are logged and the request falls back to the backend.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Key store {op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("Value at {key} is not a valid counter: {value}")]
    InvalidCounter { key: String, value: String },

    #[error("Key store does not support {0}")]
    Unsupported(&'static str),
}

/// Rejected query parameters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("date range starts after it ends ({from} > {to})")]
    ReversedRange { from: String, to: String },

    #[error("page must be at least 1")]
    ZeroPage,

    #[error("page size must be between 1 and {max}, got {got}")]
    PageSize { got: u32, max: u32 },

    #[error("month must be between 0 and 11, got {0}")]
    Month(u32),

    #[error("year must be between 2000 and 3000, got {0}")]
    Year(i32),

    #[error("unknown value {0:?}")]
    Unknown(String),
}
