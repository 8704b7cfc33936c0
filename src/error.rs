//! Error types for cache operations.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The namespace has been frozen; only `flush` can mutate it.
    #[error("cache namespace '{0}' is frozen")]
    Frozen(String),

    /// Entry identifier violates the naming constraint
    #[error("invalid entry identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Tag violates the naming constraint
    #[error("invalid tag: {0:?}")]
    InvalidTag(String),

    /// Redis-specific error
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Operation timeout
    #[error("Operation timed out")]
    Timeout,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CacheError {
    /// Check whether this error means the backing store could not be reached,
    /// as opposed to a rejected request. Unavailability implies the write may
    /// not have been persisted.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            #[cfg(feature = "redis")]
            Self::Redis(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frozen_display_names_namespace() {
        let err = CacheError::Frozen("pages".to_string());
        assert!(format!("{err}").contains("pages"));
    }

    #[test]
    fn test_unavailability_class() {
        assert!(CacheError::Connection("refused".into()).is_unavailable());
        assert!(CacheError::Timeout.is_unavailable());
        assert!(!CacheError::Frozen("x".into()).is_unavailable());
        assert!(!CacheError::InvalidTag("a b".into()).is_unavailable());
    }
}
