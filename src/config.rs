//! Cache configuration types.

use std::time::Duration;

use crate::error::CacheResult;
use crate::keys::KeySpace;

/// Cache configuration.
///
/// Carries everything a backend needs at construction: the namespace the
/// frontend assigned to this logical cache, the default entry lifetime, and
/// the connection parameters for remote stores.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache namespace; prefixes every key the backend writes
    pub namespace: String,

    /// Connection URL for remote stores (e.g. "redis://localhost:6379")
    pub url: Option<String>,

    /// Default lifetime applied when `set` is called without one.
    /// `None` (or a zero duration) means entries never expire.
    pub default_lifetime: Option<Duration>,

    /// Connection timeout for remote stores
    pub connection_timeout: Duration,

    /// Per-operation response timeout; a breach surfaces as unavailability
    pub operation_timeout: Duration,
}

impl CacheConfig {
    /// Create a configuration for the given namespace.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagcache::CacheConfig;
    ///
    /// let config = CacheConfig::new("pages");
    /// assert_eq!(config.namespace, "pages");
    /// ```
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            url: None,
            default_lifetime: None,
            connection_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(3),
        }
    }

    /// Create a configuration for a Redis-backed cache.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagcache::CacheConfig;
    ///
    /// let config = CacheConfig::redis("pages", "redis://localhost:6379");
    /// ```
    pub fn redis(namespace: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new(namespace)
        }
    }

    /// Set the default entry lifetime.
    pub fn with_default_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_lifetime = Some(lifetime);
        self
    }

    /// Set the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the per-operation response timeout.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Build the key space for this configuration, validating the namespace.
    pub fn key_space(&self) -> CacheResult<KeySpace> {
        KeySpace::new(self.namespace.clone())
    }

    /// The effective default lifetime: zero is normalized to "never expire".
    pub fn effective_default_lifetime(&self) -> Option<Duration> {
        self.default_lifetime.filter(|d| !d.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config() {
        let config = CacheConfig::new("pages");
        assert_eq!(config.namespace, "pages");
        assert_eq!(config.url, None);
        assert_eq!(config.default_lifetime, None);
    }

    #[test]
    fn test_redis_config() {
        let config = CacheConfig::redis("pages", "redis://localhost:6379");
        assert_eq!(config.url.as_deref(), Some("redis://localhost:6379"));
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::redis("pages", "redis://localhost:6379")
            .with_default_lifetime(Duration::from_secs(300))
            .with_connection_timeout(Duration::from_secs(1))
            .with_operation_timeout(Duration::from_millis(500));

        assert_eq!(config.default_lifetime, Some(Duration::from_secs(300)));
        assert_eq!(config.connection_timeout, Duration::from_secs(1));
        assert_eq!(config.operation_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_zero_default_lifetime_means_never() {
        let config = CacheConfig::new("pages").with_default_lifetime(Duration::ZERO);
        assert_eq!(config.effective_default_lifetime(), None);
    }

    #[test]
    fn test_key_space_rejects_bad_namespace() {
        assert!(CacheConfig::new("bad namespace").key_space().is_err());
        assert!(CacheConfig::new("pages").key_space().is_ok());
    }
}
