//! Pluggable cache backends with tag-based invalidation, TTL expiration, and
//! freeze support.
//!
//! Every backend implements the same [`CacheBackend`] contract: opaque byte
//! payloads stored under string identifiers, a tag index for bulk
//! invalidation, per-entry lifetimes, and a one-way freeze transition that
//! turns a namespace into an immutable, TTL-free snapshot for read-heavy
//! production use. Only a full [`flush`](CacheBackend::flush) thaws a frozen
//! namespace.
//!
//! # Features
//!
//! - `redis` - Enable the Redis backend (enabled by default)
//!
//! # Examples
//!
//! ## Redis backend
//!
//! ```no_run
//! use tagcache::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CacheError> {
//!     let config = CacheConfig::redis("pages", "redis://localhost:6379")
//!         .with_default_lifetime(Duration::from_secs(3600));
//!     let cache = RedisBackend::connect(config).await?;
//!
//!     cache.set("page_1", b"<html>...", &["pages", "frontpage"], None).await?;
//!     cache.flush_by_tag("frontpage").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Freezing a namespace
//!
//! ```no_run
//! # use tagcache::prelude::*;
//! # async fn example(cache: impl CacheBackend) -> Result<(), CacheError> {
//! cache.freeze().await?;
//! assert!(cache.is_frozen().await?);
//!
//! // Reads keep working, writes fail with CacheError::Frozen.
//! let err = cache.set("page_2", b"...", &[], None).await.unwrap_err();
//! assert!(matches!(err, CacheError::Frozen(_)));
//!
//! // flush is the escape hatch back to a live namespace.
//! cache.flush().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## In-memory backend
//!
//! ```
//! use tagcache::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), CacheError> {
//! let cache = MemoryBackend::new();
//! cache.set("user_1", b"alice", &["users"], None).await?;
//! assert_eq!(cache.find_by_tag("users").await?, vec!["user_1"]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod keys;
pub mod memory;
pub mod traits;

#[cfg(feature = "redis")]
pub mod redis_backend;

pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use keys::KeySpace;
pub use memory::MemoryBackend;
pub use traits::CacheBackend;

#[cfg(feature = "redis")]
pub use redis_backend::RedisBackend;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::CacheConfig;
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::memory::MemoryBackend;
    pub use crate::traits::CacheBackend;

    #[cfg(feature = "redis")]
    pub use crate::redis_backend::RedisBackend;
}
