//! Cache backend trait definition.

use crate::error::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

/// Contract shared by every cache backend.
///
/// A backend stores opaque byte payloads under entry identifiers, maintains a
/// tag index for bulk invalidation, and supports a one-way freeze transition
/// that turns the namespace into an immutable, TTL-free snapshot.
///
/// Payloads are plain bytes; converting domain values to and from bytes is
/// the job of a collaborator codec, not the backend.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Store a payload under `id`, tagged with `tags`.
    ///
    /// Overwrites any prior payload for the same identifier and drops tag
    /// links from a prior write that are not in `tags`, so an identifier
    /// never stays linked to a tag it no longer carries.
    ///
    /// The effective lifetime is `lifetime` if given, else the configured
    /// default, else the entry never expires. A zero lifetime means never.
    ///
    /// Fails with [`CacheError::Frozen`] once the namespace is frozen.
    ///
    /// [`CacheError::Frozen`]: crate::CacheError::Frozen
    async fn set(
        &self,
        id: &str,
        payload: &[u8],
        tags: &[&str],
        lifetime: Option<Duration>,
    ) -> CacheResult<()>;

    /// Fetch the payload for `id`.
    ///
    /// Returns `Ok(None)` for a missing or expired entry; an expired entry is
    /// never resurrected.
    async fn get(&self, id: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Check whether a non-expired payload exists for `id`.
    async fn has(&self, id: &str) -> CacheResult<bool>;

    /// Remove the entry for `id`: its payload, its entry-list membership, and
    /// its reverse tag links.
    ///
    /// Returns whether a payload existed. Removing a missing identifier is
    /// not an error.
    ///
    /// Fails with [`CacheError::Frozen`] once the namespace is frozen.
    ///
    /// [`CacheError::Frozen`]: crate::CacheError::Frozen
    async fn remove(&self, id: &str) -> CacheResult<bool>;

    /// Resolve the identifiers currently tagged with `tag`.
    ///
    /// Tag-set membership is not proof of existence: an entry can expire by
    /// TTL without its reverse link ever being cleaned up. Every resolution
    /// is therefore verified against the entry store, and dead identifiers
    /// are pruned from the tag set rather than returned.
    async fn find_by_tag(&self, tag: &str) -> CacheResult<Vec<String>>;

    /// Remove every entry tagged with `tag`, then the tag set itself.
    ///
    /// Each member is removed completely, including its links under other
    /// tags. Returns the number of entries flushed.
    ///
    /// Fails with [`CacheError::Frozen`] once the namespace is frozen.
    ///
    /// [`CacheError::Frozen`]: crate::CacheError::Frozen
    async fn flush_by_tag(&self, tag: &str) -> CacheResult<usize>;

    /// Clear the namespace completely: every payload, the entry list, every
    /// tag set, and the frozen flag.
    ///
    /// This is the only mutation allowed on a frozen namespace; it returns
    /// the namespace to its live state.
    async fn flush(&self) -> CacheResult<()>;

    /// Sweep entry-list and tag-index remnants left behind by entries that
    /// expired without an explicit remove. Returns the number of identifiers
    /// swept.
    async fn collect_garbage(&self) -> CacheResult<usize>;

    /// Freeze the namespace: strip the TTL from every live entry and set the
    /// persistent frozen flag.
    ///
    /// Entries listed but already expired are skipped. After a successful
    /// freeze, `set`, `remove`, `flush_by_tag`, and `freeze` itself all fail
    /// with [`CacheError::Frozen`]; only [`flush`](Self::flush) recovers.
    ///
    /// [`CacheError::Frozen`]: crate::CacheError::Frozen
    async fn freeze(&self) -> CacheResult<()>;

    /// Check whether the namespace is frozen.
    async fn is_frozen(&self) -> CacheResult<bool>;
}
