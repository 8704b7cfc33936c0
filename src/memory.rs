//! In-memory cache backend.
//!
//! Keeps the full backend contract (tag index, entry list, freeze) in process
//! memory behind a single lock, so every multi-key mutation is atomic by
//! construction. Useful as an L1 engine and as the reference engine for the
//! conformance suite.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::keys::{validate_identifier, validate_tag};
use crate::traits::CacheBackend;

#[derive(Clone)]
struct StoredEntry {
    payload: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, StoredEntry>,
    /// Ordered list of all known identifiers; drives freeze and sweeps
    order: Vec<String>,
    tags: HashMap<String, HashSet<String>>,
    frozen: bool,
}

/// In-memory cache backend.
pub struct MemoryBackend {
    namespace: String,
    default_lifetime: Option<Duration>,
    inner: Arc<RwLock<Inner>>,
}

impl MemoryBackend {
    /// Create an unnamed backend with no default lifetime.
    pub fn new() -> Self {
        Self {
            namespace: "cache".to_string(),
            default_lifetime: None,
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Create a backend from a configuration (namespace and default
    /// lifetime; connection parameters are ignored).
    pub fn with_config(config: &CacheConfig) -> CacheResult<Self> {
        let keys = config.key_space()?;
        Ok(Self {
            namespace: keys.namespace().to_string(),
            default_lifetime: config.effective_default_lifetime(),
            inner: Arc::new(RwLock::new(Inner::default())),
        })
    }

    fn effective_lifetime(&self, lifetime: Option<Duration>) -> Option<Duration> {
        lifetime.or(self.default_lifetime).filter(|d| !d.is_zero())
    }

    fn frozen_error(&self) -> CacheError {
        CacheError::Frozen(self.namespace.clone())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    /// Drop `id` from every tag set except those named in `keep`, removing
    /// sets that become empty.
    fn unlink_from_tags_except(&mut self, id: &str, keep: &[&str]) {
        self.tags.retain(|tag, members| {
            if !keep.contains(&tag.as_str()) {
                members.remove(id);
            }
            !members.is_empty()
        });
    }

    /// Remove one entry completely: payload, list membership, reverse links.
    /// Returns whether a payload existed.
    fn purge(&mut self, id: &str) -> bool {
        let existed = self.entries.remove(id).is_some();
        self.order.retain(|known| known != id);
        self.unlink_from_tags_except(id, &[]);
        existed
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn set(
        &self,
        id: &str,
        payload: &[u8],
        tags: &[&str],
        lifetime: Option<Duration>,
    ) -> CacheResult<()> {
        validate_identifier(id)?;
        for tag in tags {
            validate_tag(tag)?;
        }

        let mut inner = self.inner.write().await;
        if inner.frozen {
            return Err(self.frozen_error());
        }

        let expires_at = self
            .effective_lifetime(lifetime)
            .map(|d| Instant::now() + d);
        inner.entries.insert(
            id.to_string(),
            StoredEntry {
                payload: payload.to_vec(),
                expires_at,
            },
        );

        inner.order.retain(|known| known != id);
        inner.order.push(id.to_string());

        // A re-set with a different tag set must not leave stale reverse
        // links behind.
        inner.unlink_from_tags_except(id, tags);
        for tag in tags {
            inner
                .tags
                .entry(tag.to_string())
                .or_default()
                .insert(id.to_string());
        }

        Ok(())
    }

    async fn get(&self, id: &str) -> CacheResult<Option<Vec<u8>>> {
        validate_identifier(id)?;
        let inner = self.inner.read().await;
        let now = Instant::now();
        Ok(inner
            .entries
            .get(id)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.payload.clone()))
    }

    async fn has(&self, id: &str) -> CacheResult<bool> {
        self.get(id).await.map(|payload| payload.is_some())
    }

    async fn remove(&self, id: &str) -> CacheResult<bool> {
        validate_identifier(id)?;
        let mut inner = self.inner.write().await;
        if inner.frozen {
            return Err(self.frozen_error());
        }
        Ok(inner.purge(id))
    }

    async fn find_by_tag(&self, tag: &str) -> CacheResult<Vec<String>> {
        validate_tag(tag)?;
        let mut inner = self.inner.write().await;
        let now = Instant::now();

        let Some(members) = inner.tags.get(tag) else {
            return Ok(Vec::new());
        };

        let (mut live, dead): (Vec<String>, Vec<String>) = members.iter().cloned().partition(|id| {
            inner
                .entries
                .get(id)
                .is_some_and(|entry| !entry.is_expired(now))
        });

        // Opportunistic pruning: dead identifiers found during resolution
        // leave the tag set immediately.
        if !dead.is_empty() {
            tracing::debug!(tag = %tag, pruned = dead.len(), "pruned dead identifiers from tag set");
            if let Some(members) = inner.tags.get_mut(tag) {
                for id in &dead {
                    members.remove(id);
                }
                if members.is_empty() {
                    inner.tags.remove(tag);
                }
            }
        }

        live.sort_unstable();
        Ok(live)
    }

    async fn flush_by_tag(&self, tag: &str) -> CacheResult<usize> {
        validate_tag(tag)?;
        let mut inner = self.inner.write().await;
        if inner.frozen {
            return Err(self.frozen_error());
        }

        let Some(members) = inner.tags.remove(tag) else {
            return Ok(0);
        };

        for id in &members {
            inner.purge(id);
        }
        Ok(members.len())
    }

    async fn flush(&self) -> CacheResult<()> {
        let mut inner = self.inner.write().await;
        *inner = Inner::default();
        Ok(())
    }

    async fn collect_garbage(&self) -> CacheResult<usize> {
        let mut inner = self.inner.write().await;
        let now = Instant::now();

        let dead: Vec<String> = inner
            .order
            .iter()
            .filter(|id| {
                inner
                    .entries
                    .get(id.as_str())
                    .is_none_or(|entry| entry.is_expired(now))
            })
            .cloned()
            .collect();

        for id in &dead {
            inner.purge(id);
        }

        if !dead.is_empty() {
            tracing::debug!(namespace = %self.namespace, swept = dead.len(), "collected cache garbage");
        }
        Ok(dead.len())
    }

    async fn freeze(&self) -> CacheResult<()> {
        let mut inner = self.inner.write().await;
        if inner.frozen {
            return Err(self.frozen_error());
        }

        let now = Instant::now();
        for entry in inner.entries.values_mut() {
            // Expired entries are skipped, never resurrected.
            if !entry.is_expired(now) {
                entry.expires_at = None;
            }
        }
        inner.frozen = true;
        tracing::info!(namespace = %self.namespace, "cache namespace frozen");
        Ok(())
    }

    async fn is_frozen(&self) -> CacheResult<bool> {
        Ok(self.inner.read().await.frozen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get_roundtrip() {
        let cache = MemoryBackend::new();
        cache.set("key1", b"value1", &[], None).await.unwrap();
        assert_eq!(cache.get("key1").await.unwrap(), Some(b"value1".to_vec()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let cache = MemoryBackend::new();
        assert_eq!(cache.get("missing").await.unwrap(), None);
        assert!(!cache.has("missing").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_lifetime_applies() {
        let config = CacheConfig::new("pages").with_default_lifetime(Duration::from_secs(60));
        let cache = MemoryBackend::with_config(&config).unwrap();

        cache.set("key1", b"v", &[], None).await.unwrap();
        assert!(cache.has("key1").await.unwrap());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!cache.has("key1").await.unwrap());
        assert_eq!(cache.get("key1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_lifetime_overrides_default() {
        let config = CacheConfig::new("pages").with_default_lifetime(Duration::from_secs(10));
        let cache = MemoryBackend::with_config(&config).unwrap();

        cache
            .set("key1", b"v", &[], Some(Duration::from_secs(120)))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.has("key1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_lifetime_means_never() {
        let cache = MemoryBackend::new();
        cache
            .set("key1", b"v", &[], Some(Duration::ZERO))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(86_400)).await;
        assert!(cache.has("key1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_garbage_sweeps_expired() {
        let cache = MemoryBackend::new();
        cache
            .set("gone", b"v", &["t"], Some(Duration::from_secs(1)))
            .await
            .unwrap();
        cache.set("kept", b"v", &["t"], None).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.collect_garbage().await.unwrap(), 1);

        assert_eq!(cache.find_by_tag("t").await.unwrap(), vec!["kept"]);
        assert!(cache.has("kept").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_by_tag_prunes_dead_members() {
        let cache = MemoryBackend::new();
        cache
            .set("dead", b"v", &["t"], Some(Duration::from_secs(1)))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        // Never returned as if live, and pruned as a side effect.
        assert!(cache.find_by_tag("t").await.unwrap().is_empty());
        assert!(cache.find_by_tag("t").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_freeze_skips_expired_entries() {
        let cache = MemoryBackend::new();
        cache
            .set("dead", b"v", &[], Some(Duration::from_secs(1)))
            .await
            .unwrap();
        cache
            .set("live", b"v", &[], Some(Duration::from_secs(60)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        cache.freeze().await.unwrap();

        // The live entry lost its TTL, the dead one stayed dead.
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(cache.has("live").await.unwrap());
        assert!(!cache.has("dead").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_names_rejected() {
        let cache = MemoryBackend::new();
        assert!(matches!(
            cache.set("bad id", b"v", &[], None).await,
            Err(CacheError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            cache.set("ok", b"v", &["bad tag"], None).await,
            Err(CacheError::InvalidTag(_))
        ));
        // Nothing was written by the rejected calls.
        assert!(!cache.has("ok").await.unwrap());
    }
}
