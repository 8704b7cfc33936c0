//! Redis cache backend.
//!
//! The remote-store engine: payloads live under `<ns>:entry:<id>` with native
//! Redis TTLs, the entry list under `<ns>:entries`, tag sets under
//! `<ns>:tag:<tag>`, and the frozen flag under `<ns>:frozen`. Every operation
//! that touches more than one key class runs as a single `MULTI`/`EXEC`
//! batch, so concurrent readers never observe a partially applied write.
//! Within a batch, tag-set writes are queued ahead of the value write, so a
//! `flush_by_tag` racing with a `set` cannot miss the new entry.
//!
//! The backend is stateless between calls; Redis is the single source of
//! truth, shared freely between processes.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::keys::{KeySpace, validate_identifier, validate_tag};
use crate::traits::CacheBackend;

/// Redis cache backend.
#[derive(Clone, Debug)]
pub struct RedisBackend {
    connection: ConnectionManager,
    keys: KeySpace,
    default_lifetime: Option<Duration>,
}

impl RedisBackend {
    /// Connect to Redis and create a backend for the configured namespace.
    ///
    /// The configuration's connection and operation timeouts are applied at
    /// the connection level; a breached timeout surfaces as an
    /// unavailability error rather than a hang.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tagcache::{CacheConfig, RedisBackend};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), tagcache::CacheError> {
    ///     let config = CacheConfig::redis("pages", "redis://localhost:6379");
    ///     let cache = RedisBackend::connect(config).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(config: CacheConfig) -> CacheResult<Self> {
        let keys = config.key_space()?;
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| CacheError::Config("Redis backend requires a connection URL".into()))?;

        let client =
            Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Some(config.connection_timeout))
            .set_response_timeout(Some(config.operation_timeout));
        let connection = client
            .get_connection_manager_with_config(manager_config)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        info!(namespace = %keys.namespace(), url = %url, "connected Redis cache backend");
        Ok(Self {
            connection,
            keys,
            default_lifetime: config.effective_default_lifetime(),
        })
    }

    /// The key space this backend writes to.
    pub fn key_space(&self) -> &KeySpace {
        &self.keys
    }

    fn effective_lifetime(&self, lifetime: Option<Duration>) -> Option<Duration> {
        lifetime.or(self.default_lifetime).filter(|d| !d.is_zero())
    }

    async fn assert_not_frozen(&self, conn: &mut ConnectionManager) -> CacheResult<()> {
        let frozen: bool = conn.exists(self.keys.frozen()).await?;
        if frozen {
            Err(CacheError::Frozen(self.keys.namespace().to_string()))
        } else {
            Ok(())
        }
    }

    /// All tag-set keys currently present in the namespace. The store keeps
    /// no reverse index, so this is how an identifier's old tag links are
    /// found.
    async fn tag_set_keys(&self, conn: &mut ConnectionManager) -> CacheResult<Vec<String>> {
        let keys: Vec<String> = conn.keys(self.keys.tag_pattern()).await?;
        Ok(keys)
    }

    /// Which of `ids` still have a live payload, in input order.
    async fn liveness(
        &self,
        conn: &mut ConnectionManager,
        ids: &[String],
    ) -> CacheResult<Vec<bool>> {
        let mut pipe = redis::pipe();
        for id in ids {
            pipe.exists(self.keys.entry(id));
        }
        let alive: Vec<bool> = pipe.query_async(conn).await?;
        Ok(alive)
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
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

        let mut conn = self.connection.clone();
        self.assert_not_frozen(&mut conn).await?;

        // Stale reverse links from an earlier write with a different tag set
        // must not survive this write.
        let keep: Vec<String> = tags.iter().map(|tag| self.keys.tag(tag)).collect();
        let stale: Vec<String> = self
            .tag_set_keys(&mut conn)
            .await?
            .into_iter()
            .filter(|key| !keep.contains(key))
            .collect();

        let mut pipe = redis::pipe();
        pipe.atomic();
        // Tag-index writes queue ahead of the value write.
        for key in &keep {
            pipe.sadd(key, id).ignore();
        }
        for key in &stale {
            pipe.srem(key, id).ignore();
        }
        pipe.lrem(self.keys.entries(), 0, id).ignore();
        pipe.rpush(self.keys.entries(), id).ignore();
        match self.effective_lifetime(lifetime) {
            Some(lifetime) => pipe
                .set_ex(self.keys.entry(id), payload, lifetime.as_secs())
                .ignore(),
            None => pipe.set(self.keys.entry(id), payload).ignore(),
        };
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> CacheResult<Option<Vec<u8>>> {
        validate_identifier(id)?;
        let mut conn = self.connection.clone();
        let payload: Option<Vec<u8>> = conn.get(self.keys.entry(id)).await?;
        Ok(payload)
    }

    async fn has(&self, id: &str) -> CacheResult<bool> {
        validate_identifier(id)?;
        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(self.keys.entry(id)).await?;
        Ok(exists)
    }

    async fn remove(&self, id: &str) -> CacheResult<bool> {
        validate_identifier(id)?;
        let mut conn = self.connection.clone();
        self.assert_not_frozen(&mut conn).await?;

        let tag_keys = self.tag_set_keys(&mut conn).await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.del(self.keys.entry(id));
        pipe.lrem(self.keys.entries(), 0, id).ignore();
        for key in &tag_keys {
            pipe.srem(key, id).ignore();
        }
        let (deleted,): (u64,) = pipe.query_async(&mut conn).await?;
        Ok(deleted > 0)
    }

    async fn find_by_tag(&self, tag: &str) -> CacheResult<Vec<String>> {
        validate_tag(tag)?;
        let mut conn = self.connection.clone();

        let members: Vec<String> = conn.smembers(self.keys.tag(tag)).await?;
        if members.is_empty() {
            return Ok(members);
        }

        // Membership is not proof of existence: entries expire by native TTL
        // without their reverse links ever being touched.
        let alive = self.liveness(&mut conn, &members).await?;
        let mut live = Vec::new();
        let mut dead = Vec::new();
        for (id, alive) in members.into_iter().zip(alive) {
            if alive {
                live.push(id);
            } else {
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            // Opportunistic pruning; a failure here never fails the read.
            let pruned: Result<(), redis::RedisError> =
                conn.srem(self.keys.tag(tag), &dead).await;
            match pruned {
                Ok(()) => {
                    debug!(tag = %tag, pruned = dead.len(), "pruned dead identifiers from tag set")
                }
                Err(err) => warn!(tag = %tag, error = %err, "failed to prune dead identifiers"),
            }
        }

        live.sort_unstable();
        Ok(live)
    }

    async fn flush_by_tag(&self, tag: &str) -> CacheResult<usize> {
        validate_tag(tag)?;
        let mut conn = self.connection.clone();
        self.assert_not_frozen(&mut conn).await?;

        let members: Vec<String> = conn.smembers(self.keys.tag(tag)).await?;
        let tag_keys = self.tag_set_keys(&mut conn).await?;
        let this_tag = self.keys.tag(tag);

        let mut pipe = redis::pipe();
        pipe.atomic();
        for id in &members {
            pipe.del(self.keys.entry(id)).ignore();
            pipe.lrem(self.keys.entries(), 0, id).ignore();
        }
        // Members may carry other tags; those links go too.
        if !members.is_empty() {
            for key in tag_keys.iter().filter(|key| **key != this_tag) {
                pipe.srem(key, &members).ignore();
            }
        }
        pipe.del(&this_tag).ignore();
        let _: () = pipe.query_async(&mut conn).await?;

        debug!(tag = %tag, flushed = members.len(), "flushed cache entries by tag");
        Ok(members.len())
    }

    async fn flush(&self) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let keys: Vec<String> = conn.keys(self.keys.all_pattern()).await?;
        if !keys.is_empty() {
            let _: () = conn.del(keys).await?;
        }
        info!(namespace = %self.keys.namespace(), "flushed cache namespace");
        Ok(())
    }

    async fn collect_garbage(&self) -> CacheResult<usize> {
        let mut conn = self.connection.clone();

        let ids: Vec<String> = conn.lrange(self.keys.entries(), 0, -1).await?;
        if ids.is_empty() {
            return Ok(0);
        }

        let alive = self.liveness(&mut conn, &ids).await?;
        let dead: Vec<String> = ids
            .into_iter()
            .zip(alive)
            .filter_map(|(id, alive)| (!alive).then_some(id))
            .collect();
        if dead.is_empty() {
            return Ok(0);
        }

        let tag_keys = self.tag_set_keys(&mut conn).await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for id in &dead {
            pipe.lrem(self.keys.entries(), 0, id).ignore();
        }
        for key in &tag_keys {
            pipe.srem(key, &dead).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;

        debug!(namespace = %self.keys.namespace(), swept = dead.len(), "collected cache garbage");
        Ok(dead.len())
    }

    async fn freeze(&self) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        // Freezing twice is a contract violation, not a no-op.
        self.assert_not_frozen(&mut conn).await?;

        let ids: Vec<String> = conn.lrange(self.keys.entries(), 0, -1).await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for id in &ids {
            // PERSIST on a missing or expired key is a no-op, which is
            // exactly the tolerance freeze needs.
            pipe.persist(self.keys.entry(id)).ignore();
        }
        pipe.set(self.keys.frozen(), 1).ignore();
        let _: () = pipe.query_async(&mut conn).await?;

        info!(namespace = %self.keys.namespace(), entries = ids.len(), "cache namespace frozen");
        Ok(())
    }

    async fn is_frozen(&self) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        let frozen: bool = conn.exists(self.keys.frozen()).await?;
        Ok(frozen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_requires_url() {
        let err = RedisBackend::connect(CacheConfig::new("pages"))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_namespace() {
        let config = CacheConfig::redis("bad namespace", "redis://localhost:6379");
        let err = RedisBackend::connect(config).await.unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }
}
