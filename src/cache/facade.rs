//! Tag-aware cache facade.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::CacheConfig;
use crate::envelope::{self, Envelope, TagSnapshot};
use crate::error::{CacheError, Result};
use crate::keys::is_reserved;
use crate::lock::LockManager;
use crate::store::CacheStore;
use crate::tags::{Clock, SystemClock, TagRegistry};

/// Cache with tag-based invalidation and stampede locks.
///
/// Entries are stored as envelopes carrying the versions of their tags at
/// write time. Reads compare those versions with the current ones and treat
/// any difference as a miss; the stale bytes stay in the store until they
/// expire or are overwritten.
///
/// ## Example
///
/// ```rust,ignore
/// let cache = TagCache::new(MemoryStore::new(), CacheConfig::default());
///
/// cache.set("user:42", b"alice", None, &["users"]).await?;
/// assert_eq!(cache.get("user:42").await?, Some(b"alice".to_vec()));
///
/// cache.tags().bump_tag("users", None).await?;
/// assert_eq!(cache.get("user:42").await?, None);
/// ```
pub struct TagCache<S: ?Sized> {
    store: Arc<S>,
    tags: TagRegistry<S>,
    locks: LockManager<S>,
    config: CacheConfig,
}

impl<S: ?Sized> Clone for TagCache<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            tags: self.tags.clone(),
            locks: self.locks.clone(),
            config: self.config,
        }
    }
}

/// Lock-then-wait rounds `get_or_compute` makes before falling back to
/// the stale value.
const LOCK_ATTEMPTS: usize = 3;

fn ensure_key(key: &str) -> Result<()> {
    if is_reserved(key) {
        return Err(CacheError::ReservedKey(key.to_string()));
    }
    Ok(())
}

impl<S: CacheStore> TagCache<S> {
    /// Create a cache over `store`.
    pub fn new(store: S, config: CacheConfig) -> Self {
        Self::from_shared(Arc::new(store), config)
    }
}

impl<S: CacheStore + ?Sized> TagCache<S> {
    /// Create a cache over a shared store, e.g. an `Arc<dyn CacheStore>`.
    pub fn from_shared(store: Arc<S>, config: CacheConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create a cache whose tag versions come from `clock`.
    pub fn with_clock(store: Arc<S>, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            tags: TagRegistry::new(Arc::clone(&store), clock),
            locks: LockManager::new(Arc::clone(&store), config),
            store,
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Tag version operations.
    pub fn tags(&self) -> &TagRegistry<S> {
        &self.tags
    }

    /// Lock operations.
    pub fn locks(&self) -> &LockManager<S> {
        &self.locks
    }

    /// Read `key`, honoring tag invalidation.
    ///
    /// Returns `None` when the key is absent or any of its tags changed
    /// since it was written.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let Some(envelope) = self.fetch(key).await? else {
            return Ok(None);
        };

        if self.tags.is_invalidated(&envelope.tags).await? {
            debug!("Cache entry {} invalidated by tags", key);
            return Ok(None);
        }

        Ok(Some(envelope.data))
    }

    /// Read the payload under `key` without checking its tags.
    ///
    /// Useful for serving stale data while another caller recomputes.
    pub async fn peek(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.fetch(key).await?.map(|envelope| envelope.data))
    }

    /// Store `data` under `key`, snapshotting the current versions of `tag_names`.
    ///
    /// Tags that do not exist yet are created. A `ttl` of `None` never expires.
    pub async fn set(&self, key: &str, data: &[u8], ttl: Option<Duration>, tag_names: &[&str]) -> Result<bool> {
        ensure_key(key)?;

        let tags = self.tags.resolve_timestamps(tag_names).await?;
        let bytes = envelope::encode(data, &tags).map_err(|source| CacheError::MalformedEnvelope {
            key: key.to_string(),
            source,
        })?;

        let stored = self.store.set(key, &bytes, ttl).await?;
        debug!("Stored {} ({} bytes, {} tags)", key, data.len(), tags.len());
        Ok(stored)
    }

    /// Tag versions recorded in the entry under `key`.
    ///
    /// These are the versions at write time, not the current ones, and no
    /// invalidation check is made.
    pub async fn get_stored_tags(&self, key: &str) -> Result<Option<TagSnapshot>> {
        Ok(self.fetch(key).await?.map(|envelope| envelope.tags))
    }

    /// Remove the entry under `key`. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        ensure_key(key)?;
        Ok(self.store.delete(key).await?)
    }

    pub async fn lock(&self, key: &str) -> Result<bool> {
        self.locks.lock(key).await
    }

    pub async fn unlock(&self, key: &str) -> Result<bool> {
        self.locks.unlock(key).await
    }

    pub async fn is_locked(&self, key: &str) -> Result<bool> {
        self.locks.is_locked(key).await
    }

    pub async fn wait_for_unlock(&self, key: &str) -> Result<bool> {
        self.locks.wait_for_unlock(key).await
    }

    /// Read `key`, recomputing it under a lock on a miss.
    ///
    /// Only the caller holding the lock runs `compute`; the others wait for
    /// it to finish and re-read. If the holder leaves without storing a
    /// value, waiters compete for the lock again. When the wait budget runs
    /// out, the stale payload is returned if there is one, otherwise `LockHeld`.
    /// A malformed entry is treated as a miss and overwritten.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        tag_names: &[&str],
        compute: F,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<u8>>>,
    {
        if let Some(data) = self.lookup(key).await? {
            return Ok(data);
        }

        for attempt in 1..=LOCK_ATTEMPTS {
            if self.locks.lock(key).await? {
                let outcome = self.fill_locked(key, ttl, tag_names, compute).await;
                // A failed unlock leaves the marker to expire after lock_ttl.
                if let Err(e) = self.locks.unlock(key).await {
                    warn!("Failed to unlock {}: {}", key, e);
                }
                return outcome;
            }

            if !self.locks.wait_for_unlock(key).await? {
                break;
            }
            if let Some(data) = self.lookup(key).await? {
                return Ok(data);
            }
            // The holder released the lock without storing a value.
            debug!("Lock on {} released without a value (attempt {})", key, attempt);
        }

        match self.peek(key).await {
            Ok(Some(stale)) => {
                warn!("Serving stale value for {} while it is locked", key);
                Ok(stale)
            }
            Ok(None) | Err(CacheError::MalformedEnvelope { .. }) => Err(CacheError::LockHeld(key.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Runs with the lock held. Another caller may have stored the value
    /// between our miss and our lock, so look again before computing.
    async fn fill_locked<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        tag_names: &[&str],
        compute: F,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<u8>>>,
    {
        if let Some(data) = self.lookup(key).await? {
            return Ok(data);
        }

        let data = compute().await?;
        self.set(key, &data, ttl, tag_names).await?;
        Ok(data)
    }

    async fn lookup(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.get(key).await {
            Err(CacheError::MalformedEnvelope { source, .. }) => {
                warn!("Discarding malformed entry {}: {}", key, source);
                Ok(None)
            }
            other => other,
        }
    }

    async fn fetch(&self, key: &str) -> Result<Option<Envelope>> {
        ensure_key(key)?;

        let Some(bytes) = self.store.get(key).await? else {
            return Ok(None);
        };

        Envelope::decode(&bytes)
            .map(Some)
            .map_err(|source| CacheError::MalformedEnvelope {
                key: key.to_string(),
                source,
            })
    }
}

impl<S: ?Sized> std::fmt::Debug for TagCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
