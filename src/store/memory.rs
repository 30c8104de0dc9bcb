//! In-process store backed by Moka.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::sync::Cache;

use super::{CacheStore, StoreError};

/// Default upper bound on the number of entries.
const DEFAULT_CAPACITY: u64 = 100_000;

/// A stored value together with the TTL it was written with.
#[derive(Clone)]
struct Stored {
    bytes: Arc<[u8]>,
    ttl: Option<Duration>,
}

/// Expires each entry after the TTL it was last written with.
struct PerEntryTtl;

impl Expiry<String, Stored> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Stored, _created_at: Instant) -> Option<Duration> {
        value.ttl
    }

    // An overwrite replaces the TTL, it does not inherit the old one.
    fn expire_after_update(
        &self,
        _key: &String,
        value: &Stored,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// In-memory key-value store with per-entry TTL.
///
/// This store is:
/// - Thread-safe and clone-friendly (clones share the same entries)
/// - Bounded; entries are evicted under pressure the way memcached drops keys
///
/// Every operation returns `Ok`.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Cache<String, Stored>,
}

impl MemoryStore {
    /// Create a store with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a store holding at most `max_capacity` entries.
    pub fn with_capacity(max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { inner }
    }

    /// Check if a key exists and hasn't expired.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Get the number of entries in the store.
    ///
    /// Note: This may not be perfectly accurate due to concurrent operations.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.get(key).map(|stored| stored.bytes.to_vec()))
    }

    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        let found = keys
            .iter()
            .filter_map(|key| {
                self.inner
                    .get(key.as_str())
                    .map(|stored| (key.clone(), stored.bytes.to_vec()))
            })
            .collect();
        Ok(found)
    }

    async fn add(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool, StoreError> {
        let entry = self.inner.entry(key.to_string()).or_insert_with(|| Stored {
            bytes: Arc::from(value),
            ttl,
        });
        Ok(entry.is_fresh())
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool, StoreError> {
        self.inner.insert(
            key.to_string(),
            Stored {
                bytes: Arc::from(value),
                ttl,
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.inner.remove(key).is_some())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();
        assert!(store.set("a", b"1", None).await.unwrap());
        assert_eq!(store.get("a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_add_only_creates_once() {
        let store = MemoryStore::new();
        assert!(store.add("k", b"first", None).await.unwrap());
        assert!(!store.add("k", b"second", None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn test_get_many_omits_missing() {
        let store = MemoryStore::new();
        store.set("x", b"1", None).await.unwrap();
        store.set("y", b"2", None).await.unwrap();

        let keys = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        let found = store.get_many(&keys).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found.get("x"), Some(&b"1".to_vec()));
        assert!(!found.contains_key("z"));
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let store = MemoryStore::new();
        store.set("k", b"v", None).await.unwrap();
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert!(!store.contains("k"));
    }

    #[tokio::test]
    async fn test_ttl_expires_entry() {
        let store = MemoryStore::new();
        store
            .add("short", b"1", Some(Duration::from_millis(100)))
            .await
            .unwrap();
        assert!(store.contains("short"));

        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(store.get("short").await.unwrap(), None);
        // Expired key can be created again.
        assert!(store.add("short", b"2", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_ttl() {
        let store = MemoryStore::new();
        store
            .set("k", b"1", Some(Duration::from_millis(100)))
            .await
            .unwrap();
        store.set("k", b"2", None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(store.get("k").await.unwrap(), Some(b"2".to_vec()));
    }
}
