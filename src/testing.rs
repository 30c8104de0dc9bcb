//! Shared test fixtures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::keys::is_reserved;
use crate::store::{CacheStore, MemoryStore, StoreError};
use crate::tags::Clock;

/// Clock that advances by one on every reading, so consecutive tag
/// versions always differ.
#[derive(Debug)]
pub struct StepClock {
    next: AtomicI64,
}

impl StepClock {
    pub fn new() -> Self {
        Self {
            next: AtomicI64::new(1_700_000_000),
        }
    }
}

impl Clock for StepClock {
    fn timestamp(&self) -> String {
        self.next.fetch_add(1, Ordering::SeqCst).to_string()
    }
}

/// Memory store that can be switched into a failing state.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        self.check()?;
        self.inner.get_many(keys).await
    }

    async fn add(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.add(key, value, ttl).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.delete(key).await
    }
}

/// Memory store whose first read of a cache key misses, as if another
/// caller stored the value just after the read.
#[derive(Debug, Default)]
pub struct LaggingStore {
    inner: MemoryStore,
    lagged: AtomicBool,
}

impl LaggingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for LaggingStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if !is_reserved(key) && !self.lagged.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.get(key).await
    }

    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        self.inner.get_many(keys).await
    }

    async fn add(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool, StoreError> {
        self.inner.add(key, value, ttl).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool, StoreError> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.delete(key).await
    }
}
