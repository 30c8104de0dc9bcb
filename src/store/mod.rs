//! Store capability.
//!
//! The narrow set of atomic operations the cache layer needs from the
//! underlying key-value service. Any client that can provide them works:
//!
//! - `MemoryStore` - in-process backend built on Moka
//! - `RedisStore` - Redis backend (`redis` feature)

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

/// Failure reported by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but refused to store the value.
    #[error("store rejected write for key `{key}`")]
    Rejected { key: String },

    #[cfg(feature = "redis")]
    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),
}

/// Primitive operations of a networked key-value cache.
///
/// A `ttl` of `None` means the entry never expires.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the raw bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Fetch several keys in one round trip. Absent keys are omitted.
    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError>;

    /// Atomically create `key` if it does not exist.
    ///
    /// Returns `false` if the key was already present.
    async fn add(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool, StoreError>;

    /// Unconditionally store `value` under `key`.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool, StoreError>;

    /// Remove `key`. Returns whether something was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
}
