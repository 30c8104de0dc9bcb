//! Error types for cache operations.

use thiserror::Error;

use crate::envelope::EnvelopeError;
use crate::store::StoreError;

/// Errors surfaced by the tag registry, lock manager and cache facade.
///
/// A missing or invalidated entry is not an error; those calls return
/// `Ok(None)`. Losing a lock race is `Ok(false)`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The underlying store failed. Never reported as a cache miss.
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    /// Bytes under `key` are not a readable envelope.
    #[error("malformed envelope under key `{key}`")]
    MalformedEnvelope {
        key: String,
        #[source]
        source: EnvelopeError,
    },

    /// Another caller holds the lock and no stale value was available.
    #[error("key `{0}` is locked by another caller")]
    LockHeld(String),

    /// The key collides with the lock or tag namespace.
    #[error("key `{0}` uses a reserved prefix")]
    ReservedKey(String),

    /// The caller's recomputation failed.
    #[error(transparent)]
    Compute(#[from] anyhow::Error),
}

impl CacheError {
    /// Whether this error came from the store rather than from the data.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
