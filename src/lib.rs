//! Tagcache - tag invalidation and stampede locks for key-value caches.
//!
//! A correctness layer in front of a networked cache such as memcached or
//! Redis. Entries can be invalidated in groups by bumping a tag version, and
//! a per-key advisory lock lets one caller recompute a missing value while
//! the others wait or serve stale data.
//!
//! ## Architecture
//!
//! - `store` - Narrow store capability (`CacheStore`) and backends
//! - `envelope` - Wire format pairing payloads with tag snapshots
//! - `tags` - Tag versions, lazy creation and invalidation checks
//! - `lock` - Advisory locks and bounded, cancellable waits
//! - `cache` - The `TagCache` facade

pub mod cache;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod lock;
pub mod store;
pub mod tags;

#[cfg(test)]
mod testing;

pub use cache::{CacheConfig, TagCache};
pub use envelope::{Envelope, EnvelopeError, TagSnapshot};
pub use error::{CacheError, Result};
pub use lock::{LockManager, WaitOutcome};
pub use store::{CacheStore, MemoryStore, StoreError};
pub use tags::{Clock, SystemClock, TagRegistry};
