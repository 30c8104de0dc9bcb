//! Cache module - tag-versioned entries with stampede locks.
//!
//! ## Architecture
//!
//! - `TagCache` - Facade tying tag checks and locks to a store
//! - `CacheConfig` - Lock TTL and wait settings
//!
//! ## Usage
//!
//! ```rust,ignore
//! let cache = TagCache::new(MemoryStore::new(), CacheConfig::default());
//!
//! let page = cache
//!     .get_or_compute("page:1", None, &["site"], || async { render().await })
//!     .await?;
//!
//! // Invalidate every entry tagged "site"
//! cache.tags().bump_tag("site", None).await?;
//! ```

mod config;
mod facade;

pub use config::{CacheConfig, MIN_WAIT_INTERVAL};
pub use facade::TagCache;
