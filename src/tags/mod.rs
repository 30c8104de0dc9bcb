//! Tag registry.
//!
//! A tag is a store entry under the `t_` prefix whose value is the tag's
//! current version. Cache entries remember the versions they were written
//! with; changing a tag's version makes those entries stale.
//!
//! Tag writes are plain overwrites. Concurrent bumps or lazy creations of
//! the same tag resolve as last-write-wins, so a bump can be overwritten
//! by a racing lazy creation that read the clock earlier.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::envelope::TagSnapshot;
use crate::error::Result;
use crate::keys::tag_key;
use crate::store::{CacheStore, StoreError};

mod clock;
mod invalidation;

pub use clock::{Clock, SystemClock};

/// Reads and writes tag versions in the store.
pub struct TagRegistry<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

// Manual Clone implementation that doesn't require S: Clone
impl<S: ?Sized> Clone for TagRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

fn decode_timestamp(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl<S: CacheStore + ?Sized> TagRegistry<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Current version of tag `name`, if it exists.
    pub async fn get_timestamp(&self, name: &str) -> Result<Option<String>> {
        let value = self.store.get(&tag_key(name)).await?;
        Ok(value.as_deref().map(decode_timestamp))
    }

    /// Overwrite the version of tag `name`.
    ///
    /// Not a compare-and-swap: the last concurrent writer wins.
    pub async fn set_timestamp(&self, name: &str, timestamp: &str, ttl: Option<Duration>) -> Result<()> {
        let key = tag_key(name);
        if !self.store.set(&key, timestamp.as_bytes(), ttl).await? {
            return Err(StoreError::Rejected { key }.into());
        }
        debug!("Tag {} set to {}", name, timestamp);
        Ok(())
    }

    /// Set tag `name` to the current clock reading and return it.
    ///
    /// Every entry written with an older version of the tag becomes stale.
    pub async fn bump_tag(&self, name: &str, ttl: Option<Duration>) -> Result<String> {
        let timestamp = self.clock.timestamp();
        self.set_timestamp(name, &timestamp, ttl).await?;
        Ok(timestamp)
    }

    /// Remove tag `name`. Returns whether it existed.
    ///
    /// The next reference recreates it with a fresh version, which
    /// invalidates every entry that used it.
    pub async fn delete_tag(&self, name: &str) -> Result<bool> {
        let removed = self.store.delete(&tag_key(name)).await?;
        debug!("Tag {} deleted (existed: {})", name, removed);
        Ok(removed)
    }

    /// Write the current clock reading as the version of `name`.
    ///
    /// Does not check whether the tag already exists.
    pub async fn new_tag(&self, name: &str) -> Result<String> {
        let timestamp = self.clock.timestamp();
        self.set_timestamp(name, &timestamp, None).await?;
        debug!("Created tag {} at {}", name, timestamp);
        Ok(timestamp)
    }

    /// Resolve the current version of every named tag.
    ///
    /// Present tags are fetched in one batch; missing ones are created with
    /// the current clock reading. Duplicate names collapse to one entry.
    pub async fn resolve_timestamps<I, N>(&self, names: I) -> Result<TagSnapshot>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let names: BTreeSet<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        if names.is_empty() {
            return Ok(TagSnapshot::new());
        }

        let keys: Vec<String> = names.iter().map(|name| tag_key(name)).collect();
        let found = self.store.get_many(&keys).await?;

        let mut resolved = TagSnapshot::new();
        for (name, key) in names.into_iter().zip(keys) {
            let timestamp = match found.get(&key) {
                Some(bytes) => decode_timestamp(bytes),
                None => self.new_tag(&name).await?,
            };
            resolved.insert(name, timestamp);
        }

        Ok(resolved)
    }
}

impl<S: ?Sized> std::fmt::Debug for TagRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagRegistry").finish_non_exhaustive()
    }
}
