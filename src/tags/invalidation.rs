//! Staleness check for tag snapshots.

use tracing::debug;

use super::TagRegistry;
use crate::envelope::TagSnapshot;
use crate::error::Result;
use crate::store::CacheStore;

impl<S: CacheStore + ?Sized> TagRegistry<S> {
    /// Whether an entry written with `snapshot` is stale.
    ///
    /// True as soon as any tag's current version differs from the stored
    /// one, including a tag that was deleted and has just been recreated.
    /// An empty snapshot is never stale and costs no store round trip.
    pub async fn is_invalidated(&self, snapshot: &TagSnapshot) -> Result<bool> {
        if snapshot.is_empty() {
            return Ok(false);
        }

        let current = self.resolve_timestamps(snapshot.keys()).await?;

        for (name, stored) in snapshot {
            if current.get(name) != Some(stored) {
                debug!(
                    "Tag {} moved from {} to {:?}",
                    name,
                    stored,
                    current.get(name)
                );
                return Ok(true);
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{FlakyStore, StepClock};

    fn registry() -> TagRegistry<MemoryStore> {
        TagRegistry::new(Arc::new(MemoryStore::new()), Arc::new(StepClock::new()))
    }

    #[tokio::test]
    async fn test_empty_snapshot_is_valid() {
        let store = Arc::new(FlakyStore::new());
        let tags = TagRegistry::new(Arc::clone(&store), Arc::new(StepClock::new()));
        store.fail(true);

        assert!(!tags.is_invalidated(&TagSnapshot::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_unchanged_tags_are_valid() {
        let tags = registry();
        let snapshot = tags.resolve_timestamps(["a", "b"]).await.unwrap();
        assert!(!tags.is_invalidated(&snapshot).await.unwrap());
    }

    #[tokio::test]
    async fn test_bumped_tag_invalidates() {
        let tags = registry();
        let snapshot = tags.resolve_timestamps(["a", "b"]).await.unwrap();

        tags.bump_tag("b", None).await.unwrap();

        assert!(tags.is_invalidated(&snapshot).await.unwrap());
    }

    #[tokio::test]
    async fn test_deleted_tag_invalidates_after_recreation() {
        let tags = registry();
        let snapshot = tags.resolve_timestamps(["site"]).await.unwrap();

        tags.delete_tag("site").await.unwrap();

        assert!(tags.is_invalidated(&snapshot).await.unwrap());
        // The check recreated the tag with a new version.
        let recreated = tags.get_timestamp("site").await.unwrap().unwrap();
        assert_ne!(recreated, snapshot["site"]);
    }

    #[tokio::test]
    async fn test_store_failure_is_not_a_verdict() {
        let store = Arc::new(FlakyStore::new());
        let tags = TagRegistry::new(Arc::clone(&store), Arc::new(StepClock::new()));
        let snapshot = tags.resolve_timestamps(["a"]).await.unwrap();

        store.fail(true);

        let err = tags.is_invalidated(&snapshot).await.unwrap_err();
        assert!(err.is_store_unavailable());
    }
}
