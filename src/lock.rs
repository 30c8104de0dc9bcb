//! Advisory per-key locks.
//!
//! A lock is a short-lived marker under the `l_` prefix created with the
//! store's atomic add. Its presence means "someone is recomputing this key".
//! Ownership is not tracked: any caller can unlock, and a holder that
//! outlives the TTL silently loses exclusivity.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{CacheConfig, MIN_WAIT_INTERVAL};
use crate::error::Result;
use crate::keys::lock_key;
use crate::store::CacheStore;

/// Value stored in a lock marker. Only its presence matters.
const LOCK_MARKER: &[u8] = b"1";

/// How a wait for a lock ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The marker disappeared within the budget.
    Unlocked,
    /// The budget ran out with the marker still present.
    TimedOut,
    /// The cancellation future completed first.
    Cancelled,
}

/// Creates, removes and waits on lock markers.
pub struct LockManager<S: ?Sized> {
    store: Arc<S>,
    config: CacheConfig,
}

impl<S: ?Sized> Clone for LockManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config,
        }
    }
}

impl<S: CacheStore + ?Sized> LockManager<S> {
    pub fn new(store: Arc<S>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// Try to lock `key` for the configured lock TTL.
    ///
    /// Returns `false` if someone else holds the lock.
    pub async fn lock(&self, key: &str) -> Result<bool> {
        self.lock_for(key, self.config.lock_ttl).await
    }

    /// Try to lock `key` for `ttl`.
    pub async fn lock_for(&self, key: &str, ttl: Duration) -> Result<bool> {
        let acquired = self.store.add(&lock_key(key), LOCK_MARKER, Some(ttl)).await?;
        if acquired {
            debug!("Locked {} for {:?}", key, ttl);
        } else {
            debug!("Lock on {} already held", key);
        }
        Ok(acquired)
    }

    /// Remove the lock on `key`. Succeeds whether or not it was held.
    pub async fn unlock(&self, key: &str) -> Result<bool> {
        self.store.delete(&lock_key(key)).await?;
        debug!("Unlocked {}", key);
        Ok(true)
    }

    pub async fn is_locked(&self, key: &str) -> Result<bool> {
        Ok(self.store.get(&lock_key(key)).await?.is_some())
    }

    /// Wait for `key` to be unlocked using the configured budget.
    ///
    /// Returns `false` if the key is still locked when the budget runs out.
    pub async fn wait_for_unlock(&self, key: &str) -> Result<bool> {
        self.wait_for_unlock_with(key, self.config.wait_time, self.config.wait_interval)
            .await
    }

    /// Wait for `key` to be unlocked, polling every `interval` for at most
    /// `wait_time`.
    pub async fn wait_for_unlock_with(&self, key: &str, wait_time: Duration, interval: Duration) -> Result<bool> {
        let outcome = self
            .wait_for_unlock_until(key, wait_time, interval, std::future::pending::<()>())
            .await?;
        Ok(outcome == WaitOutcome::Unlocked)
    }

    /// Wait for `key` to be unlocked, giving up early when `cancel` completes.
    ///
    /// Waited time is counted in whole `interval` steps rather than measured,
    /// so the wait may overrun the lock's real expiry by up to one step.
    pub async fn wait_for_unlock_until<C>(
        &self,
        key: &str,
        wait_time: Duration,
        interval: Duration,
        cancel: C,
    ) -> Result<WaitOutcome>
    where
        C: Future,
    {
        let interval = interval.max(MIN_WAIT_INTERVAL);
        tokio::pin!(cancel);

        let mut waited = Duration::ZERO;
        while waited < wait_time {
            if !self.is_locked(key).await? {
                return Ok(WaitOutcome::Unlocked);
            }

            tokio::select! {
                _ = &mut cancel => {
                    debug!("Wait for {} cancelled after {} ms", key, waited.as_millis());
                    return Ok(WaitOutcome::Cancelled);
                }
                _ = tokio::time::sleep(interval) => {}
            }
            waited += interval;
        }

        warn!("Can't get {}. It's still locked. Waited {} ms.", key, waited.as_millis());
        Ok(WaitOutcome::TimedOut)
    }
}

impl<S: ?Sized> std::fmt::Debug for LockManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
