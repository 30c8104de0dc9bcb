//! Cache configuration.

use std::time::Duration;

/// Smallest polling step used while waiting for a lock.
pub const MIN_WAIT_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for a tagged cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Total polling budget of `wait_for_unlock`.
    pub wait_time: Duration,

    /// Sleep between two lock polls.
    /// Waited time is accounted in steps of this size.
    pub wait_interval: Duration,

    /// Expiry applied to lock markers by `lock`.
    pub lock_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            wait_time: Duration::from_millis(3000),
            wait_interval: Duration::from_millis(200),
            lock_ttl: Duration::from_secs(5),
        }
    }
}

impl CacheConfig {
    /// Set the total wait budget (builder pattern).
    #[must_use]
    pub fn wait_time(mut self, duration: Duration) -> Self {
        self.wait_time = duration;
        self
    }

    /// Set the polling interval. Clamped to `MIN_WAIT_INTERVAL`.
    #[must_use]
    pub fn wait_interval(mut self, duration: Duration) -> Self {
        self.wait_interval = duration.max(MIN_WAIT_INTERVAL);
        self
    }

    /// Set the lock marker expiry.
    #[must_use]
    pub fn lock_ttl(mut self, duration: Duration) -> Self {
        self.lock_ttl = duration;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.wait_time, Duration::from_millis(3000));
        assert_eq!(config.wait_interval, Duration::from_millis(200));
        assert_eq!(config.lock_ttl, Duration::from_secs(5));
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::default()
            .wait_time(Duration::from_millis(500))
            .wait_interval(Duration::ZERO)
            .lock_ttl(Duration::from_secs(1));

        assert_eq!(config.wait_time, Duration::from_millis(500));
        assert_eq!(config.wait_interval, MIN_WAIT_INTERVAL);
        assert_eq!(config.lock_ttl, Duration::from_secs(1));
    }
}
