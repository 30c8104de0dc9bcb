//! Configuration module for the tagcache demo.
//!
//! Loads configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tagcache::CacheConfig;

const DEFAULT_MEMORY_CAPACITY: u64 = 100_000;
const DEFAULT_DEMO_WORKERS: usize = 8;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Lock TTL and wait settings.
    pub cache: CacheConfig,

    /// Redis URL. Only used when built with the `redis` feature;
    /// the in-memory store is used otherwise.
    pub redis_url: Option<String>,

    /// Append log events to this file instead of stderr.
    pub log_file: Option<PathBuf>,

    /// Maximum entries held by the in-memory store.
    pub memory_capacity: u64,

    /// Number of concurrent workers in the stampede demo.
    pub demo_workers: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Missing or unparsable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CacheConfig::default();

        let cache = CacheConfig::default()
            .wait_time(Duration::from_millis(parse_or(
                &lookup,
                "TAGCACHE_WAIT_TIME_MS",
                defaults.wait_time.as_millis() as u64,
            )))
            .wait_interval(Duration::from_millis(parse_or(
                &lookup,
                "TAGCACHE_WAIT_INTERVAL_MS",
                defaults.wait_interval.as_millis() as u64,
            )))
            .lock_ttl(Duration::from_secs(parse_or(
                &lookup,
                "TAGCACHE_LOCK_TTL_SECS",
                defaults.lock_ttl.as_secs(),
            )));

        let non_empty = |name: &str| lookup(name).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        Self {
            cache,
            redis_url: non_empty("TAGCACHE_REDIS_URL"),
            log_file: non_empty("TAGCACHE_LOG_FILE").map(PathBuf::from),
            memory_capacity: parse_or(&lookup, "TAGCACHE_MEMORY_CAPACITY", DEFAULT_MEMORY_CAPACITY),
            demo_workers: parse_or(&lookup, "TAGCACHE_DEMO_WORKERS", DEFAULT_DEMO_WORKERS).max(1),
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(name)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.redis_url, None);
        assert_eq!(config.log_file, None);
        assert_eq!(config.memory_capacity, DEFAULT_MEMORY_CAPACITY);
        assert_eq!(config.demo_workers, DEFAULT_DEMO_WORKERS);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("TAGCACHE_WAIT_TIME_MS", "500"),
            ("TAGCACHE_WAIT_INTERVAL_MS", " 50 "),
            ("TAGCACHE_LOCK_TTL_SECS", "2"),
            ("TAGCACHE_REDIS_URL", "redis://127.0.0.1/"),
            ("TAGCACHE_LOG_FILE", "/tmp/tagcache.log"),
            ("TAGCACHE_DEMO_WORKERS", "3"),
        ]);

        assert_eq!(config.cache.wait_time, Duration::from_millis(500));
        assert_eq!(config.cache.wait_interval, Duration::from_millis(50));
        assert_eq!(config.cache.lock_ttl, Duration::from_secs(2));
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1/"));
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/tagcache.log")));
        assert_eq!(config.demo_workers, 3);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("TAGCACHE_WAIT_TIME_MS", "soon"),
            ("TAGCACHE_DEMO_WORKERS", "0"),
            ("TAGCACHE_REDIS_URL", "   "),
        ]);

        assert_eq!(config.cache.wait_time, Duration::from_millis(3000));
        assert_eq!(config.demo_workers, 1);
        assert_eq!(config.redis_url, None);
    }
}
