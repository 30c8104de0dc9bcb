//! Tagcache demo - stampede protection and tag invalidation in action.
//!
//! Spawns several workers that all ask for the same missing key at once.
//! Only one of them recomputes it; the rest wait for the lock and reuse the
//! result. Bumping the key's tag afterwards turns it into a miss.

mod config;

use std::fs::OpenOptions;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tagcache::{CacheStore, MemoryStore, TagCache};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;

const DEMO_KEY: &str = "report:daily";
const DEMO_TAG: &str = "reports";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_logging(&config)?;

    info!("Starting tagcache demo...");
    info!("Cache config: {:?}", config.cache);

    let store = open_store(&config)?;
    let cache = Arc::new(TagCache::from_shared(store, config.cache));

    tokio::select! {
        result = run_demo(cache, config.demo_workers) => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    Ok(())
}

/// Install the tracing subscriber.
///
/// With `TAGCACHE_LOG_FILE` set, every event is appended to that file as it
/// happens; nothing is buffered until shutdown.
fn init_logging(config: &Config) -> anyhow::Result<()> {
    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tagcache=info"));

    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn CacheStore>> {
    if let Some(url) = &config.redis_url
        && let Some(store) = open_redis(url)?
    {
        return Ok(store);
    }

    info!("Using in-memory store (capacity {})", config.memory_capacity);
    Ok(Arc::new(MemoryStore::with_capacity(config.memory_capacity)))
}

#[cfg(feature = "redis")]
fn open_redis(url: &str) -> anyhow::Result<Option<Arc<dyn CacheStore>>> {
    Ok(Some(Arc::new(tagcache::store::RedisStore::open(url)?)))
}

#[cfg(not(feature = "redis"))]
fn open_redis(url: &str) -> anyhow::Result<Option<Arc<dyn CacheStore>>> {
    warn!("Ignoring TAGCACHE_REDIS_URL={}: built without the redis feature", url);
    Ok(None)
}

async fn run_demo(cache: Arc<TagCache<dyn CacheStore>>, workers: usize) -> anyhow::Result<()> {
    let computations = Arc::new(AtomicU32::new(0));
    let start = Instant::now();

    info!("{} workers requesting {} concurrently", workers, DEMO_KEY);

    let handles: Vec<_> = (1..=workers)
        .map(|id| {
            let cache = Arc::clone(&cache);
            let computations = Arc::clone(&computations);
            tokio::spawn(async move {
                cache
                    .get_or_compute(DEMO_KEY, Some(Duration::from_secs(60)), &[DEMO_TAG], || async move {
                        computations.fetch_add(1, Ordering::SeqCst);
                        info!("Worker {} recomputing {}", id, DEMO_KEY);
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        Ok::<_, anyhow::Error>(format!("report computed by worker {}", id).into_bytes())
                    })
                    .await
            })
        })
        .collect();

    for handle in futures::future::join_all(handles).await {
        let value = handle??;
        info!("Got: {}", String::from_utf8_lossy(&value));
    }

    info!(
        "{} workers done in {:?} with {} recomputation(s)",
        workers,
        start.elapsed(),
        computations.load(Ordering::SeqCst)
    );

    if let Some(tags) = cache.get_stored_tags(DEMO_KEY).await? {
        info!("Stored tag versions: {:?}", tags);
    }

    // Tag versions have second resolution.
    tokio::time::sleep(Duration::from_secs(1)).await;

    let version = cache.tags().bump_tag(DEMO_TAG, None).await?;
    info!("Bumped tag {} to {}", DEMO_TAG, version);

    match cache.get(DEMO_KEY).await? {
        None => info!("{} is now a miss", DEMO_KEY),
        Some(_) => warn!("{} survived the tag bump", DEMO_KEY),
    }

    Ok(())
}
