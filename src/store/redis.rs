//! Redis store backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Client as RedisClient};
use async_trait::async_trait;
use tracing::info;

use super::{CacheStore, StoreError};

/// Store backed by a Redis server.
#[derive(Clone)]
pub struct RedisStore {
    client: Arc<RedisClient>,
}

impl RedisStore {
    /// Open a client for `url` (e.g. `redis://127.0.0.1/`).
    ///
    /// No connection is made until the first operation.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = RedisClient::open(url)?;
        info!("Redis store configured for {}", url);
        Ok(Self {
            client: Arc::new(client),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

/// `SET` with an optional `PX` expiry.
fn set_command(key: &str, value: &[u8], ttl: Option<Duration>) -> ::redis::Cmd {
    let mut cmd = ::redis::cmd("SET");
    cmd.arg(key).arg(value);
    if let Some(ttl) = ttl {
        // Redis rejects PX 0.
        cmd.arg("PX").arg((ttl.as_millis() as u64).max(1));
    }
    cmd
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = self.connection().await?;
        let values: Vec<Option<Vec<u8>>> = ::redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;

        Ok(keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|v| (key.clone(), v)))
            .collect())
    }

    async fn add(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let mut cmd = set_command(key, value, ttl);
        cmd.arg("NX");

        // Nil reply means the key already existed.
        let reply: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(reply.is_some())
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let reply: Option<String> = set_command(key, value, ttl).query_async(&mut conn).await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let removed: u64 = conn.del(key).await?;
        Ok(removed > 0)
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}
