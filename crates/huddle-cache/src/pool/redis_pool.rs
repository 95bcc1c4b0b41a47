//! Redis connection pool on top of deadpool-redis, with JSON helpers
//! used by every store in this crate.

use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    /// Redis connection URL (e.g., `redis://localhost:6379`)
    pub url: String,
    pub max_connections: usize,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 16,
        }
    }
}

impl From<&huddle_common::RedisConfig> for RedisPoolConfig {
    fn from(config: &huddle_common::RedisConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections as usize,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RedisPoolError {
    #[error("Failed to create Redis pool: {0}")]
    CreatePool(String),

    #[error("Failed to get connection from pool: {0}")]
    GetConnection(#[from] deadpool_redis::PoolError),

    #[error("Redis command error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid TTL: {0}")]
    InvalidTtl(u64),
}

pub type RedisResult<T> = Result<T, RedisPoolError>;

impl From<RedisPoolError> for huddle_core::DomainError {
    fn from(err: RedisPoolError) -> Self {
        Self::CacheError(err.to_string())
    }
}

#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("status", &self.pool.status())
            .finish()
    }
}

impl RedisPool {
    pub fn new(config: RedisPoolConfig) -> RedisResult<Self> {
        let pool = Config::from_url(&config.url)
            .builder()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?;

        // Never log credentials
        let safe_url = config.url.split('@').next_back().unwrap_or(&config.url);
        tracing::info!(
            url = %safe_url,
            max_connections = config.max_connections,
            "Redis pool created"
        );

        Ok(Self { pool })
    }

    pub fn from_config(config: &huddle_common::RedisConfig) -> RedisResult<Self> {
        Self::new(RedisPoolConfig::from(config))
    }

    pub async fn get(&self) -> RedisResult<deadpool_redis::Connection> {
        self.pool.get().await.map_err(RedisPoolError::GetConnection)
    }

    #[must_use]
    pub fn status(&self) -> deadpool_redis::Status {
        self.pool.status()
    }

    /// PING round trip, used by the readiness probe
    pub async fn health_check(&self) -> RedisResult<()> {
        let mut conn = self.get().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Store `value` as JSON, optionally expiring after `ttl_seconds`
    pub async fn set<V: Serialize>(
        &self,
        key: &str,
        value: &V,
        ttl_seconds: Option<u64>,
    ) -> RedisResult<()> {
        let mut conn = self.get().await?;
        let serialized = serde_json::to_string(value)?;

        match ttl_seconds {
            Some(0) => return Err(RedisPoolError::InvalidTtl(0)),
            Some(ttl) => conn.set_ex::<_, _, ()>(key, &serialized, ttl).await?,
            None => conn.set::<_, _, ()>(key, &serialized).await?,
        }

        Ok(())
    }

    /// Store `value` as JSON with a millisecond TTL
    pub async fn set_px<V: Serialize>(&self, key: &str, value: &V, ttl_ms: u64) -> RedisResult<()> {
        if ttl_ms == 0 {
            return Err(RedisPoolError::InvalidTtl(0));
        }
        let mut conn = self.get().await?;
        let serialized = serde_json::to_string(value)?;
        conn.pset_ex::<_, _, ()>(key, &serialized, ttl_ms).await?;
        Ok(())
    }

    pub async fn get_value<V: DeserializeOwned>(&self, key: &str) -> RedisResult<Option<V>> {
        let mut conn = self.get().await?;
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(v) => Ok(Some(serde_json::from_str(&v)?)),
            None => Ok(None),
        }
    }

    /// Fetch several JSON values in one round trip. The result is aligned
    /// with `keys`; missing keys come back as `None`.
    pub async fn get_values<V: DeserializeOwned>(
        &self,
        keys: &[String],
    ) -> RedisResult<Vec<Option<V>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.get().await?;
        let raw: Vec<Option<String>> = redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;

        raw.into_iter()
            .map(|value| match value {
                Some(v) => serde_json::from_str(&v).map(Some).map_err(Into::into),
                None => Ok(None),
            })
            .collect()
    }

    /// Atomically read and remove a JSON value
    pub async fn take_value<V: DeserializeOwned>(&self, key: &str) -> RedisResult<Option<V>> {
        let mut conn = self.get().await?;
        let value: Option<String> = redis::cmd("GETDEL").arg(key).query_async(&mut conn).await?;

        match value {
            Some(v) => Ok(Some(serde_json::from_str(&v)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, key: &str) -> RedisResult<bool> {
        let mut conn = self.get().await?;
        let deleted: i32 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    pub async fn delete_many(&self, keys: &[&str]) -> RedisResult<i32> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get().await?;
        let deleted: i32 = conn.del(keys).await?;
        Ok(deleted)
    }

    pub async fn exists(&self, key: &str) -> RedisResult<bool> {
        let mut conn = self.get().await?;
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    pub async fn expire(&self, key: &str, ttl_seconds: u64) -> RedisResult<bool> {
        let ttl = i64::try_from(ttl_seconds).map_err(|_| RedisPoolError::InvalidTtl(ttl_seconds))?;
        let mut conn = self.get().await?;
        let result: bool = conn.expire(key, ttl).await?;
        Ok(result)
    }

    /// Remaining TTL in seconds. `None` when the key is missing,
    /// `Some(-1)` when it never expires.
    pub async fn ttl(&self, key: &str) -> RedisResult<Option<i64>> {
        let mut conn = self.get().await?;
        let ttl: i64 = conn.ttl(key).await?;
        if ttl == -2 {
            Ok(None)
        } else {
            Ok(Some(ttl))
        }
    }

    /// Cursor-based key scan; never use `KEYS` against a live instance
    pub async fn scan_keys(&self, pattern: &str, count: usize) -> RedisResult<Vec<String>> {
        let mut conn = self.get().await?;
        let mut cursor: u64 = 0;
        let mut all_keys = Vec::new();

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(count)
                .query_async(&mut conn)
                .await?;

            all_keys.extend(keys);
            cursor = next_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(all_keys)
    }
}

pub type SharedRedisPool = Arc<RedisPool>;

pub fn create_shared_pool(config: RedisPoolConfig) -> RedisResult<SharedRedisPool> {
    Ok(Arc::new(RedisPool::new(config)?))
}
