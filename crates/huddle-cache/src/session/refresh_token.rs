//! Refresh token storage in Redis.
//!
//! Each issued refresh token is stored under its `jti`. Refreshing consumes
//! the entry with `GETDEL`, so a token can be exchanged at most once.

use crate::pool::{RedisPool, RedisResult};
use chrono::{DateTime, Utc};
use huddle_core::Snowflake;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

const REFRESH_TOKEN_PREFIX: &str = "refresh_token:";
const USER_TOKENS_PREFIX: &str = "user_tokens:";

/// 7 days
const DEFAULT_REFRESH_TOKEN_TTL: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenData {
    pub user_id: Snowflake,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub device_info: Option<String>,
}

impl RefreshTokenData {
    #[must_use]
    pub fn new(user_id: Snowflake) -> Self {
        Self {
            user_id,
            created_at: Utc::now(),
            device_info: None,
        }
    }

    #[must_use]
    pub fn with_device_info(mut self, device: impl Into<String>) -> Self {
        self.device_info = Some(device.into());
        self
    }
}

#[derive(Clone, Debug)]
pub struct RefreshTokenStore {
    pool: RedisPool,
    ttl_seconds: u64,
}

impl RefreshTokenStore {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self {
            pool,
            ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL,
        }
    }

    #[must_use]
    pub fn with_ttl(pool: RedisPool, ttl_seconds: u64) -> Self {
        Self {
            pool,
            ttl_seconds: ttl_seconds.max(1),
        }
    }

    fn key(token_id: &str) -> String {
        format!("{REFRESH_TOKEN_PREFIX}{token_id}")
    }

    fn user_key(user_id: Snowflake) -> String {
        format!("{USER_TOKENS_PREFIX}{user_id}")
    }

    pub async fn store(&self, token_id: &str, data: &RefreshTokenData) -> RedisResult<()> {
        self.pool
            .set(&Self::key(token_id), data, Some(self.ttl_seconds))
            .await?;

        let user_key = Self::user_key(data.user_id);
        let mut conn = self.pool.get().await?;
        conn.sadd::<_, _, ()>(&user_key, token_id).await?;
        conn.expire::<_, ()>(&user_key, self.ttl_seconds as i64).await?;

        tracing::debug!(token_id = %token_id, user_id = %data.user_id, "Stored refresh token");

        Ok(())
    }

    pub async fn get(&self, token_id: &str) -> RedisResult<Option<RefreshTokenData>> {
        self.pool.get_value(&Self::key(token_id)).await
    }

    /// Remove and return the token. A second call for the same id yields
    /// `None`, which is how reuse of a rotated token is detected.
    pub async fn consume(&self, token_id: &str) -> RedisResult<Option<RefreshTokenData>> {
        let data: Option<RefreshTokenData> = self.pool.take_value(&Self::key(token_id)).await?;
        if let Some(data) = &data {
            let mut conn = self.pool.get().await?;
            conn.srem::<_, _, ()>(Self::user_key(data.user_id), token_id)
                .await?;
        }
        Ok(data)
    }

    pub async fn revoke(&self, token_id: &str) -> RedisResult<bool> {
        let revoked = self.consume(token_id).await?.is_some();
        if revoked {
            tracing::debug!(token_id = %token_id, "Revoked refresh token");
        }
        Ok(revoked)
    }

    /// Logout from every device
    pub async fn revoke_all_for_user(&self, user_id: Snowflake) -> RedisResult<u32> {
        let user_key = Self::user_key(user_id);
        let mut conn = self.pool.get().await?;

        let token_ids: Vec<String> = conn.smembers(&user_key).await?;
        let count = token_ids.len() as u32;

        let mut keys: Vec<String> = token_ids.iter().map(|id| Self::key(id)).collect();
        keys.push(user_key);
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.pool.delete_many(&key_refs).await?;

        tracing::info!(user_id = %user_id, count = count, "Revoked all refresh tokens for user");

        Ok(count)
    }
}
