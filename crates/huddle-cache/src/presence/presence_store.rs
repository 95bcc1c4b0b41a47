//! Presence and typing state in Redis.
//!
//! The store is the only place presence lives. Gateway connections report
//! connects and disconnects, clients report explicit status changes, and
//! everything that displays presence reads it back from here.
//!
//! Keys:
//! - `presence:{user}`           JSON [`PresenceData`], TTL refreshed by heartbeats
//! - `presence_sessions:{user}`  set of live gateway session ids
//! - `typing:{conversation}:{user}` JSON [`TypingData`], short TTL

use crate::pool::{RedisPool, RedisResult};
use chrono::{DateTime, Utc};
use huddle_core::{PresenceStatus, Snowflake};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

const PRESENCE_PREFIX: &str = "presence:";
const PRESENCE_SESSIONS_PREFIX: &str = "presence_sessions:";
const TYPING_PREFIX: &str = "typing:";

/// Connected users must heartbeat within this window
const DEFAULT_PRESENCE_TTL: u64 = 300;
/// Offline records are kept around for `last_seen`
const OFFLINE_PRESENCE_TTL: u64 = 30 * 24 * 60 * 60;
const DEFAULT_TYPING_TTL_MS: u64 = 3000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceData {
    pub user_id: Snowflake,
    pub status: PresenceStatus,
    pub custom_status: Option<String>,
    /// Set when the user went offline
    pub last_seen: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PresenceData {
    #[must_use]
    pub fn new(user_id: Snowflake, status: PresenceStatus) -> Self {
        Self {
            user_id,
            status,
            custom_status: None,
            last_seen: None,
            updated_at: Utc::now(),
        }
    }

    /// What to show for a user with no record at all
    #[must_use]
    pub fn offline(user_id: Snowflake) -> Self {
        Self::new(user_id, PresenceStatus::Offline)
    }

    fn set_status(&mut self, status: PresenceStatus) {
        if status == PresenceStatus::Offline && self.status != PresenceStatus::Offline {
            self.last_seen = Some(Utc::now());
        }
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Result of a connect or disconnect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceTransition {
    pub presence: PresenceData,
    /// `true` when the visible status changed and should be broadcast
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingData {
    pub user_id: Snowflake,
    pub conversation_id: Snowflake,
    pub started_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct PresenceStore {
    pool: RedisPool,
    presence_ttl: u64,
    typing_ttl_ms: u64,
}

impl PresenceStore {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self {
            pool,
            presence_ttl: DEFAULT_PRESENCE_TTL,
            typing_ttl_ms: DEFAULT_TYPING_TTL_MS,
        }
    }

    #[must_use]
    pub fn from_config(pool: RedisPool, chat: &huddle_common::ChatConfig) -> Self {
        Self {
            pool,
            presence_ttl: chat.presence_ttl_secs.max(1),
            typing_ttl_ms: chat.typing_timeout_ms.max(1),
        }
    }

    fn presence_key(user_id: Snowflake) -> String {
        format!("{PRESENCE_PREFIX}{user_id}")
    }

    fn sessions_key(user_id: Snowflake) -> String {
        format!("{PRESENCE_SESSIONS_PREFIX}{user_id}")
    }

    fn typing_key(conversation_id: Snowflake, user_id: Snowflake) -> String {
        format!("{TYPING_PREFIX}{conversation_id}:{user_id}")
    }

    async fn save(&self, presence: &PresenceData) -> RedisResult<()> {
        let ttl = if presence.status.is_connected() {
            self.presence_ttl
        } else {
            OFFLINE_PRESENCE_TTL
        };
        self.pool
            .set(&Self::presence_key(presence.user_id), presence, Some(ttl))
            .await
    }

    pub async fn get(&self, user_id: Snowflake) -> RedisResult<Option<PresenceData>> {
        self.pool.get_value(&Self::presence_key(user_id)).await
    }

    /// Offline when there is no record
    pub async fn status_of(&self, user_id: Snowflake) -> RedisResult<PresenceStatus> {
        Ok(self
            .get(user_id)
            .await?
            .map_or(PresenceStatus::Offline, |p| p.status))
    }

    /// One record per requested user, in order; unknown users come back offline
    pub async fn get_many(&self, user_ids: &[Snowflake]) -> RedisResult<Vec<PresenceData>> {
        let keys: Vec<String> = user_ids.iter().copied().map(Self::presence_key).collect();
        let found: Vec<Option<PresenceData>> = self.pool.get_values(&keys).await?;

        Ok(user_ids
            .iter()
            .zip(found)
            .map(|(id, presence)| presence.unwrap_or_else(|| PresenceData::offline(*id)))
            .collect())
    }

    /// Register a gateway session. The first session brings the user online;
    /// an explicit away status survives extra sessions.
    pub async fn connect(
        &self,
        user_id: Snowflake,
        session_id: &str,
    ) -> RedisResult<PresenceTransition> {
        let sessions_key = Self::sessions_key(user_id);
        {
            let mut conn = self.pool.get().await?;
            conn.sadd::<_, _, ()>(&sessions_key, session_id).await?;
            conn.expire::<_, ()>(&sessions_key, self.presence_ttl as i64).await?;
        }

        let mut presence = self
            .get(user_id)
            .await?
            .unwrap_or_else(|| PresenceData::offline(user_id));
        let changed = presence.status == PresenceStatus::Offline;
        if changed {
            presence.set_status(PresenceStatus::Online);
        }
        self.save(&presence).await?;

        tracing::debug!(
            user_id = %user_id,
            session_id = %session_id,
            status = %presence.status,
            "Presence connect"
        );

        Ok(PresenceTransition { presence, changed })
    }

    /// Drop a gateway session. The last one takes the user offline and
    /// stamps `last_seen`.
    pub async fn disconnect(
        &self,
        user_id: Snowflake,
        session_id: &str,
    ) -> RedisResult<PresenceTransition> {
        let sessions_key = Self::sessions_key(user_id);
        let remaining: u64 = {
            let mut conn = self.pool.get().await?;
            conn.srem::<_, _, ()>(&sessions_key, session_id).await?;
            conn.scard(&sessions_key).await?
        };

        let mut presence = self
            .get(user_id)
            .await?
            .unwrap_or_else(|| PresenceData::offline(user_id));

        let changed = remaining == 0 && presence.status != PresenceStatus::Offline;
        if remaining == 0 {
            presence.set_status(PresenceStatus::Offline);
            self.save(&presence).await?;
        }

        tracing::debug!(
            user_id = %user_id,
            session_id = %session_id,
            remaining_sessions = remaining,
            "Presence disconnect"
        );

        Ok(PresenceTransition { presence, changed })
    }

    /// Explicit status change from the user
    pub async fn set_status(
        &self,
        user_id: Snowflake,
        status: PresenceStatus,
        custom_status: Option<String>,
    ) -> RedisResult<PresenceData> {
        let mut presence = self
            .get(user_id)
            .await?
            .unwrap_or_else(|| PresenceData::offline(user_id));
        presence.set_status(status);
        if custom_status.is_some() {
            presence.custom_status = custom_status.filter(|s| !s.trim().is_empty());
        }
        self.save(&presence).await?;

        tracing::debug!(user_id = %user_id, status = %status, "Presence status set");

        Ok(presence)
    }

    /// Heartbeat: keep the record and the session set alive
    pub async fn refresh(&self, user_id: Snowflake) -> RedisResult<bool> {
        let alive = self.pool.expire(&Self::presence_key(user_id), self.presence_ttl).await?;
        self.pool
            .expire(&Self::sessions_key(user_id), self.presence_ttl)
            .await?;
        Ok(alive)
    }

    pub async fn session_count(&self, user_id: Snowflake) -> RedisResult<u64> {
        let mut conn = self.pool.get().await?;
        let count: u64 = conn.scard(Self::sessions_key(user_id)).await?;
        Ok(count)
    }

    /// Mark the user as typing; the key expires on its own
    pub async fn set_typing(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> RedisResult<TypingData> {
        let typing = TypingData {
            user_id,
            conversation_id,
            started_at: Utc::now(),
        };
        self.pool
            .set_px(
                &Self::typing_key(conversation_id, user_id),
                &typing,
                self.typing_ttl_ms,
            )
            .await?;

        tracing::trace!(user_id = %user_id, conversation_id = %conversation_id, "Set typing");

        Ok(typing)
    }

    /// Returns whether the user was still marked as typing
    pub async fn clear_typing(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> RedisResult<bool> {
        self.pool
            .delete(&Self::typing_key(conversation_id, user_id))
            .await
    }

    pub async fn is_typing(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> RedisResult<bool> {
        self.pool
            .exists(&Self::typing_key(conversation_id, user_id))
            .await
    }

    pub async fn typing_in(&self, conversation_id: Snowflake) -> RedisResult<Vec<TypingData>> {
        let keys = self
            .pool
            .scan_keys(&format!("{TYPING_PREFIX}{conversation_id}:*"), 100)
            .await?;
        let found: Vec<Option<TypingData>> = self.pool.get_values(&keys).await?;
        Ok(found.into_iter().flatten().collect())
    }

    #[must_use]
    pub fn typing_ttl_ms(&self) -> u64 {
        self.typing_ttl_ms
    }
}
