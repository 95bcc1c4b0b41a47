//! Gateway session storage in Redis.
//!
//! A session outlives its socket for [`SESSION_RESUME_TTL`] seconds so a
//! client that drops can resume: it gets back its joined conversations and
//! every dispatch it missed, replayed from a bounded per-session queue.

use crate::pool::{RedisPool, RedisResult};
use chrono::{DateTime, Utc};
use huddle_core::Snowflake;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

const GATEWAY_SESSION_PREFIX: &str = "gateway_session:";
const GATEWAY_EVENTS_PREFIX: &str = "gateway_events:";
const USER_SESSIONS_PREFIX: &str = "user_gateway_sessions:";

/// Resume window after a disconnect, in seconds
pub const SESSION_RESUME_TTL: u64 = 120;
/// Dispatches kept per session for replay
pub const MAX_RESUME_EVENTS: usize = 1000;
/// Upper bound for connected sessions in case an instance dies without cleanup
const CONNECTED_SESSION_TTL: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connected,
    /// Socket is gone but the session can still be resumed
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySessionData {
    pub session_id: String,
    pub user_id: Snowflake,
    /// Last sequence number dispatched on this session
    pub sequence: u64,
    /// Conversation rooms the session had joined
    pub conversations: Vec<Snowflake>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub state: SessionState,
}

impl GatewaySessionData {
    #[must_use]
    pub fn new(session_id: String, user_id: Snowflake) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            user_id,
            sequence: 0,
            conversations: Vec::new(),
            created_at: now,
            last_active_at: now,
            state: SessionState::Connected,
        }
    }

    pub fn join(&mut self, conversation_id: Snowflake) {
        if !self.conversations.contains(&conversation_id) {
            self.conversations.push(conversation_id);
        }
    }

    pub fn leave(&mut self, conversation_id: Snowflake) {
        self.conversations.retain(|c| *c != conversation_id);
    }

    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    #[must_use]
    pub fn is_resumable(&self) -> bool {
        self.state == SessionState::Disconnected
    }
}

/// One dispatch kept for replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub sequence: u64,
    pub event_type: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    #[must_use]
    pub fn new(sequence: u64, event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            sequence,
            event_type: event_type.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GatewaySessionStore {
    pool: RedisPool,
    resume_ttl: u64,
}

impl GatewaySessionStore {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self {
            pool,
            resume_ttl: SESSION_RESUME_TTL,
        }
    }

    #[must_use]
    pub fn with_resume_ttl(pool: RedisPool, resume_ttl: u64) -> Self {
        Self {
            pool,
            resume_ttl: resume_ttl.max(1),
        }
    }

    fn session_key(session_id: &str) -> String {
        format!("{GATEWAY_SESSION_PREFIX}{session_id}")
    }

    fn events_key(session_id: &str) -> String {
        format!("{GATEWAY_EVENTS_PREFIX}{session_id}")
    }

    fn user_sessions_key(user_id: Snowflake) -> String {
        format!("{USER_SESSIONS_PREFIX}{user_id}")
    }

    pub async fn create(&self, session: &GatewaySessionData) -> RedisResult<()> {
        self.save(session).await?;

        let mut conn = self.pool.get().await?;
        conn.sadd::<_, _, ()>(Self::user_sessions_key(session.user_id), &session.session_id)
            .await?;

        tracing::debug!(
            session_id = %session.session_id,
            user_id = %session.user_id,
            "Created gateway session"
        );

        Ok(())
    }

    pub async fn get(&self, session_id: &str) -> RedisResult<Option<GatewaySessionData>> {
        self.pool.get_value(&Self::session_key(session_id)).await
    }

    /// Persist the session; disconnected sessions get the resume TTL
    pub async fn save(&self, session: &GatewaySessionData) -> RedisResult<()> {
        let ttl = match session.state {
            SessionState::Connected => CONNECTED_SESSION_TTL,
            SessionState::Disconnected => self.resume_ttl,
        };
        self.pool
            .set(&Self::session_key(&session.session_id), session, Some(ttl))
            .await
    }

    /// Start the resume window for the session and its replay queue
    pub async fn mark_disconnected(&self, session: &mut GatewaySessionData) -> RedisResult<()> {
        session.state = SessionState::Disconnected;
        session.touch();
        self.save(session).await?;
        self.pool
            .expire(&Self::events_key(&session.session_id), self.resume_ttl)
            .await?;

        tracing::debug!(
            session_id = %session.session_id,
            sequence = session.sequence,
            ttl = self.resume_ttl,
            "Marked gateway session as disconnected"
        );

        Ok(())
    }

    pub async fn delete(&self, session_id: &str) -> RedisResult<bool> {
        let existing = self.get(session_id).await?;
        if let Some(session) = &existing {
            let mut conn = self.pool.get().await?;
            conn.srem::<_, _, ()>(Self::user_sessions_key(session.user_id), session_id)
                .await?;
        }

        let session_key = Self::session_key(session_id);
        let events_key = Self::events_key(session_id);
        self.pool
            .delete_many(&[session_key.as_str(), events_key.as_str()])
            .await?;

        tracing::debug!(session_id = %session_id, "Deleted gateway session");

        Ok(existing.is_some())
    }

    /// Append a dispatch to the replay queue, keeping the newest
    /// [`MAX_RESUME_EVENTS`]
    pub async fn queue_event(&self, session_id: &str, event: &SessionEvent) -> RedisResult<()> {
        let key = Self::events_key(session_id);
        let serialized = serde_json::to_string(event)?;
        let mut conn = self.pool.get().await?;

        redis::pipe()
            .atomic()
            .lpush(&key, &serialized)
            .ignore()
            .ltrim(&key, 0, (MAX_RESUME_EVENTS - 1) as isize)
            .ignore()
            .expire(&key, CONNECTED_SESSION_TTL as i64)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    /// Queued events in sequence order
    pub async fn queued_events(&self, session_id: &str) -> RedisResult<Vec<SessionEvent>> {
        let mut conn = self.pool.get().await?;
        let raw: Vec<String> = conn.lrange(Self::events_key(session_id), 0, -1).await?;

        // Stored newest first
        let mut events: Vec<SessionEvent> = raw
            .iter()
            .rev()
            .filter_map(|e| serde_json::from_str(e).ok())
            .collect();
        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }

    /// Look up a session the given user may resume
    pub async fn validate_for_resume(
        &self,
        session_id: &str,
        user_id: Snowflake,
    ) -> RedisResult<Option<GatewaySessionData>> {
        Ok(self
            .get(session_id)
            .await?
            .filter(|s| s.user_id == user_id && s.is_resumable()))
    }

    /// Events to replay after `since`. `None` means the queue no longer
    /// reaches back that far and the client has to start over.
    pub async fn replay_since(
        &self,
        session: &GatewaySessionData,
        since: u64,
    ) -> RedisResult<Option<Vec<SessionEvent>>> {
        let events = self.queued_events(&session.session_id).await?;
        // The queue may run ahead of the last saved sequence
        let latest = events
            .last()
            .map_or(session.sequence, |e| e.sequence.max(session.sequence));
        Ok(select_replay(events, since, latest))
    }
}

/// Pick the events after `since`, refusing when some were already trimmed.
fn select_replay(events: Vec<SessionEvent>, since: u64, latest: u64) -> Option<Vec<SessionEvent>> {
    if since > latest {
        return None;
    }
    let missed: Vec<SessionEvent> = events.into_iter().filter(|e| e.sequence > since).collect();
    let expected = latest - since;
    if missed.len() as u64 != expected {
        return None;
    }
    Some(missed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(range: std::ops::RangeInclusive<u64>) -> Vec<SessionEvent> {
        range
            .map(|s| SessionEvent::new(s, "receive_message", serde_json::json!({ "n": s })))
            .collect()
    }

    #[test]
    fn test_session_conversation_tracking() {
        let mut session = GatewaySessionData::new("s1".to_string(), Snowflake::new(1));
        let room = Snowflake::new(10);

        session.join(room);
        session.join(room);
        assert_eq!(session.conversations, vec![room]);

        session.leave(room);
        assert!(session.conversations.is_empty());
        assert!(!session.is_resumable());
    }

    #[test]
    fn test_replay_returns_only_missed_events() {
        let replay = select_replay(events(1..=10), 7, 10).unwrap();
        let seqs: Vec<u64> = replay.iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![8, 9, 10]);
    }

    #[test]
    fn test_replay_when_up_to_date_is_empty() {
        assert_eq!(select_replay(events(1..=5), 5, 5), Some(Vec::new()));
    }

    #[test]
    fn test_replay_rejects_trimmed_history() {
        // Only 6..=10 survived trimming; the client last saw 2
        assert_eq!(select_replay(events(6..=10), 2, 10), None);
    }

    #[test]
    fn test_replay_rejects_sequence_from_the_future() {
        assert_eq!(select_replay(events(1..=3), 9, 3), None);
    }

    #[test]
    fn test_key_generation() {
        assert_eq!(GatewaySessionStore::session_key("abc"), "gateway_session:abc");
        assert_eq!(GatewaySessionStore::events_key("abc"), "gateway_events:abc");
        assert_eq!(
            GatewaySessionStore::user_sessions_key(Snowflake::new(5)),
            "user_gateway_sessions:5"
        );
    }

    #[test]
    fn test_session_state_serde() {
        let json = serde_json::to_string(&SessionState::Disconnected).unwrap();
        assert_eq!(json, "\"disconnected\"");
    }
}
