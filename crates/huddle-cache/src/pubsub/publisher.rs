//! Redis Pub/Sub publisher

use crate::pool::{RedisPool, RedisResult};
use crate::pubsub::PubSubChannel;
use huddle_core::Snowflake;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

/// Envelope carried over Pub/Sub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubSubEvent {
    /// Dispatch name, see [`crate::event_names`]
    pub event_type: String,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target: Option<EventTarget>,
}

/// Delivery filter applied by the gateway before fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTarget {
    /// Gateway session that caused the event; it gets an ack instead
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exclude_session: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub exclude_users: Vec<Snowflake>,
    /// Also published to this conversation's room; sessions that joined it
    /// take the room copy and skip the user-channel copy
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub room: Option<Snowflake>,
}

impl PubSubEvent {
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            target: None,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: EventTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// Skip delivery to one gateway session; `None` leaves the event untouched
    #[must_use]
    pub fn excluding_session(mut self, session_id: Option<&str>) -> Self {
        if let Some(session_id) = session_id {
            let mut target = self.target.take().unwrap_or_default();
            target.exclude_session = Some(session_id.to_string());
            self.target = Some(target);
        }
        self
    }

    /// Skip every session of one user
    #[must_use]
    pub fn excluding_user(mut self, user_id: Snowflake) -> Self {
        self.target = Some(self.target.take().unwrap_or_default().exclude_user(user_id));
        self
    }

    /// Mark the event as also going out on `conversation_id`'s room channel
    #[must_use]
    pub fn via_room(mut self, conversation_id: Snowflake) -> Self {
        let mut target = self.target.take().unwrap_or_default();
        target.room = Some(conversation_id);
        self.target = Some(target);
        self
    }

    /// Room that carries a copy of this event, if any
    #[must_use]
    pub fn room(&self) -> Option<Snowflake> {
        self.target.as_ref().and_then(|t| t.room)
    }

    /// Whether a session of `user_id` identified by `session_id` should receive this
    #[must_use]
    pub fn is_deliverable_to(&self, session_id: &str, user_id: Snowflake) -> bool {
        match &self.target {
            None => true,
            Some(target) => {
                target.exclude_session.as_deref() != Some(session_id)
                    && !target.exclude_users.contains(&user_id)
            }
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl EventTarget {
    #[must_use]
    pub fn exclude_user(mut self, user_id: Snowflake) -> Self {
        self.exclude_users.push(user_id);
        self
    }
}

#[derive(Clone, Debug)]
pub struct Publisher {
    pool: RedisPool,
}

impl Publisher {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Returns the number of subscribers that received the event
    pub async fn publish(&self, channel: &PubSubChannel, event: &PubSubEvent) -> RedisResult<u32> {
        let mut conn = self.pool.get().await?;
        let channel_name = channel.name();
        let payload = event.to_json()?;

        let receivers: u32 = conn.publish(&channel_name, &payload).await?;

        tracing::debug!(
            channel = %channel_name,
            event_type = %event.event_type,
            receivers = receivers,
            "Published event"
        );

        Ok(receivers)
    }

    pub async fn publish_many(
        &self,
        channels: &[PubSubChannel],
        event: &PubSubEvent,
    ) -> RedisResult<u32> {
        if channels.is_empty() {
            return Ok(0);
        }
        let payload = event.to_json()?;
        let mut conn = self.pool.get().await?;

        let mut pipe = redis::pipe();
        for channel in channels {
            pipe.publish(channel.name(), &payload);
        }
        let counts: Vec<u32> = pipe.query_async(&mut conn).await?;
        let total_receivers = counts.iter().sum();

        tracing::debug!(
            channels = channels.len(),
            event_type = %event.event_type,
            total_receivers = total_receivers,
            "Published event to multiple channels"
        );

        Ok(total_receivers)
    }
}
