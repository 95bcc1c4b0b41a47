//! Event publishing seam
//!
//! Services hand their real-time events to an [`EventPublisher`]. In
//! production that is the Redis [`Publisher`]; tests swap in a recorder.

use async_trait::async_trait;
use huddle_cache::{PubSubChannel, PubSubEvent, Publisher, RedisResult};
use huddle_core::Snowflake;
use serde::Serialize;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event to every channel; returns the receiver count
    async fn publish_many(&self, channels: &[PubSubChannel], event: &PubSubEvent)
        -> RedisResult<u32>;
}

#[async_trait]
impl EventPublisher for Publisher {
    async fn publish_many(
        &self,
        channels: &[PubSubChannel],
        event: &PubSubEvent,
    ) -> RedisResult<u32> {
        Publisher::publish_many(self, channels, event).await
    }
}

/// Where an event goes
#[derive(Debug, Clone, Default)]
pub(crate) struct Audience {
    channels: Vec<PubSubChannel>,
}

impl Audience {
    pub(crate) fn room(conversation_id: Snowflake) -> Self {
        Self::default().and_room(conversation_id)
    }

    pub(crate) fn users(user_ids: impl IntoIterator<Item = Snowflake>) -> Self {
        Self::default().and_users(user_ids)
    }

    pub(crate) fn broadcast() -> Self {
        Self {
            channels: vec![PubSubChannel::broadcast()],
        }
    }

    pub(crate) fn and_room(mut self, conversation_id: Snowflake) -> Self {
        self.push(PubSubChannel::conversation(conversation_id));
        self
    }

    pub(crate) fn and_users(mut self, user_ids: impl IntoIterator<Item = Snowflake>) -> Self {
        for user_id in user_ids {
            self.push(PubSubChannel::user(user_id));
        }
        self
    }

    fn push(&mut self, channel: PubSubChannel) {
        if !self.channels.contains(&channel) {
            self.channels.push(channel);
        }
    }

    pub(crate) fn channels(&self) -> &[PubSubChannel] {
        &self.channels
    }

    /// The room channel, when the event also goes to user channels
    pub(crate) fn shared_room(&self) -> Option<Snowflake> {
        if self.channels.len() < 2 {
            return None;
        }
        self.channels.iter().find_map(|c| match c {
            PubSubChannel::Conversation(id) => Some(*id),
            _ => None,
        })
    }
}

/// Serialize a payload into a pub/sub event; `None` (and a log line)
/// when the payload cannot be serialized
pub(crate) fn event<T: Serialize>(event_type: &str, payload: &T) -> Option<PubSubEvent> {
    match serde_json::to_value(payload) {
        Ok(data) => Some(PubSubEvent::new(event_type, data)),
        Err(e) => {
            tracing::error!(error = %e, event_type, "Event payload not serializable, not published");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every published event for assertions
    #[derive(Default)]
    pub struct RecordingPublisher {
        events: Mutex<Vec<(Vec<PubSubChannel>, PubSubEvent)>>,
    }

    impl RecordingPublisher {
        pub fn events(&self) -> Vec<(Vec<PubSubChannel>, PubSubEvent)> {
            self.events.lock().unwrap().clone()
        }

        pub fn of_type(&self, event_type: &str) -> Vec<(Vec<PubSubChannel>, PubSubEvent)> {
            self.events()
                .into_iter()
                .filter(|(_, e)| e.event_type == event_type)
                .collect()
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish_many(
            &self,
            channels: &[PubSubChannel],
            event: &PubSubEvent,
        ) -> RedisResult<u32> {
            self.events
                .lock()
                .unwrap()
                .push((channels.to_vec(), event.clone()));
            Ok(channels.len() as u32)
        }
    }
}
