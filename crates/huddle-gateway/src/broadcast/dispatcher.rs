//! Event dispatcher
//!
//! Receives events from Redis Pub/Sub and dispatches them to WebSocket
//! connections on this instance.
//!
//! | Channel            | Delivered to                                   |
//! |--------------------|------------------------------------------------|
//! | `conversation:{id}`| sessions that joined the room                  |
//! | `user:{id}`        | the user's sessions, minus those in the event's room |
//! | `broadcast`        | every authenticated session                    |

use crate::connection::{Connection, ConnectionManager};
use huddle_cache::{
    event_names, PubSubChannel, PubSubEvent, ReceivedMessage, Subscriber, SubscriberBuilder,
    SubscriberError,
};
use huddle_core::Snowflake;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct EventDispatcherConfig {
    pub redis_url: String,
    pub broadcast_buffer: usize,
    pub reconnect_delay_ms: u64,
}

impl Default for EventDispatcherConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
        }
    }
}

/// Event dispatcher that routes Redis Pub/Sub messages to WebSocket connections
pub struct EventDispatcher {
    connection_manager: Arc<ConnectionManager>,
    subscriber: Subscriber,
    running: AtomicBool,
}

impl EventDispatcher {
    /// Subscribes to every conversation and user channel plus broadcast;
    /// filtering happens locally against the rooms and users connected here.
    pub async fn new(
        config: EventDispatcherConfig,
        connection_manager: Arc<ConnectionManager>,
    ) -> Result<Self, SubscriberError> {
        let any = Snowflake::new(0);
        let subscriber = SubscriberBuilder::new()
            .redis_url(&config.redis_url)
            .broadcast_buffer(config.broadcast_buffer)
            .reconnect_delay_ms(config.reconnect_delay_ms)
            .subscribe(PubSubChannel::broadcast())
            .subscribe_all_of(PubSubChannel::conversation(any))
            .subscribe_all_of(PubSubChannel::user(any))
            .build()
            .await?;

        Ok(Self {
            connection_manager,
            subscriber,
            running: AtomicBool::new(false),
        })
    }

    /// Spawn the dispatch loop
    pub fn start(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Event dispatcher is already running");
            return;
        }

        tokio::spawn(async move {
            self.run().await;
        });

        tracing::info!("Event dispatcher started");
    }

    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Err(e) = self.subscriber.shutdown().await {
            tracing::debug!(error = %e, "Subscriber already stopped");
        }
        tracing::info!("Event dispatcher stopped");
    }

    async fn run(&self) {
        let mut receiver = self.subscriber.receiver();

        while self.running.load(Ordering::SeqCst) {
            match receiver.recv().await {
                Ok(msg) => {
                    route(&self.connection_manager, &msg).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "Event dispatcher lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::warn!("Event dispatcher channel closed");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Event dispatcher loop ended");
    }
}

/// Deliver one Pub/Sub message to the local connections it targets and
/// apply its room side effects. Returns the number of sessions reached.
pub async fn route(manager: &ConnectionManager, msg: &ReceivedMessage) -> usize {
    let (Some(channel), Some(event)) = (msg.channel, msg.event.as_ref()) else {
        tracing::debug!(payload = %msg.payload, "Ignoring unrecognised pub/sub message");
        return 0;
    };

    let candidates = match channel {
        PubSubChannel::Conversation(conversation_id) => manager.room_connections(conversation_id),
        PubSubChannel::User(user_id) => {
            let mut sessions = manager.user_connections(user_id);
            // Room members already got the room copy
            if let Some(room) = event.room() {
                let mut outside = Vec::with_capacity(sessions.len());
                for connection in sessions {
                    if !connection.in_room(room).await {
                        outside.push(connection);
                    }
                }
                sessions = outside;
            }
            sessions
        }
        PubSubChannel::Broadcast => manager.authenticated_connections().await,
    };

    let mut delivered = 0;
    for connection in candidates {
        if deliver(&connection, event).await {
            delivered += 1;
        }
    }

    tracing::trace!(
        channel = %channel.name(),
        event_type = %event.event_type,
        delivered,
        "Event dispatched"
    );

    apply_room_effects(manager, channel, event).await;
    delivered
}

async fn deliver(connection: &Connection, event: &PubSubEvent) -> bool {
    let Some(user_id) = connection.user_id().await else {
        return false;
    };
    if !event.is_deliverable_to(connection.session_id(), user_id) {
        return false;
    }
    connection
        .dispatch(&event.event_type, event.data.clone())
        .await
        .is_ok()
}

/// Evict sessions that lost access to a room.
///
/// When an event also went to user channels, the room copy arrives first;
/// eviction then waits for each user's own copy so nobody receives both.
async fn apply_room_effects(manager: &ConnectionManager, channel: PubSubChannel, event: &PubSubEvent) {
    let Some(conversation_id) = snowflake_field(&event.data, "conversation_id") else {
        return;
    };

    match event.event_type.as_str() {
        event_names::MEMBER_REMOVED => {
            let Some(removed) = snowflake_field(&event.data, "user_id") else {
                return;
            };
            let due = match channel {
                PubSubChannel::User(user_id) => user_id == removed,
                PubSubChannel::Conversation(_) => event.room().is_none(),
                PubSubChannel::Broadcast => false,
            };
            if due {
                let evicted = manager.evict_user(conversation_id, removed).await;
                tracing::debug!(conversation_id = %conversation_id, user_id = %removed, evicted, "Evicted removed member");
            }
        }
        event_names::CONVERSATION_DELETED => match channel {
            PubSubChannel::User(user_id) => {
                manager.evict_user(conversation_id, user_id).await;
            }
            PubSubChannel::Conversation(_) if event.room().is_none() => {
                let evicted = manager.evict_room(conversation_id).await;
                tracing::debug!(conversation_id = %conversation_id, evicted, "Closed deleted room");
            }
            _ => {}
        },
        _ => {}
    }
}

fn snowflake_field(data: &Value, key: &str) -> Option<Snowflake> {
    data.get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}
