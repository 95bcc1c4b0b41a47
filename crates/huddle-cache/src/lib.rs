//! # huddle-cache
//!
//! Redis layer shared by the API and the gateway.
//!
//! ## Features
//!
//! - **Connection Pool**: deadpool-managed Redis connections
//! - **Presence**: the single source of truth for who is online, plus typing keys
//! - **Gateway Sessions**: resumable session state and the per-session replay queue
//! - **Refresh Tokens**: rotation-aware refresh token storage
//! - **Pub/Sub**: conversation, user and broadcast channels between instances
//!
//! ## Example
//!
//! ```ignore
//! use huddle_cache::{PresenceStore, PubSubChannel, PubSubEvent, Publisher, RedisPool};
//!
//! let pool = RedisPool::from_config(&config.redis)?;
//! let presence = PresenceStore::new(pool.clone());
//! let publisher = Publisher::new(pool.clone());
//!
//! let transition = presence.connect(user_id, &session_id).await?;
//! let event = PubSubEvent::new("receive_message", data).via_room(conversation_id);
//! publisher.publish(&PubSubChannel::conversation(conversation_id), &event).await?;
//! ```

pub mod pool;
pub mod presence;
pub mod pubsub;
pub mod session;

// Re-export pool types
pub use pool::{
    create_shared_pool, RedisPool, RedisPoolConfig, RedisPoolError, RedisResult, SharedRedisPool,
};

// Re-export session types
pub use session::{
    GatewaySessionData, GatewaySessionStore, RefreshTokenData, RefreshTokenStore, SessionEvent,
    SessionState, MAX_RESUME_EVENTS, SESSION_RESUME_TTL,
};

// Re-export presence types
pub use presence::{PresenceData, PresenceStore, PresenceTransition, TypingData};

// Re-export pubsub types
pub use pubsub::{
    event_names, EventTarget, PubSubChannel, PubSubEvent, Publisher, ReceivedMessage, Subscriber,
    SubscriberBuilder, SubscriberConfig, SubscriberError, SubscriberResult, BROADCAST_CHANNEL,
    CONVERSATION_CHANNEL_PREFIX, USER_CHANNEL_PREFIX,
};
