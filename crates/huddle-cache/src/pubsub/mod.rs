//! Redis Pub/Sub: how API instances reach gateway instances.
//!
//! Services publish; every gateway subscribes to all conversation and user
//! channels and fans out to its local sessions.

mod channels;
pub mod event_names;
mod publisher;
mod subscriber;

pub use channels::{
    PubSubChannel, BROADCAST_CHANNEL, CONVERSATION_CHANNEL_PREFIX, USER_CHANNEL_PREFIX,
};
pub use publisher::{EventTarget, PubSubEvent, Publisher};
pub use subscriber::{
    ReceivedMessage, Subscriber, SubscriberBuilder, SubscriberConfig, SubscriberError,
    SubscriberResult,
};
