//! Gateway events
//!
//! Named client events carried by op 3 and the payloads of the dispatches
//! the gateway produces itself. Everything else is published by the
//! services and relayed unchanged.

pub(crate) mod client;
mod payloads;

pub use client::{
    ClientEvent, ClientEventError, ConversationRef, EditMessage, MembershipEvent, MessageRef,
    PinMessage, ReactionEvent, SendMessage, StatusUpdate, TypingEvent,
};
pub use payloads::{MessageErrorPayload, ReadyPayload, ResumedPayload};
