//! Presence and typing indicators

mod presence_store;

pub use presence_store::{PresenceData, PresenceStore, PresenceTransition, TypingData};
