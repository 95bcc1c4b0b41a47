//! Session storage module.
//!
//! - Refresh tokens (one entry per issued token id)
//! - Gateway sessions (resumable connection state and replay queue)

mod gateway_session;
mod refresh_token;

pub use gateway_session::{
    GatewaySessionData, GatewaySessionStore, SessionEvent, SessionState, MAX_RESUME_EVENTS,
    SESSION_RESUME_TTL,
};
pub use refresh_token::{RefreshTokenData, RefreshTokenStore};
