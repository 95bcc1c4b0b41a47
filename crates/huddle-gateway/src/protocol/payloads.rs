//! Handshake payloads

use serde::{Deserialize, Serialize};

/// op 10
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Milliseconds between client heartbeats
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 45_000;

    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

impl Default for HelloPayload {
    fn default() -> Self {
        Self::with_interval(Self::DEFAULT_HEARTBEAT_INTERVAL)
    }
}

/// op 2
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Access token, with or without a `Bearer ` prefix
    pub token: String,
}

/// op 6
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    /// Last sequence number the client saw
    pub seq: u64,
}

/// Strip an optional `Bearer ` prefix
#[must_use]
pub(crate) fn bare_token(token: &str) -> &str {
    token.strip_prefix("Bearer ").unwrap_or(token).trim()
}
