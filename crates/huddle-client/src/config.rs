//! Client configuration

use std::time::Duration;

use crate::backoff::ReconnectPolicy;
use crate::error::{ClientError, ClientResult};

/// How often the conversation list is re-fetched
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Quiet period after the last keystroke before `typing:false` goes out
pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_secs(3);

/// Sends per outbox entry before it is marked failed
pub const DEFAULT_OUTBOX_MAX_ATTEMPTS: u32 = 5;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed for Hello and the Identify/Resume answer
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://host:8081/gateway`
    pub gateway_url: String,
    /// REST origin without the `/api/v1` prefix
    pub api_url: String,
    pub token: String,
    pub reconnect: ReconnectPolicy,
    pub poll_interval: Duration,
    pub typing_timeout: Duration,
    pub outbox_max_attempts: u32,
    pub request_timeout: Duration,
    pub handshake_timeout: Duration,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    gateway_url: Option<String>,
    api_url: Option<String>,
    token: Option<String>,
    reconnect: Option<ReconnectPolicy>,
    poll_interval: Option<Duration>,
    typing_timeout: Option<Duration>,
    outbox_max_attempts: Option<u32>,
    request_timeout: Option<Duration>,
    handshake_timeout: Option<Duration>,
}

impl ClientConfigBuilder {
    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = Some(url.into());
        self
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = Some(policy);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn typing_timeout(mut self, timeout: Duration) -> Self {
        self.typing_timeout = Some(timeout);
        self
    }

    pub fn outbox_max_attempts(mut self, attempts: u32) -> Self {
        self.outbox_max_attempts = Some(attempts);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// The token is required. The URLs default to a local development
    /// stack when left unset.
    pub fn build(self) -> ClientResult<ClientConfig> {
        let token = self
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ClientError::Config("an access token is required"))?;

        let outbox_max_attempts = self.outbox_max_attempts.unwrap_or(DEFAULT_OUTBOX_MAX_ATTEMPTS);
        if outbox_max_attempts == 0 {
            return Err(ClientError::Config("outbox_max_attempts must be at least 1"));
        }

        Ok(ClientConfig {
            gateway_url: self
                .gateway_url
                .unwrap_or_else(|| "ws://127.0.0.1:8081/gateway".to_string()),
            api_url: self
                .api_url
                .unwrap_or_else(|| "http://127.0.0.1:8080".to_string())
                .trim_end_matches('/')
                .to_string(),
            token,
            reconnect: self.reconnect.unwrap_or_default(),
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            typing_timeout: self.typing_timeout.unwrap_or(DEFAULT_TYPING_TIMEOUT),
            outbox_max_attempts,
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            handshake_timeout: self.handshake_timeout.unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT),
        })
    }
}
