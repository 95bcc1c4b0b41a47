//! WebSocket close codes

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    UnknownError = 4000,
    /// Server-only or unknown op code
    UnknownOpcode = 4001,
    /// Frame was not a valid envelope
    DecodeError = 4002,
    /// Anything but Heartbeat/Identify/Resume before authenticating
    NotAuthenticated = 4003,
    AuthenticationFailed = 4004,
    /// Identify or Resume on an authenticated connection
    AlreadyAuthenticated = 4005,
    /// Handshake payload could not be parsed
    InvalidPayload = 4006,
    InvalidSequence = 4007,
    RateLimited = 4008,
    /// No heartbeat within the allowed window
    SessionTimeout = 4009,
    /// Resume target does not exist or has expired
    SessionNotFound = 4010,
    /// Identify did not arrive in time
    IdentifyTimeout = 4011,
    /// Server is shutting down
    ServerShutdown = 4012,
}

impl CloseCode {
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            4000 => Some(Self::UnknownError),
            4001 => Some(Self::UnknownOpcode),
            4002 => Some(Self::DecodeError),
            4003 => Some(Self::NotAuthenticated),
            4004 => Some(Self::AuthenticationFailed),
            4005 => Some(Self::AlreadyAuthenticated),
            4006 => Some(Self::InvalidPayload),
            4007 => Some(Self::InvalidSequence),
            4008 => Some(Self::RateLimited),
            4009 => Some(Self::SessionTimeout),
            4010 => Some(Self::SessionNotFound),
            4011 => Some(Self::IdentifyTimeout),
            4012 => Some(Self::ServerShutdown),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Whether the client may reconnect after this close code
    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        !matches!(
            self,
            Self::NotAuthenticated | Self::AuthenticationFailed | Self::InvalidPayload
        )
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error occurred",
            Self::UnknownOpcode => "Invalid opcode sent",
            Self::DecodeError => "Invalid payload encoding",
            Self::NotAuthenticated => "Not authenticated",
            Self::AuthenticationFailed => "Authentication failed",
            Self::AlreadyAuthenticated => "Already authenticated",
            Self::InvalidPayload => "Invalid handshake payload",
            Self::InvalidSequence => "Invalid sequence number",
            Self::RateLimited => "Rate limited",
            Self::SessionTimeout => "Session timeout",
            Self::SessionNotFound => "Session not found",
            Self::IdentifyTimeout => "Identify timeout",
            Self::ServerShutdown => "Server shutting down",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
