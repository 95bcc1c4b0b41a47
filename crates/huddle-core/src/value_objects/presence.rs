//! Presence status shared by the server-side presence store and clients

use serde::{Deserialize, Serialize};

/// A user's availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Away,
    #[default]
    Offline,
}

impl PresenceStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Offline => "offline",
        }
    }

    /// Online and away users both hold at least one live session
    #[inline]
    pub const fn is_connected(self) -> bool {
        !matches!(self, Self::Offline)
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PresenceStatus {
    type Err = InvalidPresenceStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(Self::Online),
            // "idle" is what older clients send for away
            "away" | "idle" => Ok(Self::Away),
            "offline" | "invisible" => Ok(Self::Offline),
            _ => Err(InvalidPresenceStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid presence status: {0}")]
pub struct InvalidPresenceStatus(pub String);
