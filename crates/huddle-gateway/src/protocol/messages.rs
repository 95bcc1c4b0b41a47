//! Gateway message envelope

use super::{CloseCode, HelloPayload, IdentifyPayload, OpCode, ResumePayload};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every frame in both directions is one of these
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub op: OpCode,

    /// Event name, for Dispatch and client Event frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    /// Sequence number, Dispatch only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
}

impl GatewayMessage {
    fn bare(op: OpCode, d: Option<Value>) -> Self {
        Self {
            op,
            t: None,
            s: None,
            d,
        }
    }

    // === Server Messages ===

    #[must_use]
    pub fn dispatch(event_type: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            t: Some(event_type.into()),
            s: Some(sequence),
            d: Some(data),
        }
    }

    #[must_use]
    pub fn hello(payload: &HelloPayload) -> Self {
        Self::bare(OpCode::Hello, serde_json::to_value(payload).ok())
    }

    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::bare(OpCode::HeartbeatAck, None)
    }

    #[must_use]
    pub fn reconnect() -> Self {
        Self::bare(OpCode::Reconnect, None)
    }

    /// `resumable` tells the client whether a Resume may still work
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::bare(OpCode::InvalidSession, Some(Value::Bool(resumable)))
    }

    // === Client Messages ===

    #[must_use]
    pub fn identify(token: impl Into<String>) -> Self {
        let payload = IdentifyPayload {
            token: token.into(),
        };
        Self::bare(OpCode::Identify, serde_json::to_value(payload).ok())
    }

    #[must_use]
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Self {
            op: OpCode::Event,
            t: Some(name.into()),
            s: None,
            d: Some(data),
        }
    }

    // === Parsing ===

    fn payload<T: DeserializeOwned>(&self, op: OpCode) -> Option<T> {
        if self.op != op {
            return None;
        }
        self.d
            .as_ref()
            .and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    #[must_use]
    pub fn as_identify(&self) -> Option<IdentifyPayload> {
        self.payload(OpCode::Identify)
    }

    #[must_use]
    pub fn as_resume(&self) -> Option<ResumePayload> {
        self.payload(OpCode::Resume)
    }

    /// Client's last seen sequence; `None` when this is not a heartbeat
    #[must_use]
    pub fn as_heartbeat_seq(&self) -> Option<Option<u64>> {
        if self.op != OpCode::Heartbeat {
            return None;
        }
        Some(self.d.as_ref().and_then(Value::as_u64))
    }

    /// Event name and data of an op 3 frame
    #[must_use]
    pub fn as_event(&self) -> Option<(&str, Value)> {
        if self.op != OpCode::Event {
            return None;
        }
        let name = self.t.as_deref()?;
        Some((name, self.d.clone().unwrap_or(Value::Null)))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn close_frame(code: CloseCode) -> (u16, &'static str) {
        (code.as_u16(), code.description())
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.t, self.s) {
            (Some(t), Some(s)) => write!(f, "GatewayMessage(op={}, t={t}, s={s})", self.op),
            (Some(t), None) => write!(f, "GatewayMessage(op={}, t={t})", self.op),
            _ => write!(f, "GatewayMessage(op={})", self.op),
        }
    }
}
