//! Client error types

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid client configuration: {0}")]
    Config(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx REST answer, carrying the server's error code
    #[error("{code} ({status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Gateway protocol error: {0}")]
    Protocol(String),

    /// Socket closed with a code that forbids reconnecting
    #[error("Gateway closed the connection ({code}): {reason}")]
    Closed { code: u16, reason: String },

    #[error("Not connected to the gateway")]
    NotConnected,

    #[error("Connection was shut down")]
    ConnectionClosed,

    #[error("Gave up reconnecting after {attempts} attempts")]
    ReconnectFailed { attempts: u32 },

    /// The gateway answered a send with `message_error`
    #[error("{code}: {reason}")]
    Rejected { code: String, reason: String },

    #[error("Send abandoned after {attempts} attempts")]
    MaxAttemptsExceeded { attempts: u32 },
}

impl ClientError {
    /// Error code to show or match on
    pub fn code(&self) -> &str {
        match self {
            Self::Api { code, .. } | Self::Rejected { code, .. } => code,
            Self::Config(_) => "CONFIG",
            Self::Http(_) => "HTTP",
            Self::WebSocket(_) => "WEBSOCKET",
            Self::Decode(_) => "DECODE",
            Self::Protocol(_) => "PROTOCOL",
            Self::Closed { .. } => "CLOSED",
            Self::NotConnected => "NOT_CONNECTED",
            Self::ConnectionClosed => "CONNECTION_CLOSED",
            Self::ReconnectFailed { .. } => "RECONNECT_FAILED",
            Self::MaxAttemptsExceeded { .. } => "MAX_ATTEMPTS_EXCEEDED",
        }
    }

    /// Whether another connection attempt could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocket(_) | Self::Protocol(_) | Self::Decode(_) | Self::Http(_)
        )
    }

    /// Build from an `{"error": {"code", "message"}}` body; anything else
    /// keeps the raw text
    pub(crate) fn from_error_body(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct Body {
            error: Detail,
        }
        #[derive(Deserialize)]
        struct Detail {
            code: String,
            message: String,
        }

        match serde_json::from_str::<Body>(body) {
            Ok(Body { error }) => Self::Api {
                status,
                code: error.code,
                message: error.message,
            },
            Err(_) => Self::Api {
                status,
                code: "UNKNOWN".to_string(),
                message: body.to_string(),
            },
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_is_parsed() {
        let err = ClientError::from_error_body(
            403,
            r#"{"error":{"code":"NOT_GROUP_ADMIN","message":"Only the group admin may do that"}}"#,
        );
        assert_eq!(err.code(), "NOT_GROUP_ADMIN");
        assert!(matches!(err, ClientError::Api { status: 403, .. }));
    }

    #[test]
    fn test_unstructured_body_is_kept() {
        let err = ClientError::from_error_body(502, "Bad Gateway");
        match err {
            ClientError::Api { code, message, .. } => {
                assert_eq!(code, "UNKNOWN");
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(ClientError::Protocol("no hello".into()).is_transient());
        assert!(!ClientError::Closed {
            code: 4004,
            reason: "Authentication failed".into()
        }
        .is_transient());
        assert!(!ClientError::ReconnectFailed { attempts: 3 }.is_transient());
    }
}
