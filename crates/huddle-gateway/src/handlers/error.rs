//! Handler error types

use crate::protocol::CloseCode;
use huddle_cache::RedisPoolError;
use huddle_core::DomainError;
use huddle_service::ServiceError;
use thiserror::Error;

/// Failures that end the connection. Per-event failures are answered
/// with `message_error` instead and never reach this type.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Already authenticated")]
    AlreadyAuthenticated,

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Cache error: {0}")]
    Cache(#[from] RedisPoolError),

    /// The writer side of the socket is gone
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    #[must_use]
    pub fn close_code(&self) -> CloseCode {
        match self {
            Self::InvalidPayload(_) => CloseCode::InvalidPayload,
            Self::AuthenticationFailed(_) => CloseCode::AuthenticationFailed,
            Self::NotAuthenticated => CloseCode::NotAuthenticated,
            Self::AlreadyAuthenticated => CloseCode::AlreadyAuthenticated,
            Self::Service(_)
            | Self::Domain(_)
            | Self::Cache(_)
            | Self::ConnectionClosed
            | Self::Internal(_) => CloseCode::UnknownError,
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for HandlerError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::ConnectionClosed
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;
