//! Op code handlers
//!
//! Handles incoming WebSocket messages based on their operation code.

mod error;
mod events;
mod heartbeat;
mod identify;
mod resume;
mod typing;

pub use error::{HandlerError, HandlerResult};
pub use events::EventHandler;
pub use heartbeat::HeartbeatHandler;
pub use identify::IdentifyHandler;
pub use resume::ResumeHandler;
pub use typing::TypingTracker;

use crate::connection::Connection;
use crate::protocol::{bare_token, CloseCode, GatewayMessage, OpCode};
use crate::server::GatewayState;
use huddle_core::Snowflake;
use std::sync::Arc;

/// Dispatch incoming client messages to appropriate handlers
pub struct MessageDispatcher;

impl MessageDispatcher {
    /// Handle one client frame; `Some` closes the socket with that code
    pub async fn dispatch(
        state: &GatewayState,
        connection: &Arc<Connection>,
        message: GatewayMessage,
    ) -> HandlerResult<Option<CloseCode>> {
        if !message.op.is_client_op() {
            tracing::warn!(
                session_id = %connection.session_id(),
                op = %message.op,
                "Received server-only op code from client"
            );
            return Ok(Some(CloseCode::UnknownOpcode));
        }

        match message.op {
            OpCode::Identify => {
                let payload = message.as_identify().ok_or_else(|| {
                    HandlerError::InvalidPayload("Invalid Identify payload".to_string())
                })?;

                IdentifyHandler::handle(state, connection, payload).await
            }
            OpCode::Resume => {
                let payload = message.as_resume().ok_or_else(|| {
                    HandlerError::InvalidPayload("Invalid Resume payload".to_string())
                })?;

                ResumeHandler::handle(state, connection, payload).await
            }
            OpCode::Heartbeat => {
                let seq = message.as_heartbeat_seq().ok_or_else(|| {
                    HandlerError::InvalidPayload("Invalid Heartbeat payload".to_string())
                })?;

                HeartbeatHandler::handle(state, connection, seq).await
            }
            OpCode::Event => {
                if !connection.is_authenticated().await {
                    return Err(HandlerError::NotAuthenticated);
                }
                let (name, data) = message.as_event().ok_or_else(|| {
                    HandlerError::InvalidPayload("Event frame without a name".to_string())
                })?;

                EventHandler::handle(state, connection, name, data).await
            }
            _ => {
                tracing::error!(op = %message.op, "Unhandled client op code");
                Ok(Some(CloseCode::UnknownOpcode))
            }
        }
    }
}

/// Resolve the user behind a handshake token
fn authenticate(state: &GatewayState, token: &str) -> HandlerResult<Snowflake> {
    let claims = state
        .service_context()
        .jwt_service()
        .validate_access_token(bare_token(token))
        .map_err(|e| {
            tracing::debug!(error = %e, "Token validation failed");
            HandlerError::AuthenticationFailed(e.to_string())
        })?;

    claims
        .user_id()
        .map_err(|e| HandlerError::AuthenticationFailed(e.to_string()))
}
