//! Heartbeat handler (op 1)

use super::HandlerResult;
use crate::connection::Connection;
use crate::protocol::{CloseCode, GatewayMessage};
use crate::server::GatewayState;
use huddle_service::PresenceService;
use std::sync::Arc;

pub struct HeartbeatHandler;

impl HeartbeatHandler {
    /// `last_sequence` is the last sequence the client has seen, if any
    pub async fn handle(
        state: &GatewayState,
        connection: &Arc<Connection>,
        last_sequence: Option<u64>,
    ) -> HandlerResult<Option<CloseCode>> {
        connection.record_heartbeat().await;

        tracing::trace!(
            session_id = %connection.session_id(),
            client_seq = ?last_sequence,
            server_seq = connection.current_sequence(),
            "Heartbeat received"
        );

        connection.send(GatewayMessage::heartbeat_ack()).await?;

        if let Some(user_id) = connection.user_id().await {
            if let Err(e) = PresenceService::new(state.service_context()).heartbeat(user_id).await {
                tracing::debug!(user_id = %user_id, error = %e, "Presence refresh failed");
            }
        }

        Ok(None)
    }
}
