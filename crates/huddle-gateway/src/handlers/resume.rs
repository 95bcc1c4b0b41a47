//! Resume handler (op 6)

use super::{authenticate, HandlerError, HandlerResult};
use crate::connection::Connection;
use crate::events::ResumedPayload;
use crate::protocol::{CloseCode, GatewayMessage, ResumePayload};
use crate::server::GatewayState;
use huddle_cache::{event_names, GatewaySessionData};
use huddle_service::{ConversationService, PresenceService};
use std::sync::Arc;

pub struct ResumeHandler;

impl ResumeHandler {
    /// Pick up a disconnected session: replay what the client missed,
    /// rejoin its rooms and carry on under this connection's session id.
    /// Anything that cannot be resumed answers InvalidSession(false).
    pub async fn handle(
        state: &GatewayState,
        connection: &Arc<Connection>,
        payload: ResumePayload,
    ) -> HandlerResult<Option<CloseCode>> {
        if connection.is_authenticated().await {
            tracing::warn!(
                session_id = %connection.session_id(),
                "Client sent Resume while already authenticated"
            );
            return Err(HandlerError::AlreadyAuthenticated);
        }

        let Ok(user_id) = authenticate(state, &payload.token) else {
            return Self::reject(connection, "invalid token").await;
        };

        let store = state.session_store();
        let Some(old) = store.validate_for_resume(&payload.session_id, user_id).await? else {
            return Self::reject(connection, "session missing or not resumable").await;
        };
        let Some(missed) = store.replay_since(&old, payload.seq).await? else {
            return Self::reject(connection, "sequence out of range").await;
        };

        // Still unauthenticated, so nothing live can interleave with the replay
        let replayed = connection.replay(payload.seq, missed).await?;

        let session_id = connection.session_id().to_string();
        let mut session = GatewaySessionData::new(session_id.clone(), user_id);
        session.sequence = connection.current_sequence();
        store.create(&session).await?;
        store.delete(&old.session_id).await?;

        let manager = state.connection_manager();
        manager.authenticate_connection(&session_id, user_id).await;

        let ctx = state.service_context();
        let conversations = ConversationService::new(ctx);
        for conversation_id in old.conversations {
            match conversations.ensure_participant(conversation_id, user_id).await {
                Ok(()) => {
                    manager.join_room(connection, conversation_id).await;
                }
                Err(e) => tracing::debug!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "Not rejoining room"
                ),
            }
        }

        if let Err(e) = PresenceService::new(ctx).connect(user_id, &session_id).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to mark user online");
        }

        let resumed = ResumedPayload {
            session_id: session_id.clone(),
            replayed,
        };
        let data = serde_json::to_value(&resumed).map_err(|e| HandlerError::Internal(e.to_string()))?;
        connection.dispatch(event_names::RESUMED, data).await?;

        tracing::info!(
            old_session_id = %payload.session_id,
            new_session_id = %session_id,
            user_id = %user_id,
            replayed,
            "Session resumed"
        );

        Ok(None)
    }

    async fn reject(connection: &Connection, reason: &str) -> HandlerResult<Option<CloseCode>> {
        tracing::debug!(session_id = %connection.session_id(), reason, "Resume rejected");
        connection.send(GatewayMessage::invalid_session(false)).await?;
        Ok(None)
    }
}
