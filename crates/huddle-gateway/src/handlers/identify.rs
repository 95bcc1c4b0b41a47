//! Identify handler (op 2)

use super::{authenticate, HandlerError, HandlerResult};
use crate::connection::Connection;
use crate::events::ReadyPayload;
use crate::protocol::{CloseCode, IdentifyPayload};
use crate::server::GatewayState;
use huddle_cache::{event_names, GatewaySessionData};
use huddle_service::dto::{ListConversationsQuery, UserResponse};
use huddle_service::{ConversationService, PresenceService};
use std::sync::Arc;

pub struct IdentifyHandler;

impl IdentifyHandler {
    pub async fn handle(
        state: &GatewayState,
        connection: &Arc<Connection>,
        payload: IdentifyPayload,
    ) -> HandlerResult<Option<CloseCode>> {
        if connection.is_authenticated().await {
            tracing::warn!(
                session_id = %connection.session_id(),
                "Client sent Identify while already authenticated"
            );
            return Err(HandlerError::AlreadyAuthenticated);
        }

        let user_id = authenticate(state, &payload.token)?;
        let ctx = state.service_context();

        let user = ctx
            .user_repo()
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| HandlerError::AuthenticationFailed("User not found".to_string()))?;

        let conversations = ConversationService::new(ctx)
            .list(user_id, ListConversationsQuery::default())
            .await?;

        let session_id = connection.session_id().to_string();
        state
            .session_store()
            .create(&GatewaySessionData::new(session_id.clone(), user_id))
            .await?;

        state
            .connection_manager()
            .authenticate_connection(&session_id, user_id)
            .await;

        if let Err(e) = PresenceService::new(ctx).connect(user_id, &session_id).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to mark user online");
        }

        let conversation_count = conversations.len();
        let ready = ReadyPayload::new(session_id.clone(), UserResponse::from(&user), conversations);
        let data = serde_json::to_value(&ready).map_err(|e| HandlerError::Internal(e.to_string()))?;
        connection.dispatch(event_names::READY, data).await?;

        tracing::info!(
            session_id = %session_id,
            user_id = %user_id,
            username = %user.username,
            conversations = conversation_count,
            "Client identified"
        );

        Ok(None)
    }
}
