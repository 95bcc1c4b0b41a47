//! Client event handler (op 3)
//!
//! Routes named client events to the services. A failed event is
//! answered with `message_error` to the requesting session and the
//! connection stays open.

use super::{HandlerError, HandlerResult};
use crate::connection::Connection;
use crate::events::client::nonce_of;
use crate::events::{ClientEvent, MessageErrorPayload};
use crate::protocol::CloseCode;
use crate::server::GatewayState;
use huddle_cache::event_names;
use huddle_core::{PresenceStatus, Snowflake};
use huddle_service::dto::{MessageSentPayload, SendMessageRequest};
use huddle_service::{
    ConversationService, MembershipChange, MessageService, PresenceService, ReactionService,
    ServiceResult,
};
use serde_json::Value;
use std::sync::Arc;

pub struct EventHandler;

impl EventHandler {
    pub async fn handle(
        state: &GatewayState,
        connection: &Arc<Connection>,
        name: &str,
        data: Value,
    ) -> HandlerResult<Option<CloseCode>> {
        let Some(user_id) = connection.user_id().await else {
            return Ok(Some(CloseCode::NotAuthenticated));
        };
        let nonce = nonce_of(&data);

        let event = match ClientEvent::parse(name, data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(session_id = %connection.session_id(), error = %e, "Rejected client event");
                let payload = MessageErrorPayload::new(name, e.code(), e.to_string(), nonce);
                send_error(connection, payload).await?;
                return Ok(None);
            }
        };

        if let Err(e) = Self::apply(state, connection, user_id, event).await {
            let reason = if e.status_code() >= 500 {
                tracing::error!(event = name, error = %e, "Client event failed");
                "Internal error".to_string()
            } else {
                tracing::debug!(event = name, error = %e, "Client event refused");
                e.to_string()
            };
            send_error(connection, MessageErrorPayload::new(name, e.error_code(), reason, nonce)).await?;
        }

        Ok(None)
    }

    async fn apply(
        state: &GatewayState,
        connection: &Arc<Connection>,
        user_id: Snowflake,
        event: ClientEvent,
    ) -> ServiceResult<()> {
        let ctx = state.service_context();
        let manager = state.connection_manager();

        match event {
            ClientEvent::JoinConversation(e) => {
                ConversationService::new(ctx)
                    .ensure_participant(e.conversation_id, user_id)
                    .await?;
                manager.join_room(connection, e.conversation_id).await;
            }
            ClientEvent::LeaveConversation(e) => {
                manager.leave_room(connection, e.conversation_id).await;
            }
            ClientEvent::SendMessage(e) => {
                let conversation_id = e.conversation_id;
                let outcome = MessageService::new(ctx)
                    .send(
                        user_id,
                        conversation_id,
                        SendMessageRequest {
                            content: e.content,
                            nonce: e.nonce,
                        },
                        Some(connection.session_id()),
                    )
                    .await?;

                let ack = MessageSentPayload {
                    nonce: outcome.message.nonce.clone(),
                    message: outcome.message,
                };
                dispatch(connection, event_names::MESSAGE_SENT, &ack).await;

                state.typing().cancel(conversation_id, user_id);
                if let Err(e) = PresenceService::new(ctx).stop_typing(conversation_id, user_id).await {
                    tracing::debug!(error = %e, "Failed to clear typing after send");
                }
            }
            ClientEvent::EditMessage(e) => {
                MessageService::new(ctx)
                    .edit(user_id, e.message_id, None, &e.content)
                    .await?;
            }
            ClientEvent::DeleteMessage(e) => {
                MessageService::new(ctx).delete(user_id, e.message_id, None).await?;
            }
            ClientEvent::AddReaction(e) => {
                ReactionService::new(ctx)
                    .add(user_id, e.message_id, None, &e.emoji)
                    .await?;
            }
            ClientEvent::RemoveReaction(e) => {
                ReactionService::new(ctx)
                    .remove(user_id, e.message_id, None, &e.emoji)
                    .await?;
            }
            ClientEvent::PinMessage(e) => {
                MessageService::new(ctx)
                    .set_pinned(user_id, e.message_id, None, e.pinned)
                    .await?;
            }
            ClientEvent::Typing(e) => {
                let presence = PresenceService::new(ctx);
                if e.is_typing {
                    presence.start_typing(e.conversation_id, user_id).await?;
                    let expiring = state.service_context_handle();
                    let conversation_id = e.conversation_id;
                    state.typing().touch(conversation_id, user_id, move || async move {
                        PresenceService::new(&expiring)
                            .typing_expired(conversation_id, user_id)
                            .await;
                    });
                } else {
                    state.typing().cancel(e.conversation_id, user_id);
                    presence.stop_typing(e.conversation_id, user_id).await?;
                }
            }
            ClientEvent::UserOnline => {
                PresenceService::new(ctx)
                    .set_status(user_id, PresenceStatus::Online, None)
                    .await?;
            }
            ClientEvent::StatusUpdate(e) => {
                PresenceService::new(ctx)
                    .set_status(user_id, e.status, e.custom_status)
                    .await?;
            }
            ClientEvent::MemberAdded(e) => {
                Self::reconcile(state, user_id, e.conversation_id, e.user_id, MembershipChange::Added).await?;
            }
            ClientEvent::MemberRemoved(e) => {
                Self::reconcile(state, user_id, e.conversation_id, e.user_id, MembershipChange::Removed).await?;
            }
        }

        Ok(())
    }

    async fn reconcile(
        state: &GatewayState,
        reporter: Snowflake,
        conversation_id: Snowflake,
        user_id: Snowflake,
        change: MembershipChange,
    ) -> ServiceResult<()> {
        let confirmed = ConversationService::new(state.service_context())
            .reconcile_membership(reporter, conversation_id, user_id, change)
            .await?;
        if !confirmed {
            tracing::debug!(
                conversation_id = %conversation_id,
                user_id = %user_id,
                ?change,
                "Membership event not backed by storage, dropped"
            );
        }
        Ok(())
    }
}

/// Best effort: a full or closed queue means the socket is going away
async fn dispatch<T: serde::Serialize>(connection: &Connection, event_type: &str, payload: &T) {
    let data = match serde_json::to_value(payload) {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(event_type, error = %e, "Failed to serialize dispatch");
            return;
        }
    };
    if connection.dispatch(event_type, data).await.is_err() {
        tracing::debug!(session_id = %connection.session_id(), event_type, "Connection closed before dispatch");
    }
}

async fn send_error(connection: &Connection, payload: MessageErrorPayload) -> HandlerResult<()> {
    let data = serde_json::to_value(&payload)
        .map_err(|e| HandlerError::Internal(e.to_string()))?;
    connection.dispatch(event_names::MESSAGE_ERROR, data).await?;
    Ok(())
}
