//! Message, reaction and pin endpoints
//!
//! The conversation in the path must match the message's own
//! conversation; otherwise the message is reported missing.

use axum::{extract::State, Json};
use huddle_service::dto::{
    EditMessageRequest, MessageHistoryQuery, MessagePage, MessageResponse, ReactionResponse,
    SendMessageRequest,
};
use huddle_service::{MessageService, ReactionService};

use crate::extractors::{AuthUser, ConversationPath, JsonBody, MessagePath, QueryParams, ReactionPath};
use crate::response::{ApiResult, Created, NoContent};
use crate::state::AppState;

/// GET /messaging/conversations/:conversation_id/messages?before=&after=&limit=
pub async fn get_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    path: ConversationPath,
    QueryParams(query): QueryParams<MessageHistoryQuery>,
) -> ApiResult<Json<MessagePage>> {
    let page = MessageService::new(state.service_context())
        .history(auth.user_id, path.conversation_id, query)
        .await?;
    Ok(Json(page))
}

/// POST /messaging/conversations/:conversation_id/messages
///
/// A repeated nonce returns the stored message instead of a new one.
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    path: ConversationPath,
    JsonBody(request): JsonBody<SendMessageRequest>,
) -> ApiResult<Created<Json<MessageResponse>>> {
    let outcome = MessageService::new(state.service_context())
        .send(auth.user_id, path.conversation_id, request, None)
        .await?;
    Ok(Created(Json(outcome.message)))
}

/// PATCH /messaging/conversations/:conversation_id/messages/:message_id
pub async fn edit_message(
    State(state): State<AppState>,
    auth: AuthUser,
    path: MessagePath,
    JsonBody(request): JsonBody<EditMessageRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let message = MessageService::new(state.service_context())
        .edit(
            auth.user_id,
            path.message_id,
            Some(path.conversation_id),
            &request.content,
        )
        .await?;
    Ok(Json(message))
}

/// DELETE /messaging/conversations/:conversation_id/messages/:message_id
pub async fn delete_message(
    State(state): State<AppState>,
    auth: AuthUser,
    path: MessagePath,
) -> ApiResult<NoContent> {
    MessageService::new(state.service_context())
        .delete(auth.user_id, path.message_id, Some(path.conversation_id))
        .await?;
    Ok(NoContent)
}

/// PUT /messaging/conversations/:conversation_id/messages/:message_id/reactions/:emoji
pub async fn add_reaction(
    State(state): State<AppState>,
    auth: AuthUser,
    path: ReactionPath,
) -> ApiResult<Json<Vec<ReactionResponse>>> {
    let reactions = ReactionService::new(state.service_context())
        .add(auth.user_id, path.message_id, Some(path.conversation_id), &path.emoji)
        .await?;
    Ok(Json(reactions))
}

/// DELETE /messaging/conversations/:conversation_id/messages/:message_id/reactions/:emoji
pub async fn remove_reaction(
    State(state): State<AppState>,
    auth: AuthUser,
    path: ReactionPath,
) -> ApiResult<Json<Vec<ReactionResponse>>> {
    let reactions = ReactionService::new(state.service_context())
        .remove(auth.user_id, path.message_id, Some(path.conversation_id), &path.emoji)
        .await?;
    Ok(Json(reactions))
}

/// PUT /messaging/conversations/:conversation_id/messages/:message_id/pin
pub async fn pin_message(
    State(state): State<AppState>,
    auth: AuthUser,
    path: MessagePath,
) -> ApiResult<Json<MessageResponse>> {
    set_pinned(&state, auth, path, true).await
}

/// DELETE /messaging/conversations/:conversation_id/messages/:message_id/pin
pub async fn unpin_message(
    State(state): State<AppState>,
    auth: AuthUser,
    path: MessagePath,
) -> ApiResult<Json<MessageResponse>> {
    set_pinned(&state, auth, path, false).await
}

async fn set_pinned(
    state: &AppState,
    auth: AuthUser,
    path: MessagePath,
    pinned: bool,
) -> ApiResult<Json<MessageResponse>> {
    let message = MessageService::new(state.service_context())
        .set_pinned(
            auth.user_id,
            path.message_id,
            Some(path.conversation_id),
            Some(pinned),
        )
        .await?;
    Ok(Json(message))
}

/// GET /messaging/conversations/:conversation_id/pins
pub async fn get_pins(
    State(state): State<AppState>,
    auth: AuthUser,
    path: ConversationPath,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let pins = MessageService::new(state.service_context())
        .pins(auth.user_id, path.conversation_id)
        .await?;
    Ok(Json(pins))
}
