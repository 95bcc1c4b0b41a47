//! Conversation endpoints
//!
//! Membership mutations publish their own real-time events from the
//! service layer, so these handlers only translate HTTP.

use axum::{extract::State, http::StatusCode, Json};
use huddle_service::dto::{
    ConversationResponse, CreateConversationRequest, CreatedConversation, ListConversationsQuery,
    ParticipantRequest, UpdateConversationRequest,
};
use huddle_service::ConversationService;

use crate::extractors::{AuthUser, ConversationPath, JsonBody, QueryParams, ValidatedJson};
use crate::response::{ApiResult, NoContent};
use crate::state::AppState;

/// GET /messaging/conversations?filter=all|groups|unread&search=
pub async fn list_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
    QueryParams(query): QueryParams<ListConversationsQuery>,
) -> ApiResult<Json<Vec<ConversationResponse>>> {
    let conversations = ConversationService::new(state.service_context())
        .list(auth.user_id, query)
        .await?;
    Ok(Json(conversations))
}

/// GET /messaging/conversations/:conversation_id
pub async fn get_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    path: ConversationPath,
) -> ApiResult<Json<ConversationResponse>> {
    let conversation = ConversationService::new(state.service_context())
        .get(auth.user_id, path.conversation_id)
        .await?;
    Ok(Json(conversation))
}

/// POST /messaging/conversations
///
/// 201 when a conversation was created, 200 when an existing 1:1 was
/// returned.
pub async fn create_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateConversationRequest>,
) -> ApiResult<(StatusCode, Json<CreatedConversation>)> {
    let created = ConversationService::new(state.service_context())
        .create(auth.user_id, request)
        .await?;
    let status = if created.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(created)))
}

/// PATCH /messaging/conversations/:conversation_id
pub async fn update_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    path: ConversationPath,
    ValidatedJson(request): ValidatedJson<UpdateConversationRequest>,
) -> ApiResult<Json<ConversationResponse>> {
    let conversation = ConversationService::new(state.service_context())
        .update(auth.user_id, path.conversation_id, request)
        .await?;
    Ok(Json(conversation))
}

/// POST /messaging/conversations/:conversation_id/leave
pub async fn leave_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    path: ConversationPath,
) -> ApiResult<NoContent> {
    ConversationService::new(state.service_context())
        .leave(auth.user_id, path.conversation_id)
        .await?;
    Ok(NoContent)
}

/// DELETE /messaging/conversations/:conversation_id
pub async fn delete_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    path: ConversationPath,
) -> ApiResult<NoContent> {
    ConversationService::new(state.service_context())
        .delete(auth.user_id, path.conversation_id)
        .await?;
    Ok(NoContent)
}

/// POST /messaging/conversations/:conversation_id/add-participant
pub async fn add_participant(
    State(state): State<AppState>,
    auth: AuthUser,
    path: ConversationPath,
    JsonBody(request): JsonBody<ParticipantRequest>,
) -> ApiResult<Json<ConversationResponse>> {
    let conversation = ConversationService::new(state.service_context())
        .add_participant(auth.user_id, path.conversation_id, request.user_id)
        .await?;
    Ok(Json(conversation))
}

/// POST /messaging/conversations/:conversation_id/remove-participant
pub async fn remove_participant(
    State(state): State<AppState>,
    auth: AuthUser,
    path: ConversationPath,
    JsonBody(request): JsonBody<ParticipantRequest>,
) -> ApiResult<Json<ConversationResponse>> {
    let conversation = ConversationService::new(state.service_context())
        .remove_participant(auth.user_id, path.conversation_id, request.user_id)
        .await?;
    Ok(Json(conversation))
}

/// POST /messaging/conversations/:conversation_id/read
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    path: ConversationPath,
) -> ApiResult<NoContent> {
    ConversationService::new(state.service_context())
        .mark_read(auth.user_id, path.conversation_id)
        .await?;
    Ok(NoContent)
}
