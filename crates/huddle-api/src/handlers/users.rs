//! Profile, presence and the user directory

use axum::{extract::State, Json};
use huddle_service::dto::{
    CurrentUserResponse, PresenceResponse, UpdateStatusRequest, UpdateUserRequest,
    UserSearchQuery, UserWithPresenceResponse,
};
use huddle_service::{PresenceService, UserService};

use crate::extractors::{AuthUser, QueryParams, ValidatedJson};
use crate::response::ApiResult;
use crate::state::AppState;

/// GET /messaging/users?search=
pub async fn search_users(
    State(state): State<AppState>,
    auth: AuthUser,
    QueryParams(query): QueryParams<UserSearchQuery>,
) -> ApiResult<Json<Vec<UserWithPresenceResponse>>> {
    let users = UserService::new(state.service_context())
        .search(auth.user_id, query)
        .await?;
    Ok(Json(users))
}

/// GET /messaging/users/@me
pub async fn get_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<CurrentUserResponse>> {
    let user = UserService::new(state.service_context())
        .get_current_user(auth.user_id)
        .await?;
    Ok(Json(user))
}

/// PATCH /messaging/users/@me
pub async fn update_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<Json<CurrentUserResponse>> {
    let user = UserService::new(state.service_context())
        .update_current_user(auth.user_id, request)
        .await?;
    Ok(Json(user))
}

/// GET /messaging/users/@me/status
pub async fn get_status(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<PresenceResponse>> {
    let presence = PresenceService::new(state.service_context())
        .get(auth.user_id)
        .await?;
    Ok(Json(presence))
}

/// PATCH /messaging/users/@me/status
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<UpdateStatusRequest>,
) -> ApiResult<Json<PresenceResponse>> {
    let presence = PresenceService::new(state.service_context())
        .set_status(auth.user_id, request.status, request.custom_status)
        .await?;
    Ok(Json(presence))
}
