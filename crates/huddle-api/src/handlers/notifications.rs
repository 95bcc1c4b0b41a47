//! Notification inbox

use axum::{extract::State, Json};
use huddle_service::dto::{
    MarkAllReadResponse, NotificationListResponse, NotificationQuery, NotificationResponse,
};
use huddle_service::NotificationService;

use crate::extractors::{AuthUser, NotificationPath, QueryParams};
use crate::response::{ApiResult, NoContent};
use crate::state::AppState;

/// GET /messaging/notifications?unread_only=&limit=
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    QueryParams(query): QueryParams<NotificationQuery>,
) -> ApiResult<Json<NotificationListResponse>> {
    let list = NotificationService::new(state.service_context())
        .list(auth.user_id, query)
        .await?;
    Ok(Json(list))
}

/// PATCH /messaging/notifications/:notification_id/read
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    path: NotificationPath,
) -> ApiResult<Json<NotificationResponse>> {
    let notification = NotificationService::new(state.service_context())
        .mark_read(auth.user_id, path.notification_id)
        .await?;
    Ok(Json(notification))
}

/// PATCH /messaging/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<MarkAllReadResponse>> {
    let result = NotificationService::new(state.service_context())
        .mark_all_read(auth.user_id)
        .await?;
    Ok(Json(result))
}

/// DELETE /messaging/notifications/:notification_id
pub async fn delete_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    path: NotificationPath,
) -> ApiResult<NoContent> {
    NotificationService::new(state.service_context())
        .delete(auth.user_id, path.notification_id)
        .await?;
    Ok(NoContent)
}
