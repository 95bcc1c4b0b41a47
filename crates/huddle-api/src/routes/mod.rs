//! Route table
//!
//! Everything the chat UI calls is mounted under `/api/v1/messaging`,
//! next to the auth routes. Probes and docs stay outside the rate limiter.

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::docs::ApiDoc;
use crate::handlers::{auth, conversations, health, messages, notifications, users};
use crate::state::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new().nest("/api/v1", api_v1_routes())
}

/// Probes and the Swagger UI
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(auth_routes())
        .nest("/messaging", messaging_routes())
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
}

fn messaging_routes() -> Router<AppState> {
    Router::new()
        .merge(conversation_routes())
        .merge(message_routes())
        .merge(user_routes())
        .merge(notification_routes())
}

fn conversation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/conversations/:conversation_id",
            get(conversations::get_conversation)
                .patch(conversations::update_conversation)
                .delete(conversations::delete_conversation),
        )
        .route("/conversations/:conversation_id/leave", post(conversations::leave_conversation))
        .route(
            "/conversations/:conversation_id/add-participant",
            post(conversations::add_participant),
        )
        .route(
            "/conversations/:conversation_id/remove-participant",
            post(conversations::remove_participant),
        )
        .route("/conversations/:conversation_id/read", post(conversations::mark_read))
}

fn message_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations/:conversation_id/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .route(
            "/conversations/:conversation_id/messages/:message_id",
            patch(messages::edit_message).delete(messages::delete_message),
        )
        .route(
            "/conversations/:conversation_id/messages/:message_id/reactions/:emoji",
            put(messages::add_reaction).delete(messages::remove_reaction),
        )
        .route(
            "/conversations/:conversation_id/messages/:message_id/pin",
            put(messages::pin_message).delete(messages::unpin_message),
        )
        .route("/conversations/:conversation_id/pins", get(messages::get_pins))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(users::search_users))
        .route(
            "/users/@me",
            get(users::get_current_user).patch(users::update_current_user),
        )
        .route(
            "/users/@me/status",
            get(users::get_status).patch(users::update_status),
        )
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read-all", patch(notifications::mark_all_read))
        .route(
            "/notifications/:notification_id",
            axum::routing::delete(notifications::delete_notification),
        )
        .route(
            "/notifications/:notification_id/read",
            patch(notifications::mark_read),
        )
}
