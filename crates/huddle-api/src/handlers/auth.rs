//! Registration, login, token refresh and logout

use axum::{extract::State, Json};
use huddle_service::dto::{AuthResponse, LoginRequest, LogoutRequest, RefreshTokenRequest, RegisterRequest};
use huddle_service::AuthService;

use crate::extractors::{AuthUser, JsonBody, ValidatedJson};
use crate::response::{ApiResult, Created, NoContent};
use crate::state::AppState;

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> ApiResult<Created<Json<AuthResponse>>> {
    let response = AuthService::new(state.service_context()).register(request).await?;
    Ok(Created(Json(response)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let response = AuthService::new(state.service_context()).login(request).await?;
    Ok(Json(response))
}

/// POST /auth/refresh
///
/// Rotates the pair; the presented refresh token stops working.
pub async fn refresh_token(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RefreshTokenRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let response = AuthService::new(state.service_context())
        .refresh_tokens(request)
        .await?;
    Ok(Json(response))
}

/// POST /auth/logout
///
/// With a refresh token in the body only that device is logged out;
/// an empty body revokes every refresh token of the user.
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<JsonBody<LogoutRequest>>,
) -> ApiResult<NoContent> {
    let request = body.map(|JsonBody(b)| b).unwrap_or_default();
    AuthService::new(state.service_context())
        .logout(auth.user_id, request)
        .await?;
    Ok(NoContent)
}
