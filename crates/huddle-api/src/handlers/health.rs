//! Liveness and readiness probes

use axum::{extract::State, http::StatusCode, Json};
use huddle_service::dto::{HealthResponse, ReadinessResponse};

use crate::state::AppState;

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Process is up"))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Readiness probe: PostgreSQL and Redis must both answer
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Dependencies reachable"),
        (status = 503, description = "A dependency is down")
    )
)]
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let db_healthy = db_ping(&state).await;
    let redis_healthy = state.redis().health_check().await.is_ok();

    let response = ReadinessResponse::ready(db_healthy, redis_healthy);
    let status = if response.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

async fn db_ping(state: &AppState) -> bool {
    state.db().acquire().await.is_ok()
}
