//! Middleware stack for the API server
//!
//! Request IDs, tracing, CORS, gzip, a 30 second timeout and the global
//! rate limiter.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method, Request, StatusCode},
    Router,
};
use huddle_common::{CorsConfig, RateLimitConfig};
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Layers shared by every route, rate limiter excluded
pub fn apply_middleware<S>(router: Router<S>, cors_config: &CorsConfig, is_production: bool) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    // Outermost first
    let stack = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(request_id))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");

                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::SERVICE_UNAVAILABLE,
            REQUEST_TIMEOUT,
        ))
        .layer(CompressionLayer::new().gzip(true))
        .layer(create_cors_layer(cors_config, is_production));

    router.layer(stack)
}

/// Wrap the router in a global token bucket
///
/// An unusable configuration (zero rate or burst) leaves the router
/// unlimited rather than refusing to start.
pub fn apply_rate_limit(router: Router<AppState>, config: &RateLimitConfig) -> Router<AppState> {
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(config.requests_per_second.into())
        .burst_size(config.burst)
        .key_extractor(GlobalKeyExtractor)
        .finish();

    match governor_conf {
        Some(conf) => router.layer(GovernorLayer {
            config: Arc::new(conf),
        }),
        None => {
            warn!(
                requests_per_second = config.requests_per_second,
                burst = config.burst,
                "Rate limiter disabled: invalid configuration"
            );
            router
        }
    }
}

fn create_cors_layer(config: &CorsConfig, is_production: bool) -> CorsLayer {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let base_layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            request_id.clone(),
        ])
        .expose_headers([request_id]);

    if config.allowed_origins.is_empty() {
        if is_production {
            warn!("CORS: no allowed origins configured, cross-origin requests will be blocked");
            return base_layer.allow_origin(AllowOrigin::list(Vec::<HeaderValue>::new()));
        }
        warn!("CORS: allowing any origin (development mode)");
        return base_layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                warn!(%origin, "Invalid CORS origin");
                None
            })
        })
        .collect();

    tracing::info!(count = origins.len(), "CORS: allowing configured origins");
    base_layer.allow_origin(AllowOrigin::list(origins))
}
