//! Gateway server setup
//!
//! Provides the main WebSocket server configuration and routes.

mod handler;
mod state;

pub use handler::gateway_handler;
pub use state::GatewayState;

use crate::broadcast::{EventDispatcher, EventDispatcherConfig};
use crate::connection::ConnectionManager;
use crate::handlers::TypingTracker;
use axum::{extract::State, routing::get, Json, Router};
use huddle_cache::{GatewaySessionStore, RedisPool};
use huddle_common::{AppConfig, AppError, JwtService};
use huddle_core::SnowflakeGenerator;
use huddle_db::{
    create_pool, PgConversationRepository, PgMessageRepository, PgNotificationRepository,
    PgParticipantRepository, PgReactionRepository, PgUserRepository,
};
use huddle_service::ServiceContextBuilder;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/gateway", get(gateway_handler))
        .route("/health", get(health_check))
}

async fn health_check(State(state): State<GatewayState>) -> Json<Value> {
    let manager = state.connection_manager();
    Json(json!({
        "status": "ok",
        "connections": manager.connection_count(),
        "users": manager.user_count(),
        "rooms": manager.room_count(),
    }))
}

pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Connect the stores, wire the service context and start routing
/// Pub/Sub events to local connections
pub async fn create_gateway_state(config: AppConfig) -> Result<GatewayState, AppError> {
    tracing::info!("Connecting to PostgreSQL...");
    let pool = create_pool(&config.database)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    tracing::info!("PostgreSQL connection established");

    let redis_pool =
        RedisPool::from_config(&config.redis).map_err(|e| AppError::Cache(e.to_string()))?;

    let jwt_service = Arc::new(JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expiry,
        config.jwt.refresh_token_expiry,
    ));
    let snowflake_generator = Arc::new(SnowflakeGenerator::new(config.snowflake.worker_id));

    let service_context = ServiceContextBuilder::new()
        .redis_pool(redis_pool.clone())
        .user_repo(Arc::new(PgUserRepository::new(pool.clone())))
        .conversation_repo(Arc::new(PgConversationRepository::new(pool.clone())))
        .participant_repo(Arc::new(PgParticipantRepository::new(pool.clone())))
        .message_repo(Arc::new(PgMessageRepository::new(pool.clone())))
        .reaction_repo(Arc::new(PgReactionRepository::new(pool.clone())))
        .notification_repo(Arc::new(PgNotificationRepository::new(pool)))
        .jwt_service(jwt_service)
        .snowflake_generator(snowflake_generator)
        .chat_config(config.chat.clone())
        .build()
        .map_err(AppError::internal)?;

    let connection_manager = ConnectionManager::new_shared();
    let session_store =
        GatewaySessionStore::with_resume_ttl(redis_pool, config.gateway.session_timeout_secs);
    let typing = TypingTracker::new(Duration::from_millis(config.chat.typing_timeout_ms));

    let dispatcher_config = EventDispatcherConfig {
        redis_url: config.redis.url.clone(),
        ..Default::default()
    };
    let event_dispatcher = EventDispatcher::new(dispatcher_config, Arc::clone(&connection_manager))
        .await
        .map_err(|e| AppError::Cache(format!("Failed to create event dispatcher: {e}")))?;
    let event_dispatcher = Arc::new(event_dispatcher);
    Arc::clone(&event_dispatcher).start();

    Ok(
        GatewayState::new(service_context, connection_manager, session_store, typing, config)
            .with_event_dispatcher(event_dispatcher),
    )
}

/// Serve until ctrl-c, then stop the event dispatcher
pub async fn run_server(state: GatewayState, addr: SocketAddr) -> Result<(), AppError> {
    let listener = TcpListener::bind(addr).await.map_err(AppError::internal)?;
    tracing::info!("Gateway listening on ws://{}/gateway", addr);

    let dispatcher = state.event_dispatcher().cloned();
    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::internal)?;

    if let Some(dispatcher) = dispatcher {
        dispatcher.stop().await;
    }
    tracing::info!("Gateway stopped");
    Ok(())
}

pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr: SocketAddr = config
        .gateway
        .address()
        .parse()
        .map_err(|e| AppError::validation(format!("invalid gateway address: {e}")))?;

    let state = create_gateway_state(config).await?;
    run_server(state, addr).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
