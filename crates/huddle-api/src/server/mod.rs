//! Server setup and initialization

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use huddle_cache::RedisPool;
use huddle_common::{AppConfig, AppError, JwtService};
use huddle_core::SnowflakeGenerator;
use huddle_db::{
    create_pool, run_migrations, PgConversationRepository, PgMessageRepository,
    PgNotificationRepository, PgParticipantRepository, PgReactionRepository, PgUserRepository,
};
use huddle_service::ServiceContextBuilder;
use tokio::net::TcpListener;
use tracing::info;

use crate::middleware::{apply_middleware, apply_rate_limit};
use crate::routes::{create_router, public_routes};
use crate::state::AppState;

/// Build the complete application; probes and docs bypass the rate limiter
pub fn create_app(state: AppState) -> Router {
    let config = state.config();
    let api = apply_rate_limit(create_router(), &config.rate_limit);
    let router = apply_middleware(
        api.merge(public_routes()),
        &config.cors,
        config.app.is_production(),
    );
    router.with_state(state)
}

/// Connect the stores and wire the service context
pub async fn create_app_state(config: AppConfig) -> Result<AppState, AppError> {
    info!("Connecting to PostgreSQL...");
    let pool = create_pool(&config.database)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    if config.database.run_migrations {
        run_migrations(&pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
    }
    info!("PostgreSQL connection established");

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
        .notification_repo(Arc::new(PgNotificationRepository::new(pool.clone())))
        .jwt_service(jwt_service)
        .snowflake_generator(snowflake_generator)
        .chat_config(config.chat.clone())
        .build()
        .map_err(AppError::internal)?;

    Ok(AppState::new(service_context, config, pool, redis_pool))
}

/// Serve until ctrl-c
pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), AppError> {
    let listener = TcpListener::bind(addr).await.map_err(AppError::internal)?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::internal)?;

    info!("Server stopped");
    Ok(())
}

pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr: SocketAddr = config
        .api
        .address()
        .parse()
        .map_err(|e| AppError::validation(format!("invalid API address: {e}")))?;

    let state = create_app_state(config).await?;
    run_server(create_app(state), addr).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
