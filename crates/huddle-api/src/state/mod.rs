//! Application state
//!
//! Shared by every handler: the service context plus the raw pools the
//! readiness probe pings.

use std::sync::Arc;

use huddle_cache::RedisPool;
use huddle_common::{AppConfig, JwtService};
use huddle_db::PgPool;
use huddle_service::ServiceContext;

#[derive(Clone)]
pub struct AppState {
    service_context: Arc<ServiceContext>,
    config: Arc<AppConfig>,
    db: PgPool,
    redis: RedisPool,
}

impl AppState {
    pub fn new(service_context: ServiceContext, config: AppConfig, db: PgPool, redis: RedisPool) -> Self {
        Self {
            service_context: Arc::new(service_context),
            config: Arc::new(config),
            db,
            redis,
        }
    }

    pub fn service_context(&self) -> &ServiceContext {
        &self.service_context
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn jwt_service(&self) -> &JwtService {
        self.service_context.jwt_service()
    }

    pub fn db(&self) -> &PgPool {
        &self.db
    }

    pub fn redis(&self) -> &RedisPool {
        &self.redis
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service_context", &self.service_context)
            .field("env", &self.config.app.env)
            .finish()
    }
}
