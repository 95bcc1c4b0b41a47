//! PostgreSQL connection pool

use std::path::Path;
use std::time::Duration;

use huddle_common::DatabaseConfig;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// SQL migrations shipped with this crate
pub const MIGRATIONS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/migrations");

/// Timeouts that are not part of the user-facing config
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(300),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    create_pool_with_options(config, &PoolOptions::default()).await
}

pub async fn create_pool_with_options(
    config: &DatabaseConfig,
    options: &PoolOptions,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(options.acquire_timeout)
        .idle_timeout(options.idle_timeout)
        .max_lifetime(options.max_lifetime)
        .connect(&config.url)
        .await
}

/// Apply pending migrations from [`MIGRATIONS_DIR`]
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    let migrator = Migrator::new(Path::new(MIGRATIONS_DIR)).await?;
    migrator.run(pool).await?;
    info!(count = migrator.iter().count(), "Database migrations applied");
    Ok(())
}
