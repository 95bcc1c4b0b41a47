//! # huddle-db
//!
//! PostgreSQL implementations of the repository traits from `huddle-core`,
//! plus the connection pool and the embedded schema migrations.
//!
//! ```rust,ignore
//! use huddle_db::{create_pool, run_migrations, PgMessageRepository};
//!
//! let pool = create_pool(&config.database).await?;
//! run_migrations(&pool).await?;
//! let messages = PgMessageRepository::new(pool.clone());
//! ```

pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_pool_with_options, run_migrations, PgPool, PoolOptions};
pub use repositories::{
    PgConversationRepository, PgMessageRepository, PgNotificationRepository,
    PgParticipantRepository, PgReactionRepository, PgUserRepository,
};
