//! Connection pool and schema migrations

mod postgres;

pub use postgres::{
    create_pool, create_pool_with_options, run_migrations, PoolOptions, MIGRATIONS_DIR,
};

pub use sqlx::postgres::PgPool;
