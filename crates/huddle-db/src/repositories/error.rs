//! SQLx error mapping for repositories

use huddle_core::error::DomainError;
use sqlx::Error as SqlxError;

pub fn map_db_error(e: SqlxError) -> DomainError {
    DomainError::DatabaseError(e.to_string())
}

/// Map a unique violation through `on_unique`, everything else to `DatabaseError`
pub fn map_unique_violation<F>(e: SqlxError, on_unique: F) -> DomainError
where
    F: FnOnce(Option<&str>) -> DomainError,
{
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return on_unique(db_err.constraint());
        }
    }
    DomainError::DatabaseError(e.to_string())
}

/// Foreign key failures on insert mean the referenced row vanished
pub fn map_foreign_key_violation<F>(e: SqlxError, on_missing: F) -> DomainError
where
    F: FnOnce() -> DomainError,
{
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_foreign_key_violation() {
            return on_missing();
        }
    }
    DomainError::DatabaseError(e.to_string())
}
