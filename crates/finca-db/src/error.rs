//! Database error types.

use thiserror::Error;

/// Errors produced by the database layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The database file could not be opened or created.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Schema migrations failed to apply.
    #[error("migration failed: {0}")]
    Migration(String),

    /// The database did not answer a liveness probe.
    #[error("database unavailable: {0}")]
    Unavailable(String),

    /// Any other sqlx-level failure.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Convenience alias used across this crate.
pub type Result<T> = std::result::Result<T, DatabaseError>;
