//! Pool construction and liveness probing for the SQLite database.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

use crate::error::{DatabaseError, Result};

/// Open (creating if necessary) the SQLite database at `path` and return a
/// connection pool for it. `:memory:` is accepted for tests.
///
/// # Errors
///
/// Returns [`DatabaseError::Open`] if the file cannot be created or opened.
pub async fn create_pool(path: &str) -> Result<Pool<Sqlite>> {
    let options = SqliteConnectOptions::from_str(path)
        .map_err(|e| DatabaseError::Open(e.to_string()))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::Open(e.to_string()))?;

    tracing::debug!("Opened SQLite pool at {}", path);
    Ok(pool)
}

/// Run a trivial query against the pool to confirm the database answers.
///
/// # Errors
///
/// Returns [`DatabaseError::Unavailable`] if the probe query fails.
pub async fn health_check(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
        .map_err(|e| DatabaseError::Unavailable(e.to_string()))
}
