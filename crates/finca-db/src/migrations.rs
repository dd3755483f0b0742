//! Embedded schema migrations.
//!
//! Migration files live under `migrations/` and are compiled into the binary
//! with [`sqlx::migrate!`], so a deployed binary can always bring an older
//! database file up to the current schema.

use sqlx::{Pool, Sqlite};

use crate::error::{DatabaseError, Result};

/// Apply any pending migrations to the database behind `pool`.
///
/// # Errors
///
/// Returns [`DatabaseError::Migration`] if a migration fails to apply.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Highest applied migration version, or 0 for a fresh database.
///
/// # Errors
///
/// Returns an error if the migrations bookkeeping table cannot be queried.
pub async fn get_schema_version(pool: &Pool<Sqlite>) -> Result<i64> {
    let version: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM _sqlx_migrations")
            .fetch_one(pool)
            .await?;

    Ok(version.unwrap_or(0))
}
