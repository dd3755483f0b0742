//! SQLite persistence layer for finca.
//!
//! The crate owns the schema (embedded migrations), the listing
//! reconciliation rules, and the request ledger. Everything is exposed as
//! free async functions over [`sqlx`] connections so callers control
//! transaction boundaries; [`Database`] is a thin handle that owns the pool.
//!
//! ```no_run
//! # async fn example() -> finca_db::Result<()> {
//! let db = finca_db::Database::new("finca.db").await?;
//! db.run_migrations().await?;
//! db.health_check().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod api_requests;
pub mod connection;
pub mod error;
pub mod listings;
pub mod migrations;

pub use error::{DatabaseError, Result};

use sqlx::{Pool, Sqlite};

/// Handle to an open finca database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open (creating if necessary) the database at `path`.
    ///
    /// Migrations are not applied automatically; call
    /// [`Database::run_migrations`] before first use.
    pub async fn new(path: &str) -> Result<Self> {
        let pool = connection::create_pool(path).await?;
        Ok(Self { pool })
    }

    /// Apply any pending schema migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Highest applied migration version.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Confirm the database answers queries.
    pub async fn health_check(&self) -> Result<()> {
        connection::health_check(&self.pool).await
    }

    /// Borrow the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
