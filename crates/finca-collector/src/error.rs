use thiserror::Error;

/// Errors that abort a scan job.
///
/// Archive failures are deliberately absent: raw-response archiving is
/// fire-and-forget, logged and never fatal to a scan.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The database could not be opened or failed its liveness probe.
    #[error("database error: {0}")]
    Database(#[from] finca_db::DatabaseError),

    /// A read or write during reconciliation failed.
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// The portal client gave up on a page.
    #[error("portal API error: {0}")]
    Api(#[from] finca_api::ApiError),

    /// The job summary could not be serialized for archiving.
    #[error("summary serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Convenience alias used across this crate.
pub type Result<T> = std::result::Result<T, CollectorError>;
