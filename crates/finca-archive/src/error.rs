//! Error types for the response archive.

use thiserror::Error;

/// Errors from the response archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Filesystem read or write failed.
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A payload could not be serialized or an archived file could not be
    /// parsed back.
    #[error("archive serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Convenience alias used across this crate.
pub type Result<T> = std::result::Result<T, ArchiveError>;
