//! Filesystem archive for raw portal responses.
//!
//! Every page a scan fetches is written verbatim before it is processed,
//! alongside a metadata file summarizing the job, so any scan can be
//! replayed or audited later. Layout:
//!
//! ```text
//! {root}/{YYYY-MM-DD}/{new_listings|full_scan}_p{N}.json
//! {root}/{YYYY-MM-DD}/{new_listings|full_scan}_meta.json
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;

pub use error::{ArchiveError, Result};

use chrono::NaiveDate;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

use finca_core::JobKind;

/// Archive of raw responses under a root directory.
#[derive(Debug, Clone)]
pub struct ResponseArchive {
    root: PathBuf,
}

impl ResponseArchive {
    /// Archive rooted at `root`. The directory is created lazily on the
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write one page body verbatim and return the path written.
    ///
    /// # Errors
    /// Returns [`ArchiveError::Io`] if the directory or file cannot be
    /// written.
    pub async fn store_page(
        &self,
        collection_date: NaiveDate,
        kind: JobKind,
        page: u32,
        body: &JsonValue,
    ) -> Result<PathBuf> {
        let path = self.page_path(collection_date, kind, page);
        self.write_json(&path, body).await?;
        tracing::debug!("Archived page {} to {}", page, path.display());
        Ok(path)
    }

    /// Write the job metadata file and return the path written.
    ///
    /// # Errors
    /// Returns [`ArchiveError::Io`] if the directory or file cannot be
    /// written.
    pub async fn store_metadata(
        &self,
        collection_date: NaiveDate,
        kind: JobKind,
        metadata: &JsonValue,
    ) -> Result<PathBuf> {
        let path = self.metadata_path(collection_date, kind);
        self.write_json(&path, metadata).await?;
        tracing::debug!("Archived job metadata to {}", path.display());
        Ok(path)
    }

    /// Read an archived page back, or `None` if it was never written.
    ///
    /// # Errors
    /// Returns [`ArchiveError::Serde`] if the file exists but does not
    /// parse as JSON.
    pub async fn load_page(
        &self,
        collection_date: NaiveDate,
        kind: JobKind,
        page: u32,
    ) -> Result<Option<JsonValue>> {
        read_json(&self.page_path(collection_date, kind, page)).await
    }

    /// Read archived job metadata back, or `None` if it was never written.
    ///
    /// # Errors
    /// Returns [`ArchiveError::Serde`] if the file exists but does not
    /// parse as JSON.
    pub async fn load_metadata(
        &self,
        collection_date: NaiveDate,
        kind: JobKind,
    ) -> Result<Option<JsonValue>> {
        read_json(&self.metadata_path(collection_date, kind)).await
    }

    fn page_path(&self, collection_date: NaiveDate, kind: JobKind, page: u32) -> PathBuf {
        self.day_dir(collection_date)
            .join(format!("{}_p{}.json", kind.file_prefix(), page))
    }

    fn metadata_path(&self, collection_date: NaiveDate, kind: JobKind) -> PathBuf {
        self.day_dir(collection_date)
            .join(format!("{}_meta.json", kind.file_prefix()))
    }

    fn day_dir(&self, collection_date: NaiveDate) -> PathBuf {
        self.root.join(collection_date.to_string())
    }

    async fn write_json(&self, path: &Path, value: &JsonValue) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(value)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

async fn read_json(path: &Path) -> Result<Option<JsonValue>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
