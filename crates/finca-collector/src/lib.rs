//! Scan job orchestration for the finca collector.
//!
//! Wires the portal client, the listings database, and the raw-response
//! archive into the two scheduled jobs: the daily new-listings scan and the
//! weekly full-inventory scan. The [`ScanRunner`] owns the page loop and the
//! per-page transaction boundary; the binary in `main.rs` is a thin CLI over
//! it.

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod error;
pub mod runner;
pub mod summary;

pub use error::{CollectorError, Result};
pub use runner::ScanRunner;
pub use summary::{ActionCounts, JobSummary};
