//! Shared domain types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two collection jobs the service runs.
///
/// An incremental scan only discovers recently published listings and never
/// deactivates anything; a full scan sweeps the whole inventory and marks
/// listings that were absent from it as sold or withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Incremental scan over recently published listings.
    DailyNewListings,
    /// Full inventory sweep with end-of-scan deactivation.
    WeeklyFullScan,
}

impl JobKind {
    /// Canonical name, also used as the `job_type` field of job summaries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DailyNewListings => "daily_new_listings",
            Self::WeeklyFullScan => "weekly_full_scan",
        }
    }

    /// Prefix for archived page and metadata filenames.
    #[must_use]
    pub fn file_prefix(self) -> &'static str {
        match self {
            Self::DailyNewListings => "new_listings",
            Self::WeeklyFullScan => "full_scan",
        }
    }

    /// Prefix for generated job ids (`daily-YYYYMMDD-HHMMSS`, `weekly-...`).
    #[must_use]
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::DailyNewListings => "daily",
            Self::WeeklyFullScan => "weekly",
        }
    }

    /// Whether this job runs the end-of-scan deactivation sweep.
    #[must_use]
    pub fn deactivates(self) -> bool {
        matches!(self, Self::WeeklyFullScan)
    }

    /// Parse from a job name, accepting `-` or `_` as separator.
    ///
    /// Returns `None` for unknown names so callers can reject them loudly.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.replace('-', "_").as_str() {
            "daily_new_listings" => Some(Self::DailyNewListings),
            "weekly_full_scan" => Some(Self::WeeklyFullScan),
            _ => None,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
