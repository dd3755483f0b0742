//! Per-job action counts and the archived job summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use finca_core::JobKind;
use finca_db::listings::{ListingStats, ReconcileAction};

/// Running tally of reconciliation outcomes for one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCounts {
    /// Listings seen for the first time
    pub new: u64,
    /// Listings whose stored price was replaced
    pub price_change: u64,
    /// Retired listings that came back
    pub republished: u64,
    /// Known listings seen again unchanged
    pub active: u64,
    /// Records dropped for missing code or price
    pub skipped: u64,
}

impl ActionCounts {
    /// Count one reconciliation outcome.
    pub fn record(&mut self, action: ReconcileAction) {
        match action {
            ReconcileAction::New => self.new += 1,
            ReconcileAction::PriceChange => self.price_change += 1,
            ReconcileAction::Republished => self.republished += 1,
            ReconcileAction::Active => self.active += 1,
            ReconcileAction::Skipped => self.skipped += 1,
        }
    }
}

/// Everything a finished job reports, archived as the `_meta.json` file.
///
/// `scan_start_timestamp` and `deactivated_count` only appear for full
/// scans; daily summaries omit the keys entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    /// Job identifier, for example `weekly-20260321-030000`
    pub job_id: String,
    /// Which kind of scan ran
    pub job_type: JobKind,
    /// Deactivation watermark, full scans only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_start_timestamp: Option<DateTime<Utc>>,
    /// When the job started
    pub start_time: DateTime<Utc>,
    /// When the job finished
    pub end_time: DateTime<Utc>,
    /// Total wall-clock runtime
    pub duration_seconds: f64,
    /// Pages that were fetched and committed
    pub total_pages: u32,
    /// Records seen across all committed pages
    pub total_properties: u64,
    /// Reconciliation outcome tallies
    pub actions: ActionCounts,
    /// Listings retired by the deactivation sweep, full scans only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated_count: Option<u64>,
    /// Database-wide listing counts after the job
    pub database_stats: ListingStats,
}
