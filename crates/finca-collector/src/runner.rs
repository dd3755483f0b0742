//! Scan coordinator: drives pagination, reconciliation, archiving, and the
//! full-scan deactivation sweep.

use chrono::{DateTime, Utc};

use finca_api::{PageFetcher, SearchQuery};
use finca_archive::ResponseArchive;
use finca_core::{AppConfig, JobKind};
use finca_db::api_requests::{self, RequestLog};
use finca_db::{listings, Database};

use crate::error::Result;
use crate::summary::{ActionCounts, JobSummary};

/// Runs scan jobs against an injected page source.
///
/// Generic over [`PageFetcher`] so production runs use
/// [`finca_api::PortalClient`] while tests script the pages.
pub struct ScanRunner<F> {
    db: Database,
    fetcher: F,
    archive: ResponseArchive,
    config: AppConfig,
}

impl<F: PageFetcher> ScanRunner<F> {
    /// Assemble a runner from its collaborators.
    pub fn new(db: Database, fetcher: F, archive: ResponseArchive, config: AppConfig) -> Self {
        Self {
            db,
            fetcher,
            archive,
            config,
        }
    }

    /// Run one scan job to completion and return its summary.
    ///
    /// The scan start timestamp is captured before any network traffic; for
    /// full scans it doubles as the deactivation watermark. Each page is
    /// committed as one transaction, so a failure aborts the job but keeps
    /// every previously committed page.
    ///
    /// # Errors
    /// Returns the first database or portal error encountered. The archive
    /// is fire-and-forget; its failures are logged and never abort a scan.
    #[allow(clippy::cast_precision_loss, clippy::too_many_lines)]
    pub async fn run(&mut self, kind: JobKind) -> Result<JobSummary> {
        let scan_start = Utc::now();
        let job_id = job_id(kind, scan_start);
        let collection_date = scan_start.date_naive();

        tracing::info!("Starting {} job {}", kind, job_id);
        self.db.health_check().await?;

        let query = match kind {
            JobKind::DailyNewListings => SearchQuery::recent_listings(&self.config.api),
            JobKind::WeeklyFullScan => SearchQuery::full_inventory(&self.config.api),
        };

        let mut actions = ActionCounts::default();
        let mut total_pages: u32 = 0;
        let mut total_properties: u64 = 0;
        let mut page: u32 = 1;

        loop {
            if let Some(cap) = self.config.job.max_pages {
                if page > cap {
                    tracing::info!("Reached page cap of {}", cap);
                    break;
                }
            }

            let result = self.fetcher.fetch_page(&query, page).await?;

            if result.items.is_empty() {
                tracing::info!("No results on page {}, pagination finished", page);
                break;
            }

            if let Err(err) = self
                .archive
                .store_page(collection_date, kind, page, &result.raw)
                .await
            {
                tracing::warn!("Failed to archive page {}: {}", page, err);
            }

            let params = query.params_json(page);
            let mut tx = self.db.pool().begin().await?;

            for item in &result.items {
                let now = Utc::now();
                // TODO: drop the publication date plumbing once the schema
                // loses the column; the search payload never carries one.
                let action = listings::reconcile(&mut tx, now, item, None).await?;
                actions.record(action);
            }

            api_requests::create_api_request(
                &mut tx,
                Utc::now(),
                RequestLog {
                    request_type: "search",
                    endpoint: &result.endpoint,
                    status_code: Some(result.status_code),
                    duration_ms: Some(result.duration_ms),
                    request_params: Some(&params),
                    job_id: Some(&job_id),
                    ..RequestLog::default()
                },
            )
            .await?;

            tx.commit().await?;
            tracing::info!("Committed page {} ({} records)", page, result.items.len());

            total_pages += 1;
            total_properties += result.items.len() as u64;

            if page >= result.total_pages {
                break;
            }
            page += 1;
        }

        tracing::info!(
            "Pagination complete: {} pages, {} records",
            total_pages,
            total_properties
        );

        let deactivated_count = if kind.deactivates() {
            let mut tx = self.db.pool().begin().await?;
            let count =
                listings::mark_inactive_before(&mut tx, scan_start, Utc::now().date_naive())
                    .await?;
            tx.commit().await?;
            Some(count)
        } else {
            None
        };

        let mut conn = self.db.pool().acquire().await?;
        let database_stats = listings::get_statistics(&mut conn).await?;
        drop(conn);

        let end_time = Utc::now();
        let duration_seconds = (end_time - scan_start).num_milliseconds() as f64 / 1000.0;

        let summary = JobSummary {
            job_id,
            job_type: kind,
            scan_start_timestamp: kind.deactivates().then_some(scan_start),
            start_time: scan_start,
            end_time,
            duration_seconds,
            total_pages,
            total_properties,
            actions,
            deactivated_count,
            database_stats,
        };

        let metadata = serde_json::to_value(&summary)?;
        if let Err(err) = self
            .archive
            .store_metadata(collection_date, kind, &metadata)
            .await
        {
            tracing::warn!("Failed to archive job metadata: {}", err);
        }

        tracing::info!(
            "Job {} completed in {:.1}s: {} pages, {} records",
            summary.job_id,
            duration_seconds,
            total_pages,
            total_properties
        );
        Ok(summary)
    }
}

/// Job identifier from the scan start time, for example
/// `daily-20260301-060000`.
fn job_id(kind: JobKind, at: DateTime<Utc>) -> String {
    format!("{}-{}", kind.id_prefix(), at.format("%Y%m%d-%H%M%S"))
}
