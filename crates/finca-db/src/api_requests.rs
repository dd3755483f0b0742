//! Audit ledger for portal requests.
//!
//! Every search call a scan makes is recorded in the `api_requests` table,
//! tagged with the job that made it, so a scan's network activity can be
//! reconstructed after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{Row, SqliteConnection};

/// One recorded portal request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRequest {
    /// Unique identifier for this ledger entry
    pub id: String,
    /// Kind of request, `search` for result pages
    pub request_type: String,
    /// Endpoint path or URL that was called
    pub endpoint: String,
    /// HTTP status returned, when a response arrived
    pub status_code: Option<i64>,
    /// Wall-clock duration of the call in milliseconds
    pub duration_ms: Option<i64>,
    /// Request parameters as sent, minus credentials
    pub request_params: Option<JsonValue>,
    /// Error description when the call failed
    pub error_message: Option<String>,
    /// Scan job this request belongs to
    pub job_id: Option<String>,
    /// When the request was made
    pub created_at: DateTime<Utc>,
}

/// Fields the caller supplies when recording a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLog<'a> {
    /// Kind of request, `search` for result pages
    pub request_type: &'a str,
    /// Endpoint path or URL that was called
    pub endpoint: &'a str,
    /// HTTP status returned, when a response arrived
    pub status_code: Option<u16>,
    /// Wall-clock duration of the call in milliseconds
    pub duration_ms: Option<i64>,
    /// Request parameters as sent, minus credentials
    pub request_params: Option<&'a JsonValue>,
    /// Error description when the call failed
    pub error_message: Option<&'a str>,
    /// Scan job this request belongs to
    pub job_id: Option<&'a str>,
}

/// Record one portal request in the ledger.
///
/// The caller owns the transaction, so a ledger entry written alongside a
/// page of listings commits or rolls back with that page.
///
/// # Errors
/// Returns `sqlx::Error` if the database insert fails.
pub async fn create_api_request(
    conn: &mut SqliteConnection,
    created_at: DateTime<Utc>,
    log: RequestLog<'_>,
) -> Result<ApiRequest, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let params_json = log
        .request_params
        .map(|params| serde_json::to_string(params).unwrap_or_default());

    sqlx::query(
        "INSERT INTO api_requests (id, request_type, endpoint, status_code, duration_ms,
                                   request_params, error_message, job_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(log.request_type)
    .bind(log.endpoint)
    .bind(log.status_code.map(i64::from))
    .bind(log.duration_ms)
    .bind(&params_json)
    .bind(log.error_message)
    .bind(log.job_id)
    .bind(created_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(ApiRequest {
        id,
        request_type: log.request_type.to_string(),
        endpoint: log.endpoint.to_string(),
        status_code: log.status_code.map(i64::from),
        duration_ms: log.duration_ms,
        request_params: log.request_params.cloned(),
        error_message: log.error_message.map(str::to_string),
        job_id: log.job_id.map(str::to_string),
        created_at,
    })
}

/// All ledger entries for a job, oldest first.
///
/// # Errors
/// Returns `sqlx::Error` if the database query fails.
pub async fn get_by_job(
    conn: &mut SqliteConnection,
    job_id: &str,
) -> Result<Vec<ApiRequest>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, request_type, endpoint, status_code, duration_ms,
                request_params, error_message, job_id, created_at
         FROM api_requests
         WHERE job_id = ?
         ORDER BY created_at ASC",
    )
    .bind(job_id)
    .fetch_all(conn)
    .await?;

    let mut requests = Vec::new();
    for row in rows {
        let request_params: Option<String> = row.try_get("request_params")?;
        let request_params = request_params.and_then(|s| serde_json::from_str(&s).ok());

        let created_at_str: String = row.try_get("created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

        requests.push(ApiRequest {
            id: row.try_get("id")?,
            request_type: row.try_get("request_type")?,
            endpoint: row.try_get("endpoint")?,
            status_code: row.try_get("status_code")?,
            duration_ms: row.try_get("duration_ms")?,
            request_params,
            error_message: row.try_get("error_message")?,
            job_id: row.try_get("job_id")?,
            created_at,
        });
    }

    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::TimeZone;

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("open test db");
        db.run_migrations().await.expect("apply migrations");
        db
    }

    #[tokio::test]
    async fn requests_are_recorded_and_listed_per_job() {
        let db = setup_test_db().await;
        let mut conn = db.pool().acquire().await.expect("acquire");

        let params = serde_json::json!({ "numPage": 1, "maxItems": 50 });
        let first_at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let second_at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 5).unwrap();

        create_api_request(
            &mut conn,
            first_at,
            RequestLog {
                request_type: "search",
                endpoint: "/3.5/es/search",
                status_code: Some(200),
                duration_ms: Some(412),
                request_params: Some(&params),
                job_id: Some("daily-20260301-100000"),
                ..RequestLog::default()
            },
        )
        .await
        .expect("record first request");

        create_api_request(
            &mut conn,
            second_at,
            RequestLog {
                request_type: "search",
                endpoint: "/3.5/es/search",
                status_code: Some(200),
                duration_ms: Some(388),
                request_params: Some(&params),
                job_id: Some("daily-20260301-100000"),
                ..RequestLog::default()
            },
        )
        .await
        .expect("record second request");

        create_api_request(
            &mut conn,
            second_at,
            RequestLog {
                request_type: "search",
                endpoint: "/3.5/es/search",
                status_code: Some(200),
                job_id: Some("weekly-20260228-030000"),
                ..RequestLog::default()
            },
        )
        .await
        .expect("record unrelated request");

        let requests = get_by_job(&mut conn, "daily-20260301-100000")
            .await
            .expect("list requests");

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].created_at, first_at);
        assert_eq!(requests[1].created_at, second_at);
        assert_eq!(requests[0].status_code, Some(200));
        assert_eq!(requests[0].request_params.as_ref().unwrap()["numPage"], 1);
        assert!(requests[0].error_message.is_none());
    }

    #[tokio::test]
    async fn failed_requests_keep_their_error() {
        let db = setup_test_db().await;
        let mut conn = db.pool().acquire().await.expect("acquire");

        let created = create_api_request(
            &mut conn,
            Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            RequestLog {
                request_type: "search",
                endpoint: "/3.5/es/search",
                error_message: Some("server error (status 503)"),
                job_id: Some("weekly-20260301-030000"),
                ..RequestLog::default()
            },
        )
        .await
        .expect("record failed request");

        assert!(created.status_code.is_none());

        let requests = get_by_job(&mut conn, "weekly-20260301-030000")
            .await
            .expect("list requests");
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].error_message.as_deref(),
            Some("server error (status 503)")
        );
        assert!(requests[0].request_params.is_none());
    }
}
