//! Throttled, retrying search client for the property portal.
//!
//! [`PortalClient`] is the production implementation of [`PageFetcher`];
//! scans depend only on the trait so tests can feed them scripted pages.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};

use finca_core::ApiConfig;

use crate::auth::TokenManager;
use crate::error::{ApiError, Result};

/// Attempts per page before the error is handed to the caller.
const MAX_RETRIES: u32 = 3;
/// Exponential backoff bounds between attempts, in seconds.
const MIN_BACKOFF_SECS: u64 = 4;
const MAX_BACKOFF_SECS: u64 = 60;
/// Minimum spacing between portal requests (the portal allows 1 req/s).
const REQUEST_GAP: Duration = Duration::from_secs(1);

/// A search filter set, fixed for the lifetime of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Listing operation, `sale` for every current scan
    pub operation: String,
    /// Portal property type filter
    pub property_type: String,
    /// Portal location identifier
    pub location_id: String,
    /// Page size requested from the portal
    pub max_items: u32,
    /// Field the portal should order results by
    pub order: String,
    /// Order direction, `asc` or `desc`
    pub sort: String,
    /// Recency filter code, `Y` limits results to the last two days
    pub since_date: Option<String>,
}

impl SearchQuery {
    /// Query for listings published in the last couple of days, newest
    /// first. Used by daily incremental scans.
    #[must_use]
    pub fn recent_listings(config: &ApiConfig) -> Self {
        Self {
            operation: "sale".to_string(),
            property_type: "homes".to_string(),
            location_id: config.location_id.clone(),
            max_items: config.max_items,
            order: "publicationDate".to_string(),
            sort: "desc".to_string(),
            since_date: Some("Y".to_string()),
        }
    }

    /// Unfiltered inventory query ordered by ascending price, so results
    /// stay stable across the pages of one scan. Used by weekly full scans.
    #[must_use]
    pub fn full_inventory(config: &ApiConfig) -> Self {
        Self {
            operation: "sale".to_string(),
            property_type: "homes".to_string(),
            location_id: config.location_id.clone(),
            max_items: config.max_items,
            order: "price".to_string(),
            sort: "asc".to_string(),
            since_date: None,
        }
    }

    /// Form parameters for one page of this query.
    #[must_use]
    pub fn to_params(&self, page: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("operation", self.operation.clone()),
            ("propertyType", self.property_type.clone()),
            ("locationId", self.location_id.clone()),
            ("maxItems", self.max_items.to_string()),
            ("numPage", page.to_string()),
            ("order", self.order.clone()),
            ("sort", self.sort.clone()),
        ];
        if let Some(since) = &self.since_date {
            params.push(("sinceDate", since.clone()));
        }
        params
    }

    /// Same parameters as a JSON object, for the request ledger. Never
    /// contains credentials.
    #[must_use]
    pub fn params_json(&self, page: u32) -> JsonValue {
        let map: serde_json::Map<String, JsonValue> = self
            .to_params(page)
            .into_iter()
            .map(|(key, value)| (key.to_string(), JsonValue::String(value)))
            .collect();
        JsonValue::Object(map)
    }
}

/// One fetched page of search results.
#[derive(Debug, Clone)]
pub struct PageResult {
    /// Total result count the portal reports for the query
    pub total: u64,
    /// Number of pages the portal reports for the query
    pub total_pages: u32,
    /// The records on this page
    pub items: Vec<JsonValue>,
    /// Complete response body, archived verbatim
    pub raw: JsonValue,
    /// Endpoint path that was called
    pub endpoint: String,
    /// HTTP status of the response
    pub status_code: u16,
    /// Wall-clock duration of the call in milliseconds
    pub duration_ms: i64,
}

impl PageResult {
    /// Build a page from a response body. Missing fields become empty, so
    /// an unexpected body shape surfaces as an empty page rather than an
    /// error.
    #[must_use]
    pub fn from_json(raw: JsonValue, endpoint: String, status_code: u16, duration_ms: i64) -> Self {
        let total = raw.get("total").and_then(JsonValue::as_u64).unwrap_or(0);
        let total_pages = raw
            .get("totalPages")
            .and_then(JsonValue::as_u64)
            .map_or(0, |pages| u32::try_from(pages).unwrap_or(u32::MAX));
        let items = raw
            .get("elementList")
            .and_then(JsonValue::as_array)
            .cloned()
            .unwrap_or_default();

        Self {
            total,
            total_pages,
            items,
            raw,
            endpoint,
            status_code,
            duration_ms,
        }
    }
}

/// Source of search result pages.
///
/// Implemented by [`PortalClient`] for production and by scripted fakes in
/// tests. Takes `&mut self` because fetching mutates client state (token
/// cache, throttle clock).
#[async_trait]
pub trait PageFetcher {
    /// Fetch one page (1-based) of results for `query`.
    async fn fetch_page(&mut self, query: &SearchQuery, page: u32) -> Result<PageResult>;
}

/// HTTP client for the portal's search API.
pub struct PortalClient {
    http: reqwest::Client,
    auth: TokenManager,
    search_url: String,
    endpoint_path: String,
    last_request_at: Option<Instant>,
}

impl PortalClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    /// Returns [`ApiError::MissingCredentials`] if the key or secret is
    /// absent, or a transport error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let api_key = config.key.clone().ok_or(ApiError::MissingCredentials)?;
        let api_secret = config.secret.clone().ok_or(ApiError::MissingCredentials)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base = config.base_url.trim_end_matches('/');
        let endpoint_path = format!("/3.5/{}/search", config.country);

        Ok(Self {
            auth: TokenManager::new(http.clone(), base, api_key, api_secret),
            search_url: format!("{base}{endpoint_path}"),
            endpoint_path,
            http,
            last_request_at: None,
        })
    }

    /// Sleep just long enough to keep at least [`REQUEST_GAP`] between
    /// consecutive requests.
    async fn throttle(&mut self) {
        if let Some(last) = self.last_request_at {
            let elapsed = last.elapsed();
            if elapsed < REQUEST_GAP {
                tokio::time::sleep(REQUEST_GAP - elapsed).await;
            }
        }
        self.last_request_at = Some(Instant::now());
    }

    async fn request_page(&mut self, query: &SearchQuery, page: u32) -> Result<PageResult> {
        let token = self.auth.get_token(Utc::now()).await?;
        self.throttle().await;

        let started = Instant::now();
        let response = self
            .http
            .post(&self.search_url)
            .bearer_auth(&token)
            .form(&query.to_params(page))
            .send()
            .await?;
        let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let status = response.status();
        if status.as_u16() == 429 {
            tracing::warn!("Portal rate limit hit on page {}", page);
            return Err(ApiError::RateLimited);
        }
        if status.is_server_error() {
            tracing::warn!("Portal server error {} on page {}", status, page);
            return Err(ApiError::Server(status.as_u16()));
        }
        if status.as_u16() == 401 {
            tracing::warn!("Portal rejected token, invalidating");
            self.auth.invalidate();
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ApiError::UnexpectedStatus(status.as_u16()));
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

        let result = PageResult::from_json(
            body,
            self.endpoint_path.clone(),
            status.as_u16(),
            duration_ms,
        );
        tracing::debug!(
            "Fetched page {}: {} items of {} total",
            page,
            result.items.len(),
            result.total
        );
        Ok(result)
    }
}

#[async_trait]
impl PageFetcher for PortalClient {
    async fn fetch_page(&mut self, query: &SearchQuery, page: u32) -> Result<PageResult> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.request_page(query, page).await {
                Ok(result) => return Ok(result),
                Err(err) if attempt < MAX_RETRIES && err.is_retryable() => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        "Fetch attempt {} for page {} failed: {}, retrying in {}s",
                        attempt,
                        page,
                        err,
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Delay before the next attempt: exponential from 1s, clamped to
/// [`MIN_BACKOFF_SECS`]..=[`MAX_BACKOFF_SECS`].
fn backoff_delay(attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_secs(exp.clamp(MIN_BACKOFF_SECS, MAX_BACKOFF_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ApiConfig {
        ApiConfig {
            location_id: "0-EU-ES-45".to_string(),
            max_items: 50,
            ..ApiConfig::default()
        }
    }

    #[test]
    fn recent_query_filters_by_recency_and_orders_by_publication() {
        let query = SearchQuery::recent_listings(&test_config());
        assert_eq!(query.since_date.as_deref(), Some("Y"));
        assert_eq!(query.order, "publicationDate");
        assert_eq!(query.sort, "desc");
        assert_eq!(query.location_id, "0-EU-ES-45");
    }

    #[test]
    fn full_query_is_unfiltered_and_price_ordered() {
        let query = SearchQuery::full_inventory(&test_config());
        assert!(query.since_date.is_none());
        assert_eq!(query.order, "price");
        assert_eq!(query.sort, "asc");
    }

    #[test]
    fn params_carry_page_number_and_page_size() {
        let query = SearchQuery::full_inventory(&test_config());
        let params = query.to_params(7);

        assert!(params.contains(&("numPage", "7".to_string())));
        assert!(params.contains(&("maxItems", "50".to_string())));
        assert!(!params.iter().any(|(key, _)| *key == "sinceDate"));
    }

    #[test]
    fn params_json_holds_exactly_the_form_fields() {
        let query = SearchQuery::recent_listings(&test_config());
        let json = query.params_json(2);

        let object = json.as_object().expect("object");
        assert_eq!(object.len(), 8);
        assert_eq!(json["numPage"], "2");
        assert_eq!(json["sinceDate"], "Y");
        assert_eq!(json["operation"], "sale");
    }

    #[test]
    fn page_result_parses_portal_body() {
        let body = serde_json::json!({
            "total": 1203,
            "totalPages": 25,
            "actualPage": 1,
            "elementList": [
                { "propertyCode": "1", "price": 100000 },
                { "propertyCode": "2", "price": 200000 }
            ]
        });

        let page = PageResult::from_json(body.clone(), "/3.5/es/search".to_string(), 200, 350);
        assert_eq!(page.total, 1203);
        assert_eq!(page.total_pages, 25);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.raw, body);
        assert_eq!(page.status_code, 200);
    }

    #[test]
    fn page_result_treats_missing_fields_as_empty() {
        let page = PageResult::from_json(
            serde_json::json!({ "summary": "nothing here" }),
            "/3.5/es/search".to_string(),
            200,
            120,
        );
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
        assert!(page.items.is_empty());
        assert_eq!(page.raw["summary"], "nothing here");
    }

    #[test]
    fn backoff_grows_exponentially_within_bounds() {
        assert_eq!(backoff_delay(1), Duration::from_secs(4));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(6), Duration::from_secs(32));
        assert_eq!(backoff_delay(12), Duration::from_secs(60));
    }

    #[test]
    fn client_requires_credentials() {
        let config = test_config();
        assert!(matches!(
            PortalClient::new(&config),
            Err(ApiError::MissingCredentials)
        ));
    }
}
