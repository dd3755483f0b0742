//! OAuth client-credentials flow for the portal.
//!
//! Tokens are cached and reused until shortly before their nominal expiry.
//! Freshness checks take the current time as an argument so expiry behavior
//! is testable without waiting.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::{ApiError, Result};

/// Seconds before nominal expiry at which a cached token counts as stale.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// Fetches and caches bearer tokens for the portal.
pub struct TokenManager {
    http: reqwest::Client,
    token_url: String,
    api_key: String,
    api_secret: String,
    token: Option<CachedToken>,
}

impl TokenManager {
    /// Build a manager for the given portal base URL and credentials.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        api_key: String,
        api_secret: String,
    ) -> Self {
        Self {
            http,
            token_url: format!("{}/oauth/token", base_url.trim_end_matches('/')),
            api_key,
            api_secret,
            token: None,
        }
    }

    /// Return a bearer token valid at `now`, requesting a fresh one when the
    /// cached token is missing or about to expire.
    ///
    /// # Errors
    /// Returns [`ApiError::AuthFailed`] if the token endpoint rejects the
    /// credentials, or a transport error if the request cannot be made.
    pub async fn get_token(&mut self, now: DateTime<Utc>) -> Result<String> {
        if let Some(token) = &self.token {
            if token.is_fresh(now) {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.request_token(now).await?;
        let access_token = token.access_token.clone();
        self.token = Some(token);
        Ok(access_token)
    }

    /// Drop the cached token so the next call re-authenticates.
    pub fn invalidate(&mut self) {
        self.token = None;
    }

    async fn request_token(&self, now: DateTime<Utc>) -> Result<CachedToken> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .form(&[("grant_type", "client_credentials"), ("scope", "read")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Token request rejected with status {}", status);
            return Err(ApiError::AuthFailed(status.as_u16()));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

        tracing::debug!("Obtained portal token valid for {}s", body.expires_in);
        Ok(CachedToken {
            access_token: body.access_token,
            expires_at: now + Duration::seconds(body.expires_in),
        })
    }
}
