//! Error types for the portal client.

use thiserror::Error;

/// Errors from the portal client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No API key or secret was configured.
    #[error("missing API credentials")]
    MissingCredentials,

    /// The token endpoint rejected the credentials.
    #[error("authentication failed (status {0})")]
    AuthFailed(u16),

    /// The portal rejected our bearer token.
    #[error("unauthorized, token rejected")]
    Unauthorized,

    /// The portal throttled us (HTTP 429).
    #[error("rate limited by portal")]
    RateLimited,

    /// The portal reported a server-side failure.
    #[error("server error (status {0})")]
    Server(u16),

    /// A status outside the handled set.
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Transport-level failure from reqwest.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    /// Whether a retry with backoff has a chance of succeeding.
    ///
    /// Only throttling and server-side failures are retried. Auth failures
    /// are not; the caller must re-authenticate or fix its credentials.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Server(_))
    }
}

/// Convenience alias used across this crate.
pub type Result<T> = std::result::Result<T, ApiError>;
