//! Error type for the LLM messages client.
//!
//! [`LlmError`] separates rate limiting (transient, retried by callers) from
//! API and network failures. `thiserror` derives `Display` and `Error` from
//! the `#[error(...)]` attributes.

use thiserror::Error;

/// Errors returned while talking to the messages API.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP 429. `retry_after_ms` comes from the `retry-after` header
    /// (one second when the header is missing).
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Any other non-success status (401 bad key, 500 internal error, ...).
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Transport failure (DNS, refused connection, timeout) or an
    /// undecodable body.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl LlmError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. })
    }
}
