//! API error types for the Bitfinex REST client.

use thiserror::Error;

use crate::shared::UnsupportedPeriod;

/// API-specific error type for the Bitfinex REST client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP/network error from reqwest
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Requested candle period is not in the supported set
    #[error(transparent)]
    UnsupportedPeriod(#[from] UnsupportedPeriod),

    /// Non-success status from the exchange, with the raw body
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Response body does not match the expected positional schema
    #[error("malformed response ({reason}): {payload}")]
    Malformed { reason: String, payload: String },

    /// Invalid parameter provided
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ApiError {
    /// Build a [`Malformed`](Self::Malformed) error keeping the raw payload
    /// for diagnostics.
    pub(crate) fn malformed(reason: impl std::fmt::Display, payload: &str) -> Self {
        Self::Malformed {
            reason: reason.to_string(),
            payload: payload.to_string(),
        }
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
