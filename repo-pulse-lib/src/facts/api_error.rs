//! Classified failures of a single remote call.

use core::time::Duration;

/// What went wrong with one request to the hosting API.
///
/// The variant decides whether the fetch primitive tries again: rate limiting, timeouts,
/// server errors and transport faults are transient, everything else is permanent.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Primary or secondary rate limit. `retry_after` is the wait the server asked for, if any.
    #[error("rate limited by the hosting API")]
    RateLimited { retry_after: Option<Duration> },

    #[error("request timed out")]
    Timeout,

    #[error("server error: HTTP {status}")]
    Server { status: u16 },

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("request rejected: HTTP {status}: {message}")]
    Client { status: u16, message: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether another attempt has a chance of succeeding.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Timeout | Self::Server { .. } | Self::Network(_))
    }

    /// Server-requested delay before the next attempt, overriding the exponential schedule.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            if status.is_server_error() {
                Self::Server { status: status.as_u16() }
            } else {
                Self::Client {
                    status: status.as_u16(),
                    message: e.to_string(),
                }
            }
        } else {
            Self::Network(e)
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
