use thiserror::Error;

/// Why a single fetch did not produce a reading.
///
/// Every variant is recoverable: the coordinator surfaces it to the sink and
/// keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transport-level failure: DNS, refused connection, timeout, or a worker
    /// that died before producing a result.
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered with a server error or an unexpected status.
    #[error("weather service returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("weather service is rate limiting requests, try again later")]
    RateLimited,

    #[error("location not found")]
    NotFound,

    #[error("malformed response from weather service: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Errors the next scheduled tick is expected to clear on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Network(_) | FetchError::Upstream { .. } | FetchError::RateLimited
        )
    }

    /// Short machine-friendly name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Upstream { .. } => "upstream",
            FetchError::RateLimited => "rate_limited",
            FetchError::NotFound => "not_found",
            FetchError::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// A location string that cannot be turned into a [`crate::LocationKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidLocation {
    #[error("Please enter a city name.")]
    Empty,

    #[error("coordinates out of range: {0}")]
    CoordinatesOutOfRange(String),
}
