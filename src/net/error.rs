use thiserror::Error;

/// Fetch-layer errors. `NotFound` is an expected outcome (no list
/// published), kept distinct so callers can negative-cache it instead of
/// treating it as a failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("response decoding failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("resource not published (HTTP 404)")]
    NotFound,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("timeout while fetching trust data")]
    Timeout,
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound)
    }
}

/// Convenient Result type alias
pub type FetchResult<T> = Result<T, FetchError>;
