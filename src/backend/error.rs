use thiserror::Error;

/// Failures talking to the hosted backend (auth and record store).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// 401/403: the access token is missing, expired or revoked.
    #[error("Not signed in or session expired")]
    Unauthorized,
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid response: {0}")]
    Decode(String),
    #[error("Invalid backend URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Insecure backend URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
    #[error("Insert returned no record")]
    EmptyInsertResponse,
}

impl BackendError {
    /// Returns true if this error is transient and an idempotent request
    /// should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Timeout | BackendError::Network(_) => true,
            BackendError::HttpStatus(status) => *status >= 500,
            BackendError::Unauthorized
            | BackendError::ResponseTooLarge(_)
            | BackendError::Decode(_)
            | BackendError::InvalidBaseUrl(_)
            | BackendError::InsecureBaseUrl
            | BackendError::EmptyInsertResponse => false,
        }
    }
}
