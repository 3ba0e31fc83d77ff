//! Error types for the sync client crate.

use kds_core::sync::SyncRetryClass;
use kds_core::HistoryError;
use thiserror::Error;

/// Result type alias for sync client operations.
pub type Result<T> = std::result::Result<T, SyncClientError>;

/// Errors that can occur while delivering an action.
#[derive(Debug, Error)]
pub enum SyncClientError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-2xx response from the sync endpoint
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// 2xx response whose body is not an acknowledgement
    #[error("Invalid response ({status}): {message}")]
    InvalidResponse { status: u16, message: String },

    /// Server acknowledged the request with `success: false`
    #[error("Sync rejected: {0}")]
    Rejected(String),

    /// Invalid request (bad base URL, header value, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SyncClientError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(status: u16, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// HTTP status if the server answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::InvalidResponse { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> SyncRetryClass {
        match self {
            Self::Api { status, .. } => SyncRetryClass::for_status(*status),
            Self::Http(_) => SyncRetryClass::Retryable,
            Self::Json(_) | Self::InvalidResponse { .. } => SyncRetryClass::Permanent,
            Self::Rejected(_) => SyncRetryClass::Permanent,
            Self::InvalidRequest(_) => SyncRetryClass::Permanent,
        }
    }
}

impl From<SyncClientError> for HistoryError {
    fn from(err: SyncClientError) -> Self {
        HistoryError::sync(err.status_code(), err.to_string())
    }
}
