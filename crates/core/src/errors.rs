//! Error types for the action history core.

use thiserror::Error;

/// Result type alias for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Errors surfaced by the history store and its collaborators.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Caller handed the store an action that breaks the recording contract
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Delivery of an action to the server failed
    #[error("Sync failed{}: {message}", status_suffix(.status))]
    Sync {
        status: Option<u16>,
        message: String,
    },

    /// Key/value storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl HistoryError {
    /// Create an invalid action error
    pub fn invalid_action(message: impl Into<String>) -> Self {
        Self::InvalidAction(message.into())
    }

    /// Create a sync error
    pub fn sync(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Sync {
            status,
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// HTTP status if this is a sync error carrying one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Sync { status, .. } => *status,
            _ => None,
        }
    }
}
