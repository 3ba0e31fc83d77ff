//! Wire contract for delivering actions to the sync endpoint.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::history::Action;

/// Which direction an action message travels in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Record,
    Undo,
    Redo,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Record => "record",
            Self::Undo => "undo",
            Self::Redo => "redo",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body posted to the sync endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SyncEnvelope<'a> {
    pub action: SyncMode,
    pub data: &'a Action,
}

/// Response body returned by the sync endpoint on 2xx.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAck {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
}

/// How a failed delivery should be treated by whoever retries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

impl SyncRetryClass {
    /// Class of a non-2xx status from the sync endpoint. A 409/423/425 means
    /// the same idempotency key is still being applied server-side.
    pub fn for_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::ReauthRequired,
            408 | 409 | 423 | 425 | 429 | 500..=599 => Self::Retryable,
            _ => Self::Permanent,
        }
    }

    pub fn is_retryable(self) -> bool {
        self == Self::Retryable
    }
}

const RETRY_BASE_DELAY_SECS: i64 = 5;
const RETRY_MAX_DOUBLINGS: u32 = 8;

/// Advisory wait before probing the endpoint again, `None` while nothing
/// has failed. Doubles per failure after the first.
pub fn retry_delay_secs(consecutive_failures: u32) -> Option<i64> {
    let doublings = consecutive_failures.checked_sub(1)?.min(RETRY_MAX_DOUBLINGS);
    Some(RETRY_BASE_DELAY_SECS << doublings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes_match_client_retry_policy() {
        for status in [408, 409, 423, 425, 429, 500, 503] {
            assert!(SyncRetryClass::for_status(status).is_retryable(), "{}", status);
        }
        assert_eq!(SyncRetryClass::for_status(403), SyncRetryClass::ReauthRequired);
        assert_eq!(SyncRetryClass::for_status(422), SyncRetryClass::Permanent);
        assert!(!SyncRetryClass::for_status(404).is_retryable());
    }

    #[test]
    fn retry_delay_starts_after_first_failure_and_caps() {
        assert_eq!(retry_delay_secs(0), None);
        assert_eq!(retry_delay_secs(1), Some(5));
        assert_eq!(retry_delay_secs(3), Some(20));
        assert_eq!(retry_delay_secs(40), Some(5 * 256));
    }

    #[test]
    fn sync_mode_serialization_matches_endpoint_contract() {
        let actual = [SyncMode::Record, SyncMode::Undo, SyncMode::Redo]
            .iter()
            .map(|mode| serde_json::to_string(mode).expect("serialize sync mode"))
            .collect::<Vec<_>>();
        assert_eq!(actual, vec!["\"record\"", "\"undo\"", "\"redo\""]);
    }
}
