//! Runtime configuration for the history store and its sync transport.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::history::RetentionPolicy;

/// Default sync endpoint base when `KDS_SYNC_URL` is not set.
pub const DEFAULT_SYNC_BASE_URL: &str = "http://localhost:3000/api";

/// Default key under which the history snapshot is stored.
pub const DEFAULT_STORAGE_KEY: &str = "kds_action_history";

/// Default history cap.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Default timeout for sync requests.
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 30;

const SYNC_URL_ENV: &str = "KDS_SYNC_URL";
const HISTORY_LIMIT_ENV: &str = "KDS_HISTORY_LIMIT";
const STORAGE_KEY_ENV: &str = "KDS_HISTORY_STORAGE_KEY";
const SYNC_TIMEOUT_ENV: &str = "KDS_SYNC_TIMEOUT_SECS";
const SYNC_MAX_ATTEMPTS_ENV: &str = "KDS_SYNC_MAX_ATTEMPTS";

/// Settings shared by the history store, its persistence and the sync client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryConfig {
    pub sync_base_url: String,
    pub storage_key: String,
    pub retention: RetentionPolicy,
    pub sync_timeout_secs: u64,
    /// Attempts per send; 1 means fire-once.
    pub sync_max_attempts: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            sync_base_url: DEFAULT_SYNC_BASE_URL.to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            retention: RetentionPolicy::Capped(DEFAULT_HISTORY_LIMIT),
            sync_timeout_secs: DEFAULT_SYNC_TIMEOUT_SECS,
            sync_max_attempts: 1,
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or_default<T: std::str::FromStr>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => value.parse::<T>().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}; using default", name, value);
            default
        }),
        None => default,
    }
}

impl HistoryConfig {
    /// Build configuration from `KDS_*` environment variables, falling back
    /// to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let sync_base_url = env_value(SYNC_URL_ENV)
            .map(|v| v.trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.sync_base_url);

        let retention = match env_value(HISTORY_LIMIT_ENV) {
            Some(raw) => raw.parse::<RetentionPolicy>().unwrap_or_else(|_| {
                warn!(
                    "Ignoring invalid {}={:?}; using default",
                    HISTORY_LIMIT_ENV, raw
                );
                defaults.retention
            }),
            None => defaults.retention,
        };

        Self {
            sync_base_url,
            storage_key: env_value(STORAGE_KEY_ENV).unwrap_or(defaults.storage_key),
            retention,
            sync_timeout_secs: parse_or_default(
                SYNC_TIMEOUT_ENV,
                env_value(SYNC_TIMEOUT_ENV),
                defaults.sync_timeout_secs,
            ),
            sync_max_attempts: parse_or_default(
                SYNC_MAX_ATTEMPTS_ENV,
                env_value(SYNC_MAX_ATTEMPTS_ENV),
                defaults.sync_max_attempts,
            )
            .max(1),
        }
    }
}
