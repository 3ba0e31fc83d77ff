//! How much history the store keeps.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::DEFAULT_HISTORY_LIMIT;

/// Retention strategy for the undo/redo ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RetentionPolicy {
    /// Keep every action for the session.
    Unbounded,
    /// Keep the newest `n` actions; zero behaves as one.
    Capped(usize),
    /// Keep only the most recent action.
    LastOnly,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::Capped(DEFAULT_HISTORY_LIMIT)
    }
}

impl RetentionPolicy {
    /// Maximum history length, `None` when unbounded.
    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Capped(n) => Some((*n).max(1)),
            Self::LastOnly => Some(1),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid retention policy '{0}'; expected 'unbounded', 'last' or a number")]
pub struct ParseRetentionPolicyError(String);

impl FromStr for RetentionPolicy {
    type Err = ParseRetentionPolicyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim();
        match value.to_ascii_lowercase().as_str() {
            "unbounded" | "none" => Ok(Self::Unbounded),
            "last" | "last_only" | "lastonly" => Ok(Self::LastOnly),
            other => other
                .parse::<usize>()
                .map(Self::Capped)
                .map_err(|_| ParseRetentionPolicyError(value.to_string())),
        }
    }
}
