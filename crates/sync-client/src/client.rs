//! Sync API client posting action messages to the `/sync` endpoint.
//!
//! Each message carries the action id as its idempotency key so a retried
//! or re-queued delivery can be deduplicated server-side.

use std::time::Duration;

use async_trait::async_trait;
use kds_core::config::{HistoryConfig, DEFAULT_SYNC_TIMEOUT_SECS};
use kds_core::history::Action;
use kds_core::sync::{ActionSyncer, SyncAck, SyncEnvelope, SyncMode};
use kds_core::HistoryError;
use log::{debug, warn};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use tokio::time::sleep;

use crate::error::{Result, SyncClientError};

const MAX_LOG_BODY_CHARS: usize = 512;
const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
const SYNC_BASE_BACKOFF_MS: u64 = 250;
const SYNC_MAX_BACKOFF_MS: u64 = 8_000;

/// Error body shape the sync endpoint may return on non-2xx.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn is_retryable_transport_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

fn backoff_with_jitter(attempt: usize) -> Duration {
    let exp = (attempt.saturating_sub(1) as u32).min(8);
    let backoff =
        (SYNC_BASE_BACKOFF_MS.saturating_mul(1_u64 << exp)).min(SYNC_MAX_BACKOFF_MS);
    let jitter = rand::thread_rng().gen_range(0..=(backoff / 5).max(1));
    Duration::from_millis(backoff.saturating_add(jitter))
}

fn body_preview(body: &str) -> String {
    let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
    if body.chars().count() > MAX_LOG_BODY_CHARS {
        preview.push_str("...");
    }
    preview
}

/// Client for the action sync endpoint.
#[derive(Debug, Clone)]
pub struct ActionSyncClient {
    client: reqwest::Client,
    base_url: String,
    max_attempts: usize,
}

impl ActionSyncClient {
    /// Create a fire-once client with the default request timeout.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base of the sync API (e.g., "http://localhost:3000/api")
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_SYNC_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(SyncClientError::invalid_request("Sync base URL is empty"));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            max_attempts: 1,
        })
    }

    /// Build a client from URL, timeout and attempt settings.
    pub fn from_config(config: &HistoryConfig) -> Result<Self> {
        let client = Self::with_timeout(
            &config.sync_base_url,
            Duration::from_secs(config.sync_timeout_secs),
        )?;
        Ok(client.with_max_attempts(config.sync_max_attempts))
    }

    /// Attempts per send, including the first. Values below 1 become 1.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("Sync response status: {}", status);
            return;
        }
        debug!("Sync response error ({}): {}", status, body_preview(body));
    }

    fn headers(&self, action_id: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(action_id)
            .map_err(|_| SyncClientError::invalid_request("Invalid idempotency key"))?;
        headers.insert(IDEMPOTENCY_KEY_HEADER, key);
        Ok(headers)
    }

    /// Turn an HTTP response into an acknowledgement or an error.
    async fn parse_ack(response: reqwest::Response) -> Result<SyncAck> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .ok()
                .and_then(|error| error.message.or(error.error))
                .unwrap_or_else(|| format!("Request failed: {}", body_preview(&body)));
            return Err(SyncClientError::api(status.as_u16(), message));
        }

        let ack: SyncAck = serde_json::from_str(&body).map_err(|e| {
            warn!(
                "Failed to parse sync acknowledgement. Body: {}, Error: {}",
                body_preview(&body),
                e
            );
            SyncClientError::invalid_response(
                status.as_u16(),
                format!("Failed to parse acknowledgement: {}", e),
            )
        })?;

        if !ack.success {
            return Err(SyncClientError::Rejected(ack.message));
        }
        Ok(ack)
    }

    fn should_retry(err: &SyncClientError) -> bool {
        match err {
            SyncClientError::Http(err) => is_retryable_transport_error(err),
            other => other.retry_class().is_retryable(),
        }
    }

    /// Deliver one action message.
    ///
    /// POST {base_url}/sync
    pub async fn send(&self, mode: SyncMode, action: &Action) -> Result<SyncAck> {
        let url = format!("{}/sync", self.base_url);
        let headers = self.headers(&action.id)?;
        let body = serde_json::to_vec(&SyncEnvelope { action: mode, data: action })?;
        let mut attempt = 0usize;

        loop {
            attempt = attempt.saturating_add(1);
            debug!(
                "POST {} ({} message, action_id={}, attempt {}/{})",
                url, mode, action.id, attempt, self.max_attempts
            );

            let result = match self
                .client
                .post(&url)
                .headers(headers.clone())
                .body(body.clone())
                .send()
                .await
            {
                Ok(response) => Self::parse_ack(response).await,
                Err(err) => Err(SyncClientError::Http(err)),
            };

            match result {
                Ok(ack) => return Ok(ack),
                Err(err) if attempt < self.max_attempts && Self::should_retry(&err) => {
                    let backoff = backoff_with_jitter(attempt);
                    debug!(
                        "Sync retry attempt {}/{} in {:?} (action_id={}): {}",
                        attempt + 1,
                        self.max_attempts,
                        backoff,
                        action.id,
                        err
                    );
                    sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl ActionSyncer for ActionSyncClient {
    async fn send(&self, mode: SyncMode, action: &Action) -> kds_core::Result<SyncAck> {
        ActionSyncClient::send(self, mode, action)
            .await
            .map_err(HistoryError::from)
    }
}
