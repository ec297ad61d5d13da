//! Configuration for the upload orchestrator.
//!
//! Poll interval and retry counts are deliberately configuration, not
//! hard-coded; the defaults here are conservative values suitable for a
//! browser-like client talking to a rate-limited storage endpoint.

use std::env;
use std::time::Duration;

const DEFAULT_MAX_BATCH_SIZE: usize = 50;
const DEFAULT_MAX_CONCURRENT_TRANSFERS: usize = 4;
const DEFAULT_TRANSFER_RETRIES: u32 = 2;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct UploaderConfig {
    /// Maximum number of files in one batch; larger manifests are rejected
    /// before any network call.
    pub max_batch_size: usize,
    /// Upper bound on simultaneously in-flight transfers (not CPU threads).
    pub max_concurrent_transfers: usize,
    /// Extra attempts for network-categorized transfer failures.
    pub transfer_retries: u32,
    /// Fixed backoff between transfer retry attempts.
    pub retry_backoff_ms: u64,
    /// Processing status poll interval.
    pub poll_interval_ms: u64,
    /// Optional overall horizon for processing observation; on expiry
    /// remaining files report `processing_timeout`.
    pub processing_horizon_secs: Option<u64>,
    /// Bounded timeout for resolver/confirm/status requests.
    pub request_timeout_secs: u64,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_concurrent_transfers: DEFAULT_MAX_CONCURRENT_TRANSFERS,
            transfer_retries: DEFAULT_TRANSFER_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            processing_horizon_secs: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl UploaderConfig {
    /// Build from environment, falling back to defaults for anything unset or
    /// unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_batch_size: env_parse("CASEBOOK_MAX_BATCH_SIZE", defaults.max_batch_size),
            max_concurrent_transfers: env_parse(
                "CASEBOOK_MAX_CONCURRENT_TRANSFERS",
                defaults.max_concurrent_transfers,
            ),
            transfer_retries: env_parse("CASEBOOK_TRANSFER_RETRIES", defaults.transfer_retries),
            retry_backoff_ms: env_parse("CASEBOOK_RETRY_BACKOFF_MS", defaults.retry_backoff_ms),
            poll_interval_ms: env_parse("CASEBOOK_POLL_INTERVAL_MS", defaults.poll_interval_ms),
            processing_horizon_secs: env::var("CASEBOOK_PROCESSING_HORIZON_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
            request_timeout_secs: env_parse(
                "CASEBOOK_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
        }
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn processing_horizon(&self) -> Option<Duration> {
        self.processing_horizon_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
