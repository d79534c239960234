use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const CONFIG_FILE_PATH: &str = "taskflow.toml";

const DEFAULT_API_BASE: &str = "http://localhost:8000";
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_MAX_POLL_FAILURES: u32 = 5;
const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskflowConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub http_proxy: String,
    pub https_proxy: String,
    pub poll_interval_ms: u64,
    pub max_poll_failures: u32,
    pub max_backoff_ms: u64,
    pub request_timeout_secs: u64,
    /// Transient-error retries applied by the HTTP middleware to status reads.
    pub status_retries: u32,
    /// Send `DELETE /api/tasks/cancel/{id}` when a running step is cancelled.
    pub cancel_remote_on_abort: bool,
}

fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

impl Default for TaskflowConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            http_proxy: String::new(),
            https_proxy: String::new(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            status_retries: 0,
            cancel_remote_on_abort: false,
        }
    }
}

impl TaskflowConfig {
    /// Loads `taskflow.toml` from the working directory if present, then
    /// applies environment overrides.
    pub fn new() -> Self {
        let mut config = Self::from_file(Path::new(CONFIG_FILE_PATH)).unwrap_or_default();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Reads a config file. Missing or unparsable files yield `None`.
    pub fn from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                log::warn!("Failed to read {}: {}", path.display(), err);
                return None;
            }
        };
        match toml::from_str::<Self>(&content) {
            Ok(config) => {
                log::info!("Loaded task config from {}", path.display());
                Some(config)
            }
            Err(err) => {
                log::warn!("Failed to parse {}: {}", path.display(), err);
                None
            }
        }
    }

    /// Overrides fields from environment-style lookups.
    ///
    /// Numeric values that fail to parse are ignored with a warning.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_base) = lookup("TASKFLOW_API_BASE") {
            self.api_base = api_base;
        }
        if let Some(api_key) = lookup("TASKFLOW_API_KEY") {
            self.api_key = Some(api_key);
        }
        if let Some(http_proxy) = lookup("HTTP_PROXY") {
            self.http_proxy = http_proxy;
        }
        if let Some(https_proxy) = lookup("HTTPS_PROXY") {
            self.https_proxy = https_proxy;
        }
        if let Some(value) = parse_number(&lookup, "TASKFLOW_POLL_INTERVAL_MS") {
            self.poll_interval_ms = value;
        }
        if let Some(value) = parse_number(&lookup, "TASKFLOW_MAX_POLL_FAILURES") {
            self.max_poll_failures = value;
        }
        if let Some(value) = parse_number(&lookup, "TASKFLOW_MAX_BACKOFF_MS") {
            self.max_backoff_ms = value;
        }
        if let Some(value) = parse_number(&lookup, "TASKFLOW_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = value;
        }
        if let Some(value) = parse_number(&lookup, "TASKFLOW_STATUS_RETRIES") {
            self.status_retries = value;
        }
        if let Some(value) = lookup("TASKFLOW_CANCEL_REMOTE") {
            self.cancel_remote_on_abort = parse_bool_env(&value);
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_consecutive_failures: self.max_poll_failures,
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_number<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a number", key, raw);
            None
        }
    }
}

/// Timing policy for the task poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait before every status read, including the first.
    pub interval: Duration,
    /// Consecutive transport failures tolerated before giving up.
    pub max_consecutive_failures: u32,
    /// Upper bound for the backed-off wait after failures.
    pub max_backoff: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        TaskflowConfig::default().poll_config()
    }
}

impl PollConfig {
    /// Wait before the next read given the current run of failures.
    ///
    /// `interval * 2^failures`, capped at `max_backoff` (never below `interval`).
    pub fn delay_after(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return self.interval;
        }
        let factor = 1u32.checked_shl(consecutive_failures.min(16)).unwrap_or(u32::MAX);
        let backed_off = self.interval.saturating_mul(factor);
        backed_off.min(self.max_backoff.max(self.interval))
    }
}
