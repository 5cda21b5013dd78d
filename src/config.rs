//! Configuration loading and validation.
//!
//! Settings come from an optional `slowwatch.toml` with per-section defaults,
//! then command-line overrides are layered on top. All sections use
//! `#[serde(default)]` so a minimal or empty config file is valid.
//!
//! The resulting [`Config`] is built once at startup and handed to each
//! component by reference; nothing reads ambient global state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::entry::segmenter::BoundaryPolicy;

/// Default location of the MySQL slow query log.
pub const DEFAULT_SLOW_LOG_PATH: &str = "/var/log/mysql/mysql-slow.log";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Webhook target and delivery policy.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Slow log location and tailing behavior.
    #[serde(default)]
    pub source: SourceConfig,

    /// Alert threshold.
    #[serde(default)]
    pub alert: AlertConfig,

    /// Record boundary detection.
    #[serde(default)]
    pub segmenter: SegmenterConfig,

    /// Restart policy for the tailing worker.
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

/// Webhook delivery settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Target URL. Required; any key the endpoint needs is embedded in it.
    #[serde(default)]
    pub url: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per notification, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Slow log source settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Path of the slow query log.
    #[serde(default = "default_slow_log_path")]
    pub path: PathBuf,

    /// Replay content already in the file on the first start.
    #[serde(default)]
    pub from_beginning: bool,

    /// Reopen the path when the file is rotated or truncated.
    #[serde(default = "default_true")]
    pub follow_rotation: bool,

    /// Wait between reads when no new data is available, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_slow_log_path(),
            from_beginning: false,
            follow_rotation: true,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Alert decision settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertConfig {
    /// Queries at or above this duration (seconds) trigger a notification.
    #[serde(default = "default_threshold_secs")]
    pub threshold_secs: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold_secs: default_threshold_secs(),
        }
    }
}

/// Entry segmentation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmenterConfig {
    /// The one boundary policy applied to the stream.
    #[serde(default)]
    pub boundary: BoundaryPolicy,

    /// Lines kept per entry; further lines are discarded with a warning.
    #[serde(default = "default_max_lines_per_entry")]
    pub max_lines_per_entry: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            boundary: BoundaryPolicy::default(),
            max_lines_per_entry: default_max_lines_per_entry(),
        }
    }
}

/// Worker restart settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorConfig {
    /// Pause before restarting a failed worker, in milliseconds.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,

    /// Replay the whole file after a restart instead of starting at its end.
    #[serde(default)]
    pub restart_from_beginning: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_delay_ms: default_restart_delay_ms(),
            restart_from_beginning: false,
        }
    }
}

/// Values given on the command line. `None`/`false` leaves the file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--webhook-url`.
    pub webhook_url: Option<String>,
    /// `--slow-log-file`.
    pub slow_log_file: Option<PathBuf>,
    /// `--threshold`.
    pub threshold_secs: Option<f64>,
    /// `--from-beginning`.
    pub from_beginning: bool,
    /// `--boundary`.
    pub boundary: Option<BoundaryPolicy>,
}

/// Configuration problems detected before the pipeline starts.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    /// No webhook URL was supplied.
    #[error("webhook URL must be set")]
    MissingWebhookUrl,
    /// The webhook URL could not be parsed or is not http(s).
    #[error("invalid webhook URL {url:?}: {reason}")]
    InvalidWebhookUrl {
        /// The rejected value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Threshold is negative, NaN, or infinite.
    #[error("slow query threshold must be a finite, non-negative number of seconds, got {0}")]
    InvalidThreshold(f64),
    /// A limit that must be positive was zero.
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),
}

impl Config {
    /// Layer command-line values over the loaded configuration.
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.webhook_url {
            self.webhook.url = Some(url);
        }
        if let Some(path) = overrides.slow_log_file {
            self.source.path = path;
        }
        if let Some(threshold) = overrides.threshold_secs {
            self.alert.threshold_secs = threshold;
        }
        if overrides.from_beginning {
            self.source.from_beginning = true;
        }
        if let Some(boundary) = overrides.boundary {
            self.segmenter.boundary = boundary;
        }
    }

    /// Check the configuration before anything is started.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.webhook_url()?;

        let threshold = self.alert.threshold_secs;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        if self.segmenter.max_lines_per_entry == 0 {
            return Err(ConfigError::ZeroLimit("segmenter.max_lines_per_entry"));
        }
        if self.webhook.max_attempts == 0 {
            return Err(ConfigError::ZeroLimit("webhook.max_attempts"));
        }
        if self.source.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroLimit("source.poll_interval_ms"));
        }
        Ok(())
    }

    /// The validated webhook URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingWebhookUrl`] when unset or blank and
    /// [`ConfigError::InvalidWebhookUrl`] when it is not an http(s) URL.
    pub fn webhook_url(&self) -> Result<&str, ConfigError> {
        let raw = match self.webhook.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => return Err(ConfigError::MissingWebhookUrl),
        };

        let parsed = url::Url::parse(raw).map_err(|e| ConfigError::InvalidWebhookUrl {
            url: raw.to_owned(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidWebhookUrl {
                url: raw.to_owned(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        Ok(raw)
    }

    /// Webhook request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook.timeout_secs)
    }

    /// Delay between webhook attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.webhook.retry_delay_ms)
    }

    /// Wait between reads when the log has no new data.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.source.poll_interval_ms)
    }

    /// Pause before a worker restart.
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.supervisor.restart_delay_ms)
    }
}

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains invalid TOML,
/// including unknown keys or an unknown boundary policy.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

/// Parse configuration from TOML text.
///
/// # Errors
///
/// Returns an error if the text is not a valid configuration document.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let config: Config = toml::from_str(contents).context("invalid slowwatch configuration")?;
    Ok(config)
}

// Default value functions for serde

fn default_timeout_secs() -> u64 {
    10
}
fn default_max_attempts() -> u32 {
    1
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_slow_log_path() -> PathBuf {
    PathBuf::from(DEFAULT_SLOW_LOG_PATH)
}
fn default_true() -> bool {
    true
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_threshold_secs() -> f64 {
    0.5
}
fn default_max_lines_per_entry() -> usize {
    512
}
fn default_restart_delay_ms() -> u64 {
    1000
}
