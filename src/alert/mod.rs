//! Threshold evaluation and alert dispatch.
//!
//! [`Alerter`] decides whether a [`ParsedEntry`] is slow and, if so, renders
//! it with [`template::render_alert`] and hands the text to a [`Notifier`].
//! Dispatch failures are logged and absorbed; they never stop the pipeline.

pub mod template;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::entry::ParsedEntry;

/// Errors produced while delivering a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Transport failure (connect, timeout, TLS).
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The endpoint answered with a non-2xx status.
    #[error("webhook returned HTTP {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, shortened.
        body: String,
    },
    /// Any other delivery failure.
    #[error("notification failed: {0}")]
    Other(String),
}

/// Outbound notification capability.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one rendered alert.
    async fn notify(&self, content: &str) -> Result<(), NotifyError>;
}

/// Whether `entry` is at or above `threshold_secs`.
pub fn is_slow(entry: &ParsedEntry, threshold_secs: f64) -> bool {
    entry.query_time_secs >= threshold_secs
}

/// What [`Alerter::evaluate`] did with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Below the threshold; nothing sent.
    BelowThreshold,
    /// Notification delivered.
    Sent,
    /// Notification attempted and failed.
    Failed,
}

/// Applies the threshold and dispatches alerts.
#[derive(Clone)]
pub struct Alerter {
    threshold_secs: f64,
    notifier: Arc<dyn Notifier>,
}

impl Alerter {
    /// Create an alerter.
    pub fn new(threshold_secs: f64, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            threshold_secs,
            notifier,
        }
    }

    /// Send exactly one notification iff the entry is slow.
    pub async fn evaluate(&self, entry: &ParsedEntry) -> AlertOutcome {
        if !is_slow(entry, self.threshold_secs) {
            debug!(
                query_time_secs = entry.query_time_secs,
                threshold_secs = self.threshold_secs,
                "query below threshold"
            );
            return AlertOutcome::BelowThreshold;
        }

        let content = template::render_alert(entry);
        match self.notifier.notify(&content).await {
            Ok(()) => {
                info!(
                    query_time_secs = entry.query_time_secs,
                    database = %entry.database,
                    user = %entry.user,
                    "slow query alert sent"
                );
                AlertOutcome::Sent
            }
            Err(e) => {
                warn!(
                    error = %e,
                    query_time_secs = entry.query_time_secs,
                    "failed to send slow query alert"
                );
                AlertOutcome::Failed
            }
        }
    }
}
