//! Markdown webhook notifier.
//!
//! Posts `{"msgtype":"markdown","markdown":{"content":...}}` to the configured
//! URL. Attempts are bounded; the default is a single attempt.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use super::{Notifier, NotifyError};
use crate::config::Config;

const MAX_ERROR_BODY_CHARS: usize = 256;

/// Webhook request body.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    /// Always `"markdown"`.
    pub msgtype: &'static str,
    /// Message body.
    pub markdown: MarkdownBody<'a>,
}

/// The `markdown` object of a [`WebhookPayload`].
#[derive(Debug, Serialize)]
pub struct MarkdownBody<'a> {
    /// Rendered alert text.
    pub content: &'a str,
}

/// Wrap rendered alert text in the webhook envelope.
pub fn build_payload(content: &str) -> WebhookPayload<'_> {
    WebhookPayload {
        msgtype: "markdown",
        markdown: MarkdownBody { content },
    }
}

/// [`Notifier`] that POSTs JSON to a webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
    max_attempts: u32,
    retry_delay: Duration,
}

impl WebhookNotifier {
    /// Create a notifier with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(url, client, max_attempts, retry_delay))
    }

    /// Create a notifier around an already configured HTTP client.
    pub fn with_client(
        url: impl Into<String>,
        client: reqwest::Client,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            url: url.into(),
            client,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    /// Create a notifier from the `[webhook]` section.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is missing or invalid, or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let url = config.webhook_url()?;
        let notifier = Self::new(
            url,
            config.request_timeout(),
            config.webhook.max_attempts,
            config.retry_delay(),
        )?;
        Ok(notifier)
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post_once(&self, content: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&build_payload(content))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::HttpStatus {
            status: status.as_u16(),
            body: shorten(&body),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, content: &str) -> Result<(), NotifyError> {
        let mut attempt: u32 = 1;
        loop {
            match self.post_once(content).await {
                Ok(()) => {
                    debug!(attempt, "webhook delivered");
                    return Ok(());
                }
                Err(e) if attempt < self.max_attempts => {
                    warn!(attempt, max_attempts = self.max_attempts, error = %e, "webhook attempt failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn shorten(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened: String = collapsed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{shortened}...")
    } else {
        collapsed
    }
}
