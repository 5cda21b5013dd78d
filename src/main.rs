//! Slowwatch CLI entry point.
//!
//! Tails the slow query log and alerts a webhook, or with `--test` sends a
//! single sample alert and exits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tokio::sync::watch;
use tracing::{error, info, warn};

use slowwatch::alert::template::sample_alert;
use slowwatch::alert::webhook::WebhookNotifier;
use slowwatch::alert::Notifier;
use slowwatch::config::{load_config, Config, ConfigError, Overrides};
use slowwatch::entry::segmenter::BoundaryPolicy;
use slowwatch::logging;
use slowwatch::supervisor::Supervisor;

/// Exit status for configuration errors.
const EXIT_CONFIG_ERROR: u8 = 2;

/// Slowwatch: MySQL slow query log alerts over webhook.
#[derive(Parser)]
#[command(name = "slowwatch", version, about)]
struct Cli {
    /// Webhook URL that receives the alerts.
    #[arg(short = 'u', long, alias = "webhookURL")]
    webhook_url: Option<String>,

    /// Path of the MySQL slow query log.
    #[arg(short = 'f', long, alias = "slowLogFile")]
    slow_log_file: Option<PathBuf>,

    /// Slow query threshold in seconds (integer or decimal).
    #[arg(short = 's', long, alias = "slowQueryThreshold")]
    threshold: Option<f64>,

    /// Process the content already in the log before following it.
    #[arg(short = 'b', long)]
    from_beginning: bool,

    /// Send one sample alert and exit.
    #[arg(short = 't', long)]
    test: bool,

    /// Record boundary detection policy.
    #[arg(long, value_enum)]
    boundary: Option<BoundaryPolicy>,

    /// TOML configuration file; command-line flags override it.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Also write JSON logs to this directory (rotated daily).
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let _logging_guard = match &cli.log_dir {
        Some(dir) => Some(logging::init_production(dir)?),
        None => {
            logging::init_cli();
            None
        }
    };

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                error!(error = %format!("{e:#}"), "failed to load configuration");
                return Ok(ExitCode::from(EXIT_CONFIG_ERROR));
            }
        },
        None => Config::default(),
    };
    config.apply_overrides(Overrides {
        webhook_url: cli.webhook_url.clone(),
        slow_log_file: cli.slow_log_file.clone(),
        threshold_secs: cli.threshold,
        from_beginning: cli.from_beginning,
        boundary: cli.boundary,
    });

    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        if matches!(e, ConfigError::MissingWebhookUrl) {
            Cli::command()
                .print_help()
                .context("failed to print usage")?;
        }
        return Ok(ExitCode::from(EXIT_CONFIG_ERROR));
    }

    let notifier = Arc::new(WebhookNotifier::from_config(&config)?);

    if cli.test {
        return Ok(handle_test(notifier.as_ref()).await);
    }

    handle_start(config, notifier).await;
    Ok(ExitCode::SUCCESS)
}

/// Send the sample alert once.
async fn handle_test(notifier: &WebhookNotifier) -> ExitCode {
    info!(webhook_host = %webhook_host(notifier.url()), "sending test webhook request");
    match notifier.notify(&sample_alert()).await {
        Ok(()) => {
            info!("test webhook delivered");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "test webhook failed");
            ExitCode::FAILURE
        }
    }
}

/// Tail the slow log until Ctrl-C.
async fn handle_start(config: Config, notifier: Arc<WebhookNotifier>) {
    info!(
        webhook_host = %webhook_host(notifier.url()),
        slow_log = %config.source.path.display(),
        threshold_secs = config.alert.threshold_secs,
        boundary = ?config.segmenter.boundary,
        from_beginning = config.source.from_beginning,
        "monitoring MySQL slow query log"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received shutdown signal, stopping");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Keep the sender alive so the supervisor is not stopped.
                warn!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        }
    });

    let supervisor = Supervisor::new(Arc::new(config), notifier);
    let report = supervisor.run(shutdown_rx).await;
    info!(
        restarts = report.restarts,
        alerts_sent = report.stats.alerts_sent,
        "slowwatch stopped"
    );
}

/// Host part of the webhook URL; the full URL may embed a key.
fn webhook_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_default()
}
