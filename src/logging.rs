//! `tracing` subscriber setup for the slowwatch binary.
//!
//! Console output on stderr is always on. With `--log-dir`, events are also
//! written as JSON lines to `slowwatch.log.<date>`, one file per day.
//! `RUST_LOG` filters both; without it only `info` and above are shown.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// File name prefix of the daily JSON log.
const LOG_FILE_PREFIX: &str = "slowwatch.log";

/// Keeps the background log writer running; hold it until `main` returns.
pub struct LoggingGuard {
    _writer: WorkerGuard,
}

/// Log to stderr and to daily JSON files under `logs_dir`.
///
/// # Errors
///
/// Fails when `logs_dir` cannot be created or a subscriber is already set.
pub fn init_production(logs_dir: &Path) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create log directory {}", logs_dir.display()))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(default_filter())
        .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("log subscriber already installed")?;

    Ok(LoggingGuard { _writer: guard })
}

/// Log to stderr only. Later calls leave the first subscriber in place.
pub fn init_cli() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
