//! The tailing worker: line source → segmenter → parser → alerter.
//!
//! Lines are handled strictly in arrival order, one at a time. Notification
//! dispatch happens inline, so a slow webhook holds up reading for at most one
//! bounded delivery.

use tokio::sync::watch;
use tracing::{debug, info};

use crate::alert::{AlertOutcome, Alerter};
use crate::entry::parser::parse_entry;
use crate::entry::segmenter::Segmenter;
use crate::entry::PendingEntry;
use crate::tail::{LineSource, RawLine, SourceError};

/// Running counters for one pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Lines fed in (blank lines included).
    pub lines: u64,
    /// Records that produced a parsed entry.
    pub entries: u64,
    /// Records dropped for lacking a timing line.
    pub unparsed: u64,
    /// Alerts delivered.
    pub alerts_sent: u64,
    /// Alerts that failed to deliver.
    pub alerts_failed: u64,
}

/// Segmentation state plus the alerter it feeds.
///
/// Survives worker restarts: the supervisor gets it back from each exiting
/// worker and passes it to the next one.
pub struct Pipeline {
    segmenter: Segmenter,
    alerter: Alerter,
    stats: PipelineStats,
}

impl Pipeline {
    /// Create a pipeline.
    pub fn new(segmenter: Segmenter, alerter: Alerter) -> Self {
        Self {
            segmenter,
            alerter,
            stats: PipelineStats::default(),
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// The segmenter, e.g. to inspect the pending record.
    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    /// Feed one line, processing any record it completes.
    pub async fn handle_line(&mut self, line: RawLine) {
        self.stats.lines = self.stats.lines.saturating_add(1);
        if let Some(entry) = self.segmenter.push(line) {
            self.process(entry).await;
        }
    }

    /// Process the pending record as-is, if there is one.
    pub async fn flush(&mut self) {
        if let Some(entry) = self.segmenter.flush() {
            debug!(lines = entry.len(), "flushing pending slow log entry");
            self.process(entry).await;
        }
    }

    async fn process(&mut self, entry: PendingEntry) {
        let offset = entry.start_offset();
        let Some(parsed) = parse_entry(entry) else {
            debug!(?offset, "slow log entry without timing line, skipping");
            self.stats.unparsed = self.stats.unparsed.saturating_add(1);
            return;
        };
        self.stats.entries = self.stats.entries.saturating_add(1);

        match self.alerter.evaluate(&parsed).await {
            AlertOutcome::Sent => {
                self.stats.alerts_sent = self.stats.alerts_sent.saturating_add(1);
            }
            AlertOutcome::Failed => {
                self.stats.alerts_failed = self.stats.alerts_failed.saturating_add(1);
            }
            AlertOutcome::BelowThreshold => {}
        }
    }
}

/// Why a worker stopped.
#[derive(Debug)]
pub enum WorkerExit {
    /// Shutdown was requested.
    Shutdown,
    /// The line source failed; the supervisor should restart.
    Failed(SourceError),
}

/// A finished worker's result, returning pipeline ownership to the caller.
pub struct WorkerOutcome {
    /// The pipeline, with its pending record already flushed.
    pub pipeline: Pipeline,
    /// Why the worker stopped.
    pub exit: WorkerExit,
}

/// Pump lines from `source` through `pipeline` until shutdown or failure.
///
/// The pending record is flushed on either exit.
pub async fn run_worker(
    mut source: LineSource,
    mut pipeline: Pipeline,
    mut shutdown: watch::Receiver<bool>,
) -> WorkerOutcome {
    info!(
        path = %source.path().display(),
        offset = source.offset(),
        boundary = ?pipeline.segmenter().policy(),
        "slow log worker started"
    );

    let exit = loop {
        match source.next_line(&mut shutdown).await {
            Ok(Some(line)) => pipeline.handle_line(line).await,
            Ok(None) => break WorkerExit::Shutdown,
            Err(e) => break WorkerExit::Failed(e),
        }
    };

    pipeline.flush().await;
    info!(offset = source.offset(), stats = ?pipeline.stats(), "slow log worker stopped");

    WorkerOutcome { pipeline, exit }
}
