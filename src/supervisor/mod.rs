//! Supervisor: keeps a tailing worker alive until shutdown.
//!
//! Two states, no terminal one:
//! - [`SupervisorState::Running`]: a worker task is tailing the log.
//! - [`SupervisorState::Restarting`]: the last worker failed or the log could
//!   not be opened; a new worker starts after `restart_delay`.
//!
//! Only the first start honours `source.from_beginning`. Later starts use
//! `supervisor.restart_from_beginning` (default off) so a reopened file is not
//! replayed from scratch. A log that is missing at startup therefore loses
//! `from_beginning`: once it appears it is followed from its end.

pub mod worker;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::alert::{Alerter, Notifier};
use crate::config::Config;
use crate::entry::segmenter::Segmenter;
use crate::tail::{LineSource, SourceOptions};
use worker::{Pipeline, PipelineStats, WorkerExit};

/// Lifecycle state of the tailing worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// A worker is active.
    Running,
    /// No worker is active; one is about to start.
    Restarting,
}

/// Summary returned when the supervisor stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorReport {
    /// Transitions into [`SupervisorState::Restarting`].
    pub restarts: u64,
    /// Counters of the pipeline at exit.
    pub stats: PipelineStats,
}

/// Owns the worker lifecycle.
pub struct Supervisor {
    config: Arc<Config>,
    notifier: Arc<dyn Notifier>,
    state_tx: watch::Sender<SupervisorState>,
}

impl Supervisor {
    /// Create a supervisor for a validated configuration.
    pub fn new(config: Arc<Config>, notifier: Arc<dyn Notifier>) -> Self {
        let (state_tx, _) = watch::channel(SupervisorState::Restarting);
        Self {
            config,
            notifier,
            state_tx,
        }
    }

    /// Current state.
    pub fn state(&self) -> SupervisorState {
        *self.state_tx.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state_tx.subscribe()
    }

    /// Run workers until `shutdown` becomes `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> SupervisorReport {
        let path = self.config.source.path.clone();
        let delay = self.config.restart_delay();
        let mut from_beginning = self.config.source.from_beginning;
        let mut pipeline = self.new_pipeline();
        let mut restarts: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let options = SourceOptions {
                from_beginning,
                follow_rotation: self.config.source.follow_rotation,
                poll_interval: self.config.poll_interval(),
            };
            from_beginning = self.config.supervisor.restart_from_beginning;

            match LineSource::open(&path, options) {
                Ok(source) => {
                    self.state_tx.send_replace(SupervisorState::Running);
                    let handle =
                        tokio::spawn(worker::run_worker(source, pipeline, shutdown.clone()));
                    match handle.await {
                        Ok(outcome) => {
                            pipeline = outcome.pipeline;
                            match outcome.exit {
                                WorkerExit::Shutdown => break,
                                WorkerExit::Failed(e) => {
                                    error!(error = %e, "slow log worker failed");
                                }
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "slow log worker aborted, pending entry lost");
                            pipeline = self.new_pipeline();
                        }
                    }
                }
                Err(e) => error!(error = %e, "cannot open slow log"),
            }

            self.state_tx.send_replace(SupervisorState::Restarting);
            restarts = restarts.saturating_add(1);
            warn!(
                restarts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "restarting slow log worker"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let report = SupervisorReport {
            restarts,
            stats: pipeline.stats(),
        };
        info!(restarts = report.restarts, stats = ?report.stats, "supervisor stopped");
        report
    }

    fn new_pipeline(&self) -> Pipeline {
        Pipeline::new(
            Segmenter::from_config(&self.config.segmenter),
            Alerter::new(self.config.alert.threshold_secs, Arc::clone(&self.notifier)),
        )
    }
}
