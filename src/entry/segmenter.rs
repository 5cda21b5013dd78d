//! Groups the flat line stream into slow log records.
//!
//! Exactly one [`BoundaryPolicy`] is applied to a stream. Blank lines are
//! dropped before either policy sees them.

use serde::Deserialize;
use tracing::{debug, warn};

use super::parser::{
    is_session_setup, is_statement_start, is_time_header, is_timing_line, is_user_host,
};
use super::PendingEntry;
use crate::config::SegmenterConfig;
use crate::tail::RawLine;

/// How record boundaries are recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryPolicy {
    /// A `# Time:` or `# User@Host:` header closes the previous record and
    /// opens a new one. Whatever is open when the stream stops is flushed.
    #[default]
    StartMarker,
    /// Once the timing line or a statement has been seen, the first line
    /// ending in `;` that is not session setup closes the record. A new
    /// header arriving after a timing line closes it as well. For logs
    /// without reliable header lines.
    EndMarker,
}

/// Accumulates lines into the single live [`PendingEntry`].
#[derive(Debug)]
pub struct Segmenter {
    policy: BoundaryPolicy,
    max_lines: usize,
    pending: PendingEntry,
    /// End-marker policy: a statement line has been seen in `pending`.
    in_statement: bool,
    /// End-marker policy: the `Query_time:` line has been seen in `pending`.
    seen_timing: bool,
    /// Lines discarded from `pending` because it was full.
    dropped: usize,
}

impl Segmenter {
    /// Create a segmenter. `max_lines` is clamped to at least one.
    pub fn new(policy: BoundaryPolicy, max_lines: usize) -> Self {
        Self {
            policy,
            max_lines: max_lines.max(1),
            pending: PendingEntry::new(),
            in_statement: false,
            seen_timing: false,
            dropped: 0,
        }
    }

    /// Create a segmenter from the `[segmenter]` section.
    pub fn from_config(config: &SegmenterConfig) -> Self {
        Self::new(config.boundary, config.max_lines_per_entry)
    }

    /// Boundary policy in effect.
    pub fn policy(&self) -> BoundaryPolicy {
        self.policy
    }

    /// The record currently being accumulated.
    pub fn pending(&self) -> &PendingEntry {
        &self.pending
    }

    /// Feed one line; returns the record it closed, if any.
    pub fn push(&mut self, line: RawLine) -> Option<PendingEntry> {
        if line.text.trim().is_empty() {
            return None;
        }

        match self.policy {
            BoundaryPolicy::StartMarker => {
                let closed = if self.opens_record(&line.text) {
                    self.take()
                } else {
                    None
                };
                self.append(line);
                closed
            }
            BoundaryPolicy::EndMarker => {
                // A header after a complete timing line means the previous
                // record never showed a terminator.
                if self.seen_timing && self.opens_record(&line.text) {
                    let closed = self.take();
                    self.track(&line.text);
                    self.append(line);
                    return closed;
                }

                self.track(&line.text);
                let closes = (self.in_statement || self.seen_timing)
                    && line.text.trim_end().ends_with(';')
                    && !is_session_setup(&line.text);
                self.append(line);
                if closes {
                    self.take()
                } else {
                    None
                }
            }
        }
    }

    /// Hand over whatever is pending, e.g. when the stream stops.
    pub fn flush(&mut self) -> Option<PendingEntry> {
        self.take()
    }

    /// Discard the pending record.
    pub fn reset(&mut self) {
        if !self.pending.is_empty() {
            debug!(lines = self.pending.len(), "discarding pending slow log entry");
        }
        self.pending = PendingEntry::new();
        self.in_statement = false;
        self.seen_timing = false;
        self.dropped = 0;
    }

    /// A `# Time:` line always starts a record. `# User@Host:` starts one
    /// unless the pending record is only the `# Time:` header it belongs to.
    fn opens_record(&self, text: &str) -> bool {
        if is_time_header(text) {
            return true;
        }
        is_user_host(text) && self.pending.texts().any(|t| !is_time_header(t))
    }

    fn track(&mut self, text: &str) {
        if is_timing_line(text) {
            self.seen_timing = true;
        } else if is_statement_start(text) {
            self.in_statement = true;
        }
    }

    fn append(&mut self, line: RawLine) {
        if self.pending.len() >= self.max_lines {
            if self.dropped == 0 {
                warn!(
                    max_lines = self.max_lines,
                    offset = line.offset,
                    "slow log entry exceeds line limit, discarding further lines"
                );
            }
            self.dropped = self.dropped.saturating_add(1);
            return;
        }
        self.pending.push(line);
    }

    fn take(&mut self) -> Option<PendingEntry> {
        if self.dropped > 0 {
            debug!(dropped = self.dropped, "closed truncated slow log entry");
        }
        self.in_statement = false;
        self.seen_timing = false;
        self.dropped = 0;
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.pending))
    }
}
