//! Slow log records: segmentation of the line stream and field extraction.
//!
//! The [`segmenter::Segmenter`] owns the single live [`PendingEntry`] and
//! hands it over by value when a boundary closes it. The
//! [`parser::parse_entry`] function consumes that entry and produces an
//! independent [`ParsedEntry`].

pub mod parser;
pub mod segmenter;

use chrono::NaiveDateTime;

use crate::tail::RawLine;

/// Lines of one not-yet-complete log record, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingEntry {
    lines: Vec<RawLine>,
}

impl PendingEntry {
    /// An empty entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an entry from plain text lines (offsets are zero).
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(RawLine::new).collect(),
        }
    }

    /// Append a line.
    pub fn push(&mut self, line: RawLine) {
        self.lines.push(line);
    }

    /// Number of lines held.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether no line has been added yet.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterate over the line texts.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|line| line.text.as_str())
    }

    /// Byte offset of the first line, if any.
    pub fn start_offset(&self) -> Option<u64> {
        self.lines.first().map(|line| line.offset)
    }
}

/// Fields extracted from one complete slow log record.
///
/// Fields without a matching source line keep their default (0 or empty).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedEntry {
    /// `# Time:` value, when present and well formed.
    pub logged_at: Option<NaiveDateTime>,
    /// Execution time in seconds.
    pub query_time_secs: f64,
    /// Lock wait time in seconds.
    pub lock_time_secs: f64,
    /// Rows returned to the client.
    pub rows_sent: u64,
    /// Rows read by the server.
    pub rows_examined: u64,
    /// Default schema of the session.
    pub database: String,
    /// Account user name.
    pub user: String,
    /// Client host name or address.
    pub host: String,
    /// The statement text.
    pub sql_text: String,
}

impl ParsedEntry {
    /// The fixed record used by the webhook dry run.
    pub fn sample() -> Self {
        Self {
            logged_at: None,
            query_time_secs: 0.5,
            lock_time_secs: 0.5,
            rows_sent: 1,
            rows_examined: 10_000,
            database: "database".to_owned(),
            user: "user".to_owned(),
            host: "localhost".to_owned(),
            sql_text: "select * from table".to_owned(),
        }
    }
}
