//! Field extraction for slow log records.
//!
//! Each extractor is a pure function over the record's lines. Extractors scan
//! independently and keep the first match; a missing or malformed field only
//! leaves that field at its default.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime};
use regex::Regex;

use super::{ParsedEntry, PendingEntry};

static TIME_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s*Time:\s*(.*?)\s*$").expect("time header pattern is valid"));

static USER_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#\s*User@Host:\s*([^\[\s]*)(?:\[[^\]]*\])?\s*@\s*([^\s\[]*)\s*(?:\[([^\]]*)\])?")
        .expect("user@host pattern is valid")
});

static QUERY_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Query_time:\s*(\d+(?:\.\d+)?)").expect("query time pattern is valid")
});
static LOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Lock_time:\s*(\d+(?:\.\d+)?)").expect("lock time pattern is valid")
});
static ROWS_SENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Rows_sent:\s*(\d+)").expect("rows sent pattern is valid"));
static ROWS_EXAMINED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Rows_examined:\s*(\d+)").expect("rows examined pattern is valid")
});

static SCHEMA_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#.*?\b(?:Schema|Database):[ \t]*([^\s:]+)(?:\s|$)")
        .expect("schema pattern is valid")
});
static USE_STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*use\s+`?([^`;\s]+)`?\s*;").expect("use pattern is valid")
});

static STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:SELECT|INSERT|UPDATE|DELETE|REPLACE|WITH|CREATE|ALTER|DROP|TRUNCATE|CALL|SHOW|EXPLAIN|LOAD|MERGE)\b",
    )
    .expect("statement pattern is valid")
});

static SESSION_SETUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:use\s+\S+\s*;|SET\s+[^;]*\btimestamp\s*=)")
        .expect("session setup pattern is valid")
});

/// Duration and row counters from the `# Query_time:` line.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timing {
    /// `Query_time`, seconds.
    pub query_time_secs: f64,
    /// `Lock_time`, seconds.
    pub lock_time_secs: f64,
    /// `Rows_sent`.
    pub rows_sent: u64,
    /// `Rows_examined`.
    pub rows_examined: u64,
}

/// Account and client from the `# User@Host:` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// User name (the part before `[`).
    pub user: String,
    /// Host name, or the bracketed address when no name was logged.
    pub host: String,
}

/// Whether the line is a `# Time:` header.
pub fn is_time_header(line: &str) -> bool {
    TIME_HEADER.is_match(line)
}

/// Whether the line is a `# User@Host:` header.
pub fn is_user_host(line: &str) -> bool {
    line.trim_start_matches('#').trim_start().starts_with("User@Host:")
}

/// Whether the line begins with one of the recognised SQL verbs.
pub fn is_statement_start(line: &str) -> bool {
    STATEMENT.is_match(line)
}

/// Whether the line is a `use db;` or `SET timestamp=...;` line the server
/// writes ahead of the statement.
pub fn is_session_setup(line: &str) -> bool {
    SESSION_SETUP.is_match(line)
}

/// Whether the line carries the `Query_time:` counters.
pub fn is_timing_line(line: &str) -> bool {
    line.contains("Query_time:")
}

/// Turn a complete record into a [`ParsedEntry`].
///
/// Returns `None` when the record has no timing line (banner text, stray
/// fragments); every other missing field falls back to its default.
pub fn parse_entry(entry: PendingEntry) -> Option<ParsedEntry> {
    let lines: Vec<&str> = entry.texts().collect();

    let timing = extract_timing(&lines)?;
    let identity = extract_identity(&lines).unwrap_or_default();

    Some(ParsedEntry {
        logged_at: extract_logged_at(&lines),
        query_time_secs: timing.query_time_secs,
        lock_time_secs: timing.lock_time_secs,
        rows_sent: timing.rows_sent,
        rows_examined: timing.rows_examined,
        database: extract_schema(&lines).unwrap_or_default(),
        user: identity.user,
        host: identity.host,
        sql_text: extract_statement(&lines).unwrap_or_default(),
    })
}

/// Counters from the first line carrying `Query_time:`.
///
/// Each value is matched on its own; one malformed value reads as zero
/// without affecting the others.
pub fn extract_timing(lines: &[&str]) -> Option<Timing> {
    let line = lines.iter().find(|line| is_timing_line(line))?;

    Some(Timing {
        query_time_secs: capture(&QUERY_TIME, line).unwrap_or_default(),
        lock_time_secs: capture(&LOCK_TIME, line).unwrap_or_default(),
        rows_sent: capture(&ROWS_SENT, line).unwrap_or_default(),
        rows_examined: capture(&ROWS_EXAMINED, line).unwrap_or_default(),
    })
}

/// User and host from the first `# User@Host:` line.
pub fn extract_identity(lines: &[&str]) -> Option<Identity> {
    lines.iter().find_map(|line| {
        let caps = USER_HOST.captures(line)?;
        let user = caps.get(1).map_or("", |m| m.as_str());
        let name = caps.get(2).map_or("", |m| m.as_str());
        let addr = caps.get(3).map_or("", |m| m.as_str().trim());
        let host = if name.is_empty() { addr } else { name };
        Some(Identity {
            user: user.to_owned(),
            host: host.to_owned(),
        })
    })
}

/// Schema from the first `# Schema:` / `Database:` header or `use db;` line.
pub fn extract_schema(lines: &[&str]) -> Option<String> {
    lines.iter().find_map(|line| {
        SCHEMA_HEADER
            .captures(line)
            .or_else(|| USE_STATEMENT.captures(line))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_owned())
    })
}

/// The first statement, extended over continuation lines until one ends in `;`.
///
/// Lines opening with a known SQL verb win. Otherwise the first line that is
/// neither a `#` header nor session setup is taken (`COMMIT;`, `BEGIN;`).
pub fn extract_statement(lines: &[&str]) -> Option<String> {
    let start = lines
        .iter()
        .position(|line| is_statement_start(line))
        .or_else(|| {
            lines.iter().position(|line| {
                !line.trim_start().starts_with('#') && !is_session_setup(line)
            })
        })?;

    let mut parts: Vec<&str> = Vec::new();
    for line in lines.iter().skip(start) {
        let text = line.trim_end();
        if !parts.is_empty() && text.starts_with('#') {
            break;
        }
        parts.push(text);
        if text.ends_with(';') {
            break;
        }
    }
    Some(parts.join("\n"))
}

/// Timestamp from the first `# Time:` header, as written (no zone conversion).
pub fn extract_logged_at(lines: &[&str]) -> Option<NaiveDateTime> {
    let raw = lines.iter().find_map(|line| {
        TIME_HEADER
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    })?;
    parse_logged_at(raw)
}

fn parse_logged_at(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%y%m%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

fn capture<T: std::str::FromStr>(pattern: &Regex, line: &str) -> Option<T> {
    pattern
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
