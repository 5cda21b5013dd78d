//! Tests for record segmentation.

use slowwatch::entry::parser::parse_entry;
use slowwatch::entry::segmenter::{BoundaryPolicy, Segmenter};
use slowwatch::entry::{ParsedEntry, PendingEntry};

use crate::support::{raw_lines, ORDERS_ENTRY};

fn feed(segmenter: &mut Segmenter, lines: &[&str]) -> Vec<PendingEntry> {
    let mut closed: Vec<PendingEntry> = raw_lines(lines)
        .into_iter()
        .filter_map(|line| segmenter.push(line))
        .collect();
    closed.extend(segmenter.flush());
    closed
}

fn texts(entry: &PendingEntry) -> Vec<&str> {
    entry.texts().collect()
}

const TWO_RECORDS: [&str; 11] = [
    "# Time: 2024-01-01T10:00:00",
    "# User@Host: app[app] @ 10.0.0.5",
    "# Query_time: 1.5  Lock_time: 0.1  Rows_sent: 3  Rows_examined: 500",
    "# Schema: orders",
    "SELECT * FROM orders;",
    "# Time: 2024-01-01T10:00:05",
    "# User@Host: batch[batch] @ 10.0.0.9",
    "# Query_time: 0.2  Lock_time: 0  Rows_sent: 0  Rows_examined: 12",
    "use billing;",
    "SET timestamp=1704103205;",
    "UPDATE invoices SET paid = 1 WHERE id = 7;",
];

#[test]
fn start_marker_splits_on_time_header() {
    let mut segmenter = Segmenter::new(BoundaryPolicy::StartMarker, 100);
    let entries = feed(&mut segmenter, &TWO_RECORDS);

    assert_eq!(entries.len(), 2);
    assert_eq!(texts(&entries[0]), TWO_RECORDS[..5].to_vec());
    assert_eq!(texts(&entries[1]), TWO_RECORDS[5..].to_vec());
}

#[test]
fn start_marker_does_not_emit_until_next_header() {
    let mut segmenter = Segmenter::new(BoundaryPolicy::StartMarker, 100);
    for line in raw_lines(&ORDERS_ENTRY) {
        assert!(segmenter.push(line).is_none());
    }
    assert_eq!(segmenter.pending().len(), 5);
}

#[test]
fn start_marker_flushes_partial_record_at_stream_end() {
    let mut segmenter = Segmenter::new(BoundaryPolicy::StartMarker, 100);
    let entries = feed(&mut segmenter, &ORDERS_ENTRY[..3]);

    assert_eq!(entries.len(), 1);
    let parsed = parse_entry(entries[0].clone()).expect("timing line present");
    assert!((parsed.query_time_secs - 1.5).abs() < f64::EPSILON);
    assert_eq!(parsed.sql_text, "");
    assert!(segmenter.pending().is_empty());
}

#[test]
fn user_host_opens_record_when_time_header_is_omitted() {
    let lines = [
        "# Time: 2024-01-01T10:00:00",
        "# User@Host: a[a] @ h1",
        "# Query_time: 2.0  Lock_time: 0  Rows_sent: 1  Rows_examined: 1",
        "SELECT 1;",
        "# User@Host: b[b] @ h2",
        "# Query_time: 3.0  Lock_time: 0  Rows_sent: 1  Rows_examined: 1",
        "SELECT 2;",
    ];
    let mut segmenter = Segmenter::new(BoundaryPolicy::StartMarker, 100);
    let entries = feed(&mut segmenter, &lines);

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].len(), 4);
    assert_eq!(texts(&entries[1])[0], "# User@Host: b[b] @ h2");
}

#[test]
fn user_host_after_time_header_stays_in_same_record() {
    let mut segmenter = Segmenter::new(BoundaryPolicy::StartMarker, 100);
    let entries = feed(&mut segmenter, &ORDERS_ENTRY);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].len(), 5);
}

#[test]
fn blank_lines_are_ignored() {
    let lines = [
        "",
        "# Time: 2024-01-01T10:00:00",
        "   ",
        "# User@Host: app[app] @ 10.0.0.5",
        "",
        "# Query_time: 1.5  Lock_time: 0.1  Rows_sent: 3  Rows_examined: 500",
        "SELECT 1;",
        "",
    ];
    let mut segmenter = Segmenter::new(BoundaryPolicy::StartMarker, 100);
    let entries = feed(&mut segmenter, &lines);

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].len(), 4);
    assert!(entries[0].texts().all(|t| !t.trim().is_empty()));
}

#[test]
fn end_marker_closes_on_terminated_statement() {
    let mut segmenter = Segmenter::new(BoundaryPolicy::EndMarker, 100);

    let mut closed = Vec::new();
    for line in raw_lines(&TWO_RECORDS) {
        if let Some(entry) = segmenter.push(line) {
            closed.push(entry);
        }
    }

    assert_eq!(closed.len(), 2);
    assert_eq!(texts(&closed[0]), TWO_RECORDS[..5].to_vec());
    // `use billing;` and `SET timestamp=...;` precede the statement and do not close.
    assert_eq!(texts(&closed[1]), TWO_RECORDS[5..].to_vec());
    assert!(segmenter.pending().is_empty());
}

#[test]
fn end_marker_waits_for_multi_line_statement_terminator() {
    let lines = [
        "# Query_time: 4.0  Lock_time: 0  Rows_sent: 1  Rows_examined: 9",
        "SELECT id",
        "  FROM users",
        "  WHERE active = 1;",
    ];
    let mut segmenter = Segmenter::new(BoundaryPolicy::EndMarker, 100);
    let mut raw = raw_lines(&lines).into_iter();

    for line in raw.by_ref().take(3) {
        assert!(segmenter.push(line).is_none());
    }
    let entry = segmenter
        .push(raw.next().expect("last line"))
        .expect("terminator closes the entry");
    assert_eq!(entry.len(), 4);
}

#[test]
fn line_cap_discards_overflow_but_keeps_header() {
    let mut lines = vec!["# Time: 2024-01-01T10:00:00"];
    lines.extend_from_slice(&ORDERS_ENTRY[1..3]);
    lines.extend(std::iter::repeat_n("-- filler", 10));

    let mut segmenter = Segmenter::new(BoundaryPolicy::StartMarker, 4);
    let entries = feed(&mut segmenter, &lines);

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].len(), 4);
    let parsed = parse_entry(entries[0].clone()).expect("timing survives the cap");
    assert_eq!(parsed.rows_examined, 500);
}

#[test]
fn reset_discards_pending_record() {
    let mut segmenter = Segmenter::new(BoundaryPolicy::StartMarker, 100);
    for line in raw_lines(&ORDERS_ENTRY) {
        segmenter.push(line);
    }
    segmenter.reset();
    assert!(segmenter.pending().is_empty());
    assert!(segmenter.flush().is_none());
}

#[test]
fn segmentation_is_repeatable_on_a_frozen_stream() {
    let run = |segmenter: &mut Segmenter| -> Vec<ParsedEntry> {
        feed(segmenter, &TWO_RECORDS)
            .into_iter()
            .filter_map(parse_entry)
            .collect()
    };

    let mut segmenter = Segmenter::new(BoundaryPolicy::StartMarker, 100);
    let first = run(&mut segmenter);
    segmenter.reset();
    let second = run(&mut segmenter);

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

#[test]
fn boundary_policy_parses_from_kebab_case() {
    #[derive(serde::Deserialize)]
    struct Wrapper {
        boundary: BoundaryPolicy,
    }
    let parsed: Wrapper = toml::from_str("boundary = \"end-marker\"").expect("parse");
    assert_eq!(parsed.boundary, BoundaryPolicy::EndMarker);
    assert!(toml::from_str::<Wrapper>("boundary = \"both\"").is_err());
}

#[test]
fn end_marker_closes_records_without_a_known_verb() {
    let lines = [
        "# Time: 2024-01-01T10:00:00",
        "# User@Host: app[app] @ 10.0.0.5",
        "# Query_time: 0.01  Lock_time: 0  Rows_sent: 0  Rows_examined: 0",
        "SET timestamp=1704103200;",
        "COMMIT;",
        "# Time: 2024-01-01T10:00:01",
        "# User@Host: app[app] @ 10.0.0.5",
        "# Query_time: 9.0  Lock_time: 0  Rows_sent: 1  Rows_examined: 90000",
        "SELECT * FROM big;",
    ];
    let mut segmenter = Segmenter::new(BoundaryPolicy::EndMarker, 100);
    let parsed: Vec<ParsedEntry> = feed(&mut segmenter, &lines)
        .into_iter()
        .filter_map(parse_entry)
        .collect();

    assert_eq!(parsed.len(), 2);
    assert!((parsed[0].query_time_secs - 0.01).abs() < f64::EPSILON);
    assert_eq!(parsed[0].sql_text, "COMMIT;");
    assert!((parsed[1].query_time_secs - 9.0).abs() < f64::EPSILON);
    assert_eq!(parsed[1].sql_text, "SELECT * FROM big;");
}

#[test]
fn end_marker_closes_administrator_commands() {
    let lines = [
        "# Time: 2024-01-01T10:00:00",
        "# User@Host: app[app] @ 10.0.0.5",
        "# Query_time: 0.0  Lock_time: 0  Rows_sent: 0  Rows_examined: 0",
        "# administrator command: Quit;",
    ];
    let mut segmenter = Segmenter::new(BoundaryPolicy::EndMarker, 100);
    let mut raw = raw_lines(&lines).into_iter();

    for line in raw.by_ref().take(3) {
        assert!(segmenter.push(line).is_none());
    }
    let entry = segmenter
        .push(raw.next().expect("last line"))
        .expect("command line closes the entry");
    assert_eq!(entry.len(), 4);
}

#[test]
fn end_marker_header_after_timing_closes_unterminated_record() {
    let lines = [
        "# Time: 2024-01-01T10:00:00",
        "# User@Host: app[app] @ 10.0.0.5",
        "# Query_time: 0.2  Lock_time: 0  Rows_sent: 0  Rows_examined: 0",
        "START TRANSACTION",
        "# Time: 2024-01-01T10:00:02",
        "# User@Host: app[app] @ 10.0.0.5",
        "# Query_time: 3.0  Lock_time: 0  Rows_sent: 1  Rows_examined: 10",
        "SELECT 1;",
    ];
    let mut segmenter = Segmenter::new(BoundaryPolicy::EndMarker, 100);
    let entries = feed(&mut segmenter, &lines);

    assert_eq!(entries.len(), 2);
    assert_eq!(texts(&entries[0]), lines[..4].to_vec());
    assert_eq!(texts(&entries[1]), lines[4..].to_vec());
}

#[test]
fn from_config_applies_policy_and_line_cap() {
    let config = slowwatch::config::SegmenterConfig {
        boundary: BoundaryPolicy::EndMarker,
        max_lines_per_entry: 2,
    };
    let mut segmenter = Segmenter::from_config(&config);
    assert_eq!(segmenter.policy(), BoundaryPolicy::EndMarker);

    for line in raw_lines(&ORDERS_ENTRY[..4]) {
        assert!(segmenter.push(line).is_none());
    }
    assert_eq!(segmenter.pending().len(), 2);
}
