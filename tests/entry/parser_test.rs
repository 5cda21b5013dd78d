//! Tests for slow log field extraction.

use chrono::NaiveDate;
use slowwatch::entry::parser::{
    extract_identity, extract_logged_at, extract_schema, extract_statement, extract_timing,
    is_session_setup, is_statement_start, parse_entry,
};
use slowwatch::entry::PendingEntry;

use crate::support::ORDERS_ENTRY;

#[test]
fn parses_reference_record() {
    let parsed = parse_entry(PendingEntry::from_lines(ORDERS_ENTRY)).expect("parsed entry");

    assert!((parsed.query_time_secs - 1.5).abs() < f64::EPSILON);
    assert!((parsed.lock_time_secs - 0.1).abs() < f64::EPSILON);
    assert_eq!(parsed.rows_sent, 3);
    assert_eq!(parsed.rows_examined, 500);
    assert_eq!(parsed.database, "orders");
    assert_eq!(parsed.user, "app");
    assert_eq!(parsed.host, "10.0.0.5");
    assert_eq!(parsed.sql_text, "SELECT * FROM orders;");
    let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(10, 0, 0))
        .expect("valid date");
    assert_eq!(parsed.logged_at, Some(expected));
}

#[test]
fn record_without_timing_line_is_not_parsed() {
    let entry = PendingEntry::from_lines([
        "/usr/sbin/mysqld, Version: 8.0.36 (MySQL Community Server - GPL). started with:",
        "Tcp port: 3306  Unix socket: /var/run/mysqld/mysqld.sock",
        "Time                 Id Command    Argument",
    ]);
    assert!(parse_entry(entry).is_none());
}

#[test]
fn missing_schema_defaults_to_empty() {
    let lines: Vec<&str> = ORDERS_ENTRY
        .iter()
        .copied()
        .filter(|line| !line.starts_with("# Schema"))
        .collect();
    let parsed = parse_entry(PendingEntry::from_lines(lines)).expect("parsed entry");

    assert_eq!(parsed.database, "");
    assert_eq!(parsed.user, "app");
    assert_eq!(parsed.rows_examined, 500);
    assert_eq!(parsed.sql_text, "SELECT * FROM orders;");
}

#[test]
fn extractors_are_order_insensitive() {
    let mut lines = ORDERS_ENTRY.to_vec();
    lines.reverse();
    let forward = parse_entry(PendingEntry::from_lines(ORDERS_ENTRY)).expect("forward");
    let reversed = parse_entry(PendingEntry::from_lines(lines)).expect("reversed");
    assert_eq!(forward, reversed);
}

#[test]
fn first_match_wins_for_duplicates() {
    let lines = [
        "# Query_time: 1.0  Lock_time: 0  Rows_sent: 1  Rows_examined: 1",
        "# Query_time: 9.0  Lock_time: 9  Rows_sent: 9  Rows_examined: 9",
        "# Schema: first",
        "# Schema: second",
    ];
    let timing = extract_timing(&lines).expect("timing");
    assert!((timing.query_time_secs - 1.0).abs() < f64::EPSILON);
    assert_eq!(extract_schema(&lines).as_deref(), Some("first"));
}

#[test]
fn malformed_timing_value_only_zeroes_that_field() {
    let lines = ["# Query_time: 2.25  Lock_time: n/a  Rows_sent: 7  Rows_examined: many"];
    let timing = extract_timing(&lines).expect("timing line present");

    assert!((timing.query_time_secs - 2.25).abs() < f64::EPSILON);
    assert!(timing.lock_time_secs.abs() < f64::EPSILON);
    assert_eq!(timing.rows_sent, 7);
    assert_eq!(timing.rows_examined, 0);
}

#[test]
fn integer_durations_are_accepted() {
    let lines = ["# Query_time: 3  Lock_time: 1  Rows_sent: 0  Rows_examined: 0"];
    let timing = extract_timing(&lines).expect("timing");
    assert!((timing.query_time_secs - 3.0).abs() < f64::EPSILON);
    assert!((timing.lock_time_secs - 1.0).abs() < f64::EPSILON);
}

#[test]
fn identity_prefers_host_name_then_address() {
    let named = extract_identity(&["# User@Host: app[app] @ web-1 [10.0.0.5]  Id:    42"])
        .expect("identity");
    assert_eq!(named.user, "app");
    assert_eq!(named.host, "web-1");

    let address_only =
        extract_identity(&["# User@Host: app[app] @  [10.0.0.7]  Id: 3"]).expect("identity");
    assert_eq!(address_only.host, "10.0.0.7");

    let localhost = extract_identity(&["# User@Host: root[root] @ localhost []"]).expect("identity");
    assert_eq!(localhost.user, "root");
    assert_eq!(localhost.host, "localhost");
}

#[test]
fn schema_from_percona_header_and_use_statement() {
    assert_eq!(
        extract_schema(&["# Schema: shop  Last_errno: 0  Killed: 0"]).as_deref(),
        Some("shop")
    );
    assert_eq!(extract_schema(&["use `billing`;"]).as_deref(), Some("billing"));
    assert_eq!(extract_schema(&["# Thread_id: 8  Schema:   QC_hit: No"]), None);
}

#[test]
fn statement_spans_continuation_lines() {
    let lines = [
        "SET timestamp=1704103200;",
        "select id,",
        "  name from users",
        "  where id = 1;",
        "# Time: 2024-01-01T10:00:01",
    ];
    assert_eq!(
        extract_statement(&lines).as_deref(),
        Some("select id,\n  name from users\n  where id = 1;")
    );
}

#[test]
fn statement_verbs_exclude_session_setup() {
    assert!(is_statement_start("SELECT 1;"));
    assert!(is_statement_start("  delete from t where id = 2;"));
    assert!(is_statement_start("WITH x AS (SELECT 1) SELECT * FROM x;"));
    assert!(!is_statement_start("SET timestamp=1704103200;"));
    assert!(!is_statement_start("use orders;"));
    assert!(!is_statement_start("# Query_time: 1.0"));
}

#[test]
fn time_header_formats() {
    let rfc = extract_logged_at(&["# Time: 2024-01-01T10:00:00.123456Z"]).expect("rfc3339");
    assert_eq!(rfc.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-01 10:00:00");

    let legacy = extract_logged_at(&["# Time: 240101 10:00:00"]).expect("legacy");
    assert_eq!(legacy.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-01 10:00:00");

    assert!(extract_logged_at(&["# Time: yesterday"]).is_none());
}

#[test]
fn statement_falls_back_to_first_non_header_line() {
    let lines = [
        "# Query_time: 0.01  Lock_time: 0  Rows_sent: 0  Rows_examined: 0",
        "use orders;",
        "SET timestamp=1704103200;",
        "COMMIT;",
    ];
    assert_eq!(extract_statement(&lines).as_deref(), Some("COMMIT;"));
    assert_eq!(
        extract_statement(&["# administrator command: Quit;"]),
        None
    );
}

#[test]
fn session_setup_lines_are_recognised() {
    assert!(is_session_setup("use `billing`;"));
    assert!(is_session_setup("SET timestamp=1704103200;"));
    assert!(is_session_setup("SET last_insert_id=4,insert_id=5,timestamp=1704103200;"));
    assert!(!is_session_setup("SET @total = 1;"));
    assert!(!is_session_setup("COMMIT;"));
}
