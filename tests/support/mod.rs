//! Shared test doubles and fixtures.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use slowwatch::alert::{Notifier, NotifyError};
use slowwatch::tail::RawLine;

/// The five-line record used throughout the tests.
pub const ORDERS_ENTRY: [&str; 5] = [
    "# Time: 2024-01-01T10:00:00",
    "# User@Host: app[app] @ 10.0.0.5",
    "# Query_time: 1.5  Lock_time: 0.1  Rows_sent: 3  Rows_examined: 500",
    "# Schema: orders",
    "SELECT * FROM orders;",
];

/// Wrap text lines as [`RawLine`]s.
pub fn raw_lines(lines: &[&str]) -> Vec<RawLine> {
    lines.iter().map(|line| RawLine::new(*line)).collect()
}

/// Records every notification it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    /// Contents received so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("notifier lock").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, content: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier lock")
            .push(content.to_owned());
        Ok(())
    }
}

/// Fails every delivery and counts the attempts.
#[derive(Default)]
pub struct FailingNotifier {
    calls: AtomicUsize,
}

impl FailingNotifier {
    /// Number of deliveries attempted.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _content: &str) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Other("endpoint unavailable".to_owned()))
    }
}
