//! Slowwatch: slow query log monitor.
//!
//! Tails a MySQL slow query log, reassembles its multi-line records, and posts
//! a markdown alert to a webhook for every query at or above a configured
//! duration threshold.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub mod tail;

pub mod entry;

pub mod alert;

pub mod supervisor;
