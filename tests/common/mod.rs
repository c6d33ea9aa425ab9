//! Common test utilities and helpers
//!
//! Shared fixtures for the integration suites: config files on disk and
//! a few canned messages.

#![allow(dead_code)]

use jobqueue::queue::api::{Message, REGENERATE_APPRC, START_APP};
use std::io::Write;
use tempfile::NamedTempFile;

pub const WAIT: std::time::Duration = std::time::Duration::from_secs(2);

/// Write `contents` to a temporary `.toml` file that lives as long as the handle
pub fn config_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes())
        .expect("write temp config");
    file
}

/// The messages an app deploy would emit
pub fn deploy_messages(app: &str, units: usize) -> Vec<Message> {
    let mut messages = vec![Message::new(REGENERATE_APPRC).arg(app)];
    for unit in 0..units {
        messages.push(Message::new(START_APP).arg(app).arg(format!("{app}/{unit}")));
    }
    messages
}
