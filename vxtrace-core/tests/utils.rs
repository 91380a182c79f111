//! Shared helpers for integration tests.

use std::sync::Arc;
use tempfile::TempDir;
use vxtrace_core::trace::{TraceConfig, TraceSession};

/// Session writing into a fresh temporary directory.
pub fn temp_session() -> (TempDir, Arc<TraceSession>) {
    let dir = TempDir::new().expect("temp dir");
    let prefix = format!("{}/", dir.path().display());
    let session = TraceSession::open(TraceConfig::with_prefix(prefix));
    (dir, session)
}

pub fn read_log(session: &TraceSession) -> String {
    std::fs::read_to_string(session.config().log_path()).expect("call log")
}
