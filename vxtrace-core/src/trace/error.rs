//! Trace Error Types
//!
//! Errors raised by the trace and replay plumbing. Most of the public surface is
//! best-effort (a tracing fault must never stop the traced program), so these
//! usually end up in a `log::error!` line rather than in a caller's `?`.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the trace and replay modules.
pub type TraceResult<T> = Result<T, TraceError>;

/// Trace error types.
#[derive(Error, Debug)]
pub enum TraceError {
    /// A trace file could not be opened.
    #[error("Can not open file at: {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic I/O failure on an already open file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fewer bytes were written than requested.
    #[error("Write trace binary data failed! expected {expected} bytes at offset {offset}")]
    ShortWrite { offset: u64, expected: usize },

    /// Fewer bytes were available than requested.
    #[error("Read trace binary data failed! expected {expected} bytes at offset {offset}, got {actual}")]
    ShortRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    /// Operation attempted on a file that never opened.
    #[error("{0} pointer is NULL")]
    MissingHandle(&'static str),

    /// A replayer load expression could not be parsed.
    #[error("Invalid load expression `{expr}`: {reason}")]
    Expression { expr: String, reason: String },

    /// Configuration could not be read or written.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A trace script failed validation.
    #[error("Trace validation failed: {0}")]
    Validation(String),
}

impl TraceError {
    /// Create an open error for `path`.
    pub fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }

    /// Create an expression error.
    pub fn expression(expr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Expression {
            expr: expr.into(),
            reason: reason.into(),
        }
    }
}
