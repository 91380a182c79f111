//! Textual Call Log
//!
//! The call log is the replay program body: one or more `;`-terminated C++
//! statements per intercepted call. Writes are flushed immediately so a crash
//! in the traced program still leaves every completed statement on disk.
//!
//! Statements that need an auxiliary declaration before them are staged in
//! [`PendingMessages`] and written as one block.

use crate::trace::error::{TraceError, TraceResult};
use log::error;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only statement file.
pub struct CallLog {
    path: PathBuf,
    file: Option<File>,
    bytes_written: u64,
}

impl CallLog {
    /// Create (truncate) the log at `path`. Open failures are logged.
    pub fn create(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = match File::create(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                error!("{}", TraceError::open(&path, e));
                None
            }
        };
        Self {
            path,
            file,
            bytes_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Append `text` and flush. Failures are logged.
    pub fn write(&mut self, text: &str) {
        if let Err(e) = self.try_write(text) {
            match e {
                TraceError::MissingHandle(_) => error!("Log file do not exist"),
                e => error!("{}: {}", self.path.display(), e),
            }
        }
    }

    pub fn try_write(&mut self, text: &str) -> TraceResult<()> {
        let file = self.file.as_mut().ok_or(TraceError::MissingHandle("Log"))?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        self.bytes_written += text.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) {
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.flush() {
                error!("{}: {}", self.path.display(), e);
            }
        }
    }
}

/// Statements built but not yet written, in call order.
#[derive(Debug, Default)]
pub struct PendingMessages {
    queue: VecDeque<String>,
}

impl PendingMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new message at the back.
    pub fn push(&mut self, text: impl Into<String>) {
        self.queue.push_back(text.into());
    }

    /// Append to the message at the back, opening one if the queue is empty.
    pub fn amend_last(&mut self, text: &str) {
        match self.queue.back_mut() {
            Some(last) => last.push_str(text),
            None => self.queue.push_back(text.to_string()),
        }
    }

    /// Insert a whole statement right before the message at the back.
    pub fn insert_before_last(&mut self, text: impl Into<String>) {
        let index = self.queue.len().saturating_sub(1);
        self.queue.insert(index, text.into());
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Write every message in order to `log` and clear the queue.
    pub fn sync_to(&mut self, log: &mut CallLog) {
        for message in self.queue.drain(..) {
            log.write(&message);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.queue.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_before_last_precedes_use() {
        let mut pending = PendingMessages::new();
        pending.push("graph_0->CompileToBinary(");
        pending.amend_last("nullptr, &nbg_size_0");
        pending.insert_before_last("size_t nbg_size_0 = -1;\n");
        pending.amend_last(");\n");
        let messages: Vec<&str> = pending.iter().collect();
        assert_eq!(
            messages,
            vec![
                "size_t nbg_size_0 = -1;\n",
                "graph_0->CompileToBinary(nullptr, &nbg_size_0);\n"
            ]
        );
    }

    #[test]
    fn test_sync_writes_in_order_and_clears() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut log = CallLog::create(dir.path().join("log.cc"));
        let mut pending = PendingMessages::new();
        pending.push("a;\n");
        pending.push("b;\n");
        pending.sync_to(&mut log);
        assert!(pending.is_empty());
        assert_eq!(std::fs::read_to_string(log.path()).unwrap(), "a;\nb;\n");
        assert_eq!(log.bytes_written(), 6);
    }

    #[test]
    fn test_write_without_file_is_noop() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut log = CallLog::create(dir.path().join("nope").join("log.cc"));
        assert!(!log.is_open());
        log.write("x;\n");
        assert!(log.try_write("x;\n").is_err());
        assert_eq!(log.bytes_written(), 0);
    }
}
