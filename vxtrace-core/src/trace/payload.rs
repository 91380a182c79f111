//! Binary Payload Store
//!
//! Append-only file of raw buffer bytes. Every dump returns the offset the
//! region starts at, which the caller embeds in a replay load expression.
//! There is no header and no record framing: the call log is the index.

use crate::trace::error::{TraceError, TraceResult};
use log::error;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

struct PayloadState {
    file: Option<File>,
    offset: u64,
    dumps: u64,
}

/// Write side of the payload store.
pub struct PayloadStore {
    path: PathBuf,
    state: Mutex<PayloadState>,
}

impl PayloadStore {
    /// Create (truncate) the store at `path`.
    ///
    /// An open failure is logged and leaves the store without a handle; every
    /// later dump reports the missing handle and returns the current offset.
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
            state: Mutex::new(PayloadState {
                file,
                offset: 0,
                dumps: 0,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.lock().file.is_some()
    }

    /// Write `elem_size * count` bytes of `data` and return the start offset.
    ///
    /// On failure the error is logged and the pre-write offset is still returned.
    pub fn dump(&self, data: &[u8], elem_size: usize, count: usize) -> u64 {
        let len = elem_size.saturating_mul(count);
        let mut state = self.lock();
        let start = state.offset;
        if let Err(e) = Self::write_region(&mut state, data, len) {
            error!("{}: {}", self.path.display(), e);
        }
        start
    }

    /// Dump a slice of plain-old-data elements.
    pub fn dump_slice<T: bytemuck::Pod>(&self, data: &[T]) -> u64 {
        self.dump(
            bytemuck::cast_slice(data),
            std::mem::size_of::<T>(),
            data.len(),
        )
    }

    /// Fallible twin of [`PayloadStore::dump`] for a whole byte slice.
    pub fn try_dump(&self, data: &[u8]) -> TraceResult<u64> {
        let mut state = self.lock();
        let start = state.offset;
        Self::write_region(&mut state, data, data.len())?;
        Ok(start)
    }

    /// Offset the next dump will start at.
    pub fn offset(&self) -> u64 {
        self.lock().offset
    }

    /// Number of successful dumps.
    pub fn dump_count(&self) -> u64 {
        self.lock().dumps
    }

    pub fn flush(&self) {
        if let Some(file) = self.lock().file.as_mut() {
            if let Err(e) = file.flush() {
                error!("Flush trace binary data failed: {e}");
            }
        }
    }

    fn write_region(state: &mut PayloadState, data: &[u8], len: usize) -> TraceResult<()> {
        let offset = state.offset;
        if data.len() < len {
            return Err(TraceError::ShortWrite {
                offset,
                expected: len,
            });
        }
        let file = state
            .file
            .as_mut()
            .ok_or(TraceError::MissingHandle("FILE"))?;
        match file.write_all(&data[..len]).and_then(|_| file.flush()) {
            Ok(()) => {
                state.offset += len as u64;
                state.dumps += 1;
                Ok(())
            }
            Err(e) => {
                // Keep the offset in step with whatever actually reached the file.
                if let Ok(position) = file.stream_position() {
                    state.offset = position;
                }
                log::debug!("payload write error: {e}");
                Err(TraceError::ShortWrite {
                    offset,
                    expected: len,
                })
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PayloadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_returns_start_offsets() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = PayloadStore::create(dir.path().join("p.bin"));
        assert_eq!(store.dump(&[1, 2, 3, 4], 1, 4), 0);
        assert_eq!(store.dump(&[0u8; 8], 4, 2), 4);
        assert_eq!(store.dump_slice(&[1.0f64]), 12);
        assert_eq!(store.offset(), 20);
        assert_eq!(store.dump_count(), 3);
        assert_eq!(std::fs::metadata(store.path()).unwrap().len(), 20);
    }

    #[test]
    fn test_short_source_does_not_advance() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = PayloadStore::create(dir.path().join("p.bin"));
        store.dump(&[9; 4], 1, 4);
        assert_eq!(store.dump(&[1, 2], 4, 2), 4);
        assert_eq!(store.offset(), 4);
        assert!(store.try_dump(&[]).is_ok());
    }

    #[test]
    fn test_missing_handle_degrades() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = PayloadStore::create(dir.path().join("missing").join("p.bin"));
        assert!(!store.is_open());
        assert_eq!(store.dump(&[1, 2, 3], 1, 3), 0);
        assert!(matches!(
            store.try_dump(&[1]),
            Err(TraceError::MissingHandle(_))
        ));
    }
}
