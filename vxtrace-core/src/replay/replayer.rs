//! Payload reader used by replay programs.
//!
//! Reads are best-effort: a missing file or a short read is logged and the
//! caller gets whatever could be read, cut at the end of the file. The
//! `try_` variants surface the error instead.

use crate::replay::expr::{ElementType, LoadExpr, LoadKind};
use crate::trace::config::TraceConfig;
use crate::trace::error::{TraceError, TraceResult};
use bytemuck::Pod;
use log::error;
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

enum Handle {
    Unopened,
    Open(File),
    Failed,
}

/// Read side of the payload store, opened on first use.
pub struct Replayer {
    path: PathBuf,
    handle: Mutex<Handle>,
}

impl Replayer {
    /// Replayer over `<prefix>trace_bin.rpl.bin`.
    pub fn new(config: &TraceConfig) -> Self {
        Self::with_path(config.replay_payload_path())
    }

    pub fn from_env() -> Self {
        Self::new(&TraceConfig::from_env())
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handle: Mutex::new(Handle::Unopened),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn try_read_vector<T: Pod>(&self, offset: u64, count: usize) -> TraceResult<Vec<T>> {
        let (out, actual) = self.read_clamped(offset, count)?;
        let expected = requested_bytes::<T>(count);
        if actual < expected {
            return Err(TraceError::ShortRead {
                offset,
                expected,
                actual,
            });
        }
        Ok(out)
    }

    /// Up to `count` elements of `T` starting at byte `offset`.
    ///
    /// The result stops at the end of the file: an element cut by the end is
    /// kept with its missing bytes zeroed, and elements wholly past the end
    /// are not returned.
    pub fn read_vector<T: Pod>(&self, offset: u64, count: usize) -> Vec<T> {
        match self.read_clamped(offset, count) {
            Ok((out, actual)) => {
                let expected = requested_bytes::<T>(count);
                if actual < expected {
                    error!(
                        "{}",
                        TraceError::ShortRead {
                            offset,
                            expected,
                            actual
                        }
                    );
                }
                out
            }
            Err(e) => {
                error!("{}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Reads the elements that overlap the file past `offset`, never more than
    /// `count`. Returns them with the number of bytes read.
    fn read_clamped<T: Pod>(&self, offset: u64, count: usize) -> TraceResult<(Vec<T>, usize)> {
        let size = std::mem::size_of::<T>().max(1) as u64;
        self.with_file(|file| {
            let available = file.metadata()?.len().saturating_sub(offset);
            let fits = usize::try_from(available.div_ceil(size)).unwrap_or(usize::MAX);
            let mut out = vec![T::zeroed(); count.min(fits)];
            let actual = read_at(file, offset, bytemuck::cast_slice_mut(&mut out))?;
            Ok((out, actual))
        })
    }

    /// Fixed-size array filled with the first `count` elements at `offset`.
    pub fn read_array<T: Pod, const N: usize>(&self, offset: u64, count: usize) -> [T; N] {
        let values = self.read_vector::<T>(offset, count.min(N));
        let mut out = [T::zeroed(); N];
        out[..values.len()].copy_from_slice(&values);
        out
    }

    /// Read from an arbitrary file instead of the replay payload store.
    pub fn read_vector_from<T: Pod>(path: impl AsRef<Path>, offset: u64, count: usize) -> Vec<T> {
        Self::with_path(path.as_ref()).read_vector(offset, count)
    }

    /// Evaluate a parsed load expression.
    pub fn load(&self, expr: &LoadExpr) -> ReplayValue {
        let count = match expr.kind {
            LoadKind::Vector => expr.count,
            LoadKind::Array { len } => expr.count.min(len),
        };
        let offset = expr.offset;
        match expr.elem {
            ElementType::Char => ReplayValue::Char(self.read_vector(offset, count)),
            ElementType::I8 => ReplayValue::I8(self.read_vector(offset, count)),
            ElementType::U8 => ReplayValue::U8(self.read_vector(offset, count)),
            ElementType::I16 => ReplayValue::I16(self.read_vector(offset, count)),
            ElementType::U16 => ReplayValue::U16(self.read_vector(offset, count)),
            ElementType::I32 => ReplayValue::I32(self.read_vector(offset, count)),
            ElementType::U32 => ReplayValue::U32(self.read_vector(offset, count)),
            ElementType::I64 => ReplayValue::I64(self.read_vector(offset, count)),
            ElementType::U64 => ReplayValue::U64(self.read_vector(offset, count)),
            ElementType::F32 => ReplayValue::F32(self.read_vector(offset, count)),
            ElementType::F64 => ReplayValue::F64(self.read_vector(offset, count)),
        }
    }

    /// Size of the payload file in bytes.
    pub fn len(&self) -> TraceResult<u64> {
        self.with_file(|file| Ok(file.metadata()?.len()))
    }

    fn with_file<R>(&self, f: impl FnOnce(&mut File) -> TraceResult<R>) -> TraceResult<R> {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if let Handle::Unopened = *handle {
            *handle = match File::open(&self.path) {
                Ok(file) => Handle::Open(file),
                Err(e) => {
                    error!("{}", TraceError::open(&self.path, e));
                    Handle::Failed
                }
            };
        }
        match &mut *handle {
            Handle::Open(file) => f(file),
            _ => Err(TraceError::MissingHandle("FILE")),
        }
    }
}

fn requested_bytes<T>(count: usize) -> usize {
    count.saturating_mul(std::mem::size_of::<T>())
}

fn read_at(file: &mut File, offset: u64, buf: &mut [u8]) -> TraceResult<usize> {
    file.seek(SeekFrom::Start(offset))?;
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Typed result of evaluating a [`LoadExpr`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "values")]
pub enum ReplayValue {
    Char(Vec<u8>),
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ReplayValue {
    pub fn len(&self) -> usize {
        match self {
            Self::Char(v) | Self::U8(v) => v.len(),
            Self::I8(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::U64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Each element formatted for display.
    pub fn to_strings(&self) -> Vec<String> {
        fn fmt<T: ToString>(values: &[T]) -> Vec<String> {
            values.iter().map(T::to_string).collect()
        }
        match self {
            Self::Char(v) | Self::U8(v) => fmt(v),
            Self::I8(v) => fmt(v),
            Self::I16(v) => fmt(v),
            Self::U16(v) => fmt(v),
            Self::I32(v) => fmt(v),
            Self::U32(v) => fmt(v),
            Self::I64(v) => fmt(v),
            Self::U64(v) => fmt(v),
            Self::F32(v) => fmt(v),
            Self::F64(v) => fmt(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(bytes: &[u8]) -> (tempfile::TempDir, Replayer) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("trace_bin.rpl.bin");
        std::fs::write(&path, bytes).unwrap();
        (dir, Replayer::with_path(path))
    }

    #[test]
    fn test_short_read_stops_at_file_end() {
        let (_dir, replayer) = payload(&[1, 0, 2, 0]);
        assert_eq!(replayer.read_vector::<u16>(0, 4), vec![1, 2]);
        assert!(matches!(
            replayer.try_read_vector::<u16>(0, 4),
            Err(TraceError::ShortRead {
                expected: 8,
                actual: 4,
                ..
            })
        ));
        assert_eq!(replayer.try_read_vector::<u16>(2, 1).unwrap(), vec![2]);
    }

    #[test]
    fn test_partial_element_zero_filled() {
        let (_dir, replayer) = payload(&[1, 0, 2, 0, 3]);
        assert_eq!(replayer.read_vector::<u16>(0, 4), vec![1, 2, 3]);
        assert!(matches!(
            replayer.try_read_vector::<u16>(0, 4),
            Err(TraceError::ShortRead { actual: 5, .. })
        ));
    }

    #[test]
    fn test_huge_count_is_capped() {
        let (_dir, replayer) = payload(&[9, 0, 0, 0]);
        assert_eq!(replayer.read_vector::<u32>(0, usize::MAX / 4), vec![9]);
        assert!(replayer.read_vector::<u32>(u64::MAX, usize::MAX).is_empty());
    }

    #[test]
    fn test_read_array_zero_fills_tail() {
        let (_dir, replayer) = payload(&[7, 8, 9]);
        let values: [u8; 4] = replayer.read_array(0, 4);
        assert_eq!(values, [7, 8, 9, 0]);
    }

    #[test]
    fn test_missing_file_returns_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let replayer = Replayer::with_path(dir.path().join("absent.bin"));
        assert!(replayer.read_vector::<i32>(0, 2).is_empty());
        assert!(replayer.len().is_err());
    }

    #[test]
    fn test_load_expression() {
        let (_dir, replayer) = payload(&[0, 0, 0, 0, 5, 0, 0, 0, 6, 0, 0, 0]);
        let expr = LoadExpr::parse("trace::Replayer::get_vector<int32_t>(4, 2)").unwrap();
        assert_eq!(replayer.load(&expr), ReplayValue::I32(vec![5, 6]));
        assert_eq!(replayer.len().unwrap(), 12);
    }
}
