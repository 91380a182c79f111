//! Replayer load expressions.
//!
//! The call log refers to payload bytes through two expression forms:
//!
//! - `trace::Replayer::get_vector<T>(offset, count)`
//! - `trace::Replayer::get_array<T, N>(offset, count)`
//!
//! either optionally followed by `.data()`.

use crate::trace::error::{TraceError, TraceResult};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const REPLAYER: &str = "trace::Replayer::get_";

/// Element types a load expression can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElementType {
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ElementType {
    pub fn from_cxx(name: &str) -> Option<Self> {
        let ty = match name.trim() {
            "char" => Self::Char,
            "int8_t" => Self::I8,
            "uint8_t" => Self::U8,
            "int16_t" => Self::I16,
            "uint16_t" => Self::U16,
            "int32_t" | "int" => Self::I32,
            "uint32_t" => Self::U32,
            "int64_t" => Self::I64,
            "uint64_t" => Self::U64,
            "float" => Self::F32,
            "double" => Self::F64,
            _ => return None,
        };
        Some(ty)
    }

    pub fn cxx_name(self) -> &'static str {
        match self {
            Self::Char => "char",
            Self::I8 => "int8_t",
            Self::U8 => "uint8_t",
            Self::I16 => "int16_t",
            Self::U16 => "uint16_t",
            Self::I32 => "int32_t",
            Self::U32 => "uint32_t",
            Self::I64 => "int64_t",
            Self::U64 => "uint64_t",
            Self::F32 => "float",
            Self::F64 => "double",
        }
    }

    pub fn size(self) -> usize {
        match self {
            Self::Char | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }
}

impl FromStr for ElementType {
    type Err = TraceError;

    /// Accepts both C++ spellings (`int32_t`) and Rust ones (`i32`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rust = match s {
            "i8" => Some(Self::I8),
            "u8" => Some(Self::U8),
            "i16" => Some(Self::I16),
            "u16" => Some(Self::U16),
            "i32" => Some(Self::I32),
            "u32" => Some(Self::U32),
            "i64" => Some(Self::I64),
            "u64" => Some(Self::U64),
            "f32" => Some(Self::F32),
            "f64" => Some(Self::F64),
            _ => None,
        };
        rust.or_else(|| Self::from_cxx(s))
            .ok_or_else(|| TraceError::expression(s, "unknown element type"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadKind {
    Vector,
    Array { len: usize },
}

/// One parsed `trace::Replayer::get_*` expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadExpr {
    pub kind: LoadKind,
    pub elem: ElementType,
    pub offset: u64,
    pub count: usize,
    /// Followed by `.data()`.
    pub data_ptr: bool,
}

impl LoadExpr {
    pub fn vector(elem: ElementType, offset: u64, count: usize) -> Self {
        Self {
            kind: LoadKind::Vector,
            elem,
            offset,
            count,
            data_ptr: false,
        }
    }

    pub fn parse(text: &str) -> TraceResult<Self> {
        let trimmed = text.trim();
        let (body, data_ptr) = match trimmed.strip_suffix(".data()") {
            Some(body) => (body, true),
            None => (trimmed, false),
        };
        let rest = body
            .strip_prefix(REPLAYER)
            .ok_or_else(|| TraceError::expression(text, "not a replayer load"))?;
        let (is_array, rest) = if let Some(rest) = rest.strip_prefix("vector<") {
            (false, rest)
        } else if let Some(rest) = rest.strip_prefix("array<") {
            (true, rest)
        } else {
            return Err(TraceError::expression(text, "expected get_vector or get_array"));
        };

        let close = rest
            .find('>')
            .ok_or_else(|| TraceError::expression(text, "unterminated template arguments"))?;
        let template: Vec<&str> = rest[..close].split(',').map(str::trim).collect();
        let elem = ElementType::from_cxx(template[0])
            .ok_or_else(|| TraceError::expression(text, "unknown element type"))?;
        let kind = match (is_array, template.len()) {
            (false, 1) => LoadKind::Vector,
            (true, 2) => LoadKind::Array {
                len: parse_number(text, template[1])?,
            },
            _ => return Err(TraceError::expression(text, "wrong template argument count")),
        };

        let call = rest[close + 1..]
            .trim()
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .ok_or_else(|| TraceError::expression(text, "expected (offset, count)"))?;
        let mut parts = call.split(',').map(str::trim);
        let (offset, count) = match (parts.next(), parts.next(), parts.next()) {
            (Some(offset), Some(count), None) => (offset, count),
            _ => return Err(TraceError::expression(text, "expected (offset, count)")),
        };

        Ok(Self {
            kind,
            elem,
            offset: parse_number(text, offset)?,
            count: parse_number(text, count)?,
            data_ptr,
        })
    }

    /// Every load expression in `text`, in order. Malformed ones are skipped.
    pub fn find_all(text: &str) -> Vec<LoadExpr> {
        let mut loads = Vec::new();
        let mut cursor = 0;
        while let Some(found) = text[cursor..].find(REPLAYER) {
            let start = cursor + found;
            let Some(close) = text[start..].find(')') else {
                break;
            };
            let mut end = start + close + 1;
            if text[end..].starts_with(".data()") {
                end += ".data()".len();
            }
            match Self::parse(&text[start..end]) {
                Ok(expr) => loads.push(expr),
                Err(e) => log::warn!("{e}"),
            }
            cursor = end;
        }
        loads
    }

    /// Bytes the expression reads, or `None` if that overflows `u64`.
    pub fn byte_len(&self) -> Option<u64> {
        (self.count as u64).checked_mul(self.elem.size() as u64)
    }

    /// First byte past the referenced region, or `None` on overflow.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.byte_len()?)
    }
}

fn parse_number<T: FromStr>(expr: &str, text: &str) -> TraceResult<T> {
    text.parse()
        .map_err(|_| TraceError::expression(expr, format!("`{text}` is not a number")))
}

impl fmt::Display for LoadExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LoadKind::Vector => write!(
                f,
                "{REPLAYER}vector<{}>({}, {})",
                self.elem.cxx_name(),
                self.offset,
                self.count
            )?,
            LoadKind::Array { len } => write!(
                f,
                "{REPLAYER}array<{}, {len}>({}, {})",
                self.elem.cxx_name(),
                self.offset,
                self.count
            )?,
        }
        if self.data_ptr {
            f.write_str(".data()")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vector_and_array() {
        let v = LoadExpr::parse("trace::Replayer::get_vector<int32_t>(12, 3)").unwrap();
        assert_eq!(v, LoadExpr::vector(ElementType::I32, 12, 3));
        assert_eq!(v.end(), Some(24));

        let a = LoadExpr::parse("trace::Replayer::get_array<uint32_t, 4>(0, 4)").unwrap();
        assert_eq!(a.kind, LoadKind::Array { len: 4 });
        assert_eq!(a.to_string(), "trace::Replayer::get_array<uint32_t, 4>(0, 4)");

        let c = LoadExpr::parse("trace::Replayer::get_vector<char>(8, 16).data()").unwrap();
        assert!(c.data_ptr);
        assert_eq!(c.byte_len(), Some(16));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(LoadExpr::parse("get_vector<int>(1, 2)").is_err());
        assert!(LoadExpr::parse("trace::Replayer::get_vector<bool>(1, 2)").is_err());
        assert!(LoadExpr::parse("trace::Replayer::get_vector<float>(1)").is_err());
    }

    #[test]
    fn test_find_all_in_statement() {
        let line = "auto spec_0 = tim::vx::TensorSpec((tim::vx::DataType)1, trace::Replayer::get_vector<uint32_t>(0, 2), (tim::vx::TensorAttribute)2);\n\
                    tensor_0->CopyDataToTensor(trace::Replayer::get_vector<char>(8, 24).data(), 24);";
        let loads = LoadExpr::find_all(line);
        assert_eq!(loads.len(), 2);
        assert_eq!(loads[1].offset, 8);
        assert!(loads[1].data_ptr);
    }

    #[test]
    fn test_extent_overflow_is_none() {
        let far = LoadExpr::parse("trace::Replayer::get_vector<double>(18446744073709551615, 1)").unwrap();
        assert_eq!(far.byte_len(), Some(8));
        assert_eq!(far.end(), None);

        let huge = LoadExpr::parse("trace::Replayer::get_vector<double>(0, 18446744073709551615)").unwrap();
        assert_eq!(huge.byte_len(), None);
        assert_eq!(huge.end(), None);
    }

    #[test]
    fn test_element_type_from_str() {
        assert_eq!("f32".parse::<ElementType>().unwrap(), ElementType::F32);
        assert_eq!("uint16_t".parse::<ElementType>().unwrap(), ElementType::U16);
        assert!("complex".parse::<ElementType>().is_err());
    }
}
