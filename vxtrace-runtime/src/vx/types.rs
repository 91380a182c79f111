//! Enumerations shared across the object model.
//!
//! Discriminants follow the runtime header so that a logged `(tim::vx::DataType)9`
//! means the same thing to the replay build.

use serde::{Deserialize, Serialize};

pub type ShapeType = Vec<u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Unknown = 0,
    Int4 = 1,
    Int8 = 2,
    Uint8 = 3,
    Int16 = 4,
    Uint16 = 5,
    Int32 = 6,
    Uint32 = 7,
    Float16 = 8,
    Float32 = 9,
    Int64 = 10,
    Bool8 = 11,
}

impl DataType {
    /// Storage size of one element. `Int4` is stored one element per byte.
    pub fn byte_size(self) -> usize {
        match self {
            DataType::Unknown => 0,
            DataType::Int4 | DataType::Int8 | DataType::Uint8 | DataType::Bool8 => 1,
            DataType::Int16 | DataType::Uint16 | DataType::Float16 => 2,
            DataType::Int32 | DataType::Uint32 | DataType::Float32 => 4,
            DataType::Int64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TensorAttribute {
    Constant = 1,
    Transient = 2,
    Variable = 4,
    Input = 8,
    Output = 16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantType {
    None = 0,
    Asymmetric = 1,
    SymmetricPerChannel = 2,
    DynamicFixedPoint = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverflowPolicy {
    Wrap = 0,
    Saturate = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundingPolicy {
    ToZero = 0,
    Rtne = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundType {
    Ceiling = 0,
    Floor = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PadType {
    None = -1,
    Auto = 0,
    Valid = 1,
    Same = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PadMode {
    Constant = 0,
    Edge = 1,
    Symmetric = 2,
    Reflect = 3,
}

/// Rounding configuration of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundingConfig {
    pub overflow: OverflowPolicy,
    pub rounding: RoundingPolicy,
    pub round_type: RoundType,
    pub accumulator_bits: u32,
}

impl Default for RoundingConfig {
    fn default() -> Self {
        Self {
            overflow: OverflowPolicy::Saturate,
            rounding: RoundingPolicy::Rtne,
            round_type: RoundType::Floor,
            accumulator_bits: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminants_match_runtime_header() {
        assert_eq!(DataType::Float32 as i32, 9);
        assert_eq!(TensorAttribute::Output as i32, 16);
        assert_eq!(PadType::None as i32, -1);
    }

    #[test]
    fn test_byte_size() {
        assert_eq!(DataType::Float16.byte_size(), 2);
        assert_eq!(DataType::Int64.byte_size(), 8);
        assert_eq!(DataType::Unknown.byte_size(), 0);
    }

    #[test]
    fn test_default_rounding() {
        let config = RoundingConfig::default();
        assert_eq!(config.overflow, OverflowPolicy::Saturate);
        assert_eq!(config.accumulator_bits, 0);
    }
}
