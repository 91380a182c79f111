//! Operator table.

use crate::vx::{PadMode, PadType};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OpType {
    Relu {},
    Relu6 {},
    Sigmoid {},
    Tanh {},
    Add {},
    Sub {},
    Multiply {
        scale: f32,
    },
    Div {
        scale: f32,
    },
    Matmul {
        transpose_a: bool,
        transpose_b: bool,
        adjoint_a: bool,
        adjoint_b: bool,
    },
    FullyConnected {
        axis: u32,
        weights: u32,
    },
    Reshape {
        size: Vec<u32>,
    },
    Transpose {
        perm: Vec<u32>,
    },
    Softmax {
        beta: f32,
        axis: i32,
    },
    Concat {
        axis: u32,
        input_cnt: i32,
    },
    Conv2d {
        weights: i32,
        padding: PadType,
        ksize: [u32; 2],
        stride: [u32; 2],
        dilation: [u32; 2],
        pad: [u32; 4],
        multiplier: i32,
    },
    Pad {
        front_size: Vec<u32>,
        back_size: Vec<u32>,
        const_val: i32,
        pad_mode: PadMode,
    },
    /// Precompiled network binary graph.
    Nbg {
        #[serde(skip)]
        binary: Vec<u8>,
        input_count: usize,
        output_count: usize,
    },
}

impl OpType {
    pub fn name(&self) -> &'static str {
        match self {
            OpType::Relu {} => "Relu",
            OpType::Relu6 {} => "Relu6",
            OpType::Sigmoid {} => "Sigmoid",
            OpType::Tanh {} => "Tanh",
            OpType::Add {} => "Add",
            OpType::Sub {} => "Sub",
            OpType::Multiply { .. } => "Multiply",
            OpType::Div { .. } => "Div",
            OpType::Matmul { .. } => "Matmul",
            OpType::FullyConnected { .. } => "FullyConnected",
            OpType::Reshape { .. } => "Reshape",
            OpType::Transpose { .. } => "Transpose",
            OpType::Softmax { .. } => "Softmax",
            OpType::Concat { .. } => "Concat",
            OpType::Conv2d { .. } => "Conv2d",
            OpType::Pad { .. } => "Pad",
            OpType::Nbg { .. } => "NBG",
        }
    }

    /// Inputs the operation needs bound before compile, when fixed.
    pub fn input_arity(&self) -> Option<usize> {
        match self {
            OpType::Relu {}
            | OpType::Relu6 {}
            | OpType::Sigmoid {}
            | OpType::Tanh {}
            | OpType::Reshape { .. }
            | OpType::Transpose { .. }
            | OpType::Softmax { .. }
            | OpType::Pad { .. } => Some(1),
            OpType::Add {}
            | OpType::Sub {}
            | OpType::Multiply { .. }
            | OpType::Div { .. }
            | OpType::Matmul { .. } => Some(2),
            OpType::Concat { input_cnt, .. } => usize::try_from(*input_cnt).ok(),
            OpType::Nbg { input_count, .. } => Some(*input_count),
            OpType::FullyConnected { .. } | OpType::Conv2d { .. } => None,
        }
    }
}
