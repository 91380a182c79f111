use crate::vx::{lock, QuantType};
use serde::Serialize;
use std::sync::Mutex;

/// Snapshot of quantization parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantParams {
    pub qtype: QuantType,
    pub channel_dim: i32,
    pub scales: Vec<f32>,
    pub zero_points: Vec<i32>,
    pub fl: i8,
}

impl Default for QuantParams {
    fn default() -> Self {
        Self {
            qtype: QuantType::None,
            channel_dim: -1,
            scales: Vec::new(),
            zero_points: Vec::new(),
            fl: 0,
        }
    }
}

/// Quantization description attached to a tensor spec.
#[derive(Debug, Default)]
pub struct Quantization {
    params: Mutex<QuantParams>,
}

impl Quantization {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-tensor quantization with one scale and zero point.
    pub fn with_scale(qtype: QuantType, scale: f32, zero_point: i32) -> Self {
        Self::from_params(QuantParams {
            qtype,
            scales: vec![scale],
            zero_points: vec![zero_point],
            ..QuantParams::default()
        })
    }

    pub fn per_channel(qtype: QuantType, channel_dim: i32, scales: &[f32], zero_points: &[i32]) -> Self {
        Self::from_params(QuantParams {
            qtype,
            channel_dim,
            scales: scales.to_vec(),
            zero_points: zero_points.to_vec(),
            fl: 0,
        })
    }

    pub fn dynamic_fixed_point(qtype: QuantType, fl: i8) -> Self {
        Self::from_params(QuantParams {
            qtype,
            fl,
            ..QuantParams::default()
        })
    }

    pub fn from_params(params: QuantParams) -> Self {
        Self {
            params: Mutex::new(params),
        }
    }

    pub fn params(&self) -> QuantParams {
        lock(&self.params).clone()
    }

    pub fn qtype(&self) -> QuantType {
        lock(&self.params).qtype
    }

    pub fn set_type(&self, qtype: QuantType) -> &Self {
        lock(&self.params).qtype = qtype;
        self
    }

    pub fn channel_dim(&self) -> i32 {
        lock(&self.params).channel_dim
    }

    pub fn set_channel_dim(&self, channel_dim: i32) -> &Self {
        lock(&self.params).channel_dim = channel_dim;
        self
    }

    pub fn scales(&self) -> Vec<f32> {
        lock(&self.params).scales.clone()
    }

    pub fn set_scales(&self, scales: &[f32]) -> &Self {
        lock(&self.params).scales = scales.to_vec();
        self
    }

    pub fn zero_points(&self) -> Vec<i32> {
        lock(&self.params).zero_points.clone()
    }

    pub fn set_zero_points(&self, zero_points: &[i32]) -> &Self {
        lock(&self.params).zero_points = zero_points.to_vec();
        self
    }

    pub fn fl(&self) -> i8 {
        lock(&self.params).fl
    }
}

impl Clone for Quantization {
    fn clone(&self) -> Self {
        Self::from_params(self.params())
    }
}
