use crate::vx::{lock, DataType, Quantization, ShapeType, TensorAttribute};
use anyhow::{bail, Result};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct SpecState {
    dtype: DataType,
    shape: ShapeType,
    attr: TensorAttribute,
    quantization: Arc<Quantization>,
}

/// Data type, shape, role and quantization of a tensor.
#[derive(Debug)]
pub struct TensorSpec {
    state: Mutex<SpecState>,
}

impl TensorSpec {
    pub fn new() -> Self {
        Self::with_quantization(
            DataType::Unknown,
            &[],
            TensorAttribute::Transient,
            Arc::new(Quantization::new()),
        )
    }

    pub fn with_shape(dtype: DataType, shape: &[u32], attr: TensorAttribute) -> Self {
        Self::with_quantization(dtype, shape, attr, Arc::new(Quantization::new()))
    }

    pub fn with_quantization(
        dtype: DataType,
        shape: &[u32],
        attr: TensorAttribute,
        quantization: Arc<Quantization>,
    ) -> Self {
        Self {
            state: Mutex::new(SpecState {
                dtype,
                shape: shape.to_vec(),
                attr,
                quantization,
            }),
        }
    }

    pub fn data_type(&self) -> DataType {
        lock(&self.state).dtype
    }

    pub fn set_data_type(&self, dtype: DataType) -> &Self {
        lock(&self.state).dtype = dtype;
        self
    }

    pub fn shape(&self) -> ShapeType {
        lock(&self.state).shape.clone()
    }

    pub fn set_shape(&self, shape: &[u32]) -> &Self {
        lock(&self.state).shape = shape.to_vec();
        self
    }

    pub fn attribute(&self) -> TensorAttribute {
        lock(&self.state).attr
    }

    pub fn set_attribute(&self, attr: TensorAttribute) -> &Self {
        lock(&self.state).attr = attr;
        self
    }

    /// Shared quantization object; identity is preserved across copies of the spec.
    pub fn quantization(&self) -> Arc<Quantization> {
        lock(&self.state).quantization.clone()
    }

    pub fn set_quantization(&self, quantization: Arc<Quantization>) -> &Self {
        lock(&self.state).quantization = quantization;
        self
    }

    /// Copy of this spec marked transient.
    pub fn as_transient_spec(&self) -> Arc<TensorSpec> {
        let copy = self.snapshot();
        copy.set_attribute(TensorAttribute::Transient);
        Arc::new(copy)
    }

    pub fn element_num(&self) -> i64 {
        lock(&self.state).shape.iter().map(|&d| i64::from(d)).product()
    }

    pub fn element_byte_size(&self) -> i64 {
        self.data_type().byte_size() as i64
    }

    pub fn byte_size(&self) -> i64 {
        self.element_num() * self.element_byte_size()
    }

    /// Independent copy sharing the quantization object.
    pub fn snapshot(&self) -> TensorSpec {
        Self {
            state: Mutex::new(lock(&self.state).clone()),
        }
    }
}

impl Default for TensorSpec {
    fn default() -> Self {
        Self::new()
    }
}

/// A tensor owned by a graph.
#[derive(Debug)]
pub struct Tensor {
    id: u32,
    spec: TensorSpec,
    placeholder: bool,
    data: Mutex<Vec<u8>>,
}

impl Tensor {
    pub(crate) fn new(id: u32, spec: &TensorSpec, data: Option<&[u8]>) -> Self {
        let spec = spec.snapshot();
        let mut storage = vec![0u8; spec.byte_size().max(0) as usize];
        if let Some(data) = data {
            let len = data.len().min(storage.len());
            storage[..len].copy_from_slice(&data[..len]);
        }
        Self {
            id,
            spec,
            placeholder: false,
            data: Mutex::new(storage),
        }
    }

    pub(crate) fn placeholder(id: u32) -> Self {
        Self {
            id,
            spec: TensorSpec::new(),
            placeholder: true,
            data: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn spec(&self) -> &TensorSpec {
        &self.spec
    }

    pub fn shape(&self) -> ShapeType {
        self.spec.shape()
    }

    pub fn data_type(&self) -> DataType {
        self.spec.data_type()
    }

    pub fn quantization(&self) -> Arc<Quantization> {
        self.spec.quantization()
    }

    pub fn copy_data_to_tensor(&self, data: &[u8]) -> Result<()> {
        let mut storage = lock(&self.data);
        if self.placeholder {
            bail!("tensor {} is a placeholder", self.id);
        }
        if data.len() > storage.len() {
            bail!(
                "tensor {} holds {} bytes, got {}",
                self.id,
                storage.len(),
                data.len()
            );
        }
        storage[..data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn copy_data_from_tensor(&self, out: &mut [u8]) -> Result<()> {
        let storage = lock(&self.data);
        if self.placeholder {
            bail!("tensor {} is a placeholder", self.id);
        }
        let len = out.len().min(storage.len());
        out[..len].copy_from_slice(&storage[..len]);
        Ok(())
    }

    pub fn flush_cache_for_handle(&self) -> Result<()> {
        Ok(())
    }

    pub fn invalidate_cache_for_handle(&self) -> Result<()> {
        Ok(())
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn is_const_tensor(&self) -> bool {
        self.spec.attribute() == TensorAttribute::Constant
    }

    /// Copy of the tensor's bytes.
    pub fn data(&self) -> Vec<u8> {
        lock(&self.data).clone()
    }
}
