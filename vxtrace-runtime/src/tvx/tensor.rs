use super::{impl_traced, Core, Graph, Quantization};
use crate::vx::{self, DataType, ShapeType, TensorAttribute};
use anyhow::Result;
use log::warn;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use vxtrace_core::trace::{
    Access, CallDescriptor, Forwardable, ObjectId, Shared, TraceArg, TraceSession, Traced,
};

/// Traced tensor spec. A value type: methods render as `spec_0.Method(...)`.
#[derive(Clone)]
pub struct TensorSpec {
    core: Core<vx::TensorSpec>,
    quantization: Arc<Mutex<Option<Quantization>>>,
}

impl_traced!(TensorSpec, vx::TensorSpec, "TensorSpec", Access::Value);

impl TensorSpec {
    fn construct(
        session: &Arc<TraceSession>,
        call: CallDescriptor<'_>,
        quantization: Option<Quantization>,
        target: impl FnOnce() -> vx::TensorSpec,
    ) -> Self {
        let created = session.intercept_new(call, |_, _| {}, || Arc::new(target()));
        Self {
            core: Core::new(session, created),
            quantization: Arc::new(Mutex::new(quantization)),
        }
    }

    pub fn new(session: &Arc<TraceSession>) -> Self {
        let call = CallDescriptor::constructor("TensorSpec", session.prefix_for(Self::TYPE_NAME));
        Self::construct(session, call, None, vx::TensorSpec::new)
    }

    pub fn with_shape(
        session: &Arc<TraceSession>,
        dtype: DataType,
        shape: ShapeType,
        attr: TensorAttribute,
    ) -> Self {
        let call = CallDescriptor::constructor("TensorSpec", session.prefix_for(Self::TYPE_NAME))
            .arg(&dtype)
            .arg(&shape)
            .arg(&attr);
        Self::construct(session, call, None, || {
            vx::TensorSpec::with_shape(dtype.forward(), shape.forward(), attr.forward())
        })
    }

    pub fn with_quantization(
        session: &Arc<TraceSession>,
        dtype: DataType,
        shape: ShapeType,
        attr: TensorAttribute,
        quantization: &Quantization,
    ) -> Self {
        let call = CallDescriptor::constructor("TensorSpec", session.prefix_for(Self::TYPE_NAME))
            .arg(&dtype)
            .arg(&shape)
            .arg(&attr)
            .arg(quantization);
        Self::construct(session, call, Some(quantization.clone()), || {
            vx::TensorSpec::with_quantization(
                dtype.forward(),
                shape.forward(),
                attr.forward(),
                Shared(quantization).forward(),
            )
        })
    }

    pub fn set_data_type(&self, dtype: DataType) -> &Self {
        let call = CallDescriptor::method(self, "SetDataType").arg(&dtype);
        self.session().intercept(call, || {
            self.target().set_data_type(dtype.forward());
        });
        self
    }

    pub fn set_shape(&self, shape: ShapeType) -> &Self {
        let call = CallDescriptor::method(self, "SetShape").arg(&shape);
        self.session().intercept(call, || {
            self.target().set_shape(shape.forward());
        });
        self
    }

    pub fn set_attribute(&self, attr: TensorAttribute) -> &Self {
        let call = CallDescriptor::method(self, "SetAttribute").arg(&attr);
        self.session().intercept(call, || {
            self.target().set_attribute(attr.forward());
        });
        self
    }

    pub fn set_quantization(&self, quantization: &Quantization) -> &Self {
        let call = CallDescriptor::method(self, "SetQuantization").arg(quantization);
        self.session().intercept(call, || {
            self.target().set_quantization(Shared(quantization).forward());
        });
        *self.quantization.lock().unwrap_or_else(PoisonError::into_inner) = Some(quantization.clone());
        self
    }

    /// Copy of this spec marked TRANSIENT, as a new traced spec.
    pub fn as_transient_spec(&self) -> TensorSpec {
        let call = CallDescriptor::factory(self, "AsTransientSpec", self.session().prefix_for(Self::TYPE_NAME));
        let created = self
            .session()
            .intercept_new(call, |_, _| {}, || self.target().as_transient_spec());
        Self {
            core: Core::new(self.session(), created),
            quantization: Arc::new(Mutex::new(self.quantization())),
        }
    }

    pub fn element_num(&self) -> i64 {
        self.session()
            .intercept(CallDescriptor::method(self, "GetElementNum"), || self.target().element_num())
    }

    pub fn element_byte_size(&self) -> i64 {
        self.session().intercept(CallDescriptor::method(self, "GetElementByteSize"), || {
            self.target().element_byte_size()
        })
    }

    pub fn byte_size(&self) -> i64 {
        self.session()
            .intercept(CallDescriptor::method(self, "GetByteSize"), || self.target().byte_size())
    }

    pub fn data_type(&self) -> DataType {
        self.target().data_type()
    }

    pub fn shape(&self) -> ShapeType {
        self.target().shape()
    }

    pub fn attribute(&self) -> TensorAttribute {
        self.target().attribute()
    }

    /// Traced quantization attached to this spec, if one was given.
    pub fn quantization(&self) -> Option<Quantization> {
        self.quantization
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Traced tensor, owned by the [`Graph`] that created it.
pub struct Tensor {
    core: Core<vx::Tensor>,
    /// Spec the tensor was created from; placeholders have none.
    spec: Option<TensorSpec>,
    graph: Weak<Graph>,
}

impl_traced!(Tensor, vx::Tensor, "Tensor", Access::Pointer);

impl Tensor {
    pub(crate) fn new(core: Core<vx::Tensor>, spec: Option<TensorSpec>, graph: Weak<Graph>) -> Self {
        Self { core, spec, graph }
    }

    pub fn graph(&self) -> Option<Arc<Graph>> {
        self.graph.upgrade()
    }

    pub fn copy_data_to_tensor(&self, data: &[u8]) -> Result<()> {
        let size = data.len();
        let call = CallDescriptor::method(self, "CopyDataToTensor")
            .raw_arg(TraceArg::buffer(Some(data)))
            .arg(&size);
        self.session()
            .intercept(call, || self.target().copy_data_to_tensor(data.forward()))
    }

    /// Copy the tensor's bytes into `out`. The buffer is dumped as passed.
    pub fn copy_data_from_tensor(&self, out: &mut [u8]) -> Result<()> {
        let byte_size = (self.target().spec().byte_size().max(0) as usize).min(out.len());
        let snapshot = out[..byte_size].to_vec();
        let call = CallDescriptor::method(self, "CopyDataFromTensor")
            .raw_arg(TraceArg::buffer(Some(&snapshot)));
        self.session()
            .intercept(call, || self.target().copy_data_from_tensor(out))
    }

    pub fn flush_cache_for_handle(&self) -> Result<()> {
        self.session().intercept(CallDescriptor::method(self, "FlushCacheForHandle"), || {
            self.target().flush_cache_for_handle()
        })
    }

    pub fn invalidate_cache_for_handle(&self) -> Result<()> {
        self.session().intercept(CallDescriptor::method(self, "InvalidateCacheForHandle"), || {
            self.target().invalidate_cache_for_handle()
        })
    }

    pub fn is_placeholder(&self) -> bool {
        self.session()
            .intercept(CallDescriptor::method(self, "IsPlaceHolder"), || self.target().is_placeholder())
    }

    pub fn is_const_tensor(&self) -> bool {
        self.session()
            .intercept(CallDescriptor::method(self, "IsConstTensor"), || self.target().is_const_tensor())
    }

    pub fn data_type(&self) -> DataType {
        self.session()
            .intercept(CallDescriptor::method(self, "GetDataType"), || self.target().data_type())
    }

    // Shape, id and spec reads are not part of the replay program.

    pub fn shape(&self) -> ShapeType {
        self.target().shape()
    }

    pub fn id(&self) -> u32 {
        self.target().id()
    }

    pub fn spec(&self) -> Option<&TensorSpec> {
        self.spec.as_ref()
    }

    /// Traced quantization of this tensor, recovered through the identity registry.
    pub fn quantization(&self) -> Option<Quantization> {
        let target = self
            .session()
            .intercept(CallDescriptor::method(self, "GetQuantization"), || self.target().quantization());
        let handle = self.session().lookup_trace_wrapper(ObjectId::of_arc(&target));
        let cached = self.spec.as_ref().and_then(TensorSpec::quantization);
        match (handle, cached) {
            (Some(handle), Some(quant)) if quant.trace_handle() == handle => Some(quant),
            _ => {
                warn!("{}: quantization has no traced wrapper", self.trace_name());
                None
            }
        }
    }
}
