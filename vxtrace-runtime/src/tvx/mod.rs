//! Traced object model.
//!
//! Drop-in wrappers for the [`vx`](crate::vx) types. Each traced call writes
//! one replayable statement to the session's call log, then forwards to the
//! wrapped runtime object.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vxtrace_core::TraceSession;
//! use vxtrace_runtime::tvx::{self, ops};
//! use vxtrace_runtime::vx::{DataType, TensorAttribute};
//!
//! let session = TraceSession::from_env();
//! let context = tvx::Context::create(&session);
//! let graph = context.create_graph();
//! let spec = tvx::TensorSpec::with_shape(&session, DataType::Float32, vec![4], TensorAttribute::Input);
//! let input = graph.create_tensor(&spec, None);
//! let relu = graph.create_operation(ops::Relu {});
//! relu.bind_input(&input);
//! ```
//!
//! produces
//!
//! ```text
//! auto context_0 = tim::vx::Context::Create();
//! auto graph_0 = context_0->CreateGraph();
//! auto spec_0 = tim::vx::TensorSpec((tim::vx::DataType)9, trace::Replayer::get_vector<uint32_t>(0, 1), (tim::vx::TensorAttribute)8);
//! auto tensor_0 = graph_0->CreateTensor(spec_0, nullptr);
//! auto Relu_0 = graph_0->CreateOperation<tim::vx::ops::Relu>();
//! Relu_0->BindInput(tensor_0);
//! ```
//!
//! # Ownership
//!
//! A [`Graph`] owns the tensors and operations it creates; they hold a weak
//! reference back to it.

mod context;
mod graph;
pub mod ops;
mod quantization;
mod tensor;

pub use context::Context;
pub use graph::Graph;
pub use ops::{OpSpec, Operation};
pub use quantization::Quantization;
pub use tensor::{Tensor, TensorSpec};

use crate::vx;
use std::sync::Arc;
use vxtrace_core::trace::{Created, TraceHandle, TraceSession};
use vxtrace_core::trace_enum;

trace_enum!(vx::DataType, "tim::vx::DataType");
trace_enum!(vx::TensorAttribute, "tim::vx::TensorAttribute");
trace_enum!(vx::QuantType, "tim::vx::QuantType");
trace_enum!(vx::OverflowPolicy, "tim::vx::OverflowPolicy");
trace_enum!(vx::RoundingPolicy, "tim::vx::RoundingPolicy");
trace_enum!(vx::RoundType, "tim::vx::RoundType");
trace_enum!(vx::PadType, "tim::vx::PadType");
trace_enum!(vx::PadMode, "tim::vx::ops::Pad::pad_mode_type");

/// State every wrapper carries: its session, name, handle and runtime object.
pub(crate) struct Core<T> {
    session: Arc<TraceSession>,
    name: String,
    handle: TraceHandle,
    target: Arc<T>,
}

impl<T> Core<T> {
    pub(crate) fn new(session: &Arc<TraceSession>, created: Created<T>) -> Self {
        Self {
            session: session.clone(),
            name: created.name,
            handle: created.handle,
            target: created.target,
        }
    }
}

impl<T> Clone for Core<T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            name: self.name.clone(),
            handle: self.handle,
            target: self.target.clone(),
        }
    }
}

/// Implement `Traced` (plus by-value `Loggable`/`Forwardable`) for a wrapper with a `core` field.
macro_rules! impl_traced {
    ($wrapper:ty, $target:ty, $type_name:literal, $access:expr) => {
        impl vxtrace_core::trace::Traced for $wrapper {
            type Target = $target;
            const TYPE_NAME: &'static str = $type_name;
            const ACCESS: vxtrace_core::trace::Access = $access;

            fn trace_name(&self) -> &str {
                &self.core.name
            }

            fn trace_handle(&self) -> vxtrace_core::trace::TraceHandle {
                self.core.handle
            }

            fn target(&self) -> &$target {
                &self.core.target
            }

            fn shared_target(&self) -> std::sync::Arc<$target> {
                self.core.target.clone()
            }
        }

        impl vxtrace_core::trace::Loggable for $wrapper {
            fn trace_arg(&self) -> vxtrace_core::trace::TraceArg<'_> {
                vxtrace_core::trace::TraceArg::traced(self)
            }
        }

        impl vxtrace_core::trace::Forwardable for $wrapper {
            type Forwarded<'a> = &'a $target;

            fn forward(&self) -> &$target {
                vxtrace_core::trace::unwrap_ref(self)
            }
        }

        impl $wrapper {
            pub fn session(&self) -> &std::sync::Arc<vxtrace_core::trace::TraceSession> {
                &self.core.session
            }
        }
    };
}

pub(crate) use impl_traced;
