//! Traced operations.
//!
//! Operator descriptors are plain structs; [`Graph::create_operation`](super::Graph::create_operation)
//! logs them as `graph_0->CreateOperation<tim::vx::ops::Name>(args)` and
//! returns a traced [`Operation`] named `Name_N`.

use super::{impl_traced, Core, Graph, Tensor};
use crate::vx::{self, OverflowPolicy, PadMode, PadType, RoundType, RoundingPolicy};
use log::warn;
use std::sync::{Arc, Weak};
use vxtrace_core::trace::{Access, CallDescriptor, Forwardable, LogBuilder, Loggable, TraceArg, Traced};

/// An operator that can be created in a traced graph.
pub trait OpSpec {
    /// Operator name in the `ops` namespace, also the name prefix stem.
    const NAME: &'static str;

    /// Whether `log_args` inserts statements before the creation call.
    const CACHED: bool = false;

    /// Log the constructor arguments.
    fn log_args(&self, builder: &mut LogBuilder<'_>);

    fn to_target(&self) -> vx::OpType;
}

macro_rules! define_ops {
    ($( $(#[$meta:meta])* $name:ident { $($field:ident : $ty:ty),* $(,)? } )*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq)]
            pub struct $name {
                $(pub $field: $ty),*
            }

            impl OpSpec for $name {
                const NAME: &'static str = stringify!($name);

                #[allow(unused_variables)]
                fn log_args(&self, builder: &mut LogBuilder<'_>) {
                    $( builder.arg(&self.$field.trace_arg()); )*
                }

                fn to_target(&self) -> vx::OpType {
                    vx::OpType::$name { $($field: self.$field.clone()),* }
                }
            }
        )*
    };
}

define_ops! {
    Relu {}
    Relu6 {}
    Sigmoid {}
    Tanh {}
    Add {}
    Sub {}
    Multiply { scale: f32 }
    Div { scale: f32 }
    Matmul {
        transpose_a: bool,
        transpose_b: bool,
        adjoint_a: bool,
        adjoint_b: bool,
    }
    FullyConnected { axis: u32, weights: u32 }
    Reshape { size: Vec<u32> }
    Transpose { perm: Vec<u32> }
    Softmax { beta: f32, axis: i32 }
    Concat { axis: u32, input_cnt: i32 }
    /// 2-D convolution; `pad` is only used with `PadType::None`.
    Conv2d {
        weights: i32,
        padding: PadType,
        ksize: [u32; 2],
        stride: [u32; 2],
        dilation: [u32; 2],
        pad: [u32; 4],
        multiplier: i32,
    }
    Pad {
        front_size: Vec<u32>,
        back_size: Vec<u32>,
        const_val: i32,
        pad_mode: PadMode,
    }
}

/// Precompiled network binary graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Nbg {
    pub binary: Vec<u8>,
    pub input_count: usize,
    pub output_count: usize,
}

impl OpSpec for Nbg {
    const NAME: &'static str = "NBG";
    const CACHED: bool = true;

    /// The binary is dumped and declared as a local vector ahead of the call.
    fn log_args(&self, builder: &mut LogBuilder<'_>) {
        let offset = builder.dump(&self.binary);
        let name = builder.allocate_name("nbg_buf_vec_");
        builder.insert_before(format!(
            "std::vector<char> {name} = trace::Replayer::get_vector<char>({offset}, {});\n",
            self.binary.len()
        ));
        builder.arg(&TraceArg::expr(format!("{name}.data()")));
        builder.arg(&self.input_count.trace_arg());
        builder.arg(&self.output_count.trace_arg());
    }

    fn to_target(&self) -> vx::OpType {
        vx::OpType::Nbg {
            binary: self.binary.clone(),
            input_count: self.input_count,
            output_count: self.output_count,
        }
    }
}

/// Traced operation, owned by the [`Graph`] that created it.
pub struct Operation {
    core: Core<vx::Operation>,
    graph: Weak<Graph>,
}

impl_traced!(Operation, vx::Operation, "Operation", Access::Pointer);

impl Operation {
    pub(crate) fn new(core: Core<vx::Operation>, graph: Weak<Graph>) -> Self {
        Self { core, graph }
    }

    pub fn graph(&self) -> Option<Arc<Graph>> {
        self.graph.upgrade()
    }

    pub fn op_name(&self) -> &'static str {
        self.target().name()
    }

    pub fn bind_input(&self, tensor: &Arc<Tensor>) -> &Self {
        let call = CallDescriptor::method(self, "BindInput").arg(tensor);
        self.session().intercept(call, || {
            self.target().bind_input(tensor.forward());
        });
        self
    }

    pub fn bind_output(&self, tensor: &Arc<Tensor>) -> &Self {
        let call = CallDescriptor::method(self, "BindOutput").arg(tensor);
        self.session().intercept(call, || {
            self.target().bind_output(tensor.forward());
        });
        self
    }

    pub fn bind_inputs(&self, tensors: &[Arc<Tensor>]) -> &Self {
        let call = CallDescriptor::method(self, "BindInputs").arg(tensors);
        self.session().intercept(call, || {
            self.target().bind_inputs(tensors.forward());
        });
        self
    }

    pub fn bind_outputs(&self, tensors: &[Arc<Tensor>]) -> &Self {
        let call = CallDescriptor::method(self, "BindOutputs").arg(tensors);
        self.session().intercept(call, || {
            self.target().bind_outputs(tensors.forward());
        });
        self
    }

    pub fn set_rounding_policy(
        &self,
        overflow: OverflowPolicy,
        rounding: RoundingPolicy,
        round_type: RoundType,
        accumulator_bits: u32,
    ) -> &Self {
        let call = CallDescriptor::method(self, "SetRoundingPolicy")
            .arg(&overflow)
            .arg(&rounding)
            .arg(&round_type)
            .arg(&accumulator_bits);
        self.session().intercept(call, || {
            self.target().set_rounding_policy(
                overflow.forward(),
                rounding.forward(),
                round_type.forward(),
                accumulator_bits.forward(),
            );
        });
        self
    }

    /// `set_rounding_policy(SATURATE, RTNE, FLOOR, 0)`.
    pub fn set_default_rounding_policy(&self) -> &Self {
        self.set_rounding_policy(
            OverflowPolicy::Saturate,
            RoundingPolicy::Rtne,
            RoundType::Floor,
            0,
        )
    }

    /// Bound constant inputs, mapped back to their traced tensors.
    pub fn constant_inputs_tensor(&self) -> Vec<Arc<Tensor>> {
        let targets = self.session().intercept(
            CallDescriptor::method(self, "ConstantInputsTensor"),
            || self.target().constant_inputs_tensor(),
        );
        let Some(graph) = self.graph() else {
            warn!("{}: graph dropped, constant inputs unavailable", self.trace_name());
            return Vec::new();
        };
        targets
            .iter()
            .filter_map(|target| graph.traced_tensor(target))
            .collect()
    }

    /// Copy this operation into `graph`.
    pub fn clone_to(&self, graph: &Arc<Graph>) -> Arc<Operation> {
        let prefix = format!("{}_", self.op_name());
        let call = CallDescriptor::factory(self, "Clone", prefix).arg(graph);
        let created = self
            .session()
            .intercept_new(call, |_, _| {}, || self.target().clone_to(&graph.forward()));
        graph.adopt_operation(Operation::new(
            Core::new(self.session(), created),
            Arc::downgrade(graph),
        ))
    }
}
