use crate::vx::{lock, Graph, OpType, OverflowPolicy, RoundType, RoundingConfig, RoundingPolicy, Tensor};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct OpState {
    inputs: Vec<Arc<Tensor>>,
    outputs: Vec<Arc<Tensor>>,
    rounding: RoundingConfig,
}

/// An operation node of a graph.
#[derive(Debug)]
pub struct Operation {
    id: u32,
    op: OpType,
    state: Mutex<OpState>,
}

impl Operation {
    pub(crate) fn new(id: u32, op: OpType) -> Self {
        Self {
            id,
            op,
            state: Mutex::new(OpState::default()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn op_type(&self) -> &OpType {
        &self.op
    }

    pub fn name(&self) -> &'static str {
        self.op.name()
    }

    pub fn bind_input(&self, tensor: Arc<Tensor>) -> &Self {
        lock(&self.state).inputs.push(tensor);
        self
    }

    pub fn bind_output(&self, tensor: Arc<Tensor>) -> &Self {
        lock(&self.state).outputs.push(tensor);
        self
    }

    pub fn bind_inputs(&self, tensors: Vec<Arc<Tensor>>) -> &Self {
        lock(&self.state).inputs.extend(tensors);
        self
    }

    pub fn bind_outputs(&self, tensors: Vec<Arc<Tensor>>) -> &Self {
        lock(&self.state).outputs.extend(tensors);
        self
    }

    pub fn set_rounding_policy(
        &self,
        overflow: OverflowPolicy,
        rounding: RoundingPolicy,
        round_type: RoundType,
        accumulator_bits: u32,
    ) -> &Self {
        lock(&self.state).rounding = RoundingConfig {
            overflow,
            rounding,
            round_type,
            accumulator_bits,
        };
        self
    }

    pub fn rounding(&self) -> RoundingConfig {
        lock(&self.state).rounding
    }

    pub fn inputs(&self) -> Vec<Arc<Tensor>> {
        lock(&self.state).inputs.clone()
    }

    pub fn outputs(&self) -> Vec<Arc<Tensor>> {
        lock(&self.state).outputs.clone()
    }

    /// Bound inputs whose spec is CONSTANT.
    pub fn constant_inputs_tensor(&self) -> Vec<Arc<Tensor>> {
        lock(&self.state)
            .inputs
            .iter()
            .filter(|t| t.is_const_tensor())
            .cloned()
            .collect()
    }

    /// Create an unbound copy of this operation in `graph`.
    pub fn clone_to(&self, graph: &Graph) -> Arc<Operation> {
        let op = graph.create_operation(self.op.clone());
        lock(&op.state).rounding = self.rounding();
        op
    }
}
