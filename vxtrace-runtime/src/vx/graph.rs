use crate::vx::{lock, OpType, Operation, Tensor, TensorAttribute, TensorSpec};
use anyhow::{bail, Context as _, Result};
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct GraphState {
    tensors: Vec<Arc<Tensor>>,
    operations: Vec<Arc<Operation>>,
    /// Tensor id to the ids of the operations reading it.
    consumers: BTreeMap<u32, Vec<u32>>,
    /// Tensor id to the id of the operation writing it.
    producers: BTreeMap<u32, u32>,
    compiled: bool,
    runs: u64,
    next_tensor_id: u32,
    next_op_id: u32,
}

#[derive(Debug, Serialize)]
pub struct TensorSummary {
    pub id: u32,
    pub dtype: crate::vx::DataType,
    pub shape: Vec<u32>,
    pub attr: Option<TensorAttribute>,
}

#[derive(Debug, Serialize)]
pub struct OperationSummary {
    pub id: u32,
    pub op: OpType,
    pub inputs: Vec<u32>,
    pub outputs: Vec<u32>,
}

/// Structure of a graph, also used as its compiled binary.
#[derive(Debug, Serialize)]
pub struct GraphSummary {
    pub tensors: Vec<TensorSummary>,
    pub operations: Vec<OperationSummary>,
}

/// A graph of tensors and operations.
#[derive(Debug, Default)]
pub struct Graph {
    state: Mutex<GraphState>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_tensor(&self, spec: &TensorSpec, data: Option<&[u8]>) -> Arc<Tensor> {
        let mut state = lock(&self.state);
        let tensor = Arc::new(Tensor::new(state.next_tensor_id, spec, data));
        state.next_tensor_id += 1;
        state.tensors.push(tensor.clone());
        tensor
    }

    /// Input/output tensor backed by caller-provided initial data.
    pub fn create_io_tensor(&self, spec: &TensorSpec, data: Option<&[u8]>) -> Arc<Tensor> {
        self.create_tensor(spec, data)
    }

    pub fn create_tensor_placeholder(&self) -> Arc<Tensor> {
        let mut state = lock(&self.state);
        let tensor = Arc::new(Tensor::placeholder(state.next_tensor_id));
        state.next_tensor_id += 1;
        state.tensors.push(tensor.clone());
        tensor
    }

    pub fn create_operation(&self, op: OpType) -> Arc<Operation> {
        let mut state = lock(&self.state);
        let operation = Arc::new(Operation::new(state.next_op_id, op));
        state.next_op_id += 1;
        state.operations.push(operation.clone());
        operation
    }

    pub fn compile(&self) -> Result<()> {
        let mut state = lock(&self.state);
        for op in &state.operations {
            if op.outputs().is_empty() {
                bail!("{}#{} has no output bound", op.name(), op.id());
            }
            if let Some(arity) = op.op_type().input_arity() {
                let bound = op.inputs().len();
                if bound != arity {
                    bail!(
                        "{}#{} expects {} inputs, {} bound",
                        op.name(),
                        op.id(),
                        arity,
                        bound
                    );
                }
            }
        }
        state.compiled = true;
        Ok(())
    }

    /// Compile and serialize the graph.
    ///
    /// Without a buffer only `size` is set. With one, up to `buf.len()` bytes
    /// of the binary are written and `size` is set to the full length.
    pub fn compile_to_binary(&self, buf: Option<&mut [u8]>, size: &mut usize) -> Result<()> {
        self.compile()?;
        let binary = serde_json::to_vec(&self.summary()).context("Failed to serialize graph")?;
        *size = binary.len();
        if let Some(buf) = buf {
            let len = buf.len().min(binary.len());
            buf[..len].copy_from_slice(&binary[..len]);
        }
        Ok(())
    }

    pub fn run(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.compiled {
            bail!("graph must be compiled before run");
        }
        state.runs += 1;
        Ok(())
    }

    /// Rebuild the tensor to consuming operations map from current bindings.
    pub fn update_tensor_consumers_map(&self) {
        let mut state = lock(&self.state);
        let mut consumers: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for op in &state.operations {
            for input in op.inputs() {
                consumers.entry(input.id()).or_default().push(op.id());
            }
        }
        state.consumers = consumers;
    }

    /// Rebuild the tensor to producing operation map from current bindings.
    pub fn update_tensor_producer_map(&self) {
        let mut state = lock(&self.state);
        let mut producers = BTreeMap::new();
        for op in &state.operations {
            for output in op.outputs() {
                producers.insert(output.id(), op.id());
            }
        }
        state.producers = producers;
    }

    /// Operations reading tensor `id`, as of the last consumers map update.
    pub fn consumers_of(&self, id: u32) -> Vec<u32> {
        lock(&self.state).consumers.get(&id).cloned().unwrap_or_default()
    }

    /// Operation writing tensor `id`, as of the last producer map update.
    pub fn producer_of(&self, id: u32) -> Option<u32> {
        lock(&self.state).producers.get(&id).copied()
    }

    pub fn is_compiled(&self) -> bool {
        lock(&self.state).compiled
    }

    pub fn run_count(&self) -> u64 {
        lock(&self.state).runs
    }

    pub fn inputs_tensor(&self) -> Vec<Arc<Tensor>> {
        self.tensors_with(TensorAttribute::Input)
    }

    pub fn outputs_tensor(&self) -> Vec<Arc<Tensor>> {
        self.tensors_with(TensorAttribute::Output)
    }

    pub fn tensors(&self) -> Vec<Arc<Tensor>> {
        lock(&self.state).tensors.clone()
    }

    pub fn operations(&self) -> Vec<Arc<Operation>> {
        lock(&self.state).operations.clone()
    }

    pub fn summary(&self) -> GraphSummary {
        let state = lock(&self.state);
        let ids = |tensors: Vec<Arc<Tensor>>| -> Vec<u32> { tensors.iter().map(|t| t.id()).collect() };
        GraphSummary {
            tensors: state
                .tensors
                .iter()
                .map(|t| TensorSummary {
                    id: t.id(),
                    dtype: t.data_type(),
                    shape: t.shape(),
                    attr: (!t.is_placeholder()).then(|| t.spec().attribute()),
                })
                .collect(),
            operations: state
                .operations
                .iter()
                .map(|op| OperationSummary {
                    id: op.id(),
                    op: op.op_type().clone(),
                    inputs: ids(op.inputs()),
                    outputs: ids(op.outputs()),
                })
                .collect(),
        }
    }

    pub fn print_graph(&self) {
        let summary = self.summary();
        info!(
            "Graph: {} tensors, {} operations",
            summary.tensors.len(),
            summary.operations.len()
        );
        for op in &summary.operations {
            info!("  {}#{}: {:?} -> {:?}", op.op.name(), op.id, op.inputs, op.outputs);
        }
    }

    fn tensors_with(&self, attr: TensorAttribute) -> Vec<Arc<Tensor>> {
        lock(&self.state)
            .tensors
            .iter()
            .filter(|t| !t.is_placeholder() && t.spec().attribute() == attr)
            .cloned()
            .collect()
    }
}

/// Entry point of the object model.
#[derive(Debug, Default)]
pub struct Context {
    graphs: Mutex<usize>,
}

impl Context {
    pub fn create() -> Arc<Context> {
        Arc::new(Self::default())
    }

    pub fn create_graph(&self) -> Arc<Graph> {
        *lock(&self.graphs) += 1;
        Arc::new(Graph::new())
    }

    pub fn graph_count(&self) -> usize {
        *lock(&self.graphs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vx::DataType;

    fn spec(attr: TensorAttribute) -> TensorSpec {
        TensorSpec::with_shape(DataType::Float32, &[2], attr)
    }

    #[test]
    fn test_compile_rejects_unbound_output() {
        let graph = Context::create().create_graph();
        let input = graph.create_tensor(&spec(TensorAttribute::Input), None);
        graph.create_operation(OpType::Relu {}).bind_input(input);
        assert!(graph.compile().is_err());
        assert!(!graph.is_compiled());
    }

    #[test]
    fn test_compile_checks_input_arity() {
        let graph = Context::create().create_graph();
        let a = graph.create_tensor(&spec(TensorAttribute::Input), None);
        let out = graph.create_tensor(&spec(TensorAttribute::Output), None);
        let add = graph.create_operation(OpType::Add {});
        add.bind_input(a.clone()).bind_output(out);
        assert!(graph.compile().is_err());
        add.bind_input(a);
        graph.compile().unwrap();
        graph.run().unwrap();
        assert_eq!(graph.run_count(), 1);
    }

    #[test]
    fn test_run_requires_compile() {
        let graph = Graph::new();
        assert!(graph.run().is_err());
    }

    #[test]
    fn test_compile_to_binary_truncates_to_buffer() {
        let graph = Graph::new();
        let mut size = 0;
        graph.compile_to_binary(None, &mut size).unwrap();
        let mut short = vec![0u8; 4];
        graph.compile_to_binary(Some(short.as_mut_slice()), &mut size).unwrap();
        let full = serde_json::to_vec(&graph.summary()).unwrap();
        assert_eq!(size, full.len());
        assert_eq!(short, full[..4]);
    }

    #[test]
    fn test_consumer_and_producer_maps() {
        let graph = Graph::new();
        let a = graph.create_tensor(&spec(TensorAttribute::Input), None);
        let mid = graph.create_tensor(&spec(TensorAttribute::Transient), None);
        let out = graph.create_tensor(&spec(TensorAttribute::Output), None);
        let first = graph.create_operation(OpType::Relu {});
        first.bind_input(a.clone()).bind_output(mid.clone());
        let second = graph.create_operation(OpType::Add {});
        second.bind_input(a).bind_input(mid).bind_output(out);

        assert!(graph.consumers_of(0).is_empty());
        graph.update_tensor_consumers_map();
        assert_eq!(graph.consumers_of(0), vec![0, 1]);
        assert_eq!(graph.consumers_of(1), vec![1]);
        assert_eq!(graph.producer_of(1), None);
        graph.update_tensor_producer_map();
        assert_eq!(graph.producer_of(1), Some(0));
        assert_eq!(graph.producer_of(2), Some(1));
        assert_eq!(graph.producer_of(0), None);
    }

    #[test]
    fn test_io_tensor_lookup_skips_placeholders() {
        let graph = Graph::new();
        graph.create_tensor(&spec(TensorAttribute::Input), None);
        graph.create_tensor_placeholder();
        graph.create_tensor(&spec(TensorAttribute::Output), None);
        assert_eq!(graph.inputs_tensor().len(), 1);
        assert_eq!(graph.outputs_tensor()[0].id(), 2);
        assert_eq!(graph.tensors().len(), 3);
    }
}
