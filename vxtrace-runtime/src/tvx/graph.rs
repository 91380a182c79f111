use super::{impl_traced, Core, OpSpec, Operation, Tensor, TensorSpec};
use crate::vx::{self, DataType, TensorAttribute};
use anyhow::Result;
use log::{error, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use vxtrace_core::trace::{
    Access, CallDescriptor, Forwardable, LogBuilder, ObjectId, TraceArg, TraceHandle, TraceSession,
    Traced,
};

#[derive(Default)]
struct Children {
    tensors: HashMap<TraceHandle, Arc<Tensor>>,
    operations: Vec<Arc<Operation>>,
}

/// Traced graph. Owns every tensor and operation created through it.
pub struct Graph {
    core: Core<vx::Graph>,
    this: Weak<Graph>,
    children: Mutex<Children>,
}

impl_traced!(Graph, vx::Graph, "Graph", Access::Pointer);

/// Fill used for constant tensors created without data: element type and value.
fn constant_fill(dtype: DataType) -> Option<(&'static str, &'static str, Vec<u8>)> {
    let fill = match dtype {
        DataType::Int32 => ("int", "42", bytemuck::bytes_of(&42i32).to_vec()),
        DataType::Float32 => ("float", "0.42", bytemuck::bytes_of(&0.42f32).to_vec()),
        DataType::Float16 => ("int16_t", "0", bytemuck::bytes_of(&0i16).to_vec()),
        DataType::Bool8 => ("char", "0", vec![0u8]),
        _ => return None,
    };
    Some(fill)
}

impl Graph {
    pub(crate) fn new(session: &Arc<TraceSession>, created: vxtrace_core::trace::Created<vx::Graph>) -> Arc<Self> {
        let core = Core::new(session, created);
        Arc::new_cyclic(|this| Self {
            core,
            this: this.clone(),
            children: Mutex::new(Children::default()),
        })
    }

    fn children(&self) -> MutexGuard<'_, Children> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn adopt_tensor(
        &self,
        created: vxtrace_core::trace::Created<vx::Tensor>,
        spec: Option<TensorSpec>,
    ) -> Arc<Tensor> {
        let tensor = Arc::new(Tensor::new(
            Core::new(self.session(), created),
            spec,
            self.this.clone(),
        ));
        self.children()
            .tensors
            .insert(tensor.trace_handle(), tensor.clone());
        tensor
    }

    pub(crate) fn adopt_operation(&self, operation: Operation) -> Arc<Operation> {
        let operation = Arc::new(operation);
        self.children().operations.push(operation.clone());
        operation
    }

    /// Traced wrapper of a runtime tensor created through this graph.
    pub fn traced_tensor(&self, target: &Arc<vx::Tensor>) -> Option<Arc<Tensor>> {
        let Some(handle) = self.session().lookup_trace_wrapper(ObjectId::of_arc(target)) else {
            warn!("{}: tensor {} was not created by a traced call", self.trace_name(), target.id());
            return None;
        };
        self.children().tensors.get(&handle).cloned()
    }

    pub fn tensors(&self) -> Vec<Arc<Tensor>> {
        self.children().tensors.values().cloned().collect()
    }

    pub fn operations(&self) -> Vec<Arc<Operation>> {
        self.children().operations.clone()
    }

    /// Create a tensor. A CONSTANT tensor created without data is filled with
    /// a fixed pattern so the replayed graph sees the same values.
    pub fn create_tensor(&self, spec: &TensorSpec, data: Option<&[u8]>) -> Arc<Tensor> {
        let fill = if data.is_none()
            && spec.attribute() == TensorAttribute::Constant
            && self.session().config().fill_constant_tensors
        {
            match constant_fill(spec.data_type()) {
                Some(fill) => Some(fill),
                None => {
                    error!("No constant fill for {:?}", spec.data_type());
                    None
                }
            }
        } else {
            None
        };
        let elements = spec.target().element_num().max(0) as usize;

        let call = CallDescriptor::factory(self, "CreateTensor", self.session().prefix_for(Tensor::TYPE_NAME))
            .arg(spec)
            .raw_arg(TraceArg::buffer(data));
        let created = self.session().intercept_new(
            call,
            |builder: &mut LogBuilder<'_>, name: &str| {
                if let Some((cxx_type, value, _)) = &fill {
                    let vec_name = builder.allocate_name("fake_vec_");
                    builder.follow_with(format!(
                        "std::vector<{cxx_type}> {vec_name}({elements}, {value});\n"
                    ));
                    builder.follow_with(format!("{name}->CopyDataToTensor({vec_name}.data());\n"));
                }
            },
            || self.target().create_tensor(spec.forward(), data.forward()),
        );

        if let Some((_, _, pattern)) = &fill {
            let bytes = pattern.repeat(elements);
            if let Err(e) = created.target.copy_data_to_tensor(&bytes) {
                error!("Constant fill of {} failed: {e}", created.name);
            }
        }
        self.adopt_tensor(created, Some(spec.clone()))
    }

    pub fn create_io_tensor(&self, spec: &TensorSpec, data: Option<&[u8]>) -> Arc<Tensor> {
        let call = CallDescriptor::factory(self, "CreateIOTensor", self.session().prefix_for(Tensor::TYPE_NAME))
            .arg(spec)
            .raw_arg(TraceArg::buffer(data));
        let created = self.session().intercept_new(call, |_, _| {}, || {
            self.target().create_io_tensor(spec.forward(), data.forward())
        });
        self.adopt_tensor(created, Some(spec.clone()))
    }

    pub fn create_tensor_placeholder(&self) -> Arc<Tensor> {
        let call = CallDescriptor::factory(
            self,
            "CreateTensorPlaceHolder",
            self.session().prefix_for(Tensor::TYPE_NAME),
        );
        let created = self
            .session()
            .intercept_new(call, |_, _| {}, || self.target().create_tensor_placeholder());
        self.adopt_tensor(created, None)
    }

    pub fn create_operation<O: OpSpec>(&self, op: O) -> Arc<Operation> {
        let method = format!(
            "CreateOperation<{}::ops::{}>",
            self.session().config().namespace,
            O::NAME
        );
        let mut call = CallDescriptor::factory(self, method, format!("{}_", O::NAME));
        if O::CACHED {
            call = call.cached();
        }
        let created = self.session().intercept_new(
            call,
            |builder, _| op.log_args(builder),
            || self.target().create_operation(op.to_target()),
        );
        self.adopt_operation(Operation::new(
            Core::new(self.session(), created),
            self.this.clone(),
        ))
    }

    pub fn compile(&self) -> Result<()> {
        self.session()
            .intercept(CallDescriptor::method(self, "Compile"), || self.target().compile())
    }

    /// Query (`buf == None`) or fetch the compiled binary.
    ///
    /// The size out-parameter is traced by address: the first call declares
    /// `size_t nbg_size_N` ahead of itself and later calls with the same
    /// variable refer back to it.
    pub fn compile_to_binary(&self, buf: Option<&mut [u8]>, size: &mut usize) -> Result<()> {
        let size_id = ObjectId::of(&*size);
        let size_value = *size;
        let snapshot = buf
            .as_deref()
            .map(|b| b[..size_value.min(b.len())].to_vec());
        let call = CallDescriptor::method(self, "CompileToBinary").cached();
        self.session().intercept_with(
            call,
            |builder| {
                builder.arg_at(0, &TraceArg::buffer(snapshot.as_deref()));
                let name = match (&snapshot, builder.lookup_name(size_id)) {
                    (Some(_), Some(name)) => name,
                    (Some(_), None) => {
                        let name = builder.allocate_name("nbg_size_");
                        builder.bind_name(size_id, &name);
                        builder.insert_before(format!("size_t {name} = {size_value};\n"));
                        name
                    }
                    (None, _) => {
                        let name = builder.allocate_name("nbg_size_");
                        builder.bind_name(size_id, &name);
                        builder.insert_before(format!("size_t {name} = -1;\n"));
                        name
                    }
                };
                builder.arg_at(1, &TraceArg::expr(format!("&{name}")));
            },
            || self.target().compile_to_binary(buf, size),
        )
    }

    pub fn update_tensor_consumers_map(&self) {
        self.session().intercept(CallDescriptor::method(self, "UpdateTensorConsumersMap"), || {
            self.target().update_tensor_consumers_map()
        });
    }

    pub fn update_tensor_producer_map(&self) {
        self.session().intercept(CallDescriptor::method(self, "UpdateTensorProducerMap"), || {
            self.target().update_tensor_producer_map()
        });
    }

    pub fn run(&self) -> Result<()> {
        self.session()
            .intercept(CallDescriptor::method(self, "Run"), || self.target().run())
    }

    /// INPUT tensors, mapped back to their traced wrappers.
    pub fn inputs_tensor(&self) -> Vec<Arc<Tensor>> {
        let targets = self
            .session()
            .intercept(CallDescriptor::method(self, "InputsTensor"), || self.target().inputs_tensor());
        targets.iter().filter_map(|t| self.traced_tensor(t)).collect()
    }

    /// OUTPUT tensors, mapped back to their traced wrappers.
    pub fn outputs_tensor(&self) -> Vec<Arc<Tensor>> {
        let targets = self
            .session()
            .intercept(CallDescriptor::method(self, "OutputsTensor"), || self.target().outputs_tensor());
        targets.iter().filter_map(|t| self.traced_tensor(t)).collect()
    }

    pub fn print_graph(&self) {
        self.session()
            .intercept(CallDescriptor::method(self, "PrintGraph"), || self.target().print_graph());
    }
}
