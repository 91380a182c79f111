//! Reference object model.
//!
//! Context, graphs, tensors, specs, quantization and operations with the
//! same shape as the traced API. Graphs validate bindings on compile and
//! serialize their structure as the "compiled binary"; nothing is computed.

mod graph;
mod operation;
pub mod ops;
mod quantization;
mod tensor;
mod types;

pub use graph::{Context, Graph, GraphSummary, OperationSummary, TensorSummary};
pub use operation::Operation;
pub use ops::OpType;
pub use quantization::{QuantParams, Quantization};
pub use tensor::{Tensor, TensorSpec};
pub use types::{
    DataType, OverflowPolicy, PadMode, PadType, QuantType, RoundType, RoundingConfig, RoundingPolicy,
    ShapeType, TensorAttribute,
};

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
