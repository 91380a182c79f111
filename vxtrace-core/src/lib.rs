//! vxtrace core
//!
//! Record/replay plumbing for an object-oriented tensor/graph API. A traced
//! program writes two files: a call log of replayable C++ statements and a
//! binary payload store holding the buffers those statements reference.
//!
//! # Modules
//! - [`trace`]: the write side (session, payload store, call log, naming, argument rendering, interception)
//! - [`replay`]: the read side (payload loading, log parsing, validation)

pub mod replay;
pub mod trace;

pub use replay::{LoadExpr, Replayer, ReplayValue, ScriptValidator, TraceScript};
pub use trace::{
    CallDescriptor, CallKind, Forwardable, LogBuilder, LogMode, Loggable, ObjectId, TraceArg,
    TraceConfig, TraceError, TraceHandle, TraceResult, TraceSession, TraceStatistics, Traced,
};
