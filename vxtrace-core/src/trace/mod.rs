//! API Call Tracing
//!
//! Records every call made through the traced wrapper layer as a replayable
//! C++ statement, with bulk arguments stored in a side binary file.
//!
//! # Overview
//!
//! - **Payload store** ([`payload`]): append-only binary file, addressed by byte offset
//! - **Call log** ([`call_log`]): append-only statement file, flushed per statement
//! - **Naming** ([`registry`]): `prefix + counter` names and runtime identity maps
//! - **Arguments** ([`param`], [`forward`]): rendering to source text and unwrapping for the runtime
//! - **Interception** ([`intercept`]): the per-call pipeline shared by all wrappers
//! - **Session** ([`session`]): owns all of the above
//!
//! # Usage
//!
//! ```rust,no_run
//! use vxtrace_core::trace::{CallDescriptor, TraceSession};
//!
//! // TRACE_DUMP_PREFIX=/tmp/run_ puts the files at /tmp/run_trace_log.cc and /tmp/run_trace_bin.bin
//! let session = TraceSession::from_env();
//! let data = vec![1i32, 2, 3];
//! let call = CallDescriptor::constructor("Buffer", "obj_").arg(&data);
//! session.intercept_new(call, |_, _| {}, || std::sync::Arc::new(data.clone()));
//! println!("{:?}", session.statistics());
//! ```
//!
//! # Failure Model
//!
//! Tracing never blocks the traced program. Open, write and short-write
//! failures are logged with `log::error!` and the call is still forwarded;
//! the trace is then incomplete.

pub mod call_log;
pub mod config;
pub mod error;
pub mod forward;
pub mod intercept;
pub mod param;
pub mod payload;
pub mod registry;
pub mod session;

pub use call_log::{CallLog, PendingMessages};
pub use config::{TraceConfig, PREFIX_ENV};
pub use error::{TraceError, TraceResult};
pub use forward::{unwrap_all, unwrap_ref, Access, Forwardable, Shared, Traced};
pub use intercept::{CallDescriptor, CallKind, Created, LogBuilder, LogMode};
pub use param::{Element, Fundamental, Loggable, ParamCache, TraceArg, TraceEnum};
pub use payload::PayloadStore;
pub use registry::{IdentityRegistry, NameAllocator, ObjectId, TraceHandle};
pub use session::TraceSession;

use serde::{Deserialize, Serialize};

/// Counters describing a trace session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStatistics {
    /// Intercepted calls written to the call log.
    pub statements: u64,
    pub names_allocated: u64,
    /// Runtime objects with a bound name.
    pub objects_named: u64,
    pub log_bytes: u64,
    pub payload_bytes: u64,
    pub payload_dumps: u64,
}
