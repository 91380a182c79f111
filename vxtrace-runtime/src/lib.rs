//! vxtrace runtime
//!
//! - [`vx`]: a reference implementation of the tensor/graph object model that
//!   keeps graph bookkeeping only (no kernels)
//! - [`tvx`]: the traced wrapper layer; every public call is logged to a
//!   [`TraceSession`](vxtrace_core::TraceSession) and then forwarded to `vx`

pub mod tvx;
pub mod vx;
