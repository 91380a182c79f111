//! Trace Replay
//!
//! Read-side counterpart of [`crate::trace`]. A replay program is the call log
//! compiled against a `trace::Replayer` that loads buffers back out of the
//! payload store; [`Replayer`] is that loader. [`TraceScript`] and
//! [`ScriptValidator`] read a call log back for inspection and checking.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vxtrace_core::replay::{LoadExpr, Replayer};
//! use vxtrace_core::trace::TraceConfig;
//!
//! let replayer = Replayer::new(&TraceConfig::from_env());
//! let dims: Vec<u32> = replayer.read_vector(0, 4);
//! let expr = LoadExpr::parse("trace::Replayer::get_vector<float>(16, 8)")?;
//! let weights = replayer.load(&expr);
//! # Ok::<(), vxtrace_core::trace::TraceError>(())
//! ```

pub mod expr;
pub mod replayer;
pub mod script;
pub mod validator;

pub use expr::{ElementType, LoadExpr, LoadKind};
pub use replayer::{ReplayValue, Replayer};
pub use script::{Statement, TraceScript};
pub use validator::{Issue, ScriptValidator, Severity, ValidationReport};
