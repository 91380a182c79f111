//! Call Interception
//!
//! Every traced API call goes through the same pipeline:
//!
//! 1. **Open**: pre-allocate the result name for object-producing calls and start the statement
//! 2. **Log arguments**: render each declared argument, then run the call's own hook
//! 3. **Close**: join the parameters, terminate the statement and flush it
//! 4. **Forward**: call into the runtime with the log lock released
//! 5. **Register**: bind the new object's identity to its name and wrapper handle
//! 6. **Return**: hand back the runtime result
//!
//! The per-method wrapper code only builds a [`CallDescriptor`]; the behavior
//! lives in [`TraceSession::intercept`] and its siblings.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vxtrace_core::trace::{CallDescriptor, TraceConfig, TraceSession};
//!
//! let session = TraceSession::open(TraceConfig::from_env());
//! let scales = vec![0.5f32, 0.25];
//! let call = CallDescriptor::constructor("Quantization", "quant_").arg(&scales);
//! let created = session.intercept_new(call, |_, _| {}, || std::sync::Arc::new(scales.clone()));
//! assert_eq!(created.name, "quant_0");
//! ```

use crate::trace::forward::{Access, Traced};
use crate::trace::param::{Loggable, ParamCache, TraceArg};
use crate::trace::registry::{ObjectId, TraceHandle};
use crate::trace::session::{LogState, TraceSession};
use crate::trace::TraceConfig;
use log::error;
use std::borrow::Cow;
use std::sync::{Arc, MutexGuard};

/// How a statement reaches the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// Pieces are written to the file as soon as they are known.
    Direct,
    /// The statement is staged and written as one block, so declarations can be inserted before it.
    Cached,
}

/// Shape of the statement a call produces.
#[derive(Debug, Clone)]
pub enum CallKind<'a> {
    /// `auto NAME = ns::Class(args);`
    Constructor { class: &'a str },
    /// `auto NAME = ns::Class::Method(args);`
    StaticFactory { class: &'a str, method: &'a str },
    /// `auto NAME = recv->Method(args);`
    Factory {
        receiver: &'a str,
        access: Access,
        method: Cow<'a, str>,
    },
    /// `recv->Method(args);`
    Method {
        receiver: &'a str,
        access: Access,
        method: Cow<'a, str>,
    },
}

impl CallKind<'_> {
    pub fn creates_object(&self) -> bool {
        !matches!(self, CallKind::Method { .. })
    }

    fn opening(&self, namespace: &str, result: Option<&str>) -> String {
        let assign = result.map(|name| format!("auto {name} = ")).unwrap_or_default();
        match self {
            CallKind::Constructor { class } => format!("{assign}{namespace}::{class}("),
            CallKind::StaticFactory { class, method } => {
                format!("{assign}{namespace}::{class}::{method}(")
            }
            CallKind::Factory {
                receiver,
                access,
                method,
            }
            | CallKind::Method {
                receiver,
                access,
                method,
            } => format!("{assign}{receiver}{}{method}(", access.token()),
        }
    }
}

/// Data describing one intercepted call.
#[derive(Debug, Clone)]
pub struct CallDescriptor<'a> {
    pub kind: CallKind<'a>,
    pub args: Vec<TraceArg<'a>>,
    /// Prefix of the result name for object-producing calls.
    pub result_prefix: Option<Cow<'a, str>>,
    pub mode: LogMode,
}

impl<'a> CallDescriptor<'a> {
    fn with_kind(kind: CallKind<'a>, result_prefix: Option<Cow<'a, str>>) -> Self {
        Self {
            kind,
            args: Vec::new(),
            result_prefix,
            mode: LogMode::Direct,
        }
    }

    pub fn constructor(class: &'a str, prefix: impl Into<Cow<'a, str>>) -> Self {
        Self::with_kind(CallKind::Constructor { class }, Some(prefix.into()))
    }

    pub fn static_factory(class: &'a str, method: &'a str, prefix: impl Into<Cow<'a, str>>) -> Self {
        Self::with_kind(CallKind::StaticFactory { class, method }, Some(prefix.into()))
    }

    pub fn factory<T: Traced + ?Sized>(
        receiver: &'a T,
        method: impl Into<Cow<'a, str>>,
        prefix: impl Into<Cow<'a, str>>,
    ) -> Self {
        Self::with_kind(
            CallKind::Factory {
                receiver: receiver.trace_name(),
                access: T::ACCESS,
                method: method.into(),
            },
            Some(prefix.into()),
        )
    }

    pub fn method<T: Traced + ?Sized>(receiver: &'a T, method: impl Into<Cow<'a, str>>) -> Self {
        Self::with_kind(
            CallKind::Method {
                receiver: receiver.trace_name(),
                access: T::ACCESS,
                method: method.into(),
            },
            None,
        )
    }

    /// Append an argument classified by its [`Loggable`] impl.
    pub fn arg<T: Loggable + ?Sized>(mut self, value: &'a T) -> Self {
        self.args.push(value.trace_arg());
        self
    }

    /// Append an already classified argument.
    pub fn raw_arg(mut self, arg: TraceArg<'a>) -> Self {
        self.args.push(arg);
        self
    }

    /// Stage the statement so the hook may insert declarations before it.
    pub fn cached(mut self) -> Self {
        self.mode = LogMode::Cached;
        self
    }
}

/// A statement under construction, holding the session's log lock.
pub struct LogBuilder<'s> {
    session: &'s TraceSession,
    state: MutexGuard<'s, LogState>,
    mode: LogMode,
    params: ParamCache,
    trailing: Vec<String>,
    open: bool,
}

impl<'s> LogBuilder<'s> {
    pub(crate) fn new(session: &'s TraceSession, state: MutexGuard<'s, LogState>, mode: LogMode) -> Self {
        Self {
            session,
            state,
            mode,
            params: ParamCache::new(),
            trailing: Vec::new(),
            open: false,
        }
    }

    pub fn mode(&self) -> LogMode {
        self.mode
    }

    pub fn config(&self) -> &TraceConfig {
        self.session.config()
    }

    pub fn allocate_name(&mut self, prefix: &str) -> String {
        self.state.names.allocate(prefix)
    }

    pub fn bind_name(&mut self, target: ObjectId, name: &str) {
        self.state.registry.bind_name(target, name);
    }

    pub fn lookup_name(&self, target: ObjectId) -> Option<String> {
        self.state.registry.lookup_name(target).map(str::to_string)
    }

    /// Dump raw bytes into the payload store and return their offset.
    pub fn dump(&self, bytes: &[u8]) -> u64 {
        self.session.payload().dump(bytes, 1, bytes.len())
    }

    /// Start the statement with its opening text.
    pub fn open(&mut self, text: &str) {
        match self.mode {
            LogMode::Direct => self.state.call_log.write(text),
            LogMode::Cached => self.state.pending.push(text),
        }
        self.open = true;
    }

    /// Render and append the next argument.
    pub fn arg(&mut self, arg: &TraceArg<'_>) {
        let text = arg.render(self.session.payload());
        self.params.append(text);
    }

    /// Render an argument into a fixed position.
    pub fn arg_at(&mut self, index: usize, arg: &TraceArg<'_>) {
        let text = arg.render(self.session.payload());
        self.params.insert_at(index, text);
    }

    /// Insert a whole statement before the one being built.
    ///
    /// Only possible for cached statements; a direct statement has already
    /// reached the file, so the declaration is dropped with an error.
    pub fn insert_before(&mut self, statement: impl Into<String>) {
        let statement = statement.into();
        if !self.open {
            self.state.pending.push(statement);
            return;
        }
        match self.mode {
            LogMode::Cached => self.state.pending.insert_before_last(statement),
            LogMode::Direct => {
                error!("Can not insert `{}` before a direct statement", statement.trim_end());
            }
        }
    }

    /// Queue a statement to be written right after the one being built.
    pub fn follow_with(&mut self, statement: impl Into<String>) {
        self.trailing.push(statement.into());
    }

    /// Terminate the statement and flush everything to the call log.
    pub fn close(mut self) {
        let tail = format!("{});\n", self.params.join());
        let state = &mut *self.state;
        match self.mode {
            LogMode::Direct => state.call_log.write(&tail),
            LogMode::Cached => state.pending.amend_last(&tail),
        }
        for statement in self.trailing.drain(..) {
            match self.mode {
                LogMode::Direct => state.call_log.write(&statement),
                LogMode::Cached => state.pending.push(statement),
            }
        }
        state.pending.sync_to(&mut state.call_log);
        state.statements += 1;
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> &crate::trace::call_log::PendingMessages {
        &self.state.pending
    }
}

/// Result of an object-producing call.
pub struct Created<T: ?Sized> {
    pub target: Arc<T>,
    pub name: String,
    pub handle: TraceHandle,
}

impl TraceSession {
    /// Run the pipeline for a call with an opaque return value.
    pub fn intercept<R>(&self, call: CallDescriptor<'_>, forward: impl FnOnce() -> R) -> R {
        self.intercept_with(call, |_| {}, forward)
    }

    /// Like [`TraceSession::intercept`], with a hook that runs after the declared
    /// arguments are logged and before the statement is closed.
    pub fn intercept_with<R>(
        &self,
        call: CallDescriptor<'_>,
        log_args: impl FnOnce(&mut LogBuilder<'_>),
        forward: impl FnOnce() -> R,
    ) -> R {
        let _ = self.log_call(&call, |builder, _| log_args(builder));
        forward()
    }

    /// Run the pipeline for a constructor or factory and register the new object.
    ///
    /// The hook receives the pre-allocated result name.
    pub fn intercept_new<T: ?Sized>(
        &self,
        call: CallDescriptor<'_>,
        log_args: impl FnOnce(&mut LogBuilder<'_>, &str),
        forward: impl FnOnce() -> Arc<T>,
    ) -> Created<T> {
        let name = self.log_call(&call, |builder, name| log_args(builder, name.unwrap_or("")));
        let target = forward();
        let name = name.unwrap_or_else(|| {
            error!("Object-producing call logged without a result name");
            String::new()
        });
        let handle = self.register_object(ObjectId::of_arc(&target), &name);
        Created {
            target,
            name,
            handle,
        }
    }

    /// Open, log arguments and close. Returns the pre-allocated result name.
    fn log_call(
        &self,
        call: &CallDescriptor<'_>,
        log_args: impl FnOnce(&mut LogBuilder<'_>, Option<&str>),
    ) -> Option<String> {
        let mut builder = self.begin(call.mode);
        let result = match (&call.result_prefix, call.kind.creates_object()) {
            (Some(prefix), true) => Some(builder.allocate_name(prefix)),
            _ => None,
        };
        let opening = call.kind.opening(&self.config().namespace, result.as_deref());
        builder.open(&opening);
        for arg in &call.args {
            builder.arg(arg);
        }
        log_args(&mut builder, result.as_deref());
        builder.close();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (tempfile::TempDir, Arc<TraceSession>) {
        let dir = tempfile::TempDir::new().unwrap();
        let prefix = format!("{}/", dir.path().display());
        let session = TraceSession::open(TraceConfig::with_prefix(prefix));
        (dir, session)
    }

    #[test]
    fn test_cached_insert_before_lands_first() {
        let (_dir, session) = session();
        let mut builder = session.begin(LogMode::Cached);
        builder.open("graph_0->CompileToBinary(");
        builder.insert_before("size_t nbg_size_0 = -1;\n");
        builder.arg(&TraceArg::expr("nullptr"));
        builder.arg(&TraceArg::expr("&nbg_size_0"));
        assert_eq!(builder.pending().len(), 2);
        builder.close();
        assert_eq!(
            std::fs::read_to_string(session.config().log_path()).unwrap(),
            "size_t nbg_size_0 = -1;\ngraph_0->CompileToBinary(nullptr, &nbg_size_0);\n"
        );
    }

    #[test]
    fn test_arg_at_places_by_position() {
        let (_dir, session) = session();
        let mut builder = session.begin(LogMode::Direct);
        builder.open("op_0->Pad(");
        builder.arg_at(2, &TraceArg::scalar(7i32));
        builder.arg_at(0, &TraceArg::expr("tensor_0"));
        builder.arg(&TraceArg::scalar(true));
        builder.close();
        assert_eq!(
            std::fs::read_to_string(session.config().log_path()).unwrap(),
            "op_0->Pad(tensor_0, , 7, true);\n"
        );
    }

    #[test]
    fn test_direct_rejects_insert_before() {
        let (_dir, session) = session();
        let mut builder = session.begin(LogMode::Direct);
        builder.open("graph_0->Compile(");
        builder.insert_before("int x = 0;\n");
        builder.follow_with("graph_0->Run();\n");
        builder.close();
        assert_eq!(
            std::fs::read_to_string(session.config().log_path()).unwrap(),
            "graph_0->Compile();\ngraph_0->Run();\n"
        );
    }

    #[test]
    fn test_constructor_statement_and_registration() {
        let (_dir, session) = session();
        let dims = vec![2u32, 3];
        let call = CallDescriptor::constructor("TensorSpec", "spec_")
            .raw_arg(TraceArg::Enum {
                type_name: "tim::vx::DataType",
                value: 5,
            })
            .arg(&dims);
        let created = session.intercept_new(call, |_, _| {}, || Arc::new(7u8));
        assert_eq!(created.name, "spec_0");
        let id = ObjectId::of_arc(&created.target);
        assert_eq!(session.lookup_name(id).as_deref(), Some("spec_0"));
        assert_eq!(session.lookup_trace_wrapper(id), Some(created.handle));
        assert_eq!(
            std::fs::read_to_string(session.config().log_path()).unwrap(),
            "auto spec_0 = tim::vx::TensorSpec((tim::vx::DataType)5, trace::Replayer::get_vector<uint32_t>(0, 2));\n"
        );
    }

    #[test]
    fn test_forward_runs_after_log_is_written() {
        let (_dir, session) = session();
        let call = CallDescriptor::static_factory("Context", "Create", "context_");
        let path = session.config().log_path();
        let seen = session.intercept_new(call, |_, _| {}, || {
            Arc::new(std::fs::read_to_string(&path).unwrap())
        });
        assert_eq!(*seen.target, "auto context_0 = tim::vx::Context::Create();\n");
    }
}
