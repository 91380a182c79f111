//! Trace Session
//!
//! Owns every piece of trace state: both files, the pending statement queue,
//! the name counters and the identity registry. Wrappers hold an
//! `Arc<TraceSession>` and route every call through it.
//!
//! Two locks: the payload store has its own, everything else sits behind the
//! log lock. Naming and registration only ever happen under the log lock.

use crate::trace::call_log::{CallLog, PendingMessages};
use crate::trace::config::TraceConfig;
use crate::trace::intercept::{LogBuilder, LogMode};
use crate::trace::payload::PayloadStore;
use crate::trace::registry::{IdentityRegistry, NameAllocator, ObjectId, TraceHandle};
use crate::trace::TraceStatistics;
use log::info;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) struct LogState {
    pub(crate) call_log: CallLog,
    pub(crate) pending: PendingMessages,
    pub(crate) names: NameAllocator,
    pub(crate) registry: IdentityRegistry,
    pub(crate) statements: u64,
}

/// One tracing run: a call log and payload store pair plus naming state.
pub struct TraceSession {
    config: TraceConfig,
    payload: PayloadStore,
    state: Mutex<LogState>,
}

impl TraceSession {
    /// Create both trace files for `config`.
    pub fn open(config: TraceConfig) -> Arc<Self> {
        let call_log = CallLog::create(config.log_path());
        let payload = PayloadStore::create(config.payload_path());
        info!(
            "Tracing to {} and {}",
            call_log.path().display(),
            payload.path().display()
        );
        Arc::new(Self {
            config,
            payload,
            state: Mutex::new(LogState {
                call_log,
                pending: PendingMessages::new(),
                names: NameAllocator::new(),
                registry: IdentityRegistry::new(),
                statements: 0,
            }),
        })
    }

    /// Open a session with the prefix from `TRACE_DUMP_PREFIX`.
    pub fn from_env() -> Arc<Self> {
        Self::open(TraceConfig::from_env())
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn payload(&self) -> &PayloadStore {
        &self.payload
    }

    /// Take the log lock and start a statement.
    pub fn begin(&self, mode: LogMode) -> LogBuilder<'_> {
        LogBuilder::new(self, self.lock(), mode)
    }

    /// Name prefix for a traced API type.
    pub fn prefix_for(&self, type_name: &str) -> &str {
        self.config.object_prefix(type_name)
    }

    pub fn allocate_name(&self, prefix: &str) -> String {
        self.lock().names.allocate(prefix)
    }

    pub fn bind_name(&self, target: ObjectId, name: &str) {
        self.lock().registry.bind_name(target, name);
    }

    pub fn lookup_name(&self, target: ObjectId) -> Option<String> {
        self.lock().registry.lookup_name(target).map(str::to_string)
    }

    pub fn register_identity(&self, target: ObjectId, wrapper: TraceHandle) {
        self.lock().registry.register_identity(target, wrapper);
    }

    pub fn lookup_trace_wrapper(&self, target: ObjectId) -> Option<TraceHandle> {
        self.lock().registry.lookup_trace_wrapper(target)
    }

    /// Bind `name` to `target` and register a fresh wrapper handle for it.
    pub fn register_object(&self, target: ObjectId, name: &str) -> TraceHandle {
        let mut state = self.lock();
        let handle = state.registry.new_handle();
        state.registry.bind_name(target, name);
        state.registry.register_identity(target, handle);
        handle
    }

    pub fn statistics(&self) -> TraceStatistics {
        let state = self.lock();
        TraceStatistics {
            statements: state.statements,
            names_allocated: state.names.total(),
            objects_named: state.registry.named_objects() as u64,
            log_bytes: state.call_log.bytes_written(),
            payload_bytes: self.payload.offset(),
            payload_dumps: self.payload.dump_count(),
        }
    }

    /// Write out anything still pending and flush both files.
    pub fn flush(&self) {
        let mut state = self.lock();
        let state = &mut *state;
        state.pending.sync_to(&mut state.call_log);
        state.call_log.flush();
        self.payload.flush();
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TraceSession {
    fn drop(&mut self) {
        self.flush();
        log::debug!("Trace session closed: {:?}", self.statistics());
    }
}
