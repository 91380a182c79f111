//! Name Allocator and Identity Registry
//!
//! Symbolic names are `prefix + counter` with one counter per prefix. The
//! registry maps a runtime object's identity to its name and to the handle of
//! the traced wrapper that owns it, so a raw runtime object handed back by the
//! runtime can be matched with its wrapper again.
//!
//! Neither type locks internally; both live inside the session's log lock.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Identity of a runtime object, derived from its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Identity of the value behind `value`.
    pub fn of<T: ?Sized>(value: &T) -> Self {
        Self(value as *const T as *const () as usize)
    }

    /// Identity of the shared object behind `arc`. Equal to `of(&*arc)`.
    pub fn of_arc<T: ?Sized>(arc: &Arc<T>) -> Self {
        Self(Arc::as_ptr(arc) as *const () as usize)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

/// Opaque handle naming one traced wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TraceHandle(u64);

impl TraceHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Per-prefix monotonically increasing name counters.
#[derive(Debug, Default)]
pub struct NameAllocator {
    counters: HashMap<String, u32>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `prefix + counter` and advance the counter.
    pub fn allocate(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let name = format!("{prefix}{counter}");
        *counter += 1;
        name
    }

    /// Number of names handed out for `prefix`.
    pub fn allocated(&self, prefix: &str) -> u32 {
        self.counters.get(prefix).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counters.values().map(|&c| u64::from(c)).sum()
    }
}

/// Runtime object identity to name and wrapper maps.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    names: HashMap<ObjectId, String>,
    wrappers: HashMap<ObjectId, TraceHandle>,
    next_handle: u64,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a handle for a new traced wrapper.
    pub fn new_handle(&mut self) -> TraceHandle {
        let handle = TraceHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// Associate `target` with `wrapper`. A later call for the same target overwrites.
    pub fn register_identity(&mut self, target: ObjectId, wrapper: TraceHandle) {
        self.wrappers.insert(target, wrapper);
    }

    /// Bind `name` to `target`, overwriting any previous name.
    pub fn bind_name(&mut self, target: ObjectId, name: impl Into<String>) {
        self.names.insert(target, name.into());
    }

    pub fn lookup_name(&self, target: ObjectId) -> Option<&str> {
        self.names.get(&target).map(String::as_str)
    }

    pub fn lookup_trace_wrapper(&self, target: ObjectId) -> Option<TraceHandle> {
        self.wrappers.get(&target).copied()
    }

    pub fn named_objects(&self) -> usize {
        self.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_unique_and_increasing() {
        let mut names = NameAllocator::new();
        let allocated: Vec<String> = (0..5).map(|_| names.allocate("tensor_")).collect();
        assert_eq!(allocated[0], "tensor_0");
        assert_eq!(allocated[4], "tensor_4");
        assert_eq!(names.allocate("graph_"), "graph_0");
        assert_eq!(names.allocated("tensor_"), 5);
        assert_eq!(names.total(), 6);
    }

    #[test]
    fn test_identity_round_trip_and_overwrite() {
        let mut registry = IdentityRegistry::new();
        let a = Arc::new(1u32);
        let id = ObjectId::of_arc(&a);
        assert_eq!(id, ObjectId::of(&*a));

        let first = registry.new_handle();
        let second = registry.new_handle();
        assert_ne!(first, second);

        registry.register_identity(id, first);
        assert_eq!(registry.lookup_trace_wrapper(id), Some(first));
        registry.register_identity(id, second);
        assert_eq!(registry.lookup_trace_wrapper(id), Some(second));
    }

    #[test]
    fn test_unregistered_lookup_is_none() {
        let registry = IdentityRegistry::new();
        let value = 5u8;
        assert_eq!(registry.lookup_name(ObjectId::of(&value)), None);
        assert_eq!(registry.lookup_trace_wrapper(ObjectId::of(&value)), None);
    }
}
