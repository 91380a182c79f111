use super::{impl_traced, Core, Graph};
use crate::vx;
use std::sync::Arc;
use vxtrace_core::trace::{Access, CallDescriptor, TraceSession, Traced};

/// Traced context, the root every graph is created from.
pub struct Context {
    core: Core<vx::Context>,
}

impl_traced!(Context, vx::Context, "Context", Access::Pointer);

impl Context {
    /// `auto context_0 = tim::vx::Context::Create();`
    pub fn create(session: &Arc<TraceSession>) -> Arc<Context> {
        let call = CallDescriptor::static_factory("Context", "Create", session.prefix_for(Self::TYPE_NAME));
        let created = session.intercept_new(call, |_, _| {}, vx::Context::create);
        Arc::new(Self {
            core: Core::new(session, created),
        })
    }

    pub fn create_graph(&self) -> Arc<Graph> {
        let call = CallDescriptor::factory(self, "CreateGraph", self.session().prefix_for(Graph::TYPE_NAME));
        let created = self
            .session()
            .intercept_new(call, |_, _| {}, || self.target().create_graph());
        Graph::new(self.session(), created)
    }
}
