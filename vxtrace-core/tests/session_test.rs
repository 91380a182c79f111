//! Session, naming and interception tests

mod utils;

use std::sync::Arc;
use vxtrace_core::trace::{
    Access, CallDescriptor, Loggable, ObjectId, TraceArg, TraceHandle, TraceSession, Traced,
};

/// Minimal traced wrapper over a `String` payload.
struct Named {
    name: String,
    handle: TraceHandle,
    inner: Arc<String>,
}

impl Traced for Named {
    type Target = String;
    const TYPE_NAME: &'static str = "Tensor";

    fn trace_name(&self) -> &str {
        &self.name
    }

    fn trace_handle(&self) -> TraceHandle {
        self.handle
    }

    fn target(&self) -> &String {
        &self.inner
    }

    fn shared_target(&self) -> Arc<String> {
        self.inner.clone()
    }
}

fn create(session: &TraceSession, text: &str) -> Arc<Named> {
    let prefix = session.prefix_for(Named::TYPE_NAME).to_string();
    let call = CallDescriptor::constructor("Tensor", prefix);
    let created = session.intercept_new(call, |_, _| {}, || Arc::new(text.to_string()));
    Arc::new(Named {
        name: created.name,
        handle: created.handle,
        inner: created.target,
    })
}

#[test]
fn test_construction_registers_identity() {
    let (_dir, session) = utils::temp_session();
    let first = create(&session, "a");
    let second = create(&session, "b");

    let h2 = ObjectId::of_arc(&second.shared_target());
    assert_eq!(session.lookup_name(h2).as_deref(), Some("tensor_1"));
    assert_eq!(session.lookup_trace_wrapper(h2), Some(second.trace_handle()));
    assert_ne!(first.trace_handle(), second.trace_handle());
}

#[test]
fn test_traced_argument_renders_its_name() {
    let (_dir, session) = utils::temp_session();
    let objects: Vec<Arc<Named>> = (0..4).map(|i| create(&session, &i.to_string())).collect();
    let before = session.payload().dump_count();
    assert_eq!(objects[3].trace_arg().render(session.payload()), "tensor_3");
    assert_eq!(
        objects[..2].trace_arg().render(session.payload()),
        "{tensor_0, tensor_1}"
    );
    assert_eq!(session.payload().dump_count(), before);
}

#[test]
fn test_statements_follow_call_order() {
    let (_dir, session) = utils::temp_session();
    let graph = create(&session, "graph");
    let forwarded = session.intercept(CallDescriptor::method(&*graph, "Compile"), || 1);
    assert_eq!(forwarded, 1);
    let flag = true;
    session.intercept(
        CallDescriptor::method(&*graph, "Run").arg(&flag),
        || (),
    );
    assert_eq!(
        utils::read_log(&session),
        "auto tensor_0 = tim::vx::Tensor();\ntensor_0->Compile();\ntensor_0->Run(true);\n"
    );
    let stats = session.statistics();
    assert_eq!(stats.statements, 3);
    assert_eq!(stats.objects_named, 1);
}

#[test]
fn test_value_receiver_and_hook_arguments() {
    struct Value(Named);
    impl Traced for Value {
        type Target = String;
        const TYPE_NAME: &'static str = "Quantization";
        const ACCESS: Access = Access::Value;
        fn trace_name(&self) -> &str {
            self.0.trace_name()
        }
        fn trace_handle(&self) -> TraceHandle {
            self.0.trace_handle()
        }
        fn target(&self) -> &String {
            self.0.target()
        }
        fn shared_target(&self) -> Arc<String> {
            self.0.shared_target()
        }
    }

    let (_dir, session) = utils::temp_session();
    let quant = Value(Named {
        name: "quant_0".to_string(),
        handle: session.register_object(ObjectId::of(&0u8), "quant_0"),
        inner: Arc::new(String::new()),
    });
    let call = CallDescriptor::method(&quant, "SetScales").cached();
    session.intercept_with(
        call,
        |builder| {
            builder.insert_before("std::vector<float> scales_0(2, 0.5);\n");
            builder.arg(&TraceArg::expr("scales_0"));
        },
        || (),
    );
    assert_eq!(
        utils::read_log(&session),
        "std::vector<float> scales_0(2, 0.5);\nquant_0.SetScales(scales_0);\n"
    );
}

#[test]
fn test_concurrent_calls_keep_statements_whole() {
    let (_dir, session) = utils::temp_session();
    let graph = create(&session, "graph");
    let threads: Vec<_> = (0..4)
        .map(|t| {
            let session = session.clone();
            let graph = graph.clone();
            std::thread::spawn(move || {
                for i in 0..25u32 {
                    let values = vec![t as u32, i];
                    session.intercept(
                        CallDescriptor::method(&*graph, "Touch").arg(&values),
                        || (),
                    );
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    let log = utils::read_log(&session);
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 101);
    for line in &lines[1..] {
        assert!(line.starts_with("tensor_0->Touch(trace::Replayer::get_vector<uint32_t>("));
        assert!(line.ends_with(");"));
    }
    assert_eq!(session.payload().offset(), 100 * 8);
}
