mod utils;

use std::sync::Arc;
use utils::{float_spec, read_log, temp_session};
use vxtrace_core::replay::{Replayer, ScriptValidator, TraceScript};
use vxtrace_core::trace::Traced;
use vxtrace_runtime::tvx::{self, ops};
use vxtrace_runtime::vx::{DataType, QuantType, TensorAttribute};

#[test]
fn test_relu_graph_log() {
    let (_dir, session) = temp_session();
    let context = tvx::Context::create(&session);
    let graph = context.create_graph();
    let in_spec = float_spec(&session, vec![4], TensorAttribute::Input);
    let out_spec = float_spec(&session, vec![4], TensorAttribute::Output);
    let input = graph.create_tensor(&in_spec, None);
    let output = graph.create_tensor(&out_spec, None);
    let relu = graph.create_operation(ops::Relu {});
    relu.bind_input(&input).bind_output(&output);
    graph.compile().unwrap();
    graph.run().unwrap();

    let expected = "auto context_0 = tim::vx::Context::Create();\n\
auto graph_0 = context_0->CreateGraph();\n\
auto spec_0 = tim::vx::TensorSpec((tim::vx::DataType)9, trace::Replayer::get_vector<uint32_t>(0, 1), (tim::vx::TensorAttribute)8);\n\
auto spec_1 = tim::vx::TensorSpec((tim::vx::DataType)9, trace::Replayer::get_vector<uint32_t>(4, 1), (tim::vx::TensorAttribute)16);\n\
auto tensor_0 = graph_0->CreateTensor(spec_0, nullptr);\n\
auto tensor_1 = graph_0->CreateTensor(spec_1, nullptr);\n\
auto Relu_0 = graph_0->CreateOperation<tim::vx::ops::Relu>();\n\
Relu_0->BindInput(tensor_0);\n\
Relu_0->BindOutput(tensor_1);\n\
graph_0->Compile();\n\
graph_0->Run();\n";
    assert_eq!(read_log(&session), expected);
    assert_eq!(graph.target().run_count(), 1);
}

#[test]
fn test_log_passes_validation_and_replays_shapes() {
    let (_dir, session) = temp_session();
    let context = tvx::Context::create(&session);
    let graph = context.create_graph();
    let in_spec = float_spec(&session, vec![2, 3], TensorAttribute::Input);
    let out_spec = float_spec(&session, vec![3, 2], TensorAttribute::Output);
    let input = graph.create_tensor(&in_spec, None);
    let output = graph.create_tensor(&out_spec, None);
    let reshape = graph.create_operation(ops::Reshape { size: vec![3, 2] });
    reshape.bind_inputs(&[input]).bind_outputs(&[output]);
    graph.compile().unwrap();

    let script = TraceScript::parse(&read_log(&session));
    let report = ScriptValidator::with_payload_len(session.payload().offset()).validate(&script);
    assert!(report.is_ok(), "{:?}", report.issues);

    let replayer = Replayer::with_path(session.config().payload_path());
    let shapes: Vec<Vec<u32>> = script
        .loads()
        .map(|expr| replayer.read_vector::<u32>(expr.offset, expr.count))
        .collect();
    assert_eq!(shapes, vec![vec![2, 3], vec![3, 2], vec![3, 2]]);
    assert!(script.statements().iter().any(|s| s.text == "Reshape_0->BindInputs({tensor_0});"));
}

#[test]
fn test_compile_to_binary_declares_size_once() {
    let (_dir, session) = temp_session();
    let context = tvx::Context::create(&session);
    let graph = context.create_graph();
    let spec = float_spec(&session, vec![1], TensorAttribute::Input);
    let out_spec = float_spec(&session, vec![1], TensorAttribute::Output);
    let input = graph.create_tensor(&spec, None);
    let output = graph.create_tensor(&out_spec, None);
    graph
        .create_operation(ops::Sigmoid {})
        .bind_input(&input)
        .bind_output(&output);

    let mut size = 0usize;
    graph.compile_to_binary(None, &mut size).unwrap();
    assert!(size > 0);
    let mut buf = vec![0u8; size];
    graph.compile_to_binary(Some(buf.as_mut_slice()), &mut size).unwrap();
    assert_eq!(buf.first(), Some(&b'{'));

    let log = read_log(&session);
    assert!(log.contains("size_t nbg_size_0 = -1;\ngraph_0->CompileToBinary(nullptr, &nbg_size_0);\n"));
    assert_eq!(log.matches("size_t nbg_size_").count(), 1);
    let fetch = log
        .lines()
        .rfind(|l| l.starts_with("graph_0->CompileToBinary("))
        .unwrap();
    assert!(fetch.ends_with(&format!(", {size}).data(), &nbg_size_0);")));

    let report = ScriptValidator::new().validate(&TraceScript::parse(&log));
    assert!(report.is_ok(), "{:?}", report.issues);
}

#[test]
fn test_nbg_buffer_declared_before_operation() {
    let (_dir, session) = temp_session();
    let context = tvx::Context::create(&session);
    let graph = context.create_graph();
    let nbg = graph.create_operation(ops::Nbg {
        binary: vec![1, 2, 3, 4],
        input_count: 1,
        output_count: 2,
    });
    assert_eq!(nbg.trace_name(), "NBG_0");

    let log = read_log(&session);
    assert!(log.ends_with(
        "std::vector<char> nbg_buf_vec_0 = trace::Replayer::get_vector<char>(0, 4);\n\
auto NBG_0 = graph_0->CreateOperation<tim::vx::ops::NBG>(nbg_buf_vec_0.data(), 1, 2);\n"
    ));
    let replayer = Replayer::with_path(session.config().payload_path());
    assert_eq!(replayer.read_vector::<u8>(0, 4), vec![1, 2, 3, 4]);
}

#[test]
fn test_constant_tensor_without_data_is_filled() {
    let (_dir, session) = temp_session();
    let context = tvx::Context::create(&session);
    let graph = context.create_graph();
    let spec = tvx::TensorSpec::with_shape(&session, DataType::Int32, vec![2, 2], TensorAttribute::Constant);
    let tensor = graph.create_tensor(&spec, None);

    let log = read_log(&session);
    assert!(log.ends_with(
        "auto tensor_0 = graph_0->CreateTensor(spec_0, nullptr);\n\
std::vector<int> fake_vec_0(4, 42);\n\
tensor_0->CopyDataToTensor(fake_vec_0.data());\n"
    ));
    let values: Vec<i32> = tensor
        .target()
        .data()
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    assert_eq!(values, vec![42; 4]);
}

#[test]
fn test_constant_tensor_with_data_is_not_filled() {
    let (_dir, session) = temp_session();
    let context = tvx::Context::create(&session);
    let graph = context.create_graph();
    let spec = tvx::TensorSpec::with_shape(&session, DataType::Uint8, vec![3], TensorAttribute::Constant);
    let tensor = graph.create_tensor(&spec, Some(&[7, 8, 9]));

    let log = read_log(&session);
    assert!(!log.contains("fake_vec_"));
    assert!(log.contains("auto tensor_0 = graph_0->CreateTensor(spec_0, trace::Replayer::get_vector<char>(4, 3).data());"));
    assert_eq!(tensor.target().data(), vec![7, 8, 9]);
}

#[test]
fn test_graph_io_tensors_map_to_wrappers() {
    let (_dir, session) = temp_session();
    let context = tvx::Context::create(&session);
    let graph = context.create_graph();
    let input = graph.create_tensor(&float_spec(&session, vec![2], TensorAttribute::Input), None);
    let output = graph.create_tensor(&float_spec(&session, vec![2], TensorAttribute::Output), None);

    let inputs = graph.inputs_tensor();
    let outputs = graph.outputs_tensor();
    assert_eq!(inputs.len(), 1);
    assert!(Arc::ptr_eq(&inputs[0], &input));
    assert!(Arc::ptr_eq(&outputs[0], &output));

    let log = read_log(&session);
    assert!(log.contains("graph_0->InputsTensor();\ngraph_0->OutputsTensor();\n"));
}

#[test]
fn test_tensor_quantization_recovered() {
    let (_dir, session) = temp_session();
    let context = tvx::Context::create(&session);
    let graph = context.create_graph();
    let quant = tvx::Quantization::with_scale(&session, QuantType::Asymmetric, 0.5, 3);
    let spec = tvx::TensorSpec::with_quantization(
        &session,
        DataType::Uint8,
        vec![8],
        TensorAttribute::Transient,
        &quant,
    );
    let tensor = graph.create_tensor(&spec, None);

    let recovered = tensor.quantization().expect("traced quantization");
    assert_eq!(recovered.trace_name(), "quant_0");
    assert_eq!(recovered.trace_handle(), quant.trace_handle());

    let plain = graph.create_tensor(&float_spec(&session, vec![1], TensorAttribute::Transient), None);
    assert!(plain.quantization().is_none());
}

#[test]
fn test_clone_to_other_graph() {
    let (_dir, session) = temp_session();
    let context = tvx::Context::create(&session);
    let first = context.create_graph();
    let second = context.create_graph();
    let add = first.create_operation(ops::Add {});
    let copy = add.clone_to(&second);

    assert_eq!(copy.trace_name(), "Add_1");
    assert!(Arc::ptr_eq(&copy.graph().unwrap(), &second));
    assert_eq!(second.operations().len(), 1);
    assert!(read_log(&session).ends_with("auto Add_1 = Add_0->Clone(graph_1);\n"));
}

#[test]
fn test_operation_args_and_rounding() {
    let (_dir, session) = temp_session();
    let context = tvx::Context::create(&session);
    let graph = context.create_graph();
    let softmax = graph.create_operation(ops::Softmax { beta: 1.0, axis: -1 });
    softmax.set_default_rounding_policy();

    let log = read_log(&session);
    assert!(log.contains("auto Softmax_0 = graph_0->CreateOperation<tim::vx::ops::Softmax>(1.0, -1);\n"));
    assert!(log.ends_with(
        "Softmax_0->SetRoundingPolicy((tim::vx::OverflowPolicy)1, (tim::vx::RoundingPolicy)1, (tim::vx::RoundType)1, 0);\n"
    ));
}

#[test]
fn test_placeholder_logs_no_spec() {
    let (_dir, session) = temp_session();
    let context = tvx::Context::create(&session);
    let graph = context.create_graph();
    let placeholder = graph.create_tensor_placeholder();

    assert!(placeholder.spec().is_none());
    assert_eq!(
        read_log(&session),
        "auto context_0 = tim::vx::Context::Create();\n\
auto graph_0 = context_0->CreateGraph();\n\
auto tensor_0 = graph_0->CreateTensorPlaceHolder();\n"
    );
    let spec = float_spec(&session, vec![1], TensorAttribute::Input);
    assert_eq!(spec.trace_name(), "spec_0");
}

#[test]
fn test_tensor_reads_are_not_logged() {
    let (_dir, session) = temp_session();
    let context = tvx::Context::create(&session);
    let graph = context.create_graph();
    let spec = float_spec(&session, vec![2, 3], TensorAttribute::Input);
    let tensor = graph.create_tensor(&spec, None);
    let before = read_log(&session);

    assert_eq!(tensor.shape(), vec![2, 3]);
    assert_eq!(tensor.id(), 0);
    assert_eq!(tensor.spec().map(|s| s.trace_name()), Some("spec_0"));
    assert_eq!(read_log(&session), before);

    assert_eq!(tensor.data_type(), DataType::Float32);
    assert_eq!(read_log(&session), format!("{before}tensor_0->GetDataType();\n"));
}

#[test]
fn test_consumer_producer_map_updates() {
    let (_dir, session) = temp_session();
    let context = tvx::Context::create(&session);
    let graph = context.create_graph();
    let input = graph.create_tensor(&float_spec(&session, vec![4], TensorAttribute::Input), None);
    let output = graph.create_tensor(&float_spec(&session, vec![4], TensorAttribute::Output), None);
    let relu = graph.create_operation(ops::Relu {});
    relu.bind_input(&input).bind_output(&output);

    graph.update_tensor_consumers_map();
    graph.update_tensor_producer_map();

    assert!(read_log(&session).ends_with(
        "Relu_0->BindOutput(tensor_1);\n\
graph_0->UpdateTensorConsumersMap();\n\
graph_0->UpdateTensorProducerMap();\n"
    ));
    let op_id = relu.target().id();
    assert_eq!(graph.target().consumers_of(input.id()), vec![op_id]);
    assert_eq!(graph.target().producer_of(output.id()), Some(op_id));
}
