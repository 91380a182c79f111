// CLI command handlers
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use vxtrace_core::replay::{ElementType, LoadExpr, ReplayValue, Replayer, ScriptValidator, TraceScript, ValidationReport};
use vxtrace_core::trace::{TraceConfig, TraceSession, TraceStatistics};
use vxtrace_runtime::tvx::{self, ops};
use vxtrace_runtime::vx::{DataType, TensorAttribute};

const REPLAY_HEADER: &str = "#include <cstdint>\n\
#include <vector>\n\
#include \"tim/vx/context.h\"\n\
#include \"tim/vx/graph.h\"\n\
#include \"tim/vx/ops.h\"\n\
#include \"tim/vx/tensor.h\"\n\
#include \"tim/experimental/trace/replayer.h\"\n\
\n\
int main() {\n";

const REPLAY_FOOTER: &str = "  return 0;\n}\n";

/// Summary of one capture.
#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub log_path: PathBuf,
    pub payload_path: PathBuf,
    pub statements: usize,
    pub objects: BTreeMap<String, usize>,
    pub methods: BTreeMap<String, usize>,
    pub loads: usize,
    pub payload_extent: u64,
    pub payload_len: u64,
    pub payload_crc32: u32,
}

fn file_crc32(path: &Path) -> Result<(u64, u32)> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok((data.len() as u64, crc32fast::hash(&data)))
}

pub fn inspect_trace(prefix: &str) -> Result<InspectReport> {
    let config = TraceConfig::with_prefix(prefix);
    let log_path = config.log_path();
    let payload_path = config.payload_path();
    let script = TraceScript::load(&log_path)?;
    let (payload_len, payload_crc32) = if payload_path.exists() {
        file_crc32(&payload_path)?
    } else {
        log::warn!("No payload store at {}", payload_path.display());
        (0, 0)
    };

    Ok(InspectReport {
        statements: script.len(),
        objects: script.objects_by_prefix(),
        methods: script.method_counts(),
        loads: script.loads().count(),
        payload_extent: script.payload_extent(),
        payload_len,
        payload_crc32,
        log_path,
        payload_path,
    })
}

pub fn print_inspect(report: &InspectReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("Call log: {}", report.log_path.display());
    println!("  Statements: {}", report.statements);
    println!("  Payload loads: {}", report.loads);
    println!("Objects:");
    for (prefix, count) in &report.objects {
        println!("    {prefix}: {count}");
    }
    println!("Methods:");
    for (method, count) in &report.methods {
        println!("    {method}: {count}");
    }
    println!("Payload store: {}", report.payload_path.display());
    println!(
        "  Size: {} bytes (referenced: {}), CRC32: 0x{:08X}",
        report.payload_len, report.payload_extent, report.payload_crc32
    );
    Ok(())
}

pub fn verify_trace(prefix: &str) -> Result<ValidationReport> {
    let config = TraceConfig::with_prefix(prefix);
    let script = TraceScript::load(&config.log_path())?;
    let payload_len = fs::metadata(config.payload_path()).map(|m| m.len()).unwrap_or(0);
    let report = ScriptValidator::with_payload_len(payload_len).validate(&script);

    for issue in &report.issues {
        println!("{issue}");
    }
    println!(
        "{} statements, {} errors, {} warnings",
        report.statements,
        report.errors().count(),
        report.warnings().count()
    );
    Ok(report)
}

/// Read `count` elements at `offset` from the capture's payload store, or
/// from its replay copy with `replay`.
pub fn dump_payload(
    prefix: &str,
    offset: u64,
    count: usize,
    dtype: ElementType,
    replay: bool,
) -> Result<ReplayValue> {
    let config = TraceConfig::with_prefix(prefix);
    let path = if replay {
        config.replay_payload_path()
    } else {
        config.payload_path()
    };
    let replayer = Replayer::with_path(path);
    let available = replayer.len()?;
    let expr = LoadExpr::vector(dtype, offset, count);
    if expr.end().map_or(true, |end| end > available) {
        log::warn!(
            "{expr} reads past the end of {} ({available} bytes), the output is truncated",
            replayer.path().display()
        );
    }
    Ok(replayer.load(&expr))
}

/// Turn a capture into the replay pair: a program wrapping the call log and
/// a verified copy of the payload store.
pub fn prepare_replay(prefix: &str) -> Result<(PathBuf, PathBuf)> {
    let config = TraceConfig::with_prefix(prefix);
    let log = fs::read_to_string(config.log_path())
        .with_context(|| format!("Failed to read call log: {}", config.log_path().display()))?;

    let mut program = String::from(REPLAY_HEADER);
    for line in log.lines().filter(|l| !l.trim().is_empty()) {
        program.push_str("  ");
        program.push_str(line);
        program.push('\n');
    }
    program.push_str(REPLAY_FOOTER);

    let program_path = config.replay_log_path();
    fs::write(&program_path, program)
        .with_context(|| format!("Failed to write {}", program_path.display()))?;

    let payload_path = config.payload_path();
    let replay_payload = config.replay_payload_path();
    fs::copy(&payload_path, &replay_payload)
        .with_context(|| format!("Failed to copy payload store: {}", payload_path.display()))?;
    let (_, original) = file_crc32(&payload_path)?;
    let (_, copied) = file_crc32(&replay_payload)?;
    if original != copied {
        bail!("Payload copy is corrupt: CRC32 0x{original:08X} != 0x{copied:08X}");
    }

    Ok((program_path, replay_payload))
}

/// Trace a small graph: two inputs, an add, a constant bias and a relu.
pub fn run_demo(prefix: &str) -> Result<TraceStatistics> {
    let session = TraceSession::open(TraceConfig::with_prefix(prefix));
    let context = tvx::Context::create(&session);
    let graph = context.create_graph();

    let shape = vec![2, 2];
    let io_spec = |attr| tvx::TensorSpec::with_shape(&session, DataType::Float32, shape.clone(), attr);
    let in_spec = io_spec(TensorAttribute::Input);
    let bias_spec = io_spec(TensorAttribute::Constant);
    let mid_spec = in_spec.as_transient_spec();
    let out_spec = io_spec(TensorAttribute::Output);

    let a = graph.create_tensor(&in_spec, None);
    let b = graph.create_tensor(&in_spec, None);
    let bias = graph.create_tensor(&bias_spec, None);
    let sum = graph.create_tensor(&mid_spec, None);
    let biased = graph.create_tensor(&mid_spec, None);
    let out = graph.create_tensor(&out_spec, None);

    graph
        .create_operation(ops::Add {})
        .bind_inputs(&[a.clone(), b.clone()])
        .bind_output(&sum);
    graph
        .create_operation(ops::Add {})
        .bind_inputs(&[sum, bias])
        .bind_output(&biased);
    graph
        .create_operation(ops::Relu {})
        .bind_input(&biased)
        .bind_output(&out);

    graph.compile()?;
    let mut size = 0usize;
    graph.compile_to_binary(None, &mut size)?;
    let mut binary = vec![0u8; size];
    graph.compile_to_binary(Some(binary.as_mut_slice()), &mut size)?;

    let input: Vec<u8> = [1.0f32, -2.0, 3.0, -4.0]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    a.copy_data_to_tensor(&input)?;
    b.copy_data_to_tensor(&input)?;
    graph.run()?;
    let mut result = vec![0u8; input.len()];
    out.copy_data_from_tensor(&mut result)?;

    session.flush();
    Ok(session.statistics())
}

pub fn print_statistics(stats: &TraceStatistics) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}
