//! Call log reader.
//!
//! Splits a call log into statements and pulls out what the validator and the
//! CLI need: the name each statement defines, the receiver it calls into,
//! the symbolic names it uses, and its payload load expressions.

use crate::replay::expr::LoadExpr;
use crate::trace::error::{TraceError, TraceResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// One statement of a call log.
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    /// 1-based line number.
    pub line: usize,
    pub text: String,
    /// Name declared by `auto x = ...`, `size_t x = ...` or `std::vector<T> x(...)`.
    pub defines: Option<String>,
    /// Object the call is made on (`x->` or `x.`).
    pub receiver: Option<String>,
    /// Symbolic names referenced anywhere else in the statement.
    pub uses: Vec<String>,
    pub loads: Vec<LoadExpr>,
}

impl Statement {
    pub fn parse(line: usize, text: &str) -> Self {
        let text = text.trim();
        let (defines, expr) = split_definition(text);
        let receiver = leading_receiver(expr);
        let mut uses: Vec<String> = identifiers(expr)
            .filter(|id| is_symbolic_name(id))
            .filter(|id| Some(*id) != defines.as_deref())
            .map(str::to_string)
            .collect();
        uses.dedup();
        Self {
            line,
            text: text.to_string(),
            defines,
            receiver,
            uses,
            loads: LoadExpr::find_all(text),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.text.ends_with(';')
    }
}

/// Parsed call log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceScript {
    statements: Vec<Statement>,
}

impl TraceScript {
    pub fn parse(text: &str) -> Self {
        let statements = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| Statement::parse(index + 1, line))
            .collect();
        Self { statements }
    }

    pub fn load(path: &Path) -> TraceResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| TraceError::open(path, e))?;
        Ok(Self::parse(&text))
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn loads(&self) -> impl Iterator<Item = &LoadExpr> {
        self.statements.iter().flat_map(|s| s.loads.iter())
    }

    /// Highest payload byte any load expression reaches. A load whose extent
    /// overflows counts as `u64::MAX`.
    pub fn payload_extent(&self) -> u64 {
        self.loads()
            .map(|load| load.end().unwrap_or(u64::MAX))
            .max()
            .unwrap_or(0)
    }

    /// Defined names grouped by their prefix (`tensor_`, `Add_`, ...).
    pub fn objects_by_prefix(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for name in self.statements.iter().filter_map(|s| s.defines.as_deref()) {
            let prefix = name.trim_end_matches(|c: char| c.is_ascii_digit());
            *counts.entry(prefix.to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Calls per receiver method, e.g. `CreateTensor`.
    pub fn method_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for statement in &self.statements {
            if let Some(method) = called_method(&statement.text) {
                *counts.entry(method.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn identifiers(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !is_ident_char(c))
        .filter(|id| !id.is_empty())
}

/// `prefix_N` with a non-empty prefix, the shape of every allocated name.
fn is_symbolic_name(id: &str) -> bool {
    let stem = id.trim_end_matches(|c: char| c.is_ascii_digit());
    stem.len() < id.len()
        && stem.len() > 1
        && stem.ends_with('_')
        && !stem.starts_with(|c: char| c.is_ascii_digit())
}

fn leading_ident(text: &str) -> Option<(&str, &str)> {
    let end = text.find(|c: char| !is_ident_char(c)).unwrap_or(text.len());
    (end > 0).then(|| (&text[..end], &text[end..]))
}

fn split_definition(text: &str) -> (Option<String>, &str) {
    let declared = if let Some(rest) = text.strip_prefix("auto ") {
        Some(rest)
    } else if let Some(rest) = text.strip_prefix("size_t ") {
        Some(rest)
    } else if text.starts_with("std::vector<") {
        text.find("> ").map(|i| &text[i + 2..])
    } else {
        None
    };
    let Some(rest) = declared else {
        return (None, text);
    };
    match leading_ident(rest.trim_start()) {
        Some((name, tail)) => {
            let tail = tail.trim_start();
            let expr = tail.strip_prefix('=').map(str::trim_start).unwrap_or(tail);
            (Some(name.to_string()), expr)
        }
        None => (None, text),
    }
}

fn leading_receiver(expr: &str) -> Option<String> {
    let (name, tail) = leading_ident(expr)?;
    (tail.starts_with("->") || tail.starts_with('.')).then(|| name.to_string())
}

fn called_method(text: &str) -> Option<&str> {
    let open = text.find('(')?;
    let head = &text[..open];
    let head = head.split('<').next().unwrap_or(head);
    let start = head
        .rfind(|c: char| !is_ident_char(c))
        .map(|i| i + 1)
        .unwrap_or(0);
    let method = &head[start..];
    (!method.is_empty()).then_some(method)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "auto context_0 = tim::vx::Context::Create();\n\
auto graph_0 = context_0->CreateGraph();\n\
auto spec_0 = tim::vx::TensorSpec((tim::vx::DataType)1, trace::Replayer::get_vector<uint32_t>(0, 2), (tim::vx::TensorAttribute)4);\n\
auto tensor_0 = graph_0->CreateTensor(spec_0, nullptr);\n\
size_t nbg_size_0 = -1;\n\
graph_0->CompileToBinary(nullptr, &nbg_size_0);\n\
auto Add_0 = graph_0->CreateOperation<tim::vx::ops::Add>();\n";

    #[test]
    fn test_definitions_and_receivers() {
        let script = TraceScript::parse(LOG);
        assert_eq!(script.len(), 7);
        let s = &script.statements()[3];
        assert_eq!(s.defines.as_deref(), Some("tensor_0"));
        assert_eq!(s.receiver.as_deref(), Some("graph_0"));
        assert_eq!(s.uses, vec!["graph_0", "spec_0"]);

        let size = &script.statements()[4];
        assert_eq!(size.defines.as_deref(), Some("nbg_size_0"));
        assert_eq!(script.statements()[5].uses, vec!["graph_0", "nbg_size_0"]);
        assert_eq!(script.statements()[0].receiver, None);
    }

    #[test]
    fn test_counts() {
        let script = TraceScript::parse(LOG);
        let objects = script.objects_by_prefix();
        assert_eq!(objects.get("graph_"), Some(&1));
        assert_eq!(objects.get("Add_"), Some(&1));
        let methods = script.method_counts();
        assert_eq!(methods.get("CreateOperation"), Some(&1));
        assert_eq!(methods.get("Create"), Some(&1));
        assert_eq!(script.payload_extent(), 8);
    }

    #[test]
    fn test_overflowing_extent_saturates() {
        let script = TraceScript::parse(
            "auto buf_0 = trace::Replayer::get_vector<double>(0, 18446744073709551615);\n",
        );
        assert_eq!(script.payload_extent(), u64::MAX);
    }

    #[test]
    fn test_vector_declaration() {
        let s = Statement::parse(1, "std::vector<float> fake_vec_0(6, 0.42);");
        assert_eq!(s.defines.as_deref(), Some("fake_vec_0"));
        assert!(s.uses.is_empty());
    }
}
