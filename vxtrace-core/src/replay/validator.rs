//! Trace Validation
//!
//! Checks that a call log is a plausible replay program before it is handed
//! to a compiler.
//!
//! # Validation Checks
//! - **Syntax**: balanced parentheses and braces, every statement ends with `;`
//! - **Names**: every receiver and symbolic argument is defined by an earlier statement
//! - **Payload**: every load expression stays inside the payload store
//! - **Fidelity**: empty argument slots (arguments with no trace representation) are warnings

use crate::replay::script::{Statement, TraceScript};
use crate::trace::error::{TraceError, TraceResult};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub line: usize,
    pub severity: Severity,
    pub message: String,
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "line {}: {level}: {}", self.line, self.message)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub statements: usize,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }
}

/// Validator for call logs.
#[derive(Debug, Clone, Default)]
pub struct ScriptValidator {
    payload_len: Option<u64>,
}

impl ScriptValidator {
    /// Create a validator that skips payload bounds checks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check load expressions against a payload store of `len` bytes.
    pub fn with_payload_len(len: u64) -> Self {
        Self {
            payload_len: Some(len),
        }
    }

    pub fn validate(&self, script: &TraceScript) -> ValidationReport {
        let mut report = ValidationReport {
            statements: script.len(),
            issues: Vec::new(),
        };
        let mut defined: HashSet<&str> = HashSet::new();

        for statement in script.statements() {
            self.check_statement(statement, &defined, &mut report.issues);
            if let Some(name) = statement.defines.as_deref() {
                if !defined.insert(name) {
                    report.issues.push(Issue {
                        line: statement.line,
                        severity: Severity::Error,
                        message: format!("`{name}` is defined twice"),
                    });
                }
            }
        }

        log::debug!(
            "Trace validation: {} statements, {} issues",
            report.statements,
            report.issues.len()
        );
        report
    }

    /// Validate and turn any error into a [`TraceError::Validation`].
    pub fn check(&self, script: &TraceScript) -> TraceResult<ValidationReport> {
        let report = self.validate(script);
        let first_error = report
            .errors()
            .next()
            .map(|first| format!("line {}: {}", first.line, first.message));
        match first_error {
            Some(message) => Err(TraceError::Validation(message)),
            None => Ok(report),
        }
    }

    fn check_statement(&self, statement: &Statement, defined: &HashSet<&str>, issues: &mut Vec<Issue>) {
        let mut push = |severity, message: String| {
            issues.push(Issue {
                line: statement.line,
                severity,
                message,
            })
        };
        let text = statement.text.as_str();

        if !statement.is_terminated() {
            push(Severity::Error, "statement is not terminated by `;`".to_string());
        }
        for (open, close) in [('(', ')'), ('{', '}')] {
            let opened = text.matches(open).count();
            let closed = text.matches(close).count();
            if opened != closed {
                push(
                    Severity::Error,
                    format!("unbalanced `{open}{close}`: {opened} open, {closed} close"),
                );
            }
        }

        if let Some(receiver) = statement.receiver.as_deref() {
            if !defined.contains(receiver) {
                push(Severity::Error, format!("receiver `{receiver}` used before definition"));
            }
        }
        for name in &statement.uses {
            if Some(name.as_str()) != statement.receiver.as_deref() && !defined.contains(name.as_str()) {
                push(Severity::Error, format!("`{name}` used before definition"));
            }
        }

        if let Some(len) = self.payload_len {
            for load in &statement.loads {
                match load.end() {
                    Some(end) if end <= len => {}
                    Some(_) => push(
                        Severity::Error,
                        format!("`{load}` reads past the payload end ({len} bytes)"),
                    ),
                    None => push(Severity::Error, format!("`{load}` overflows the payload range")),
                }
            }
        }

        if text.contains("(, ") || text.contains(", , ") || text.contains(", )") {
            push(
                Severity::Warning,
                "empty argument: value is not reproducible from the trace".to_string(),
            );
        }
    }
}
