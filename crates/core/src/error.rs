use crate::ast::{Rule, Span};
use serde::{Deserialize, Serialize};

/// What produced a [`Diagnostic`]. Internal invariant breaches are pipeline
/// defects and must never be reported as structural violations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Lex,
    Syntax,
    StructuralViolation,
    InternalInvariant,
}

/// A transpiler diagnostic. Matches the expected-error.json format exactly.
///
/// `pass` numbers follow the pipeline: 0 lex/parse, 1 raise collection,
/// 2 validation, 3 lowering, 4 emission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[error("{file}:{line}: {message}")]
pub struct Diagnostic {
    pub pass: u8,
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    pub file: String,
    pub line: u32,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        pass: u8,
        kind: DiagnosticKind,
        rule: Option<Rule>,
        file: &str,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            pass,
            kind,
            rule: rule.map(|r| r.as_str().to_owned()),
            file: file.to_owned(),
            line: span.line,
            span,
            message: message.into(),
        }
    }

    pub fn lex(file: &str, span: Span, message: impl Into<String>) -> Self {
        Diagnostic::new(0, DiagnosticKind::Lex, None, file, span, message)
    }

    pub fn parse(file: &str, span: Span, message: impl Into<String>) -> Self {
        Diagnostic::new(0, DiagnosticKind::Syntax, None, file, span, message)
    }

    pub fn structural(rule: Rule, file: &str, span: Span, message: impl Into<String>) -> Self {
        Diagnostic::new(
            2,
            DiagnosticKind::StructuralViolation,
            Some(rule),
            file,
            span,
            message,
        )
    }

    pub fn internal(pass: u8, file: &str, span: Span, message: impl Into<String>) -> Self {
        Diagnostic::new(
            pass,
            DiagnosticKind::InternalInvariant,
            None,
            file,
            span,
            message,
        )
    }

    pub fn is_internal(&self) -> bool {
        self.kind == DiagnosticKind::InternalInvariant
    }

    /// Serialize to JSON matching the expected-error.json format.
    /// The format always includes all fields (null for missing), not skip_serializing_if.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "file":    self.file,
            "kind":    self.kind,
            "line":    self.line,
            "message": self.message,
            "pass":    self.pass,
            "rule":    self.rule,
            "span":    { "start": self.span.start, "end": self.span.end },
        })
    }
}
