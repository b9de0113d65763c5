//! Pass 2: Structural validation of try expressions.
//!
//! Rules are checked in a fixed order and the first failure wins, so the
//! same node always yields the same diagnostic.

use crate::ast::*;
use crate::error::Diagnostic;
use crate::pass1_collect::collect_raises;
use crate::visit::{self, VisitMut};
use std::borrow::Cow;

pub const SYMMETRY_MESSAGE: &str = "raise must appear in both try and catch, or neither";
pub const FINALLY_PARAM_MESSAGE: &str = "finally binding requires a finally block";
pub const FINALLY_RAISE_MESSAGE: &str =
    "raise in a finally clause requires a finally binding";

/// Validate one try expression against its raise-site annotation. An
/// unannotated node is collected on the fly.
pub fn validate_try_expr(t: &TryExpr) -> ValidationResult {
    let sites: Cow<'_, RaiseSites> = match &t.raises {
        Some(s) => Cow::Borrowed(s),
        None => Cow::Owned(collect_raises(t)),
    };

    // Rule 1: symmetry between try and catch.
    if sites.try_raises.is_empty() != sites.catch_raises.is_empty() {
        return ValidationResult::Invalid {
            rule: Rule::Symmetry,
            reason: SYMMETRY_MESSAGE.to_owned(),
            span: t.span,
        };
    }

    // Rule 2: only clause-level presence matters. A clause that raises on
    // some paths and falls through on others is accepted as is.

    // Rule 3: the finally binding needs a finally body, and only a bound
    // finally clause receives raises. Finally never has to raise.
    if t.finally_param.is_some() && t.finally_body.is_none() {
        return ValidationResult::Invalid {
            rule: Rule::FinallyBinding,
            reason: FINALLY_PARAM_MESSAGE.to_owned(),
            span: t.span,
        };
    }
    if t.finally_param.is_none() {
        if let Some(first) = sites.finally_raises.first() {
            return ValidationResult::Invalid {
                rule: Rule::FinallyBinding,
                reason: FINALLY_RAISE_MESSAGE.to_owned(),
                span: first.span,
            };
        }
    }

    // Rule 4: no raise at all is valid; the expression yields undefined.
    // Rule 5: catch without a binding is valid.
    ValidationResult::Valid
}

pub fn to_diagnostic(result: &ValidationResult, file: &str) -> Option<Diagnostic> {
    match result {
        ValidationResult::Valid => None,
        ValidationResult::Invalid { rule, reason, span } => {
            Some(Diagnostic::structural(*rule, file, *span, reason.clone()))
        }
    }
}

/// Validate every try expression in the program, innermost first, storing
/// each verdict on its node. Returns the structural diagnostics in the order
/// the nodes were validated, stopping after `max_errors`.
pub fn validate(program: &mut Program, file: &str, max_errors: usize) -> Vec<Diagnostic> {
    struct Validator<'f> {
        file: &'f str,
        max_errors: usize,
        errors: Vec<Diagnostic>,
    }
    impl VisitMut for Validator<'_> {
        fn visit_mut_try_expr(&mut self, t: &mut TryExpr) {
            visit::walk_mut_try_expr(self, t);
            if self.errors.len() >= self.max_errors {
                return;
            }
            let verdict = validate_try_expr(t);
            if let Some(d) = to_diagnostic(&verdict, self.file) {
                tracing::debug!(node = t.id.0, rule = ?d.rule, "try expression rejected");
                self.errors.push(d);
            }
            t.verdict = Some(verdict);
        }
    }
    let mut v = Validator {
        file,
        max_errors,
        errors: Vec::new(),
    };
    visit::walk_mut_stmts(&mut v, &mut program.body);
    v.errors
}
