#![allow(clippy::result_large_err)]
//! tryexpr-core: expression-level `try` with `raise`.
//!
//! Provides the pipeline from source containing try expressions to standard
//! `try`/`catch`/`finally` source.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`transpile()`] -- run the full pipeline
//! - [`check()`] -- report every structural violation without lowering
//! - [`TranspileOptions`] -- temporary prefix and diagnostic limit
//! - [`Diagnostic`] -- transpiler error type
//! - AST types: [`Program`], [`Stmt`], [`Expr`], [`TryExpr`], [`RaiseSites`],
//!   [`ValidationResult`]
//!
//! Individual pass entry functions are also re-exported for selective
//! pipeline execution.

pub mod ast;
pub mod emit;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod pass1_collect;
pub mod pass2_validate;
pub mod pass3_lower;
pub mod transpile;
pub mod visit;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::{
    Clause, Expr, Function, FunctionBody, Program, RaiseSite, RaiseSites, Rule, Span, Stmt,
    TryExpr, ValidationResult,
};
pub use error::{Diagnostic, DiagnosticKind};
pub use pass3_lower::{LoweredForm, TempNames};
pub use transpile::{TranspileOptions, Transpiled};

// ── Convenience re-exports: pipeline entry points ────────────────────

pub use emit::emit_program;
pub use pass1_collect::{annotate, collect_raises};
pub use pass2_validate::{validate, validate_try_expr};
pub use pass3_lower::{lower_program, lower_try_expr};
pub use transpile::{analyze, check, lower_fragment, parse_source, transpile};
