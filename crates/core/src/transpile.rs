//! Transpiler pipeline: source with try expressions -> standard source.
//!
//! This is a thin orchestrator that calls each pass module in order:
//! lex/parse (0), raise collection (1), validation (2), lowering (3) and
//! emission (4).

use crate::ast::{Expr, Program, Stmt};
use crate::emit;
use crate::error::Diagnostic;
use crate::lexer;
use crate::parser;
use crate::pass1_collect;
use crate::pass2_validate;
use crate::pass3_lower::{self, TempNames};
use serde::{Deserialize, Serialize};

/// Knobs shared by the library and the CLI. Also read from `tryexpr.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranspileOptions {
    /// Prefix of every hidden temporary the lowering pass introduces.
    pub temp_prefix: String,
    /// Stop reporting structural diagnostics after this many.
    pub max_errors: usize,
}

impl Default for TranspileOptions {
    fn default() -> Self {
        TranspileOptions {
            temp_prefix: "__".to_owned(),
            max_errors: 50,
        }
    }
}

impl TranspileOptions {
    pub fn check(&self) -> Result<(), String> {
        let valid_start = self
            .temp_prefix
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$');
        let valid_rest = self
            .temp_prefix
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$');
        if !(valid_start && valid_rest) {
            return Err(format!(
                "temp_prefix '{}' is not a valid identifier prefix",
                self.temp_prefix
            ));
        }
        if self.max_errors == 0 {
            return Err("max_errors must be at least 1".to_owned());
        }
        Ok(())
    }
}

/// Result of a successful transpilation.
#[derive(Debug, Clone)]
pub struct Transpiled {
    pub program: Program,
    pub code: String,
    /// Number of try expressions lowered.
    pub lowered: usize,
}

/// Pass 0: lex and parse.
pub fn parse_source(src: &str, file: &str) -> Result<Program, Diagnostic> {
    let tokens = lexer::lex(src, file)?;
    parser::parse(&tokens, file)
}

/// Passes 0-2. Returns the annotated program and every structural
/// diagnostic, up to `max_errors`.
pub fn analyze(
    src: &str,
    file: &str,
    options: &TranspileOptions,
) -> Result<(Program, Vec<Diagnostic>), Diagnostic> {
    let mut program = parse_source(src, file)?;
    tracing::debug!(file, statements = program.body.len(), "parsed");

    let annotated = pass1_collect::annotate(&mut program);
    tracing::debug!(file, try_expressions = annotated, "collected raise sites");

    let errors = pass2_validate::validate(&mut program, file, options.max_errors);
    tracing::debug!(file, violations = errors.len(), "validated");
    Ok((program, errors))
}

/// Every structural diagnostic in `src`. Syntax errors are returned as `Err`.
pub fn check(
    src: &str,
    file: &str,
    options: &TranspileOptions,
) -> Result<Vec<Diagnostic>, Diagnostic> {
    analyze(src, file, options).map(|(_, errors)| errors)
}

/// Run the full pipeline, or return the first diagnostic. A structural
/// violation halts code generation for this compilation unit only.
pub fn transpile(
    src: &str,
    file: &str,
    options: &TranspileOptions,
) -> Result<Transpiled, Diagnostic> {
    let (mut program, errors) = analyze(src, file, options)?;
    if let Some(first) = errors.into_iter().next() {
        return Err(first);
    }

    let lowered = pass3_lower::lower_program(&mut program, &options.temp_prefix, file)?;
    tracing::debug!(file, lowered, "lowered");

    let code = emit::emit_program(&program, file)?;
    Ok(Transpiled {
        program,
        code,
        lowered,
    })
}

/// Lower a single expression as a host parser would hand it over at an
/// expression position. Returns the statements to insert before the
/// expression's statement, rendered, and the replacement expression.
pub fn lower_fragment(
    src: &str,
    file: &str,
    options: &TranspileOptions,
) -> Result<(String, String), Diagnostic> {
    let tokens = lexer::lex(src, file)?;
    let expr = parser::parse_expression(&tokens, file)?;

    // Annotate and validate through a one-statement program.
    let mut program = Program {
        body: vec![Stmt::Expr {
            expr,
            span: Default::default(),
        }],
    };
    pass1_collect::annotate(&mut program);
    let errors = pass2_validate::validate(&mut program, file, 1);
    if let Some(first) = errors.into_iter().next() {
        return Err(first);
    }
    let mut names = TempNames::for_program(&options.temp_prefix, &program);
    let expr = match program.body.pop() {
        Some(Stmt::Expr { expr, .. }) => expr,
        _ => Expr::Undefined,
    };

    let (pre, expr) = pass3_lower::lower_expression(expr, &mut names, file)?;
    let pre = emit::emit_program(&Program { body: pre }, file)?;
    let expr = emit::emit_expr(&expr, file)?;
    Ok((pre, expr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let o = TranspileOptions::default();
        assert_eq!(o.temp_prefix, "__");
        assert!(o.check().is_ok());
    }

    #[test]
    fn invalid_prefix_is_rejected() {
        let o = TranspileOptions {
            temp_prefix: "1x".into(),
            ..Default::default()
        };
        assert!(o.check().is_err());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let o: TranspileOptions = serde_json::from_str(r#"{"temp_prefix": "$t"}"#).unwrap();
        assert_eq!(o.temp_prefix, "$t");
        assert_eq!(o.max_errors, TranspileOptions::default().max_errors);
    }

    #[test]
    fn transpile_stops_at_the_first_violation() {
        let src = "let a = try { raise 1; } catch { };\nlet b = try { } catch { raise 1; };";
        let err = transpile(src, "t.js", &TranspileOptions::default()).unwrap_err();
        assert_eq!(err.line, 1);
        let all = check(src, "t.js", &TranspileOptions::default()).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn transpile_counts_lowered_nodes() {
        let out = transpile(
            "let a = try { raise 1; } catch { raise 2; };\nlet b = () => try { } catch { };",
            "t.js",
            &TranspileOptions::default(),
        )
        .unwrap();
        assert_eq!(out.lowered, 2);
        assert!(!out.code.contains("raise "));
    }

    #[test]
    fn custom_prefix_is_used() {
        let options = TranspileOptions {
            temp_prefix: "$tx_".into(),
            ..Default::default()
        };
        let out = transpile("let v = try { raise 1; } catch { raise 2; };", "t.js", &options).unwrap();
        assert!(out.code.starts_with("let $tx_raise0;\n"), "{}", out.code);
    }

    #[test]
    fn fragment_lowering_returns_prefix_and_reference() {
        let (pre, expr) = lower_fragment(
            "try { raise 1; } catch { raise 2; }",
            "f.js",
            &TranspileOptions::default(),
        )
        .unwrap();
        assert_eq!(expr, "__raise0");
        assert!(pre.starts_with("let __raise0;\ntry {\n"), "{}", pre);
    }

    #[test]
    fn fragment_lowering_spills_free_identifiers() {
        let (pre, expr) = lower_fragment(
            "f(x, try { g(); raise 1; } catch { raise 2; })",
            "f.js",
            &TranspileOptions::default(),
        )
        .unwrap();
        assert_eq!(expr, "__spill0(__spill1, __raise2)");
        assert!(
            pre.starts_with("const __spill0 = f;\nconst __spill1 = x;\nlet __raise2;\n"),
            "{}",
            pre
        );
    }

    #[test]
    fn syntax_errors_are_not_structural() {
        let err = check("let v = try { raise 1; };", "t.js", &TranspileOptions::default()).unwrap_err();
        assert_eq!(err.kind, crate::error::DiagnosticKind::Syntax);
    }
}
