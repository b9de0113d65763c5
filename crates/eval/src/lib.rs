//! Reference evaluator for lowered programs.
//!
//! Runs the standard subset that the lowering pass produces, so tests and
//! the `run` command can check that a lowered program behaves the way the
//! try expression it came from promises. `await` settles synchronously and
//! generators are not supported.

pub mod builtins;
pub mod interp;
pub mod types;

pub use interp::{EvalOptions, Interpreter};
pub use types::{EvalError, Value};

use tryexpr_core::ast::Program;

/// Run a program and return the lines it printed.
pub fn run_program(program: &Program, options: &EvalOptions) -> Result<Vec<String>, EvalError> {
    let mut interp = Interpreter::new(options.clone());
    interp.run(program)?;
    Ok(interp.into_output())
}

/// Parse and run standard source text.
pub fn run_source(src: &str, file: &str) -> Result<Vec<String>, EvalError> {
    let program = tryexpr_core::parse_source(src, file)?;
    run_program(&program, &EvalOptions::default())
}

// ──────────────────────────────────────────────
// Unit tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> Vec<String> {
        run_source(src, "e.js").unwrap_or_else(|e| panic!("{}", e))
    }

    #[test]
    fn arithmetic_and_strings() {
        assert_eq!(
            run("console.log(1 + 2 * 3, \"a\" + 1, 7 % 4, typeof x);"),
            vec!["7 a1 3 undefined"]
        );
    }

    #[test]
    fn closures_capture_scope() {
        let out = run(
            "function counter() { let n = 0; return () => { n = n + 1; return n; }; }\n\
             let c = counter();\nc();\nconsole.log(c());",
        );
        assert_eq!(out, vec!["2"]);
    }

    #[test]
    fn finally_overrides_on_abrupt_completion() {
        let out = run(
            "function f() { try { return 1; } finally { return 2; } }\n\
             function g() { try { throw 1; } catch (e) { return e; } finally { console.log(\"cleanup\"); } }\n\
             console.log(f(), g());",
        );
        assert_eq!(out, vec!["cleanup", "2 1"]);
    }

    #[test]
    fn loops_switch_and_break() {
        let out = run(
            "let i = 0; let log = [];\n\
             while (true) { i = i + 1; if (i > 4) { break; } if (i == 2) { continue; } log.push(i); }\n\
             switch (i) { case 4: log.push(\"four\"); case 5: log.push(\"five\"); break; default: log.push(\"other\"); }\n\
             console.log(log);",
        );
        assert_eq!(out, vec!["[ 1, 3, 4, 'five' ]"]);
    }

    #[test]
    fn runtime_errors_are_catchable() {
        let out = run(
            "try { undefined.x; } catch (e) { console.log(e.name); }\n\
             try { const k = 1; k = 2; } catch (e) { console.log(e.message); }",
        );
        assert_eq!(out, vec!["TypeError", "Assignment to constant variable."]);
    }

    #[test]
    fn uncaught_exception_is_an_error() {
        let err = run_source("throw Error(\"boom\");", "e.js").unwrap_err();
        assert_eq!(
            err,
            EvalError::Uncaught {
                value: "Error: boom".into()
            }
        );
    }

    #[test]
    fn unlowered_constructs_are_rejected() {
        let err = run_source("let v = try { raise 1; } catch { raise 2; };", "e.js").unwrap_err();
        assert_eq!(
            err,
            EvalError::Unlowered {
                construct: "try expression"
            }
        );
    }

    #[test]
    fn step_limit_stops_runaway_loops() {
        let program = tryexpr_core::parse_source("while (true) { }", "e.js").unwrap();
        let err = run_program(
            &program,
            &EvalOptions {
                max_steps: 100,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err, EvalError::StepLimit { limit: 100 });
    }

    #[test]
    fn await_settles_synchronously() {
        let out = run(
            "async function get() { return 5; }\n\
             async function main() { let v = await get(); console.log(v); }\n\
             main();\nconsole.log(\"after\");",
        );
        assert_eq!(out, vec!["5", "after"]);
    }

    #[test]
    fn function_call_binds_this() {
        let out = run("function f(a) { return this; }\nconsole.log(f.call(7, 1));");
        assert_eq!(out, vec!["7"]);
    }
}
