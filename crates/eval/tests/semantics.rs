//! Behaviour of lowered try expressions.
//!
//! Each case transpiles source containing try expressions, re-parses the
//! emitted text and runs it, so the emitter's output is exercised too.

use tryexpr_core::{lower_fragment, transpile, TranspileOptions};

fn run(src: &str) -> Vec<String> {
    let out = transpile(src, "s.js", &TranspileOptions::default())
        .unwrap_or_else(|d| panic!("transpile failed: {}\n{}", d, src));
    tryexpr_eval::run_source(&out.code, "s.js")
        .unwrap_or_else(|e| panic!("evaluation failed: {}\n{}", e, out.code))
}

#[test]
fn try_value_or_catch_value() {
    let out = run(
        "function boom() { throw Error(\"x\"); }\n\
         let a = try { raise 1; } catch { raise 2; };\n\
         let b = try { boom(); raise 1; } catch { raise 2; };\n\
         console.log(a, b);",
    );
    assert_eq!(out, vec!["1 2"]);
}

#[test]
fn raise_does_not_leave_the_clause() {
    let out = run("let v = try { raise \"first\"; raise \"second\"; } catch { raise 0; };\nconsole.log(v);");
    assert_eq!(out, vec!["second"]);
}

#[test]
fn finally_raise_overrides() {
    let out = run(
        "let v = try { raise 1; } catch { raise 2; } finally (r) { raise 3; };\nconsole.log(v);",
    );
    assert_eq!(out, vec!["3"]);
}

#[test]
fn finally_raise_overrides_the_catch_value() {
    let out = run(
        "function boom() { throw Error(\"x\"); }\n\
         let seen;\n\
         let v = try { boom(); raise 1; } catch { raise 2; } finally (r) { seen = r; raise 3; };\n\
         console.log(v, seen);",
    );
    assert_eq!(out, vec!["3 2"]);
}

#[test]
fn finally_reads_without_overriding() {
    let out = run(
        "let seen;\n\
         let v = try { raise 1; } catch { raise 2; } finally (r) { seen = r; };\n\
         console.log(v, seen);",
    );
    assert_eq!(out, vec!["1 1"]);
}

#[test]
fn catch_binding_sees_the_exception() {
    let out = run(
        "let v = try { throw Error(\"bad\"); raise \"unreachable\"; } catch (e) { raise e.message; };\nconsole.log(v);",
    );
    assert_eq!(out, vec!["bad"]);
}

#[test]
fn no_raise_yields_undefined() {
    let out = run("function f() { }\nlet v = try { f(); } catch { };\nconsole.log(v);");
    assert_eq!(out, vec!["undefined"]);
}

#[test]
fn nested_try_expressions_are_independent() {
    let out = run(
        "let v = try { raise try { throw 1; raise 0; } catch (e) { raise e + 10; }; } catch { raise 0; };\n\
         console.log(v);",
    );
    assert_eq!(out, vec!["11"]);
}

#[test]
fn await_passes_through_raise() {
    let out = run(
        "async function get(x) { return x * 2; }\n\
         async function main() { let v = try { raise await get(21); } catch { raise 0; }; console.log(v); }\n\
         main();",
    );
    assert_eq!(out, vec!["42"]);
}

#[test]
fn hoisting_keeps_evaluation_order() {
    let out = run(
        "let log = [];\n\
         function t(x) { log.push(x); return x; }\n\
         let s = t(\"a\") + try { t(\"b\"); raise \"c\"; } catch { raise \"?\"; };\n\
         console.log(s, log);",
    );
    assert_eq!(out, vec!["ac [ 'a', 'b' ]"]);
}

#[test]
fn short_circuit_skips_the_try_expression() {
    let out = run(
        "let calls = 0;\n\
         function bump() { calls = calls + 1; return calls; }\n\
         let a = false && try { raise bump(); } catch { raise 0; };\n\
         let b = null ?? try { raise bump(); } catch { raise 0; };\n\
         console.log(a, b, calls);",
    );
    assert_eq!(out, vec!["false 1 1"]);
}

#[test]
fn loop_condition_runs_every_iteration() {
    let out = run(
        "let i = 0;\n\
         while (try { raise i < 3; } catch { raise false; }) { i = i + 1; }\n\
         console.log(i);",
    );
    assert_eq!(out, vec!["3"]);
}

#[test]
fn arrow_expression_body() {
    let out = run(
        "let f = (x) => try { if (x) { raise \"yes\"; } else { raise \"no\"; } } catch { raise \"err\"; };\n\
         console.log(f(1), f(0));",
    );
    assert_eq!(out, vec!["yes no"]);
}

#[test]
fn case_tests_evaluate_lazily() {
    let out = run(
        "let tried = [];\n\
         switch (2) {\n\
           case try { tried.push(1); raise 1; } catch { raise 0; }: console.log(\"one\"); break;\n\
           case try { tried.push(2); raise 2; } catch { raise 0; }: console.log(\"two\"); break;\n\
           case try { tried.push(3); raise 3; } catch { raise 0; }: console.log(\"three\");\n\
         }\n\
         console.log(tried);",
    );
    assert_eq!(out, vec!["two", "[ 1, 2 ]"]);
}

#[test]
fn return_inside_a_hoisted_clause_leaves_the_function() {
    let out = run(
        "function f() { let v = try { return \"early\"; } catch { }; return v; }\nconsole.log(f());",
    );
    assert_eq!(out, vec!["early"]);
}

#[test]
fn exceptions_from_finally_propagate() {
    let out = run(
        "let v = try { let w = try { raise 1; } catch { raise 2; } finally { throw Error(\"late\"); }; raise w; } catch (e) { raise e.message; };\n\
         console.log(v);",
    );
    assert_eq!(out, vec!["late"]);
}

#[test]
fn method_is_looked_up_before_the_arguments_run() {
    let out = run(
        "let o = Error(\"x\");\n\
         o.tag = \"kept\";\n\
         o.m = function (n) { return this.tag + n; };\n\
         let r = o.m(try { o.m = function (n) { return \"new\"; }; raise 1; } catch { raise 2; });\n\
         console.log(r);",
    );
    assert_eq!(out, vec!["kept1"]);
}

#[test]
fn computed_callee_is_looked_up_before_the_arguments_run() {
    let out = run(
        "let fns = [function () { return \"old\"; }];\n\
         let r = fns[0](try { fns[0] = function () { return \"new\"; }; raise 1; } catch { raise 2; });\n\
         console.log(r);",
    );
    assert_eq!(out, vec!["old"]);
}

#[test]
fn fragment_operands_keep_their_values() {
    let (pre, expr) = lower_fragment(
        "f(x, try { g(); raise 1; } catch { raise 2; })",
        "s.js",
        &TranspileOptions::default(),
    )
    .unwrap();
    let host = format!(
        "let x = \"before\";\n\
         function g() {{ x = \"after\"; }}\n\
         function f(a, b) {{ return a; }}\n\
         {}console.log({});\n",
        pre, expr
    );
    let out = tryexpr_eval::run_source(&host, "s.js")
        .unwrap_or_else(|e| panic!("evaluation failed: {}\n{}", e, host));
    assert_eq!(out, vec!["before"]);
}
