//! Conformance suite runner.
//!
//! Convention:
//!   positive/               -- *.js + *.expected.js (lowered source), and
//!                              optionally *.expected-output.txt (console output)
//!   negative/pass0..pass4/  -- *.js + *.expected-error.json (first diagnostic)

use crate::config;
use crate::tap::{FixtureKind, Tap};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tryexpr_core::{parse_source, transpile};
use tryexpr_eval::{run_program, EvalOptions};

pub struct RunResult {
    pub total: usize,
    pub failed: usize,
}

pub fn run_suite(suite_dir: &Path) -> RunResult {
    let tap = collect_suite(suite_dir);
    let result = RunResult {
        total: tap.total(),
        failed: tap.failure_count(),
    };
    tracing::info!(total = result.total, failed = result.failed, "conformance suite finished");
    tap.finish();
    result
}

fn collect_suite(suite_dir: &Path) -> Tap {
    let mut tap = Tap::new();
    run_positive_tests(suite_dir, &mut tap);
    for pass in 0..=4 {
        run_negative_tests(suite_dir, pass, &mut tap);
    }
    tap
}

fn run_positive_tests(suite_dir: &Path, tap: &mut Tap) {
    let dir = suite_dir.join("positive");
    if !dir.exists() {
        return;
    }
    let mut entries = glob_source_files(&dir);
    entries.sort();
    for src_path in &entries {
        let stem = stem(src_path);
        let code = match check_lowering(&dir, src_path, &stem) {
            Ok(code) => {
                tap.record(FixtureKind::Lowered, &stem, Ok(()));
                code
            }
            Err(e) => {
                tap.record(FixtureKind::Lowered, &stem, Err(e));
                continue;
            }
        };
        let output_path = dir.join(format!("{}.expected-output.txt", stem));
        if output_path.exists() {
            let outcome = check_output(&output_path, &code, src_path);
            tap.record(FixtureKind::Output, &stem, outcome);
        }
    }
}

fn run_negative_tests(suite_dir: &Path, pass: u8, tap: &mut Tap) {
    let dir = suite_dir.join(format!("negative/pass{}", pass));
    if !dir.exists() {
        return;
    }
    let mut entries = glob_source_files(&dir);
    entries.sort();
    for src_path in &entries {
        let stem = stem(src_path);
        let outcome = check_rejection(&dir, src_path, &stem, pass);
        tap.record(FixtureKind::Rejected(pass), &stem, outcome);
    }
}

/// Transpile a positive fixture and compare it with its expected source.
/// Returns the lowered source on a match.
fn check_lowering(dir: &Path, src_path: &Path, stem: &str) -> Result<String, String> {
    let expected_path = dir.join(format!("{}.expected.js", stem));
    if !expected_path.exists() {
        return Err(format!("missing expected file: {}", expected_path.display()));
    }
    let src = read_text(src_path)?;
    let expected = read_text(&expected_path)?;
    let options = config::load_options(src_path, None)?;
    let out = transpile(&src, &file_name(src_path), &options)
        .map_err(|e| format!("unexpected diagnostic (pass {}): {}", e.pass, e.message))?;
    if normalize(&out.code) != normalize(&expected) {
        return Err(text_diff(&expected, &out.code));
    }
    Ok(out.code)
}

/// The lowered source must parse as plain source and print the expected
/// console output.
fn check_output(output_path: &Path, code: &str, src_path: &Path) -> Result<(), String> {
    let expected = read_text(output_path)?;
    let program = parse_source(code, &file_name(src_path))
        .map_err(|e| format!("lowered source does not parse: {}", e))?;
    let lines = run_program(&program, &EvalOptions::default())
        .map_err(|e| format!("evaluation failed: {}", e))?;
    let got = lines.join("\n");
    if normalize(&got) == normalize(&expected) {
        Ok(())
    } else {
        Err(text_diff(&expected, &got))
    }
}

/// The first diagnostic of a negative fixture must equal its expected JSON.
fn check_rejection(dir: &Path, src_path: &Path, stem: &str, pass: u8) -> Result<(), String> {
    let expected_path = dir.join(format!("{}.expected-error.json", stem));
    if !expected_path.exists() {
        return Err(format!(
            "missing expected-error file: {}",
            expected_path.display()
        ));
    }
    let expected = read_json(&expected_path)?;
    let src = read_text(src_path)?;
    let options = config::load_options(src_path, None)?;
    let got = match transpile(&src, &file_name(src_path), &options) {
        Ok(_) => {
            return Err(format!(
                "expected pass {} diagnostic but transpilation succeeded",
                pass
            ))
        }
        Err(d) => d.to_json_value(),
    };
    if json_equal(&got, &expected) {
        Ok(())
    } else {
        Err(format!("error mismatch:\n{}", json_diff(&expected, &got)))
    }
}

// -- Helpers --

fn glob_source_files(dir: &Path) -> Vec<PathBuf> {
    let mut results = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let is_js = path.extension().and_then(|e| e.to_str()) == Some("js");
            if is_js && !file_name(&path).ends_with(".expected.js") {
                results.push(path);
            }
        }
    }
    results
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

fn read_text(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))
}

fn read_json(path: &Path) -> Result<Value, String> {
    let src = read_text(path)?;
    serde_json::from_str(&src).map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))
}

/// Line endings and trailing blank lines do not count.
fn normalize(s: &str) -> String {
    s.replace("\r\n", "\n").trim_end().to_owned()
}

fn text_diff(expected: &str, got: &str) -> String {
    let expected = normalize(expected);
    let got = normalize(got);
    let mismatch = expected
        .lines()
        .zip(got.lines())
        .position(|(e, g)| e != g)
        .unwrap_or_else(|| expected.lines().count().min(got.lines().count()));
    format!(
        "first difference at line {}\n--- expected\n{}\n+++ got\n{}",
        mismatch + 1,
        expected,
        got
    )
}

/// Deep equality of two JSON values, normalizing number types.
fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(am), Value::Object(bm)) => {
            if am.len() != bm.len() {
                return false;
            }
            am.iter()
                .all(|(k, v)| bm.get(k).is_some_and(|bv| json_equal(v, bv)))
        }
        (Value::Array(av), Value::Array(bv)) => {
            av.len() == bv.len() && av.iter().zip(bv).all(|(a, b)| json_equal(a, b))
        }
        (Value::Number(an), Value::Number(bn)) => an.as_f64() == bn.as_f64(),
        (Value::Null, Value::Null) => true,
        _ => a == b,
    }
}

fn json_diff(expected: &Value, got: &Value) -> String {
    let exp_str = serde_json::to_string_pretty(expected).unwrap_or_default();
    let got_str = serde_json::to_string_pretty(got).unwrap_or_default();
    format!("--- expected\n{}\n+++ got\n{}", exp_str, got_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn passing_and_failing_points() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "positive/a.js", "let v = try { raise 1; } catch { raise 2; };\nconsole.log(v);\n");
        write(
            root,
            "positive/a.expected.js",
            "let __raise0;\ntry {\n  __raise0 = 1;\n} catch {\n  __raise0 = 2;\n}\nlet v = __raise0;\nconsole.log(v);\n",
        );
        write(root, "positive/a.expected-output.txt", "1\n");
        write(root, "positive/b.js", "let x = 1;\n");
        write(root, "negative/pass2/c.js", "let v = try { raise 1; } catch { };\n");
        write(
            root,
            "negative/pass2/c.expected-error.json",
            r#"{"file":"c.js","kind":"structural_violation","line":1,"message":"raise must appear in both try and catch, or neither","pass":2,"rule":"symmetry","span":{"start":8,"end":34}}"#,
        );

        let tap = collect_suite(root);
        let report = tap.render();
        assert!(report.contains("ok 1 - positive/a\n"), "{}", report);
        assert!(report.contains("ok 2 - positive/a (output)\n"), "{}", report);
        assert!(report.contains("not ok 3 - positive/b\n"), "{}", report);
        assert!(report.contains("ok 4 - negative/pass2/c\n"), "{}", report);
        assert!(report.contains("# lowered 1/2\n"), "{}", report);
        assert!(report.contains("# output 1/1\n"), "{}", report);
        assert!(report.contains("# rejected at pass 2 1/1\n"), "{}", report);
        assert_eq!(tap.failure_count(), 1);
        assert_eq!(tap.total(), 4);
    }

    #[test]
    fn expected_files_are_not_inputs() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.js", "");
        write(tmp.path(), "a.expected.js", "");
        let found = glob_source_files(tmp.path());
        assert_eq!(found.len(), 1);
        assert_eq!(file_name(&found[0]), "a.js");
    }

    #[test]
    fn json_numbers_compare_by_value() {
        let a: Value = serde_json::from_str(r#"{"n": 1.0}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"n": 1}"#).unwrap();
        assert!(json_equal(&a, &b));
    }
}
