mod config;
mod runner;
mod tap;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use tryexpr_core::{Diagnostic, TranspileOptions};
use tryexpr_eval::{run_program, EvalOptions};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Expression-level try/raise transpiler.
#[derive(Parser)]
#[command(
    name = "tryexpr",
    version,
    about = "Expression-level try/raise transpiler"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log pipeline progress to stderr (same as RUST_LOG=debug)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Prefix for generated temporaries (overrides tryexpr.toml)
    #[arg(long, global = true)]
    temp_prefix: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lower try expressions and print standard source
    Lower {
        /// Path to the source file
        file: PathBuf,
    },

    /// Report every structural violation without lowering
    Check {
        /// Path to the source file
        file: PathBuf,
    },

    /// Lower a file and evaluate the result, printing console output
    Run {
        /// Path to the source file
        file: PathBuf,
    },

    /// Run the conformance test suite
    Test {
        /// Path to the conformance suite directory
        #[arg(default_value = "conformance")]
        suite_dir: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let prefix = cli.temp_prefix.as_deref();
    match cli.command {
        Commands::Lower { file } => cmd_lower(&file, prefix, cli.output, cli.quiet),
        Commands::Check { file } => cmd_check(&file, prefix, cli.output, cli.quiet),
        Commands::Run { file } => cmd_run(&file, prefix, cli.output, cli.quiet),
        Commands::Test { suite_dir } => cmd_test(&suite_dir),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Read the input and resolve its options, or exit.
fn load_input(
    file: &Path,
    prefix: Option<&str>,
    output: OutputFormat,
    quiet: bool,
) -> (String, TranspileOptions) {
    let src = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", file.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match config::load_options(file, prefix) {
        Ok(options) => (src, options),
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_lower(file: &Path, prefix: Option<&str>, output: OutputFormat, quiet: bool) {
    let (src, options) = load_input(file, prefix, output, quiet);
    match tryexpr_core::transpile(&src, &runner::file_name(file), &options) {
        Ok(out) => match output {
            OutputFormat::Text => print!("{}", out.code),
            OutputFormat::Json => {
                #[derive(Serialize)]
                struct LowerReport<'a> {
                    file: String,
                    lowered: usize,
                    code: &'a str,
                }
                print_json(&LowerReport {
                    file: runner::file_name(file),
                    lowered: out.lowered,
                    code: &out.code,
                });
            }
        },
        Err(d) => {
            report_diagnostic(&d, output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_check(file: &Path, prefix: Option<&str>, output: OutputFormat, quiet: bool) {
    let (src, options) = load_input(file, prefix, output, quiet);
    let diagnostics = match tryexpr_core::check(&src, &runner::file_name(file), &options) {
        Ok(errors) => errors,
        Err(d) => vec![d],
    };

    match output {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "file": runner::file_name(file),
                "diagnostics": diagnostics.iter().map(Diagnostic::to_json_value).collect::<Vec<_>>(),
            });
            print_json(&report);
        }
        OutputFormat::Text => {
            for d in &diagnostics {
                eprintln!("{}", format_diagnostic(d));
            }
            if diagnostics.is_empty() && !quiet {
                println!("ok: {}", file.display());
            }
        }
    }
    if !diagnostics.is_empty() {
        process::exit(1);
    }
}

fn cmd_run(file: &Path, prefix: Option<&str>, output: OutputFormat, quiet: bool) {
    let (src, options) = load_input(file, prefix, output, quiet);
    let out = match tryexpr_core::transpile(&src, &runner::file_name(file), &options) {
        Ok(out) => out,
        Err(d) => {
            report_diagnostic(&d, output, quiet);
            process::exit(1);
        }
    };
    match run_program(&out.program, &EvalOptions::default()) {
        Ok(lines) => match output {
            OutputFormat::Text => {
                for line in &lines {
                    println!("{}", line);
                }
            }
            OutputFormat::Json => print_json(&serde_json::json!({ "output": lines })),
        },
        Err(e) => {
            report_error(&format!("runtime error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_test(suite_dir: &Path) {
    if !suite_dir.exists() {
        eprintln!(
            "error: conformance suite directory not found: {}",
            suite_dir.display()
        );
        process::exit(1);
    }

    let result = runner::run_suite(suite_dir);
    if result.failed > 0 {
        process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T) {
    let pretty = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
    println!("{}", pretty);
}

/// `file:line: kind[rule]: message`
fn format_diagnostic(d: &Diagnostic) -> String {
    let kind = serde_json::to_value(d.kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default();
    match &d.rule {
        Some(rule) => format!("{}:{}: {}[{}]: {}", d.file, d.line, kind, rule, d.message),
        None => format!("{}:{}: {}: {}", d.file, d.line, kind, d.message),
    }
}

fn report_diagnostic(d: &Diagnostic, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => {
            let err_json = serde_json::to_string_pretty(&d.to_json_value())
                .unwrap_or_else(|_| format!("{{\"error\": \"{:?}\"}}", d));
            eprintln!("{}", err_json);
        }
        OutputFormat::Text => {
            if !quiet {
                eprintln!("{}", format_diagnostic(d));
            }
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
