mod diagnostics;
mod language;
mod runtime;

use clap::{Parser, Subcommand};
use runtime::interpreter::{Interpreter, InterpreterConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::{fs, io};

#[derive(Debug, Parser)]
#[command(
    name = "relua",
    version,
    about = "A source-aware Lua interpreter",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parse and evaluate a script, printing its result and any proposed
    /// source change.
    Run {
        file: PathBuf,
        /// Apply the proposed source change (if any) and print the
        /// rewritten program.
        #[arg(long)]
        apply: bool,
        #[arg(long)]
        trace_nodes: bool,
        #[arg(long)]
        trace_calls: bool,
    },
    /// Parse a script and report diagnostics without running it.
    Check { file: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            file,
            apply,
            trace_nodes,
            trace_calls,
        } => run(&file, apply, trace_nodes, trace_calls),
        Commands::Check { file } => check(&file),
    }
}

fn read(file: &PathBuf) -> Result<String, ExitCode> {
    fs::read_to_string(file).map_err(|err| {
        report_io_error(file, &err);
        ExitCode::FAILURE
    })
}

fn report_io_error(file: &PathBuf, err: &io::Error) {
    eprintln!("Failed to read {}: {err}", file.display());
}

fn run(file: &PathBuf, apply: bool, trace_nodes: bool, trace_calls: bool) -> ExitCode {
    let source = match read(file) {
        Ok(source) => source,
        Err(code) => return code,
    };
    let name = file.display().to_string();

    let mut interpreter = Interpreter::new();
    let parsed = interpreter.parse(&source);
    if !parsed.is_ok() {
        diagnostics::emit_syntax_errors(&name, &source, &parsed.errors);
        return ExitCode::FAILURE;
    }
    interpreter.set_config(InterpreterConfig {
        trace_nodes,
        trace_calls,
        ..InterpreterConfig::default()
    });

    let result = match interpreter.evaluate() {
        Ok(result) => result,
        Err(err) => {
            diagnostics::report_runtime_error(&name, &source, &err);
            return ExitCode::FAILURE;
        }
    };

    if !result.value.is_nil() {
        println!("{}", result.value);
    }
    if let Some(change) = &result.source_change {
        println!("proposed source change:");
        for edit in change.first_alternative() {
            println!("  {} -> `{}`", edit.range, edit.replacement);
        }
        if apply {
            if let Err(err) = interpreter.apply_source_change(change) {
                diagnostics::report_runtime_error(&name, &source, &err);
                return ExitCode::FAILURE;
            }
            println!("rewritten program:\n{}", interpreter.source_code());
        }
    }
    ExitCode::SUCCESS
}

fn check(file: &PathBuf) -> ExitCode {
    let source = match read(file) {
        Ok(source) => source,
        Err(code) => return code,
    };
    let name = file.display().to_string();

    let mut interpreter = Interpreter::new();
    let parsed = interpreter.parse(&source);
    if parsed.is_ok() {
        println!("{name}: ok");
        ExitCode::SUCCESS
    } else {
        diagnostics::emit_syntax_errors(&name, &source, &parsed.errors);
        ExitCode::FAILURE
    }
}
