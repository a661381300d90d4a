#![allow(dead_code)]

use std::process::Command;

use ilc::diagnostics::CompileError;
use ilc::runtime::console;
use ilc::transform::OptLevel;
use ilc::vm::{DebugOptions, RunOutcome};
use ilc::{CompileOptions, RunError};

pub fn ilc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ilc"))
}

fn options(level: OptLevel) -> CompileOptions {
    CompileOptions { opt: level, verify_each: true, ..CompileOptions::default() }
}

/// Compile and run in-process at `level`, returning the outcome and stdout.
pub fn run_basic_at(source: &str, level: OptLevel, debug: DebugOptions) -> (Result<RunOutcome, RunError>, String) {
    console::capture_output(|| ilc::run_basic(source, &options(level), debug))
}

pub fn run_basic_stdout(source: &str) -> String {
    run_basic_stdout_at(source, OptLevel::O0)
}

pub fn run_basic_stdout_at(source: &str, level: OptLevel) -> String {
    let (result, out) = run_basic_at(source, level, DebugOptions::default());
    if let Err(e) = result {
        panic!("program failed: {e}\n--- stdout ---\n{out}");
    }
    out
}

/// Run with `input` standing in for stdin.
pub fn run_basic_with_input(source: &str, input: &str) -> String {
    console::set_input(input.as_bytes().to_vec());
    let out = run_basic_stdout(source);
    console::reset_input();
    out
}

/// Run a program that is expected to stop with a runtime error.
pub fn run_basic_err(source: &str) -> (RunError, String) {
    let (result, out) = run_basic_at(source, OptLevel::O0, DebugOptions::default());
    match result {
        Ok(outcome) => panic!("expected a failure, exited with {}\n{out}", outcome.exit_code),
        Err(e) => (e, out),
    }
}

pub fn emit_il(source: &str, level: OptLevel) -> String {
    match ilc::compile_basic(source, &options(level)) {
        Ok(c) => ilc::il::print_module(&c.module),
        Err(e) => panic!("compile failed: {e}"),
    }
}

pub fn compile_should_fail(source: &str) -> CompileError {
    match ilc::compile_basic(source, &CompileOptions::default()) {
        Ok(_) => panic!("compilation should have failed"),
        Err(e) => e,
    }
}

/// Compilation fails and some diagnostic carries `code` and mentions `msg`.
pub fn compile_should_fail_with(source: &str, code: &str, msg: &str) {
    match compile_should_fail(source) {
        CompileError::Semantic { diagnostics } => {
            assert!(
                diagnostics.iter().any(|d| d.code == code && d.message.contains(msg)),
                "no {code} mentioning {msg:?} in {diagnostics:#?}"
            );
        }
        other => panic!("expected semantic errors, got {other}"),
    }
}

/// Write `source` into a fresh temp dir as `prog.bas`.
pub fn write_program(source: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prog.bas");
    std::fs::write(&path, source).unwrap();
    (dir, path)
}
