//! Snapshot tests for diagnostic and error message formatting.
//!
//! Uses insta to capture messages and detect regressions.
//! Run `cargo insta review` to review changes.

use insta::assert_snapshot;

use ilc::diagnostics::CompileError;
use ilc::span::LineIndex;

/// One `file:line:col: severity[code]: message` line per diagnostic.
fn plain(source: &str) -> String {
    let diags = match ilc::check_basic(source) {
        Ok((_, diags)) => diags,
        Err(CompileError::Semantic { diagnostics }) => diagnostics,
        Err(other) => return other.to_string(),
    };
    let index = LineIndex::new(source);
    diags.iter().map(|d| d.to_line("prog.bas", &index)).collect::<Vec<_>>().join("\n")
}

fn compile_error(source: &str) -> String {
    match ilc::compile_basic(source, &ilc::CompileOptions::default()) {
        Ok(_) => panic!("compilation should have failed"),
        Err(e) => e.to_string(),
    }
}

#[test]
fn unknown_variable_with_suggestion() {
    assert_snapshot!(plain("count = 1\nPRINT cont\n"), @"prog.bas:2:7: error[B1001]: unknown variable 'cont'; did you mean 'count'?");
}

#[test]
fn unknown_line_number() {
    assert_snapshot!(plain("GOTO 100\n"), @"prog.bas:1:6: error[B1003]: unknown line 100");
}

#[test]
fn duplicate_procedure() {
    assert_snapshot!(plain("SUB a()\nEND SUB\nSUB a()\nEND SUB\n"), @"prog.bas:3:5: error[B1004]: duplicate procedure 'a'");
}

#[test]
fn constant_division_by_zero() {
    assert_snapshot!(plain("PRINT 7 MOD 0\n"), @"prog.bas:1:7: error[B2002]: divide by zero");
}

#[test]
fn several_errors_in_source_order() {
    assert_snapshot!(plain("PRINT y\nGOTO 5\n"), @r"
    prog.bas:1:7: error[B1001]: unknown variable 'y'
    prog.bas:2:6: error[B1003]: unknown line 5
    ");
}

#[test]
fn missing_end_function() {
    assert_snapshot!(compile_error("FUNCTION f()\n RETURN 1\n"), @"Syntax error: missing END FUNCTION for 'f'");
}

#[test]
fn semantic_error_summary() {
    assert_snapshot!(compile_error("PRINT a\nPRINT b\n"), @"2 semantic error(s)");
}

#[test]
fn verifier_names_function_and_block() {
    let err = ilc::parse_il("il 0.1\nfunc @main() -> i64 {\nentry:\n  br nowhere\n}\n").unwrap_err();
    assert_snapshot!(err.to_string(), @"Verification failed: @main: block entry: branch to unknown label 'nowhere'");
}

#[test]
fn step_limit_message() {
    let err = ilc::vm::VmError::StepLimit { limit: 1000 };
    assert_snapshot!(err.to_string(), @"VM: step limit exceeded (1000); aborting.");
}

#[test]
fn folded_il_text() {
    let mut m = ilc::parse_il(
        "il 0.1\nextern @rt_print_i64(i64) -> void\n\nfunc @main() -> i64 {\nentry:\n  %t0 = imul.ovf 6, 7\n  %t1 = iadd.ovf %t0, 1\n  call @rt_print_i64(%t1)\n  ret 0\n}\n",
    )
    .unwrap();
    ilc::optimize_with(&mut m, &["const-fold"], true).unwrap();
    assert_snapshot!(ilc::il::print_module(&m), @r"
    il 0.1
    extern @rt_print_i64(i64) -> void

    func @main() -> i64 {
    entry:
      call @rt_print_i64(43)
      ret 0
    }
    ");
}
