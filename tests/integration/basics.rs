mod common;
use common::*;

use ilc::transform::OptLevel;
use ilc::vm::{DebugOptions, VmError};
use ilc::RunError;

#[test]
fn hello_world() {
    assert_eq!(run_basic_stdout("PRINT \"HELLO\"\n"), "HELLO\n");
}

#[test]
fn arithmetic_and_precedence() {
    let out = run_basic_stdout("PRINT 1 + 2 * 3\nPRINT (1 + 2) * 3\nPRINT 17 \\ 5\nPRINT 17 MOD 5\nPRINT -7 \\ 2\n");
    assert_eq!(out, "7\n9\n3\n2\n-3\n");
}

#[test]
fn integer_slash_truncates_and_doubles_divide() {
    let out = run_basic_stdout("PRINT 7 / 2\nx# = 7\nPRINT x# / 2\n");
    assert_eq!(out, "3\n3.5\n");
}

#[test]
fn power_is_floating_point() {
    assert_eq!(run_basic_stdout("PRINT 2 ^ 10\nPRINT -2 ^ 2\n"), "1024\n-4\n");
}

#[test]
fn variables_keep_their_suffix_types() {
    let src = "\
a = 41
a = a + 1
b# = 1.25
s$ = \"n=\"
PRINT s$; a
PRINT b# * 2
";
    assert_eq!(run_basic_stdout(src), "n=42\n2.5\n");
}

#[test]
fn semicolons_join_and_commas_tab() {
    let out = run_basic_stdout("PRINT \"A\"; \"B\"\nPRINT \"A\", \"B\"\nPRINT \"X\";\nPRINT \"Y\"\n");
    assert_eq!(out, format!("AB\nA{}B\nXY\n", " ".repeat(13)));
}

#[test]
fn comparisons_yield_minus_one_or_zero() {
    let out = run_basic_stdout("x = 3 > 2\ny = 3 < 2\nPRINT x; \" \"; y\nPRINT NOT 0\n");
    assert_eq!(out, "-1 0\n-1\n");
}

#[test]
fn string_concatenation_with_plus_and_ampersand() {
    let out = run_basic_stdout("a$ = \"foo\"\nb$ = a$ + \"bar\"\nPRINT b$ & \"!\"\nPRINT \"n\" & 5\n");
    assert_eq!(out, "foobar!\nn5\n");
}

#[test]
fn doubles_print_in_shortest_form() {
    let out = run_basic_stdout("x# = 0.1 + 0.2\nPRINT x#\ny# = 1 / 4.0\nPRINT y#\n");
    assert_eq!(out, "0.30000000000000004\n0.25\n");
}

#[test]
fn goto_skips_statements() {
    let src = "\
PRINT 1
GOTO 30
PRINT 2
30 PRINT 3
";
    assert_eq!(run_basic_stdout(src), "1\n3\n");
}

#[test]
fn end_stops_the_program() {
    assert_eq!(run_basic_stdout("PRINT 1\nEND\nPRINT 2\n"), "1\n");
}

#[test]
fn input_reads_typed_values() {
    let src = "\
INPUT \"Name? \"; n$
INPUT age
PRINT \"Hi \"; n$; \" \"; age + 1
";
    assert_eq!(run_basic_with_input(src, "Ada\n36\n"), "Name? Hi Ada 37\n");
}

#[test]
fn integer_overflow_traps() {
    let (err, _) = run_basic_err("x = 9223372036854775807\nx = x + 1\n");
    match err {
        RunError::Vm(VmError::Trap { message, .. }) => assert!(message.contains("overflow"), "{message}"),
        other => panic!("expected a trap, got {other}"),
    }
}

#[test]
fn same_output_at_every_level() {
    let src = "\
total = 0
FOR i = 1 TO 10
  IF i MOD 2 = 0 THEN total = total + i
NEXT i
PRINT total; \" \"; 6 * 7
";
    for level in [OptLevel::O0, OptLevel::O1, OptLevel::O2] {
        assert_eq!(run_basic_stdout_at(src, level), "30 42\n", "at {level}");
    }
}

#[test]
fn main_exits_with_zero() {
    let (result, _) = run_basic_at("PRINT 1\n", OptLevel::O1, DebugOptions::default());
    assert_eq!(result.unwrap().exit_code, 0);
}
