mod common;
use common::*;

use ilc::transform::OptLevel;
use ilc::vm::VmError;
use ilc::{CompileOptions, RunError};
use ilc::lower::LowerOptions;
use ilc::runtime::TrapKind;
use ilc::vm::DebugOptions;

#[test]
fn fill_and_sum() {
    let src = "\
DIM a(5)
FOR i = 0 TO 5
  a(i) = i * i
NEXT i
total = 0
FOR i = LBOUND(a) TO UBOUND(a)
  total = total + a(i)
NEXT i
PRINT total; \" \"; UBOUND(a)
";
    assert_eq!(run_basic_stdout(src), "55 5\n");
}

#[test]
fn elements_start_at_zero_value() {
    assert_eq!(run_basic_stdout("DIM a(2)\nDIM s$(2)\nPRINT a(1); \"[\"; s$(1); \"]\"\n"), "0[]\n");
}

#[test]
fn string_and_double_arrays() {
    let src = "\
DIM names$(2)
names$(0) = \"ann\"
names$(1) = \"bob\"
names$(2) = names$(0) + names$(1)
PRINT names$(2)
DIM v(1) AS DOUBLE
v(0) = 1.5
v(1) = v(0) * 3
PRINT v(1)
";
    assert_eq!(run_basic_stdout(src), "annbob\n4.5\n");
}

#[test]
fn redim_keeps_existing_elements() {
    let src = "\
DIM a(1)
a(0) = 7
a(1) = 8
REDIM a(3)
a(3) = 9
PRINT a(0); a(1); a(2); a(3); \" \"; UBOUND(a)
";
    assert_eq!(run_basic_stdout(src), "7809 3\n");
}

#[test]
fn arrays_are_passed_by_reference() {
    let src = "\
SUB bump(BYREF a() AS INTEGER, n AS INTEGER)
  FOR i = 0 TO n
    a(i) = a(i) + 1
  NEXT i
END SUB
DIM v(2)
v(1) = 10
bump v, 2
bump v, 1
PRINT v(0); \" \"; v(1); \" \"; v(2)
";
    assert_eq!(run_basic_stdout(src), "2 12 1\n");
}

#[test]
fn out_of_bounds_read_traps() {
    let (err, out) = run_basic_err("DIM a(3)\nPRINT \"before\"\ni = 4\nPRINT a(i)\n");
    assert_eq!(out, "before\n");
    match err {
        RunError::Vm(VmError::Trap { kind, message, .. }) => {
            assert_eq!(kind, TrapKind::Bounds);
            assert_eq!(message, "index 4 out of bounds (len=4)");
        }
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn negative_index_traps() {
    let (err, _) = run_basic_err("DIM a(3)\ni = -1\na(i) = 1\n");
    assert!(matches!(err, RunError::Vm(VmError::Trap { kind: TrapKind::Bounds, .. })), "{err}");
}

#[test]
fn runtime_still_checks_without_inline_bounds_checks() {
    let opts = CompileOptions { lower: LowerOptions { bounds_checks: false }, ..CompileOptions::default() };
    let compiled = ilc::compile_basic("DIM a(3)\ni = 9\nPRINT a(i)\n", &opts).unwrap();
    let text = ilc::il::print_module(&compiled.module);
    assert!(!text.contains("rt_arr_oob_panic"), "{text}");
    let (result, _) = ilc::runtime::console::capture_output(|| {
        ilc::vm::run_module(&compiled.module, DebugOptions::default())
    });
    assert!(matches!(result, Err(VmError::Trap { kind: TrapKind::Bounds, .. })));
}

#[test]
fn constant_out_of_range_index_is_only_a_warning() {
    let compiled = ilc::compile_basic("DIM a(3)\na(3) = 1\nIF 0 THEN a(7) = 2\nPRINT a(3)\n", &CompileOptions::default()).unwrap();
    assert_eq!(compiled.warnings.len(), 1);
    assert_eq!(compiled.warnings[0].code, "B3001");
    assert_eq!(run_basic_stdout_at("DIM a(3)\na(3) = 1\nIF 0 THEN a(7) = 2\nPRINT a(3)\n", OptLevel::O1), "1\n");
}

#[test]
fn zero_sized_array_is_rejected() {
    compile_should_fail_with("DIM a(0)\n", "B2003", "array size must be positive");
}
