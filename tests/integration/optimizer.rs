mod common;
use common::*;

use ilc::il::Opcode;
use ilc::transform::OptLevel;
use ilc::CompileOptions;

fn compile_at(source: &str, level: OptLevel) -> ilc::il::Module {
    let opts = CompileOptions { opt: level, verify_each: true, ..CompileOptions::default() };
    ilc::compile_basic(source, &opts).unwrap().module
}

#[test]
fn o1_folds_constant_arithmetic() {
    let o0 = emit_il("PRINT 2 * 3 + 1\n", OptLevel::O0);
    let o1 = emit_il("PRINT 2 * 3 + 1\n", OptLevel::O1);
    assert!(o0.contains("imul.ovf 2, 3"), "{o0}");
    assert!(!o1.contains("imul.ovf"), "{o1}");
    assert!(o1.contains("call @rt_print_i64(7)"), "{o1}");
}

#[test]
fn o2_removes_a_constant_false_branch() {
    let m = compile_at("IF 1 > 2 THEN PRINT \"never\"\nPRINT \"always\"\n", OptLevel::O2);
    let main = m.function("main").unwrap();
    assert_eq!(main.calls_to("rt_print_str"), 1);
    assert!(main.blocks.iter().all(|b| b.instrs.iter().all(|i| i.op != Opcode::CBr)));
}

#[test]
fn overflowing_constants_are_left_for_run_time() {
    let il = emit_il("x = 9223372036854775807 + 1\n", OptLevel::O1);
    assert!(il.contains("iadd.ovf 9223372036854775807, 1"), "{il}");
}

#[test]
fn o2_turns_fib_into_a_loop() {
    let m = compile_at(
        "FUNCTION fib(n AS INTEGER) AS INTEGER\n  IF n <= 1 THEN RETURN n\n  RETURN fib(n - 1) + fib(n - 2)\nEND FUNCTION\nPRINT fib(20)\n",
        OptLevel::O2,
    );
    let fib = m.function("fib").unwrap();
    assert_eq!(fib.calls_to("fib"), 1);
    assert!(fib.blocks.iter().any(|b| b.params.len() == 2), "{}", ilc::il::print_module(&m));
}

#[test]
fn o2_leaves_non_sum_recursion_alone() {
    let m = compile_at(
        "FUNCTION f(n AS INTEGER) AS INTEGER\n  IF n <= 1 THEN RETURN n\n  RETURN f(n - 1) * f(n - 2)\nEND FUNCTION\nPRINT f(5)\n",
        OptLevel::O2,
    );
    assert_eq!(m.function("f").unwrap().calls_to("f"), 2);
}

#[test]
fn sibling_recursion_preserves_results() {
    let src = "\
FUNCTION fib(n AS INTEGER) AS INTEGER
  IF n <= 1 THEN RETURN n
  RETURN fib(n - 1) + fib(n - 2)
END FUNCTION
FOR i = 0 TO 15
  PRINT fib(i);
  PRINT \" \";
NEXT i
PRINT
";
    let expected = "0 1 1 2 3 5 8 13 21 34 55 89 144 233 377 610 \n";
    assert_eq!(run_basic_stdout_at(src, OptLevel::O0), expected);
    assert_eq!(run_basic_stdout_at(src, OptLevel::O2), expected);
}

#[test]
fn explicit_pass_lists() {
    let mut m = compile_at("IF 0 THEN PRINT 1\nPRINT 3 * 4\n", OptLevel::O0);
    ilc::optimize_with(&mut m, &["const-fold"], true).unwrap();
    let text = ilc::il::print_module(&m);
    assert!(text.contains("call @rt_print_i64(12)"), "{text}");
    ilc::optimize_with(&mut m, &["simplify-cfg", "dce"], true).unwrap();
    assert_eq!(m.function("main").unwrap().calls_to("rt_print_i64"), 1);
}

#[test]
fn unknown_pass_names_are_rejected() {
    let mut m = compile_at("PRINT 1\n", OptLevel::O0);
    let err = ilc::optimize_with(&mut m, &["inline"], false).unwrap_err();
    assert!(err.to_string().contains("unknown pass 'inline'"), "{err}");
}

#[test]
fn optimizing_twice_changes_nothing() {
    let src = "x = 3\nFOR i = 1 TO x\n  PRINT i * 2\nNEXT i\n";
    let mut m = compile_at(src, OptLevel::O2);
    let once = ilc::il::print_module(&m);
    ilc::optimize(&mut m, OptLevel::O2, true).unwrap();
    assert_eq!(ilc::il::print_module(&m), once);
}

#[test]
fn optimized_programs_behave_the_same() {
    let src = "\
DIM a(9)
FOR i = 0 TO 9
  a(i) = (i * 7) MOD 10
NEXT i
best = -1
FOR i = 0 TO 9
  IF a(i) > best THEN best = a(i)
NEXT i
s$ = \"\"
FOR i = 0 TO 9
  s$ = s$ + STR$(a(i))
NEXT i
PRINT best; \" \"; s$
";
    let o0 = run_basic_stdout_at(src, OptLevel::O0);
    assert_eq!(o0, "9 0741852963\n");
    assert_eq!(run_basic_stdout_at(src, OptLevel::O1), o0);
    assert_eq!(run_basic_stdout_at(src, OptLevel::O2), o0);
}

#[test]
fn o1_promotes_scalar_slots() {
    let src = "\
total = 0
FOR i = 1 TO 10
  IF i MOD 2 = 0 THEN total = total + i
NEXT i
name$ = \"sum\"
PRINT name$; \" \"; total
";
    let o0 = compile_at(src, OptLevel::O0);
    let slots = |m: &ilc::il::Module| {
        m.function("main").unwrap().blocks.iter().flat_map(|b| &b.instrs).filter(|i| i.op == Opcode::Alloca).count()
    };
    assert!(slots(&o0) >= 3);
    let o1 = compile_at(src, OptLevel::O1);
    assert_eq!(slots(&o1), 0, "{}", ilc::il::print_module(&o1));
    assert!(o1.function("main").unwrap().blocks.iter().any(|b| !b.params.is_empty()));
    ilc::il::verify_module(&o1).unwrap();

    let expected = "sum 30\n";
    assert_eq!(run_basic_stdout_at(src, OptLevel::O0), expected);
    assert_eq!(run_basic_stdout_at(src, OptLevel::O1), expected);
    assert_eq!(run_basic_stdout_at(src, OptLevel::O2), expected);
}
