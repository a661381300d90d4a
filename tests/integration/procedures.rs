mod common;
use common::*;

use ilc::transform::OptLevel;
use ilc::vm::DebugOptions;

const FIB: &str = "\
FUNCTION fib(n AS INTEGER) AS INTEGER
  IF n <= 1 THEN RETURN n
  RETURN fib(n - 1) + fib(n - 2)
END FUNCTION
PRINT fib(10)
";

#[test]
fn recursive_fib() {
    assert_eq!(run_basic_stdout(FIB), "55\n");
}

#[test]
fn fib_at_o2_makes_about_half_the_calls() {
    let counting = DebugOptions { count: true, ..DebugOptions::default() };
    let (o0, out0) = run_basic_at(FIB, OptLevel::O0, counting.clone());
    let (o2, out2) = run_basic_at(FIB, OptLevel::O2, counting);
    assert_eq!(out0, "55\n");
    assert_eq!(out2, "55\n");
    let calls0 = o0.unwrap().calls["fib"];
    let calls2 = o2.unwrap().calls["fib"];
    assert_eq!(calls0, 177);
    assert_eq!(calls2, 89);
}

#[test]
fn fib_agrees_with_a_loop_at_every_level() {
    let src = "\
FUNCTION fib(n AS INTEGER) AS INTEGER
  IF n <= 1 THEN RETURN n
  RETURN fib(n - 1) + fib(n - 2)
END FUNCTION
a = 0
b = 1
FOR i = 0 TO 20
  IF fib(i) <> a THEN PRINT \"mismatch at \"; i
  t = a + b
  a = b
  b = t
NEXT i
PRINT \"ok\"
";
    for level in [OptLevel::O0, OptLevel::O1, OptLevel::O2] {
        assert_eq!(run_basic_stdout_at(src, level), "ok\n", "at {level}");
    }
}

#[test]
fn subs_with_and_without_parens() {
    let src = "\
SUB greet(who$)
  PRINT \"hello, \"; who$
END SUB
greet \"ann\"
CALL greet(\"bob\")
";
    assert_eq!(run_basic_stdout(src), "hello, ann\nhello, bob\n");
}

#[test]
fn functions_return_strings_and_doubles() {
    let src = "\
FUNCTION shout$(s$)
  RETURN UCASE$(s$) + \"!\"
END FUNCTION
FUNCTION half#(x#)
  RETURN x# / 2
END FUNCTION
PRINT shout$(\"hey\")
PRINT half#(5)
";
    assert_eq!(run_basic_stdout(src), "HEY!\n2.5\n");
}

#[test]
fn scalars_are_passed_by_value_unless_byref() {
    let src = "\
SUB clobber(x AS INTEGER)
  x = 99
END SUB
SUB twice(BYREF x AS INTEGER)
  x = x * 2
END SUB
n = 4
clobber n
PRINT n
twice n
twice n
PRINT n
";
    assert_eq!(run_basic_stdout(src), "4\n16\n");
}

#[test]
fn locals_do_not_leak_between_procedures() {
    let src = "\
SUB setx()
  x = 5
  PRINT \"inner \"; x
END SUB
x = 1
CALL setx()
PRINT \"outer \"; x
";
    assert_eq!(run_basic_stdout(src), "inner 5\nouter 1\n");
}

#[test]
fn exit_sub_returns_early() {
    let src = "\
SUB count(n AS INTEGER)
  FOR i = 1 TO 10
    IF i > n THEN EXIT SUB
    PRINT i;
  NEXT i
  PRINT \" never\"
END SUB
count 3
PRINT
";
    assert_eq!(run_basic_stdout(src), "123\n");
}

#[test]
fn mutual_recursion() {
    let src = "\
FUNCTION isEven(n AS INTEGER) AS INTEGER
  IF n = 0 THEN RETURN 1
  RETURN isOdd(n - 1)
END FUNCTION
FUNCTION isOdd(n AS INTEGER) AS INTEGER
  IF n = 0 THEN RETURN 0
  RETURN isEven(n - 1)
END FUNCTION
PRINT isEven(10); isOdd(7); isEven(3)
";
    assert_eq!(run_basic_stdout(src), "110\n");
}

#[test]
fn missing_return_is_reported() {
    compile_should_fail_with(
        "FUNCTION bad(n AS INTEGER) AS INTEGER\n  IF n > 0 THEN RETURN 1\nEND FUNCTION\nPRINT bad(1)\n",
        "B1007",
        "missing return in FUNCTION bad",
    );
}

#[test]
fn argument_count_is_checked() {
    compile_should_fail_with("FUNCTION f(a)\n RETURN a\nEND FUNCTION\nPRINT f(1, 2)\n", "B2005", "wrong number of arguments");
}

#[test]
fn duplicate_procedures_are_rejected() {
    compile_should_fail_with("SUB a()\nEND SUB\nSUB a()\nEND SUB\n", "B1004", "duplicate procedure 'a'");
}
