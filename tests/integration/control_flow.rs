mod common;
use common::*;

use ilc::transform::OptLevel;
use ilc::vm::VmError;
use ilc::RunError;

#[test]
fn for_loop_with_step() {
    let src = "\
FOR i = 1 TO 10 STEP 3
  PRINT i;
NEXT i
PRINT
FOR j = 3 TO 1 STEP -1
  PRINT j;
NEXT
PRINT
";
    assert_eq!(run_basic_stdout(src), "14710\n321\n");
}

#[test]
fn for_loop_that_never_runs() {
    assert_eq!(run_basic_stdout("FOR i = 5 TO 1\n PRINT i\nNEXT i\nPRINT \"done\"\n"), "done\n");
}

#[test]
fn loop_variable_is_past_the_limit_afterwards() {
    assert_eq!(run_basic_stdout("FOR i = 1 TO 3\nNEXT i\nPRINT i\n"), "4\n");
}

#[test]
fn dynamic_step_sign_is_checked_at_run_time() {
    let src = "\
s = -2
FOR i = 6 TO 1 STEP s
  PRINT i;
NEXT i
PRINT
";
    assert_eq!(run_basic_stdout(src), "642\n");
}

#[test]
fn nested_loops() {
    let src = "\
FOR i = 1 TO 3
  FOR j = 1 TO i
    PRINT \"*\";
  NEXT j
  PRINT
NEXT i
";
    assert_eq!(run_basic_stdout(src), "*\n**\n***\n");
}

#[test]
fn while_wend() {
    let src = "\
x = 1
WHILE x < 100
  x = x * 3
WEND
PRINT x
";
    assert_eq!(run_basic_stdout(src), "243\n");
}

#[test]
fn do_loop_forms() {
    let src = "\
n = 0
DO
  n = n + 1
LOOP UNTIL n >= 3
PRINT n
DO WHILE n > 0
  n = n - 2
LOOP
PRINT n
DO
  n = n + 10
LOOP WHILE n < 0
PRINT n
";
    assert_eq!(run_basic_stdout(src), "3\n-1\n9\n");
}

#[test]
fn exit_leaves_the_innermost_loop() {
    let src = "\
FOR i = 1 TO 10
  IF i = 4 THEN EXIT FOR
  PRINT i;
NEXT i
PRINT
n = 0
DO
  n = n + 1
  IF n > 2 THEN EXIT DO
LOOP
PRINT n
";
    assert_eq!(run_basic_stdout(src), "123\n3\n");
}

#[test]
fn block_if_elseif_else() {
    let src = "\
FOR i = 1 TO 4
  IF i = 1 THEN
    PRINT \"one\"
  ELSEIF i = 2 THEN
    PRINT \"two\"
  ELSEIF i = 3 THEN
    PRINT \"three\"
  ELSE
    PRINT \"many\"
  END IF
NEXT i
";
    assert_eq!(run_basic_stdout(src), "one\ntwo\nthree\nmany\n");
}

#[test]
fn single_line_if_with_else_and_colons() {
    let src = "\
x = 5
IF x > 3 THEN PRINT \"big\" : PRINT \"really\" ELSE PRINT \"small\"
IF x < 3 THEN PRINT \"big\" ELSE PRINT \"small\"
";
    assert_eq!(run_basic_stdout(src), "big\nreally\nsmall\n");
}

#[test]
fn select_case_on_integers() {
    let src = "\
FOR n = 0 TO 12 STEP 3
  SELECT CASE n
  CASE 0
    PRINT \"zero\"
  CASE 1, 2, 3
    PRINT \"small\"
  CASE 4 TO 6
    PRINT \"medium\"
  CASE IS > 10
    PRINT \"huge\"
  CASE ELSE
    PRINT \"other\"
  END SELECT
NEXT n
";
    assert_eq!(run_basic_stdout(src), "zero\nsmall\nmedium\nother\nhuge\n");
}

#[test]
fn select_case_on_strings() {
    let src = "\
c$ = \"green\"
SELECT CASE c$
CASE \"red\"
  PRINT 1
CASE \"green\", \"blue\"
  PRINT 2
END SELECT
";
    assert_eq!(run_basic_stdout(src), "2\n");
}

#[test]
fn gosub_returns_to_the_call_site() {
    let src = "\
x = 1
GOSUB 100
GOSUB 100
PRINT \"x=\"; x
END
100 x = x * 10
RETURN
";
    assert_eq!(run_basic_stdout(src), "x=100\n");
}

#[test]
fn return_without_gosub_traps() {
    let (err, out) = run_basic_err("PRINT \"a\"\nRETURN\n");
    assert_eq!(out, "a\n");
    match err {
        RunError::Vm(VmError::Trap { message, .. }) => assert_eq!(message, "RETURN without GOSUB"),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn andalso_skips_the_right_side() {
    let src = "\
d = 0
IF d <> 0 ANDALSO 10 \\ d > 1 THEN PRINT \"yes\" ELSE PRINT \"no\"
IF d = 0 ORELSE 10 \\ d > 1 THEN PRINT \"yes\" ELSE PRINT \"no\"
";
    assert_eq!(run_basic_stdout(src), "no\nyes\n");
}

#[test]
fn loops_agree_across_levels() {
    let src = "\
sum = 0
i = 0
WHILE i < 50
  i = i + 1
  IF i MOD 3 = 0 THEN sum = sum + i
WEND
PRINT sum
";
    for level in [OptLevel::O0, OptLevel::O1, OptLevel::O2] {
        assert_eq!(run_basic_stdout_at(src, level), "408\n");
    }
}
