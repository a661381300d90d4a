mod common;
use common::*;

use ilc::RunError;
use ilc::runtime::TrapKind;
use ilc::vm::VmError;

#[test]
fn unhandled_trap_reports_kind_and_line() {
    let (err, out) = run_basic_err("PRINT \"start\"\nx = 0\nPRINT 1 \\ x\nPRINT \"unreached\"\n");
    assert_eq!(out, "start\n");
    match err {
        RunError::Vm(VmError::Trap { kind, message, function, line, .. }) => {
            assert_eq!(kind, TrapKind::DivideByZero);
            assert_eq!(message, "divide by zero");
            assert_eq!(function, "main");
            assert_eq!(line, 3);
        }
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn resume_next_continues_after_the_failing_statement() {
    let src = "\
ON ERROR GOTO 100
OPEN \"/no/such/dir/missing.txt\" FOR INPUT AS #1
PRINT \"after\"
END
100 PRINT \"caught\"; ERR()
RESUME NEXT
";
    assert_eq!(run_basic_stdout(src), "caught53\nafter\n");
}

#[test]
fn resume_to_a_line() {
    let src = "\
ON ERROR GOTO 100
x = 0
y = 10 \\ x
PRINT \"unreached\"
20 PRINT \"resumed\"; ERR()
END
100 PRINT \"err\"; ERR()
RESUME 20
";
    assert_eq!(run_basic_stdout(src), "err11\nresumed0\n");
}

#[test]
fn handler_catches_traps_raised_in_callees() {
    let src = "\
SUB risky(d AS INTEGER)
  PRINT 10 \\ d
END SUB
ON ERROR GOTO 100
CALL risky(5)
CALL risky(0)
PRINT \"continued\"
END
100 PRINT \"err\"; ERR()
RESUME NEXT
";
    assert_eq!(run_basic_stdout(src), "2\nerr11\ncontinued\n");
}

#[test]
fn on_error_goto_zero_disables_the_handler() {
    let src = "\
ON ERROR GOTO 100
ON ERROR GOTO 0
x = 0
PRINT 1 \\ x
END
100 PRINT \"handled\"
RESUME NEXT
";
    let (err, out) = run_basic_err(src);
    assert_eq!(out, "");
    assert!(matches!(err, RunError::Vm(VmError::Trap { kind: TrapKind::DivideByZero, .. })), "{err}");
}

#[test]
fn bounds_errors_are_catchable() {
    let src = "\
DIM a(2)
ON ERROR GOTO 100
i = 5
a(i) = 1
20 PRINT \"done\"
END
100 PRINT \"bounds\"; ERR()
RESUME 20
";
    assert_eq!(run_basic_stdout(src), "bounds9\ndone\n");
}

#[test]
fn resume_without_an_error_traps() {
    let (err, _) = run_basic_err("RESUME NEXT\n");
    match err {
        RunError::Vm(VmError::Trap { message, .. }) => assert_eq!(message, "RESUME without error"),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn semantic_errors_come_back_together() {
    match compile_should_fail("PRINT cont\nGOTO 999\ns$ = 1\n") {
        ilc::diagnostics::CompileError::Semantic { diagnostics } => {
            let codes: Vec<_> = diagnostics.iter().map(|d| d.code).collect();
            assert_eq!(codes, vec!["B1001", "B1003", "B2001"]);
        }
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn syntax_errors_stop_at_the_first_problem() {
    let err = compile_should_fail("FUNCTION f()\n RETURN 1\n");
    assert!(err.to_string().contains("missing END FUNCTION"), "{err}");
}

#[test]
fn constant_division_by_zero_is_caught_early() {
    compile_should_fail_with("PRINT 7 MOD 0\n", "B2002", "divide by zero");
}

#[test]
fn impossible_string_sizes_trap_out_of_memory() {
    let src = "\
ON ERROR GOTO 100
x$ = SPACE$(9223372036854775807)
PRINT \"after\"
END
100 PRINT \"caught\"; ERR()
RESUME NEXT
";
    assert_eq!(run_basic_stdout(src), "caught7\nafter\n");

    let (err, _) = run_basic_err("x$ = STRING$(9223372036854775807, 42)\n");
    match err {
        RunError::Vm(VmError::Trap { kind, .. }) => assert_eq!(kind, TrapKind::OutOfMemory),
        other => panic!("unexpected {other}"),
    }
}
