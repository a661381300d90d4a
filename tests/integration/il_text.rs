mod common;
use common::*;

use ilc::diagnostics::CompileError;
use ilc::runtime::console;
use ilc::transform::OptLevel;
use ilc::vm::{self, DebugOptions};

const PROGRAM: &str = "\
CLASS Acc
  total AS INTEGER
  SUB add(k AS INTEGER)
    ME.total = ME.total + k
  END SUB
END CLASS
FUNCTION label$(n AS INTEGER)
  SELECT CASE n
  CASE 0
    RETURN \"zero\"
  CASE ELSE
    RETURN \"n=\" + STR$(n)
  END SELECT
END FUNCTION
DIM xs(4)
a = NEW Acc()
ON ERROR GOTO 900
FOR i = 0 TO 4
  xs(i) = i * i
  a.add(xs(i))
NEXT i
PRINT label$(0); \" \"; label$(a.total)
GOSUB 500
END
500 PRINT \"sub\"
RETURN
900 PRINT \"error\"; ERR()
RESUME NEXT
";

fn run_text(text: &str) -> String {
    let module = ilc::parse_il(text).unwrap();
    let (result, out) = console::capture_output(|| vm::run_module(&module, DebugOptions::default()));
    result.unwrap();
    out
}

#[test]
fn emitted_il_reparses_to_the_same_text() {
    for level in [OptLevel::O0, OptLevel::O1, OptLevel::O2] {
        let text = emit_il(PROGRAM, level);
        let again = ilc::parse_il(&text).unwrap_or_else(|e| panic!("{e}\n{text}"));
        assert_eq!(ilc::il::print_module(&again), text, "at {level}");
    }
}

#[test]
fn reparsed_il_runs_like_the_source() {
    let direct = run_basic_stdout(PROGRAM);
    assert_eq!(direct, "zero n=30\nsub\n");
    assert_eq!(run_text(&emit_il(PROGRAM, OptLevel::O0)), direct);
    assert_eq!(run_text(&emit_il(PROGRAM, OptLevel::O2)), direct);
}

#[test]
fn hand_written_module_runs() {
    let text = "\
il 0.1
extern @rt_print_str(str) -> void
extern @rt_print_i64(i64) -> void
extern @rt_print_nl() -> void
global const str @.L0 = \"sum=\"

func @main() -> i64 {
entry:
  br loop(0, 1)
loop(%acc: i64, %i: i64):
  %next = iadd.ovf %acc, %i
  %i2 = iadd.ovf %i, 1
  %more = scmp_le %i2, 10
  cbr %more, loop(%next, %i2), done(%next)
done(%r: i64):
  %s = const_str @.L0
  call @rt_print_str(%s)
  call @rt_print_i64(%r)
  call @rt_print_nl()
  ret 0
}
";
    assert_eq!(run_text(text), "sum=55\n");
}

#[test]
fn switch_dispatch() {
    let text = "\
il 0.1
extern @rt_print_i64(i64) -> void
extern @rt_print_nl() -> void

func @pick(%v: i32) -> i64 {
entry:
  switch_i32 %v, other, 1 -> one, 2 -> two
one:
  ret 10
two:
  ret 20
other:
  ret -1
}

func @main() -> i64 {
entry:
  %a = call @pick(2)
  call @rt_print_i64(%a)
  %b = call @pick(7)
  call @rt_print_i64(%b)
  call @rt_print_nl()
  ret 0
}
";
    assert_eq!(run_text(text), "20-1\n");
}

#[test]
fn parse_errors_carry_the_line() {
    let err = ilc::parse_il("il 0.1\nfunc @main() -> i64 {\nentry:\n  %t0 = frobnicate 1, 2\n  ret 0\n}\n").unwrap_err();
    match err {
        CompileError::IlParse { line, .. } => assert_eq!(line, 4),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn verifier_rejects_unknown_labels() {
    let err = ilc::parse_il("il 0.1\nfunc @main() -> i64 {\nentry:\n  br nowhere\n}\n").unwrap_err();
    assert!(matches!(&err, CompileError::Verify { msg } if msg.contains("unknown label 'nowhere'")), "{err}");
}

#[test]
fn verifier_rejects_undefined_temps() {
    let err = ilc::parse_il("il 0.1\nfunc @main() -> i64 {\nentry:\n  %t1 = add %t0, 1\n  ret %t1\n}\n").unwrap_err();
    assert!(err.to_string().contains("undefined"), "{err}");
}

#[test]
fn calls_to_undeclared_externs_fail_to_parse() {
    let err = ilc::parse_il("il 0.1\nfunc @main() -> i64 {\nentry:\n  call @rt_print_nl()\n  ret 0\n}\n").unwrap_err();
    match err {
        CompileError::IlParse { line, msg } => {
            assert_eq!(line, 4);
            assert!(msg.contains("unknown @rt_print_nl"), "{msg}");
        }
        other => panic!("unexpected {other}"),
    }
}
