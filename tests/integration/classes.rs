mod common;
use common::*;

use ilc::vm::VmError;
use ilc::RunError;

const COUNTER: &str = "\
CLASS Counter
  n AS INTEGER
  label AS STRING
  SUB NEW(start AS INTEGER)
    ME.n = start
    ME.label = \"c\"
  END SUB
  FUNCTION bump() AS INTEGER
    ME.n = ME.n + 1
    RETURN ME.n
  END FUNCTION
  SUB add(k AS INTEGER)
    ME.n = ME.n + k
  END SUB
  SUB DESTROY()
    PRINT \"bye \"; ME.label; ME.n
  END SUB
END CLASS
";

fn with_counter(main: &str) -> String {
    format!("{COUNTER}{main}")
}

#[test]
fn constructor_and_methods() {
    let src = with_counter("c = NEW Counter(3)\nPRINT c.bump()\nc.add(10)\nPRINT c.bump(); \" \"; c.n\n");
    assert_eq!(run_basic_stdout(&src), "4\n15 15\n");
}

#[test]
fn fields_can_be_written_from_outside() {
    let src = with_counter("DIM c AS Counter\nc = NEW Counter(0)\nc.label = \"x\"\nc.n = 41\nPRINT c.label; c.bump()\n");
    assert_eq!(run_basic_stdout(&src), "x42\n");
}

#[test]
fn delete_runs_the_destructor() {
    let src = with_counter("c = NEW Counter(7)\nDELETE c\nPRINT \"after\"\n");
    assert_eq!(run_basic_stdout(&src), "bye c7\nafter\n");
}

#[test]
fn objects_are_shared_references() {
    let src = with_counter("a = NEW Counter(1)\nb = a\nb.add(5)\nPRINT a.n\n");
    assert_eq!(run_basic_stdout(&src), "6\n");
}

#[test]
fn objects_as_arguments() {
    let src = with_counter(
        "SUB twice(c AS Counter)\n  c.add(c.n)\nEND SUB\nk = NEW Counter(4)\nCALL twice(k)\nCALL twice(k)\nPRINT k.n\n",
    );
    assert_eq!(run_basic_stdout(&src), "16\n");
}

#[test]
fn records_are_allocated_by_dim() {
    let src = "\
TYPE Point
  x AS INTEGER
  y AS INTEGER
END TYPE
DIM p AS Point
p.x = 3
p.y = 4
PRINT p.x * p.x + p.y * p.y
";
    assert_eq!(run_basic_stdout(src), "25\n");
}

#[test]
fn method_on_a_null_object_traps() {
    let (err, _) = run_basic_err(&with_counter("DIM c AS Counter\nPRINT c.bump()\n"));
    match err {
        RunError::Vm(VmError::Trap { message, .. }) => assert!(message.contains("null"), "{message}"),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn unknown_field_is_a_compile_error() {
    compile_should_fail_with(&with_counter("c = NEW Counter(1)\nPRINT c.missing\n"), "B1001", "unknown field 'missing'");
}

#[test]
fn me_outside_a_class_is_rejected() {
    compile_should_fail_with("PRINT ME.n\n", "B1001", "ME used outside of a CLASS method");
}
