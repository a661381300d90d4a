mod common;
use common::*;

use ilc::RunError;
use ilc::runtime::TrapKind;
use ilc::vm::VmError;

fn basic_path(dir: &tempfile::TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

#[test]
fn write_then_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let p = basic_path(&dir, "data.txt");
    let src = format!(
        "\
OPEN \"{p}\" FOR OUTPUT AS #1
PRINT #1, \"alpha\"
PRINT #1, 42; \" \"; 1.5
PRINT #1, \"a\", \"b\"
CLOSE #1
OPEN \"{p}\" FOR INPUT AS #2
n = 0
WHILE NOT EOF(#2)
  LINE INPUT #2, l$
  n = n + 1
  PRINT n; \": \"; l$
WEND
CLOSE #2
"
    );
    let out = run_basic_stdout(&src);
    let zone = " ".repeat(13);
    assert_eq!(out, format!("1: alpha\n2: 42 1.5\n3: a{zone}b\n"));
    assert_eq!(std::fs::read_to_string(dir.path().join("data.txt")).unwrap(), format!("alpha\n42 1.5\na{zone}b\n"));
}

#[test]
fn append_adds_to_the_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.txt");
    std::fs::write(&path, "first\n").unwrap();
    let p = basic_path(&dir, "log.txt");
    run_basic_stdout(&format!("OPEN \"{p}\" FOR APPEND AS #3\nPRINT #3, \"second\"\nCLOSE\n"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
}

#[test]
fn files_are_flushed_when_the_program_ends() {
    let dir = tempfile::tempdir().unwrap();
    let p = basic_path(&dir, "open.txt");
    run_basic_stdout(&format!("OPEN \"{p}\" FOR OUTPUT AS #1\nPRINT #1, \"kept\"\n"));
    assert_eq!(std::fs::read_to_string(dir.path().join("open.txt")).unwrap(), "kept\n");
}

#[test]
fn missing_input_file_traps() {
    let dir = tempfile::tempdir().unwrap();
    let p = basic_path(&dir, "nope.txt");
    let (err, _) = run_basic_err(&format!("OPEN \"{p}\" FOR INPUT AS #1\n"));
    match err {
        RunError::Vm(VmError::Trap { kind, message, .. }) => {
            assert_eq!(kind, TrapKind::FileNotFound);
            assert!(message.starts_with("OPEN: file not found"), "{message}");
        }
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn reading_past_the_end_traps() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("one.txt"), "only\n").unwrap();
    let p = basic_path(&dir, "one.txt");
    let (err, out) =
        run_basic_err(&format!("OPEN \"{p}\" FOR INPUT AS #1\nLINE INPUT #1, a$\nPRINT a$\nLINE INPUT #1, a$\n"));
    assert_eq!(out, "only\n");
    assert!(matches!(err, RunError::Vm(VmError::Trap { kind: TrapKind::InputPastEnd, .. })), "{err}");
}

#[test]
fn line_input_from_the_console() {
    let out = run_basic_with_input("LINE INPUT a$\nLINE INPUT b$\nPRINT b$; \"/\"; a$\n", "one two\nthree\n");
    assert_eq!(out, "three/one two\n");
}

#[test]
fn input_past_end_of_console_traps() {
    ilc::runtime::console::set_input(Vec::new());
    let (err, _) = run_basic_err("INPUT x\n");
    ilc::runtime::console::reset_input();
    assert!(matches!(err, RunError::Vm(VmError::Trap { kind: TrapKind::InputPastEnd, .. })), "{err}");
}
