mod common;
use common::*;

use std::process::Output;

fn stdout(o: &Output) -> String {
    String::from_utf8_lossy(&o.stdout).into_owned()
}

fn stderr(o: &Output) -> String {
    String::from_utf8_lossy(&o.stderr).into_owned()
}

const FIB: &str = "\
FUNCTION fib(n AS INTEGER) AS INTEGER
  IF n <= 1 THEN RETURN n
  RETURN fib(n - 1) + fib(n - 2)
END FUNCTION
PRINT fib(10)
";

#[test]
fn front_basic_run() {
    let (_dir, path) = write_program(FIB);
    let out = ilc().args(["front", "basic", "-run"]).arg(&path).output().unwrap();
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "55\n");
}

#[test]
fn front_basic_emit_il() {
    let (_dir, path) = write_program("PRINT 1 + 2\n");
    let out = ilc().args(["front", "basic", "-emit-il"]).arg(&path).output().unwrap();
    assert!(out.status.success(), "{}", stderr(&out));
    let text = stdout(&out);
    assert!(text.starts_with("il 0.1\n"), "{text}");
    assert!(text.contains("func @main() -> i64 {"), "{text}");
    assert!(ilc::parse_il(&text).is_ok());
}

#[test]
fn emit_il_to_a_file_then_run_it() {
    let (dir, path) = write_program(FIB);
    let il_path = dir.path().join("fib.il");
    let out = ilc()
        .args(["front", "basic", "-emit-il", "-O2"])
        .arg(&path)
        .arg("-o")
        .arg(&il_path)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "");
    let run = ilc().arg("run").arg(&il_path).output().unwrap();
    assert!(run.status.success(), "{}", stderr(&run));
    assert_eq!(stdout(&run), "55\n");
}

#[test]
fn run_accepts_basic_sources() {
    let (_dir, path) = write_program("PRINT \"hi\"\n");
    let out = ilc().arg("run").arg(&path).output().unwrap();
    assert!(out.status.success());
    assert_eq!(stdout(&out), "hi\n");
}

#[test]
fn il_return_value_is_the_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seven.il");
    std::fs::write(&path, "il 0.1\nfunc @main() -> i64 {\nentry:\n  ret 7\n}\n").unwrap();
    let out = ilc().arg("run").arg(&path).output().unwrap();
    assert_eq!(out.status.code(), Some(7));
}

#[test]
fn il_opt_runs_named_passes() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.il");
    std::fs::write(
        &input,
        "il 0.1\nextern @rt_print_i64(i64) -> void\nfunc @main() -> i64 {\nentry:\n  %t0 = imul.ovf 6, 7\n  call @rt_print_i64(%t0)\n  ret 0\n}\n",
    )
    .unwrap();
    let out = ilc().arg("il-opt").arg(&input).args(["--passes", "const-fold,dce"]).output().unwrap();
    assert!(out.status.success(), "{}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("call @rt_print_i64(42)"), "{text}");
    assert!(!text.contains("imul.ovf"), "{text}");
}

#[test]
fn il_opt_rejects_unknown_passes() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.il");
    std::fs::write(&input, "il 0.1\nfunc @main() -> i64 {\nentry:\n  ret 0\n}\n").unwrap();
    let out = ilc().arg("il-opt").arg(&input).args(["--passes", "licm"]).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("unknown pass 'licm'"), "{}", stderr(&out));
}

#[test]
fn count_reports_calls_per_function() {
    let (_dir, path) = write_program(FIB);
    let o0 = ilc().args(["front", "basic", "-run", "--count", "-O0"]).arg(&path).output().unwrap();
    let o2 = ilc().args(["front", "basic", "-run", "--count", "-O2"]).arg(&path).output().unwrap();
    assert!(stderr(&o0).contains("[COUNT] fn=@fib calls=177"), "{}", stderr(&o0));
    assert!(stderr(&o2).contains("[COUNT] fn=@fib calls=89"), "{}", stderr(&o2));
    assert_eq!(stdout(&o2), "55\n");
}

#[test]
fn traps_print_a_message_and_fail() {
    let (_dir, path) = write_program("x = 0\nPRINT 1 \\ x\n");
    let out = ilc().args(["front", "basic", "-run"]).arg(&path).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(stderr(&out).lines().next(), Some("Trap: divide by zero"));

    let dumped = ilc().args(["front", "basic", "-run", "--dump-trap"]).arg(&path).output().unwrap();
    let err = stderr(&dumped);
    assert!(err.contains("code 11 in @main"), "{err}");
    assert!(err.contains("prog.bas:2"), "{err}");
}

#[test]
fn compile_errors_fail_with_diagnostics() {
    let (_dir, path) = write_program("PRINT y\n");
    let out = ilc().args(["front", "basic", "-run", "--diag-format", "plain"]).arg(&path).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(stdout(&out), "");
    let err = stderr(&out);
    assert!(err.contains(":1:7: error[B1001]: unknown variable 'y'"), "{err}");
}

#[test]
fn diagnostics_as_json() {
    let (_dir, path) = write_program("PRINT y\nGOTO 5\n");
    let out = ilc().args(["front", "basic", "-emit-il", "--diag-format", "json"]).arg(&path).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_str(&stderr(&out)).unwrap();
    let codes: Vec<&str> = json.as_array().unwrap().iter().filter_map(|d| d["code"].as_str()).collect();
    assert_eq!(codes, vec!["B1001", "B1003"]);
}

#[test]
fn step_limit_aborts() {
    let (_dir, path) = write_program("10 GOTO 10\n");
    let out = ilc().args(["front", "basic", "-run", "--max-steps", "100"]).arg(&path).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("VM: step limit exceeded (100); aborting."), "{}", stderr(&out));
}

#[test]
fn source_trace_and_line_breakpoints() {
    let (_dir, path) = write_program("PRINT 1\nPRINT 2\nPRINT 3\n");
    let traced = ilc().args(["front", "basic", "-run", "--trace=src"]).arg(&path).output().unwrap();
    let lines: Vec<String> = stderr(&traced).lines().filter(|l| l.starts_with("[SRC]")).map(String::from).collect();
    assert_eq!(lines, vec!["[SRC] line=1 fn=@main", "[SRC] line=2 fn=@main", "[SRC] line=3 fn=@main"]);

    let stopped = ilc().args(["front", "basic", "-run", "--break", "prog.bas:2"]).arg(&path).output().unwrap();
    assert_eq!(stopped.status.code(), Some(10));
    assert_eq!(stdout(&stopped), "1\n");
    assert!(stderr(&stopped).contains("[BREAK] src=prog.bas:2 fn=@main"), "{}", stderr(&stopped));
}

#[test]
fn watch_reports_stores() {
    let (_dir, path) = write_program("x = 1\nx = x + 41\nPRINT x\n");
    let out = ilc().args(["front", "basic", "-run", "--watch", "x"]).arg(&path).output().unwrap();
    let watched: Vec<String> = stderr(&out).lines().filter(|l| l.starts_with("[WATCH]")).map(String::from).collect();
    assert!(watched.len() >= 2, "{watched:?}");
    assert!(watched.iter().any(|l| l.starts_with("[WATCH] x=1 ")), "{watched:?}");
    assert!(watched.last().is_some_and(|l| l.starts_with("[WATCH] x=42 ")), "{watched:?}");
}

#[test]
fn stdin_from_feeds_input() {
    let (dir, path) = write_program("INPUT n\nPRINT n * 2\n");
    let input = dir.path().join("in.txt");
    std::fs::write(&input, "21\n").unwrap();
    let out = ilc().args(["front", "basic", "-run", "--stdin-from"]).arg(&input).arg(&path).output().unwrap();
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "42\n");
}

#[test]
fn time_reports_elapsed_milliseconds() {
    let (_dir, path) = write_program("PRINT 1\n");
    let out = ilc().args(["front", "basic", "-run", "--time"]).arg(&path).output().unwrap();
    assert!(stderr(&out).contains("[TIME] "), "{}", stderr(&out));
}

#[test]
fn missing_mode_flag_is_a_usage_error() {
    let (_dir, path) = write_program("PRINT 1\n");
    let out = ilc().args(["front", "basic"]).arg(&path).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(!stderr(&out).is_empty());

    let out = ilc().arg("--bogus").output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("--bogus"), "{}", stderr(&out));
}

#[test]
fn help_and_version_exit_cleanly() {
    let out = ilc().arg("--help").output().unwrap();
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("front"));
    let out = ilc().arg("--version").output().unwrap();
    assert_eq!(out.status.code(), Some(0));
}
