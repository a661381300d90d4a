mod common;
use common::*;

const FIB: &str = "\
FUNCTION fib(n AS INTEGER) AS INTEGER
  IF n <= 1 THEN RETURN n
  RETURN fib(n - 1) + fib(n - 2)
END FUNCTION
PRINT fib(10)
";

fn stderr(o: &std::process::Output) -> String {
    String::from_utf8_lossy(&o.stderr).into_owned()
}

#[test]
fn optimize_level_comes_from_ilc_toml() {
    let (dir, path) = write_program(FIB);
    std::fs::write(dir.path().join("ilc.toml"), "[build]\noptimize = \"O2\"\n").unwrap();
    let out = ilc().args(["front", "basic", "-run", "--count"]).arg(&path).output().unwrap();
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(stderr(&out).contains("[COUNT] fn=@fib calls=89"), "{}", stderr(&out));
}

#[test]
fn command_line_level_beats_the_file() {
    let (dir, path) = write_program(FIB);
    std::fs::write(dir.path().join("ilc.toml"), "[build]\noptimize = \"O2\"\n").unwrap();
    let out = ilc().args(["front", "basic", "-run", "--count", "-O0"]).arg(&path).output().unwrap();
    assert!(stderr(&out).contains("[COUNT] fn=@fib calls=177"), "{}", stderr(&out));
}

#[test]
fn bounds_checks_can_be_turned_off() {
    let (dir, path) = write_program("DIM a(3)\ni = 2\na(i) = 1\n");
    let checked = ilc().args(["front", "basic", "-emit-il"]).arg(&path).output().unwrap();
    assert!(String::from_utf8_lossy(&checked.stdout).contains("rt_arr_oob_panic"));

    std::fs::write(dir.path().join("ilc.toml"), "[build]\nbounds-checks = false\n").unwrap();
    let unchecked = ilc().args(["front", "basic", "-emit-il"]).arg(&path).output().unwrap();
    assert!(unchecked.status.success(), "{}", stderr(&unchecked));
    assert!(!String::from_utf8_lossy(&unchecked.stdout).contains("rt_arr_oob_panic"));
}

#[test]
fn step_limit_from_the_file() {
    let (dir, path) = write_program("10 GOTO 10\n");
    std::fs::write(dir.path().join("ilc.toml"), "[run]\nmax-steps = 500\n").unwrap();
    let out = ilc().args(["front", "basic", "-run"]).arg(&path).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("step limit exceeded (500)"), "{}", stderr(&out));
}

#[test]
fn explicit_config_path() {
    let (dir, path) = write_program("10 GOTO 10\n");
    let cfg = dir.path().join("limits.toml");
    std::fs::write(&cfg, "[run]\nmax-steps = 64\n").unwrap();
    let out = ilc().arg("--config").arg(&cfg).args(["front", "basic", "-run"]).arg(&path).output().unwrap();
    assert!(stderr(&out).contains("step limit exceeded (64)"), "{}", stderr(&out));

    let missing = dir.path().join("absent.toml");
    let out = ilc().arg("--config").arg(&missing).args(["front", "basic", "-run"]).arg(&path).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("could not read file"), "{}", stderr(&out));
}

#[test]
fn unknown_keys_fail_the_build() {
    let (dir, path) = write_program("PRINT 1\n");
    std::fs::write(dir.path().join("ilc.toml"), "[build]\ninline = true\n").unwrap();
    let out = ilc().args(["front", "basic", "-run"]).arg(&path).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(out.stdout, b"");
    assert!(stderr(&out).contains("inline"), "{}", stderr(&out));
}

#[test]
fn source_trace_from_the_file() {
    let (dir, path) = write_program("PRINT 1\nPRINT 2\n");
    std::fs::write(dir.path().join("ilc.toml"), "[run]\ntrace = \"src\"\n").unwrap();
    let out = ilc().args(["front", "basic", "-run"]).arg(&path).output().unwrap();
    assert!(stderr(&out).contains("[SRC] line=2 fn=@main"), "{}", stderr(&out));
}
