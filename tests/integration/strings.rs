mod common;
use common::*;

use ilc::RunError;
use ilc::vm::VmError;

#[test]
fn left_of_mid() {
    assert_eq!(run_basic_stdout("PRINT LEFT$(MID$(\"HELLO WORLD\", 3, 5), 3)\n"), "LLO\n");
}

#[test]
fn slicing_helpers() {
    let src = "\
s$ = \"ABCDEF\"
PRINT LEFT$(s$, 2); \"|\"; RIGHT$(s$, 2); \"|\"; MID$(s$, 4)
PRINT LEFT$(s$, 99); \"|\"; MID$(s$, 10, 2); \"|\"
PRINT LEN(s$); LEN(\"\")
";
    assert_eq!(run_basic_stdout(src), "AB|EF|DEF\nABCDEF||\n60\n");
}

#[test]
fn search_and_case() {
    let src = "\
PRINT INSTR(\"banana\", \"an\"); INSTR(3, \"banana\", \"an\"); INSTR(\"banana\", \"x\")
PRINT UCASE$(\"MiXeD\"); LCASE$(\"MiXeD\")
PRINT \"[\"; TRIM$(\"  pad  \"); \"][\"; LTRIM$(\"  l\"); \"][\"; RTRIM$(\"r  \"); \"]\"
";
    assert_eq!(run_basic_stdout(src), "240\nMIXEDmixed\n[pad][l][r]\n");
}

#[test]
fn character_codes() {
    assert_eq!(run_basic_stdout("PRINT CHR$(72); CHR$(105)\nPRINT ASC(\"A\")\n"), "Hi\n65\n");
}

#[test]
fn number_conversions() {
    let src = "\
PRINT STR$(42); \"|\"; STR$(2.5)
PRINT VAL(\"12.5abc\") + 1
n# = VAL(\"7\")
PRINT n# * 2
";
    assert_eq!(run_basic_stdout(src), "42|2.5\n13.5\n14\n");
}

#[test]
fn repeated_characters() {
    assert_eq!(run_basic_stdout("PRINT \"[\"; SPACE$(3); \"]\"; STRING$(4, 42)\n"), "[   ]****\n");
}

#[test]
fn string_equality() {
    let src = "\
a$ = \"abc\"
b$ = LCASE$(\"ABC\")
IF a$ = b$ THEN PRINT \"same\"
IF a$ <> \"abd\" THEN PRINT \"different\"
";
    assert_eq!(run_basic_stdout(src), "same\ndifferent\n");
}

#[test]
fn building_a_string_in_a_loop() {
    let src = "\
s$ = \"\"
FOR i = 1 TO 5
  s$ = s$ + STR$(i)
NEXT i
PRINT s$; \" \"; LEN(s$)
";
    assert_eq!(run_basic_stdout(src), "12345 5\n");
}

#[test]
fn negative_length_traps() {
    let (err, _) = run_basic_err("n = -1\nPRINT LEFT$(\"abc\", n)\n");
    match err {
        RunError::Vm(VmError::Trap { message, .. }) => assert!(message.starts_with("LEFT$"), "{message}"),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn chr_of_a_huge_code_traps() {
    let (err, _) = run_basic_err("n = 5000000000\nPRINT CHR$(n)\n");
    assert!(matches!(err, RunError::Vm(VmError::Trap { .. })), "{err}");
}
