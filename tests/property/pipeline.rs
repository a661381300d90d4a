// Property-based tests for the BASIC -> IL -> VM pipeline.
//
// Generated programs are compiled at every optimization level and run in
// process; all levels must print what a direct Rust evaluation predicts.
//
// Run with more cases:
//   PROPTEST_CASES=1000 cargo test --test pipeline_props

use proptest::prelude::*;

use ilc::runtime::console;
use ilc::transform::OptLevel;
use ilc::vm::DebugOptions;
use ilc::CompileOptions;

const LEVELS: [OptLevel; 3] = [OptLevel::O0, OptLevel::O1, OptLevel::O2];

fn run(source: &str, level: OptLevel) -> Result<String, String> {
    let opts = CompileOptions { opt: level, verify_each: true, ..CompileOptions::default() };
    let (result, out) = console::capture_output(|| ilc::run_basic(source, &opts, DebugOptions::default()));
    result.map(|_| out).map_err(|e| e.to_string())
}

// =============================================================================
// Generators
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Op {
    Add,
    Sub,
    Mul,
    IntDiv,
    Mod,
}

#[derive(Debug, Clone)]
enum Expr {
    Lit(i64),
    Var,
    Bin(Box<Expr>, Op, Box<Expr>),
}

impl Expr {
    fn to_basic(&self) -> String {
        match self {
            Expr::Lit(v) => v.to_string(),
            Expr::Var => "x".to_string(),
            Expr::Bin(l, op, r) => {
                let sym = match op {
                    Op::Add => "+",
                    Op::Sub => "-",
                    Op::Mul => "*",
                    Op::IntDiv => "\\",
                    Op::Mod => "MOD",
                };
                format!("({} {sym} {})", l.to_basic(), r.to_basic())
            }
        }
    }

    /// `None` when the evaluation overflows.
    fn eval(&self, x: i64) -> Option<i64> {
        match self {
            Expr::Lit(v) => Some(*v),
            Expr::Var => Some(x),
            Expr::Bin(l, op, r) => {
                let (a, b) = (l.eval(x)?, r.eval(x)?);
                match op {
                    Op::Add => a.checked_add(b),
                    Op::Sub => a.checked_sub(b),
                    Op::Mul => a.checked_mul(b),
                    Op::IntDiv => a.checked_div(b),
                    Op::Mod => a.checked_rem(b),
                }
            }
        }
    }
}

fn expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![(0i64..100).prop_map(Expr::Lit), Just(Expr::Var)];
    leaf.prop_recursive(3, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), prop_oneof![Just(Op::Add), Just(Op::Sub), Just(Op::Mul)], inner.clone())
                .prop_map(|(l, op, r)| Expr::Bin(Box::new(l), op, Box::new(r))),
            // Divisors are non-zero literals so no program divides by zero.
            (inner, prop_oneof![Just(Op::IntDiv), Just(Op::Mod)], 1i64..10)
                .prop_map(|(l, op, d)| Expr::Bin(Box::new(l), op, Box::new(Expr::Lit(d)))),
        ]
    })
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn integer_expressions_agree_with_rust(e in expr(), x in -50i64..50) {
        let expected = e.eval(x);
        prop_assume!(expected.is_some());
        let src = format!("x = {x}\nPRINT {}\n", e.to_basic());
        for level in LEVELS {
            let out = run(&src, level).map_err(|err| TestCaseError::fail(format!("{err}\n{src}")))?;
            prop_assert_eq!(out, format!("{}\n", expected.unwrap_or_default()), "at {} for {}", level, src);
        }
    }

    #[test]
    fn for_loops_visit_every_step(from in -20i64..20, to in -20i64..20, step in prop_oneof![-3i64..0, 1i64..4]) {
        let src = format!(
            "s = 0\nc = 0\nFOR i = {from} TO {to} STEP {step}\n  s = s + i\n  c = c + 1\nNEXT i\nPRINT s; \" \"; c\n"
        );
        let (mut sum, mut count, mut i) = (0i64, 0i64, from);
        while (step > 0 && i <= to) || (step < 0 && i >= to) {
            sum += i;
            count += 1;
            i += step;
        }
        for level in LEVELS {
            let out = run(&src, level).map_err(TestCaseError::fail)?;
            prop_assert_eq!(out, format!("{sum} {count}\n"), "at {}", level);
        }
    }

    #[test]
    fn sibling_recursion_keeps_fib(n in 0i64..18) {
        let src = format!(
            "FUNCTION fib(n AS INTEGER) AS INTEGER\n  IF n <= 1 THEN RETURN n\n  RETURN fib(n - 1) + fib(n - 2)\nEND FUNCTION\nPRINT fib({n})\n"
        );
        let (mut a, mut b) = (0i64, 1i64);
        for _ in 0..n {
            (a, b) = (b, a + b);
        }
        for level in LEVELS {
            prop_assert_eq!(run(&src, level).map_err(TestCaseError::fail)?, format!("{a}\n"));
        }
    }

    #[test]
    fn emitted_il_reparses(e in expr(), x in -50i64..50) {
        let src = format!("x = {x}\nIF x > 0 THEN\n  PRINT {}\nELSE\n  PRINT -x\nEND IF\n", e.to_basic());
        for level in LEVELS {
            let opts = CompileOptions { opt: level, ..CompileOptions::default() };
            let module = ilc::compile_basic(&src, &opts).map_err(|err| TestCaseError::fail(err.to_string()))?.module;
            let text = ilc::il::print_module(&module);
            let again = ilc::parse_il(&text).map_err(|err| TestCaseError::fail(format!("{err}\n{text}")))?;
            prop_assert_eq!(ilc::il::print_module(&again), text);
        }
    }

    #[test]
    fn front_end_never_panics(src in "[A-Za-z0-9 =+*()\"$#\\n-]{0,120}") {
        let _ = ilc::check_basic(&src);
    }
}
