//! IL interpreter.
//!
//! Each call gets a [`exec::Frame`] holding its temps, current block and
//! `ON ERROR` handler stack. `alloca` slots live in one VM-wide store that
//! is cut back when a frame returns, so pointers handed down to callees stay
//! valid for as long as the callee runs. Externs are dispatched through the
//! [`Bridge`], which maps runtime helper names to handlers.

mod bridge;
pub mod debug;
mod exec;

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use thiserror::Error;

use crate::il::{Function, Module, Type};
use crate::runtime::array::{RtArray, RtStrArray};
use crate::runtime::linewriter::RtLineWriter;
use crate::runtime::{channels, console, trap, RtInstance, RtListI64, RtString, RtTrie, TrapKind};

pub use bridge::{Bridge, Handler};
pub use debug::{BreakPoint, DebugOptions, TraceMode};

/// A run-time value. `i1`, `i32` and `i64` all travel as `Int`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(RtString),
    Ptr(Handle),
    Void,
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Zero of an IL type, what an unwritten slot reads as.
    pub fn zero(ty: Type) -> Value {
        match ty {
            Type::Void => Value::Void,
            Type::I1 | Type::I32 | Type::I64 => Value::Int(0),
            Type::F64 => Value::Float(0.0),
            Type::Str => Value::Str(RtString::empty()),
            Type::Ptr => Value::Ptr(Handle::Null),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(x) => f.write_str(&crate::runtime::string::format_f64(*x)),
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::Ptr(Handle::Null) => f.write_str("null"),
            Value::Ptr(Handle::Slot(i)) => write!(f, "slot#{i}"),
            Value::Ptr(h) => write!(f, "<{}>", h.kind()),
            Value::Void => f.write_str("void"),
        }
    }
}

/// What a `ptr` refers to.
#[derive(Debug, Clone)]
pub enum Handle {
    Null,
    Slot(usize),
    ArrI32(RtArray<i32>),
    ArrI64(RtArray<i64>),
    ArrF64(RtArray<f64>),
    ArrStr(RtStrArray),
    Obj(RtInstance),
    List(Rc<RefCell<RtListI64>>),
    Trie(RtTrie),
    Writer(RtLineWriter),
}

impl Handle {
    pub fn kind(&self) -> &'static str {
        match self {
            Handle::Null => "null",
            Handle::Slot(_) => "slot",
            Handle::ArrI32(_) => "i32 array",
            Handle::ArrI64(_) => "i64 array",
            Handle::ArrF64(_) => "f64 array",
            Handle::ArrStr(_) => "string array",
            Handle::Obj(_) => "object",
            Handle::List(_) => "list",
            Handle::Trie(_) => "trie",
            Handle::Writer(_) => "line writer",
        }
    }
}

/// Handles compare by identity.
impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Handle::Null, Handle::Null) => true,
            (Handle::Slot(a), Handle::Slot(b)) => a == b,
            (Handle::ArrI32(a), Handle::ArrI32(b)) => a == b,
            (Handle::ArrI64(a), Handle::ArrI64(b)) => a == b,
            (Handle::ArrF64(a), Handle::ArrF64(b)) => a == b,
            (Handle::ArrStr(a), Handle::ArrStr(b)) => a == b,
            (Handle::Obj(a), Handle::Obj(b)) => a == b,
            (Handle::List(a), Handle::List(b)) => Rc::ptr_eq(a, b),
            (Handle::Trie(a), Handle::Trie(b)) => a == b,
            (Handle::Writer(a), Handle::Writer(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum VmError {
    #[error("VM: step limit exceeded ({limit}); aborting.")]
    StepLimit { limit: u64 },

    #[error("trap: {message} (in @{function}, block {block}{})", line_suffix(*line))]
    Trap {
        kind: TrapKind,
        message: String,
        function: String,
        block: String,
        line: u32,
    },

    #[error("call to unknown function @{0}")]
    UnknownFunction(String),

    #[error("no runtime handler for @{0}")]
    UnknownRuntime(String),

    #[error("breakpoint hit in @{function} at {block} ({reason})")]
    Break {
        function: String,
        block: String,
        reason: String,
    },

    #[error("malformed IL at run time: {0}")]
    Malformed(String),
}

fn line_suffix(line: u32) -> String {
    if line == 0 { String::new() } else { format!(", line {line}") }
}

impl VmError {
    /// Process exit status a driver reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            VmError::Break { .. } => 10,
            _ => 1,
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Value returned by `@main`, 0 when it returns nothing or END ran.
    pub exit_code: i64,
    pub steps: u64,
    /// Calls per function, filled in when counting is on.
    pub calls: HashMap<String, u64>,
}

/// A loaded module ready to run.
pub struct Vm<'m> {
    module: &'m Module,
    functions: HashMap<&'m str, FnInfo<'m>>,
    externs: HashMap<String, Handler>,
    strings: HashMap<String, RtString>,
    slots: Vec<Value>,
    /// Source-level name of each slot, for `--watch`.
    slot_names: Vec<Option<String>>,
    opts: DebugOptions,
    steps: u64,
    depth: usize,
    calls: HashMap<String, u64>,
    halted: bool,
    last_line: u32,
    debug_out: Box<dyn Write + 'm>,
}

/// A function plus its label lookup.
struct FnInfo<'m> {
    func: &'m Function,
    labels: HashMap<&'m str, usize>,
}

/// Calls nested deeper than this trap instead of exhausting the host stack.
const MAX_CALL_DEPTH: usize = 4096;

impl<'m> Vm<'m> {
    /// Resolve every function and extern of `module`. Externs without a
    /// handler are rejected here, before anything runs.
    pub fn new(module: &'m Module, opts: DebugOptions) -> Result<Self, VmError> {
        let bridge = Bridge::new();
        let mut externs = HashMap::new();
        for e in &module.externs {
            let handler = bridge.resolve(&e.name).ok_or_else(|| VmError::UnknownRuntime(e.name.clone()))?;
            externs.insert(e.name.clone(), handler);
        }
        let functions = module
            .functions
            .iter()
            .map(|f| {
                let labels = f.blocks.iter().enumerate().map(|(i, b)| (b.label.as_str(), i)).collect();
                (f.name.as_str(), FnInfo { func: f, labels })
            })
            .collect();
        let strings = module.globals.iter().map(|g| (g.name.clone(), RtString::from_str(&g.value))).collect();
        Ok(Vm {
            module,
            functions,
            externs,
            strings,
            slots: Vec::new(),
            slot_names: Vec::new(),
            opts,
            steps: 0,
            depth: 0,
            calls: HashMap::new(),
            halted: false,
            last_line: 0,
            debug_out: Box::new(std::io::stderr()),
        })
    }

    /// Send `--trace`, `--watch` and `--break` output somewhere other than stderr.
    pub fn with_debug_output(mut self, out: impl Write + 'm) -> Self {
        self.debug_out = Box::new(out);
        self
    }

    pub fn module(&self) -> &'m Module {
        self.module
    }

    /// Run `@main` to completion.
    pub fn run(&mut self) -> Result<RunOutcome, VmError> {
        trap::set_last_error(0);
        let result = self.call_function("main", Vec::new());
        channels::rt_close_all();
        console::flush_stdout();
        let ret = result?;
        let exit_code = if self.halted { 0 } else { ret.as_int().unwrap_or(0) };
        tracing::debug!(target: "ilc::vm", steps = self.steps, exit_code, "program finished");
        Ok(RunOutcome { exit_code, steps: self.steps, calls: std::mem::take(&mut self.calls) })
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn debug_line(&mut self, line: std::fmt::Arguments<'_>) {
        let _ = self.debug_out.write_fmt(line);
        let _ = self.debug_out.write_all(b"\n");
    }
}

/// Load and run `module` with the given debug controls.
pub fn run_module(module: &Module, opts: DebugOptions) -> Result<RunOutcome, VmError> {
    if let Some(path) = &opts.stdin_from {
        let bytes = std::fs::read(path)
            .map_err(|e| VmError::Malformed(format!("cannot read stdin file {}: {e}", path.display())))?;
        console::set_input(bytes);
    }
    let mut vm = Vm::new(module, opts)?;
    vm.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::parse_module;

    fn run_text(src: &str) -> (Result<RunOutcome, VmError>, String) {
        let m = parse_module(src).unwrap();
        console::capture_output(|| run_module(&m, DebugOptions::default()))
    }

    #[test]
    fn prints_and_returns() {
        let (r, out) = run_text(
            "il 0.1
extern @rt_print_i64(i64) -> void
extern @rt_print_nl() -> void
func @main() -> i64 {
entry:
  %t0 = iadd.ovf 40, 2
  call @rt_print_i64(%t0)
  call @rt_print_nl()
  ret 7
}
",
        );
        assert_eq!(out, "42\n");
        assert_eq!(r.unwrap().exit_code, 7);
    }

    #[test]
    fn overflow_traps_with_location() {
        let (r, _) = run_text(
            "il 0.1
func @main() -> i64 {
entry:
  %t0 = iadd.ovf 9223372036854775807, 1
  ret %t0
}
",
        );
        match r.unwrap_err() {
            VmError::Trap { kind, function, block, .. } => {
                assert_eq!(kind, TrapKind::Overflow);
                assert_eq!(function, "main");
                assert_eq!(block, "entry");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_extern_is_rejected_before_running() {
        let m = parse_module("il 0.1\nextern @rt_nope() -> void\nfunc @main() -> i64 {\nentry:\n  ret 0\n}\n").unwrap();
        assert!(matches!(Vm::new(&m, DebugOptions::default()), Err(VmError::UnknownRuntime(n)) if n == "rt_nope"));
    }

    #[test]
    fn block_arguments_carry_loop_state() {
        let (r, _) = run_text(
            "il 0.1
func @main() -> i64 {
entry:
  br head(0, 0)
head(%i: i64, %sum: i64):
  %t0 = scmp_lt %i, 5
  cbr %t0, body, exit
body:
  %t1 = iadd.ovf %sum, %i
  %t2 = iadd.ovf %i, 1
  br head(%t2, %t1)
exit:
  ret %sum
}
",
        );
        assert_eq!(r.unwrap().exit_code, 10);
    }

    #[test]
    fn handles_compare_by_identity() {
        let a = Handle::List(Rc::new(RefCell::new(RtListI64::new())));
        let b = Handle::List(Rc::new(RefCell::new(RtListI64::new())));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
