//! Text form of a module.
//!
//! ```text
//! il 0.1
//! extern @rt_print_i64(i64) -> void
//! global const str @.L0 = "hi\n"
//!
//! func @fib(%n: i64) -> i64 {
//! entry:
//!   %t1 = scmp_le %n, 1
//!   cbr %t1, base, recurse
//! ...
//! }
//! ```

use std::fmt::Write;

use super::{Block, Function, Instr, Module, Opcode, Value};

pub fn print_module(m: &Module) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "il {}", m.version);
    for e in &m.externs {
        let params: Vec<&str> = e.params.iter().map(|t| t.name()).collect();
        let _ = writeln!(out, "extern @{}({}) -> {}", e.name, params.join(", "), e.ret);
    }
    for g in &m.globals {
        let _ = writeln!(out, "global const str @{} = \"{}\"", g.name, escape(&g.value));
    }
    for f in &m.functions {
        out.push('\n');
        print_function(&mut out, f);
    }
    out
}

pub fn print_function(out: &mut String, f: &Function) {
    let params: Vec<String> = f.params.iter().map(|p| format!("%{}: {}", f.temp_name(p.id), p.ty)).collect();
    let _ = writeln!(out, "func @{}({}) -> {} {{", f.name, params.join(", "), f.ret);
    for b in &f.blocks {
        print_block(out, f, b);
    }
    out.push_str("}\n");
}

fn print_block(out: &mut String, f: &Function, b: &Block) {
    if b.params.is_empty() {
        let _ = writeln!(out, "{}:", b.label);
    } else {
        let params: Vec<String> = b.params.iter().map(|p| format!("%{}: {}", f.temp_name(p.id), p.ty)).collect();
        let _ = writeln!(out, "{}({}):", b.label, params.join(", "));
    }
    let mut loc = 0;
    for i in &b.instrs {
        if i.loc != loc {
            let _ = writeln!(out, "  .loc {}", i.loc);
            loc = i.loc;
        }
        let _ = writeln!(out, "  {}", instr_text(f, i));
    }
}

pub fn value_text(f: &Function, v: &Value) -> String {
    match v {
        Value::ConstInt(n) => n.to_string(),
        Value::ConstFloat(x) => float_text(*x),
        Value::Temp(id) => format!("%{}", f.temp_name(*id)),
        Value::Global(name) => format!("@{name}"),
        Value::Null => "null".to_string(),
    }
}

/// Floats always carry a `.`, an exponent or a special name so they never
/// reparse as integers.
fn float_text(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    let s = format!("{x:?}");
    if s.contains(['.', 'e', 'E']) { s } else { format!("{s}.0") }
}

fn values(f: &Function, vs: &[Value]) -> String {
    vs.iter().map(|v| value_text(f, v)).collect::<Vec<_>>().join(", ")
}

fn target(f: &Function, label: &str, args: &[Value]) -> String {
    if args.is_empty() { label.to_string() } else { format!("{label}({})", values(f, args)) }
}

fn targets(f: &Function, i: &Instr, from: usize) -> Vec<String> {
    i.labels
        .iter()
        .enumerate()
        .skip(from)
        .map(|(n, l)| target(f, l, i.br_args.get(n).map(Vec::as_slice).unwrap_or(&[])))
        .collect()
}

pub fn instr_text(f: &Function, i: &Instr) -> String {
    let lhs = i.result.map(|r| format!("%{} = ", f.temp_name(r))).unwrap_or_default();
    let op = i.op.mnemonic();
    let body = match i.op {
        Opcode::Call => {
            let callee = i.callee.as_deref().unwrap_or("?");
            format!("call @{callee}({})", values(f, &i.operands))
        }
        Opcode::Load => format!("load {}, {}", i.ty, values(f, &i.operands)),
        Opcode::Store => format!("store {}, {}", i.ty, values(f, &i.operands)),
        Opcode::Br => format!("br {}", targets(f, i, 0).join(", ")),
        Opcode::CBr => {
            let cond = i.operands.first().map(|v| value_text(f, v)).unwrap_or_default();
            format!("cbr {cond}, {}", targets(f, i, 0).join(", "))
        }
        Opcode::SwitchI32 => {
            let scrutinee = i.operands.first().map(|v| value_text(f, v)).unwrap_or_default();
            let mut parts = vec![scrutinee];
            parts.extend(targets(f, i, 0).into_iter().take(1));
            for (n, case) in targets(f, i, 1).into_iter().enumerate() {
                let v = i.operands.get(n + 1).map(|v| value_text(f, v)).unwrap_or_default();
                parts.push(format!("{v} -> {case}"));
            }
            format!("switch_i32 {}", parts.join(", "))
        }
        Opcode::EhPush | Opcode::ResumeLabel => format!("{op} {}", i.labels.join(", ")),
        _ if i.operands.is_empty() => op.to_string(),
        _ => format!("{op} {}", values(f, &i.operands)),
    };
    format!("{lhs}{body}")
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
