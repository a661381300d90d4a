//! Structural and type checks over a module.
//!
//! A module passes when every block ends in exactly one terminator, every
//! branch names an existing block with matching argument count and types,
//! every temp is defined once and dominates its uses, and every
//! instruction's operands have the types its opcode requires.

use std::collections::{HashMap, HashSet};

use super::cfg::{Cfg, DomTree};
use super::{Function, Instr, Module, Opcode, TempId, Type, Value};
use crate::diagnostics::CompileError;

pub fn verify_module(m: &Module) -> Result<(), CompileError> {
    let mut seen = HashSet::new();
    for e in &m.externs {
        if !seen.insert(e.name.as_str()) {
            return Err(CompileError::verify(format!("duplicate extern @{}", e.name)));
        }
    }
    for f in &m.functions {
        if !seen.insert(f.name.as_str()) {
            return Err(CompileError::verify(format!("duplicate function @{}", f.name)));
        }
    }
    let mut globals = HashSet::new();
    for g in &m.globals {
        if !globals.insert(g.name.as_str()) {
            return Err(CompileError::verify(format!("duplicate global @{}", g.name)));
        }
    }
    for f in &m.functions {
        verify_function(m, f).map_err(|msg| CompileError::verify(format!("@{}: {msg}", f.name)))?;
    }
    Ok(())
}

/// Where a temp is defined: block index and position, params at `None`.
#[derive(Debug, Clone, Copy)]
struct Def {
    block: usize,
    pos: Option<usize>,
}

pub fn verify_function(m: &Module, f: &Function) -> Result<(), String> {
    if f.blocks.is_empty() {
        return Err("function has no blocks".into());
    }
    let mut labels: HashMap<&str, usize> = HashMap::new();
    for (i, b) in f.blocks.iter().enumerate() {
        if labels.insert(b.label.as_str(), i).is_some() {
            return Err(format!("duplicate block label '{}'", b.label));
        }
    }
    if !f.blocks[0].params.is_empty() {
        return Err("entry block must not have parameters".into());
    }

    let mut defs: HashMap<TempId, Def> = HashMap::new();
    let define = |id: TempId, def: Def, defs: &mut HashMap<TempId, Def>| -> Result<(), String> {
        if defs.insert(id, def).is_some() {
            return Err(format!("%{} defined more than once", f.temp_name(id)));
        }
        Ok(())
    };
    for p in &f.params {
        define(p.id, Def { block: 0, pos: None }, &mut defs)?;
    }
    for (bi, b) in f.blocks.iter().enumerate() {
        for p in &b.params {
            define(p.id, Def { block: bi, pos: None }, &mut defs)?;
        }
        for (ii, i) in b.instrs.iter().enumerate() {
            if let Some(r) = i.result {
                define(r, Def { block: bi, pos: Some(ii) }, &mut defs)?;
            }
        }
    }

    let types = f.temp_types();
    let cfg = Cfg::build(f);
    if !cfg.preds[0].is_empty() {
        return Err("entry block must not have predecessors".into());
    }
    let dom = DomTree::build(&cfg);

    for (bi, b) in f.blocks.iter().enumerate() {
        let ctx = |msg: String| format!("block {}: {msg}", b.label);
        let Some(last) = b.instrs.last() else {
            return Err(ctx("empty block".into()));
        };
        if !last.op.is_terminator() || !b.terminated {
            return Err(ctx("missing terminator".into()));
        }
        for (ii, i) in b.instrs.iter().enumerate() {
            if i.op.is_terminator() && ii + 1 != b.instrs.len() {
                return Err(ctx(format!("terminator '{}' in the middle of the block", i.op)));
            }
            for u in i.uses() {
                let Some(def) = defs.get(&u) else {
                    return Err(ctx(format!("use of undefined %{}", f.temp_name(u))));
                };
                if !dom.is_reachable(bi) {
                    continue;
                }
                let ok = if def.block == bi {
                    def.pos.is_none_or(|p| p < ii)
                } else {
                    dom.dominates(def.block, bi)
                };
                if !ok {
                    return Err(ctx(format!("%{} does not dominate its use in '{}'", f.temp_name(u), i.op)));
                }
            }
            check_instr(m, f, &types, i).map_err(|msg| ctx(format!("{}: {msg}", i.op)))?;
            for (n, label) in i.labels.iter().enumerate() {
                let Some(&target) = labels.get(label.as_str()) else {
                    return Err(ctx(format!("branch to unknown label '{label}'")));
                };
                let params = &f.blocks[target].params;
                let args = i.br_args.get(n).map(Vec::as_slice).unwrap_or(&[]);
                if args.len() != params.len() {
                    return Err(ctx(format!(
                        "branch to '{label}' passes {} argument(s), block takes {}",
                        args.len(),
                        params.len()
                    )));
                }
                for (a, p) in args.iter().zip(params) {
                    if !fits(&types, a, p.ty) {
                        return Err(ctx(format!("branch argument to '{label}' is not {}", p.ty)));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Whether `v` can be used where a `ty` is expected.
fn fits(types: &HashMap<TempId, Type>, v: &Value, ty: Type) -> bool {
    match v {
        Value::ConstInt(_) => ty.is_integer(),
        Value::ConstFloat(_) => ty == Type::F64,
        Value::Null => matches!(ty, Type::Ptr | Type::Str),
        Value::Temp(id) => types.get(id) == Some(&ty),
        Value::Global(_) => false,
    }
}

fn check_instr(m: &Module, f: &Function, types: &HashMap<TempId, Type>, i: &Instr) -> Result<(), String> {
    let arity = |n: usize| -> Result<(), String> {
        if i.operands.len() == n { Ok(()) } else { Err(format!("expected {n} operand(s), got {}", i.operands.len())) }
    };
    let operand = |n: usize, ty: Type| -> Result<(), String> {
        if fits(types, &i.operands[n], ty) { Ok(()) } else { Err(format!("operand {} must be {ty}", n + 1)) }
    };
    if let Some(fixed) = i.op.fixed_result()
        && i.result.is_some()
        && i.ty != fixed
    {
        return Err(format!("result type {} should be {fixed}", i.ty));
    }
    if i.op.is_terminator() && i.result.is_some() {
        return Err("terminators produce no value".into());
    }

    match i.op {
        op if op.is_int_binary() => {
            arity(2)?;
            operand(0, Type::I64)?;
            operand(1, Type::I64)
        }
        op if op.is_float_binary() || op.is_float_compare() => {
            arity(2)?;
            operand(0, Type::F64)?;
            operand(1, Type::F64)
        }
        op if op.is_int_compare() => {
            arity(2)?;
            let ty = [Type::I64, Type::I32, Type::I1]
                .into_iter()
                .find(|&t| fits(types, &i.operands[0], t) && fits(types, &i.operands[1], t));
            ty.map(|_| ()).ok_or_else(|| "operands must be integers of one width".to_string())
        }
        Opcode::SIToFP | Opcode::Trunc1 | Opcode::CastSiNarrowChk => {
            arity(1)?;
            operand(0, Type::I64)
        }
        Opcode::FPToSI => {
            arity(1)?;
            operand(0, Type::F64)
        }
        Opcode::Zext1 => {
            arity(1)?;
            operand(0, Type::I1)
        }
        Opcode::Alloca => {
            arity(1)?;
            match i.operands[0] {
                Value::ConstInt(n) if n > 0 => Ok(()),
                _ => Err("size must be a positive constant".into()),
            }
        }
        Opcode::Load => {
            arity(1)?;
            operand(0, Type::Ptr)?;
            if i.ty == Type::Void { Err("cannot load void".into()) } else { Ok(()) }
        }
        Opcode::Store => {
            arity(2)?;
            operand(0, Type::Ptr)?;
            operand(1, i.ty)
        }
        Opcode::ConstStr => {
            arity(1)?;
            match &i.operands[0] {
                Value::Global(g) if m.global(g).is_some() => Ok(()),
                Value::Global(g) => Err(format!("unknown global @{g}")),
                _ => Err("operand must be a global".into()),
            }
        }
        Opcode::ConstNull | Opcode::EhPop | Opcode::Trap | Opcode::ResumeSame | Opcode::ResumeNext => arity(0),
        Opcode::EhPush | Opcode::ResumeLabel => {
            arity(0)?;
            if i.labels.len() != 1 { Err("expected exactly one label".into()) } else { Ok(()) }
        }
        Opcode::Call => {
            let callee = i.callee.as_deref().ok_or("call without callee")?;
            let sig = m.signature(callee).ok_or_else(|| format!("unknown callee @{callee}"))?;
            arity(sig.params.len())?;
            for (n, &ty) in sig.params.iter().enumerate() {
                operand(n, ty).map_err(|e| format!("@{callee}: {e}"))?;
            }
            if i.ty != sig.ret {
                return Err(format!("@{callee} returns {}, call says {}", sig.ret, i.ty));
            }
            if i.result.is_some() && sig.ret == Type::Void {
                return Err(format!("@{callee} returns void"));
            }
            Ok(())
        }
        Opcode::Br => {
            arity(0)?;
            if i.labels.len() != 1 { Err("expected one target".into()) } else { Ok(()) }
        }
        Opcode::CBr => {
            arity(1)?;
            operand(0, Type::I1)?;
            if i.labels.len() != 2 { Err("expected two targets".into()) } else { Ok(()) }
        }
        Opcode::SwitchI32 => {
            if i.operands.is_empty() {
                return Err("missing scrutinee".into());
            }
            operand(0, Type::I32)?;
            if i.operands[1..].iter().any(|v| v.as_const_int().is_none()) {
                return Err("case values must be constants".into());
            }
            if i.labels.len() != i.operands.len() {
                return Err("every case needs a target".into());
            }
            Ok(())
        }
        Opcode::Ret => match (f.ret, i.operands.as_slice()) {
            (Type::Void, []) => Ok(()),
            (Type::Void, _) => Err("void function returns a value".into()),
            (ty, [v]) if fits(types, v, ty) => Ok(()),
            (ty, _) => Err(format!("must return one {ty}")),
        },
        _ => Ok(()),
    }
}
