//! Constant folding and propagation.
//!
//! Checked operations fold only when they would not trap; an overflowing
//! `iadd.ovf` or a division by zero stays in place and fails at run time.

use std::collections::HashMap;

use super::{AnalysisManager, FunctionPass, PreservedAnalyses};
use crate::il::{Function, Instr, Opcode, TempId, Value};

pub struct ConstFold;

impl FunctionPass for ConstFold {
    fn name(&self) -> &'static str {
        "const-fold"
    }

    fn run(&mut self, f: &mut Function, am: &mut AnalysisManager) -> PreservedAnalyses {
        // Reverse postorder sees every definition before the uses it dominates.
        let order = am.cfg(f).reverse_postorder();
        let mut known: HashMap<TempId, Value> = HashMap::new();
        for b in order {
            for instr in &mut f.blocks[b].instrs {
                substitute(instr, &known);
                if let (Some(r), Some(v)) = (instr.result, eval(instr)) {
                    known.insert(r, v);
                }
            }
        }
        if known.is_empty() {
            return PreservedAnalyses::all();
        }
        for block in &mut f.blocks {
            block.instrs.retain(|i| i.result.is_none_or(|r| !known.contains_key(&r)));
            for instr in &mut block.instrs {
                substitute(instr, &known);
            }
        }
        tracing::trace!(target: "ilc::opt", function = %f.name, folded = known.len(), "constants folded");
        // Branch conditions may now be constant but edges are unchanged.
        PreservedAnalyses::all()
    }
}

fn substitute(instr: &mut Instr, known: &HashMap<TempId, Value>) {
    for v in instr.operands.iter_mut().chain(instr.br_args.iter_mut().flatten()) {
        if let Value::Temp(t) = v
            && let Some(c) = known.get(t)
        {
            *v = c.clone();
        }
    }
}

/// Value of `instr` when every operand is a constant and evaluation cannot trap.
pub fn eval(instr: &Instr) -> Option<Value> {
    let int = |k: usize| instr.operands.get(k).and_then(Value::as_const_int);
    let float = |k: usize| match instr.operands.get(k) {
        Some(Value::ConstFloat(x)) => Some(*x),
        _ => None,
    };
    let op = instr.op;
    let v = if op.is_int_binary() {
        Value::ConstInt(int_binary(op, int(0)?, int(1)?)?)
    } else if op.is_float_binary() {
        let (a, b) = (float(0)?, float(1)?);
        Value::ConstFloat(match op {
            Opcode::FAdd => a + b,
            Opcode::FSub => a - b,
            Opcode::FMul => a * b,
            _ => a / b,
        })
    } else if op.is_int_compare() {
        let (a, b) = (int(0)?, int(1)?);
        let r = match op {
            Opcode::ICmpEq => a == b,
            Opcode::ICmpNe => a != b,
            Opcode::SCmpLt => a < b,
            Opcode::SCmpLe => a <= b,
            Opcode::SCmpGt => a > b,
            _ => a >= b,
        };
        Value::ConstInt(r as i64)
    } else if op.is_float_compare() {
        let (a, b) = (float(0)?, float(1)?);
        let r = match op {
            Opcode::FCmpEq => a == b,
            Opcode::FCmpNe => a != b,
            Opcode::FCmpLt => a < b,
            Opcode::FCmpLe => a <= b,
            Opcode::FCmpGt => a > b,
            _ => a >= b,
        };
        Value::ConstInt(r as i64)
    } else {
        match op {
            Opcode::SIToFP => Value::ConstFloat(int(0)? as f64),
            Opcode::FPToSI => Value::ConstInt(fp_to_si(float(0)?)?),
            Opcode::Zext1 => Value::ConstInt((int(0)? != 0) as i64),
            Opcode::Trunc1 => Value::ConstInt(int(0)? & 1),
            Opcode::CastSiNarrowChk => {
                let a = int(0)?;
                i32::try_from(a).ok()?;
                Value::ConstInt(a)
            }
            _ => return None,
        }
    };
    Some(v)
}

/// `None` where the operation traps.
pub fn int_binary(op: Opcode, a: i64, b: i64) -> Option<i64> {
    Some(match op {
        Opcode::Add => a.wrapping_add(b),
        Opcode::Sub => a.wrapping_sub(b),
        Opcode::Mul => a.wrapping_mul(b),
        Opcode::IAddOvf => a.checked_add(b)?,
        Opcode::ISubOvf => a.checked_sub(b)?,
        Opcode::IMulOvf => a.checked_mul(b)?,
        Opcode::SDivChk0 => a.checked_div(b)?,
        Opcode::SRemChk0 => a.checked_rem(b)?,
        Opcode::And => a & b,
        Opcode::Or => a | b,
        Opcode::Xor => a ^ b,
        _ => return None,
    })
}

/// Truncating conversion; `None` for NaN and values outside `i64`.
pub fn fp_to_si(x: f64) -> Option<i64> {
    let t = x.trunc();
    if t.is_nan() || t < i64::MIN as f64 || t >= i64::MAX as f64 {
        return None;
    }
    Some(t as i64)
}
