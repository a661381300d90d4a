//! Turns `f(a) + f(b)` tails of a doubly recursive function into a loop that
//! carries the sum of the first calls in an accumulator, leaving one
//! recursive call per iteration.
//!
//! The shape it looks for, with `n` the only `i64` parameter:
//!
//! ```text
//! entry:
//!   %c = scmp_le %n, 1
//!   cbr %c, base, recurse
//! base:
//!   ret %n
//! recurse:
//!   ...
//!   %r1 = call @f(%a)
//!   ...                      ; nothing here reads %r1
//!   %r2 = call @f(%b)
//!   %s = iadd.ovf %r1, %r2
//!   ret %s
//! ```
//!
//! and the result:
//!
//! ```text
//! entry:
//!   %c = scmp_le %n, 1
//!   cbr %c, base, recurse(%n, 0)
//! recurse(%cur: i64, %acc: i64):
//!   ...                      ; %n replaced by %cur
//!   %r1 = call @f(%a)
//!   ...
//!   %acc2 = iadd.ovf %acc, %r1
//!   %cmp_loop = scmp_le %b, 1
//!   cbr %cmp_loop, done_recurse, recurse(%b, %acc2)
//! done_recurse:
//!   %result = iadd.ovf %b, %acc2
//!   ret %result
//! ```
//!
//! `done_recurse` stands in for the base case, so the base block must
//! return the parameter unchanged. The recurse block may only read the
//! parameter and its own values, since it now runs once per iteration.

use super::{AnalysisManager, FunctionPass, PreservedAnalyses};
use crate::il::{Block, Function, Instr, Opcode, Param, TempId, Type, Value};

pub struct SiblingRecursion;

impl FunctionPass for SiblingRecursion {
    fn name(&self) -> &'static str {
        "sibling-recursion"
    }

    fn run(&mut self, f: &mut Function, am: &mut AnalysisManager) -> PreservedAnalyses {
        let preds = am.cfg(f).preds.clone();
        let Some(m) = find_match(f, &preds) else {
            return PreservedAnalyses::all();
        };
        tracing::debug!(
            target: "ilc::opt",
            function = %f.name,
            block = %f.blocks[m.block].label,
            "sibling recursion rewritten as a loop"
        );
        rewrite(f, &m);
        PreservedAnalyses::none()
    }
}

/// The guard in the entry block deciding between base case and recursion.
#[derive(Debug, Clone)]
struct Guard {
    cmp: Opcode,
    threshold: Value,
    /// Whether the parameter is the left operand of the comparison.
    param_first: bool,
    /// Whether the guard's true edge leads to the base case.
    base_is_true: bool,
}

#[derive(Debug, Clone)]
struct Match {
    param: TempId,
    block: usize,
    first_call: usize,
    second_call: usize,
    combine: Opcode,
    guard: Guard,
}

fn self_call(f: &Function, i: &Instr) -> bool {
    i.op == Opcode::Call && i.callee.as_deref() == Some(f.name.as_str()) && i.result.is_some()
}

fn find_match(f: &Function, preds: &[Vec<usize>]) -> Option<Match> {
    let [param] = f.params[..] else { return None };
    if param.ty != Type::I64 || f.ret != Type::I64 {
        return None;
    }
    let param = param.id;
    (1..f.blocks.len()).find_map(|b| match_block(f, preds, param, b))
}

fn match_block(f: &Function, preds: &[Vec<usize>], param: TempId, b: usize) -> Option<Match> {
    let block = &f.blocks[b];
    if !block.params.is_empty() || preds.get(b)?.as_slice() != [0] {
        return None;
    }
    let calls: Vec<usize> = block.instrs.iter().enumerate().filter(|(_, i)| self_call(f, i)).map(|(k, _)| k).collect();
    let [first_call, second_call] = calls[..] else { return None };
    let r1 = block.instrs[first_call].result?;
    let r2 = block.instrs[second_call].result?;
    if block.instrs[first_call + 1..second_call].iter().any(|i| i.uses_temp(r1)) {
        return None;
    }
    let [add, ret] = &block.instrs[second_call + 1..] else { return None };
    if !matches!(add.op, Opcode::Add | Opcode::IAddOvf) {
        return None;
    }
    let sum = add.result?;
    let operands = [add.operands.first()?, add.operands.get(1)?];
    if operands != [&Value::Temp(r1), &Value::Temp(r2)] && operands != [&Value::Temp(r2), &Value::Temp(r1)] {
        return None;
    }
    if ret.op != Opcode::Ret || ret.operands != [Value::Temp(sum)] {
        return None;
    }
    if block.instrs[second_call].operands.len() != 1 {
        return None;
    }

    // Each iteration re-runs the block, so it may only read the parameter
    // and values it defines itself.
    let local: Vec<TempId> = block.instrs.iter().filter_map(|i| i.result).collect();
    let closed = block.instrs.iter().flat_map(Instr::uses).all(|u| u == param || local.contains(&u));
    if !closed {
        return None;
    }

    let guard = match_guard(f, param, &block.label)?;
    Some(Match { param, block: b, first_call, second_call, combine: add.op, guard })
}

fn match_guard(f: &Function, param: TempId, recurse: &str) -> Option<Guard> {
    let entry = f.blocks.first()?;
    let term = entry.terminator()?;
    if term.op != Opcode::CBr || term.br_args.iter().any(|a| !a.is_empty()) {
        return None;
    }
    let base_is_true = match (term.labels.first()?.as_str(), term.labels.get(1)?.as_str()) {
        (t, e) if e == recurse && t != recurse => true,
        (t, e) if t == recurse && e != recurse => false,
        _ => return None,
    };
    let base_label = if base_is_true { term.labels.first()? } else { term.labels.get(1)? };
    let base = f.block(base_label)?;
    let [ret] = &base.instrs[..] else { return None };
    if !base.params.is_empty() || ret.op != Opcode::Ret || ret.operands != [Value::Temp(param)] {
        return None;
    }

    let cond = term.operands.first()?.as_temp()?;
    let def = entry.instrs.iter().find(|i| i.result == Some(cond))?;
    if !matches!(def.op, Opcode::SCmpLt | Opcode::SCmpLe | Opcode::SCmpGt | Opcode::SCmpGe) {
        return None;
    }
    let (param_first, threshold) = match (def.operands.first()?, def.operands.get(1)?) {
        (Value::Temp(p), k @ Value::ConstInt(_)) if *p == param => (true, k.clone()),
        (k @ Value::ConstInt(_), Value::Temp(p)) if *p == param => (false, k.clone()),
        _ => return None,
    };
    Some(Guard { cmp: def.op, threshold, param_first, base_is_true })
}

fn rewrite(f: &mut Function, m: &Match) {
    let cur = f.new_temp();
    let acc = f.new_temp();
    let acc2 = f.new_temp();
    let cmp_loop = f.new_temp();
    let result = f.new_temp();

    let label = f.blocks[m.block].label.clone();
    let done = f.fresh_label(&format!("done_{label}"));

    // Entry edges start the loop with the parameter and an empty sum.
    for instr in f.blocks.iter_mut().filter_map(Block::terminator_mut) {
        for (l, args) in instr.labels.iter().zip(instr.br_args.iter_mut()) {
            if *l == label {
                args.push(Value::Temp(m.param));
                args.push(Value::ConstInt(0));
            }
        }
    }

    let block = &mut f.blocks[m.block];
    let loc = block.instrs.last().map_or(0, |i| i.loc);
    let tail = block.instrs.split_off(m.second_call);
    let second_arg = match tail.first().and_then(|call| call.operands.first().cloned()) {
        Some(Value::Temp(t)) if t == m.param => Value::Temp(cur),
        Some(v) => v,
        None => Value::Temp(cur),
    };
    for instr in &mut block.instrs {
        instr.replace_uses(m.param, &Value::Temp(cur));
    }
    block.params = vec![Param { id: cur, ty: Type::I64 }, Param { id: acc, ty: Type::I64 }];

    let r1 = block.instrs[m.first_call].result.map(Value::Temp).unwrap_or(Value::ConstInt(0));
    let mut update = Instr::new(m.combine, Type::I64, vec![Value::Temp(acc), r1]);
    update.result = Some(acc2);
    update.loc = loc;
    block.instrs.push(update);

    let g = &m.guard;
    let operands = if g.param_first {
        vec![second_arg.clone(), g.threshold.clone()]
    } else {
        vec![g.threshold.clone(), second_arg.clone()]
    };
    let mut test = Instr::new(g.cmp, Type::I1, operands);
    test.result = Some(cmp_loop);
    test.loc = loc;
    block.instrs.push(test);

    let again = vec![second_arg.clone(), Value::Temp(acc2)];
    let mut branch = if g.base_is_true {
        Instr::cbr(Value::Temp(cmp_loop), done.clone(), Vec::new(), label.clone(), again)
    } else {
        Instr::cbr(Value::Temp(cmp_loop), label.clone(), again, done.clone(), Vec::new())
    };
    branch.loc = loc;
    block.instrs.push(branch);
    block.terminated = true;

    let mut sum = Instr::new(m.combine, Type::I64, vec![second_arg, Value::Temp(acc2)]);
    sum.result = Some(result);
    sum.loc = loc;
    let mut ret = Instr::ret(Some(Value::Temp(result)));
    ret.loc = loc;
    let mut done_block = Block::new(done);
    done_block.instrs = vec![sum, ret];
    done_block.terminated = true;
    f.blocks.insert(m.block + 1, done_block);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::{Module, parse_module, print_module, verify_module};

    const FIB: &str = "il 0.1
func @fib(%n: i64) -> i64 {
entry:
  %t0 = scmp_le %n, 1
  cbr %t0, base, recurse
base:
  ret %n
recurse:
  %t1 = isub.ovf %n, 1
  %t2 = call @fib(%t1)
  %t3 = isub.ovf %n, 2
  %t4 = call @fib(%t3)
  %t5 = iadd.ovf %t2, %t4
  ret %t5
}
";

    fn run(src: &str) -> (Module, PreservedAnalyses) {
        let mut m = parse_module(src).unwrap();
        let mut am = AnalysisManager::new();
        let pa = SiblingRecursion.run(&mut m.functions[0], &mut am);
        verify_module(&m).unwrap();
        (m, pa)
    }

    #[test]
    fn fib_keeps_a_single_self_call() {
        let (m, pa) = run(FIB);
        let f = &m.functions[0];
        assert_eq!(f.calls_to("fib"), 1);
        assert_eq!(pa, PreservedAnalyses::none());
        let recurse = f.block("recurse").unwrap();
        assert_eq!(recurse.params.len(), 2);
        let done = f.block("done_recurse").unwrap();
        assert_eq!(done.instrs.len(), 2);
        let text = print_module(&m);
        assert!(text.contains("cbr %t0, base, recurse(%n, 0)"), "{text}");
    }

    #[test]
    fn polarity_follows_the_guard() {
        let src = FIB.replace("scmp_le %n, 1", "scmp_gt %n, 1").replace("cbr %t0, base, recurse", "cbr %t0, recurse, base");
        let (m, _) = run(&src);
        let f = &m.functions[0];
        let term = f.block("recurse").unwrap().terminator().unwrap();
        assert_eq!(term.labels, vec!["recurse".to_string(), "done_recurse".to_string()]);
        assert_eq!(term.op, Opcode::CBr);
        let instrs = &f.block("recurse").unwrap().instrs;
        assert_eq!(instrs[instrs.len() - 2].op, Opcode::SCmpGt);
    }

    #[test]
    fn base_case_must_return_the_parameter() {
        let src = FIB.replace("base:\n  ret %n", "base:\n  ret 1");
        let (m, pa) = run(&src);
        assert_eq!(m.functions[0].calls_to("fib"), 2);
        assert!(pa.is_all());
    }

    #[test]
    fn first_result_used_between_calls_blocks_the_rewrite() {
        let src = FIB.replace("%t3 = isub.ovf %n, 2", "%t3 = isub.ovf %t2, 2");
        let (m, _) = run(&src);
        assert_eq!(m.functions[0].calls_to("fib"), 2);
    }

    #[test]
    fn multiplication_is_not_a_sibling_sum() {
        let src = FIB.replace("iadd.ovf %t2, %t4", "imul.ovf %t2, %t4");
        let (m, _) = run(&src);
        assert_eq!(m.functions[0].calls_to("fib"), 2);
    }
}
