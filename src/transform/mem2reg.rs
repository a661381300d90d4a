//! Promote stack slots to SSA values.
//!
//! A slot qualifies when its `alloca` sits in the entry block, every use of
//! the pointer is the address operand of a `load` or `store` of a single
//! type, and the entry block stores to it before any load. Each promoted
//! slot gets a parameter on every other block; loads turn into the value
//! reaching them and branches carry the current values as arguments.
//! Parameters whose incoming values all agree are then folded away, which
//! leaves parameters only at real join points.
//!
//! Functions with `eh.*` or `resume.*` are skipped: a handler is entered
//! from the middle of a block, and no branch carries slot values along that
//! edge.

use std::collections::{HashMap, HashSet};

use super::{AnalysisManager, FunctionPass, PreservedAnalyses};
use crate::il::cfg::Cfg;
use crate::il::{Block, Function, Opcode, Param, TempId, Type, Value};

pub struct Mem2Reg;

impl FunctionPass for Mem2Reg {
    fn name(&self) -> &'static str {
        "mem2reg"
    }

    fn run(&mut self, f: &mut Function, am: &mut AnalysisManager) -> PreservedAnalyses {
        if f.blocks.is_empty() || has_handlers(f) || !am.cfg(f).preds[0].is_empty() {
            return PreservedAnalyses::all();
        }
        let slots = promotable(f);
        if slots.is_empty() {
            return PreservedAnalyses::all();
        }
        rename(f, &slots);
        let folded = fold_trivial_params(f);
        tracing::debug!(target: "ilc::opt", function = %f.name, slots = slots.len(), folded, "slots promoted");
        // Branch targets are untouched; only arguments and parameters change.
        PreservedAnalyses::all()
    }
}

fn has_handlers(f: &Function) -> bool {
    f.blocks.iter().flat_map(|b| &b.instrs).any(|i| {
        matches!(
            i.op,
            Opcode::EhPush | Opcode::EhPop | Opcode::ResumeSame | Opcode::ResumeNext | Opcode::ResumeLabel
        )
    })
}

/// Promotable slots with their value type, in entry-block order.
fn promotable(f: &Function) -> Vec<(TempId, Type)> {
    let entry = &f.blocks[0];
    let mut candidates: Vec<TempId> =
        entry.instrs.iter().filter(|i| i.op == Opcode::Alloca).filter_map(|i| i.result).collect();
    let is_candidate: HashSet<TempId> = candidates.iter().copied().collect();

    let mut types: HashMap<TempId, Type> = HashMap::new();
    let mut escaped: HashSet<TempId> = HashSet::new();
    for i in f.blocks.iter().flat_map(|b| &b.instrs) {
        for (k, v) in i.operands.iter().enumerate() {
            let Some(t) = v.as_temp().filter(|t| is_candidate.contains(t)) else { continue };
            let address = k == 0 && matches!(i.op, Opcode::Load | Opcode::Store);
            if !address || *types.entry(t).or_insert(i.ty) != i.ty {
                escaped.insert(t);
            }
        }
        escaped.extend(i.br_args.iter().flatten().filter_map(Value::as_temp).filter(|t| is_candidate.contains(t)));
    }

    let mut stored = HashSet::new();
    for i in &entry.instrs {
        let Some(t) = i.operands.first().and_then(Value::as_temp) else { continue };
        match i.op {
            Opcode::Store => {
                stored.insert(t);
            }
            Opcode::Load if !stored.contains(&t) => {
                escaped.insert(t);
            }
            _ => {}
        }
    }

    candidates.retain(|t| stored.contains(t) && !escaped.contains(t));
    candidates.into_iter().filter_map(|t| types.get(&t).map(|&ty| (t, ty))).collect()
}

/// Replace loads and stores of `slots` with values threaded through block
/// parameters.
fn rename(f: &mut Function, slots: &[(TempId, Type)]) {
    let index: HashMap<TempId, usize> = slots.iter().enumerate().map(|(k, &(t, _))| (t, k)).collect();

    let mut starts: Vec<Vec<Value>> = Vec::with_capacity(f.blocks.len());
    // Never read: the entry block stores every slot before loading it.
    starts.push(vec![Value::Null; slots.len()]);
    for b in 1..f.blocks.len() {
        let mut values = Vec::with_capacity(slots.len());
        for &(_, ty) in slots {
            let id = f.new_temp();
            f.blocks[b].params.push(Param { id, ty });
            values.push(Value::Temp(id));
        }
        starts.push(values);
    }

    let mut loaded: HashMap<TempId, Value> = HashMap::new();
    for (block, mut current) in f.blocks.iter_mut().zip(starts) {
        let mut kept = Vec::with_capacity(block.instrs.len());
        for mut instr in std::mem::take(&mut block.instrs) {
            let slot = instr.operands.first().and_then(Value::as_temp).and_then(|t| index.get(&t).copied());
            match (instr.op, slot) {
                (Opcode::Alloca, _) if instr.result.is_some_and(|r| index.contains_key(&r)) => continue,
                (Opcode::Store, Some(k)) => {
                    current[k] = instr.operands.get(1).cloned().unwrap_or(Value::Null);
                    continue;
                }
                (Opcode::Load, Some(k)) => {
                    if let Some(r) = instr.result {
                        loaded.insert(r, current[k].clone());
                    }
                    continue;
                }
                _ => {}
            }
            if instr.op.is_terminator() {
                for args in &mut instr.br_args {
                    args.extend(current.iter().cloned());
                }
            }
            kept.push(instr);
        }
        block.instrs = kept;
    }

    for instr in f.blocks.iter_mut().flat_map(|b| &mut b.instrs) {
        for v in instr.operands.iter_mut().chain(instr.br_args.iter_mut().flatten()) {
            if v.as_temp().is_some_and(|t| loaded.contains_key(&t)) {
                *v = resolve(&loaded, v);
            }
        }
    }
}

/// Follow replacement chains (a loaded value stored into another slot).
fn resolve(map: &HashMap<TempId, Value>, v: &Value) -> Value {
    let mut v = v.clone();
    for _ in 0..=map.len() {
        match v.as_temp().and_then(|t| map.get(&t)) {
            Some(next) => v = next.clone(),
            None => break,
        }
    }
    v
}

/// Drop block parameters whose reachable incoming arguments are all one
/// value (or the parameter itself). Returns how many were removed.
fn fold_trivial_params(f: &mut Function) -> usize {
    let mut folded = 0;
    loop {
        let subst = trivial_params(f);
        if subst.is_empty() {
            return folded;
        }
        folded += subst.len();
        remove_params(f, &subst);
    }
}

fn trivial_params(f: &Function) -> HashMap<TempId, Value> {
    let reachable = Cfg::build(f).reachable();
    let mut incoming: HashMap<&str, Vec<&[Value]>> = HashMap::new();
    for (_, block) in f.blocks.iter().enumerate().filter(|(b, _)| reachable[*b]) {
        let Some(t) = block.terminator() else { continue };
        for (label, args) in t.labels.iter().zip(&t.br_args) {
            incoming.entry(label.as_str()).or_default().push(args.as_slice());
        }
    }

    let mut subst: HashMap<TempId, Value> = HashMap::new();
    for block in f.blocks.iter().skip(1) {
        let Some(edges) = incoming.get(block.label.as_str()) else { continue };
        for (k, p) in block.params.iter().enumerate() {
            let mut same: Option<Value> = None;
            let mut trivial = true;
            for args in edges {
                let Some(arg) = args.get(k) else {
                    trivial = false;
                    break;
                };
                let arg = resolve(&subst, arg);
                if arg == Value::Temp(p.id) {
                    continue;
                }
                match &same {
                    None => same = Some(arg),
                    Some(s) if *s == arg => {}
                    Some(_) => {
                        trivial = false;
                        break;
                    }
                }
            }
            if let (true, Some(v)) = (trivial, same) {
                subst.insert(p.id, v);
            }
        }
    }
    subst
}

fn remove_params(f: &mut Function, subst: &HashMap<TempId, Value>) {
    let mut dropped: HashMap<String, Vec<usize>> = HashMap::new();
    for block in &mut f.blocks {
        let positions: Vec<usize> =
            block.params.iter().enumerate().filter(|(_, p)| subst.contains_key(&p.id)).map(|(k, _)| k).collect();
        if positions.is_empty() {
            continue;
        }
        block.params.retain(|p| !subst.contains_key(&p.id));
        dropped.insert(block.label.clone(), positions);
    }
    for instr in f.blocks.iter_mut().flat_map(|b: &mut Block| &mut b.instrs) {
        if instr.op.is_terminator() {
            for (label, args) in instr.labels.iter().zip(instr.br_args.iter_mut()) {
                let Some(positions) = dropped.get(label) else { continue };
                for &k in positions.iter().rev() {
                    if k < args.len() {
                        args.remove(k);
                    }
                }
            }
        }
        for v in instr.operands.iter_mut().chain(instr.br_args.iter_mut().flatten()) {
            if v.as_temp().is_some_and(|t| subst.contains_key(&t)) {
                *v = resolve(subst, v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::{parse_module, print_module, verify_module};
    use crate::vm::{DebugOptions, run_module};

    fn promote(src: &str) -> crate::il::Module {
        let mut m = parse_module(src).unwrap();
        let mut am = AnalysisManager::new();
        for f in &mut m.functions {
            Mem2Reg.run(f, &mut am);
        }
        verify_module(&m).unwrap();
        m
    }

    fn slot_ops(f: &Function) -> usize {
        f.blocks
            .iter()
            .flat_map(|b| &b.instrs)
            .filter(|i| matches!(i.op, Opcode::Alloca | Opcode::Load | Opcode::Store))
            .count()
    }

    const SUM_LOOP: &str = "il 0.1
func @main() -> i64 {
entry:
  %s.addr = alloca 8
  store i64, %s.addr, 0
  %i.addr = alloca 8
  store i64, %i.addr, 1
  br head
head:
  %t0 = load i64, %i.addr
  %t1 = scmp_le %t0, 10
  cbr %t1, body, done
body:
  %t2 = load i64, %s.addr
  %t3 = load i64, %i.addr
  %t4 = iadd.ovf %t2, %t3
  store i64, %s.addr, %t4
  %t5 = iadd.ovf %t3, 1
  store i64, %i.addr, %t5
  br head
done:
  %t6 = load i64, %s.addr
  ret %t6
}
";

    #[test]
    fn loop_variables_become_block_params() {
        let before = run_module(&parse_module(SUM_LOOP).unwrap(), DebugOptions::default()).unwrap();
        let m = promote(SUM_LOOP);
        let f = &m.functions[0];
        assert_eq!(slot_ops(f), 0, "{}", print_module(&m));
        // Only the loop header is a join point.
        let head = f.block("head").unwrap();
        assert_eq!(head.params.len(), 2);
        assert!(f.block("body").unwrap().params.is_empty());
        assert!(f.block("done").unwrap().params.is_empty());
        let after = run_module(&m, DebugOptions::default()).unwrap();
        assert_eq!(before.exit_code, 55);
        assert_eq!(after.exit_code, 55);
    }

    #[test]
    fn straight_line_slots_fold_to_constants() {
        let m = promote(
            "il 0.1
func @main() -> i64 {
entry:
  %x.addr = alloca 8
  store i64, %x.addr, 0
  store i64, %x.addr, 41
  br next
next:
  %t0 = load i64, %x.addr
  %t1 = iadd.ovf %t0, 1
  ret %t1
}
",
        );
        let text = print_module(&m);
        assert!(text.contains("iadd.ovf 41, 1"), "{text}");
        assert!(!text.contains("next("), "{text}");
    }

    #[test]
    fn escaping_slots_are_kept() {
        let src = "il 0.1
extern @rt_arr_i64_len(ptr) -> i64
func @main() -> i64 {
entry:
  %a.addr = alloca 8
  store ptr, %a.addr, null
  %t0 = call @rt_arr_i64_len(%a.addr)
  ret %t0
}
";
        let m = promote(src);
        assert_eq!(slot_ops(&m.functions[0]), 2);
    }

    #[test]
    fn loads_before_the_first_store_block_promotion() {
        let src = "il 0.1
func @main() -> i64 {
entry:
  %x.addr = alloca 8
  %t0 = load i64, %x.addr
  store i64, %x.addr, 5
  ret %t0
}
";
        let m = promote(src);
        assert_eq!(slot_ops(&m.functions[0]), 3);
    }

    #[test]
    fn functions_with_handlers_are_skipped() {
        let src = "il 0.1
func @main() -> i64 {
entry:
  %x.addr = alloca 8
  store i64, %x.addr, 1
  eh.push h
  br next
next:
  %t0 = load i64, %x.addr
  ret %t0
h:
  resume.next
}
";
        let m = promote(src);
        assert_eq!(slot_ops(&m.functions[0]), 3);
    }
}
