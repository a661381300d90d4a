//! CFG cleanup: constant branches, unreachable blocks, straight-line chains.

use super::{AnalysisManager, FunctionPass, PreservedAnalyses};
use crate::il::cfg::Cfg;
use crate::il::{Function, Instr, Opcode, Value};

pub struct SimplifyCfg;

impl FunctionPass for SimplifyCfg {
    fn name(&self) -> &'static str {
        "simplify-cfg"
    }

    fn run(&mut self, f: &mut Function, _am: &mut AnalysisManager) -> PreservedAnalyses {
        let mut changed = false;
        loop {
            let mut round = fold_branches(f);
            round |= remove_unreachable(f);
            round |= merge_chain(f);
            if !round {
                break;
            }
            changed = true;
        }
        if changed { PreservedAnalyses::none() } else { PreservedAnalyses::all() }
    }
}

/// Turn `cbr`/`switch_i32` into `br` when only one target can be taken.
fn fold_branches(f: &mut Function) -> bool {
    let mut changed = false;
    for block in &mut f.blocks {
        let Some(term) = block.terminator_mut() else { continue };
        let cond = term.operands.first().and_then(Value::as_const_int);
        let taken = match (term.op, cond) {
            (Opcode::CBr, Some(c)) => Some(if c != 0 { 0 } else { 1 }),
            (Opcode::CBr, None) => {
                let same = term.labels.first() == term.labels.get(1) && term.br_args.first() == term.br_args.get(1);
                same.then_some(0)
            }
            (Opcode::SwitchI32, Some(c)) => {
                // operands[k] pairs with labels[k]; labels[0] is the default.
                let case = term.operands.iter().skip(1).position(|v| v.as_const_int() == Some(c));
                Some(case.map_or(0, |k| k + 1))
            }
            _ => None,
        };
        let Some(k) = taken else { continue };
        let (Some(label), Some(args)) = (term.labels.get(k), term.br_args.get(k)) else { continue };
        let mut br = Instr::br(label.clone(), args.clone());
        br.loc = term.loc;
        *term = br;
        changed = true;
    }
    changed
}

fn remove_unreachable(f: &mut Function) -> bool {
    let reachable = Cfg::build(f).reachable();
    if reachable.iter().all(|&r| r) {
        return false;
    }
    let mut keep = reachable.into_iter();
    f.blocks.retain(|_| keep.next().unwrap_or(true));
    true
}

/// Fold one block into its only predecessor when that predecessor ends in a
/// plain `br` to it. Returns after the first merge; the caller loops.
fn merge_chain(f: &mut Function) -> bool {
    let cfg = Cfg::build(f);
    for b in 1..f.blocks.len() {
        if !f.blocks[b].params.is_empty() {
            continue;
        }
        let [p] = cfg.preds[b][..] else { continue };
        if p == b {
            continue;
        }
        let pred = &f.blocks[p];
        let plain_br = pred.terminator().is_some_and(|t| t.op == Opcode::Br);
        if !plain_br || pred.successors().len() != 1 {
            continue;
        }
        let block = f.blocks.remove(b);
        let p = if p > b { p - 1 } else { p };
        let pred = &mut f.blocks[p];
        pred.instrs.pop();
        pred.instrs.extend(block.instrs);
        pred.terminated = block.terminated;
        return true;
    }
    false
}
