//! Dead code elimination.

use std::collections::HashSet;

use super::{AnalysisManager, FunctionPass, PreservedAnalyses};
use crate::il::{Function, Opcode, TempId};

pub struct Dce;

impl FunctionPass for Dce {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn run(&mut self, f: &mut Function, _am: &mut AnalysisManager) -> PreservedAnalyses {
        let mut removed = 0usize;
        loop {
            let used = used_temps(f);
            let mut round = 0;
            for block in &mut f.blocks {
                let before = block.instrs.len();
                block
                    .instrs
                    .retain(|i| !(i.op.is_pure() && i.result.is_some_and(|r| !used.contains(&r))));
                round += before - block.instrs.len();
            }
            round += remove_dead_params(f, &used);
            if round == 0 {
                break;
            }
            removed += round;
        }
        if removed > 0 {
            tracing::trace!(target: "ilc::opt", function = %f.name, removed, "dead code removed");
        }
        // Only values go away; every edge survives.
        PreservedAnalyses::all()
    }
}

fn used_temps(f: &Function) -> HashSet<TempId> {
    f.blocks.iter().flat_map(|b| &b.instrs).flat_map(|i| i.uses()).collect()
}

/// Drop block parameters nothing reads, together with the matching argument
/// on every incoming edge. Handler targets are skipped since their edges
/// carry no arguments.
fn remove_dead_params(f: &mut Function, used: &HashSet<TempId>) -> usize {
    let handlers: HashSet<String> = f
        .blocks
        .iter()
        .flat_map(|b| &b.instrs)
        .filter(|i| matches!(i.op, Opcode::EhPush | Opcode::ResumeLabel))
        .flat_map(|i| i.labels.iter().cloned())
        .collect();
    let mut removed = 0;
    for bi in 1..f.blocks.len() {
        let block = &f.blocks[bi];
        if handlers.contains(&block.label) {
            continue;
        }
        let dead: Vec<usize> = block
            .params
            .iter()
            .enumerate()
            .filter(|(_, p)| !used.contains(&p.id))
            .map(|(k, _)| k)
            .collect();
        if dead.is_empty() {
            continue;
        }
        let label = block.label.clone();
        let block = &mut f.blocks[bi];
        for &k in dead.iter().rev() {
            block.params.remove(k);
        }
        for instr in f.blocks.iter_mut().flat_map(|b| &mut b.instrs) {
            if !instr.op.is_terminator() {
                continue;
            }
            for (l, args) in instr.labels.iter().zip(instr.br_args.iter_mut()) {
                if *l != label {
                    continue;
                }
                for &k in dead.iter().rev() {
                    if k < args.len() {
                        args.remove(k);
                    }
                }
            }
        }
        removed += dead.len();
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::{parse_module, print_module, verify_module};

    fn dce(src: &str) -> String {
        let mut m = parse_module(src).unwrap();
        let mut am = AnalysisManager::new();
        for f in &mut m.functions {
            Dce.run(f, &mut am);
        }
        verify_module(&m).unwrap();
        print_module(&m)
    }

    #[test]
    fn unused_pure_chains_disappear_but_calls_stay() {
        let out = dce(
            "il 0.1
extern @rt_rnd() -> f64
func @f(%n: i64) -> i64 {
entry:
  %t0 = add %n, 1
  %t1 = mul %t0, 2
  %t2 = call @rt_rnd()
  %t3 = iadd.ovf %n, 1
  ret %n
}
",
        );
        assert!(!out.contains("= add"), "{out}");
        assert!(!out.contains("mul"));
        assert!(out.contains("call @rt_rnd()"));
        assert!(out.contains("iadd.ovf"));
    }

    #[test]
    fn unused_block_params_lose_their_arguments() {
        let out = dce(
            "il 0.1
func @f(%c: i1) -> i64 {
entry:
  cbr %c, j(1, 2), j(3, 4)
j(%a: i64, %b: i64):
  ret %b
}
",
        );
        assert!(out.contains("cbr %c, j(2), j(4)"), "{out}");
        assert!(out.contains("j(%b: i64):"));
    }
}
