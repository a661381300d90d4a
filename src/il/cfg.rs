//! Control-flow graph and dominator tree over a function's blocks.
//!
//! Blocks are identified by their index in `Function::blocks`. Edges come
//! from terminators and from `eh.push` handler labels. Edges to labels that
//! do not exist are dropped here; the verifier reports them.

use std::collections::HashMap;

use super::Function;

#[derive(Debug, Clone, PartialEq)]
pub struct Cfg {
    pub succs: Vec<Vec<usize>>,
    pub preds: Vec<Vec<usize>>,
}

impl Cfg {
    pub fn build(f: &Function) -> Cfg {
        let index: HashMap<&str, usize> = f.blocks.iter().enumerate().map(|(i, b)| (b.label.as_str(), i)).collect();
        let n = f.blocks.len();
        let mut succs = vec![Vec::new(); n];
        let mut preds = vec![Vec::new(); n];
        for (i, b) in f.blocks.iter().enumerate() {
            for label in b.successors() {
                let Some(&j) = index.get(label) else { continue };
                if !succs[i].contains(&j) {
                    succs[i].push(j);
                    preds[j].push(i);
                }
            }
        }
        Cfg { succs, preds }
    }

    pub fn len(&self) -> usize {
        self.succs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.succs.is_empty()
    }

    /// Blocks reachable from the entry in reverse postorder.
    pub fn reverse_postorder(&self) -> Vec<usize> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut visited = vec![false; self.len()];
        let mut post = Vec::with_capacity(self.len());
        // (block, next successor to visit)
        let mut stack = vec![(0usize, 0usize)];
        visited[0] = true;
        while let Some((b, next)) = stack.last_mut() {
            let b = *b;
            if let Some(&s) = self.succs[b].get(*next) {
                *next += 1;
                if !visited[s] {
                    visited[s] = true;
                    stack.push((s, 0));
                }
            } else {
                post.push(b);
                stack.pop();
            }
        }
        post.reverse();
        post
    }

    pub fn reachable(&self) -> Vec<bool> {
        let mut r = vec![false; self.len()];
        for b in self.reverse_postorder() {
            r[b] = true;
        }
        r
    }
}

/// Immediate dominators, computed with the Cooper-Harvey-Kennedy iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct DomTree {
    /// `idom[b]`; the entry is its own idom, unreachable blocks have `None`.
    idom: Vec<Option<usize>>,
}

impl DomTree {
    pub fn build(cfg: &Cfg) -> DomTree {
        let rpo = cfg.reverse_postorder();
        let mut order = vec![usize::MAX; cfg.len()];
        for (i, &b) in rpo.iter().enumerate() {
            order[b] = i;
        }
        let mut idom: Vec<Option<usize>> = vec![None; cfg.len()];
        if rpo.is_empty() {
            return DomTree { idom };
        }
        idom[0] = Some(0);
        let mut changed = true;
        while changed {
            changed = false;
            for &b in rpo.iter().skip(1) {
                let mut new_idom: Option<usize> = None;
                for &p in &cfg.preds[b] {
                    if idom[p].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(cur) => intersect(&idom, &order, p, cur),
                    });
                }
                if new_idom.is_some() && idom[b] != new_idom {
                    idom[b] = new_idom;
                    changed = true;
                }
            }
        }
        DomTree { idom }
    }

    pub fn idom(&self, b: usize) -> Option<usize> {
        match self.idom.get(b).copied().flatten() {
            Some(d) if d == b => None,
            other => other,
        }
    }

    pub fn is_reachable(&self, b: usize) -> bool {
        self.idom.get(b).is_some_and(Option::is_some)
    }

    /// Whether `a` dominates `b` (every block dominates itself).
    pub fn dominates(&self, a: usize, b: usize) -> bool {
        if !self.is_reachable(b) {
            return false;
        }
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            match self.idom(cur) {
                Some(d) => cur = d,
                None => return false,
            }
        }
    }
}

fn intersect(idom: &[Option<usize>], order: &[usize], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while order[a] > order[b] {
            a = idom[a].unwrap_or(0);
        }
        while order[b] > order[a] {
            b = idom[b].unwrap_or(0);
        }
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::parse_module;

    fn diamond() -> Function {
        let src = "il 0.1
func @f(%c: i1) -> i64 {
entry:
  cbr %c, left, right
left:
  br join(1)
right:
  br join(2)
join(%x: i64):
  ret %x
dead:
  br join(3)
}
";
        parse_module(src).unwrap().functions.remove(0)
    }

    #[test]
    fn diamond_dominators() {
        let f = diamond();
        let cfg = Cfg::build(&f);
        let dom = DomTree::build(&cfg);
        assert_eq!(dom.idom(3), Some(0));
        assert_eq!(dom.idom(1), Some(0));
        assert!(dom.dominates(0, 3));
        assert!(!dom.dominates(1, 3));
        assert!(!dom.is_reachable(4));
    }

    #[test]
    fn preds_ignore_duplicates_and_unreachable_sources_still_count() {
        let f = diamond();
        let cfg = Cfg::build(&f);
        assert_eq!(cfg.preds[3], vec![1, 2, 4]);
        assert_eq!(cfg.reachable(), vec![true, true, true, true, false]);
    }

    #[test]
    fn loops_are_dominated_by_their_header() {
        let src = "il 0.1
func @f() -> void {
entry:
  br head
head:
  %t0 = scmp_lt 1, 2
  cbr %t0, body, exit
body:
  br head
exit:
  ret
}
";
        let f = parse_module(src).unwrap().functions.remove(0);
        let dom = DomTree::build(&Cfg::build(&f));
        assert!(dom.dominates(1, 2));
        assert!(dom.dominates(1, 3));
        assert_eq!(dom.idom(2), Some(1));
    }
}
