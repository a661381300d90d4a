//! Per-function analysis cache.

use std::collections::HashMap;

use crate::il::Function;
use crate::il::cfg::{Cfg, DomTree};

/// What a pass left intact. The manager drops every cached analysis a pass
/// did not preserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreservedAnalyses {
    cfg: bool,
    dom_tree: bool,
}

impl PreservedAnalyses {
    pub fn all() -> Self {
        PreservedAnalyses { cfg: true, dom_tree: true }
    }

    pub fn none() -> Self {
        PreservedAnalyses { cfg: false, dom_tree: false }
    }

    pub fn preserves_cfg(&self) -> bool {
        self.cfg
    }

    pub fn preserves_dom_tree(&self) -> bool {
        self.dom_tree
    }

    pub fn is_all(&self) -> bool {
        self.cfg && self.dom_tree
    }
}

#[derive(Debug, Default)]
pub struct AnalysisManager {
    cfgs: HashMap<String, Cfg>,
    dom_trees: HashMap<String, DomTree>,
    /// Number of analyses built rather than served from the cache.
    computed: usize,
}

impl AnalysisManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cfg(&mut self, f: &Function) -> &Cfg {
        let computed = &mut self.computed;
        self.cfgs.entry(f.name.clone()).or_insert_with(|| {
            *computed += 1;
            Cfg::build(f)
        })
    }

    pub fn dom_tree(&mut self, f: &Function) -> &DomTree {
        if !self.dom_trees.contains_key(&f.name) {
            let dom = DomTree::build(self.cfg(f));
            self.computed += 1;
            self.dom_trees.insert(f.name.clone(), dom);
        }
        &self.dom_trees[&f.name]
    }

    pub fn invalidate(&mut self, function: &str, preserved: PreservedAnalyses) {
        if !preserved.preserves_cfg() {
            self.cfgs.remove(function);
        }
        if !preserved.preserves_dom_tree() || !preserved.preserves_cfg() {
            self.dom_trees.remove(function);
        }
    }

    pub fn computed(&self) -> usize {
        self.computed
    }
}
