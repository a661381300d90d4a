//! IL optimizer: function passes, the registry that names them, and the
//! manager that runs a pipeline over a module.
//!
//! Pipelines:
//!
//! | level | passes |
//! |-------|--------|
//! | `O0`  | none |
//! | `O1`  | `mem2reg`, `simplify-cfg`, `const-fold`, `dce` |
//! | `O2`  | `O1`, then `sibling-recursion`, `simplify-cfg`, `dce` |

pub mod analysis;
pub mod const_fold;
pub mod dce;
pub mod mem2reg;
pub mod sibling_recursion;
pub mod simplify_cfg;

use std::fmt;
use std::str::FromStr;

use crate::diagnostics::CompileError;
use crate::il::{Function, Module, verify_module};

pub use analysis::{AnalysisManager, PreservedAnalyses};

/// A transformation over one function at a time.
pub trait FunctionPass {
    fn name(&self) -> &'static str;

    /// Rewrite `f` in place and report which analyses are still valid.
    fn run(&mut self, f: &mut Function, am: &mut AnalysisManager) -> PreservedAnalyses;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum OptLevel {
    #[default]
    O0,
    O1,
    O2,
}

impl OptLevel {
    pub fn pipeline(self) -> &'static [&'static str] {
        match self {
            OptLevel::O0 => &[],
            OptLevel::O1 => &["mem2reg", "simplify-cfg", "const-fold", "dce"],
            OptLevel::O2 => &[
                "mem2reg",
                "simplify-cfg",
                "const-fold",
                "dce",
                "sibling-recursion",
                "simplify-cfg",
                "dce",
            ],
        }
    }
}

impl FromStr for OptLevel {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('-') {
            "O0" | "0" => Ok(OptLevel::O0),
            "O1" | "1" => Ok(OptLevel::O1),
            "O2" | "2" => Ok(OptLevel::O2),
            other => Err(CompileError::pass(format!("unknown optimization level '{other}'"))),
        }
    }
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OptLevel::O0 => "O0",
            OptLevel::O1 => "O1",
            OptLevel::O2 => "O2",
        };
        f.write_str(s)
    }
}

type PassFactory = fn() -> Box<dyn FunctionPass>;

/// Pass names and how to build each pass.
pub struct PassRegistry {
    factories: Vec<(&'static str, PassFactory)>,
}

impl Default for PassRegistry {
    fn default() -> Self {
        let mut reg = PassRegistry { factories: Vec::new() };
        reg.register("mem2reg", || Box::new(mem2reg::Mem2Reg));
        reg.register("simplify-cfg", || Box::new(simplify_cfg::SimplifyCfg));
        reg.register("const-fold", || Box::new(const_fold::ConstFold));
        reg.register("dce", || Box::new(dce::Dce));
        reg.register("sibling-recursion", || Box::new(sibling_recursion::SiblingRecursion));
        reg
    }
}

impl PassRegistry {
    pub fn register(&mut self, name: &'static str, factory: PassFactory) {
        if let Some(slot) = self.factories.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = factory;
        } else {
            self.factories.push((name, factory));
        }
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn FunctionPass>> {
        self.factories.iter().find(|(n, _)| *n == name).map(|(_, make)| make())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.iter().map(|(n, _)| *n)
    }
}

/// Runs passes in order over every function of a module.
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn FunctionPass>>,
    verify_each: bool,
    analyses: AnalysisManager,
}

impl PassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_level(level: OptLevel) -> Self {
        // Pipeline names all come from the default registry.
        Self::from_names(level.pipeline()).unwrap_or_default()
    }

    /// Build a pipeline from pass names or `O0`/`O1`/`O2` aliases.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, CompileError> {
        let registry = PassRegistry::default();
        let mut pm = PassManager::new();
        for name in names {
            let name = name.as_ref().trim();
            if let Ok(level) = name.parse::<OptLevel>() {
                for n in level.pipeline() {
                    pm.add_named(&registry, n)?;
                }
            } else {
                pm.add_named(&registry, name)?;
            }
        }
        Ok(pm)
    }

    fn add_named(&mut self, registry: &PassRegistry, name: &str) -> Result<(), CompileError> {
        let pass = registry.create(name).ok_or_else(|| {
            let known: Vec<&str> = registry.names().collect();
            CompileError::pass(format!("unknown pass '{name}' (known: {})", known.join(", ")))
        })?;
        self.passes.push(pass);
        Ok(())
    }

    pub fn add(&mut self, pass: Box<dyn FunctionPass>) -> &mut Self {
        self.passes.push(pass);
        self
    }

    pub fn verify_each(mut self, on: bool) -> Self {
        self.verify_each = on;
        self
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn analyses(&self) -> &AnalysisManager {
        &self.analyses
    }

    pub fn run(&mut self, module: &mut Module) -> Result<(), CompileError> {
        for pass in &mut self.passes {
            let name = pass.name();
            for f in &mut module.functions {
                let before = f.instr_count();
                let preserved = pass.run(f, &mut self.analyses);
                self.analyses.invalidate(&f.name, preserved);
                tracing::trace!(
                    target: "ilc::opt",
                    pass = name,
                    function = %f.name,
                    before,
                    after = f.instr_count(),
                    "pass ran"
                );
            }
            if self.verify_each {
                verify_module(module).map_err(|e| CompileError::pass(format!("module broken after {name}: {e}")))?;
            }
            tracing::debug!(target: "ilc::opt", pass = name, "pass finished");
        }
        Ok(())
    }
}

/// Run the pipeline for `level` over `module`.
pub fn optimize(module: &mut Module, level: OptLevel, verify_each: bool) -> Result<(), CompileError> {
    let mut pm = PassManager::for_level(level).verify_each(verify_each);
    tracing::info!(target: "ilc::opt", %level, passes = pm.passes.len(), "optimizing");
    pm.run(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::parse_module;

    #[test]
    fn levels_expand_to_pipelines() {
        assert!(PassManager::for_level(OptLevel::O0).pass_names().is_empty());
        assert_eq!(
            PassManager::for_level(OptLevel::O1).pass_names(),
            vec!["mem2reg", "simplify-cfg", "const-fold", "dce"]
        );
        assert_eq!(PassManager::for_level(OptLevel::O2).pass_names().len(), 7);
        let pm = PassManager::from_names(&["-O1", "sibling-recursion"]).unwrap();
        assert_eq!(pm.pass_names().last(), Some(&"sibling-recursion"));
    }

    #[test]
    fn unknown_pass_is_an_error() {
        let err = PassManager::from_names(&["licm"]).err().unwrap();
        assert!(err.to_string().contains("unknown pass 'licm'"));
    }

    #[test]
    fn o2_cleans_up_a_constant_branch() {
        let src = "il 0.1
func @main() -> i64 {
entry:
  %t0 = scmp_lt 1, 2
  cbr %t0, yes, no
yes:
  %t1 = add 40, 2
  ret %t1
no:
  ret 0
}
";
        let mut m = parse_module(src).unwrap();
        PassManager::for_level(OptLevel::O2).verify_each(true).run(&mut m).unwrap();
        let f = &m.functions[0];
        assert_eq!(f.blocks.len(), 1);
        assert_eq!(f.instr_count(), 1);
        assert_eq!(f.blocks[0].instrs[0].operands, vec![crate::il::Value::ConstInt(42)]);
    }
}
