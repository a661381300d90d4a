pub mod span;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod visit;
pub mod sema;
pub mod builtins;
pub mod il;
pub mod lower;
pub mod transform;
pub mod vm;
pub mod runtime;
pub mod config;

use diagnostics::{CompileError, Diagnostic, DiagnosticEmitter};
use il::Module;
use lower::LowerOptions;
use parser::ast::Program;
use thiserror::Error;
use transform::{OptLevel, PassManager};
use vm::{DebugOptions, RunOutcome, VmError};

/// Knobs for turning BASIC source into IL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub opt: OptLevel,
    /// Re-verify after every optimization pass.
    pub verify_each: bool,
    pub lower: LowerOptions,
}

impl CompileOptions {
    pub fn from_config(config: &config::Config) -> Self {
        CompileOptions {
            opt: config.build.optimize,
            verify_each: config.build.verify_each,
            lower: config.lower_options(),
        }
    }
}

/// A verified module plus the warnings analysis produced.
#[derive(Debug)]
pub struct Compiled {
    pub module: Module,
    pub warnings: Vec<Diagnostic>,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Vm(#[from] VmError),
}

/// Lex, parse and analyze. Fails with every semantic error at once; warnings
/// come back alongside the analyzed program.
pub fn check_basic(source: &str) -> Result<(Program, Vec<Diagnostic>), CompileError> {
    let tokens = lexer::lex(source)?;
    tracing::debug!(target: "ilc::front", tokens = tokens.len(), "lexed");
    let mut program = parser::Parser::new(&tokens, source).parse_program()?;
    tracing::debug!(target: "ilc::front", statements = program.main.len(), procs = program.procs.len(), "parsed");
    let mut de = DiagnosticEmitter::new();
    sema::analyze(&mut program, &mut de);
    if de.error_count() > 0 {
        return Err(CompileError::Semantic { diagnostics: de.into_sorted() });
    }
    Ok((program, de.into_sorted()))
}

/// BASIC source to a verified, optimized IL module.
pub fn compile_basic(source: &str, opts: &CompileOptions) -> Result<Compiled, CompileError> {
    let (program, warnings) = check_basic(source)?;
    let mut module = lower::lower_program(&program, source, &opts.lower)?;
    tracing::debug!(
        target: "ilc::front",
        functions = module.functions.len(),
        externs = module.externs.len(),
        "lowered"
    );
    il::verify_module(&module)?;
    optimize(&mut module, opts.opt, opts.verify_each)?;
    Ok(Compiled { module, warnings })
}

/// Compile and run `source`, returning what `@main` returned.
pub fn run_basic(source: &str, opts: &CompileOptions, debug: DebugOptions) -> Result<RunOutcome, RunError> {
    let compiled = compile_basic(source, opts)?;
    Ok(vm::run_module(&compiled.module, debug)?)
}

/// Run the pipeline of `level` over `module`.
pub fn optimize(module: &mut Module, level: OptLevel, verify_each: bool) -> Result<(), CompileError> {
    transform::optimize(module, level, verify_each)
}

/// Run an explicit pass list such as `["simplify-cfg", "dce"]`. Level
/// aliases like `O1` expand to their pipelines.
pub fn optimize_with<S: AsRef<str>>(module: &mut Module, passes: &[S], verify_each: bool) -> Result<(), CompileError> {
    PassManager::from_names(passes)?.verify_each(verify_each).run(module)
}

/// Parse IL text and verify it.
pub fn parse_il(text: &str) -> Result<Module, CompileError> {
    let module = il::parse_module(text)?;
    il::verify_module(&module)?;
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_then_print_reparses() {
        let compiled = compile_basic("PRINT 1 + 2\n", &CompileOptions::default()).unwrap();
        let text = il::print_module(&compiled.module);
        let again = parse_il(&text).unwrap();
        assert_eq!(il::print_module(&again), text);
    }

    #[test]
    fn semantic_errors_are_all_reported() {
        let err = compile_basic("X = Y$\nPRINT Z$ + 1\n", &CompileOptions::default()).unwrap_err();
        match err {
            CompileError::Semantic { diagnostics } => assert!(diagnostics.len() >= 2, "{diagnostics:?}"),
            other => panic!("unexpected {other}"),
        }
    }
}
