//! Semantic analysis for BASIC programs.
//!
//! The analyzer runs in two passes over procedures: every signature is
//! registered first so bodies may call procedures declared later, then each
//! body is checked in a fresh symbol state seeded with its parameters. The
//! main program is checked last.
//!
//! Besides reporting diagnostics the analyzer rewrites the tree in place:
//! `DIM`-declared locals are renamed to `name_<n>` so that later stages
//! never confuse a shadowing declaration with the outer one, and references
//! are rewritten to the renamed symbol.

pub mod classes;
mod expr;
pub mod returns;
pub mod scope;
mod stmt;

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::diagnostics::DiagnosticEmitter;
use crate::parser::ast::{ExitKind, Proc, ProcKind, Program, Stmt, TypeName};
use crate::span::Spanned;
use crate::visit::{Visitor, walk_stmt};

pub use classes::{ClassIndex, ClassInfo};
use scope::ScopeStack;

/// Coarse expression type used during analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemType {
    Int,
    Float,
    String,
    Unknown,
}

impl SemType {
    pub fn of(ty: &TypeName) -> SemType {
        match ty {
            TypeName::Int => SemType::Int,
            TypeName::Float => SemType::Float,
            TypeName::Str => SemType::String,
            TypeName::Class(_) => SemType::Unknown,
        }
    }

    pub fn from_suffix(name: &str) -> SemType {
        SemType::of(&TypeName::from_suffix(name))
    }

    pub fn is_numeric_or_unknown(self) -> bool {
        matches!(self, SemType::Int | SemType::Float | SemType::Unknown)
    }

    pub fn is_int_or_unknown(self) -> bool {
        matches!(self, SemType::Int | SemType::Unknown)
    }

    pub fn is_string_or_unknown(self) -> bool {
        matches!(self, SemType::String | SemType::Unknown)
    }

    /// Whether a value of type `value` may be stored into a slot of `self`.
    /// Integers widen to floats; nothing narrows.
    pub fn accepts(self, value: SemType) -> bool {
        match (self, value) {
            (_, SemType::Unknown) | (SemType::Unknown, _) => true,
            (SemType::Float, SemType::Int) => true,
            (a, b) => a == b,
        }
    }
}

impl std::fmt::Display for SemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemType::Int => write!(f, "integer"),
            SemType::Float => write!(f, "float"),
            SemType::String => write!(f, "string"),
            SemType::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSig {
    pub name: String,
    pub ty: TypeName,
    pub is_array: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcSignature {
    pub kind: ProcKind,
    pub ret: Option<TypeName>,
    pub params: Vec<ParamSig>,
}

impl ProcSignature {
    pub fn of(proc: &Proc) -> Self {
        ProcSignature {
            kind: proc.kind,
            ret: proc.ret.clone(),
            params: proc
                .params
                .iter()
                .map(|p| ParamSig { name: p.name.node.clone(), ty: p.ty.clone(), is_array: p.is_array })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ArrayInfo {
    pub elem: SemType,
    /// Constant upper bound, when the DIM size was a literal.
    pub upper: Option<i64>,
}

/// What the body being analyzed is.
#[derive(Debug, Clone)]
pub(crate) struct BodyContext {
    pub kind: Option<ProcKind>,
    pub name: String,
    pub ret: Option<SemType>,
    /// Enclosing class for methods; enables `ME`.
    pub class: Option<String>,
}

/// Per-body symbol state; saved and restored around each procedure.
#[derive(Debug, Default)]
pub(crate) struct BodyState {
    pub scopes: ScopeStack,
    pub symbols: BTreeSet<String>,
    pub var_types: HashMap<String, SemType>,
    pub arrays: HashMap<String, ArrayInfo>,
    /// Variables holding objects, mapped to their class.
    pub objects: HashMap<String, String>,
    pub labels: HashSet<i64>,
    pub for_stack: Vec<String>,
    pub loops: Vec<ExitKind>,
}

pub struct SemanticAnalyzer<'d> {
    de: &'d mut DiagnosticEmitter,
    procs: HashMap<String, ProcSignature>,
    classes: ClassIndex,
    body: BodyState,
    ctx: BodyContext,
    next_local_id: usize,
}

/// Analyze `program`, reporting through `de` and renaming locals in place.
pub fn analyze(program: &mut Program, de: &mut DiagnosticEmitter) {
    let before = de.error_count();
    SemanticAnalyzer::new(de).run(program);
    tracing::debug!(
        target: "ilc::sema",
        procs = program.procs.len(),
        classes = program.classes.len(),
        errors = de.error_count() - before,
        "semantic analysis finished"
    );
}

/// Collects numeric line labels anywhere inside a body.
struct LabelCollector {
    labels: HashSet<i64>,
}

impl Visitor for LabelCollector {
    fn visit_stmt(&mut self, stmt: &Spanned<Stmt>) {
        if let Stmt::Label(n) = stmt.node {
            self.labels.insert(n);
        }
        walk_stmt(self, stmt);
    }
}

fn collect_labels(body: &[Spanned<Stmt>]) -> HashSet<i64> {
    let mut c = LabelCollector { labels: HashSet::new() };
    c.visit_body(body);
    c.labels
}

impl<'d> SemanticAnalyzer<'d> {
    pub fn new(de: &'d mut DiagnosticEmitter) -> Self {
        SemanticAnalyzer {
            de,
            procs: HashMap::new(),
            classes: ClassIndex::default(),
            body: BodyState::default(),
            ctx: BodyContext { kind: None, name: String::new(), ret: None, class: None },
            next_local_id: 0,
        }
    }

    pub fn run(mut self, program: &mut Program) {
        self.classes = ClassIndex::build(program, self.de);

        // Pass 1: register every procedure signature
        for proc in &program.procs {
            self.register_proc(&proc.node);
        }

        // Pass 2: procedure bodies
        for proc in &mut program.procs {
            self.analyze_proc(&mut proc.node, None);
        }

        // Pass 3: class members
        for class in &mut program.classes {
            let name = class.node.name.node.clone();
            let c = &mut class.node;
            for proc in c.ctor.iter_mut().chain(c.dtor.iter_mut()).chain(c.methods.iter_mut()) {
                self.analyze_proc(&mut proc.node, Some(name.clone()));
            }
        }

        // Pass 4: main program
        self.body.labels = collect_labels(&program.main);
        self.body.scopes.push();
        self.ctx = BodyContext { kind: None, name: "main".into(), ret: None, class: None };
        for stmt in &mut program.main {
            self.stmt(stmt);
        }
        self.body.scopes.pop();
    }

    fn register_proc(&mut self, proc: &Proc) {
        let name = &proc.name;
        if self.procs.contains_key(&name.node) {
            self.de.error("B1004", name.span, format!("duplicate procedure '{}'", name.node));
            return;
        }
        let mut seen = HashSet::new();
        for p in &proc.params {
            if !seen.insert(p.name.node.as_str()) {
                self.de.error("B1005", p.name.span, format!("duplicate parameter '{}'", p.name.node));
            }
            if p.is_array && !matches!(p.ty, TypeName::Int | TypeName::Str) {
                self.de.error("B2004", p.name.span, "array parameter must be i64 or str");
            }
        }
        self.procs.insert(name.node.clone(), ProcSignature::of(proc));
    }

    fn analyze_proc(&mut self, proc: &mut Proc, class: Option<String>) {
        let saved_body = std::mem::take(&mut self.body);
        let saved_ctx = std::mem::replace(
            &mut self.ctx,
            BodyContext {
                kind: Some(proc.kind),
                name: proc.name.node.clone(),
                ret: proc.ret.as_ref().map(SemType::of),
                class,
            },
        );

        self.body.labels = collect_labels(&proc.body);
        self.body.scopes.push();
        for p in &proc.params {
            let name = &p.name.node;
            self.body.scopes.bind(name, name);
            self.body.symbols.insert(name.clone());
            self.body.var_types.insert(name.clone(), SemType::of(&p.ty));
            if p.is_array {
                self.body.arrays.insert(name.clone(), ArrayInfo { elem: SemType::of(&p.ty), upper: None });
            }
            if let TypeName::Class(c) = &p.ty {
                self.check_class_exists(c, p.name.span);
                self.body.objects.insert(name.clone(), c.clone());
            }
        }
        for stmt in &mut proc.body {
            self.stmt(stmt);
        }
        self.body.scopes.pop();

        self.body = saved_body;
        self.ctx = saved_ctx;

        if proc.kind == ProcKind::Function && !returns::must_return(&proc.body) {
            let span = proc.end_span.unwrap_or(proc.name.span);
            self.de.error("B1007", span, format!("missing return in FUNCTION {}", proc.name.node));
        }
    }

    fn check_class_exists(&mut self, class: &str, span: crate::span::Span) -> bool {
        if self.classes.contains(class) {
            return true;
        }
        self.de.error("B1001", span, format!("unknown class '{class}'"));
        false
    }

    /// Declare a fresh local in the innermost scope and return its unique name.
    fn declare_local(&mut self, name: &str) -> String {
        let unique = format!("{name}_{}", self.next_local_id);
        self.next_local_id += 1;
        self.body.scopes.bind(name, &unique);
        self.body.symbols.insert(unique.clone());
        unique
    }

    fn resolve(&self, name: &str) -> String {
        self.body.scopes.resolve(name).unwrap_or(name).to_string()
    }

    fn in_nested_scope(&mut self, f: impl FnOnce(&mut Self)) {
        self.body.scopes.push();
        f(self);
        self.body.scopes.pop();
    }
}
