//! Lowering of an analyzed [`Program`] to an IL [`Module`].
//!
//! Every procedure becomes one function: `@main` for the main program,
//! the procedure name for FUNCTION/SUB and `@Class.method` for methods,
//! constructors (`NEW`) and destructors (`DESTROY`), which take the object
//! as a leading `ptr` parameter.
//!
//! Variables live in `alloca` slots allocated in the entry block on first
//! use. Scalar parameters are copied into slots; `BYREF` scalars and array
//! parameters receive a pointer to the caller's slot and use it directly.
//! Control flow is built from blocks with fresh labels and values cross
//! joins as block arguments.
//!
//! Lowering assumes the program passed semantic analysis: DIM'd locals are
//! already renamed and every name resolves.

mod expr;
mod stmt;
mod vars;

use std::collections::HashMap;

use crate::diagnostics::{CompileError, DiagnosticEmitter};
use crate::il::{Function, FunctionBuilder, Instr, Module, Opcode, TempId, Type, Value};
use crate::parser::ast::{ExitKind, Proc, ProcKind, Program, Stmt, TypeName};
use crate::sema::ClassIndex;
use crate::span::{LineIndex, Span, Spanned};
use crate::visit::Visitor;

use vars::VarCollector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowerOptions {
    /// Emit explicit index checks before array accesses.
    pub bounds_checks: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        LowerOptions { bounds_checks: true }
    }
}

/// Element flavor of an array variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Elem {
    I64,
    F64,
    Str,
}

impl Elem {
    fn prefix(self) -> &'static str {
        match self {
            Elem::I64 => "rt_arr_i64",
            Elem::F64 => "rt_arr_f64",
            Elem::Str => "rt_arr_str",
        }
    }

    fn ty(self) -> Ty {
        match self {
            Elem::I64 => Ty::Int,
            Elem::F64 => Ty::Float,
            Elem::Str => Ty::Str,
        }
    }
}

/// What a variable slot holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum VarKind {
    Int,
    Float,
    Str,
    Obj(Option<String>),
    Array(Elem),
}

impl VarKind {
    pub fn of(ty: &TypeName) -> VarKind {
        match ty {
            TypeName::Int => VarKind::Int,
            TypeName::Float => VarKind::Float,
            TypeName::Str => VarKind::Str,
            TypeName::Class(c) => VarKind::Obj(Some(c.clone())),
        }
    }

    pub fn array_of(ty: &TypeName) -> VarKind {
        VarKind::Array(match ty {
            TypeName::Float => Elem::F64,
            TypeName::Str => Elem::Str,
            _ => Elem::I64,
        })
    }

    fn slot_type(&self) -> Type {
        match self {
            VarKind::Int => Type::I64,
            VarKind::Float => Type::F64,
            VarKind::Str => Type::Str,
            VarKind::Obj(_) | VarKind::Array(_) => Type::Ptr,
        }
    }

    fn value_ty(&self) -> Ty {
        match self {
            VarKind::Int => Ty::Int,
            VarKind::Float => Ty::Float,
            VarKind::Str => Ty::Str,
            VarKind::Obj(c) => Ty::Obj(c.clone()),
            VarKind::Array(_) => Ty::Obj(None),
        }
    }
}

/// Static type of a lowered expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Ty {
    Int,
    Float,
    Str,
    /// Comparison result (`i1`); becomes -1/0 when used as a number.
    Bool,
    Obj(Option<String>),
    Void,
}

impl Ty {
    fn of(ty: &TypeName) -> Ty {
        VarKind::of(ty).value_ty()
    }

    fn from_il(ty: Type) -> Ty {
        match ty {
            Type::I1 => Ty::Bool,
            Type::I32 | Type::I64 => Ty::Int,
            Type::F64 => Ty::Float,
            Type::Str => Ty::Str,
            Type::Ptr => Ty::Obj(None),
            Type::Void => Ty::Void,
        }
    }
}

fn il_type(ty: &TypeName) -> Type {
    VarKind::of(ty).slot_type()
}

#[derive(Debug, Clone)]
pub(crate) struct ParamInfo {
    pub ty: TypeName,
    pub is_array: bool,
    pub by_ref: bool,
}

impl ParamInfo {
    /// Passed as a pointer to the caller's slot.
    fn by_slot(&self) -> bool {
        self.is_array || self.by_ref
    }

    fn il_type(&self) -> Type {
        if self.by_slot() { Type::Ptr } else { il_type(&self.ty) }
    }
}

/// Callable signature as the lowerer needs it.
#[derive(Debug, Clone)]
pub(crate) struct ProcInfo {
    pub ir_name: String,
    pub params: Vec<ParamInfo>,
    pub ret: Option<TypeName>,
}

impl ProcInfo {
    fn of(proc: &Proc, ir_name: String) -> Self {
        ProcInfo {
            ir_name,
            params: proc
                .params
                .iter()
                .map(|p| ParamInfo { ty: p.ty.clone(), is_array: p.is_array, by_ref: p.by_ref })
                .collect(),
            ret: proc.ret.clone(),
        }
    }

    fn ret_type(&self) -> Type {
        self.ret.as_ref().map(il_type).unwrap_or(Type::Void)
    }
}

/// Module-wide facts shared by every function being lowered.
struct Globals {
    procs: HashMap<String, ProcInfo>,
    /// Methods by class, then by method name.
    methods: HashMap<String, HashMap<String, ProcInfo>>,
    classes: ClassIndex,
    lines: LineIndex,
    opts: LowerOptions,
}

pub fn method_name(class: &str, method: &str) -> String {
    format!("{class}.{method}")
}

/// Lower `program` (already analyzed) into a module.
pub fn lower_program(program: &Program, source: &str, opts: &LowerOptions) -> Result<Module, CompileError> {
    let mut scratch = DiagnosticEmitter::new();
    let classes = ClassIndex::build(program, &mut scratch);

    let procs: HashMap<String, ProcInfo> = program
        .procs
        .iter()
        .map(|p| (p.node.name.node.clone(), ProcInfo::of(&p.node, p.node.name.node.clone())))
        .collect();
    let mut methods: HashMap<String, HashMap<String, ProcInfo>> = HashMap::new();
    for class in &program.classes {
        let c = &class.node;
        let table = methods.entry(c.name.node.clone()).or_default();
        for m in c.ctor.iter().chain(c.dtor.iter()).chain(c.methods.iter()) {
            let name = m.node.name.node.clone();
            table.insert(name.clone(), ProcInfo::of(&m.node, method_name(&c.name.node, &name)));
        }
    }
    let globals = Globals { procs, methods, classes, lines: LineIndex::new(source), opts: *opts };

    let mut module = Module::default();
    let main = lower_body(&globals, &mut module, BodyKind::Main, None, "main", &[], &program.main)?;
    module.functions.push(main);
    for proc in &program.procs {
        let info = &globals.procs[&proc.node.name.node];
        let f = lower_proc(&globals, &mut module, &proc.node, info, None)?;
        module.functions.push(f);
    }
    for class in &program.classes {
        let c = &class.node;
        for m in c.ctor.iter().chain(c.dtor.iter()).chain(c.methods.iter()) {
            let info = &globals.methods[&c.name.node][&m.node.name.node];
            let f = lower_proc(&globals, &mut module, &m.node, info, Some(&c.name.node))?;
            module.functions.push(f);
        }
    }
    tracing::debug!(
        target: "ilc::lower",
        functions = module.functions.len(),
        externs = module.externs.len(),
        strings = module.globals.len(),
        "lowered program"
    );
    Ok(module)
}

fn lower_proc(
    g: &Globals,
    module: &mut Module,
    proc: &Proc,
    info: &ProcInfo,
    class: Option<&str>,
) -> Result<Function, CompileError> {
    let kind = match proc.kind {
        ProcKind::Function => BodyKind::Function(info.ret_type()),
        ProcKind::Sub => BodyKind::Sub,
    };
    let params: Vec<(String, ParamInfo)> =
        proc.params.iter().zip(&info.params).map(|(p, i)| (p.name.node.clone(), i.clone())).collect();
    lower_body(g, module, kind, class, &info.ir_name, &params, &proc.body)
}

/// What kind of body a function was lowered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Main,
    Sub,
    Function(Type),
}

impl BodyKind {
    fn ret_type(self) -> Type {
        match self {
            BodyKind::Main => Type::I64,
            BodyKind::Sub => Type::Void,
            BodyKind::Function(t) => t,
        }
    }
}

/// How a prologue slot starts out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotInit {
    Zero,
    NewList,
}

struct PendingSlot {
    id: TempId,
    ty: Type,
    init: SlotInit,
}

#[derive(Debug, Clone)]
struct Slot {
    ptr: Value,
    kind: VarKind,
}

/// Names safe to print as IL temps: never of the `t<digits>` form
/// reserved for anonymous temps.
fn temp_name(name: &str) -> String {
    let numbered = name.len() > 1 && name.starts_with('t') && name[1..].bytes().all(|b| b.is_ascii_digit());
    if numbered { format!("{name}.v") } else { name.to_string() }
}

fn lower_body(
    g: &Globals,
    module: &mut Module,
    kind: BodyKind,
    class: Option<&str>,
    name: &str,
    params: &[(String, ParamInfo)],
    body: &[Spanned<Stmt>],
) -> Result<Function, CompileError> {
    let mut func = Function::new(name, kind.ret_type());
    let mut collector = VarCollector::new(&g.procs, &g.classes, class);
    for (pname, p) in params {
        let k = if p.is_array { VarKind::array_of(&p.ty) } else { VarKind::of(&p.ty) };
        collector.kinds.insert(pname.clone(), k);
    }
    collector.visit_body(body);
    let VarCollector { kinds, written, .. } = collector;

    let (pending, gosub_switches, gosub_sites) = {
        let mut cx = LowerContext::new(g, module, &mut func, kind, kinds);
        if let Some(c) = class {
            let me = cx.b.param("ME", Type::Ptr);
            cx.me = Some((me, c.to_string()));
        }
        for (pname, p) in params {
            let v = cx.b.param(&temp_name(pname), p.il_type());
            let k = cx.kind_of(pname);
            if p.by_slot() {
                cx.vars.insert(pname.clone(), Slot { ptr: v, kind: k });
            } else if !written.contains(pname) {
                cx.direct.insert(pname.clone(), (v, k));
            } else {
                let slot = cx.slot(pname);
                cx.b.store(k.slot_type(), slot.ptr, v);
            }
        }
        cx.lower_stmts(body)?;
        cx.finish()
    };
    patch_gosub_returns(&mut func, &gosub_switches, &gosub_sites);
    insert_prologue(module, &mut func, &pending);
    Ok(func)
}

/// Allocate and initialize every slot at the top of the entry block.
fn insert_prologue(module: &mut Module, func: &mut Function, pending: &[PendingSlot]) {
    let mut prologue = Vec::new();
    for slot in pending {
        let mut alloca = Instr::new(Opcode::Alloca, Type::Ptr, vec![Value::ConstInt(8)]);
        alloca.result = Some(slot.id);
        prologue.push(alloca);
        let init = match (slot.init, slot.ty) {
            (SlotInit::NewList, _) => {
                let id = func.new_temp();
                let mut call = Instr::new(Opcode::Call, Type::Ptr, Vec::new());
                call.callee = Some("rt_list_i64_new".to_string());
                call.result = Some(id);
                prologue.push(call);
                Value::Temp(id)
            }
            (SlotInit::Zero, Type::Str) => {
                let id = func.new_temp();
                let global = module.intern_str("");
                let mut s = Instr::new(Opcode::ConstStr, Type::Str, vec![Value::Global(global)]);
                s.result = Some(id);
                prologue.push(s);
                Value::Temp(id)
            }
            (SlotInit::Zero, ty) => zero_value(ty).unwrap_or(Value::Null),
        };
        prologue.push(Instr::new(Opcode::Store, slot.ty, vec![Value::Temp(slot.id), init]));
    }
    if let Some(entry) = func.blocks.first_mut() {
        entry.instrs.splice(0..0, prologue);
    }
}

fn patch_gosub_returns(func: &mut Function, switches: &[String], sites: &[(i64, String)]) {
    for label in switches {
        let Some(block) = func.blocks.iter_mut().find(|b| &b.label == label) else { continue };
        let Some(term) = block.terminator_mut() else { continue };
        for (id, site) in sites {
            term.operands.push(Value::ConstInt(*id));
            term.labels.push(site.clone());
            term.br_args.push(Vec::new());
        }
    }
}

/// Zero constant of a non-string type; `None` for `void`.
fn zero_value(ty: Type) -> Option<Value> {
    match ty {
        Type::Void => None,
        Type::F64 => Some(Value::ConstFloat(0.0)),
        Type::Ptr | Type::Str => Some(Value::Null),
        Type::I1 | Type::I32 | Type::I64 => Some(Value::ConstInt(0)),
    }
}

/// Per-function lowering state.
struct LowerContext<'a> {
    g: &'a Globals,
    module: &'a mut Module,
    b: FunctionBuilder<'a>,
    kind: BodyKind,
    kinds: HashMap<String, VarKind>,
    vars: HashMap<String, Slot>,
    /// Parameters the body never writes, read straight from the argument.
    direct: HashMap<String, (Value, VarKind)>,
    pending: Vec<PendingSlot>,
    labels: HashMap<i64, String>,
    /// Open loops, innermost last: kind and exit label.
    loops: Vec<(ExitKind, String)>,
    me: Option<(Value, String)>,
    gosub_stack: Option<Value>,
    /// Continuation blocks of GOSUB sites, by return id.
    gosub_sites: Vec<(i64, String)>,
    /// Blocks ending in a RETURN dispatch whose cases are filled in last.
    gosub_switches: Vec<String>,
    no_gosub: Option<String>,
}

impl<'a> LowerContext<'a> {
    fn new(
        g: &'a Globals,
        module: &'a mut Module,
        func: &'a mut Function,
        kind: BodyKind,
        kinds: HashMap<String, VarKind>,
    ) -> Self {
        LowerContext {
            g,
            module,
            b: FunctionBuilder::new(func),
            kind,
            kinds,
            vars: HashMap::new(),
            direct: HashMap::new(),
            pending: Vec::new(),
            labels: HashMap::new(),
            loops: Vec::new(),
            me: None,
            gosub_stack: None,
            gosub_sites: Vec::new(),
            gosub_switches: Vec::new(),
            no_gosub: None,
        }
    }

    /// Terminate every open block and hand back what the prologue needs.
    #[allow(clippy::type_complexity)]
    fn finish(mut self) -> (Vec<PendingSlot>, Vec<String>, Vec<(i64, String)>) {
        let open: Vec<String> = self
            .b
            .func()
            .blocks
            .iter()
            .filter(|b| !b.terminated)
            .map(|b| b.label.clone())
            .collect();
        for label in open {
            self.b.switch_to(&label);
            self.emit_default_return();
        }
        (self.pending, self.gosub_switches, self.gosub_sites)
    }

    fn emit_default_return(&mut self) {
        let ret = self.kind.ret_type();
        if ret == Type::Str {
            let v = self.const_string("");
            self.b.ret(Some(v));
        } else {
            self.b.ret(zero_value(ret));
        }
    }

    fn loc(&mut self, span: Span) {
        let line = self.g.lines.line(span.start);
        self.b.set_loc(line as u32);
    }

    fn kind_of(&self, name: &str) -> VarKind {
        self.kinds.get(name).cloned().unwrap_or_else(|| VarKind::of(&TypeName::from_suffix(name)))
    }

    /// Slot of `name`, allocating it on first use.
    fn slot(&mut self, name: &str) -> Slot {
        if let Some(s) = self.vars.get(name) {
            return s.clone();
        }
        let kind = self.kind_of(name);
        let ty = kind.slot_type();
        let id = self.b.named_temp(&format!("{name}.addr"));
        self.pending.push(PendingSlot { id, ty, init: SlotInit::Zero });
        let slot = Slot { ptr: Value::Temp(id), kind };
        self.vars.insert(name.to_string(), slot.clone());
        slot
    }

    /// An unnamed slot for a temporary passed by reference.
    fn scratch_slot(&mut self, ty: Type) -> Value {
        let id = self.b.temp();
        self.pending.push(PendingSlot { id, ty, init: SlotInit::Zero });
        Value::Temp(id)
    }

    fn gosub_stack(&mut self) -> Value {
        if let Some(v) = &self.gosub_stack {
            return v.clone();
        }
        self.module.ensure_extern("rt_list_i64_new");
        let id = self.b.named_temp("gosub.stack");
        self.pending.push(PendingSlot { id, ty: Type::Ptr, init: SlotInit::NewList });
        let v = Value::Temp(id);
        self.gosub_stack = Some(v.clone());
        v
    }

    fn label_block(&mut self, n: i64) -> String {
        if let Some(l) = self.labels.get(&n) {
            return l.clone();
        }
        let label = self.b.create_block(&format!("L{n}"));
        self.labels.insert(n, label.clone());
        label
    }

    fn const_string(&mut self, text: &str) -> Value {
        let global = self.module.intern_str(text);
        self.b.const_str(&global)
    }

    /// Call a runtime helper, declaring it on first use.
    fn rt(&mut self, name: &str, args: Vec<Value>) -> Result<Option<Value>, CompileError> {
        let ret = match self.module.ensure_extern(name) {
            Some(e) => e.ret,
            None => return Err(CompileError::lower(format!("unknown runtime helper @{name}"), Span::dummy())),
        };
        Ok(self.b.call(name, ret, args))
    }

    /// Call a runtime helper that returns a value.
    fn rt_value(&mut self, name: &str, args: Vec<Value>) -> Result<Value, CompileError> {
        self.rt(name, args)?
            .ok_or_else(|| CompileError::lower(format!("runtime helper @{name} returns void"), Span::dummy()))
    }

    /// Raise a runtime trap with `msg` and end the block.
    fn trap_with(&mut self, msg: &str) -> Result<(), CompileError> {
        let m = self.const_string(msg);
        self.rt("rt_trap", vec![m])?;
        self.b.trap();
        Ok(())
    }
}
