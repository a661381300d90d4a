//! The intermediate language.
//!
//! A [`Module`] is a list of functions plus the runtime helpers they call
//! (`extern`) and interned string literals (`global`). Functions are made of
//! basic blocks in SSA form: a value is defined once, by a function
//! parameter, a block parameter or an instruction result, and flows into
//! other blocks as branch arguments.
//!
//! Variables that change across a loop live in `alloca` slots the way the
//! frontend emits them; passes may still thread values through block
//! parameters.

pub mod builder;
pub mod cfg;
pub mod parse;
pub mod print;
pub mod runtime;
pub mod verify;

use std::collections::HashMap;

pub use builder::FunctionBuilder;
pub use parse::parse_module;
pub use print::print_module;
pub use verify::verify_module;

pub const IL_VERSION: &str = "0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    I1,
    I32,
    I64,
    F64,
    Str,
    Ptr,
}

impl Type {
    pub fn name(self) -> &'static str {
        match self {
            Type::Void => "void",
            Type::I1 => "i1",
            Type::I32 => "i32",
            Type::I64 => "i64",
            Type::F64 => "f64",
            Type::Str => "str",
            Type::Ptr => "ptr",
        }
    }

    pub fn parse(s: &str) -> Option<Type> {
        Some(match s {
            "void" => Type::Void,
            "i1" => Type::I1,
            "i32" => Type::I32,
            "i64" => Type::I64,
            "f64" => Type::F64,
            "str" => Type::Str,
            "ptr" => Type::Ptr,
            _ => return None,
        })
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Type::I1 | Type::I32 | Type::I64)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Temp ids are function-scoped.
pub type TempId = u32;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    ConstInt(i64),
    ConstFloat(f64),
    Temp(TempId),
    Global(String),
    Null,
}

impl Value {
    pub fn as_temp(&self) -> Option<TempId> {
        match self {
            Value::Temp(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_const_int(&self) -> Option<i64> {
        match self {
            Value::ConstInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Value::ConstInt(_) | Value::ConstFloat(_) | Value::Null)
    }
}

macro_rules! opcodes {
    ($($variant:ident => $text:literal),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant),*
        }

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant),*];

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $text),*
                }
            }

            pub fn from_mnemonic(s: &str) -> Option<Opcode> {
                match s {
                    $($text => Some(Opcode::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    Add => "add",
    Sub => "sub",
    Mul => "mul",
    IAddOvf => "iadd.ovf",
    ISubOvf => "isub.ovf",
    IMulOvf => "imul.ovf",
    SDivChk0 => "sdiv.chk0",
    SRemChk0 => "srem.chk0",
    FAdd => "fadd",
    FSub => "fsub",
    FMul => "fmul",
    FDiv => "fdiv",
    And => "and",
    Or => "or",
    Xor => "xor",
    ICmpEq => "icmp_eq",
    ICmpNe => "icmp_ne",
    SCmpLt => "scmp_lt",
    SCmpLe => "scmp_le",
    SCmpGt => "scmp_gt",
    SCmpGe => "scmp_ge",
    FCmpEq => "fcmp_eq",
    FCmpNe => "fcmp_ne",
    FCmpLt => "fcmp_lt",
    FCmpLe => "fcmp_le",
    FCmpGt => "fcmp_gt",
    FCmpGe => "fcmp_ge",
    SIToFP => "sitofp",
    FPToSI => "fptosi",
    Zext1 => "zext1",
    Trunc1 => "trunc1",
    CastSiNarrowChk => "cast.si_narrow.chk",
    Alloca => "alloca",
    Load => "load",
    Store => "store",
    ConstStr => "const_str",
    ConstNull => "const_null",
    Call => "call",
    Br => "br",
    CBr => "cbr",
    SwitchI32 => "switch_i32",
    Ret => "ret",
    Trap => "trap",
    EhPush => "eh.push",
    EhPop => "eh.pop",
    ResumeSame => "resume.same",
    ResumeNext => "resume.next",
    ResumeLabel => "resume.label",
}

impl Opcode {
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Br
                | Opcode::CBr
                | Opcode::SwitchI32
                | Opcode::Ret
                | Opcode::Trap
                | Opcode::ResumeSame
                | Opcode::ResumeNext
                | Opcode::ResumeLabel
        )
    }

    /// Integer binary operations on `i64`.
    pub fn is_int_binary(self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::IAddOvf
                | Opcode::ISubOvf
                | Opcode::IMulOvf
                | Opcode::SDivChk0
                | Opcode::SRemChk0
                | Opcode::And
                | Opcode::Or
                | Opcode::Xor
        )
    }

    pub fn is_float_binary(self) -> bool {
        matches!(self, Opcode::FAdd | Opcode::FSub | Opcode::FMul | Opcode::FDiv)
    }

    pub fn is_int_compare(self) -> bool {
        matches!(
            self,
            Opcode::ICmpEq | Opcode::ICmpNe | Opcode::SCmpLt | Opcode::SCmpLe | Opcode::SCmpGt | Opcode::SCmpGe
        )
    }

    pub fn is_float_compare(self) -> bool {
        matches!(
            self,
            Opcode::FCmpEq | Opcode::FCmpNe | Opcode::FCmpLt | Opcode::FCmpLe | Opcode::FCmpGt | Opcode::FCmpGe
        )
    }

    /// Operations that can trap at run time.
    pub fn may_trap(self) -> bool {
        matches!(
            self,
            Opcode::IAddOvf
                | Opcode::ISubOvf
                | Opcode::IMulOvf
                | Opcode::SDivChk0
                | Opcode::SRemChk0
                | Opcode::FPToSI
                | Opcode::CastSiNarrowChk
                | Opcode::Call
                | Opcode::Trap
        )
    }

    /// Whether an unused result makes the instruction removable.
    pub fn is_pure(self) -> bool {
        !self.is_terminator()
            && !self.may_trap()
            && !matches!(self, Opcode::Store | Opcode::EhPush | Opcode::EhPop)
    }

    /// Fixed result type of value-producing opcodes whose type does not
    /// depend on operands or a signature.
    pub fn fixed_result(self) -> Option<Type> {
        if self.is_int_binary() {
            return Some(Type::I64);
        }
        if self.is_float_binary() {
            return Some(Type::F64);
        }
        if self.is_int_compare() || self.is_float_compare() {
            return Some(Type::I1);
        }
        Some(match self {
            Opcode::SIToFP => Type::F64,
            Opcode::FPToSI | Opcode::Zext1 => Type::I64,
            Opcode::Trunc1 => Type::I1,
            Opcode::CastSiNarrowChk => Type::I32,
            Opcode::Alloca | Opcode::ConstNull => Type::Ptr,
            Opcode::ConstStr => Type::Str,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub result: Option<TempId>,
    /// Result type, or the accessed type for `load`/`store`.
    pub ty: Type,
    pub op: Opcode,
    pub operands: Vec<Value>,
    pub callee: Option<String>,
    /// Successor labels; for `switch_i32` the default comes first.
    pub labels: Vec<String>,
    /// One argument list per entry of `labels`.
    pub br_args: Vec<Vec<Value>>,
    /// Source line, 0 when unknown.
    pub loc: u32,
}

impl Instr {
    pub fn new(op: Opcode, ty: Type, operands: Vec<Value>) -> Self {
        Instr {
            result: None,
            ty,
            op,
            operands,
            callee: None,
            labels: Vec::new(),
            br_args: Vec::new(),
            loc: 0,
        }
    }

    pub fn br(label: impl Into<String>, args: Vec<Value>) -> Self {
        let mut i = Instr::new(Opcode::Br, Type::Void, Vec::new());
        i.labels.push(label.into());
        i.br_args.push(args);
        i
    }

    pub fn cbr(cond: Value, t: impl Into<String>, t_args: Vec<Value>, f: impl Into<String>, f_args: Vec<Value>) -> Self {
        let mut i = Instr::new(Opcode::CBr, Type::Void, vec![cond]);
        i.labels = vec![t.into(), f.into()];
        i.br_args = vec![t_args, f_args];
        i
    }

    pub fn ret(value: Option<Value>) -> Self {
        Instr::new(Opcode::Ret, Type::Void, value.into_iter().collect())
    }

    /// Every temp this instruction reads, branch arguments included.
    pub fn uses(&self) -> impl Iterator<Item = TempId> + '_ {
        self.operands
            .iter()
            .chain(self.br_args.iter().flatten())
            .filter_map(Value::as_temp)
    }

    pub fn uses_temp(&self, id: TempId) -> bool {
        self.uses().any(|u| u == id)
    }

    pub fn replace_uses(&mut self, from: TempId, to: &Value) {
        for v in self.operands.iter_mut().chain(self.br_args.iter_mut().flatten()) {
            if *v == Value::Temp(from) {
                *v = to.clone();
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param {
    pub id: TempId,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub label: String,
    pub params: Vec<Param>,
    pub instrs: Vec<Instr>,
    pub terminated: bool,
}

impl Block {
    pub fn new(label: impl Into<String>) -> Self {
        Block { label: label.into(), params: Vec::new(), instrs: Vec::new(), terminated: false }
    }

    pub fn terminator(&self) -> Option<&Instr> {
        self.instrs.last().filter(|i| i.op.is_terminator())
    }

    pub fn terminator_mut(&mut self) -> Option<&mut Instr> {
        self.instrs.last_mut().filter(|i| i.op.is_terminator())
    }

    /// Labels this block can transfer control to, including `eh.push`
    /// handler targets. Duplicates are kept.
    pub fn successors(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .instrs
            .iter()
            .filter(|i| i.op == Opcode::EhPush)
            .flat_map(|i| i.labels.iter().map(String::as_str))
            .collect();
        if let Some(t) = self.terminator() {
            out.extend(t.labels.iter().map(String::as_str));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub ret: Type,
    pub params: Vec<Param>,
    pub blocks: Vec<Block>,
    /// Printable names indexed by temp id; `None` prints as `%t<id>`.
    pub value_names: Vec<Option<String>>,
}

impl Function {
    pub fn new(name: impl Into<String>, ret: Type) -> Self {
        Function { name: name.into(), ret, params: Vec::new(), blocks: Vec::new(), value_names: Vec::new() }
    }

    /// Allocate a fresh temp id.
    pub fn new_temp(&mut self) -> TempId {
        self.value_names.push(None);
        (self.value_names.len() - 1) as TempId
    }

    pub fn new_named_temp(&mut self, name: impl Into<String>) -> TempId {
        let id = self.new_temp();
        self.value_names[id as usize] = Some(name.into());
        id
    }

    pub fn temp_name(&self, id: TempId) -> String {
        match self.value_names.get(id as usize) {
            Some(Some(n)) => n.clone(),
            _ => format!("t{id}"),
        }
    }

    pub fn block(&self, label: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.label == label)
    }

    pub fn block_index(&self, label: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.label == label)
    }

    /// A label not used by any block, starting from `base`.
    pub fn fresh_label(&self, base: &str) -> String {
        if self.block(base).is_none() {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}.{n}"))
            .find(|l| self.block(l).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    /// Type of every defined temp.
    pub fn temp_types(&self) -> HashMap<TempId, Type> {
        let mut types = HashMap::new();
        for p in &self.params {
            types.insert(p.id, p.ty);
        }
        for b in &self.blocks {
            for p in &b.params {
                types.insert(p.id, p.ty);
            }
            for i in &b.instrs {
                if let Some(r) = i.result {
                    types.insert(r, i.ty);
                }
            }
        }
        types
    }

    pub fn instr_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instrs.len()).sum()
    }

    /// Number of `call @<name>` instructions in the function.
    pub fn calls_to(&self, name: &str) -> usize {
        self.blocks
            .iter()
            .flat_map(|b| &b.instrs)
            .filter(|i| i.op == Opcode::Call && i.callee.as_deref() == Some(name))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extern {
    pub name: String,
    pub params: Vec<Type>,
    pub ret: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub version: String,
    pub externs: Vec<Extern>,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

impl Default for Module {
    fn default() -> Self {
        Module { version: IL_VERSION.to_string(), externs: Vec::new(), globals: Vec::new(), functions: Vec::new() }
    }
}

/// Parameter and return types of something callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Type,
}

impl Module {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    pub fn extern_decl(&self, name: &str) -> Option<&Extern> {
        self.externs.iter().find(|e| e.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Signature of a function or extern called `name`.
    pub fn signature(&self, name: &str) -> Option<Signature> {
        if let Some(f) = self.function(name) {
            return Some(Signature { params: f.params.iter().map(|p| p.ty).collect(), ret: f.ret });
        }
        self.extern_decl(name).map(|e| Signature { params: e.params.clone(), ret: e.ret })
    }

    /// Declare `name` from the runtime table unless it is already declared.
    pub fn ensure_extern(&mut self, name: &str) -> Option<&Extern> {
        if self.extern_decl(name).is_none() {
            let sig = runtime::signature(name)?;
            self.externs.push(Extern { name: name.to_string(), params: sig.params.to_vec(), ret: sig.ret });
        }
        self.extern_decl(name)
    }

    /// Intern a string literal, returning its global name.
    pub fn intern_str(&mut self, text: &str) -> String {
        if let Some(g) = self.globals.iter().find(|g| g.value == text) {
            return g.name.clone();
        }
        let name = format!(".L{}", self.globals.len());
        self.globals.push(Global { name: name.clone(), value: text.to_string() });
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonics_round_trip() {
        for &op in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
        }
    }

    #[test]
    fn fresh_label_avoids_existing_blocks() {
        let mut f = Function::new("f", Type::Void);
        f.blocks.push(Block::new("done"));
        f.blocks.push(Block::new("done.1"));
        assert_eq!(f.fresh_label("done"), "done.2");
        assert_eq!(f.fresh_label("other"), "other");
    }

    #[test]
    fn interned_strings_are_shared() {
        let mut m = Module::default();
        let a = m.intern_str("hi");
        let b = m.intern_str("hi");
        let c = m.intern_str("there");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(m.globals.len(), 2);
    }

    #[test]
    fn successors_include_handlers() {
        let mut b = Block::new("entry");
        let mut push = Instr::new(Opcode::EhPush, Type::Void, Vec::new());
        push.labels.push("handler".into());
        push.br_args.push(Vec::new());
        b.instrs.push(push);
        b.instrs.push(Instr::br("next", Vec::new()));
        assert_eq!(b.successors(), vec!["handler", "next"]);
    }
}
