use crate::builtins::Builtin;
use crate::span::{Span, Spanned};

/// A parsed source unit. Procedures and classes are hoisted out of the
/// statement stream; everything else forms the implicit main program.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub procs: Vec<Spanned<Proc>>,
    pub classes: Vec<Spanned<ClassDecl>>,
    pub main: Vec<Spanned<Stmt>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcKind {
    Function,
    Sub,
}

impl std::fmt::Display for ProcKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcKind::Function => write!(f, "FUNCTION"),
            ProcKind::Sub => write!(f, "SUB"),
        }
    }
}

/// FUNCTION or SUB, including class methods, constructors and destructors.
#[derive(Debug, Clone)]
pub struct Proc {
    pub kind: ProcKind,
    pub name: Spanned<String>,
    pub params: Vec<Param>,
    /// Declared (`AS T`) or suffix-derived return type; `None` for SUB.
    pub ret: Option<TypeName>,
    pub body: Vec<Spanned<Stmt>>,
    /// Location of `END FUNCTION` / `END SUB`.
    pub end_span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Spanned<String>,
    pub ty: TypeName,
    pub is_array: bool,
    pub by_ref: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeName {
    Int,
    Float,
    Str,
    Class(String),
}

impl TypeName {
    /// Type implied by a variable name's suffix: `$` string, `#` float.
    pub fn from_suffix(name: &str) -> TypeName {
        if name.ends_with('$') {
            TypeName::Str
        } else if name.ends_with('#') {
            TypeName::Float
        } else {
            TypeName::Int
        }
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeName::Int => write!(f, "INTEGER"),
            TypeName::Float => write!(f, "DOUBLE"),
            TypeName::Str => write!(f, "STRING"),
            TypeName::Class(c) => write!(f, "{c}"),
        }
    }
}

/// `CLASS` (fields, methods, constructor, destructor) or `TYPE` (fields only).
#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Spanned<String>,
    pub is_record: bool,
    pub fields: Vec<FieldDecl>,
    pub ctor: Option<Spanned<Proc>>,
    pub dtor: Option<Spanned<Proc>>,
    pub methods: Vec<Spanned<Proc>>,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: Spanned<String>,
    pub ty: TypeName,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// Numeric line label, a GOTO/GOSUB target.
    Label(i64),
    Print {
        channel: Option<Spanned<Expr>>,
        items: Vec<PrintItem>,
    },
    /// Procedure or method call in statement position.
    Call(Spanned<Expr>),
    Cls,
    Color {
        fg: Spanned<Expr>,
        bg: Option<Spanned<Expr>>,
    },
    Locate {
        row: Spanned<Expr>,
        col: Option<Spanned<Expr>>,
    },
    Let {
        target: Spanned<Expr>,
        value: Spanned<Expr>,
    },
    Dim {
        name: Spanned<String>,
        /// Upper bound for arrays (`DIM a(n)` holds `n + 1` elements).
        size: Option<Spanned<Expr>>,
        ty: Option<TypeName>,
    },
    ReDim {
        name: Spanned<String>,
        size: Spanned<Expr>,
    },
    Randomize {
        seed: Option<Spanned<Expr>>,
    },
    If {
        cond: Spanned<Expr>,
        then_body: Vec<Spanned<Stmt>>,
        elseifs: Vec<(Spanned<Expr>, Vec<Spanned<Stmt>>)>,
        else_body: Option<Vec<Spanned<Stmt>>>,
    },
    SelectCase {
        selector: Spanned<Expr>,
        arms: Vec<CaseArm>,
        else_body: Option<Vec<Spanned<Stmt>>>,
    },
    While {
        cond: Spanned<Expr>,
        body: Vec<Spanned<Stmt>>,
    },
    Do {
        pre: Option<LoopCond>,
        body: Vec<Spanned<Stmt>>,
        post: Option<LoopCond>,
    },
    For {
        var: Spanned<String>,
        start: Spanned<Expr>,
        end: Spanned<Expr>,
        step: Option<Spanned<Expr>>,
        body: Vec<Spanned<Stmt>>,
        /// Variable named on the closing `NEXT`, if any.
        next_var: Option<Spanned<String>>,
    },
    /// A `NEXT` with no open `FOR`.
    Next {
        var: Option<Spanned<String>>,
    },
    Exit(ExitKind),
    Goto(Spanned<i64>),
    Gosub(Spanned<i64>),
    Open {
        path: Spanned<Expr>,
        mode: OpenMode,
        channel: Spanned<Expr>,
    },
    Close {
        channel: Option<Spanned<Expr>>,
    },
    Seek {
        channel: Spanned<Expr>,
        pos: Spanned<Expr>,
    },
    /// `ON ERROR GOTO n`; `None` for `ON ERROR GOTO 0`.
    OnErrorGoto(Option<Spanned<i64>>),
    Resume(ResumeKind),
    End,
    Input {
        prompt: Option<String>,
        vars: Vec<Spanned<String>>,
    },
    LineInput {
        channel: Option<Spanned<Expr>>,
        target: Spanned<String>,
    },
    Return {
        value: Option<Spanned<Expr>>,
    },
    Delete {
        target: Spanned<Expr>,
    },
}

#[derive(Debug, Clone)]
pub enum PrintItem {
    Expr(Spanned<Expr>),
    /// `,` advances to the next print zone.
    Comma,
    /// `;` joins without spacing.
    Semicolon,
}

impl PrintItem {
    pub fn is_separator(&self) -> bool {
        !matches!(self, PrintItem::Expr(_))
    }
}

#[derive(Debug, Clone)]
pub struct CaseArm {
    pub labels: Vec<CaseLabel>,
    pub body: Vec<Spanned<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum CaseLabel {
    Value(Spanned<Expr>),
    Range(Spanned<Expr>, Spanned<Expr>),
    Is(BinOp, Spanned<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCondKind {
    While,
    Until,
}

#[derive(Debug, Clone)]
pub struct LoopCond {
    pub kind: LoopCondKind,
    pub expr: Spanned<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    For,
    While,
    Do,
    Function,
    Sub,
}

impl std::fmt::Display for ExitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitKind::For => write!(f, "FOR"),
            ExitKind::While => write!(f, "WHILE"),
            ExitKind::Do => write!(f, "DO"),
            ExitKind::Function => write!(f, "FUNCTION"),
            ExitKind::Sub => write!(f, "SUB"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Input,
    Output,
    Append,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResumeKind {
    Same,
    Next,
    Label(Spanned<i64>),
}

#[derive(Debug, Clone)]
pub enum Expr {
    IntLit(i64),
    FloatLit(f64),
    StringLit(String),
    BoolLit(bool),
    Var(String),
    ArrayElem {
        name: Spanned<String>,
        index: Box<Spanned<Expr>>,
    },
    LBound {
        name: Spanned<String>,
    },
    UBound {
        name: Spanned<String>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Spanned<Expr>>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    Builtin {
        builtin: Builtin,
        args: Vec<Spanned<Expr>>,
    },
    /// Call of a user FUNCTION or SUB.
    Call {
        name: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
    New {
        class: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
    Me,
    Member {
        object: Box<Spanned<Expr>>,
        field: Spanned<String>,
    },
    MethodCall {
        object: Box<Spanned<Expr>>,
        method: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
}

impl Expr {
    /// Integer value of a literal (or negated literal), if constant.
    pub fn as_const_int(&self) -> Option<i64> {
        match self {
            Expr::IntLit(n) => Some(*n),
            Expr::BoolLit(b) => Some(if *b { -1 } else { 0 }),
            Expr::Unary { op: UnaryOp::Neg, operand } => operand.node.as_const_int()?.checked_neg(),
            _ => None,
        }
    }

    pub fn as_const_float(&self) -> Option<f64> {
        match self {
            Expr::FloatLit(f) => Some(*f),
            Expr::Unary { op: UnaryOp::Neg, operand } => operand.node.as_const_float().map(|f| -f),
            _ => self.as_const_int().map(|n| n as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// `/`, always floating point.
    Div,
    /// `\`, integer division.
    IDiv,
    Mod,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
    AndAlso,
    OrElse,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or | BinOp::Xor | BinOp::AndAlso | BinOp::OrElse)
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::IDiv => "\\",
            BinOp::Mod => "MOD",
            BinOp::Pow => "^",
            BinOp::Concat => "&",
            BinOp::Eq => "=",
            BinOp::Ne => "<>",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "AND",
            BinOp::Or => "OR",
            BinOp::Xor => "XOR",
            BinOp::AndAlso => "ANDALSO",
            BinOp::OrElse => "ORELSE",
        };
        f.write_str(s)
    }
}
