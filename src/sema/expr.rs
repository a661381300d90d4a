use super::scope::suggest;
use super::{SemType, SemanticAnalyzer};
use crate::builtins::{Builtin, ValueKind};
use crate::parser::ast::*;
use crate::span::{Span, Spanned};

fn sem_of_kind(kind: ValueKind) -> SemType {
    match kind {
        ValueKind::I64 => SemType::Int,
        ValueKind::F64 => SemType::Float,
        ValueKind::Str => SemType::String,
    }
}

fn kind_of_sem(ty: SemType) -> Option<ValueKind> {
    match ty {
        SemType::Int => Some(ValueKind::I64),
        SemType::Float => Some(ValueKind::F64),
        SemType::String => Some(ValueKind::Str),
        SemType::Unknown => None,
    }
}

fn is_int_zero(e: &Expr) -> bool {
    matches!(e, Expr::IntLit(0))
}

impl SemanticAnalyzer<'_> {
    pub(super) fn expr(&mut self, e: &mut Spanned<Expr>) -> SemType {
        let span = e.span;
        match &mut e.node {
            Expr::IntLit(_) | Expr::BoolLit(_) => SemType::Int,
            Expr::FloatLit(_) => SemType::Float,
            Expr::StringLit(_) => SemType::String,
            Expr::Var(name) => self.var(name, span),
            Expr::ArrayElem { name, index } => self.array_elem(name, index, span).unwrap_or(SemType::Unknown),
            Expr::LBound { name } | Expr::UBound { name } => {
                let resolved = self.resolve(&name.node);
                if self.body.arrays.contains_key(&resolved) {
                    name.node = resolved;
                } else {
                    self.de.error("B1001", name.span, format!("unknown array '{}'", name.node));
                }
                SemType::Int
            }
            Expr::Unary { op, operand } => {
                let ty = self.expr(operand);
                match op {
                    UnaryOp::Not => {
                        if !ty.is_int_or_unknown() {
                            self.de.error("B2001", span, "operand type mismatch");
                        }
                        SemType::Int
                    }
                    UnaryOp::Neg | UnaryOp::Plus => {
                        if !ty.is_numeric_or_unknown() {
                            self.de.error("B2001", span, "operand type mismatch");
                        }
                        ty
                    }
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let lt = self.expr(lhs);
                let rt = self.expr(rhs);
                let const_int_zero_div = matches!(lhs.node, Expr::IntLit(_)) && is_int_zero(&rhs.node);
                self.binary(*op, lt, rt, const_int_zero_div, span)
            }
            Expr::Builtin { builtin, args } => self.builtin_call(*builtin, args, span),
            Expr::Call { name, args } => self.user_call(name, args, span, false),
            Expr::New { class, args } => {
                for a in args.iter_mut() {
                    self.expr(a);
                }
                if !self.check_class_exists(&class.node, class.span) {
                    return SemType::Unknown;
                }
                let expected = self.classes.get(&class.node).map(|c| match &c.ctor {
                    Some(sig) => sig.params.len(),
                    None => 0,
                });
                if let Some(n) = expected
                    && n != args.len()
                {
                    self.de.error("B2005", span, "wrong number of arguments");
                }
                SemType::Unknown
            }
            Expr::Me => {
                if self.ctx.class.is_none() {
                    self.de.error("B1001", span, "ME used outside of a CLASS method");
                }
                SemType::Unknown
            }
            Expr::Member { object, field } => {
                self.expr(object);
                let Some(class) = self.object_class(&object.node) else {
                    return SemType::Unknown;
                };
                let Some(info) = self.classes.get(&class) else {
                    return SemType::Unknown;
                };
                match info.field(&field.node) {
                    Some((_, ty)) => SemType::of(ty),
                    None => {
                        self.de.error("B1001", field.span, format!("unknown field '{}' in '{class}'", field.node));
                        SemType::Unknown
                    }
                }
            }
            Expr::MethodCall { object, method, args } => {
                self.expr(object);
                for a in args.iter_mut() {
                    self.expr(a);
                }
                let Some(class) = self.object_class(&object.node) else {
                    return SemType::Unknown;
                };
                let Some(info) = self.classes.get(&class) else {
                    return SemType::Unknown;
                };
                let Some(sig) = info.methods.get(&method.node) else {
                    self.de.error("B1001", method.span, format!("unknown method '{}' in '{class}'", method.node));
                    return SemType::Unknown;
                };
                let ret = sig.ret.as_ref().map(SemType::of).unwrap_or(SemType::Unknown);
                if sig.params.len() != args.len() {
                    self.de.error("B2005", span, "wrong number of arguments");
                }
                ret
            }
        }
    }

    fn var(&mut self, name: &mut String, span: Span) -> SemType {
        *name = self.resolve(name);
        if !self.body.symbols.contains(name.as_str()) {
            let mut msg = format!("unknown variable '{name}'");
            if let Some(best) = suggest(name, &self.body.symbols) {
                msg.push_str(&format!("; did you mean '{best}'?"));
            }
            self.de.error("B1001", span, msg);
            return SemType::Unknown;
        }
        if self.body.objects.contains_key(name.as_str()) {
            return SemType::Unknown;
        }
        self.var_type(name)
    }

    /// Check an element access and return the element type, or `None` when
    /// the array is unknown.
    pub(super) fn array_elem(
        &mut self,
        name: &mut Spanned<String>,
        index: &mut Spanned<Expr>,
        span: Span,
    ) -> Option<SemType> {
        let resolved = self.resolve(&name.node);
        let Some(info) = self.body.arrays.get(&resolved).cloned() else {
            self.de.error("B1001", name.span, format!("unknown array '{}'", name.node));
            self.expr(index);
            return None;
        };
        name.node = resolved;
        let ty = self.expr(index);
        if !ty.is_int_or_unknown() {
            self.de.error("B2001", span, "index type mismatch");
        }
        if let (Some(upper), Some(i)) = (info.upper, index.node.as_const_int())
            && (i < 0 || i > upper)
        {
            self.de.warning("B3001", span, "index out of bounds");
        }
        Some(info.elem)
    }

    fn binary(&mut self, op: BinOp, lt: SemType, rt: SemType, const_zero_div: bool, span: Span) -> SemType {
        let mismatch = |sa: &mut Self| sa.de.error("B2001", span, "operand type mismatch");
        match op {
            BinOp::Add if lt == SemType::String && rt == SemType::String => SemType::String,
            BinOp::Add | BinOp::Sub | BinOp::Mul => {
                if !lt.is_numeric_or_unknown() || !rt.is_numeric_or_unknown() {
                    mismatch(self);
                }
                if lt == SemType::Float || rt == SemType::Float { SemType::Float } else { SemType::Int }
            }
            BinOp::Div => {
                if !lt.is_numeric_or_unknown() || !rt.is_numeric_or_unknown() {
                    mismatch(self);
                }
                if lt == SemType::Float || rt == SemType::Float {
                    return SemType::Float;
                }
                if const_zero_div {
                    self.de.error("B2002", span, "divide by zero");
                }
                SemType::Int
            }
            BinOp::IDiv | BinOp::Mod => {
                if !lt.is_int_or_unknown() || !rt.is_int_or_unknown() {
                    mismatch(self);
                }
                if const_zero_div {
                    self.de.error("B2002", span, "divide by zero");
                }
                SemType::Int
            }
            BinOp::Pow => {
                if !lt.is_numeric_or_unknown() || !rt.is_numeric_or_unknown() {
                    mismatch(self);
                }
                SemType::Float
            }
            BinOp::Concat => SemType::String,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let numeric_ok = lt.is_numeric_or_unknown() && rt.is_numeric_or_unknown();
                let string_ok =
                    lt.is_string_or_unknown() && rt.is_string_or_unknown() && matches!(op, BinOp::Eq | BinOp::Ne);
                if !numeric_ok && !string_ok {
                    mismatch(self);
                }
                SemType::Int
            }
            BinOp::And | BinOp::Or | BinOp::Xor | BinOp::AndAlso | BinOp::OrElse => {
                if !lt.is_int_or_unknown() || !rt.is_int_or_unknown() {
                    mismatch(self);
                }
                SemType::Int
            }
        }
    }

    fn builtin_call(&mut self, builtin: Builtin, args: &mut [Spanned<Expr>], span: Span) -> SemType {
        let types: Vec<SemType> = args.iter_mut().map(|a| self.expr(a)).collect();
        let info = builtin.info();
        let argc = types.len();
        if argc < info.min_args || argc > info.max_args {
            let expected = if info.min_args == info.max_args {
                let n = info.min_args;
                format!("{n} arg{}", if n == 1 { "" } else { "s" })
            } else {
                format!("{}-{} args", info.min_args, info.max_args)
            };
            self.de.error("B2001", span, format!("{}: expected {expected} (got {argc})", info.name));
        } else {
            for (i, (kind, ty)) in info.arg_kinds(argc).iter().zip(&types).enumerate() {
                let Some(vk) = kind_of_sem(*ty) else { continue };
                if kind.accepts(vk) {
                    continue;
                }
                let got = if vk == ValueKind::Str { "string" } else { "number" };
                self.de.error(
                    "B2001",
                    args[i].span,
                    format!("{}: arg {} must be {} (got {got})", info.name, i + 1, kind.describe()),
                );
            }
        }
        let kinds: Vec<Option<ValueKind>> = types.iter().map(|t| kind_of_sem(*t)).collect();
        info.result_kind(&kinds).map(sem_of_kind).unwrap_or(SemType::Unknown)
    }

    /// Check a call of a user procedure. `as_statement` allows SUBs.
    pub(super) fn user_call(
        &mut self,
        name: &Spanned<String>,
        args: &mut [Spanned<Expr>],
        span: Span,
        as_statement: bool,
    ) -> SemType {
        let sig = match self.procs.get(&name.node) {
            None => {
                self.de.error("B1006", name.span, format!("unknown procedure '{}'", name.node));
                None
            }
            Some(sig) if sig.kind == ProcKind::Sub && !as_statement => {
                self.de.error("B2005", name.span, format!("subroutine '{}' used in expression", name.node));
                None
            }
            Some(sig) => Some(sig.clone()),
        };

        let Some(sig) = sig else {
            for a in args.iter_mut() {
                self.expr(a);
            }
            return SemType::Unknown;
        };

        if args.len() != sig.params.len() {
            self.de.error("B2005", span, "wrong number of arguments");
        }
        for (i, arg) in args.iter_mut().enumerate() {
            let Some(param) = sig.params.get(i) else {
                self.expr(arg);
                continue;
            };
            if param.is_array {
                let arg_span = arg.span;
                let is_array_var = match &mut arg.node {
                    Expr::Var(v) => {
                        let resolved = self.resolve(v);
                        let known = self.body.arrays.contains_key(&resolved);
                        if known {
                            *v = resolved;
                        }
                        known
                    }
                    _ => false,
                };
                if !is_array_var {
                    self.de.error(
                        "B2006",
                        arg_span,
                        format!("argument {} to {} must be an array variable (ByRef)", i + 1, name.node),
                    );
                }
                continue;
            }
            let arg_ty = self.expr(arg);
            let want = SemType::of(&param.ty);
            if !want.accepts(arg_ty) {
                self.de.error("B2001", arg.span, "argument type mismatch");
            }
        }
        sig.ret.as_ref().map(SemType::of).unwrap_or(SemType::Unknown)
    }

    /// Static class of an object-valued expression, when known.
    pub(super) fn object_class(&self, e: &Expr) -> Option<String> {
        match e {
            Expr::Var(name) => self.body.objects.get(name).cloned(),
            Expr::Me => self.ctx.class.clone(),
            Expr::New { class, .. } => Some(class.node.clone()),
            Expr::Member { object, field } => {
                let class = self.object_class(&object.node)?;
                match self.classes.get(&class)?.field(&field.node)?.1 {
                    TypeName::Class(c) => Some(c.clone()),
                    _ => None,
                }
            }
            Expr::MethodCall { object, method, .. } => {
                let class = self.object_class(&object.node)?;
                match self.classes.get(&class)?.methods.get(&method.node)?.ret.as_ref()? {
                    TypeName::Class(c) => Some(c.clone()),
                    _ => None,
                }
            }
            Expr::Call { name, .. } => match self.procs.get(&name.node)?.ret.as_ref()? {
                TypeName::Class(c) => Some(c.clone()),
                _ => None,
            },
            _ => None,
        }
    }
}
