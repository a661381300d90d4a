use super::{Elem, LowerContext, Ty, VarKind, il_type};
use crate::builtins::{ArgTransform, Builtin, DefaultValue, ValueKind};
use crate::diagnostics::CompileError;
use crate::il::{Instr, Opcode, Type, Value};
use crate::parser::ast::{BinOp, Expr, TypeName, UnaryOp};
use crate::span::{Span, Spanned};

type Lowered = Result<(Value, Ty), CompileError>;

fn mismatch(what: &str, span: Span) -> CompileError {
    CompileError::lower(format!("cannot use {what} here"), span)
}

fn value_kind(ty: &Ty) -> Option<ValueKind> {
    match ty {
        Ty::Int | Ty::Bool => Some(ValueKind::I64),
        Ty::Float => Some(ValueKind::F64),
        Ty::Str => Some(ValueKind::Str),
        Ty::Obj(_) | Ty::Void => None,
    }
}

impl LowerContext<'_> {
    pub(super) fn expr(&mut self, e: &Spanned<Expr>) -> Lowered {
        let span = e.span;
        match &e.node {
            Expr::IntLit(n) => Ok((Value::ConstInt(*n), Ty::Int)),
            Expr::FloatLit(x) => Ok((Value::ConstFloat(*x), Ty::Float)),
            Expr::StringLit(s) => Ok((self.const_string(s), Ty::Str)),
            Expr::BoolLit(b) => Ok((Value::ConstInt(if *b { -1 } else { 0 }), Ty::Int)),
            Expr::Var(name) => {
                if let Some((v, kind)) = self.direct.get(name) {
                    return Ok((v.clone(), kind.value_ty()));
                }
                let slot = self.slot(name);
                let v = self.b.load(slot.kind.slot_type(), slot.ptr);
                Ok((v, slot.kind.value_ty()))
            }
            Expr::ArrayElem { name, index } => {
                let (handle, elem) = self.array_handle(&name.node, name.span)?;
                let idx = self.checked_index(&handle, elem, index)?;
                let get = format!("{}_get", elem.prefix());
                let v = self.rt_value(&get, vec![handle, idx])?;
                Ok((v, elem.ty()))
            }
            Expr::LBound { .. } => Ok((Value::ConstInt(0), Ty::Int)),
            Expr::UBound { name } => {
                let (handle, elem) = self.array_handle(&name.node, name.span)?;
                let len = self.rt_value(&format!("{}_len", elem.prefix()), vec![handle])?;
                Ok((self.b.binary(Opcode::Sub, len, Value::ConstInt(1)), Ty::Int))
            }
            Expr::Unary { op, operand } => self.unary(*op, operand, span),
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, span),
            Expr::Builtin { builtin, args } => self.builtin(*builtin, args, span),
            Expr::Call { name, args } => {
                let (v, ty) = self.user_call(&name.node, args, span)?;
                let v = v.ok_or_else(|| mismatch(&format!("SUB {} as a value", name.node), span))?;
                Ok((v, ty))
            }
            Expr::New { class, args } => self.new_object(&class.node, args, span),
            Expr::Me => match &self.me {
                Some((v, c)) => Ok((v.clone(), Ty::Obj(Some(c.clone())))),
                None => Err(mismatch("ME outside a method", span)),
            },
            Expr::Member { object, field } => {
                let (obj, class) = self.object(object)?;
                let (index, ty) = self.field(&class, &field.node, field.span)?;
                let getter = match il_type(&ty) {
                    Type::I64 => "rt_obj_get_i64",
                    Type::F64 => "rt_obj_get_f64",
                    Type::Str => "rt_obj_get_str",
                    _ => "rt_obj_get_ptr",
                };
                let v = self.rt_value(getter, vec![obj, Value::ConstInt(index as i64)])?;
                Ok((v, Ty::of(&ty)))
            }
            Expr::MethodCall { object, method, args } => {
                let (v, ty) = self.method_call(object, &method.node, args, span)?;
                let v = v.ok_or_else(|| mismatch(&format!("SUB {} as a value", method.node), span))?;
                Ok((v, ty))
            }
        }
    }

    /// Lower `e` as a branch condition (`i1`).
    pub(super) fn cond(&mut self, e: &Spanned<Expr>) -> Result<Value, CompileError> {
        let (v, ty) = self.expr(e)?;
        self.truthy(v, &ty, e.span)
    }

    pub(super) fn truthy(&mut self, v: Value, ty: &Ty, span: Span) -> Result<Value, CompileError> {
        match ty {
            Ty::Bool => Ok(v),
            Ty::Int => Ok(self.b.binary(Opcode::ICmpNe, v, Value::ConstInt(0))),
            Ty::Float => Ok(self.b.binary(Opcode::FCmpNe, v, Value::ConstFloat(0.0))),
            _ => Err(mismatch("a non-numeric value as a condition", span)),
        }
    }

    pub(super) fn to_int(&mut self, v: Value, ty: &Ty, span: Span) -> Result<Value, CompileError> {
        match ty {
            Ty::Int => Ok(v),
            Ty::Float => Ok(self.b.unary(Opcode::FPToSI, v)),
            Ty::Bool => {
                let z = self.b.unary(Opcode::Zext1, v);
                Ok(self.b.binary(Opcode::Sub, Value::ConstInt(0), z))
            }
            _ => Err(mismatch("a non-numeric value as a number", span)),
        }
    }

    pub(super) fn to_float(&mut self, v: Value, ty: &Ty, span: Span) -> Result<Value, CompileError> {
        match ty {
            Ty::Float => Ok(v),
            Ty::Int => Ok(self.b.unary(Opcode::SIToFP, v)),
            Ty::Bool => {
                let i = self.to_int(v, ty, span)?;
                Ok(self.b.unary(Opcode::SIToFP, i))
            }
            _ => Err(mismatch("a non-numeric value as a number", span)),
        }
    }

    pub(super) fn to_str(&mut self, v: Value, ty: &Ty, span: Span) -> Result<Value, CompileError> {
        match ty {
            Ty::Str => Ok(v),
            Ty::Int => self.rt_value("rt_int_to_str", vec![v]),
            Ty::Bool => {
                let i = self.to_int(v, ty, span)?;
                self.rt_value("rt_int_to_str", vec![i])
            }
            Ty::Float => self.rt_value("rt_f64_to_str", vec![v]),
            _ => Err(mismatch("an object as a string", span)),
        }
    }

    /// Convert a lowered value to IL type `to`.
    pub(super) fn coerce(&mut self, v: Value, ty: &Ty, to: Type, span: Span) -> Result<Value, CompileError> {
        match to {
            Type::I64 => self.to_int(v, ty, span),
            Type::I32 => {
                let i = self.to_int(v, ty, span)?;
                Ok(self.b.unary(Opcode::CastSiNarrowChk, i))
            }
            Type::F64 => self.to_float(v, ty, span),
            Type::Str => self.to_str(v, ty, span),
            Type::I1 => self.truthy(v, ty, span),
            Type::Ptr => match ty {
                Ty::Obj(_) => Ok(v),
                _ => Err(mismatch("a plain value as an object", span)),
            },
            Type::Void => Err(mismatch("a value in a void position", span)),
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: &Spanned<Expr>, span: Span) -> Lowered {
        let (v, ty) = self.expr(operand)?;
        match op {
            UnaryOp::Plus => Ok((v, ty)),
            UnaryOp::Neg => match ty {
                Ty::Float => Ok((self.b.binary(Opcode::FSub, Value::ConstFloat(0.0), v), Ty::Float)),
                _ => {
                    let i = self.to_int(v, &ty, span)?;
                    Ok((self.b.binary(Opcode::ISubOvf, Value::ConstInt(0), i), Ty::Int))
                }
            },
            UnaryOp::Not => {
                let i = self.to_int(v, &ty, span)?;
                Ok((self.b.binary(Opcode::Xor, i, Value::ConstInt(-1)), Ty::Int))
            }
        }
    }

    fn binary(&mut self, op: BinOp, lhs: &Spanned<Expr>, rhs: &Spanned<Expr>, span: Span) -> Lowered {
        if matches!(op, BinOp::AndAlso | BinOp::OrElse) {
            return self.short_circuit(op, lhs, rhs);
        }
        let l = self.expr(lhs)?;
        let r = self.expr(rhs)?;
        if op.is_comparison() {
            return Ok((self.compare(op, l, r, span)?, Ty::Bool));
        }
        let (lv, lt) = l;
        let (rv, rt) = r;
        match op {
            BinOp::Concat => self.concat(lv, &lt, rv, &rt, span),
            BinOp::Add if lt == Ty::Str || rt == Ty::Str => self.concat(lv, &lt, rv, &rt, span),
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div if lt == Ty::Float || rt == Ty::Float => {
                let a = self.to_float(lv, &lt, span)?;
                let b = self.to_float(rv, &rt, span)?;
                let fop = match op {
                    BinOp::Add => Opcode::FAdd,
                    BinOp::Sub => Opcode::FSub,
                    BinOp::Mul => Opcode::FMul,
                    _ => Opcode::FDiv,
                };
                Ok((self.b.binary(fop, a, b), Ty::Float))
            }
            BinOp::Pow => {
                let a = self.to_float(lv, &lt, span)?;
                let b = self.to_float(rv, &rt, span)?;
                Ok((self.rt_value("rt_pow_f64_chkdom", vec![a, b])?, Ty::Float))
            }
            _ => {
                let a = self.to_int(lv, &lt, span)?;
                let b = self.to_int(rv, &rt, span)?;
                let iop = match op {
                    BinOp::Add => Opcode::IAddOvf,
                    BinOp::Sub => Opcode::ISubOvf,
                    BinOp::Mul => Opcode::IMulOvf,
                    BinOp::Div | BinOp::IDiv => Opcode::SDivChk0,
                    BinOp::Mod => Opcode::SRemChk0,
                    BinOp::And => Opcode::And,
                    BinOp::Or => Opcode::Or,
                    _ => Opcode::Xor,
                };
                Ok((self.b.binary(iop, a, b), Ty::Int))
            }
        }
    }

    fn concat(&mut self, lv: Value, lt: &Ty, rv: Value, rt: &Ty, span: Span) -> Lowered {
        let a = self.to_str(lv, lt, span)?;
        let b = self.to_str(rv, rt, span)?;
        Ok((self.rt_value("rt_concat", vec![a, b])?, Ty::Str))
    }

    /// Compare two lowered values; the result is `i1`.
    pub(super) fn compare(&mut self, op: BinOp, l: (Value, Ty), r: (Value, Ty), span: Span) -> Result<Value, CompileError> {
        let (lv, lt) = l;
        let (rv, rt) = r;
        if lt == Ty::Str || rt == Ty::Str {
            let a = self.to_str(lv, &lt, span)?;
            let b = self.to_str(rv, &rt, span)?;
            let helper = match op {
                BinOp::Eq => "rt_str_eq",
                BinOp::Ne => "rt_str_ne",
                BinOp::Lt => "rt_str_lt",
                BinOp::Le => "rt_str_le",
                BinOp::Gt => "rt_str_gt",
                _ => "rt_str_ge",
            };
            return self.rt_value(helper, vec![a, b]);
        }
        if lt == Ty::Float || rt == Ty::Float {
            let a = self.to_float(lv, &lt, span)?;
            let b = self.to_float(rv, &rt, span)?;
            let fop = match op {
                BinOp::Eq => Opcode::FCmpEq,
                BinOp::Ne => Opcode::FCmpNe,
                BinOp::Lt => Opcode::FCmpLt,
                BinOp::Le => Opcode::FCmpLe,
                BinOp::Gt => Opcode::FCmpGt,
                _ => Opcode::FCmpGe,
            };
            return Ok(self.b.binary(fop, a, b));
        }
        let a = self.to_int(lv, &lt, span)?;
        let b = self.to_int(rv, &rt, span)?;
        let iop = match op {
            BinOp::Eq => Opcode::ICmpEq,
            BinOp::Ne => Opcode::ICmpNe,
            BinOp::Lt => Opcode::SCmpLt,
            BinOp::Le => Opcode::SCmpLe,
            BinOp::Gt => Opcode::SCmpGt,
            _ => Opcode::SCmpGe,
        };
        Ok(self.b.binary(iop, a, b))
    }

    /// `ANDALSO` / `ORELSE`: the right side runs only when it decides the result.
    fn short_circuit(&mut self, op: BinOp, lhs: &Spanned<Expr>, rhs: &Spanned<Expr>) -> Lowered {
        let l = self.cond(lhs)?;
        let base = if op == BinOp::AndAlso { "and_rhs" } else { "or_rhs" };
        let rhs_block = self.b.create_block(base);
        let join = self.b.create_block("sc_join");
        let result = self.b.block_param(&join, Type::I1);
        if op == BinOp::AndAlso {
            self.b.emit(Instr::cbr(l, rhs_block.clone(), Vec::new(), join.clone(), vec![Value::ConstInt(0)]));
        } else {
            self.b.emit(Instr::cbr(l, join.clone(), vec![Value::ConstInt(1)], rhs_block.clone(), Vec::new()));
        }
        self.b.switch_to(&rhs_block);
        let r = self.cond(rhs)?;
        self.b.br(&join, vec![r]);
        self.b.switch_to(&join);
        Ok((result, Ty::Bool))
    }

    fn builtin(&mut self, builtin: Builtin, args: &[Spanned<Expr>], span: Span) -> Lowered {
        let mut lowered = Vec::with_capacity(args.len());
        for a in args {
            lowered.push(self.expr(a)?);
        }
        let kinds: Vec<Option<ValueKind>> = lowered.iter().map(|(_, t)| value_kind(t)).collect();
        for feature in builtin.scan_rule().features {
            if feature.applies(&kinds) {
                self.module.ensure_extern(feature.feature);
            }
        }
        let variant = builtin
            .lowering_rule()
            .select(&kinds)
            .ok_or_else(|| CompileError::lower(format!("no lowering for {builtin} with these arguments"), span))?;
        let runtime = variant.runtime;
        let params: Vec<Type> = self
            .module
            .ensure_extern(runtime)
            .map(|e| e.params.clone())
            .ok_or_else(|| CompileError::lower(format!("unknown runtime helper @{runtime}"), span))?;

        let mut call_args = Vec::with_capacity(variant.args.len());
        for (spec, &param) in variant.args.iter().zip(&params) {
            let (mut v, mut ty) = match lowered.get(spec.index) {
                Some(a) => a.clone(),
                None => match spec.default {
                    Some(DefaultValue::Int(n)) => (Value::ConstInt(n), Ty::Int),
                    Some(DefaultValue::Float(x)) => (Value::ConstFloat(x), Ty::Float),
                    None => return Err(CompileError::lower(format!("{builtin}: missing argument {}", spec.index + 1), span)),
                },
            };
            for t in spec.transforms {
                match t {
                    ArgTransform::EnsureI64 | ArgTransform::EnsureI32 => {
                        v = self.to_int(v, &ty, span)?;
                        ty = Ty::Int;
                    }
                    ArgTransform::EnsureF64 => {
                        v = self.to_float(v, &ty, span)?;
                        ty = Ty::Float;
                    }
                }
            }
            call_args.push(self.coerce(v, &ty, param, span)?);
        }
        let v = self.rt_value(runtime, call_args)?;
        let ret = self.module.extern_decl(runtime).map(|e| e.ret).unwrap_or(Type::Void);
        Ok((v, Ty::from_il(ret)))
    }

    /// Lower call arguments against a procedure's parameters.
    fn call_args(&mut self, params: &[super::ParamInfo], args: &[Spanned<Expr>], out: &mut Vec<Value>) -> Result<(), CompileError> {
        for (p, a) in params.iter().zip(args) {
            if p.by_slot() {
                let ptr = match &a.node {
                    Expr::Var(name) => self.slot(name).ptr,
                    _ if p.is_array => return Err(mismatch("a non-array argument for an array parameter", a.span)),
                    _ => {
                        // BYREF of an expression: pass a private copy.
                        let ty = il_type(&p.ty);
                        let (v, vt) = self.expr(a)?;
                        let v = self.coerce(v, &vt, ty, a.span)?;
                        let slot = self.scratch_slot(ty);
                        self.b.store(ty, slot.clone(), v);
                        slot
                    }
                };
                out.push(ptr);
            } else {
                let (v, vt) = self.expr(a)?;
                out.push(self.coerce(v, &vt, il_type(&p.ty), a.span)?);
            }
        }
        Ok(())
    }

    /// Call a user FUNCTION or SUB; the value is `None` for SUBs.
    pub(super) fn user_call(
        &mut self,
        name: &str,
        args: &[Spanned<Expr>],
        span: Span,
    ) -> Result<(Option<Value>, Ty), CompileError> {
        let g = self.g;
        let info = g
            .procs
            .get(name)
            .ok_or_else(|| CompileError::lower(format!("unknown procedure '{name}'"), span))?;
        let mut out = Vec::new();
        self.call_args(&info.params, args, &mut out)?;
        let ret = info.ret_type();
        let ty = info.ret.as_ref().map(Ty::of).unwrap_or(Ty::Void);
        Ok((self.b.call(&info.ir_name, ret, out), ty))
    }

    pub(super) fn method_call(
        &mut self,
        object: &Spanned<Expr>,
        method: &str,
        args: &[Spanned<Expr>],
        span: Span,
    ) -> Result<(Option<Value>, Ty), CompileError> {
        let (obj, class) = self.object(object)?;
        let g = self.g;
        let info = g
            .methods
            .get(&class)
            .and_then(|m| m.get(method))
            .ok_or_else(|| CompileError::lower(format!("unknown method '{method}' in '{class}'"), span))?;
        let mut out = vec![obj];
        self.call_args(&info.params, args, &mut out)?;
        let ret = info.ret_type();
        let ty = info.ret.as_ref().map(Ty::of).unwrap_or(Ty::Void);
        Ok((self.b.call(&info.ir_name, ret, out), ty))
    }

    /// Allocate an object of `class`, then run its constructor.
    pub(super) fn new_object(&mut self, class: &str, args: &[Spanned<Expr>], span: Span) -> Lowered {
        let g = self.g;
        let info = g
            .classes
            .get(class)
            .ok_or_else(|| CompileError::lower(format!("unknown class '{class}'"), span))?;
        let nfields = info.fields.len() as i64;
        let name = self.const_string(class);
        let obj = self.rt_value("rt_obj_new", vec![name, Value::ConstInt(nfields)])?;
        if let Some(ctor) = g.methods.get(class).and_then(|m| m.get("NEW")) {
            let mut out = vec![obj.clone()];
            self.call_args(&ctor.params, args, &mut out)?;
            self.b.call(&ctor.ir_name, Type::Void, out);
        }
        Ok((obj, Ty::Obj(Some(class.to_string()))))
    }

    /// Lower an object-valued expression whose class is known.
    pub(super) fn object(&mut self, e: &Spanned<Expr>) -> Result<(Value, String), CompileError> {
        match self.expr(e)? {
            (v, Ty::Obj(Some(class))) => Ok((v, class)),
            _ => Err(mismatch("a value of unknown class as an object", e.span)),
        }
    }

    pub(super) fn field(&self, class: &str, field: &str, span: Span) -> Result<(usize, TypeName), CompileError> {
        self.g
            .classes
            .get(class)
            .and_then(|c| c.field(field))
            .map(|(i, t)| (i, t.clone()))
            .ok_or_else(|| CompileError::lower(format!("unknown field '{field}' in '{class}'"), span))
    }

    /// Current handle of array variable `name`.
    pub(super) fn array_handle(&mut self, name: &str, span: Span) -> Result<(Value, Elem), CompileError> {
        let slot = self.slot(name);
        let VarKind::Array(elem) = slot.kind else {
            return Err(mismatch(&format!("'{name}' as an array"), span));
        };
        Ok((self.b.load(Type::Ptr, slot.ptr), elem))
    }

    /// Lower an index, checking it against the array length when bounds
    /// checks are on.
    pub(super) fn checked_index(&mut self, handle: &Value, elem: Elem, index: &Spanned<Expr>) -> Result<Value, CompileError> {
        let (v, ty) = self.expr(index)?;
        let idx = self.to_int(v, &ty, index.span)?;
        if !self.g.opts.bounds_checks {
            return Ok(idx);
        }
        let len = self.rt_value(&format!("{}_len", elem.prefix()), vec![handle.clone()])?;
        let oob = self.b.create_block("oob");
        let upper = self.b.create_block("idx_hi");
        let ok = self.b.create_block("idx_ok");
        let neg = self.b.binary(Opcode::SCmpLt, idx.clone(), Value::ConstInt(0));
        self.b.cbr(neg, &oob, &upper);
        self.b.switch_to(&upper);
        let high = self.b.binary(Opcode::SCmpGe, idx.clone(), len.clone());
        self.b.cbr(high, &oob, &ok);
        self.b.switch_to(&oob);
        self.rt("rt_arr_oob_panic", vec![idx.clone(), len])?;
        self.b.trap();
        self.b.switch_to(&ok);
        Ok(idx)
    }
}
