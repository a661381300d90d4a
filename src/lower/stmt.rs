use super::{BodyKind, Elem, LowerContext, Ty, VarKind, il_type};
use crate::diagnostics::CompileError;
use crate::il::{Opcode, Type, Value};
use crate::parser::ast::*;
use crate::span::{Span, Spanned};

/// Sign of a FOR step known at compile time.
fn const_step_sign(step: Option<&Spanned<Expr>>) -> Option<bool> {
    let Some(step) = step else { return Some(true) };
    if let Some(n) = step.node.as_const_int() {
        return Some(n >= 0);
    }
    step.node.as_const_float().map(|x| x >= 0.0)
}

fn open_mode_code(mode: OpenMode) -> i64 {
    match mode {
        OpenMode::Input => 0,
        OpenMode::Output => 1,
        OpenMode::Append => 2,
    }
}

impl LowerContext<'_> {
    pub(super) fn lower_stmts(&mut self, body: &[Spanned<Stmt>]) -> Result<(), CompileError> {
        for stmt in body {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Spanned<Stmt>) -> Result<(), CompileError> {
        let span = stmt.span;
        self.loc(span);
        match &stmt.node {
            Stmt::Label(n) => {
                let label = self.label_block(*n);
                self.jump(&label);
                self.b.switch_to(&label);
            }
            Stmt::Print { channel, items } => self.print(channel.as_ref(), items)?,
            Stmt::Call(call) => match &call.node {
                Expr::Call { name, args } => {
                    self.user_call(&name.node, args, call.span)?;
                }
                Expr::MethodCall { object, method, args } => {
                    self.method_call(object, &method.node, args, call.span)?;
                }
                _ => {
                    self.expr(call)?;
                }
            },
            Stmt::Cls => {
                self.rt("rt_term_cls", Vec::new())?;
            }
            Stmt::Color { fg, bg } => {
                let fg = self.int_expr(fg)?;
                let bg = match bg {
                    Some(e) => self.int_expr(e)?,
                    None => Value::ConstInt(-1),
                };
                self.rt("rt_term_color", vec![fg, bg])?;
            }
            Stmt::Locate { row, col } => {
                let row = self.int_expr(row)?;
                let col = match col {
                    Some(e) => self.int_expr(e)?,
                    None => Value::ConstInt(1),
                };
                self.rt("rt_term_locate", vec![row, col])?;
            }
            Stmt::Let { target, value } => self.assign(target, value)?,
            Stmt::Dim { name, size, .. } => self.dim(&name.node, size.as_ref(), span)?,
            Stmt::ReDim { name, size } => {
                let (handle, elem) = self.array_handle(&name.node, name.span)?;
                let count = self.element_count(size)?;
                let resized = self.rt_value(&format!("{}_resize", elem.prefix()), vec![handle, count])?;
                let slot = self.slot(&name.node);
                self.b.store(Type::Ptr, slot.ptr, resized);
            }
            Stmt::Randomize { seed } => {
                let seed = match seed {
                    Some(e) => self.int_expr(e)?,
                    None => Value::ConstInt(0),
                };
                self.rt("rt_randomize_i64", vec![seed])?;
            }
            Stmt::If { cond, then_body, elseifs, else_body } => {
                self.if_chain(cond, then_body, elseifs, else_body.as_deref())?
            }
            Stmt::SelectCase { selector, arms, else_body } => self.select_case(selector, arms, else_body.as_deref())?,
            Stmt::While { cond, body } => {
                let head = self.b.create_block("while_head");
                let body_block = self.b.create_block("while_body");
                let exit = self.b.create_block("while_end");
                self.jump(&head);
                self.b.switch_to(&head);
                let c = self.cond(cond)?;
                self.b.cbr(c, &body_block, &exit);
                self.b.switch_to(&body_block);
                self.in_loop(ExitKind::While, &exit, body)?;
                self.jump(&head);
                self.b.switch_to(&exit);
            }
            Stmt::Do { pre, body, post } => self.do_loop(pre.as_ref(), body, post.as_ref())?,
            Stmt::For { var, start, end, step, body, .. } => {
                self.for_loop(&var.node, var.span, start, end, step.as_ref(), body)?
            }
            // Rejected by analysis; nothing to run.
            Stmt::Next { .. } => {}
            Stmt::Exit(kind) => self.exit(*kind, span)?,
            Stmt::Goto(target) => {
                let label = self.label_block(target.node);
                self.jump(&label);
            }
            Stmt::Gosub(target) => self.gosub(target.node)?,
            Stmt::Open { path, mode, channel } => {
                let (p, pt) = self.expr(path)?;
                let p = self.to_str(p, &pt, path.span)?;
                let ch = self.int_expr(channel)?;
                self.rt("rt_open", vec![p, Value::ConstInt(open_mode_code(*mode)), ch])?;
            }
            Stmt::Close { channel } => match channel {
                Some(ch) => {
                    let ch = self.int_expr(ch)?;
                    self.rt("rt_close", vec![ch])?;
                }
                None => {
                    self.rt("rt_close_all", Vec::new())?;
                }
            },
            Stmt::Seek { channel, pos } => {
                let ch = self.int_expr(channel)?;
                let pos = self.int_expr(pos)?;
                self.rt("rt_seek", vec![ch, pos])?;
            }
            Stmt::OnErrorGoto(target) => {
                self.b.eh_pop();
                if let Some(t) = target {
                    let label = self.label_block(t.node);
                    self.b.eh_push(&label);
                }
            }
            Stmt::Resume(kind) => match kind {
                ResumeKind::Same => self.b.resume(Opcode::ResumeSame, None),
                ResumeKind::Next => self.b.resume(Opcode::ResumeNext, None),
                ResumeKind::Label(t) => {
                    let label = self.label_block(t.node);
                    self.b.resume(Opcode::ResumeLabel, Some(&label));
                }
            },
            Stmt::End => {
                self.rt("rt_end", Vec::new())?;
                self.emit_default_return();
            }
            Stmt::Input { prompt, vars } => {
                if let Some(p) = prompt {
                    let s = self.const_string(p);
                    self.rt("rt_print_str", vec![s])?;
                }
                for var in vars {
                    let line = self.rt_value("rt_input_line", Vec::new())?;
                    self.store_line(&var.node, line, var.span)?;
                }
            }
            Stmt::LineInput { channel, target } => {
                let line = match channel {
                    Some(ch) => {
                        let ch = self.int_expr(ch)?;
                        self.rt_value("rt_line_input_ch", vec![ch])?
                    }
                    None => self.rt_value("rt_input_line", Vec::new())?,
                };
                self.store_line(&target.node, line, target.span)?;
            }
            Stmt::Return { value } => self.return_stmt(value.as_ref(), span)?,
            Stmt::Delete { target } => {
                let (obj, class) = self.object(target)?;
                let g = self.g;
                if let Some(dtor) = g.methods.get(&class).and_then(|m| m.get("DESTROY")) {
                    self.b.call(&dtor.ir_name, Type::Void, vec![obj.clone()]);
                }
                self.rt("rt_obj_delete", vec![obj])?;
                if let Expr::Var(name) = &target.node {
                    let slot = self.slot(name);
                    self.b.store(Type::Ptr, slot.ptr, Value::Null);
                }
            }
        }
        Ok(())
    }

    /// Fall through to `label` unless the block already ended.
    fn jump(&mut self, label: &str) {
        if !self.b.is_terminated() {
            self.b.br(label, Vec::new());
        }
    }

    fn int_expr(&mut self, e: &Spanned<Expr>) -> Result<Value, CompileError> {
        let (v, ty) = self.expr(e)?;
        self.to_int(v, &ty, e.span)
    }

    /// `n + 1` elements for an upper bound of `n`.
    fn element_count(&mut self, size: &Spanned<Expr>) -> Result<Value, CompileError> {
        let n = self.int_expr(size)?;
        Ok(self.b.binary(Opcode::IAddOvf, n, Value::ConstInt(1)))
    }

    fn print(&mut self, channel: Option<&Spanned<Expr>>, items: &[PrintItem]) -> Result<(), CompileError> {
        let ch = match channel {
            Some(c) => Some(self.int_expr(c)?),
            None => None,
        };
        for item in items {
            match item {
                PrintItem::Expr(e) => {
                    let (v, ty) = self.expr(e)?;
                    let (suffix, v) = match ty {
                        Ty::Str => ("str", v),
                        Ty::Float => ("f64", v),
                        Ty::Int | Ty::Bool => ("i64", self.to_int(v, &ty, e.span)?),
                        _ => return Err(CompileError::lower("cannot PRINT an object", e.span)),
                    };
                    match &ch {
                        Some(c) => self.rt(&format!("rt_print_ch_{suffix}"), vec![c.clone(), v])?,
                        None => self.rt(&format!("rt_print_{suffix}"), vec![v])?,
                    };
                }
                PrintItem::Comma => {
                    match &ch {
                        Some(c) => self.rt("rt_print_ch_tab", vec![c.clone()])?,
                        None => self.rt("rt_print_tab", Vec::new())?,
                    };
                }
                PrintItem::Semicolon => {}
            }
        }
        if !items.last().is_some_and(PrintItem::is_separator) {
            match ch {
                Some(c) => self.rt("rt_print_ch_nl", vec![c])?,
                None => self.rt("rt_print_nl", Vec::new())?,
            };
        }
        Ok(())
    }

    fn assign(&mut self, target: &Spanned<Expr>, value: &Spanned<Expr>) -> Result<(), CompileError> {
        match &target.node {
            Expr::Var(name) => {
                let (v, ty) = self.expr(value)?;
                let slot = self.slot(name);
                let slot_ty = slot.kind.slot_type();
                let v = self.coerce(v, &ty, slot_ty, value.span)?;
                self.b.store(slot_ty, slot.ptr, v);
            }
            Expr::ArrayElem { name, index } => {
                let (handle, elem) = self.array_handle(&name.node, name.span)?;
                let idx = self.checked_index(&handle, elem, index)?;
                let (v, ty) = self.expr(value)?;
                let (setter, elem_ty) = match elem {
                    Elem::I64 => ("rt_arr_i64_set", Type::I64),
                    Elem::F64 => ("rt_arr_f64_set", Type::F64),
                    Elem::Str => ("rt_arr_str_put", Type::Str),
                };
                let v = self.coerce(v, &ty, elem_ty, value.span)?;
                self.rt(setter, vec![handle, idx, v])?;
            }
            Expr::Member { object, field } => {
                let (obj, class) = self.object(object)?;
                let (index, fty) = self.field(&class, &field.node, field.span)?;
                let (v, ty) = self.expr(value)?;
                let fty = il_type(&fty);
                let setter = match fty {
                    Type::I64 => "rt_obj_set_i64",
                    Type::F64 => "rt_obj_set_f64",
                    Type::Str => "rt_obj_set_str",
                    _ => "rt_obj_set_ptr",
                };
                let v = self.coerce(v, &ty, fty, value.span)?;
                self.rt(setter, vec![obj, Value::ConstInt(index as i64), v])?;
            }
            _ => return Err(CompileError::lower("cannot assign to this expression", target.span)),
        }
        Ok(())
    }

    fn dim(&mut self, name: &str, size: Option<&Spanned<Expr>>, span: Span) -> Result<(), CompileError> {
        let slot = self.slot(name);
        match (&slot.kind, size) {
            (VarKind::Array(elem), Some(size)) => {
                let count = self.element_count(size)?;
                let handle = self.rt_value(&format!("{}_new", elem.prefix()), vec![count])?;
                self.b.store(Type::Ptr, slot.ptr, handle);
            }
            (VarKind::Obj(Some(class)), None) => {
                let is_record = self.g.classes.get(class).is_some_and(|c| c.is_record);
                let v = if is_record {
                    let class = class.clone();
                    self.new_object(&class, &[], span)?.0
                } else {
                    Value::Null
                };
                self.b.store(Type::Ptr, slot.ptr, v);
            }
            (_, Some(_)) => return Err(CompileError::lower(format!("'{name}' is not an array"), span)),
            (kind, None) => {
                let slot_ty = kind.slot_type();
                let zero = match slot_ty {
                    Type::Str => self.const_string(""),
                    Type::F64 => Value::ConstFloat(0.0),
                    Type::Ptr => Value::Null,
                    _ => Value::ConstInt(0),
                };
                self.b.store(slot_ty, slot.ptr, zero);
            }
        }
        Ok(())
    }

    fn if_chain(
        &mut self,
        cond: &Spanned<Expr>,
        then_body: &[Spanned<Stmt>],
        elseifs: &[(Spanned<Expr>, Vec<Spanned<Stmt>>)],
        else_body: Option<&[Spanned<Stmt>]>,
    ) -> Result<(), CompileError> {
        let join = self.b.create_block("if_end");
        let arms = std::iter::once((cond, then_body)).chain(elseifs.iter().map(|(c, b)| (c, b.as_slice())));
        for (c, body) in arms {
            let then_block = self.b.create_block("if_then");
            let next = self.b.create_block("if_else");
            let v = self.cond(c)?;
            self.b.cbr(v, &then_block, &next);
            self.b.switch_to(&then_block);
            self.lower_stmts(body)?;
            self.jump(&join);
            self.b.switch_to(&next);
        }
        if let Some(body) = else_body {
            self.lower_stmts(body)?;
        }
        self.jump(&join);
        self.b.switch_to(&join);
        Ok(())
    }

    fn select_case(
        &mut self,
        selector: &Spanned<Expr>,
        arms: &[CaseArm],
        else_body: Option<&[Spanned<Stmt>]>,
    ) -> Result<(), CompileError> {
        let (sv, st) = self.expr(selector)?;
        let st = if st == Ty::Bool {
            let v = self.to_int(sv.clone(), &st, selector.span)?;
            (v, Ty::Int)
        } else {
            (sv, st)
        };
        let join = self.b.create_block("select_end");
        for arm in arms {
            let body = self.b.create_block("case_body");
            let next_arm = self.b.create_block("case_next");
            for label in &arm.labels {
                let next_label = self.b.create_block("case_test");
                match label {
                    CaseLabel::Value(e) => {
                        let v = self.expr(e)?;
                        let hit = self.compare(BinOp::Eq, st.clone(), v, e.span)?;
                        self.b.cbr(hit, &body, &next_label);
                    }
                    CaseLabel::Is(op, e) => {
                        let v = self.expr(e)?;
                        let hit = self.compare(*op, st.clone(), v, e.span)?;
                        self.b.cbr(hit, &body, &next_label);
                    }
                    CaseLabel::Range(lo, hi) => {
                        let upper = self.b.create_block("case_hi");
                        let l = self.expr(lo)?;
                        let above = self.compare(BinOp::Ge, st.clone(), l, lo.span)?;
                        self.b.cbr(above, &upper, &next_label);
                        self.b.switch_to(&upper);
                        let h = self.expr(hi)?;
                        let below = self.compare(BinOp::Le, st.clone(), h, hi.span)?;
                        self.b.cbr(below, &body, &next_label);
                    }
                }
                self.b.switch_to(&next_label);
            }
            self.jump(&next_arm);
            self.b.switch_to(&body);
            self.lower_stmts(&arm.body)?;
            self.jump(&join);
            self.b.switch_to(&next_arm);
        }
        if let Some(body) = else_body {
            self.lower_stmts(body)?;
        }
        self.jump(&join);
        self.b.switch_to(&join);
        Ok(())
    }

    fn in_loop(&mut self, kind: ExitKind, exit: &str, body: &[Spanned<Stmt>]) -> Result<(), CompileError> {
        self.loops.push((kind, exit.to_string()));
        let r = self.lower_stmts(body);
        self.loops.pop();
        r
    }

    fn do_loop(&mut self, pre: Option<&LoopCond>, body: &[Spanned<Stmt>], post: Option<&LoopCond>) -> Result<(), CompileError> {
        let head = self.b.create_block("do_head");
        let body_block = self.b.create_block("do_body");
        let exit = self.b.create_block("do_end");
        self.jump(&head);
        self.b.switch_to(&head);
        match pre {
            Some(c) => self.loop_test(c, &body_block, &exit)?,
            None => self.jump(&body_block),
        }
        self.b.switch_to(&body_block);
        self.in_loop(ExitKind::Do, &exit, body)?;
        match post {
            Some(c) => self.loop_test(c, &head, &exit)?,
            None => self.jump(&head),
        }
        self.b.switch_to(&exit);
        Ok(())
    }

    /// Branch to `stay` while the loop condition says to keep going.
    fn loop_test(&mut self, c: &LoopCond, stay: &str, leave: &str) -> Result<(), CompileError> {
        let v = self.cond(&c.expr)?;
        match c.kind {
            LoopCondKind::While => self.b.cbr(v, stay, leave),
            LoopCondKind::Until => self.b.cbr(v, leave, stay),
        }
        Ok(())
    }

    fn for_loop(
        &mut self,
        var: &str,
        var_span: Span,
        start: &Spanned<Expr>,
        end: &Spanned<Expr>,
        step: Option<&Spanned<Expr>>,
        body: &[Spanned<Stmt>],
    ) -> Result<(), CompileError> {
        let slot = self.slot(var);
        let (vty, ty) = match slot.kind {
            VarKind::Float => (Type::F64, Ty::Float),
            VarKind::Int => (Type::I64, Ty::Int),
            _ => return Err(CompileError::lower(format!("FOR variable '{var}' must be numeric"), var_span)),
        };
        let (s, sty) = self.expr(start)?;
        let s = self.coerce(s, &sty, vty, start.span)?;
        self.b.store(vty, slot.ptr.clone(), s);
        let (e, ety) = self.expr(end)?;
        let end_v = self.coerce(e, &ety, vty, end.span)?;
        let step_v = match step {
            Some(st) => {
                let (v, t) = self.expr(st)?;
                self.coerce(v, &t, vty, st.span)?
            }
            None if ty == Ty::Float => Value::ConstFloat(1.0),
            None => Value::ConstInt(1),
        };
        let (le, ge, lt, add) = if ty == Ty::Float {
            (Opcode::FCmpLe, Opcode::FCmpGe, Opcode::FCmpLt, Opcode::FAdd)
        } else {
            (Opcode::SCmpLe, Opcode::SCmpGe, Opcode::SCmpLt, Opcode::IAddOvf)
        };

        let head = self.b.create_block("for_head");
        let body_block = self.b.create_block("for_body");
        let inc = self.b.create_block("for_inc");
        let exit = self.b.create_block("for_end");
        self.jump(&head);
        self.b.switch_to(&head);
        let cur = self.b.load(vty, slot.ptr.clone());
        match const_step_sign(step) {
            Some(up) => {
                let c = self.b.binary(if up { le } else { ge }, cur, end_v);
                self.b.cbr(c, &body_block, &exit);
            }
            None => {
                let up = self.b.create_block("for_up");
                let down = self.b.create_block("for_down");
                let zero = if ty == Ty::Float { Value::ConstFloat(0.0) } else { Value::ConstInt(0) };
                let negative = self.b.binary(lt, step_v.clone(), zero);
                self.b.cbr(negative, &down, &up);
                self.b.switch_to(&up);
                let c = self.b.binary(le, cur.clone(), end_v.clone());
                self.b.cbr(c, &body_block, &exit);
                self.b.switch_to(&down);
                let c = self.b.binary(ge, cur, end_v);
                self.b.cbr(c, &body_block, &exit);
            }
        }
        self.b.switch_to(&body_block);
        self.in_loop(ExitKind::For, &exit, body)?;
        self.jump(&inc);
        self.b.switch_to(&inc);
        let cur = self.b.load(vty, slot.ptr.clone());
        let next = self.b.binary(add, cur, step_v);
        self.b.store(vty, slot.ptr, next);
        self.jump(&head);
        self.b.switch_to(&exit);
        Ok(())
    }

    fn exit(&mut self, kind: ExitKind, span: Span) -> Result<(), CompileError> {
        match kind {
            ExitKind::Function | ExitKind::Sub => {
                self.emit_default_return();
                Ok(())
            }
            _ => {
                let target = self
                    .loops
                    .iter()
                    .rev()
                    .find(|(k, _)| *k == kind)
                    .map(|(_, l)| l.clone())
                    .ok_or_else(|| CompileError::lower(format!("EXIT {kind} outside of a {kind}"), span))?;
                self.jump(&target);
                Ok(())
            }
        }
    }

    fn gosub(&mut self, target: i64) -> Result<(), CompileError> {
        let stack = self.gosub_stack();
        let id = self.gosub_sites.len() as i64;
        let cont = self.b.create_block("gosub_ret");
        let list = self.b.load(Type::Ptr, stack);
        self.rt("rt_list_i64_push", vec![list, Value::ConstInt(id)])?;
        let label = self.label_block(target);
        self.jump(&label);
        self.gosub_sites.push((id, cont.clone()));
        self.b.switch_to(&cont);
        Ok(())
    }

    /// RETURN from a GOSUB: pop the site id and dispatch on it.
    fn gosub_return(&mut self) -> Result<(), CompileError> {
        let stack = self.gosub_stack();
        let no_gosub = match &self.no_gosub {
            Some(l) => l.clone(),
            None => {
                let here = self.b.current_label().to_string();
                let l = self.b.create_block("no_gosub");
                self.b.switch_to(&l);
                self.trap_with("RETURN without GOSUB")?;
                self.b.switch_to(&here);
                self.no_gosub = Some(l.clone());
                l
            }
        };
        let list = self.b.load(Type::Ptr, stack);
        let len = self.rt_value("rt_list_i64_len", vec![list.clone()])?;
        let empty = self.b.binary(Opcode::ICmpEq, len, Value::ConstInt(0));
        let pop = self.b.create_block("gosub_pop");
        self.b.cbr(empty, &no_gosub, &pop);
        self.b.switch_to(&pop);
        let id = self.rt_value("rt_list_i64_pop", vec![list])?;
        let id = self.b.unary(Opcode::CastSiNarrowChk, id);
        self.b.switch_i32(id, &no_gosub, &[]);
        self.gosub_switches.push(pop);
        Ok(())
    }

    fn return_stmt(&mut self, value: Option<&Spanned<Expr>>, span: Span) -> Result<(), CompileError> {
        match (self.kind, value) {
            (BodyKind::Function(ret), Some(v)) => {
                let (val, ty) = self.expr(v)?;
                let val = self.coerce(val, &ty, ret, v.span)?;
                self.b.ret(Some(val));
            }
            (BodyKind::Main, None) => self.gosub_return()?,
            (BodyKind::Sub, None) | (BodyKind::Function(_), None) => self.emit_default_return(),
            (_, Some(v)) => return Err(CompileError::lower("RETURN with a value outside FUNCTION", v.span.to(span))),
        }
        Ok(())
    }

    /// Store a line read by INPUT into `name`, converting by the slot kind.
    fn store_line(&mut self, name: &str, line: Value, span: Span) -> Result<(), CompileError> {
        let slot = self.slot(name);
        let v = match slot.kind {
            VarKind::Str => line,
            VarKind::Int => self.rt_value("rt_to_int", vec![line])?,
            VarKind::Float => self.rt_value("rt_val", vec![line])?,
            _ => return Err(CompileError::lower(format!("cannot INPUT into '{name}'"), span)),
        };
        self.b.store(slot.kind.slot_type(), slot.ptr, v);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::il::{Opcode, print_module};
    use crate::lower::tests::lower;

    #[test]
    fn for_with_constant_step_uses_one_compare() {
        let m = lower("FOR i = 1 TO 3\n PRINT i\nNEXT i\n");
        let text = print_module(&m);
        assert!(text.contains("scmp_le"), "{text}");
        assert!(!text.contains("for_up"), "{text}");
    }

    #[test]
    fn for_with_dynamic_step_branches_on_its_sign() {
        let m = lower("s = -1\nFOR i = 3 TO 1 STEP s\n PRINT i\nNEXT\n");
        let text = print_module(&m);
        assert!(text.contains("for_up"), "{text}");
        assert!(text.contains("for_down"), "{text}");
    }

    #[test]
    fn gosub_return_dispatches_through_a_switch() {
        let m = lower("GOSUB 100\nPRINT \"back\"\nEND\n100 PRINT \"sub\"\nRETURN\n");
        let main = m.function("main").unwrap();
        let switch = main
            .blocks
            .iter()
            .filter_map(|b| b.terminator())
            .find(|t| t.op == Opcode::SwitchI32)
            .unwrap();
        assert_eq!(switch.labels.len(), 2);
        assert!(switch.labels[1].starts_with("gosub_ret"));
        assert_eq!(main.calls_to("rt_end"), 1);
    }

    #[test]
    fn on_error_pushes_a_handler() {
        let m = lower("ON ERROR GOTO 100\ny = 0\nx = 1 \\ y\nEND\n100 PRINT ERR()\nRESUME NEXT\n");
        let text = print_module(&m);
        assert!(text.contains("eh.push L100"), "{text}");
        assert!(text.contains("resume.next"), "{text}");
    }

    #[test]
    fn select_case_handles_ranges_and_is() {
        let m = lower(
            "x = 5\nSELECT CASE x\nCASE 1, 2\n PRINT \"low\"\nCASE 3 TO 6\n PRINT \"mid\"\nCASE IS > 6\n PRINT \"high\"\nCASE ELSE\n PRINT \"none\"\nEND SELECT\n",
        );
        let text = print_module(&m);
        assert!(text.contains("scmp_ge"), "{text}");
        assert!(text.contains("scmp_gt"), "{text}");
    }

    #[test]
    fn print_separators_control_the_newline() {
        let m = lower("PRINT 1;\nPRINT 1, 2\n");
        let main = m.function("main").unwrap();
        assert_eq!(main.calls_to("rt_print_nl"), 1);
        assert_eq!(main.calls_to("rt_print_tab"), 1);
    }
}
