use super::{ArrayInfo, SemType, SemanticAnalyzer};
use crate::diagnostics::Severity;
use crate::parser::ast::*;
use crate::span::{Span, Spanned};

impl SemanticAnalyzer<'_> {
    pub(super) fn stmt(&mut self, stmt: &mut Spanned<Stmt>) {
        let span = stmt.span;
        match &mut stmt.node {
            Stmt::Label(_) | Stmt::Cls | Stmt::End => {}
            Stmt::Print { channel, items } => {
                if let Some(ch) = channel {
                    self.expect_numeric(ch, "channel type mismatch");
                }
                for item in items {
                    if let PrintItem::Expr(e) = item {
                        self.expr(e);
                    }
                }
            }
            Stmt::Call(call) => self.call_stmt(call),
            Stmt::Color { fg, bg } => {
                self.expect_numeric(fg, "operand type mismatch");
                if let Some(bg) = bg {
                    self.expect_numeric(bg, "operand type mismatch");
                }
            }
            Stmt::Locate { row, col } => {
                self.expect_numeric(row, "operand type mismatch");
                if let Some(col) = col {
                    self.expect_numeric(col, "operand type mismatch");
                }
            }
            Stmt::Let { target, value } => self.let_stmt(target, value, span),
            Stmt::Dim { name, size, ty } => self.dim(name, size.as_mut(), ty, span),
            Stmt::ReDim { name, size } => {
                let resolved = self.resolve(&name.node);
                if self.body.arrays.contains_key(&resolved) {
                    name.node = resolved;
                } else {
                    self.de.error("B1001", name.span, format!("unknown array '{}'", name.node));
                }
                let ty = self.expr(size);
                if !ty.is_int_or_unknown() {
                    self.de.error("B2001", span, "size type mismatch");
                }
            }
            Stmt::Randomize { seed } => {
                if let Some(seed) = seed {
                    let ty = self.expr(seed);
                    if !ty.is_numeric_or_unknown() {
                        self.de.error("B2001", span, "seed type mismatch");
                    }
                }
            }
            Stmt::If { cond, then_body, elseifs, else_body } => {
                self.condition(cond);
                self.in_nested_scope(|sa| sa.body_stmts(then_body));
                for (c, body) in elseifs {
                    self.condition(c);
                    self.in_nested_scope(|sa| sa.body_stmts(body));
                }
                if let Some(body) = else_body {
                    self.in_nested_scope(|sa| sa.body_stmts(body));
                }
            }
            Stmt::SelectCase { selector, arms, else_body } => {
                let sel = self.expr(selector);
                if sel == SemType::Float {
                    self.de.error("B2001", selector.span, "SELECT CASE selector must be integer or string");
                }
                for arm in arms {
                    for label in &mut arm.labels {
                        self.case_label(label, sel);
                    }
                    self.in_nested_scope(|sa| sa.body_stmts(&mut arm.body));
                }
                if let Some(body) = else_body {
                    self.in_nested_scope(|sa| sa.body_stmts(body));
                }
            }
            Stmt::While { cond, body } => {
                self.condition(cond);
                self.loop_body(ExitKind::While, body);
            }
            Stmt::Do { pre, body, post } => {
                if let Some(c) = pre {
                    self.condition(&mut c.expr);
                }
                self.loop_body(ExitKind::Do, body);
                if let Some(c) = post {
                    self.condition(&mut c.expr);
                }
            }
            Stmt::For { var, start, end, step, body, next_var } => {
                self.for_stmt(var, start, end, step.as_mut(), body, next_var.as_mut())
            }
            Stmt::Next { var } => self.orphan_next(var.as_ref(), span),
            Stmt::Exit(kind) => self.exit(*kind, span),
            Stmt::Goto(target) | Stmt::Gosub(target) => self.check_label(target),
            Stmt::Open { path, channel, .. } => {
                let ty = self.expr(path);
                if !ty.is_string_or_unknown() {
                    self.de.error("B2001", path.span, "file name must be a string");
                }
                self.expect_numeric(channel, "channel type mismatch");
            }
            Stmt::Close { channel } => {
                if let Some(ch) = channel {
                    self.expect_numeric(ch, "channel type mismatch");
                }
            }
            Stmt::Seek { channel, pos } => {
                self.expect_numeric(channel, "channel type mismatch");
                self.expect_numeric(pos, "operand type mismatch");
            }
            Stmt::OnErrorGoto(target) => {
                if let Some(t) = target {
                    self.check_label(t);
                }
            }
            Stmt::Resume(kind) => {
                if let ResumeKind::Label(t) = kind {
                    self.check_label(t);
                }
            }
            Stmt::Input { vars, .. } => {
                for var in vars {
                    var.node = self.resolve(&var.node);
                    self.body.symbols.insert(var.node.clone());
                    // The suffix decides, even over an earlier declaration.
                    self.body.var_types.insert(var.node.clone(), SemType::from_suffix(&var.node));
                }
            }
            Stmt::LineInput { channel, target } => {
                if let Some(ch) = channel {
                    self.expect_numeric(ch, "channel type mismatch");
                }
                target.node = self.resolve(&target.node);
                let ty = self.var_type(&target.node);
                if ty != SemType::String {
                    self.de.error("B2001", target.span, "LINE INPUT target must be a string variable");
                }
                self.body.symbols.insert(target.node.clone());
                self.body.var_types.insert(target.node.clone(), SemType::String);
            }
            Stmt::Return { value } => self.return_stmt(value.as_mut(), span),
            Stmt::Delete { target } => {
                self.expr(target);
                if self.object_class(&target.node).is_none() {
                    self.de.error("B2001", target.span, "DELETE expects an object");
                }
            }
        }
    }

    pub(super) fn body_stmts(&mut self, body: &mut [Spanned<Stmt>]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    fn loop_body(&mut self, kind: ExitKind, body: &mut [Spanned<Stmt>]) {
        self.body.loops.push(kind);
        self.in_nested_scope(|sa| sa.body_stmts(body));
        self.body.loops.pop();
    }

    fn expect_numeric(&mut self, e: &mut Spanned<Expr>, msg: &str) {
        let ty = self.expr(e);
        if !ty.is_numeric_or_unknown() {
            self.de.error("B2001", e.span, msg.to_string());
        }
    }

    fn condition(&mut self, e: &mut Spanned<Expr>) {
        self.expect_numeric(e, "condition type mismatch");
    }

    fn check_label(&mut self, target: &Spanned<i64>) {
        if !self.body.labels.contains(&target.node) {
            self.de.error("B1003", target.span, format!("unknown line {}", target.node));
        }
    }

    /// Declared type of a variable: explicit declaration, else its suffix.
    pub(super) fn var_type(&self, name: &str) -> SemType {
        self.body.var_types.get(name).copied().unwrap_or_else(|| SemType::from_suffix(name))
    }

    fn call_stmt(&mut self, call: &mut Spanned<Expr>) {
        let span = call.span;
        match &mut call.node {
            Expr::Call { name, args } => {
                self.user_call(name, args, span, true);
            }
            _ => {
                self.expr(call);
            }
        }
    }

    fn let_stmt(&mut self, target: &mut Spanned<Expr>, value: &mut Spanned<Expr>, span: Span) {
        let target_span = target.span;
        if matches!(target.node, Expr::Member { .. }) {
            let field_ty = self.expr(target);
            let value_ty = self.expr(value);
            if !field_ty.accepts(value_ty) {
                self.de.error("B2001", span, "operand type mismatch");
            }
            return;
        }
        match &mut target.node {
            Expr::Var(name) => {
                *name = self.resolve(name);
                let name = name.clone();
                let value_ty = self.expr(value);
                let value_class = self.object_class(&value.node);
                self.body.symbols.insert(name.clone());
                if let Some(class) = self.body.objects.get(&name).cloned() {
                    if value_class.is_none() && value_ty != SemType::Unknown {
                        self.de.error("B2001", span, format!("cannot assign {value_ty} to object of class '{class}'"));
                    }
                    return;
                }
                if let Some(class) = value_class {
                    self.body.objects.insert(name, class);
                    return;
                }
                let var_ty = self.var_type(&name);
                if !var_ty.accepts(value_ty) {
                    self.de.error("B2001", span, "operand type mismatch");
                }
                self.body.var_types.insert(name, var_ty);
            }
            Expr::ArrayElem { name, index } => {
                let elem = self.array_elem(name, index, target_span);
                let value_ty = self.expr(value);
                if let Some(elem) = elem
                    && !elem.accepts(value_ty)
                {
                    self.de.error("B2001", span, "operand type mismatch");
                }
            }
            _ => {
                self.expr(value);
                self.de.error("B2007", target_span, "left-hand side of LET must be a variable or array element");
            }
        }
    }

    fn dim(&mut self, name: &mut Spanned<String>, size: Option<&mut Spanned<Expr>>, ty: &mut Option<TypeName>, span: Span) {
        let declared = ty.clone().unwrap_or_else(|| TypeName::from_suffix(&name.node));
        let is_array = size.is_some();
        let mut upper = None;
        if let Some(size) = size {
            let size_ty = self.expr(size);
            if !size_ty.is_int_or_unknown() {
                self.de.error("B2001", span, "size type mismatch");
            }
            if let Some(n) = size.node.as_const_int() {
                if n <= 0 {
                    self.de.error("B2003", size.span, "array size must be positive");
                }
                upper = Some(n);
            }
            if matches!(declared, TypeName::Class(_)) {
                self.de.error("B2004", name.span, "array elements must be INTEGER, DOUBLE or STRING");
            }
        }
        if let TypeName::Class(c) = &declared {
            self.check_class_exists(c, name.span);
        }

        if self.body.scopes.declared_here(&name.node) {
            self.de.error("B1006", name.span, format!("duplicate local '{}'", name.node));
            return;
        }
        let unique = self.declare_local(&name.node);
        name.node = unique.clone();
        *ty = Some(declared.clone());

        let sem = SemType::of(&declared);
        self.body.var_types.insert(unique.clone(), sem);
        if is_array {
            self.body.arrays.insert(unique, ArrayInfo { elem: sem, upper });
        } else if let TypeName::Class(c) = declared {
            self.body.objects.insert(unique, c);
        }
    }

    fn for_stmt(
        &mut self,
        var: &mut Spanned<String>,
        start: &mut Spanned<Expr>,
        end: &mut Spanned<Expr>,
        step: Option<&mut Spanned<Expr>>,
        body: &mut [Spanned<Stmt>],
        next_var: Option<&mut Spanned<String>>,
    ) {
        var.node = self.resolve(&var.node);
        self.body.symbols.insert(var.node.clone());
        let var_ty = self.var_type(&var.node);
        if !matches!(var_ty, SemType::Int | SemType::Float) {
            self.de.error("B2001", var.span, "FOR variable must be numeric");
        }
        self.body.var_types.insert(var.node.clone(), var_ty);
        self.expect_numeric(start, "operand type mismatch");
        self.expect_numeric(end, "operand type mismatch");
        if let Some(step) = step {
            self.expect_numeric(step, "operand type mismatch");
        }

        self.body.for_stack.push(var.node.clone());
        self.loop_body(ExitKind::For, body);
        self.body.for_stack.pop();

        if let Some(next) = next_var {
            next.node = self.resolve(&next.node);
            if next.node != var.node {
                self.de.error(
                    "B1002",
                    next.span,
                    format!("mismatched NEXT '{}', expected '{}'", next.node, var.node),
                );
            }
        }
    }

    fn orphan_next(&mut self, var: Option<&Spanned<String>>, span: Span) {
        let mut msg = String::from("mismatched NEXT");
        if let Some(v) = var {
            msg.push_str(&format!(" '{}'", v.node));
        }
        match self.body.for_stack.last() {
            Some(open) => msg.push_str(&format!(", expected '{open}'")),
            None => msg.push_str(", no active FOR"),
        }
        self.de.error("B1002", span, msg);
    }

    fn exit(&mut self, kind: ExitKind, span: Span) {
        let ok = match kind {
            ExitKind::For | ExitKind::While | ExitKind::Do => self.body.loops.contains(&kind),
            ExitKind::Function => self.ctx.kind == Some(ProcKind::Function),
            ExitKind::Sub => self.ctx.kind == Some(ProcKind::Sub),
        };
        if !ok {
            self.de.error("B1008", span, format!("EXIT {kind} outside of a {kind}"));
        }
    }

    fn return_stmt(&mut self, value: Option<&mut Spanned<Expr>>, span: Span) {
        match (self.ctx.kind, value) {
            (Some(ProcKind::Function), Some(v)) => {
                let ty = self.expr(v);
                let ret = self.ctx.ret.unwrap_or(SemType::Unknown);
                let numeric_pair = ret.is_numeric_or_unknown() && ty.is_numeric_or_unknown();
                if !ret.accepts(ty) && !numeric_pair {
                    self.de.error("B2001", v.span, "return type mismatch");
                }
            }
            (Some(ProcKind::Function), None) => {
                self.de.emit(
                    Severity::Error,
                    "B2001",
                    span,
                    format!("RETURN in FUNCTION {} needs a value", self.ctx.name),
                );
            }
            (_, Some(v)) => {
                self.expr(v);
                self.de.error("B2001", v.span, "RETURN with a value outside FUNCTION");
            }
            (_, None) => {}
        }
    }

    fn case_label(&mut self, label: &mut CaseLabel, selector: SemType) {
        let check = |sa: &mut Self, e: &mut Spanned<Expr>| {
            let ty = sa.expr(e);
            let ok = match selector {
                SemType::String => ty.is_string_or_unknown(),
                SemType::Unknown => true,
                _ => ty.is_int_or_unknown(),
            };
            if !ok {
                sa.de.error("B2001", e.span, "CASE label type mismatch");
            }
        };
        match label {
            CaseLabel::Value(e) | CaseLabel::Is(_, e) => check(self, e),
            CaseLabel::Range(lo, hi) => {
                check(self, lo);
                check(self, hi);
            }
        }
    }
}
