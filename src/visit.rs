//! AST visitor infrastructure
//!
//! Two visitor traits and matching walk functions:
//!
//! - `Visitor`: shared-reference traversal (analysis and collection passes)
//! - `VisitMut`: mutable traversal (in-place rewriting)
//!
//! Override only the methods you need and call the corresponding `walk_*`
//! function inside the override to keep the default recursion. Leaving the
//! walk call out prunes traversal at that node.
//!
//! ```rust
//! use ilc::visit::{Visitor, walk_expr};
//! use ilc::parser::ast::Expr;
//! use ilc::span::Spanned;
//! use std::collections::HashSet;
//!
//! struct VarCollector {
//!     names: HashSet<String>,
//! }
//!
//! impl Visitor for VarCollector {
//!     fn visit_expr(&mut self, expr: &Spanned<Expr>) {
//!         if let Expr::Var(name) = &expr.node {
//!             self.names.insert(name.clone());
//!         }
//!         walk_expr(self, expr);
//!     }
//! }
//! ```
//!
//! Passes where most arms need custom logic (lowering, the analyzer's
//! statement checks) match on the tree directly instead.

use crate::parser::ast::*;
use crate::span::Spanned;

// ============================================================================
// Visitor (read-only)
// ============================================================================

pub trait Visitor: Sized {
    fn visit_program(&mut self, program: &Program) {
        walk_program(self, program);
    }

    fn visit_proc(&mut self, proc: &Spanned<Proc>) {
        walk_proc(self, proc);
    }

    fn visit_class(&mut self, class: &Spanned<ClassDecl>) {
        walk_class(self, class);
    }

    fn visit_body(&mut self, body: &[Spanned<Stmt>]) {
        walk_body(self, body);
    }

    fn visit_stmt(&mut self, stmt: &Spanned<Stmt>) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Spanned<Expr>) {
        walk_expr(self, expr);
    }
}

pub fn walk_program<V: Visitor>(v: &mut V, program: &Program) {
    for class in &program.classes {
        v.visit_class(class);
    }
    for proc in &program.procs {
        v.visit_proc(proc);
    }
    v.visit_body(&program.main);
}

pub fn walk_proc<V: Visitor>(v: &mut V, proc: &Spanned<Proc>) {
    v.visit_body(&proc.node.body);
}

pub fn walk_class<V: Visitor>(v: &mut V, class: &Spanned<ClassDecl>) {
    let c = &class.node;
    if let Some(ctor) = &c.ctor {
        v.visit_proc(ctor);
    }
    if let Some(dtor) = &c.dtor {
        v.visit_proc(dtor);
    }
    for m in &c.methods {
        v.visit_proc(m);
    }
}

pub fn walk_body<V: Visitor>(v: &mut V, body: &[Spanned<Stmt>]) {
    for stmt in body {
        v.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: Visitor>(v: &mut V, stmt: &Spanned<Stmt>) {
    match &stmt.node {
        Stmt::Label(_)
        | Stmt::Cls
        | Stmt::Exit(_)
        | Stmt::Goto(_)
        | Stmt::Gosub(_)
        | Stmt::OnErrorGoto(_)
        | Stmt::Resume(_)
        | Stmt::End
        | Stmt::Input { .. }
        | Stmt::Next { .. } => {}
        Stmt::Print { channel, items } => {
            if let Some(ch) = channel {
                v.visit_expr(ch);
            }
            for item in items {
                if let PrintItem::Expr(e) = item {
                    v.visit_expr(e);
                }
            }
        }
        Stmt::Call(e) | Stmt::Delete { target: e } => v.visit_expr(e),
        Stmt::Color { fg: a, bg: b } | Stmt::Locate { row: a, col: b } => {
            v.visit_expr(a);
            if let Some(b) = b {
                v.visit_expr(b);
            }
        }
        Stmt::Let { target, value } => {
            v.visit_expr(target);
            v.visit_expr(value);
        }
        Stmt::Dim { size, .. } => {
            if let Some(size) = size {
                v.visit_expr(size);
            }
        }
        Stmt::ReDim { size, .. } => v.visit_expr(size),
        Stmt::Randomize { seed: e } | Stmt::Return { value: e } | Stmt::Close { channel: e } => {
            if let Some(e) = e {
                v.visit_expr(e);
            }
        }
        Stmt::If { cond, then_body, elseifs, else_body } => {
            v.visit_expr(cond);
            v.visit_body(then_body);
            for (c, body) in elseifs {
                v.visit_expr(c);
                v.visit_body(body);
            }
            if let Some(body) = else_body {
                v.visit_body(body);
            }
        }
        Stmt::SelectCase { selector, arms, else_body } => {
            v.visit_expr(selector);
            for arm in arms {
                for label in &arm.labels {
                    match label {
                        CaseLabel::Value(e) | CaseLabel::Is(_, e) => v.visit_expr(e),
                        CaseLabel::Range(lo, hi) => {
                            v.visit_expr(lo);
                            v.visit_expr(hi);
                        }
                    }
                }
                v.visit_body(&arm.body);
            }
            if let Some(body) = else_body {
                v.visit_body(body);
            }
        }
        Stmt::While { cond, body } => {
            v.visit_expr(cond);
            v.visit_body(body);
        }
        Stmt::Do { pre, body, post } => {
            if let Some(c) = pre {
                v.visit_expr(&c.expr);
            }
            v.visit_body(body);
            if let Some(c) = post {
                v.visit_expr(&c.expr);
            }
        }
        Stmt::For { start, end, step, body, .. } => {
            v.visit_expr(start);
            v.visit_expr(end);
            if let Some(step) = step {
                v.visit_expr(step);
            }
            v.visit_body(body);
        }
        Stmt::Open { path, channel, .. } => {
            v.visit_expr(path);
            v.visit_expr(channel);
        }
        Stmt::Seek { channel, pos } => {
            v.visit_expr(channel);
            v.visit_expr(pos);
        }
        Stmt::LineInput { channel, .. } => {
            if let Some(ch) = channel {
                v.visit_expr(ch);
            }
        }
    }
}

pub fn walk_expr<V: Visitor>(v: &mut V, expr: &Spanned<Expr>) {
    match &expr.node {
        Expr::IntLit(_)
        | Expr::FloatLit(_)
        | Expr::StringLit(_)
        | Expr::BoolLit(_)
        | Expr::Var(_)
        | Expr::LBound { .. }
        | Expr::UBound { .. }
        | Expr::Me => {}
        Expr::ArrayElem { index, .. } => v.visit_expr(index),
        Expr::Unary { operand, .. } => v.visit_expr(operand),
        Expr::Binary { lhs, rhs, .. } => {
            v.visit_expr(lhs);
            v.visit_expr(rhs);
        }
        Expr::Builtin { args, .. } | Expr::Call { args, .. } | Expr::New { args, .. } => {
            for a in args {
                v.visit_expr(a);
            }
        }
        Expr::Member { object, .. } => v.visit_expr(object),
        Expr::MethodCall { object, args, .. } => {
            v.visit_expr(object);
            for a in args {
                v.visit_expr(a);
            }
        }
    }
}

// ============================================================================
// VisitMut (in-place rewriting)
// ============================================================================

pub trait VisitMut: Sized {
    fn visit_program_mut(&mut self, program: &mut Program) {
        walk_program_mut(self, program);
    }

    fn visit_proc_mut(&mut self, proc: &mut Spanned<Proc>) {
        walk_proc_mut(self, proc);
    }

    fn visit_body_mut(&mut self, body: &mut [Spanned<Stmt>]) {
        walk_body_mut(self, body);
    }

    fn visit_stmt_mut(&mut self, stmt: &mut Spanned<Stmt>) {
        walk_stmt_mut(self, stmt);
    }

    fn visit_expr_mut(&mut self, expr: &mut Spanned<Expr>) {
        walk_expr_mut(self, expr);
    }
}

pub fn walk_program_mut<V: VisitMut>(v: &mut V, program: &mut Program) {
    for class in &mut program.classes {
        let c = &mut class.node;
        if let Some(ctor) = &mut c.ctor {
            v.visit_proc_mut(ctor);
        }
        if let Some(dtor) = &mut c.dtor {
            v.visit_proc_mut(dtor);
        }
        for m in &mut c.methods {
            v.visit_proc_mut(m);
        }
    }
    for proc in &mut program.procs {
        v.visit_proc_mut(proc);
    }
    v.visit_body_mut(&mut program.main);
}

pub fn walk_proc_mut<V: VisitMut>(v: &mut V, proc: &mut Spanned<Proc>) {
    v.visit_body_mut(&mut proc.node.body);
}

pub fn walk_body_mut<V: VisitMut>(v: &mut V, body: &mut [Spanned<Stmt>]) {
    for stmt in body {
        v.visit_stmt_mut(stmt);
    }
}

pub fn walk_stmt_mut<V: VisitMut>(v: &mut V, stmt: &mut Spanned<Stmt>) {
    match &mut stmt.node {
        Stmt::Label(_)
        | Stmt::Cls
        | Stmt::Exit(_)
        | Stmt::Goto(_)
        | Stmt::Gosub(_)
        | Stmt::OnErrorGoto(_)
        | Stmt::Resume(_)
        | Stmt::End
        | Stmt::Input { .. }
        | Stmt::Next { .. } => {}
        Stmt::Print { channel, items } => {
            if let Some(ch) = channel {
                v.visit_expr_mut(ch);
            }
            for item in items {
                if let PrintItem::Expr(e) = item {
                    v.visit_expr_mut(e);
                }
            }
        }
        Stmt::Call(e) | Stmt::Delete { target: e } => v.visit_expr_mut(e),
        Stmt::Color { fg: a, bg: b } | Stmt::Locate { row: a, col: b } => {
            v.visit_expr_mut(a);
            if let Some(b) = b {
                v.visit_expr_mut(b);
            }
        }
        Stmt::Let { target, value } => {
            v.visit_expr_mut(target);
            v.visit_expr_mut(value);
        }
        Stmt::Dim { size, .. } => {
            if let Some(size) = size {
                v.visit_expr_mut(size);
            }
        }
        Stmt::ReDim { size, .. } => v.visit_expr_mut(size),
        Stmt::Randomize { seed: e } | Stmt::Return { value: e } | Stmt::Close { channel: e } => {
            if let Some(e) = e {
                v.visit_expr_mut(e);
            }
        }
        Stmt::If { cond, then_body, elseifs, else_body } => {
            v.visit_expr_mut(cond);
            v.visit_body_mut(then_body);
            for (c, body) in elseifs {
                v.visit_expr_mut(c);
                v.visit_body_mut(body);
            }
            if let Some(body) = else_body {
                v.visit_body_mut(body);
            }
        }
        Stmt::SelectCase { selector, arms, else_body } => {
            v.visit_expr_mut(selector);
            for arm in arms {
                for label in &mut arm.labels {
                    match label {
                        CaseLabel::Value(e) | CaseLabel::Is(_, e) => v.visit_expr_mut(e),
                        CaseLabel::Range(lo, hi) => {
                            v.visit_expr_mut(lo);
                            v.visit_expr_mut(hi);
                        }
                    }
                }
                v.visit_body_mut(&mut arm.body);
            }
            if let Some(body) = else_body {
                v.visit_body_mut(body);
            }
        }
        Stmt::While { cond, body } => {
            v.visit_expr_mut(cond);
            v.visit_body_mut(body);
        }
        Stmt::Do { pre, body, post } => {
            if let Some(c) = pre {
                v.visit_expr_mut(&mut c.expr);
            }
            v.visit_body_mut(body);
            if let Some(c) = post {
                v.visit_expr_mut(&mut c.expr);
            }
        }
        Stmt::For { start, end, step, body, .. } => {
            v.visit_expr_mut(start);
            v.visit_expr_mut(end);
            if let Some(step) = step {
                v.visit_expr_mut(step);
            }
            v.visit_body_mut(body);
        }
        Stmt::Open { path, channel, .. } => {
            v.visit_expr_mut(path);
            v.visit_expr_mut(channel);
        }
        Stmt::Seek { channel, pos } => {
            v.visit_expr_mut(channel);
            v.visit_expr_mut(pos);
        }
        Stmt::LineInput { channel, .. } => {
            if let Some(ch) = channel {
                v.visit_expr_mut(ch);
            }
        }
    }
}

pub fn walk_expr_mut<V: VisitMut>(v: &mut V, expr: &mut Spanned<Expr>) {
    match &mut expr.node {
        Expr::IntLit(_)
        | Expr::FloatLit(_)
        | Expr::StringLit(_)
        | Expr::BoolLit(_)
        | Expr::Var(_)
        | Expr::LBound { .. }
        | Expr::UBound { .. }
        | Expr::Me => {}
        Expr::ArrayElem { index, .. } => v.visit_expr_mut(index),
        Expr::Unary { operand, .. } => v.visit_expr_mut(operand),
        Expr::Binary { lhs, rhs, .. } => {
            v.visit_expr_mut(lhs);
            v.visit_expr_mut(rhs);
        }
        Expr::Builtin { args, .. } | Expr::Call { args, .. } | Expr::New { args, .. } => {
            for a in args {
                v.visit_expr_mut(a);
            }
        }
        Expr::Member { object, .. } => v.visit_expr_mut(object),
        Expr::MethodCall { object, args, .. } => {
            v.visit_expr_mut(object);
            for a in args {
                v.visit_expr_mut(a);
            }
        }
    }
}
