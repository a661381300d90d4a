//! Variable kinds, collected before a body is lowered.

use std::collections::{HashMap, HashSet};

use super::{ProcInfo, VarKind};
use crate::parser::ast::{Expr, Stmt, TypeName};
use crate::sema::ClassIndex;
use crate::span::Spanned;
use crate::visit::{Visitor, walk_expr, walk_stmt};

/// Records what each variable of a body holds. Variables that never show
/// up here get the kind their suffix implies.
pub(super) struct VarCollector<'a> {
    pub procs: &'a HashMap<String, ProcInfo>,
    pub classes: &'a ClassIndex,
    pub me: Option<&'a str>,
    pub kinds: HashMap<String, VarKind>,
    /// Variables the body may write, directly or through a BYREF argument.
    pub written: HashSet<String>,
}

impl<'a> VarCollector<'a> {
    pub fn new(procs: &'a HashMap<String, ProcInfo>, classes: &'a ClassIndex, me: Option<&'a str>) -> Self {
        VarCollector { procs, classes, me, kinds: HashMap::new(), written: HashSet::new() }
    }

    /// Class of an object-valued expression, when it can be told statically.
    fn static_class(&self, e: &Expr) -> Option<String> {
        match e {
            Expr::New { class, .. } => Some(class.node.clone()),
            Expr::Me => self.me.map(str::to_string),
            Expr::Var(name) => match self.kinds.get(name) {
                Some(VarKind::Obj(c)) => c.clone(),
                _ => None,
            },
            Expr::Call { name, .. } => match self.procs.get(&name.node)?.ret.as_ref()? {
                TypeName::Class(c) => Some(c.clone()),
                _ => None,
            },
            Expr::Member { object, field } => {
                let class = self.static_class(&object.node)?;
                match self.classes.get(&class)?.field(&field.node)?.1 {
                    TypeName::Class(c) => Some(c.clone()),
                    _ => None,
                }
            }
            Expr::MethodCall { object, method, .. } => {
                let class = self.static_class(&object.node)?;
                match self.classes.get(&class)?.methods.get(&method.node)?.ret.as_ref()? {
                    TypeName::Class(c) => Some(c.clone()),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl Visitor for VarCollector<'_> {
    fn visit_stmt(&mut self, stmt: &Spanned<Stmt>) {
        match &stmt.node {
            Stmt::Dim { name, size, ty } => {
                self.written.insert(name.node.clone());
                let ty = ty.clone().unwrap_or_else(|| TypeName::from_suffix(&name.node));
                let kind = if size.is_some() { VarKind::array_of(&ty) } else { VarKind::of(&ty) };
                self.kinds.insert(name.node.clone(), kind);
            }
            Stmt::Let { target, value } => {
                if let Expr::Var(name) = &target.node {
                    self.written.insert(name.clone());
                    if let Some(class) = self.static_class(&value.node) {
                        self.kinds.insert(name.clone(), VarKind::Obj(Some(class)));
                    }
                }
            }
            Stmt::ReDim { name, .. } | Stmt::For { var: name, .. } | Stmt::LineInput { target: name, .. } => {
                self.written.insert(name.node.clone());
            }
            Stmt::Input { vars, .. } => self.written.extend(vars.iter().map(|v| v.node.clone())),
            Stmt::Delete { target } => {
                if let Expr::Var(name) = &target.node {
                    self.written.insert(name.clone());
                }
            }
            _ => {}
        }
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Spanned<Expr>) {
        if let Expr::Call { args, .. } | Expr::New { args, .. } | Expr::MethodCall { args, .. } = &expr.node {
            for a in args {
                if let Expr::Var(name) = &a.node {
                    self.written.insert(name.clone());
                }
            }
        }
        walk_expr(self, expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticEmitter;
    use crate::lower::Elem;
    use crate::parser::parse_source;
    use crate::sema::analyze;

    #[test]
    fn dims_and_object_assignments_are_recorded() {
        let src = "CLASS P\n x AS INTEGER\nEND CLASS\nDIM a(3) AS DOUBLE\nDIM s AS STRING\np = NEW P()\nq = p\n";
        let mut prog = parse_source(src).unwrap();
        let mut de = DiagnosticEmitter::new();
        analyze(&mut prog, &mut de);
        let classes = ClassIndex::build(&prog, &mut de);
        let procs = HashMap::new();
        let mut c = VarCollector::new(&procs, &classes, None);
        c.visit_body(&prog.main);
        let a = c.kinds.iter().find(|(k, _)| k.starts_with("a_")).map(|(_, v)| v.clone());
        assert_eq!(a, Some(VarKind::Array(Elem::F64)));
        assert!(c.kinds.values().any(|k| *k == VarKind::Str));
        assert_eq!(c.kinds.get("p"), Some(&VarKind::Obj(Some("P".into()))));
        assert_eq!(c.kinds.get("q"), Some(&VarKind::Obj(Some("P".into()))));
    }

    #[test]
    fn call_arguments_count_as_writes() {
        let src = "SUB bump(BYREF k AS INTEGER)\n k = k + 1\nEND SUB\nx = 1\nPRINT y\nbump x\n";
        let mut prog = parse_source(src).unwrap();
        let mut de = DiagnosticEmitter::new();
        analyze(&mut prog, &mut de);
        let classes = ClassIndex::build(&prog, &mut de);
        let procs = HashMap::new();
        let mut c = VarCollector::new(&procs, &classes, None);
        c.visit_body(&prog.main);
        assert!(c.written.contains("x"));
        assert!(!c.written.contains("y"));
    }
}
