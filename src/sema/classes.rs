use std::collections::HashMap;

use super::ProcSignature;
use crate::diagnostics::DiagnosticEmitter;
use crate::parser::ast::{ClassDecl, Program, TypeName};
use crate::span::Span;

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    pub is_record: bool,
    /// Fields in declaration order; the index is the object slot.
    pub fields: Vec<(String, TypeName)>,
    pub methods: HashMap<String, ProcSignature>,
    pub ctor: Option<ProcSignature>,
    pub has_dtor: bool,
    pub span: Span,
}

impl ClassInfo {
    pub fn field(&self, name: &str) -> Option<(usize, &TypeName)> {
        self.fields.iter().enumerate().find(|(_, (n, _))| n == name).map(|(i, (_, ty))| (i, ty))
    }
}

/// All CLASS and TYPE declarations of a program, by name.
#[derive(Debug, Clone, Default)]
pub struct ClassIndex {
    classes: HashMap<String, ClassInfo>,
}

impl ClassIndex {
    /// Index `program`'s classes, reporting duplicate classes, fields and
    /// methods to `de`. The first declaration wins.
    pub fn build(program: &Program, de: &mut DiagnosticEmitter) -> Self {
        let mut index = ClassIndex::default();
        for class in &program.classes {
            let c = &class.node;
            if index.classes.contains_key(&c.name.node) {
                de.error("B1004", c.name.span, format!("duplicate class '{}'", c.name.node));
                continue;
            }
            index.classes.insert(c.name.node.clone(), Self::info_for(c, class.span, de));
        }
        index
    }

    fn info_for(c: &ClassDecl, span: Span, de: &mut DiagnosticEmitter) -> ClassInfo {
        let mut fields: Vec<(String, TypeName)> = Vec::new();
        for f in &c.fields {
            if fields.iter().any(|(n, _)| *n == f.name.node) {
                de.error("B1005", f.name.span, format!("duplicate field '{}'", f.name.node));
                continue;
            }
            fields.push((f.name.node.clone(), f.ty.clone()));
        }
        let mut methods = HashMap::new();
        for m in &c.methods {
            if methods.contains_key(&m.node.name.node) {
                de.error("B1004", m.node.name.span, format!("duplicate method '{}'", m.node.name.node));
                continue;
            }
            methods.insert(m.node.name.node.clone(), ProcSignature::of(&m.node));
        }
        ClassInfo {
            name: c.name.node.clone(),
            is_record: c.is_record,
            fields,
            methods,
            ctor: c.ctor.as_ref().map(|p| ProcSignature::of(&p.node)),
            has_dtor: c.dtor.is_some(),
            span,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
