//! Name/signature table of BASIC intrinsics, used for documentation output.

use super::ValueKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntrinsicParam {
    pub kind: ValueKind,
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intrinsic {
    pub name: &'static str,
    pub ret: ValueKind,
    pub params: &'static [IntrinsicParam],
}

const fn req(kind: ValueKind) -> IntrinsicParam {
    IntrinsicParam { kind, optional: false }
}

const fn opt(kind: ValueKind) -> IntrinsicParam {
    IntrinsicParam { kind, optional: true }
}

use ValueKind::{F64, I64, Str};

static INTRINSICS: &[Intrinsic] = &[
    Intrinsic { name: "LEFT$", ret: Str, params: &[req(Str), req(I64)] },
    Intrinsic { name: "RIGHT$", ret: Str, params: &[req(Str), req(I64)] },
    Intrinsic { name: "MID$", ret: Str, params: &[req(Str), req(I64), opt(I64)] },
    Intrinsic { name: "INSTR", ret: I64, params: &[opt(I64), req(Str), req(Str)] },
    Intrinsic { name: "LEN", ret: I64, params: &[req(Str)] },
    Intrinsic { name: "LTRIM$", ret: Str, params: &[req(Str)] },
    Intrinsic { name: "RTRIM$", ret: Str, params: &[req(Str)] },
    Intrinsic { name: "TRIM$", ret: Str, params: &[req(Str)] },
    Intrinsic { name: "UCASE$", ret: Str, params: &[req(Str)] },
    Intrinsic { name: "LCASE$", ret: Str, params: &[req(Str)] },
    Intrinsic { name: "CHR$", ret: Str, params: &[req(I64)] },
    Intrinsic { name: "ASC", ret: I64, params: &[req(Str)] },
    Intrinsic { name: "STR$", ret: Str, params: &[req(F64)] },
    Intrinsic { name: "VAL", ret: F64, params: &[req(Str)] },
    Intrinsic { name: "SPACE$", ret: Str, params: &[req(I64)] },
    Intrinsic { name: "STRING$", ret: Str, params: &[req(I64), req(I64)] },
];

pub fn all() -> &'static [Intrinsic] {
    INTRINSICS
}

/// Exact lookup; `name` must already be uppercase.
pub fn find(name: &str) -> Option<&'static Intrinsic> {
    INTRINSICS.iter().find(|i| i.name == name)
}

impl std::fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if p.optional {
                write!(f, "[{}]", p.kind)?;
            } else {
                write!(f, "{}", p.kind)?;
            }
        }
        write!(f, ") -> {}", self.ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::Builtin;

    #[test]
    fn every_intrinsic_is_a_registered_builtin() {
        for i in all() {
            let b = Builtin::lookup(i.name).unwrap_or_else(|| panic!("{} not a builtin", i.name));
            let info = b.info();
            let required = i.params.iter().filter(|p| !p.optional).count();
            assert_eq!(info.min_args, required, "{}", i.name);
            assert_eq!(info.max_args, i.params.len(), "{}", i.name);
        }
    }

    #[test]
    fn lookup_is_exact() {
        assert_eq!(find("MID$").map(|i| i.params.len()), Some(3));
        assert!(find("mid$").is_none());
    }

    #[test]
    fn display_marks_optional_params() {
        assert_eq!(find("MID$").unwrap().to_string(), "MID$(str, i64, [i64]) -> str");
    }
}
