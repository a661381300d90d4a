//! String, conversion and I/O builtins.

use super::{
    ArgKind, ArgSpec, ArgTransform, ArgTraversal, Builtin, BuiltinInfo, FeatureAction,
    LoweringRule, Registration, ResultSpec, ScanRule, TableBuilder, TypeMask, ValueKind, Variant,
    VariantCondition, VariantKind,
};

use ArgKind::{Number as N, Str as S};
use ValueKind::{F64, I64, Str};

pub(super) const fn call(runtime: &'static str, args: &'static [ArgSpec]) -> Variant {
    call_if(VariantCondition::Always, runtime, args)
}

pub(super) const fn call_if(
    condition: VariantCondition,
    runtime: &'static str,
    args: &'static [ArgSpec],
) -> Variant {
    Variant { condition, kind: VariantKind::CallRuntime, runtime, args, features: &[] }
}

pub(super) const fn mask(kind: ValueKind) -> TypeMask {
    match kind {
        ValueKind::I64 => TypeMask::I64,
        ValueKind::F64 => TypeMask::F64,
        ValueKind::Str => TypeMask::STR,
    }
}

/// Fixed-arity builtin with a fixed result kind.
pub(super) const fn simple(
    builtin: Builtin,
    args: &'static [ArgKind],
    result: ValueKind,
    variants: &'static [Variant],
    features: &'static [FeatureAction],
) -> Registration {
    Registration {
        builtin,
        info: BuiltinInfo {
            name: builtin.name(),
            min_args: args.len(),
            max_args: args.len(),
            args,
            alt_args: None,
            result: mask(result),
            analyzer: None,
        },
        scan: ScanRule { result: ResultSpec::Fixed(result), traversal: ArgTraversal::All, features },
        lower: LoweringRule { result: ResultSpec::Fixed(result), variants },
    }
}

const REGISTRATIONS: &[Registration] = &[
    simple(Builtin::Len, &[S], I64, &[call("rt_len", &[ArgSpec::plain(0)])], &[FeatureAction::always("rt_len")]),
    Registration {
        builtin: Builtin::Mid,
        info: BuiltinInfo {
            name: "MID$",
            min_args: 2,
            max_args: 3,
            args: &[S, N, N],
            alt_args: None,
            result: TypeMask::STR,
            analyzer: None,
        },
        scan: ScanRule {
            result: ResultSpec::Fixed(Str),
            traversal: ArgTraversal::All,
            features: &[FeatureAction::always("rt_mid2"), FeatureAction::always("rt_mid3")],
        },
        lower: LoweringRule {
            result: ResultSpec::Fixed(Str),
            variants: &[
                call_if(
                    VariantCondition::IfArgPresent(2),
                    "rt_mid3",
                    &[ArgSpec::plain(0), ArgSpec::i64(1), ArgSpec::i64(2)],
                ),
                call_if(VariantCondition::IfArgMissing(2), "rt_mid2", &[ArgSpec::plain(0), ArgSpec::i64(1)]),
            ],
        },
    },
    simple(Builtin::Left, &[S, N], Str, &[call("rt_left", &[ArgSpec::plain(0), ArgSpec::i64(1)])], &[FeatureAction::always("rt_left")]),
    simple(Builtin::Right, &[S, N], Str, &[call("rt_right", &[ArgSpec::plain(0), ArgSpec::i64(1)])], &[FeatureAction::always("rt_right")]),
    Registration {
        builtin: Builtin::Instr,
        info: BuiltinInfo {
            name: "INSTR",
            min_args: 2,
            max_args: 3,
            args: &[S, S],
            alt_args: Some(&[N, S, S]),
            result: TypeMask::I64,
            analyzer: None,
        },
        scan: ScanRule {
            result: ResultSpec::Fixed(I64),
            traversal: ArgTraversal::All,
            features: &[FeatureAction::always("rt_instr2"), FeatureAction::always("rt_instr3")],
        },
        lower: LoweringRule {
            result: ResultSpec::Fixed(I64),
            variants: &[
                call_if(
                    VariantCondition::IfArgPresent(2),
                    "rt_instr3",
                    &[ArgSpec::i64(0), ArgSpec::plain(1), ArgSpec::plain(2)],
                ),
                call_if(VariantCondition::IfArgMissing(2), "rt_instr2", &[ArgSpec::plain(0), ArgSpec::plain(1)]),
            ],
        },
    },
    simple(Builtin::LTrim, &[S], Str, &[call("rt_ltrim", &[ArgSpec::plain(0)])], &[FeatureAction::always("rt_ltrim")]),
    simple(Builtin::RTrim, &[S], Str, &[call("rt_rtrim", &[ArgSpec::plain(0)])], &[FeatureAction::always("rt_rtrim")]),
    simple(Builtin::Trim, &[S], Str, &[call("rt_trim", &[ArgSpec::plain(0)])], &[FeatureAction::always("rt_trim")]),
    simple(Builtin::UCase, &[S], Str, &[call("rt_ucase", &[ArgSpec::plain(0)])], &[FeatureAction::always("rt_ucase")]),
    simple(Builtin::LCase, &[S], Str, &[call("rt_lcase", &[ArgSpec::plain(0)])], &[FeatureAction::always("rt_lcase")]),
    simple(
        Builtin::Chr,
        &[N],
        Str,
        &[call("rt_chr", &[ArgSpec { index: 0, transforms: &[ArgTransform::EnsureI32], default: None }])],
        &[FeatureAction::always("rt_chr")],
    ),
    simple(Builtin::Asc, &[S], I64, &[call("rt_asc", &[ArgSpec::plain(0)])], &[FeatureAction::always("rt_asc")]),
    simple(
        Builtin::Str,
        &[N],
        Str,
        &[
            call_if(VariantCondition::IfArgTypeIs(0, I64), "rt_int_to_str", &[ArgSpec::plain(0)]),
            call("rt_str", &[ArgSpec::f64(0)]),
        ],
        &[
            FeatureAction::if_arg(0, I64, "rt_int_to_str"),
            FeatureAction::if_arg_not(0, I64, "rt_str"),
        ],
    ),
    simple(Builtin::Val, &[S], F64, &[call("rt_val", &[ArgSpec::plain(0)])], &[FeatureAction::always("rt_val")]),
    simple(Builtin::Space, &[N], Str, &[call("rt_space", &[ArgSpec::i64(0)])], &[FeatureAction::always("rt_space")]),
    simple(
        Builtin::StringRep,
        &[N, N],
        Str,
        &[call("rt_string_rep", &[ArgSpec::i64(0), ArgSpec::i64(1)])],
        &[FeatureAction::always("rt_string_rep")],
    ),
    simple(Builtin::Eof, &[N], I64, &[call("rt_eof", &[ArgSpec::i64(0)])], &[FeatureAction::always("rt_eof")]),
    simple(Builtin::Err, &[], I64, &[call("rt_err", &[])], &[FeatureAction::always("rt_err")]),
];

pub fn register(b: &mut TableBuilder) {
    for reg in REGISTRATIONS {
        b.register(reg.clone());
    }
}

#[cfg(test)]
mod tests {
    use crate::builtins::{ArgTransform, Builtin, ValueKind};

    #[test]
    fn str_picks_integer_formatter_for_ints() {
        let rule = Builtin::Str.lowering_rule();
        assert_eq!(rule.select(&[Some(ValueKind::I64)]).map(|v| v.runtime), Some("rt_int_to_str"));
        assert_eq!(rule.select(&[Some(ValueKind::F64)]).map(|v| v.runtime), Some("rt_str"));
    }

    #[test]
    fn chr_narrows_to_i32() {
        let v = &Builtin::Chr.lowering_rule().variants[0];
        assert_eq!(v.args[0].transforms, &[ArgTransform::EnsureI32]);
    }

    #[test]
    fn err_takes_no_arguments() {
        let info = Builtin::Err.info();
        assert_eq!((info.min_args, info.max_args), (0, 0));
    }
}
