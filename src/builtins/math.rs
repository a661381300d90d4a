//! Numeric builtins, registered separately from the string table.

use super::strings::{call, call_if, simple};
use super::{
    ArgKind, ArgSpec, ArgTransform, ArgTraversal, Builtin, BuiltinInfo, DefaultValue,
    FeatureAction, LoweringRule, Registration, ResultSpec, ScanRule, TableBuilder, TypeMask,
    ValueKind, VariantCondition,
};

use ArgKind::Number as N;
use ValueKind::{F64, I64};

/// ABS keeps the argument's kind: integers stay integers.
fn abs_result(args: &[Option<ValueKind>]) -> Option<ValueKind> {
    match args.first().copied().flatten() {
        Some(F64) => Some(F64),
        Some(I64) => Some(I64),
        _ => None,
    }
}

/// `f(f64) -> f64` helper like SIN or SQR.
const fn unary_f64(builtin: Builtin, variants: &'static [super::Variant], features: &'static [FeatureAction]) -> Registration {
    simple(builtin, &[N], F64, variants, features)
}

const ROUND_DIGITS: ArgSpec = ArgSpec {
    index: 1,
    transforms: &[ArgTransform::EnsureI64],
    default: Some(DefaultValue::Int(0)),
};

const REGISTRATIONS: &[Registration] = &[
    simple(Builtin::Int, &[N], I64, &[call("rt_int_floor", &[ArgSpec::f64(0)])], &[FeatureAction::always("rt_int_floor")]),
    simple(Builtin::Fix, &[N], I64, &[call("rt_fix_trunc", &[ArgSpec::f64(0)])], &[FeatureAction::always("rt_fix_trunc")]),
    Registration {
        builtin: Builtin::Round,
        info: BuiltinInfo {
            name: "ROUND",
            min_args: 1,
            max_args: 2,
            args: &[N, N],
            alt_args: None,
            result: TypeMask::F64,
            analyzer: None,
        },
        scan: ScanRule {
            result: ResultSpec::Fixed(F64),
            traversal: ArgTraversal::Explicit(&[0]),
            features: &[FeatureAction::always("rt_round_even")],
        },
        lower: LoweringRule {
            result: ResultSpec::Fixed(F64),
            variants: &[call("rt_round_even", &[ArgSpec::f64(0), ROUND_DIGITS])],
        },
    },
    unary_f64(Builtin::Sqr, &[call("rt_sqrt", &[ArgSpec::f64(0)])], &[FeatureAction::always("rt_sqrt")]),
    Registration {
        builtin: Builtin::Abs,
        info: BuiltinInfo {
            name: "ABS",
            min_args: 1,
            max_args: 1,
            args: &[N],
            alt_args: None,
            result: TypeMask::NUMERIC,
            analyzer: Some(abs_result),
        },
        scan: ScanRule {
            result: ResultSpec::FromArg(0),
            traversal: ArgTraversal::All,
            features: &[
                FeatureAction::if_arg(0, F64, "rt_abs_f64"),
                FeatureAction::if_arg_not(0, F64, "rt_abs_i64"),
            ],
        },
        lower: LoweringRule {
            result: ResultSpec::FromArg(0),
            variants: &[
                call_if(VariantCondition::IfArgTypeIs(0, F64), "rt_abs_f64", &[ArgSpec::plain(0)]),
                call("rt_abs_i64", &[ArgSpec::i64(0)]),
            ],
        },
    },
    unary_f64(Builtin::Floor, &[call("rt_floor", &[ArgSpec::f64(0)])], &[FeatureAction::always("rt_floor")]),
    unary_f64(Builtin::Ceil, &[call("rt_ceil", &[ArgSpec::f64(0)])], &[FeatureAction::always("rt_ceil")]),
    unary_f64(Builtin::Sin, &[call("rt_sin", &[ArgSpec::f64(0)])], &[FeatureAction::always("rt_sin")]),
    unary_f64(Builtin::Cos, &[call("rt_cos", &[ArgSpec::f64(0)])], &[FeatureAction::always("rt_cos")]),
    unary_f64(Builtin::Tan, &[call("rt_tan", &[ArgSpec::f64(0)])], &[FeatureAction::always("rt_tan")]),
    unary_f64(Builtin::Atn, &[call("rt_atan", &[ArgSpec::f64(0)])], &[FeatureAction::always("rt_atan")]),
    unary_f64(Builtin::Exp, &[call("rt_exp", &[ArgSpec::f64(0)])], &[FeatureAction::always("rt_exp")]),
    unary_f64(Builtin::Log, &[call("rt_log", &[ArgSpec::f64(0)])], &[FeatureAction::always("rt_log")]),
    simple(
        Builtin::Sgn,
        &[N],
        I64,
        &[
            call_if(VariantCondition::IfArgTypeIs(0, F64), "rt_sgn_f64", &[ArgSpec::plain(0)]),
            call("rt_sgn_i64", &[ArgSpec::i64(0)]),
        ],
        &[
            FeatureAction::if_arg(0, F64, "rt_sgn_f64"),
            FeatureAction::if_arg_not(0, F64, "rt_sgn_i64"),
        ],
    ),
    simple(
        Builtin::Pow,
        &[N, N],
        F64,
        &[call("rt_pow_f64_chkdom", &[ArgSpec::f64(0), ArgSpec::f64(1)])],
        &[FeatureAction::always("rt_pow_f64_chkdom")],
    ),
    simple(Builtin::Rnd, &[], F64, &[call("rt_rnd", &[])], &[FeatureAction::always("rt_rnd")]),
];

pub fn register(b: &mut TableBuilder) {
    for reg in REGISTRATIONS {
        b.register(reg.clone());
    }
}

#[cfg(test)]
mod tests {
    use crate::builtins::{Builtin, DefaultValue, ResultSpec, ValueKind};

    #[test]
    fn abs_result_follows_argument() {
        let info = Builtin::Abs.info();
        assert_eq!(info.result_kind(&[Some(ValueKind::F64)]), Some(ValueKind::F64));
        assert_eq!(info.result_kind(&[Some(ValueKind::I64)]), Some(ValueKind::I64));
        assert_eq!(Builtin::Abs.lowering_rule().result, ResultSpec::FromArg(0));
    }

    #[test]
    fn round_defaults_digits_to_zero() {
        let v = Builtin::Round.lowering_rule().select(&[Some(ValueKind::F64)]).unwrap();
        assert_eq!(v.runtime, "rt_round_even");
        assert_eq!(v.args[1].default, Some(DefaultValue::Int(0)));
    }

    #[test]
    fn int_and_fix_produce_integers() {
        for b in [Builtin::Int, Builtin::Fix, Builtin::Sgn] {
            assert_eq!(b.info().result_kind(&[Some(ValueKind::F64)]), Some(ValueKind::I64), "{b}");
        }
    }

    #[test]
    fn rnd_takes_no_arguments() {
        assert_eq!(Builtin::Rnd.info().max_args, 0);
    }
}
