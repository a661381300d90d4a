//! Builtin function registry.
//!
//! Every BASIC builtin has a dense [`Builtin`] id and three table entries:
//!
//! - [`BuiltinInfo`]: name, arity, accepted argument kinds, result kinds and
//!   an optional analyzer hook used by semantic analysis;
//! - [`ScanRule`]: how the lowerer's pre-pass walks the arguments and which
//!   runtime helpers it must declare;
//! - [`LoweringRule`]: ordered variants, the first whose condition holds
//!   decides the runtime call that gets emitted.
//!
//! Tables are filled once, on first access, by [`strings::register`] and
//! [`math::register`], and are immutable afterwards. A separate
//! [`dynamic`] overlay maps names to host handlers at run time.

pub mod dynamic;
pub mod intrinsics;
pub mod math;
pub mod strings;

use std::sync::OnceLock;

/// Value categories builtins talk about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    I64,
    F64,
    Str,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::I64 => write!(f, "i64"),
            ValueKind::F64 => write!(f, "f64"),
            ValueKind::Str => write!(f, "str"),
        }
    }
}

/// Bit set over [`ValueKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMask(u8);

impl TypeMask {
    pub const I64: TypeMask = TypeMask(1);
    pub const F64: TypeMask = TypeMask(2);
    pub const STR: TypeMask = TypeMask(4);
    pub const NUMERIC: TypeMask = TypeMask(1 | 2);

    pub const fn union(self, other: TypeMask) -> TypeMask {
        TypeMask(self.0 | other.0)
    }

    pub fn contains(self, kind: ValueKind) -> bool {
        let bit = match kind {
            ValueKind::I64 => 1,
            ValueKind::F64 => 2,
            ValueKind::Str => 4,
        };
        self.0 & bit != 0
    }
}

/// What an argument position accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Str,
    Number,
    Any,
}

impl ArgKind {
    pub fn accepts(self, kind: ValueKind) -> bool {
        match self {
            ArgKind::Str => kind == ValueKind::Str,
            ArgKind::Number => kind != ValueKind::Str,
            ArgKind::Any => true,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            ArgKind::Str => "string",
            ArgKind::Number => "number",
            ArgKind::Any => "value",
        }
    }
}

/// Analyzer hook: result kind given the argument kinds (`None` = unknown).
pub type AnalyzerHook = fn(&[Option<ValueKind>]) -> Option<ValueKind>;

macro_rules! builtins {
    ($($variant:ident => $name:literal),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Builtin {
            $($variant),*
        }

        impl Builtin {
            pub const ALL: &'static [Builtin] = &[$(Builtin::$variant),*];

            pub const fn name(self) -> &'static str {
                match self {
                    $(Builtin::$variant => $name),*
                }
            }
        }
    };
}

builtins! {
    Len => "LEN",
    Mid => "MID$",
    Left => "LEFT$",
    Right => "RIGHT$",
    Instr => "INSTR",
    LTrim => "LTRIM$",
    RTrim => "RTRIM$",
    Trim => "TRIM$",
    UCase => "UCASE$",
    LCase => "LCASE$",
    Chr => "CHR$",
    Asc => "ASC",
    Str => "STR$",
    Val => "VAL",
    Space => "SPACE$",
    StringRep => "STRING$",
    Eof => "EOF",
    Err => "ERR",
    Int => "INT",
    Fix => "FIX",
    Round => "ROUND",
    Sqr => "SQR",
    Abs => "ABS",
    Floor => "FLOOR",
    Ceil => "CEIL",
    Sin => "SIN",
    Cos => "COS",
    Tan => "TAN",
    Atn => "ATN",
    Exp => "EXP",
    Log => "LOG",
    Sgn => "SGN",
    Pow => "POW",
    Rnd => "RND",
}

pub const BUILTIN_COUNT: usize = Builtin::ALL.len();

impl Builtin {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Exact lookup on the uppercase name.
    pub fn lookup(name: &str) -> Option<Builtin> {
        let upper = name.to_ascii_uppercase();
        Builtin::ALL.iter().copied().find(|b| b.name() == upper)
    }

    pub fn info(self) -> &'static BuiltinInfo {
        &tables().info[self.index()]
    }

    pub fn scan_rule(self) -> &'static ScanRule {
        &tables().scan[self.index()]
    }

    pub fn lowering_rule(self) -> &'static LoweringRule {
        &tables().lower[self.index()]
    }
}

impl std::fmt::Display for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct BuiltinInfo {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub args: &'static [ArgKind],
    /// Argument kinds used instead of `args` when exactly this many
    /// arguments are passed (INSTR's 3-argument form starts with a number).
    pub alt_args: Option<&'static [ArgKind]>,
    pub result: TypeMask,
    pub analyzer: Option<AnalyzerHook>,
}

impl BuiltinInfo {
    pub fn arg_kinds(&self, argc: usize) -> &'static [ArgKind] {
        match self.alt_args {
            Some(alt) if alt.len() == argc => alt,
            _ => self.args,
        }
    }

    /// Result kind for the given argument kinds.
    pub fn result_kind(&self, args: &[Option<ValueKind>]) -> Option<ValueKind> {
        if let Some(hook) = self.analyzer {
            return hook(args);
        }
        [ValueKind::I64, ValueKind::F64, ValueKind::Str]
            .into_iter()
            .find(|k| self.result.contains(*k))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResultSpec {
    Fixed(ValueKind),
    FromArg(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgTraversal {
    All,
    Explicit(&'static [usize]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureCondition {
    Always,
    IfArgTypeIs(ValueKind),
    IfArgTypeIsNot(ValueKind),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureActionKind {
    Track,
}

/// Request to declare a runtime helper when the condition holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureAction {
    pub action: FeatureActionKind,
    pub condition: FeatureCondition,
    pub feature: &'static str,
    pub arg_index: usize,
}

impl FeatureAction {
    pub const fn always(feature: &'static str) -> Self {
        FeatureAction {
            action: FeatureActionKind::Track,
            condition: FeatureCondition::Always,
            feature,
            arg_index: 0,
        }
    }

    pub const fn if_arg(arg_index: usize, kind: ValueKind, feature: &'static str) -> Self {
        FeatureAction {
            action: FeatureActionKind::Track,
            condition: FeatureCondition::IfArgTypeIs(kind),
            feature,
            arg_index,
        }
    }

    pub const fn if_arg_not(arg_index: usize, kind: ValueKind, feature: &'static str) -> Self {
        FeatureAction {
            action: FeatureActionKind::Track,
            condition: FeatureCondition::IfArgTypeIsNot(kind),
            feature,
            arg_index,
        }
    }

    pub fn applies(&self, args: &[Option<ValueKind>]) -> bool {
        let arg = args.get(self.arg_index).copied().flatten();
        match self.condition {
            FeatureCondition::Always => true,
            FeatureCondition::IfArgTypeIs(k) => arg == Some(k),
            FeatureCondition::IfArgTypeIsNot(k) => arg.is_some_and(|a| a != k),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanRule {
    pub result: ResultSpec,
    pub traversal: ArgTraversal,
    pub features: &'static [FeatureAction],
}

impl ScanRule {
    pub fn visits(&self, index: usize) -> bool {
        match self.traversal {
            ArgTraversal::All => true,
            ArgTraversal::Explicit(list) => list.contains(&index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariantCondition {
    Always,
    IfArgPresent(usize),
    IfArgMissing(usize),
    IfArgTypeIs(usize, ValueKind),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariantKind {
    CallRuntime,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgTransform {
    EnsureI32,
    EnsureI64,
    EnsureF64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArgSpec {
    pub index: usize,
    pub transforms: &'static [ArgTransform],
    pub default: Option<DefaultValue>,
}

impl ArgSpec {
    pub const fn plain(index: usize) -> Self {
        ArgSpec { index, transforms: &[], default: None }
    }

    pub const fn i64(index: usize) -> Self {
        ArgSpec { index, transforms: &[ArgTransform::EnsureI64], default: None }
    }

    pub const fn f64(index: usize) -> Self {
        ArgSpec { index, transforms: &[ArgTransform::EnsureF64], default: None }
    }
}

#[derive(Debug, Clone)]
pub struct Variant {
    pub condition: VariantCondition,
    pub kind: VariantKind,
    pub runtime: &'static str,
    pub args: &'static [ArgSpec],
    pub features: &'static [FeatureAction],
}

impl Variant {
    pub fn matches(&self, args: &[Option<ValueKind>]) -> bool {
        match self.condition {
            VariantCondition::Always => true,
            VariantCondition::IfArgPresent(i) => i < args.len(),
            VariantCondition::IfArgMissing(i) => i >= args.len(),
            VariantCondition::IfArgTypeIs(i, k) => args.get(i).copied().flatten() == Some(k),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoweringRule {
    pub result: ResultSpec,
    pub variants: &'static [Variant],
}

impl LoweringRule {
    /// First variant whose condition holds.
    pub fn select(&self, args: &[Option<ValueKind>]) -> Option<&Variant> {
        self.variants.iter().find(|v| v.matches(args))
    }
}

/// One builtin's worth of table entries.
#[derive(Clone)]
pub struct Registration {
    pub builtin: Builtin,
    pub info: BuiltinInfo,
    pub scan: ScanRule,
    pub lower: LoweringRule,
}

/// The three parallel tables. Only [`tables`] builds one.
pub struct Tables {
    info: Vec<BuiltinInfo>,
    scan: Vec<ScanRule>,
    lower: Vec<LoweringRule>,
}

/// Collects registrations in any order and lays them out by enum index.
pub struct TableBuilder {
    slots: Vec<Option<Registration>>,
}

impl TableBuilder {
    fn new() -> Self {
        TableBuilder { slots: (0..BUILTIN_COUNT).map(|_| None).collect() }
    }

    pub fn register(&mut self, reg: Registration) {
        let index = reg.builtin.index();
        if self.slots[index].is_some() {
            tracing::warn!(target: "ilc::builtins", builtin = %reg.builtin, "registered twice");
        }
        self.slots[index] = Some(reg);
    }

    fn finish(self) -> Tables {
        let mut info = Vec::with_capacity(BUILTIN_COUNT);
        let mut scan = Vec::with_capacity(BUILTIN_COUNT);
        let mut lower = Vec::with_capacity(BUILTIN_COUNT);
        for (i, slot) in self.slots.into_iter().enumerate() {
            let reg = slot.unwrap_or_else(|| unregistered(Builtin::ALL[i]));
            info.push(reg.info);
            scan.push(reg.scan);
            lower.push(reg.lower);
        }
        Tables { info, scan, lower }
    }
}

/// Placeholder for a builtin no module registered: any call fails arity.
fn unregistered(builtin: Builtin) -> Registration {
    tracing::error!(target: "ilc::builtins", %builtin, "builtin has no registration");
    Registration {
        builtin,
        info: BuiltinInfo {
            name: builtin.name(),
            min_args: usize::MAX,
            max_args: 0,
            args: &[],
            alt_args: None,
            result: TypeMask::I64,
            analyzer: None,
        },
        scan: ScanRule { result: ResultSpec::Fixed(ValueKind::I64), traversal: ArgTraversal::All, features: &[] },
        lower: LoweringRule { result: ResultSpec::Fixed(ValueKind::I64), variants: &[] },
    }
}

static TABLES: OnceLock<Tables> = OnceLock::new();

/// The registry, built on first use.
pub fn tables() -> &'static Tables {
    TABLES.get_or_init(|| {
        let mut builder = TableBuilder::new();
        strings::register(&mut builder);
        math::register(&mut builder);
        tracing::debug!(target: "ilc::builtins", count = BUILTIN_COUNT, "builtin tables initialized");
        builder.finish()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_is_registered_at_its_index() {
        for &b in Builtin::ALL {
            let info = b.info();
            assert_eq!(info.name, b.name(), "info slot for {b}");
            assert!(info.min_args <= info.max_args, "{b} has no registration");
            assert!(!b.lowering_rule().variants.is_empty(), "{b} has no lowering");
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(Builtin::lookup("mid$"), Some(Builtin::Mid));
        assert_eq!(Builtin::lookup("Len"), Some(Builtin::Len));
        assert_eq!(Builtin::lookup("MID"), None);
    }

    #[test]
    fn tables_are_built_once() {
        let first = tables() as *const Tables;
        let name = Builtin::Abs.info().name;
        let second = tables() as *const Tables;
        assert_eq!(first, second);
        assert_eq!(name, Builtin::Abs.info().name);
        assert!(TABLES.get().is_some());
    }

    #[test]
    fn abs_tracks_by_argument_type() {
        let rule = Builtin::Abs.scan_rule();
        let float: Vec<&str> = rule
            .features
            .iter()
            .filter(|f| f.applies(&[Some(ValueKind::F64)]))
            .map(|f| f.feature)
            .collect();
        let int: Vec<&str> = rule
            .features
            .iter()
            .filter(|f| f.applies(&[Some(ValueKind::I64)]))
            .map(|f| f.feature)
            .collect();
        assert_eq!(float, vec!["rt_abs_f64"]);
        assert_eq!(int, vec!["rt_abs_i64"]);
    }

    #[test]
    fn mid_selects_variant_by_arity() {
        let rule = Builtin::Mid.lowering_rule();
        let two = [Some(ValueKind::Str), Some(ValueKind::I64)];
        let three = [Some(ValueKind::Str), Some(ValueKind::I64), Some(ValueKind::I64)];
        assert_eq!(rule.select(&two).map(|v| v.runtime), Some("rt_mid2"));
        assert_eq!(rule.select(&three).map(|v| v.runtime), Some("rt_mid3"));
    }

    #[test]
    fn round_scans_only_first_argument() {
        let rule = Builtin::Round.scan_rule();
        assert!(rule.visits(0));
        assert!(!rule.visits(1));
    }

    #[test]
    fn instr_uses_alternate_kinds_for_three_args() {
        let info = Builtin::Instr.info();
        assert_eq!(info.arg_kinds(2), &[ArgKind::Str, ArgKind::Str]);
        assert_eq!(info.arg_kinds(3), &[ArgKind::Number, ArgKind::Str, ArgKind::Str]);
    }
}
