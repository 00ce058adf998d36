//! The intrinsic functor catalogue and the kind-specialized operator
//! forms recorded by polymorphism resolution.

use strudel_ast::{AggregateBaseOp, ConstraintOp, IntrinsicOp};
use strudel_types::Kind;

/// One overload of an intrinsic functor.
#[derive(Debug, PartialEq, Eq)]
pub struct IntrinsicInfo {
    pub op: IntrinsicOp,
    /// Parameter kinds; for variadic overloads the single entry applies
    /// to every argument.
    pub params: &'static [Kind],
    pub result: Kind,
    pub variadic: bool,
    /// Whether an application yields a stream of results rather than a
    /// single value (lowered through a nested generator level).
    pub multi_result: bool,
}

impl IntrinsicInfo {
    /// The expected kind of the i-th parameter.
    #[must_use]
    pub fn param_kind(&self, index: usize) -> Kind {
        if self.variadic {
            self.params[0]
        } else {
            self.params[index]
        }
    }

    /// `ord` takes an argument of any kind: its elected overload never
    /// pins argument kinds (there is no constant type to pin a record or
    /// ADT argument to).
    #[must_use]
    pub fn has_polymorphic_argument(&self) -> bool {
        self.op == IntrinsicOp::Ord
    }
}

macro_rules! overload {
    ($op:ident, [$($param:ident),*] -> $result:ident) => {
        IntrinsicInfo {
            op: IntrinsicOp::$op,
            params: &[$(Kind::$param),*],
            result: Kind::$result,
            variadic: false,
            multi_result: false,
        }
    };
    ($op:ident, variadic $param:ident -> $result:ident) => {
        IntrinsicInfo {
            op: IntrinsicOp::$op,
            params: &[Kind::$param],
            result: Kind::$result,
            variadic: true,
            multi_result: false,
        }
    };
    ($op:ident, multi [$($param:ident),*] -> $result:ident) => {
        IntrinsicInfo {
            op: IntrinsicOp::$op,
            params: &[$(Kind::$param),*],
            result: Kind::$result,
            variadic: false,
            multi_result: true,
        }
    };
}

static CATALOGUE: &[IntrinsicInfo] = &[
    // arithmetic
    overload!(Add, [Signed, Signed] -> Signed),
    overload!(Add, [Unsigned, Unsigned] -> Unsigned),
    overload!(Add, [Float, Float] -> Float),
    overload!(Sub, [Signed, Signed] -> Signed),
    overload!(Sub, [Unsigned, Unsigned] -> Unsigned),
    overload!(Sub, [Float, Float] -> Float),
    overload!(Mul, [Signed, Signed] -> Signed),
    overload!(Mul, [Unsigned, Unsigned] -> Unsigned),
    overload!(Mul, [Float, Float] -> Float),
    overload!(Div, [Signed, Signed] -> Signed),
    overload!(Div, [Unsigned, Unsigned] -> Unsigned),
    overload!(Div, [Float, Float] -> Float),
    overload!(Mod, [Signed, Signed] -> Signed),
    overload!(Mod, [Unsigned, Unsigned] -> Unsigned),
    overload!(Pow, [Signed, Signed] -> Signed),
    overload!(Pow, [Unsigned, Unsigned] -> Unsigned),
    overload!(Pow, [Float, Float] -> Float),
    overload!(Neg, [Signed] -> Signed),
    overload!(Neg, [Float] -> Float),
    // bit operations
    overload!(Band, [Signed, Signed] -> Signed),
    overload!(Band, [Unsigned, Unsigned] -> Unsigned),
    overload!(Bor, [Signed, Signed] -> Signed),
    overload!(Bor, [Unsigned, Unsigned] -> Unsigned),
    overload!(Bxor, [Signed, Signed] -> Signed),
    overload!(Bxor, [Unsigned, Unsigned] -> Unsigned),
    overload!(Bshl, [Signed, Signed] -> Signed),
    overload!(Bshl, [Unsigned, Unsigned] -> Unsigned),
    overload!(Bshr, [Signed, Signed] -> Signed),
    overload!(Bshr, [Unsigned, Unsigned] -> Unsigned),
    overload!(Bnot, [Signed] -> Signed),
    overload!(Bnot, [Unsigned] -> Unsigned),
    // logical operations
    overload!(Land, [Signed, Signed] -> Signed),
    overload!(Lor, [Signed, Signed] -> Signed),
    overload!(Lnot, [Signed] -> Signed),
    // variadic numeric folds
    overload!(Max, variadic Signed -> Signed),
    overload!(Max, variadic Unsigned -> Unsigned),
    overload!(Max, variadic Float -> Float),
    overload!(Min, variadic Signed -> Signed),
    overload!(Min, variadic Unsigned -> Unsigned),
    overload!(Min, variadic Float -> Float),
    // strings
    overload!(Cat, variadic Symbol -> Symbol),
    overload!(StrLen, [Symbol] -> Signed),
    overload!(SubStr, [Symbol, Signed, Signed] -> Symbol),
    // ord maps a value of any kind to its internal ordinal; one entry
    // per kind so candidate filtering retains it whatever the argument
    overload!(Ord, [Signed] -> Signed),
    overload!(Ord, [Unsigned] -> Signed),
    overload!(Ord, [Float] -> Signed),
    overload!(Ord, [Symbol] -> Signed),
    overload!(Ord, [Record] -> Signed),
    overload!(Ord, [Adt] -> Signed),
    // conversions
    overload!(ToNumber, [Symbol] -> Signed),
    overload!(ToString, [Signed] -> Symbol),
    overload!(ToString, [Unsigned] -> Symbol),
    overload!(ToString, [Float] -> Symbol),
    overload!(ToFloat, [Signed] -> Float),
    overload!(ToFloat, [Unsigned] -> Float),
    overload!(ToUnsigned, [Signed] -> Unsigned),
    // multi-result generators; the three surface keywords stay distinct
    // all the way to lowering
    overload!(Range, multi [Signed, Signed] -> Signed),
    overload!(Range, multi [Signed, Signed, Signed] -> Signed),
    overload!(URange, multi [Unsigned, Unsigned] -> Unsigned),
    overload!(URange, multi [Unsigned, Unsigned, Unsigned] -> Unsigned),
    overload!(FRange, multi [Float, Float] -> Float),
    overload!(FRange, multi [Float, Float, Float] -> Float),
];

/// All overloads of the given base operator.
#[must_use]
pub fn builtin_overloads(op: IntrinsicOp) -> Vec<&'static IntrinsicInfo> {
    CATALOGUE.iter().filter(|info| info.op == op).collect()
}

/// Whether the base operator yields multiple results per application.
#[must_use]
pub fn is_multi_result(op: IntrinsicOp) -> bool {
    builtin_overloads(op)
        .first()
        .is_some_and(|info| info.multi_result)
}

/// An aggregate operator specialized to the inferred kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResolvedAggregateOp {
    Min,
    UMin,
    FMin,
    Max,
    UMax,
    FMax,
    Sum,
    USum,
    FSum,
    Count,
    Mean,
}

impl ResolvedAggregateOp {
    /// Specialize a base operator to a kind. Non-overloaded base
    /// operators ignore the kind.
    #[must_use]
    pub fn from_base(base: AggregateBaseOp, kind: Kind) -> Self {
        match (base, kind) {
            (AggregateBaseOp::Count, _) => ResolvedAggregateOp::Count,
            (AggregateBaseOp::Mean, _) => ResolvedAggregateOp::Mean,
            (AggregateBaseOp::Min, Kind::Unsigned) => ResolvedAggregateOp::UMin,
            (AggregateBaseOp::Min, Kind::Float) => ResolvedAggregateOp::FMin,
            (AggregateBaseOp::Min, _) => ResolvedAggregateOp::Min,
            (AggregateBaseOp::Max, Kind::Unsigned) => ResolvedAggregateOp::UMax,
            (AggregateBaseOp::Max, Kind::Float) => ResolvedAggregateOp::FMax,
            (AggregateBaseOp::Max, _) => ResolvedAggregateOp::Max,
            (AggregateBaseOp::Sum, Kind::Unsigned) => ResolvedAggregateOp::USum,
            (AggregateBaseOp::Sum, Kind::Float) => ResolvedAggregateOp::FSum,
            (AggregateBaseOp::Sum, _) => ResolvedAggregateOp::Sum,
        }
    }

    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            ResolvedAggregateOp::Min => "min",
            ResolvedAggregateOp::UMin => "umin",
            ResolvedAggregateOp::FMin => "fmin",
            ResolvedAggregateOp::Max => "max",
            ResolvedAggregateOp::UMax => "umax",
            ResolvedAggregateOp::FMax => "fmax",
            ResolvedAggregateOp::Sum => "sum",
            ResolvedAggregateOp::USum => "usum",
            ResolvedAggregateOp::FSum => "fsum",
            ResolvedAggregateOp::Count => "count",
            ResolvedAggregateOp::Mean => "mean",
        }
    }
}

/// A binary constraint operator specialized to the inferred kind of its
/// operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedConstraintOp {
    pub op: ConstraintOp,
    pub kind: Kind,
}

impl ResolvedConstraintOp {
    #[must_use]
    pub fn new(op: ConstraintOp, kind: Kind) -> Self {
        ResolvedConstraintOp { op, kind }
    }

    /// The operator keyword in RAM listings, e.g. `<` or `f<`.
    #[must_use]
    pub fn keyword(self) -> String {
        let prefix = match self.kind {
            Kind::Signed | Kind::Symbol | Kind::Record | Kind::Adt => "",
            Kind::Unsigned => "u",
            Kind::Float => "f",
        };
        // equality is kind-independent in listings
        match self.op {
            ConstraintOp::Eq | ConstraintOp::Ne | ConstraintOp::Contains | ConstraintOp::Match => {
                self.op.symbol().to_owned()
            }
            _ => format!("{prefix}{}", self.op.symbol()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_has_three_overloads() {
        let overloads = builtin_overloads(IntrinsicOp::Add);
        assert_eq!(overloads.len(), 3);
        assert!(overloads.iter().all(|o| o.params.len() == 2));
    }

    #[test]
    fn range_family_is_multi_result() {
        assert!(is_multi_result(IntrinsicOp::Range));
        assert!(is_multi_result(IntrinsicOp::URange));
        assert!(is_multi_result(IntrinsicOp::FRange));
        assert!(!is_multi_result(IntrinsicOp::Add));
    }

    #[test]
    fn ord_accepts_arguments_of_every_kind() {
        let overloads = builtin_overloads(IntrinsicOp::Ord);
        for kind in [
            Kind::Signed,
            Kind::Unsigned,
            Kind::Float,
            Kind::Symbol,
            Kind::Record,
            Kind::Adt,
        ] {
            assert!(
                overloads
                    .iter()
                    .any(|info| info.param_kind(0) == kind && info.result == Kind::Signed),
                "ord must accept {kind:?} arguments"
            );
        }
        assert!(overloads.iter().all(|info| info.has_polymorphic_argument()));
    }

    #[test]
    fn variadic_param_kind_repeats() {
        let cat = builtin_overloads(IntrinsicOp::Cat)[0];
        assert!(cat.variadic);
        assert_eq!(cat.param_kind(0), Kind::Symbol);
        assert_eq!(cat.param_kind(7), Kind::Symbol);
    }

    #[test]
    fn aggregate_specialization() {
        assert_eq!(
            ResolvedAggregateOp::from_base(AggregateBaseOp::Min, Kind::Float),
            ResolvedAggregateOp::FMin
        );
        assert_eq!(
            ResolvedAggregateOp::from_base(AggregateBaseOp::Count, Kind::Float),
            ResolvedAggregateOp::Count
        );
        assert_eq!(
            ResolvedAggregateOp::from_base(AggregateBaseOp::Sum, Kind::Signed),
            ResolvedAggregateOp::Sum
        );
    }

    #[test]
    fn constraint_keywords_carry_kind_prefixes() {
        assert_eq!(
            ResolvedConstraintOp::new(ConstraintOp::Lt, Kind::Unsigned).keyword(),
            "u<"
        );
        assert_eq!(
            ResolvedConstraintOp::new(ConstraintOp::Eq, Kind::Float).keyword(),
            "="
        );
        assert_eq!(
            ResolvedConstraintOp::new(ConstraintOp::Ge, Kind::Signed).keyword(),
            ">="
        );
    }
}
