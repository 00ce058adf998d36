//! RAM expressions.

use strudel_ast::IntrinsicOp;
use strudel_common::numeric::{RamFloat, RamSigned, RamUnsigned};
use strudel_types::Kind;

/// A multi-result generator operation, specialized by kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NestedIntrinsicOp {
    Range,
    URange,
    FRange,
}

impl NestedIntrinsicOp {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            NestedIntrinsicOp::Range => "RANGE",
            NestedIntrinsicOp::URange => "URANGE",
            NestedIntrinsicOp::FRange => "FRANGE",
        }
    }
}

/// A value-producing RAM node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    /// Column `column` of the tuple bound at nesting level `level`.
    TupleElement { level: usize, column: usize },
    SignedConstant(RamSigned),
    UnsignedConstant(RamUnsigned),
    FloatConstant(RamFloat),
    StringConstant(String),
    /// An intrinsic operation, specialized to the kind elected by the
    /// solver.
    Intrinsic {
        op: IntrinsicOp,
        kind: Kind,
        args: Vec<Expression>,
    },
    /// An externally bound functor.
    UserDefined { name: String, args: Vec<Expression> },
    /// The `$` auto-increment counter.
    AutoIncrement,
    /// Pack the values into a record reference.
    PackRecord(Vec<Expression>),
    /// The current size of a relation.
    RelationSize(String),
    /// Argument `index` of the enclosing subroutine.
    SubroutineArgument(usize),
    /// The undefined value (an unconstrained column in a guard or index
    /// pattern).
    Undef,
}

impl Expression {
    #[must_use]
    pub fn tuple(level: usize, column: usize) -> Self {
        Expression::TupleElement { level, column }
    }

    #[must_use]
    pub fn is_undef(&self) -> bool {
        matches!(self, Expression::Undef)
    }

    /// The direct child expressions.
    #[must_use]
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Intrinsic { args, .. }
            | Expression::UserDefined { args, .. }
            | Expression::PackRecord(args) => args.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Rebuild this expression with every direct child passed through
    /// `f`.
    #[must_use]
    pub fn map_children(self, f: &mut impl FnMut(Expression) -> Expression) -> Expression {
        match self {
            Expression::Intrinsic { op, kind, args } => Expression::Intrinsic {
                op,
                kind,
                args: args.into_iter().map(|a| f(a)).collect(),
            },
            Expression::UserDefined { name, args } => Expression::UserDefined {
                name,
                args: args.into_iter().map(|a| f(a)).collect(),
            },
            Expression::PackRecord(args) => {
                Expression::PackRecord(args.into_iter().map(|a| f(a)).collect())
            }
            leaf => leaf,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_is_structurally_equal() {
        let expr = Expression::Intrinsic {
            op: IntrinsicOp::Add,
            kind: Kind::Signed,
            args: vec![Expression::tuple(0, 1), Expression::SignedConstant(1)],
        };
        assert_eq!(expr, expr.clone());
        assert_ne!(
            expr,
            Expression::Intrinsic {
                op: IntrinsicOp::Add,
                kind: Kind::Signed,
                args: vec![Expression::tuple(0, 2), Expression::SignedConstant(1)],
            }
        );
    }

    #[test]
    fn map_children_rewrites_in_place() {
        let expr = Expression::PackRecord(vec![Expression::tuple(0, 0), Expression::Undef]);
        let rewritten = expr.map_children(&mut |child| {
            if child.is_undef() {
                Expression::SignedConstant(0)
            } else {
                child
            }
        });
        assert_eq!(
            rewritten,
            Expression::PackRecord(vec![
                Expression::tuple(0, 0),
                Expression::SignedConstant(0)
            ])
        );
    }
}
