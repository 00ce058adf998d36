//! Source-syntax rendering of AST nodes.
//!
//! Used for analysis logs, debug-info annotations on lowered rules, and
//! diagnostics that quote program fragments.

use std::fmt;

use crate::argument::Argument;
use crate::clause::Clause;
use crate::literal::{Atom, Literal};

fn join<T: fmt::Display>(items: impl IntoIterator<Item = T>, separator: &str) -> String {
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Variable(var) => write!(f, "{}", var.name),
            Argument::UnnamedVariable(_) => write!(f, "_"),
            Argument::NumericConstant(constant) => write!(f, "{}", constant.lexeme),
            Argument::StringConstant(constant) => write!(f, "\"{}\"", constant.value),
            Argument::NilConstant(_) => write!(f, "nil"),
            Argument::Counter(_) => write!(f, "$"),
            Argument::IntrinsicFunctor(functor) => {
                if functor.op.is_infix() && functor.args.len() == 2 {
                    write!(
                        f,
                        "({} {} {})",
                        functor.args[0],
                        functor.op.symbol(),
                        functor.args[1]
                    )
                } else {
                    write!(f, "{}({})", functor.op.symbol(), join(&functor.args, ","))
                }
            }
            Argument::UserDefinedFunctor(functor) => {
                write!(f, "@{}({})", functor.name, join(&functor.args, ","))
            }
            Argument::TypeCast(cast) => {
                write!(f, "as({}, {})", cast.value, cast.target_type)
            }
            Argument::RecordInit(rec) => write!(f, "[{}]", join(&rec.args, ",")),
            Argument::BranchInit(branch) => {
                write!(f, "${}({})", branch.constructor, join(&branch.args, ","))
            }
            Argument::Aggregator(agg) => {
                write!(f, "{}", agg.op)?;
                if let Some(target) = agg.target() {
                    write!(f, " {target}")?;
                }
                write!(f, " : {{ {} }}", join(&agg.body, ", "))
            }
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, join(&self.args, ","))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Atom(atom) => write!(f, "{atom}"),
            Literal::Negation(neg) => write!(f, "!{}", neg.atom),
            Literal::BinaryConstraint(bc) => write!(f, "{} {} {}", bc.lhs, bc.op, bc.rhs),
            Literal::BooleanConstraint(bc) => write!(f, "{}", bc.value),
            Literal::FunctionalConstraint(fc) => write!(f, "keys {}", fc.keys.join(",")),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if !self.body.is_empty() {
            write!(f, " :- {}", join(&self.body, ", "))?;
        }
        write!(f, ".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::AggregateBaseOp;
    use crate::Aggregator;
    use strudel_common::span::SrcLocation;

    #[test]
    fn clause_rendering() {
        let clause = Clause::new(
            Atom::new(
                "path",
                vec![Argument::var("x"), Argument::var("z")],
                SrcLocation::unset(),
            ),
            vec![
                Literal::Atom(Atom::new(
                    "path",
                    vec![Argument::var("x"), Argument::var("y")],
                    SrcLocation::unset(),
                )),
                Literal::Atom(Atom::new(
                    "edge",
                    vec![Argument::var("y"), Argument::var("z")],
                    SrcLocation::unset(),
                )),
            ],
            SrcLocation::unset(),
        );
        assert_eq!(clause.to_string(), "path(x,z) :- path(x,y), edge(y,z).");
    }

    #[test]
    fn aggregate_rendering() {
        let agg = Argument::Aggregator(Aggregator::new(
            AggregateBaseOp::Max,
            Some(Argument::var("v")),
            vec![Literal::Atom(Atom::new(
                "a",
                vec![Argument::var("k"), Argument::var("v")],
                SrcLocation::unset(),
            ))],
            SrcLocation::unset(),
        ));
        assert_eq!(agg.to_string(), "max v : { a(k,v) }");
    }
}
