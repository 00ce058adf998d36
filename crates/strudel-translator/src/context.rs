//! The translator context: an immutable bundle of the analyses the
//! clause and unit translators consume, plus the shared value and
//! constraint translation.

use strudel_ast::{
    Argument, Atom, BranchInit, Clause, DirectiveKind, Literal, NumericKind, Program,
    QualifiedName, Relation,
};
use strudel_common::numeric;
use strudel_common::options::Options;
use strudel_ram::{Condition, Expression};
use strudel_solver::functor::is_multi_result;
use strudel_solver::{
    RecursiveClauses, RelationSchedule, ResolvedAggregateOp, ResolvedConstraintOp, SccGraph,
    TypeAnalysis,
};
use strudel_types::{Kind, TypeEnvironment};

use crate::names::concrete_name;
use crate::value_index::ValueIndex;

pub struct TranslatorContext<'a> {
    pub program: &'a Program,
    pub env: &'a TypeEnvironment,
    pub types: &'a TypeAnalysis,
    pub recursive_clauses: &'a RecursiveClauses,
    pub sccs: &'a SccGraph,
    pub schedule: &'a RelationSchedule,
    pub options: &'a Options,
}

impl<'a> TranslatorContext<'a> {
    #[must_use]
    pub fn relation(&self, name: &QualifiedName) -> Option<&'a Relation> {
        self.program.relation(name)
    }

    #[must_use]
    pub fn is_recursive_clause(&self, clause: &Clause) -> bool {
        self.recursive_clauses.is_recursive(clause)
    }

    /// The `n` parameter of a `limitsize` directive, if any.
    #[must_use]
    pub fn size_limit(&self, relation: &QualifiedName) -> Option<i64> {
        self.program
            .directives_of(relation, DirectiveKind::LimitSize)
            .iter()
            .find_map(|directive| directive.param("n").and_then(|n| n.parse().ok()))
    }

    // -- ADT layout ---------------------------------------------------------

    /// The index of the constructor within its (sorted) ADT.
    #[must_use]
    pub fn adt_branch_id(&self, branch: &BranchInit) -> i64 {
        let Some(adt) = self.types.branch_type(&branch.constructor) else {
            return 0;
        };
        self.env
            .adt_branches(adt)
            .and_then(|branches| {
                branches
                    .iter()
                    .position(|b| b.name == branch.constructor)
            })
            .map_or(0, |index| index as i64)
    }

    /// Whether the constructor belongs to an enum ADT (all branches
    /// nullary); such values are plain numbers downstream.
    #[must_use]
    pub fn is_adt_enum(&self, branch: &BranchInit) -> bool {
        self.types
            .branch_type(&branch.constructor)
            .is_some_and(|adt| self.env.is_adt_enum(adt))
    }

    /// Whether the branch packs into a single `[tag, value]` record
    /// (arity below two).
    #[must_use]
    pub fn is_adt_branch_simple(&self, branch: &BranchInit) -> bool {
        branch.args.len() < 2
    }

    // -- value translation --------------------------------------------------

    /// Translate a constant argument to a RAM expression.
    #[must_use]
    pub fn translate_constant(&self, argument: &Argument) -> Expression {
        match argument {
            Argument::StringConstant(constant) => {
                Expression::StringConstant(constant.value.clone())
            }
            Argument::NilConstant(_) => Expression::SignedConstant(0),
            Argument::NumericConstant(constant) => {
                let kind = self
                    .types
                    .numeric_kind(constant.id)
                    .unwrap_or(NumericKind::Signed);
                match kind {
                    NumericKind::Signed => Expression::SignedConstant(
                        numeric::parse_ram_signed(&constant.lexeme).unwrap_or_default(),
                    ),
                    NumericKind::Unsigned => Expression::UnsignedConstant(
                        numeric::parse_ram_unsigned(&constant.lexeme).unwrap_or_default(),
                    ),
                    NumericKind::Float => Expression::FloatConstant(
                        numeric::parse_ram_float(&constant.lexeme).unwrap_or_default(),
                    ),
                }
            }
            _ => unreachable!("unaccounted-for constant"),
        }
    }

    /// Translate an argument to a RAM expression against the clause's
    /// value index.
    #[must_use]
    pub fn translate_value(&self, index: &ValueIndex, argument: &Argument) -> Expression {
        match argument {
            Argument::Variable(var) => match index.definition_point(&var.name) {
                Some(loc) => Expression::tuple(loc.level, loc.column),
                None => Expression::Undef,
            },
            Argument::UnnamedVariable(_) => Expression::Undef,
            Argument::NumericConstant(_)
            | Argument::StringConstant(_)
            | Argument::NilConstant(_) => self.translate_constant(argument),
            Argument::Counter(_) => Expression::AutoIncrement,
            Argument::TypeCast(cast) => self.translate_value(index, &cast.value),
            Argument::IntrinsicFunctor(functor) => {
                if is_multi_result(functor.op) {
                    return match index.generator_location(functor.id) {
                        Some(loc) => Expression::tuple(loc.level, loc.column),
                        None => Expression::Undef,
                    };
                }
                let kind = self
                    .types
                    .intrinsic_info(functor.id)
                    .map_or(Kind::Signed, |info| info.result);
                Expression::Intrinsic {
                    op: functor.op,
                    kind,
                    args: functor
                        .args
                        .iter()
                        .map(|arg| self.translate_value(index, arg))
                        .collect(),
                }
            }
            Argument::UserDefinedFunctor(functor) => Expression::UserDefined {
                name: functor.name.clone(),
                args: functor
                    .args
                    .iter()
                    .map(|arg| self.translate_value(index, arg))
                    .collect(),
            },
            Argument::RecordInit(rec) => match index.record_definition(rec.id) {
                // a record bound by an unpack level is referenced there
                Some(loc) => Expression::tuple(loc.level, loc.column),
                // otherwise it is being constructed
                None => Expression::PackRecord(
                    rec.args
                        .iter()
                        .map(|arg| self.translate_value(index, arg))
                        .collect(),
                ),
            },
            Argument::BranchInit(branch) => {
                let tag = Expression::SignedConstant(self.adt_branch_id(branch));
                if self.is_adt_enum(branch) {
                    return tag;
                }
                if let Some(loc) = index.adt_definition(branch.id) {
                    return Expression::tuple(loc.level, loc.column);
                }
                let args: Vec<Expression> = branch
                    .args
                    .iter()
                    .map(|arg| self.translate_value(index, arg))
                    .collect();
                if self.is_adt_branch_simple(branch) {
                    let value = args.into_iter().next().unwrap_or(Expression::Undef);
                    Expression::PackRecord(vec![tag, value])
                } else {
                    Expression::PackRecord(vec![tag, Expression::PackRecord(args)])
                }
            }
            Argument::Aggregator(agg) => match index.generator_location(agg.id) {
                Some(loc) => Expression::tuple(loc.level, loc.column),
                None => Expression::Undef,
            },
        }
    }

    /// Translate a body literal into a RAM condition, if it denotes one.
    /// Positive atoms become scan levels instead and yield nothing here.
    #[must_use]
    pub fn translate_constraint(
        &self,
        index: &ValueIndex,
        literal: &Literal,
    ) -> Option<Condition> {
        match literal {
            Literal::Atom(_) | Literal::FunctionalConstraint(_) => None,
            Literal::BooleanConstraint(bc) => Some(if bc.value {
                Condition::True
            } else {
                Condition::False
            }),
            Literal::BinaryConstraint(bc) => {
                let op = self
                    .types
                    .constraint_op(bc.id)
                    .unwrap_or(ResolvedConstraintOp::new(bc.op, Kind::Signed));
                Some(Condition::Constraint {
                    op,
                    lhs: self.translate_value(index, &bc.lhs),
                    rhs: self.translate_value(index, &bc.rhs),
                })
            }
            Literal::Negation(neg) => Some(self.translate_negated_atom(index, &neg.atom)),
        }
    }

    /// A negated atom over the concrete relation: an emptiness check for
    /// propositions, otherwise a negated existence check.
    #[must_use]
    pub fn translate_negated_atom(&self, index: &ValueIndex, atom: &Atom) -> Condition {
        let name = concrete_name(&atom.name);
        if atom.arity() == 0 {
            return Condition::EmptinessCheck(name);
        }
        Condition::ExistenceCheck {
            relation: name,
            values: atom
                .args
                .iter()
                .map(|arg| self.translate_value(index, arg))
                .collect(),
        }
        .negate()
    }

    /// The resolved operator of an aggregate.
    #[must_use]
    pub fn aggregate_operator(&self, agg: &strudel_ast::Aggregator) -> ResolvedAggregateOp {
        self.types
            .aggregator_op(agg.id)
            .unwrap_or(ResolvedAggregateOp::Count)
    }
}
