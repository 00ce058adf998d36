//! Scope analysis for aggregate expressions.
//!
//! A variable occurring in an aggregate body is one of:
//! - *injected* - it occurs grounded in an outer scope and its value is
//!   consumed inside the aggregate,
//! - *witness* - it is grounded inside the aggregate body but occurs
//!   ungrounded in the outer scope (its value escapes),
//! - *local* - everything else; its scope is the aggregate body.
//!
//! The classification is computed by building synthetic clauses in which
//! aggregates are replaced by placeholder variables (reserved `+` prefix)
//! and running the groundedness analysis over them: the head is negated
//! into the body so head occurrences count as outer-scope occurrences,
//! and a synthetic grounding atom stands in for the values the replaced
//! aggregates would produce.

use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};

use strudel_ast::visit::{
    visit_aggregators_in_aggregator, visit_aggregators_in_clause, visit_variables_in_argument,
    visit_variables_in_clause,
};
use strudel_ast::{
    Aggregator, Argument, Atom, Clause, Literal, Negation, NodeId, Program, QualifiedName,
};
use strudel_common::span::SrcLocation;

use crate::ground::grounded_terms;

/// What to do with an aggregator while building a synthetic clause.
enum Replacement {
    /// Keep the aggregator (it is an ancestor of the target) but keep
    /// rewriting inside it.
    Keep,
    /// Replace it with a placeholder variable; `grounded` placeholders
    /// are added to the synthetic grounding atom.
    Replace { grounded: bool },
}

struct AggregateReplacer<'d> {
    decide: &'d dyn Fn(&Aggregator) -> Replacement,
    counter: usize,
    grounded: Vec<String>,
}

impl AggregateReplacer<'_> {
    fn clone_literal(&mut self, lit: &Literal) -> Literal {
        match lit {
            Literal::Atom(atom) => Literal::Atom(self.clone_atom(atom)),
            Literal::Negation(neg) => Literal::Negation(Negation::new(
                self.clone_atom(&neg.atom),
                neg.loc.clone(),
            )),
            Literal::BinaryConstraint(bc) => {
                let mut copy = bc.clone();
                *copy.lhs = self.clone_argument(&bc.lhs);
                *copy.rhs = self.clone_argument(&bc.rhs);
                Literal::BinaryConstraint(copy)
            }
            other => other.clone(),
        }
    }

    fn clone_atom(&mut self, atom: &Atom) -> Atom {
        Atom::new(
            atom.name.clone(),
            atom.args.iter().map(|a| self.clone_argument(a)).collect(),
            atom.loc.clone(),
        )
    }

    fn clone_argument(&mut self, arg: &Argument) -> Argument {
        if let Argument::Aggregator(agg) = arg {
            match (self.decide)(agg) {
                Replacement::Replace { grounded } => {
                    let name = format!("+aggr_var_{}", self.counter);
                    self.counter += 1;
                    if grounded {
                        self.grounded.push(name.clone());
                    }
                    return Argument::var(name);
                }
                Replacement::Keep => {
                    let mut copy = agg.clone();
                    copy.target = agg
                        .target()
                        .map(|t| Box::new(self.clone_argument(t)));
                    copy.body = agg.body.iter().map(|l| self.clone_literal(l)).collect();
                    return Argument::Aggregator(copy);
                }
            }
        }
        match arg {
            Argument::IntrinsicFunctor(functor) => {
                let mut copy = functor.clone();
                copy.args = functor.args.iter().map(|a| self.clone_argument(a)).collect();
                Argument::IntrinsicFunctor(copy)
            }
            Argument::UserDefinedFunctor(functor) => {
                let mut copy = functor.clone();
                copy.args = functor.args.iter().map(|a| self.clone_argument(a)).collect();
                Argument::UserDefinedFunctor(copy)
            }
            Argument::TypeCast(cast) => {
                let mut copy = cast.clone();
                copy.value = Box::new(self.clone_argument(&cast.value));
                Argument::TypeCast(copy)
            }
            Argument::RecordInit(rec) => {
                let mut copy = rec.clone();
                copy.args = rec.args.iter().map(|a| self.clone_argument(a)).collect();
                Argument::RecordInit(copy)
            }
            Argument::BranchInit(branch) => {
                let mut copy = branch.clone();
                copy.args = branch.args.iter().map(|a| self.clone_argument(a)).collect();
                Argument::BranchInit(copy)
            }
            other => other.clone(),
        }
    }
}

/// Build the synthetic outer-scope clause: body literals with aggregates
/// replaced per `decide`, the negated head, and a grounding atom for the
/// replaced aggregate values.
fn outer_scope_clause(clause: &Clause, decide: &dyn Fn(&Aggregator) -> Replacement) -> Clause {
    let mut replacer = AggregateReplacer {
        decide,
        counter: 0,
        grounded: Vec::new(),
    };
    let mut body: Vec<Literal> = clause
        .body
        .iter()
        .map(|lit| replacer.clone_literal(lit))
        .collect();
    body.push(Literal::Negation(Negation::new(
        clause.head.clone(),
        clause.head.loc.clone(),
    )));
    body.push(Literal::Atom(Atom::new(
        "+grounding_atom",
        replacer
            .grounded
            .iter()
            .map(|name| Argument::var(name.clone()))
            .collect(),
        SrcLocation::unset(),
    )));
    Clause::new(
        Atom::new("*", Vec::new(), SrcLocation::unset()),
        body,
        SrcLocation::unset(),
    )
}

/// Per-name groundedness of the named variables of a clause.
fn grounded_variable_names(program: &Program, clause: &Clause) -> FxHashMap<String, bool> {
    let solution = grounded_terms(program, clause);
    let mut result = FxHashMap::default();
    visit_variables_in_clause(clause, &mut |var| {
        let grounded = solution.get(&var.id).copied().unwrap_or(false);
        result.insert(var.name.clone(), grounded);
    });
    result
}

/// All variable names occurring in the aggregate (target and body).
fn variables_in_aggregate(agg: &Aggregator) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    if let Some(target) = agg.target() {
        visit_variables_in_argument(target, &mut |var| {
            names.insert(var.name.clone());
        });
    }
    for lit in &agg.body {
        strudel_ast::visit::visit_arguments_in_literal(lit, &mut |arg| {
            if let Argument::Variable(var) = arg {
                names.insert(var.name.clone());
            }
        });
    }
    names
}

/// Ids of the aggregators of the clause that contain the target (the
/// target itself included).
fn ancestor_aggregates(clause: &Clause, target: NodeId) -> FxHashSet<NodeId> {
    let mut ancestors = FxHashSet::default();
    visit_aggregators_in_clause(clause, &mut |candidate| {
        let mut contains = false;
        visit_aggregators_in_aggregator(candidate, &mut |inner| {
            contains |= inner.id == target;
        });
        if contains {
            ancestors.insert(candidate.id);
        }
    });
    ancestors
}

/// The variables injected into the aggregate: they occur inside it and
/// grounded in an outer scope, and do not occur in the target expression.
///
/// `aggregate` must be the aggregate as it occurs in `clause` (not a
/// clone: node identities drive the ancestor computation).
#[must_use]
pub fn injected_variables(
    program: &Program,
    clause: &Clause,
    aggregate: &Aggregator,
) -> BTreeSet<String> {
    let inside = variables_in_aggregate(aggregate);
    let ancestors = ancestor_aggregates(clause, aggregate.id);
    let target_id = aggregate.id;

    // Non-ancestral aggregates become grounded placeholders; the target
    // itself becomes a placeholder whose value is deliberately left
    // ungrounded, so only genuine outer groundings count.
    let tweaked = outer_scope_clause(clause, &|agg| {
        if !ancestors.contains(&agg.id) {
            Replacement::Replace { grounded: true }
        } else if agg.id == target_id {
            Replacement::Replace { grounded: false }
        } else {
            Replacement::Keep
        }
    });

    let mut injected: BTreeSet<String> = grounded_variable_names(program, &tweaked)
        .into_iter()
        .filter(|(name, grounded)| *grounded && inside.contains(name))
        .map(|(name, _)| name)
        .collect();

    if let Some(target) = aggregate.target() {
        visit_variables_in_argument(target, &mut |var| {
            injected.remove(&var.name);
        });
    }
    injected
}

/// The witness variables of the aggregate: ungrounded in the outer
/// scope, grounded within the aggregate body.
#[must_use]
pub fn witness_variables(
    program: &Program,
    clause: &Clause,
    aggregate: &Aggregator,
) -> BTreeSet<String> {
    // the outer scope with every aggregate replaced by a grounded
    // placeholder
    let outer = outer_scope_clause(clause, &|_| Replacement::Replace { grounded: true });
    let outer_grounded = grounded_variable_names(program, &outer);

    // the aggregate body as a clause of its own
    let body_clause = Clause::new(
        Atom::new("*", Vec::new(), SrcLocation::unset()),
        aggregate.body.iter().map(Literal::clone).collect(),
        SrcLocation::unset(),
    );
    let body_grounded = grounded_variable_names(program, &body_clause);

    let mut witnesses: BTreeSet<String> = outer_grounded
        .into_iter()
        .filter(|(name, grounded)| {
            !grounded && body_grounded.get(name).copied().unwrap_or(false)
        })
        .map(|(name, _)| name)
        .collect();

    // an apparent witness may in fact originate from an outer scope
    for injected in injected_variables(program, clause, aggregate) {
        witnesses.remove(&injected);
    }
    witnesses
}

/// The local variables of the aggregate: occurring inside it, neither
/// injected nor witnesses.
#[must_use]
pub fn local_variables(
    program: &Program,
    clause: &Clause,
    aggregate: &Aggregator,
) -> BTreeSet<String> {
    let mut locals: BTreeSet<String> = variables_in_aggregate(aggregate).into_iter().collect();
    for name in injected_variables(program, clause, aggregate) {
        locals.remove(&name);
    }
    for name in witness_variables(program, clause, aggregate) {
        locals.remove(&name);
    }
    locals
}

/// The names occurring in the clause outside of the given aggregate.
#[must_use]
pub fn variables_outside_aggregate(clause: &Clause, aggregate: &Aggregator) -> BTreeSet<String> {
    let mut occurrences: FxHashMap<String, i64> = FxHashMap::default();
    visit_variables_in_clause(clause, &mut |var| {
        *occurrences.entry(var.name.clone()).or_default() += 1;
    });
    if let Some(target) = aggregate.target() {
        visit_variables_in_argument(target, &mut |var| {
            *occurrences.entry(var.name.clone()).or_default() -= 1;
        });
    }
    for lit in &aggregate.body {
        strudel_ast::visit::visit_arguments_in_literal(lit, &mut |arg| {
            if let Argument::Variable(var) = arg {
                *occurrences.entry(var.name.clone()).or_default() -= 1;
            }
        });
    }
    occurrences
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(name, _)| name)
        .collect()
}

/// A variable name based on `base` that does not occur in the clause.
#[must_use]
pub fn find_unique_variable_name(clause: &Clause, base: &str) -> String {
    let mut used = FxHashSet::default();
    visit_variables_in_clause(clause, &mut |var| {
        used.insert(var.name.clone());
    });
    let mut candidate = base.to_owned();
    let mut counter = 0;
    while used.contains(&candidate) {
        candidate = format!("{base}{counter}");
        counter += 1;
    }
    candidate
}

/// A relation name based on `base` not yet declared in the program.
#[must_use]
pub fn find_unique_relation_name(program: &Program, base: &str) -> QualifiedName {
    let mut candidate = QualifiedName::from(base);
    let mut counter = 0;
    while program.relation(&candidate).is_some() {
        candidate = QualifiedName::from(format!("{base}{counter}").as_str());
        counter += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use strudel_ast::{AggregateBaseOp, Attribute, Relation};

    fn loc() -> SrcLocation {
        SrcLocation::unset()
    }

    fn relation(name: &str, arity: usize) -> Relation {
        let attrs = (0..arity)
            .map(|i| Attribute::new(format!("a{i}"), "number", loc()))
            .collect();
        Relation::new(name, attrs, loc())
    }

    fn min_aggregate(target: &str, body: Vec<Literal>) -> Aggregator {
        Aggregator::new(AggregateBaseOp::Min, Some(Argument::var(target)), body, loc())
    }

    /// maxv(k, m) :- a(k, _), m = max v : { a(k, v) }.
    fn clause_with_injected() -> (Program, Clause, NodeId) {
        let mut program = Program::new();
        program.add_relation(relation("a", 2));
        program.add_relation(relation("maxv", 2));

        let agg = Aggregator::new(
            AggregateBaseOp::Max,
            Some(Argument::var("v")),
            vec![Literal::Atom(Atom::new(
                "a",
                vec![Argument::var("k"), Argument::var("v")],
                loc(),
            ))],
            loc(),
        );
        let agg_id = agg.id;
        let clause = Clause::new(
            Atom::new("maxv", vec![Argument::var("k"), Argument::var("m")], loc()),
            vec![
                Literal::Atom(Atom::new(
                    "a",
                    vec![Argument::var("k"), Argument::unnamed()],
                    loc(),
                )),
                Literal::eq(Argument::var("m"), Argument::Aggregator(agg)),
            ],
            loc(),
        );
        (program, clause, agg_id)
    }

    /// Run `f` on the aggregate with the given id, in place.
    fn with_aggregate(clause: &Clause, id: NodeId, f: &mut dyn FnMut(&Aggregator)) {
        let mut found = false;
        visit_aggregators_in_clause(clause, &mut |agg| {
            if agg.id == id {
                found = true;
                f(agg);
            }
        });
        assert!(found, "aggregate not found");
    }

    #[test]
    fn injected_variable_is_detected() {
        let (program, clause, agg_id) = clause_with_injected();
        with_aggregate(&clause, agg_id, &mut |agg| {
            let injected = injected_variables(&program, &clause, agg);
            assert_eq!(injected.iter().cloned().collect::<Vec<_>>(), vec!["k"]);

            let locals = local_variables(&program, &clause, agg);
            assert_eq!(locals.iter().cloned().collect::<Vec<_>>(), vec!["v"]);

            assert!(witness_variables(&program, &clause, agg).is_empty());
        });
    }

    #[test]
    fn witness_variable_is_detected() {
        // r(x, y) :- y = min v : { p(x, v) }.
        let mut program = Program::new();
        program.add_relation(relation("p", 2));
        program.add_relation(relation("r", 2));

        let agg = min_aggregate(
            "v",
            vec![Literal::Atom(Atom::new(
                "p",
                vec![Argument::var("x"), Argument::var("v")],
                loc(),
            ))],
        );
        let agg_id = agg.id;
        let clause = Clause::new(
            Atom::new("r", vec![Argument::var("x"), Argument::var("y")], loc()),
            vec![Literal::eq(Argument::var("y"), Argument::Aggregator(agg))],
            loc(),
        );

        with_aggregate(&clause, agg_id, &mut |agg| {
            let witnesses = witness_variables(&program, &clause, agg);
            assert_eq!(witnesses.iter().cloned().collect::<Vec<_>>(), vec!["x"]);
        });
    }

    #[test]
    fn outside_variables_exclude_aggregate_locals() {
        let (_, clause, agg_id) = clause_with_injected();
        with_aggregate(&clause, agg_id, &mut |agg| {
            let outside = variables_outside_aggregate(&clause, agg);
            assert!(outside.contains("m"));
            assert!(outside.contains("k"));
            assert!(!outside.contains("v"));
        });
    }

    #[test]
    fn unique_names_avoid_collisions() {
        let (program, clause, _) = clause_with_injected();
        assert_eq!(find_unique_variable_name(&clause, "k"), "k0");
        assert_eq!(find_unique_variable_name(&clause, "fresh"), "fresh");
        assert_eq!(
            find_unique_relation_name(&program, "a").to_string(),
            "a0"
        );
    }
}
