//! Aggregate body materialization.
//!
//! An aggregate body that is more than a single self-joined-free atom
//! cannot be lowered directly: its models are enumerated into a fresh
//! relation first. The synthesized relation's columns are the local and
//! injected variables of the aggregate; its single clause is the
//! aggregate body plus grounding atoms pulled in from the original rule
//! for every injected variable. The aggregate body is then replaced by
//! one atom over the synthesized relation with local columns left
//! unnamed.
//!
//! Only innermost aggregates are rewritten per application; running the
//! pass to fixpoint normalizes arbitrarily nested aggregates bottom-up.

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;

use strudel_ast::visit::{
    visit_aggregators_in_aggregator, visit_aggregators_in_clause, visit_aggregators_mut_in_clause,
    visit_variables_in_argument,
};
use strudel_ast::{
    AggregateBaseOp, Aggregator, Argument, Atom, Attribute, Clause, Literal, Negation, NodeId,
    Program, QualifiedName, Relation, TranslationUnit, UnnamedVariable, Variable,
};
use strudel_common::span::SrcLocation;
use strudel_solver::aggregate::{injected_variables, local_variables};
use strudel_solver::ground::grounded_terms;
use strudel_solver::TypeAnalysis;
use strudel_types::TypeEnvironmentAnalysis;
use tracing::debug;

use crate::Transform;

pub struct MaterializeAggregates;

/// Whether the aggregate body must be outlined into its own relation.
#[must_use]
pub fn needs_materialization(aggregate: &Aggregator) -> bool {
    let atoms: Vec<&Atom> = aggregate.body.iter().filter_map(Literal::as_atom).collect();
    if atoms.len() > 1 {
        return true;
    }

    let mut has_inner = false;
    visit_aggregators_in_aggregator(aggregate, &mut |inner| {
        has_inner |= inner.id != aggregate.id;
    });
    if has_inner {
        return true;
    }

    // a repeated variable within the sole atom forms an implicit
    // self-join the direct lowering cannot express
    let Some(atom) = atoms.first() else {
        return false;
    };
    let mut seen = FxHashSet::default();
    let mut duplicate = false;
    for arg in &atom.args {
        visit_variables_in_argument(arg, &mut |var| {
            duplicate |= !seen.insert(var.name.clone());
        });
    }
    duplicate
}

/// Give every anonymous variable of the body a name, so `count` columns
/// can be carried by the synthesized relation. Inner aggregates are left
/// untouched.
fn instantiate_unnamed_variables(clause: &mut Clause) {
    fn instantiate_argument(arg: &mut Argument, counter: &mut usize) {
        match arg {
            Argument::UnnamedVariable(_) => {
                let name = format!("_{counter}");
                *counter += 1;
                *arg = Argument::Variable(Variable::new(name, SrcLocation::unset()));
            }
            Argument::Aggregator(_) => {}
            Argument::IntrinsicFunctor(functor) => {
                for child in &mut functor.args {
                    instantiate_argument(child, counter);
                }
            }
            Argument::UserDefinedFunctor(functor) => {
                for child in &mut functor.args {
                    instantiate_argument(child, counter);
                }
            }
            Argument::TypeCast(cast) => instantiate_argument(&mut cast.value, counter),
            Argument::RecordInit(rec) => {
                for child in &mut rec.args {
                    instantiate_argument(child, counter);
                }
            }
            Argument::BranchInit(branch) => {
                for child in &mut branch.args {
                    instantiate_argument(child, counter);
                }
            }
            _ => {}
        }
    }

    let mut counter = 0usize;
    for lit in &mut clause.body {
        match lit {
            Literal::Atom(atom) => {
                for arg in &mut atom.args {
                    instantiate_argument(arg, &mut counter);
                }
            }
            Literal::Negation(neg) => {
                for arg in &mut neg.atom.args {
                    instantiate_argument(arg, &mut counter);
                }
            }
            Literal::BinaryConstraint(bc) => {
                instantiate_argument(&mut bc.lhs, &mut counter);
                instantiate_argument(&mut bc.rhs, &mut counter);
            }
            _ => {}
        }
    }
}

/// The column set of the synthesized relation: the aggregate's immediate
/// local variables (not those of inner aggregates) plus its injected
/// variables.
fn head_argument_names(
    program: &Program,
    clause: &Clause,
    aggregate: &Aggregator,
) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = local_variables(program, clause, aggregate)
        .into_iter()
        .collect();
    visit_aggregators_in_aggregator(aggregate, &mut |inner| {
        if inner.id == aggregate.id {
            return;
        }
        for inner_local in local_variables(program, clause, inner) {
            names.remove(&inner_local);
        }
    });
    for injected in injected_variables(program, clause, aggregate) {
        names.insert(injected);
    }
    names
}

/// Pull grounding atoms for the injected variables into the synthesized
/// clause: any positive atom of the original rule that grounds an
/// injected variable, with all other columns anonymized.
fn ground_injected_parameters(
    program: &Program,
    body_clause: &mut Clause,
    original_clause: &Clause,
    aggregate: &Aggregator,
) {
    // mask inner aggregates: negate their body atoms so their bindings
    // do not count as groundings
    let mut masked = body_clause.clone();
    masked.head = Atom::new("*", Vec::new(), SrcLocation::unset());
    fn mask_argument(arg: &mut Argument) {
        if let Argument::Aggregator(agg) = arg {
            let mut new_body = Vec::new();
            for lit in &agg.body {
                if let Literal::Atom(atom) = lit {
                    new_body.push(Literal::Negation(Negation::new(
                        atom.clone(),
                        atom.loc.clone(),
                    )));
                }
            }
            agg.body = new_body;
            if let Some(target) = agg.target.as_deref_mut() {
                mask_argument(target);
            }
        }
    }
    for lit in &mut masked.body {
        match lit {
            Literal::Atom(atom) => atom.args.iter_mut().for_each(mask_argument),
            Literal::Negation(neg) => neg.atom.args.iter_mut().for_each(mask_argument),
            Literal::BinaryConstraint(bc) => {
                mask_argument(&mut bc.lhs);
                mask_argument(&mut bc.rhs);
            }
            _ => {}
        }
    }

    let injected = injected_variables(program, original_clause, aggregate);
    let grounded = grounded_terms(program, &masked);

    let mut ungrounded: BTreeSet<String> = BTreeSet::new();
    strudel_ast::visit::visit_variables_in_clause(&masked, &mut |var| {
        let is_grounded = grounded.get(&var.id).copied().unwrap_or(false);
        if !is_grounded && injected.contains(&var.name) {
            ungrounded.insert(var.name.clone());
        }
    });

    for name in ungrounded {
        let mut found = false;
        for lit in &original_clause.body {
            if found {
                break;
            }
            // the literal hosting the aggregate itself cannot ground it
            let mut hosts_aggregate = false;
            strudel_ast::visit::visit_arguments_in_literal(lit, &mut |arg| {
                if let Argument::Aggregator(agg) = arg {
                    hosts_aggregate |= agg.id == aggregate.id;
                }
            });
            if hosts_aggregate {
                continue;
            }
            // the variable must occur in, and be grounded by, this
            // literal alone
            let mut occurs = false;
            strudel_ast::visit::visit_arguments_in_literal(lit, &mut |arg| {
                if let Argument::Variable(var) = arg {
                    occurs |= var.name == name;
                }
            });
            if !occurs {
                continue;
            }
            let single = Clause::new(
                Atom::new("*", Vec::new(), SrcLocation::unset()),
                vec![lit.clone()],
                SrcLocation::unset(),
            );
            let single_grounded = grounded_terms(program, &single);
            let mut grounded_here = false;
            strudel_ast::visit::visit_variables_in_clause(&single, &mut |var| {
                if var.name == name {
                    grounded_here |= single_grounded.get(&var.id).copied().unwrap_or(false);
                }
            });
            if !grounded_here {
                continue;
            }
            // only atoms may be pulled in; anything else would drag a
            // cascade of literals along
            if let Literal::Atom(atom) = lit {
                let args = atom
                    .args
                    .iter()
                    .map(|arg| match arg {
                        Argument::Variable(var) if var.name == name => arg.clone(),
                        _ => Argument::UnnamedVariable(UnnamedVariable::new(SrcLocation::unset())),
                    })
                    .collect();
                body_clause.body.push(Literal::Atom(Atom::new(
                    atom.name.clone(),
                    args,
                    atom.loc.clone(),
                )));
                found = true;
            }
        }
        debug_assert!(
            found,
            "unable to ground injected parameter {name} for materialization"
        );
    }
}

struct Plan {
    clause_index: usize,
    aggregate: NodeId,
    relation: Relation,
    body_clause: Clause,
    replacement_atom: Atom,
}

impl Transform for MaterializeAggregates {
    fn name(&self) -> &'static str {
        "materialize-aggregates"
    }

    fn apply(&mut self, tu: &mut TranslationUnit) -> bool {
        let program = &tu.program;
        let env_analysis = TypeEnvironmentAnalysis::run(program);
        let env = env_analysis.env();
        let type_analysis = TypeAnalysis::empty(env);

        let mut used_names: FxHashSet<QualifiedName> = FxHashSet::default();
        let mut fresh_relation_name = |program: &Program| {
            let mut counter = 0usize;
            loop {
                let candidate = QualifiedName::from(format!("@materialized_body{counter}").as_str());
                if program.relation(&candidate).is_none() && !used_names.contains(&candidate) {
                    used_names.insert(candidate.clone());
                    return candidate;
                }
                counter += 1;
            }
        };

        let mut plans: Vec<Plan> = Vec::new();
        for (clause_index, clause) in program.clauses.iter().enumerate() {
            visit_aggregators_in_clause(clause, &mut |agg| {
                if !needs_materialization(agg) {
                    return;
                }
                // bottom-up: as long as some nested aggregate itself
                // requires materialization, this one waits for a later
                // application
                let mut nested_needs_work = false;
                visit_aggregators_in_aggregator(agg, &mut |inner| {
                    if inner.id != agg.id {
                        nested_needs_work |= needs_materialization(inner);
                    }
                });
                if nested_needs_work {
                    return;
                }

                let relation_name = fresh_relation_name(program);
                let mut body_clause = Clause::new(
                    Atom::new(relation_name.clone(), Vec::new(), agg.loc.clone()),
                    agg.body.clone(),
                    agg.loc.clone(),
                );
                if agg.op == AggregateBaseOp::Count {
                    instantiate_unnamed_variables(&mut body_clause);
                }
                ground_injected_parameters(program, &mut body_clause, clause, agg);

                let head_names = head_argument_names(program, clause, agg);
                for name in &head_names {
                    body_clause
                        .head
                        .args
                        .push(Argument::var(name.clone()));
                }

                // infer attribute types from the synthesized clause
                let types = type_analysis.analyse_clause(env, program, &body_clause);
                let mut attributes = Vec::with_capacity(body_clause.head.args.len());
                for arg in &body_clause.head.args {
                    let set = types
                        .get(&arg.id())
                        .cloned()
                        .unwrap_or(strudel_types::TypeSet::All);
                    let type_name = match &set {
                        strudel_types::TypeSet::Set(members) => members
                            .iter()
                            .next()
                            .map(|&ty| env.name(ty).clone())
                            .unwrap_or_else(|| QualifiedName::from("number")),
                        strudel_types::TypeSet::All => QualifiedName::from("number"),
                    };
                    let name = match arg {
                        Argument::Variable(var) => var.name.clone(),
                        _ => String::new(),
                    };
                    attributes.push(Attribute::new(name, type_name, SrcLocation::unset()));
                }
                let relation = Relation::new(relation_name.clone(), attributes, agg.loc.clone());

                // the replacement body: a single atom over the new
                // relation, local columns anonymized
                let mut locals = local_variables(program, clause, agg);
                if let Some(target) = agg.target_variable() {
                    locals.remove(target);
                }
                let replacement_args = body_clause
                    .head
                    .args
                    .iter()
                    .map(|arg| match arg {
                        Argument::Variable(var) if locals.contains(&var.name) => {
                            Argument::unnamed()
                        }
                        other => other.clone(),
                    })
                    .collect();
                let replacement_atom =
                    Atom::new(relation_name, replacement_args, agg.loc.clone());

                plans.push(Plan {
                    clause_index,
                    aggregate: agg.id,
                    relation,
                    body_clause,
                    replacement_atom,
                });
            });
        }

        let changed = !plans.is_empty();
        for plan in plans {
            debug!(
                relation = %plan.relation.name,
                "materializing aggregate body"
            );
            let clause = &mut tu.program.clauses[plan.clause_index];
            let mut replacement = Some(plan.replacement_atom);
            visit_aggregators_mut_in_clause(clause, &mut |agg| {
                if agg.id == plan.aggregate {
                    if let Some(atom) = replacement.take() {
                        agg.body = vec![Literal::Atom(atom)];
                    }
                }
            });
            tu.program.add_relation(plan.relation);
            tu.program.add_clause(plan.body_clause);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strudel_common::options::Options;

    fn loc() -> SrcLocation {
        SrcLocation::unset()
    }

    fn relation(name: &str, arity: usize) -> Relation {
        let attrs = (0..arity)
            .map(|i| Attribute::new(format!("a{i}"), "number", loc()))
            .collect();
        Relation::new(name, attrs, loc())
    }

    fn count_aggregate(body: Vec<Literal>) -> Aggregator {
        Aggregator::new(AggregateBaseOp::Count, None, body, loc())
    }

    #[test]
    fn single_clean_atom_needs_no_materialization() {
        let agg = count_aggregate(vec![Literal::Atom(Atom::new(
            "q",
            vec![Argument::var("v")],
            loc(),
        ))]);
        assert!(!needs_materialization(&agg));
    }

    #[test]
    fn multiple_atoms_need_materialization() {
        let agg = count_aggregate(vec![
            Literal::Atom(Atom::new("q", vec![Argument::var("v")], loc())),
            Literal::Atom(Atom::new("r", vec![Argument::var("v")], loc())),
        ]);
        assert!(needs_materialization(&agg));
    }

    #[test]
    fn repeated_variable_needs_materialization() {
        let agg = count_aggregate(vec![Literal::Atom(Atom::new(
            "q",
            vec![Argument::var("v"), Argument::var("v")],
            loc(),
        ))]);
        assert!(needs_materialization(&agg));
    }

    #[test]
    fn two_atom_body_is_outlined() {
        // r(c) :- dom(k), c = count : { q(k, v), s(v) }.
        let mut program = Program::new();
        program.add_relation(relation("q", 2));
        program.add_relation(relation("s", 1));
        program.add_relation(relation("dom", 1));
        program.add_relation(relation("r", 1));

        let agg = Argument::Aggregator(count_aggregate(vec![
            Literal::Atom(Atom::new(
                "q",
                vec![Argument::var("k"), Argument::var("v")],
                loc(),
            )),
            Literal::Atom(Atom::new("s", vec![Argument::var("v")], loc())),
        ]));
        program.add_clause(Clause::new(
            Atom::new("r", vec![Argument::var("c")], loc()),
            vec![
                Literal::Atom(Atom::new("dom", vec![Argument::var("k")], loc())),
                Literal::eq(Argument::var("c"), agg),
            ],
            loc(),
        ));

        let mut tu = TranslationUnit::new(program, Options::default());
        assert!(MaterializeAggregates.apply(&mut tu));

        // a new relation and clause were synthesized
        assert_eq!(tu.program.relations.len(), 5);
        assert_eq!(tu.program.clauses.len(), 2);

        let synthesized = tu
            .program
            .relations
            .iter()
            .find(|rel| rel.name.is_synthetic())
            .expect("synthesized relation");
        // columns: injected k and local v
        let columns: Vec<&str> = synthesized
            .attributes
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(columns, vec!["k", "v"]);

        // the synthesized clause carries the aggregate body; k is
        // already grounded by the q-atom, so no extra grounding atom is
        // pulled in
        let body_clause = tu
            .program
            .clauses
            .iter()
            .find(|c| c.head.name.is_synthetic())
            .expect("synthesized clause");
        let atom_names: Vec<String> = body_clause
            .body_atoms()
            .iter()
            .map(|a| a.name.to_string())
            .collect();
        assert_eq!(atom_names, vec!["q", "s"]);

        // the aggregate body is now a single atom with the local column
        // anonymized
        let rewritten = &tu.program.clauses[0];
        let mut bodies = Vec::new();
        visit_aggregators_in_clause(rewritten, &mut |agg| {
            bodies.push(agg.body.clone());
        });
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].len(), 1);
        let atom = bodies[0][0].as_atom().expect("atom body");
        assert!(atom.name.is_synthetic());
        assert!(matches!(&atom.args[0], Argument::Variable(v) if v.name == "k"));
        assert!(matches!(&atom.args[1], Argument::UnnamedVariable(_)));

        // a second application changes nothing
        assert!(!MaterializeAggregates.apply(&mut tu));
    }

    #[test]
    fn ungrounded_injected_parameter_pulls_a_grounding_atom() {
        // r(c) :- dom(k), c = count : { q(v), s(w), v < k }.
        // k is injected but nothing in the aggregate body grounds it.
        let mut program = Program::new();
        program.add_relation(relation("q", 1));
        program.add_relation(relation("s", 1));
        program.add_relation(relation("dom", 1));
        program.add_relation(relation("r", 1));

        let agg = Argument::Aggregator(count_aggregate(vec![
            Literal::Atom(Atom::new("q", vec![Argument::var("v")], loc())),
            Literal::Atom(Atom::new("s", vec![Argument::var("w")], loc())),
            Literal::BinaryConstraint(strudel_ast::BinaryConstraint::new(
                strudel_ast::ConstraintOp::Lt,
                Argument::var("v"),
                Argument::var("k"),
                loc(),
            )),
        ]));
        program.add_clause(Clause::new(
            Atom::new("r", vec![Argument::var("c")], loc()),
            vec![
                Literal::Atom(Atom::new("dom", vec![Argument::var("k")], loc())),
                Literal::eq(Argument::var("c"), agg),
            ],
            loc(),
        ));

        let mut tu = TranslationUnit::new(program, Options::default());
        assert!(MaterializeAggregates.apply(&mut tu));

        let body_clause = tu
            .program
            .clauses
            .iter()
            .find(|c| c.head.name.is_synthetic())
            .expect("synthesized clause");
        let atom_names: Vec<String> = body_clause
            .body_atoms()
            .iter()
            .map(|a| a.name.to_string())
            .collect();
        assert_eq!(atom_names, vec!["q", "s", "dom"]);
    }
}
