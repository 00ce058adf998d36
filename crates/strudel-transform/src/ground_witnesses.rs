//! Witness grounding.
//!
//! A witness variable is grounded inside a `min`/`max` aggregate body but
//! occurs ungrounded in the outer rule: its value escapes along with the
//! optimum. To give the outer occurrence a grounding, the aggregate's
//! body literals are copied into the outer rule with the target variable
//! replaced by a clone of the aggregate; inside that clone (and the
//! original aggregate) the witnesses are renamed to fresh `_w` names so
//! the inner scope no longer captures the escaping variable.

use rustc_hash::FxHashMap;

use strudel_ast::visit::{
    apply_to_literal, map_children, visit_aggregators_in_aggregator, visit_aggregators_in_clause,
    visit_aggregators_mut_in_clause, visit_variables_mut_in_argument, visit_variables_mut_in_literal,
    ArgumentMapper,
};
use strudel_ast::{Aggregator, Argument, Literal, NodeId, TranslationUnit};
use strudel_solver::aggregate::{find_unique_variable_name, witness_variables};
use tracing::debug;

use crate::Transform;

pub struct GroundWitnesses;

/// Replaces every occurrence of the target variable with a clone of the
/// (witness-renamed) aggregate.
struct TargetVariableReplacer<'a> {
    target: &'a str,
    aggregate: &'a Aggregator,
}

impl ArgumentMapper for TargetVariableReplacer<'_> {
    fn map_argument(&mut self, arg: Argument) -> Argument {
        if let Argument::Variable(var) = &arg {
            if var.name == self.target {
                return Argument::Aggregator(self.aggregate.clone());
            }
        }
        map_children(arg, self)
    }
}

impl Transform for GroundWitnesses {
    fn name(&self) -> &'static str {
        "ground-witnesses"
    }

    fn apply(&mut self, tu: &mut TranslationUnit) -> bool {
        struct Instance {
            clause_index: usize,
            aggregate: NodeId,
            witnesses: Vec<String>,
        }

        let program = &tu.program;
        let mut instances: Vec<Instance> = Vec::new();
        for (clause_index, clause) in program.clauses.iter().enumerate() {
            visit_aggregators_in_clause(clause, &mut |agg| {
                // witnesses may only escape min/max; for the other
                // operators the checker reports them as errors
                if !agg.op.admits_witnesses() {
                    return;
                }
                let mut witnesses = witness_variables(program, clause, agg);
                // witnesses that belong to an inner aggregate are not
                // ours to ground
                visit_aggregators_in_aggregator(agg, &mut |inner| {
                    if inner.id == agg.id {
                        return;
                    }
                    for witness in witness_variables(program, clause, inner) {
                        witnesses.remove(&witness);
                    }
                });
                if witnesses.is_empty() {
                    return;
                }
                instances.push(Instance {
                    clause_index,
                    aggregate: agg.id,
                    witnesses: witnesses.into_iter().collect(),
                });
            });
        }

        let changed = !instances.is_empty();
        for instance in instances {
            let clause = &mut tu.program.clauses[instance.clause_index];

            // fresh names for the witnesses inside the aggregate
            let renames: FxHashMap<String, String> = instance
                .witnesses
                .iter()
                .map(|witness| {
                    let fresh = find_unique_variable_name(clause, &format!("{witness}_w"));
                    (witness.clone(), fresh)
                })
                .collect();

            // copy the body literals (original names), rename the
            // witnesses within the aggregate, and clone the renamed form
            let mut copied_literals: Vec<Literal> = Vec::new();
            let mut renamed_aggregate: Option<Aggregator> = None;
            let mut target_name: Option<String> = None;
            visit_aggregators_mut_in_clause(clause, &mut |agg| {
                if agg.id != instance.aggregate {
                    return;
                }
                let Some(target) = agg.target_variable() else {
                    return; // complex targets were normalized away
                };
                target_name = Some(target.to_owned());
                copied_literals = agg.body.clone();

                let mut rename = |var: &mut strudel_ast::Variable| {
                    if let Some(fresh) = renames.get(&var.name) {
                        var.name = fresh.clone();
                    }
                };
                if let Some(target) = agg.target.as_deref_mut() {
                    visit_variables_mut_in_argument(target, &mut rename);
                }
                for lit in &mut agg.body {
                    visit_variables_mut_in_literal(lit, &mut rename);
                }
                renamed_aggregate = Some(agg.clone());
            });

            let (Some(target_name), Some(renamed_aggregate)) = (target_name, renamed_aggregate)
            else {
                continue;
            };
            debug!(
                witnesses = instance.witnesses.len(),
                "grounding aggregate witnesses"
            );

            // append the copied literals with the target variable
            // replaced by the renamed aggregate
            let mut replacer = TargetVariableReplacer {
                target: &target_name,
                aggregate: &renamed_aggregate,
            };
            for mut lit in copied_literals {
                apply_to_literal(&mut lit, &mut replacer);
                clause.body.push(lit);
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strudel_ast::{
        AggregateBaseOp, Atom, Attribute, Clause, Program, Relation,
    };
    use strudel_common::options::Options;
    use strudel_common::span::SrcLocation;

    fn loc() -> SrcLocation {
        SrcLocation::unset()
    }

    fn relation(name: &str, arity: usize) -> Relation {
        let attrs = (0..arity)
            .map(|i| Attribute::new(format!("a{i}"), "number", loc()))
            .collect();
        Relation::new(name, attrs, loc())
    }

    #[test]
    fn witness_occurrence_is_grounded_by_copied_body() {
        // r(x, y) :- y = min v : { p(x, v) }.
        let mut program = Program::new();
        program.add_relation(relation("p", 2));
        program.add_relation(relation("r", 2));

        let agg = Argument::Aggregator(Aggregator::new(
            AggregateBaseOp::Min,
            Some(Argument::var("v")),
            vec![Literal::Atom(Atom::new(
                "p",
                vec![Argument::var("x"), Argument::var("v")],
                loc(),
            ))],
            loc(),
        ));
        program.add_clause(Clause::new(
            Atom::new("r", vec![Argument::var("x"), Argument::var("y")], loc()),
            vec![Literal::eq(Argument::var("y"), agg)],
            loc(),
        ));

        let mut tu = TranslationUnit::new(program, Options::default());
        assert!(GroundWitnesses.apply(&mut tu));

        let clause = &tu.program.clauses[0];
        // the copied p-atom was appended to the body
        assert_eq!(clause.body.len(), 2);
        let appended = clause.body[1].as_atom().expect("appended atom");
        assert_eq!(appended.name.to_string(), "p");
        // first column keeps the original witness name; the second holds
        // the aggregate copy
        assert!(matches!(&appended.args[0], Argument::Variable(v) if v.name == "x"));
        assert!(matches!(&appended.args[1], Argument::Aggregator(_)));

        // inside the original aggregate the witness was renamed
        let original_agg = match &clause.body[0] {
            Literal::BinaryConstraint(bc) => match &*bc.rhs {
                Argument::Aggregator(agg) => agg.clone(),
                _ => panic!("expected aggregate"),
            },
            _ => panic!("expected equality"),
        };
        let body_atom = original_agg.body[0].as_atom().expect("body atom");
        assert!(matches!(&body_atom.args[0], Argument::Variable(v) if v.name == "x_w"));

        // the witness grounding must only fire once
        assert!(!GroundWitnesses.apply(&mut tu));
    }
}
