//! Aggregate variable scoping.
//!
//! Renames every local variable of an aggregate that also occurs outside
//! it to a name unique within the clause, so the local scope of the
//! aggregate body cannot capture or leak bindings.

use rustc_hash::FxHashSet;

use strudel_ast::visit::{
    visit_aggregators_in_clause, visit_aggregators_mut_in_clause, visit_variables_in_clause,
    visit_variables_mut_in_argument, visit_variables_mut_in_literal,
};
use strudel_ast::{NodeId, TranslationUnit};
use strudel_solver::aggregate::{local_variables, variables_outside_aggregate};

use crate::Transform;

pub struct UniqueAggregateVariables;

impl Transform for UniqueAggregateVariables {
    fn name(&self) -> &'static str {
        "unique-aggregate-variables"
    }

    fn apply(&mut self, tu: &mut TranslationUnit) -> bool {
        let mut changed = false;
        let program = &tu.program;

        // plan all renames first; names are drawn from a per-clause pool
        // so parallel plans cannot collide
        let mut plans: Vec<(usize, Vec<(NodeId, String, String)>)> = Vec::new();
        for (clause_index, clause) in program.clauses.iter().enumerate() {
            let mut used: FxHashSet<String> = FxHashSet::default();
            visit_variables_in_clause(clause, &mut |var| {
                used.insert(var.name.clone());
            });

            let mut renames: Vec<(NodeId, String, String)> = Vec::new();
            visit_aggregators_in_clause(clause, &mut |agg| {
                let locals = local_variables(program, clause, agg);
                let outside = variables_outside_aggregate(clause, agg);
                for name in locals.iter().filter(|name| outside.contains(*name)) {
                    let mut candidate = name.clone();
                    let mut counter = 0;
                    while used.contains(&candidate) {
                        candidate = format!("{name}{counter}");
                        counter += 1;
                    }
                    used.insert(candidate.clone());
                    renames.push((agg.id, name.clone(), candidate));
                }
            });
            if !renames.is_empty() {
                plans.push((clause_index, renames));
            }
        }

        for (clause_index, renames) in plans {
            let clause = &mut tu.program.clauses[clause_index];
            for (aggregate, old, new) in renames {
                visit_aggregators_mut_in_clause(clause, &mut |agg| {
                    if agg.id != aggregate {
                        return;
                    }
                    let mut rename = |var: &mut strudel_ast::Variable| {
                        if var.name == old {
                            var.name = new.clone();
                        }
                    };
                    if let Some(target) = agg.target.as_deref_mut() {
                        visit_variables_mut_in_argument(target, &mut rename);
                    }
                    for lit in &mut agg.body {
                        visit_variables_mut_in_literal(lit, &mut rename);
                    }
                });
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strudel_ast::{
        AggregateBaseOp, Aggregator, Argument, Atom, Attribute, Clause, Literal, Program, Relation,
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
    fn clashing_local_variable_is_renamed() {
        // r(x) :- q(x), c = count : { q(x) }, p(c).
        // The aggregate-local x clashes with the outer x.
        let mut program = Program::new();
        program.add_relation(relation("q", 1));
        program.add_relation(relation("p", 1));
        program.add_relation(relation("r", 1));

        let agg = Argument::Aggregator(Aggregator::new(
            AggregateBaseOp::Count,
            None,
            vec![Literal::Atom(Atom::new("q", vec![Argument::var("x")], loc()))],
            loc(),
        ));
        program.add_clause(Clause::new(
            Atom::new("r", vec![Argument::var("x")], loc()),
            vec![
                Literal::Atom(Atom::new("q", vec![Argument::var("x")], loc())),
                Literal::eq(Argument::var("c"), agg),
                Literal::Atom(Atom::new("p", vec![Argument::var("c")], loc())),
            ],
            loc(),
        ));

        let mut tu = TranslationUnit::new(program, Options::default());
        // x is injected (grounded outside), so nothing to rename: the
        // aggregate counts per x.
        assert!(!UniqueAggregateVariables.apply(&mut tu));

        // Now an actually local clash: r(x) :- s(), c = count : { q(x) }, p(c), x = c.
        let mut program = Program::new();
        program.add_relation(relation("q", 1));
        program.add_relation(relation("p", 1));
        program.add_relation(relation("r", 1));
        program.add_relation(relation("s", 0));

        let agg = Argument::Aggregator(Aggregator::new(
            AggregateBaseOp::Count,
            None,
            vec![Literal::Atom(Atom::new("q", vec![Argument::var("x")], loc()))],
            loc(),
        ));
        program.add_clause(Clause::new(
            Atom::new("r", vec![Argument::var("x")], loc()),
            vec![
                Literal::Atom(Atom::new("s", vec![], loc())),
                Literal::eq(Argument::var("c"), agg),
                Literal::Atom(Atom::new("p", vec![Argument::var("c")], loc())),
                Literal::eq(Argument::var("x"), Argument::var("c")),
            ],
            loc(),
        ));

        let mut tu = TranslationUnit::new(program, Options::default());
        assert!(UniqueAggregateVariables.apply(&mut tu));

        // the aggregate body variable is no longer called x
        let clause = &tu.program.clauses[0];
        let mut inner_names = Vec::new();
        visit_aggregators_in_clause(clause, &mut |agg| {
            for lit in &agg.body {
                strudel_ast::visit::visit_arguments_in_literal(lit, &mut |arg| {
                    if let Argument::Variable(v) = arg {
                        inner_names.push(v.name.clone());
                    }
                });
            }
        });
        assert_eq!(inner_names, vec!["x0"]);
    }
}
