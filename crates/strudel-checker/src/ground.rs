//! Groundedness checking.
//!
//! Every variable, record and ADT branch of a clause must be provably
//! grounded by the body. Reported once per variable name per clause.

use rustc_hash::FxHashSet;

use strudel_ast::visit::visit_arguments_in_clause;
use strudel_ast::{Argument, Program};
use strudel_common::diagnostics::ErrorReport;
use strudel_solver::grounded_terms;

pub fn check_grounded_terms(program: &Program, report: &mut ErrorReport) {
    for clause in &program.clauses {
        if clause.is_fact() {
            continue;
        }
        let grounded = grounded_terms(program, clause);
        let mut reported: FxHashSet<String> = FxHashSet::default();
        visit_arguments_in_clause(clause, &mut |arg| {
            let is_grounded = grounded.get(&arg.id()).copied().unwrap_or(true);
            if is_grounded {
                return;
            }
            match arg {
                Argument::Variable(var) => {
                    if reported.insert(var.name.clone()) {
                        report.add_error(
                            format!("Ungrounded variable {}", var.name),
                            var.loc.clone(),
                        );
                    }
                }
                Argument::RecordInit(rec) => {
                    report.add_error("Ungrounded record", rec.loc.clone());
                }
                Argument::BranchInit(branch) => {
                    report.add_error("Ungrounded ADT branch", branch.loc.clone());
                }
                _ => {}
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strudel_ast::{Atom, Attribute, Clause, Literal, Negation, Relation};
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
    fn ungrounded_variable_is_reported_once() {
        let mut program = Program::new();
        program.add_relation(relation("p", 2));
        program.add_relation(relation("q", 1));
        // p(x, x) :- !q(x).
        program.add_clause(Clause::new(
            Atom::new(
                "p",
                vec![Argument::var("x"), Argument::var("x")],
                loc(),
            ),
            vec![Literal::Negation(Negation::new(
                Atom::new("q", vec![Argument::var("x")], loc()),
                loc(),
            ))],
            loc(),
        ));

        let mut report = ErrorReport::new();
        check_grounded_terms(&program, &mut report);
        assert_eq!(report.error_count(), 1);
        assert!(report.diagnostics()[0]
            .primary
            .message
            .contains("Ungrounded variable x"));
    }

    #[test]
    fn grounded_clause_passes() {
        let mut program = Program::new();
        program.add_relation(relation("p", 1));
        program.add_relation(relation("q", 1));
        // p(x) :- q(x).
        program.add_clause(Clause::new(
            Atom::new("p", vec![Argument::var("x")], loc()),
            vec![Literal::Atom(Atom::new("q", vec![Argument::var("x")], loc()))],
            loc(),
        ));

        let mut report = ErrorReport::new();
        check_grounded_terms(&program, &mut report);
        assert_eq!(report.error_count(), 0);
    }
}
