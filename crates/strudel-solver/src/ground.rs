//! Groundedness analysis.
//!
//! For one clause, computes for every argument subterm whether it is
//! provably grounded by the body. The analysis instantiates the generic
//! constraint framework over the boolean-disjunct lattice (bottom =
//! false, meet = or):
//!
//! - arguments of positive body atoms (sources) are grounded,
//! - the head is a sink and grounds nothing - unless its relation is
//!   inline, in which case its bindings may be assumed,
//! - negated atoms ground nothing,
//! - constants and aggregate expressions are grounded,
//! - a functor is grounded when all its arguments are,
//! - records and branch initializers are grounded iff all their
//!   elements are (both directions),
//! - equality links both sides, casts propagate from value to result.

use rustc_hash::FxHashMap;

use strudel_ast::visit::visit_arguments_in_clause;
use strudel_ast::{Argument, Clause, ConstraintOp, Literal, NodeId, Program};

use crate::constraint::{
    flow, Assignment, Constraint, Problem, PropertySpace, VarId, VarRegistry,
};

/// The boolean-disjunct lattice.
pub struct BoolDisjunct;

impl PropertySpace for BoolDisjunct {
    type Value = bool;

    fn bottom(&self) -> bool {
        false
    }

    fn meet(&self, a: &mut bool, b: &bool) -> bool {
        let before = *a;
        *a = *a || *b;
        before != *a
    }
}

/// Forces a variable to true.
struct IsTrue(VarId);

impl Constraint<BoolDisjunct> for IsTrue {
    fn update(&mut self, _space: &BoolDisjunct, assignment: &mut Assignment<bool>) -> bool {
        let changed = !*assignment.get(self.0);
        assignment.set(self.0, true);
        changed
    }

    fn describe(&self, registry: &VarRegistry) -> String {
        format!("{} is true", registry.label(self.0))
    }
}

/// `vars[0] ∧ ... ∧ vars[n] => result`.
struct ImplyAll {
    premises: Vec<VarId>,
    conclusion: VarId,
}

impl Constraint<BoolDisjunct> for ImplyAll {
    fn update(&mut self, _space: &BoolDisjunct, assignment: &mut Assignment<bool>) -> bool {
        if *assignment.get(self.conclusion) {
            return false;
        }
        if self.premises.iter().any(|&var| !*assignment.get(var)) {
            return false;
        }
        assignment.set(self.conclusion, true);
        true
    }

    fn describe(&self, registry: &VarRegistry) -> String {
        let premises: Vec<&str> = self.premises.iter().map(|&v| registry.label(v)).collect();
        format!("{} => {}", premises.join(" ∧ "), registry.label(self.conclusion))
    }
}

struct GroundednessAnalysis<'p> {
    program: &'p Program,
    registry: VarRegistry,
    problem: Problem<BoolDisjunct>,
}

impl<'p> GroundednessAnalysis<'p> {
    fn new(program: &'p Program) -> Self {
        GroundednessAnalysis {
            program,
            registry: VarRegistry::new(),
            problem: Problem::new(),
        }
    }

    fn var_of(&mut self, arg: &Argument) -> VarId {
        match arg {
            Argument::Variable(var) => self.registry.named(&var.name),
            other => self.registry.node(other.id()),
        }
    }

    fn force_true(&mut self, arg: &Argument) {
        let var = self.var_of(arg);
        self.problem.add(Box::new(IsTrue(var)));
    }

    fn imply(&mut self, from: VarId, to: VarId) {
        self.problem.add(flow(from, to, "=>"));
    }

    fn collect_clause(&mut self, clause: &Clause) {
        // The head is a sink unless its relation is inline: keeping an
        // inline head grounds any mentioned variables.
        let head_is_source = self
            .program
            .relation(&clause.head.name)
            .is_some_and(|rel| rel.is_inline());
        for arg in &clause.head.args {
            if head_is_source {
                self.force_true(arg);
            }
            self.collect_argument(arg);
        }
        for lit in &clause.body {
            self.collect_literal(lit, true);
        }
    }

    fn collect_literal(&mut self, lit: &Literal, positive: bool) {
        match lit {
            Literal::Atom(atom) => {
                for arg in &atom.args {
                    if positive {
                        self.force_true(arg);
                    }
                    self.collect_argument(arg);
                }
            }
            Literal::Negation(neg) => {
                // the negated atom grounds nothing, but structural
                // constraints inside its arguments still apply
                for arg in &neg.atom.args {
                    self.collect_argument(arg);
                }
            }
            Literal::BinaryConstraint(bc) => {
                if bc.op == ConstraintOp::Eq {
                    let lhs = self.var_of(&bc.lhs);
                    let rhs = self.var_of(&bc.rhs);
                    self.imply(lhs, rhs);
                    self.imply(rhs, lhs);
                }
                self.collect_argument(&bc.lhs);
                self.collect_argument(&bc.rhs);
            }
            Literal::BooleanConstraint(_) | Literal::FunctionalConstraint(_) => {}
        }
    }

    fn collect_argument(&mut self, arg: &Argument) {
        match arg {
            Argument::NumericConstant(_)
            | Argument::StringConstant(_)
            | Argument::NilConstant(_) => {
                self.force_true(arg);
            }
            Argument::Aggregator(agg) => {
                // an aggregate expression always produces a value
                self.force_true(arg);
                if let Some(target) = agg.target() {
                    self.collect_argument(target);
                }
                for lit in &agg.body {
                    self.collect_literal(lit, true);
                }
            }
            Argument::IntrinsicFunctor(functor) => {
                let result = self.var_of(arg);
                let premises: Vec<VarId> =
                    functor.args.iter().map(|a| self.var_of(a)).collect();
                self.problem.add(Box::new(ImplyAll {
                    premises,
                    conclusion: result,
                }));
                for child in &functor.args {
                    self.collect_argument(child);
                }
            }
            Argument::UserDefinedFunctor(functor) => {
                let result = self.var_of(arg);
                let premises: Vec<VarId> =
                    functor.args.iter().map(|a| self.var_of(a)).collect();
                self.problem.add(Box::new(ImplyAll {
                    premises,
                    conclusion: result,
                }));
                for child in &functor.args {
                    self.collect_argument(child);
                }
            }
            Argument::TypeCast(cast) => {
                let value = self.var_of(&cast.value);
                let result = self.var_of(arg);
                self.imply(value, result);
                self.collect_argument(&cast.value);
            }
            Argument::RecordInit(rec) => {
                self.collect_container(arg, &rec.args);
            }
            Argument::BranchInit(branch) => {
                self.collect_container(arg, &branch.args);
            }
            Argument::Variable(_) | Argument::UnnamedVariable(_) | Argument::Counter(_) => {}
        }
    }

    /// Records and branch initializers: the container is grounded iff
    /// all elements are.
    fn collect_container(&mut self, container: &Argument, elements: &[Argument]) {
        let container_var = self.var_of(container);
        let mut element_vars = Vec::with_capacity(elements.len());
        for element in elements {
            let element_var = self.var_of(element);
            self.imply(container_var, element_var);
            element_vars.push(element_var);
            self.collect_argument(element);
        }
        self.problem.add(Box::new(ImplyAll {
            premises: element_vars,
            conclusion: container_var,
        }));
    }
}

/// Computes for every argument subterm of the clause whether it is
/// provably grounded by the body.
#[must_use]
pub fn grounded_terms(program: &Program, clause: &Clause) -> FxHashMap<NodeId, bool> {
    let mut analysis = GroundednessAnalysis::new(program);
    analysis.collect_clause(clause);

    let GroundednessAnalysis {
        mut registry,
        mut problem,
        ..
    } = analysis;

    // Ensure every argument node has a variable before sizing the
    // assignment: nodes no constraint mentions still need an entry.
    let mut var_for_node: Vec<(NodeId, VarId)> = Vec::new();
    visit_arguments_in_clause(clause, &mut |arg| {
        let var = match arg {
            Argument::Variable(v) => registry.named(&v.name),
            other => registry.node(other.id()),
        };
        var_for_node.push((arg.id(), var));
    });

    let solution = problem.solve(&BoolDisjunct, registry.len());

    var_for_node
        .into_iter()
        .map(|(node, var)| (node, *solution.get(var)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strudel_ast::visit::visit_variables_in_clause;
    use strudel_ast::{
        AggregateBaseOp, Aggregator, Atom, Attribute, IntrinsicFunctor, IntrinsicOp, Negation,
        RecordInit, Relation, RelationQualifiers,
    };
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

    fn grounded_variables(program: &Program, clause: &Clause) -> FxHashMap<String, bool> {
        let solution = grounded_terms(program, clause);
        let mut result = FxHashMap::default();
        visit_variables_in_clause(clause, &mut |var| {
            result.insert(var.name.clone(), solution[&var.id]);
        });
        result
    }

    #[test]
    fn positive_atoms_ground_their_arguments() {
        let mut program = Program::new();
        program.add_relation(relation("p", 1));
        program.add_relation(relation("q", 1));

        // p(x) :- q(x).
        let clause = Clause::new(
            Atom::new("p", vec![Argument::var("x")], loc()),
            vec![Literal::Atom(Atom::new("q", vec![Argument::var("x")], loc()))],
            loc(),
        );
        let vars = grounded_variables(&program, &clause);
        assert!(vars["x"]);
    }

    #[test]
    fn negated_atoms_ground_nothing() {
        let mut program = Program::new();
        program.add_relation(relation("p", 1));
        program.add_relation(relation("q", 1));

        // p(x) :- !q(x).
        let clause = Clause::new(
            Atom::new("p", vec![Argument::var("x")], loc()),
            vec![Literal::Negation(Negation::new(
                Atom::new("q", vec![Argument::var("x")], loc()),
                loc(),
            ))],
            loc(),
        );
        let vars = grounded_variables(&program, &clause);
        assert!(!vars["x"]);
    }

    #[test]
    fn equality_propagates_both_ways() {
        let mut program = Program::new();
        program.add_relation(relation("p", 1));

        // p(x) :- x = 3.
        let clause = Clause::new(
            Atom::new("p", vec![Argument::var("x")], loc()),
            vec![Literal::eq(Argument::var("x"), Argument::number("3"))],
            loc(),
        );
        let vars = grounded_variables(&program, &clause);
        assert!(vars["x"]);

        // p(x) :- x = y.
        let clause = Clause::new(
            Atom::new("p", vec![Argument::var("x")], loc()),
            vec![Literal::eq(Argument::var("x"), Argument::var("y"))],
            loc(),
        );
        let vars = grounded_variables(&program, &clause);
        assert!(!vars["x"]);
        assert!(!vars["y"]);
    }

    #[test]
    fn grounded_record_grounds_its_elements() {
        let mut program = Program::new();
        program.add_relation(relation("p", 2));
        program.add_relation(relation("q", 1));

        // p(x, y) :- q([x, y]).
        let clause = Clause::new(
            Atom::new("p", vec![Argument::var("x"), Argument::var("y")], loc()),
            vec![Literal::Atom(Atom::new(
                "q",
                vec![Argument::RecordInit(RecordInit::new(
                    vec![Argument::var("x"), Argument::var("y")],
                    loc(),
                ))],
                loc(),
            ))],
            loc(),
        );
        let vars = grounded_variables(&program, &clause);
        assert!(vars["x"]);
        assert!(vars["y"]);
    }

    #[test]
    fn functors_ground_their_result_from_arguments() {
        let mut program = Program::new();
        program.add_relation(relation("p", 1));
        program.add_relation(relation("q", 1));

        // p(z) :- q(x), z = x + 1.
        let clause = Clause::new(
            Atom::new("p", vec![Argument::var("z")], loc()),
            vec![
                Literal::Atom(Atom::new("q", vec![Argument::var("x")], loc())),
                Literal::eq(
                    Argument::var("z"),
                    Argument::IntrinsicFunctor(IntrinsicFunctor::new(
                        IntrinsicOp::Add,
                        vec![Argument::var("x"), Argument::number("1")],
                        loc(),
                    )),
                ),
            ],
            loc(),
        );
        let vars = grounded_variables(&program, &clause);
        assert!(vars["z"]);
    }

    #[test]
    fn aggregates_ground_their_value_and_body() {
        let mut program = Program::new();
        program.add_relation(relation("p", 1));
        program.add_relation(relation("q", 1));

        // p(c) :- c = count : { q(v) }.
        let clause = Clause::new(
            Atom::new("p", vec![Argument::var("c")], loc()),
            vec![Literal::eq(
                Argument::var("c"),
                Argument::Aggregator(Aggregator::new(
                    AggregateBaseOp::Count,
                    None,
                    vec![Literal::Atom(Atom::new("q", vec![Argument::var("v")], loc()))],
                    loc(),
                )),
            )],
            loc(),
        );
        let vars = grounded_variables(&program, &clause);
        assert!(vars["c"]);
        assert!(vars["v"]);
    }

    #[test]
    fn inline_heads_count_as_sources() {
        let mut program = Program::new();
        let mut inline_rel = relation("p", 1);
        inline_rel.qualifiers |= RelationQualifiers::INLINE;
        program.add_relation(inline_rel);

        // p(x) :- x != 0.  (x has no grounding except the inline head)
        let clause = Clause::new(
            Atom::new("p", vec![Argument::var("x")], loc()),
            vec![Literal::BinaryConstraint(strudel_ast::BinaryConstraint::new(
                ConstraintOp::Ne,
                Argument::var("x"),
                Argument::number("0"),
                loc(),
            ))],
            loc(),
        );
        let vars = grounded_variables(&program, &clause);
        assert!(vars["x"]);
    }
}
