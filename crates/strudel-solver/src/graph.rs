//! The precedence graph over relations, its strongly connected
//! components, and the derived stratification artifacts.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use strudel_ast::{
    Clause, DirectiveKind, Literal, NodeId, Program, QualifiedName, RelationQualifiers,
};
use strudel_common::diagnostics::{Diagnostic, ErrorReport};
use strudel_common::span::SrcLocation;

/// How a dependency edge was induced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DependencyKind {
    Positive,
    Negation,
    Aggregation,
}

/// A dependency that must not close a cycle.
#[derive(Clone, Debug)]
pub struct NegativeDependency {
    /// The relation being negated or aggregated over.
    pub from: QualifiedName,
    /// The relation whose clause depends on it.
    pub to: QualifiedName,
    pub kind: DependencyKind,
    pub loc: SrcLocation,
}

/// Edges are "relation `to`'s clauses depend on relation `from`".
pub struct PrecedenceGraph {
    graph: DiGraph<QualifiedName, ()>,
    nodes: FxHashMap<QualifiedName, NodeIndex>,
    negative: Vec<NegativeDependency>,
}

impl PrecedenceGraph {
    #[must_use]
    pub fn build(program: &Program) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = FxHashMap::default();
        for rel in &program.relations {
            let idx = graph.add_node(rel.name.clone());
            nodes.insert(rel.name.clone(), idx);
        }

        let mut this = PrecedenceGraph {
            graph,
            nodes,
            negative: Vec::new(),
        };
        for clause in &program.clauses {
            this.add_clause_dependencies(clause);
        }
        debug!(
            relations = this.graph.node_count(),
            edges = this.graph.edge_count(),
            "precedence graph built"
        );
        this
    }

    fn add_clause_dependencies(&mut self, clause: &Clause) {
        let head = clause.head.name.clone();
        for lit in &clause.body {
            self.add_literal_dependencies(&head, lit);
        }
    }

    fn add_literal_dependencies(&mut self, head: &QualifiedName, lit: &Literal) {
        match lit {
            Literal::Atom(atom) => {
                self.add_edge(&atom.name, head, DependencyKind::Positive, atom.loc.clone());
                for arg in &atom.args {
                    self.add_argument_dependencies(head, arg);
                }
            }
            Literal::Negation(neg) => {
                self.add_edge(&neg.atom.name, head, DependencyKind::Negation, neg.loc.clone());
                for arg in &neg.atom.args {
                    self.add_argument_dependencies(head, arg);
                }
            }
            Literal::BinaryConstraint(bc) => {
                self.add_argument_dependencies(head, &bc.lhs);
                self.add_argument_dependencies(head, &bc.rhs);
            }
            Literal::BooleanConstraint(_) | Literal::FunctionalConstraint(_) => {}
        }
    }

    fn add_argument_dependencies(&mut self, head: &QualifiedName, arg: &strudel_ast::Argument) {
        strudel_ast::visit::visit_arguments(arg, &mut |nested| {
            if let strudel_ast::Argument::Aggregator(agg) = nested {
                for lit in &agg.body {
                    match lit {
                        Literal::Atom(atom) => {
                            self.add_edge(
                                &atom.name,
                                head,
                                DependencyKind::Aggregation,
                                atom.loc.clone(),
                            );
                        }
                        Literal::Negation(neg) => {
                            self.add_edge(
                                &neg.atom.name,
                                head,
                                DependencyKind::Negation,
                                neg.loc.clone(),
                            );
                        }
                        _ => {}
                    }
                }
            }
        });
    }

    fn add_edge(
        &mut self,
        from: &QualifiedName,
        to: &QualifiedName,
        kind: DependencyKind,
        loc: SrcLocation,
    ) {
        let (Some(&from_idx), Some(&to_idx)) = (self.nodes.get(from), self.nodes.get(to)) else {
            return; // undeclared relation, reported by the checker
        };
        if self.graph.find_edge(from_idx, to_idx).is_none() {
            self.graph.add_edge(from_idx, to_idx, ());
        }
        if kind != DependencyKind::Positive {
            self.negative.push(NegativeDependency {
                from: from.clone(),
                to: to.clone(),
                kind,
                loc,
            });
        }
    }

    /// The relations the given relation's clauses depend on.
    #[must_use]
    pub fn dependencies_of(&self, name: &QualifiedName) -> Vec<&QualifiedName> {
        let Some(&idx) = self.nodes.get(name) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .map(|n| &self.graph[n])
            .collect()
    }

    /// The relations depending on the given relation.
    #[must_use]
    pub fn dependents_of(&self, name: &QualifiedName) -> Vec<&QualifiedName> {
        let Some(&idx) = self.nodes.get(name) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Outgoing)
            .map(|n| &self.graph[n])
            .collect()
    }

    #[must_use]
    pub fn negative_dependencies(&self) -> &[NegativeDependency] {
        &self.negative
    }

    fn has_self_edge(&self, name: &QualifiedName) -> bool {
        self.nodes
            .get(name)
            .is_some_and(|&idx| self.graph.find_edge(idx, idx).is_some())
    }
}

/// The condensation of the precedence graph: strongly connected
/// components in topological order (dependencies first).
pub struct SccGraph {
    sccs: Vec<Vec<QualifiedName>>,
    scc_of: FxHashMap<QualifiedName, usize>,
    recursive: Vec<bool>,
}

impl SccGraph {
    #[must_use]
    pub fn build(precedence: &PrecedenceGraph) -> Self {
        // tarjan yields components in reverse topological order
        let mut components = tarjan_scc(&precedence.graph);
        components.reverse();

        let mut sccs = Vec::with_capacity(components.len());
        let mut scc_of = FxHashMap::default();
        let mut recursive = Vec::with_capacity(components.len());
        for (index, component) in components.into_iter().enumerate() {
            let mut members: Vec<QualifiedName> = component
                .iter()
                .map(|&n| precedence.graph[n].clone())
                .collect();
            members.sort();
            let is_recursive =
                members.len() > 1 || members.iter().any(|m| precedence.has_self_edge(m));
            for member in &members {
                scc_of.insert(member.clone(), index);
            }
            sccs.push(members);
            recursive.push(is_recursive);
        }
        debug!(sccs = sccs.len(), "scc graph built");
        SccGraph {
            sccs,
            scc_of,
            recursive,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sccs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sccs.is_empty()
    }

    /// Relations of the SCC at the given topological position.
    #[must_use]
    pub fn relations_in(&self, scc: usize) -> &[QualifiedName] {
        &self.sccs[scc]
    }

    #[must_use]
    pub fn is_recursive(&self, scc: usize) -> bool {
        self.recursive[scc]
    }

    /// The topological position of the SCC containing the relation.
    #[must_use]
    pub fn scc_of(&self, name: &QualifiedName) -> Option<usize> {
        self.scc_of.get(name).copied()
    }

    /// Report every SCC whose internal cycle includes a negation or
    /// aggregation dependency.
    pub fn check_stratification(
        &self,
        program: &Program,
        precedence: &PrecedenceGraph,
        report: &mut ErrorReport,
    ) {
        for dependency in precedence.negative_dependencies() {
            let (Some(from_scc), Some(to_scc)) = (
                self.scc_of(&dependency.from),
                self.scc_of(&dependency.to),
            ) else {
                continue;
            };
            if from_scc != to_scc {
                continue;
            }
            let members = self.relations_in(from_scc);
            let names: Vec<String> = members.iter().map(QualifiedName::to_string).collect();
            let primary_loc = program
                .relation(&members[0])
                .map(|rel| rel.loc.clone())
                .unwrap_or_default();
            let related = match dependency.kind {
                DependencyKind::Negation => format!("negation of {}", dependency.from),
                DependencyKind::Aggregation => {
                    format!("aggregation over {}", dependency.from)
                }
                DependencyKind::Positive => unreachable!("positive edges are never recorded"),
            };
            report.add_diagnostic(
                Diagnostic::error(
                    format!("Unable to stratify relation(s) {{{}}}", names.join(",")),
                    primary_loc,
                )
                .with_related(related, dependency.loc.clone()),
            );
        }
    }
}

/// Clauses whose body depends on the head's own stratum.
pub struct RecursiveClauses {
    recursive_heads: FxHashSet<NodeId>,
}

impl RecursiveClauses {
    #[must_use]
    pub fn build(program: &Program, sccs: &SccGraph) -> Self {
        let mut recursive_heads = FxHashSet::default();
        for clause in &program.clauses {
            let head_scc = sccs.scc_of(&clause.head.name);
            let recursive = head_scc.is_some()
                && clause
                    .body_atoms()
                    .iter()
                    .any(|atom| sccs.scc_of(&atom.name) == head_scc);
            if recursive {
                recursive_heads.insert(clause.head.id);
            }
        }
        RecursiveClauses { recursive_heads }
    }

    #[must_use]
    pub fn is_recursive(&self, clause: &Clause) -> bool {
        self.recursive_heads.contains(&clause.head.id)
    }
}

/// For each SCC step, the relations whose last reader has completed and
/// that may therefore be cleared.
pub struct RelationSchedule {
    expired: Vec<Vec<QualifiedName>>,
}

impl RelationSchedule {
    #[must_use]
    pub fn build(program: &Program, precedence: &PrecedenceGraph, sccs: &SccGraph) -> Self {
        let mut expired = vec![Vec::new(); sccs.len()];
        for rel in &program.relations {
            let Some(own_step) = sccs.scc_of(&rel.name) else {
                continue;
            };
            if rel.has_qualifier(RelationQualifiers::OUTPUT)
                || rel.has_qualifier(RelationQualifiers::PRINT_SIZE)
                || !program.directives_of(&rel.name, DirectiveKind::Output).is_empty()
                || !program
                    .directives_of(&rel.name, DirectiveKind::PrintSize)
                    .is_empty()
            {
                continue;
            }
            let last_step = precedence
                .dependents_of(&rel.name)
                .into_iter()
                .filter_map(|user| sccs.scc_of(user))
                .fold(own_step, usize::max);
            expired[last_step].push(rel.name.clone());
        }
        for step in &mut expired {
            step.sort();
        }
        RelationSchedule { expired }
    }

    /// Relations to clear once the given step has completed.
    #[must_use]
    pub fn expired_at(&self, step: usize) -> &[QualifiedName] {
        &self.expired[step]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strudel_ast::{Argument, Atom, Attribute, Negation, Relation};
    use strudel_common::span::SrcLocation;

    fn loc() -> SrcLocation {
        SrcLocation::unset()
    }

    fn relation(name: &str) -> Relation {
        Relation::new(name, vec![Attribute::new("x", "number", loc())], loc())
    }

    fn atom(name: &str, var: &str) -> Atom {
        Atom::new(name, vec![Argument::var(var)], loc())
    }

    /// edge/path transitive closure program.
    fn tc_program() -> Program {
        let mut program = Program::new();
        program.add_relation(relation("edge"));
        program.add_relation(relation("path"));
        // path(x) :- edge(x).
        program.add_clause(Clause::new(
            atom("path", "x"),
            vec![Literal::Atom(atom("edge", "x"))],
            loc(),
        ));
        // path(x) :- path(x), edge(x).
        program.add_clause(Clause::new(
            atom("path", "x"),
            vec![
                Literal::Atom(atom("path", "x")),
                Literal::Atom(atom("edge", "x")),
            ],
            loc(),
        ));
        program
    }

    #[test]
    fn sccs_are_topologically_ordered() {
        let program = tc_program();
        let precedence = PrecedenceGraph::build(&program);
        let sccs = SccGraph::build(&precedence);

        assert_eq!(sccs.len(), 2);
        assert_eq!(sccs.relations_in(0), &[QualifiedName::from("edge")]);
        assert_eq!(sccs.relations_in(1), &[QualifiedName::from("path")]);
        assert!(!sccs.is_recursive(0));
        assert!(sccs.is_recursive(1));
    }

    #[test]
    fn recursive_clauses_are_classified() {
        let program = tc_program();
        let precedence = PrecedenceGraph::build(&program);
        let sccs = SccGraph::build(&precedence);
        let recursive = RecursiveClauses::build(&program, &sccs);

        assert!(!recursive.is_recursive(&program.clauses[0]));
        assert!(recursive.is_recursive(&program.clauses[1]));
    }

    #[test]
    fn negation_cycle_is_unstratifiable() {
        let mut program = Program::new();
        program.add_relation(relation("a"));
        program.add_relation(relation("b"));
        program.add_relation(relation("dom"));
        // a(x) :- b(x).
        program.add_clause(Clause::new(
            atom("a", "x"),
            vec![Literal::Atom(atom("b", "x"))],
            loc(),
        ));
        // b(x) :- !a(x), dom(x).
        program.add_clause(Clause::new(
            atom("b", "x"),
            vec![
                Literal::Negation(Negation::new(atom("a", "x"), loc())),
                Literal::Atom(atom("dom", "x")),
            ],
            loc(),
        ));

        let precedence = PrecedenceGraph::build(&program);
        let sccs = SccGraph::build(&precedence);
        let mut report = ErrorReport::new();
        sccs.check_stratification(&program, &precedence, &mut report);

        assert_eq!(report.error_count(), 1);
        let message = &report.diagnostics()[0].primary.message;
        assert!(message.contains("Unable to stratify"));
        assert!(message.contains("a") && message.contains("b"));
        assert_eq!(report.diagnostics()[0].related.len(), 1);
    }

    #[test]
    fn positive_recursion_stratifies() {
        let program = tc_program();
        let precedence = PrecedenceGraph::build(&program);
        let sccs = SccGraph::build(&precedence);
        let mut report = ErrorReport::new();
        sccs.check_stratification(&program, &precedence, &mut report);
        assert_eq!(report.error_count(), 0);
    }

    #[test]
    fn intermediate_relations_expire_after_their_last_reader() {
        let mut program = Program::new();
        program.add_relation(relation("base"));
        program.add_relation(relation("mid"));
        let mut out = relation("out");
        out.qualifiers |= RelationQualifiers::OUTPUT;
        program.add_relation(out);
        // mid(x) :- base(x).
        program.add_clause(Clause::new(
            atom("mid", "x"),
            vec![Literal::Atom(atom("base", "x"))],
            loc(),
        ));
        // out(x) :- mid(x).
        program.add_clause(Clause::new(
            atom("out", "x"),
            vec![Literal::Atom(atom("mid", "x"))],
            loc(),
        ));

        let precedence = PrecedenceGraph::build(&program);
        let sccs = SccGraph::build(&precedence);
        let schedule = RelationSchedule::build(&program, &precedence, &sccs);

        // base expires once mid is computed; mid expires once out is
        // computed; out never expires.
        let base_step = sccs.scc_of(&"base".into()).unwrap();
        let mid_step = sccs.scc_of(&"mid".into()).unwrap();
        let out_step = sccs.scc_of(&"out".into()).unwrap();
        assert_eq!(schedule.expired_at(mid_step), &[QualifiedName::from("base")]);
        assert_eq!(schedule.expired_at(out_step), &[QualifiedName::from("mid")]);
        assert!(base_step < mid_step && mid_step < out_step);
        assert!(!schedule
            .expired_at(out_step)
            .contains(&QualifiedName::from("out")));
    }
}
