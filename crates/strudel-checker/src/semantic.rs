//! The semantic checker: reference, arity, rule-shape, aggregate-shape,
//! inlining and namespace rules.
//!
//! All checks append diagnostics and continue; none aborts the pass.

use rustc_hash::{FxHashMap, FxHashSet};

use strudel_ast::visit::{
    visit_aggregators_in_aggregator, visit_aggregators_in_clause, visit_arguments,
    visit_arguments_in_clause, visit_arguments_in_literal, visit_atoms_in_clause,
    visit_variables_in_clause,
};
use strudel_ast::{
    Argument, Atom, Clause, Literal, Negation, Program, QualifiedName, Relation,
    RelationQualifiers, RelationRepresentation,
};
use strudel_common::diagnostics::ErrorReport;
use strudel_common::options::Options;
use strudel_common::span::SrcLocation;
use strudel_solver::aggregate::witness_variables;
use strudel_solver::grounded_terms;
use strudel_solver::{PrecedenceGraph, RecursiveClauses, SccGraph};
use strudel_types::TypeEnvironmentAnalysis;

pub struct SemanticChecker<'a> {
    pub program: &'a Program,
    pub env_analysis: &'a TypeEnvironmentAnalysis,
    pub precedence: &'a PrecedenceGraph,
    pub sccs: &'a SccGraph,
    pub recursive_clauses: &'a RecursiveClauses,
    pub options: &'a Options,
}

impl SemanticChecker<'_> {
    pub fn check(&self, report: &mut ErrorReport) {
        self.check_namespaces(report);
        self.check_relations(report);
        self.check_io_directives(report);
        self.check_functor_declarations(report);
        for clause in &self.program.clauses {
            self.check_clause(clause, report);
        }
        self.check_singleton_variables(report);
        self.check_aggregate_dependencies(report);
        self.check_witness_problem(report);
        self.check_inlining(report);
        self.sccs
            .check_stratification(self.program, self.precedence, report);
    }

    // -- declarations -------------------------------------------------------

    fn type_name_is_known(&self, name: &QualifiedName) -> bool {
        self.env_analysis.env().is_type(name)
            || self.program.types.iter().any(|decl| decl.name() == name)
    }

    fn check_relations(&self, report: &mut ErrorReport) {
        for relation in &self.program.relations {
            self.check_relation(relation, report);
        }
    }

    fn check_relation(&self, relation: &Relation, report: &mut ErrorReport) {
        // equivalence relations are binary over one domain
        if relation.representation == RelationRepresentation::Eqrel {
            if relation.arity() == 2 {
                if relation.attributes[0].type_name != relation.attributes[1].type_name {
                    report.add_error(
                        format!(
                            "Domains of equivalence relation {} are different",
                            relation.name
                        ),
                        relation.loc.clone(),
                    );
                }
            } else {
                report.add_error(
                    format!("Equivalence relation {} is not binary", relation.name),
                    relation.loc.clone(),
                );
            }
        }

        for (index, attribute) in relation.attributes.iter().enumerate() {
            if !self.type_name_is_known(&attribute.type_name) {
                report.add_error(
                    format!(
                        "Undefined type {} in attribute {}",
                        attribute.type_name, attribute.name
                    ),
                    attribute.loc.clone(),
                );
            }
            for other in &relation.attributes[..index] {
                if attribute.name == other.name {
                    report.add_error(
                        format!("Doubly defined attribute name {}", attribute.name),
                        attribute.loc.clone(),
                    );
                }
            }
        }

        // functional dependency keys must name attributes
        for fd in &relation.functional_dependencies {
            for key in &fd.keys {
                if !relation.attributes.iter().any(|attr| &attr.name == key) {
                    report.add_error(
                        format!("Attribute {key} not found in relation definition."),
                        fd.loc.clone(),
                    );
                }
            }
        }

        // relations without rules or facts are suspicious
        let has_clauses = !self.program.clauses_for(&relation.name).is_empty();
        let is_input = relation.has_qualifier(RelationQualifiers::INPUT)
            || !self
                .program
                .directives_of(&relation.name, strudel_ast::DirectiveKind::Input)
                .is_empty();
        if !has_clauses
            && !is_input
            && !relation.has_qualifier(RelationQualifiers::SUPPRESSED)
            && !self
                .options
                .warnings_suppressed_for(&relation.name.to_string())
        {
            report.add_warning(
                format!("No rules/facts defined for relation {}", relation.name),
                relation.loc.clone(),
            );
        }
    }

    fn check_io_directives(&self, report: &mut ErrorReport) {
        for directive in &self.program.directives {
            if self.program.relation(&directive.relation).is_none() {
                report.add_error(
                    format!("Undefined relation {}", directive.relation),
                    directive.loc.clone(),
                );
            }
        }
    }

    fn check_functor_declarations(&self, report: &mut ErrorReport) {
        for decl in &self.program.functors {
            if !self.type_name_is_known(&decl.return_type.type_name) {
                report.add_error(
                    format!(
                        "Undefined type {} in return type",
                        decl.return_type.type_name
                    ),
                    decl.return_type.loc.clone(),
                );
            }
            for param in &decl.params {
                if !self.type_name_is_known(&param.type_name) {
                    report.add_error(
                        format!("Undefined type {} in attribute {}", param.type_name, param.name),
                        param.loc.clone(),
                    );
                }
            }
        }
    }

    // -- namespaces ---------------------------------------------------------

    fn check_namespaces(&self, report: &mut ErrorReport) {
        let mut names: FxHashMap<String, SrcLocation> = FxHashMap::default();
        for decl in &self.program.types {
            let name = decl.name().to_string();
            if names.contains_key(&name) {
                report.add_error(format!("Name clash on type {name}"), decl.loc().clone());
            } else {
                names.insert(name, decl.loc().clone());
            }
        }
        for relation in &self.program.relations {
            let name = relation.name.to_string();
            if names.contains_key(&name) {
                report.add_error(
                    format!("Name clash on relation {name}"),
                    relation.loc.clone(),
                );
            } else {
                names.insert(name, relation.loc.clone());
            }
        }
    }

    // -- clauses ------------------------------------------------------------

    fn check_clause(&self, clause: &Clause, report: &mut ErrorReport) {
        self.check_atom(&clause.head, report);

        // no underscores in the head (aggregate-internal ones are fine)
        for loc in unnamed_variables_outside_aggregates_in_atom(&clause.head) {
            report.add_error("Underscore in head of rule", loc);
        }

        for lit in &clause.body {
            self.check_literal(lit, report);
        }

        if clause.is_fact() {
            for arg in &clause.head.args {
                if !is_constant_argument(arg) {
                    report.add_error("Argument in fact is not constant", arg.loc().clone());
                }
            }
        }

        // `_name` variables are singleton markers
        let mut occurrences: FxHashMap<String, (usize, SrcLocation)> = FxHashMap::default();
        visit_variables_in_clause(clause, &mut |var| {
            let entry = occurrences
                .entry(var.name.clone())
                .or_insert((0, var.loc.clone()));
            entry.0 += 1;
        });
        for (name, (count, loc)) in &occurrences {
            if name.starts_with('_') && *count > 1 {
                report.add_warning(
                    format!("Variable {name} marked as singleton but occurs more than once"),
                    loc.clone(),
                );
            }
        }

        // the counter produces a new value per evaluation; a fixpoint
        // would never terminate
        if self.recursive_clauses.is_recursive(clause) {
            visit_arguments_in_clause(clause, &mut |arg| {
                if let Argument::Counter(counter) = arg {
                    report.add_error(
                        "Auto-increment functor in a recursive rule",
                        counter.loc.clone(),
                    );
                }
            });
        }
    }

    fn check_literal(&self, lit: &Literal, report: &mut ErrorReport) {
        match lit {
            Literal::Atom(atom) => self.check_atom(atom, report),
            Literal::Negation(neg) => self.check_atom(&neg.atom, report),
            Literal::BinaryConstraint(bc) => {
                self.check_argument(&bc.lhs, report);
                self.check_argument(&bc.rhs, report);

                // witness exporting puts copied aggregates next to
                // underscores; don't flag those
                if matches!(&*bc.lhs, Argument::Aggregator(_))
                    || matches!(&*bc.rhs, Argument::Aggregator(_))
                {
                    return;
                }
                let mut in_records: FxHashSet<strudel_ast::NodeId> = FxHashSet::default();
                for side in [&bc.lhs, &bc.rhs] {
                    visit_arguments(side, &mut |arg| {
                        if let Argument::RecordInit(rec) = arg {
                            for child in &rec.args {
                                if let Argument::UnnamedVariable(unnamed) = child {
                                    in_records.insert(unnamed.id);
                                }
                            }
                        }
                    });
                }
                for side in [&bc.lhs, &bc.rhs] {
                    for (id, loc) in unnamed_variables_outside_aggregates(side) {
                        if !in_records.contains(&id) {
                            report.add_error("Underscore in binary relation", loc);
                        }
                    }
                }
            }
            Literal::BooleanConstraint(_) | Literal::FunctionalConstraint(_) => {}
        }
    }

    fn check_atom(&self, atom: &Atom, report: &mut ErrorReport) {
        let Some(relation) = self.program.relation(&atom.name) else {
            report.add_error(
                format!("Undefined relation {}", atom.name),
                atom.loc.clone(),
            );
            return;
        };
        if relation.arity() != atom.arity() {
            report.add_error(
                format!(
                    "Mismatching arity of relation {} (expected {}, got {})",
                    atom.name,
                    relation.arity(),
                    atom.arity()
                ),
                atom.loc.clone(),
            );
        }
        for arg in &atom.args {
            self.check_argument(arg, report);
        }
    }

    fn check_argument(&self, arg: &Argument, report: &mut ErrorReport) {
        match arg {
            Argument::Aggregator(agg) => {
                for lit in &agg.body {
                    self.check_literal(lit, report);
                }
            }
            Argument::IntrinsicFunctor(functor) => {
                for child in &functor.args {
                    self.check_argument(child, report);
                }
            }
            Argument::UserDefinedFunctor(functor) => {
                for child in &functor.args {
                    self.check_argument(child, report);
                }
                if self.program.functor(&functor.name).is_none() {
                    report.add_error(
                        format!("Undefined user-defined functor {}", functor.name),
                        functor.loc.clone(),
                    );
                }
            }
            Argument::TypeCast(cast) => self.check_argument(&cast.value, report),
            Argument::RecordInit(rec) => {
                for child in &rec.args {
                    self.check_argument(child, report);
                }
            }
            Argument::BranchInit(branch) => {
                for child in &branch.args {
                    self.check_argument(child, report);
                }
            }
            _ => {}
        }
    }

    /// A non-`_` variable occurring exactly once is probably a typo.
    /// Clauses sharing a source location stem from one multi-rule and
    /// share their body occurrences.
    fn check_singleton_variables(&self, report: &mut ErrorReport) {
        // clauses sharing a real source location stem from one
        // multi-rule; synthesized clauses have no location and stand
        // alone
        let mut groups: Vec<Vec<&Clause>> = Vec::new();
        let mut by_loc: FxHashMap<SrcLocation, usize> = FxHashMap::default();
        for clause in &self.program.clauses {
            if clause.loc.is_unset() {
                groups.push(vec![clause]);
                continue;
            }
            match by_loc.get(&clause.loc) {
                Some(&index) => groups[index].push(clause),
                None => {
                    by_loc.insert(clause.loc.clone(), groups.len());
                    groups.push(vec![clause]);
                }
            }
        }

        for group in &groups {
            let mut occurrences: FxHashMap<String, (usize, SrcLocation)> = FxHashMap::default();
            // the shared body counts once
            for lit in &group[0].body {
                visit_arguments_in_literal(lit, &mut |arg| {
                    if let Argument::Variable(var) = arg {
                        let entry = occurrences
                            .entry(var.name.clone())
                            .or_insert((0, var.loc.clone()));
                        entry.0 += 1;
                    }
                });
            }
            // each head separately
            for clause in group.iter() {
                for arg in &clause.head.args {
                    visit_arguments(arg, &mut |nested| {
                        if let Argument::Variable(var) = nested {
                            let entry = occurrences
                                .entry(var.name.clone())
                                .or_insert((0, var.loc.clone()));
                            entry.0 += 1;
                        }
                    });
                }
            }
            for (name, (count, loc)) in &occurrences {
                if !name.starts_with('_') && *count == 1 {
                    report.add_warning(format!("Variable {name} only occurs once"), loc.clone());
                }
            }
        }
    }

    // -- aggregates ---------------------------------------------------------

    /// Two aggregates in the same clause that each ground a variable the
    /// other needs cannot be ordered.
    fn check_aggregate_dependencies(&self, report: &mut ErrorReport) {
        for clause in &self.program.clauses {
            let hosts: Vec<&Literal> = clause
                .body
                .iter()
                .filter(|lit| {
                    let mut has_aggregate = false;
                    visit_arguments_in_literal(lit, &mut |arg| {
                        has_aggregate |= matches!(arg, Argument::Aggregator(_));
                    });
                    has_aggregate
                })
                .collect();

            for (i, first) in hosts.iter().enumerate() {
                for second in &hosts[i + 1..] {
                    if self.literals_mutually_dependent(first, second) {
                        visit_arguments_in_literal(first, &mut |arg| {
                            if let Argument::Aggregator(agg) = arg {
                                report.add_error(
                                    "Mutually dependent aggregate",
                                    agg.loc.clone(),
                                );
                            }
                        });
                    }
                }
            }
        }
    }

    fn literals_mutually_dependent(&self, first: &Literal, second: &Literal) -> bool {
        self.literal_depends_on(first, second) && self.literal_depends_on(second, first)
    }

    /// `first` depends on `second` when some variable is ungrounded in
    /// `first` alone but grounded by `second`.
    fn literal_depends_on(&self, first: &Literal, second: &Literal) -> bool {
        let single = |lit: &Literal| {
            Clause::new(
                Atom::new("*", Vec::new(), SrcLocation::unset()),
                vec![lit.clone()],
                SrcLocation::unset(),
            )
        };
        let first_clause = single(first);
        let second_clause = single(second);
        let first_grounded = grounded_variables(self.program, &first_clause);
        let second_grounded = grounded_variables(self.program, &second_clause);

        first_grounded.iter().any(|(name, grounded)| {
            !grounded && second_grounded.get(name).copied().unwrap_or(false)
        })
    }

    /// Witnesses may only escape `min`/`max` aggregates.
    fn check_witness_problem(&self, report: &mut ErrorReport) {
        for clause in &self.program.clauses {
            visit_aggregators_in_clause(clause, &mut |agg| {
                if agg.op.admits_witnesses() {
                    return;
                }
                let witnesses = witness_variables(self.program, clause, agg);
                if witnesses.is_empty() {
                    return;
                }
                // inner aggregates are masked: their witnesses are not
                // ours
                let mut inner_variables: FxHashSet<String> = FxHashSet::default();
                visit_aggregators_in_aggregator(agg, &mut |inner| {
                    if inner.id == agg.id {
                        return;
                    }
                    for lit in &inner.body {
                        visit_arguments_in_literal(lit, &mut |arg| {
                            if let Argument::Variable(var) = arg {
                                inner_variables.insert(var.name.clone());
                            }
                        });
                    }
                });

                for lit in &agg.body {
                    visit_arguments_in_literal(lit, &mut |arg| {
                        if let Argument::Variable(var) = arg {
                            if witnesses.contains(&var.name) && !inner_variables.contains(&var.name)
                            {
                                report.add_error(
                                    "Witness problem: argument grounded by an aggregator's \
                                     inner scope is used ungrounded in outer scope in a \
                                     count/sum/mean aggregate",
                                    var.loc.clone(),
                                );
                            }
                        }
                    });
                }
            });
        }
    }

    // -- inlining -----------------------------------------------------------

    fn check_inlining(&self, report: &mut ErrorReport) {
        let inlined: Vec<&Relation> = self
            .program
            .relations
            .iter()
            .filter(|rel| rel.is_inline())
            .collect();

        for relation in &inlined {
            let is_io = relation.has_qualifier(RelationQualifiers::INPUT)
                || relation.has_qualifier(RelationQualifiers::OUTPUT)
                || relation.has_qualifier(RelationQualifiers::PRINT_SIZE)
                || !self.program.directives_for(&relation.name).is_empty();
            if is_io {
                report.add_error(
                    format!("IO relation {} cannot be inlined", relation.name),
                    relation.loc.clone(),
                );
            }
        }

        // inlined relations must not depend on each other cyclically
        if let Some(cycle) = self.find_inline_cycle(&inlined) {
            let names: Vec<String> = cycle.iter().map(QualifiedName::to_string).collect();
            let loc = self
                .program
                .relation(&cycle[0])
                .map(|rel| rel.loc.clone())
                .unwrap_or_default();
            report.add_error(
                format!(
                    "Cannot inline cyclically dependent relations {{{}}}",
                    names.join(", ")
                ),
                loc,
            );
        }

        let inline_names: FxHashSet<&QualifiedName> =
            inlined.iter().map(|rel| &rel.name).collect();

        for clause in &self.program.clauses {
            // counters cannot survive inlining
            visit_atoms_in_clause(clause, &mut |atom| {
                if !inline_names.contains(&atom.name) {
                    return;
                }
                for arg in &atom.args {
                    visit_arguments(arg, &mut |nested| {
                        if let Argument::Counter(counter) = nested {
                            report.add_error(
                                "Cannot inline literal containing a counter argument '$'",
                                counter.loc.clone(),
                            );
                        }
                    });
                }
            });
            if inline_names.contains(&clause.head.name) {
                visit_arguments_in_clause(clause, &mut |arg| {
                    if let Argument::Counter(counter) = arg {
                        report.add_error(
                            "Cannot inline clause containing a counter argument '$'",
                            counter.loc.clone(),
                        );
                    }
                });
            }
        }

        // inlined relations whose clauses introduce body-only variables
        // cannot be negated
        let mut non_negatable: FxHashSet<&QualifiedName> = FxHashSet::default();
        for relation in &inlined {
            'clauses: for clause in self.program.clauses_for(&relation.name) {
                let mut head_variables: FxHashSet<String> = FxHashSet::default();
                for arg in &clause.head.args {
                    visit_arguments(arg, &mut |nested| {
                        if let Argument::Variable(var) = nested {
                            head_variables.insert(var.name.clone());
                        }
                    });
                }
                for lit in &clause.body {
                    let mut introduces = false;
                    visit_arguments_in_literal(lit, &mut |arg| {
                        if let Argument::Variable(var) = arg {
                            introduces |= !head_variables.contains(&var.name);
                        }
                    });
                    if introduces {
                        non_negatable.insert(&relation.name);
                        break 'clauses;
                    }
                }
            }
        }

        for clause in &self.program.clauses {
            for lit in &clause.body {
                if let Literal::Negation(neg) = lit {
                    self.check_negated_inline_atom(neg, &inline_names, &non_negatable, report);
                }
            }

            // atoms within aggregates cannot be inlined
            visit_aggregators_in_clause(clause, &mut |agg| {
                for lit in &agg.body {
                    let atom = match lit {
                        Literal::Atom(atom) => atom,
                        Literal::Negation(neg) => &neg.atom,
                        _ => continue,
                    };
                    if inline_names.contains(&atom.name) {
                        report.add_error(
                            "Cannot inline relations that appear in aggregator",
                            atom.loc.clone(),
                        );
                    }
                }
            });
        }
    }

    fn check_negated_inline_atom(
        &self,
        neg: &Negation,
        inline_names: &FxHashSet<&QualifiedName>,
        non_negatable: &FxHashSet<&QualifiedName>,
        report: &mut ErrorReport,
    ) {
        if !inline_names.contains(&neg.atom.name) {
            return;
        }
        if non_negatable.contains(&neg.atom.name) {
            report.add_error(
                "Cannot inline negated relation which may introduce new variables",
                neg.loc.clone(),
            );
        }
        // unnamed variables are named during inlining, losing their
        // groundedness exemption
        if let Some((_, loc)) = neg
            .atom
            .args
            .iter()
            .flat_map(unnamed_variables_outside_aggregates)
            .next()
        {
            report.add_error(
                "Cannot inline negated atom containing an unnamed variable unless the \
                 variable is within an aggregator",
                loc,
            );
        }
    }

    /// Depth-first search for a cycle in the precedence graph restricted
    /// to inlined relations.
    fn find_inline_cycle(&self, inlined: &[&Relation]) -> Option<Vec<QualifiedName>> {
        let inline_names: FxHashSet<&QualifiedName> =
            inlined.iter().map(|rel| &rel.name).collect();
        let mut visiting: Vec<QualifiedName> = Vec::new();
        let mut visited: FxHashSet<QualifiedName> = FxHashSet::default();

        fn dfs(
            checker: &SemanticChecker<'_>,
            inline_names: &FxHashSet<&QualifiedName>,
            current: &QualifiedName,
            visiting: &mut Vec<QualifiedName>,
            visited: &mut FxHashSet<QualifiedName>,
        ) -> Option<Vec<QualifiedName>> {
            if let Some(position) = visiting.iter().position(|name| name == current) {
                return Some(visiting[position..].to_vec());
            }
            if visited.contains(current) {
                return None;
            }
            visiting.push(current.clone());
            for successor in checker.precedence.dependents_of(current) {
                if inline_names.contains(successor) {
                    if let Some(cycle) =
                        dfs(checker, inline_names, successor, visiting, visited)
                    {
                        return Some(cycle);
                    }
                }
            }
            visiting.pop();
            visited.insert(current.clone());
            None
        }

        for relation in inlined {
            if let Some(cycle) = dfs(
                self,
                &inline_names,
                &relation.name,
                &mut visiting,
                &mut visited,
            ) {
                return Some(cycle);
            }
        }
        None
    }
}

// -- helpers ----------------------------------------------------------------

/// Whether the argument can be statically evaluated (and may therefore
/// appear in a fact).
fn is_constant_argument(arg: &Argument) -> bool {
    match arg {
        Argument::Variable(_)
        | Argument::UnnamedVariable(_)
        | Argument::UserDefinedFunctor(_)
        | Argument::Counter(_)
        | Argument::Aggregator(_) => false,
        Argument::TypeCast(cast) => is_constant_argument(&cast.value),
        Argument::IntrinsicFunctor(functor) => functor.args.iter().all(is_constant_argument),
        Argument::RecordInit(rec) => rec.args.iter().all(is_constant_argument),
        Argument::BranchInit(branch) => branch.args.iter().all(is_constant_argument),
        Argument::NumericConstant(_) | Argument::StringConstant(_) | Argument::NilConstant(_) => {
            true
        }
    }
}

/// Unnamed variables of the subtree, except those inside aggregates.
fn unnamed_variables_outside_aggregates(
    arg: &Argument,
) -> Vec<(strudel_ast::NodeId, SrcLocation)> {
    let mut in_aggregates: FxHashSet<strudel_ast::NodeId> = FxHashSet::default();
    visit_arguments(arg, &mut |nested| {
        if let Argument::Aggregator(agg) = nested {
            for lit in &agg.body {
                visit_arguments_in_literal(lit, &mut |inner| {
                    if let Argument::UnnamedVariable(unnamed) = inner {
                        in_aggregates.insert(unnamed.id);
                    }
                });
            }
        }
    });
    let mut result = Vec::new();
    visit_arguments(arg, &mut |nested| {
        if let Argument::UnnamedVariable(unnamed) = nested {
            if !in_aggregates.contains(&unnamed.id) {
                result.push((unnamed.id, unnamed.loc.clone()));
            }
        }
    });
    result
}

fn unnamed_variables_outside_aggregates_in_atom(atom: &Atom) -> Vec<SrcLocation> {
    atom.args
        .iter()
        .flat_map(unnamed_variables_outside_aggregates)
        .map(|(_, loc)| loc)
        .collect()
}

/// Per-name groundedness of a clause's variables.
fn grounded_variables(program: &Program, clause: &Clause) -> FxHashMap<String, bool> {
    let solution = grounded_terms(program, clause);
    let mut result = FxHashMap::default();
    visit_variables_in_clause(clause, &mut |var| {
        let grounded = solution.get(&var.id).copied().unwrap_or(false);
        result.insert(var.name.clone(), grounded);
    });
    result
}
