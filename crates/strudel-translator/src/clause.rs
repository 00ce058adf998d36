//! Clause lowering.
//!
//! A clause becomes a `Query` statement whose operation nest is built
//! bottom-up: the innermost operation inserts the head tuple, wrapped in
//! turn by variable-aliasing filters, body-constraint filters, generator
//! levels (aggregates and multi-result functors), and finally one scan
//! or unpack level per body atom, record or ADT branch in scheduled
//! order. Recursive clauses are lowered once per version, reading
//! `@delta_` for the versioned atom and writing `@new_`.

use rustc_hash::FxHashSet;
use tracing::trace;

use strudel_ast::{
    Argument, Atom, BranchInit, Clause, ConstraintOp, IntrinsicOp, QualifiedName, RecordInit,
};
use strudel_ram::{Condition, Expression, NestedIntrinsicOp, Operation, Statement};
use strudel_solver::functor::is_multi_result;
use strudel_solver::ResolvedConstraintOp;
use strudel_types::Kind;

use crate::context::TranslatorContext;
use crate::names::{concrete_name, delta_name, new_name};
use crate::value_index::{Location, ValueIndex};

/// One nesting level introduced by the clause body.
enum LevelNode<'c> {
    Atom(&'c Atom),
    Record(&'c RecordInit),
    Branch(&'c BranchInit),
}

pub struct ClauseTranslator<'a, 'c> {
    context: &'a TranslatorContext<'a>,
    value_index: ValueIndex,
    operators: Vec<LevelNode<'c>>,
    generators: Vec<&'c Argument>,
    scc_atoms: Vec<&'c Atom>,
    version: usize,
}

impl<'a, 'c> ClauseTranslator<'a, 'c> {
    #[must_use]
    pub fn new(context: &'a TranslatorContext<'a>) -> Self {
        ClauseTranslator {
            context,
            value_index: ValueIndex::new(),
            operators: Vec::new(),
            generators: Vec::new(),
            scc_atoms: Vec::new(),
            version: 0,
        }
    }

    fn is_recursive(&self) -> bool {
        !self.scc_atoms.is_empty()
    }

    /// The RAM relation an atom refers to under the current version: the
    /// head of a recursive clause writes `@new_`, the versioned body
    /// atom reads `@delta_`, everything else reads the concrete
    /// relation.
    fn clause_atom_name(&self, clause: &Clause, atom: &Atom) -> String {
        if !self.is_recursive() {
            return concrete_name(&atom.name);
        }
        if atom.id == clause.head.id {
            return new_name(&atom.name);
        }
        if self
            .scc_atoms
            .get(self.version)
            .is_some_and(|scc_atom| scc_atom.id == atom.id)
        {
            return delta_name(&atom.name);
        }
        concrete_name(&atom.name)
    }

    /// Lower a non-recursive clause (or one version of a recursive one).
    #[must_use]
    pub fn translate_clause(&mut self, clause: &'c Clause) -> Statement {
        if clause.is_fact() {
            return Statement::Query(self.create_insertion(clause));
        }
        self.index_clause(clause);

        let mut op = self.create_insertion(clause);
        op = self.add_variable_binding_constraints(op);
        op = self.add_body_literal_constraints(clause, op);
        op = self.add_generator_levels(clause, op);
        op = self.add_variable_introductions(clause, op);
        op = self.add_entry_point(clause, op);
        Statement::Query(op)
    }

    /// Lower one version of a recursive clause, with debug-info and
    /// profiling wrappers.
    #[must_use]
    pub fn translate_recursive_clause(
        context: &'a TranslatorContext<'a>,
        clause: &'c Clause,
        scc: &FxHashSet<QualifiedName>,
        version: usize,
    ) -> Statement {
        let mut translator = ClauseTranslator::new(context);
        translator.scc_atoms = clause
            .body_atoms()
            .into_iter()
            .filter(|atom| scc.contains(&atom.name))
            .collect();
        translator.version = version;
        trace!(clause = %clause, version, "translating recursive clause");

        let mut rule = translator.translate_clause(clause);
        if context.options.profiling() {
            rule = Statement::LogRelationTimer {
                message: format!(
                    "@t-recursive-rule;{};{version};{};{clause}",
                    clause.head.name, clause.loc
                ),
                relation: new_name(&clause.head.name),
                inner: Box::new(rule),
            };
        }
        Statement::DebugInfo {
            message: format!("{clause}\nin file {}", clause.loc),
            inner: Box::new(rule),
        }
    }

    // -- indexing -----------------------------------------------------------

    /// The body atoms in scheduled order: source order unless the clause
    /// carries an execution plan for the current version.
    fn atom_ordering(&self, clause: &'c Clause) -> Vec<&'c Atom> {
        let atoms = clause.body_atoms();
        let Some(order) = clause
            .plan
            .as_ref()
            .and_then(|plan| plan.order_for(self.version))
        else {
            return atoms;
        };
        debug_assert_eq!(order.len(), atoms.len(), "invalid execution plan");
        // plans are 1-based
        order.iter().map(|&position| atoms[position - 1]).collect()
    }

    fn add_operator_level(&mut self, node: LevelNode<'c>) -> usize {
        let level = self.operators.len() + self.generators.len();
        self.operators.push(node);
        level
    }

    fn add_generator_level(&mut self, arg: &'c Argument) -> usize {
        let level = self.operators.len() + self.generators.len();
        self.generators.push(arg);
        level
    }

    fn index_clause(&mut self, clause: &'c Clause) {
        self.index_atoms(clause);
        self.index_generators(clause);
    }

    fn index_atoms(&mut self, clause: &'c Clause) {
        for atom in self.atom_ordering(clause) {
            let level = self.add_operator_level(LevelNode::Atom(atom));
            self.index_node_arguments(level, &atom.args);
        }
    }

    fn index_node_arguments(&mut self, level: usize, args: &'c [Argument]) {
        for (column, arg) in args.iter().enumerate() {
            match arg {
                Argument::Variable(var) => {
                    self.value_index
                        .add_variable_reference(&var.name, Location::new(level, column));
                }
                Argument::RecordInit(rec) => {
                    self.value_index
                        .set_record_definition(rec.id, Location::new(level, column));
                    let unpack_level = self.add_operator_level(LevelNode::Record(rec));
                    self.index_node_arguments(unpack_level, &rec.args);
                }
                Argument::BranchInit(branch) => {
                    if self.context.is_adt_enum(branch) {
                        continue;
                    }
                    self.value_index
                        .set_adt_definition(branch.id, Location::new(level, column));
                    let unpack_level = self.add_operator_level(LevelNode::Branch(branch));
                    if self.context.is_adt_branch_simple(branch) {
                        // one level: [tag, value]; arguments start at
                        // column 1
                        for (i, child) in branch.args.iter().enumerate() {
                            if let Argument::Variable(var) = child {
                                self.value_index.add_variable_reference(
                                    &var.name,
                                    Location::new(unpack_level, i + 1),
                                );
                            }
                        }
                    } else {
                        // two levels: [tag, [fields...]]
                        let argument_level = self.add_operator_level(LevelNode::Branch(branch));
                        self.index_node_arguments(argument_level, &branch.args);
                    }
                }
                _ => {}
            }
        }
    }

    fn index_generators(&mut self, clause: &'c Clause) {
        // every aggregate is an internal generator level
        let mut aggregates: Vec<&'c Argument> = Vec::new();
        let mut multi_result: Vec<&'c Argument> = Vec::new();
        for lit in &clause.body {
            collect_generators(lit, &mut aggregates, &mut multi_result);
        }
        for &arg in aggregates.iter().chain(multi_result.iter()) {
            let level = self.add_generator_level(arg);
            self.value_index
                .set_generator_location(arg.id(), Location::new(level, 0));
        }

        // variable references inside aggregate body atoms live at the
        // aggregate's own level
        for &arg in &aggregates {
            let Argument::Aggregator(agg) = arg else {
                continue;
            };
            let Some(loc) = self.value_index.generator_location(agg.id) else {
                continue;
            };
            let body_atoms: Vec<&Atom> = agg
                .body
                .iter()
                .filter_map(strudel_ast::Literal::as_atom)
                .collect();
            debug_assert!(
                body_atoms.len() <= 1,
                "aggregate bodies are materialized to a single atom"
            );
            if let Some(atom) = body_atoms.first() {
                for (column, child) in atom.args.iter().enumerate() {
                    if let Argument::Variable(var) = child {
                        self.value_index
                            .add_variable_reference(&var.name, Location::new(loc.level, column));
                    }
                }
            }
        }

        // a variable equated with a generator is introduced at the
        // generator's result location
        for lit in &clause.body {
            let strudel_ast::Literal::BinaryConstraint(bc) = lit else {
                continue;
            };
            if bc.op != ConstraintOp::Eq {
                continue;
            }
            if let (Argument::Variable(var), rhs) = (&*bc.lhs, &*bc.rhs) {
                if let Some(loc) = self.value_index.generator_location(rhs.id()) {
                    self.value_index.add_variable_reference(&var.name, loc);
                }
            }
            if let (lhs, Argument::Variable(var)) = (&*bc.lhs, &*bc.rhs) {
                if let Some(loc) = self.value_index.generator_location(lhs.id()) {
                    self.value_index.add_variable_reference(&var.name, loc);
                }
            }
        }
    }

    // -- nest construction --------------------------------------------------

    fn create_insertion(&self, clause: &Clause) -> Operation {
        let head = &clause.head;
        let head_name = self.clause_atom_name(clause, head);
        let values: Vec<Expression> = head
            .args
            .iter()
            .map(|arg| self.context.translate_value(&self.value_index, arg))
            .collect();

        // propositions fire once
        if head.arity() == 0 {
            return Operation::Filter {
                condition: Condition::EmptinessCheck(head_name.clone()),
                inner: Box::new(Operation::Insert {
                    relation: head_name,
                    values,
                }),
            };
        }

        // functional dependencies guard the insert
        if let Some(condition) = self.functional_dependency_guard(clause) {
            return Operation::GuardedInsert {
                relation: head_name,
                values,
                condition,
            };
        }

        Operation::Insert {
            relation: head_name,
            values,
        }
    }

    /// For relations with a choice-domain: the insert fires only when no
    /// tuple with the same key columns exists yet.
    fn functional_dependency_guard(&self, clause: &Clause) -> Option<Condition> {
        let head = &clause.head;
        let relation = self.context.relation(&head.name)?;
        if relation.functional_dependencies.is_empty() {
            return None;
        }

        let head_name = self.clause_atom_name(clause, head);
        let mut guards: Vec<Condition> = Vec::new();
        let mut seen: Vec<&strudel_ast::FunctionalConstraint> = Vec::new();
        for fd in &relation.functional_dependencies {
            if seen.iter().any(|other| other.is_equivalent(fd)) {
                continue;
            }
            seen.push(fd);
            let keys: FxHashSet<&str> = fd.keys.iter().map(String::as_str).collect();

            let values: Vec<Expression> = relation
                .attributes
                .iter()
                .zip(&head.args)
                .map(|(attribute, arg)| {
                    if keys.contains(attribute.name.as_str()) {
                        self.context.translate_value(&self.value_index, arg)
                    } else {
                        Expression::Undef
                    }
                })
                .collect();

            guards.push(
                Condition::ExistenceCheck {
                    relation: head_name.clone(),
                    values: values.clone(),
                }
                .negate(),
            );
            if self.is_recursive() {
                // guard the concrete relation as well
                guards.push(
                    Condition::ExistenceCheck {
                        relation: concrete_name(&relation.name),
                        values,
                    }
                    .negate(),
                );
            }
        }
        Some(Condition::conjunction(guards))
    }

    /// Equate every further occurrence of a variable with its first one.
    fn add_variable_binding_constraints(&self, mut op: Operation) -> Operation {
        for references in self.value_index.variable_references().values() {
            let Some(&first) = references.iter().next() else {
                continue;
            };
            for &reference in references.iter().skip(1) {
                if self.value_index.is_generator_level(reference.level) {
                    continue;
                }
                op = Operation::Filter {
                    condition: Condition::Constraint {
                        op: ResolvedConstraintOp::new(ConstraintOp::Eq, Kind::Signed),
                        lhs: Expression::tuple(first.level, first.column),
                        rhs: Expression::tuple(reference.level, reference.column),
                    },
                    inner: Box::new(op),
                };
            }
        }
        op
    }

    fn add_body_literal_constraints(&self, clause: &Clause, mut op: Operation) -> Operation {
        for lit in &clause.body {
            if let Some(condition) = self.context.translate_constraint(&self.value_index, lit) {
                op = Operation::Filter {
                    condition,
                    inner: Box::new(op),
                };
            }
        }

        if self.is_recursive() {
            if clause.head.arity() > 0 {
                // a rediscovered tuple is not new
                let condition = Condition::ExistenceCheck {
                    relation: concrete_name(&clause.head.name),
                    values: clause
                        .head
                        .args
                        .iter()
                        .map(|arg| self.context.translate_value(&self.value_index, arg))
                        .collect(),
                }
                .negate();
                op = Operation::Filter {
                    condition,
                    inner: Box::new(op),
                };
            }

            // tuples joining a later delta are produced by that version
            for scc_atom in &self.scc_atoms[self.version + 1..] {
                op = self.add_negated_delta_atom(op, scc_atom);
            }
        }
        op
    }

    fn add_negated_delta_atom(&self, op: Operation, atom: &Atom) -> Operation {
        let name = delta_name(&atom.name);
        let condition = if atom.arity() == 0 {
            Condition::EmptinessCheck(name)
        } else {
            Condition::ExistenceCheck {
                relation: name,
                values: atom
                    .args
                    .iter()
                    .map(|arg| self.context.translate_value(&self.value_index, arg))
                    .collect(),
            }
            .negate()
        };
        Operation::Filter {
            condition,
            inner: Box::new(op),
        }
    }

    fn add_generator_levels(&self, clause: &Clause, mut op: Operation) -> Operation {
        let mut level = self.operators.len() + self.generators.len();
        for generator in self.generators.iter().rev() {
            level -= 1;
            match generator {
                Argument::Aggregator(agg) => {
                    op = self.instantiate_aggregate(op, clause, agg, level);
                }
                Argument::IntrinsicFunctor(functor) => {
                    // the surface keyword decides the operation; inference
                    // only validated the argument kinds against it
                    let nested_op = match functor.op {
                        IntrinsicOp::Range => NestedIntrinsicOp::Range,
                        IntrinsicOp::URange => NestedIntrinsicOp::URange,
                        IntrinsicOp::FRange => NestedIntrinsicOp::FRange,
                        _ => unreachable!("unhandled generator"),
                    };
                    op = Operation::NestedIntrinsic {
                        op: nested_op,
                        args: functor
                            .args
                            .iter()
                            .map(|arg| self.context.translate_value(&self.value_index, arg))
                            .collect(),
                        level,
                        inner: Box::new(op),
                    };
                }
                _ => unreachable!("unhandled generator"),
            }
        }
        op
    }

    fn instantiate_aggregate(
        &self,
        op: Operation,
        clause: &Clause,
        agg: &strudel_ast::Aggregator,
        level: usize,
    ) -> Operation {
        // constraints of the aggregate body
        let mut condition: Option<Condition> = None;
        for lit in &agg.body {
            if let Some(term) = self.context.translate_constraint(&self.value_index, lit) {
                condition = Condition::add_conjunct(condition, term);
            }
        }

        // the single body atom: bound columns become the index pattern
        let body_atoms: Vec<&Atom> = agg
            .body
            .iter()
            .filter_map(strudel_ast::Literal::as_atom)
            .collect();
        debug_assert!(body_atoms.len() <= 1, "aggregate bodies are materialized");
        let Some(&atom) = body_atoms.first() else {
            return op;
        };

        let mut pattern = vec![Expression::Undef; atom.arity()];
        for (column, arg) in atom.args.iter().enumerate() {
            match arg {
                Argument::Variable(var) => {
                    // bind to the first occurrence outside this position
                    if let Some(references) = self.value_index.references_of(&var.name) {
                        for &loc in references {
                            if loc.level != level || loc.column != column {
                                pattern[column] = Expression::tuple(loc.level, loc.column);
                                break;
                            }
                        }
                    }
                }
                Argument::UnnamedVariable(_) => {}
                other => {
                    let value = self.context.translate_value(&self.value_index, other);
                    if !value.is_undef() {
                        pattern[column] = value;
                    }
                }
            }
        }

        let expression = agg.target().map_or(Expression::Undef, |target| {
            self.context.translate_value(&self.value_index, target)
        });
        let relation = self.clause_atom_name(clause, atom);
        let condition = condition.unwrap_or(Condition::True);
        let op_kind = self.context.aggregate_operator(agg);

        if pattern.iter().all(Expression::is_undef) {
            Operation::Aggregate {
                op: op_kind,
                relation,
                level,
                expression,
                condition,
                inner: Box::new(op),
            }
        } else {
            Operation::IndexAggregate {
                op: op_kind,
                relation,
                level,
                pattern,
                expression,
                condition,
                inner: Box::new(op),
            }
        }
    }

    fn add_variable_introductions(&self, clause: &'c Clause, mut op: Operation) -> Operation {
        let mut index = self.operators.len();
        while index > 0 {
            index -= 1;
            match &self.operators[index] {
                LevelNode::Atom(atom) => {
                    op = self.add_atom_scan(op, atom, clause, index);
                }
                LevelNode::Record(rec) => {
                    op = self.add_record_unpack(op, rec, index);
                }
                LevelNode::Branch(branch) => {
                    op = self.add_adt_unpack(op, branch, index);
                    if !self.context.is_adt_branch_simple(branch) {
                        // two levels were introduced for this branch
                        index -= 1;
                    }
                }
            }
        }
        op
    }

    fn add_atom_scan(
        &self,
        mut op: Operation,
        atom: &Atom,
        clause: &Clause,
        level: usize,
    ) -> Operation {
        let name = self.clause_atom_name(clause, atom);

        op = self.add_constant_constraints(level, &atom.args, op);
        op = Operation::Filter {
            condition: Condition::EmptinessCheck(name.clone()).negate(),
            inner: Box::new(op),
        };

        let all_unnamed = atom
            .args
            .iter()
            .all(|arg| matches!(arg, Argument::UnnamedVariable(_)));
        if atom.arity() != 0 && !all_unnamed {
            if clause.head.arity() == 0 {
                // a nullary head needs deriving only once
                op = Operation::Break {
                    condition: Condition::EmptinessCheck(
                        self.clause_atom_name(clause, &clause.head),
                    )
                    .negate(),
                    inner: Box::new(op),
                };
            }
            op = Operation::Scan {
                relation: name,
                level,
                inner: Box::new(op),
            };
        }
        op
    }

    fn add_record_unpack(&self, mut op: Operation, rec: &RecordInit, level: usize) -> Operation {
        op = self.add_constant_constraints(level, &rec.args, op);
        let source = self
            .value_index
            .record_definition(rec.id)
            .map_or(Expression::Undef, |loc| {
                Expression::tuple(loc.level, loc.column)
            });
        Operation::UnpackRecord {
            expression: source,
            arity: rec.args.len(),
            level,
            inner: Box::new(op),
        }
    }

    fn add_adt_unpack(&self, mut op: Operation, branch: &BranchInit, level: usize) -> Operation {
        debug_assert!(!self.context.is_adt_enum(branch), "enum branches are constants");
        let simple = self.context.is_adt_branch_simple(branch);
        let branch_level = if simple { level } else { level - 1 };

        if simple {
            // columns: [tag, value]
            for (i, arg) in branch.args.iter().enumerate() {
                op = self.add_constant_constraint_at(branch_level, i + 1, arg, op);
            }
        } else {
            for (i, arg) in branch.args.iter().enumerate() {
                op = self.add_constant_constraint_at(level, i, arg, op);
            }
            op = Operation::UnpackRecord {
                expression: Expression::tuple(branch_level, 1),
                arity: branch.args.len(),
                level,
                inner: Box::new(op),
            };
        }

        // the tag column selects the constructor
        op = Operation::Filter {
            condition: Condition::Constraint {
                op: ResolvedConstraintOp::new(ConstraintOp::Eq, Kind::Signed),
                lhs: Expression::tuple(branch_level, 0),
                rhs: Expression::SignedConstant(self.context.adt_branch_id(branch)),
            },
            inner: Box::new(op),
        };

        let source = self
            .value_index
            .adt_definition(branch.id)
            .map_or(Expression::Undef, |loc| {
                Expression::tuple(loc.level, loc.column)
            });
        Operation::UnpackRecord {
            expression: source,
            arity: 2,
            level: branch_level,
            inner: Box::new(op),
        }
    }

    fn add_constant_constraints(
        &self,
        level: usize,
        args: &[Argument],
        mut op: Operation,
    ) -> Operation {
        for (column, arg) in args.iter().enumerate() {
            op = self.add_constant_constraint_at(level, column, arg, op);
        }
        op
    }

    fn add_constant_constraint_at(
        &self,
        level: usize,
        column: usize,
        arg: &Argument,
        op: Operation,
    ) -> Operation {
        let rhs = match arg {
            Argument::NumericConstant(_)
            | Argument::StringConstant(_)
            | Argument::NilConstant(_) => Some(self.context.translate_constant(arg)),
            Argument::TypeCast(cast) if cast.value.is_constant() => {
                Some(self.context.translate_value(&self.value_index, arg))
            }
            Argument::BranchInit(branch) if self.context.is_adt_enum(branch) => {
                Some(Expression::SignedConstant(self.context.adt_branch_id(branch)))
            }
            _ => None,
        };
        let Some(rhs) = rhs else {
            return op;
        };
        Operation::Filter {
            condition: Condition::Constraint {
                op: ResolvedConstraintOp::new(ConstraintOp::Eq, Kind::Signed),
                lhs: Expression::tuple(level, column),
                rhs,
            },
            inner: Box::new(op),
        }
    }

    fn add_entry_point(&self, clause: &Clause, op: Operation) -> Operation {
        // recursive propositions stop once derived
        if self.is_recursive() && clause.head.arity() == 0 {
            return Operation::Filter {
                condition: Condition::EmptinessCheck(concrete_name(&clause.head.name)),
                inner: Box::new(op),
            };
        }
        op
    }
}

/// Collect the generators of one body literal: aggregates first, then
/// multi-result functors, without descending into aggregate bodies.
fn collect_generators<'c>(
    lit: &'c strudel_ast::Literal,
    aggregates: &mut Vec<&'c Argument>,
    multi_result: &mut Vec<&'c Argument>,
) {
    fn walk<'c>(
        arg: &'c Argument,
        aggregates: &mut Vec<&'c Argument>,
        multi_result: &mut Vec<&'c Argument>,
    ) {
        match arg {
            Argument::Aggregator(_) => aggregates.push(arg),
            Argument::IntrinsicFunctor(functor) => {
                if is_multi_result(functor.op) {
                    multi_result.push(arg);
                } else {
                    for child in &functor.args {
                        walk(child, aggregates, multi_result);
                    }
                }
            }
            Argument::UserDefinedFunctor(functor) => {
                for child in &functor.args {
                    walk(child, aggregates, multi_result);
                }
            }
            Argument::TypeCast(cast) => walk(&cast.value, aggregates, multi_result),
            Argument::RecordInit(rec) => {
                for child in &rec.args {
                    walk(child, aggregates, multi_result);
                }
            }
            Argument::BranchInit(branch) => {
                for child in &branch.args {
                    walk(child, aggregates, multi_result);
                }
            }
            _ => {}
        }
    }

    match lit {
        strudel_ast::Literal::Atom(atom) => {
            for arg in &atom.args {
                walk(arg, aggregates, multi_result);
            }
        }
        strudel_ast::Literal::Negation(neg) => {
            for arg in &neg.atom.args {
                walk(arg, aggregates, multi_result);
            }
        }
        strudel_ast::Literal::BinaryConstraint(bc) => {
            walk(&bc.lhs, aggregates, multi_result);
            walk(&bc.rhs, aggregates, multi_result);
        }
        _ => {}
    }
}
