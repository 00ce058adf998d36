//! Per-clause type inference constraints.
//!
//! One analysis variable exists per distinct argument node; occurrences
//! of the same named variable unify. The lattice value is a `TypeSet`
//! with the universe as bottom; every constraint shrinks sets toward the
//! greatest common subtypes.
//!
//! Atoms are classified into *sources* and *sinks*: the head and negated
//! atoms are sinks and only contribute kind constraints, every other
//! atom constrains its arguments by the declared attribute types.

use rustc_hash::FxHashMap;

use strudel_ast::visit::visit_arguments_in_clause;
use strudel_ast::{Argument, Atom, Clause, Literal, NodeId, Program};
use strudel_common::numeric;
use strudel_types::{Kind, TypeEnvironment, TypeId, TypeNode, TypeSet};

use crate::constraint::{flow, Assignment, Constraint, Problem, PropertySpace, VarId, VarRegistry};
use crate::functor::IntrinsicInfo;
use crate::type_analysis::TypeAnalysis;

/// The type-deduction lattice: sets of types, met by pairwise greatest
/// common subtypes, with the universe as bottom.
pub struct TypeLattice<'e> {
    pub env: &'e TypeEnvironment,
}

impl PropertySpace for TypeLattice<'_> {
    type Value = TypeSet;

    fn bottom(&self) -> TypeSet {
        TypeSet::All
    }

    fn meet(&self, a: &mut TypeSet, b: &TypeSet) -> bool {
        let met = self.env.greatest_common_subtypes_of_sets(a, b);
        if met == *a {
            return false;
        }
        *a = met;
        true
    }
}

/// Climb subset bases until a constant or record root is reached.
fn base_type(env: &TypeEnvironment, mut ty: TypeId) -> TypeId {
    loop {
        match env.node(ty) {
            TypeNode::Primitive { base } | TypeNode::Subset { base } => ty = *base,
            _ => return ty,
        }
    }
}

/// All the types assigned to the variable are subtypes of a fixed type.
struct SubtypeOfType {
    var: VarId,
    ty: TypeId,
}

impl Constraint<TypeLattice<'_>> for SubtypeOfType {
    fn update(&mut self, space: &TypeLattice<'_>, assignment: &mut Assignment<TypeSet>) -> bool {
        let env = space.env;
        let current = assignment.get_mut(self.var);
        if current.is_all() {
            *current = TypeSet::singleton(self.ty);
            return true;
        }
        let mut tightened = TypeSet::empty();
        for t in current.iter() {
            tightened.insert_all(&env.greatest_common_subtypes(t, self.ty));
        }
        if tightened == *current {
            return false;
        }
        *current = tightened;
        true
    }

    fn describe(&self, registry: &VarRegistry) -> String {
        format!("{} <: #type{}", registry.label(self.var), self.ty.index())
    }
}

/// Every type assigned to the variable has a supertype in the fixed set.
struct HasSuperTypeInSet {
    var: VarId,
    values: TypeSet,
}

impl Constraint<TypeLattice<'_>> for HasSuperTypeInSet {
    fn update(&mut self, space: &TypeLattice<'_>, assignment: &mut Assignment<TypeSet>) -> bool {
        let env = space.env;
        let current = assignment.get_mut(self.var);
        if current.is_all() {
            *current = self.values.clone();
            return true;
        }
        let kept = current.filter(TypeSet::empty(), |t| {
            self.values.iter().any(|v| env.is_subtype(t, v))
        });
        if kept == *current {
            return false;
        }
        *current = kept;
        true
    }

    fn describe(&self, registry: &VarRegistry) -> String {
        format!("∃ t ∈ values: {} <: t", registry.label(self.var))
    }
}

/// Both sides must be subtypes of a common base type (the relaxed
/// agreement imposed by infix functors).
struct SubtypesOfSameBaseType {
    left: VarId,
    right: VarId,
}

impl SubtypesOfSameBaseType {
    fn base_types_of(env: &TypeEnvironment, set: &TypeSet) -> TypeSet {
        let mut bases = TypeSet::empty();
        if !set.is_all() {
            for t in set.iter() {
                match env.node(t) {
                    TypeNode::Constant { .. }
                    | TypeNode::Primitive { .. }
                    | TypeNode::Subset { .. } => bases.insert(base_type(env, t)),
                    _ => {}
                }
            }
        }
        bases
    }
}

impl Constraint<TypeLattice<'_>> for SubtypesOfSameBaseType {
    fn update(&mut self, space: &TypeLattice<'_>, assignment: &mut Assignment<TypeSet>) -> bool {
        let env = space.env;
        if self.left == self.right {
            return false;
        }

        let left_all = assignment.get(self.left).is_all();
        let right_all = assignment.get(self.right).is_all();
        if left_all && right_all {
            return false;
        }

        let bases_left = Self::base_types_of(env, assignment.get(self.left));
        let bases_right = Self::base_types_of(env, assignment.get(self.right));

        // If one side is still unconstrained, adopt the other side's
        // base types as its candidates.
        if left_all {
            assignment.set(self.left, bases_right);
            return true;
        }
        if right_all {
            assignment.set(self.right, bases_left);
            return true;
        }

        let common = TypeSet::intersection(&bases_left, &bases_right);
        let keep = |set: &TypeSet| {
            set.filter(TypeSet::empty(), |t| {
                common.iter().any(|b| env.is_subtype(t, b))
            })
        };

        let new_left = keep(assignment.get(self.left));
        let new_right = keep(assignment.get(self.right));

        let mut changed = false;
        if new_left != *assignment.get(self.left) {
            assignment.set(self.left, new_left);
            changed = true;
        }
        if new_right != *assignment.get(self.right) {
            assignment.set(self.right, new_right);
            changed = true;
        }
        changed
    }

    fn describe(&self, registry: &VarRegistry) -> String {
        format!(
            "∃ base t: ({} <: t) ∧ ({} <: t)",
            registry.label(self.left),
            registry.label(self.right)
        )
    }
}

/// Waits for the overload candidates of an intrinsic functor to reduce to
/// one, then pins parameter and result kinds.
///
/// The first pin sets the result to the overload's constant type, which
/// may *grow* the set: that single non-monotone step is recorded so every
/// later update is monotone again.
struct SatisfiesOverload {
    overloads: Vec<&'static IntrinsicInfo>,
    result: VarId,
    args: Vec<VarId>,
    subtype_result: bool,
    pinned: bool,
}

impl SatisfiesOverload {
    fn possible(env: &TypeEnvironment, set: &TypeSet, kind: Kind) -> bool {
        set.is_all() || set.iter().any(|t| env.kind_of(t) == kind)
    }

    fn subtypes_of(env: &TypeEnvironment, set: &TypeSet, kind: Kind) -> TypeSet {
        let constant = env.constant_type(kind);
        set.filter(TypeSet::All, |t| env.is_subtype(t, constant))
    }
}

impl Constraint<TypeLattice<'_>> for SatisfiesOverload {
    fn update(&mut self, space: &TypeLattice<'_>, assignment: &mut Assignment<TypeSet>) -> bool {
        let env = space.env;
        let args = &self.args;

        self.overloads.retain(|info| {
            if !info.variadic && args.len() != info.params.len() {
                return false;
            }
            for (i, &arg) in args.iter().enumerate() {
                if !Self::possible(env, assignment.get(arg), info.param_kind(i)) {
                    return false;
                }
            }
            Self::possible(env, assignment.get(self.result), info.result)
        });

        let mut changed = false;
        let new_result = if self.overloads.is_empty() {
            Some(TypeSet::empty())
        } else if self.overloads.len() > 1 {
            None
        } else {
            let overload = self.overloads[0];
            // A kind-polymorphic argument (ord) is not pinned: it may be
            // of a kind for which no constant type exists.
            if !overload.has_polymorphic_argument() {
                for (i, &arg) in args.iter().enumerate() {
                    let tightened =
                        Self::subtypes_of(env, assignment.get(arg), overload.param_kind(i));
                    if tightened != *assignment.get(arg) {
                        assignment.set(arg, tightened);
                        changed = true;
                    }
                }
            }

            if self.pinned || self.subtype_result {
                Some(Self::subtypes_of(
                    env,
                    assignment.get(self.result),
                    overload.result,
                ))
            } else {
                self.pinned = true;
                Some(TypeSet::singleton(env.constant_type(overload.result)))
            }
        };

        if let Some(new_result) = new_result {
            if new_result != *assignment.get(self.result) {
                assignment.set(self.result, new_result);
                changed = true;
            }
        }
        changed
    }

    fn describe(&self, registry: &VarRegistry) -> String {
        format!(
            "{} satisfies one of {} overload(s)",
            registry.label(self.result),
            self.overloads.len()
        )
    }
}

/// Element `index` of the record variable's record type shapes the
/// element variable, and vice versa.
struct SubtypeOfComponent {
    element: VarId,
    record: VarId,
    index: usize,
}

impl Constraint<TypeLattice<'_>> for SubtypeOfComponent {
    fn update(&mut self, space: &TypeLattice<'_>, assignment: &mut Assignment<TypeSet>) -> bool {
        let env = space.env;
        let record_types = assignment.get(self.record).clone();
        if record_types.is_all() {
            return false;
        }

        let mut new_record_types = TypeSet::empty();
        let mut new_element_types = TypeSet::empty();
        for ty in record_types.iter() {
            let TypeNode::Record { fields } = env.node(ty) else {
                continue;
            };
            if fields.len() <= self.index {
                continue;
            }
            new_record_types.insert(ty);
            new_element_types.insert(fields[self.index]);
        }

        let new_element_types =
            env.greatest_common_subtypes_of_sets(assignment.get(self.element), &new_element_types);

        let mut changed = false;
        if new_record_types != record_types {
            assignment.set(self.record, new_record_types);
            changed = true;
        }
        if new_element_types != *assignment.get(self.element) {
            assignment.set(self.element, new_element_types);
            changed = true;
        }
        changed
    }

    fn describe(&self, registry: &VarRegistry) -> String {
        format!(
            "{} <: {}::{}",
            registry.label(self.element),
            registry.label(self.record),
            self.index
        )
    }
}

/// Collects and solves the constraints of one clause.
pub(crate) struct ClauseTypeInference<'a> {
    env: &'a TypeEnvironment,
    program: &'a Program,
    analysis: &'a TypeAnalysis,
    registry: VarRegistry,
    problem: Problem<TypeLattice<'a>>,
}

impl<'a> ClauseTypeInference<'a> {
    pub(crate) fn new(
        env: &'a TypeEnvironment,
        program: &'a Program,
        analysis: &'a TypeAnalysis,
    ) -> Self {
        ClauseTypeInference {
            env,
            program,
            analysis,
            registry: VarRegistry::new(),
            problem: Problem::new(),
        }
    }

    pub(crate) fn analyse(mut self, clause: &Clause) -> FxHashMap<NodeId, TypeSet> {
        self.collect(clause);

        let ClauseTypeInference {
            env,
            mut registry,
            mut problem,
            ..
        } = self;

        let mut var_for_node: Vec<(NodeId, VarId)> = Vec::new();
        visit_arguments_in_clause(clause, &mut |arg| {
            let var = match arg {
                Argument::Variable(v) => registry.named(&v.name),
                other => registry.node(other.id()),
            };
            var_for_node.push((arg.id(), var));
        });

        let lattice = TypeLattice { env };
        let solution = problem.solve(&lattice, registry.len());

        var_for_node
            .into_iter()
            .map(|(node, var)| (node, solution.get(var).clone()))
            .collect()
    }

    fn var_of(&mut self, arg: &Argument) -> VarId {
        match arg {
            Argument::Variable(var) => self.registry.named(&var.name),
            other => self.registry.node(other.id()),
        }
    }

    fn subtype_of_type(&mut self, arg: &Argument, ty: TypeId) {
        let var = self.var_of(arg);
        self.problem.add(Box::new(SubtypeOfType { var, ty }));
    }

    fn collect(&mut self, clause: &Clause) {
        // literal-level structure: source/sink atoms and constraints
        self.visit_atom(&clause.head, true);
        for lit in &clause.body {
            self.visit_literal(lit);
        }
        // argument-level emitters for every node in the clause
        visit_arguments_in_clause(clause, &mut |arg| self.visit_argument(arg));
    }

    fn visit_literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Atom(atom) => self.visit_atom(atom, false),
            Literal::Negation(neg) => self.visit_atom(&neg.atom, true),
            Literal::BinaryConstraint(bc) => {
                let lhs = self.var_of(&bc.lhs);
                let rhs = self.var_of(&bc.rhs);
                self.problem.add(flow(lhs, rhs, "<:"));
                self.problem.add(flow(rhs, lhs, "<:"));
                self.visit_nested_literals(&bc.lhs);
                self.visit_nested_literals(&bc.rhs);
            }
            Literal::BooleanConstraint(_) | Literal::FunctionalConstraint(_) => {}
        }
    }

    /// Aggregate bodies contain literals of their own; classify their
    /// atoms and constraints just like top-level ones. Recursion stops at
    /// each aggregator, whose body literals re-enter `visit_literal`.
    fn visit_nested_literals(&mut self, arg: &Argument) {
        match arg {
            Argument::Aggregator(agg) => {
                if let Some(target) = agg.target() {
                    self.visit_nested_literals(target);
                }
                for lit in &agg.body {
                    self.visit_literal(lit);
                }
            }
            Argument::IntrinsicFunctor(functor) => {
                for child in &functor.args {
                    self.visit_nested_literals(child);
                }
            }
            Argument::UserDefinedFunctor(functor) => {
                for child in &functor.args {
                    self.visit_nested_literals(child);
                }
            }
            Argument::TypeCast(cast) => self.visit_nested_literals(&cast.value),
            Argument::RecordInit(rec) => {
                for child in &rec.args {
                    self.visit_nested_literals(child);
                }
            }
            Argument::BranchInit(branch) => {
                for child in &branch.args {
                    self.visit_nested_literals(child);
                }
            }
            _ => {}
        }
    }

    /// Atoms at sink positions only pin the constant-kind roots of their
    /// declared attribute types; sources constrain by the declared types
    /// themselves.
    fn visit_atom(&mut self, atom: &Atom, sink: bool) {
        let Some(rel) = self.program.relation(&atom.name) else {
            return;
        };
        if rel.arity() != atom.arity() {
            return;
        }
        for (arg, attribute) in atom.args.iter().zip(&rel.attributes) {
            let Some(ty) = self.env.get_type(&attribute.type_name) else {
                continue;
            };
            if sink {
                if matches!(self.env.node(ty), TypeNode::Record { .. }) {
                    let base = base_type(self.env, ty);
                    self.subtype_of_type(arg, base);
                    continue;
                }
                for constant in self.env.constant_types().clone().iter() {
                    if self.env.is_subtype(ty, constant) {
                        self.subtype_of_type(arg, constant);
                    }
                }
            } else {
                self.subtype_of_type(arg, ty);
            }
        }
        // body literals of aggregates among the arguments are handled by
        // visit_nested_literals at the constraint site; atoms only appear
        // in literals.
        for arg in &atom.args {
            self.visit_nested_literals(arg);
        }
    }

    fn visit_argument(&mut self, arg: &Argument) {
        match arg {
            Argument::StringConstant(_) => {
                self.subtype_of_type(arg, self.env.constant_type(Kind::Symbol));
            }
            Argument::NumericConstant(constant) => {
                let mut possible = TypeSet::empty();
                let mut admit = |kind: strudel_ast::NumericKind| {
                    let parses = match kind {
                        strudel_ast::NumericKind::Signed => {
                            numeric::parse_ram_signed(&constant.lexeme).is_some()
                        }
                        strudel_ast::NumericKind::Unsigned => {
                            numeric::parse_ram_unsigned(&constant.lexeme).is_some()
                        }
                        strudel_ast::NumericKind::Float => {
                            numeric::parse_ram_float(&constant.lexeme).is_some()
                        }
                    };
                    if parses {
                        let kind = match kind {
                            strudel_ast::NumericKind::Signed => Kind::Signed,
                            strudel_ast::NumericKind::Unsigned => Kind::Unsigned,
                            strudel_ast::NumericKind::Float => Kind::Float,
                        };
                        possible.insert(self.env.constant_type(kind));
                    }
                };
                if let Some(fixed) = constant.fixed {
                    admit(fixed);
                } else if let Some(inferred) = self.analysis.numeric_kind(constant.id) {
                    admit(inferred);
                } else {
                    admit(strudel_ast::NumericKind::Signed);
                    admit(strudel_ast::NumericKind::Unsigned);
                    admit(strudel_ast::NumericKind::Float);
                }
                let var = self.var_of(arg);
                self.problem.add(Box::new(HasSuperTypeInSet {
                    var,
                    values: possible,
                }));
            }
            Argument::Counter(_) => {
                self.subtype_of_type(arg, self.env.constant_type(Kind::Signed));
            }
            Argument::IntrinsicFunctor(functor) => self.visit_intrinsic(arg, functor),
            Argument::UserDefinedFunctor(functor) => self.visit_user_defined(arg, functor),
            Argument::TypeCast(cast) => {
                let Some(ty) = self.env.get_type(&cast.target_type) else {
                    return;
                };
                self.subtype_of_type(arg, ty);
                // A constant operand takes its type from the cast;
                // nothing else could type expressions like
                // to_string(as(2, float)).
                if matches!(
                    cast.value.as_ref(),
                    Argument::NumericConstant(_)
                        | Argument::StringConstant(_)
                        | Argument::NilConstant(_)
                ) {
                    self.subtype_of_type(&cast.value, ty);
                }
            }
            Argument::RecordInit(rec) => {
                let record_var = self.var_of(arg);
                for (index, element) in rec.args.iter().enumerate() {
                    let element_var = self.var_of(element);
                    self.problem.add(Box::new(SubtypeOfComponent {
                        element: element_var,
                        record: record_var,
                        index,
                    }));
                }
            }
            Argument::BranchInit(branch) => {
                let Some(adt) = self.analysis.branch_type(&branch.constructor) else {
                    return; // undeclared branch, reported by the checker
                };
                self.subtype_of_type(arg, adt);
                let Some(field_types) = self.env.branch_field_types(adt, &branch.constructor)
                else {
                    return;
                };
                if field_types.len() != branch.args.len() {
                    return; // arity mismatch, reported by the checker
                }
                let field_types: Vec<TypeId> = field_types.to_vec();
                for (element, ty) in branch.args.iter().zip(field_types) {
                    self.subtype_of_type(element, ty);
                }
            }
            Argument::Aggregator(agg) => {
                match agg.op {
                    strudel_ast::AggregateBaseOp::Count => {
                        self.subtype_of_type(arg, self.env.constant_type(Kind::Signed));
                    }
                    strudel_ast::AggregateBaseOp::Mean => {
                        self.subtype_of_type(arg, self.env.constant_type(Kind::Float));
                    }
                    _ => {
                        let var = self.var_of(arg);
                        self.problem.add(Box::new(HasSuperTypeInSet {
                            var,
                            values: self.env.constant_numeric_types().clone(),
                        }));
                    }
                }
                if let Some(target) = agg.target() {
                    let target_var = self.var_of(target);
                    let agg_var = self.var_of(arg);
                    self.problem.add(flow(target_var, agg_var, "<:"));
                    self.problem.add(flow(agg_var, target_var, "<:"));
                }
            }
            Argument::Variable(_) | Argument::UnnamedVariable(_) | Argument::NilConstant(_) => {}
        }
    }

    fn visit_intrinsic(&mut self, arg: &Argument, functor: &strudel_ast::IntrinsicFunctor) {
        let functor_var = self.var_of(arg);
        let arg_vars: Vec<VarId> = functor.args.iter().map(|a| self.var_of(a)).collect();

        let valid = self.analysis.has_valid_intrinsic(functor.id);
        if !valid {
            self.problem.add(Box::new(SatisfiesOverload {
                overloads: crate::functor::builtin_overloads(functor.op),
                result: functor_var,
                args: arg_vars.clone(),
                subtype_result: functor.op.is_infix(),
                pinned: false,
            }));
        }

        // Infix operators only require arguments to share a base type
        // with the result.
        if functor.op.is_infix() {
            for &var in &arg_vars {
                self.problem.add(Box::new(SubtypesOfSameBaseType {
                    left: var,
                    right: functor_var,
                }));
            }
            return;
        }

        if !valid {
            return;
        }
        let Some(info) = self.analysis.intrinsic_info(functor.id) else {
            return;
        };
        self.subtype_of_type(arg, self.env.constant_type(info.result));
        if info.has_polymorphic_argument() {
            return;
        }
        if !info.variadic && info.params.len() != functor.args.len() {
            return;
        }
        for (i, child) in functor.args.iter().enumerate() {
            self.subtype_of_type(child, self.env.constant_type(info.param_kind(i)));
        }
    }

    fn visit_user_defined(&mut self, arg: &Argument, functor: &strudel_ast::UserDefinedFunctor) {
        // The declaration may be missing or unresolved at this point;
        // the checker reports that, inference just skips.
        if !self.analysis.udf_is_valid(&functor.name) {
            return;
        }
        let Some(decl) = self.program.functor(&functor.name) else {
            return;
        };
        if decl.arity() != functor.args.len() {
            return;
        }
        if let Some(ret) = self.env.get_type(&decl.return_type.type_name) {
            self.subtype_of_type(arg, ret);
        }
        for (child, param) in functor.args.iter().zip(&decl.params) {
            if let Some(ty) = self.env.get_type(&param.type_name) {
                self.subtype_of_type(child, ty);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::VarRegistry;
    use strudel_ast::IntrinsicOp;

    #[test]
    fn lattice_meet_shrinks_toward_common_subtypes() {
        let mut env = TypeEnvironment::new();
        let number = env.get_type(&"number".into()).unwrap();
        let a = env.create_subset("A", number);
        let lattice = TypeLattice { env: &env };

        let mut value = TypeSet::All;
        assert!(lattice.meet(&mut value, &TypeSet::singleton(number)));
        assert_eq!(value, TypeSet::singleton(number));

        assert!(lattice.meet(&mut value, &TypeSet::singleton(a)));
        assert_eq!(value, TypeSet::singleton(a));

        // meeting with the same set again changes nothing
        assert!(!lattice.meet(&mut value, &TypeSet::singleton(a)));
    }

    #[test]
    fn subtype_constraint_updates_are_monotone() {
        let mut env = TypeEnvironment::new();
        let number = env.get_type(&"number".into()).unwrap();
        let a = env.create_subset("A", number);
        let lattice = TypeLattice { env: &env };

        let mut registry = VarRegistry::new();
        let var = registry.named("x");
        let mut constraint = SubtypeOfType { var, ty: a };

        let mut assignment = Assignment::new(registry.len(), TypeSet::All);
        assert!(constraint.update(&lattice, &mut assignment));
        let after_first = assignment.get(var).clone();
        assert!(after_first.is_subset_of(&TypeSet::All));

        // a second update cannot grow the set
        let changed = constraint.update(&lattice, &mut assignment);
        assert!(!changed);
        assert!(assignment.get(var).is_subset_of(&after_first));
    }

    #[test]
    fn overload_pin_raises_the_result_exactly_once() {
        let mut env = TypeEnvironment::new();
        let number = env.get_type(&"number".into()).unwrap();
        let a = env.create_subset("A", number);
        let lattice = TypeLattice { env: &env };

        let mut registry = VarRegistry::new();
        let result = registry.node(strudel_ast::NodeId::fresh());
        let x = registry.named("x");

        let mut constraint = SatisfiesOverload {
            overloads: crate::functor::builtin_overloads(IntrinsicOp::Add),
            result,
            args: vec![x, x],
            subtype_result: false,
            pinned: false,
        };

        let mut assignment = Assignment::new(registry.len(), TypeSet::All);
        // narrow the argument to a signed subset: one overload remains
        assignment.set(x, TypeSet::singleton(a));
        assert!(constraint.update(&lattice, &mut assignment));
        assert!(constraint.pinned);

        // the pin set the result to the overload's constant type
        let signed_constant = env.constant_type(Kind::Signed);
        assert_eq!(*assignment.get(result), TypeSet::singleton(signed_constant));

        // every later update is monotone
        let before = assignment.get(result).clone();
        constraint.update(&lattice, &mut assignment);
        assert!(assignment.get(result).is_subset_of(&before));
    }
}
