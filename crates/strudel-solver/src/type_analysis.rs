//! The program-wide type analysis.
//!
//! Runs per-clause type inference together with the polymorphism
//! analyses - intrinsic-functor overload election, numeric-constant kind
//! inference, aggregate-operator specialization and binary-constraint
//! operator specialization - in a joint fixpoint: each analysis reads the
//! previous iteration of the others and the loop repeats until none of
//! them changes.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use strudel_ast::visit::{visit_arguments_in_clause, visit_variables_in_clause};
use strudel_ast::{Argument, Clause, Literal, NodeId, NumericKind, Program};
use strudel_types::{Kind, TypeEnvironment, TypeId, TypeNode, TypeSet};

use crate::functor::{
    builtin_overloads, IntrinsicInfo, ResolvedAggregateOp, ResolvedConstraintOp,
};
use crate::type_inference::ClauseTypeInference;

/// The result of the inference fixpoint, plus the resolved-operator
/// queries consumed by the checker and the translator.
pub struct TypeAnalysis {
    argument_types: FxHashMap<NodeId, TypeSet>,
    functor_info: FxHashMap<NodeId, &'static IntrinsicInfo>,
    numeric_kinds: FxHashMap<NodeId, NumericKind>,
    aggregator_ops: FxHashMap<NodeId, ResolvedAggregateOp>,
    constraint_ops: FxHashMap<NodeId, ResolvedConstraintOp>,
    branch_to_adt: FxHashMap<String, TypeId>,
    udf_valid: FxHashSet<String>,
    udf_return_kinds: FxHashMap<String, Kind>,
    udf_param_kinds: FxHashMap<String, Vec<Kind>>,
    udf_stateful: FxHashMap<String, bool>,
}

impl TypeAnalysis {
    /// An analysis with no inferred information yet; per-clause inference
    /// run against it uses declaration-derived constraints only. Used by
    /// transforms that need types for freshly synthesized clauses.
    #[must_use]
    pub fn empty(env: &TypeEnvironment) -> Self {
        TypeAnalysis {
            argument_types: FxHashMap::default(),
            functor_info: FxHashMap::default(),
            numeric_kinds: FxHashMap::default(),
            aggregator_ops: FxHashMap::default(),
            constraint_ops: FxHashMap::default(),
            branch_to_adt: branch_to_adt_map(env),
            udf_valid: FxHashSet::default(),
            udf_return_kinds: FxHashMap::default(),
            udf_param_kinds: FxHashMap::default(),
            udf_stateful: FxHashMap::default(),
        }
    }

    /// Infer the types of a single clause against this analysis state.
    #[must_use]
    pub fn analyse_clause(
        &self,
        env: &TypeEnvironment,
        program: &Program,
        clause: &Clause,
    ) -> FxHashMap<NodeId, TypeSet> {
        ClauseTypeInference::new(env, program, self).analyse(clause)
    }

    /// Run the analysis over the whole program.
    #[must_use]
    pub fn run(program: &Program, env: &TypeEnvironment) -> Self {
        let mut analysis = TypeAnalysis {
            argument_types: FxHashMap::default(),
            functor_info: FxHashMap::default(),
            numeric_kinds: FxHashMap::default(),
            aggregator_ops: FxHashMap::default(),
            constraint_ops: FxHashMap::default(),
            branch_to_adt: branch_to_adt_map(env),
            udf_valid: FxHashSet::default(),
            udf_return_kinds: FxHashMap::default(),
            udf_param_kinds: FxHashMap::default(),
            udf_stateful: FxHashMap::default(),
        };
        analysis.analyse_functor_declarations(program, env);

        let mut changed = true;
        let mut rounds = 0usize;
        while changed {
            changed = false;
            rounds += 1;

            let mut argument_types = FxHashMap::default();
            for clause in &program.clauses {
                let clause_types =
                    ClauseTypeInference::new(env, program, &analysis).analyse(clause);
                argument_types.extend(clause_types);
            }
            analysis.argument_types = argument_types;

            changed |= analysis.analyse_intrinsic_functors(program, env);
            changed |= analysis.analyse_numeric_constants(program, env);
            changed |= analysis.analyse_aggregators(program, env);
            changed |= analysis.analyse_binary_constraints(program, env);
        }
        debug!(rounds, "type analysis fixpoint reached");
        analysis
    }

    fn analyse_functor_declarations(&mut self, program: &Program, env: &TypeEnvironment) {
        for decl in &program.functors {
            self.udf_stateful.insert(decl.name.clone(), decl.stateful);
            let Some(return_ty) = env.get_type(&decl.return_type.type_name) else {
                continue;
            };
            let param_tys: Option<Vec<TypeId>> = decl
                .params
                .iter()
                .map(|p| env.get_type(&p.type_name))
                .collect();
            let Some(param_tys) = param_tys else {
                continue;
            };
            self.udf_valid.insert(decl.name.clone());
            self.udf_return_kinds
                .insert(decl.name.clone(), env.kind_of(return_ty));
            self.udf_param_kinds.insert(
                decl.name.clone(),
                param_tys.into_iter().map(|ty| env.kind_of(ty)).collect(),
            );
        }
    }

    // -- polymorphism sub-analyses ------------------------------------------

    fn analyse_intrinsic_functors(&mut self, program: &Program, env: &TypeEnvironment) -> bool {
        let mut changed = false;
        for_each_argument(program, &mut |arg| {
            let Argument::IntrinsicFunctor(functor) = arg else {
                return;
            };
            let candidates = self.valid_intrinsic_overloads(env, functor, &functor.args);
            if candidates.is_empty() {
                // no valid overloads - mark invalid
                if self.functor_info.remove(&functor.id).is_some() {
                    changed = true;
                }
                return;
            }
            let elected = candidates[0];
            match self.functor_info.get(&functor.id) {
                Some(current) if std::ptr::eq(*current, elected) => {}
                _ => {
                    self.functor_info.insert(functor.id, elected);
                    changed = true;
                }
            }
        });
        changed
    }

    /// The overloads compatible with the currently known argument and
    /// result kinds, in a canonical order.
    pub fn valid_intrinsic_overloads(
        &self,
        env: &TypeEnvironment,
        functor: &strudel_ast::IntrinsicFunctor,
        args: &[Argument],
    ) -> Vec<&'static IntrinsicInfo> {
        let base_op = self
            .functor_info
            .get(&functor.id)
            .map_or(functor.op, |info| info.op);
        let result_kinds = self.kinds_of_argument_node(env, functor.id, Some(functor));
        let arg_kinds: Vec<FxHashSet<Kind>> = args
            .iter()
            .map(|arg| self.kinds_of_argument(env, arg))
            .collect();

        let mut candidates: Vec<&'static IntrinsicInfo> = builtin_overloads(base_op)
            .into_iter()
            .filter(|info| {
                if !info.variadic && arg_kinds.len() != info.params.len() {
                    return false;
                }
                for (i, kinds) in arg_kinds.iter().enumerate() {
                    if !kinds.contains(&info.param_kind(i)) {
                        return false;
                    }
                }
                result_kinds.contains(&info.result)
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.result
                .cmp(&b.result)
                .then_with(|| a.variadic.cmp(&b.variadic))
                .then_with(|| a.params.cmp(b.params))
        });
        candidates
    }

    /// The possible kinds of an argument, from resolved functor info
    /// where available, otherwise from the inferred type sets.
    fn kinds_of_argument(&self, env: &TypeEnvironment, arg: &Argument) -> FxHashSet<Kind> {
        match arg {
            Argument::IntrinsicFunctor(functor) => {
                self.kinds_of_argument_node(env, functor.id, Some(functor))
            }
            Argument::UserDefinedFunctor(udf) => {
                if let Some(&kind) = self.udf_return_kinds.get(&udf.name) {
                    return FxHashSet::from_iter([kind]);
                }
                self.kinds_of_argument_node(env, udf.id, None)
            }
            other => self.kinds_of_argument_node(env, other.id(), None),
        }
    }

    fn kinds_of_argument_node(
        &self,
        env: &TypeEnvironment,
        node: NodeId,
        functor: Option<&strudel_ast::IntrinsicFunctor>,
    ) -> FxHashSet<Kind> {
        if let Some(functor) = functor {
            if let Some(info) = self.functor_info.get(&functor.id) {
                return FxHashSet::from_iter([info.result]);
            }
        }
        match self.argument_types.get(&node) {
            None | Some(TypeSet::All) => FxHashSet::from_iter([
                Kind::Signed,
                Kind::Unsigned,
                Kind::Float,
                Kind::Symbol,
                Kind::Record,
            ]),
            Some(set) => set.iter().map(|t| env.kind_of(t)).collect(),
        }
    }

    fn analyse_numeric_constants(&mut self, program: &Program, env: &TypeEnvironment) -> bool {
        let mut changed = false;
        for_each_argument(program, &mut |arg| {
            let Argument::NumericConstant(constant) = arg else {
                return;
            };

            if let Some(fixed) = constant.fixed {
                changed |= self.set_numeric_kind(constant.id, fixed);
                return;
            }

            let inferred = {
                let types = self.argument_types.get(&constant.id);
                let has_kind = |kind: Kind| {
                    types.is_some_and(|set| {
                        !set.is_all() && set.iter().any(|t| env.is_of_kind(t, kind))
                    })
                };
                if has_kind(Kind::Signed) {
                    Some(NumericKind::Signed)
                } else if has_kind(Kind::Unsigned) {
                    Some(NumericKind::Unsigned)
                } else if has_kind(Kind::Float) {
                    Some(NumericKind::Float)
                } else {
                    None
                }
            };
            match inferred {
                Some(kind) => changed |= self.set_numeric_kind(constant.id, kind),
                // type information no longer valid
                None => changed |= self.numeric_kinds.remove(&constant.id).is_some(),
            }
        });
        changed
    }

    fn set_numeric_kind(&mut self, node: NodeId, kind: NumericKind) -> bool {
        if self.numeric_kinds.get(&node) == Some(&kind) {
            return false;
        }
        self.numeric_kinds.insert(node, kind);
        true
    }

    fn analyse_aggregators(&mut self, program: &Program, env: &TypeEnvironment) -> bool {
        let mut changed = false;
        for_each_argument(program, &mut |arg| {
            let Argument::Aggregator(agg) = arg else {
                return;
            };
            let resolved = if agg.op.is_overloaded() {
                let kind = agg
                    .target()
                    .map_or(Kind::Signed, |target| self.kind_of_types(env, target.id()));
                ResolvedAggregateOp::from_base(agg.op, kind)
            } else {
                ResolvedAggregateOp::from_base(agg.op, Kind::Signed)
            };
            if self.aggregator_ops.get(&agg.id) != Some(&resolved) {
                self.aggregator_ops.insert(agg.id, resolved);
                changed = true;
            }
        });
        changed
    }

    fn analyse_binary_constraints(&mut self, program: &Program, env: &TypeEnvironment) -> bool {
        let mut changed = false;
        for clause in &program.clauses {
            for_each_binary_constraint(clause, &mut |bc| {
                let resolved = if bc.op.is_overloaded() {
                    let lhs = self.kind_of_types(env, bc.lhs.id());
                    let rhs = self.kind_of_types(env, bc.rhs.id());
                    let kind = match (lhs, rhs) {
                        (Kind::Float, Kind::Float) => Kind::Float,
                        (Kind::Unsigned, Kind::Unsigned) => Kind::Unsigned,
                        (Kind::Symbol, Kind::Symbol) => Kind::Symbol,
                        _ => Kind::Signed,
                    };
                    ResolvedConstraintOp::new(bc.op, kind)
                } else {
                    ResolvedConstraintOp::new(bc.op, Kind::Symbol)
                };
                if self.constraint_ops.get(&bc.id) != Some(&resolved) {
                    self.constraint_ops.insert(bc.id, resolved);
                    changed = true;
                }
            });
        }
        changed
    }

    /// The kind of a node's inferred type set, defaulting to signed when
    /// the set is mixed or unknown.
    fn kind_of_types(&self, env: &TypeEnvironment, node: NodeId) -> Kind {
        let Some(set) = self.argument_types.get(&node) else {
            return Kind::Signed;
        };
        if env.set_is_of_kind(set, Kind::Float) {
            Kind::Float
        } else if env.set_is_of_kind(set, Kind::Unsigned) {
            Kind::Unsigned
        } else if env.set_is_of_kind(set, Kind::Symbol) {
            Kind::Symbol
        } else {
            Kind::Signed
        }
    }

    // -- queries ------------------------------------------------------------

    /// The inferred type set of an argument node.
    #[must_use]
    pub fn types(&self, node: NodeId) -> TypeSet {
        self.argument_types
            .get(&node)
            .cloned()
            .unwrap_or(TypeSet::All)
    }

    #[must_use]
    pub fn has_valid_intrinsic(&self, node: NodeId) -> bool {
        self.functor_info.contains_key(&node)
    }

    /// The elected overload of an intrinsic functor, if exactly one
    /// survived.
    #[must_use]
    pub fn intrinsic_info(&self, node: NodeId) -> Option<&'static IntrinsicInfo> {
        self.functor_info.get(&node).copied()
    }

    /// The inferred kind of a numeric constant.
    #[must_use]
    pub fn numeric_kind(&self, node: NodeId) -> Option<NumericKind> {
        self.numeric_kinds.get(&node).copied()
    }

    /// The resolved, kind-specialized operator of an aggregate.
    #[must_use]
    pub fn aggregator_op(&self, node: NodeId) -> Option<ResolvedAggregateOp> {
        self.aggregator_ops.get(&node).copied()
    }

    /// The resolved, kind-specialized operator of a binary constraint.
    #[must_use]
    pub fn constraint_op(&self, node: NodeId) -> Option<ResolvedConstraintOp> {
        self.constraint_ops.get(&node).copied()
    }

    /// The ADT that declares the given constructor.
    #[must_use]
    pub fn branch_type(&self, constructor: &str) -> Option<TypeId> {
        self.branch_to_adt.get(constructor).copied()
    }

    /// Whether the named user-defined functor has a resolved declaration.
    #[must_use]
    pub fn udf_is_valid(&self, name: &str) -> bool {
        self.udf_valid.contains(name)
    }

    #[must_use]
    pub fn udf_return_kind(&self, name: &str) -> Option<Kind> {
        self.udf_return_kinds.get(name).copied()
    }

    #[must_use]
    pub fn udf_param_kinds(&self, name: &str) -> Option<&[Kind]> {
        self.udf_param_kinds.get(name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn is_stateful(&self, name: &str) -> bool {
        self.udf_stateful.get(name).copied().unwrap_or(false)
    }

    /// The return kind of a functor application, if known.
    #[must_use]
    pub fn functor_return_kind(&self, arg: &Argument) -> Option<Kind> {
        match arg {
            Argument::IntrinsicFunctor(functor) => {
                self.intrinsic_info(functor.id).map(|info| info.result)
            }
            Argument::UserDefinedFunctor(udf) => self.udf_return_kind(&udf.name),
            _ => None,
        }
    }

    /// The kind of the i-th parameter of a functor application.
    #[must_use]
    pub fn functor_param_kind(&self, arg: &Argument, index: usize) -> Option<Kind> {
        match arg {
            Argument::IntrinsicFunctor(functor) => self
                .intrinsic_info(functor.id)
                .map(|info| info.param_kind(index)),
            Argument::UserDefinedFunctor(udf) => self
                .udf_param_kinds(&udf.name)
                .and_then(|kinds| kinds.get(index).copied()),
            _ => None,
        }
    }

    /// Whether the argument carries complete polymorphism information.
    #[must_use]
    pub fn has_valid_type_info(&self, arg: &Argument) -> bool {
        match arg {
            Argument::IntrinsicFunctor(functor) => self.has_valid_intrinsic(functor.id),
            Argument::UserDefinedFunctor(udf) => self.udf_is_valid(&udf.name),
            Argument::NumericConstant(constant) => self.numeric_kinds.contains_key(&constant.id),
            Argument::Aggregator(agg) => self.aggregator_ops.contains_key(&agg.id),
            _ => true,
        }
    }

    /// A per-clause listing of variable types for analysis logs.
    #[must_use]
    pub fn describe_clause(&self, env: &TypeEnvironment, clause: &Clause) -> String {
        let mut lines = Vec::new();
        let mut seen = FxHashSet::default();
        visit_variables_in_clause(clause, &mut |var| {
            if seen.insert(var.name.clone()) {
                lines.push(format!(
                    "  {} ∈ {}",
                    var.name,
                    self.types(var.id).display(env)
                ));
            }
        });
        lines.join("\n")
    }
}

impl fmt::Debug for TypeAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeAnalysis")
            .field("arguments", &self.argument_types.len())
            .field("functors", &self.functor_info.len())
            .field("numeric_constants", &self.numeric_kinds.len())
            .field("aggregators", &self.aggregator_ops.len())
            .field("constraints", &self.constraint_ops.len())
            .finish()
    }
}

/// Map each ADT constructor to its declaring type.
fn branch_to_adt_map(env: &TypeEnvironment) -> FxHashMap<String, TypeId> {
    let mut map = FxHashMap::default();
    for ty in env.all_types().iter() {
        if let TypeNode::Adt { branches } = env.node(ty) {
            for branch in branches {
                map.entry(branch.name.clone()).or_insert(ty);
            }
        }
    }
    map
}

/// Visit every argument node of every clause in the program.
fn for_each_argument(program: &Program, f: &mut impl FnMut(&Argument)) {
    for clause in &program.clauses {
        visit_arguments_in_clause(clause, f);
    }
}

/// Visit every binary constraint of the clause, including those inside
/// aggregate bodies.
fn for_each_binary_constraint(
    clause: &Clause,
    f: &mut impl FnMut(&strudel_ast::BinaryConstraint),
) {
    fn walk_literal(lit: &Literal, f: &mut impl FnMut(&strudel_ast::BinaryConstraint)) {
        match lit {
            Literal::BinaryConstraint(bc) => {
                f(bc);
                walk_argument(&bc.lhs, f);
                walk_argument(&bc.rhs, f);
            }
            Literal::Atom(atom) => {
                for arg in &atom.args {
                    walk_argument(arg, f);
                }
            }
            Literal::Negation(neg) => {
                for arg in &neg.atom.args {
                    walk_argument(arg, f);
                }
            }
            Literal::BooleanConstraint(_) | Literal::FunctionalConstraint(_) => {}
        }
    }
    fn walk_argument(arg: &Argument, f: &mut impl FnMut(&strudel_ast::BinaryConstraint)) {
        strudel_ast::visit::visit_arguments(arg, &mut |nested| {
            if let Argument::Aggregator(agg) = nested {
                for lit in &agg.body {
                    if let Literal::BinaryConstraint(bc) = lit {
                        f(bc);
                    }
                }
            }
        });
    }
    for lit in &clause.body {
        walk_literal(lit, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strudel_ast::{
        AggregateBaseOp, Aggregator, Atom, Attribute, BinaryConstraint, ConstraintOp,
        IntrinsicFunctor, IntrinsicOp, Relation,
    };
    use strudel_common::span::SrcLocation;

    fn loc() -> SrcLocation {
        SrcLocation::unset()
    }

    fn relation(name: &str, attr_types: &[&str]) -> Relation {
        let attrs = attr_types
            .iter()
            .enumerate()
            .map(|(i, ty)| Attribute::new(format!("a{i}"), *ty, loc()))
            .collect();
        Relation::new(name, attrs, loc())
    }

    fn var_types(
        analysis: &TypeAnalysis,
        env: &TypeEnvironment,
        clause: &Clause,
        name: &str,
    ) -> Vec<String> {
        let mut result = Vec::new();
        visit_variables_in_clause(clause, &mut |var| {
            if var.name == name && result.is_empty() {
                let set = analysis.types(var.id);
                if !set.is_all() {
                    result = set.iter().map(|t| env.name(t).to_string()).collect();
                }
            }
        });
        result
    }

    #[test]
    fn source_atoms_pin_declared_types() {
        let mut program = Program::new();
        program.add_relation(relation("p", &["number"]));
        program.add_relation(relation("q", &["number"]));
        // p(x) :- q(x).
        program.add_clause(Clause::new(
            Atom::new("p", vec![Argument::var("x")], loc()),
            vec![Literal::Atom(Atom::new("q", vec![Argument::var("x")], loc()))],
            loc(),
        ));

        let env = TypeEnvironment::new();
        let analysis = TypeAnalysis::run(&program, &env);
        assert_eq!(
            var_types(&analysis, &env, &program.clauses[0], "x"),
            vec!["number"]
        );
    }

    #[test]
    fn numeric_constant_kind_follows_context() {
        let mut program = Program::new();
        program.add_relation(relation("u", &["unsigned"]));
        // u(7).  (7 parses as signed, unsigned and float; context fixes it)
        let constant = Argument::number("7");
        let constant_id = constant.id();
        program.add_clause(Clause::new(
            Atom::new("u", vec![Argument::var("x")], loc()),
            vec![
                Literal::Atom(Atom::new("u", vec![Argument::var("x")], loc())),
                Literal::eq(Argument::var("x"), constant),
            ],
            loc(),
        ));

        let env = TypeEnvironment::new();
        let analysis = TypeAnalysis::run(&program, &env);
        assert_eq!(analysis.numeric_kind(constant_id), Some(NumericKind::Unsigned));
    }

    #[test]
    fn intrinsic_overload_is_elected_by_argument_kinds() {
        let mut program = Program::new();
        program.add_relation(relation("p", &["float"]));
        program.add_relation(relation("q", &["float"]));
        // p(y) :- q(x), y = x + x.
        let functor = Argument::IntrinsicFunctor(IntrinsicFunctor::new(
            IntrinsicOp::Add,
            vec![Argument::var("x"), Argument::var("x")],
            loc(),
        ));
        let functor_id = functor.id();
        program.add_clause(Clause::new(
            Atom::new("p", vec![Argument::var("y")], loc()),
            vec![
                Literal::Atom(Atom::new("q", vec![Argument::var("x")], loc())),
                Literal::eq(Argument::var("y"), functor),
            ],
            loc(),
        ));

        let env = TypeEnvironment::new();
        let analysis = TypeAnalysis::run(&program, &env);
        let info = analysis.intrinsic_info(functor_id).expect("resolved");
        assert_eq!(info.result, Kind::Float);
        assert_eq!(info.params, &[Kind::Float, Kind::Float]);
    }

    #[test]
    fn aggregator_operator_specializes_to_target_kind() {
        let mut program = Program::new();
        program.add_relation(relation("p", &["float"]));
        program.add_relation(relation("q", &["float"]));
        // p(m) :- m = min v : { q(v) }.
        let agg = Argument::Aggregator(Aggregator::new(
            AggregateBaseOp::Min,
            Some(Argument::var("v")),
            vec![Literal::Atom(Atom::new("q", vec![Argument::var("v")], loc()))],
            loc(),
        ));
        let agg_id = agg.id();
        program.add_clause(Clause::new(
            Atom::new("p", vec![Argument::var("m")], loc()),
            vec![Literal::eq(Argument::var("m"), agg)],
            loc(),
        ));

        let env = TypeEnvironment::new();
        let analysis = TypeAnalysis::run(&program, &env);
        assert_eq!(analysis.aggregator_op(agg_id), Some(ResolvedAggregateOp::FMin));
    }

    #[test]
    fn binary_constraint_specializes_to_operand_kinds() {
        let mut program = Program::new();
        program.add_relation(relation("p", &["unsigned"]));
        program.add_relation(relation("q", &["unsigned"]));
        // p(x) :- q(x), x < 10.
        let bc = BinaryConstraint::new(
            ConstraintOp::Lt,
            Argument::var("x"),
            Argument::number("10"),
            loc(),
        );
        let bc_id = bc.id;
        program.add_clause(Clause::new(
            Atom::new("p", vec![Argument::var("x")], loc()),
            vec![
                Literal::Atom(Atom::new("q", vec![Argument::var("x")], loc())),
                Literal::BinaryConstraint(bc),
            ],
            loc(),
        ));

        let env = TypeEnvironment::new();
        let analysis = TypeAnalysis::run(&program, &env);
        let resolved = analysis.constraint_op(bc_id).expect("resolved");
        assert_eq!(resolved.kind, Kind::Unsigned);
        assert_eq!(resolved.keyword(), "u<");
    }

    #[test]
    fn functor_with_no_surviving_overload_is_invalid() {
        let mut program = Program::new();
        program.add_relation(relation("p", &["number"]));
        program.add_relation(relation("s", &["symbol"]));
        // p(y) :- s(x), y = x + x.  (+ has no symbol overload)
        let functor = Argument::IntrinsicFunctor(IntrinsicFunctor::new(
            IntrinsicOp::Add,
            vec![Argument::var("x"), Argument::var("x")],
            loc(),
        ));
        let functor_id = functor.id();
        program.add_clause(Clause::new(
            Atom::new("p", vec![Argument::var("y")], loc()),
            vec![
                Literal::Atom(Atom::new("s", vec![Argument::var("x")], loc())),
                Literal::eq(Argument::var("y"), functor),
            ],
            loc(),
        ));

        let env = TypeEnvironment::new();
        let analysis = TypeAnalysis::run(&program, &env);
        assert!(!analysis.has_valid_intrinsic(functor_id));
    }
}
