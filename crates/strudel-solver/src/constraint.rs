//! Generic constraint-solving infrastructure.
//!
//! A *property space* is a finite-height lattice: a value set with a
//! bottom factory and a meet operator that reports whether it tightened
//! its left operand. A *problem* is a bag of constraints over dense
//! variable handles; solving iterates all constraints until none reports
//! a change. Termination follows from the lattice height and update
//! monotonicity; the one deliberately non-monotone update (intrinsic
//! overload pinning) records its single raise so every later call is
//! monotone again.

use std::fmt;

use rustc_hash::FxHashMap;
use strudel_ast::NodeId;

/// A lattice over the analysis values.
///
/// Implementations carry whatever context the meet needs (e.g. the type
/// environment).
pub trait PropertySpace {
    type Value: Clone + PartialEq + fmt::Debug;

    /// The bottom (least constrained) element.
    fn bottom(&self) -> Self::Value;

    /// Meet `b` into `a`; returns whether `a` changed.
    fn meet(&self, a: &mut Self::Value, b: &Self::Value) -> bool;
}

/// Dense handle of an analysis variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarId(usize);

/// Keys under which analysis variables unify: named AST variables with
/// the same name share one variable; every other argument node gets its
/// own.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum VarKey {
    Named(String),
    Node(NodeId),
}

/// Interner handing out dense `VarId`s for argument nodes.
#[derive(Debug, Default)]
pub struct VarRegistry {
    by_key: FxHashMap<VarKey, VarId>,
    labels: Vec<String>,
}

impl VarRegistry {
    #[must_use]
    pub fn new() -> Self {
        VarRegistry::default()
    }

    /// The variable for a named AST variable; occurrences unify by name.
    pub fn named(&mut self, name: &str) -> VarId {
        if let Some(&id) = self.by_key.get(&VarKey::Named(name.to_owned())) {
            return id;
        }
        let id = VarId(self.labels.len());
        self.labels.push(format!("var({name})"));
        self.by_key.insert(VarKey::Named(name.to_owned()), id);
        id
    }

    /// The variable for any other argument node, keyed by identity.
    pub fn node(&mut self, node: NodeId) -> VarId {
        if let Some(&id) = self.by_key.get(&VarKey::Node(node)) {
            return id;
        }
        let id = VarId(self.labels.len());
        self.labels.push(format!("var(#{})", node.index()));
        self.by_key.insert(VarKey::Node(node), id);
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn label(&self, var: VarId) -> &str {
        &self.labels[var.0]
    }
}

/// A total map from variables to lattice values.
#[derive(Clone, Debug)]
pub struct Assignment<V> {
    values: Vec<V>,
}

impl<V: Clone> Assignment<V> {
    #[must_use]
    pub fn new(num_vars: usize, bottom: V) -> Self {
        Assignment {
            values: vec![bottom; num_vars],
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, var: VarId) -> &V {
        &self.values[var.0]
    }

    #[inline]
    pub fn get_mut(&mut self, var: VarId) -> &mut V {
        &mut self.values[var.0]
    }

    pub fn set(&mut self, var: VarId, value: V) {
        self.values[var.0] = value;
    }

    /// Mutable access to two distinct variables at once.
    pub fn get_pair_mut(&mut self, a: VarId, b: VarId) -> (&mut V, &mut V) {
        assert_ne!(a, b, "variables must be distinct");
        if a.0 < b.0 {
            let (lo, hi) = self.values.split_at_mut(b.0);
            (&mut lo[a.0], &mut hi[0])
        } else {
            let (lo, hi) = self.values.split_at_mut(a.0);
            (&mut hi[0], &mut lo[b.0])
        }
    }
}

/// A single constraint over a property space.
pub trait Constraint<P: PropertySpace> {
    /// Tighten the assignment; returns whether anything changed.
    fn update(&mut self, space: &P, assignment: &mut Assignment<P::Value>) -> bool;

    /// Human-readable rendering for analysis logs.
    fn describe(&self, registry: &VarRegistry) -> String;
}

/// An accumulated constraint problem.
pub struct Problem<P: PropertySpace> {
    constraints: Vec<Box<dyn Constraint<P>>>,
}

impl<P: PropertySpace> Problem<P> {
    #[must_use]
    pub fn new() -> Self {
        Problem {
            constraints: Vec::new(),
        }
    }

    pub fn add(&mut self, constraint: Box<dyn Constraint<P>>) {
        self.constraints.push(constraint);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Solve by round-robin iteration to fixpoint.
    pub fn solve(&mut self, space: &P, num_vars: usize) -> Assignment<P::Value> {
        let mut assignment = Assignment::new(num_vars, space.bottom());
        let mut changed = true;
        while changed {
            changed = false;
            for constraint in &mut self.constraints {
                changed |= constraint.update(space, &mut assignment);
            }
        }
        assignment
    }

    /// The problem listing for analysis logs.
    #[must_use]
    pub fn describe(&self, registry: &VarRegistry) -> String {
        self.constraints
            .iter()
            .map(|c| c.describe(registry))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<P: PropertySpace> Default for Problem<P> {
    fn default() -> Self {
        Problem::new()
    }
}

/// The generic flow constraint: the value of `from` is met into `to`.
pub struct FlowConstraint {
    pub from: VarId,
    pub to: VarId,
    pub symbol: &'static str,
}

impl<P: PropertySpace> Constraint<P> for FlowConstraint {
    fn update(&mut self, space: &P, assignment: &mut Assignment<P::Value>) -> bool {
        if self.from == self.to {
            return false;
        }
        let (from, to) = assignment.get_pair_mut(self.from, self.to);
        space.meet(to, from)
    }

    fn describe(&self, registry: &VarRegistry) -> String {
        format!(
            "{} {} {}",
            registry.label(self.from),
            self.symbol,
            registry.label(self.to)
        )
    }
}

/// `from ⊑ to` as a boxed constraint.
#[must_use]
pub fn flow<P: PropertySpace>(from: VarId, to: VarId, symbol: &'static str) -> Box<dyn Constraint<P>>
where
    FlowConstraint: Constraint<P>,
{
    Box::new(FlowConstraint { from, to, symbol })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The boolean-disjunct lattice used by the groundedness analysis.
    struct BoolDisjunct;

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

    #[test]
    fn named_variables_unify() {
        let mut registry = VarRegistry::new();
        let a = registry.named("x");
        let b = registry.named("x");
        let c = registry.named("y");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn implication_chain_reaches_fixpoint() {
        let mut registry = VarRegistry::new();
        let x = registry.named("x");
        let y = registry.named("y");
        let z = registry.named("z");
        let w = registry.named("w");

        let mut problem: Problem<BoolDisjunct> = Problem::new();
        // z <= y <= x; x is true; w unconstrained
        problem.add(flow(y, z, "=>"));
        problem.add(flow(x, y, "=>"));
        problem.add(Box::new(IsTrue(x)));

        let solution = problem.solve(&BoolDisjunct, registry.len());
        assert!(*solution.get(x));
        assert!(*solution.get(y));
        assert!(*solution.get(z));
        assert!(!*solution.get(w));
    }

    #[test]
    fn pair_access_is_order_independent() {
        let mut assignment = Assignment::new(3, 0u32);
        assignment.set(VarId(0), 1);
        assignment.set(VarId(2), 5);
        let (a, b) = assignment.get_pair_mut(VarId(2), VarId(0));
        assert_eq!((*a, *b), (5, 1));
    }
}
