//! Clauses and execution plans.

use rustc_hash::FxHashMap;
use strudel_common::span::SrcLocation;

use crate::literal::{Atom, Literal};

/// A scheduling hint attached to a clause: for each recursive version
/// index, a 1-based permutation of the body atoms.
#[derive(Clone, Debug, Default)]
pub struct ExecutionPlan {
    orders: FxHashMap<usize, Vec<usize>>,
}

impl ExecutionPlan {
    #[must_use]
    pub fn new() -> Self {
        ExecutionPlan::default()
    }

    pub fn set_order(&mut self, version: usize, permutation: Vec<usize>) {
        self.orders.insert(version, permutation);
    }

    #[must_use]
    pub fn order_for(&self, version: usize) -> Option<&[usize]> {
        self.orders.get(&version).map(Vec::as_slice)
    }

    #[must_use]
    pub fn max_version(&self) -> Option<usize> {
        self.orders.keys().copied().max()
    }
}

/// A fact (head only) or rule (head and body).
#[derive(Clone, Debug)]
pub struct Clause {
    pub head: Atom,
    pub body: Vec<Literal>,
    pub plan: Option<ExecutionPlan>,
    pub loc: SrcLocation,
}

impl Clause {
    #[must_use]
    pub fn new(head: Atom, body: Vec<Literal>, loc: SrcLocation) -> Self {
        Clause {
            head,
            body,
            plan: None,
            loc,
        }
    }

    #[must_use]
    pub fn fact(head: Atom, loc: SrcLocation) -> Self {
        Clause::new(head, Vec::new(), loc)
    }

    #[inline]
    #[must_use]
    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    /// The positive atoms of the body, in source order.
    #[must_use]
    pub fn body_atoms(&self) -> Vec<&Atom> {
        self.body.iter().filter_map(Literal::as_atom).collect()
    }
}
