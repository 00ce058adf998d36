//! Sets of types, with a distinguished universe.
//!
//! `TypeSet::All` stands for the set of all types without being able to
//! enumerate them; it is the bottom element of the type-deduction lattice.
//! Iteration over the universe is forbidden.

use std::collections::BTreeSet;
use std::fmt;

use crate::env::{TypeEnvironment, TypeId};

/// Either the universe or a finite, ordered set of type references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeSet {
    All,
    Set(BTreeSet<TypeId>),
}

impl TypeSet {
    #[must_use]
    pub fn empty() -> Self {
        TypeSet::Set(BTreeSet::new())
    }

    #[must_use]
    pub fn of(types: impl IntoIterator<Item = TypeId>) -> Self {
        TypeSet::Set(types.into_iter().collect())
    }

    #[must_use]
    pub fn singleton(ty: TypeId) -> Self {
        TypeSet::of([ty])
    }

    #[inline]
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, TypeSet::All)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            TypeSet::All => false,
            TypeSet::Set(types) => types.is_empty(),
        }
    }

    /// Size of the set; the universe has no size.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            TypeSet::All => panic!("unable to give size of universe"),
            TypeSet::Set(types) => types.len(),
        }
    }

    #[must_use]
    pub fn contains(&self, ty: TypeId) -> bool {
        match self {
            TypeSet::All => true,
            TypeSet::Set(types) => types.contains(&ty),
        }
    }

    pub fn insert(&mut self, ty: TypeId) {
        if let TypeSet::Set(types) = self {
            types.insert(ty);
        }
    }

    /// Union another set into this one; the universe absorbs everything.
    pub fn insert_all(&mut self, other: &TypeSet) {
        match (&mut *self, other) {
            (TypeSet::All, _) => {}
            (_, TypeSet::All) => *self = TypeSet::All,
            (TypeSet::Set(into), TypeSet::Set(from)) => into.extend(from.iter().copied()),
        }
    }

    /// Iterate the members; forbidden on the universe.
    pub fn iter(&self) -> impl Iterator<Item = TypeId> + '_ {
        match self {
            TypeSet::All => panic!("unable to enumerate universe"),
            TypeSet::Set(types) => types.iter().copied(),
        }
    }

    /// The single member of a singleton set.
    #[must_use]
    pub fn as_singleton(&self) -> Option<TypeId> {
        match self {
            TypeSet::Set(types) if types.len() == 1 => types.iter().next().copied(),
            _ => None,
        }
    }

    #[must_use]
    pub fn intersection(left: &TypeSet, right: &TypeSet) -> TypeSet {
        match (left, right) {
            (TypeSet::All, other) | (other, TypeSet::All) => other.clone(),
            (TypeSet::Set(a), TypeSet::Set(b)) => {
                TypeSet::Set(a.intersection(b).copied().collect())
            }
        }
    }

    /// Filter with a predicate; `when_all` is returned for the universe.
    #[must_use]
    pub fn filter(&self, when_all: TypeSet, f: impl Fn(TypeId) -> bool) -> TypeSet {
        match self {
            TypeSet::All => when_all,
            TypeSet::Set(types) => TypeSet::Set(types.iter().copied().filter(|&t| f(t)).collect()),
        }
    }

    #[must_use]
    pub fn is_subset_of(&self, other: &TypeSet) -> bool {
        match (self, other) {
            (TypeSet::All, other) => other.is_all(),
            (TypeSet::Set(types), _) => types.iter().all(|&t| other.contains(t)),
        }
    }

    /// Render the set against an environment, for diagnostics and debug
    /// listings.
    #[must_use]
    pub fn display<'a>(&'a self, env: &'a TypeEnvironment) -> TypeSetDisplay<'a> {
        TypeSetDisplay { set: self, env }
    }
}

impl Default for TypeSet {
    fn default() -> Self {
        TypeSet::empty()
    }
}

pub struct TypeSetDisplay<'a> {
    set: &'a TypeSet,
    env: &'a TypeEnvironment,
}

impl fmt::Display for TypeSetDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.set {
            TypeSet::All => write!(f, "{{ - all types - }}"),
            TypeSet::Set(types) => {
                write!(f, "{{")?;
                for (i, ty) in types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", self.env.name(*ty))?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(n: u32) -> TypeId {
        TypeId::from_index(n)
    }

    #[test]
    fn universe_absorbs_intersection() {
        let finite = TypeSet::of([tid(1), tid(2)]);
        assert_eq!(TypeSet::intersection(&TypeSet::All, &finite), finite);
        assert_eq!(TypeSet::intersection(&finite, &TypeSet::All), finite);
    }

    #[test]
    fn universe_is_not_empty() {
        assert!(!TypeSet::All.is_empty());
        assert!(TypeSet::empty().is_empty());
    }

    #[test]
    fn insert_all_with_universe_makes_universe() {
        let mut set = TypeSet::of([tid(1)]);
        set.insert_all(&TypeSet::All);
        assert!(set.is_all());
    }

    #[test]
    fn subset_checks() {
        let small = TypeSet::of([tid(1)]);
        let big = TypeSet::of([tid(1), tid(2)]);
        assert!(small.is_subset_of(&big));
        assert!(!big.is_subset_of(&small));
        assert!(big.is_subset_of(&TypeSet::All));
        assert!(!TypeSet::All.is_subset_of(&big));
        assert!(TypeSet::All.is_subset_of(&TypeSet::All));
    }
}
