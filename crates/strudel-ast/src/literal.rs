//! Body literals: atoms, negations and constraints.

use strudel_common::span::SrcLocation;

use crate::argument::Argument;
use crate::node::NodeId;
use crate::operators::ConstraintOp;
use crate::qualified_name::QualifiedName;

/// A predicate applied to arguments, e.g. `edge(x, y)`.
#[derive(Debug)]
pub struct Atom {
    pub id: NodeId,
    pub name: QualifiedName,
    pub args: Vec<Argument>,
    pub loc: SrcLocation,
}

impl Atom {
    #[must_use]
    pub fn new(name: impl Into<QualifiedName>, args: Vec<Argument>, loc: SrcLocation) -> Self {
        Atom {
            id: NodeId::fresh(),
            name: name.into(),
            args,
            loc,
        }
    }

    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

impl Clone for Atom {
    fn clone(&self) -> Self {
        Atom {
            id: NodeId::fresh(),
            name: self.name.clone(),
            args: self.args.clone(),
            loc: self.loc.clone(),
        }
    }
}

/// A negated atom `!p(..)`.
#[derive(Clone, Debug)]
pub struct Negation {
    pub atom: Atom,
    pub loc: SrcLocation,
}

impl Negation {
    #[must_use]
    pub fn new(atom: Atom, loc: SrcLocation) -> Self {
        Negation { atom, loc }
    }
}

/// A binary constraint between two arguments, e.g. `x < y`.
#[derive(Debug)]
pub struct BinaryConstraint {
    pub id: NodeId,
    pub op: ConstraintOp,
    pub lhs: Box<Argument>,
    pub rhs: Box<Argument>,
    pub loc: SrcLocation,
}

impl BinaryConstraint {
    #[must_use]
    pub fn new(op: ConstraintOp, lhs: Argument, rhs: Argument, loc: SrcLocation) -> Self {
        BinaryConstraint {
            id: NodeId::fresh(),
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            loc,
        }
    }
}

impl Clone for BinaryConstraint {
    fn clone(&self) -> Self {
        BinaryConstraint {
            id: NodeId::fresh(),
            op: self.op,
            lhs: self.lhs.clone(),
            rhs: self.rhs.clone(),
            loc: self.loc.clone(),
        }
    }
}

/// The trivially true or false constraint.
#[derive(Clone, Debug)]
pub struct BooleanConstraint {
    pub value: bool,
    pub loc: SrcLocation,
}

impl BooleanConstraint {
    #[must_use]
    pub fn new(value: bool, loc: SrcLocation) -> Self {
        BooleanConstraint { value, loc }
    }
}

/// A choice-domain constraint: the listed attributes functionally
/// determine the remaining columns of the relation.
#[derive(Clone, Debug)]
pub struct FunctionalConstraint {
    /// Names of the key attributes.
    pub keys: Vec<String>,
    pub loc: SrcLocation,
}

impl FunctionalConstraint {
    #[must_use]
    pub fn new(keys: Vec<String>, loc: SrcLocation) -> Self {
        FunctionalConstraint { keys, loc }
    }

    /// Whether two constraints describe the same key set.
    #[must_use]
    pub fn is_equivalent(&self, other: &FunctionalConstraint) -> bool {
        let mut a = self.keys.clone();
        let mut b = other.keys.clone();
        a.sort();
        b.sort();
        a == b
    }
}

/// A literal of a clause body.
#[derive(Clone, Debug)]
pub enum Literal {
    Atom(Atom),
    Negation(Negation),
    BinaryConstraint(BinaryConstraint),
    BooleanConstraint(BooleanConstraint),
    FunctionalConstraint(FunctionalConstraint),
}

impl Literal {
    #[must_use]
    pub fn loc(&self) -> &SrcLocation {
        match self {
            Literal::Atom(atom) => &atom.loc,
            Literal::Negation(neg) => &neg.loc,
            Literal::BinaryConstraint(bc) => &bc.loc,
            Literal::BooleanConstraint(bc) => &bc.loc,
            Literal::FunctionalConstraint(fc) => &fc.loc,
        }
    }

    /// The positive atom, if this literal is one.
    #[must_use]
    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Literal::Atom(atom) => Some(atom),
            _ => None,
        }
    }

    /// Convenience constructor for an equality constraint.
    #[must_use]
    pub fn eq(lhs: Argument, rhs: Argument) -> Literal {
        Literal::BinaryConstraint(BinaryConstraint::new(
            ConstraintOp::Eq,
            lhs,
            rhs,
            SrcLocation::unset(),
        ))
    }
}
