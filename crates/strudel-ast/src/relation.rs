//! Relation declarations.

use bitflags::bitflags;
use strudel_common::span::SrcLocation;

use crate::literal::FunctionalConstraint;
use crate::qualified_name::QualifiedName;

/// A named, typed column of a relation.
#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    pub type_name: QualifiedName,
    pub loc: SrcLocation,
}

impl Attribute {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<QualifiedName>,
        loc: SrcLocation,
    ) -> Self {
        Attribute {
            name: name.into(),
            type_name: type_name.into(),
            loc,
        }
    }
}

bitflags! {
    /// Qualifiers attached to a relation declaration.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RelationQualifiers: u16 {
        const INPUT       = 1 << 0;
        const OUTPUT      = 1 << 1;
        const PRINT_SIZE  = 1 << 2;
        const INLINE      = 1 << 3;
        const SUPPRESSED  = 1 << 4;
        const OVERRIDABLE = 1 << 5;
    }
}

/// The physical representation requested for a relation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RelationRepresentation {
    #[default]
    Default,
    Btree,
    Brie,
    Eqrel,
    Provenance,
}

impl RelationRepresentation {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            RelationRepresentation::Default => "default",
            RelationRepresentation::Btree => "btree",
            RelationRepresentation::Brie => "brie",
            RelationRepresentation::Eqrel => "eqrel",
            RelationRepresentation::Provenance => "provenance",
        }
    }
}

/// A relation declaration.
#[derive(Clone, Debug)]
pub struct Relation {
    pub name: QualifiedName,
    pub attributes: Vec<Attribute>,
    pub qualifiers: RelationQualifiers,
    pub representation: RelationRepresentation,
    pub functional_dependencies: Vec<FunctionalConstraint>,
    pub loc: SrcLocation,
}

impl Relation {
    #[must_use]
    pub fn new(name: impl Into<QualifiedName>, attributes: Vec<Attribute>, loc: SrcLocation) -> Self {
        Relation {
            name: name.into(),
            attributes,
            qualifiers: RelationQualifiers::empty(),
            representation: RelationRepresentation::Default,
            functional_dependencies: Vec::new(),
            loc,
        }
    }

    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.attributes.len()
    }

    #[inline]
    #[must_use]
    pub fn has_qualifier(&self, qualifier: RelationQualifiers) -> bool {
        self.qualifiers.contains(qualifier)
    }

    #[inline]
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.has_qualifier(RelationQualifiers::INLINE)
    }
}
