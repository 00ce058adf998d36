//! Type declarations.

use strudel_common::span::SrcLocation;

use crate::qualified_name::QualifiedName;
use crate::relation::Attribute;

/// One constructor of an algebraic data type.
#[derive(Clone, Debug)]
pub struct BranchDeclaration {
    pub constructor: String,
    pub fields: Vec<Attribute>,
    pub loc: SrcLocation,
}

impl BranchDeclaration {
    #[must_use]
    pub fn new(constructor: impl Into<String>, fields: Vec<Attribute>, loc: SrcLocation) -> Self {
        BranchDeclaration {
            constructor: constructor.into(),
            fields,
            loc,
        }
    }
}

/// A type declaration.
#[derive(Clone, Debug)]
pub enum TypeDeclaration {
    /// `name <: base`
    Subset {
        name: QualifiedName,
        base: QualifiedName,
        loc: SrcLocation,
    },
    /// `name = t1 | t2 | ...`
    Union {
        name: QualifiedName,
        elements: Vec<QualifiedName>,
        loc: SrcLocation,
    },
    /// `name = [field: type, ...]`
    Record {
        name: QualifiedName,
        fields: Vec<Attribute>,
        loc: SrcLocation,
    },
    /// `name = Ctor {field: type, ...} | ...`
    Adt {
        name: QualifiedName,
        branches: Vec<BranchDeclaration>,
        loc: SrcLocation,
    },
}

impl TypeDeclaration {
    #[must_use]
    pub fn name(&self) -> &QualifiedName {
        match self {
            TypeDeclaration::Subset { name, .. }
            | TypeDeclaration::Union { name, .. }
            | TypeDeclaration::Record { name, .. }
            | TypeDeclaration::Adt { name, .. } => name,
        }
    }

    #[must_use]
    pub fn loc(&self) -> &SrcLocation {
        match self {
            TypeDeclaration::Subset { loc, .. }
            | TypeDeclaration::Union { loc, .. }
            | TypeDeclaration::Record { loc, .. }
            | TypeDeclaration::Adt { loc, .. } => loc,
        }
    }
}
