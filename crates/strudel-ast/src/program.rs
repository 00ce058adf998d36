//! The program container.

use rustc_hash::FxHashMap;

use crate::clause::Clause;
use crate::directive::{Directive, DirectiveKind};
use crate::functor_decl::FunctorDeclaration;
use crate::qualified_name::QualifiedName;
use crate::relation::Relation;
use crate::type_decl::TypeDeclaration;

/// A desugared program: declarations plus clauses.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub types: Vec<TypeDeclaration>,
    pub relations: Vec<Relation>,
    pub clauses: Vec<Clause>,
    pub directives: Vec<Directive>,
    pub functors: Vec<FunctorDeclaration>,
}

impl Program {
    #[must_use]
    pub fn new() -> Self {
        Program::default()
    }

    /// Look up a relation declaration by name.
    #[must_use]
    pub fn relation(&self, name: &QualifiedName) -> Option<&Relation> {
        self.relations.iter().find(|rel| &rel.name == name)
    }

    /// Look up a functor declaration by name.
    #[must_use]
    pub fn functor(&self, name: &str) -> Option<&FunctorDeclaration> {
        self.functors.iter().find(|decl| decl.name == name)
    }

    /// All clauses whose head belongs to the given relation, in source
    /// order.
    #[must_use]
    pub fn clauses_for(&self, name: &QualifiedName) -> Vec<&Clause> {
        self.clauses
            .iter()
            .filter(|clause| &clause.head.name == name)
            .collect()
    }

    /// All directives attached to the given relation.
    #[must_use]
    pub fn directives_for(&self, name: &QualifiedName) -> Vec<&Directive> {
        self.directives
            .iter()
            .filter(|d| &d.relation == name)
            .collect()
    }

    /// Directives of the given kind attached to the given relation.
    #[must_use]
    pub fn directives_of(&self, name: &QualifiedName, kind: DirectiveKind) -> Vec<&Directive> {
        self.directives
            .iter()
            .filter(|d| &d.relation == name && d.kind == kind)
            .collect()
    }

    pub fn add_relation(&mut self, relation: Relation) {
        self.relations.push(relation);
    }

    pub fn add_clause(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    /// An index from relation name to declaration for repeated lookups.
    #[must_use]
    pub fn relation_index(&self) -> FxHashMap<&QualifiedName, &Relation> {
        self.relations.iter().map(|rel| (&rel.name, rel)).collect()
    }
}
