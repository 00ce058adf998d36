//! The RAM program.

use indexmap::IndexMap;

use crate::relation::Relation;
use crate::statement::Statement;

/// A complete RAM program: relations, subroutines and the main entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub relations: Vec<Relation>,
    pub main: Statement,
    /// Subroutines in insertion order (strata in topological order).
    pub subroutines: IndexMap<String, Statement>,
}

impl Program {
    #[must_use]
    pub fn new(
        relations: Vec<Relation>,
        main: Statement,
        subroutines: IndexMap<String, Statement>,
    ) -> Self {
        Program {
            relations,
            main,
            subroutines,
        }
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|rel| rel.name == name)
    }

    #[must_use]
    pub fn subroutine(&self, name: &str) -> Option<&Statement> {
        self.subroutines.get(name)
    }
}
