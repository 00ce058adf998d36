//! The per-clause value index.
//!
//! While a clause is lowered, every variable, record, ADT branch and
//! generator is assigned the loop-nest location(s) where its value is
//! available: a (level, column) pair referring to the tuple bound at
//! that nesting level. The first (lowest) reference of a variable is its
//! definition point; later references induce equality constraints.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use strudel_ast::NodeId;

/// A (level, column) position in the loop nest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub level: usize,
    pub column: usize,
}

impl Location {
    #[must_use]
    pub fn new(level: usize, column: usize) -> Self {
        Location { level, column }
    }
}

/// Indexes the locations of values within one clause's loop nest.
#[derive(Debug, Default)]
pub struct ValueIndex {
    /// All reference points of each named variable, ordered.
    variable_references: IndexMap<String, BTreeSet<Location>>,
    /// Definition (unpack) points of record initializers.
    record_definitions: FxHashMap<NodeId, Location>,
    /// Definition (unpack) points of ADT branch initializers.
    adt_definitions: FxHashMap<NodeId, Location>,
    /// Result locations of generators (aggregates, multi-result
    /// functors).
    generator_locations: FxHashMap<NodeId, Location>,
    /// Levels occupied by generators.
    generator_levels: FxHashSet<usize>,
}

impl ValueIndex {
    #[must_use]
    pub fn new() -> Self {
        ValueIndex::default()
    }

    pub fn add_variable_reference(&mut self, name: &str, location: Location) {
        self.variable_references
            .entry(name.to_owned())
            .or_default()
            .insert(location);
    }

    #[must_use]
    pub fn variable_references(&self) -> &IndexMap<String, BTreeSet<Location>> {
        &self.variable_references
    }

    #[must_use]
    pub fn references_of(&self, name: &str) -> Option<&BTreeSet<Location>> {
        self.variable_references.get(name)
    }

    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.variable_references.contains_key(name)
    }

    /// The first reference of a variable fixes its value.
    #[must_use]
    pub fn definition_point(&self, name: &str) -> Option<Location> {
        self.variable_references
            .get(name)
            .and_then(|refs| refs.iter().next())
            .copied()
    }

    pub fn set_record_definition(&mut self, record: NodeId, location: Location) {
        self.record_definitions.insert(record, location);
    }

    #[must_use]
    pub fn record_definition(&self, record: NodeId) -> Option<Location> {
        self.record_definitions.get(&record).copied()
    }

    pub fn set_adt_definition(&mut self, branch: NodeId, location: Location) {
        self.adt_definitions.insert(branch, location);
    }

    #[must_use]
    pub fn adt_definition(&self, branch: NodeId) -> Option<Location> {
        self.adt_definitions.get(&branch).copied()
    }

    pub fn set_generator_location(&mut self, generator: NodeId, location: Location) {
        self.generator_levels.insert(location.level);
        self.generator_locations.insert(generator, location);
    }

    #[must_use]
    pub fn generator_location(&self, generator: NodeId) -> Option<Location> {
        self.generator_locations.get(&generator).copied()
    }

    #[must_use]
    pub fn is_generator_level(&self, level: usize) -> bool {
        self.generator_levels.contains(&level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_point_is_the_lowest_reference() {
        let mut index = ValueIndex::new();
        index.add_variable_reference("x", Location::new(2, 1));
        index.add_variable_reference("x", Location::new(0, 0));
        index.add_variable_reference("x", Location::new(1, 3));
        assert_eq!(index.definition_point("x"), Some(Location::new(0, 0)));
        assert_eq!(index.references_of("x").unwrap().len(), 3);
        assert!(index.definition_point("y").is_none());
    }

    #[test]
    fn generator_levels_are_tracked() {
        let mut index = ValueIndex::new();
        let node = NodeId::fresh();
        index.set_generator_location(node, Location::new(3, 0));
        assert!(index.is_generator_level(3));
        assert!(!index.is_generator_level(2));
        assert_eq!(index.generator_location(node), Some(Location::new(3, 0)));
    }
}
