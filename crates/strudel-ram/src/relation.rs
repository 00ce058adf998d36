//! RAM relations.

use strudel_ast::RelationRepresentation;

/// A relation as the RAM program sees it: a flat signature of named,
/// kind-qualified columns plus the representation hint the storage
/// planner consumes.
#[derive(Clone, Debug, PartialEq)]
pub struct Relation {
    pub name: String,
    pub arity: usize,
    /// Trailing bookkeeping columns (e.g. provenance annotations) not
    /// part of the logical tuple.
    pub auxiliary_arity: usize,
    pub attribute_names: Vec<String>,
    /// Kind-qualified attribute types, e.g. `i:number` or `s:symbol`.
    pub attribute_types: Vec<String>,
    pub representation: RelationRepresentation,
}

impl Relation {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        attribute_names: Vec<String>,
        attribute_types: Vec<String>,
        representation: RelationRepresentation,
    ) -> Self {
        debug_assert_eq!(attribute_names.len(), attribute_types.len());
        Relation {
            name: name.into(),
            arity: attribute_names.len(),
            auxiliary_arity: 0,
            attribute_names,
            attribute_types,
            representation,
        }
    }

    /// The `name(arity=N, attrs=[...], repr=...)` signature line.
    #[must_use]
    pub fn signature(&self) -> String {
        let attrs: Vec<String> = self
            .attribute_names
            .iter()
            .zip(&self.attribute_types)
            .map(|(name, ty)| format!("{name}:{ty}"))
            .collect();
        format!(
            "{}(arity={}, attrs=[{}], repr={})",
            self.name,
            self.arity,
            attrs.join(","),
            self.representation.keyword()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_format() {
        let rel = Relation::new(
            "edge",
            vec!["x".into(), "y".into()],
            vec!["i:number".into(), "i:number".into()],
            RelationRepresentation::Default,
        );
        assert_eq!(
            rel.signature(),
            "edge(arity=2, attrs=[x:i:number,y:i:number], repr=default)"
        );
    }
}
