//! RAM relation naming.
//!
//! Recursive relations carry two auxiliary variants with identical
//! signatures: `@delta_R` holds the facts derived in the previous
//! fixpoint iteration and `@new_R` accumulates the facts of the current
//! one. The `@` prefix is reserved; the parser can never produce it.

use strudel_ast::QualifiedName;

/// The concrete RAM name of a relation.
#[must_use]
pub fn concrete_name(name: &QualifiedName) -> String {
    name.to_string()
}

/// The delta variant used as the semi-naive frontier.
#[must_use]
pub fn delta_name(name: &QualifiedName) -> String {
    format!("@delta_{name}")
}

/// The accumulator variant filled by recursive clauses.
#[must_use]
pub fn new_name(name: &QualifiedName) -> String {
    format!("@new_{name}")
}
