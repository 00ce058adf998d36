//! Semantic and type checking.
//!
//! Checkers run after inference and aggregate normalization, append
//! user-visible diagnostics to the error report, and always run to
//! completion: a violation never aborts the pass. The module split
//! follows the kind of rule enforced:
//! - `semantic` - references, arities, rule shape, aggregate shape,
//!   inlining and namespace rules
//! - `ground` - every term must be provably grounded by its body
//! - `type_check` - type declaration validity and argument typing

pub mod ground;
pub mod semantic;
pub mod type_check;

pub use ground::check_grounded_terms;
pub use semantic::SemanticChecker;
pub use type_check::TypeChecker;
