//! AST to RAM translation.
//!
//! The unit translator walks the strongly connected components of the
//! precedence graph in topological order and emits one stratum
//! subroutine per SCC, with semi-naive fixpoint scaffolding (`@delta_`
//! and `@new_` relation variants) for the recursive ones. The clause
//! translator lowers each clause into a nest of RAM tuple operations.

pub mod clause;
pub mod context;
pub mod names;
pub mod unit;
pub mod value_index;

pub use context::TranslatorContext;
pub use unit::UnitTranslator;
