//! The relational algebra machine (RAM) intermediate representation.
//!
//! A RAM program owns a list of relations, a `main` statement and a map
//! of named subroutines. Statements form trees of control structure
//! (sequences, loops, swaps, IO); each `Query` statement roots a nest of
//! tuple operations (scans, filters, aggregates, inserts) over
//! expressions and conditions.
//!
//! All nodes are plain values: deep clone is `Clone`, structural
//! equality is `PartialEq`, and the pretty printer produces the indented
//! listing consumed by snapshot tests and debug reports.

pub mod condition;
pub mod expression;
pub mod operation;
pub mod print;
pub mod program;
pub mod relation;
pub mod statement;

pub use condition::Condition;
pub use expression::{Expression, NestedIntrinsicOp};
pub use operation::Operation;
pub use program::Program;
pub use relation::Relation;
pub use statement::Statement;
