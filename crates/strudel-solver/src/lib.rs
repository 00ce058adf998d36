//! Constraint-based analyses for the strudel Datalog compiler.
//!
//! This crate hosts everything between the raw AST and the checkers:
//! - `constraint` - a generic monotone fixpoint over property-space lattices
//! - `ground` - groundedness of terms per clause
//! - `functor` - the intrinsic functor catalogue and operator resolution types
//! - `type_inference` - per-clause subtype-lattice constraints
//! - `type_analysis` - the program-wide inference fixpoint and the
//!   polymorphism-resolution queries
//! - `aggregate` - scope analysis for aggregate expressions
//!   (local / injected / witness variables)
//! - `graph` - precedence graph, SCC graph, topological order,
//!   recursive-clause classification and the relation schedule

pub mod aggregate;
pub mod constraint;
pub mod functor;
pub mod graph;
pub mod ground;
pub mod type_analysis;
pub mod type_inference;

pub use functor::{IntrinsicInfo, ResolvedAggregateOp, ResolvedConstraintOp};
pub use graph::{PrecedenceGraph, RecursiveClauses, RelationSchedule, SccGraph};
pub use ground::grounded_terms;
pub use type_analysis::TypeAnalysis;
