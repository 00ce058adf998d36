//! Type lattice and type environment for the strudel Datalog compiler.
//!
//! Named types form an immutable-after-construction graph owned by the
//! `TypeEnvironment`; all other code refers to types through copyable
//! `TypeId` indices. The lattice operations (subtyping, greatest common
//! subtypes, kind computation) are total queries: "no common type" is the
//! empty set, never an error.

pub mod env;
pub mod builder;
pub mod type_set;

pub use builder::TypeEnvironmentAnalysis;
pub use env::{AdtBranch, Kind, TypeEnvironment, TypeId, TypeNode};
pub use type_set::TypeSet;
