//! Common types and utilities for the strudel Datalog compiler.
//!
//! This crate provides foundational types used across all strudel crates:
//! - Source locations (`Position`, `SrcLocation`)
//! - Diagnostics and the error report sink (`Diagnostic`, `ErrorReport`)
//! - Compiler options (`Options`)
//! - Numeric literal parsing for the three RAM number domains

// Source locations (file + line/column ranges)
pub mod span;
pub use span::{Position, SrcLocation};

// Diagnostics - user-visible errors and warnings
pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticMessage, ErrorReport, Severity};

// Compiler options threaded through the passes
pub mod options;
pub use options::Options;

// Numeric literal parsing
pub mod numeric;
