//! Source location tracking for AST nodes and diagnostics.
//!
//! Every AST node carries a `SrcLocation` identifying the file and the
//! line/column range it was parsed from. Locations are attached to
//! diagnostics and survive AST rewrites: synthesized nodes inherit the
//! location of their logical origin.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A position in a source file (1-indexed line and column).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// 1-indexed line number; 0 marks an unknown position.
    pub line: u32,
    /// 1-indexed column number; 0 marks an unknown position.
    pub column: u32,
}

impl Position {
    #[inline]
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }

    /// Check if this is the unknown/dummy position.
    #[inline]
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open source range within a single file.
///
/// A `SrcLocation` is cheap to clone: the file name is reference counted
/// and shared by every node parsed from the same file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SrcLocation {
    /// Name of the source file, empty for synthesized nodes with no origin.
    pub file: Arc<str>,
    pub start: Position,
    pub end: Position,
}

impl SrcLocation {
    #[must_use]
    pub fn new(file: impl Into<Arc<str>>, start: Position, end: Position) -> Self {
        SrcLocation {
            file: file.into(),
            start,
            end,
        }
    }

    /// A location for synthesized nodes that have no source origin.
    #[must_use]
    pub fn unset() -> Self {
        SrcLocation::default()
    }

    #[inline]
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.start.is_unset()
    }

    /// Merge two locations into one covering both.
    ///
    /// Both locations must come from the same file; if either side is
    /// unset, the other is returned unchanged.
    #[must_use]
    pub fn merge(&self, other: &SrcLocation) -> SrcLocation {
        if self.is_unset() {
            return other.clone();
        }
        if other.is_unset() {
            return self.clone();
        }
        SrcLocation {
            file: self.file.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for SrcLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            return write!(f, "<unknown>");
        }
        write!(f, "{} [{}-{}]", self.file, self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_covers_both_ranges() {
        let a = SrcLocation::new("f.dl", Position::new(1, 4), Position::new(1, 9));
        let b = SrcLocation::new("f.dl", Position::new(3, 1), Position::new(3, 7));
        let merged = a.merge(&b);
        assert_eq!(merged.start, Position::new(1, 4));
        assert_eq!(merged.end, Position::new(3, 7));
    }

    #[test]
    fn merge_with_unset_keeps_other_side() {
        let a = SrcLocation::new("f.dl", Position::new(2, 1), Position::new(2, 5));
        assert_eq!(a.merge(&SrcLocation::unset()), a);
        assert_eq!(SrcLocation::unset().merge(&a), a);
    }
}
