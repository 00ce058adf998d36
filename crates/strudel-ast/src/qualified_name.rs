//! Dotted identifiers with value equality and a total order.

use std::fmt;

/// A qualified name: a non-empty, ordered sequence of identifier segments.
///
/// Printed with `.` between segments. Names carrying the reserved `@` or
/// `+` prefixes are synthesized by the compiler and can never be produced
/// by the parser.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName {
    segments: Vec<String>,
}

impl QualifiedName {
    #[must_use]
    pub fn new(segments: Vec<String>) -> Self {
        QualifiedName { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn prepend(&mut self, segment: impl Into<String>) {
        self.segments.insert(0, segment.into());
    }

    pub fn append(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    /// Whether this name was synthesized by the compiler.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.segments
            .first()
            .is_some_and(|s| s.starts_with('@') || s.starts_with('+'))
    }
}

impl From<&str> for QualifiedName {
    fn from(name: &str) -> Self {
        QualifiedName {
            segments: name.split('.').map(str::to_owned).collect(),
        }
    }
}

impl From<String> for QualifiedName {
    fn from(name: String) -> Self {
        QualifiedName::from(name.as_str())
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}
