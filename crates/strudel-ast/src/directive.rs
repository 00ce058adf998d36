//! IO directives.

use indexmap::IndexMap;
use strudel_common::span::SrcLocation;

use crate::qualified_name::QualifiedName;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Input,
    Output,
    PrintSize,
    LimitSize,
}

impl DirectiveKind {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            DirectiveKind::Input => "input",
            DirectiveKind::Output => "output",
            DirectiveKind::PrintSize => "printsize",
            DirectiveKind::LimitSize => "limitsize",
        }
    }
}

/// An `.input`/`.output`/`.printsize`/`.limitsize` directive with its
/// parameter map. Parameter order is preserved for stable output.
#[derive(Clone, Debug)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub relation: QualifiedName,
    pub params: IndexMap<String, String>,
    pub loc: SrcLocation,
}

impl Directive {
    #[must_use]
    pub fn new(kind: DirectiveKind, relation: impl Into<QualifiedName>, loc: SrcLocation) -> Self {
        Directive {
            kind,
            relation: relation.into(),
            params: IndexMap::new(),
            loc,
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}
