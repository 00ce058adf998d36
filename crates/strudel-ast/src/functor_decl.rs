//! User-defined functor declarations.

use strudel_common::span::SrcLocation;

use crate::relation::Attribute;

/// Declaration of an externally bound functor: name, typed parameters,
/// return type and whether the implementation keeps evaluation state.
#[derive(Clone, Debug)]
pub struct FunctorDeclaration {
    pub name: String,
    pub params: Vec<Attribute>,
    pub return_type: Attribute,
    pub stateful: bool,
    pub loc: SrcLocation,
}

impl FunctorDeclaration {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        params: Vec<Attribute>,
        return_type: Attribute,
        loc: SrcLocation,
    ) -> Self {
        FunctorDeclaration {
            name: name.into(),
            params,
            return_type,
            stateful: false,
            loc,
        }
    }

    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}
