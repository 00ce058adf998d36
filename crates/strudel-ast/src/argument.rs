//! Argument-bearing AST nodes.
//!
//! Arguments are the value-level terms of the language: variables,
//! constants, functor applications, record and branch initializers, type
//! casts, the `$` counter and aggregate expressions. Each node carries a
//! `NodeId` and a source location; `Clone` produces a deep copy with fresh
//! ids and the original locations.

use strudel_common::span::SrcLocation;

use crate::literal::Literal;
use crate::node::NodeId;
use crate::operators::{AggregateBaseOp, IntrinsicOp};
use crate::qualified_name::QualifiedName;

/// The kind a numeric lexeme is fixed to by a type suffix, or inferred to
/// by the solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumericKind {
    Signed,
    Unsigned,
    Float,
}

/// A named variable.
#[derive(Debug)]
pub struct Variable {
    pub id: NodeId,
    pub name: String,
    pub loc: SrcLocation,
}

impl Variable {
    #[must_use]
    pub fn new(name: impl Into<String>, loc: SrcLocation) -> Self {
        Variable {
            id: NodeId::fresh(),
            name: name.into(),
            loc,
        }
    }
}

impl Clone for Variable {
    fn clone(&self) -> Self {
        Variable {
            id: NodeId::fresh(),
            name: self.name.clone(),
            loc: self.loc.clone(),
        }
    }
}

/// An anonymous `_` variable; every occurrence is distinct.
#[derive(Debug)]
pub struct UnnamedVariable {
    pub id: NodeId,
    pub loc: SrcLocation,
}

impl UnnamedVariable {
    #[must_use]
    pub fn new(loc: SrcLocation) -> Self {
        UnnamedVariable {
            id: NodeId::fresh(),
            loc,
        }
    }
}

impl Clone for UnnamedVariable {
    fn clone(&self) -> Self {
        UnnamedVariable {
            id: NodeId::fresh(),
            loc: self.loc.clone(),
        }
    }
}

/// A numeric constant, kept as its raw lexeme until the solver fixes its
/// kind.
#[derive(Debug)]
pub struct NumericConstant {
    pub id: NodeId,
    pub lexeme: String,
    /// Kind imposed by an explicit type suffix, if any.
    pub fixed: Option<NumericKind>,
    pub loc: SrcLocation,
}

impl NumericConstant {
    #[must_use]
    pub fn new(lexeme: impl Into<String>, loc: SrcLocation) -> Self {
        NumericConstant {
            id: NodeId::fresh(),
            lexeme: lexeme.into(),
            fixed: None,
            loc,
        }
    }

    #[must_use]
    pub fn with_fixed_kind(mut self, kind: NumericKind) -> Self {
        self.fixed = Some(kind);
        self
    }
}

impl Clone for NumericConstant {
    fn clone(&self) -> Self {
        NumericConstant {
            id: NodeId::fresh(),
            lexeme: self.lexeme.clone(),
            fixed: self.fixed,
            loc: self.loc.clone(),
        }
    }
}

/// A string constant.
#[derive(Debug)]
pub struct StringConstant {
    pub id: NodeId,
    pub value: String,
    pub loc: SrcLocation,
}

impl StringConstant {
    #[must_use]
    pub fn new(value: impl Into<String>, loc: SrcLocation) -> Self {
        StringConstant {
            id: NodeId::fresh(),
            value: value.into(),
            loc,
        }
    }
}

impl Clone for StringConstant {
    fn clone(&self) -> Self {
        StringConstant {
            id: NodeId::fresh(),
            value: self.value.clone(),
            loc: self.loc.clone(),
        }
    }
}

/// The `nil` record constant.
#[derive(Debug)]
pub struct NilConstant {
    pub id: NodeId,
    pub loc: SrcLocation,
}

impl NilConstant {
    #[must_use]
    pub fn new(loc: SrcLocation) -> Self {
        NilConstant {
            id: NodeId::fresh(),
            loc,
        }
    }
}

impl Clone for NilConstant {
    fn clone(&self) -> Self {
        NilConstant {
            id: NodeId::fresh(),
            loc: self.loc.clone(),
        }
    }
}

/// The `$` auto-increment counter.
#[derive(Debug)]
pub struct Counter {
    pub id: NodeId,
    pub loc: SrcLocation,
}

impl Counter {
    #[must_use]
    pub fn new(loc: SrcLocation) -> Self {
        Counter {
            id: NodeId::fresh(),
            loc,
        }
    }
}

impl Clone for Counter {
    fn clone(&self) -> Self {
        Counter {
            id: NodeId::fresh(),
            loc: self.loc.clone(),
        }
    }
}

/// An intrinsic functor application.
#[derive(Debug)]
pub struct IntrinsicFunctor {
    pub id: NodeId,
    pub op: IntrinsicOp,
    pub args: Vec<Argument>,
    pub loc: SrcLocation,
}

impl IntrinsicFunctor {
    #[must_use]
    pub fn new(op: IntrinsicOp, args: Vec<Argument>, loc: SrcLocation) -> Self {
        IntrinsicFunctor {
            id: NodeId::fresh(),
            op,
            args,
            loc,
        }
    }
}

impl Clone for IntrinsicFunctor {
    fn clone(&self) -> Self {
        IntrinsicFunctor {
            id: NodeId::fresh(),
            op: self.op,
            args: self.args.clone(),
            loc: self.loc.clone(),
        }
    }
}

/// A user-defined functor application.
#[derive(Debug)]
pub struct UserDefinedFunctor {
    pub id: NodeId,
    pub name: String,
    pub args: Vec<Argument>,
    pub loc: SrcLocation,
}

impl UserDefinedFunctor {
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<Argument>, loc: SrcLocation) -> Self {
        UserDefinedFunctor {
            id: NodeId::fresh(),
            name: name.into(),
            args,
            loc,
        }
    }
}

impl Clone for UserDefinedFunctor {
    fn clone(&self) -> Self {
        UserDefinedFunctor {
            id: NodeId::fresh(),
            name: self.name.clone(),
            args: self.args.clone(),
            loc: self.loc.clone(),
        }
    }
}

/// An explicit cast `as(value, type)`.
#[derive(Debug)]
pub struct TypeCast {
    pub id: NodeId,
    pub target_type: QualifiedName,
    pub value: Box<Argument>,
    pub loc: SrcLocation,
}

impl TypeCast {
    #[must_use]
    pub fn new(target_type: QualifiedName, value: Argument, loc: SrcLocation) -> Self {
        TypeCast {
            id: NodeId::fresh(),
            target_type,
            value: Box::new(value),
            loc,
        }
    }
}

impl Clone for TypeCast {
    fn clone(&self) -> Self {
        TypeCast {
            id: NodeId::fresh(),
            target_type: self.target_type.clone(),
            value: self.value.clone(),
            loc: self.loc.clone(),
        }
    }
}

/// A record initializer `[a, b, ...]`.
#[derive(Debug)]
pub struct RecordInit {
    pub id: NodeId,
    pub args: Vec<Argument>,
    pub loc: SrcLocation,
}

impl RecordInit {
    #[must_use]
    pub fn new(args: Vec<Argument>, loc: SrcLocation) -> Self {
        RecordInit {
            id: NodeId::fresh(),
            args,
            loc,
        }
    }
}

impl Clone for RecordInit {
    fn clone(&self) -> Self {
        RecordInit {
            id: NodeId::fresh(),
            args: self.args.clone(),
            loc: self.loc.clone(),
        }
    }
}

/// An ADT branch initializer `$Constructor(a, b, ...)`.
#[derive(Debug)]
pub struct BranchInit {
    pub id: NodeId,
    pub constructor: String,
    pub args: Vec<Argument>,
    pub loc: SrcLocation,
}

impl BranchInit {
    #[must_use]
    pub fn new(constructor: impl Into<String>, args: Vec<Argument>, loc: SrcLocation) -> Self {
        BranchInit {
            id: NodeId::fresh(),
            constructor: constructor.into(),
            args,
            loc,
        }
    }
}

impl Clone for BranchInit {
    fn clone(&self) -> Self {
        BranchInit {
            id: NodeId::fresh(),
            constructor: self.constructor.clone(),
            args: self.args.clone(),
            loc: self.loc.clone(),
        }
    }
}

/// An aggregate expression `op target : { body }`.
///
/// `count` has no target expression; after the normalization passes the
/// target of every other aggregate is a plain variable.
#[derive(Debug)]
pub struct Aggregator {
    pub id: NodeId,
    pub op: AggregateBaseOp,
    pub target: Option<Box<Argument>>,
    pub body: Vec<Literal>,
    pub loc: SrcLocation,
}

impl Aggregator {
    #[must_use]
    pub fn new(
        op: AggregateBaseOp,
        target: Option<Argument>,
        body: Vec<Literal>,
        loc: SrcLocation,
    ) -> Self {
        Aggregator {
            id: NodeId::fresh(),
            op,
            target: target.map(Box::new),
            body,
            loc,
        }
    }

    /// The target expression, if any.
    #[must_use]
    pub fn target(&self) -> Option<&Argument> {
        self.target.as_deref()
    }

    /// The name of the target variable, if the target is a plain variable.
    #[must_use]
    pub fn target_variable(&self) -> Option<&str> {
        match self.target.as_deref() {
            Some(Argument::Variable(var)) => Some(&var.name),
            _ => None,
        }
    }
}

impl Clone for Aggregator {
    fn clone(&self) -> Self {
        Aggregator {
            id: NodeId::fresh(),
            op: self.op,
            target: self.target.clone(),
            body: self.body.clone(),
            loc: self.loc.clone(),
        }
    }
}

/// An argument node.
#[derive(Clone, Debug)]
pub enum Argument {
    Variable(Variable),
    UnnamedVariable(UnnamedVariable),
    NumericConstant(NumericConstant),
    StringConstant(StringConstant),
    NilConstant(NilConstant),
    Counter(Counter),
    IntrinsicFunctor(IntrinsicFunctor),
    UserDefinedFunctor(UserDefinedFunctor),
    TypeCast(TypeCast),
    RecordInit(RecordInit),
    BranchInit(BranchInit),
    Aggregator(Aggregator),
}

impl Argument {
    /// The identity of this node.
    #[must_use]
    pub fn id(&self) -> NodeId {
        match self {
            Argument::Variable(n) => n.id,
            Argument::UnnamedVariable(n) => n.id,
            Argument::NumericConstant(n) => n.id,
            Argument::StringConstant(n) => n.id,
            Argument::NilConstant(n) => n.id,
            Argument::Counter(n) => n.id,
            Argument::IntrinsicFunctor(n) => n.id,
            Argument::UserDefinedFunctor(n) => n.id,
            Argument::TypeCast(n) => n.id,
            Argument::RecordInit(n) => n.id,
            Argument::BranchInit(n) => n.id,
            Argument::Aggregator(n) => n.id,
        }
    }

    #[must_use]
    pub fn loc(&self) -> &SrcLocation {
        match self {
            Argument::Variable(n) => &n.loc,
            Argument::UnnamedVariable(n) => &n.loc,
            Argument::NumericConstant(n) => &n.loc,
            Argument::StringConstant(n) => &n.loc,
            Argument::NilConstant(n) => &n.loc,
            Argument::Counter(n) => &n.loc,
            Argument::IntrinsicFunctor(n) => &n.loc,
            Argument::UserDefinedFunctor(n) => &n.loc,
            Argument::TypeCast(n) => &n.loc,
            Argument::RecordInit(n) => &n.loc,
            Argument::BranchInit(n) => &n.loc,
            Argument::Aggregator(n) => &n.loc,
        }
    }

    /// Whether this is a constant term (constants, records/branches of
    /// constants, and casts of constants).
    #[must_use]
    pub fn is_constant(&self) -> bool {
        match self {
            Argument::NumericConstant(_)
            | Argument::StringConstant(_)
            | Argument::NilConstant(_) => true,
            Argument::TypeCast(cast) => cast.value.is_constant(),
            Argument::RecordInit(rec) => rec.args.iter().all(Argument::is_constant),
            Argument::BranchInit(branch) => branch.args.iter().all(Argument::is_constant),
            _ => false,
        }
    }

    /// Convenience constructor for a named variable.
    #[must_use]
    pub fn var(name: impl Into<String>) -> Argument {
        Argument::Variable(Variable::new(name, SrcLocation::unset()))
    }

    /// Convenience constructor for an anonymous variable.
    #[must_use]
    pub fn unnamed() -> Argument {
        Argument::UnnamedVariable(UnnamedVariable::new(SrcLocation::unset()))
    }

    /// Convenience constructor for a numeric constant.
    #[must_use]
    pub fn number(lexeme: impl Into<String>) -> Argument {
        Argument::NumericConstant(NumericConstant::new(lexeme, SrcLocation::unset()))
    }

    /// Convenience constructor for a string constant.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Argument {
        Argument::StringConstant(StringConstant::new(value, SrcLocation::unset()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_allocates_fresh_ids() {
        let arg = Argument::var("x");
        let copy = arg.clone();
        assert_ne!(arg.id(), copy.id());
    }

    #[test]
    fn clone_preserves_locations() {
        let loc = SrcLocation::new(
            "f.dl",
            strudel_common::span::Position::new(4, 2),
            strudel_common::span::Position::new(4, 3),
        );
        let arg = Argument::Variable(Variable::new("x", loc.clone()));
        let copy = arg.clone();
        assert_eq!(copy.loc(), &loc);
    }

    #[test]
    fn constant_terms() {
        assert!(Argument::number("1").is_constant());
        assert!(Argument::string("a").is_constant());
        assert!(!Argument::var("x").is_constant());

        let rec = Argument::RecordInit(RecordInit::new(
            vec![Argument::number("1"), Argument::number("2")],
            SrcLocation::unset(),
        ));
        assert!(rec.is_constant());

        let rec = Argument::RecordInit(RecordInit::new(
            vec![Argument::number("1"), Argument::var("x")],
            SrcLocation::unset(),
        ));
        assert!(!rec.is_constant());
    }
}
