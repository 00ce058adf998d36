//! RAM statements.

use indexmap::IndexMap;

use crate::condition::Condition;
use crate::operation::Operation;

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// Run the children in order.
    Sequence(Vec<Statement>),
    /// The children may run concurrently.
    Parallel(Vec<Statement>),
    /// Repeat the body until an `Exit` fires.
    Loop(Box<Statement>),
    /// Leave the enclosing loop when the condition holds.
    Exit(Condition),
    /// Exchange the contents of two relations.
    Swap(String, String),
    /// Extend an equivalence relation with the pairs of another.
    Extend { target: String, source: String },
    /// Remove all tuples of a relation.
    Clear(String),
    /// Perform the IO operation described by the directive map.
    Io {
        relation: String,
        directives: IndexMap<String, String>,
    },
    /// Time the wrapped statement under the given log message.
    LogTimer {
        message: String,
        inner: Box<Statement>,
    },
    /// Time the wrapped statement and record the size of a relation.
    LogRelationTimer {
        message: String,
        relation: String,
        inner: Box<Statement>,
    },
    /// Log the size of a relation.
    LogSize { relation: String, message: String },
    /// Annotate the wrapped statement for debug reports.
    DebugInfo {
        message: String,
        inner: Box<Statement>,
    },
    /// Invoke a named subroutine.
    Call(String),
    /// Execute a tuple-operation nest.
    Query(Operation),
}

impl Statement {
    /// A sequence, flattening empty parts away.
    #[must_use]
    pub fn sequence(statements: Vec<Statement>) -> Statement {
        let mut flat = Vec::with_capacity(statements.len());
        for stmt in statements {
            match stmt {
                Statement::Sequence(children) if children.is_empty() => {}
                other => flat.push(other),
            }
        }
        Statement::Sequence(flat)
    }

    /// The direct child statements.
    #[must_use]
    pub fn children(&self) -> Vec<&Statement> {
        match self {
            Statement::Sequence(children) | Statement::Parallel(children) => {
                children.iter().collect()
            }
            Statement::Loop(inner)
            | Statement::LogTimer { inner, .. }
            | Statement::LogRelationTimer { inner, .. }
            | Statement::DebugInfo { inner, .. } => vec![inner],
            _ => Vec::new(),
        }
    }

    /// Rebuild this statement with every direct child passed through
    /// `f`.
    #[must_use]
    pub fn map_children(self, f: &mut impl FnMut(Statement) -> Statement) -> Statement {
        match self {
            Statement::Sequence(children) => {
                Statement::Sequence(children.into_iter().map(|c| f(c)).collect())
            }
            Statement::Parallel(children) => {
                Statement::Parallel(children.into_iter().map(|c| f(c)).collect())
            }
            Statement::Loop(inner) => Statement::Loop(Box::new(f(*inner))),
            Statement::LogTimer { message, inner } => Statement::LogTimer {
                message,
                inner: Box::new(f(*inner)),
            },
            Statement::LogRelationTimer {
                message,
                relation,
                inner,
            } => Statement::LogRelationTimer {
                message,
                relation,
                inner: Box::new(f(*inner)),
            },
            Statement::DebugInfo { message, inner } => Statement::DebugInfo {
                message,
                inner: Box::new(f(*inner)),
            },
            leaf => leaf,
        }
    }
}
