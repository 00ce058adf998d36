//! Node identity.
//!
//! Analyses store their per-node results in maps keyed by `NodeId`. Ids
//! are unique for the lifetime of the process; deep-cloning a subtree
//! allocates fresh ids for every node in the copy, so a clone never
//! aliases the analysis results of its original. Results keyed by ids are
//! only valid until the next structural rewrite of the tree they were
//! computed from.

use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of an AST node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Allocate a fresh, process-unique id.
    #[must_use]
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}
