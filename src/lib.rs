//! Self-balancing ordered search trees that record every structural change they make.
//!
//! Five engines share one contract, [`SearchTree`]:
//!
//! - [`AvlTree`]: height-balanced; rebalances with LL/LR/RR/RL rotations.
//! - [`RedBlackTree`]: color-balanced; CLRS insert and delete fixups.
//! - [`SplayTree`]: access-balanced; every access splays a node to the root.
//! - [`TwoThreeTree`]: multiway tree with 1-2 keys per node, split/borrow/merge repairs.
//! - [`BTree`]: multiway tree of configurable minimum degree `t`, splitting full nodes and topping
//!   up minimal ones on the way down.
//!
//! Each mutating or searching call starts a fresh [`Trace`]: the rotations, recolors, splits,
//! merges, borrows and splay joins it performed, in execution order, each followed by a
//! [`Hierarchy`] frame of the whole tree as it stood right after that event. Renderers consume the trace with
//! [`SearchTree::take_trace`] and never touch engine internals.
//!
//! The `with_*` methods are copy-on-write: they clone the engine (node ids are preserved, never
//! renumbered), apply the operation to the clone and hand back a [`Revision`], leaving the
//! receiver untouched.
//!
//! ```
//! use steptree::{AvlTree, SearchTree, Tag};
//!
//! let mut tree = AvlTree::<u32>::new();
//! tree.insert(10).unwrap();
//! tree.insert(20).unwrap();
//!
//! let next = tree.with_inserted(30).unwrap();
//! assert_eq!(next.trace.rotations().next().map(|e| e.tag()), Some(Tag::Rr));
//! assert_eq!(next.tree.keys(), vec![10, 20, 30]);
//! assert_eq!(tree.len(), 2);
//! ```

use core::fmt;

use serde::Serialize;

mod arena;
mod binary;
mod iter;
mod multiway;

pub mod avl;
pub mod btree;
pub mod compare;
pub mod config;
pub mod debug;
pub mod error;
pub mod id;
pub mod red_black;
pub mod snapshot;
pub mod splay;
pub mod trace;
pub mod two_three;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

pub use avl::AvlTree;
pub use binary::Dir;
pub use btree::BTree;
pub use compare::{Comparator, FnComparator, NaturalOrder};
pub use config::TreeConfig;
pub use error::{Result, TreeError};
pub use id::{IdAllocator, NodeId};
pub use red_black::RedBlackTree;
pub use snapshot::{Hierarchy, HierarchyNode, NodeMeta, Payload, Traversal, Visit};
pub use splay::SplayTree;
pub use trace::{Color, Event, Step, Tag, Trace};
pub use two_three::TwoThreeTree;

/// Outcome of a successful insert.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Inserted {
    /// Node holding the key once the operation completed
    pub id: NodeId,
    /// `false` when the key was already present (splay re-access)
    pub created: bool,
}

/// Outcome of a successful delete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Removed<K> {
    pub key: K,
    /// Node the key physically left; freed for binary engines
    pub removed: NodeId,
    /// Node whose payload was overwritten by a replacement key
    pub overwritten: Option<NodeId>,
}

/// Outcome of a search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Search {
    pub found: bool,
    pub node: Option<NodeId>,
    /// Nodes visited, root first
    pub path: Vec<NodeId>,
}

/// A tree produced by a copy-on-write operation, with that operation's result and trace.
#[derive(Clone, Debug)]
pub struct Revision<T: SearchTree, R> {
    pub tree: T,
    pub result: R,
    pub trace: Trace<T::Key>,
}

/// Operations shared by every engine.
pub trait SearchTree: Clone {
    type Key: Clone + fmt::Debug;

    /// Number of keys stored.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ceiling on [`len`](Self::len).
    fn capacity(&self) -> usize;

    /// Inserts `key`.
    ///
    /// Fails with [`TreeError::CapacityExceeded`] or [`TreeError::DuplicateKey`] before changing
    /// anything.
    fn insert(&mut self, key: Self::Key) -> Result<Inserted>;

    /// Deletes `key`.
    ///
    /// Fails with [`TreeError::EmptyStructure`] or [`TreeError::KeyNotFound`] before changing
    /// anything.
    fn delete(&mut self, key: &Self::Key) -> Result<Removed<Self::Key>>;

    /// Looks `key` up. Engines that reorganize on access do so here.
    fn search(&mut self, key: &Self::Key) -> Search;

    /// Looks `key` up without reorganizing or tracing.
    fn contains(&self, key: &Self::Key) -> bool;

    /// Removes every key. The comparator and configuration are kept.
    fn clear(&mut self);

    fn root_id(&self) -> Option<NodeId>;

    /// Snapshot of the current shape.
    fn hierarchy(&self) -> Hierarchy<Self::Key>;

    /// Visits every key in the given order. Fails with [`TreeError::EmptyStructure`] on an empty
    /// tree.
    fn traversal(&self, order: Traversal) -> Result<Vec<Visit<Self::Key>>>;

    /// All keys in ascending order.
    fn keys(&self) -> Vec<Self::Key>;

    fn min(&self) -> Result<Self::Key>;

    fn max(&self) -> Result<Self::Key>;

    /// The trace of the last operation.
    fn trace(&self) -> &Trace<Self::Key>;

    /// Hands over the trace of the last operation, leaving an empty one behind.
    fn take_trace(&mut self) -> Trace<Self::Key>;

    /// Checks the engine's structural invariants.
    fn validate(&self) -> Result<()>;

    /// Copy-on-write [`insert`](Self::insert).
    fn with_inserted(&self, key: Self::Key) -> Result<Revision<Self, Inserted>> {
        let mut tree = self.clone();
        let result = tree.insert(key)?;
        let trace = tree.take_trace();
        Ok(Revision {
            tree,
            result,
            trace,
        })
    }

    /// Copy-on-write [`delete`](Self::delete).
    fn with_deleted(&self, key: &Self::Key) -> Result<Revision<Self, Removed<Self::Key>>> {
        let mut tree = self.clone();
        let result = tree.delete(key)?;
        let trace = tree.take_trace();
        Ok(Revision {
            tree,
            result,
            trace,
        })
    }

    /// Copy-on-write [`search`](Self::search).
    fn with_searched(&self, key: &Self::Key) -> Revision<Self, Search> {
        let mut tree = self.clone();
        let result = tree.search(key);
        let trace = tree.take_trace();
        Revision {
            tree,
            result,
            trace,
        }
    }
}
