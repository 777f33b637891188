//! 2-3 tree engine: every internal node has one key and two children or two keys and three
//! children, and all leaves sit at the same depth.
//!
//! Repairs run bottom-up. An insertion that leaves a node with three keys splits it and pushes
//! the middle key into the parent, possibly all the way to a new root. A deletion that leaves a
//! node without keys borrows through the parent from a sibling holding two keys, or merges with a
//! sibling and pulls the separator down, possibly emptying the parent in turn.

use core::{fmt, mem};

use tracing::{debug, instrument};

use crate::{
    compare::{Comparator, NaturalOrder},
    multiway::Multi,
    snapshot::{Hierarchy, Traversal, Visit},
    trace::{Event, Tag, Trace},
    IdAllocator, Inserted, NodeId, Removed, Result, Search, SearchTree, TreeConfig, TreeError,
};

const MAX_KEYS: usize = 2;

#[derive(Clone, Debug)]
pub struct TwoThreeTree<K, C = NaturalOrder> {
    tree: Multi<K, ()>,
    cmp: C,
    config: TreeConfig,
    ids: IdAllocator,
    trace: Trace<K>,
}

impl<K: Clone> TwoThreeTree<K> {
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self::with_comparator(NaturalOrder, config)
    }
}

impl<K: Clone> Default for TwoThreeTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, C> TwoThreeTree<K, C> {
    pub fn with_comparator(cmp: C, config: TreeConfig) -> Self {
        TwoThreeTree {
            tree: Multi::new(),
            cmp,
            config,
            ids: IdAllocator::new(),
            trace: Trace::default(),
        }
    }

    /// Number of levels; 0 when empty.
    pub fn height(&self) -> usize {
        self.tree.height()
    }
}

impl<K, C> TwoThreeTree<K, C>
where
    K: Clone + fmt::Debug,
    C: Comparator<K>,
{
    fn emit(&mut self, event: Event<K>) {
        let frame = self.config.record_frames.then(|| self.tree.hierarchy());
        self.trace.push(event, frame);
    }
}

impl<K, C> SearchTree for TwoThreeTree<K, C>
where
    K: Clone + fmt::Debug,
    C: Comparator<K> + Clone,
{
    type Key = K;

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn capacity(&self) -> usize {
        self.config.capacity
    }

    #[instrument(level = "debug", skip(self), fields(engine = "2-3"))]
    fn insert(&mut self, key: K) -> Result<Inserted> {
        self.trace.clear();

        if self.tree.len() >= self.config.capacity {
            debug!("insert rejected at capacity");
            return Err(TreeError::CapacityExceeded {
                capacity: self.config.capacity,
            });
        }

        let locate = self.tree.locate(&key, &self.cmp);
        if locate.found.is_some() {
            debug!("insert rejected for duplicate key");
            return Err(TreeError::duplicate(&key));
        }

        let mut path = locate.path;
        let Some((leaf, pos)) = path.pop() else {
            let root = self.tree.plant(&mut self.ids, key, ());
            return Ok(Inserted {
                id: self.tree.id(root),
                created: true,
            });
        };

        let lookup = key.clone();
        self.tree.insert_at(leaf, pos, key, ());

        let mut cur = leaf;
        while self.tree.key_count(cur) > MAX_KEYS {
            let (parent, child_pos) = match path.pop() {
                Some(step) => step,
                None => (self.tree.grow(&mut self.ids), 0),
            };
            let event = self
                .tree
                .split_child(&mut self.ids, parent, child_pos, Tag::Overflow);
            self.emit(event);
            cur = parent;
        }

        let (holder, _) = self
            .tree
            .find(&lookup, &self.cmp)
            .expect("inserted key is reachable");
        Ok(Inserted {
            id: self.tree.id(holder),
            created: true,
        })
    }

    #[instrument(level = "debug", skip(self), fields(engine = "2-3"))]
    fn delete(&mut self, key: &K) -> Result<Removed<K>> {
        self.trace.clear();

        if self.tree.is_empty() {
            return Err(TreeError::EmptyStructure);
        }
        let locate = self.tree.locate(key, &self.cmp);
        let Some((holder, pos)) = locate.found else {
            debug!("delete rejected for missing key");
            return Err(TreeError::not_found(key));
        };
        let mut path = locate.path;

        // An internal key is replaced by its predecessor, the last key of the rightmost leaf
        // under its left child. `path` then leads to that leaf.
        let (leaf, overwritten, key) = if self.tree.node(holder).is_leaf() {
            path.pop();
            let (key, ()) = self.tree.remove_at(holder, pos);
            (holder, None, key)
        } else {
            let mut cur = self.tree.child(holder, pos);
            while !self.tree.node(cur).is_leaf() {
                let last = self.tree.key_count(cur);
                path.push((cur, last));
                cur = self.tree.child(cur, last);
            }
            let last = self.tree.key_count(cur) - 1;
            let (pred, ()) = self.tree.remove_at(cur, last);
            let (key, ()) = self.tree.replace_at(holder, pos, pred, ());
            (cur, Some(self.tree.id(holder)), key)
        };
        let removed = self.tree.id(leaf);

        let mut cur = leaf;
        while self.tree.key_count(cur) == 0 {
            let Some((parent, i)) = path.pop() else {
                self.tree.collapse_root();
                break;
            };

            let siblings = self.tree.node(parent).children.len();
            let spare = |tree: &Multi<K, ()>, pos: usize| tree.key_count(tree.child(parent, pos)) > 1;

            let event = if i > 0 && spare(&self.tree, i - 1) {
                self.tree.borrow_from_left(parent, i, Tag::Underflow)
            } else if i + 1 < siblings && spare(&self.tree, i + 1) {
                self.tree.borrow_from_right(parent, i, Tag::Underflow)
            } else if i > 0 {
                self.tree.merge_children(parent, i - 1, Tag::Underflow)
            } else {
                self.tree.merge_children(parent, i, Tag::Underflow)
            };
            self.emit(event);
            cur = parent;
        }

        Ok(Removed {
            key,
            removed,
            overwritten,
        })
    }

    fn search(&mut self, key: &K) -> Search {
        self.trace.clear();
        let locate = self.tree.locate(key, &self.cmp);
        Search {
            found: locate.found.is_some(),
            node: locate.found.map(|(idx, _)| self.tree.id(idx)),
            path: self.tree.ids(&locate.path),
        }
    }

    fn contains(&self, key: &K) -> bool {
        self.tree.find(key, &self.cmp).is_some()
    }

    fn clear(&mut self) {
        self.tree.clear();
        self.trace.clear();
    }

    fn root_id(&self) -> Option<NodeId> {
        self.tree.link_id(self.tree.root)
    }

    fn hierarchy(&self) -> Hierarchy<K> {
        self.tree.hierarchy()
    }

    fn traversal(&self, order: Traversal) -> Result<Vec<Visit<K>>> {
        if self.tree.is_empty() {
            return Err(TreeError::EmptyStructure);
        }
        Ok(self.tree.traversal(order))
    }

    fn keys(&self) -> Vec<K> {
        self.tree.keys()
    }

    fn min(&self) -> Result<K> {
        self.tree.min().cloned().ok_or(TreeError::EmptyStructure)
    }

    fn max(&self) -> Result<K> {
        self.tree.max().cloned().ok_or(TreeError::EmptyStructure)
    }

    fn trace(&self) -> &Trace<K> {
        &self.trace
    }

    fn take_trace(&mut self) -> Trace<K> {
        mem::take(&mut self.trace)
    }

    fn validate(&self) -> Result<()> {
        self.tree
            .check(&self.cmp, 1, MAX_KEYS)
            .map_err(TreeError::violation)
    }
}
