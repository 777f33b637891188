//! B-tree engine of configurable minimum degree `t`.
//!
//! Every node but the root holds `t - 1..=2t - 1` keys, each paired with a value. Both mutations
//! make a single pass from the root:
//!
//! - insertion splits every full node it is about to enter, so the leaf it reaches has room;
//! - deletion tops up every minimal child it is about to enter (borrowing from a sibling with a
//!   spare key, or merging with one), so the node it removes from can afford to lose a key.
//!
//! A key found in an internal node is replaced by its predecessor or successor when the child on
//! that side can spare one; otherwise the two children merge around it and the deletion carries
//! on in the merged node.

use core::{cmp::Ordering, fmt, mem};

use tracing::{debug, instrument};

use crate::{
    arena::Idx,
    compare::{Comparator, NaturalOrder},
    multiway::Multi,
    snapshot::{Hierarchy, Traversal, Visit},
    trace::{Event, Tag, Trace},
    IdAllocator, Inserted, NodeId, Removed, Result, Search, SearchTree, TreeConfig, TreeError,
};

#[derive(Clone, Debug)]
pub struct BTree<K, V = (), C = NaturalOrder> {
    tree: Multi<K, V>,
    cmp: C,
    config: TreeConfig,
    ids: IdAllocator,
    trace: Trace<K>,
}

// What a deletion pass is looking for in the current subtree.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Goal {
    Key,
    Predecessor,
    Successor,
}

impl<K: Clone, V> BTree<K, V> {
    /// An empty tree with the default configuration (`t = 2`).
    pub fn new() -> Self {
        Self::build(NaturalOrder, TreeConfig::default())
    }

    /// Fails with [`TreeError::InvalidConfig`] if `config.min_degree < 2`.
    pub fn with_config(config: TreeConfig) -> Result<Self> {
        Self::with_comparator(NaturalOrder, config)
    }
}

impl<K: Clone, V> Default for BTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V, C> BTree<K, V, C> {
    pub fn with_comparator(cmp: C, config: TreeConfig) -> Result<Self> {
        config.check_degree()?;
        Ok(Self::build(cmp, config))
    }

    fn build(cmp: C, config: TreeConfig) -> Self {
        BTree {
            tree: Multi::new(),
            cmp,
            config,
            ids: IdAllocator::new(),
            trace: Trace::default(),
        }
    }

    pub fn min_degree(&self) -> usize {
        self.config.min_degree
    }

    /// Number of levels; 0 when empty.
    pub fn height(&self) -> usize {
        self.tree.height()
    }
}

impl<K, V, C> BTree<K, V, C>
where
    K: Clone + fmt::Debug,
    C: Comparator<K>,
{
    pub fn get(&self, key: &K) -> Option<&V> {
        let (idx, pos) = self.tree.find(key, &self.cmp)?;
        Some(&self.tree.node(idx).values[pos])
    }

    fn emit(&mut self, event: Event<K>) {
        let frame = self.config.record_frames.then(|| self.tree.hierarchy());
        self.trace.push(event, frame);
    }

    /// Inserts `key` with its value.
    #[instrument(level = "debug", skip(self, value), fields(engine = "btree"))]
    pub fn insert_value(&mut self, key: K, value: V) -> Result<Inserted> {
        self.trace.clear();

        if self.tree.len() >= self.config.capacity {
            debug!("insert rejected at capacity");
            return Err(TreeError::CapacityExceeded {
                capacity: self.config.capacity,
            });
        }
        if self.tree.find(&key, &self.cmp).is_some() {
            debug!("insert rejected for duplicate key");
            return Err(TreeError::duplicate(&key));
        }

        let Some(root) = self.tree.root else {
            let root = self.tree.plant(&mut self.ids, key, value);
            return Ok(Inserted {
                id: self.tree.id(root),
                created: true,
            });
        };

        let max_keys = self.config.max_keys();
        if self.tree.key_count(root) == max_keys {
            let top = self.tree.grow(&mut self.ids);
            let event = self.tree.split_child(&mut self.ids, top, 0, Tag::Presplit);
            self.emit(event);
        }

        let mut cur = self.tree.root.expect("tree is not empty");
        loop {
            let mut pos = match self.tree.search_node(cur, &key, &self.cmp) {
                Ok(_) => unreachable!("duplicate keys are rejected up front"),
                Err(pos) => pos,
            };

            if self.tree.node(cur).is_leaf() {
                self.tree.insert_at(cur, pos, key, value);
                return Ok(Inserted {
                    id: self.tree.id(cur),
                    created: true,
                });
            }

            if self.tree.key_count(self.tree.child(cur, pos)) == max_keys {
                let event = self.tree.split_child(&mut self.ids, cur, pos, Tag::Presplit);
                self.emit(event);
                if self.cmp.compare(&key, &self.tree.node(cur).keys[pos]) == Ordering::Greater {
                    pos += 1;
                }
            }
            cur = self.tree.child(cur, pos);
        }
    }

    /// Deletes `key`, returning its value along with the outcome.
    #[instrument(level = "debug", skip(self), fields(engine = "btree"))]
    pub fn remove_entry(&mut self, key: &K) -> Result<(Removed<K>, V)> {
        self.trace.clear();

        if self.tree.is_empty() {
            return Err(TreeError::EmptyStructure);
        }
        if self.tree.find(key, &self.cmp).is_none() {
            debug!("delete rejected for missing key");
            return Err(TreeError::not_found(key));
        }

        let t = self.config.min_degree;
        let mut goal = Goal::Key;
        // Internal slot that receives the predecessor or successor once it is taken out.
        let mut holder: Option<(Idx, usize)> = None;
        let mut cur = self.tree.root.expect("tree is not empty");

        loop {
            if self.tree.node(cur).is_leaf() {
                let pos = match goal {
                    Goal::Key => self
                        .tree
                        .search_node(cur, key, &self.cmp)
                        .expect("the key's leaf is reached"),
                    Goal::Predecessor => self.tree.key_count(cur) - 1,
                    Goal::Successor => 0,
                };
                let removed = self.tree.id(cur);
                let (taken_key, taken_value) = self.tree.remove_at(cur, pos);

                let (key, value, overwritten) = match holder {
                    Some((slot, slot_pos)) => {
                        let (key, value) =
                            self.tree.replace_at(slot, slot_pos, taken_key, taken_value);
                        (key, value, Some(self.tree.id(slot)))
                    }
                    None => (taken_key, taken_value, None),
                };
                self.tree.collapse_root();

                return Ok((
                    Removed {
                        key,
                        removed,
                        overwritten,
                    },
                    value,
                ));
            }

            let pos = match goal {
                Goal::Predecessor => self.tree.key_count(cur),
                Goal::Successor => 0,
                Goal::Key => match self.tree.search_node(cur, key, &self.cmp) {
                    Err(pos) => pos,
                    Ok(pos) => {
                        let left = self.tree.child(cur, pos);
                        let right = self.tree.child(cur, pos + 1);

                        if self.tree.key_count(left) >= t {
                            holder = Some((cur, pos));
                            goal = Goal::Predecessor;
                            cur = left;
                        } else if self.tree.key_count(right) >= t {
                            holder = Some((cur, pos));
                            goal = Goal::Successor;
                            cur = right;
                        } else {
                            let event = self.tree.merge_children(cur, pos, Tag::Internal);
                            self.emit(event);
                            self.tree.collapse_root();
                            cur = left;
                        }
                        continue;
                    }
                },
            };

            cur = self.top_up(cur, pos, t);
        }
    }

    // Makes sure child `pos` of `parent` holds at least `t` keys before the deletion pass enters
    // it, and returns the node to enter.
    fn top_up(&mut self, parent: Idx, pos: usize, t: usize) -> Idx {
        let child = self.tree.child(parent, pos);
        if self.tree.key_count(child) >= t {
            return child;
        }

        let siblings = self.tree.node(parent).children.len();
        let spare = |tree: &Multi<K, V>, pos: usize| tree.key_count(tree.child(parent, pos)) >= t;

        let (event, next) = if pos > 0 && spare(&self.tree, pos - 1) {
            (self.tree.borrow_from_left(parent, pos, Tag::TopUp), child)
        } else if pos + 1 < siblings && spare(&self.tree, pos + 1) {
            (self.tree.borrow_from_right(parent, pos, Tag::TopUp), child)
        } else if pos + 1 < siblings {
            (self.tree.merge_children(parent, pos, Tag::TopUp), child)
        } else {
            let left = self.tree.child(parent, pos - 1);
            (self.tree.merge_children(parent, pos - 1, Tag::TopUp), left)
        };
        self.emit(event);
        self.tree.collapse_root();
        next
    }
}

impl<K, V, C> SearchTree for BTree<K, V, C>
where
    K: Clone + fmt::Debug,
    V: Clone + Default,
    C: Comparator<K> + Clone,
{
    type Key = K;

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Inserts `key` with a default value.
    fn insert(&mut self, key: K) -> Result<Inserted> {
        self.insert_value(key, V::default())
    }

    fn delete(&mut self, key: &K) -> Result<Removed<K>> {
        self.remove_entry(key).map(|(removed, _)| removed)
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
        let t = self.config.min_degree;
        self.tree
            .check(&self.cmp, t - 1, self.config.max_keys())
            .map_err(TreeError::violation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::Dir;

    fn tree_of(t: usize, keys: impl IntoIterator<Item = u32>) -> BTree<u32> {
        let mut tree = BTree::with_config(TreeConfig::default().with_min_degree(t)).unwrap();
        for key in keys {
            tree.insert(key).unwrap();
            tree.validate().unwrap();
        }
        tree
    }

    fn root_keys<V: Clone + Default>(tree: &BTree<u32, V>) -> Vec<u32> {
        match tree.hierarchy() {
            Hierarchy::Node(node) => node.payload.keys().to_vec(),
            Hierarchy::Empty => Vec::new(),
        }
    }

    #[test]
    fn ascending_inserts_presplit_the_root() {
        let mut tree = tree_of(2, 1..=3);
        assert_eq!(root_keys(&tree), vec![1, 2, 3]);

        tree.insert(4).unwrap();
        assert_eq!(root_keys(&tree), vec![2]);
        let events = tree.trace().events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Event::Split {
                promoted: 2,
                tag: Tag::Presplit,
                ..
            }
        ));

        for key in 5..=7 {
            tree.insert(key).unwrap();
            tree.validate().unwrap();
        }
        assert_eq!(root_keys(&tree), vec![2, 4]);
        assert_eq!(tree.height(), 2);
    }

    #[test]
    fn rejects_degree_below_two() {
        let config = TreeConfig::default().with_min_degree(1);
        let tree: Result<BTree<u32>> = BTree::with_config(config);
        assert!(matches!(tree, Err(TreeError::InvalidConfig(_))));
    }

    #[test]
    fn values_follow_their_keys() {
        let mut tree: BTree<u32, String> = BTree::new();
        for key in 1..=20 {
            tree.insert_value(key, format!("v{key}")).unwrap();
        }
        assert_eq!(tree.get(&7).map(String::as_str), Some("v7"));
        assert_eq!(tree.get(&21), None);

        for key in [10, 4, 15, 1] {
            let (removed, value) = tree.remove_entry(&key).unwrap();
            assert_eq!(removed.key, key);
            assert_eq!(value, format!("v{key}"));
            tree.validate().unwrap();
        }
        for key in (1..=20).filter(|k| ![10, 4, 15, 1].contains(k)) {
            assert_eq!(tree.get(&key), Some(&format!("v{key}")));
        }
    }

    #[test]
    fn internal_key_takes_successor() {
        let mut tree = tree_of(2, 1..=7);
        let root = tree.root_id();
        let removed = tree.delete(&4).unwrap();

        assert_eq!(removed.key, 4);
        assert_eq!(removed.overwritten, root);
        assert_eq!(root_keys(&tree), vec![2, 5]);
        assert!(tree.trace().is_empty());
        tree.validate().unwrap();
    }

    #[test]
    fn internal_key_between_minimal_children_merges() {
        let mut tree = tree_of(2, 1..=4);
        tree.delete(&4).unwrap();
        assert_eq!(root_keys(&tree), vec![2]);

        tree.delete(&2).unwrap();
        let events = tree.trace().events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Event::Merge {
                separator: 2,
                tag: Tag::Internal,
                ..
            }
        ));
        assert_eq!(root_keys(&tree), vec![1, 3]);
        assert_eq!(tree.height(), 1);
        tree.validate().unwrap();
    }

    #[test]
    fn minimal_child_borrows_before_descent() {
        let mut tree = tree_of(2, 1..=7);
        tree.delete(&3).unwrap();

        let events = tree.trace().events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Event::Borrow {
                key: 5,
                from: Dir::Right,
                tag: Tag::TopUp,
                ..
            }
        ));
        assert_eq!(root_keys(&tree), vec![2, 5]);
        assert_eq!(tree.keys(), vec![1, 2, 4, 5, 6, 7]);
        tree.validate().unwrap();
    }

    #[test]
    fn minimal_children_merge_and_root_shrinks() {
        let mut tree = tree_of(2, 1..=4);
        tree.delete(&4).unwrap();
        let old_root = tree.root_id();

        tree.delete(&1).unwrap();
        assert!(matches!(
            tree.trace().events(),
            [Event::Merge {
                tag: Tag::TopUp,
                ..
            }]
        ));
        assert_ne!(tree.root_id(), old_root);
        assert_eq!(root_keys(&tree), vec![2, 3]);

        tree.delete(&2).unwrap();
        tree.delete(&3).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.root_id(), None);
        tree.validate().unwrap();
    }

    #[test]
    fn larger_degree_stays_valid() {
        let keys: Vec<u32> = (0..200).map(|i| (i * 37) % 211).collect();
        let mut tree = tree_of(3, keys.iter().copied());
        assert_eq!(tree.min_degree(), 3);

        for key in keys.iter().step_by(2) {
            tree.delete(key).unwrap();
            tree.validate().unwrap();
        }
        let mut expected: Vec<u32> = keys.iter().skip(1).step_by(2).copied().collect();
        expected.sort_unstable();
        assert_eq!(tree.keys(), expected);
        assert_eq!(tree.min(), Ok(expected[0]));
        assert_eq!(tree.max(), Ok(expected[expected.len() - 1]));
    }
}
