//! Access-balanced (splay) engine.
//!
//! Every successful access rotates the touched node to the root. A splay step looks at the node,
//! its parent and its grandparent:
//!
//! - no grandparent: one rotation at the parent (`Zig`)
//! - node and parent on the same side: rotate the grandparent, then the parent (`ZigZig`)
//! - opposite sides: rotate the parent, then the grandparent (`ZigZag`)
//!
//! Deletion is split/join: the target is splayed to the root, the maximum of its left subtree is
//! splayed up to just below it, and the right subtree is hung off that maximum. Without a left
//! subtree the minimum of the right one is splayed up instead and replaces the target, so the new
//! root is always the deleted key's neighbor. The join is traced
//! as its own event, so the last frame of a delete matches the tree left behind.

use core::{fmt, mem};

use tracing::{debug, instrument};

use crate::{
    arena::{Idx, Link},
    binary::{BinaryNode, Bst, Dir, Links},
    compare::{Comparator, NaturalOrder},
    snapshot::{Hierarchy, NodeMeta, Traversal, Visit},
    trace::{Event, Step, Tag, Trace},
    IdAllocator, Inserted, NodeId, Removed, Result, Search, SearchTree, TreeConfig, TreeError,
};

#[derive(Clone, Debug)]
pub(crate) struct SplayNode<K> {
    id: NodeId,
    key: K,
    links: Links,
}

impl<K: Clone> BinaryNode for SplayNode<K> {
    type Key = K;

    fn id(&self) -> NodeId {
        self.id
    }

    fn key(&self) -> &K {
        &self.key
    }

    fn links(&self) -> &Links {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}

#[derive(Clone, Debug)]
pub struct SplayTree<K, C = NaturalOrder> {
    tree: Bst<SplayNode<K>>,
    cmp: C,
    config: TreeConfig,
    ids: IdAllocator,
    trace: Trace<K>,
}

impl<K: Clone> SplayTree<K> {
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self::with_comparator(NaturalOrder, config)
    }
}

impl<K: Clone> Default for SplayTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, C> SplayTree<K, C> {
    pub fn with_comparator(cmp: C, config: TreeConfig) -> Self {
        SplayTree {
            tree: Bst::new(),
            cmp,
            config,
            ids: IdAllocator::new(),
            trace: Trace::default(),
        }
    }

    /// Key at the root, which is the most recently accessed one.
    pub fn root_key(&self) -> Option<&K> {
        self.tree.root.map(|root| self.tree.key(root))
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        self.tree.iter().map(|n| &n.key)
    }

    fn meta(_: &Bst<SplayNode<K>>, _: Idx) -> Option<NodeMeta> {
        None
    }
}

impl<K, C> SplayTree<K, C>
where
    K: Clone + fmt::Debug,
    C: Comparator<K>,
{
    fn emit(&mut self, event: Event<K>) {
        let frame = self
            .config
            .record_frames
            .then(|| self.tree.hierarchy(Self::meta));
        self.trace.push(event, frame);
    }

    fn rotate(&mut self, node: Idx, dir: Dir, tag: Tag, step: Step) {
        let pivot = self.tree.rotate(node, dir);
        let event = self.tree.rotation_event(pivot, tag, step);
        self.emit(event);
    }

    fn splay(&mut self, x: Idx) {
        self.splay_until(x, None);
    }

    // Splays `x` until its parent is `stop`; `None` splays it to the root.
    fn splay_until(&mut self, x: Idx, stop: Link) {
        while let Some(p) = self.tree.parent(x).filter(|&p| Some(p) != stop) {
            let x_side = self.tree.which_child(p, Some(x));

            match self.tree.parent(p).filter(|&g| Some(g) != stop) {
                None => self.rotate(p, !x_side, Tag::Zig, Step::Single),
                Some(g) => {
                    let p_side = self.tree.which_child(g, Some(p));
                    if x_side == p_side {
                        self.rotate(g, !p_side, Tag::ZigZig, Step::First);
                        self.rotate(p, !x_side, Tag::ZigZig, Step::Second);
                    } else {
                        self.rotate(p, !x_side, Tag::ZigZag, Step::First);
                        self.rotate(g, !p_side, Tag::ZigZag, Step::Second);
                    }
                }
            }
        }
    }
}

impl<K, C> SearchTree for SplayTree<K, C>
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

    /// Inserts `key` and splays its node to the root.
    ///
    /// A key that is already present is splayed instead of rejected, and reported with
    /// `created == false`.
    #[instrument(level = "debug", skip(self), fields(engine = "splay"))]
    fn insert(&mut self, key: K) -> Result<Inserted> {
        self.trace.clear();

        let probe = self.tree.probe(&key, &self.cmp);
        if let Some(found) = probe.found {
            debug!("key already present, splaying it");
            self.splay(found);
            return Ok(Inserted {
                id: self.tree.id(found),
                created: false,
            });
        }

        if self.tree.len() >= self.config.capacity {
            debug!("insert rejected at capacity");
            return Err(TreeError::CapacityExceeded {
                capacity: self.config.capacity,
            });
        }

        let id = self.ids.allocate();
        let node = SplayNode {
            id,
            key,
            links: Links::default(),
        };
        let idx = self.tree.attach(probe.last, probe.dir, node);
        self.splay(idx);

        Ok(Inserted { id, created: true })
    }

    #[instrument(level = "debug", skip(self), fields(engine = "splay"))]
    fn delete(&mut self, key: &K) -> Result<Removed<K>> {
        self.trace.clear();

        if self.tree.is_empty() {
            return Err(TreeError::EmptyStructure);
        }
        let Some(target) = self.tree.find(key, &self.cmp) else {
            debug!("delete rejected for missing key");
            return Err(TreeError::not_found(key));
        };

        self.splay(target);
        debug_assert_eq!(self.tree.root, Some(target));

        let attached = match self.tree.left(target) {
            None => {
                // The successor rises to the top of the right subtree and takes over.
                if let Some(right) = self.tree.right(target) {
                    let min = self.tree.min_in_subtree(right);
                    self.splay_until(min, Some(target));
                    debug_assert_eq!(self.tree.left(min), None);
                }
                let right = self.tree.right(target);
                self.tree.replace_child_or_set_root(None, target, right);
                None
            }
            Some(left) => {
                let right = self.tree.right(target);
                let max = self.tree.max_in_subtree(left);
                self.splay_until(max, Some(target));
                debug_assert_eq!(self.tree.right(max), None);

                self.tree.set_child(max, Dir::Right, right);
                self.tree.maybe_set_parent(right, Some(max));
                self.tree.replace_child_or_set_root(None, target, Some(max));
                right
            }
        };

        let node = self.tree.release(target);
        let event = Event::Join {
            removed: node.id,
            key: node.key.clone(),
            root: self.tree.link_id(self.tree.root),
            attached: self.tree.link_id(attached),
            tag: Tag::SplitJoin,
        };
        self.emit(event);

        Ok(Removed {
            key: node.key,
            removed: node.id,
            overwritten: None,
        })
    }

    /// Looks `key` up and splays the node holding it, or the last node visited on a miss.
    fn search(&mut self, key: &K) -> Search {
        self.trace.clear();

        let probe = self.tree.probe(key, &self.cmp);
        let search = Search {
            found: probe.found.is_some(),
            node: self.tree.link_id(probe.found),
            path: self.tree.ids(&probe.path),
        };
        if let Some(last) = probe.last {
            self.splay(last);
        }
        search
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
        self.tree.hierarchy(Self::meta)
    }

    fn traversal(&self, order: Traversal) -> Result<Vec<Visit<K>>> {
        if self.tree.is_empty() {
            return Err(TreeError::EmptyStructure);
        }
        Ok(self.tree.traversal(order))
    }

    fn keys(&self) -> Vec<K> {
        self.tree.iter().map(|n| n.key.clone()).collect()
    }

    fn min(&self) -> Result<K> {
        let root = self.tree.root.ok_or(TreeError::EmptyStructure)?;
        Ok(self.tree.key(self.tree.min_in_subtree(root)).clone())
    }

    fn max(&self) -> Result<K> {
        let root = self.tree.root.ok_or(TreeError::EmptyStructure)?;
        Ok(self.tree.key(self.tree.max_in_subtree(root)).clone())
    }

    fn trace(&self) -> &Trace<K> {
        &self.trace
    }

    fn take_trace(&mut self) -> Trace<K> {
        mem::take(&mut self.trace)
    }

    fn validate(&self) -> Result<()> {
        self.tree
            .check_links(&self.cmp)
            .map_err(TreeError::violation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(keys: &[u32]) -> SplayTree<u32> {
        let mut tree = SplayTree::new();
        for &key in keys {
            tree.insert(key).unwrap();
            tree.validate().unwrap();
            assert_eq!(tree.root_key(), Some(&key));
        }
        tree
    }

    fn rotation_tags(trace: &Trace<u32>) -> Vec<(Tag, Step)> {
        trace
            .events()
            .iter()
            .filter_map(|e| match e {
                Event::Rotation { tag, step, .. } => Some((*tag, *step)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn miss_splays_last_visited() {
        let mut tree = tree_of(&[10, 20, 30, 40, 50, 60]);
        assert_eq!(tree.root_key(), Some(&60));

        let search = tree.search(&35);
        assert!(!search.found);
        assert_eq!(search.node, None);
        assert_eq!(search.path.len(), 4);
        assert_eq!(tree.root_key(), Some(&30));
        assert_eq!(tree.root_id(), search.path.last().copied());
        tree.validate().unwrap();
    }

    #[test]
    fn zig() {
        let mut tree = tree_of(&[1]);
        tree.insert(2).unwrap();
        assert_eq!(rotation_tags(tree.trace()), vec![(Tag::Zig, Step::Single)]);
        assert_eq!(tree.trace().frames().len(), 1);
    }

    #[test]
    fn zig_zig() {
        // Descending inserts leave a right-leaning chain 1 -> 2 -> 3.
        let mut tree = tree_of(&[3, 2, 1]);
        let search = tree.search(&3);

        assert!(search.found);
        assert_eq!(
            rotation_tags(tree.trace()),
            vec![(Tag::ZigZig, Step::First), (Tag::ZigZig, Step::Second)]
        );
        assert_eq!(tree.root_key(), Some(&3));
        let Event::Rotation { node, .. } = tree.trace().events()[0] else {
            panic!("expected a rotation");
        };
        // The grandparent rotates first.
        assert_eq!(Some(node), tree.traversal(Traversal::InOrder).unwrap().first().map(|v| v.id));
    }

    #[test]
    fn zig_zag() {
        let mut tree = tree_of(&[3, 1]);
        tree.insert(2).unwrap();
        assert_eq!(
            rotation_tags(tree.trace()),
            vec![(Tag::ZigZag, Step::First), (Tag::ZigZag, Step::Second)]
        );
        assert_eq!(tree.keys(), vec![1, 2, 3]);
        let order: Vec<u32> = tree
            .traversal(Traversal::PreOrder)
            .unwrap()
            .into_iter()
            .map(|v| v.value)
            .collect();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn reinsert_splays_existing() {
        let mut tree = tree_of(&[5, 3, 8, 1]);
        let before = tree.len();
        let inserted = tree.insert(8).unwrap();

        assert!(!inserted.created);
        assert_eq!(tree.len(), before);
        assert_eq!(tree.root_key(), Some(&8));
        assert_eq!(tree.root_id(), Some(inserted.id));
    }

    #[test]
    fn reinsert_ignores_capacity() {
        let mut tree: SplayTree<u32> = SplayTree::with_config(TreeConfig::default().with_capacity(1));
        tree.insert(4).unwrap();
        assert!(!tree.insert(4).unwrap().created);
        assert_eq!(
            tree.insert(5),
            Err(TreeError::CapacityExceeded { capacity: 1 })
        );
    }

    #[test]
    fn delete_joins_under_left_maximum() {
        let mut tree = tree_of(&[1, 2, 3, 4, 5, 6, 7]);
        let removed = tree.delete(&4).unwrap();

        assert_eq!(removed.key, 4);
        assert_eq!(removed.overwritten, None);
        assert_eq!(tree.root_key(), Some(&3));
        assert_eq!(tree.keys(), vec![1, 2, 3, 5, 6, 7]);
        tree.validate().unwrap();

        // Rotation frames still show the whole tree; the join frame is the final shape.
        let frames = tree.trace().frames();
        let (last, rotations) = frames.split_last().unwrap();
        for frame in rotations {
            assert_eq!(frame.node_count(), 7);
        }
        assert_eq!(last, &tree.hierarchy());

        let Some(Event::Join {
            key,
            root,
            attached,
            tag,
            ..
        }) = tree.trace().events().last()
        else {
            panic!("expected the join last");
        };
        assert_eq!((*key, *tag), (4, Tag::SplitJoin));
        assert_eq!(*root, tree.root_id());
        assert!(attached.is_some());
    }

    #[test]
    fn delete_of_minimum_promotes_successor() {
        // Splaying 1 leaves 7 as its right child, with 3 -> 5 hanging to the left of 7.
        let mut tree = tree_of(&[1, 5, 3, 7]);
        tree.search(&1);
        assert_eq!(tree.root_key(), Some(&1));
        assert_eq!(tree.tree.right(tree.tree.root.unwrap()).map(|r| *tree.tree.key(r)), Some(7));

        tree.delete(&1).unwrap();
        assert_eq!(tree.root_key(), Some(&3));
        assert_eq!(tree.keys(), vec![3, 5, 7]);
        assert_eq!(tree.trace().frames().last(), Some(&tree.hierarchy()));
        tree.validate().unwrap();
    }

    #[test]
    fn delete_trace_ends_on_the_result() {
        let mut tree = tree_of(&[3, 2, 1]);
        for key in [1, 3, 2] {
            tree.delete(&key).unwrap();
            let trace = tree.take_trace();
            assert!(matches!(trace.events().last(), Some(Event::Join { .. })));
            assert_eq!(trace.frames().last(), Some(&tree.hierarchy()));
            assert_eq!(trace.frames().len(), trace.len());
        }
        assert!(tree.is_empty());
    }

    #[test]
    fn delete_root_without_left_subtree() {
        let mut tree = tree_of(&[3, 2, 1]);
        tree.delete(&1).unwrap();
        assert_eq!(tree.root_key(), Some(&2));
        tree.delete(&2).unwrap();
        tree.delete(&3).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.root_key(), None);
        assert_eq!(tree.delete(&3), Err(TreeError::EmptyStructure));
    }

    #[test]
    fn failed_delete_keeps_shape() {
        let mut tree = tree_of(&[10, 20, 30, 40]);
        let before = tree.hierarchy();
        assert!(matches!(tree.delete(&25), Err(TreeError::KeyNotFound(_))));
        assert_eq!(tree.hierarchy(), before);
    }
}
