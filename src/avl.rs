//! Height-balanced (AVL) engine.
//!
//! After every structural change the engine walks from the touched node to the root,
//! recomputing heights. The first ancestor whose balance factor leaves `-1..=1` gets exactly one
//! rebalancing action, selected by the sign of its own balance factor and that of its heavier
//! child:
//!
//! | node | child       | action                                 | tag  |
//! |------|-------------|----------------------------------------|------|
//! | `> 1`  | left `>= 0` | rotate right at node                 | `Ll` |
//! | `> 1`  | left `< 0`  | rotate left at child, right at node  | `Lr` |
//! | `< -1` | right `<= 0`| rotate left at node                  | `Rr` |
//! | `< -1` | right `> 0` | rotate right at child, left at node  | `Rl` |

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
pub(crate) struct AvlNode<K> {
    id: NodeId,
    key: K,
    height: u32,
    links: Links,
}

impl<K: Clone> BinaryNode for AvlNode<K> {
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
pub struct AvlTree<K, C = NaturalOrder> {
    tree: Bst<AvlNode<K>>,
    cmp: C,
    config: TreeConfig,
    ids: IdAllocator,
    trace: Trace<K>,
    last_rotation: Option<(Tag, NodeId)>,
}

impl<K: Clone> AvlTree<K> {
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self::with_comparator(NaturalOrder, config)
    }
}

impl<K: Clone> Default for AvlTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, C> AvlTree<K, C> {
    pub fn with_comparator(cmp: C, config: TreeConfig) -> Self {
        AvlTree {
            tree: Bst::new(),
            cmp,
            config,
            ids: IdAllocator::new(),
            trace: Trace::default(),
            last_rotation: None,
        }
    }

    /// Height of the tree; 0 when empty.
    pub fn height(&self) -> u32 {
        self.height_of(self.tree.root)
    }

    /// Keys in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        self.tree.iter().map(|n| &n.key)
    }

    /// Kind and pivot of the most recent rotation, kept across operations.
    pub fn last_rotation(&self) -> Option<(Tag, NodeId)> {
        self.last_rotation
    }

    #[inline]
    fn height_of(&self, link: Link) -> u32 {
        link.map(|idx| self.tree.node(idx).height).unwrap_or(0)
    }

    fn balance(&self, idx: Idx) -> i32 {
        self.height_of(self.tree.left(idx)) as i32 - self.height_of(self.tree.right(idx)) as i32
    }

    fn update_height(&mut self, idx: Idx) {
        let height =
            1 + self
                .height_of(self.tree.left(idx))
                .max(self.height_of(self.tree.right(idx)));
        self.tree.node_mut(idx).height = height;
    }

    fn meta(tree: &Bst<AvlNode<K>>, idx: Idx) -> Option<NodeMeta> {
        let height = |link: Link| link.map(|i| tree.node(i).height).unwrap_or(0);
        Some(NodeMeta::Avl {
            height: tree.node(idx).height,
            balance: height(tree.left(idx)) as i32 - height(tree.right(idx)) as i32,
        })
    }
}

impl<K, C> AvlTree<K, C>
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

    // Rotates at `node` so it moves down in direction `dir`, refreshing both heights. Returns
    // the new subtree root.
    fn rotate(&mut self, node: Idx, dir: Dir, tag: Tag, step: Step) -> Idx {
        let pivot = self.tree.rotate(node, dir);
        self.update_height(pivot.down);
        self.update_height(pivot.up);
        self.last_rotation = Some((tag, self.tree.id(pivot.down)));
        let event = self.tree.rotation_event(pivot, tag, step);
        self.emit(event);
        pivot.up
    }

    // Applies at most one rebalancing action at `node` and returns the root of its subtree.
    fn rebalance(&mut self, node: Idx) -> Idx {
        let bf = self.balance(node);

        if bf > 1 {
            let left = self
                .tree
                .left(node)
                .expect("left-heavy node has a left child");
            if self.balance(left) >= 0 {
                self.rotate(node, Dir::Right, Tag::Ll, Step::Single)
            } else {
                self.rotate(left, Dir::Left, Tag::Lr, Step::First);
                self.rotate(node, Dir::Right, Tag::Lr, Step::Second)
            }
        } else if bf < -1 {
            let right = self
                .tree
                .right(node)
                .expect("right-heavy node has a right child");
            if self.balance(right) <= 0 {
                self.rotate(node, Dir::Left, Tag::Rr, Step::Single)
            } else {
                self.rotate(right, Dir::Right, Tag::Rl, Step::First);
                self.rotate(node, Dir::Left, Tag::Rl, Step::Second)
            }
        } else {
            node
        }
    }

    // Walks from `start` to the root, refreshing heights and rebalancing each ancestor.
    fn retrace(&mut self, start: Link) {
        let mut opt_cur = start;
        while let Some(cur) = opt_cur {
            self.update_height(cur);
            let top = self.rebalance(cur);
            opt_cur = self.tree.parent(top);
        }
    }

    fn check_heights(&self, link: Link) -> core::result::Result<u32, String> {
        let Some(idx) = link else {
            return Ok(0);
        };
        let left = self.check_heights(self.tree.left(idx))?;
        let right = self.check_heights(self.tree.right(idx))?;
        let node = self.tree.node(idx);

        if left.abs_diff(right) > 1 {
            return Err(format!(
                "node {} has balance factor {}",
                node.id,
                left as i64 - right as i64
            ));
        }
        let expected = 1 + left.max(right);
        if node.height != expected {
            return Err(format!(
                "node {} caches height {} but has height {expected}",
                node.id, node.height
            ));
        }
        Ok(expected)
    }
}

impl<K, C> SearchTree for AvlTree<K, C>
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

    #[instrument(level = "debug", skip(self), fields(engine = "avl"))]
    fn insert(&mut self, key: K) -> Result<Inserted> {
        self.trace.clear();

        if self.tree.len() >= self.config.capacity {
            debug!("insert rejected at capacity");
            return Err(TreeError::CapacityExceeded {
                capacity: self.config.capacity,
            });
        }

        let probe = self.tree.probe(&key, &self.cmp);
        if probe.found.is_some() {
            debug!("insert rejected for duplicate key");
            return Err(TreeError::duplicate(&key));
        }

        let id = self.ids.allocate();
        let node = AvlNode {
            id,
            key,
            height: 1,
            links: Links::default(),
        };
        self.tree.attach(probe.last, probe.dir, node);
        self.retrace(probe.last);

        Ok(Inserted { id, created: true })
    }

    #[instrument(level = "debug", skip(self), fields(engine = "avl"))]
    fn delete(&mut self, key: &K) -> Result<Removed<K>> {
        self.trace.clear();

        if self.tree.is_empty() {
            return Err(TreeError::EmptyStructure);
        }
        let Some(target) = self.tree.find(key, &self.cmp) else {
            debug!("delete rejected for missing key");
            return Err(TreeError::not_found(key));
        };

        // With two children the in-order predecessor's key moves into `target` and the
        // predecessor, which has no right child, is unlinked instead.
        let (doomed, overwritten) = match (self.tree.left(target), self.tree.right(target)) {
            (Some(left), Some(_)) => {
                let pred = self.tree.max_in_subtree(left);
                (pred, Some(target))
            }
            _ => (target, None),
        };

        let child = self.tree.left(doomed).or(self.tree.right(doomed));
        let parent = self.tree.parent(doomed);
        self.tree.replace_child_or_set_root(parent, doomed, child);
        let mut node = self.tree.release(doomed);

        if let Some(target) = overwritten {
            mem::swap(&mut self.tree.node_mut(target).key, &mut node.key);
        }

        self.retrace(parent);

        Ok(Removed {
            key: node.key,
            removed: node.id,
            overwritten: overwritten.map(|idx| self.tree.id(idx)),
        })
    }

    fn search(&mut self, key: &K) -> Search {
        self.trace.clear();
        let probe = self.tree.probe(key, &self.cmp);
        Search {
            found: probe.found.is_some(),
            node: self.tree.link_id(probe.found),
            path: self.tree.ids(&probe.path),
        }
    }

    fn contains(&self, key: &K) -> bool {
        self.tree.find(key, &self.cmp).is_some()
    }

    fn clear(&mut self) {
        self.tree.clear();
        self.trace.clear();
        self.last_rotation = None;
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
            .map_err(TreeError::violation)?;
        self.check_heights(self.tree.root)
            .map_err(TreeError::violation)?;
        Ok(())
    }
}
