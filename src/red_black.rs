//! Color-balanced (red-black) engine.
//!
//! Insertion colors the new node red and repairs red-red violations bottom-up; deletion follows
//! the CLRS transplant scheme and repairs a missing black with the four sibling cases.
//!
//! A removed black leaf leaves a "doubly black" position that has no node. The fixup loop tracks
//! that position as the (possibly missing) node `x` together with its parent and the side of the
//! parent it hangs from, so the loop ends exactly when the position reaches the root (its parent
//! is `None`) or holds a red node.

use core::{fmt, mem};

use tracing::{debug, instrument};

use crate::{
    arena::{Idx, Link},
    binary::{BinaryNode, Bst, Dir, Links},
    compare::{Comparator, NaturalOrder},
    snapshot::{Hierarchy, NodeMeta, Traversal, Visit},
    trace::{Color, Event, Step, Tag, Trace},
    IdAllocator, Inserted, NodeId, Removed, Result, Search, SearchTree, TreeConfig, TreeError,
};

#[derive(Clone, Debug)]
pub(crate) struct RbNode<K> {
    id: NodeId,
    key: K,
    color: Color,
    links: Links,
}

impl<K: Clone> BinaryNode for RbNode<K> {
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
pub struct RedBlackTree<K, C = NaturalOrder> {
    tree: Bst<RbNode<K>>,
    cmp: C,
    config: TreeConfig,
    ids: IdAllocator,
    trace: Trace<K>,
}

impl<K: Clone> RedBlackTree<K> {
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self::with_comparator(NaturalOrder, config)
    }
}

impl<K: Clone> Default for RedBlackTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, C> RedBlackTree<K, C> {
    pub fn with_comparator(cmp: C, config: TreeConfig) -> Self {
        RedBlackTree {
            tree: Bst::new(),
            cmp,
            config,
            ids: IdAllocator::new(),
            trace: Trace::default(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        self.tree.iter().map(|n| &n.key)
    }

    /// Color of the node with the given id, if it is in the tree.
    pub fn color_of(&self, id: NodeId) -> Option<Color> {
        self.tree.iter().find(|n| n.id == id).map(|n| n.color)
    }

    /// Number of black nodes on any root-to-null path.
    pub fn black_height(&self) -> usize {
        let mut count = 0;
        let mut opt_cur = self.tree.root;
        while let Some(cur) = opt_cur {
            if self.tree.node(cur).color == Color::Black {
                count += 1;
            }
            opt_cur = self.tree.left(cur);
        }
        count
    }

    // Missing children count as black.
    #[inline]
    fn color(&self, link: Link) -> Color {
        link.map(|idx| self.tree.node(idx).color)
            .unwrap_or(Color::Black)
    }

    #[inline]
    fn is_red(&self, link: Link) -> bool {
        self.color(link) == Color::Red
    }

    fn meta(tree: &Bst<RbNode<K>>, idx: Idx) -> Option<NodeMeta> {
        Some(NodeMeta::RedBlack {
            color: tree.node(idx).color,
        })
    }
}

impl<K, C> RedBlackTree<K, C>
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

    fn paint(&mut self, idx: Idx, color: Color, tag: Tag) {
        let node = self.tree.node_mut(idx);
        if node.color == color {
            return;
        }
        node.color = color;
        let event = Event::Recolor {
            node: node.id,
            color,
            tag,
        };
        self.emit(event);
    }

    fn rotate(&mut self, node: Idx, dir: Dir, tag: Tag, step: Step) {
        let pivot = self.tree.rotate(node, dir);
        let event = self.tree.rotation_event(pivot, tag, step);
        self.emit(event);
    }

    fn insert_fixup(&mut self, mut z: Idx) {
        while let Some(mut p) = self.tree.parent(z).filter(|&p| self.is_red(Some(p))) {
            let g = self
                .tree
                .parent(p)
                .expect("a red node is never the root");
            let side = self.tree.which_child(g, Some(p));
            let uncle = self.tree.child(g, !side);

            if let Some(uncle) = uncle.filter(|&u| self.is_red(Some(u))) {
                self.paint(p, Color::Black, Tag::InsertFixup);
                self.paint(uncle, Color::Black, Tag::InsertFixup);
                self.paint(g, Color::Red, Tag::InsertFixup);
                z = g;
                continue;
            }

            let mut step = Step::Single;
            if self.tree.which_child(p, Some(z)) != side {
                // Triangle: lift `z` over `p` so the three form a line.
                self.rotate(p, side, Tag::InsertFixup, Step::First);
                (z, p) = (p, z);
                step = Step::Second;
            }
            debug_assert_eq!(self.tree.parent(z), Some(p));

            self.paint(p, Color::Black, Tag::InsertFixup);
            self.paint(g, Color::Red, Tag::InsertFixup);
            self.rotate(g, !side, Tag::InsertFixup, step);
            break;
        }

        if let Some(root) = self.tree.root {
            self.paint(root, Color::Black, Tag::InsertFixup);
        }
    }

    // `x` is the doubly black position: a node or a missing child hanging from `parent` on
    // `side`.
    fn delete_fixup(&mut self, mut x: Link, mut parent: Link, mut side: Dir) {
        while let Some(p) = parent {
            if self.is_red(x) {
                break;
            }

            let mut w = self
                .tree
                .child(p, !side)
                .expect("a doubly black position has a sibling");

            if self.is_red(Some(w)) {
                self.paint(w, Color::Black, Tag::DeleteFixup);
                self.paint(p, Color::Red, Tag::DeleteFixup);
                self.rotate(p, side, Tag::DeleteFixup, Step::Single);
                w = self
                    .tree
                    .child(p, !side)
                    .expect("the red sibling's child takes its place");
            }

            let near = self.tree.child(w, side);
            let far = self.tree.child(w, !side);

            if !self.is_red(near) && !self.is_red(far) {
                self.paint(w, Color::Red, Tag::DeleteFixup);
                x = Some(p);
                parent = self.tree.parent(p);
                if let Some(gp) = parent {
                    side = self.tree.which_child(gp, Some(p));
                }
                continue;
            }

            if !self.is_red(far) {
                let near = near.expect("a red near nephew exists");
                self.paint(near, Color::Black, Tag::DeleteFixup);
                self.paint(w, Color::Red, Tag::DeleteFixup);
                self.rotate(w, !side, Tag::DeleteFixup, Step::Single);
                w = self
                    .tree
                    .child(p, !side)
                    .expect("the near nephew became the sibling");
            }

            let parent_color = self.tree.node(p).color;
            self.paint(w, parent_color, Tag::DeleteFixup);
            self.paint(p, Color::Black, Tag::DeleteFixup);
            if let Some(far) = self.tree.child(w, !side) {
                self.paint(far, Color::Black, Tag::DeleteFixup);
            }
            self.rotate(p, side, Tag::DeleteFixup, Step::Single);
            x = self.tree.root;
            break;
        }

        if let Some(x) = x {
            self.paint(x, Color::Black, Tag::DeleteFixup);
        }
    }

    fn check_colors(&self, link: Link) -> core::result::Result<usize, String> {
        let Some(idx) = link else {
            return Ok(1);
        };
        let node = self.tree.node(idx);
        let (left, right) = (node.links.left(), node.links.right());

        if node.color == Color::Red && (self.is_red(left) || self.is_red(right)) {
            return Err(format!("red node {} has a red child", node.id));
        }

        let left_height = self.check_colors(left)?;
        let right_height = self.check_colors(right)?;
        if left_height != right_height {
            return Err(format!(
                "black heights under {} differ: {left_height} left, {right_height} right",
                node.id
            ));
        }

        Ok(left_height + usize::from(node.color == Color::Black))
    }
}

impl<K, C> SearchTree for RedBlackTree<K, C>
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

    #[instrument(level = "debug", skip(self), fields(engine = "red-black"))]
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
        let node = RbNode {
            id,
            key,
            color: Color::Red,
            links: Links::default(),
        };
        let idx = self.tree.attach(probe.last, probe.dir, node);
        self.insert_fixup(idx);

        Ok(Inserted { id, created: true })
    }

    #[instrument(level = "debug", skip(self), fields(engine = "red-black"))]
    fn delete(&mut self, key: &K) -> Result<Removed<K>> {
        self.trace.clear();

        if self.tree.is_empty() {
            return Err(TreeError::EmptyStructure);
        }
        let Some(z) = self.tree.find(key, &self.cmp) else {
            debug!("delete rejected for missing key");
            return Err(TreeError::not_found(key));
        };

        let z_parent = self.tree.parent(z);
        let z_color = self.tree.node(z).color;

        let (removed_color, x, x_parent, x_side) = match (self.tree.left(z), self.tree.right(z)) {
            (Some(zl), Some(zr)) => {
                // The successor `y` takes over `z`'s position, links and color.
                let y = self.tree.min_in_subtree(zr);
                let y_color = self.tree.node(y).color;
                let x = self.tree.right(y);

                let (x_parent, x_side) = if y == zr {
                    (y, Dir::Right)
                } else {
                    let y_parent = self.tree.parent(y);
                    self.tree.replace_child_or_set_root(y_parent, y, x);
                    self.tree.set_child(y, Dir::Right, Some(zr));
                    self.tree.maybe_set_parent(Some(zr), Some(y));
                    (y_parent.expect("the successor is below `z`"), Dir::Left)
                };

                self.tree.replace_child_or_set_root(z_parent, z, Some(y));
                self.tree.set_child(y, Dir::Left, Some(zl));
                self.tree.maybe_set_parent(Some(zl), Some(y));
                self.paint(y, z_color, Tag::Transplant);

                (y_color, x, Some(x_parent), x_side)
            }
            (left, right) => {
                let child = left.or(right);
                let side = z_parent
                    .map(|p| self.tree.which_child(p, Some(z)))
                    .unwrap_or(Dir::Left);
                self.tree.replace_child_or_set_root(z_parent, z, child);
                (z_color, child, z_parent, side)
            }
        };

        let node = self.tree.release(z);

        if removed_color == Color::Black {
            self.delete_fixup(x, x_parent, x_side);
        }

        Ok(Removed {
            key: node.key,
            removed: node.id,
            overwritten: None,
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

    /// Checks that the root is black, no red node has a red child, every root-to-null path has
    /// the same black height, and keys are in strict order.
    fn validate(&self) -> Result<()> {
        self.tree
            .check_links(&self.cmp)
            .map_err(TreeError::violation)?;
        if self.is_red(self.tree.root) {
            return Err(TreeError::violation("root is red"));
        }
        self.check_colors(self.tree.root)
            .map_err(TreeError::violation)?;
        Ok(())
    }
}
