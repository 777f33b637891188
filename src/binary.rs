//! Arena-backed binary search tree plumbing shared by the AVL, red-black and splay engines.
//!
//! Nodes live in an [`Arena`] and refer to their parent and children by slot index, which keeps
//! the O(1) walk to the parent that splaying and red-black fixups depend on without forming
//! ownership cycles.

use core::{cmp::Ordering, mem, ops::Not};
use std::collections::VecDeque;

use serde::Serialize;

use crate::{
    arena::{Arena, Idx, Link},
    compare::Comparator,
    iter::Iter,
    snapshot::{Hierarchy, HierarchyNode, NodeMeta, Payload, Traversal, Visit},
    trace::{Event, Step, Tag},
    NodeId,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Links {
    parent: Link,
    children: [Link; 2],
}

impl Links {
    #[inline]
    pub(crate) fn is_leaf(&self) -> bool {
        self.left().is_none() && self.right().is_none()
    }

    #[inline]
    pub(crate) fn parent(&self) -> Link {
        self.parent
    }

    #[inline]
    pub(crate) fn child(&self, dir: Dir) -> Link {
        self.children[dir as usize]
    }

    #[inline]
    pub(crate) fn left(&self) -> Link {
        self.child(Dir::Left)
    }

    #[inline]
    pub(crate) fn right(&self) -> Link {
        self.child(Dir::Right)
    }

    #[inline]
    pub(crate) fn set_parent(&mut self, parent: Link) -> Link {
        mem::replace(&mut self.parent, parent)
    }

    #[inline]
    pub(crate) fn set_child(&mut self, dir: Dir, child: Link) -> Link {
        mem::replace(&mut self.children[dir as usize], child)
    }
}

/// Node shape stored in a [`Bst`].
pub(crate) trait BinaryNode: Clone {
    type Key;

    fn id(&self) -> NodeId;

    fn key(&self) -> &Self::Key;

    fn links(&self) -> &Links;

    fn links_mut(&mut self) -> &mut Links;
}

/// Link-level description of a rotation that just happened.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Pivot {
    /// Direction `down` moved in.
    pub(crate) dir: Dir,
    pub(crate) down: Idx,
    pub(crate) up: Idx,
    /// Parent of `down` before the rotation, now parent of `up`.
    pub(crate) parent: Link,
    /// Subtree that moved from `up` to `down`.
    pub(crate) across: Link,
}

/// Where a key is, or where it would be attached.
#[derive(Clone, Debug)]
pub(crate) struct Probe {
    pub(crate) found: Link,
    /// Last node visited; the node holding the key when found.
    pub(crate) last: Link,
    /// Side of `last` a missing key would be attached on.
    pub(crate) dir: Dir,
    pub(crate) path: Vec<Idx>,
}

#[derive(Clone, Debug)]
pub(crate) struct Bst<N> {
    pub(crate) nodes: Arena<N>,
    pub(crate) root: Link,
    len: usize,
}

impl<N: BinaryNode> Bst<N> {
    pub(crate) const fn new() -> Self {
        Bst {
            nodes: Arena::new(),
            root: None,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        let empty = self.len == 0;
        debug_assert_eq!(empty, self.root.is_none());
        empty
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.len = 0;
    }

    #[inline]
    pub(crate) fn node(&self, idx: Idx) -> &N {
        &self.nodes[idx]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, idx: Idx) -> &mut N {
        &mut self.nodes[idx]
    }

    #[inline]
    pub(crate) fn id(&self, idx: Idx) -> NodeId {
        self.nodes[idx].id()
    }

    pub(crate) fn link_id(&self, link: Link) -> Option<NodeId> {
        link.map(|idx| self.id(idx))
    }

    #[inline]
    pub(crate) fn key(&self, idx: Idx) -> &N::Key {
        self.nodes[idx].key()
    }

    #[inline]
    pub(crate) fn parent(&self, idx: Idx) -> Link {
        self.nodes[idx].links().parent()
    }

    #[inline]
    pub(crate) fn child(&self, idx: Idx, dir: Dir) -> Link {
        self.nodes[idx].links().child(dir)
    }

    #[inline]
    pub(crate) fn left(&self, idx: Idx) -> Link {
        self.child(idx, Dir::Left)
    }

    #[inline]
    pub(crate) fn right(&self, idx: Idx) -> Link {
        self.child(idx, Dir::Right)
    }

    #[inline]
    pub(crate) fn set_child(&mut self, idx: Idx, dir: Dir, child: Link) -> Link {
        self.nodes[idx].links_mut().set_child(dir, child)
    }

    #[inline]
    pub(crate) fn maybe_set_parent(&mut self, opt_node: Link, parent: Link) {
        if let Some(node) = opt_node {
            self.nodes[node].links_mut().set_parent(parent);
        }
    }

    /// Returns which child of `parent` the (possibly missing) `child` is.
    pub(crate) fn which_child(&self, parent: Idx, child: Link) -> Dir {
        if self.left(parent) == child {
            Dir::Left
        } else {
            Dir::Right
        }
    }

    // Replaces `old_child` under `parent` (or as the root) with `new_child`, pointing
    // `new_child`'s parent link at `parent`.
    pub(crate) fn replace_child_or_set_root(&mut self, parent: Link, old_child: Idx, new_child: Link) {
        match parent {
            Some(parent) => {
                let dir = self.which_child(parent, Some(old_child));
                debug_assert_eq!(self.child(parent, dir), Some(old_child));
                self.set_child(parent, dir, new_child);
            }
            None => self.root = new_child,
        }
        self.maybe_set_parent(new_child, parent);
    }

    /// Stores `node` as the `dir` child of `parent`, or as the root of an empty tree.
    pub(crate) fn attach(&mut self, parent: Link, dir: Dir, mut node: N) -> Idx {
        debug_assert!(node.links().is_leaf());
        node.links_mut().set_parent(parent);
        let idx = self.nodes.insert(node);
        match parent {
            Some(parent) => {
                let prev = self.set_child(parent, dir, Some(idx));
                debug_assert!(prev.is_none());
            }
            None => {
                debug_assert!(self.root.is_none());
                self.root = Some(idx);
            }
        }
        self.len += 1;
        idx
    }

    /// Frees a node that has already been unlinked from the tree.
    pub(crate) fn release(&mut self, idx: Idx) -> N {
        self.len -= 1;
        self.nodes.remove(idx)
    }

    // Performs a rotation, moving `up` up and its parent `down` down.
    pub(crate) fn rotate_at(&mut self, down: Idx, up: Idx) -> Pivot {
        // - `down` becomes the `dir` child of `up`.
        // - `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
        let dir = if self.right(down) == Some(up) {
            Dir::Left
        } else {
            debug_assert_eq!(self.left(down), Some(up));
            Dir::Right
        };

        let across = self.child(up, dir);
        self.set_child(down, !dir, across);
        self.maybe_set_parent(across, Some(down));

        self.set_child(up, dir, Some(down));
        let parent = self.nodes[down].links_mut().set_parent(Some(up));

        match parent {
            Some(parent) => {
                let side = self.which_child(parent, Some(down));
                self.set_child(parent, side, Some(up));
            }
            None => self.root = Some(up),
        }
        self.nodes[up].links_mut().set_parent(parent);

        Pivot {
            dir,
            down,
            up,
            parent,
            across,
        }
    }

    /// Rotates at `node` so that `node` moves down in direction `dir`.
    pub(crate) fn rotate(&mut self, node: Idx, dir: Dir) -> Pivot {
        let up = self
            .child(node, !dir)
            .expect("rotation needs a child on the rising side");
        self.rotate_at(node, up)
    }

    /// Describes `pivot` as a trace event.
    pub(crate) fn rotation_event<K>(&self, pivot: Pivot, tag: Tag, step: Step) -> Event<K> {
        Event::Rotation {
            dir: pivot.dir,
            node: self.id(pivot.down),
            child: self.id(pivot.up),
            grandparent: self.link_id(pivot.parent),
            moved: self.link_id(pivot.across),
            tag,
            step,
        }
    }

    pub(crate) fn extreme_in_subtree(&self, root: Idx, dir: Dir) -> Idx {
        let mut cur = root;
        while let Some(next) = self.child(cur, dir) {
            cur = next;
        }
        cur
    }

    pub(crate) fn min_in_subtree(&self, root: Idx) -> Idx {
        self.extreme_in_subtree(root, Dir::Left)
    }

    pub(crate) fn max_in_subtree(&self, root: Idx) -> Idx {
        self.extreme_in_subtree(root, Dir::Right)
    }

    pub(crate) fn probe<C>(&self, key: &N::Key, cmp: &C) -> Probe
    where
        C: Comparator<N::Key>,
    {
        let mut probe = Probe {
            found: None,
            last: None,
            dir: Dir::Left,
            path: Vec::new(),
        };
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            probe.path.push(cur);
            probe.last = Some(cur);
            match cmp.compare(key, self.key(cur)) {
                Ordering::Less => probe.dir = Dir::Left,
                Ordering::Equal => {
                    probe.found = Some(cur);
                    break;
                }
                Ordering::Greater => probe.dir = Dir::Right,
            }
            opt_cur = self.child(cur, probe.dir);
        }

        probe
    }

    pub(crate) fn find<C>(&self, key: &N::Key, cmp: &C) -> Link
    where
        C: Comparator<N::Key>,
    {
        let mut opt_cur = self.root;
        while let Some(cur) = opt_cur {
            opt_cur = match cmp.compare(key, self.key(cur)) {
                Ordering::Less => self.left(cur),
                Ordering::Equal => return Some(cur),
                Ordering::Greater => self.right(cur),
            };
        }
        None
    }

    pub(crate) fn ids(&self, path: &[Idx]) -> Vec<NodeId> {
        path.iter().map(|&idx| self.id(idx)).collect()
    }

    pub(crate) fn iter(&self) -> Iter<'_, N> {
        Iter::new(self)
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        fn go<N: BinaryNode>(tree: &Bst<N>, link: Link) -> usize {
            match link {
                None => 0,
                Some(idx) => 1 + go(tree, tree.left(idx)).max(go(tree, tree.right(idx))),
            }
        }
        go(self, self.root)
    }

    pub(crate) fn hierarchy<F>(&self, meta: F) -> Hierarchy<N::Key>
    where
        N::Key: Clone,
        F: Fn(&Self, Idx) -> Option<NodeMeta>,
    {
        fn export<N, F>(tree: &Bst<N>, link: Link, meta: &F) -> Hierarchy<N::Key>
        where
            N: BinaryNode,
            N::Key: Clone,
            F: Fn(&Bst<N>, Idx) -> Option<NodeMeta>,
        {
            let Some(idx) = link else {
                return Hierarchy::Empty;
            };
            let node = tree.node(idx);
            let children = if node.links().is_leaf() {
                Vec::new()
            } else {
                vec![
                    export(tree, node.links().left(), meta),
                    export(tree, node.links().right(), meta),
                ]
            };
            Hierarchy::Node(HierarchyNode {
                id: node.id(),
                payload: Payload::Value(node.key().clone()),
                children,
                meta: meta(tree, idx),
            })
        }

        export(self, self.root, &meta)
    }

    pub(crate) fn traversal(&self, order: Traversal) -> Vec<Visit<N::Key>>
    where
        N::Key: Clone,
    {
        fn walk<N>(tree: &Bst<N>, link: Link, order: Traversal, out: &mut Vec<Visit<N::Key>>)
        where
            N: BinaryNode,
            N::Key: Clone,
        {
            let Some(idx) = link else {
                return;
            };
            if order == Traversal::PreOrder {
                out.push(tree.visit(idx));
            }
            walk(tree, tree.left(idx), order, out);
            if order == Traversal::InOrder {
                out.push(tree.visit(idx));
            }
            walk(tree, tree.right(idx), order, out);
            if order == Traversal::PostOrder {
                out.push(tree.visit(idx));
            }
        }

        let mut out = Vec::with_capacity(self.len);
        match order {
            Traversal::LevelOrder => {
                let mut queue: VecDeque<Idx> = self.root.into_iter().collect();
                while let Some(idx) = queue.pop_front() {
                    out.push(self.visit(idx));
                    queue.extend(self.left(idx));
                    queue.extend(self.right(idx));
                }
            }
            _ => walk(self, self.root, order, &mut out),
        }
        out
    }

    fn visit(&self, idx: Idx) -> Visit<N::Key>
    where
        N::Key: Clone,
    {
        Visit {
            id: self.id(idx),
            value: self.key(idx).clone(),
        }
    }

    /// Checks parent links, strict key order and the node count.
    pub(crate) fn check_links<C>(&self, cmp: &C) -> Result<(), String>
    where
        C: Comparator<N::Key>,
    {
        if let Some(root) = self.root {
            if self.parent(root).is_some() {
                return Err(format!("root {} has a parent", self.id(root)));
            }
        }

        let mut seen = 0;
        let mut prev: Option<Idx> = None;
        for (idx, node) in self.iter_indexed() {
            seen += 1;
            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = node.links().child(dir) {
                    if self.parent(child) != Some(idx) {
                        return Err(format!(
                            "child {} of {} does not point back at it",
                            self.id(child),
                            node.id()
                        ));
                    }
                }
            }
            if let Some(prev) = prev {
                if cmp.compare(self.key(prev), node.key()) != Ordering::Less {
                    return Err(format!(
                        "keys of {} and {} are out of order",
                        self.id(prev),
                        node.id()
                    ));
                }
            }
            prev = Some(idx);
        }

        if seen != self.len || self.nodes.occupied() != self.len {
            return Err(format!(
                "tree reports {} nodes but holds {seen} reachable and {} stored",
                self.len,
                self.nodes.occupied()
            ));
        }
        Ok(())
    }

    fn iter_indexed(&self) -> impl Iterator<Item = (Idx, &N)> + '_ {
        let mut stack = Vec::new();
        let mut cur = self.root;
        core::iter::from_fn(move || {
            while let Some(idx) = cur {
                stack.push(idx);
                cur = self.left(idx);
            }
            let idx = stack.pop()?;
            cur = self.right(idx);
            Some((idx, self.node(idx)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compare::NaturalOrder, IdAllocator};

    #[derive(Clone, Debug)]
    struct TestNode {
        id: NodeId,
        key: u32,
        links: Links,
    }

    impl BinaryNode for TestNode {
        type Key = u32;

        fn id(&self) -> NodeId {
            self.id
        }

        fn key(&self) -> &u32 {
            &self.key
        }

        fn links(&self) -> &Links {
            &self.links
        }

        fn links_mut(&mut self) -> &mut Links {
            &mut self.links
        }
    }

    fn build(keys: &[u32]) -> Bst<TestNode> {
        let mut ids = IdAllocator::new();
        let mut tree = Bst::new();
        for &key in keys {
            let probe = tree.probe(&key, &NaturalOrder);
            assert!(probe.found.is_none());
            tree.attach(
                probe.last,
                probe.dir,
                TestNode {
                    id: ids.allocate(),
                    key,
                    links: Links::default(),
                },
            );
        }
        tree
    }

    fn in_order(tree: &Bst<TestNode>) -> Vec<u32> {
        tree.iter().map(|n| n.key).collect()
    }

    #[test]
    fn rotate_preserves_order_and_links() {
        let mut tree = build(&[4, 2, 6, 1, 3]);
        let root = tree.root.unwrap();
        let pivot = tree.rotate(root, Dir::Right);

        assert_eq!(pivot.dir, Dir::Right);
        assert_eq!(*tree.key(tree.root.unwrap()), 2);
        assert_eq!(pivot.across.map(|i| *tree.key(i)), Some(3));
        assert_eq!(pivot.parent, None);
        assert_eq!(in_order(&tree), vec![1, 2, 3, 4, 6]);
        tree.check_links(&NaturalOrder).unwrap();

        let event: Event<u32> = tree.rotation_event(pivot, Tag::Ll, Step::Single);
        let Event::Rotation { node, child, .. } = event else {
            panic!("expected a rotation");
        };
        assert_eq!((node, child), (tree.id(root), tree.id(tree.root.unwrap())));
    }

    #[test]
    fn traversals() {
        let tree = build(&[4, 2, 6, 1, 3]);
        let keys = |order| {
            tree.traversal(order)
                .into_iter()
                .map(|v| v.value)
                .collect::<Vec<_>>()
        };
        assert_eq!(keys(Traversal::PreOrder), vec![4, 2, 1, 3, 6]);
        assert_eq!(keys(Traversal::InOrder), vec![1, 2, 3, 4, 6]);
        assert_eq!(keys(Traversal::PostOrder), vec![1, 3, 2, 6, 4]);
        assert_eq!(keys(Traversal::LevelOrder), vec![4, 2, 6, 1, 3]);
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn hierarchy_pads_missing_children() {
        let tree = build(&[2, 1]);
        let Hierarchy::Node(root) = tree.hierarchy(|_, _| None) else {
            panic!("expected a root");
        };
        assert_eq!(root.children.len(), 2);
        assert!(root.children[1].is_empty());
        assert!(root.children[0].node().unwrap().children.is_empty());
    }
}
