//! Arena-backed multiway node storage shared by the 2-3 and B-tree engines.
//!
//! Nodes hold their keys in ascending order with one value per key, and either no children (a
//! leaf) or exactly one more child than keys. There are no parent links: mutations walk down from
//! the root and keep the path they took.
//!
//! The split, merge and borrow primitives here move keys, values and children between a parent
//! and two adjacent children, and describe the move as a trace [`Event`]. Engines decide when to
//! apply them.

use core::{cmp::Ordering, mem};
use std::collections::VecDeque;

use crate::{
    arena::{Arena, Idx, Link},
    binary::Dir,
    compare::Comparator,
    snapshot::{Hierarchy, HierarchyNode, Payload, Traversal, Visit},
    trace::{Event, Tag},
    IdAllocator, NodeId,
};

#[derive(Clone, Debug)]
pub(crate) struct MultiNode<K, V> {
    pub(crate) id: NodeId,
    pub(crate) keys: Vec<K>,
    pub(crate) values: Vec<V>,
    pub(crate) children: Vec<Idx>,
}

impl<K, V> MultiNode<K, V> {
    #[inline]
    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Result of walking down toward a key.
#[derive(Clone, Debug)]
pub(crate) struct Locate {
    /// Node and key position holding the key
    pub(crate) found: Option<(Idx, usize)>,
    /// Every node visited, root first, with the key position where the key was found or the
    /// child position descended into (for the final leaf of a miss, the insertion position)
    pub(crate) path: Vec<(Idx, usize)>,
}

#[derive(Clone, Debug)]
pub(crate) struct Multi<K, V> {
    pub(crate) nodes: Arena<MultiNode<K, V>>,
    pub(crate) root: Link,
    len: usize,
}

impl<K: Clone, V> Multi<K, V> {
    pub(crate) const fn new() -> Self {
        Multi {
            nodes: Arena::new(),
            root: None,
            len: 0,
        }
    }

    /// Number of keys stored.
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
    pub(crate) fn node(&self, idx: Idx) -> &MultiNode<K, V> {
        &self.nodes[idx]
    }

    #[inline]
    pub(crate) fn id(&self, idx: Idx) -> NodeId {
        self.nodes[idx].id
    }

    pub(crate) fn link_id(&self, link: Link) -> Option<NodeId> {
        link.map(|idx| self.id(idx))
    }

    #[inline]
    pub(crate) fn key_count(&self, idx: Idx) -> usize {
        self.nodes[idx].keys.len()
    }

    #[inline]
    pub(crate) fn child(&self, idx: Idx, pos: usize) -> Idx {
        self.nodes[idx].children[pos]
    }

    pub(crate) fn search_node<C>(&self, idx: Idx, key: &K, cmp: &C) -> Result<usize, usize>
    where
        C: Comparator<K>,
    {
        self.nodes[idx]
            .keys
            .binary_search_by(|probe| cmp.compare(probe, key))
    }

    pub(crate) fn locate<C>(&self, key: &K, cmp: &C) -> Locate
    where
        C: Comparator<K>,
    {
        let mut path = Vec::new();
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            match self.search_node(cur, key, cmp) {
                Ok(pos) => {
                    path.push((cur, pos));
                    return Locate {
                        found: Some((cur, pos)),
                        path,
                    };
                }
                Err(pos) => {
                    path.push((cur, pos));
                    opt_cur = self.nodes[cur].children.get(pos).copied();
                }
            }
        }

        Locate { found: None, path }
    }

    pub(crate) fn find<C>(&self, key: &K, cmp: &C) -> Option<(Idx, usize)>
    where
        C: Comparator<K>,
    {
        let mut opt_cur = self.root;
        while let Some(cur) = opt_cur {
            match self.search_node(cur, key, cmp) {
                Ok(pos) => return Some((cur, pos)),
                Err(pos) => opt_cur = self.nodes[cur].children.get(pos).copied(),
            }
        }
        None
    }

    pub(crate) fn ids(&self, path: &[(Idx, usize)]) -> Vec<NodeId> {
        path.iter().map(|&(idx, _)| self.id(idx)).collect()
    }

    /// Allocates a node that is not yet linked anywhere.
    pub(crate) fn alloc(
        &mut self,
        ids: &mut IdAllocator,
        keys: Vec<K>,
        values: Vec<V>,
        children: Vec<Idx>,
    ) -> Idx {
        debug_assert_eq!(keys.len(), values.len());
        self.nodes.insert(MultiNode {
            id: ids.allocate(),
            keys,
            values,
            children,
        })
    }

    /// Makes a single-key leaf the root of an empty tree.
    pub(crate) fn plant(&mut self, ids: &mut IdAllocator, key: K, value: V) -> Idx {
        debug_assert!(self.root.is_none());
        let idx = self.alloc(ids, vec![key], vec![value], Vec::new());
        self.root = Some(idx);
        self.len += 1;
        idx
    }

    /// Puts a new root above the current one, leaving it keyless with the old root as its only
    /// child. A split of that child follows immediately.
    pub(crate) fn grow(&mut self, ids: &mut IdAllocator) -> Idx {
        let old = self.root.expect("only a non-empty tree grows");
        let idx = self.alloc(ids, Vec::new(), Vec::new(), vec![old]);
        self.root = Some(idx);
        idx
    }

    pub(crate) fn insert_at(&mut self, idx: Idx, pos: usize, key: K, value: V) {
        let node = &mut self.nodes[idx];
        node.keys.insert(pos, key);
        node.values.insert(pos, value);
        self.len += 1;
    }

    pub(crate) fn remove_at(&mut self, idx: Idx, pos: usize) -> (K, V) {
        let node = &mut self.nodes[idx];
        let key = node.keys.remove(pos);
        let value = node.values.remove(pos);
        self.len -= 1;
        (key, value)
    }

    /// Swaps a key and its value into slot `pos` of `idx`, returning the previous pair.
    pub(crate) fn replace_at(&mut self, idx: Idx, pos: usize, key: K, value: V) -> (K, V) {
        let node = &mut self.nodes[idx];
        (
            mem::replace(&mut node.keys[pos], key),
            mem::replace(&mut node.values[pos], value),
        )
    }

    /// Splits child `pos` of `parent` around its middle key.
    ///
    /// The lower half stays in the child, the upper half moves to a new sibling at `pos + 1`, and
    /// the middle key is inserted into `parent` at `pos`.
    pub(crate) fn split_child(
        &mut self,
        ids: &mut IdAllocator,
        parent: Idx,
        pos: usize,
        tag: Tag,
    ) -> Event<K> {
        let child = self.child(parent, pos);
        let node = &mut self.nodes[child];
        let mid = node.keys.len() / 2;

        let keys = node.keys.split_off(mid + 1);
        let values = node.values.split_off(mid + 1);
        let children = if node.is_leaf() {
            Vec::new()
        } else {
            node.children.split_off(mid + 1)
        };
        let promoted = node.keys.pop().expect("a split node has a middle key");
        let promoted_value = node.values.pop().expect("every key has a value");

        let sibling = self.alloc(ids, keys, values, children);

        let parent_node = &mut self.nodes[parent];
        parent_node.keys.insert(pos, promoted.clone());
        parent_node.values.insert(pos, promoted_value);
        parent_node.children.insert(pos + 1, sibling);

        Event::Split {
            node: self.id(child),
            sibling: self.id(sibling),
            parent: self.id(parent),
            promoted,
            tag,
        }
    }

    /// Folds child `pos + 1` of `parent`, and the separator between the two, into child `pos`.
    pub(crate) fn merge_children(&mut self, parent: Idx, pos: usize, tag: Tag) -> Event<K> {
        let parent_node = &mut self.nodes[parent];
        let separator = parent_node.keys.remove(pos);
        let separator_value = parent_node.values.remove(pos);
        let absorbed = parent_node.children.remove(pos + 1);
        let survivor = parent_node.children[pos];

        let absorbed = self.nodes.remove(absorbed);
        let node = &mut self.nodes[survivor];
        node.keys.push(separator.clone());
        node.values.push(separator_value);
        node.keys.extend(absorbed.keys);
        node.values.extend(absorbed.values);
        node.children.extend(absorbed.children);

        Event::Merge {
            node: self.id(survivor),
            absorbed: absorbed.id,
            parent: self.id(parent),
            separator,
            tag,
        }
    }

    /// Moves separator `pos - 1` down into child `pos` and the last key of child `pos - 1` up
    /// to replace it. The left sibling's last child, if any, moves along.
    pub(crate) fn borrow_from_left(&mut self, parent: Idx, pos: usize, tag: Tag) -> Event<K> {
        let node = self.child(parent, pos);
        let sibling = self.child(parent, pos - 1);

        let left = &mut self.nodes[sibling];
        let key = left.keys.pop().expect("a lending sibling has a spare key");
        let value = left.values.pop().expect("every key has a value");
        let child = left.children.pop();

        let raised = key.clone();
        let (separator, separator_value) = self.replace_at(parent, pos - 1, key, value);

        let node_ref = &mut self.nodes[node];
        node_ref.keys.insert(0, separator);
        node_ref.values.insert(0, separator_value);
        if let Some(child) = child {
            node_ref.children.insert(0, child);
        }

        Event::Borrow {
            node: self.id(node),
            sibling: self.id(sibling),
            parent: self.id(parent),
            key: raised,
            from: Dir::Left,
            tag,
        }
    }

    /// Mirror image of [`borrow_from_left`](Self::borrow_from_left) using child `pos + 1`.
    pub(crate) fn borrow_from_right(&mut self, parent: Idx, pos: usize, tag: Tag) -> Event<K> {
        let node = self.child(parent, pos);
        let sibling = self.child(parent, pos + 1);

        let right = &mut self.nodes[sibling];
        let key = right.keys.remove(0);
        let value = right.values.remove(0);
        let child = (!right.is_leaf()).then(|| right.children.remove(0));

        let raised = key.clone();
        let (separator, separator_value) = self.replace_at(parent, pos, key, value);

        let node_ref = &mut self.nodes[node];
        node_ref.keys.push(separator);
        node_ref.values.push(separator_value);
        if let Some(child) = child {
            node_ref.children.push(child);
        }

        Event::Borrow {
            node: self.id(node),
            sibling: self.id(sibling),
            parent: self.id(parent),
            key: raised,
            from: Dir::Right,
            tag,
        }
    }

    /// Replaces a keyless root by its only child, or empties the tree if it has none.
    ///
    /// Returns `true` if the root changed.
    pub(crate) fn collapse_root(&mut self) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        if self.key_count(root) > 0 {
            return false;
        }
        let node = self.nodes.remove(root);
        debug_assert!(node.children.len() <= 1);
        self.root = node.children.first().copied();
        true
    }

    /// Number of levels; 0 when empty.
    pub(crate) fn height(&self) -> usize {
        let mut height = 0;
        let mut opt_cur = self.root;
        while let Some(cur) = opt_cur {
            height += 1;
            opt_cur = self.nodes[cur].children.first().copied();
        }
        height
    }

    fn extreme(&self, dir: Dir) -> Option<&K> {
        let mut cur = self.root?;
        loop {
            let node = &self.nodes[cur];
            let next = match dir {
                Dir::Left => node.children.first(),
                Dir::Right => node.children.last(),
            };
            match next {
                Some(&next) => cur = next,
                None => {
                    return match dir {
                        Dir::Left => node.keys.first(),
                        Dir::Right => node.keys.last(),
                    }
                }
            }
        }
    }

    pub(crate) fn min(&self) -> Option<&K> {
        self.extreme(Dir::Left)
    }

    pub(crate) fn max(&self) -> Option<&K> {
        self.extreme(Dir::Right)
    }

    pub(crate) fn hierarchy(&self) -> Hierarchy<K> {
        fn export<K: Clone, V>(tree: &Multi<K, V>, idx: Idx) -> Hierarchy<K> {
            let node = tree.node(idx);
            Hierarchy::Node(HierarchyNode {
                id: node.id,
                payload: Payload::Keys(node.keys.clone()),
                children: node.children.iter().map(|&c| export(tree, c)).collect(),
                meta: None,
            })
        }

        match self.root {
            Some(root) => export(self, root),
            None => Hierarchy::Empty,
        }
    }

    /// Visits every key; a node's keys are visited together, except in-order where they
    /// interleave with the children.
    pub(crate) fn traversal(&self, order: Traversal) -> Vec<Visit<K>> {
        fn walk<K: Clone, V>(
            tree: &Multi<K, V>,
            idx: Idx,
            order: Traversal,
            out: &mut Vec<Visit<K>>,
        ) {
            let node = tree.node(idx);
            match order {
                Traversal::PreOrder => {
                    tree.visit_all(idx, out);
                    for &child in &node.children {
                        walk(tree, child, order, out);
                    }
                }
                Traversal::PostOrder => {
                    for &child in &node.children {
                        walk(tree, child, order, out);
                    }
                    tree.visit_all(idx, out);
                }
                _ => {
                    for (pos, key) in node.keys.iter().enumerate() {
                        if let Some(&child) = node.children.get(pos) {
                            walk(tree, child, order, out);
                        }
                        out.push(Visit {
                            id: node.id,
                            value: key.clone(),
                        });
                    }
                    if let Some(&last) = node.children.get(node.keys.len()) {
                        walk(tree, last, order, out);
                    }
                }
            }
        }

        let mut out = Vec::with_capacity(self.len);
        match (order, self.root) {
            (_, None) => {}
            (Traversal::LevelOrder, Some(root)) => {
                let mut queue = VecDeque::from([root]);
                while let Some(idx) = queue.pop_front() {
                    self.visit_all(idx, &mut out);
                    queue.extend(self.nodes[idx].children.iter().copied());
                }
            }
            (_, Some(root)) => walk(self, root, order, &mut out),
        }
        out
    }

    fn visit_all(&self, idx: Idx, out: &mut Vec<Visit<K>>) {
        let node = &self.nodes[idx];
        out.extend(node.keys.iter().map(|key| Visit {
            id: node.id,
            value: key.clone(),
        }));
    }

    pub(crate) fn keys(&self) -> Vec<K> {
        self.traversal(Traversal::InOrder)
            .into_iter()
            .map(|v| v.value)
            .collect()
    }

    /// Checks child counts, key-count bounds, uniform leaf depth, strict key order and the key
    /// and node counts.
    ///
    /// Non-root nodes must hold `min_keys..=max_keys` keys; the root `1..=max_keys`.
    pub(crate) fn check<C>(&self, cmp: &C, min_keys: usize, max_keys: usize) -> Result<(), String>
    where
        C: Comparator<K>,
    {
        struct Walk<'a, K> {
            leaf_depth: Option<usize>,
            prev: Option<&'a K>,
            keys: usize,
            nodes: usize,
        }

        fn go<'a, K: Clone, V, C: Comparator<K>>(
            tree: &'a Multi<K, V>,
            idx: Idx,
            depth: usize,
            limits: (usize, usize),
            cmp: &C,
            walk: &mut Walk<'a, K>,
        ) -> Result<(), String> {
            let node = tree.node(idx);
            walk.nodes += 1;
            walk.keys += node.keys.len();

            let (min_keys, max_keys) = if depth == 0 { (1, limits.1) } else { limits };
            if !(min_keys..=max_keys).contains(&node.keys.len()) {
                return Err(format!(
                    "node {} holds {} keys, outside {min_keys}..={max_keys}",
                    node.id,
                    node.keys.len()
                ));
            }
            if node.values.len() != node.keys.len() {
                return Err(format!(
                    "node {} holds {} keys but {} values",
                    node.id,
                    node.keys.len(),
                    node.values.len()
                ));
            }

            if node.is_leaf() {
                match walk.leaf_depth {
                    None => walk.leaf_depth = Some(depth),
                    Some(expected) if expected != depth => {
                        return Err(format!(
                            "leaf {} is at depth {depth}, expected {expected}",
                            node.id
                        ));
                    }
                    Some(_) => {}
                }
            } else if node.children.len() != node.keys.len() + 1 {
                return Err(format!(
                    "node {} holds {} keys but {} children",
                    node.id,
                    node.keys.len(),
                    node.children.len()
                ));
            }

            for (pos, key) in node.keys.iter().enumerate() {
                if let Some(&child) = node.children.get(pos) {
                    go(tree, child, depth + 1, limits, cmp, walk)?;
                }
                if let Some(prev) = walk.prev {
                    if cmp.compare(prev, key) != Ordering::Less {
                        return Err(format!("keys out of order in node {}", node.id));
                    }
                }
                walk.prev = Some(key);
            }
            if let Some(&last) = node.children.get(node.keys.len()) {
                go(tree, last, depth + 1, limits, cmp, walk)?;
            }
            Ok(())
        }

        let Some(root) = self.root else {
            if self.len != 0 || self.nodes.occupied() != 0 {
                return Err(format!(
                    "empty tree reports {} keys and stores {} nodes",
                    self.len,
                    self.nodes.occupied()
                ));
            }
            return Ok(());
        };

        let mut walk = Walk {
            leaf_depth: None,
            prev: None,
            keys: 0,
            nodes: 0,
        };
        go(self, root, 0, (min_keys, max_keys), cmp, &mut walk)?;

        if walk.keys != self.len || walk.nodes != self.nodes.occupied() {
            return Err(format!(
                "tree reports {} keys in {} stored nodes but holds {} keys in {} reachable ones",
                self.len,
                self.nodes.occupied(),
                walk.keys,
                walk.nodes
            ));
        }
        Ok(())
    }
}
