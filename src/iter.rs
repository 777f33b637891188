use crate::{
    arena::Link,
    binary::{BinaryNode, Bst, Dir},
};

enum CameFrom {
    Parent,
    LeftChild,
    Here,
    RightChild,
}

/// In-order iterator over a binary tree, walking parent links instead of keeping a stack.
pub(crate) struct Iter<'tree, N: BinaryNode> {
    tree: &'tree Bst<N>,

    front_cur: Link,
    front_from: CameFrom,

    len: usize,
}

impl<'tree, N: BinaryNode> Iter<'tree, N> {
    pub(crate) fn new(tree: &'tree Bst<N>) -> Self {
        Iter {
            tree,

            front_cur: tree.root,
            front_from: CameFrom::Parent,
            len: tree.len(),
        }
    }
}

impl<'tree, N: BinaryNode> Iterator for Iter<'tree, N> {
    type Item = &'tree N;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let mut cur = self.front_cur?;

        loop {
            match self.front_from {
                CameFrom::Parent => {
                    // Entering a new subtree: its minimum comes first.
                    cur = self.tree.min_in_subtree(cur);
                    self.front_from = CameFrom::LeftChild;
                }

                CameFrom::LeftChild => {
                    // Left subtree exhausted, so this node is next.
                    self.front_cur = Some(cur);
                    self.front_from = CameFrom::Here;
                    self.len -= 1;

                    return Some(self.tree.node(cur));
                }

                CameFrom::Here => {
                    if let Some(right) = self.tree.right(cur) {
                        self.front_from = CameFrom::Parent;
                        cur = right;
                    } else if let Some(parent) = self.tree.parent(cur) {
                        self.front_from = match self.tree.which_child(parent, Some(cur)) {
                            Dir::Left => CameFrom::LeftChild,
                            Dir::Right => CameFrom::RightChild,
                        };
                        cur = parent;
                    } else {
                        unreachable!("ran past the maximum with items left")
                    }
                }

                CameFrom::RightChild => {
                    // Ascend until we find the successor element.
                    while let Some(parent) = self.tree.parent(cur) {
                        match self.tree.which_child(parent, Some(cur)) {
                            Dir::Left => {
                                cur = parent;
                                break;
                            }
                            Dir::Right => cur = parent,
                        }
                    }

                    self.front_cur = Some(cur);
                    self.front_from = CameFrom::LeftChild;
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}
