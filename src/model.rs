//! Model-based equivalence checks: every engine is driven with the same operations as a
//! [`BTreeSet`] and must agree with it after each one.

use std::{collections::BTreeSet, ops::Bound};

use arbitrary::Arbitrary;
use proptest::strategy::{Just, Strategy};

use crate::{
    AvlTree, BTree, RedBlackTree, SearchTree, SplayTree, TreeConfig, TreeError, TwoThreeTree,
};

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Search(ItemValue),
    Contains(ItemValue),
    Remove(ItemValue),
    /// Copy-on-write insert and delete; the receiver must not change.
    Fork(ItemValue),
    First,
    Last,
}

impl Op {
    fn finalize(self, sorted: &[u32]) -> FinalOp {
        fn get_value(v: &[u32], i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => {
                    if v.is_empty() {
                        idx as u32
                    } else {
                        v[idx % v.len()]
                    }
                }
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_value(sorted, item)),
            Op::Search(item) => FinalOp::Search(get_value(sorted, item)),
            Op::Contains(item) => FinalOp::Contains(get_value(sorted, item)),
            Op::Remove(item) => FinalOp::Remove(get_value(sorted, item)),
            Op::Fork(item) => FinalOp::Fork(get_value(sorted, item)),
            Op::First => FinalOp::First,
            Op::Last => FinalOp::Last,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    Search(u32),
    Contains(u32),
    Remove(u32),
    Fork(u32),
    First,
    Last,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        value_strategy().prop_map(Op::Insert),
        value_strategy().prop_map(Op::Search),
        value_strategy().prop_map(Op::Contains),
        value_strategy().prop_map(Op::Remove),
        value_strategy().prop_map(Op::Fork),
        Just(Op::First),
        Just(Op::Last),
    ]
}

/// Engine under test.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Arbitrary)]
pub enum EngineKind {
    Avl,
    RedBlack,
    Splay,
    TwoThree,
    /// B-tree with minimum degree `2 + degree % 4`
    BTree(u8),
}

impl EngineKind {
    fn access(self) -> Access {
        match self {
            EngineKind::Splay => Access::Splay,
            _ => Access::Static,
        }
    }
}

pub fn engine_strategy() -> impl Strategy<Value = EngineKind> {
    proptest::prop_oneof![
        Just(EngineKind::Avl),
        Just(EngineKind::RedBlack),
        Just(EngineKind::Splay),
        Just(EngineKind::TwoThree),
        (0u8..4).prop_map(EngineKind::BTree),
    ]
}

/// How an engine reacts to being accessed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    /// Lookups never reshape; duplicate inserts are rejected
    Static,
    /// The accessed (or last visited) node becomes the root; duplicate inserts splay
    Splay,
}

/// Builds an empty engine of the given kind and runs `ops` against it.
pub fn run_equivalence(kind: EngineKind, ops: Vec<Op>) {
    let access = kind.access();
    match kind {
        EngineKind::Avl => run_btree_equivalence(AvlTree::<u32>::new(), access, ops),
        EngineKind::RedBlack => run_btree_equivalence(RedBlackTree::<u32>::new(), access, ops),
        EngineKind::Splay => run_btree_equivalence(SplayTree::<u32>::new(), access, ops),
        EngineKind::TwoThree => run_btree_equivalence(TwoThreeTree::<u32>::new(), access, ops),
        EngineKind::BTree(degree) => {
            let config = TreeConfig::default().with_min_degree(2 + usize::from(degree % 4));
            let tree: BTree<u32> = BTree::with_config(config).expect("degree is at least 2");
            run_btree_equivalence(tree, access, ops)
        }
    }
}

fn root_key<T: SearchTree<Key = u32>>(tree: &T) -> Option<u32> {
    tree.hierarchy()
        .node()
        .and_then(|root| root.payload.keys().first().copied())
}

pub fn run_btree_equivalence<T>(mut tree: T, access: Access, ops: Vec<Op>)
where
    T: SearchTree<Key = u32>,
{
    let mut btree = BTreeSet::new();

    for (op_id, op) in ops.into_iter().enumerate() {
        let sorted_values: Vec<u32> = btree.iter().copied().collect();
        let final_op = op.finalize(&sorted_values);

        match final_op {
            FinalOp::Insert(value) => {
                let fresh = btree.len() < tree.capacity() && btree.insert(value);
                let existing = !fresh && btree.contains(&value);

                match tree.insert(value) {
                    Ok(inserted) => {
                        assert_eq!(inserted.created, fresh, "FinalOp #{op_id}: {op:?}");
                        assert!(
                            fresh || access == Access::Splay,
                            "FinalOp #{op_id}: {op:?}"
                        );
                        if access == Access::Splay {
                            assert_eq!(tree.root_id(), Some(inserted.id), "FinalOp #{op_id}: {op:?}");
                        }
                    }
                    Err(TreeError::DuplicateKey(_)) => {
                        assert!(existing, "FinalOp #{op_id}: {op:?}");
                        assert_eq!(access, Access::Static, "FinalOp #{op_id}: {op:?}");
                    }
                    Err(TreeError::CapacityExceeded { .. }) => {
                        assert!(btree.len() >= tree.capacity(), "FinalOp #{op_id}: {op:?}");
                    }
                    Err(e) => panic!("FinalOp #{op_id}: {op:?} failed with {e}"),
                }

                let trace = tree.take_trace();
                assert_eq!(trace.frames().len(), trace.len(), "FinalOp #{op_id}: {op:?}");
            }

            FinalOp::Search(value) => {
                let before = tree.root_id();
                let search = tree.search(&value);

                assert_eq!(search.found, btree.contains(&value), "FinalOp #{op_id}: {op:?}");
                assert_eq!(search.node.is_some(), search.found, "FinalOp #{op_id}: {op:?}");
                assert_eq!(search.path.is_empty(), btree.is_empty(), "FinalOp #{op_id}: {op:?}");
                if search.found {
                    assert_eq!(search.path.last().copied(), search.node, "FinalOp #{op_id}: {op:?}");
                }

                match access {
                    Access::Splay => {
                        assert_eq!(tree.root_id(), search.path.last().copied(), "FinalOp #{op_id}: {op:?}");
                    }
                    Access::Static => {
                        assert_eq!(tree.root_id(), before, "FinalOp #{op_id}: {op:?}");
                        assert!(tree.trace().is_empty(), "FinalOp #{op_id}: {op:?}");
                    }
                }
            }

            FinalOp::Contains(value) => {
                let before = tree.hierarchy();
                assert_eq!(tree.contains(&value), btree.contains(&value), "FinalOp #{op_id}: {op:?}");
                assert_eq!(tree.hierarchy(), before, "FinalOp #{op_id}: {op:?}");
            }

            FinalOp::Remove(value) => {
                let was_empty = btree.is_empty();
                let neighbor = btree
                    .range(..value)
                    .next_back()
                    .or_else(|| btree.range((Bound::Excluded(value), Bound::Unbounded)).next())
                    .copied();
                let expected = btree.remove(&value);

                match tree.delete(&value) {
                    Ok(removed) => {
                        assert!(expected, "FinalOp #{op_id}: {op:?}");
                        assert_eq!(removed.key, value, "FinalOp #{op_id}: {op:?}");
                        if access == Access::Splay {
                            assert_eq!(root_key(&tree), neighbor, "FinalOp #{op_id}: {op:?}");
                        }
                    }
                    Err(TreeError::EmptyStructure) => {
                        assert!(was_empty, "FinalOp #{op_id}: {op:?}");
                    }
                    Err(TreeError::KeyNotFound(_)) => {
                        assert!(!expected && !was_empty, "FinalOp #{op_id}: {op:?}");
                    }
                    Err(e) => panic!("FinalOp #{op_id}: {op:?} failed with {e}"),
                }

                let trace = tree.take_trace();
                assert_eq!(trace.frames().len(), trace.len(), "FinalOp #{op_id}: {op:?}");
            }

            FinalOp::Fork(value) => {
                let keys = tree.keys();
                let shape = tree.hierarchy();

                if let Ok(revision) = tree.with_inserted(value) {
                    assert!(revision.tree.contains(&value), "FinalOp #{op_id}: {op:?}");
                    revision.tree.validate().unwrap();
                }
                if let Ok(revision) = tree.with_deleted(&value) {
                    assert!(!revision.tree.contains(&value), "FinalOp #{op_id}: {op:?}");
                    assert_eq!(revision.tree.len() + 1, tree.len(), "FinalOp #{op_id}: {op:?}");
                    revision.tree.validate().unwrap();
                }
                let revision = tree.with_searched(&value);
                assert_eq!(revision.result.found, btree.contains(&value), "FinalOp #{op_id}: {op:?}");

                assert_eq!(tree.keys(), keys, "FinalOp #{op_id}: {op:?}");
                assert_eq!(tree.hierarchy(), shape, "FinalOp #{op_id}: {op:?}");
            }

            FinalOp::First => {
                let from_btree = btree.first().copied();
                assert_eq!(tree.min().ok(), from_btree, "FinalOp #{op_id}: {op:?}");
            }

            FinalOp::Last => {
                let from_btree = btree.last().copied();
                assert_eq!(tree.max().ok(), from_btree, "FinalOp #{op_id}: {op:?}");
            }
        }

        if let Err(e) = tree.validate() {
            panic!("FinalOp #{op_id}: {op:?} broke the tree: {e}");
        }
        assert_eq!(btree.len(), tree.len());
        assert!(btree.iter().copied().eq(tree.keys()));
    }
}
