use std::ops::Range;

use proptest::prelude::*;

use crate::model::{self, Access, EngineKind};

use super::*;

fn btree(min_degree: usize) -> BTree<u32> {
    BTree::with_config(TreeConfig::default().with_min_degree(min_degree)).unwrap()
}

// Runs `$check(engine, args..)` once per engine kind.
macro_rules! each_engine {
    ($check:ident($($arg:expr),*)) => {{
        $check(AvlTree::<u32>::new(), $($arg),*);
        $check(RedBlackTree::<u32>::new(), $($arg),*);
        $check(SplayTree::<u32>::new(), $($arg),*);
        $check(TwoThreeTree::<u32>::new(), $($arg),*);
        $check(btree(2), $($arg),*);
        $check(btree(3), $($arg),*);
    }};
}

fn insert_find_all<T: SearchTree<Key = u32>>(mut tree: T, keys: &[u32]) {
    for &key in keys {
        let inserted = tree.insert(key).unwrap();
        assert!(inserted.created);
        tree.validate().unwrap();
    }

    for key in keys {
        assert!(tree.contains(key));
        let search = tree.search(key);
        assert!(search.found, "{key} not found");
        assert_eq!(search.path.last().copied(), search.node);
        tree.validate().unwrap();
    }
    assert_eq!(tree.len(), keys.len());
}

fn insert_remove_all<T: SearchTree<Key = u32>>(mut tree: T, keys: &[u32]) {
    for &key in keys {
        tree.insert(key).unwrap();
        tree.validate().unwrap();
    }

    for key in keys {
        assert_eq!(tree.delete(key).unwrap().key, *key);
        assert!(!tree.contains(key));
        tree.validate().unwrap();
    }
    assert!(tree.is_empty());
    assert_eq!(tree.root_id(), None);

    for &key in keys {
        tree.insert(key).unwrap();
        tree.validate().unwrap();
    }

    for key in keys.iter().rev() {
        assert_eq!(tree.delete(key).unwrap().key, *key);
        tree.validate().unwrap();
    }
    assert!(tree.is_empty());
}

// Every ordering of `0..n`, in lexicographic order.
fn permutations(n: u32) -> Vec<Vec<u32>> {
    if n == 0 {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for rest in permutations(n - 1) {
        for pos in 0..=rest.len() {
            let mut next = rest.clone();
            next.insert(pos, n - 1);
            out.push(next);
        }
    }
    out.sort();
    out
}

#[test]
fn zero_elems_find() {
    each_engine!(insert_find_all(&[]));
}

#[test]
fn single_elem_find() {
    each_engine!(insert_find_all(&[0]));
}

#[test]
fn two_elems_find() {
    each_engine!(insert_find_all(&[0, 1]));
    each_engine!(insert_find_all(&[1, 0]));
}

#[test]
fn three_elems_find() {
    each_engine!(insert_find_all(&[0, 1, 2]));
    each_engine!(insert_find_all(&[0, 2, 1]));
    each_engine!(insert_find_all(&[1, 0, 2]));
    each_engine!(insert_find_all(&[1, 2, 0]));
    each_engine!(insert_find_all(&[2, 0, 1]));
    each_engine!(insert_find_all(&[2, 1, 0]));
}

#[test]
fn five_elems_find() {
    let orders = permutations(5);
    assert_eq!(orders.len(), 120);
    for keys in &orders {
        each_engine!(insert_find_all(keys));
    }
}

#[test]
fn remove_one() {
    each_engine!(insert_remove_all(&[0]));
}

#[test]
fn remove_two() {
    each_engine!(insert_remove_all(&[0, 1]));
    each_engine!(insert_remove_all(&[1, 0]));
}

#[test]
fn remove_three() {
    each_engine!(insert_remove_all(&[0, 1, 2]));
    each_engine!(insert_remove_all(&[0, 2, 1]));
    each_engine!(insert_remove_all(&[1, 0, 2]));
    each_engine!(insert_remove_all(&[1, 2, 0]));
    each_engine!(insert_remove_all(&[2, 0, 1]));
    each_engine!(insert_remove_all(&[2, 1, 0]));
}

#[test]
fn remove_six() {
    for keys in &permutations(6) {
        each_engine!(insert_remove_all(keys));
    }
}

fn clone_keeps_ids<T: SearchTree<Key = u32>>(mut tree: T) {
    for key in [8, 3, 10, 1, 6, 14, 4, 7, 13] {
        tree.insert(key).unwrap();
    }
    let before = tree.traversal(Traversal::LevelOrder).unwrap();

    let mut copy = tree.clone();
    assert_eq!(copy.traversal(Traversal::LevelOrder).unwrap(), before);

    copy.delete(&6).unwrap();
    copy.insert(20).unwrap();
    assert_eq!(tree.traversal(Traversal::LevelOrder).unwrap(), before);
    assert_eq!(tree.len(), 9);
    assert_eq!(copy.len(), 9);
}

#[test]
fn clones_are_isolated() {
    each_engine!(clone_keeps_ids());
}

fn failed_calls_change_nothing<T: SearchTree<Key = u32>>(mut tree: T) {
    assert_eq!(tree.delete(&1), Err(TreeError::EmptyStructure));
    assert_eq!(tree.min(), Err(TreeError::EmptyStructure));
    assert_eq!(
        tree.traversal(Traversal::PreOrder),
        Err(TreeError::EmptyStructure)
    );
    assert!(tree.keys().is_empty());

    for key in [5, 2, 9] {
        tree.insert(key).unwrap();
    }
    let shape = tree.hierarchy();
    assert!(matches!(tree.delete(&4), Err(TreeError::KeyNotFound(_))));
    assert!(matches!(tree.with_deleted(&4), Err(TreeError::KeyNotFound(_))));
    assert_eq!(tree.hierarchy(), shape);
    assert_eq!(tree.len(), 3);
}

#[test]
fn failures_leave_trees_untouched() {
    each_engine!(failed_calls_change_nothing());
}

fn frames_can_be_disabled<T: SearchTree<Key = u32>>(mut tree: T) {
    for key in 0..32 {
        tree.insert(key).unwrap();
        assert!(tree.trace().frames().is_empty());
    }
    for key in (0..32).step_by(3) {
        tree.delete(&key).unwrap();
        assert!(tree.trace().frames().is_empty());
    }
    tree.validate().unwrap();
}

#[test]
fn disabled_frames_keep_events() {
    let config = TreeConfig::default().with_frames(false);

    let mut avl: AvlTree<u32> = AvlTree::with_config(config.clone());
    avl.insert(1).unwrap();
    avl.insert(2).unwrap();
    avl.insert(3).unwrap();
    assert_eq!(avl.trace().len(), 1);
    assert!(avl.trace().frames().is_empty());
    assert_eq!(avl.trace().steps().count(), 0);

    frames_can_be_disabled(AvlTree::<u32>::with_config(config.clone()));
    frames_can_be_disabled(RedBlackTree::<u32>::with_config(config.clone()));
    frames_can_be_disabled(SplayTree::<u32>::with_config(config.clone()));
    frames_can_be_disabled(TwoThreeTree::<u32>::with_config(config.clone()));
    frames_can_be_disabled(BTree::<u32>::with_config(config.clone()).unwrap());
}

fn comparator_reverses_order<T: SearchTree<Key = u32>>(mut tree: T) {
    for key in [3, 1, 4, 5, 9, 2, 6] {
        tree.insert(key).unwrap();
        tree.validate().unwrap();
    }
    assert_eq!(tree.keys(), vec![9, 6, 5, 4, 3, 2, 1]);
    assert_eq!(tree.min(), Ok(9));
    assert_eq!(tree.max(), Ok(1));
}

#[test]
fn custom_comparators() {
    let config = TreeConfig::default();
    let rev = || FnComparator(|a: &u32, b: &u32| b.cmp(a));

    comparator_reverses_order(AvlTree::with_comparator(rev(), config.clone()));
    comparator_reverses_order(RedBlackTree::with_comparator(rev(), config.clone()));
    comparator_reverses_order(SplayTree::with_comparator(rev(), config.clone()));
    comparator_reverses_order(TwoThreeTree::with_comparator(rev(), config.clone()));
    comparator_reverses_order(BTree::<u32, (), _>::with_comparator(rev(), config).unwrap());
}

#[test]
fn splay_delete_roots_the_neighbor() {
    use model::{ItemValue::Random, Op};

    let ops = vec![
        Op::Insert(Random(1)),
        Op::Insert(Random(5)),
        Op::Insert(Random(3)),
        Op::Insert(Random(7)),
        Op::Search(Random(1)),
        Op::Remove(Random(1)),
        Op::Remove(Random(7)),
        Op::Remove(Random(3)),
        Op::Remove(Random(5)),
    ];
    model::run_btree_equivalence(SplayTree::<u32>::new(), Access::Splay, ops);
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..256;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn avl_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(AvlTree::<u32>::new(), Access::Static, ops);
    }

    #[test]
    fn red_black_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(RedBlackTree::<u32>::new(), Access::Static, ops);
    }

    #[test]
    fn splay_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(SplayTree::<u32>::new(), Access::Splay, ops);
    }

    #[test]
    fn two_three_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(TwoThreeTree::<u32>::new(), Access::Static, ops);
    }

    #[test]
    fn btree_equivalence(
        engine in model::engine_strategy(),
        ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE),
    ) {
        model::run_equivalence(engine, ops);
    }

    #[test]
    fn btree_degree_equivalence(
        degree in 0u8..4,
        ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE),
    ) {
        model::run_equivalence(EngineKind::BTree(degree), ops);
    }
}
