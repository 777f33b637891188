use rstest::rstest;
use serde_json::json;

use steptree::{
    AvlTree, BTree, Event, RedBlackTree, SearchTree, SplayTree, Tag, Traversal, TreeConfig,
    TreeError, TwoThreeTree,
};

fn btree(min_degree: usize) -> BTree<u32> {
    BTree::with_config(TreeConfig::default().with_min_degree(min_degree)).unwrap()
}

#[rstest]
#[case::avl(AvlTree::<u32>::new())]
#[case::red_black(RedBlackTree::<u32>::new())]
#[case::splay(SplayTree::<u32>::new())]
#[case::two_three(TwoThreeTree::<u32>::new())]
#[case::btree_2(btree(2))]
#[case::btree_4(btree(4))]
fn only_key_deleted_leaves_empty_tree(#[case] mut tree: impl SearchTree<Key = u32>) {
    tree.insert(7).unwrap();
    let removed = tree.delete(&7).unwrap();

    assert_eq!(removed.key, 7);
    assert!(tree.is_empty());
    assert_eq!(tree.root_id(), None);
    assert!(tree.hierarchy().is_empty());
    assert_eq!(tree.delete(&7), Err(TreeError::EmptyStructure));
    tree.validate().unwrap();
}

#[rstest]
#[case::avl(AvlTree::<u32>::new())]
#[case::red_black(RedBlackTree::<u32>::new())]
#[case::splay(SplayTree::<u32>::new())]
#[case::two_three(TwoThreeTree::<u32>::new())]
#[case::btree_2(btree(2))]
#[case::btree_3(btree(3))]
fn mixed_workload_keeps_invariants(
    #[case] mut tree: impl SearchTree<Key = u32>,
    #[values(16, 100)] size: u32,
) {
    let keys: Vec<u32> = (0..size).map(|i| (i * 7919) % 1009).collect();
    for &key in &keys {
        tree.insert(key).unwrap();
        tree.validate().unwrap();
    }
    assert_eq!(tree.len(), keys.len());

    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(tree.keys(), sorted);
    assert_eq!(tree.min(), Ok(sorted[0]));
    assert_eq!(tree.max(), Ok(sorted[sorted.len() - 1]));

    for key in keys.iter().filter(|k| *k % 3 == 0) {
        tree.delete(key).unwrap();
        tree.validate().unwrap();
    }
    sorted.retain(|k| k % 3 != 0);
    assert_eq!(tree.keys(), sorted);

    let in_order: Vec<u32> = tree
        .traversal(Traversal::InOrder)
        .unwrap()
        .into_iter()
        .map(|v| v.value)
        .collect();
    assert_eq!(in_order, sorted);
    for order in Traversal::ALL {
        assert_eq!(tree.traversal(order).unwrap().len(), sorted.len());
    }
}

#[rstest]
#[case::avl(AvlTree::<u32>::new())]
#[case::red_black(RedBlackTree::<u32>::new())]
#[case::splay(SplayTree::<u32>::new())]
#[case::two_three(TwoThreeTree::<u32>::new())]
#[case::btree(btree(2))]
fn copy_on_write_preserves_receiver(#[case] mut tree: impl SearchTree<Key = u32>) {
    for key in [50, 20, 80, 10, 30, 70, 90, 60] {
        tree.insert(key).unwrap();
    }
    let shape = tree.hierarchy();
    let root = tree.root_id();

    let inserted = tree.with_inserted(65).unwrap();
    assert!(inserted.tree.contains(&65));
    assert!(!tree.contains(&65));
    assert!(inserted.result.created);
    assert_eq!(inserted.trace.frames().len(), inserted.trace.len());

    let deleted = tree.with_deleted(&50).unwrap();
    assert_eq!(deleted.result.key, 50);
    assert_eq!(deleted.tree.len(), 7);

    let searched = tree.with_searched(&30);
    assert!(searched.result.found);

    assert_eq!(tree.hierarchy(), shape);
    assert_eq!(tree.root_id(), root);
    assert_eq!(tree.len(), 8);
}

#[rstest]
#[case::avl(AvlTree::<u32>::with_config(TreeConfig::default().with_capacity(3)))]
#[case::red_black(RedBlackTree::<u32>::with_config(TreeConfig::default().with_capacity(3)))]
#[case::two_three(TwoThreeTree::<u32>::with_config(TreeConfig::default().with_capacity(3)))]
#[case::btree(BTree::<u32>::with_config(TreeConfig::default().with_capacity(3)).unwrap())]
fn capacity_and_duplicates_are_rejected(#[case] mut tree: impl SearchTree<Key = u32>) {
    for key in [1, 2, 3] {
        tree.insert(key).unwrap();
    }
    let shape = tree.hierarchy();

    assert_eq!(tree.insert(4), Err(TreeError::CapacityExceeded { capacity: 3 }));
    tree.delete(&3).unwrap();
    assert!(matches!(tree.insert(2), Err(TreeError::DuplicateKey(_))));
    assert_eq!(tree.capacity(), 3);
    assert_ne!(tree.hierarchy(), shape);
}

#[test]
fn avl_hierarchy_json() {
    let mut tree = AvlTree::<u32>::new();
    for key in [10, 20, 30] {
        tree.insert(key).unwrap();
    }

    let value = serde_json::to_value(tree.hierarchy()).unwrap();
    assert_eq!(
        value,
        json!({
            "id": 1,
            "value": 20,
            "children": [
                { "id": 0, "value": 10, "meta": { "height": 1, "balance": 0 } },
                { "id": 2, "value": 30, "meta": { "height": 1, "balance": 0 } },
            ],
            "meta": { "height": 2, "balance": 0 },
        })
    );
}

#[test]
fn missing_child_serializes_as_null() {
    let mut tree = RedBlackTree::<u32>::new();
    tree.insert(2).unwrap();
    tree.insert(1).unwrap();

    let value = serde_json::to_value(tree.hierarchy()).unwrap();
    assert_eq!(
        value,
        json!({
            "id": 0,
            "value": 2,
            "children": [
                { "id": 1, "value": 1, "meta": { "color": "red" } },
                null,
            ],
            "meta": { "color": "black" },
        })
    );
}

#[test]
fn multiway_hierarchy_json() {
    let mut tree = btree(2);
    for key in 1..=4 {
        tree.insert(key).unwrap();
    }

    let value = serde_json::to_value(tree.hierarchy()).unwrap();
    assert_eq!(
        value,
        json!({
            "id": 1,
            "keys": [2],
            "children": [
                { "id": 0, "keys": [1] },
                { "id": 2, "keys": [3, 4] },
            ],
        })
    );
}

#[test]
fn rotation_event_json() {
    let mut tree = AvlTree::<u32>::new();
    tree.insert(10).unwrap();
    tree.insert(20).unwrap();
    let revision = tree.with_inserted(30).unwrap();

    let value = serde_json::to_value(&revision.trace).unwrap();
    assert_eq!(
        value["events"],
        json!([{
            "kind": "rotation",
            "dir": "left",
            "node": 0,
            "child": 1,
            "grandparent": null,
            "moved": null,
            "tag": "rr",
            "step": "single",
        }])
    );
    assert_eq!(value["frames"].as_array().map(Vec::len), Some(1));
    assert_eq!(value["frames"][0]["value"], json!(20));
}

#[test]
fn splay_tags_are_kebab_case() {
    let mut tree = SplayTree::<u32>::new();
    for key in [3, 2, 1] {
        tree.insert(key).unwrap();
    }
    tree.search(&3);

    let trace = tree.take_trace();
    assert!(trace.events().iter().all(|e| e.tag() == Tag::ZigZig));
    let value = serde_json::to_value(&trace).unwrap();
    assert_eq!(value["events"][0]["tag"], json!("zig-zig"));
    assert_eq!(value["events"][1]["step"], json!("second"));
}

#[test]
fn split_and_recolor_events_json() {
    let mut two_three = TwoThreeTree::<u32>::new();
    for key in [1, 2, 3] {
        two_three.insert(key).unwrap();
    }
    let value = serde_json::to_value(two_three.trace()).unwrap();
    assert_eq!(value["events"][0]["kind"], json!("split"));
    assert_eq!(value["events"][0]["promoted"], json!(2));
    assert_eq!(value["events"][0]["tag"], json!("overflow"));

    let mut red_black = RedBlackTree::<u32>::new();
    red_black.insert(1).unwrap();
    let events = red_black.trace().events();
    assert!(matches!(events, [Event::Recolor { .. }]));
    let value = serde_json::to_value(red_black.trace()).unwrap();
    assert_eq!(
        value["events"][0],
        json!({ "kind": "recolor", "node": 0, "color": "black", "tag": "insert-fixup" })
    );
}

#[test]
fn config_deserializes_with_defaults() {
    let config: TreeConfig =
        serde_json::from_value(json!({ "min_degree": 3, "record_frames": false })).unwrap();
    assert_eq!(config, TreeConfig::default().with_min_degree(3).with_frames(false));

    let tree: BTree<u32> = BTree::with_config(config).unwrap();
    assert_eq!(tree.min_degree(), 3);
}
