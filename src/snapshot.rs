//! Immutable exports of a tree's shape for rendering collaborators.

use serde::Serialize;

use crate::{trace::Color, NodeId};

/// One slot of an exported tree.
///
/// [`Hierarchy::Empty`] stands in for a missing binary child whose sibling exists, and for the
/// root of an empty tree. It serializes as `null`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Hierarchy<K> {
    Empty,
    Node(HierarchyNode<K>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HierarchyNode<K> {
    pub id: NodeId,
    #[serde(flatten)]
    pub payload: Payload<K>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Hierarchy<K>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<NodeMeta>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload<K> {
    /// The single key of a binary node
    Value(K),
    /// The ascending keys of a multiway node
    Keys(Vec<K>),
}

/// Variant-specific node state carried into a snapshot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NodeMeta {
    Avl { height: u32, balance: i32 },
    RedBlack { color: Color },
}

impl<K> Hierarchy<K> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Hierarchy::Empty)
    }

    pub fn node(&self) -> Option<&HierarchyNode<K>> {
        match self {
            Hierarchy::Empty => None,
            Hierarchy::Node(node) => Some(node),
        }
    }

    pub fn id(&self) -> Option<NodeId> {
        self.node().map(|n| n.id)
    }

    /// Number of real (non-placeholder) nodes.
    pub fn node_count(&self) -> usize {
        match self {
            Hierarchy::Empty => 0,
            Hierarchy::Node(node) => {
                1 + node
                    .children
                    .iter()
                    .map(Hierarchy::node_count)
                    .sum::<usize>()
            }
        }
    }
}

impl<K> Payload<K> {
    pub fn keys(&self) -> &[K] {
        match self {
            Payload::Value(key) => core::slice::from_ref(key),
            Payload::Keys(keys) => keys,
        }
    }
}

/// Traversal orders offered by every engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Traversal {
    PreOrder,
    InOrder,
    PostOrder,
    LevelOrder,
}

impl Traversal {
    pub const ALL: [Traversal; 4] = [
        Traversal::PreOrder,
        Traversal::InOrder,
        Traversal::PostOrder,
        Traversal::LevelOrder,
    ];
}

/// A key visited by a traversal, with the node that holds it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Visit<K> {
    pub id: NodeId,
    pub value: K,
}
