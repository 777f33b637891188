//! Replayable record of the structural changes made by one operation.
//!
//! Every event is paired with the hierarchy frame captured immediately after it, so a replayer can
//! step from frame to frame without re-deriving shapes from raw mutations.

use serde::Serialize;
use tracing::trace;

use crate::{binary::Dir, snapshot::Hierarchy, NodeId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Black,
}

/// Why an event happened.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tag {
    /// AVL left-left case: single right rotation
    Ll,
    /// AVL left-right case
    Lr,
    /// AVL right-right case: single left rotation
    Rr,
    /// AVL right-left case
    Rl,
    Zig,
    ZigZig,
    ZigZag,
    /// Splay removal of the root, joining its two subtrees
    SplitJoin,
    /// Red-black repair after insertion
    InsertFixup,
    /// Red-black repair after removing a black node
    DeleteFixup,
    /// Red-black successor taking over the color of the node it replaces
    Transplant,
    /// 2-3 split of a node holding three keys
    Overflow,
    /// 2-3 repair of a node left without keys
    Underflow,
    /// B-tree split of a full node met while descending
    Presplit,
    /// B-tree top-up of a minimal child before descending into it
    TopUp,
    /// B-tree merge of the two children around a key deleted from an internal node
    Internal,
}

/// Position of a rotation within a compound rebalancing step.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Single,
    First,
    Second,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event<K> {
    /// `node` moved down in direction `dir` and its child `child` took its place.
    Rotation {
        dir: Dir,
        node: NodeId,
        child: NodeId,
        /// Parent of `node` before the rotation
        grandparent: Option<NodeId>,
        /// Root of the subtree that changed parents, from `child` to `node`
        moved: Option<NodeId>,
        tag: Tag,
        step: Step,
    },
    Recolor {
        node: NodeId,
        color: Color,
        tag: Tag,
    },
    /// `node` overflowed; its upper half moved to the new `sibling` and `promoted` went up into
    /// `parent`.
    Split {
        node: NodeId,
        sibling: NodeId,
        parent: NodeId,
        promoted: K,
        tag: Tag,
    },
    /// `absorbed` and the `separator` key from `parent` were folded into `node`.
    Merge {
        node: NodeId,
        absorbed: NodeId,
        parent: NodeId,
        separator: K,
        tag: Tag,
    },
    /// `node` received the `parent` separator; `key` moved from `sibling` (on side `from`) into
    /// `parent`.
    Borrow {
        node: NodeId,
        sibling: NodeId,
        parent: NodeId,
        key: K,
        from: Dir,
        tag: Tag,
    },
    /// `removed` left the tree with `key`. `root` is the root of what remained and `attached` the
    /// subtree hung off its right side, if any.
    Join {
        removed: NodeId,
        key: K,
        root: Option<NodeId>,
        attached: Option<NodeId>,
        tag: Tag,
    },
}

impl<K> Event<K> {
    pub fn tag(&self) -> Tag {
        match self {
            Event::Rotation { tag, .. }
            | Event::Recolor { tag, .. }
            | Event::Split { tag, .. }
            | Event::Merge { tag, .. }
            | Event::Borrow { tag, .. }
            | Event::Join { tag, .. } => *tag,
        }
    }

    pub fn is_rotation(&self) -> bool {
        matches!(self, Event::Rotation { .. })
    }
}

/// Events of one operation, with one frame per event when frame capture is enabled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Trace<K> {
    events: Vec<Event<K>>,
    frames: Vec<Hierarchy<K>>,
}

impl<K> Default for Trace<K> {
    fn default() -> Self {
        Trace {
            events: Vec::new(),
            frames: Vec::new(),
        }
    }
}

impl<K: core::fmt::Debug> Trace<K> {
    pub(crate) fn push(&mut self, event: Event<K>, frame: Option<Hierarchy<K>>) {
        trace!(?event, "structural event");
        self.events.push(event);
        if let Some(frame) = frame {
            self.frames.push(frame);
        }
    }
}

impl<K> Trace<K> {
    pub fn events(&self) -> &[Event<K>] {
        &self.events
    }

    pub fn frames(&self) -> &[Hierarchy<K>] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn rotations(&self) -> impl Iterator<Item = &Event<K>> + '_ {
        self.events.iter().filter(|e| e.is_rotation())
    }

    /// Events paired with the frame captured after each one.
    ///
    /// Empty when frames were not recorded.
    pub fn steps(&self) -> impl Iterator<Item = (&Event<K>, &Hierarchy<K>)> + '_ {
        self.events.iter().zip(self.frames.iter())
    }

    pub fn into_parts(self) -> (Vec<Event<K>>, Vec<Hierarchy<K>>) {
        (self.events, self.frames)
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
        self.frames.clear();
    }
}
