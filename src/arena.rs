use core::ops::{Index, IndexMut};

/// Index of a node slot in an [`Arena`].
pub(crate) type Idx = u32;

/// A possibly-missing link to a node slot.
pub(crate) type Link = Option<Idx>;

/// Slot storage for tree nodes.
///
/// A node keeps its index for as long as it is stored, so links between nodes are plain indices
/// and cloning the arena duplicates the whole node graph with every link intact.
#[derive(Clone, Debug)]
pub(crate) struct Arena<N> {
    slots: Vec<Option<N>>,
    vacant: Vec<Idx>,
}

impl<N> Arena<N> {
    pub(crate) const fn new() -> Self {
        Arena {
            slots: Vec::new(),
            vacant: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, node: N) -> Idx {
        match self.vacant.pop() {
            Some(idx) => {
                debug_assert!(self.slots[idx as usize].is_none());
                self.slots[idx as usize] = Some(node);
                idx
            }
            None => {
                let idx = Idx::try_from(self.slots.len()).expect("arena index overflow");
                self.slots.push(Some(node));
                idx
            }
        }
    }

    pub(crate) fn remove(&mut self, idx: Idx) -> N {
        let node = self.slots[idx as usize]
            .take()
            .expect("removed a vacant arena slot");
        self.vacant.push(idx);
        node
    }

    #[cfg(test)]
    pub(crate) fn get(&self, idx: Idx) -> Option<&N> {
        self.slots.get(idx as usize)?.as_ref()
    }

    /// Number of occupied slots.
    pub(crate) fn occupied(&self) -> usize {
        self.slots.len() - self.vacant.len()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.vacant.clear();
    }
}

impl<N> Index<Idx> for Arena<N> {
    type Output = N;

    #[inline]
    fn index(&self, idx: Idx) -> &N {
        self.slots[idx as usize]
            .as_ref()
            .expect("dangling arena index")
    }
}

impl<N> IndexMut<Idx> for Arena<N> {
    #[inline]
    fn index_mut(&mut self, idx: Idx) -> &mut N {
        self.slots[idx as usize]
            .as_mut()
            .expect("dangling arena index")
    }
}
