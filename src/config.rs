//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::{Result, TreeError};

/// Default ceiling on the number of keys an engine holds.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default B-tree minimum degree; `t = 2` makes a 2-3-4 tree.
pub const DEFAULT_MIN_DEGREE: usize = 2;

/// Configuration shared by all engines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Maximum number of keys; inserts beyond it are rejected
    pub capacity: usize,
    /// Minimum degree `t` of the B-tree engine (ignored by the others)
    pub min_degree: usize,
    /// Capture a hierarchy frame after every trace event
    pub record_frames: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            min_degree: DEFAULT_MIN_DEGREE,
            record_frames: true,
        }
    }
}

impl TreeConfig {
    /// Set the key ceiling
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the B-tree minimum degree
    pub fn with_min_degree(mut self, min_degree: usize) -> Self {
        self.min_degree = min_degree;
        self
    }

    /// Enable or disable frame capture
    pub fn with_frames(mut self, record_frames: bool) -> Self {
        self.record_frames = record_frames;
        self
    }

    /// Largest number of keys a B-tree node may hold, `2t - 1`.
    pub fn max_keys(&self) -> usize {
        2 * self.min_degree - 1
    }

    pub(crate) fn check_degree(&self) -> Result<()> {
        if self.min_degree < 2 {
            return Err(TreeError::InvalidConfig(format!(
                "minimum degree must be at least 2, got {}",
                self.min_degree
            )));
        }
        Ok(())
    }
}
