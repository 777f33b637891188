//! Error types for tree operations

use thiserror::Error;

/// Result type alias using `TreeError`
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors reported by the tree engines.
///
/// All of these are raised before any structural change, so the tree a failed call was made on
/// is observably unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The engine already holds as many keys as its configured ceiling allows
    #[error("capacity exceeded: tree is limited to {capacity} keys")]
    CapacityExceeded { capacity: usize },

    /// The key compares equal to one already stored
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// The key is not stored in the tree
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The operation needs at least one key
    #[error("tree is empty")]
    EmptyStructure,

    /// A structural invariant does not hold; always a defect in the engine
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The configuration cannot describe a valid tree
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TreeError {
    pub(crate) fn duplicate<K: core::fmt::Debug>(key: &K) -> Self {
        TreeError::DuplicateKey(format!("{key:?}"))
    }

    pub(crate) fn not_found<K: core::fmt::Debug>(key: &K) -> Self {
        TreeError::KeyNotFound(format!("{key:?}"))
    }

    pub(crate) fn violation(msg: impl Into<String>) -> Self {
        TreeError::InvariantViolation(msg.into())
    }
}
