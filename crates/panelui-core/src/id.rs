#![forbid(unsafe_code)]

//! Node identifiers.
//!
//! The scene tree is an arena; nodes refer to each other by plain index
//! handles instead of owning pointers, so parent/child links never form
//! reference cycles. A `NodeId` is only meaningful for the tree that
//! issued it.

use std::fmt;

/// Stable handle for a node in a scene tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// The root node of every tree.
    pub const ROOT: Self = Self(0);

    /// Create a handle from a raw arena index.
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// The raw arena index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this handle names the root.
    #[inline]
    #[must_use]
    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}
