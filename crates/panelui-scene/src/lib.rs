#![forbid(unsafe_code)]

//! The retained scene graph.
//!
//! A [`SceneTree`] is an arena of widgets addressed by [`NodeId`] handles:
//! parent and child links are plain indices, so the classic
//! parent-back-pointer ownership cycle never exists. Every node is tagged
//! as a leaf (produces pixels via a [`LeafRenderer`]) or a branch (only
//! arranges children); the compositor switches on that tag rather than
//! probing capabilities.
//!
//! The two-pass layout engine and the event router are methods on the
//! tree; see [`layout`] and [`router`].

pub mod error;
pub mod layout;
pub mod router;
pub mod tree;

pub use error::SceneError;
pub use panelui_core::id::NodeId;
pub use tree::{
    Alignment, Arrangement, Axis, GridArea, GridSpec, LeafRenderer, LinearSpec, Node, PaintStyle,
    SceneTree,
};
