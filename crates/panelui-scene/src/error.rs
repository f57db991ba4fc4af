#![forbid(unsafe_code)]

//! Scene graph errors.

use panelui_core::geometry::Size;
use panelui_core::id::NodeId;

use crate::tree::GridArea;

/// Errors from scene tree mutation and layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The node id does not refer to a live node.
    UnknownNode {
        /// The offending id.
        node: NodeId,
    },
    /// Attempted to attach a child under a leaf node.
    LeafWithChildren {
        /// The leaf that was used as a parent.
        node: NodeId,
    },
    /// A grid-only operation was applied to a non-grid container.
    NotAGrid {
        /// The container in question.
        node: NodeId,
    },
    /// A plain `add_child` was used on a grid, which needs a [`GridArea`].
    GridNeedsArea {
        /// The grid container.
        node: NodeId,
    },
    /// A renderer operation was applied to a branch, or the renderer is
    /// not of the requested concrete type.
    NotALeaf {
        /// The node in question.
        node: NodeId,
    },
    /// The root node cannot be detached or despawned.
    RootDetach,
    /// The child is not attached to the given parent.
    NotAChild {
        /// The presumed parent.
        parent: NodeId,
        /// The node that was not found among its children.
        child: NodeId,
    },
    /// A grid area lies outside the grid's row/column range.
    SpanOutOfRange {
        /// The requested area.
        area: GridArea,
        /// Rows in the grid.
        rows: u16,
        /// Columns in the grid.
        cols: u16,
    },
    /// A grid cell is already occupied and the grid forbids overlap.
    CellOccupied {
        /// Row of the contested cell.
        row: u16,
        /// Column of the contested cell.
        col: u16,
        /// The node already holding the cell.
        by: NodeId,
    },
    /// Children's minimum sizes exceed the space given to a container.
    ///
    /// Layout fails fast instead of silently clipping content.
    Overflow {
        /// The container that could not fit its children.
        node: NodeId,
        /// The space the container was given.
        available: Size,
        /// The space its children require.
        required: Size,
    },
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneError::UnknownNode { node } => {
                write!(f, "unknown node {node}")
            }
            SceneError::LeafWithChildren { node } => {
                write!(f, "leaf {node} cannot hold children")
            }
            SceneError::NotAGrid { node } => {
                write!(f, "{node} is not a grid container")
            }
            SceneError::GridNeedsArea { node } => {
                write!(f, "{node} is a grid; children must be placed with a grid area")
            }
            SceneError::NotALeaf { node } => {
                write!(f, "{node} has no renderer of the requested type")
            }
            SceneError::RootDetach => {
                write!(f, "the root node cannot be detached")
            }
            SceneError::NotAChild { parent, child } => {
                write!(f, "{child} is not a child of {parent}")
            }
            SceneError::SpanOutOfRange { area, rows, cols } => {
                write!(
                    f,
                    "grid area at ({}, {}) spanning {}x{} exceeds a {rows}x{cols} grid",
                    area.row, area.col, area.row_span, area.col_span
                )
            }
            SceneError::CellOccupied { row, col, by } => {
                write!(f, "grid cell ({row}, {col}) is already occupied by {by}")
            }
            SceneError::Overflow {
                node,
                available,
                required,
            } => {
                write!(
                    f,
                    "children of {node} need {}x{} but only {}x{} is available",
                    required.width, required.height, available.width, available.height
                )
            }
        }
    }
}

impl std::error::Error for SceneError {}
