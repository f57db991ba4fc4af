#![forbid(unsafe_code)]

//! The scene arena.
//!
//! Nodes live in a flat `Vec` and refer to each other by [`NodeId`]
//! indices. Every structural mutation (add, detach, hide, resize) feeds
//! the dirty trackers and flags the tree for relayout; the scheduler's
//! layout and paint tasks pick both up on the next cycle.
//!
//! # Dirty trackers
//!
//! The tree owns one tracker per compositing surface: slot 0 tracks the
//! screen, and each offscreen container gets a slot of its own when it
//! is attached. A node records the slot its damage reports into; all
//! trackers hold screen-space rects. Damage recorded in an offscreen
//! slot also escalates into the parent slot, widened to the offscreen
//! container's bounds, so an interior change deep inside the subtree
//! schedules the on-screen blit without leaking interior detail.

use std::any::Any;
use std::collections::BTreeMap;

use panelui_core::event::{Event, EventKind};
use panelui_core::geometry::{Rect, Size};
use panelui_core::id::NodeId;
use panelui_core::state::WidgetState;
use panelui_render::buffer::PixelBuffer;
use panelui_render::color::Rgb565;
use panelui_render::dirty::{DirtyRegion, MergeRegions};

use crate::error::SceneError;

/// Everything a leaf renderer gets to know while painting.
#[derive(Debug, Clone, Copy)]
pub struct PaintStyle {
    /// The leaf's current laid-out size; the buffer matches it.
    pub size: Size,
    /// Inherited background, if the leaf wants an opaque backdrop.
    pub background: Option<Rgb565>,
    /// Interaction state, for pressed/focused/checked looks.
    pub state: WidgetState,
}

/// Paints a leaf node's content into its private buffer.
///
/// Renderers draw in buffer-local coordinates starting at the origin;
/// positioning on screen is the compositor's job. Pixels left at the
/// buffer's transparency key let the parent background show through.
pub trait LeafRenderer: 'static {
    /// Render into `buffer`, which is pre-sized to `style.size` and
    /// pre-filled with the transparency key.
    fn paint(&mut self, style: &PaintStyle, buffer: &mut PixelBuffer);

    /// Minimum content size, used when the node has no fixed size.
    fn min_size(&self) -> Size {
        Size::ZERO
    }

    /// Concrete-type access for [`SceneTree::with_renderer`].
    fn as_any(&self) -> &dyn Any;

    /// Mutable concrete-type access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Main axis of a linear container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Axis {
    /// Children packed left to right.
    #[default]
    Horizontal,
    /// Children packed top to bottom.
    Vertical,
}

/// Cross-axis placement of a child inside a linear container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    /// Flush with the top/left edge.
    #[default]
    Start,
    /// Centered.
    Center,
    /// Flush with the bottom/right edge.
    End,
}

/// Layout parameters of a linear (row/column) container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearSpec {
    /// Packing axis.
    pub axis: Axis,
    /// Gap between adjacent children, not before the first or after the
    /// last.
    pub spacing: u16,
    /// Cross-axis alignment of fixed-size children.
    pub align: Alignment,
    /// Pack from the far edge backwards.
    pub reverse: bool,
}

impl LinearSpec {
    /// A left-to-right row.
    #[must_use]
    pub fn row() -> Self {
        Self {
            axis: Axis::Horizontal,
            spacing: 0,
            align: Alignment::Start,
            reverse: false,
        }
    }

    /// A top-to-bottom column.
    #[must_use]
    pub fn column() -> Self {
        Self {
            axis: Axis::Vertical,
            ..Self::row()
        }
    }

    /// Set the gap between children.
    #[must_use]
    pub fn with_spacing(mut self, spacing: u16) -> Self {
        self.spacing = spacing;
        self
    }

    /// Set the cross-axis alignment.
    #[must_use]
    pub fn with_align(mut self, align: Alignment) -> Self {
        self.align = align;
        self
    }

    /// Pack children from the far edge.
    #[must_use]
    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }
}

/// A cell range inside a grid container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridArea {
    /// Top row (0-indexed).
    pub row: u16,
    /// Left column (0-indexed).
    pub col: u16,
    /// Rows covered, at least 1.
    pub row_span: u16,
    /// Columns covered, at least 1.
    pub col_span: u16,
}

impl GridArea {
    /// A single cell.
    #[must_use]
    pub const fn cell(row: u16, col: u16) -> Self {
        Self {
            row,
            col,
            row_span: 1,
            col_span: 1,
        }
    }

    /// A multi-cell span.
    #[must_use]
    pub const fn span(row: u16, col: u16, row_span: u16, col_span: u16) -> Self {
        Self {
            row,
            col,
            row_span,
            col_span,
        }
    }
}

/// Layout parameters and occupancy bookkeeping of a grid container.
#[derive(Debug, Clone)]
pub struct GridSpec {
    /// Number of rows.
    pub rows: u16,
    /// Number of columns.
    pub cols: u16,
    /// Vertical gap between rows.
    pub row_spacing: u16,
    /// Horizontal gap between columns.
    pub col_spacing: u16,
    /// Permit two children to claim the same cell.
    pub allow_overlap: bool,
    /// Which node holds each cell, row-major. First claimant wins the
    /// slot even when overlap is permitted.
    cells: Vec<Option<NodeId>>,
    areas: BTreeMap<NodeId, GridArea>,
}

impl GridSpec {
    /// Create an empty grid. Zero rows or columns are bumped to 1.
    #[must_use]
    pub fn new(rows: u16, cols: u16) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            rows,
            cols,
            row_spacing: 0,
            col_spacing: 0,
            allow_overlap: false,
            cells: vec![None; rows as usize * cols as usize],
            areas: BTreeMap::new(),
        }
    }

    /// Set the gaps between rows and columns.
    #[must_use]
    pub fn with_spacing(mut self, row_spacing: u16, col_spacing: u16) -> Self {
        self.row_spacing = row_spacing;
        self.col_spacing = col_spacing;
        self
    }

    /// Allow children to overlap in the same cells.
    #[must_use]
    pub fn with_overlap(mut self) -> Self {
        self.allow_overlap = true;
        self
    }

    /// The area a child occupies, if it was placed in this grid.
    #[must_use]
    pub fn area_of(&self, child: NodeId) -> Option<GridArea> {
        self.areas.get(&child).copied()
    }

    fn in_range(&self, area: GridArea) -> bool {
        area.row_span >= 1
            && area.col_span >= 1
            && area.row as u32 + area.row_span as u32 <= self.rows as u32
            && area.col as u32 + area.col_span as u32 <= self.cols as u32
    }

    fn claim(&mut self, child: NodeId, area: GridArea) -> Result<(), SceneError> {
        // Validate every cell before touching any, so a rejected claim
        // leaves the occupancy map untouched.
        for row in area.row..area.row + area.row_span {
            for col in area.col..area.col + area.col_span {
                let idx = row as usize * self.cols as usize + col as usize;
                if let Some(by) = self.cells[idx] {
                    if !self.allow_overlap {
                        return Err(SceneError::CellOccupied { row, col, by });
                    }
                }
            }
        }
        for row in area.row..area.row + area.row_span {
            for col in area.col..area.col + area.col_span {
                let idx = row as usize * self.cols as usize + col as usize;
                if self.cells[idx].is_none() {
                    self.cells[idx] = Some(child);
                }
            }
        }
        self.areas.insert(child, area);
        Ok(())
    }

    fn release(&mut self, child: NodeId) {
        if self.areas.remove(&child).is_some() {
            for cell in &mut self.cells {
                if *cell == Some(child) {
                    *cell = None;
                }
            }
        }
    }
}

/// How a branch arranges its children.
#[derive(Debug, Clone)]
pub enum Arrangement {
    /// Row or column packing with flexible-size distribution.
    Linear(LinearSpec),
    /// Fixed rows and columns with spans.
    Grid(GridSpec),
    /// Children place themselves via offsets and absolute positions.
    Free,
}

/// Listener invoked when a bound event kind reaches its node.
///
/// Listeners receive the whole tree so they can mutate widgets; the
/// router temporarily detaches them from the node while they run.
pub type Listener = Box<dyn FnMut(&mut SceneTree, NodeId, &mut Event)>;

pub(crate) enum Content {
    Branch(Arrangement),
    Leaf(Box<dyn LeafRenderer>),
}

/// A scene node under construction or in the arena.
pub struct Node {
    pub(crate) content: Content,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Absolute screen position override; exempts the node from
    /// container placement.
    pub(crate) abs_pos: Option<(u16, u16)>,
    pub(crate) rel_x: u16,
    pub(crate) rel_y: u16,
    pub(crate) z: i16,
    /// Resolved screen position, written by layout.
    pub(crate) x: u16,
    pub(crate) y: u16,
    /// Resolved size, written by layout (or fixed).
    pub(crate) width: u16,
    pub(crate) height: u16,
    /// `Some` pins the dimension; `None` lets the container choose.
    pub(crate) fixed_width: Option<u16>,
    pub(crate) fixed_height: Option<u16>,
    pub(crate) visible: bool,
    pub(crate) state: WidgetState,
    pub(crate) background: Option<Rgb565>,
    pub(crate) offscreen: bool,
    pub(crate) listeners: BTreeMap<EventKind, Vec<Listener>>,
    /// Dirty tracker slot this node's damage reports into.
    pub(crate) tracker: usize,
    /// Leaf paint target, or an offscreen branch's composite buffer.
    pub(crate) buffer: Option<PixelBuffer>,
    pub(crate) needs_paint: bool,
}

impl Node {
    fn bare(content: Content) -> Self {
        Self {
            content,
            parent: None,
            children: Vec::new(),
            abs_pos: None,
            rel_x: 0,
            rel_y: 0,
            z: 0,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            fixed_width: None,
            fixed_height: None,
            visible: true,
            state: WidgetState::empty(),
            background: None,
            offscreen: false,
            listeners: BTreeMap::new(),
            tracker: 0,
            buffer: None,
            needs_paint: true,
        }
    }

    /// A container node with the given arrangement.
    #[must_use]
    pub fn branch(arrangement: Arrangement) -> Self {
        Self::bare(Content::Branch(arrangement))
    }

    /// A paintable node driven by `renderer`.
    #[must_use]
    pub fn leaf(renderer: impl LeafRenderer) -> Self {
        Self::bare(Content::Leaf(Box::new(renderer)))
    }

    /// Pin both dimensions.
    #[must_use]
    pub fn with_size(mut self, width: u16, height: u16) -> Self {
        self.fixed_width = Some(width);
        self.fixed_height = Some(height);
        self.width = width;
        self.height = height;
        self
    }

    /// Pin the width only; height stays flexible.
    #[must_use]
    pub fn with_width(mut self, width: u16) -> Self {
        self.fixed_width = Some(width);
        self.width = width;
        self
    }

    /// Pin the height only; width stays flexible.
    #[must_use]
    pub fn with_height(mut self, height: u16) -> Self {
        self.fixed_height = Some(height);
        self.height = height;
        self
    }

    /// Offset from the container-assigned position. The offset is taken
    /// out of the node's allocation, not added outside it.
    #[must_use]
    pub fn with_offset(mut self, rel_x: u16, rel_y: u16) -> Self {
        self.rel_x = rel_x;
        self.rel_y = rel_y;
        self
    }

    /// Place at an absolute screen position, ignoring the container.
    #[must_use]
    pub fn at(mut self, x: u16, y: u16) -> Self {
        self.abs_pos = Some((x, y));
        self
    }

    /// Paint order among siblings; higher values paint later (on top).
    #[must_use]
    pub fn with_z(mut self, z: i16) -> Self {
        self.z = z;
        self
    }

    /// Opaque backdrop painted under this node's subtree.
    #[must_use]
    pub fn with_background(mut self, color: Rgb565) -> Self {
        self.background = Some(color);
        self
    }

    /// Composite this branch through its own buffer and dirty tracker.
    ///
    /// Interior churn then costs one keyed blit of the cached buffer
    /// instead of a full subtree walk on the parent surface.
    #[must_use]
    pub fn offscreen(mut self) -> Self {
        self.offscreen = true;
        self
    }

    /// Start out hidden. The node keeps its layout slot.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Start out with the given interaction state.
    #[must_use]
    pub fn with_state(mut self, state: WidgetState) -> Self {
        self.state = state;
        self
    }

    /// Current screen bounds.
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self.content, Content::Leaf(_))
    }
}

struct TrackerSlot {
    region: Box<dyn DirtyRegion>,
    /// Parent surface's slot. All trackers hold screen-space rects.
    escalate: Option<usize>,
    /// The offscreen container this slot belongs to; `None` for the
    /// screen. Escalated damage widens to the owner's bounds so interior
    /// detail stays private to the sub-buffer.
    owner: Option<NodeId>,
}

/// The retained widget tree plus its dirty trackers.
pub struct SceneTree {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    trackers: Vec<TrackerSlot>,
    screen: Size,
    layout_needed: bool,
}

impl SceneTree {
    /// Create a tree for a screen of the given size, tracking damage
    /// with the default region-merge strategy.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self::with_tracker(width, height, Box::new(MergeRegions::new()))
    }

    /// Create a tree with an explicit screen dirty tracker.
    ///
    /// The root is a free-form container fixed to the screen size with a
    /// black background, so vacated areas clear to black by default.
    #[must_use]
    pub fn with_tracker(width: u16, height: u16, mut region: Box<dyn DirtyRegion>) -> Self {
        let root = Node::branch(Arrangement::Free)
            .with_size(width, height)
            .with_background(Rgb565::BLACK);
        // The very first cycle repaints everything.
        region.add(Rect::from_size(width, height));
        Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
            trackers: vec![TrackerSlot {
                region,
                escalate: None,
                owner: None,
            }],
            screen: Size::new(width, height),
            layout_needed: true,
        }
    }

    /// The screen size this tree lays out against.
    #[inline]
    #[must_use]
    pub fn screen_size(&self) -> Size {
        self.screen
    }

    pub(crate) fn node_ref(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(SceneError::UnknownNode { node: id })
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(SceneError::UnknownNode { node: id })
    }

    /// Current screen bounds of a node.
    pub fn bounds(&self, id: NodeId) -> Result<Rect, SceneError> {
        Ok(self.node_ref(id)?.bounds())
    }

    /// The node's parent, if attached.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, SceneError> {
        Ok(self.node_ref(id)?.parent)
    }

    /// Child ids in insertion order.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId], SceneError> {
        Ok(&self.node_ref(id)?.children)
    }

    /// Child ids in paint order: ascending z, insertion order breaking
    /// ties.
    pub fn children_by_z(&self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        let mut out = self.node_ref(id)?.children.clone();
        out.sort_by_key(|&child| {
            self.nodes
                .get(child.index())
                .and_then(Option::as_ref)
                .map_or(0, |n| n.z)
        });
        Ok(out)
    }

    /// Whether the node paints (leaves) rather than arranges (branches).
    pub fn is_leaf(&self, id: NodeId) -> Result<bool, SceneError> {
        Ok(self.node_ref(id)?.is_leaf())
    }

    /// Whether the node is an offscreen-composited branch.
    pub fn is_offscreen(&self, id: NodeId) -> Result<bool, SceneError> {
        Ok(self.node_ref(id)?.offscreen)
    }

    /// Whether the node is currently shown.
    pub fn is_visible(&self, id: NodeId) -> Result<bool, SceneError> {
        Ok(self.node_ref(id)?.visible)
    }

    /// The node's interaction state.
    pub fn state(&self, id: NodeId) -> Result<WidgetState, SceneError> {
        Ok(self.node_ref(id)?.state)
    }

    /// Replace the interaction state, scheduling a repaint on change.
    pub fn set_state(&mut self, id: NodeId, state: WidgetState) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        if node.state != state {
            node.state = state;
            self.invalidate(id)?;
        }
        Ok(())
    }

    /// The node's backdrop color, if any.
    pub fn background(&self, id: NodeId) -> Result<Option<Rgb565>, SceneError> {
        Ok(self.node_ref(id)?.background)
    }

    /// Set or clear the backdrop, scheduling a repaint.
    pub fn set_background(
        &mut self,
        id: NodeId,
        color: Option<Rgb565>,
    ) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        if node.background != color {
            node.background = color;
            self.invalidate(id)?;
        }
        Ok(())
    }

    /// Attach a new node under `parent` and return its id.
    ///
    /// Grids reject this; use [`add_to_grid`](Self::add_to_grid).
    pub fn add_child(&mut self, parent: NodeId, node: Node) -> Result<NodeId, SceneError> {
        match &self.node_ref(parent)?.content {
            Content::Leaf(_) => return Err(SceneError::LeafWithChildren { node: parent }),
            Content::Branch(Arrangement::Grid(_)) => {
                return Err(SceneError::GridNeedsArea { node: parent });
            }
            Content::Branch(_) => {}
        }
        Ok(self.insert_under(parent, node))
    }

    /// Attach a new node into a grid container at the given cell area.
    pub fn add_to_grid(
        &mut self,
        parent: NodeId,
        node: Node,
        area: GridArea,
    ) -> Result<NodeId, SceneError> {
        // Validate before allocating so a failed claim leaves no orphan.
        match &self.node_ref(parent)?.content {
            Content::Leaf(_) => return Err(SceneError::LeafWithChildren { node: parent }),
            Content::Branch(Arrangement::Grid(grid)) => {
                if !grid.in_range(area) {
                    return Err(SceneError::SpanOutOfRange {
                        area,
                        rows: grid.rows,
                        cols: grid.cols,
                    });
                }
            }
            Content::Branch(_) => return Err(SceneError::NotAGrid { node: parent }),
        }

        let id = self.next_id();
        if let Content::Branch(Arrangement::Grid(grid)) = &mut self.node_mut(parent)?.content {
            grid.claim(id, area)?;
        }
        let inserted = self.insert_under(parent, node);
        debug_assert_eq!(inserted, id);
        Ok(inserted)
    }

    fn next_id(&self) -> NodeId {
        match self.free.last() {
            Some(&slot) => NodeId::from_index(slot),
            None => NodeId::from_index(self.nodes.len()),
        }
    }

    fn insert_under(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let id = self.next_id();
        let parent_slot = self
            .nodes
            .get(parent.index())
            .and_then(Option::as_ref)
            .map_or(0, |p| p.tracker);

        node.parent = Some(parent);
        node.tracker = if node.offscreen {
            let own = self.trackers.len();
            self.trackers.push(TrackerSlot {
                region: Box::new(MergeRegions::new()),
                escalate: Some(parent_slot),
                owner: Some(id),
            });
            own
        } else {
            parent_slot
        };

        match self.free.pop() {
            Some(slot) => self.nodes[slot] = Some(node),
            None => self.nodes.push(Some(node)),
        }
        if let Some(p) = self.nodes.get_mut(parent.index()).and_then(Option::as_mut) {
            p.children.push(id);
        }
        self.layout_needed = true;
        id
    }

    /// Detach `child` from `parent`, leaving the subtree in the arena
    /// for later reattachment via [`despawn`](Self::despawn) or
    /// [`reattach`](Self::reattach).
    ///
    /// The vacated screen area is marked stale so whatever was behind
    /// the child repaints.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        if child.is_root() {
            return Err(SceneError::RootDetach);
        }
        let vacated = self.node_ref(child)?.bounds();
        let slot = self.node_ref(child)?.tracker;

        let parent_node = self.node_mut(parent)?;
        let Some(pos) = parent_node.children.iter().position(|&c| c == child) else {
            return Err(SceneError::NotAChild { parent, child });
        };
        parent_node.children.remove(pos);
        if let Content::Branch(Arrangement::Grid(grid)) = &mut parent_node.content {
            grid.release(child);
        }

        self.mark_rect_dirty(slot, vacated);
        let child_node = self.node_mut(child)?;
        child_node.parent = None;
        // Detached subtrees keep reporting into the screen tracker;
        // over-invalidation is safe, a missed repaint is not.
        self.propagate_tracker(child, 0);
        self.layout_needed = true;
        Ok(())
    }

    /// Re-attach a previously detached subtree under a new parent.
    pub fn reattach(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        if child.is_root() {
            return Err(SceneError::RootDetach);
        }
        match &self.node_ref(parent)?.content {
            Content::Leaf(_) => return Err(SceneError::LeafWithChildren { node: parent }),
            Content::Branch(Arrangement::Grid(_)) => {
                return Err(SceneError::GridNeedsArea { node: parent });
            }
            Content::Branch(_) => {}
        }
        if self.node_ref(child)?.parent.is_some() {
            return Err(SceneError::NotAChild {
                parent,
                child,
            });
        }
        let parent_slot = self.node_ref(parent)?.tracker;
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        self.propagate_tracker(child, parent_slot);
        self.layout_needed = true;
        Ok(())
    }

    /// Detach (if attached) and free a node and all its descendants.
    ///
    /// The freed ids become invalid; holding on to them yields
    /// [`SceneError::UnknownNode`] later.
    pub fn despawn(&mut self, id: NodeId) -> Result<(), SceneError> {
        if id.is_root() {
            return Err(SceneError::RootDetach);
        }
        if let Some(parent) = self.node_ref(id)?.parent {
            self.remove_child(parent, id)?;
        }
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(cur.index()).and_then(Option::take) {
                stack.extend(node.children);
                self.free.push(cur.index());
            }
        }
        Ok(())
    }

    /// Point a subtree's damage at the given tracker slot. Offscreen
    /// nodes keep their own slot but re-home its escalation target.
    fn propagate_tracker(&mut self, id: NodeId, slot: usize) {
        let mut stack = vec![(id, slot)];
        while let Some((cur, slot)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(cur.index()).and_then(Option::as_mut) else {
                continue;
            };
            let child_slot = if node.offscreen {
                let own = node.tracker;
                if let Some(t) = self.trackers.get_mut(own) {
                    t.escalate = Some(slot);
                }
                own
            } else {
                node.tracker = slot;
                slot
            };
            let node = match self.nodes.get(cur.index()).and_then(Option::as_ref) {
                Some(n) => n,
                None => continue,
            };
            for &child in &node.children {
                stack.push((child, child_slot));
            }
        }
    }

    /// Hide a node. It keeps its layout slot; the area repaints as the
    /// parent background.
    pub fn hide(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.set_visible(id, false)
    }

    /// Show a previously hidden node.
    pub fn show(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.set_visible(id, true)
    }

    fn set_visible(&mut self, id: NodeId, visible: bool) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        if node.visible != visible {
            node.visible = visible;
            node.needs_paint = true;
            self.mark_dirty(id)?;
        }
        Ok(())
    }

    /// Resize a node's fixed dimensions.
    ///
    /// Without `force`, flexible dimensions are left to the container
    /// and only fixed ones change. With `force`, both dimensions are
    /// pinned to the given size. Both the old and new areas are marked
    /// stale.
    pub fn resize(
        &mut self,
        id: NodeId,
        width: u16,
        height: u16,
        force: bool,
    ) -> Result<(), SceneError> {
        let old = self.node_ref(id)?.bounds();
        let node = self.node_mut(id)?;
        let mut changed = false;
        if force || node.fixed_width.is_some() {
            changed |= node.fixed_width != Some(width);
            node.fixed_width = Some(width);
            node.width = width;
        }
        if force || node.fixed_height.is_some() {
            changed |= node.fixed_height != Some(height);
            node.fixed_height = Some(height);
            node.height = height;
        }
        if changed {
            let node = self.node_mut(id)?;
            node.needs_paint = true;
            let new = node.bounds();
            let slot = node.tracker;
            self.mark_rect_dirty(slot, old);
            self.mark_rect_dirty(slot, new);
            self.layout_needed = true;
        }
        Ok(())
    }

    /// Move a node's offset within its container allocation.
    pub fn set_offset(&mut self, id: NodeId, rel_x: u16, rel_y: u16) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        if (node.rel_x, node.rel_y) != (rel_x, rel_y) {
            let old = node.bounds();
            let slot = node.tracker;
            node.rel_x = rel_x;
            node.rel_y = rel_y;
            self.mark_rect_dirty(slot, old);
            self.layout_needed = true;
        }
        Ok(())
    }

    /// Change paint order among siblings.
    pub fn set_z(&mut self, id: NodeId, z: i16) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        if node.z != z {
            node.z = z;
            self.mark_dirty(id)?;
        }
        Ok(())
    }

    /// Mark a node's current bounds stale in its tracker.
    pub fn mark_dirty(&mut self, id: NodeId) -> Result<(), SceneError> {
        let node = self.node_ref(id)?;
        let (slot, bounds) = (node.tracker, node.bounds());
        self.mark_rect_dirty(slot, bounds);
        Ok(())
    }

    /// Mark a node stale and schedule its renderer to run again.
    pub fn invalidate(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.node_mut(id)?.needs_paint = true;
        self.mark_dirty(id)
    }

    /// Feed a stale rectangle into a tracker slot and escalate it up the
    /// surface chain, so damage inside an offscreen subtree also
    /// schedules the on-screen blit of its container.
    ///
    /// On each escalation step the rect widens to cover the owning
    /// container's screen bounds; parent surfaces learn the container
    /// went stale, not its interior detail.
    pub(crate) fn mark_rect_dirty(&mut self, slot: usize, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        let mut cur = Some((slot, rect));
        while let Some((slot, rect)) = cur {
            let Some(entry) = self.trackers.get_mut(slot) else {
                return;
            };
            entry.region.add(rect);
            let next = entry.escalate;
            let owner = entry.owner;
            cur = next.map(|next_slot| {
                // Union, not replacement: damage outside the current
                // bounds (an old position, a vacated area) must still
                // reach the parent surface.
                let escalated = owner
                    .and_then(|id| self.node_ref(id).ok())
                    .map_or(rect, |node| node.bounds().union(&rect));
                (next_slot, escalated)
            });
        }
    }

    /// The screen-level dirty tracker.
    #[must_use]
    pub fn screen_tracker(&self) -> &dyn DirtyRegion {
        self.trackers[0].region.as_ref()
    }

    /// The tracker slot a node's damage reports into.
    pub fn tracker_of(&self, id: NodeId) -> Result<&dyn DirtyRegion, SceneError> {
        let slot = self.node_ref(id)?.tracker;
        Ok(self.trackers[slot].region.as_ref())
    }

    /// Index of the tracker slot a node reports into (compositor
    /// plumbing; pair with [`tracker_at`](Self::tracker_at)).
    pub fn tracker_slot_of(&self, id: NodeId) -> Result<usize, SceneError> {
        Ok(self.node_ref(id)?.tracker)
    }

    /// Mark an arbitrary screen rect stale, e.g. after a flush was
    /// displaced before reaching the panel.
    pub fn mark_screen_dirty(&mut self, rect: Rect) {
        self.mark_rect_dirty(0, rect);
    }

    /// Query a tracker slot by index (compositor plumbing).
    #[must_use]
    pub fn tracker_at(&self, slot: usize) -> Option<&dyn DirtyRegion> {
        self.trackers.get(slot).map(|t| t.region.as_ref())
    }

    /// Drop all stale area in every tracker. Runs once per cycle after
    /// the flush is queued.
    pub fn clear_dirty(&mut self) {
        for tracker in &mut self.trackers {
            tracker.region.clear();
        }
    }

    /// Whether any structural change requires a layout pass.
    #[inline]
    #[must_use]
    pub fn layout_needed(&self) -> bool {
        self.layout_needed
    }

    /// Force a layout pass on the next cycle.
    pub fn request_layout(&mut self) {
        self.layout_needed = true;
    }

    pub(crate) fn layout_done(&mut self) {
        self.layout_needed = false;
    }

    /// Run a closure against a leaf's concrete renderer, scheduling a
    /// repaint afterwards.
    pub fn with_renderer<T: LeafRenderer, R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, SceneError> {
        let node = self.node_mut(id)?;
        let Content::Leaf(renderer) = &mut node.content else {
            return Err(SceneError::NotALeaf { node: id });
        };
        let Some(renderer) = renderer.as_any_mut().downcast_mut::<T>() else {
            return Err(SceneError::NotALeaf { node: id });
        };
        let out = f(renderer);
        self.invalidate(id)?;
        Ok(out)
    }

    /// Read-only access to a leaf's concrete renderer.
    #[must_use]
    pub fn renderer<T: LeafRenderer>(&self, id: NodeId) -> Option<&T> {
        let node = self.node_ref(id).ok()?;
        let Content::Leaf(renderer) = &node.content else {
            return None;
        };
        renderer.as_any().downcast_ref::<T>()
    }

    /// Run a leaf's renderer if its content is stale, resizing the
    /// private buffer to the laid-out size first.
    ///
    /// Hidden leaves render as pure transparency so the parent backdrop
    /// shows through on the next blit. Returns whether the renderer ran.
    pub fn paint_leaf(&mut self, id: NodeId) -> Result<bool, SceneError> {
        let node = self.node_mut(id)?;
        let Content::Leaf(renderer) = &mut node.content else {
            return Err(SceneError::NotALeaf { node: id });
        };
        let size = Size::new(node.width, node.height);
        let buffer = node
            .buffer
            .get_or_insert_with(|| PixelBuffer::new(size.width, size.height));
        if (buffer.width(), buffer.height()) != (size.width, size.height) {
            buffer.resize(size.width, size.height);
            node.needs_paint = true;
        }
        if !node.needs_paint {
            return Ok(false);
        }
        buffer.fill(buffer.transparent_color());
        if node.visible {
            let style = PaintStyle {
                size,
                background: node.background,
                state: node.state,
            };
            renderer.paint(&style, buffer);
        }
        node.needs_paint = false;
        Ok(true)
    }

    /// A leaf's (or offscreen branch's) current pixel buffer.
    #[must_use]
    pub fn buffer_of(&self, id: NodeId) -> Option<&PixelBuffer> {
        self.node_ref(id).ok()?.buffer.as_ref()
    }

    /// Temporarily take a node's buffer out of the arena so children can
    /// be painted into it while the tree stays borrowable.
    pub fn take_buffer(&mut self, id: NodeId) -> Result<Option<PixelBuffer>, SceneError> {
        Ok(self.node_mut(id)?.buffer.take())
    }

    /// Return a buffer taken with [`take_buffer`](Self::take_buffer).
    pub fn put_buffer(&mut self, id: NodeId, buffer: PixelBuffer) -> Result<(), SceneError> {
        self.node_mut(id)?.buffer = Some(buffer);
        Ok(())
    }

    /// Register a listener for an event kind on a node.
    pub fn bind(
        &mut self,
        id: NodeId,
        kind: EventKind,
        listener: impl FnMut(&mut SceneTree, NodeId, &mut Event) + 'static,
    ) -> Result<(), SceneError> {
        self.node_mut(id)?
            .listeners
            .entry(kind)
            .or_default()
            .push(Box::new(listener));
        Ok(())
    }

    /// Remove every listener for an event kind on a node.
    pub fn unbind(&mut self, id: NodeId, kind: EventKind) -> Result<(), SceneError> {
        self.node_mut(id)?.listeners.remove(&kind);
        Ok(())
    }

    /// Whether the node has any listener for the kind.
    pub(crate) fn listens_for(&self, id: NodeId, kind: EventKind) -> bool {
        self.node_ref(id)
            .ok()
            .and_then(|n| n.listeners.get(&kind))
            .is_some_and(|v| !v.is_empty())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Renderer that fills its buffer with one color.
    pub(crate) struct Swatch {
        pub color: Rgb565,
        pub painted: u32,
    }

    impl Swatch {
        pub fn new(color: Rgb565) -> Self {
            Self { color, painted: 0 }
        }
    }

    impl LeafRenderer for Swatch {
        fn paint(&mut self, _style: &PaintStyle, buffer: &mut PixelBuffer) {
            self.painted += 1;
            buffer.fill(self.color);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn add_child_assigns_sequential_ids() {
        let mut tree = SceneTree::new(100, 100);
        let a = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::RED)))
            .unwrap();
        let b = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::BLUE)))
            .unwrap();
        assert_eq!(a, NodeId::from_index(1));
        assert_eq!(b, NodeId::from_index(2));
        assert_eq!(tree.children(NodeId::ROOT).unwrap(), &[a, b]);
        assert_eq!(tree.parent(a).unwrap(), Some(NodeId::ROOT));
    }

    #[test]
    fn leaves_reject_children() {
        let mut tree = SceneTree::new(100, 100);
        let leaf = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::RED)))
            .unwrap();
        let err = tree
            .add_child(leaf, Node::leaf(Swatch::new(Rgb565::BLUE)))
            .unwrap_err();
        assert_eq!(err, SceneError::LeafWithChildren { node: leaf });
    }

    #[test]
    fn grid_requires_area_and_rejects_double_claims() {
        let mut tree = SceneTree::new(100, 100);
        let grid = tree
            .add_child(NodeId::ROOT, Node::branch(Arrangement::Grid(GridSpec::new(2, 2))))
            .unwrap();

        let err = tree
            .add_child(grid, Node::leaf(Swatch::new(Rgb565::RED)))
            .unwrap_err();
        assert_eq!(err, SceneError::GridNeedsArea { node: grid });

        let a = tree
            .add_to_grid(grid, Node::leaf(Swatch::new(Rgb565::RED)), GridArea::cell(0, 0))
            .unwrap();
        let err = tree
            .add_to_grid(grid, Node::leaf(Swatch::new(Rgb565::BLUE)), GridArea::cell(0, 0))
            .unwrap_err();
        assert_eq!(
            err,
            SceneError::CellOccupied {
                row: 0,
                col: 0,
                by: a
            }
        );
    }

    #[test]
    fn grid_rejects_out_of_range_span() {
        let mut tree = SceneTree::new(100, 100);
        let grid = tree
            .add_child(NodeId::ROOT, Node::branch(Arrangement::Grid(GridSpec::new(2, 2))))
            .unwrap();
        let err = tree
            .add_to_grid(
                grid,
                Node::leaf(Swatch::new(Rgb565::RED)),
                GridArea::span(1, 1, 2, 1),
            )
            .unwrap_err();
        assert!(matches!(err, SceneError::SpanOutOfRange { .. }));
    }

    #[test]
    fn grid_overlap_allows_shared_cells() {
        let mut tree = SceneTree::new(100, 100);
        let grid = tree
            .add_child(
                NodeId::ROOT,
                Node::branch(Arrangement::Grid(GridSpec::new(2, 2).with_overlap())),
            )
            .unwrap();
        tree.add_to_grid(grid, Node::leaf(Swatch::new(Rgb565::RED)), GridArea::cell(0, 0))
            .unwrap();
        tree.add_to_grid(grid, Node::leaf(Swatch::new(Rgb565::BLUE)), GridArea::cell(0, 0))
            .unwrap();
    }

    #[test]
    fn remove_marks_vacated_area_stale() {
        let mut tree = SceneTree::new(100, 100);
        let leaf = tree
            .add_child(
                NodeId::ROOT,
                Node::leaf(Swatch::new(Rgb565::RED)).with_size(20, 10).at(5, 5),
            )
            .unwrap();
        // Simulate a completed layout/paint cycle.
        tree.layout().unwrap();
        tree.clear_dirty();

        tree.remove_child(NodeId::ROOT, leaf).unwrap();
        assert!(tree.screen_tracker().intersects(&Rect::new(5, 5, 20, 10)));
        assert!(tree.layout_needed());
    }

    #[test]
    fn remove_of_non_child_fails() {
        let mut tree = SceneTree::new(100, 100);
        let a = tree
            .add_child(NodeId::ROOT, Node::branch(Arrangement::Free))
            .unwrap();
        let b = tree
            .add_child(a, Node::leaf(Swatch::new(Rgb565::RED)))
            .unwrap();
        let err = tree.remove_child(NodeId::ROOT, b).unwrap_err();
        assert_eq!(
            err,
            SceneError::NotAChild {
                parent: NodeId::ROOT,
                child: b
            }
        );
    }

    #[test]
    fn despawn_frees_subtree_and_recycles_slots() {
        let mut tree = SceneTree::new(100, 100);
        let branch = tree
            .add_child(NodeId::ROOT, Node::branch(Arrangement::Free))
            .unwrap();
        let leaf = tree
            .add_child(branch, Node::leaf(Swatch::new(Rgb565::RED)))
            .unwrap();
        tree.despawn(branch).unwrap();
        assert_eq!(
            tree.bounds(leaf).unwrap_err(),
            SceneError::UnknownNode { node: leaf }
        );
        // Slots come back in LIFO order.
        let reused = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::BLUE)))
            .unwrap();
        assert!(reused == branch || reused == leaf);
    }

    #[test]
    fn root_cannot_be_detached() {
        let mut tree = SceneTree::new(100, 100);
        assert_eq!(tree.despawn(NodeId::ROOT).unwrap_err(), SceneError::RootDetach);
    }

    #[test]
    fn hide_marks_bounds_and_keeps_slot() {
        let mut tree = SceneTree::new(100, 100);
        let leaf = tree
            .add_child(
                NodeId::ROOT,
                Node::leaf(Swatch::new(Rgb565::RED)).with_size(10, 10).at(30, 30),
            )
            .unwrap();
        tree.layout().unwrap();
        tree.clear_dirty();

        tree.hide(leaf).unwrap();
        assert!(!tree.is_visible(leaf).unwrap());
        assert!(tree.screen_tracker().intersects(&Rect::new(30, 30, 10, 10)));
        // Hiding is not a structural change.
        assert_eq!(tree.bounds(leaf).unwrap(), Rect::new(30, 30, 10, 10));
    }

    #[test]
    fn resize_respects_flexibility_unless_forced() {
        let mut tree = SceneTree::new(100, 100);
        let flexible = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::RED)))
            .unwrap();
        tree.resize(flexible, 40, 40, false).unwrap();
        assert_eq!(tree.bounds(flexible).unwrap().size(), Size::ZERO);

        tree.resize(flexible, 40, 40, true).unwrap();
        assert_eq!(tree.bounds(flexible).unwrap().size(), Size::new(40, 40));
    }

    #[test]
    fn offscreen_damage_escalates_to_screen_tracker() {
        let mut tree = SceneTree::new(100, 100);
        let panel = tree
            .add_child(
                NodeId::ROOT,
                Node::branch(Arrangement::Free)
                    .with_size(40, 40)
                    .at(10, 10)
                    .offscreen(),
            )
            .unwrap();
        let inner = tree
            .add_child(panel, Node::leaf(Swatch::new(Rgb565::RED)).with_size(8, 8).at(12, 12))
            .unwrap();
        tree.layout().unwrap();
        tree.clear_dirty();

        tree.invalidate(inner).unwrap();
        // The inner rect lands in the panel's own tracker...
        assert!(tree.tracker_of(inner).unwrap().intersects(&Rect::new(12, 12, 8, 8)));
        // ...and escalates as the panel's whole screen bounds, so the
        // blit of the cached buffer is scheduled edge to edge.
        assert!(tree.screen_tracker().intersects(&Rect::new(45, 45, 2, 2)));
        assert_eq!(
            tree.screen_tracker().bounding(),
            Some(Rect::new(10, 10, 40, 40))
        );
    }

    #[test]
    fn paint_leaf_runs_once_until_invalidated() {
        let mut tree = SceneTree::new(100, 100);
        let leaf = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::RED)).with_size(4, 4))
            .unwrap();
        tree.layout().unwrap();

        assert!(tree.paint_leaf(leaf).unwrap());
        assert!(!tree.paint_leaf(leaf).unwrap());
        tree.invalidate(leaf).unwrap();
        assert!(tree.paint_leaf(leaf).unwrap());
        assert_eq!(tree.renderer::<Swatch>(leaf).unwrap().painted, 2);
    }

    #[test]
    fn hidden_leaf_paints_pure_transparency() {
        let mut tree = SceneTree::new(100, 100);
        let leaf = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::RED)).with_size(4, 4))
            .unwrap();
        tree.layout().unwrap();
        tree.paint_leaf(leaf).unwrap();
        assert_eq!(tree.buffer_of(leaf).unwrap().pixel(0, 0), Some(Rgb565::RED));

        tree.hide(leaf).unwrap();
        tree.paint_leaf(leaf).unwrap();
        let buf = tree.buffer_of(leaf).unwrap();
        assert_eq!(buf.pixel(0, 0), Some(buf.transparent_color()));
    }

    #[test]
    fn with_renderer_downcasts_and_invalidates() {
        let mut tree = SceneTree::new(100, 100);
        let leaf = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::RED)).with_size(4, 4))
            .unwrap();
        tree.layout().unwrap();
        tree.paint_leaf(leaf).unwrap();
        tree.clear_dirty();

        tree.with_renderer::<Swatch, _>(leaf, |s| s.color = Rgb565::GREEN)
            .unwrap();
        assert!(tree.screen_tracker().is_dirty());
        assert!(tree.paint_leaf(leaf).unwrap());
        assert_eq!(tree.buffer_of(leaf).unwrap().pixel(0, 0), Some(Rgb565::GREEN));
    }

    #[test]
    fn children_by_z_sorts_stably() {
        let mut tree = SceneTree::new(100, 100);
        let a = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::RED)).with_z(1))
            .unwrap();
        let b = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::BLUE)))
            .unwrap();
        let c = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::GREEN)))
            .unwrap();
        assert_eq!(tree.children_by_z(NodeId::ROOT).unwrap(), vec![b, c, a]);
    }
}
