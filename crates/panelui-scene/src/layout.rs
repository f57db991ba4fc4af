#![forbid(unsafe_code)]

//! Two-pass constraint layout.
//!
//! Pass one ([`SceneTree::min_size`]) walks bottom-up collecting minimum
//! sizes; pass two ([`SceneTree::layout`]) walks top-down handing each
//! child a position and an allocation. A node's offset is carved out of
//! its allocation rather than added outside it, so a container always
//! hands out exactly the space it owns.
//!
//! Containers that cannot fit their children's minimums fail with
//! [`SceneError::Overflow`] instead of clipping; a truncated gauge is a
//! worse failure mode on an instrument panel than a visible error.
//!
//! Flexible sizes use floor division; remainder pixels stay unassigned
//! at the end of the axis, which keeps sibling widths deterministic.

use panelui_core::geometry::Size;
use panelui_core::id::NodeId;

use crate::error::SceneError;
use crate::tree::{Alignment, Arrangement, Axis, Content, GridSpec, LinearSpec, SceneTree};

impl SceneTree {
    /// Lay out the whole tree against the screen size.
    ///
    /// Every node whose resolved bounds change has both its old and new
    /// area marked stale. Clears the relayout flag on success; a failed
    /// pass leaves it set so the caller can retry after fixing the tree.
    pub fn layout(&mut self) -> Result<(), SceneError> {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            width = self.screen_size().width,
            height = self.screen_size().height,
            "layout pass"
        );
        let screen = self.screen_size();
        self.place(NodeId::ROOT, 0, 0, screen.width, screen.height)?;
        self.layout_done();
        Ok(())
    }

    /// Minimum space a node needs from its container, including the
    /// node's own offset.
    ///
    /// Fixed dimensions count as-is; flexible ones fall back to renderer
    /// or content minimums. A fixed container smaller than its content
    /// still reports the content size, so the overflow shows up here
    /// rather than as silent clipping further down.
    pub fn min_size(&self, id: NodeId) -> Result<Size, SceneError> {
        let node = self.node_ref(id)?;
        let content = match &node.content {
            Content::Leaf(renderer) => renderer.min_size(),
            Content::Branch(arrangement) => self.content_min(id, arrangement)?,
        };
        let width = node.fixed_width.unwrap_or(content.width).max(content.width);
        let height = node
            .fixed_height
            .unwrap_or(content.height)
            .max(content.height);
        Ok(Size::new(
            width.saturating_add(node.rel_x),
            height.saturating_add(node.rel_y),
        ))
    }

    fn content_min(&self, id: NodeId, arrangement: &Arrangement) -> Result<Size, SceneError> {
        let children = self.node_ref(id)?.children.clone();
        match arrangement {
            Arrangement::Linear(spec) => {
                let mut main: u32 = 0;
                let mut cross: u16 = 0;
                let mut packed: u32 = 0;
                for child in children {
                    if self.node_ref(child)?.abs_pos.is_some() {
                        continue;
                    }
                    let min = self.min_size(child)?;
                    let (m, c) = along(spec.axis, min);
                    main += m as u32;
                    cross = cross.max(c);
                    packed += 1;
                }
                if packed > 1 {
                    main += spec.spacing as u32 * (packed - 1);
                }
                Ok(across(spec.axis, clamp_u16(main), cross))
            }
            // A grid divides whatever it is given; it imposes no
            // content-derived minimum of its own. Per-cell fit is
            // checked during placement.
            Arrangement::Grid(_) => Ok(Size::ZERO),
            Arrangement::Free => {
                let mut out = Size::ZERO;
                for child in children {
                    if self.node_ref(child)?.abs_pos.is_some() {
                        continue;
                    }
                    out = out.max(self.min_size(child)?);
                }
                Ok(out)
            }
        }
    }

    /// Resolve one node's geometry and recurse into its children.
    ///
    /// `(dx, dy)` is the allocation origin; the node's own offset and
    /// absolute-position override are applied here, and the offset is
    /// subtracted from the allocated extent.
    fn place(
        &mut self,
        id: NodeId,
        dx: u16,
        dy: u16,
        alloc_w: u16,
        alloc_h: u16,
    ) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        let old = node.bounds();
        let (x, y) = node
            .abs_pos
            .unwrap_or((dx.saturating_add(node.rel_x), dy.saturating_add(node.rel_y)));
        node.x = x;
        node.y = y;
        node.width = alloc_w.saturating_sub(node.rel_x);
        node.height = alloc_h.saturating_sub(node.rel_y);
        let new = node.bounds();
        if old != new {
            if old.size() != new.size() {
                node.needs_paint = true;
            }
            let slot = node.tracker;
            self.mark_rect_dirty(slot, old);
            self.mark_rect_dirty(slot, new);
        }

        let arrangement = match &self.node_ref(id)?.content {
            Content::Branch(arrangement) => arrangement.clone(),
            Content::Leaf(_) => return Ok(()),
        };
        match arrangement {
            Arrangement::Linear(spec) => self.arrange_linear(id, spec),
            Arrangement::Grid(spec) => self.arrange_grid(id, spec),
            Arrangement::Free => self.arrange_free(id),
        }
    }

    fn arrange_linear(&mut self, id: NodeId, spec: LinearSpec) -> Result<(), SceneError> {
        let bounds = self.node_ref(id)?.bounds();
        let children = self.node_ref(id)?.children.clone();
        if children.is_empty() {
            return Ok(());
        }
        let (main_total, cross_total) = along(spec.axis, bounds.size());
        let (main_origin, cross_origin) = along(spec.axis, Size::new(bounds.x, bounds.y));

        // First pass over the children: minimums, flexibility, totals.
        struct Entry {
            child: NodeId,
            min_main: u16,
            min_cross: u16,
            main_flex: bool,
            cross_flex: bool,
        }
        let mut entries = Vec::with_capacity(children.len());
        let mut required_main: u32 = 0;
        let mut required_cross: u16 = 0;
        let mut fixed_main: u32 = 0;
        let mut flex_count: u32 = 0;
        for child in children {
            let node = self.node_ref(child)?;
            if node.abs_pos.is_some() {
                let min = self.min_size(child)?;
                self.place(child, 0, 0, min.width, min.height)?;
                continue;
            }
            let (main_fixed, cross_fixed) = match spec.axis {
                Axis::Horizontal => (node.fixed_width, node.fixed_height),
                Axis::Vertical => (node.fixed_height, node.fixed_width),
            };
            let min = self.min_size(child)?;
            let (min_main, min_cross) = along(spec.axis, min);
            required_main += min_main as u32;
            required_cross = required_cross.max(min_cross);
            if main_fixed.is_none() {
                flex_count += 1;
            } else {
                fixed_main += min_main as u32;
            }
            entries.push(Entry {
                child,
                min_main,
                min_cross,
                main_flex: main_fixed.is_none(),
                cross_flex: cross_fixed.is_none(),
            });
        }
        if entries.is_empty() {
            return Ok(());
        }
        let spacing_total = spec.spacing as u32 * (entries.len() as u32 - 1);
        required_main += spacing_total;
        if required_main > main_total as u32 || required_cross > cross_total {
            return Err(SceneError::Overflow {
                node: id,
                available: bounds.size(),
                required: across(spec.axis, clamp_u16(required_main), required_cross),
            });
        }

        // Flexible children split the remainder evenly, floor division.
        let flex_each = if flex_count > 0 {
            let remainder = main_total as u32 - fixed_main - spacing_total;
            clamp_u16(remainder / flex_count)
        } else {
            0
        };
        for entry in &entries {
            if entry.main_flex && entry.min_main > flex_each {
                return Err(SceneError::Overflow {
                    node: id,
                    available: across(spec.axis, flex_each, cross_total),
                    required: across(spec.axis, entry.min_main, entry.min_cross),
                });
            }
        }

        let mut cursor = if spec.reverse {
            main_origin.saturating_add(main_total)
        } else {
            main_origin
        };
        for entry in entries {
            let alloc_main = if entry.main_flex {
                flex_each
            } else {
                entry.min_main
            };
            let alloc_cross = if entry.cross_flex {
                cross_total
            } else {
                entry.min_cross
            };
            let cross_pos = cross_origin.saturating_add(match spec.align {
                Alignment::Start => 0,
                Alignment::Center => (cross_total - alloc_cross.min(cross_total)) / 2,
                Alignment::End => cross_total - alloc_cross.min(cross_total),
            });
            if spec.reverse {
                cursor = cursor.saturating_sub(alloc_main);
            }
            let (child_x, child_y) = match spec.axis {
                Axis::Horizontal => (cursor, cross_pos),
                Axis::Vertical => (cross_pos, cursor),
            };
            let (alloc_w, alloc_h) = match spec.axis {
                Axis::Horizontal => (alloc_main, alloc_cross),
                Axis::Vertical => (alloc_cross, alloc_main),
            };
            self.place(entry.child, child_x, child_y, alloc_w, alloc_h)?;
            if spec.reverse {
                cursor = cursor.saturating_sub(spec.spacing);
            } else {
                cursor = cursor
                    .saturating_add(alloc_main)
                    .saturating_add(spec.spacing);
            }
        }
        Ok(())
    }

    fn arrange_grid(&mut self, id: NodeId, spec: GridSpec) -> Result<(), SceneError> {
        let bounds = self.node_ref(id)?.bounds();
        let children = self.node_ref(id)?.children.clone();

        let col_gaps = spec.col_spacing as u32 * (spec.cols as u32 - 1);
        let row_gaps = spec.row_spacing as u32 * (spec.rows as u32 - 1);
        let cell_w = clamp_u16((bounds.width as u32).saturating_sub(col_gaps) / spec.cols as u32);
        let cell_h = clamp_u16((bounds.height as u32).saturating_sub(row_gaps) / spec.rows as u32);

        for child in children {
            if self.node_ref(child)?.abs_pos.is_some() {
                let min = self.min_size(child)?;
                self.place(child, 0, 0, min.width, min.height)?;
                continue;
            }
            let Some(area) = spec.area_of(child) else {
                continue;
            };
            // A span of n cells also absorbs the n-1 gaps between them.
            let span_w = cell_w
                .saturating_mul(area.col_span)
                .saturating_add(spec.col_spacing.saturating_mul(area.col_span - 1));
            let span_h = cell_h
                .saturating_mul(area.row_span)
                .saturating_add(spec.row_spacing.saturating_mul(area.row_span - 1));
            let min = self.min_size(child)?;
            if min.width > span_w || min.height > span_h {
                return Err(SceneError::Overflow {
                    node: id,
                    available: Size::new(span_w, span_h),
                    required: min,
                });
            }
            let node = self.node_ref(child)?;
            let alloc_w = if node.fixed_width.is_some() {
                min.width
            } else {
                span_w
            };
            let alloc_h = if node.fixed_height.is_some() {
                min.height
            } else {
                span_h
            };
            let cx = bounds
                .x
                .saturating_add(area.col.saturating_mul(cell_w.saturating_add(spec.col_spacing)));
            let cy = bounds
                .y
                .saturating_add(area.row.saturating_mul(cell_h.saturating_add(spec.row_spacing)));
            self.place(child, cx, cy, alloc_w, alloc_h)?;
        }
        Ok(())
    }

    fn arrange_free(&mut self, id: NodeId) -> Result<(), SceneError> {
        let bounds = self.node_ref(id)?.bounds();
        let children = self.node_ref(id)?.children.clone();
        for child in children {
            let min = self.min_size(child)?;
            let node = self.node_ref(child)?;
            if node.abs_pos.is_some() {
                self.place(child, 0, 0, min.width, min.height)?;
                continue;
            }
            if min.width > bounds.width || min.height > bounds.height {
                return Err(SceneError::Overflow {
                    node: id,
                    available: bounds.size(),
                    required: min,
                });
            }
            let alloc_w = if node.fixed_width.is_some() {
                min.width
            } else {
                bounds.width
            };
            let alloc_h = if node.fixed_height.is_some() {
                min.height
            } else {
                bounds.height
            };
            self.place(child, bounds.x, bounds.y, alloc_w, alloc_h)?;
        }
        Ok(())
    }
}

/// Project a size onto (main, cross) for the given axis.
#[inline]
fn along(axis: Axis, size: Size) -> (u16, u16) {
    match axis {
        Axis::Horizontal => (size.width, size.height),
        Axis::Vertical => (size.height, size.width),
    }
}

/// Rebuild a size from (main, cross) for the given axis.
#[inline]
fn across(axis: Axis, main: u16, cross: u16) -> Size {
    match axis {
        Axis::Horizontal => Size::new(main, cross),
        Axis::Vertical => Size::new(cross, main),
    }
}

#[inline]
fn clamp_u16(v: u32) -> u16 {
    v.min(u16::MAX as u32) as u16
}
