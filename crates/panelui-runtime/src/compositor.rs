#![forbid(unsafe_code)]

//! Dirty-gated compositing.
//!
//! The walk starts at the root and prunes any subtree whose bounds miss
//! the surface's stale area, so a single changed widget costs one
//! renderer run and one blit, not a full-screen repaint.
//!
//! Per surface, paint order is: container background fill (clipped to
//! each stale rectangle), then children in ascending z. An offscreen
//! container switches surface: its children composite into the cached
//! private buffer under its own tracker, and the buffer is blitted onto
//! the parent surface as a whole.

use panelui_core::id::NodeId;
use panelui_render::buffer::PixelBuffer;
use panelui_scene::{SceneError, SceneTree};

/// Repaint every node intersecting its surface's stale area into
/// `screen`.
///
/// Layout must be current; trackers are read, not cleared. The caller
/// flushes the stale window afterwards and then clears the trackers.
pub fn compose(tree: &mut SceneTree, screen: &mut PixelBuffer) -> Result<(), SceneError> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("compose").entered();
    visit(tree, NodeId::ROOT, screen, 0, 0, 0)
}

fn visit(
    tree: &mut SceneTree,
    id: NodeId,
    dest: &mut PixelBuffer,
    origin_x: u16,
    origin_y: u16,
    slot: usize,
) -> Result<(), SceneError> {
    let bounds = tree.bounds(id)?;
    let stale = tree
        .tracker_at(slot)
        .is_some_and(|tracker| tracker.intersects(&bounds));
    if !stale {
        return Ok(());
    }

    if tree.is_leaf(id)? {
        tree.paint_leaf(id)?;
        if let Some(buffer) = tree.buffer_of(id) {
            dest.blit(
                buffer,
                bounds.x.saturating_sub(origin_x),
                bounds.y.saturating_sub(origin_y),
            );
        }
        return Ok(());
    }

    // A hidden branch paints nothing; an ancestor's background fill
    // reclaims the area.
    if !tree.is_visible(id)? {
        return Ok(());
    }

    if let Some(background) = tree.background(id)? {
        // Fill per stale rect, matching the per-rect visit gate. Filling
        // the bounding envelope instead would erase clean widgets sitting
        // between disjoint stale rects, which the gate then skips.
        let stale_rects = tree
            .tracker_at(slot)
            .map(|tracker| tracker.regions())
            .unwrap_or_default();
        for region in stale_rects {
            if let Some(fill) = bounds.intersection_opt(&region) {
                dest.fill_rect(fill.relative_to(origin_x, origin_y), background);
            }
        }
    }

    if tree.is_offscreen(id)? {
        let own_slot = tree.tracker_slot_of(id)?;
        let mut buffer = match tree.take_buffer(id)? {
            Some(buffer) => buffer,
            None => PixelBuffer::new(bounds.width, bounds.height),
        };
        if (buffer.width(), buffer.height()) != (bounds.width, bounds.height) {
            buffer.resize(bounds.width, bounds.height);
            tree.mark_dirty(id)?;
        }
        for child in tree.children_by_z(id)? {
            visit(tree, child, &mut buffer, bounds.x, bounds.y, own_slot)?;
        }
        dest.blit(
            &buffer,
            bounds.x.saturating_sub(origin_x),
            bounds.y.saturating_sub(origin_y),
        );
        tree.put_buffer(id, buffer)?;
    } else {
        for child in tree.children_by_z(id)? {
            visit(tree, child, dest, origin_x, origin_y, slot)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use panelui_core::geometry::Rect;
    use panelui_render::color::Rgb565;
    use panelui_scene::{Arrangement, LeafRenderer, Node, PaintStyle};

    use super::*;

    struct Swatch {
        color: Rgb565,
        painted: u32,
    }

    impl Swatch {
        fn new(color: Rgb565) -> Self {
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

    fn composed(tree: &mut SceneTree) -> PixelBuffer {
        let size = tree.screen_size();
        let mut screen = PixelBuffer::new(size.width, size.height);
        tree.layout().unwrap();
        compose(tree, &mut screen).unwrap();
        screen
    }

    #[test]
    fn first_frame_paints_background_and_leaves() {
        let mut tree = SceneTree::new(40, 20);
        let leaf = tree
            .add_child(
                NodeId::ROOT,
                Node::leaf(Swatch::new(Rgb565::RED)).with_size(10, 10).at(5, 5),
            )
            .unwrap();
        let screen = composed(&mut tree);

        assert_eq!(screen.pixel(0, 0), Some(Rgb565::BLACK));
        assert_eq!(screen.pixel(7, 7), Some(Rgb565::RED));
        assert_eq!(tree.renderer::<Swatch>(leaf).unwrap().painted, 1);
    }

    #[test]
    fn clean_subtrees_are_skipped() {
        let mut tree = SceneTree::new(40, 20);
        let left = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::RED)).with_size(10, 10))
            .unwrap();
        let right = tree
            .add_child(
                NodeId::ROOT,
                Node::leaf(Swatch::new(Rgb565::BLUE)).with_size(10, 10).at(30, 0),
            )
            .unwrap();
        let mut screen = composed(&mut tree);
        tree.clear_dirty();

        // Only the left leaf goes stale; the right renderer must not run.
        tree.invalidate(left).unwrap();
        compose(&mut tree, &mut screen).unwrap();
        assert_eq!(tree.renderer::<Swatch>(left).unwrap().painted, 2);
        assert_eq!(tree.renderer::<Swatch>(right).unwrap().painted, 1);
    }

    #[test]
    fn disjoint_damage_spares_the_widget_in_between() {
        let mut tree = SceneTree::new(60, 10);
        let left = tree
            .add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::RED)).with_size(20, 10))
            .unwrap();
        let middle = tree
            .add_child(
                NodeId::ROOT,
                Node::leaf(Swatch::new(Rgb565::GREEN)).with_size(20, 10).at(20, 0),
            )
            .unwrap();
        let right = tree
            .add_child(
                NodeId::ROOT,
                Node::leaf(Swatch::new(Rgb565::BLUE)).with_size(20, 10).at(40, 0),
            )
            .unwrap();
        let mut screen = composed(&mut tree);
        tree.clear_dirty();

        // Two stale rects flank the clean middle widget; the background
        // fill must not reach across the gap and erase it.
        tree.invalidate(left).unwrap();
        tree.invalidate(right).unwrap();
        compose(&mut tree, &mut screen).unwrap();
        assert_eq!(screen.pixel(30, 5), Some(Rgb565::GREEN));
        assert_eq!(tree.renderer::<Swatch>(middle).unwrap().painted, 1);
        assert_eq!(tree.renderer::<Swatch>(left).unwrap().painted, 2);
        assert_eq!(tree.renderer::<Swatch>(right).unwrap().painted, 2);
    }

    #[test]
    fn vacated_area_repaints_as_background() {
        let mut tree = SceneTree::new(40, 20);
        let leaf = tree
            .add_child(
                NodeId::ROOT,
                Node::leaf(Swatch::new(Rgb565::RED)).with_size(10, 10).at(5, 5),
            )
            .unwrap();
        let mut screen = composed(&mut tree);
        tree.clear_dirty();

        tree.remove_child(NodeId::ROOT, leaf).unwrap();
        tree.layout().unwrap();
        compose(&mut tree, &mut screen).unwrap();
        assert_eq!(screen.pixel(7, 7), Some(Rgb565::BLACK));
    }

    #[test]
    fn hidden_leaf_yields_to_the_backdrop() {
        let mut tree = SceneTree::new(40, 20);
        let leaf = tree
            .add_child(
                NodeId::ROOT,
                Node::leaf(Swatch::new(Rgb565::RED)).with_size(10, 10).at(5, 5),
            )
            .unwrap();
        let mut screen = composed(&mut tree);
        assert_eq!(screen.pixel(7, 7), Some(Rgb565::RED));
        tree.clear_dirty();

        tree.hide(leaf).unwrap();
        compose(&mut tree, &mut screen).unwrap();
        assert_eq!(screen.pixel(7, 7), Some(Rgb565::BLACK));
    }

    #[test]
    fn z_order_decides_overlap() {
        let mut tree = SceneTree::new(40, 20);
        tree.add_child(
            NodeId::ROOT,
            Node::leaf(Swatch::new(Rgb565::RED)).with_size(10, 10).with_z(5),
        )
        .unwrap();
        tree.add_child(NodeId::ROOT, Node::leaf(Swatch::new(Rgb565::BLUE)).with_size(10, 10))
            .unwrap();
        let screen = composed(&mut tree);
        assert_eq!(screen.pixel(5, 5), Some(Rgb565::RED));
    }

    #[test]
    fn offscreen_container_composites_through_its_buffer() {
        let mut tree = SceneTree::new(40, 20);
        let panel = tree
            .add_child(
                NodeId::ROOT,
                Node::branch(Arrangement::Free)
                    .with_size(20, 10)
                    .at(10, 5)
                    .offscreen(),
            )
            .unwrap();
        let inner = tree
            .add_child(panel, Node::leaf(Swatch::new(Rgb565::GREEN)).with_size(4, 4).with_offset(2, 2))
            .unwrap();
        let mut screen = composed(&mut tree);
        assert_eq!(screen.pixel(13, 8), Some(Rgb565::GREEN));
        tree.clear_dirty();

        // An interior change repaints through the cached buffer.
        tree.with_renderer::<Swatch, _>(inner, |s| s.color = Rgb565::BLUE)
            .unwrap();
        compose(&mut tree, &mut screen).unwrap();
        assert_eq!(screen.pixel(13, 8), Some(Rgb565::BLUE));
    }
}
