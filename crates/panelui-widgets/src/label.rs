#![forbid(unsafe_code)]

//! Single-line text labels.

use std::any::Any;
use std::rc::Rc;

use panelui_core::geometry::{Sides, Size};
use panelui_render::buffer::PixelBuffer;
use panelui_render::color::Rgb565;
use panelui_scene::{LeafRenderer, PaintStyle};

use crate::font::GlyphProvider;

/// Horizontal placement of the text within the label bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    /// Flush left, inside the left padding.
    #[default]
    Left,
    /// Centered; padding is ignored horizontally.
    Center,
    /// Flush right, inside the right padding.
    Right,
}

/// A single line of monospaced text.
///
/// The text is vertically centered. With no fill color the backdrop
/// stays transparent and the container background shows between the
/// strokes.
pub struct Label {
    text: String,
    font: Rc<dyn GlyphProvider>,
    color: Rgb565,
    fill: Option<Rgb565>,
    align: TextAlign,
    padding: Sides,
}

impl Label {
    /// Create a label over a shared font.
    #[must_use]
    pub fn new(text: impl Into<String>, font: Rc<dyn GlyphProvider>) -> Self {
        Self {
            text: text.into(),
            font,
            color: Rgb565::WHITE,
            fill: None,
            align: TextAlign::Left,
            padding: Sides::all(2),
        }
    }

    /// Set the foreground color.
    #[must_use]
    pub fn with_color(mut self, color: Rgb565) -> Self {
        self.color = color;
        self
    }

    /// Set an opaque backdrop fill.
    #[must_use]
    pub fn with_fill(mut self, fill: Rgb565) -> Self {
        self.fill = Some(fill);
        self
    }

    /// Set the horizontal alignment.
    #[must_use]
    pub fn with_align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    /// Set the padding.
    #[must_use]
    pub fn with_padding(mut self, padding: Sides) -> Self {
        self.padding = padding;
        self
    }

    /// Current text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text. Use via
    /// [`SceneTree::with_renderer`](panelui_scene::SceneTree::with_renderer)
    /// so the node is invalidated.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Replace the foreground color.
    pub fn set_color(&mut self, color: Rgb565) {
        self.color = color;
    }

    pub(crate) fn color(&self) -> Rgb565 {
        self.color
    }

    /// Replace the alignment.
    pub fn set_align(&mut self, align: TextAlign) {
        self.align = align;
    }

    /// Draw the text into `buffer` assuming the backdrop is already
    /// painted. Shared with [`Button`](crate::Button).
    pub(crate) fn draw_text(&self, size: Size, buffer: &mut PixelBuffer) {
        if self.text.is_empty() {
            return;
        }
        let text_width = self.font.measure(&self.text).width;
        let text_x = match self.align {
            TextAlign::Left => self.padding.left,
            TextAlign::Center => size.width.saturating_sub(text_width) / 2,
            TextAlign::Right => size
                .width
                .saturating_sub(text_width)
                .saturating_sub(self.padding.right),
        };
        let text_y = size.height.saturating_sub(self.font.line_height()) / 2;
        for (i, ch) in self.text.chars().enumerate() {
            let x = text_x.saturating_add(self.font.advance().saturating_mul(i as u16));
            if x >= size.width {
                break;
            }
            match self.font.glyph(ch) {
                Some(glyph) => glyph.draw(buffer, x, text_y, self.color),
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(ch = %ch, "missing glyph");
                }
            }
        }
    }
}

impl LeafRenderer for Label {
    fn paint(&mut self, style: &PaintStyle, buffer: &mut PixelBuffer) {
        if let Some(fill) = self.fill {
            buffer.fill(fill);
        }
        self.draw_text(style.size, buffer);
    }

    fn min_size(&self) -> Size {
        let text = self.font.measure(&self.text);
        Size::new(
            text.width.saturating_add(self.padding.horizontal_sum()),
            text.height.saturating_add(self.padding.vertical_sum()),
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use panelui_core::id::NodeId;
    use panelui_scene::{Node, SceneTree};

    use super::*;
    use crate::font::tests::test_font;

    fn label(text: &str) -> Label {
        Label::new(text, Rc::new(test_font())).with_padding(Sides::all(0))
    }

    #[test]
    fn min_size_covers_text_plus_padding() {
        let l = label("Xo");
        assert_eq!(l.min_size(), Size::new(8, 4));
        let padded = label("Xo").with_padding(Sides::all(2));
        assert_eq!(padded.min_size(), Size::new(12, 8));
    }

    #[test]
    fn paints_transparent_backdrop_by_default() {
        let mut tree = SceneTree::new(32, 8);
        let id = tree
            .add_child(NodeId::ROOT, Node::leaf(label("X")).with_size(8, 4))
            .unwrap();
        tree.layout().unwrap();
        tree.paint_leaf(id).unwrap();

        let buf = tree.buffer_of(id).unwrap();
        // 'X' row 0 is 0b1001: corners lit, middle transparent.
        assert_eq!(buf.pixel(0, 0), Some(Rgb565::WHITE));
        assert_eq!(buf.pixel(1, 0), Some(buf.transparent_color()));
    }

    #[test]
    fn fill_paints_opaque_backdrop() {
        let mut tree = SceneTree::new(32, 8);
        let id = tree
            .add_child(
                NodeId::ROOT,
                Node::leaf(label("X").with_fill(Rgb565::BLUE)).with_size(8, 4),
            )
            .unwrap();
        tree.layout().unwrap();
        tree.paint_leaf(id).unwrap();

        let buf = tree.buffer_of(id).unwrap();
        assert_eq!(buf.pixel(1, 0), Some(Rgb565::BLUE));
        assert_eq!(buf.pixel(7, 3), Some(Rgb565::BLUE));
    }

    #[test]
    fn center_alignment_splits_the_slack() {
        let mut tree = SceneTree::new(32, 8);
        let id = tree
            .add_child(
                NodeId::ROOT,
                Node::leaf(label("X").with_align(TextAlign::Center)).with_size(12, 4),
            )
            .unwrap();
        tree.layout().unwrap();
        tree.paint_leaf(id).unwrap();

        // Glyph is 4 wide in a 12-wide label: starts at x = 4.
        let buf = tree.buffer_of(id).unwrap();
        assert_eq!(buf.pixel(4, 0), Some(Rgb565::WHITE));
        assert_eq!(buf.pixel(0, 0), Some(buf.transparent_color()));
    }

    #[test]
    fn set_text_changes_the_next_paint() {
        let mut tree = SceneTree::new(32, 8);
        let id = tree
            .add_child(NodeId::ROOT, Node::leaf(label("X")).with_size(8, 4))
            .unwrap();
        tree.layout().unwrap();
        tree.paint_leaf(id).unwrap();

        tree.with_renderer::<Label, _>(id, |l| l.set_text("o")).unwrap();
        tree.paint_leaf(id).unwrap();
        // 'o' row 0 is 0b1111: the second pixel is now lit.
        let buf = tree.buffer_of(id).unwrap();
        assert_eq!(buf.pixel(1, 0), Some(Rgb565::WHITE));
    }
}
