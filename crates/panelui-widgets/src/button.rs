#![forbid(unsafe_code)]

//! Push buttons: a rounded face with a centered label.

use std::any::Any;
use std::rc::Rc;

use panelui_core::event::EventKind;
use panelui_core::geometry::{Sides, Size};
use panelui_core::id::NodeId;
use panelui_core::state::WidgetState;
use panelui_render::buffer::PixelBuffer;
use panelui_render::color::Rgb565;
use panelui_scene::{LeafRenderer, PaintStyle, SceneError, SceneTree};

use crate::font::GlyphProvider;
use crate::label::{Label, TextAlign};

const DEFAULT_FACE: Rgb565 = Rgb565::from_raw(0x841F);
const DISABLED_FACE: Rgb565 = Rgb565::from_raw(0x7BEF);
const DISABLED_TEXT: Rgb565 = Rgb565::from_raw(0xC618);

/// A button face with a centered text label.
///
/// The face reacts to the node's interaction state: pressed darkens it,
/// disabled grays both face and text. Wiring the state itself to input
/// is the application's job; [`bind_press_visuals`] covers the common
/// case.
pub struct Button {
    label: Label,
    face: Rgb565,
    radius: u16,
}

impl Button {
    /// Create a button with the default face color and corner radius.
    #[must_use]
    pub fn new(text: impl Into<String>, font: Rc<dyn GlyphProvider>) -> Self {
        Self {
            label: Label::new(text, font)
                .with_align(TextAlign::Center)
                .with_padding(Sides::new(3, 5, 3, 5)),
            face: DEFAULT_FACE,
            radius: 2,
        }
    }

    /// Set the face color.
    #[must_use]
    pub fn with_face(mut self, face: Rgb565) -> Self {
        self.face = face;
        self
    }

    /// Set the text color.
    #[must_use]
    pub fn with_text_color(mut self, color: Rgb565) -> Self {
        self.label.set_color(color);
        self
    }

    /// Set the corner radius. Zero gives square corners.
    #[must_use]
    pub fn with_radius(mut self, radius: u16) -> Self {
        self.radius = radius;
        self
    }

    /// Current label text.
    #[must_use]
    pub fn text(&self) -> &str {
        self.label.text()
    }

    /// Replace the label text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.label.set_text(text);
    }

    /// Fill a rounded rectangle covering the whole buffer; corner
    /// pixels outside the radius stay transparent.
    fn fill_face(&self, size: Size, buffer: &mut PixelBuffer, face: Rgb565) {
        let radius = self.radius.min(size.width / 2).min(size.height / 2);
        for y in 0..size.height {
            let dy = if y < radius {
                radius - y
            } else if y >= size.height - radius {
                y + 1 + radius - size.height
            } else {
                0
            };
            let inset = corner_inset(radius, dy);
            for x in inset..size.width.saturating_sub(inset) {
                buffer.set_pixel(x, y, face);
            }
        }
    }
}

/// Horizontal pixels to skip at a row `dy` rows into a corner arc.
fn corner_inset(radius: u16, dy: u16) -> u16 {
    if dy == 0 || radius == 0 {
        return 0;
    }
    let r2 = u32::from(radius) * u32::from(radius);
    let dy2 = u32::from(dy) * u32::from(dy);
    radius.saturating_sub(r2.saturating_sub(dy2).isqrt() as u16)
}

impl LeafRenderer for Button {
    fn paint(&mut self, style: &PaintStyle, buffer: &mut PixelBuffer) {
        let disabled = style.state.contains(WidgetState::DISABLED);
        let pressed = style.state.contains(WidgetState::PRESSED);
        let face = if disabled {
            DISABLED_FACE
        } else if pressed {
            darken(self.face, 7, 10)
        } else {
            self.face
        };
        self.fill_face(style.size, buffer, face);

        let original = self.label.color();
        if disabled {
            self.label.set_color(DISABLED_TEXT);
        }
        self.label.draw_text(style.size, buffer);
        self.label.set_color(original);
    }

    fn min_size(&self) -> Size {
        self.label.min_size()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Scale each channel of a color by `num / den`.
fn darken(color: Rgb565, num: u16, den: u16) -> Rgb565 {
    let raw = color.raw();
    let r = ((raw >> 11) & 0x1F) * num / den;
    let g = ((raw >> 5) & 0x3F) * num / den;
    let b = (raw & 0x1F) * num / den;
    Rgb565::from_raw((r << 11) | (g << 5) | b)
}

/// Bind the standard pressed-state feedback: press and touch-down set
/// `PRESSED`, release and touch-up clear it.
pub fn bind_press_visuals(tree: &mut SceneTree, id: NodeId) -> Result<(), SceneError> {
    for kind in [EventKind::Press, EventKind::TouchStart] {
        tree.bind(id, kind, |tree, id, _| {
            let state = tree.state(id).unwrap_or_default();
            let _ = tree.set_state(id, state | WidgetState::PRESSED);
        })?;
    }
    for kind in [
        EventKind::Release,
        EventKind::LongPressRelease,
        EventKind::TouchEnd,
    ] {
        tree.bind(id, kind, |tree, id, _| {
            let state = tree.state(id).unwrap_or_default();
            let _ = tree.set_state(id, state - WidgetState::PRESSED);
        })?;
    }
    Ok(())
}
