#![forbid(unsafe_code)]

//! Leaf renderers: text labels and buttons.
//!
//! Widgets here implement [`panelui_scene::LeafRenderer`]; they draw
//! into their node's private buffer and leave everything else (layout,
//! dirty tracking, compositing) to the scene graph.

pub mod button;
pub mod font;
pub mod label;

pub use button::Button;
pub use font::{Glyph, GlyphData, GlyphProvider, MonoFont};
pub use label::{Label, TextAlign};
