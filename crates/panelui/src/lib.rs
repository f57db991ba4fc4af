#![forbid(unsafe_code)]

//! Retained-mode compositing UI for small SPI panels.
//!
//! panelui keeps a widget tree between frames, tracks which screen
//! regions an update touched, and repaints only those. One compute
//! thread runs everything on a cooperative scheduler; an optional
//! second thread does nothing but push composited bytes over the bus.
//!
//! # Quick start
//!
//! ```no_run
//! use panelui::prelude::*;
//! use panelui::runtime::MemoryPanel;
//! use std::rc::Rc;
//!
//! let mut scene = SceneTree::new(160, 128);
//! let font = Rc::new(MonoFont::new(6, 8, false, vec![0xFC; 8]));
//! let label = scene.add_child(
//!     NodeId::ROOT,
//!     Node::leaf(Label::new("hello", font)).at(10, 10),
//! )?;
//! scene.bind(label, EventKind::Press, |tree, id, _event| {
//!     let _ = tree.invalidate(id);
//! })?;
//!
//! let shell = Shell::new(scene, Box::new(MemoryPanel::new(160, 128)));
//! let mut runtime = Runtime::new(shell, RuntimeConfig::default());
//! runtime.run()?;
//! # Ok::<(), panelui::Error>(())
//! ```
//!
//! The facade re-exports each layer under its own module; depend on the
//! member crates directly if you only need one layer.

pub use panelui_core as core;
pub use panelui_render as render;
pub use panelui_runtime as runtime;
pub use panelui_scene as scene;
pub use panelui_widgets as widgets;

/// Top-level error: any scene, task, or driver failure.
pub use panelui_runtime::RuntimeError as Error;

/// The common imports for building a panel UI.
pub mod prelude {
    pub use panelui_core::event::{Event, EventKind, EventTarget};
    pub use panelui_core::geometry::{Rect, Sides, Size};
    pub use panelui_core::id::NodeId;
    pub use panelui_core::state::WidgetState;
    pub use panelui_render::buffer::PixelBuffer;
    pub use panelui_render::color::{PixelFormat, Rgb565};
    pub use panelui_render::dirty::{BoundingBox, CellGrid, DirtyRegion, MergeRegions};
    pub use panelui_runtime::drivers::{InputDevice, PanelDriver};
    pub use panelui_runtime::scheduler::{Step, TaskSpec};
    pub use panelui_runtime::shell::{Runtime, RuntimeConfig, Shell};
    pub use panelui_scene::{
        Alignment, Arrangement, Axis, GridArea, GridSpec, LeafRenderer, LinearSpec, Node,
        PaintStyle, SceneTree,
    };
    pub use panelui_widgets::{Button, Label, MonoFont, TextAlign};
}
