#![forbid(unsafe_code)]

//! Shared vocabulary for panelui.
//!
//! This crate holds the types every other panelui crate speaks in:
//! pixel-space geometry, node identifiers, the input event model, widget
//! state flags, and the logging facade. It has no opinion about rendering
//! or layout; those live in `panelui-render` and `panelui-scene`.

pub mod event;
pub mod geometry;
pub mod id;
pub mod logging;
pub mod state;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, debug_span, error, info, trace, trace_span, warn};

pub use event::{Event, EventKind, EventTarget};
pub use geometry::{Rect, Sides, Size};
pub use id::NodeId;
pub use state::WidgetState;
