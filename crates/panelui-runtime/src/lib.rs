#![forbid(unsafe_code)]

//! The cooperative runtime: scheduler, compositor, drivers, flush.
//!
//! One compute thread owns the scene tree and runs every task; the only
//! optional concurrency is a flush thread that writes already-composited
//! bytes to the panel bus. Per cycle the built-in tasks run in a fixed
//! order: poll inputs, dispatch events, relayout if flagged, repaint
//! stale regions, hand the stale window to the flush path, clear the
//! trackers.

pub mod compositor;
pub mod drivers;
pub mod error;
pub mod flush;
pub mod scheduler;
pub mod shell;

pub use compositor::compose;
pub use drivers::{DriverError, InputDevice, MemoryPanel, PanelDriver};
pub use error::RuntimeError;
pub use flush::{FlushJob, FlushThread};
pub use scheduler::{Scheduler, Step, TaskSpec};
pub use shell::{Runtime, RuntimeConfig, Shell};
