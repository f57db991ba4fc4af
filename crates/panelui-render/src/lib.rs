#![forbid(unsafe_code)]

//! Pixel buffers and dirty-region tracking.
//!
//! This crate is the compositor's substrate: [`PixelBuffer`] holds raw
//! 16-bit pixels in panel byte order and supports color-keyed blits;
//! [`DirtyRegion`] answers "does this rectangle need repaint?" for the
//! three interchangeable tracking strategies.

pub mod buffer;
pub mod color;
pub mod dirty;

pub use buffer::PixelBuffer;
pub use color::{PixelFormat, Rgb565};
pub use dirty::{BoundingBox, CellGrid, DirtyRegion, MergeRegions};
