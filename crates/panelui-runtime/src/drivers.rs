#![forbid(unsafe_code)]

//! Hardware-facing traits.
//!
//! The panel and input devices are black boxes behind these traits; the
//! runtime never speaks SPI or debounces switches itself. [`MemoryPanel`]
//! is an in-process panel for tests and host-side development.

use panelui_core::event::Event;
use panelui_core::geometry::{Rect, Size};

/// A device-level failure reported by a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    /// Driver-supplied description.
    pub message: String,
}

impl DriverError {
    /// Create an error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DriverError {}

/// A display panel accepting packed pixel bytes.
pub trait PanelDriver {
    /// Panel resolution in pixels.
    fn size(&self) -> Size;

    /// Write `bytes` (row-major, panel byte order, exactly covering
    /// `rect`) into the panel window at `rect`.
    ///
    /// This is the only call in the system allowed to block on bus I/O.
    fn refresh(&mut self, rect: Rect, bytes: &[u8]) -> Result<(), DriverError>;
}

/// A polled input source.
///
/// Press/click timing state machines live behind this trait; the
/// runtime polls once per cycle and takes at most one event per call.
pub trait InputDevice {
    /// Stable name for fault logs.
    fn name(&self) -> &str;

    /// Poll for one event, non-blocking.
    fn poll(&mut self) -> Result<Option<Event>, DriverError>;
}

/// An in-memory panel capturing refreshes for tests and host demos.
#[derive(Debug, Clone)]
pub struct MemoryPanel {
    width: u16,
    height: u16,
    data: Vec<u8>,
    refreshes: Vec<Rect>,
}

impl MemoryPanel {
    /// Create a zeroed panel.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 2],
            refreshes: Vec::new(),
        }
    }

    /// Raw panel contents, row-major, two bytes per pixel.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// The two bytes of the pixel at `(x, y)`.
    #[must_use]
    pub fn pixel_bytes(&self, x: u16, y: u16) -> Option<[u8; 2]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 2;
        Some([self.data[i], self.data[i + 1]])
    }

    /// Every rect refreshed so far, in order.
    #[must_use]
    pub fn refreshes(&self) -> &[Rect] {
        &self.refreshes
    }
}

impl PanelDriver for MemoryPanel {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    fn refresh(&mut self, rect: Rect, bytes: &[u8]) -> Result<(), DriverError> {
        let expected = rect.area() as usize * 2;
        if bytes.len() != expected {
            return Err(DriverError::new(format!(
                "refresh of {}x{} expects {expected} bytes, got {}",
                rect.width,
                rect.height,
                bytes.len()
            )));
        }
        if rect.right() > self.width || rect.bottom() > self.height {
            return Err(DriverError::new(format!(
                "refresh rect ({}, {}) {}x{} exceeds panel {}x{}",
                rect.x, rect.y, rect.width, rect.height, self.width, self.height
            )));
        }
        let row_len = rect.width as usize * 2;
        for (i, y) in (rect.y..rect.bottom()).enumerate() {
            let src = &bytes[i * row_len..(i + 1) * row_len];
            let dst = (y as usize * self.width as usize + rect.x as usize) * 2;
            self.data[dst..dst + row_len].copy_from_slice(src);
        }
        self.refreshes.push(rect);
        Ok(())
    }
}
