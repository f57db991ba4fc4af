#![forbid(unsafe_code)]

//! Rectangular pixel storage.
//!
//! A `PixelBuffer` backs every paintable leaf and the hardware-facing
//! root. Pixels are stored row-major as raw bytes in the buffer's
//! [`PixelFormat`], so a buffer (or a rectangular slice of one) can be
//! handed to the panel driver without conversion.
//!
//! # Invariants
//!
//! 1. `data.len() == width * height * bytes_per_pixel`, always; resizing
//!    reallocates.
//! 2. Byte-order conversion happens exactly once, at pixel write.
//! 3. Zero/negative-area fill and blit inputs are no-ops, not errors.

use panelui_core::geometry::Rect;

use crate::color::{PixelFormat, Rgb565};

/// A rectangular buffer of 16-bit pixels with a transparency key.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: u16,
    height: u16,
    format: PixelFormat,
    transparent: Rgb565,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Create a buffer filled with the default transparency key
    /// ([`Rgb565::PINK`]) in panel-native byte order.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self::with_format(width, height, PixelFormat::default(), Rgb565::PINK)
    }

    /// Create a buffer with an explicit format and transparency key.
    ///
    /// The buffer starts filled with the key, i.e. fully transparent.
    #[must_use]
    pub fn with_format(width: u16, height: u16, format: PixelFormat, transparent: Rgb565) -> Self {
        let mut buf = Self {
            width,
            height,
            format,
            transparent,
            data: vec![0; byte_len(width, height, format)],
        };
        buf.fill(transparent);
        buf
    }

    /// Buffer width in pixels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Buffer height in pixels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Bounding rect of the entire buffer.
    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// The buffer's pixel format.
    #[inline]
    #[must_use]
    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    /// The color treated as "do not copy" when this buffer is a blit source.
    #[inline]
    #[must_use]
    pub const fn transparent_color(&self) -> Rgb565 {
        self.transparent
    }

    /// Raw pixel bytes, row-major, in the buffer's byte order.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Reallocate to a new size. Contents are discarded; the buffer is
    /// refilled with the transparency key.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.data = vec![0; byte_len(width, height, self.format)];
        self.fill(self.transparent);
    }

    #[inline]
    fn offset(&self, x: u16, y: u16) -> Option<usize> {
        if x < self.width && y < self.height {
            Some((y as usize * self.width as usize + x as usize) * 2)
        } else {
            None
        }
    }

    /// Read the pixel at (x, y). Returns `None` out of bounds.
    #[inline]
    #[must_use]
    pub fn pixel(&self, x: u16, y: u16) -> Option<Rgb565> {
        self.offset(x, y)
            .map(|i| self.format.decode([self.data[i], self.data[i + 1]]))
    }

    /// Write the pixel at (x, y). Out-of-bounds writes are ignored.
    #[inline]
    pub fn set_pixel(&mut self, x: u16, y: u16, color: Rgb565) {
        if let Some(i) = self.offset(x, y) {
            let bytes = self.format.encode(color);
            self.data[i] = bytes[0];
            self.data[i + 1] = bytes[1];
        }
    }

    /// Fill the whole buffer with one color.
    pub fn fill(&mut self, color: Rgb565) {
        let bytes = self.format.encode(color);
        for px in self.data.chunks_exact_mut(2) {
            px[0] = bytes[0];
            px[1] = bytes[1];
        }
    }

    /// Fill a rectangular region, clipped to the buffer bounds.
    ///
    /// An empty rect is a no-op; nothing to paint is not an error.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgb565) {
        let Some(clipped) = self.bounds().intersection_opt(&rect) else {
            return;
        };
        let bytes = self.format.encode(color);
        for y in clipped.y..clipped.bottom() {
            let row = (y as usize * self.width as usize + clipped.x as usize) * 2;
            let row = &mut self.data[row..row + clipped.width as usize * 2];
            for px in row.chunks_exact_mut(2) {
                px[0] = bytes[0];
                px[1] = bytes[1];
            }
        }
    }

    /// Copy `source` into this buffer with its top-left corner at
    /// `(dx, dy)`, skipping every source pixel equal to the source's
    /// transparency key.
    ///
    /// The key comparison happens in the source's own pixel format, so a
    /// format mismatch between the buffers never mistranslates the key;
    /// copied pixels are re-encoded into this buffer's format.
    pub fn blit(&mut self, source: &PixelBuffer, dx: u16, dy: u16) {
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!(
            "blit",
            w = source.width(),
            h = source.height(),
            dx,
            dy
        );
        #[cfg(feature = "tracing")]
        let _guard = _span.enter();

        let dest_rect = Rect::new(dx, dy, source.width, source.height);
        let Some(clipped) = self.bounds().intersection_opt(&dest_rect) else {
            return;
        };

        let key = source.format.encode(source.transparent);
        let same_format = source.format == self.format;

        for y in clipped.y..clipped.bottom() {
            let sy = y - dy;
            let src_row = (sy as usize * source.width as usize + (clipped.x - dx) as usize) * 2;
            let dst_row = (y as usize * self.width as usize + clipped.x as usize) * 2;
            for i in 0..clipped.width as usize {
                let s = src_row + i * 2;
                let src_px = [source.data[s], source.data[s + 1]];
                if src_px == key {
                    continue;
                }
                let d = dst_row + i * 2;
                if same_format {
                    self.data[d] = src_px[0];
                    self.data[d + 1] = src_px[1];
                } else {
                    let out = self.format.encode(source.format.decode(src_px));
                    self.data[d] = out[0];
                    self.data[d + 1] = out[1];
                }
            }
        }
    }

    /// Extract the packed bytes of a region, clipped to the buffer,
    /// for handing to a panel driver's partial refresh.
    ///
    /// Returns the clipped rect alongside its bytes; `None` if the region
    /// lies entirely outside the buffer.
    #[must_use]
    pub fn region_bytes(&self, rect: Rect) -> Option<(Rect, Vec<u8>)> {
        let clipped = self.bounds().intersection_opt(&rect)?;
        let mut out = Vec::with_capacity(clipped.area() as usize * 2);
        for y in clipped.y..clipped.bottom() {
            let row = (y as usize * self.width as usize + clipped.x as usize) * 2;
            out.extend_from_slice(&self.data[row..row + clipped.width as usize * 2]);
        }
        Some((clipped, out))
    }
}

#[inline]
fn byte_len(width: u16, height: u16, format: PixelFormat) -> usize {
    width as usize * height as usize * format.bytes_per_pixel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_length_matches_dimensions() {
        let buf = PixelBuffer::new(10, 4);
        assert_eq!(buf.bytes().len(), 10 * 4 * 2);
    }

    #[test]
    fn resize_reallocates_and_clears() {
        let mut buf = PixelBuffer::new(4, 4);
        buf.fill(Rgb565::RED);
        buf.resize(8, 2);
        assert_eq!(buf.bytes().len(), 8 * 2 * 2);
        assert_eq!(buf.pixel(0, 0), Some(buf.transparent_color()));
    }

    #[test]
    fn pixel_round_trip_applies_byte_order_once() {
        let mut buf =
            PixelBuffer::with_format(2, 1, PixelFormat::Rgb565Be, Rgb565::PINK);
        buf.set_pixel(0, 0, Rgb565::from_raw(0x12AB));
        // Stored high byte first
        assert_eq!(&buf.bytes()[..2], &[0x12, 0xAB]);
        assert_eq!(buf.pixel(0, 0), Some(Rgb565::from_raw(0x12AB)));
    }

    #[test]
    fn out_of_bounds_access_is_ignored() {
        let mut buf = PixelBuffer::new(2, 2);
        buf.set_pixel(5, 5, Rgb565::RED);
        assert_eq!(buf.pixel(5, 5), None);
    }

    #[test]
    fn fill_rect_clips_and_ignores_empty() {
        let mut buf = PixelBuffer::new(4, 4);
        buf.fill_rect(Rect::new(2, 2, 10, 10), Rgb565::GREEN);
        assert_eq!(buf.pixel(3, 3), Some(Rgb565::GREEN));
        assert_eq!(buf.pixel(1, 1), Some(Rgb565::PINK));

        let before = buf.bytes().to_vec();
        buf.fill_rect(Rect::new(0, 0, 0, 4), Rgb565::RED);
        assert_eq!(buf.bytes(), &before[..]);
    }

    #[test]
    fn blit_skips_transparent_key() {
        let mut dest = PixelBuffer::new(4, 4);
        dest.fill(Rgb565::BLACK);

        let mut src = PixelBuffer::new(2, 2);
        src.set_pixel(0, 0, Rgb565::RED);
        // (1,0), (0,1), (1,1) stay at the key

        dest.blit(&src, 1, 1);
        assert_eq!(dest.pixel(1, 1), Some(Rgb565::RED));
        assert_eq!(dest.pixel(2, 1), Some(Rgb565::BLACK));
        assert_eq!(dest.pixel(1, 2), Some(Rgb565::BLACK));
    }

    #[test]
    fn blit_of_fully_transparent_source_is_identity() {
        let mut dest = PixelBuffer::new(3, 3);
        dest.fill(Rgb565::BLUE);
        let before = dest.bytes().to_vec();

        let src = PixelBuffer::new(3, 3); // all key
        dest.blit(&src, 0, 0);
        assert_eq!(dest.bytes(), &before[..]);
    }

    #[test]
    fn blit_converts_between_formats() {
        let mut dest =
            PixelBuffer::with_format(2, 1, PixelFormat::Rgb565Le, Rgb565::PINK);
        let mut src =
            PixelBuffer::with_format(2, 1, PixelFormat::Rgb565Be, Rgb565::PINK);
        src.set_pixel(0, 0, Rgb565::from_raw(0x12AB));

        dest.blit(&src, 0, 0);
        assert_eq!(dest.pixel(0, 0), Some(Rgb565::from_raw(0x12AB)));
        // Low byte first in the destination's storage
        assert_eq!(&dest.bytes()[..2], &[0xAB, 0x12]);
        // Transparent source pixel untouched
        assert_eq!(dest.pixel(1, 0), Some(Rgb565::PINK));
    }

    #[test]
    fn blit_clips_at_edges() {
        let mut dest = PixelBuffer::new(4, 4);
        dest.fill(Rgb565::BLACK);
        let mut src = PixelBuffer::new(3, 3);
        src.fill(Rgb565::GREEN);

        dest.blit(&src, 2, 2);
        assert_eq!(dest.pixel(3, 3), Some(Rgb565::GREEN));
        assert_eq!(dest.pixel(1, 1), Some(Rgb565::BLACK));
    }

    #[test]
    fn region_bytes_extracts_packed_rows() {
        let mut buf = PixelBuffer::new(4, 3);
        buf.fill(Rgb565::BLACK);
        buf.set_pixel(1, 1, Rgb565::WHITE);

        let (rect, bytes) = buf.region_bytes(Rect::new(1, 1, 2, 2)).unwrap();
        assert_eq!(rect, Rect::new(1, 1, 2, 2));
        assert_eq!(bytes.len(), 2 * 2 * 2);
        let white = buf.format().encode(Rgb565::WHITE);
        assert_eq!(&bytes[..2], &white);
    }

    #[test]
    fn region_bytes_outside_bounds_is_none() {
        let buf = PixelBuffer::new(4, 3);
        assert!(buf.region_bytes(Rect::new(10, 10, 2, 2)).is_none());
    }
}
