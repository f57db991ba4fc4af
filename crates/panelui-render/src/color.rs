#![forbid(unsafe_code)]

//! 16-bit color and pixel formats.
//!
//! Colors are logical RGB565 values; the byte order a panel expects is a
//! property of the buffer, applied exactly once when a pixel is written
//! (never at the call site). Most SPI TFT controllers (ST77xx, ILI9xxx)
//! take the high byte first, so [`PixelFormat::Rgb565Be`] is the default.

/// A packed RGB565 color value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb565(u16);

impl Rgb565 {
    pub const BLACK: Self = Self(0x0000);
    pub const WHITE: Self = Self(0xFFFF);
    pub const RED: Self = Self(0xF800);
    pub const GREEN: Self = Self(0x07E0);
    pub const BLUE: Self = Self(0x001F);
    pub const DARK_GRAY: Self = Self(0x4208);
    /// Conventional transparency key. Garish on purpose: it should never
    /// appear in real content, so a leaked key is easy to spot.
    pub const PINK: Self = Self(0xF81F);

    /// Create a color from a raw RGB565 value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// The raw RGB565 value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Convert from 8-bit-per-channel RGB, truncating low bits.
    #[inline]
    #[must_use]
    pub const fn from_rgb888(r: u8, g: u8, b: u8) -> Self {
        let r = (r as u16 >> 3) << 11;
        let g = (g as u16 >> 2) << 5;
        let b = b as u16 >> 3;
        Self(r | g | b)
    }
}

/// Byte layout of a pixel in a [`PixelBuffer`](crate::PixelBuffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// RGB565, high byte first (SPI TFT native order).
    #[default]
    Rgb565Be,
    /// RGB565, low byte first.
    Rgb565Le,
}

impl PixelFormat {
    /// Bytes occupied by one pixel.
    #[inline]
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        2
    }

    /// Encode a color into this format's byte order.
    #[inline]
    #[must_use]
    pub const fn encode(self, color: Rgb565) -> [u8; 2] {
        match self {
            PixelFormat::Rgb565Be => color.raw().to_be_bytes(),
            PixelFormat::Rgb565Le => color.raw().to_le_bytes(),
        }
    }

    /// Decode two bytes in this format's byte order back into a color.
    #[inline]
    #[must_use]
    pub const fn decode(self, bytes: [u8; 2]) -> Rgb565 {
        match self {
            PixelFormat::Rgb565Be => Rgb565::from_raw(u16::from_be_bytes(bytes)),
            PixelFormat::Rgb565Le => Rgb565::from_raw(u16::from_le_bytes(bytes)),
        }
    }
}
