#![forbid(unsafe_code)]

//! Glyph sources for text rendering.
//!
//! A glyph is a 1-bit bitmap, row-major, MSB-first within each byte;
//! rows are padded to whole bytes. Set bits become foreground pixels,
//! clear bits stay transparent.
//!
//! Glyph bytes may be stored raw or run-length encoded. The RLE stream
//! compresses the zero runs that dominate font data: `0x00 n` expands
//! to `n` zero bytes, any other byte is a literal. Runs are capped at
//! 255 so the count always fits one byte.

use std::collections::BTreeMap;

use panelui_core::geometry::Size;
use panelui_render::buffer::PixelBuffer;
use panelui_render::color::Rgb565;

/// Storage of one glyph's bitmap rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphData<'a> {
    /// Expanded row bytes, `height * ceil(width / 8)` of them.
    Raw(&'a [u8]),
    /// Run-length encoded row bytes.
    Rle(&'a [u8]),
}

/// One character's bitmap.
#[derive(Debug, Clone, Copy)]
pub struct Glyph<'a> {
    /// Pixel width.
    pub width: u16,
    /// Pixel height.
    pub height: u16,
    /// Row data.
    pub data: GlyphData<'a>,
}

impl Glyph<'_> {
    /// Expand to raw row bytes regardless of storage.
    #[must_use]
    pub fn rows(&self) -> Vec<u8> {
        match self.data {
            GlyphData::Raw(bytes) => bytes.to_vec(),
            GlyphData::Rle(bytes) => rle_decompress(bytes),
        }
    }

    /// Draw into `buffer` with the glyph's top-left corner at `(dx, dy)`.
    ///
    /// Clear bits are skipped, so whatever is already in the buffer
    /// shows through between the strokes.
    pub fn draw(&self, buffer: &mut PixelBuffer, dx: u16, dy: u16, color: Rgb565) {
        let bytes_per_row = usize::from(self.width).div_ceil(8);
        let mut rows = self.rows();
        // Short data renders as blank rows instead of panicking.
        rows.resize(bytes_per_row * usize::from(self.height), 0);
        for y in 0..self.height {
            let row = &rows[y as usize * bytes_per_row..];
            for x in 0..self.width {
                let byte = row[usize::from(x) / 8];
                if byte & (0x80 >> (x % 8)) != 0 {
                    buffer.set_pixel(dx.saturating_add(x), dy.saturating_add(y), color);
                }
            }
        }
    }
}

/// A source of glyphs for a text-rendering leaf.
pub trait GlyphProvider {
    /// The glyph for a character, or `None` if the font lacks it.
    fn glyph(&self, ch: char) -> Option<Glyph<'_>>;

    /// Horizontal advance per character cell.
    fn advance(&self) -> u16;

    /// Height of a text line.
    fn line_height(&self) -> u16;

    /// Size of a rendered string at one line.
    fn measure(&self, text: &str) -> Size {
        let chars = text.chars().count() as u16;
        Size::new(self.advance().saturating_mul(chars), self.line_height())
    }
}

/// A fixed-cell bitmap font held in memory.
#[derive(Debug, Clone)]
pub struct MonoFont {
    width: u16,
    height: u16,
    rle: bool,
    glyphs: BTreeMap<char, Vec<u8>>,
    /// Shown for characters the font lacks, typically a filled box.
    fallback: Vec<u8>,
}

impl MonoFont {
    /// Create a font with the given cell size and fallback glyph.
    ///
    /// `rle` declares how the glyph byte vectors are stored; all glyphs
    /// in one font share the encoding.
    #[must_use]
    pub fn new(width: u16, height: u16, rle: bool, fallback: Vec<u8>) -> Self {
        Self {
            width,
            height,
            rle,
            glyphs: BTreeMap::new(),
            fallback,
        }
    }

    /// Add a glyph (builder style).
    #[must_use]
    pub fn with_glyph(mut self, ch: char, data: Vec<u8>) -> Self {
        self.glyphs.insert(ch, data);
        self
    }

    /// Add a glyph.
    pub fn insert(&mut self, ch: char, data: Vec<u8>) {
        self.glyphs.insert(ch, data);
    }

    fn wrap<'a>(&self, bytes: &'a [u8]) -> Glyph<'a> {
        let data = if self.rle {
            GlyphData::Rle(bytes)
        } else {
            GlyphData::Raw(bytes)
        };
        Glyph {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// The fallback glyph.
    #[must_use]
    pub fn fallback(&self) -> Glyph<'_> {
        self.wrap(&self.fallback)
    }
}

impl GlyphProvider for MonoFont {
    fn glyph(&self, ch: char) -> Option<Glyph<'_>> {
        self.glyphs.get(&ch).map(|bytes| self.wrap(bytes))
    }

    fn advance(&self) -> u16 {
        self.width
    }

    fn line_height(&self) -> u16 {
        self.height
    }
}

/// Expand an RLE stream back into raw bytes.
///
/// A `0x00` followed by a count expands to that many zeros; any other
/// byte passes through. A trailing lone `0x00` is treated as a zero
/// byte rather than an error, matching the encoder's never-emits-it
/// contract loosely.
#[must_use]
pub fn rle_decompress(compressed: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(compressed.len() * 2);
    let mut i = 0;
    while i < compressed.len() {
        if compressed[i] == 0 {
            let count = compressed.get(i + 1).copied().unwrap_or(1);
            out.resize(out.len() + count as usize, 0);
            i += 2;
        } else {
            out.push(compressed[i]);
            i += 1;
        }
    }
    out
}

/// Run-length encode glyph bytes: zero runs become `0x00 count` pairs,
/// capped at 255 per pair; other bytes pass through.
#[must_use]
pub fn rle_compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zeros: u8 = 0;
    for &byte in data {
        if byte == 0 {
            if zeros == 255 {
                out.extend_from_slice(&[0, 255]);
                zeros = 0;
            }
            zeros += 1;
        } else {
            if zeros > 0 {
                out.extend_from_slice(&[0, zeros]);
                zeros = 0;
            }
            out.push(byte);
        }
    }
    if zeros > 0 {
        out.extend_from_slice(&[0, zeros]);
    }
    out
}
