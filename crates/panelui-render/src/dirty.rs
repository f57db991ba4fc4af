#![forbid(unsafe_code)]

//! Dirty-region tracking.
//!
//! A tracker accumulates invalidated rectangles and answers "does this
//! rectangle need repaint?". Three strategies implement the same
//! [`DirtyRegion`] contract so the compositor is agnostic to the choice:
//!
//! - [`MergeRegions`]: a short list of coalesced rectangles. Precise;
//!   adjacent rects (within a 1-pixel tolerance) merge so the list stays
//!   small.
//! - [`BoundingBox`]: one envelope rectangle. O(1) adds, may
//!   over-invalidate.
//! - [`CellGrid`]: fixed-size cells marked whole. Bounded memory, coarse
//!   granularity.
//!
//! # Contract
//!
//! - `add` ignores empty rects and only ever grows the stale area; a
//!   tracker is monotonic within a frame.
//! - `intersects` is true iff the query strictly overlaps some stale area
//!   (possibly enlarged by the strategy's granularity).
//! - `clear` is the only shrinking operation; it runs once per scheduler
//!   cycle after paint.

use panelui_core::geometry::Rect;
use smallvec::SmallVec;

/// The stale-area contract shared by all tracking strategies.
pub trait DirtyRegion: std::fmt::Debug {
    /// Accumulate a stale rectangle. Empty rects are ignored.
    fn add(&mut self, rect: Rect);

    /// Whether the query rectangle overlaps any stale area.
    fn intersects(&self, rect: &Rect) -> bool;

    /// Drop all stale area.
    fn clear(&mut self);

    /// Whether anything is stale at all.
    fn is_dirty(&self) -> bool;

    /// The smallest rectangle covering all stale area, if any.
    ///
    /// Used to bound the hardware flush window.
    fn bounding(&self) -> Option<Rect>;

    /// The stale rectangles as the strategy stores them.
    ///
    /// Consistent with [`intersects`](Self::intersects): a query overlaps
    /// the stale area iff it overlaps some returned rectangle. Background
    /// fills iterate these instead of the bounding envelope, which may
    /// cover clean area between disjoint rects.
    fn regions(&self) -> Vec<Rect>;
}

/// Pixel tolerance within which separate rectangles coalesce.
///
/// 1 pixel: edge-adjacent rects merge, bounding the list length for the
/// common "row of widgets repainted together" case.
const MERGE_TOLERANCE: u16 = 1;

/// Region-merge tracking: a short list of coalesced rectangles.
#[derive(Debug, Default)]
pub struct MergeRegions {
    areas: SmallVec<[Rect; 8]>,
}

impl MergeRegions {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored rectangles (for tests and debug overlays).
    #[must_use]
    pub fn areas(&self) -> &[Rect] {
        &self.areas
    }
}

impl DirtyRegion for MergeRegions {
    fn add(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        // Merge into the first overlapping-or-adjacent entry; otherwise
        // append. A merged entry is not re-coalesced against the rest --
        // the tolerance keeps the list short enough that precision wins.
        for area in &mut self.areas {
            if area.touches(&rect, MERGE_TOLERANCE) {
                *area = area.union(&rect);
                return;
            }
        }
        self.areas.push(rect);
    }

    fn intersects(&self, rect: &Rect) -> bool {
        self.areas.iter().any(|area| area.intersects(rect))
    }

    fn clear(&mut self) {
        self.areas.clear();
    }

    fn is_dirty(&self) -> bool {
        !self.areas.is_empty()
    }

    fn bounding(&self) -> Option<Rect> {
        let mut iter = self.areas.iter();
        let first = *iter.next()?;
        Some(iter.fold(first, |acc, r| acc.union(r)))
    }

    fn regions(&self) -> Vec<Rect> {
        self.areas.to_vec()
    }
}

/// Bounding-box tracking: all stale area collapses into one envelope.
#[derive(Debug, Default)]
pub struct BoundingBox {
    area: Option<Rect>,
}

impl BoundingBox {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DirtyRegion for BoundingBox {
    fn add(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        self.area = Some(match self.area {
            Some(area) => area.union(&rect),
            None => rect,
        });
    }

    fn intersects(&self, rect: &Rect) -> bool {
        self.area.is_some_and(|area| area.intersects(rect))
    }

    fn clear(&mut self) {
        self.area = None;
    }

    fn is_dirty(&self) -> bool {
        self.area.is_some()
    }

    fn bounding(&self) -> Option<Rect> {
        self.area
    }

    fn regions(&self) -> Vec<Rect> {
        self.area.into_iter().collect()
    }
}

/// Grid tracking: the screen is quantized into fixed-size cells and whole
/// cells are marked stale.
#[derive(Debug)]
pub struct CellGrid {
    width: u16,
    height: u16,
    cell_size: u16,
    cols: u16,
    rows: u16,
    cells: Vec<bool>,
    marked: Vec<usize>,
}

impl CellGrid {
    /// Create a tracker covering a `width` x `height` screen.
    ///
    /// `cell_size` is clamped to at least 1; powers of two divide fastest.
    #[must_use]
    pub fn new(width: u16, height: u16, cell_size: u16) -> Self {
        let cell_size = cell_size.max(1);
        let cols = width.div_ceil(cell_size);
        let rows = height.div_ceil(cell_size);
        Self {
            width,
            height,
            cell_size,
            cols,
            rows,
            cells: vec![false; cols as usize * rows as usize],
            marked: Vec::new(),
        }
    }

    /// Cell index range covered by a rect, clipped to the grid.
    fn cell_span(&self, rect: &Rect) -> Option<(u16, u16, u16, u16)> {
        let clipped = Rect::from_size(self.width, self.height).intersection_opt(rect)?;
        let c0 = clipped.x / self.cell_size;
        let r0 = clipped.y / self.cell_size;
        let c1 = (clipped.right() - 1) / self.cell_size;
        let r1 = (clipped.bottom() - 1) / self.cell_size;
        Some((r0, c0, r1.min(self.rows - 1), c1.min(self.cols - 1)))
    }

    #[inline]
    fn index(&self, row: u16, col: u16) -> usize {
        row as usize * self.cols as usize + col as usize
    }
}

impl DirtyRegion for CellGrid {
    fn add(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        let Some((r0, c0, r1, c1)) = self.cell_span(&rect) else {
            return;
        };
        for row in r0..=r1 {
            for col in c0..=c1 {
                let i = self.index(row, col);
                if !self.cells[i] {
                    self.cells[i] = true;
                    self.marked.push(i);
                }
            }
        }
    }

    fn intersects(&self, rect: &Rect) -> bool {
        let Some((r0, c0, r1, c1)) = self.cell_span(rect) else {
            return false;
        };
        for row in r0..=r1 {
            for col in c0..=c1 {
                if self.cells[self.index(row, col)] {
                    return true;
                }
            }
        }
        false
    }

    fn clear(&mut self) {
        for &i in &self.marked {
            self.cells[i] = false;
        }
        self.marked.clear();
    }

    fn is_dirty(&self) -> bool {
        !self.marked.is_empty()
    }

    fn bounding(&self) -> Option<Rect> {
        let mut bounds: Option<(u16, u16, u16, u16)> = None;
        for &i in &self.marked {
            let row = (i / self.cols as usize) as u16;
            let col = (i % self.cols as usize) as u16;
            bounds = Some(match bounds {
                None => (row, col, row, col),
                Some((r0, c0, r1, c1)) => (r0.min(row), c0.min(col), r1.max(row), c1.max(col)),
            });
        }
        let (r0, c0, r1, c1) = bounds?;
        let x = c0 * self.cell_size;
        let y = r0 * self.cell_size;
        let right = ((c1 + 1) * self.cell_size).min(self.width);
        let bottom = ((r1 + 1) * self.cell_size).min(self.height);
        Some(Rect::new(x, y, right - x, bottom - y))
    }

    fn regions(&self) -> Vec<Rect> {
        self.marked
            .iter()
            .map(|&i| {
                let row = (i / self.cols as usize) as u16;
                let col = (i % self.cols as usize) as u16;
                let x = col * self.cell_size;
                let y = row * self.cell_size;
                let right = ((col + 1) * self.cell_size).min(self.width);
                let bottom = ((row + 1) * self.cell_size).min(self.height);
                Rect::new(x, y, right - x, bottom - y)
            })
            .collect()
    }
}
