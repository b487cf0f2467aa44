#![forbid(unsafe_code)]

//! Frame: the cell grid for one screen.
//!
//! Cells are stored as parallel arrays in row-major order
//! (`index = row * width + col`): glyph, display width, style id, touched
//! flag and preserve-trailing-space flag. Comparing two frames is a walk
//! over flat vectors, and clearing is a handful of `fill` calls.
//!
//! # Invariants
//!
//! 1. Every array has length `width * height`.
//! 2. A leading cell of width `w > 1` is followed by exactly `w - 1`
//!    continuation cells (empty glyph, width 0) carrying the same style id,
//!    touched flag and preserve flag.
//! 3. Writes that would break invariant 2 (out of range, crossing the right
//!    edge) are dropped, and overwriting part of an existing wide glyph blanks
//!    the rest of it.
//!
//! # Row edge
//!
//! [`Frame::row_right_edge`] is the single definition of "how much of this
//! row matters". Serialization and the row differ both use it, so a row that
//! differs only in trailing default spaces produces identical output.

use std::fmt;

use crate::style::{StyleId, StyleRegistry};

/// Glyph content of one cell.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub enum Glyph {
    /// Continuation of the glyph to the left.
    #[default]
    Empty,
    /// A single code point.
    Char(char),
    /// A multi-code-point grapheme cluster.
    Cluster(Box<str>),
}

impl Glyph {
    /// The default blank glyph.
    pub const SPACE: Self = Self::Char(' ');

    /// Build a glyph from a cluster string.
    pub fn from_cluster(text: &str) -> Self {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Self::Empty,
            (Some(c), None) => Self::Char(c),
            _ => Self::Cluster(text.into()),
        }
    }

    /// UTF-8 length in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Char(c) => c.len_utf8(),
            Self::Cluster(text) => text.len(),
        }
    }

    /// True for a plain space.
    #[inline]
    pub fn is_space(&self) -> bool {
        matches!(self, Self::Char(' '))
    }

    /// Append the UTF-8 bytes to `out`.
    #[inline]
    pub fn push_to(&self, out: &mut Vec<u8>) {
        match self {
            Self::Empty => {}
            Self::Char(c) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            Self::Cluster(text) => out.extend_from_slice(text.as_bytes()),
        }
    }
}

impl fmt::Debug for Glyph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Char(c) => write!(f, "{c:?}"),
            Self::Cluster(text) => write!(f, "{text:?}"),
        }
    }
}

impl fmt::Display for Glyph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Char(c) => write!(f, "{c}"),
            Self::Cluster(text) => f.write_str(text),
        }
    }
}

/// Borrowed view of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef<'a> {
    /// Glyph (empty for continuation cells).
    pub glyph: &'a Glyph,
    /// Display width (0 for continuation cells).
    pub width: u8,
    /// Interned style.
    pub style: StyleId,
    /// Written during this pass.
    pub touched: bool,
    /// Survives trailing-space trimming.
    pub preserve: bool,
}

impl CellRef<'_> {
    /// True for the trailing cells of a wide glyph.
    #[inline]
    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }
}

/// A fixed-size grid of styled cells.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    width: u16,
    height: u16,
    glyphs: Vec<Glyph>,
    widths: Vec<u8>,
    styles: Vec<StyleId>,
    touched: Vec<bool>,
    preserve: Vec<bool>,
}

impl Frame {
    /// Create a blank frame. Zero-sized frames are valid and hold no cells.
    pub fn new(width: u16, height: u16) -> Self {
        let size = width as usize * height as usize;
        Self {
            width,
            height,
            glyphs: vec![Glyph::SPACE; size],
            widths: vec![1; size],
            styles: vec![StyleId::NONE; size],
            touched: vec![false; size],
            preserve: vec![false; size],
        }
    }

    /// Frame width in cells.
    #[inline]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Frame height in cells.
    #[inline]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Total number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// True for a zero-sized frame.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Same width and height as `other`.
    #[inline]
    pub fn same_size(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Reallocate for new dimensions.
    ///
    /// Content is not preserved; callers must [`clear`](Self::clear) before
    /// painting. Does nothing when the dimensions are unchanged.
    pub fn resize(&mut self, width: u16, height: u16) {
        if width == self.width && height == self.height {
            return;
        }
        let size = width as usize * height as usize;
        self.width = width;
        self.height = height;
        self.glyphs.resize(size, Glyph::SPACE);
        self.widths.resize(size, 1);
        self.styles.resize(size, StyleId::NONE);
        self.touched.resize(size, false);
        self.preserve.resize(size, false);
    }

    /// Reset every cell to a space of width 1 in `style`, untouched and not
    /// preserved.
    pub fn clear(&mut self, style: StyleId) {
        self.glyphs.fill(Glyph::SPACE);
        self.widths.fill(1);
        self.styles.fill(style);
        self.touched.fill(false);
        self.preserve.fill(false);
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }

    /// Convert signed coordinates into a column/row pair inside the frame.
    #[inline]
    fn checked(&self, x: i32, y: i32) -> Option<(u16, u16)> {
        let col = u16::try_from(x).ok()?;
        let row = u16::try_from(y).ok()?;
        (col < self.width && row < self.height).then_some((col, row))
    }

    /// View the cell at `(x, y)`.
    pub fn cell(&self, x: u16, y: u16) -> Option<CellRef<'_>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(x, y);
        Some(CellRef {
            glyph: &self.glyphs[i],
            width: self.widths[i],
            style: self.styles[i],
            touched: self.touched[i],
            preserve: self.preserve[i],
        })
    }

    /// Write one glyph of display `width` at `(x, y)`.
    ///
    /// The glyph occupies the leading cell, and `width - 1` continuation
    /// cells follow it. Out-of-range coordinates and glyphs crossing the
    /// right edge are dropped without error. A `width` of 0 is treated as 1.
    pub fn set_cell(
        &mut self,
        x: i32,
        y: i32,
        glyph: &str,
        width: u8,
        style: StyleId,
        preserve: bool,
    ) {
        let width = width.max(1);
        let Some((col, row)) = self.checked(x, y) else {
            return;
        };
        if col as usize + width as usize > self.width as usize {
            return;
        }
        self.release_span(row, col, col + width as u16);

        let i = self.index(col, row);
        self.glyphs[i] = Glyph::from_cluster(glyph);
        self.widths[i] = width;
        self.styles[i] = style;
        self.touched[i] = true;
        self.preserve[i] = preserve;
        for k in 1..width as usize {
            self.glyphs[i + k] = Glyph::Empty;
            self.widths[i + k] = 0;
            self.styles[i + k] = style;
            self.touched[i + k] = true;
            self.preserve[i + k] = preserve;
        }
    }

    /// Paint a horizontal run of `glyph` covering `length` columns from
    /// `(x, y)`.
    ///
    /// Copies are placed every `width` columns; a copy is written only if it
    /// fits entirely inside both the run and the frame.
    pub fn fill(&mut self, x: i32, y: i32, length: i32, glyph: &str, width: u8, style: StyleId) {
        let width = width.max(1);
        if length <= 0 || y < 0 || y >= self.height as i32 {
            return;
        }
        let end = x.saturating_add(length);

        if width > 1 {
            let step = width as i32;
            let mut col = x;
            while col.saturating_add(step) <= end && col < self.width as i32 {
                if col >= 0 {
                    self.set_cell(col, y, glyph, width, style, false);
                }
                col += step;
            }
            return;
        }

        let lo = x.max(0);
        let hi = end.min(self.width as i32);
        if lo >= hi {
            return;
        }
        let (row, lo, hi) = (y as u16, lo as u16, hi as u16);
        self.release_span(row, lo, hi);

        let start = self.index(lo, row);
        let stop = start + (hi - lo) as usize;
        let value = Glyph::from_cluster(glyph);
        self.glyphs[start..stop].fill(value);
        self.widths[start..stop].fill(1);
        self.styles[start..stop].fill(style);
        self.touched[start..stop].fill(true);
        self.preserve[start..stop].fill(false);
    }

    /// Blank the parts of wide glyphs that straddle `[lo, hi)` on `row`, so
    /// the span can be overwritten without orphaning continuation cells.
    fn release_span(&mut self, row: u16, lo: u16, hi: u16) {
        let base = row as usize * self.width as usize;

        // A glyph starting left of `lo` that reaches into the span.
        if self.widths[base + lo as usize] == 0 {
            let mut lead = lo as usize;
            while lead > 0 && self.widths[base + lead] == 0 {
                lead -= 1;
            }
            for col in lead..lo as usize {
                self.blank(base + col);
            }
        }

        // Continuation cells right of the span whose lead is being replaced.
        let mut col = hi as usize;
        while col < self.width as usize && self.widths[base + col] == 0 {
            self.blank(base + col);
            col += 1;
        }
    }

    #[inline]
    fn blank(&mut self, i: usize) {
        self.glyphs[i] = Glyph::SPACE;
        self.widths[i] = 1;
    }

    /// A cell that may be dropped from the end of a row: not preserved,
    /// unstyled, and either untouched or a plain space.
    #[inline]
    fn is_trimmable(&self, i: usize) -> bool {
        !self.preserve[i]
            && self.styles[i].is_none()
            && (!self.touched[i] || self.glyphs[i].is_space())
    }

    /// Exclusive end column of the last significant cell on `row`, or 0 when
    /// the whole row is trimmable.
    pub fn row_right_edge(&self, row: u16) -> u16 {
        if row >= self.height {
            return 0;
        }
        let base = row as usize * self.width as usize;
        let mut col = self.width as usize;
        while col > 0 {
            let i = base + col - 1;
            if self.widths[i] == 0 {
                col -= 1;
                continue;
            }
            if !self.is_trimmable(i) {
                return (col - 1 + self.widths[i] as usize) as u16;
            }
            col -= 1;
        }
        0
    }

    /// Append the styled bytes of cells `[start, end)` on `row`, starting
    /// with `style` open. Returns the style left open.
    ///
    /// `start` and `end` must lie on glyph boundaries.
    pub fn write_cells(
        &self,
        row: u16,
        start: u16,
        end: u16,
        registry: &StyleRegistry,
        mut style: StyleId,
        out: &mut Vec<u8>,
    ) -> StyleId {
        let base = row as usize * self.width as usize;
        for i in base + start as usize..base + end as usize {
            if self.widths[i] == 0 {
                continue;
            }
            if self.styles[i] != style {
                registry.push_transition(style, self.styles[i], out);
                style = self.styles[i];
            }
            self.glyphs[i].push_to(out);
        }
        style
    }

    /// Append `row` as styled text, trimmed at its right edge.
    pub fn write_row(&self, row: u16, registry: &StyleRegistry, out: &mut Vec<u8>) {
        let end = self.row_right_edge(row);
        let style = self.write_cells(row, 0, end, registry, StyleId::NONE, out);
        registry.push_close(style, out);
    }

    /// `row` as styled text, trimmed at its right edge.
    pub fn serialize_row(&self, row: u16, registry: &StyleRegistry) -> String {
        let mut out = Vec::new();
        if row < self.height {
            self.write_row(row, registry, &mut out);
        }
        bytes_to_string(out)
    }

    /// Append every row, separated by `\n` (no trailing newline).
    pub fn write_rows(&self, registry: &StyleRegistry, out: &mut Vec<u8>) {
        for row in 0..self.height {
            if row > 0 {
                out.push(b'\n');
            }
            self.write_row(row, registry, out);
        }
    }

    /// The whole frame as styled text, rows separated by `\n`.
    pub fn serialize(&self, registry: &StyleRegistry) -> String {
        let mut out = Vec::new();
        self.write_rows(registry, &mut out);
        bytes_to_string(out)
    }

    /// Glyph, width and style agree at linear index `i`.
    #[inline]
    pub(crate) fn same_visual(&self, other: &Frame, i: usize) -> bool {
        self.styles[i] == other.styles[i]
            && self.widths[i] == other.widths[i]
            && self.glyphs[i] == other.glyphs[i]
    }

    /// Display width at `(x, y)`; `x`, `y` must be in range.
    #[inline]
    pub(crate) fn width_at(&self, x: u16, y: u16) -> u8 {
        self.widths[self.index(x, y)]
    }

    /// Bytes needed to emit cells `[start, end)` of `row` starting with
    /// `style` open, and the style left open afterwards.
    pub(crate) fn cells_cost(
        &self,
        row: u16,
        start: u16,
        end: u16,
        registry: &StyleRegistry,
        mut style: StyleId,
    ) -> (usize, StyleId) {
        let base = row as usize * self.width as usize;
        let mut bytes = 0;
        for i in base + start as usize..base + end as usize {
            if self.widths[i] == 0 {
                continue;
            }
            if self.styles[i] != style {
                bytes += registry.transition_len(style, self.styles[i]);
                style = self.styles[i];
            }
            bytes += self.glyphs[i].byte_len();
        }
        (bytes, style)
    }

    /// Exact cell-by-cell equality of one row.
    ///
    /// Frames of different dimensions are never equal.
    pub fn is_row_equal(&self, other: &Frame, row: u16) -> bool {
        if !self.same_size(other) || row >= self.height {
            return false;
        }
        let start = row as usize * self.width as usize;
        let range = start..start + self.width as usize;
        self.styles[range.clone()] == other.styles[range.clone()]
            && self.widths[range.clone()] == other.widths[range.clone()]
            && self.glyphs[range.clone()] == other.glyphs[range.clone()]
            && self.touched[range.clone()] == other.touched[range.clone()]
            && self.preserve[range.clone()] == other.preserve[range]
    }

    /// Exact cell-by-cell equality of the whole frame.
    pub fn is_equal(&self, other: &Frame) -> bool {
        self.same_size(other)
            && self.styles == other.styles
            && self.widths == other.widths
            && self.glyphs == other.glyphs
            && self.touched == other.touched
            && self.preserve == other.preserve
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

impl Eq for Frame {}

fn bytes_to_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}
