#![forbid(unsafe_code)]

//! Geometric primitives.

/// A clip rectangle in absolute buffer coordinates.
///
/// Each bound is independently optional; a missing bound places no limit on
/// that side. `x1`/`y1` are inclusive, `x2`/`y2` are exclusive. Coordinates
/// are signed because paint operations may start above or left of the
/// buffer origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ClipRect {
    /// Left edge (inclusive).
    pub x1: Option<i32>,
    /// Right edge (exclusive).
    pub x2: Option<i32>,
    /// Top edge (inclusive).
    pub y1: Option<i32>,
    /// Bottom edge (exclusive).
    pub y2: Option<i32>,
}

impl ClipRect {
    /// A clip rectangle with no bounds at all.
    pub const UNBOUNDED: Self = Self {
        x1: None,
        x2: None,
        y1: None,
        y2: None,
    };

    /// Create a fully bounded rectangle from an origin and a size.
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x1: Some(x),
            x2: Some(x.saturating_add(width)),
            y1: Some(y),
            y2: Some(y.saturating_add(height)),
        }
    }

    /// Set the horizontal bounds.
    #[inline]
    pub const fn with_columns(mut self, x1: Option<i32>, x2: Option<i32>) -> Self {
        self.x1 = x1;
        self.x2 = x2;
        self
    }

    /// Set the vertical bounds.
    #[inline]
    pub const fn with_rows(mut self, y1: Option<i32>, y2: Option<i32>) -> Self {
        self.y1 = y1;
        self.y2 = y2;
        self
    }

    /// True when at least one bound is set.
    #[inline]
    pub const fn is_bounded(&self) -> bool {
        self.x1.is_some() || self.x2.is_some() || self.y1.is_some() || self.y2.is_some()
    }

    /// Check if a point is inside the rectangle.
    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.contains_column(x) && self.contains_row(y)
    }

    /// Check a column against the horizontal bounds only.
    #[inline]
    pub fn contains_column(&self, x: i32) -> bool {
        self.x1.is_none_or(|x1| x >= x1) && self.x2.is_none_or(|x2| x < x2)
    }

    /// Check a row against the vertical bounds only.
    #[inline]
    pub fn contains_row(&self, y: i32) -> bool {
        self.y1.is_none_or(|y1| y >= y1) && self.y2.is_none_or(|y2| y < y2)
    }

    /// Clamp the half-open span `[start, end)` to the horizontal bounds.
    ///
    /// Returns `None` when nothing of the span is visible.
    pub fn clip_columns(&self, start: i32, end: i32) -> Option<(i32, i32)> {
        let lo = self.x1.map_or(start, |x1| start.max(x1));
        let hi = self.x2.map_or(end, |x2| end.min(x2));
        (lo < hi).then_some((lo, hi))
    }

    /// Clamp the half-open span `[start, end)` to the vertical bounds.
    pub fn clip_rows(&self, start: i32, end: i32) -> Option<(i32, i32)> {
        let lo = self.y1.map_or(start, |y1| start.max(y1));
        let hi = self.y2.map_or(end, |y2| end.min(y2));
        (lo < hi).then_some((lo, hi))
    }
}
