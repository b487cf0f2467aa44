#![forbid(unsafe_code)]

//! Byte-cost model for row patches.
//!
//! Every estimate here is the exact length of what [`crate::diff::RowPlan`]
//! emits for the same operation: cursor moves are priced by their decimal
//! parameter length, glyphs by their UTF-8 length, and style switches by the
//! cached open/close lengths in the [`StyleRegistry`].
//!
//! Parameters are assumed to be ASCII decimal digits; no other parameter
//! encodings are modeled.

use crate::ansi;
use crate::frame::Frame;
use crate::style::{StyleId, StyleRegistry};

/// How the cursor reaches a target column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveKind {
    /// `CSI n C` relative to the current column.
    Forward,
    /// `CSI col G` absolute column.
    Absolute,
}

/// Prices the operations a row patch can be built from.
#[derive(Debug, Clone, Copy)]
pub struct CostModel<'a> {
    registry: &'a StyleRegistry,
    gap_penalty: usize,
}

impl<'a> CostModel<'a> {
    /// Model costs against `registry`, biasing gap overwrites by
    /// `gap_penalty` bytes.
    pub const fn new(registry: &'a StyleRegistry, gap_penalty: usize) -> Self {
        Self {
            registry,
            gap_penalty,
        }
    }

    /// Flat bias added to an overwrite-gap plan when comparing plans.
    #[inline]
    pub const fn gap_penalty(&self) -> usize {
        self.gap_penalty
    }

    /// Cheapest way to move from column `from` to column `to` (`to > from`).
    ///
    /// Ties go to the relative move.
    #[inline]
    pub fn move_cost(&self, from: u16, to: u16) -> (usize, MoveKind) {
        let forward = ansi::cursor_forward_len(to.saturating_sub(from));
        let absolute = ansi::cursor_to_column_len(to);
        if forward <= absolute {
            (forward, MoveKind::Forward)
        } else {
            (absolute, MoveKind::Absolute)
        }
    }

    /// Bytes to write cells `[start, end)` of `row` in `frame` with `style`
    /// currently open, and the style open afterwards.
    #[inline]
    pub fn write_cost(
        &self,
        frame: &Frame,
        row: u16,
        start: u16,
        end: u16,
        style: StyleId,
    ) -> (usize, StyleId) {
        if start >= end {
            return (0, style);
        }
        frame.cells_cost(row, start, end, self.registry, style)
    }

    /// Bytes after the last write: closing `style`, an optional erase to end
    /// of line, and the move to the next line.
    #[inline]
    pub fn trailing_cost(&self, style: StyleId, tail_clear: bool) -> usize {
        let erase = if tail_clear {
            ansi::ERASE_TO_END.len()
        } else {
            0
        };
        self.registry.close_len(style) + erase + ansi::NEXT_LINE.len()
    }

    /// Bytes to rewrite `[0, end)` of `row` from scratch and advance, with
    /// the same trailer a patch of this row would carry.
    pub fn full_row_cost(&self, frame: &Frame, row: u16, end: u16, tail_clear: bool) -> usize {
        let (bytes, style) = self.write_cost(frame, row, 0, end, StyleId::NONE);
        bytes + self.trailing_cost(style, tail_clear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::StylePair;

    #[test]
    fn short_hops_prefer_forward() {
        let registry = StyleRegistry::new();
        let model = CostModel::new(&registry, 2);
        assert_eq!(model.move_cost(0, 3), (4, MoveKind::Forward));
        // forward 10 (5 bytes) vs column 12 (5 bytes): tie goes forward
        assert_eq!(model.move_cost(1, 11), (5, MoveKind::Forward));
    }

    #[test]
    fn forward_never_loses_to_absolute() {
        // the forward delta never has more digits than the 1-indexed column
        let registry = StyleRegistry::new();
        let model = CostModel::new(&registry, 2);
        for (from, to) in [(0, 9), (0, 99), (4, 99), (0, 100), (1, 1000), (500, 9999)] {
            let (bytes, kind) = model.move_cost(from, to);
            assert_eq!(kind, MoveKind::Forward);
            assert!(bytes <= ansi::cursor_to_column_len(to));
        }
    }

    #[test]
    fn write_cost_counts_style_switches() {
        let mut registry = StyleRegistry::new();
        let bold = registry.get_id(&[StylePair::new("\x1b[1m", "\x1b[22m")]);
        let mut frame = Frame::new(4, 1);
        frame.set_cell(0, 0, "a", 1, bold, false);
        frame.set_cell(1, 0, "b", 1, StyleId::NONE, false);
        let model = CostModel::new(&registry, 2);
        let (bytes, style) = model.write_cost(&frame, 0, 0, 2, StyleId::NONE);
        assert_eq!(bytes, 4 + 1 + 5 + 1);
        assert_eq!(style, StyleId::NONE);
        assert_eq!(model.write_cost(&frame, 0, 2, 2, bold), (0, bold));
    }

    #[test]
    fn trailing_cost_adds_erase_and_newline() {
        let mut registry = StyleRegistry::new();
        let bold = registry.get_id(&[StylePair::new("\x1b[1m", "\x1b[22m")]);
        let model = CostModel::new(&registry, 2);
        assert_eq!(model.trailing_cost(StyleId::NONE, false), 3);
        assert_eq!(model.trailing_cost(StyleId::NONE, true), 6);
        assert_eq!(model.trailing_cost(bold, true), 11);
    }

    #[test]
    fn full_row_cost_erases_only_when_asked() {
        let registry = StyleRegistry::new();
        let mut frame = Frame::new(20, 1);
        for (x, ch) in "Xbcdefghi!".chars().enumerate() {
            frame.set_cell(x as i32, 0, &ch.to_string(), 1, StyleId::NONE, false);
        }
        let model = CostModel::new(&registry, 2);
        assert_eq!(model.full_row_cost(&frame, 0, 10, false), 13);
        assert_eq!(model.full_row_cost(&frame, 0, 10, true), 16);
    }
}
