#![forbid(unsafe_code)]

//! Paint surfaces: rasterize write/fill/clip operations into a frame.
//!
//! [`PaintSurface`] paints straight into a [`Frame`]. [`OperationLog`] records
//! the same operations and replays them into a fresh frame on demand, for
//! callers that only need the final text.
//!
//! # Clipping
//!
//! Only the innermost clip rectangle is consulted. Nested rectangles are not
//! intersected, so producers push rectangles that are already resolved to
//! absolute coordinates. Clipping happens before tokenizing: a line block
//! fully outside the rectangle is skipped, a partially visible block is
//! sliced by columns and rows and its origin advanced to the visible corner.

use std::fmt;
use std::sync::Arc;

use glyphdiff_core::ClipRect;

use crate::frame::Frame;
use crate::style::{StyleId, StylePair, StyleRegistry};
use crate::styled_text::StyledLine;

/// A line transformer: receives the current line text and its index within
/// the write, returns the replacement text.
pub type Transformer = Arc<dyn Fn(&str, usize) -> String + Send + Sync>;

/// Anything paint operations can be applied to.
pub trait PaintTarget {
    /// Write `text` (which may span several lines) with its top-left corner
    /// at `(x, y)`, passing each line through `transformers` in order.
    fn write(&mut self, x: i32, y: i32, text: &str, transformers: &[Transformer]);

    /// Paint `length` columns from `(x, y)` with copies of `glyph`.
    fn fill(&mut self, x: i32, y: i32, length: i32, glyph: &str, width: u8, styles: &[StylePair]);

    /// Push a clip rectangle.
    fn clip(&mut self, rect: ClipRect);

    /// Pop the innermost clip rectangle.
    fn unclip(&mut self);
}

/// Paints into a borrowed [`Frame`], interning styles in a borrowed registry.
pub struct PaintSurface<'a> {
    frame: &'a mut Frame,
    registry: &'a mut StyleRegistry,
    clips: Vec<ClipRect>,
    style_cache: Vec<Option<StyleId>>,
}

impl<'a> PaintSurface<'a> {
    /// Paint into `frame`. The frame is not cleared.
    pub fn new(frame: &'a mut Frame, registry: &'a mut StyleRegistry) -> Self {
        Self {
            frame,
            registry,
            clips: Vec::new(),
            style_cache: Vec::new(),
        }
    }

    /// Depth of the clip stack.
    pub fn clip_depth(&self) -> usize {
        self.clips.len()
    }

    /// Innermost clip rectangle, if any.
    pub fn active_clip(&self) -> Option<&ClipRect> {
        self.clips.last()
    }

    fn write_line(&mut self, x: i32, y: i32, line: &StyledLine, preserve_trailing: bool) {
        self.style_cache.clear();
        self.style_cache.resize(line.styles.len(), None);

        let last_content = if preserve_trailing {
            line.glyphs
                .iter()
                .rposition(|glyph| glyph.text != " ")
                .map_or(0, |i| i + 1)
        } else {
            line.glyphs.len()
        };

        let frame_width = self.frame.width() as i32;
        let mut col = x;
        for (i, glyph) in line.glyphs.iter().enumerate() {
            let width = glyph.width.max(1);
            if col >= frame_width || col + width as i32 > frame_width {
                break;
            }
            if col >= 0 {
                let style = match self.style_cache[glyph.style] {
                    Some(id) => id,
                    None => {
                        let id = self.registry.get_id(&line.styles[glyph.style]);
                        self.style_cache[glyph.style] = Some(id);
                        id
                    }
                };
                let preserve = i >= last_content;
                self.frame
                    .set_cell(col, y, &glyph.text, width, style, preserve);
            }
            col += width as i32;
        }
    }
}

impl fmt::Debug for PaintSurface<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaintSurface")
            .field("width", &self.frame.width())
            .field("height", &self.frame.height())
            .field("clips", &self.clips)
            .finish()
    }
}

impl PaintTarget for PaintSurface<'_> {
    fn write(&mut self, x: i32, y: i32, text: &str, transformers: &[Transformer]) {
        if text.is_empty() {
            return;
        }
        let Some((x, y, lines)) = clip_block(self.clips.last(), x, y, text) else {
            #[cfg(feature = "tracing")]
            tracing::trace!(x, y, "write fully clipped");
            return;
        };

        let height = self.frame.height() as i32;
        for (index, line) in lines.into_iter().enumerate() {
            let row = y + index as i32;
            if row < 0 {
                continue;
            }
            if row >= height {
                break;
            }
            let line = transformers
                .iter()
                .fold(line, |line, transform| transform(&line, index));
            let styled = StyledLine::parse(&line);
            self.write_line(x, row, &styled, !transformers.is_empty());
        }
    }

    fn fill(&mut self, x: i32, y: i32, length: i32, glyph: &str, width: u8, styles: &[StylePair]) {
        let width = width.max(1);
        if length <= 0 || glyph.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::debug!(x, y, length, "dropping empty fill");
            return;
        }

        let (mut start, mut end) = (x, x.saturating_add(length));
        if let Some(clip) = self.clips.last() {
            if !clip.contains_row(y) {
                return;
            }
            let Some((lo, hi)) = clip.clip_columns(start, end) else {
                return;
            };
            // Keep copies aligned to the unclipped origin.
            let step = width as i32;
            let skipped = (lo - start).saturating_add(step - 1) / step;
            start = start.saturating_add(skipped * step);
            end = hi;
            if start >= end {
                return;
            }
        }

        let style = self.registry.get_id(styles);
        self.frame.fill(start, y, end - start, glyph, width, style);
    }

    fn clip(&mut self, rect: ClipRect) {
        self.clips.push(rect);
    }

    fn unclip(&mut self) {
        self.clips.pop();
    }
}

/// Apply `clip` to a block of lines written at `(x, y)`.
///
/// Returns the visible origin and lines, or `None` when nothing is visible.
fn clip_block(clip: Option<&ClipRect>, x: i32, y: i32, text: &str) -> Option<(i32, i32, Vec<String>)> {
    let mut lines: Vec<String> = text.split('\n').map(str::to_owned).collect();
    let Some(clip) = clip else {
        return Some((x, y, lines));
    };
    let (mut x, mut y) = (x, y);

    if clip.x1.is_some() || clip.x2.is_some() {
        let parsed: Vec<StyledLine> = lines.iter().map(|line| StyledLine::parse(line)).collect();
        let widest = parsed.iter().map(StyledLine::width).max().unwrap_or(0);
        let right = x.saturating_add(i32::try_from(widest).unwrap_or(i32::MAX));
        let (lo, hi) = clip.clip_columns(x, right)?;
        if lo > x || hi < right {
            let from = (lo - x) as usize;
            let to = (hi - x) as usize;
            lines = parsed
                .iter()
                .map(|line| line.slice_columns(from, to).to_text())
                .collect();
            x = lo;
        }
    }

    if clip.y1.is_some() || clip.y2.is_some() {
        let height = lines.len() as i32;
        let (lo, hi) = clip.clip_rows(y, y.saturating_add(height))?;
        let from = (lo - y) as usize;
        let to = (hi - y) as usize;
        lines.truncate(to);
        lines.drain(..from);
        y = lo;
    }

    Some((x, y, lines))
}

/// A recorded paint operation.
#[derive(Clone)]
pub enum PaintOp {
    /// [`PaintTarget::write`].
    Write {
        /// Column of the first line.
        x: i32,
        /// Row of the first line.
        y: i32,
        /// Styled text, possibly multi-line.
        text: String,
        /// Line transformers, applied in order.
        transformers: Vec<Transformer>,
    },
    /// [`PaintTarget::fill`].
    Fill {
        /// First column.
        x: i32,
        /// Row.
        y: i32,
        /// Columns covered.
        length: i32,
        /// Fill glyph.
        glyph: String,
        /// Glyph display width.
        width: u8,
        /// Style pairs.
        styles: Vec<StylePair>,
    },
    /// [`PaintTarget::clip`].
    Clip(ClipRect),
    /// [`PaintTarget::unclip`].
    Unclip,
}

impl fmt::Debug for PaintOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write {
                x,
                y,
                text,
                transformers,
            } => f
                .debug_struct("Write")
                .field("x", x)
                .field("y", y)
                .field("text", text)
                .field("transformers", &transformers.len())
                .finish(),
            Self::Fill {
                x,
                y,
                length,
                glyph,
                width,
                styles,
            } => f
                .debug_struct("Fill")
                .field("x", x)
                .field("y", y)
                .field("length", length)
                .field("glyph", glyph)
                .field("width", width)
                .field("styles", styles)
                .finish(),
            Self::Clip(rect) => f.debug_tuple("Clip").field(rect).finish(),
            Self::Unclip => f.write_str("Unclip"),
        }
    }
}

impl PaintOp {
    /// Apply this operation to `target`.
    pub fn apply<T: PaintTarget + ?Sized>(&self, target: &mut T) {
        match self {
            Self::Write {
                x,
                y,
                text,
                transformers,
            } => target.write(*x, *y, text, transformers),
            Self::Fill {
                x,
                y,
                length,
                glyph,
                width,
                styles,
            } => target.fill(*x, *y, *length, glyph, *width, styles),
            Self::Clip(rect) => target.clip(*rect),
            Self::Unclip => target.unclip(),
        }
    }
}

/// Text produced by [`OperationLog::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Rows joined by `\n`, each trimmed at its right edge.
    pub output: String,
    /// Number of rows.
    pub height: u16,
}

/// Records paint operations for a `width` x `height` area and replays them
/// on demand.
///
/// ```
/// use glyphdiff_render::paint::{OperationLog, PaintTarget};
///
/// let mut log = OperationLog::new(10, 2);
/// log.write(0, 0, "hi", &[]);
/// log.write(3, 1, "there", &[]);
/// let rendered = log.get();
/// assert_eq!(rendered.output, "hi\n   there");
/// assert_eq!(rendered.height, 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    width: u16,
    height: u16,
    ops: Vec<PaintOp>,
}

impl OperationLog {
    /// Create an empty log.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    /// Recorded operations in order.
    pub fn ops(&self) -> &[PaintOp] {
        &self.ops
    }

    /// Number of recorded operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Replay every operation into `frame`.
    pub fn replay_into(&self, frame: &mut Frame, registry: &mut StyleRegistry) {
        let mut surface = PaintSurface::new(frame, registry);
        for op in &self.ops {
            op.apply(&mut surface);
        }
    }

    /// Replay into a fresh frame and serialize it.
    pub fn get(&self) -> Rendered {
        let mut frame = Frame::new(self.width, self.height);
        let mut registry = StyleRegistry::new();
        self.replay_into(&mut frame, &mut registry);
        Rendered {
            output: frame.serialize(&registry),
            height: self.height,
        }
    }
}

impl PaintTarget for OperationLog {
    fn write(&mut self, x: i32, y: i32, text: &str, transformers: &[Transformer]) {
        if text.is_empty() {
            return;
        }
        self.ops.push(PaintOp::Write {
            x,
            y,
            text: text.to_owned(),
            transformers: transformers.to_vec(),
        });
    }

    fn fill(&mut self, x: i32, y: i32, length: i32, glyph: &str, width: u8, styles: &[StylePair]) {
        self.ops.push(PaintOp::Fill {
            x,
            y,
            length,
            glyph: glyph.to_owned(),
            width,
            styles: styles.to_vec(),
        });
    }

    fn clip(&mut self, rect: ClipRect) {
        self.ops.push(PaintOp::Clip(rect));
    }

    fn unclip(&mut self) {
        self.ops.push(PaintOp::Unclip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paint(width: u16, height: u16, f: impl FnOnce(&mut PaintSurface<'_>)) -> (Frame, StyleRegistry) {
        let mut frame = Frame::new(width, height);
        let mut registry = StyleRegistry::new();
        {
            let mut surface = PaintSurface::new(&mut frame, &mut registry);
            f(&mut surface);
        }
        (frame, registry)
    }

    fn rows(frame: &Frame, registry: &StyleRegistry) -> Vec<String> {
        (0..frame.height())
            .map(|row| frame.serialize_row(row, registry))
            .collect()
    }

    #[test]
    fn write_splits_lines() {
        let (frame, registry) = paint(8, 3, |s| s.write(1, 0, "ab\ncd", &[]));
        assert_eq!(rows(&frame, &registry), [" ab", " cd", ""]);
    }

    #[test]
    fn write_interns_styles() {
        let (frame, registry) = paint(8, 1, |s| s.write(0, 0, "\x1b[1mhi\x1b[22m!", &[]));
        let bold = frame.cell(0, 0).unwrap().style;
        assert!(!bold.is_none());
        assert_eq!(frame.cell(1, 0).unwrap().style, bold);
        assert!(frame.cell(2, 0).unwrap().style.is_none());
        assert_eq!(frame.serialize_row(0, &registry), "\x1b[1mhi\x1b[22m!");
    }

    #[test]
    fn wide_glyph_that_does_not_fit_is_skipped() {
        let (frame, registry) = paint(3, 1, |s| s.write(0, 0, "ab中", &[]));
        assert_eq!(frame.serialize_row(0, &registry), "ab");
        assert!(!frame.cell(2, 0).unwrap().touched);
    }

    #[test]
    fn negative_origin_skips_offscreen_glyphs() {
        let (frame, registry) = paint(4, 1, |s| s.write(-2, 0, "abcd", &[]));
        assert_eq!(frame.serialize_row(0, &registry), "cd");
    }

    #[test]
    fn transformer_output_preserves_trailing_spaces() {
        let pad: Transformer = Arc::new(|line: &str, _: usize| format!("{line}  "));
        let (frame, registry) = paint(8, 1, |s| s.write(0, 0, "ab", &[pad]));
        assert!(frame.cell(2, 0).unwrap().preserve);
        assert!(frame.cell(3, 0).unwrap().preserve);
        assert!(!frame.cell(1, 0).unwrap().preserve);
        assert_eq!(frame.serialize_row(0, &registry), "ab  ");
    }

    #[test]
    fn raw_trailing_spaces_are_trimmed() {
        let (frame, registry) = paint(8, 1, |s| s.write(0, 0, "ab  ", &[]));
        assert!(!frame.cell(2, 0).unwrap().preserve);
        assert_eq!(frame.serialize_row(0, &registry), "ab");
    }

    #[test]
    fn transformers_run_in_order_with_line_index() {
        let number: Transformer = Arc::new(|line: &str, i: usize| format!("{i}:{line}"));
        let upper: Transformer = Arc::new(|line: &str, _: usize| line.to_uppercase());
        let (frame, registry) = paint(8, 2, |s| s.write(0, 0, "a\nb", &[number, upper]));
        assert_eq!(rows(&frame, &registry), ["0:A", "1:B"]);
    }

    #[test]
    fn clip_slices_columns_and_rows() {
        let (frame, registry) = paint(10, 4, |s| {
            s.clip(ClipRect::new(2, 1, 3, 2));
            s.write(0, 0, "abcdef\nghijkl\nmnopqr", &[]);
            s.unclip();
        });
        assert_eq!(rows(&frame, &registry), ["", "  ijk", "  opq", ""]);
    }

    #[test]
    fn fully_clipped_write_is_skipped() {
        let (frame, registry) = paint(10, 2, |s| {
            s.clip(ClipRect::new(5, 0, 5, 2));
            s.write(0, 0, "abcde", &[]);
        });
        assert_eq!(rows(&frame, &registry), ["", ""]);
    }

    #[test]
    fn clip_bounds_are_independent() {
        let (frame, registry) = paint(10, 3, |s| {
            s.clip(ClipRect::UNBOUNDED.with_rows(None, Some(1)));
            s.write(0, 0, "abc\ndef", &[]);
        });
        assert_eq!(rows(&frame, &registry), ["abc", "", ""]);
    }

    #[test]
    fn only_innermost_clip_applies() {
        let (frame, registry) = paint(12, 1, |s| {
            s.clip(ClipRect::new(0, 0, 3, 1));
            s.clip(ClipRect::new(2, 0, 6, 1));
            s.write(0, 0, "abcdefghij", &[]);
            s.unclip();
            s.write(0, 0, "xyz", &[]);
        });
        // inner rect [2, 8) is used as-is, not intersected with [0, 3)
        assert_eq!(frame.serialize_row(0, &registry), "xyzdefgh");
    }

    #[test]
    fn clip_cutting_wide_glyph_pads_left() {
        let (frame, registry) = paint(6, 1, |s| {
            s.clip(ClipRect::UNBOUNDED.with_columns(Some(1), None));
            s.write(0, 0, "中ab", &[]);
        });
        assert_eq!(frame.serialize_row(0, &registry), "  ab");
        assert!(frame.cell(1, 0).unwrap().touched);
        assert!(!frame.cell(0, 0).unwrap().touched);
    }

    #[test]
    fn extreme_origins_under_column_clip_are_ignored() {
        let (frame, registry) = paint(6, 1, |s| {
            s.clip(ClipRect::UNBOUNDED.with_columns(Some(0), None));
            s.write(i32::MAX - 2, 0, "abcde", &[]);
            s.write(i32::MIN, 0, "abcde", &[]);
            s.clip(ClipRect::UNBOUNDED.with_columns(Some(-10), None));
            s.fill(i32::MIN, 0, i32::MAX, "=", 20, &[]);
        });
        assert_eq!(rows(&frame, &registry), [""]);
    }

    #[test]
    fn fill_respects_clip_and_alignment() {
        let (frame, registry) = paint(10, 2, |s| {
            s.clip(ClipRect::new(1, 0, 6, 1));
            s.fill(0, 0, 10, "中", 2, &[]);
            s.fill(0, 1, 10, "-", 1, &[]);
        });
        // copies at 2 and 4 fit in [1, 7); the copy at 6 would cross 7
        assert_eq!(rows(&frame, &registry), ["  中中", ""]);
    }

    #[test]
    fn fill_with_style_and_bad_length() {
        let red = [StylePair::new("\x1b[41m", "\x1b[49m")];
        let (frame, registry) = paint(6, 1, |s| {
            s.fill(1, 0, 3, " ", 1, &red);
            s.fill(0, 0, 0, "x", 1, &[]);
            s.fill(0, 0, -3, "x", 1, &[]);
        });
        assert_eq!(frame.serialize_row(0, &registry), " \x1b[41m   \x1b[49m");
    }

    #[test]
    fn unclip_on_empty_stack_is_harmless() {
        let (frame, registry) = paint(4, 1, |s| {
            s.unclip();
            assert_eq!(s.clip_depth(), 0);
            s.write(0, 0, "ok", &[]);
        });
        assert_eq!(frame.serialize_row(0, &registry), "ok");
    }

    #[test]
    fn operation_log_replays_like_surface() {
        let upper: Transformer = Arc::new(|line: &str, _: usize| line.to_uppercase());
        let mut log = OperationLog::new(8, 3);
        log.clip(ClipRect::new(0, 0, 4, 2));
        log.write(1, 0, "hello\nworld\nagain", &[upper.clone()]);
        log.unclip();
        log.fill(0, 2, 3, "=", 1, &[]);
        assert_eq!(log.len(), 4);

        let (frame, registry) = paint(8, 3, |s| {
            s.clip(ClipRect::new(0, 0, 4, 2));
            s.write(1, 0, "hello\nworld\nagain", &[upper]);
            s.unclip();
            s.fill(0, 2, 3, "=", 1, &[]);
        });
        let rendered = log.get();
        assert_eq!(rendered.output, frame.serialize(&registry));
        assert_eq!(rendered.output, " HEL\n WOR\n===");
        assert_eq!(rendered.height, 3);
    }

    #[test]
    fn empty_log_renders_blank_rows() {
        let log = OperationLog::new(3, 2);
        assert!(log.is_empty());
        assert_eq!(log.get(), Rendered { output: "\n".into(), height: 2 });
    }
}
