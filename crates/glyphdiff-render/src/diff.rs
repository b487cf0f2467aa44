#![forbid(unsafe_code)]

//! Row differ: plans the bytes that turn one row of a frame into the next.
//!
//! # Algorithm
//!
//! For row `r` of previous frame `P` and next frame `N`:
//!
//! 1. Rows that are cell-for-cell equal only advance to the next line.
//! 2. The scan range is bounded by the row right edges. When `P` reaches
//!    further right than `N` the row needs a tail clear (erase to end of line)
//!    and only `[0, N.edge)` is scanned.
//! 3. Columns whose glyph, width or style differ are coalesced into
//!    [`Segment`]s, then widened to glyph boundaries in both frames so no
//!    multi-column glyph is ever split, then re-merged where they touch.
//! 4. Segments are turned into [`RowOp`]s by the configured
//!    [`MergeStrategy`]. The cost strategy compares, per segment, a cursor
//!    move plus write against overwriting the unchanged gap.
//! 5. The patch total (ops, closing the open style, optional erase, next
//!    line) is compared with rewriting the whole visible row, which ends with
//!    an erase to end of line unless the row reaches the right margin. The
//!    patch is used only if strictly cheaper. Rows with more than
//!    [`DiffConfig::max_segments`] segments skip planning and are rewritten.
//!
//! The modeled cost of a [`RowPlan`] is exactly the number of bytes
//! [`RowPlan::emit`] writes.
//!
//! # Usage
//!
//! ```
//! use glyphdiff_render::diff::{RowDiffer, RowPlanKind};
//! use glyphdiff_render::frame::Frame;
//! use glyphdiff_render::style::{StyleId, StyleRegistry};
//!
//! let registry = StyleRegistry::new();
//! let mut prev = Frame::new(10, 1);
//! let mut next = Frame::new(10, 1);
//! for (col, ch) in "z123456789".chars().enumerate() {
//!     prev.set_cell(col as i32, 0, &ch.to_string(), 1, StyleId::NONE, false);
//! }
//! for (col, ch) in "a123456789".chars().enumerate() {
//!     next.set_cell(col as i32, 0, &ch.to_string(), 1, StyleId::NONE, false);
//! }
//!
//! let mut differ = RowDiffer::default();
//! let plan = differ.plan_row(&prev, &next, 0, &registry);
//! assert_eq!(plan.kind, RowPlanKind::Patch);
//!
//! let mut out = Vec::new();
//! plan.emit(&next, &registry, &mut out).unwrap();
//! assert_eq!(out, b"a\x1b[E");
//! ```

use std::env;
use std::fmt;
use std::io;
use std::str::FromStr;

use smallvec::SmallVec;

use crate::ansi;
use crate::cost::{CostModel, MoveKind};
use crate::frame::Frame;
use crate::style::{StyleId, StyleRegistry};

/// How changed segments are combined into cursor moves and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MergeStrategy {
    /// Pick move+write or gap overwrite per segment by modeled byte cost.
    #[default]
    Cost,
    /// Merge segments separated by at most `merge_threshold` cells.
    Threshold,
}

impl MergeStrategy {
    /// Lowercase name, as accepted by [`FromStr`].
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::Threshold => "threshold",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a merge strategy name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMergeStrategyError {
    input: String,
}

impl ParseMergeStrategyError {
    /// The rejected input.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for ParseMergeStrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown merge strategy {:?} (expected \"cost\" or \"threshold\")",
            self.input
        )
    }
}

impl std::error::Error for ParseMergeStrategyError {}

impl FromStr for MergeStrategy {
    type Err = ParseMergeStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("cost") {
            Ok(Self::Cost)
        } else if trimmed.eq_ignore_ascii_case("threshold") {
            Ok(Self::Threshold)
        } else {
            Err(ParseMergeStrategyError {
                input: s.to_owned(),
            })
        }
    }
}

/// Merge strategy environment variable.
pub const ENV_MERGE_STRATEGY: &str = "GLYPHDIFF_MERGE_STRATEGY";
/// Merge threshold environment variable.
pub const ENV_MERGE_THRESHOLD: &str = "GLYPHDIFF_MERGE_THRESHOLD";
/// Gap overwrite penalty environment variable.
pub const ENV_GAP_PENALTY: &str = "GLYPHDIFF_GAP_PENALTY";
/// Segment cap environment variable.
pub const ENV_MAX_SEGMENTS: &str = "GLYPHDIFF_MAX_SEGMENTS";

/// Row differ tuning.
///
/// ```
/// use glyphdiff_render::diff::{DiffConfig, MergeStrategy};
///
/// let config = DiffConfig::new()
///     .with_strategy(MergeStrategy::Threshold)
///     .with_merge_threshold(4);
/// assert_eq!(config.max_segments, 12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffConfig {
    /// Segment merge strategy.
    ///
    /// Default: [`MergeStrategy::Cost`]
    pub strategy: MergeStrategy,

    /// Largest gap, in cells, merged by [`MergeStrategy::Threshold`].
    ///
    /// Default: 2
    pub merge_threshold: u16,

    /// Bytes added to a gap overwrite when the cost strategy compares plans.
    /// Only biases the choice; the plan's reported cost stays exact.
    ///
    /// Default: 2
    pub gap_overwrite_penalty: usize,

    /// Rows with more segments than this are rewritten without planning.
    ///
    /// Default: 12
    pub max_segments: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::Cost,
            merge_threshold: 2,
            gap_overwrite_penalty: 2,
            max_segments: 12,
        }
    }
}

impl DiffConfig {
    /// Create a config with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from the `GLYPHDIFF_*` environment variables.
    ///
    /// Unset or unparseable variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(strategy) = parse_var(&lookup, ENV_MERGE_STRATEGY) {
            config.strategy = strategy;
        }
        if let Some(threshold) = parse_var(&lookup, ENV_MERGE_THRESHOLD) {
            config.merge_threshold = threshold;
        }
        if let Some(penalty) = parse_var(&lookup, ENV_GAP_PENALTY) {
            config.gap_overwrite_penalty = penalty;
        }
        if let Some(max) = parse_var(&lookup, ENV_MAX_SEGMENTS) {
            config.max_segments = max;
        }
        config
    }

    /// Set the merge strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the threshold strategy's gap size.
    #[must_use]
    pub fn with_merge_threshold(mut self, cells: u16) -> Self {
        self.merge_threshold = cells;
        self
    }

    /// Set the gap overwrite penalty.
    #[must_use]
    pub fn with_gap_overwrite_penalty(mut self, bytes: usize) -> Self {
        self.gap_overwrite_penalty = bytes;
        self
    }

    /// Set the per-row segment cap.
    #[must_use]
    pub fn with_max_segments(mut self, max: usize) -> Self {
        self.max_segments = max;
        self
    }
}

/// Parse `name` through `lookup`, warning about values that do not parse.
pub(crate) fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(var = name, value = %raw, "ignoring unparseable config value");
            None
        }
    }
}

/// A `[start, end)` run of changed columns on one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// First column (inclusive).
    pub start: u16,
    /// Last column (exclusive).
    pub end: u16,
}

impl Segment {
    /// Create a segment.
    #[inline]
    pub const fn new(start: u16, end: u16) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Number of columns covered.
    #[inline]
    pub const fn len(&self) -> u16 {
        self.end - self.start
    }

    /// True when no columns are covered.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Segment list for one row; most rows fit inline.
pub type Segments = SmallVec<[Segment; 8]>;

/// One step of a row patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOp {
    /// Move the cursor to column `col`.
    Move {
        /// Target column.
        col: u16,
        /// Addressing used to get there.
        kind: MoveKind,
    },
    /// Write cells `[start, end)` of the next frame.
    Write {
        /// First column (inclusive).
        start: u16,
        /// Last column (exclusive).
        end: u16,
    },
}

/// What a [`RowPlan`] does with its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowPlanKind {
    /// Row is identical; only advance to the next line.
    Unchanged,
    /// Cursor moves and partial writes.
    Patch,
    /// Rewrite the visible row from column 0.
    FullRewrite,
}

/// The planned output for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPlan {
    /// Row index.
    pub row: u16,
    /// Chosen plan.
    pub kind: RowPlanKind,
    /// Cursor moves and writes, left to right.
    pub ops: SmallVec<[RowOp; 8]>,
    /// Erase from the cursor to the end of the line before advancing.
    pub tail_clear: bool,
    /// Exact bytes [`emit`](Self::emit) writes.
    pub cost: usize,
    /// Bytes a full-row rewrite would take.
    pub full_cost: usize,
    /// Segments after normalization and merging.
    pub segments: usize,
}

impl RowPlan {
    fn unchanged(row: u16) -> Self {
        Self {
            row,
            kind: RowPlanKind::Unchanged,
            ops: SmallVec::new(),
            tail_clear: false,
            cost: ansi::NEXT_LINE.len(),
            full_cost: ansi::NEXT_LINE.len(),
            segments: 0,
        }
    }

    fn full_rewrite(
        row: u16,
        end: u16,
        tail_clear: bool,
        full_cost: usize,
        segments: usize,
    ) -> Self {
        let mut ops = SmallVec::new();
        if end > 0 {
            ops.push(RowOp::Write { start: 0, end });
        }
        Self {
            row,
            kind: RowPlanKind::FullRewrite,
            ops,
            tail_clear,
            cost: full_cost,
            full_cost,
            segments,
        }
    }

    /// Append this plan's bytes for `next` to `out`.
    ///
    /// The cursor is assumed to be at column 0 of the row with no style open;
    /// afterwards it is at column 0 of the following line.
    pub fn emit<W: io::Write>(
        &self,
        next: &Frame,
        registry: &StyleRegistry,
        out: &mut W,
    ) -> io::Result<()> {
        let mut buf = Vec::with_capacity(self.cost);
        let mut cursor = 0u16;
        let mut style = StyleId::NONE;
        for op in &self.ops {
            match *op {
                RowOp::Move { col, kind } => {
                    match kind {
                        MoveKind::Forward => ansi::cursor_forward(&mut buf, col - cursor)?,
                        MoveKind::Absolute => ansi::cursor_to_column(&mut buf, col)?,
                    }
                    cursor = col;
                }
                RowOp::Write { start, end } => {
                    style = next.write_cells(self.row, start, end, registry, style, &mut buf);
                    cursor = end;
                }
            }
        }
        registry.push_close(style, &mut buf);
        if self.tail_clear {
            ansi::erase_to_end(&mut buf)?;
        }
        ansi::next_line(&mut buf)?;
        debug_assert_eq!(buf.len(), self.cost, "row {} cost drifted", self.row);
        out.write_all(&buf)
    }
}

/// Plans row patches between two frames.
///
/// Holds the config and a reusable segment buffer.
#[derive(Debug, Clone, Default)]
pub struct RowDiffer {
    config: DiffConfig,
    segments: Segments,
}

impl RowDiffer {
    /// Create a differ with `config`.
    pub fn new(config: DiffConfig) -> Self {
        Self {
            config,
            segments: Segments::new(),
        }
    }

    /// Current config.
    #[inline]
    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// Replace the config.
    pub fn set_config(&mut self, config: DiffConfig) {
        self.config = config;
    }

    /// Plan row `row` of `next` against `prev`.
    ///
    /// Frames of different sizes have nothing to diff against, so the row
    /// is planned as a full rewrite that erases whatever follows it. A row
    /// reaching the right margin leaves the cursor in the pending wrap
    /// state, where an erase would hit the last cell, so it gets none.
    pub fn plan_row(
        &mut self,
        prev: &Frame,
        next: &Frame,
        row: u16,
        registry: &StyleRegistry,
    ) -> RowPlan {
        let model = CostModel::new(registry, self.config.gap_overwrite_penalty);

        if !prev.same_size(next) {
            let end = next.row_right_edge(row);
            let tail_clear = end < next.width();
            let full_cost = model.full_row_cost(next, row, end, tail_clear);
            return RowPlan::full_rewrite(row, end, tail_clear, full_cost, 0);
        }
        if prev.is_row_equal(next, row) {
            return RowPlan::unchanged(row);
        }

        let next_end = next.row_right_edge(row);
        let prev_end = prev.row_right_edge(row);
        let tail_clear = prev_end > next_end;
        let scan_end = if tail_clear {
            next_end
        } else {
            next_end.max(prev_end)
        };
        let full_cost = model.full_row_cost(next, row, next_end, tail_clear);

        self.segments.clear();
        changed_segments(prev, next, row, scan_end, &mut self.segments);
        normalize_segments(prev, next, row, &mut self.segments);
        if self.config.strategy == MergeStrategy::Threshold {
            merge_within(&mut self.segments, self.config.merge_threshold);
        }
        let segments = self.segments.len();

        if segments > self.config.max_segments {
            #[cfg(feature = "tracing")]
            tracing::trace!(row, segments, full_cost, plan = "full", "segment cap exceeded");
            return RowPlan::full_rewrite(row, next_end, tail_clear, full_cost, segments);
        }

        let (mut ops, cursor, style, mut cost) = match self.config.strategy {
            MergeStrategy::Cost => plan_by_cost(&model, next, row, &self.segments),
            MergeStrategy::Threshold => plan_by_moves(&model, next, row, &self.segments),
        };

        if tail_clear && cursor < next_end {
            let (bytes, kind) = model.move_cost(cursor, next_end);
            ops.push(RowOp::Move {
                col: next_end,
                kind,
            });
            cost += bytes;
        }
        cost += model.trailing_cost(style, tail_clear);

        let plan = if cost < full_cost {
            RowPlan {
                row,
                kind: RowPlanKind::Patch,
                ops,
                tail_clear,
                cost,
                full_cost,
                segments,
            }
        } else {
            RowPlan::full_rewrite(row, next_end, tail_clear, full_cost, segments)
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(
            row,
            segments,
            plan = ?plan.kind,
            cost = plan.cost,
            full_cost,
            "row_plan"
        );

        plan
    }

    /// Plan and emit row `row` in one step.
    pub fn diff_row<W: io::Write>(
        &mut self,
        prev: &Frame,
        next: &Frame,
        row: u16,
        registry: &StyleRegistry,
        out: &mut W,
    ) -> io::Result<RowPlan> {
        let plan = self.plan_row(prev, next, row, registry);
        plan.emit(next, registry, out)?;
        Ok(plan)
    }
}

type Planned = (SmallVec<[RowOp; 8]>, u16, StyleId, usize);

/// Append a write, extending the previous one when they touch.
fn push_write(ops: &mut SmallVec<[RowOp; 8]>, start: u16, end: u16) {
    if let Some(RowOp::Write { end: last_end, .. }) = ops.last_mut() {
        if *last_end == start {
            *last_end = end;
            return;
        }
    }
    ops.push(RowOp::Write { start, end });
}

fn plan_by_cost(model: &CostModel<'_>, next: &Frame, row: u16, segments: &[Segment]) -> Planned {
    let mut ops = SmallVec::new();
    let mut cursor = 0u16;
    let mut style = StyleId::NONE;
    let mut cost = 0usize;

    for seg in segments {
        if seg.start > cursor {
            let (move_bytes, kind) = model.move_cost(cursor, seg.start);
            let (seg_bytes, seg_style) = model.write_cost(next, row, seg.start, seg.end, style);
            let (gap_bytes, gap_style) = model.write_cost(next, row, cursor, seg.end, style);

            if move_bytes + seg_bytes <= gap_bytes + model.gap_penalty() {
                ops.push(RowOp::Move {
                    col: seg.start,
                    kind,
                });
                push_write(&mut ops, seg.start, seg.end);
                cost += move_bytes + seg_bytes;
                style = seg_style;
            } else {
                push_write(&mut ops, cursor, seg.end);
                cost += gap_bytes;
                style = gap_style;
            }
        } else {
            let (seg_bytes, seg_style) = model.write_cost(next, row, seg.start, seg.end, style);
            push_write(&mut ops, seg.start, seg.end);
            cost += seg_bytes;
            style = seg_style;
        }
        cursor = seg.end;
    }

    (ops, cursor, style, cost)
}

fn plan_by_moves(model: &CostModel<'_>, next: &Frame, row: u16, segments: &[Segment]) -> Planned {
    let mut ops = SmallVec::new();
    let mut cursor = 0u16;
    let mut style = StyleId::NONE;
    let mut cost = 0usize;

    for seg in segments {
        if seg.start > cursor {
            let (move_bytes, kind) = model.move_cost(cursor, seg.start);
            ops.push(RowOp::Move {
                col: seg.start,
                kind,
            });
            cost += move_bytes;
        }
        let (seg_bytes, seg_style) = model.write_cost(next, row, seg.start, seg.end, style);
        push_write(&mut ops, seg.start, seg.end);
        cost += seg_bytes;
        style = seg_style;
        cursor = seg.end;
    }

    (ops, cursor, style, cost)
}

/// Collect runs of columns in `[0, scan_end)` whose glyph, width or style
/// differ between `prev` and `next`. Both frames must have the same size.
pub fn changed_segments(
    prev: &Frame,
    next: &Frame,
    row: u16,
    scan_end: u16,
    out: &mut Segments,
) {
    let base = row as usize * next.width() as usize;
    let mut run_start: Option<u16> = None;
    for col in 0..scan_end {
        let changed = !prev.same_visual(next, base + col as usize);
        match (changed, run_start) {
            (true, None) => run_start = Some(col),
            (false, Some(start)) => {
                out.push(Segment::new(start, col));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        out.push(Segment::new(start, scan_end));
    }
}

/// Widen each segment to glyph boundaries in both frames, then merge
/// segments that touch or overlap.
pub fn normalize_segments(prev: &Frame, next: &Frame, row: u16, segments: &mut Segments) {
    let width = next.width();
    let is_cont = |col: u16| prev.width_at(col, row) == 0 || next.width_at(col, row) == 0;

    for seg in segments.iter_mut() {
        while seg.start > 0 && is_cont(seg.start) {
            seg.start -= 1;
        }
        while seg.end < width && is_cont(seg.end) {
            seg.end += 1;
        }
    }
    merge_within(segments, 0);
}

/// Merge consecutive segments whose gap is at most `gap` cells.
pub fn merge_within(segments: &mut Segments, gap: u16) {
    if segments.len() < 2 {
        return;
    }
    let mut merged = 0;
    for i in 1..segments.len() {
        let seg = segments[i];
        let last = &mut segments[merged];
        if seg.start <= last.end.saturating_add(gap) {
            last.end = last.end.max(seg.end);
        } else {
            merged += 1;
            segments[merged] = seg;
        }
    }
    segments.truncate(merged + 1);
}
