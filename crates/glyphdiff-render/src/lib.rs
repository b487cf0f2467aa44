#![forbid(unsafe_code)]

//! Render kernel: frames, style interning, row diffs, and ANSI output.
//!
//! Painting goes through a [`PaintSurface`] into a [`Frame`]; a
//! [`FrameRenderer`] diffs each frame against the last one written and
//! emits the cheapest patch per row. [`LineDiffer`] covers callers that
//! only have a rendered string.

pub mod ansi;
pub mod cost;
pub mod diff;
pub mod frame;
pub mod line_differ;
pub mod paint;
pub mod renderer;
pub mod style;
pub mod styled_text;
pub mod terminal_model;

pub use diff::{DiffConfig, MergeStrategy, RowDiffer, RowPlan, RowPlanKind};
pub use frame::{CellRef, Frame, Glyph};
pub use line_differ::LineDiffer;
pub use paint::{OperationLog, PaintSurface, PaintTarget, Rendered, Transformer};
pub use renderer::{FrameRenderer, RenderOptions, RenderStats, RendererConfig};
pub use style::{StyleId, StylePair, StyleRegistry};
pub use styled_text::{StyledGlyph, StyledLine};
pub use terminal_model::TerminalModel;
