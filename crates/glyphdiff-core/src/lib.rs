#![forbid(unsafe_code)]

//! Core: clip geometry, display-width measurement, and output sinks.

pub mod geometry;
pub mod sink;
pub mod text_width;

pub use geometry::ClipRect;
pub use sink::{OutputSink, TerminalSink, WriterSink};
pub use text_width::{display_width, grapheme_width};
