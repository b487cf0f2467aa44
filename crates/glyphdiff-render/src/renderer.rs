#![forbid(unsafe_code)]

//! Frame renderer: turns successive frames into one write per render.
//!
//! The renderer owns a [`StyleRegistry`] and two frames: `front` (what was
//! last written successfully) and `back` (the paint target for the next
//! pass). A render pass looks like:
//!
//! ```
//! use glyphdiff_render::paint::PaintTarget;
//! use glyphdiff_render::renderer::{FrameRenderer, RenderOptions, RendererConfig};
//!
//! let mut renderer = FrameRenderer::new(Vec::new(), RendererConfig::default());
//!
//! let mut surface = renderer.begin_frame(12, 2);
//! surface.write(0, 0, "hello world", &[]);
//! drop(surface);
//! let first = renderer.render(RenderOptions::default()).unwrap();
//! assert!(first.full_redraw);
//!
//! let mut surface = renderer.begin_frame(12, 2);
//! surface.write(0, 0, "hello World", &[]);
//! drop(surface);
//! let second = renderer.render(RenderOptions::default()).unwrap();
//! assert!(!second.full_redraw);
//! assert_eq!(second.rows_patched, 1);
//! assert_eq!(second.rows_unchanged, 1);
//! ```
//!
//! # Output shape
//!
//! A full redraw erases the previously rendered lines and writes every row
//! followed by `\n`, leaving the cursor on the line below the frame. An
//! incremental render moves the cursor up by the previous height and emits
//! one row chunk per row, each ending with a move to the next line, so the
//! cursor ends up in the same place.
//!
//! # Failure
//!
//! Each render issues a single sink write. If it fails the error is
//! returned unchanged and no state is updated: the frames are not swapped
//! and the tracked height stays as it was.

use std::env;
use std::io;

use glyphdiff_core::OutputSink;

use crate::ansi;
use crate::diff::{DiffConfig, RowDiffer, RowPlanKind};
use crate::frame::Frame;
use crate::paint::PaintSurface;
use crate::style::{StyleId, StyleRegistry};

/// Incremental mode environment variable.
pub const ENV_INCREMENTAL: &str = "GLYPHDIFF_INCREMENTAL";
/// Cursor visibility environment variable.
pub const ENV_SHOW_CURSOR: &str = "GLYPHDIFF_SHOW_CURSOR";

/// Renderer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererConfig {
    /// Row differ tuning.
    pub diff: DiffConfig,

    /// Patch changed rows instead of redrawing the whole frame.
    ///
    /// Default: true
    pub incremental: bool,

    /// Leave the terminal cursor visible while rendering.
    ///
    /// Default: false
    pub show_cursor: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            diff: DiffConfig::default(),
            incremental: true,
            show_cursor: false,
        }
    }
}

impl RendererConfig {
    /// Create a config with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from the `GLYPHDIFF_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self {
            diff: DiffConfig::from_lookup(&lookup),
            ..Self::default()
        };
        if let Some(incremental) = flag_var(&lookup, ENV_INCREMENTAL) {
            config.incremental = incremental;
        }
        if let Some(show) = flag_var(&lookup, ENV_SHOW_CURSOR) {
            config.show_cursor = show;
        }
        config
    }

    /// Set the differ config.
    #[must_use]
    pub fn with_diff(mut self, diff: DiffConfig) -> Self {
        self.diff = diff;
        self
    }

    /// Enable or disable incremental rendering.
    #[must_use]
    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    /// Keep the cursor visible (or hide it while rendering).
    #[must_use]
    pub fn with_show_cursor(mut self, show: bool) -> Self {
        self.show_cursor = show;
        self
    }
}

fn flag_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<bool> {
    let raw = lookup(name)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            #[cfg(feature = "tracing")]
            tracing::warn!(var = name, value = %raw, "ignoring unparseable flag");
            None
        }
    }
}

/// Per-call render options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Redraw the whole frame even if an incremental update is possible.
    pub force_full: bool,
}

impl RenderOptions {
    /// Options forcing a full redraw.
    pub const fn full() -> Self {
        Self { force_full: true }
    }
}

/// What a render call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Bytes handed to the sink (0 when the render was skipped).
    pub bytes_emitted: usize,
    /// The whole frame was redrawn.
    pub full_redraw: bool,
    /// Rows that only advanced to the next line.
    pub rows_unchanged: usize,
    /// Rows updated with a patch.
    pub rows_patched: usize,
    /// Rows written from column 0.
    pub rows_rewritten: usize,
}

/// Renders frames to an [`OutputSink`].
#[derive(Debug)]
pub struct FrameRenderer<S: OutputSink> {
    sink: S,
    config: RendererConfig,
    differ: RowDiffer,
    registry: StyleRegistry,
    front: Frame,
    back: Frame,
    has_front: bool,
    previous_height: Option<u16>,
    cursor_hidden: bool,
    buf: Vec<u8>,
}

impl<S: OutputSink> FrameRenderer<S> {
    /// Create a renderer writing to `sink`.
    pub fn new(sink: S, config: RendererConfig) -> Self {
        Self {
            sink,
            config,
            differ: RowDiffer::new(config.diff),
            registry: StyleRegistry::new(),
            front: Frame::default(),
            back: Frame::default(),
            has_front: false,
            previous_height: None,
            cursor_hidden: false,
            buf: Vec::new(),
        }
    }

    /// Current config.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Replace the config. Takes effect on the next render.
    pub fn set_config(&mut self, config: RendererConfig) {
        self.config = config;
        self.differ.set_config(config.diff);
    }

    /// The style registry shared by every frame this renderer diffs.
    pub fn registry(&self) -> &StyleRegistry {
        &self.registry
    }

    /// Mutable registry, for painting frames owned by the caller.
    pub fn registry_mut(&mut self) -> &mut StyleRegistry {
        &mut self.registry
    }

    /// The last frame written successfully.
    pub fn front(&self) -> Option<&Frame> {
        self.has_front.then_some(&self.front)
    }

    /// Height of the last rendered or synced frame.
    pub fn previous_height(&self) -> Option<u16> {
        self.previous_height
    }

    /// Lines a full redraw or [`clear`](Self::clear) would erase.
    pub fn previous_line_count(&self) -> usize {
        self.previous_height.map_or(0, |height| height as usize + 1)
    }

    /// True while this renderer has the cursor hidden.
    pub fn cursor_hidden(&self) -> bool {
        self.cursor_hidden
    }

    /// The output sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable output sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the renderer, returning its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Terminal size reported by the sink, if any.
    pub fn terminal_size(&self) -> Option<(u16, u16)> {
        self.sink.size()
    }

    /// Prepare the back frame for a `width` x `height` pass and return a
    /// surface painting into it.
    pub fn begin_frame(&mut self, width: u16, height: u16) -> PaintSurface<'_> {
        self.back.resize(width, height);
        self.back.clear(StyleId::NONE);
        PaintSurface::new(&mut self.back, &mut self.registry)
    }

    /// Render the back frame against the front frame, then swap them.
    pub fn render(&mut self, options: RenderOptions) -> io::Result<RenderStats> {
        let hide = self.start_buffer()?;
        let prev = self.has_front.then_some(&self.front);
        let Some(mut stats) = encode_frame(
            &mut self.differ,
            &self.registry,
            &self.config,
            self.previous_height,
            prev,
            &self.back,
            options,
            &mut self.buf,
        )?
        else {
            return Ok(RenderStats::default());
        };

        stats.bytes_emitted = self.flush(hide)?;
        std::mem::swap(&mut self.front, &mut self.back);
        self.has_front = true;
        self.previous_height = Some(self.front.height());
        Ok(stats)
    }

    /// Render `next` against `prev`, both owned by the caller and painted
    /// through [`registry_mut`](Self::registry_mut).
    ///
    /// `prev` of `None` means nothing is on screen yet. The renderer's own
    /// frames are left untouched.
    pub fn render_frames(
        &mut self,
        prev: Option<&Frame>,
        next: &Frame,
        options: RenderOptions,
    ) -> io::Result<RenderStats> {
        let hide = self.start_buffer()?;
        let Some(mut stats) = encode_frame(
            &mut self.differ,
            &self.registry,
            &self.config,
            self.previous_height,
            prev,
            next,
            options,
            &mut self.buf,
        )?
        else {
            return Ok(RenderStats::default());
        };

        stats.bytes_emitted = self.flush(hide)?;
        self.previous_height = Some(next.height());
        Ok(stats)
    }

    /// Reset the output buffer, starting it with cursor-hide on first use.
    /// Returns whether the hide was queued.
    fn start_buffer(&mut self) -> io::Result<bool> {
        self.buf.clear();
        let hide = !self.config.show_cursor && !self.cursor_hidden;
        if hide {
            ansi::cursor_hide(&mut self.buf)?;
        }
        Ok(hide)
    }

    /// Write the pending buffer. Returns the byte count written.
    fn flush(&mut self, hide: bool) -> io::Result<usize> {
        self.sink.write_output(&self.buf)?;
        if hide {
            self.cursor_hidden = true;
        }
        Ok(self.buf.len())
    }

    /// Erase the previously rendered lines.
    ///
    /// The next render is a full redraw. Cursor visibility is unchanged.
    pub fn clear(&mut self) -> io::Result<()> {
        let count = self.previous_line_count();
        if count > 0 {
            self.buf.clear();
            ansi::erase_lines(&mut self.buf, count)?;
            self.sink.write_output(&self.buf)?;
        }
        self.previous_height = None;
        self.has_front = false;
        Ok(())
    }

    /// Adopt `frame` as what is on screen, without writing anything.
    ///
    /// Used after output was produced some other way, such as a full
    /// terminal clear followed by a static write.
    pub fn sync(&mut self, frame: &Frame) {
        self.front.clone_from(frame);
        self.has_front = true;
        self.previous_height = Some(frame.height());
    }

    /// Forget the rendered output and restore the cursor if it was hidden.
    pub fn done(&mut self) -> io::Result<()> {
        self.previous_height = None;
        self.has_front = false;
        if self.cursor_hidden {
            self.sink.write_output(ansi::CURSOR_SHOW)?;
            self.cursor_hidden = false;
        }
        Ok(())
    }
}

/// Append one render to `buf`. Returns `None` when nothing needs writing.
#[allow(clippy::too_many_arguments)]
fn encode_frame(
    differ: &mut RowDiffer,
    registry: &StyleRegistry,
    config: &RendererConfig,
    previous_height: Option<u16>,
    prev: Option<&Frame>,
    next: &Frame,
    options: RenderOptions,
    buf: &mut Vec<u8>,
) -> io::Result<Option<RenderStats>> {
    let resized = prev.is_some_and(|prev| !prev.same_size(next));
    let full = options.force_full || !config.incremental || resized;

    #[cfg(feature = "tracing")]
    let _span = {
        let mode = if full || prev.is_none() { "full" } else { "incremental" };
        tracing::info_span!("render", width = next.width(), height = next.height(), mode).entered()
    };

    #[cfg(feature = "tracing")]
    if resized {
        tracing::debug!(
            from_width = prev.map_or(0, Frame::width),
            from_height = prev.map_or(0, Frame::height),
            to_width = next.width(),
            to_height = next.height(),
            "dimensions changed, full redraw"
        );
    }

    let Some(prev) = prev.filter(|_| !full) else {
        if !config.incremental && !options.force_full && prev.is_some_and(|p| p.is_equal(next)) {
            return Ok(None);
        }
        let erase = previous_height.map_or(0, |height| height as usize + 1);
        ansi::erase_lines(buf, erase)?;
        next.write_rows(registry, buf);
        buf.push(b'\n');
        return Ok(Some(RenderStats {
            full_redraw: true,
            rows_rewritten: next.height() as usize,
            ..RenderStats::default()
        }));
    };

    let mut stats = RenderStats::default();
    ansi::cursor_up(buf, previous_height.unwrap_or(0))?;
    for row in 0..next.height() {
        let plan = differ.diff_row(prev, next, row, registry, buf)?;
        match plan.kind {
            RowPlanKind::Unchanged => stats.rows_unchanged += 1,
            RowPlanKind::Patch => stats.rows_patched += 1,
            RowPlanKind::FullRewrite => stats.rows_rewritten += 1,
        }
    }
    Ok(Some(stats))
}
