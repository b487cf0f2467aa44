#![forbid(unsafe_code)]

//! Terminal model for renderer validation.
//!
//! A minimal terminal emulator that understands the sequences the renderers
//! emit, so tests can feed emitted bytes through it and compare the screen
//! with the frame that was rendered, without real terminal I/O.
//!
//! # Scope
//!
//! This is NOT a full VT emulator. It supports only:
//! - UTF-8 text, with wide characters occupying two cells and zero-width
//!   characters joining the previous cell
//! - Deferred autowrap at the right margin
//! - CR, and LF as CR LF (a tty with output post-processing), scrolling at
//!   the bottom
//! - Cursor moves: CUU, CUF, CHA, CNL
//! - Erase: EL, ED
//! - SGR and OSC 8, tracked as `(open, close)` style pairs with the same
//!   semantics as [`crate::styled_text`]
//! - DECTCEM cursor visibility
//!
//! # Usage
//!
//! ```
//! use glyphdiff_render::terminal_model::TerminalModel;
//!
//! let mut model = TerminalModel::new(10, 3);
//! model.process(b"\x1b[1mHi\x1b[22m\n!");
//! assert_eq!(model.row_text(0).as_deref(), Some("Hi"));
//! assert_eq!(model.cursor(), (1, 1));
//! assert_eq!(model.cell(0, 0).unwrap().style.len(), 1);
//! ```

use unicode_width::UnicodeWidthChar;

use crate::frame::Frame;
use crate::style::{StylePair, StyleRegistry};
use crate::styled_text;

/// A single cell in the terminal model grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCell {
    /// Text content; a space when blank, empty for a continuation cell.
    pub text: String,
    /// Style pairs active when the cell was written.
    pub style: Vec<StylePair>,
    /// Second half of a wide character.
    pub continuation: bool,
}

impl Default for ModelCell {
    fn default() -> Self {
        Self {
            text: " ".to_string(),
            style: Vec::new(),
            continuation: false,
        }
    }
}

/// Parser state for escape sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Ground,
    Escape,
    Csi,
    Osc,
    OscEscape,
}

/// A minimal terminal model for testing renderer output.
#[derive(Debug)]
pub struct TerminalModel {
    width: usize,
    height: usize,
    cells: Vec<ModelCell>,
    cursor_x: usize,
    cursor_y: usize,
    wrap_pending: bool,
    cursor_visible: bool,
    active: Vec<StylePair>,
    parse_state: ParseState,
    /// Raw CSI parameter and intermediate bytes.
    csi: String,
    /// OSC body accumulator.
    osc: Vec<u8>,
    /// Partial UTF-8 sequence.
    utf8: Vec<u8>,
    scrolled: usize,
}

impl TerminalModel {
    /// Create a blank model. Both dimensions are clamped to at least 1.
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            cells: vec![ModelCell::default(); width * height],
            cursor_x: 0,
            cursor_y: 0,
            wrap_pending: false,
            cursor_visible: true,
            active: Vec::new(),
            parse_state: ParseState::Ground,
            csi: String::new(),
            osc: Vec::new(),
            utf8: Vec::new(),
            scrolled: 0,
        }
    }

    /// Terminal width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Terminal height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Cursor position as `(x, y)`.
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_x, self.cursor_y)
    }

    /// DECTCEM state.
    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    /// Style pairs currently active.
    pub fn active_style(&self) -> &[StylePair] {
        &self.active
    }

    /// Lines scrolled off the top so far.
    pub fn scrolled(&self) -> usize {
        self.scrolled
    }

    /// Get the cell at `(x, y)`.
    pub fn cell(&self, x: usize, y: usize) -> Option<&ModelCell> {
        (x < self.width && y < self.height).then(|| &self.cells[y * self.width + x])
    }

    /// Get a row of cells.
    pub fn row(&self, y: usize) -> Option<&[ModelCell]> {
        (y < self.height).then(|| {
            let start = y * self.width;
            &self.cells[start..start + self.width]
        })
    }

    /// Plain text of a row, trimmed of trailing spaces.
    pub fn row_text(&self, y: usize) -> Option<String> {
        self.row(y).map(|cells| {
            let text: String = cells.iter().map(|cell| cell.text.as_str()).collect();
            text.trim_end().to_string()
        })
    }

    /// Plain text of the whole screen, rows joined by `\n`, trailing blank
    /// rows dropped.
    pub fn screen_text(&self) -> String {
        let mut rows: Vec<String> = (0..self.height)
            .filter_map(|y| self.row_text(y))
            .collect();
        while rows.last().is_some_and(String::is_empty) {
            rows.pop();
        }
        rows.join("\n")
    }

    /// Reset to a blank screen with the cursor at the origin.
    pub fn reset(&mut self) {
        self.cells.fill(ModelCell::default());
        self.cursor_x = 0;
        self.cursor_y = 0;
        self.wrap_pending = false;
        self.cursor_visible = true;
        self.active.clear();
        self.parse_state = ParseState::Ground;
        self.csi.clear();
        self.osc.clear();
        self.utf8.clear();
        self.scrolled = 0;
    }

    /// Process a byte sequence.
    pub fn process(&mut self, bytes: &[u8]) {
        for &b in bytes {
            match self.parse_state {
                ParseState::Ground => self.ground_state(b),
                ParseState::Escape => self.escape_state(b),
                ParseState::Csi => self.csi_state(b),
                ParseState::Osc => self.osc_state(b),
                ParseState::OscEscape => self.osc_escape_state(b),
            }
        }
    }

    /// Compare rows `top..top + frame.height()` with what `frame` would
    /// look like once rendered. Returns a description of the first
    /// mismatch.
    pub fn diff_frame(&self, frame: &Frame, registry: &StyleRegistry, top: usize) -> Option<String> {
        for row in 0..frame.height() {
            let y = top + row as usize;
            let edge = frame.row_right_edge(row);
            for col in 0..frame.width() {
                let Some(actual) = self.cell(col as usize, y) else {
                    return Some(format!("cell ({col}, {y}) outside the model"));
                };
                let Some(expected) = frame.cell(col, row) else {
                    continue;
                };
                if col < edge && expected.is_continuation() {
                    if !actual.continuation {
                        return Some(format!(
                            "({col}, {y}): expected continuation, found {:?}",
                            actual.text
                        ));
                    }
                    continue;
                }
                let (text, style): (String, &[StylePair]) = if col < edge {
                    (expected.glyph.to_string(), registry.get_styles(expected.style))
                } else {
                    (" ".to_string(), &[])
                };
                if actual.continuation || actual.text != text || actual.style != style {
                    return Some(format!(
                        "({col}, {y}): expected {text:?} {style:?}, found {:?} {:?}{}",
                        actual.text,
                        actual.style,
                        if actual.continuation { " (continuation)" } else { "" }
                    ));
                }
            }
        }
        None
    }

    fn ground_state(&mut self, b: u8) {
        if !self.utf8.is_empty() || b >= 0x80 {
            self.utf8_byte(b);
            return;
        }
        match b {
            0x1b => self.parse_state = ParseState::Escape,
            b'\r' => {
                self.cursor_x = 0;
                self.wrap_pending = false;
            }
            b'\n' => {
                self.cursor_x = 0;
                self.line_feed();
            }
            0x08 => {
                self.cursor_x = self.cursor_x.saturating_sub(1);
                self.wrap_pending = false;
            }
            0x00..=0x1f | 0x7f => {}
            _ => self.put_char(b as char),
        }
    }

    fn utf8_byte(&mut self, b: u8) {
        if self.utf8.is_empty() && !(0xc2..=0xf4).contains(&b) {
            self.put_char(char::REPLACEMENT_CHARACTER);
            return;
        }
        if !self.utf8.is_empty() && (b & 0xc0) != 0x80 {
            // Truncated sequence: emit a replacement and reprocess this byte.
            self.utf8.clear();
            self.put_char(char::REPLACEMENT_CHARACTER);
            self.ground_state(b);
            return;
        }
        self.utf8.push(b);
        let expected = match self.utf8[0] {
            0xc2..=0xdf => 2,
            0xe0..=0xef => 3,
            _ => 4,
        };
        if self.utf8.len() < expected {
            return;
        }
        let ch = std::str::from_utf8(&self.utf8)
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        self.utf8.clear();
        self.put_char(ch);
    }

    fn escape_state(&mut self, b: u8) {
        match b {
            b'[' => {
                self.csi.clear();
                self.parse_state = ParseState::Csi;
            }
            b']' => {
                self.osc.clear();
                self.parse_state = ParseState::Osc;
            }
            0x1b => {}
            _ => self.parse_state = ParseState::Ground,
        }
    }

    fn csi_state(&mut self, b: u8) {
        match b {
            0x30..=0x3f | 0x20..=0x2f => self.csi.push(b as char),
            0x40..=0x7e => {
                self.parse_state = ParseState::Ground;
                self.execute_csi(b);
            }
            _ => self.parse_state = ParseState::Ground,
        }
    }

    fn osc_state(&mut self, b: u8) {
        match b {
            0x07 => {
                self.parse_state = ParseState::Ground;
                self.execute_osc();
            }
            0x1b => self.parse_state = ParseState::OscEscape,
            _ => self.osc.push(b),
        }
    }

    fn osc_escape_state(&mut self, b: u8) {
        if b == b'\\' {
            self.parse_state = ParseState::Ground;
            self.execute_osc();
        } else {
            self.osc.push(0x1b);
            self.osc.push(b);
            self.parse_state = ParseState::Osc;
        }
    }

    fn execute_osc(&mut self) {
        let body = String::from_utf8_lossy(&self.osc).into_owned();
        styled_text::apply_osc(&mut self.active, &body);
    }

    /// First numeric CSI parameter, with 0 or absent mapped to `default`.
    fn param(&self, default: usize) -> usize {
        let first = self.csi.split(';').next().unwrap_or("");
        match first.trim_start_matches('?').parse::<usize>() {
            Ok(0) | Err(_) => default,
            Ok(n) => n,
        }
    }

    /// First CSI parameter where 0 is meaningful (erase modes).
    fn mode(&self) -> usize {
        self.csi.split(';').next().and_then(|p| p.parse().ok()).unwrap_or(0)
    }

    fn execute_csi(&mut self, final_byte: u8) {
        if final_byte != b'm' {
            self.wrap_pending = false;
        }
        match final_byte {
            b'A' => self.cursor_y = self.cursor_y.saturating_sub(self.param(1)),
            b'C' => {
                self.cursor_x = self.cursor_x.saturating_add(self.param(1)).min(self.width - 1);
            }
            b'G' => self.cursor_x = (self.param(1) - 1).min(self.width - 1),
            b'E' => {
                self.cursor_x = 0;
                self.cursor_y = self.cursor_y.saturating_add(self.param(1)).min(self.height - 1);
            }
            b'K' => {
                let y = self.cursor_y;
                match self.mode() {
                    0 => self.erase(y, self.cursor_x, self.width),
                    1 => self.erase(y, 0, self.cursor_x + 1),
                    _ => self.erase(y, 0, self.width),
                }
            }
            b'J' => match self.mode() {
                0 => {
                    self.erase(self.cursor_y, self.cursor_x, self.width);
                    for y in self.cursor_y + 1..self.height {
                        self.erase(y, 0, self.width);
                    }
                }
                1 => {
                    for y in 0..self.cursor_y {
                        self.erase(y, 0, self.width);
                    }
                    self.erase(self.cursor_y, 0, self.cursor_x + 1);
                }
                _ => {
                    for y in 0..self.height {
                        self.erase(y, 0, self.width);
                    }
                }
            },
            b'm' if !self.csi.starts_with('?') => {
                let params = std::mem::take(&mut self.csi);
                styled_text::apply_sgr(&mut self.active, &params);
            }
            b'h' if self.csi == "?25" => self.cursor_visible = true,
            b'l' if self.csi == "?25" => self.cursor_visible = false,
            _ => {}
        }
    }

    fn erase(&mut self, y: usize, from: usize, to: usize) {
        let start = y * self.width;
        for cell in &mut self.cells[start + from.min(self.width)..start + to.min(self.width)] {
            *cell = ModelCell::default();
        }
    }

    fn line_feed(&mut self) {
        self.wrap_pending = false;
        if self.cursor_y + 1 < self.height {
            self.cursor_y += 1;
        } else {
            self.cells.drain(..self.width);
            self.cells
                .extend(std::iter::repeat_with(ModelCell::default).take(self.width));
            self.scrolled += 1;
        }
    }

    /// Blank the parts of wide characters straddling `[lo, hi)` on row `y`.
    fn release(&mut self, y: usize, lo: usize, hi: usize) {
        let base = y * self.width;
        if self.cells[base + lo].continuation {
            let mut lead = lo;
            while lead > 0 && self.cells[base + lead].continuation {
                lead -= 1;
            }
            for x in lead..lo {
                let style = std::mem::take(&mut self.cells[base + x].style);
                self.cells[base + x] = ModelCell {
                    style,
                    ..ModelCell::default()
                };
            }
        }
        let mut x = hi;
        while x < self.width && self.cells[base + x].continuation {
            self.cells[base + x] = ModelCell::default();
            x += 1;
        }
    }

    fn put_char(&mut self, ch: char) {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width == 0 {
            // Joins the previously written cell.
            let x = if self.wrap_pending {
                self.cursor_x
            } else {
                self.cursor_x.saturating_sub(1)
            };
            let base = self.cursor_y * self.width;
            let mut lead = x;
            while lead > 0 && self.cells[base + lead].continuation {
                lead -= 1;
            }
            self.cells[base + lead].text.push(ch);
            return;
        }

        if self.wrap_pending || self.cursor_x + width > self.width {
            self.cursor_x = 0;
            self.line_feed();
        }
        let width = width.min(self.width);
        let (x, y) = (self.cursor_x, self.cursor_y);
        self.release(y, x, x + width);

        let base = y * self.width;
        self.cells[base + x] = ModelCell {
            text: ch.to_string(),
            style: self.active.clone(),
            continuation: false,
        };
        for k in 1..width {
            self.cells[base + x + k] = ModelCell {
                text: String::new(),
                style: self.active.clone(),
                continuation: true,
            };
        }

        if x + width >= self.width {
            self.cursor_x = self.width - 1;
            self.wrap_pending = true;
        } else {
            self.cursor_x = x + width;
        }
    }
}
