#![forbid(unsafe_code)]

//! Styled text tokenizer.
//!
//! Paint operations carry text with embedded SGR and OSC 8 sequences. This
//! module splits such text into grapheme clusters, each tagged with the list
//! of `(open, close)` style pairs active at that point, and provides the
//! ANSI-aware width and column slicing that clipping needs.
//!
//! # SGR semantics
//!
//! | Parameter | Closed by |
//! |-----------|-----------|
//! | 1, 2 | 22 |
//! | 3 | 23 |
//! | 4, 21 | 24 |
//! | 5, 6 | 25 |
//! | 7 | 27 |
//! | 8 | 28 |
//! | 9 | 29 |
//! | 53 | 55 |
//! | 30-37, 90-97, 38;5;n, 38;2;r;g;b | 39 |
//! | 40-47, 100-107, 48;5;n, 48;2;r;g;b | 49 |
//! | 58;5;n, 58;2;r;g;b | 59 |
//!
//! `0` (or an empty parameter list) drops every active pair. A close code
//! drops every active pair it closes. An open code replaces any active pair
//! that shares its close code, then appends itself.

use glyphdiff_core::grapheme_width;
use unicode_segmentation::UnicodeSegmentation;

use crate::style::StylePair;

const ESC: char = '\x1b';
const BEL: char = '\x07';

/// Close sequence for OSC 8 hyperlinks.
pub const HYPERLINK_CLOSE: &str = "\x1b]8;;\x07";

/// One grapheme cluster plus the index of its style state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledGlyph {
    /// The cluster text.
    pub text: String,
    /// Display width in columns (at least 1).
    pub width: u8,
    /// Index into [`StyledLine::styles`].
    pub style: usize,
}

/// A tokenized line.
///
/// Style states are stored once and shared by index, so a run of glyphs in
/// the same style costs a single list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledLine {
    /// Distinct consecutive style states; index 0 is always the empty state.
    pub styles: Vec<Vec<StylePair>>,
    /// Glyphs in order.
    pub glyphs: Vec<StyledGlyph>,
}

impl StyledLine {
    /// Tokenize a single line of styled text.
    ///
    /// Line breaks are not interpreted; callers split lines first.
    pub fn parse(line: &str) -> Self {
        let mut tokenized = Self {
            styles: vec![Vec::new()],
            glyphs: Vec::new(),
        };
        let mut active: Vec<StylePair> = Vec::new();
        let mut active_index = 0usize;
        let mut dirty = false;

        let mut rest = line;
        while !rest.is_empty() {
            let plain_end = rest.find(ESC).unwrap_or(rest.len());
            let (plain, tail) = rest.split_at(plain_end);

            if !plain.is_empty() {
                if dirty {
                    if tokenized.styles[active_index] != active {
                        tokenized.styles.push(active.clone());
                        active_index = tokenized.styles.len() - 1;
                    }
                    dirty = false;
                }
                for grapheme in plain.graphemes(true) {
                    let width = grapheme_width(grapheme);
                    if width == 0 {
                        // Controls and stray zero-width clusters paint nothing.
                        continue;
                    }
                    tokenized.glyphs.push(StyledGlyph {
                        text: grapheme.to_string(),
                        width: width as u8,
                        style: active_index,
                    });
                }
            }

            if tail.is_empty() {
                break;
            }
            let consumed = consume_escape(tail, &mut active);
            dirty = true;
            rest = &tail[consumed..];
        }

        tokenized
    }

    /// Total display width.
    pub fn width(&self) -> usize {
        self.glyphs.iter().map(|glyph| glyph.width as usize).sum()
    }

    /// True when the line paints nothing.
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Re-encode as styled text.
    ///
    /// Every style change closes the previous state in reverse and opens the
    /// next, and the last state is closed at the end, so the result is
    /// self-contained.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let mut current = 0usize;
        for glyph in &self.glyphs {
            if glyph.style != current {
                push_close(&mut out, &self.styles[current]);
                push_open(&mut out, &self.styles[glyph.style]);
                current = glyph.style;
            }
            out.push_str(&glyph.text);
        }
        push_close(&mut out, &self.styles[current]);
        out
    }

    /// Keep only glyphs lying in columns `[from, to)`.
    ///
    /// A wide glyph cut by `from` leaves a single space per visible column so
    /// later glyphs keep their positions; a wide glyph cut by `to` is
    /// dropped.
    pub fn slice_columns(&self, from: usize, to: usize) -> Self {
        let mut sliced = Self {
            styles: self.styles.clone(),
            glyphs: Vec::new(),
        };
        let mut column = 0usize;
        for glyph in &self.glyphs {
            let start = column;
            let end = column + glyph.width as usize;
            column = end;
            if end <= from {
                continue;
            }
            if start >= to {
                break;
            }
            if start < from {
                for _ in from..end.min(to) {
                    sliced.glyphs.push(StyledGlyph {
                        text: " ".to_string(),
                        width: 1,
                        style: glyph.style,
                    });
                }
                continue;
            }
            if end > to {
                break;
            }
            sliced.glyphs.push(glyph.clone());
        }
        sliced
    }
}

/// ANSI-aware display width of one line.
pub fn display_width(line: &str) -> usize {
    if !line.contains(ESC) {
        return glyphdiff_core::display_width(line);
    }
    StyledLine::parse(line).width()
}

/// ANSI-aware column slice of one line, re-encoded as styled text.
pub fn slice_columns(line: &str, from: usize, to: usize) -> String {
    if from == 0 && to >= display_width(line) {
        return line.to_string();
    }
    StyledLine::parse(line).slice_columns(from, to).to_text()
}

fn push_open(out: &mut String, styles: &[StylePair]) {
    for pair in styles {
        out.push_str(&pair.open);
    }
}

fn push_close(out: &mut String, styles: &[StylePair]) {
    for pair in styles.iter().rev() {
        out.push_str(&pair.close);
    }
}

/// Consume one escape sequence at the start of `text`, applying any style
/// effect to `active`. Returns the number of bytes consumed (always > 0).
fn consume_escape(text: &str, active: &mut Vec<StylePair>) -> usize {
    let bytes = text.as_bytes();
    debug_assert_eq!(bytes.first(), Some(&0x1b));
    match bytes.get(1) {
        Some(b'[') => {
            // CSI: parameters and intermediates up to a final byte 0x40..=0x7E.
            let Some(offset) = bytes[2..].iter().position(|b| (0x40..=0x7E).contains(b)) else {
                return text.len();
            };
            let final_index = 2 + offset;
            if bytes[final_index] == b'm' {
                apply_sgr(active, &text[2..final_index]);
            }
            final_index + 1
        }
        Some(b']') => {
            // OSC: terminated by BEL or ST (ESC \).
            let body_start = 2;
            let mut index = body_start;
            while index < bytes.len() {
                match bytes[index] {
                    0x07 => {
                        apply_osc(active, &text[body_start..index]);
                        return index + 1;
                    }
                    0x1b if bytes.get(index + 1) == Some(&b'\\') => {
                        apply_osc(active, &text[body_start..index]);
                        return index + 2;
                    }
                    _ => index += 1,
                }
            }
            text.len()
        }
        // Two-byte escape (or a lone trailing ESC).
        Some(_) => text[1..].chars().next().map_or(1, |c| 1 + c.len_utf8()),
        None => 1,
    }
}

/// Apply one OSC body (the text between `OSC` and its terminator).
///
/// Only OSC 8 hyperlinks carry style; an empty URL ends the active link.
pub fn apply_osc(active: &mut Vec<StylePair>, body: &str) {
    let Some(link) = body.strip_prefix("8;") else {
        return;
    };
    let url = link.split_once(';').map_or("", |(_, url)| url);
    active.retain(|pair| pair.close != HYPERLINK_CLOSE);
    if !url.is_empty() {
        active.push(StylePair::new(
            format!("{ESC}]8;{link}{BEL}"),
            HYPERLINK_CLOSE,
        ));
    }
}

/// Apply one SGR parameter string (the text between `CSI` and `m`).
pub fn apply_sgr(active: &mut Vec<StylePair>, params: &str) {
    if params.is_empty() {
        active.clear();
        return;
    }
    let codes: Vec<&str> = params.split([';', ':']).collect();
    let mut index = 0;
    while index < codes.len() {
        let code: u16 = codes[index].parse().unwrap_or(0);
        // Extended colours swallow their arguments.
        let span = match code {
            38 | 48 | 58 => match codes.get(index + 1).copied() {
                Some("5") => 3,
                Some("2") => 5,
                _ => 1,
            },
            _ => 1,
        };
        let end = (index + span).min(codes.len());
        let joined = codes[index..end].join(";");
        index = end;

        if code == 0 {
            active.clear();
            continue;
        }
        if is_close_code(code) {
            let close = sgr_sequence(code);
            active.retain(|pair| pair.close != close);
            continue;
        }
        let Some(close_code) = close_code_for(code) else {
            continue;
        };
        let close = sgr_sequence(close_code);
        active.retain(|pair| pair.close != close);
        active.push(StylePair::new(format!("{ESC}[{joined}m"), close));
    }
}

fn sgr_sequence(code: u16) -> String {
    format!("{ESC}[{code}m")
}

fn is_close_code(code: u16) -> bool {
    matches!(code, 22..=25 | 27..=29 | 39 | 49 | 55 | 59)
}

/// The SGR code that ends the effect of `code`, if `code` opens a style.
pub fn close_code_for(code: u16) -> Option<u16> {
    match code {
        1 | 2 => Some(22),
        3 => Some(23),
        4 | 21 => Some(24),
        5 | 6 => Some(25),
        7 => Some(27),
        8 => Some(28),
        9 => Some(29),
        53 => Some(55),
        30..=38 | 90..=97 => Some(39),
        40..=48 | 100..=107 => Some(49),
        58 => Some(59),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(line: &StyledLine) -> Vec<&str> {
        line.glyphs.iter().map(|g| g.text.as_str()).collect()
    }

    #[test]
    fn plain_text_has_single_empty_style() {
        let line = StyledLine::parse("abc");
        assert_eq!(texts(&line), ["a", "b", "c"]);
        assert!(line.glyphs.iter().all(|g| g.style == 0));
        assert_eq!(line.styles.len(), 1);
    }

    #[test]
    fn sgr_opens_and_closes() {
        let line = StyledLine::parse("\x1b[31mab\x1b[39mc");
        assert_eq!(texts(&line), ["a", "b", "c"]);
        let red = &line.styles[line.glyphs[0].style];
        assert_eq!(red, &[StylePair::new("\x1b[31m", "\x1b[39m")]);
        assert!(line.styles[line.glyphs[2].style].is_empty());
    }

    #[test]
    fn nested_styles_keep_order() {
        let line = StyledLine::parse("\x1b[1m\x1b[31mx\x1b[39m\x1b[22m");
        let styles = &line.styles[line.glyphs[0].style];
        assert_eq!(styles.len(), 2);
        assert_eq!(styles[0].open, "\x1b[1m");
        assert_eq!(styles[1].open, "\x1b[31m");
    }

    #[test]
    fn reset_clears_everything() {
        let line = StyledLine::parse("\x1b[1;4mx\x1b[0my");
        assert_eq!(line.styles[line.glyphs[0].style].len(), 2);
        assert!(line.styles[line.glyphs[1].style].is_empty());
    }

    #[test]
    fn new_colour_replaces_old() {
        let mut active = Vec::new();
        apply_sgr(&mut active, "31");
        apply_sgr(&mut active, "32");
        assert_eq!(active, [StylePair::new("\x1b[32m", "\x1b[39m")]);
    }

    #[test]
    fn extended_colours_are_one_pair() {
        let mut active = Vec::new();
        apply_sgr(&mut active, "38;2;10;20;30;1");
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].open, "\x1b[38;2;10;20;30m");
        assert_eq!(active[0].close, "\x1b[39m");
        assert_eq!(active[1].open, "\x1b[1m");
    }

    #[test]
    fn bold_and_dim_share_close() {
        let mut active = Vec::new();
        apply_sgr(&mut active, "1");
        apply_sgr(&mut active, "2");
        assert_eq!(active.len(), 1);
        apply_sgr(&mut active, "22");
        assert!(active.is_empty());
    }

    #[test]
    fn hyperlink_is_a_style_pair() {
        let line = StyledLine::parse("\x1b]8;;https://x.y\x07go\x1b]8;;\x07!");
        let link = &line.styles[line.glyphs[0].style];
        assert_eq!(link[0].open, "\x1b]8;;https://x.y\x07");
        assert_eq!(link[0].close, HYPERLINK_CLOSE);
        assert!(line.styles[line.glyphs[2].style].is_empty());
    }

    #[test]
    fn unknown_escapes_are_dropped() {
        let line = StyledLine::parse("a\x1b[2Jb\x1b7c");
        assert_eq!(texts(&line), ["a", "b", "c"]);
    }

    #[test]
    fn wide_glyph_width() {
        let line = StyledLine::parse("ab中cd");
        assert_eq!(line.glyphs[2].width, 2);
        assert_eq!(line.width(), 6);
    }

    #[test]
    fn display_width_ignores_escapes() {
        assert_eq!(display_width("\x1b[31mred\x1b[39m"), 3);
        assert_eq!(display_width("中文"), 4);
    }

    #[test]
    fn slice_keeps_styles() {
        let sliced = slice_columns("\x1b[31mhello\x1b[39m", 1, 3);
        assert_eq!(sliced, "\x1b[31mel\x1b[39m");
    }

    #[test]
    fn slice_pads_cut_wide_glyph_on_left() {
        let line = StyledLine::parse("中ab").slice_columns(1, 4);
        assert_eq!(texts(&line), [" ", "a", "b"]);
    }

    #[test]
    fn slice_drops_cut_wide_glyph_on_right() {
        let line = StyledLine::parse("ab中").slice_columns(0, 3);
        assert_eq!(texts(&line), ["a", "b"]);
    }

    #[test]
    fn slice_full_range_is_identity() {
        assert_eq!(slice_columns("\x1b[1mab", 0, 10), "\x1b[1mab");
    }

    #[test]
    fn to_text_roundtrips_glyphs() {
        let original = StyledLine::parse("a\x1b[4mbc\x1b[24md");
        let again = StyledLine::parse(&original.to_text());
        assert_eq!(texts(&original), texts(&again));
        for (a, b) in original.glyphs.iter().zip(&again.glyphs) {
            assert_eq!(original.styles[a.style], again.styles[b.style]);
        }
    }
}
