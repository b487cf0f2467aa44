#![forbid(unsafe_code)]

//! Display-width measurement for grapheme clusters.
//!
//! Widths follow the terminal convention: printable ASCII is one column,
//! East Asian wide and emoji presentation clusters are two, and control
//! characters occupy nothing.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

#[inline]
fn ascii_display_width(text: &str) -> usize {
    text.bytes().filter(|b| (0x20..=0x7E).contains(b)).count()
}

#[inline]
fn is_emoji_presentation(grapheme: &str) -> bool {
    grapheme.chars().any(|c| c as u32 == 0xFE0F)
}

/// Width of a single grapheme cluster in terminal columns.
///
/// Returns 0 for clusters made only of control or zero-width code points.
#[inline]
pub fn grapheme_width(grapheme: &str) -> usize {
    if grapheme.is_ascii() {
        return ascii_display_width(grapheme);
    }
    if grapheme.chars().all(char::is_control) {
        return 0;
    }
    let width = UnicodeWidthStr::width(grapheme);
    if width == 1 && is_emoji_presentation(grapheme) {
        return 2;
    }
    width.min(2)
}

/// Width of plain (escape-free) text in terminal columns.
#[inline]
pub fn display_width(text: &str) -> usize {
    if text.is_ascii() {
        return ascii_display_width(text);
    }
    text.graphemes(true).map(grapheme_width).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_one_column_each() {
        assert_eq!(display_width("hello"), 5);
        assert_eq!(grapheme_width("a"), 1);
    }

    #[test]
    fn controls_are_zero_width() {
        assert_eq!(grapheme_width("\t"), 0);
        assert_eq!(display_width("a\u{7}b"), 2);
    }

    #[test]
    fn cjk_is_two_columns() {
        assert_eq!(grapheme_width("中"), 2);
        assert_eq!(display_width("ab中cd"), 6);
    }

    #[test]
    fn combining_mark_joins_cluster() {
        assert_eq!(display_width("e\u{301}"), 1);
    }

    #[test]
    fn emoji_is_two_columns() {
        assert_eq!(grapheme_width("😀"), 2);
        assert_eq!(grapheme_width("\u{2764}\u{FE0F}"), 2);
    }
}
