#![forbid(unsafe_code)]

//! ANSI escape sequence generation helpers.
//!
//! Pure byte generation for the handful of control sequences the renderers
//! emit, plus the matching length functions used by the cost model. Every
//! `*_len` function returns exactly the number of bytes its writer emits.
//!
//! # Sequence Reference
//!
//! | Sequence | Bytes | Description |
//! |----------|-------|-------------|
//! | CHA | `ESC [ col G` | Cursor to column (1-indexed) |
//! | CUF | `ESC [ n C` | Cursor forward |
//! | CUU | `ESC [ n A` | Cursor up |
//! | CNL | `ESC [ E` | Cursor to start of next line |
//! | EL 0 | `ESC [ K` | Erase to end of line |
//! | EL 2 | `ESC [ 2 K` | Erase whole line |
//! | DECTCEM | `ESC [ ? 25 l/h` | Hide / show cursor |

use std::io::{self, Write};

/// Cursor to the first column of the next line: `CSI E`.
pub const NEXT_LINE: &[u8] = b"\x1b[E";

/// Erase from the cursor to the end of the line: `CSI K`.
pub const ERASE_TO_END: &[u8] = b"\x1b[K";

/// Erase the entire line: `CSI 2 K`.
pub const ERASE_LINE: &[u8] = b"\x1b[2K";

/// Cursor up one line: `CSI 1 A`.
pub const CURSOR_UP_ONE: &[u8] = b"\x1b[1A";

/// Cursor to the first column: `CSI G`.
pub const CURSOR_LEFT: &[u8] = b"\x1b[G";

/// Hide cursor: `CSI ? 25 l`
pub const CURSOR_HIDE: &[u8] = b"\x1b[?25l";

/// Show cursor: `CSI ? 25 h`
pub const CURSOR_SHOW: &[u8] = b"\x1b[?25h";

/// Number of decimal digits in `n`.
#[inline]
pub const fn digits(mut n: usize) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

/// CHA: `CSI col G`, with a 0-indexed `col`.
pub fn cursor_to_column<W: Write>(w: &mut W, col: u16) -> io::Result<()> {
    write!(w, "\x1b[{}G", col as usize + 1)
}

/// Byte length of [`cursor_to_column`].
#[inline]
pub const fn cursor_to_column_len(col: u16) -> usize {
    3 + digits(col as usize + 1)
}

/// CUF: `CSI n C`. Writes nothing for `n == 0`.
pub fn cursor_forward<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    write!(w, "\x1b[{n}C")
}

/// Byte length of [`cursor_forward`].
#[inline]
pub const fn cursor_forward_len(n: u16) -> usize {
    if n == 0 { 0 } else { 3 + digits(n as usize) }
}

/// CUU: `CSI n A`. Writes nothing for `n == 0`.
pub fn cursor_up<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    write!(w, "\x1b[{n}A")
}

/// CNL: move to the first column of the next line.
#[inline]
pub fn next_line<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(NEXT_LINE)
}

/// EL 0: erase from the cursor to the end of the line.
#[inline]
pub fn erase_to_end<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(ERASE_TO_END)
}

/// Erase `count` lines upwards, starting at the cursor line, and leave the
/// cursor in the first column of the topmost erased line.
///
/// Each line gets `CSI 2 K`; consecutive erases are joined by `CSI 1 A`.
/// Writes nothing for `count == 0`.
pub fn erase_lines<W: Write>(w: &mut W, count: usize) -> io::Result<()> {
    if count == 0 {
        return Ok(());
    }
    for i in 0..count {
        w.write_all(ERASE_LINE)?;
        if i + 1 < count {
            w.write_all(CURSOR_UP_ONE)?;
        }
    }
    w.write_all(CURSOR_LEFT)
}

/// Write hide cursor.
#[inline]
pub fn cursor_hide<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(CURSOR_HIDE)
}

/// Write show cursor.
#[inline]
pub fn cursor_show<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(CURSOR_SHOW)
}
