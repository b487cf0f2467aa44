#![forbid(unsafe_code)]

//! Line-level differ for pre-rendered text.
//!
//! [`LineDiffer`] is the fallback path when the caller already has a
//! rendered string instead of a [`Frame`](crate::frame::Frame). It compares
//! whole lines: unchanged lines cost a single move to the next line and
//! changed lines are rewritten in full, followed by an erase to end of line.
//!
//! The cursor convention matches [`FrameRenderer`](crate::renderer::FrameRenderer):
//! after every write it rests at column 0 of the line below the output.

use std::io;

use glyphdiff_core::OutputSink;

use crate::ansi;

/// Renders successive strings, rewriting only the lines that changed.
#[derive(Debug)]
pub struct LineDiffer<S: OutputSink> {
    sink: S,
    show_cursor: bool,
    cursor_hidden: bool,
    previous_output: String,
    previous_lines: Vec<String>,
    buf: Vec<u8>,
}

impl<S: OutputSink> LineDiffer<S> {
    /// Create a differ writing to `sink`.
    pub fn new(sink: S, show_cursor: bool) -> Self {
        Self {
            sink,
            show_cursor,
            cursor_hidden: false,
            previous_output: String::new(),
            previous_lines: Vec::new(),
            buf: Vec::new(),
        }
    }

    /// The output sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable output sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the differ, returning its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Lines tracked from the previous output, counting the trailing empty
    /// line after the final newline.
    pub fn previous_line_count(&self) -> usize {
        self.previous_lines.len()
    }

    /// Render `text`. Returns the bytes written, 0 if `text` is unchanged.
    pub fn render(&mut self, text: &str) -> io::Result<usize> {
        let mut output = String::with_capacity(text.len() + 1);
        output.push_str(text);
        output.push('\n');
        if output == self.previous_output {
            return Ok(0);
        }

        self.buf.clear();
        let hide = !self.show_cursor && !self.cursor_hidden;
        if hide {
            ansi::cursor_hide(&mut self.buf)?;
        }

        let next_lines: Vec<String> = output.split('\n').map(str::to_owned).collect();
        let previous_count = self.previous_lines.len();
        let next_count = next_lines.len();
        let visible = next_count - 1;

        if output == "\n" || self.previous_output.is_empty() {
            ansi::erase_lines(&mut self.buf, previous_count)?;
            self.buf.extend_from_slice(output.as_bytes());
        } else {
            if next_count < previous_count {
                ansi::erase_lines(&mut self.buf, previous_count - next_count + 1)?;
                ansi::cursor_up(&mut self.buf, clamp_u16(visible))?;
            } else {
                ansi::cursor_up(&mut self.buf, clamp_u16(previous_count - 1))?;
            }
            for (i, line) in next_lines.iter().take(visible).enumerate() {
                if self.previous_lines.get(i) == Some(line) {
                    ansi::next_line(&mut self.buf)?;
                    continue;
                }
                self.buf.extend_from_slice(line.as_bytes());
                ansi::erase_to_end(&mut self.buf)?;
                self.buf.push(b'\n');
            }
        }

        self.sink.write_output(&self.buf)?;
        if hide {
            self.cursor_hidden = true;
        }
        self.previous_output = output;
        self.previous_lines = next_lines;
        Ok(self.buf.len())
    }

    /// Erase the previous output and forget it.
    pub fn clear(&mut self) -> io::Result<()> {
        let count = self.previous_lines.len();
        if count > 0 {
            self.buf.clear();
            ansi::erase_lines(&mut self.buf, count)?;
            self.sink.write_output(&self.buf)?;
        }
        self.previous_output.clear();
        self.previous_lines.clear();
        Ok(())
    }

    /// Adopt `text` as what is on screen, without writing anything.
    pub fn sync(&mut self, text: &str) {
        let mut output = String::with_capacity(text.len() + 1);
        output.push_str(text);
        output.push('\n');
        self.previous_lines = output.split('\n').map(str::to_owned).collect();
        self.previous_output = output;
    }

    /// Forget the previous output and restore the cursor if it was hidden.
    pub fn done(&mut self) -> io::Result<()> {
        self.previous_output.clear();
        self.previous_lines.clear();
        if self.cursor_hidden {
            self.sink.write_output(ansi::CURSOR_SHOW)?;
            self.cursor_hidden = false;
        }
        Ok(())
    }
}

fn clamp_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal_model::TerminalModel;

    fn differ() -> LineDiffer<Vec<u8>> {
        LineDiffer::new(Vec::new(), true)
    }

    fn take(differ: &mut LineDiffer<Vec<u8>>) -> String {
        String::from_utf8(std::mem::take(differ.sink_mut())).unwrap()
    }

    #[test]
    fn first_render_writes_text() {
        let mut d = differ();
        assert_eq!(d.render("a\nb").unwrap(), 4);
        assert_eq!(take(&mut d), "a\nb\n");
        assert_eq!(d.previous_line_count(), 3);
    }

    #[test]
    fn identical_text_is_skipped() {
        let mut d = differ();
        d.render("same").unwrap();
        take(&mut d);
        assert_eq!(d.render("same").unwrap(), 0);
        assert!(d.sink().is_empty());
    }

    #[test]
    fn only_changed_lines_are_rewritten() {
        let mut d = differ();
        d.render("a\nb\nc").unwrap();
        take(&mut d);
        d.render("a\nB\nc").unwrap();
        assert_eq!(take(&mut d), "\x1b[3A\x1b[EB\x1b[K\n\x1b[E");
    }

    #[test]
    fn shrinking_erases_surplus_lines() {
        let mut d = differ();
        d.render("a\nb\nc").unwrap();
        take(&mut d);
        d.render("a").unwrap();
        assert_eq!(
            take(&mut d),
            "\x1b[2K\x1b[1A\x1b[2K\x1b[1A\x1b[2K\x1b[G\x1b[1A\x1b[E"
        );
    }

    #[test]
    fn empty_text_replaces_everything() {
        let mut d = differ();
        d.render("a\nb").unwrap();
        take(&mut d);
        d.render("").unwrap();
        assert_eq!(take(&mut d), "\x1b[2K\x1b[1A\x1b[2K\x1b[1A\x1b[2K\x1b[G\n");
    }

    #[test]
    fn hides_cursor_until_done() {
        let mut d = LineDiffer::new(Vec::new(), false);
        d.render("x").unwrap();
        assert_eq!(take(&mut d), "\x1b[?25lx\n");
        d.render("y").unwrap();
        assert!(!take(&mut d).contains("\x1b[?25l"));
        d.done().unwrap();
        assert_eq!(take(&mut d), "\x1b[?25h");
        assert_eq!(d.previous_line_count(), 0);
    }

    #[test]
    fn clear_and_sync() {
        let mut d = differ();
        d.render("a").unwrap();
        take(&mut d);
        d.clear().unwrap();
        assert_eq!(take(&mut d), "\x1b[2K\x1b[1A\x1b[2K\x1b[G");

        d.sync("a\nb");
        assert!(d.sink().is_empty());
        d.render("a\nc").unwrap();
        assert_eq!(take(&mut d), "\x1b[2A\x1b[Ec\x1b[K\n");
    }

    #[test]
    fn replay_matches_text() {
        let mut d = differ();
        let mut model = TerminalModel::new(10, 6);
        for text in ["one\ntwo\nthree", "one\n2\nthree\nfour", "x", "x\ny"] {
            d.render(text).unwrap();
            model.process(take(&mut d).as_bytes());
            let lines: Vec<&str> = text.split('\n').collect();
            for (y, line) in lines.iter().enumerate() {
                assert_eq!(model.row_text(y).unwrap().trim_end(), *line, "{text:?}");
            }
            for y in lines.len()..model.height() {
                assert_eq!(model.row_text(y).unwrap().trim_end(), "", "{text:?}");
            }
            assert_eq!(model.cursor(), (0, lines.len()));
        }
    }
}
