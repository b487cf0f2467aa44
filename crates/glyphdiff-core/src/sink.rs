#![forbid(unsafe_code)]

//! Output sinks.
//!
//! A sink receives exactly one write per rendered frame. Renderers hold no
//! queue of their own, so a failed write is returned to the caller as-is.

use std::io::{self, Write};

/// Destination for rendered control-sequence bytes.
pub trait OutputSink {
    /// Write a complete chunk of output.
    fn write_output(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Terminal size as `(columns, rows)`, when the sink knows it.
    fn size(&self) -> Option<(u16, u16)> {
        None
    }
}

impl OutputSink for Vec<u8> {
    fn write_output(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn write_output(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_output(bytes)
    }

    fn size(&self) -> Option<(u16, u16)> {
        (**self).size()
    }
}

/// Adapter turning any [`Write`] into an [`OutputSink`].
///
/// Each chunk is written in full and flushed, with an optional fixed size
/// reported as metadata.
#[derive(Debug)]
pub struct WriterSink<W> {
    inner: W,
    size: Option<(u16, u16)>,
}

impl<W: Write> WriterSink<W> {
    /// Wrap a writer with no size metadata.
    pub fn new(inner: W) -> Self {
        Self { inner, size: None }
    }

    /// Report a fixed `(columns, rows)` size.
    #[must_use]
    pub fn with_size(mut self, columns: u16, rows: u16) -> Self {
        self.size = Some((columns, rows));
        self
    }

    /// Get a reference to the underlying writer.
    #[inline]
    pub fn inner(&self) -> &W {
        &self.inner
    }

    /// Consume the sink and return the inner writer.
    #[inline]
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> OutputSink for WriterSink<W> {
    fn write_output(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.inner.flush()
    }

    fn size(&self) -> Option<(u16, u16)> {
        self.size
    }
}

/// Sink writing to the process's stdout.
///
/// Size metadata is queried from the terminal on every call, so it tracks
/// resizes without a signal handler.
#[derive(Debug)]
pub struct TerminalSink {
    stdout: io::Stdout,
}

impl TerminalSink {
    /// Create a sink over stdout.
    pub fn stdout() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::stdout()
    }
}

impl OutputSink for TerminalSink {
    fn write_output(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut lock = self.stdout.lock();
        lock.write_all(bytes)?;
        lock.flush()
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn size(&self) -> Option<(u16, u16)> {
        match crossterm::terminal::size() {
            Ok(size) => Some(size),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %_err, "terminal size unavailable");
                None
            }
        }
    }
}
