//! Stream sink: rendered lines written to any byte stream

use std::io::{self, BufWriter, Write};

use termcolor::{Ansi, Color, ColorSpec, WriteColor};

use super::flush::{FlushPolicy, FlushTracker};
use super::format::render_line;
use super::traits::{Sink, SinkError, SinkResult};
use crate::types::{Record, Severity};

/// Writes one rendered line per record to a `Write` implementation
///
/// Output goes through an internal `BufWriter`; the [`FlushPolicy`] decides
/// when it reaches the underlying stream.
///
/// # Example
///
/// ```
/// use polylog_core::sinks::{FlushPolicy, Sink, StreamSink};
/// use polylog_core::types::{Attributes, Record, Severity};
///
/// let mut sink = StreamSink::new("buffer", Vec::new(), FlushPolicy::Immediate);
/// sink.write(&Record::new(Severity::Info, "app", "hello", Attributes::new())).unwrap();
/// let text = String::from_utf8(sink.get_ref().unwrap().clone()).unwrap();
/// assert!(text.ends_with("[INFO] [app] hello\n"));
/// ```
#[derive(Debug)]
pub struct StreamSink<W: Write + Send> {
    name: String,
    writer: Option<BufWriter<W>>,
    tracker: FlushTracker,
    colors: bool,
}

impl<W: Write + Send> StreamSink<W> {
    pub fn new(name: impl Into<String>, writer: W, policy: FlushPolicy) -> Self {
        Self {
            name: name.into(),
            writer: Some(BufWriter::new(writer)),
            tracker: FlushTracker::new(policy),
            colors: false,
        }
    }

    /// Color each line by severity with ANSI escapes
    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    /// The underlying stream, or `None` once closed
    pub fn get_ref(&self) -> Option<&W> {
        self.writer.as_ref().map(|w| w.get_ref())
    }

    /// Records written since the last flush
    pub fn pending(&self) -> usize {
        self.tracker.pending()
    }
}

impl StreamSink<io::Stdout> {
    /// Standard output
    pub fn stdout(policy: FlushPolicy) -> Self {
        Self::new("stdout", io::stdout(), policy)
    }
}

impl StreamSink<io::Stderr> {
    /// Standard error
    pub fn stderr(policy: FlushPolicy) -> Self {
        Self::new("stderr", io::stderr(), policy)
    }
}

impl<W: Write + Send> Sink for StreamSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, record: &Record<'_>) -> SinkResult<()> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        let line = render_line(record);
        if self.colors {
            let mut out = Ansi::new(&mut *writer);
            out.set_color(ColorSpec::new().set_fg(Some(severity_color(record.severity()))))?;
            out.write_all(line.as_bytes())?;
            out.reset()?;
        } else {
            writer.write_all(line.as_bytes())?;
        }
        writer.write_all(b"\n")?;
        if self.tracker.record_write() {
            writer.flush()?;
            self.tracker.flushed();
        }
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
            self.tracker.flushed();
        }
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        let result = self.flush();
        self.writer = None;
        result
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Trace => Color::White,
        Severity::Debug => Color::Blue,
        Severity::Info => Color::Green,
        Severity::Warn => Color::Yellow,
        Severity::Error => Color::Magenta,
        Severity::Fatal => Color::Red,
    }
}
