//! Console sink implementation

use std::io;

use serde::{Deserialize, Serialize};

use super::flush::FlushPolicy;
use super::stream::StreamSink;
use super::traits::{Sink, SinkResult};
use crate::types::{Record, Severity};

/// Which standard stream(s) the console sink writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    #[default]
    Stdout,
    Stderr,
    /// WARN and above to stderr, everything else to stdout
    Split,
}

/// A sink that outputs to the console (stdout/stderr)
#[derive(Debug)]
pub struct ConsoleSink {
    stream: ConsoleStream,
    stdout: StreamSink<io::Stdout>,
    stderr: StreamSink<io::Stderr>,
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(ConsoleStream::Stdout, FlushPolicy::Immediate)
    }
}

impl ConsoleSink {
    pub fn new(stream: ConsoleStream, policy: FlushPolicy) -> Self {
        Self {
            stream,
            stdout: StreamSink::stdout(policy),
            stderr: StreamSink::stderr(policy),
        }
    }

    /// Color lines by severity on both streams
    pub fn with_colors(mut self, colors: bool) -> Self {
        self.stdout = self.stdout.with_colors(colors);
        self.stderr = self.stderr.with_colors(colors);
        self
    }

    pub fn stream(&self) -> ConsoleStream {
        self.stream
    }

    fn uses_stderr(&self, severity: Severity) -> bool {
        match self.stream {
            ConsoleStream::Stdout => false,
            ConsoleStream::Stderr => true,
            ConsoleStream::Split => severity >= Severity::Warn,
        }
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn write(&mut self, record: &Record<'_>) -> SinkResult<()> {
        if self.uses_stderr(record.severity()) {
            self.stderr.write(record)
        } else {
            self.stdout.write(record)
        }
    }

    fn flush(&mut self) -> SinkResult<()> {
        let out = self.stdout.flush();
        let err = self.stderr.flush();
        out.and(err)
    }

    fn close(&mut self) -> SinkResult<()> {
        let out = self.stdout.close();
        let err = self.stderr.close();
        out.and(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Attributes;

    #[test]
    fn test_console_sink_creation() {
        let sink = ConsoleSink::default();
        assert_eq!(sink.stream(), ConsoleStream::Stdout);
        assert_eq!(sink.name(), "console");
    }

    #[test]
    fn test_split_routing() {
        let sink = ConsoleSink::new(ConsoleStream::Split, FlushPolicy::Immediate);
        assert!(!sink.uses_stderr(Severity::Info));
        assert!(sink.uses_stderr(Severity::Warn));
        assert!(sink.uses_stderr(Severity::Fatal));
    }

    #[test]
    fn test_console_sink_writes() {
        // This test just verifies the sink doesn't panic
        let mut sink =
            ConsoleSink::new(ConsoleStream::Split, FlushPolicy::Immediate).with_colors(true);
        for severity in Severity::ALL {
            let record = Record::new(severity, "test", "console message", Attributes::new());
            sink.write(&record).unwrap();
        }
        sink.close().unwrap();
    }
}
