//! Sink trait and error types

use std::time::Duration;

use thiserror::Error;

use crate::types::Record;

/// Errors a sink can report for a single write, flush or close
///
/// None of these are fatal: the dispatcher counts them and moves on.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("Queue full after waiting {0:?}")]
    QueueFull(Duration),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Sink is closed")]
    Closed,

    #[error("{count} record(s) could not be delivered: {last}")]
    Delivery { count: u64, last: String },

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Callback error: {0}")]
    Callback(String),

    #[error("Syslog error: {0}")]
    Syslog(String),
}

impl SinkError {
    /// Create a callback error
    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback(message.into())
    }
}

pub type SinkResult<T> = Result<T, SinkError>;

/// Records a sink accepted in `write` but lost afterwards
///
/// `count` is a running total and never decreases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LostRecords {
    pub count: u64,
    pub last_error: Option<String>,
}

/// An output destination for records
///
/// The capability set is fixed: write, flush, close. Sinks are owned by a
/// single dispatcher and only ever called with its lock held, so methods take
/// `&mut self`.
///
/// Implementations:
/// - `StreamSink`: any byte stream (stdout, stderr, buffers)
/// - `FileSink`: append-mode file with optional rotation
/// - `MemorySink`: captured lines and records for inspection
/// - `CallbackSink`: forwards to a host closure
/// - `NetworkSink`: JSON lines over TCP through a bounded queue
/// - `SyslogSink`: the local syslog daemon (unix)
pub trait Sink: Send {
    /// Human-readable name used in failure reports
    fn name(&self) -> &str;

    /// Write one record
    fn write(&mut self, record: &Record<'_>) -> SinkResult<()>;

    /// Push buffered output to the destination
    fn flush(&mut self) -> SinkResult<()> {
        Ok(())
    }

    /// Start a new output file; sinks without files do nothing
    fn rotate(&mut self) -> SinkResult<()> {
        Ok(())
    }

    /// Records dropped after `write` returned, e.g. by a delivery worker
    ///
    /// The dispatcher polls this and counts each lost record as a failure.
    fn lost(&self) -> LostRecords {
        LostRecords::default()
    }

    /// Flush and release the destination resource
    ///
    /// Called exactly once by the dispatcher; writes after close fail with
    /// [`SinkError::Closed`].
    fn close(&mut self) -> SinkResult<()> {
        self.flush()
    }
}

/// Type alias for a boxed sink
pub type BoxedSink = Box<dyn Sink>;
