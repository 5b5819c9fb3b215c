//! In-memory sink

use std::sync::Arc;

use parking_lot::Mutex;

use super::format::render_line;
use super::traits::{Sink, SinkError, SinkResult};
use crate::types::{OwnedRecord, Record};

#[derive(Debug, Default)]
struct Captured {
    lines: Vec<String>,
    records: Vec<OwnedRecord>,
}

/// In-memory sink for tests, diagnostics and hosts that poll for output
///
/// Keeps both the rendered line and an owned copy of every record. Clones
/// share the same buffer, so a handle kept outside the registry sees every
/// write made by the registered copy.
///
/// With a capacity set, writes beyond it fail with [`SinkError::Full`] and
/// the record is dropped.
///
/// # Example
///
/// ```
/// use polylog_core::sinks::{MemorySink, Sink};
/// use polylog_core::types::{Attributes, Record, Severity};
///
/// let sink = MemorySink::new();
/// let mut registered = sink.clone();
/// registered.write(&Record::new(Severity::Warn, "app", "careful", Attributes::new())).unwrap();
/// assert_eq!(sink.len(), 1);
/// assert_eq!(sink.records()[0].message, "careful");
/// ```
#[derive(Debug, Clone)]
pub struct MemorySink {
    name: String,
    capacity: Option<usize>,
    captured: Arc<Mutex<Captured>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    /// Create an unbounded memory sink
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// Create an unbounded memory sink with a custom name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: None,
            captured: Arc::new(Mutex::new(Captured::default())),
        }
    }

    /// Create a memory sink that holds at most `capacity` records
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new()
        }
    }

    /// Rendered lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.captured.lock().lines.clone()
    }

    /// Record snapshots, oldest first
    pub fn records(&self) -> Vec<OwnedRecord> {
        self.captured.lock().records.clone()
    }

    /// Get the number of captured records
    pub fn len(&self) -> usize {
        self.captured.lock().records.len()
    }

    /// Check if nothing was captured
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove everything captured so far
    pub fn clear(&self) {
        let mut captured = self.captured.lock();
        captured.lines.clear();
        captured.records.clear();
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, record: &Record<'_>) -> SinkResult<()> {
        let mut captured = self.captured.lock();
        if let Some(capacity) = self.capacity {
            if captured.records.len() >= capacity {
                return Err(SinkError::Full { capacity });
            }
        }
        captured.lines.push(render_line(record));
        captured.records.push(record.to_owned_record());
        Ok(())
    }
}
