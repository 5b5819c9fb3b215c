//! Fan-out of records to registered sinks

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::report::{DispatchOutcome, FailureReport, SinkReport};
use crate::error::{LoggingError, LoggingResult};
use crate::filter::{effective_threshold, passes};
use crate::sinks::{BoxedSink, LostRecords, SinkError};
use crate::types::{Record, Severity};

/// Identifier handed out when a sink is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SinkId(pub u64);

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink#{}", self.0)
    }
}

/// Observer for absorbed sink failures
///
/// The dispatcher only queues failures; they reach the callback through
/// [`PendingDiagnostics::notify`] once the caller has released its lock.
pub type DiagnosticsFn = Arc<dyn Fn(SinkId, &str, &SinkError) + Send + Sync>;

thread_local! {
    static NOTIFYING: Cell<bool> = const { Cell::new(false) };
}

struct NotifyGuard;

impl Drop for NotifyGuard {
    fn drop(&mut self) {
        NOTIFYING.with(|flag| flag.set(false));
    }
}

struct Notice {
    id: SinkId,
    name: String,
    error: SinkError,
}

/// Failures waiting for the diagnostics callback
#[must_use = "queued failures are discarded unless notified"]
#[derive(Default)]
pub struct PendingDiagnostics {
    callback: Option<DiagnosticsFn>,
    notices: Vec<Notice>,
}

impl fmt::Debug for PendingDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingDiagnostics")
            .field("observed", &self.callback.is_some())
            .field("len", &self.notices.len())
            .finish()
    }
}

impl PendingDiagnostics {
    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    /// Hand every queued failure to the callback
    ///
    /// Failures raised while the callback itself logs on this thread are
    /// counted but not reported again.
    pub fn notify(self) {
        let Some(callback) = self.callback else {
            return;
        };
        if self.notices.is_empty() || NOTIFYING.with(Cell::get) {
            return;
        }
        NOTIFYING.with(|flag| flag.set(true));
        let _guard = NotifyGuard;
        for notice in &self.notices {
            callback(notice.id, &notice.name, &notice.error);
        }
    }
}

struct SinkEntry {
    id: SinkId,
    name: String,
    /// `None` once closed
    sink: Option<BoxedSink>,
    level: Option<Severity>,
    threshold: Severity,
    writes: u64,
    failures: u64,
    /// Lost records already counted
    lost_seen: u64,
    last_error: Option<String>,
}

impl SinkEntry {
    fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    fn report(&self) -> SinkReport {
        SinkReport {
            id: self.id,
            name: self.name.clone(),
            threshold: self.threshold,
            writes: self.writes,
            failures: self.failures,
            last_error: self.last_error.clone(),
        }
    }
}

/// Failure totals plus notices queued for the diagnostics callback
#[derive(Default)]
struct Tally {
    total: u64,
    observed: bool,
    pending: Vec<Notice>,
}

impl Tally {
    /// Count one failed call; returns the error text
    fn record(&mut self, entry: &mut SinkEntry, error: SinkError) -> String {
        let message = error.to_string();
        entry.failures += 1;
        entry.last_error = Some(message.clone());
        self.total += 1;
        self.queue(entry, error);
        message
    }

    /// Count records the sink lost since the last poll
    fn absorb(&mut self, entry: &mut SinkEntry, lost: LostRecords) -> Option<(u64, String)> {
        if lost.count <= entry.lost_seen {
            return None;
        }
        let count = lost.count - entry.lost_seen;
        let last = lost.last_error.unwrap_or_else(|| "record lost".to_string());
        entry.lost_seen = lost.count;
        entry.failures += count;
        entry.last_error = Some(last.clone());
        self.total += count;
        self.queue(entry, SinkError::Delivery { count, last: last.clone() });
        Some((count, last))
    }

    fn queue(&mut self, entry: &SinkEntry, error: SinkError) {
        if self.observed {
            self.pending.push(Notice {
                id: entry.id,
                name: entry.name.clone(),
                error,
            });
        }
    }
}

/// Routes records to sinks in registration order
///
/// A failing sink never stops the others and never surfaces as an error from
/// [`Dispatcher::submit`]; failures are counted per sink and reported through
/// [`Dispatcher::report`] and the optional diagnostics callback.
pub struct Dispatcher {
    global: Option<Severity>,
    entries: Vec<SinkEntry>,
    next_id: u64,
    floor: Option<Severity>,
    tally: Tally,
    diagnostics: Option<DiagnosticsFn>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("global", &self.global)
            .field("sinks", &self.entries.iter().map(|e| &e.name).collect::<Vec<_>>())
            .field("floor", &self.floor)
            .field("total_failures", &self.tally.total)
            .finish()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Dispatcher {
    pub fn new(global: Option<Severity>) -> Self {
        Self {
            global,
            entries: Vec::new(),
            next_id: 1,
            floor: None,
            tally: Tally::default(),
            diagnostics: None,
        }
    }

    /// Register a sink with an optional per-sink threshold
    pub fn add(&mut self, sink: BoxedSink, level: Option<Severity>) -> SinkId {
        let id = SinkId(self.next_id);
        self.next_id += 1;
        self.entries.push(SinkEntry {
            id,
            name: sink.name().to_string(),
            sink: Some(sink),
            level,
            threshold: effective_threshold(self.global, level),
            writes: 0,
            failures: 0,
            lost_seen: 0,
            last_error: None,
        });
        self.recompute();
        id
    }

    /// Unregister and close a sink
    ///
    /// The entry leaves the report; its failures stay in the total.
    pub fn remove(&mut self, id: SinkId) -> LoggingResult<()> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(LoggingError::SinkNotFound(id))?;
        let mut entry = self.entries.remove(index);
        if let Some(mut sink) = entry.sink.take() {
            let result = sink.close();
            let lost = sink.lost();
            if let Err(e) = result {
                self.tally.record(&mut entry, e);
            }
            self.tally.absorb(&mut entry, lost);
        }
        self.recompute();
        Ok(())
    }

    /// Whether any open sink would accept a record at `severity`
    #[inline]
    pub fn would_accept(&self, severity: Severity) -> bool {
        self.floor.map_or(false, |floor| passes(floor, severity))
    }

    /// Lowest effective threshold among open sinks
    pub fn floor(&self) -> Option<Severity> {
        self.floor
    }

    pub fn global_level(&self) -> Option<Severity> {
        self.global
    }

    /// Write a record to every sink whose threshold it passes
    pub fn submit(&mut self, record: &Record<'_>) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        if !self.would_accept(record.severity()) {
            return outcome;
        }

        for entry in &mut self.entries {
            if !passes(entry.threshold, record.severity()) {
                continue;
            }
            let Some(sink) = entry.sink.as_mut() else {
                continue;
            };
            let result = sink.write(record);
            let lost = sink.lost();
            match result {
                Ok(()) => {
                    entry.writes += 1;
                    outcome.delivered += 1;
                }
                Err(e) => {
                    outcome.failed += 1;
                    outcome.last_error = Some(self.tally.record(entry, e));
                }
            }
            self.tally.absorb(entry, lost);
        }
        outcome
    }

    /// Flush every open sink
    ///
    /// Records found lost while flushing count as failures of the outcome.
    pub fn flush(&mut self) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        for entry in &mut self.entries {
            let Some(sink) = entry.sink.as_mut() else {
                continue;
            };
            let result = sink.flush();
            let lost = sink.lost();
            match result {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    outcome.failed += 1;
                    outcome.last_error = Some(self.tally.record(entry, e));
                }
            }
            if let Some((count, last)) = self.tally.absorb(entry, lost) {
                outcome.failed += count as usize;
                outcome.last_error = Some(last);
            }
        }
        outcome
    }

    /// Ask every open sink to start a new output file
    pub fn rotate(&mut self) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        for entry in &mut self.entries {
            let Some(sink) = entry.sink.as_mut() else {
                continue;
            };
            match sink.rotate() {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    outcome.failed += 1;
                    outcome.last_error = Some(self.tally.record(entry, e));
                }
            }
        }
        outcome
    }

    /// Close every open sink exactly once
    ///
    /// Closed entries stay in the report; nothing accepts records afterwards.
    pub fn close_all(&mut self) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        for entry in &mut self.entries {
            let Some(mut sink) = entry.sink.take() else {
                continue;
            };
            let result = sink.close();
            let lost = sink.lost();
            match result {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    outcome.failed += 1;
                    outcome.last_error = Some(self.tally.record(entry, e));
                }
            }
            if let Some((count, last)) = self.tally.absorb(entry, lost) {
                outcome.failed += count as usize;
                outcome.last_error = Some(last);
            }
        }
        self.recompute();
        outcome
    }

    /// Change (or clear) the global threshold
    pub fn set_level(&mut self, global: Option<Severity>) {
        self.global = global;
        self.recompute();
    }

    /// Change (or clear) one sink's threshold
    pub fn set_sink_level(&mut self, id: SinkId, level: Option<Severity>) -> LoggingResult<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(LoggingError::SinkNotFound(id))?;
        entry.level = level;
        self.recompute();
        Ok(())
    }

    pub fn set_diagnostics(&mut self, diagnostics: Option<DiagnosticsFn>) {
        self.tally.observed = diagnostics.is_some();
        if diagnostics.is_none() {
            self.tally.pending.clear();
        }
        self.diagnostics = diagnostics;
    }

    /// Failures queued since the last call, for notifying outside the lock
    pub fn take_diagnostics(&mut self) -> PendingDiagnostics {
        PendingDiagnostics {
            callback: self.diagnostics.clone(),
            notices: std::mem::take(&mut self.tally.pending),
        }
    }

    /// Ids of registered sinks, in dispatch order
    pub fn sink_ids(&self) -> Vec<SinkId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_open()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-sink telemetry, after counting records sinks have lost since the
    /// last poll
    pub fn report(&mut self) -> FailureReport {
        for entry in &mut self.entries {
            let Some(lost) = entry.sink.as_ref().map(|sink| sink.lost()) else {
                continue;
            };
            self.tally.absorb(entry, lost);
        }
        FailureReport {
            total_failures: self.tally.total,
            dropped_inactive: 0,
            sinks: self.entries.iter().map(SinkEntry::report).collect(),
        }
    }

    fn recompute(&mut self) {
        for entry in &mut self.entries {
            entry.threshold = effective_threshold(self.global, entry.level);
        }
        self.floor = self
            .entries
            .iter()
            .filter(|e| e.is_open())
            .map(|e| e.threshold)
            .min();
    }
}
