//! Dispatch outcomes and failure telemetry

use serde::Serialize;

use super::SinkId;
use crate::types::Severity;

/// Result of submitting one record (or flushing every sink)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Sinks that accepted and wrote the record
    pub delivered: usize,
    /// Sinks whose write failed
    pub failed: usize,
    /// Message of the last failure, if any
    pub last_error: Option<String>,
}

impl DispatchOutcome {
    /// No sink touched the record
    pub fn is_discarded(&self) -> bool {
        self.delivered == 0 && self.failed == 0
    }
}

/// Per-sink statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkReport {
    pub id: SinkId,
    pub name: String,
    pub threshold: Severity,
    pub writes: u64,
    pub failures: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Snapshot of every failure the dispatcher has absorbed
///
/// Serialized in camelCase so hosts get the same shape the bindings return.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    /// Failed writes, flushes and closes across all sinks, including removed ones
    pub total_failures: u64,
    /// Leveled calls made while the core was not active
    pub dropped_inactive: u64,
    /// Sinks in registration order
    pub sinks: Vec<SinkReport>,
}

impl FailureReport {
    pub fn sink(&self, id: SinkId) -> Option<&SinkReport> {
        self.sinks.iter().find(|s| s.id == id)
    }

    pub fn sink_named(&self, name: &str) -> Option<&SinkReport> {
        self.sinks.iter().find(|s| s.name == name)
    }
}
