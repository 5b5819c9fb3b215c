//! Level filtering
//!
//! A sink accepts a record when the record's severity is at or above the
//! sink's effective threshold.

use crate::types::Severity;

/// Threshold used when neither a global nor a per-sink level is configured
pub const DEFAULT_THRESHOLD: Severity = Severity::Info;

/// Whether a record at `severity` passes `threshold`
#[inline]
pub fn passes(threshold: Severity, severity: Severity) -> bool {
    severity >= threshold
}

/// Resolve the threshold a sink actually applies
///
/// The stricter of the two levels wins when both are set.
pub fn effective_threshold(global: Option<Severity>, sink: Option<Severity>) -> Severity {
    match (global, sink) {
        (Some(g), Some(s)) => g.max(s),
        (Some(g), None) => g,
        (None, Some(s)) => s,
        (None, None) => DEFAULT_THRESHOLD,
    }
}
