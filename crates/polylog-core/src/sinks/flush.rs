//! Flush policy for buffered sinks

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// When a buffered sink pushes its output to the destination
///
/// Thresholds are checked at write time only; nothing flushes in the
/// background. Explicit flushes and shutdown always flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlushPolicy {
    /// Flush after every record
    #[default]
    Immediate,
    /// Flush once `max_records` are pending or `max_interval_ms` has passed
    /// since the last flush
    #[serde(rename_all = "camelCase")]
    Buffered {
        max_records: usize,
        #[serde(default)]
        max_interval_ms: Option<u64>,
    },
}

impl FlushPolicy {
    pub fn buffered(max_records: usize, max_interval: Option<Duration>) -> Self {
        FlushPolicy::Buffered {
            max_records,
            max_interval_ms: max_interval.map(|d| d.as_millis() as u64),
        }
    }
}

/// Tracks pending writes against a [`FlushPolicy`]
#[derive(Debug)]
pub(crate) struct FlushTracker {
    policy: FlushPolicy,
    pending: usize,
    last_flush: Option<Instant>,
}

impl FlushTracker {
    pub(crate) fn new(policy: FlushPolicy) -> Self {
        Self {
            policy,
            pending: 0,
            last_flush: None,
        }
    }

    /// Count one write; returns true when the sink should flush now
    pub(crate) fn record_write(&mut self) -> bool {
        self.pending += 1;
        match self.policy {
            FlushPolicy::Immediate => true,
            FlushPolicy::Buffered {
                max_records,
                max_interval_ms,
            } => {
                if self.pending >= max_records.max(1) {
                    return true;
                }
                // Instant is only touched when an interval is configured
                match max_interval_ms {
                    Some(ms) => {
                        let since = *self.last_flush.get_or_insert_with(Instant::now);
                        since.elapsed() >= Duration::from_millis(ms)
                    }
                    None => false,
                }
            }
        }
    }

    pub(crate) fn flushed(&mut self) {
        self.pending = 0;
        if let FlushPolicy::Buffered {
            max_interval_ms: Some(_),
            ..
        } = self.policy
        {
            self.last_flush = Some(Instant::now());
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_always_flushes() {
        let mut tracker = FlushTracker::new(FlushPolicy::Immediate);
        assert!(tracker.record_write());
        tracker.flushed();
        assert!(tracker.record_write());
    }

    #[test]
    fn test_buffered_by_count() {
        let mut tracker = FlushTracker::new(FlushPolicy::buffered(3, None));
        assert!(!tracker.record_write());
        assert!(!tracker.record_write());
        assert!(tracker.record_write());
        tracker.flushed();
        assert_eq!(tracker.pending(), 0);
        assert!(!tracker.record_write());
    }

    #[test]
    fn test_buffered_by_interval() {
        let mut tracker =
            FlushTracker::new(FlushPolicy::buffered(1000, Some(Duration::from_millis(20))));
        assert!(!tracker.record_write());
        std::thread::sleep(Duration::from_millis(30));
        assert!(tracker.record_write());
    }

    #[test]
    fn test_policy_serde() {
        let immediate: FlushPolicy = serde_json::from_str("\"immediate\"").unwrap();
        assert_eq!(immediate, FlushPolicy::Immediate);
        let buffered: FlushPolicy =
            serde_json::from_str(r#"{"buffered": {"maxRecords": 10, "maxIntervalMs": 500}}"#)
                .unwrap();
        assert_eq!(
            buffered,
            FlushPolicy::buffered(10, Some(Duration::from_millis(500)))
        );
    }
}
