//! Callback sink: hands every record to a host closure

use std::fmt;

use super::traits::{Sink, SinkResult};
use crate::types::Record;

/// Closure type accepted by [`CallbackSink`]
pub type CallbackFn = Box<dyn FnMut(&Record<'_>) -> SinkResult<()> + Send>;

/// Forwards each record to a closure
///
/// Host bindings use this to route records into a language-level callback.
/// An error returned by the closure is counted like any other sink failure.
pub struct CallbackSink {
    name: String,
    callback: Option<CallbackFn>,
}

impl CallbackSink {
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: FnMut(&Record<'_>) -> SinkResult<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            callback: Some(Box::new(callback)),
        }
    }
}

impl fmt::Debug for CallbackSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSink")
            .field("name", &self.name)
            .field("closed", &self.callback.is_none())
            .finish()
    }
}

impl Sink for CallbackSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, record: &Record<'_>) -> SinkResult<()> {
        match self.callback.as_mut() {
            Some(callback) => callback(record),
            None => Err(super::SinkError::Closed),
        }
    }

    fn close(&mut self) -> SinkResult<()> {
        // Dropping the closure releases whatever host handle it captured
        self.callback = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::SinkError;
    use crate::types::{Attributes, Severity};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_callback_receives_records() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let mut sink = CallbackSink::new("cb", move |record| {
            seen_clone.lock().push(record.message().to_string());
            Ok(())
        });

        let record = Record::new(Severity::Info, "app", "hello", Attributes::new());
        sink.write(&record).unwrap();
        assert_eq!(*seen.lock(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_callback_error_propagates() {
        let mut sink = CallbackSink::new("cb", |_| Err(SinkError::callback("host said no")));
        let record = Record::new(Severity::Info, "app", "hello", Attributes::new());
        assert!(matches!(sink.write(&record), Err(SinkError::Callback(_))));
    }

    #[test]
    fn test_close_releases_closure() {
        let token = Arc::new(AtomicUsize::new(0));
        let held = Arc::clone(&token);
        let mut sink = CallbackSink::new("cb", move |_| {
            held.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(Arc::strong_count(&token), 2);
        sink.close().unwrap();
        assert_eq!(Arc::strong_count(&token), 1);

        let record = Record::new(Severity::Info, "app", "late", Attributes::new());
        assert!(matches!(sink.write(&record), Err(SinkError::Closed)));
    }
}
