//! Logger handle bound to a context name

use std::fmt;
use std::sync::Arc;

use super::logging::Core;
use crate::dispatch::DispatchOutcome;
use crate::error::{LoggingError, LoggingResult};
use crate::types::{Attributes, MessageSource, Severity};

/// Cheap, clonable handle that logs under one context name
///
/// A logger does not own sinks. Once its logging core has shut down every
/// leveled call is a silent no-op; use [`Logger::try_log`] to observe that.
///
/// # Example
///
/// ```
/// use polylog_core::attrs;
/// use polylog_core::config::{LoggingConfig, SinkConfig};
/// use polylog_core::registry::Logging;
///
/// let logging = Logging::init(LoggingConfig::default().with_sinks(vec![SinkConfig::memory()])).unwrap();
/// let logger = logging.get_logger("worker");
/// logger.info_with("job done", attrs! { "code" => 7, "ok" => true });
///
/// let line = &logging.memory_sinks()[0].lines()[0];
/// assert!(line.ends_with("[INFO] [worker] job done {code=7, ok=true}"));
/// ```
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    core: Option<Arc<Core>>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("attached", &self.core.is_some())
            .finish()
    }
}

impl Logger {
    pub(crate) fn attached(name: Arc<str>, core: Arc<Core>) -> Self {
        Self {
            name,
            core: Some(core),
        }
    }

    /// Logger with no core behind it; every call is a no-op
    pub fn detached(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            core: None,
        }
    }

    /// Context name stamped on every record
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a record at `severity` would reach at least one sink
    #[inline]
    pub fn enabled(&self, severity: Severity) -> bool {
        self.core
            .as_ref()
            .map_or(false, |core| core.is_active() && core.would_accept(severity))
    }

    /// Log a message; sink failures and inactivity are absorbed
    pub fn log<'a>(
        &self,
        severity: Severity,
        message: impl Into<MessageSource<'a>>,
        attrs: Attributes,
    ) {
        let _ = self.dispatch(severity, message.into(), attrs);
    }

    /// Log a message built only if some sink accepts the record
    pub fn log_lazy<'a, F>(&self, severity: Severity, formatter: F, attrs: Attributes)
    where
        F: FnOnce() -> String + 'a,
    {
        let _ = self.dispatch(severity, MessageSource::deferred(formatter), attrs);
    }

    /// Log a message and report what happened
    ///
    /// Returns `Inactive` when the core is shut down (or the logger is
    /// detached) and `SinkFailures` when at least one sink failed; the record
    /// still reached every other sink.
    pub fn try_log<'a>(
        &self,
        severity: Severity,
        message: impl Into<MessageSource<'a>>,
        attrs: Attributes,
    ) -> LoggingResult<DispatchOutcome> {
        let outcome = self.dispatch(severity, message.into(), attrs)?;
        match &outcome.last_error {
            Some(last) => Err(LoggingError::SinkFailures {
                count: outcome.failed,
                last: last.clone(),
            }),
            None => Ok(outcome),
        }
    }

    fn dispatch(
        &self,
        severity: Severity,
        message: MessageSource<'_>,
        attrs: Attributes,
    ) -> LoggingResult<DispatchOutcome> {
        match &self.core {
            Some(core) => core.dispatch(severity, Arc::clone(&self.name), message, attrs),
            None => Err(LoggingError::Inactive),
        }
    }

    pub fn trace<'a>(&self, message: impl Into<MessageSource<'a>>) {
        self.log(Severity::Trace, message, Attributes::new());
    }

    pub fn debug<'a>(&self, message: impl Into<MessageSource<'a>>) {
        self.log(Severity::Debug, message, Attributes::new());
    }

    pub fn info<'a>(&self, message: impl Into<MessageSource<'a>>) {
        self.log(Severity::Info, message, Attributes::new());
    }

    pub fn warn<'a>(&self, message: impl Into<MessageSource<'a>>) {
        self.log(Severity::Warn, message, Attributes::new());
    }

    pub fn error<'a>(&self, message: impl Into<MessageSource<'a>>) {
        self.log(Severity::Error, message, Attributes::new());
    }

    pub fn fatal<'a>(&self, message: impl Into<MessageSource<'a>>) {
        self.log(Severity::Fatal, message, Attributes::new());
    }

    pub fn trace_with<'a>(&self, message: impl Into<MessageSource<'a>>, attrs: Attributes) {
        self.log(Severity::Trace, message, attrs);
    }

    pub fn debug_with<'a>(&self, message: impl Into<MessageSource<'a>>, attrs: Attributes) {
        self.log(Severity::Debug, message, attrs);
    }

    pub fn info_with<'a>(&self, message: impl Into<MessageSource<'a>>, attrs: Attributes) {
        self.log(Severity::Info, message, attrs);
    }

    pub fn warn_with<'a>(&self, message: impl Into<MessageSource<'a>>, attrs: Attributes) {
        self.log(Severity::Warn, message, attrs);
    }

    pub fn error_with<'a>(&self, message: impl Into<MessageSource<'a>>, attrs: Attributes) {
        self.log(Severity::Error, message, attrs);
    }

    pub fn fatal_with<'a>(&self, message: impl Into<MessageSource<'a>>, attrs: Attributes) {
        self.log(Severity::Fatal, message, attrs);
    }
}

/// Convenience macros for logging
///
/// The format arguments are only evaluated when some sink accepts the record.
#[macro_export]
macro_rules! log_trace {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log_lazy($crate::types::Severity::Trace, || format!($($arg)+), $crate::types::Attributes::new())
    };
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log_lazy($crate::types::Severity::Debug, || format!($($arg)+), $crate::types::Attributes::new())
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log_lazy($crate::types::Severity::Info, || format!($($arg)+), $crate::types::Attributes::new())
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log_lazy($crate::types::Severity::Warn, || format!($($arg)+), $crate::types::Attributes::new())
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log_lazy($crate::types::Severity::Error, || format!($($arg)+), $crate::types::Attributes::new())
    };
}

#[macro_export]
macro_rules! log_fatal {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log_lazy($crate::types::Severity::Fatal, || format!($($arg)+), $crate::types::Attributes::new())
    };
}
