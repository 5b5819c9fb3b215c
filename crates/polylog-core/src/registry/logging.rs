//! The logging instance: dispatcher, sinks and lifecycle

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::logger::Logger;
use super::slot::RegistryState;
use crate::config::{LoggingConfig, SinkConfig};
use crate::dispatch::{Dispatcher, DispatchOutcome, FailureReport, SinkId};
use crate::error::{LoggingError, LoggingResult};
use crate::sinks::{MemorySink, Sink, SinkError};
use crate::types::{Attributes, MessageSource, OwnedRecord, Record, Severity};

/// Floor value meaning no sink accepts anything
const NO_FLOOR: u8 = u8::MAX;

pub(crate) struct Core {
    dispatcher: Mutex<Dispatcher>,
    /// Mirror of the dispatcher floor so disabled calls skip the lock
    floor: AtomicU8,
    active: AtomicBool,
    dropped_inactive: AtomicU64,
    memory: Mutex<Vec<MemorySink>>,
    config: LoggingConfig,
}

impl Core {
    #[inline]
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn would_accept(&self, severity: Severity) -> bool {
        let floor = self.floor.load(Ordering::Acquire);
        floor != NO_FLOOR && severity.rank() >= floor
    }

    pub(crate) fn count_inactive(&self) {
        self.dropped_inactive.fetch_add(1, Ordering::Relaxed);
    }

    fn sync_floor(&self, dispatcher: &Dispatcher) {
        let floor = dispatcher.floor().map_or(NO_FLOOR, Severity::rank);
        self.floor.store(floor, Ordering::Release);
    }

    /// Run one record through the dispatcher
    ///
    /// Returns `Inactive` after shutdown; the caller decides whether that is
    /// an error.
    pub(crate) fn dispatch(
        &self,
        severity: Severity,
        context: Arc<str>,
        message: MessageSource<'_>,
        attrs: Attributes,
    ) -> LoggingResult<DispatchOutcome> {
        if !self.is_active() {
            self.count_inactive();
            return Err(LoggingError::Inactive);
        }
        if !self.would_accept(severity) {
            return Ok(DispatchOutcome::default());
        }
        self.submit(&Record::new(severity, context, message, attrs))
    }

    fn submit(&self, record: &Record<'_>) -> LoggingResult<DispatchOutcome> {
        self.with_dispatcher(|dispatcher| {
            // Shutdown may have won the race for the lock
            if !self.is_active() {
                self.count_inactive();
                return Err(LoggingError::Inactive);
            }
            Ok(dispatcher.submit(record))
        })
    }

    fn shutdown(&self) {
        self.with_dispatcher(|dispatcher| {
            if !self.active.swap(false, Ordering::AcqRel) {
                return;
            }
            dispatcher.flush();
            dispatcher.close_all();
            self.sync_floor(dispatcher);
        });
    }

    /// Lock the dispatcher for a configuration change
    fn configure<T>(&self, f: impl FnOnce(&mut Dispatcher) -> LoggingResult<T>) -> LoggingResult<T> {
        self.with_dispatcher(|dispatcher| {
            if !self.is_active() {
                return Err(LoggingError::Inactive);
            }
            let result = f(dispatcher);
            self.sync_floor(dispatcher);
            result
        })
    }

    /// Run `f` under the dispatcher lock; queued sink failures reach the
    /// diagnostics callback after the lock is released
    fn with_dispatcher<T>(&self, f: impl FnOnce(&mut Dispatcher) -> T) -> T {
        let (result, pending) = {
            let mut dispatcher = self.dispatcher.lock();
            let result = f(&mut dispatcher);
            (result, dispatcher.take_diagnostics())
        };
        pending.notify();
        result
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle to an initialized logging core
///
/// Clones share the same core. The core shuts down on an explicit
/// [`Logging::shutdown`] or when the last handle (including every [`Logger`]
/// obtained from it) is dropped; either way each sink is flushed and closed
/// exactly once.
///
/// # Example
///
/// ```
/// use polylog_core::config::{LoggingConfig, SinkConfig};
/// use polylog_core::registry::Logging;
///
/// let logging = Logging::init(
///     LoggingConfig::default()
///         .with_context("api")
///         .with_sinks(vec![SinkConfig::memory()]),
/// ).unwrap();
///
/// logging.get_logger("api.http").info("listening");
/// let memory = &logging.memory_sinks()[0];
/// assert!(memory.lines()[0].ends_with("[INFO] [api.http] listening"));
///
/// logging.shutdown();
/// assert!(!logging.is_active());
/// ```
#[derive(Clone)]
pub struct Logging {
    core: Arc<Core>,
}

impl fmt::Debug for Logging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logging")
            .field("context", &self.core.config.context)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Logging {
    /// Validate the config, open every sink and start accepting records
    ///
    /// Sinks already opened are closed again when a later one fails to build.
    pub fn init(config: LoggingConfig) -> LoggingResult<Self> {
        config.validate()?;

        let mut dispatcher = Dispatcher::new(Some(config.level));
        let mut memory = Vec::new();
        for sink in &config.sinks {
            match sink.build(&config) {
                Ok(built) => {
                    dispatcher.add(built.sink, built.level);
                    memory.extend(built.memory);
                }
                Err(e) => {
                    dispatcher.close_all();
                    return Err(e.into());
                }
            }
        }

        let floor = dispatcher.floor().map_or(NO_FLOOR, Severity::rank);
        Ok(Self {
            core: Arc::new(Core {
                dispatcher: Mutex::new(dispatcher),
                floor: AtomicU8::new(floor),
                active: AtomicBool::new(true),
                dropped_inactive: AtomicU64::new(0),
                memory: Mutex::new(memory),
                config,
            }),
        })
    }

    /// Logger bound to the configured root context
    pub fn root(&self) -> Logger {
        self.get_logger(self.core.config.context.as_str())
    }

    /// Logger bound to `name`
    pub fn get_logger(&self, name: impl Into<Arc<str>>) -> Logger {
        Logger::attached(name.into(), Arc::clone(&self.core))
    }

    /// Log through the root context
    pub fn log<'a>(
        &self,
        severity: Severity,
        message: impl Into<MessageSource<'a>>,
        attrs: Attributes,
    ) {
        self.root().log(severity, message, attrs);
    }

    /// The configuration this instance was built from
    pub fn config(&self) -> &LoggingConfig {
        &self.core.config
    }

    /// Register an additional sink
    pub fn add_sink(&self, sink: impl Sink + 'static, level: Option<Severity>) -> LoggingResult<SinkId> {
        self.core
            .configure(|dispatcher| Ok(dispatcher.add(Box::new(sink), level)))
    }

    /// Build and register a sink from its config definition
    pub fn add_sink_config(&self, sink: &SinkConfig) -> LoggingResult<SinkId> {
        if !self.is_active() {
            return Err(LoggingError::Inactive);
        }
        let built = sink.build(&self.core.config)?;
        let id = self
            .core
            .configure(|dispatcher| Ok(dispatcher.add(built.sink, built.level)))?;
        self.core.memory.lock().extend(built.memory);
        Ok(id)
    }

    /// Unregister and close a sink
    pub fn remove_sink(&self, id: SinkId) -> LoggingResult<()> {
        self.core.configure(|dispatcher| dispatcher.remove(id))
    }

    /// Change the global threshold
    pub fn set_level(&self, level: Severity) -> LoggingResult<()> {
        self.core.configure(|dispatcher| {
            dispatcher.set_level(Some(level));
            Ok(())
        })
    }

    /// Change (or clear) one sink's threshold
    pub fn set_sink_level(&self, id: SinkId, level: Option<Severity>) -> LoggingResult<()> {
        self.core
            .configure(|dispatcher| dispatcher.set_sink_level(id, level))
    }

    /// Current global threshold
    pub fn level(&self) -> Option<Severity> {
        self.core.dispatcher.lock().global_level()
    }

    /// Flush every sink
    ///
    /// Failures are counted like write failures and also returned, so a host
    /// can learn about asynchronous delivery problems.
    pub fn flush(&self) -> LoggingResult<()> {
        let outcome = self.core.configure(|dispatcher| Ok(dispatcher.flush()))?;
        match outcome.last_error {
            Some(last) => Err(LoggingError::SinkFailures {
                count: outcome.failed,
                last,
            }),
            None => Ok(()),
        }
    }

    /// Start new output files on every sink that writes one
    pub fn rotate(&self) -> LoggingResult<()> {
        let outcome = self.core.configure(|dispatcher| Ok(dispatcher.rotate()))?;
        match outcome.last_error {
            Some(last) => Err(LoggingError::SinkFailures {
                count: outcome.failed,
                last,
            }),
            None => Ok(()),
        }
    }

    /// Dispatch a record produced elsewhere, keeping its timestamp
    ///
    /// Used by [`LogServer`](crate::server::LogServer) for records received
    /// from remote network sinks.
    pub fn replay(&self, record: OwnedRecord) -> LoggingResult<DispatchOutcome> {
        if !self.is_active() {
            return Err(LoggingError::Inactive);
        }
        if !self.core.would_accept(record.severity) {
            return Ok(DispatchOutcome::default());
        }
        let OwnedRecord {
            severity,
            timestamp,
            context,
            message,
            attrs,
        } = record;
        self.core
            .submit(&Record::new(severity, context, message, attrs).with_timestamp(timestamp))
    }

    /// Flush and close every sink, then stop accepting records
    ///
    /// Idempotent: later calls do nothing.
    pub fn shutdown(&self) {
        self.core.shutdown();
    }

    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    pub fn state(&self) -> RegistryState {
        if self.is_active() {
            RegistryState::Active
        } else {
            RegistryState::Terminated
        }
    }

    /// Failure telemetry for every sink, including closed ones
    pub fn failure_report(&self) -> FailureReport {
        let mut report = self.core.with_dispatcher(|dispatcher| dispatcher.report());
        report.dropped_inactive = self.core.dropped_inactive.load(Ordering::Relaxed);
        report
    }

    /// Handles to the memory sinks built from config, in registration order
    pub fn memory_sinks(&self) -> Vec<MemorySink> {
        self.core.memory.lock().clone()
    }

    /// Observe every sink failure as it is absorbed
    ///
    /// The callback runs after the dispatcher lock is released, so it may log
    /// through this instance. Failures caused by that logging are counted but
    /// not reported to the callback again.
    pub fn on_sink_error<F>(&self, callback: F)
    where
        F: Fn(SinkId, &str, &SinkError) + Send + Sync + 'static,
    {
        self.core.dispatcher.lock().set_diagnostics(Some(Arc::new(callback)));
    }

    /// Whether both handles refer to the same instance
    pub fn ptr_eq(&self, other: &Logging) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::sinks::CallbackSink;
    use std::sync::atomic::AtomicUsize;

    fn memory_logging(level: Severity) -> (Logging, MemorySink) {
        let logging = Logging::init(
            LoggingConfig::default()
                .with_level(level)
                .with_sinks(vec![SinkConfig::memory()]),
        )
        .unwrap();
        let memory = logging.memory_sinks().remove(0);
        (logging, memory)
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let result = Logging::init(LoggingConfig::default().with_sinks(vec![SinkConfig::network("")]));
        assert!(matches!(
            result,
            Err(LoggingError::Config(ConfigError::InvalidSink(_)))
        ));
    }

    #[test]
    fn test_root_logger_uses_context() {
        let logging = Logging::init(
            LoggingConfig::default()
                .with_context("svc")
                .with_sinks(vec![SinkConfig::memory()]),
        )
        .unwrap();
        logging.log(Severity::Warn, "hi", Attributes::new());
        assert_eq!(logging.memory_sinks()[0].records()[0].context, "svc");
    }

    #[test]
    fn test_set_level_moves_floor() {
        let (logging, memory) = memory_logging(Severity::Error);
        let logger = logging.get_logger("x");
        assert!(!logger.enabled(Severity::Warn));
        logger.warn("dropped");

        logging.set_level(Severity::Debug).unwrap();
        assert!(logger.enabled(Severity::Debug));
        logger.debug("kept");
        assert_eq!(memory.len(), 1);
        assert_eq!(logging.level(), Some(Severity::Debug));
    }

    #[test]
    fn test_add_and_remove_sink() {
        let (logging, memory) = memory_logging(Severity::Info);
        let extra = MemorySink::named("extra");
        let id = logging.add_sink(extra.clone(), Some(Severity::Error)).unwrap();

        let logger = logging.root();
        logger.info("one");
        logger.error("two");
        assert_eq!(memory.len(), 2);
        assert_eq!(extra.len(), 1);

        logging.remove_sink(id).unwrap();
        logger.error("three");
        assert_eq!(extra.len(), 1);
        assert!(matches!(
            logging.remove_sink(id),
            Err(LoggingError::SinkNotFound(_))
        ));
    }

    #[test]
    fn test_add_sink_config_tracks_memory() {
        let logging = Logging::init(LoggingConfig::default().with_sinks(vec![])).unwrap();
        assert!(!logging.root().enabled(Severity::Fatal));
        logging.add_sink_config(&SinkConfig::memory()).unwrap();
        logging.root().info("captured");
        assert_eq!(logging.memory_sinks()[0].len(), 1);
    }

    #[test]
    fn test_configuration_after_shutdown_is_inactive() {
        let (logging, _memory) = memory_logging(Severity::Info);
        logging.shutdown();
        assert!(matches!(
            logging.add_sink(MemorySink::new(), None),
            Err(LoggingError::Inactive)
        ));
        assert!(matches!(logging.set_level(Severity::Debug), Err(LoggingError::Inactive)));
        assert!(matches!(logging.flush(), Err(LoggingError::Inactive)));
        assert_eq!(logging.state(), RegistryState::Terminated);
    }

    #[test]
    fn test_flush_reports_failures() {
        struct FailingFlush;
        impl Sink for FailingFlush {
            fn name(&self) -> &str {
                "failing-flush"
            }
            fn write(&mut self, _record: &Record<'_>) -> crate::sinks::SinkResult<()> {
                Ok(())
            }
            fn flush(&mut self) -> crate::sinks::SinkResult<()> {
                Err(SinkError::callback("disk gone"))
            }
        }

        let logging = Logging::init(LoggingConfig::default().with_sinks(vec![])).unwrap();
        logging.add_sink(FailingFlush, None).unwrap();
        match logging.flush() {
            Err(LoggingError::SinkFailures { count, last }) => {
                assert_eq!(count, 1);
                assert!(last.contains("disk gone"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(logging.failure_report().total_failures, 1);
    }

    #[test]
    fn test_rotate_reaches_file_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let logging = Logging::init(
            LoggingConfig::default().with_sinks(vec![SinkConfig::file(&path), SinkConfig::memory()]),
        )
        .unwrap();
        logging.root().info("before");
        logging.rotate().unwrap();
        logging.root().info("after");
        logging.shutdown();

        let mut backup = path.as_os_str().to_owned();
        backup.push(".1");
        assert!(std::fs::read_to_string(backup).unwrap().contains("before"));
        assert!(!std::fs::read_to_string(&path).unwrap().contains("before"));
        assert!(matches!(logging.rotate(), Err(LoggingError::Inactive)));
    }

    #[test]
    fn test_replay_keeps_timestamp() {
        let (logging, memory) = memory_logging(Severity::Info);
        let mut attrs = Attributes::new();
        attrs.insert("code".to_string(), crate::types::AttrValue::Int(7));
        let original = Record::new(Severity::Error, "remote", "from afar", attrs).to_owned_record();
        let earlier = original.timestamp - chrono::Duration::seconds(30);
        let sent = OwnedRecord {
            timestamp: earlier,
            ..original
        };

        let outcome = logging.replay(sent.clone()).unwrap();
        assert_eq!(outcome.delivered, 1);
        assert_eq!(memory.records(), vec![sent.clone()]);

        let quiet = OwnedRecord {
            severity: Severity::Debug,
            ..sent.clone()
        };
        assert!(logging.replay(quiet).unwrap().is_discarded());
        logging.shutdown();
        assert!(matches!(logging.replay(sent), Err(LoggingError::Inactive)));
    }

    #[test]
    fn test_last_handle_drop_closes_sinks() {
        let closes = Arc::new(AtomicUsize::new(0));
        struct Closing(Arc<AtomicUsize>);
        impl Sink for Closing {
            fn name(&self) -> &str {
                "closing"
            }
            fn write(&mut self, _record: &Record<'_>) -> crate::sinks::SinkResult<()> {
                Ok(())
            }
            fn close(&mut self) -> crate::sinks::SinkResult<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let logging = Logging::init(LoggingConfig::default().with_sinks(vec![])).unwrap();
        logging.add_sink(Closing(Arc::clone(&closes)), None).unwrap();
        let logger = logging.get_logger("held");
        drop(logging);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        drop(logger);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_on_sink_error() {
        let logging = Logging::init(LoggingConfig::default().with_sinks(vec![])).unwrap();
        logging
            .add_sink(
                CallbackSink::new("refuses", |_| Err(SinkError::callback("no"))),
                None,
            )
            .unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        logging.on_sink_error(move |_, name, _| {
            assert_eq!(name, "refuses");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        logging.root().info("a");
        logging.root().info("b");
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_sink_error_callback_may_log() {
        let logging = Logging::init(
            LoggingConfig::default().with_sinks(vec![SinkConfig::memory()]),
        )
        .unwrap();
        let memory = logging.memory_sinks().remove(0);
        logging
            .add_sink(
                CallbackSink::new("refuses", |_| Err(SinkError::callback("no"))),
                None,
            )
            .unwrap();
        let reporter = logging.get_logger("diagnostics");
        logging.on_sink_error(move |_, name, error| {
            reporter.warn(format!("{} failed: {}", name, error));
        });

        logging.root().info("a");
        // The callback's own record fails on "refuses" too; it is counted
        // but not fed back into the callback
        let messages: Vec<_> = memory.records().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["a", "refuses failed: Callback error: no"]);
        assert_eq!(logging.failure_report().total_failures, 2);
    }
}
