//! End-to-end behavior through the public API

use std::io::Write;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use polylog_core::sinks::parse_line;
use polylog_core::{
    attrs, log_debug, AttrValue, Attributes, CallbackSink, FlushPolicy, LoggingConfig,
    LoggingError, MemorySink, NetworkOptions, NetworkSink, Record, Registry, RegistryState, ReinitPolicy, Severity, Sink,
    SinkConfig, SinkError, SinkResult, StreamSink,
};

fn memory_only(level: Severity) -> LoggingConfig {
    LoggingConfig::default()
        .with_level(level)
        .with_sinks(vec![SinkConfig::memory()])
}

/// Byte stream shared between the sink and the test
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

struct CloseCounter(Arc<AtomicUsize>);

impl Sink for CloseCounter {
    fn name(&self) -> &str {
        "close-counter"
    }

    fn write(&mut self, _record: &Record<'_>) -> SinkResult<()> {
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_end_to_end_info_threshold() {
    let registry = Registry::new();
    let logging = registry.init(memory_only(Severity::Info)).unwrap();
    let memory = logging.memory_sinks().remove(0);
    let logger = registry.get_logger("x");
    let writes = || logging.failure_report().sink_named("memory").unwrap().writes;

    logger.debug("x");
    assert_eq!(writes(), 0);
    assert!(memory.is_empty());

    logger.info("y");
    assert_eq!(writes(), 1);
    assert!(memory.lines()[0].ends_with("[INFO] [x] y"));

    logger.error_with("z", attrs! { "code" => 7 });
    assert_eq!(writes(), 2);
    let lines = memory.lines();
    assert!(lines[1].contains("[ERROR]"));
    assert!(lines[1].contains("] z"));
    assert!(lines[1].contains("code=7"));

    let record = &memory.records()[1];
    assert_eq!(record.severity, Severity::Error);
    assert_eq!(record.message, "z");
    assert_eq!(record.attrs.get("code"), Some(&AttrValue::Int(7)));
    assert_eq!(logging.failure_report().total_failures, 0);
}

#[test]
fn test_undeliverable_network_records_counted_each() {
    // Bind then drop to get a local port nobody listens on
    let address = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let options = NetworkOptions {
        connect_timeout: Duration::from_millis(200),
        ..NetworkOptions::default()
    };
    let registry = Registry::new();
    let logging = registry.init(LoggingConfig::default().with_sinks(vec![])).unwrap();
    let id = logging
        .add_sink(NetworkSink::connect(address, options).unwrap(), None)
        .unwrap();

    let logger = logging.get_logger("net");
    for n in 0..5 {
        logger.error(format!("lost {}", n));
    }

    // The worker fails in the background; no flush needed to see it
    let deadline = Instant::now() + Duration::from_secs(10);
    let report = loop {
        let report = logging.failure_report();
        if report.sink(id).unwrap().failures >= 5 || Instant::now() > deadline {
            break report;
        }
        thread::sleep(Duration::from_millis(20));
    };
    let sink = report.sink(id).unwrap();
    assert_eq!(sink.writes, 5);
    assert_eq!(sink.failures, 5);
    assert!(sink.last_error.is_some());
    assert_eq!(report.total_failures, 5);

    // Counted records are not counted again by flush or shutdown
    logging.flush().unwrap();
    registry.shutdown();
    assert_eq!(logging.failure_report().total_failures, 5);
}

#[test]
fn test_threshold_ordering_for_every_pair() {
    for threshold in Severity::ALL {
        let registry = Registry::new();
        let logging = registry.init(memory_only(threshold)).unwrap();
        let memory = logging.memory_sinks().remove(0);
        let logger = logging.get_logger("order");

        for severity in Severity::ALL {
            logger.log(severity, severity.as_str(), Attributes::new());
        }

        let kept: Vec<Severity> = memory.records().iter().map(|r| r.severity).collect();
        let expected: Vec<Severity> = Severity::ALL
            .into_iter()
            .filter(|s| *s >= threshold)
            .collect();
        assert_eq!(kept, expected, "threshold {}", threshold);
    }
}

#[test]
fn test_sinks_receive_in_registration_order() {
    let registry = Registry::new();
    let logging = registry.init(LoggingConfig::default().with_sinks(vec![])).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));
    for name in ["A", "B", "C"] {
        let order = Arc::clone(&order);
        logging
            .add_sink(
                CallbackSink::new(name, move |_| {
                    order.lock().push(name);
                    Ok(())
                }),
                None,
            )
            .unwrap();
    }

    logging.root().info("one");
    logging.root().warn("two");
    assert_eq!(*order.lock(), vec!["A", "B", "C", "A", "B", "C"]);
}

#[test]
fn test_failing_sink_counted_once_others_unaffected() {
    let registry = Registry::new();
    let logging = registry.init(memory_only(Severity::Info)).unwrap();
    let memory = logging.memory_sinks().remove(0);
    let bad = logging
        .add_sink(
            CallbackSink::new("always-fails", |_| Err(SinkError::callback("down"))),
            None,
        )
        .unwrap();

    logging.get_logger("iso").error("only once");

    assert_eq!(memory.len(), 1);
    let report = logging.failure_report();
    assert_eq!(report.total_failures, 1);
    assert_eq!(report.sink(bad).unwrap().failures, 1);
    assert_eq!(report.sink(bad).unwrap().last_error.as_deref(), Some("Callback error: down"));
    assert_eq!(report.sink_named("memory").unwrap().writes, 1);
}

#[test]
fn test_below_threshold_touches_nothing() {
    let registry = Registry::new();
    let logging = registry.init(LoggingConfig::default().with_sinks(vec![])).unwrap();
    let writes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&writes);
    logging
        .add_sink(
            CallbackSink::new("counting", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            Some(Severity::Error),
        )
        .unwrap();

    let formats = AtomicUsize::new(0);
    let logger = logging.get_logger("quiet");
    logger.log_lazy(
        Severity::Warn,
        || {
            formats.fetch_add(1, Ordering::SeqCst);
            "never built".to_string()
        },
        Attributes::new(),
    );
    log_debug!(logger, "{}", {
        formats.fetch_add(1, Ordering::SeqCst);
        "never built either"
    });

    assert_eq!(writes.load(Ordering::SeqCst), 0);
    assert_eq!(formats.load(Ordering::SeqCst), 0);
}

#[test]
fn test_shutdown_is_idempotent() {
    let registry = Registry::new();
    let logging = registry.init(LoggingConfig::default().with_sinks(vec![])).unwrap();
    let closes = Arc::new(AtomicUsize::new(0));
    logging.add_sink(CloseCounter(Arc::clone(&closes)), None).unwrap();
    let logger = logging.get_logger("bye");

    assert!(registry.shutdown());
    logging.shutdown();
    assert!(!registry.shutdown());
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    logger.info("after");
    logger.fatal("after");
    assert_eq!(logging.failure_report().dropped_inactive, 2);
    assert_eq!(registry.state(), RegistryState::Terminated);
}

#[test]
fn test_reinit_follows_policy() {
    let registry = Registry::new();
    let first = registry.init(memory_only(Severity::Info)).unwrap();

    assert!(matches!(
        registry.init(memory_only(Severity::Debug)),
        Err(LoggingError::AlreadyInitialized)
    ));

    let reused = registry
        .init(memory_only(Severity::Debug).with_reinit(ReinitPolicy::Reuse))
        .unwrap();
    assert!(registry.holds(&reused));
    assert!(registry.holds(&first));
    assert_eq!(reused.level(), Some(Severity::Info));

    registry.shutdown();
    let fresh = registry.init(memory_only(Severity::Debug)).unwrap();
    assert!(!registry.holds(&first));
    assert_eq!(fresh.level(), Some(Severity::Debug));
}

#[test]
fn test_stream_line_round_trip() {
    let buffer = SharedBuffer::default();
    let registry = Registry::new();
    let logging = registry.init(LoggingConfig::default().with_sinks(vec![])).unwrap();
    logging
        .add_sink(StreamSink::new("buffer", buffer.clone(), FlushPolicy::Immediate), None)
        .unwrap();

    let message = "multi\nline ] with {braces} and \\ slashes";
    let attributes = attrs! {
        "text" => "quote \" inside",
        "count" => -3,
        "ratio" => 0.25,
        "ok" => false,
        "odd key" => "v",
    };
    logging
        .get_logger("svc[edge]")
        .warn_with(message, attributes.clone());

    let contents = buffer.contents();
    assert_eq!(contents.lines().count(), 1);
    let parsed = parse_line(contents.trim_end_matches('\n')).unwrap();
    assert_eq!(parsed.severity, Severity::Warn);
    assert_eq!(parsed.context, "svc[edge]");
    assert_eq!(parsed.message, message);
    assert_eq!(parsed.attrs, attributes);
}

#[test]
fn test_configuration_calls_after_shutdown() {
    let registry = Registry::new();
    let logging = registry.init(memory_only(Severity::Info)).unwrap();
    logging.shutdown();

    assert!(matches!(
        logging.add_sink(MemorySink::new(), None),
        Err(LoggingError::Inactive)
    ));
    assert!(matches!(
        logging.add_sink_config(&SinkConfig::memory()),
        Err(LoggingError::Inactive)
    ));
}

#[test]
fn test_concurrent_loggers() {
    let registry = Registry::new();
    let logging = registry.init(memory_only(Severity::Info)).unwrap();
    let memory = logging.memory_sinks().remove(0);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let logger = logging.get_logger(format!("thread-{}", t));
            std::thread::spawn(move || {
                for i in 0..50 {
                    logger.info_with("tick", attrs! { "i" => i });
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(memory.len(), 200);
    assert_eq!(logging.failure_report().total_failures, 0);
}
