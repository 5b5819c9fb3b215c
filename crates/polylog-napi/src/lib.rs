//! Node.js bindings for Polylog via napi-rs

#![deny(clippy::all)]

use napi::bindgen_prelude::*;
use napi_derive::napi;
use std::collections::HashMap;

use polylog_core::{
    AttrValue, Attributes, LoggingConfig, Registry, Severity, SinkConfig, SinkId,
    FailureReport as CoreFailureReport,
    Logger as CoreLogger,
    Logging as CoreLogging,
    SinkReport as CoreSinkReport,
};

// ============================================================================
// Marshalling
// ============================================================================

/// Level as passed from JavaScript: a name (`"warn"`) or a rank (`3`)
type JsLevel = Either<String, u32>;

/// Flat attribute map: `{ code: 7, host: "db-1", retry: true }`
type JsAttrs = HashMap<String, Either3<String, f64, bool>>;

fn to_napi_error(e: impl ToString) -> Error {
    Error::from_reason(e.to_string())
}

fn parse_level(level: JsLevel) -> Result<Severity> {
    match level {
        Either::A(name) => name.parse().map_err(to_napi_error),
        Either::B(rank) => u8::try_from(rank)
            .map_err(to_napi_error)
            .and_then(|rank| Severity::try_from(rank).map_err(to_napi_error)),
    }
}

fn to_attrs(attrs: Option<JsAttrs>) -> Attributes {
    attrs
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Either3::A(s) => AttrValue::Str(s),
                // Integral JS numbers become Int
                Either3::B(n) => AttrValue::from_number(n),
                Either3::C(b) => AttrValue::Bool(b),
            };
            (key, value)
        })
        .collect()
}

fn parse_config(config: Option<String>) -> Result<LoggingConfig> {
    let config = match config {
        Some(content) => LoggingConfig::parse(&content),
        None => LoggingConfig::load_user(),
    };
    config.map_err(to_napi_error)
}

// ============================================================================
// Failure Report
// ============================================================================

#[napi(object)]
pub struct SinkReport {
    pub id: i64,
    pub name: String,
    pub threshold: String,
    pub writes: i64,
    pub failures: i64,
    pub last_error: Option<String>,
}

impl From<CoreSinkReport> for SinkReport {
    fn from(report: CoreSinkReport) -> Self {
        Self {
            id: report.id.0 as i64,
            name: report.name,
            threshold: report.threshold.to_string(),
            writes: report.writes as i64,
            failures: report.failures as i64,
            last_error: report.last_error,
        }
    }
}

#[napi(object)]
pub struct FailureReport {
    pub total_failures: i64,
    pub dropped_inactive: i64,
    pub sinks: Vec<SinkReport>,
}

impl From<CoreFailureReport> for FailureReport {
    fn from(report: CoreFailureReport) -> Self {
        Self {
            total_failures: report.total_failures as i64,
            dropped_inactive: report.dropped_inactive as i64,
            sinks: report.sinks.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Logger
// ============================================================================

/// Logger bound to one context name
#[napi]
pub struct Logger {
    inner: CoreLogger,
}

#[napi]
impl Logger {
    #[napi(getter)]
    pub fn name(&self) -> String { self.inner.name().to_string() }

    #[napi]
    pub fn enabled(&self, level: JsLevel) -> Result<bool> {
        Ok(self.inner.enabled(parse_level(level)?))
    }

    #[napi]
    pub fn log(&self, level: JsLevel, message: String, attrs: Option<JsAttrs>) -> Result<()> {
        self.inner.log(parse_level(level)?, message, to_attrs(attrs));
        Ok(())
    }

    #[napi]
    pub fn trace(&self, message: String, attrs: Option<JsAttrs>) {
        self.inner.trace_with(message, to_attrs(attrs));
    }

    #[napi]
    pub fn debug(&self, message: String, attrs: Option<JsAttrs>) {
        self.inner.debug_with(message, to_attrs(attrs));
    }

    #[napi]
    pub fn info(&self, message: String, attrs: Option<JsAttrs>) {
        self.inner.info_with(message, to_attrs(attrs));
    }

    #[napi]
    pub fn warn(&self, message: String, attrs: Option<JsAttrs>) {
        self.inner.warn_with(message, to_attrs(attrs));
    }

    #[napi]
    pub fn error(&self, message: String, attrs: Option<JsAttrs>) {
        self.inner.error_with(message, to_attrs(attrs));
    }

    #[napi]
    pub fn fatal(&self, message: String, attrs: Option<JsAttrs>) {
        self.inner.fatal_with(message, to_attrs(attrs));
    }

    /// Like `log`, but throws when a sink failed or logging is shut down
    #[napi]
    pub fn try_log(&self, level: JsLevel, message: String, attrs: Option<JsAttrs>) -> Result<u32> {
        let outcome = self
            .inner
            .try_log(parse_level(level)?, message, to_attrs(attrs))
            .map_err(to_napi_error)?;
        Ok(outcome.delivered as u32)
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Handle to the module's logging core
#[napi]
pub struct Logging {
    inner: CoreLogging,
}

#[napi]
impl Logging {
    /// Initialize from a JSON or YAML config string (the user-level file when omitted)
    #[napi(factory)]
    pub fn init(config: Option<String>) -> Result<Self> {
        let config = parse_config(config)?;
        let inner = Registry::global().init(config).map_err(to_napi_error)?;
        Ok(Self { inner })
    }

    #[napi]
    pub fn root(&self) -> Logger {
        Logger { inner: self.inner.root() }
    }

    #[napi]
    pub fn get_logger(&self, name: String) -> Logger {
        Logger { inner: self.inner.get_logger(name) }
    }

    /// Log through the root context
    #[napi]
    pub fn log(&self, level: JsLevel, message: String, attrs: Option<JsAttrs>) -> Result<()> {
        self.inner.log(parse_level(level)?, message, to_attrs(attrs));
        Ok(())
    }

    #[napi]
    pub fn set_level(&self, level: JsLevel) -> Result<()> {
        self.inner.set_level(parse_level(level)?).map_err(to_napi_error)
    }

    /// Add a sink from a JSON definition, e.g. `{"type": "file", "path": "app.log"}`
    #[napi]
    pub fn add_sink(&self, definition: String) -> Result<i64> {
        let sink = SinkConfig::parse(&definition).map_err(to_napi_error)?;
        let id = self.inner.add_sink_config(&sink).map_err(to_napi_error)?;
        Ok(id.0 as i64)
    }

    #[napi]
    pub fn remove_sink(&self, id: i64) -> Result<()> {
        self.inner.remove_sink(SinkId(id as u64)).map_err(to_napi_error)
    }

    #[napi]
    pub fn set_sink_level(&self, id: i64, level: Option<JsLevel>) -> Result<()> {
        let level = level.map(parse_level).transpose()?;
        self.inner
            .set_sink_level(SinkId(id as u64), level)
            .map_err(to_napi_error)
    }

    #[napi]
    pub fn flush(&self) -> Result<()> {
        self.inner.flush().map_err(to_napi_error)
    }

    /// Rotate file sinks now
    #[napi]
    pub fn rotate(&self) -> Result<()> {
        self.inner.rotate().map_err(to_napi_error)
    }

    #[napi]
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    #[napi]
    pub fn failure_report(&self) -> FailureReport {
        self.inner.failure_report().into()
    }

    /// Lines captured by memory sinks, in sink order
    #[napi]
    pub fn memory_lines(&self) -> Vec<String> {
        self.inner
            .memory_sinks()
            .iter()
            .flat_map(|sink| sink.lines())
            .collect()
    }

    #[napi(getter)]
    pub fn is_active(&self) -> bool { self.inner.is_active() }

    #[napi(getter)]
    pub fn state(&self) -> String { self.inner.state().to_string() }
}

// ============================================================================
// Module Functions
// ============================================================================

/// Initialize the module's logging core
#[napi]
pub fn init(config: Option<String>) -> Result<Logging> {
    Logging::init(config)
}

/// Logger from the active core (a no-op logger before init)
#[napi]
pub fn get_logger(name: String) -> Logger {
    Logger { inner: Registry::global().get_logger(name) }
}

/// Shut down the active core; returns whether one was active
#[napi]
pub fn shutdown() -> bool {
    Registry::global().shutdown()
}

#[napi]
pub fn registry_state() -> String {
    Registry::global().state().to_string()
}

#[napi]
pub fn levels() -> Vec<String> {
    Severity::ALL.iter().map(|s| s.to_string()).collect()
}
