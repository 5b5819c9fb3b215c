//! Python bindings for Polylog via PyO3

use pyo3::prelude::*;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use std::collections::HashMap;

use polylog_core::{
    AttrValue, Attributes, LoggingConfig, LoggingError, Registry, Severity, SinkConfig, SinkId,
    FailureReport as CoreFailureReport,
    Logger as CoreLogger,
    Logging as CoreLogging,
    SinkReport as CoreSinkReport,
};

// ============================================================================
// Marshalling
// ============================================================================

/// Attribute value as passed from Python
///
/// `bool` is tried first since Python booleans are also ints.
#[derive(FromPyObject)]
enum PyAttr {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<PyAttr> for AttrValue {
    fn from(value: PyAttr) -> Self {
        match value {
            PyAttr::Bool(b) => AttrValue::Bool(b),
            PyAttr::Int(i) => AttrValue::Int(i),
            PyAttr::Float(f) => AttrValue::Float(f),
            PyAttr::Str(s) => AttrValue::Str(s),
        }
    }
}

/// Level as passed from Python: a name (`"warning"`) or a rank (`3`)
#[derive(FromPyObject)]
enum PyLevel {
    Rank(u8),
    Name(String),
}

fn parse_level(level: PyLevel) -> PyResult<Severity> {
    match level {
        PyLevel::Rank(rank) => Severity::try_from(rank),
        PyLevel::Name(name) => name.parse(),
    }
    .map_err(|e| PyValueError::new_err(e.to_string()))
}

fn to_attrs(attrs: Option<HashMap<String, PyAttr>>) -> Attributes {
    attrs
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, value.into()))
        .collect()
}

fn to_py_error(e: LoggingError) -> PyErr {
    match e {
        LoggingError::Config(e) => PyValueError::new_err(e.to_string()),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

// ============================================================================
// Failure Report
// ============================================================================

#[pyclass]
#[derive(Clone)]
pub struct SinkReport {
    #[pyo3(get)]
    pub id: u64,
    #[pyo3(get)]
    pub name: String,
    #[pyo3(get)]
    pub threshold: String,
    #[pyo3(get)]
    pub writes: u64,
    #[pyo3(get)]
    pub failures: u64,
    #[pyo3(get)]
    pub last_error: Option<String>,
}

#[pymethods]
impl SinkReport {
    fn __repr__(&self) -> String {
        format!("SinkReport(id={}, name='{}', writes={}, failures={})",
                self.id, self.name, self.writes, self.failures)
    }
}

impl From<CoreSinkReport> for SinkReport {
    fn from(report: CoreSinkReport) -> Self {
        Self {
            id: report.id.0,
            name: report.name,
            threshold: report.threshold.to_string(),
            writes: report.writes,
            failures: report.failures,
            last_error: report.last_error,
        }
    }
}

#[pyclass]
#[derive(Clone)]
pub struct FailureReport {
    #[pyo3(get)]
    pub total_failures: u64,
    #[pyo3(get)]
    pub dropped_inactive: u64,
    #[pyo3(get)]
    pub sinks: Vec<SinkReport>,
}

#[pymethods]
impl FailureReport {
    fn __repr__(&self) -> String {
        format!("FailureReport(total_failures={}, dropped_inactive={}, sinks={})",
                self.total_failures, self.dropped_inactive, self.sinks.len())
    }
}

impl From<CoreFailureReport> for FailureReport {
    fn from(report: CoreFailureReport) -> Self {
        Self {
            total_failures: report.total_failures,
            dropped_inactive: report.dropped_inactive,
            sinks: report.sinks.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Logger
// ============================================================================

#[pyclass]
pub struct Logger {
    inner: CoreLogger,
}

#[pymethods]
impl Logger {
    #[getter]
    pub fn name(&self) -> String { self.inner.name().to_string() }

    pub fn enabled(&self, level: PyLevel) -> PyResult<bool> {
        Ok(self.inner.enabled(parse_level(level)?))
    }

    #[pyo3(signature = (level, message, attrs=None))]
    pub fn log(&self, level: PyLevel, message: String, attrs: Option<HashMap<String, PyAttr>>) -> PyResult<()> {
        self.inner.log(parse_level(level)?, message, to_attrs(attrs));
        Ok(())
    }

    #[pyo3(signature = (message, attrs=None))]
    pub fn trace(&self, message: String, attrs: Option<HashMap<String, PyAttr>>) {
        self.inner.trace_with(message, to_attrs(attrs));
    }

    #[pyo3(signature = (message, attrs=None))]
    pub fn debug(&self, message: String, attrs: Option<HashMap<String, PyAttr>>) {
        self.inner.debug_with(message, to_attrs(attrs));
    }

    #[pyo3(signature = (message, attrs=None))]
    pub fn info(&self, message: String, attrs: Option<HashMap<String, PyAttr>>) {
        self.inner.info_with(message, to_attrs(attrs));
    }

    #[pyo3(signature = (message, attrs=None))]
    pub fn warning(&self, message: String, attrs: Option<HashMap<String, PyAttr>>) {
        self.inner.warn_with(message, to_attrs(attrs));
    }

    #[pyo3(signature = (message, attrs=None))]
    pub fn error(&self, message: String, attrs: Option<HashMap<String, PyAttr>>) {
        self.inner.error_with(message, to_attrs(attrs));
    }

    #[pyo3(signature = (message, attrs=None))]
    pub fn critical(&self, message: String, attrs: Option<HashMap<String, PyAttr>>) {
        self.inner.fatal_with(message, to_attrs(attrs));
    }

    /// Like `log`, but raises when a sink failed or logging is shut down
    #[pyo3(signature = (level, message, attrs=None))]
    pub fn try_log(&self, level: PyLevel, message: String, attrs: Option<HashMap<String, PyAttr>>) -> PyResult<usize> {
        self.inner
            .try_log(parse_level(level)?, message, to_attrs(attrs))
            .map(|outcome| outcome.delivered)
            .map_err(to_py_error)
    }

    fn __repr__(&self) -> String { format!("Logger(name='{}')", self.inner.name()) }
}

// ============================================================================
// Logging
// ============================================================================

#[pyclass]
pub struct Logging {
    inner: CoreLogging,
}

#[pymethods]
impl Logging {
    pub fn root(&self) -> Logger {
        Logger { inner: self.inner.root() }
    }

    pub fn get_logger(&self, name: &str) -> Logger {
        Logger { inner: self.inner.get_logger(name) }
    }

    pub fn set_level(&self, level: PyLevel) -> PyResult<()> {
        self.inner.set_level(parse_level(level)?).map_err(to_py_error)
    }

    /// Add a sink from a JSON or YAML definition; returns its id
    pub fn add_sink(&self, definition: &str) -> PyResult<u64> {
        let sink = SinkConfig::parse(definition).map_err(|e| PyValueError::new_err(e.to_string()))?;
        self.inner
            .add_sink_config(&sink)
            .map(|id| id.0)
            .map_err(to_py_error)
    }

    pub fn remove_sink(&self, id: u64) -> PyResult<()> {
        self.inner.remove_sink(SinkId(id)).map_err(to_py_error)
    }

    #[pyo3(signature = (id, level=None))]
    pub fn set_sink_level(&self, id: u64, level: Option<PyLevel>) -> PyResult<()> {
        let level = level.map(parse_level).transpose()?;
        self.inner.set_sink_level(SinkId(id), level).map_err(to_py_error)
    }

    pub fn flush(&self, py: Python<'_>) -> PyResult<()> {
        // Network sinks may wait for their queue to drain
        py.allow_threads(|| self.inner.flush()).map_err(to_py_error)
    }

    /// Rotate file sinks now
    pub fn rotate(&self, py: Python<'_>) -> PyResult<()> {
        py.allow_threads(|| self.inner.rotate()).map_err(to_py_error)
    }

    pub fn shutdown(&self, py: Python<'_>) {
        py.allow_threads(|| self.inner.shutdown());
    }

    pub fn failure_report(&self) -> FailureReport {
        self.inner.failure_report().into()
    }

    /// Lines captured by memory sinks, in sink order
    pub fn memory_lines(&self) -> Vec<String> {
        self.inner
            .memory_sinks()
            .iter()
            .flat_map(|sink| sink.lines())
            .collect()
    }

    #[getter]
    pub fn is_active(&self) -> bool { self.inner.is_active() }

    #[getter]
    pub fn state(&self) -> String { self.inner.state().to_string() }

    fn __repr__(&self) -> String {
        format!("Logging(context='{}', state='{}')", self.inner.config().context, self.inner.state())
    }
}

// ============================================================================
// Module Functions
// ============================================================================

/// Initialize logging from a JSON or YAML config string (the user-level file when omitted)
#[pyfunction]
#[pyo3(signature = (config=None))]
fn init(config: Option<&str>) -> PyResult<Logging> {
    let config = match config {
        Some(content) => LoggingConfig::parse(content),
        None => LoggingConfig::load_user(),
    }
    .map_err(|e| PyValueError::new_err(e.to_string()))?;
    let inner = Registry::global().init(config).map_err(to_py_error)?;
    Ok(Logging { inner })
}

/// Logger from the active core (a no-op logger before init)
#[pyfunction]
fn get_logger(name: &str) -> Logger {
    Logger { inner: Registry::global().get_logger(name) }
}

/// Shut down the active core; returns whether one was active
#[pyfunction]
fn shutdown(py: Python<'_>) -> bool {
    py.allow_threads(|| Registry::global().shutdown())
}

#[pyfunction]
fn registry_state() -> String {
    Registry::global().state().to_string()
}

// ============================================================================
// Module Definition
// ============================================================================

#[pymodule]
fn polylog(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<Logging>()?;
    m.add_class::<Logger>()?;
    m.add_class::<FailureReport>()?;
    m.add_class::<SinkReport>()?;

    // Functions
    m.add_function(wrap_pyfunction!(init, m)?)?;
    m.add_function(wrap_pyfunction!(get_logger, m)?)?;
    m.add_function(wrap_pyfunction!(shutdown, m)?)?;
    m.add_function(wrap_pyfunction!(registry_state, m)?)?;

    // Level names
    let levels: Vec<String> = Severity::ALL.iter().map(|s| s.to_string()).collect();
    m.add("LEVELS", levels)?;

    Ok(())
}
