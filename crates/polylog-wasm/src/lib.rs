//! Browser bindings for Polylog via wasm-bindgen
//!
//! Console sinks are routed to the browser console (`console.debug`,
//! `console.info`, `console.warn`, `console.error`) when compiled for wasm32.

use std::collections::HashMap;

use serde::Deserialize;
use wasm_bindgen::prelude::*;

use polylog_core::sinks::render_line;
use polylog_core::{
    AttrValue, Attributes, CallbackSink, LoggingConfig, LoggingError, Registry, Severity, SinkConfig, SinkId,
    Logger as CoreLogger,
    Logging as CoreLogging,
};

// Console bindings
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console, js_name = debug)]
    fn console_debug(s: &str);

    #[wasm_bindgen(js_namespace = console, js_name = info)]
    fn console_info(s: &str);

    #[wasm_bindgen(js_namespace = console, js_name = warn)]
    fn console_warn(s: &str);

    #[wasm_bindgen(js_namespace = console, js_name = error)]
    fn console_error(s: &str);
}

/// Attribute value as it arrives from JavaScript
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HostValue {
    Bool(bool),
    Number(f64),
    Str(String),
}

impl From<HostValue> for AttrValue {
    fn from(value: HostValue) -> Self {
        match value {
            HostValue::Bool(b) => AttrValue::Bool(b),
            // Integral JS numbers become Int
            HostValue::Number(n) => AttrValue::from_number(n),
            HostValue::Str(s) => AttrValue::Str(s),
        }
    }
}

fn to_js_error(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

fn to_attrs(attrs: JsValue) -> Result<Attributes, JsError> {
    if attrs.is_undefined() || attrs.is_null() {
        return Ok(Attributes::new());
    }
    let map: HashMap<String, HostValue> = serde_wasm_bindgen::from_value(attrs).map_err(to_js_error)?;
    Ok(map.into_iter().map(|(k, v)| (k, v.into())).collect())
}

fn parse_level(level: JsValue) -> Result<Severity, JsError> {
    serde_wasm_bindgen::from_value(level).map_err(to_js_error)
}

/// Accepts a JSON/YAML string, a plain object, or nothing
fn parse_config(config: JsValue) -> Result<LoggingConfig, JsError> {
    if config.is_undefined() || config.is_null() {
        return Ok(LoggingConfig::default());
    }
    if let Some(content) = config.as_string() {
        return LoggingConfig::parse(&content).map_err(to_js_error);
    }
    let config: LoggingConfig = serde_wasm_bindgen::from_value(config).map_err(to_js_error)?;
    config.validate().map_err(to_js_error)?;
    Ok(config)
}

/// Pull console sinks out of the config; their levels are returned so the
/// browser console can take their place
fn split_console(mut config: LoggingConfig) -> (LoggingConfig, Vec<Option<Severity>>) {
    let mut levels = Vec::new();
    config.sinks.retain(|sink| match sink {
        SinkConfig::Console { level, .. } => {
            levels.push(*level);
            false
        }
        _ => true,
    });
    (config, levels)
}

fn browser_console() -> CallbackSink {
    CallbackSink::new("console", |record| {
        let line = render_line(record);
        match record.severity() {
            Severity::Trace | Severity::Debug => console_debug(&line),
            Severity::Info => console_info(&line),
            Severity::Warn => console_warn(&line),
            Severity::Error | Severity::Fatal => console_error(&line),
        }
        Ok(())
    })
}

fn init_core(config: LoggingConfig) -> Result<CoreLogging, JsError> {
    if !cfg!(target_arch = "wasm32") {
        return Registry::global().init(config).map_err(to_js_error);
    }
    let (config, console_levels) = split_console(config);
    let previous = Registry::global().current();
    let logging = Registry::global().init(config).map_err(to_js_error)?;
    attach_consoles(previous.as_ref(), &logging, console_levels, browser_console)
        .map_err(to_js_error)?;
    Ok(logging)
}

/// Add one console sink per level, unless init handed back the instance
/// that was already running (it has its consoles)
fn attach_consoles(
    previous: Option<&CoreLogging>,
    logging: &CoreLogging,
    levels: Vec<Option<Severity>>,
    console: impl Fn() -> CallbackSink,
) -> Result<(), LoggingError> {
    if previous.is_some_and(|previous| previous.ptr_eq(logging)) {
        return Ok(());
    }
    for level in levels {
        logging.add_sink(console(), level)?;
    }
    Ok(())
}

#[wasm_bindgen]
pub struct Logger(CoreLogger);

#[wasm_bindgen]
impl Logger {
    #[wasm_bindgen(getter)]
    pub fn name(&self) -> String {
        self.0.name().to_string()
    }

    pub fn enabled(&self, level: JsValue) -> Result<bool, JsError> {
        Ok(self.0.enabled(parse_level(level)?))
    }

    pub fn log(&self, level: JsValue, message: String, attrs: JsValue) -> Result<(), JsError> {
        self.0.log(parse_level(level)?, message, to_attrs(attrs)?);
        Ok(())
    }

    // Logging calls

    pub fn trace(&self, message: String, attrs: JsValue) -> Result<(), JsError> {
        self.0.trace_with(message, to_attrs(attrs)?);
        Ok(())
    }

    pub fn debug(&self, message: String, attrs: JsValue) -> Result<(), JsError> {
        self.0.debug_with(message, to_attrs(attrs)?);
        Ok(())
    }

    pub fn info(&self, message: String, attrs: JsValue) -> Result<(), JsError> {
        self.0.info_with(message, to_attrs(attrs)?);
        Ok(())
    }

    pub fn warn(&self, message: String, attrs: JsValue) -> Result<(), JsError> {
        self.0.warn_with(message, to_attrs(attrs)?);
        Ok(())
    }

    pub fn error(&self, message: String, attrs: JsValue) -> Result<(), JsError> {
        self.0.error_with(message, to_attrs(attrs)?);
        Ok(())
    }

    pub fn fatal(&self, message: String, attrs: JsValue) -> Result<(), JsError> {
        self.0.fatal_with(message, to_attrs(attrs)?);
        Ok(())
    }
}

#[wasm_bindgen]
pub struct Logging(CoreLogging);

#[wasm_bindgen]
impl Logging {
    /// Initialize the module's logging core
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<Logging, JsError> {
        Ok(Logging(init_core(parse_config(config)?)?))
    }

    pub fn root(&self) -> Logger {
        Logger(self.0.root())
    }

    #[wasm_bindgen(js_name = getLogger)]
    pub fn get_logger(&self, name: String) -> Logger {
        Logger(self.0.get_logger(name))
    }

    #[wasm_bindgen(js_name = setLevel)]
    pub fn set_level(&self, level: JsValue) -> Result<(), JsError> {
        self.0.set_level(parse_level(level)?).map_err(to_js_error)
    }

    /// Add a sink from a definition object or string; returns its id
    #[wasm_bindgen(js_name = addSink)]
    pub fn add_sink(&self, definition: JsValue) -> Result<u32, JsError> {
        let sink = match definition.as_string() {
            Some(content) => SinkConfig::parse(&content).map_err(to_js_error)?,
            None => serde_wasm_bindgen::from_value(definition).map_err(to_js_error)?,
        };
        let id = match (&sink, cfg!(target_arch = "wasm32")) {
            (SinkConfig::Console { level, .. }, true) => self.0.add_sink(browser_console(), *level),
            _ => self.0.add_sink_config(&sink),
        }
        .map_err(to_js_error)?;
        Ok(id.0 as u32)
    }

    #[wasm_bindgen(js_name = removeSink)]
    pub fn remove_sink(&self, id: u32) -> Result<(), JsError> {
        self.0.remove_sink(SinkId(id as u64)).map_err(to_js_error)
    }

    pub fn flush(&self) -> Result<(), JsError> {
        self.0.flush().map_err(to_js_error)
    }

    /// Rotate file sinks now
    pub fn rotate(&self) -> Result<(), JsError> {
        self.0.rotate().map_err(to_js_error)
    }

    pub fn shutdown(&self) {
        self.0.shutdown();
    }

    #[wasm_bindgen(js_name = failureReport)]
    pub fn failure_report(&self) -> Result<JsValue, JsError> {
        serde_wasm_bindgen::to_value(&self.0.failure_report()).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = memoryLines)]
    pub fn memory_lines(&self) -> Vec<String> {
        self.0
            .memory_sinks()
            .iter()
            .flat_map(|sink| sink.lines())
            .collect()
    }

    #[wasm_bindgen(getter, js_name = isActive)]
    pub fn is_active(&self) -> bool {
        self.0.is_active()
    }
}

/// Logger from the active core (a no-op logger before init)
#[wasm_bindgen(js_name = getLogger)]
pub fn get_logger(name: String) -> Logger {
    Logger(Registry::global().get_logger(name))
}

/// Shut down the active core; returns whether one was active
#[wasm_bindgen]
pub fn shutdown() -> bool {
    Registry::global().shutdown()
}

#[wasm_bindgen(js_name = registryState)]
pub fn registry_state() -> String {
    Registry::global().state().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_values() {
        let map: HashMap<String, HostValue> =
            serde_json::from_str(r#"{"code": 7, "ratio": 0.5, "ok": true, "host": "db-1"}"#).unwrap();
        let attrs: Attributes = map.into_iter().map(|(k, v)| (k, v.into())).collect();
        assert_eq!(attrs["code"], AttrValue::Int(7));
        assert_eq!(attrs["ratio"], AttrValue::Float(0.5));
        assert_eq!(attrs["ok"], AttrValue::Bool(true));
        assert_eq!(attrs["host"], AttrValue::Str("db-1".to_string()));
    }

    #[test]
    fn test_split_console() {
        let config = LoggingConfig::default().with_sinks(vec![
            SinkConfig::console().with_level(Severity::Warn),
            SinkConfig::memory(),
            SinkConfig::console(),
        ]);
        let (config, levels) = split_console(config);
        assert_eq!(config.sinks, vec![SinkConfig::memory()]);
        assert_eq!(levels, vec![Some(Severity::Warn), None]);
    }

    #[test]
    fn test_reused_instance_keeps_one_console() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let lines = Arc::new(AtomicUsize::new(0));
        let console = || {
            let lines = Arc::clone(&lines);
            CallbackSink::new("console", move |_| {
                lines.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        let logging = CoreLogging::init(
            LoggingConfig::default()
                .with_level(Severity::Info)
                .with_sinks(vec![SinkConfig::memory()]),
        )
        .unwrap();

        attach_consoles(None, &logging, vec![None], &console).unwrap();
        // Second init returned the same instance
        attach_consoles(Some(&logging), &logging, vec![None], &console).unwrap();

        logging.root().info("once");
        logging.flush().unwrap();
        assert_eq!(lines.load(Ordering::SeqCst), 1);
        logging.shutdown();
    }
}
