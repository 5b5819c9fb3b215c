//! Polylog Core
//!
//! Runtime-agnostic leveled logging with multiple sinks.
//! This crate provides the core functionality that can be used from any environment
//! (Node.js via napi-rs, Python via PyO3, the browser via wasm-bindgen, native Rust, etc.)
//!
//! ## Routing
//!
//! A [`Registry`] holds at most one active [`Logging`] instance. Loggers obtained
//! from it stamp records with a context name; the dispatcher writes each record
//! to every sink whose threshold it passes, in registration order. A failing
//! sink is counted, never propagated, and never stops the others.
//!
//! ```rust
//! use polylog_core::{attrs, log_info};
//! use polylog_core::config::{LoggingConfig, SinkConfig};
//! use polylog_core::registry::Registry;
//! use polylog_core::types::Severity;
//!
//! let registry = Registry::new();
//! let logging = registry.init(
//!     LoggingConfig::default()
//!         .with_level(Severity::Debug)
//!         .with_sinks(vec![SinkConfig::memory()]),
//! ).unwrap();
//!
//! let logger = logging.get_logger("x");
//! logger.info_with("y", attrs! { "code" => 7 });
//! log_info!(logger, "{} requests served", 42);
//!
//! let lines = logging.memory_sinks()[0].lines();
//! assert!(lines[0].ends_with("[INFO] [x] y {code=7}"));
//!
//! registry.shutdown();
//! logger.info("silently dropped");
//! ```

pub mod types;
pub mod filter;
pub mod sinks;
pub mod config;
pub mod dispatch;
pub mod registry;
pub mod server;
mod error;

// Re-export commonly used types
pub use types::{AttrValue, Attributes, MessageSource, OwnedRecord, Record, Severity};

pub use sinks::{
    Sink, SinkError, SinkResult, BoxedSink, LostRecords, FlushPolicy,
    StreamSink, ConsoleSink, ConsoleStream, FileSink, Rotation,
    MemorySink, CallbackSink, NetworkSink, NetworkOptions,
};

#[cfg(unix)]
pub use sinks::SyslogSink;

pub use config::{ConfigError, ConfigResult, LoggingConfig, SinkConfig, ReinitPolicy};

pub use dispatch::{DispatchOutcome, FailureReport, PendingDiagnostics, SinkId, SinkReport};

pub use registry::{Logger, Logging, Registry, RegistryState};

pub use server::LogServer;

pub use error::{LoggingError, LoggingResult};
