//! Logging configuration structure

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};
use crate::sinks::{
    BoxedSink, ConsoleSink, ConsoleStream, FileSink, FlushPolicy, MemorySink, NetworkOptions,
    NetworkSink, Rotation,
};
use crate::types::Severity;

/// What `init` does when the registry is already active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReinitPolicy {
    /// Fail with `AlreadyInitialized`
    #[default]
    Error,
    /// Return the active instance unchanged; the new config is ignored
    Reuse,
}

/// Top-level logging configuration
///
/// # Example
///
/// ```
/// use polylog_core::config::LoggingConfig;
/// use polylog_core::types::Severity;
///
/// let config = LoggingConfig::from_yaml_str(r#"
/// level: debug
/// context: api
/// sinks:
///   - type: console
///     stream: stderr
///   - type: file
///     path: /tmp/api.log
///     level: warn
/// "#).unwrap();
/// assert_eq!(config.level, Severity::Debug);
/// assert_eq!(config.sinks.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// Global threshold
    pub level: Severity,
    /// Name of the root logger
    pub context: String,
    /// Sinks, in dispatch order
    pub sinks: Vec<SinkConfig>,
    /// Flush policy for stream and file sinks
    pub flush: FlushPolicy,
    /// Behavior of a second `init` while active
    pub reinit: ReinitPolicy,
    /// Upper bound for flush and shutdown waits on queued sinks
    pub flush_timeout_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Severity::Info,
            context: "root".to_string(),
            sinks: vec![SinkConfig::console()],
            flush: FlushPolicy::Immediate,
            reinit: ReinitPolicy::Error,
            flush_timeout_ms: 2000,
        }
    }
}

impl LoggingConfig {
    /// Default configuration: INFO to stdout
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Severity) -> Self {
        self.level = level;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_sinks(mut self, sinks: Vec<SinkConfig>) -> Self {
        self.sinks = sinks;
        self
    }

    pub fn with_flush(mut self, flush: FlushPolicy) -> Self {
        self.flush = flush;
        self
    }

    pub fn with_reinit(mut self, reinit: ReinitPolicy) -> Self {
        self.reinit = reinit;
        self
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    /// Check every sink definition
    pub fn validate(&self) -> ConfigResult<()> {
        if self.context.is_empty() {
            return Err(ConfigError::Other("root context must not be empty".to_string()));
        }
        if let FlushPolicy::Buffered { max_records: 0, .. } = self.flush {
            return Err(ConfigError::Other(
                "buffered flush needs maxRecords of at least 1".to_string(),
            ));
        }
        self.sinks.iter().try_for_each(SinkConfig::validate)
    }
}

/// One sink definition, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SinkConfig {
    Console {
        #[serde(default)]
        stream: ConsoleStream,
        #[serde(default)]
        level: Option<Severity>,
        /// Color lines by severity
        #[serde(default)]
        colors: bool,
    },
    File {
        path: PathBuf,
        #[serde(default)]
        level: Option<Severity>,
        /// Rotate past this many bytes; 0 disables rotation
        #[serde(default)]
        max_size: u64,
        #[serde(default)]
        backlog: usize,
    },
    Memory {
        #[serde(default)]
        capacity: Option<usize>,
        #[serde(default)]
        level: Option<Severity>,
    },
    Network {
        address: String,
        #[serde(default)]
        level: Option<Severity>,
        #[serde(default = "default_queue_capacity")]
        queue_capacity: usize,
        #[serde(default = "default_enqueue_timeout_ms")]
        enqueue_timeout_ms: u64,
        #[serde(default = "default_connect_timeout_ms")]
        connect_timeout_ms: u64,
    },
    /// Local syslog daemon; unix only
    Syslog {
        /// Tag for messages; defaults to the root context
        #[serde(default)]
        process: Option<String>,
        #[serde(default)]
        level: Option<Severity>,
    },
}

fn default_queue_capacity() -> usize {
    NetworkOptions::default().queue_capacity
}

fn default_enqueue_timeout_ms() -> u64 {
    NetworkOptions::default().enqueue_timeout.as_millis() as u64
}

fn default_connect_timeout_ms() -> u64 {
    NetworkOptions::default().connect_timeout.as_millis() as u64
}

/// A sink built from a [`SinkConfig`]
pub(crate) struct BuiltSink {
    pub sink: BoxedSink,
    pub level: Option<Severity>,
    /// Shared handle when the sink is a memory sink
    pub memory: Option<MemorySink>,
}

impl SinkConfig {
    /// Console sink on stdout with no per-sink level
    pub fn console() -> Self {
        SinkConfig::Console {
            stream: ConsoleStream::Stdout,
            level: None,
            colors: false,
        }
    }

    /// Plain (non-rotating) file sink
    pub fn file(path: impl Into<PathBuf>) -> Self {
        SinkConfig::File {
            path: path.into(),
            level: None,
            max_size: 0,
            backlog: 0,
        }
    }

    /// Unbounded memory sink
    pub fn memory() -> Self {
        SinkConfig::Memory {
            capacity: None,
            level: None,
        }
    }

    /// Network sink with default queue settings
    pub fn network(address: impl Into<String>) -> Self {
        SinkConfig::Network {
            address: address.into(),
            level: None,
            queue_capacity: default_queue_capacity(),
            enqueue_timeout_ms: default_enqueue_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }

    /// Syslog sink tagged with the root context
    pub fn syslog() -> Self {
        SinkConfig::Syslog {
            process: None,
            level: None,
        }
    }

    /// Per-sink threshold, if any
    pub fn level(&self) -> Option<Severity> {
        match self {
            SinkConfig::Console { level, .. }
            | SinkConfig::File { level, .. }
            | SinkConfig::Memory { level, .. }
            | SinkConfig::Network { level, .. }
            | SinkConfig::Syslog { level, .. } => *level,
        }
    }

    /// Set the per-sink threshold
    pub fn with_level(mut self, new_level: Severity) -> Self {
        match &mut self {
            SinkConfig::Console { level, .. }
            | SinkConfig::File { level, .. }
            | SinkConfig::Memory { level, .. }
            | SinkConfig::Network { level, .. }
            | SinkConfig::Syslog { level, .. } => *level = Some(new_level),
        }
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        match self {
            SinkConfig::Console { .. } => Ok(()),
            SinkConfig::File {
                path,
                max_size,
                backlog,
                ..
            } => {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidSink("file sink needs a path".to_string()));
                }
                Rotation {
                    max_size: *max_size,
                    backlog: *backlog,
                }
                .validate()
            }
            SinkConfig::Memory { capacity, .. } => match capacity {
                Some(0) => Err(ConfigError::InvalidSink(
                    "memory sink capacity must be at least 1".to_string(),
                )),
                _ => Ok(()),
            },
            SinkConfig::Network {
                address,
                queue_capacity,
                ..
            } => {
                if address.trim().is_empty() {
                    return Err(ConfigError::InvalidSink(
                        "network sink needs an address".to_string(),
                    ));
                }
                if *queue_capacity == 0 {
                    return Err(ConfigError::InvalidSink(
                        "network queue capacity must be at least 1".to_string(),
                    ));
                }
                Ok(())
            }
            SinkConfig::Syslog { process, .. } => match process {
                Some(process) if process.trim().is_empty() => Err(ConfigError::InvalidSink(
                    "syslog process name must not be empty".to_string(),
                )),
                _ => Ok(()),
            },
        }
    }

    /// Open the destination resource
    pub(crate) fn build(&self, config: &LoggingConfig) -> ConfigResult<BuiltSink> {
        self.validate()?;
        let level = self.level();
        let built = match self {
            SinkConfig::Console { stream, colors, .. } => BuiltSink {
                sink: Box::new(ConsoleSink::new(*stream, config.flush).with_colors(*colors)),
                level,
                memory: None,
            },
            SinkConfig::File {
                path,
                max_size,
                backlog,
                ..
            } => {
                let rotation = Rotation::new(*max_size, *backlog)?;
                BuiltSink {
                    sink: Box::new(FileSink::with_rotation(path, config.flush, rotation)?),
                    level,
                    memory: None,
                }
            }
            SinkConfig::Memory { capacity, .. } => {
                let sink = match capacity {
                    Some(capacity) => MemorySink::with_capacity(*capacity),
                    None => MemorySink::new(),
                };
                BuiltSink {
                    sink: Box::new(sink.clone()),
                    level,
                    memory: Some(sink),
                }
            }
            SinkConfig::Network {
                address,
                queue_capacity,
                enqueue_timeout_ms,
                connect_timeout_ms,
                ..
            } => {
                let options = NetworkOptions {
                    queue_capacity: *queue_capacity,
                    enqueue_timeout: Duration::from_millis(*enqueue_timeout_ms),
                    connect_timeout: Duration::from_millis(*connect_timeout_ms),
                    flush_timeout: config.flush_timeout(),
                    ..NetworkOptions::default()
                };
                BuiltSink {
                    sink: Box::new(NetworkSink::connect(address.clone(), options)?),
                    level,
                    memory: None,
                }
            }
            SinkConfig::Syslog { process, .. } => BuiltSink {
                sink: build_syslog(process.as_deref().unwrap_or(&config.context))?,
                level,
                memory: None,
            },
        };
        Ok(built)
    }
}

#[cfg(unix)]
fn build_syslog(process: &str) -> ConfigResult<BoxedSink> {
    Ok(Box::new(crate::sinks::SyslogSink::connect(process)?))
}

#[cfg(not(unix))]
fn build_syslog(_process: &str) -> ConfigResult<BoxedSink> {
    Err(ConfigError::InvalidSink(
        "syslog is only available on unix".to_string(),
    ))
}
