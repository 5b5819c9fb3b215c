//! Logging configuration
//!
//! - `LoggingConfig`: global level, root context, sinks, flush and
//!   re-initialization policy
//! - `SinkConfig`: one tagged sink definition
//! - Loading from YAML/JSON strings and files, `POLYLOG_LEVEL` override

mod error;
mod settings;
mod file;

pub use error::{ConfigError, ConfigResult};
pub use settings::{LoggingConfig, SinkConfig, ReinitPolicy};
pub use file::LEVEL_ENV;
