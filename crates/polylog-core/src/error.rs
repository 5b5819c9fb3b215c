//! Errors returned by the logging handle and registry

use thiserror::Error;

use crate::config::ConfigError;
use crate::dispatch::SinkId;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging is already initialized")]
    AlreadyInitialized,

    #[error("Logging is not active")]
    Inactive,

    #[error("No sink registered as {0}")]
    SinkNotFound(SinkId),

    #[error("{count} sink(s) failed, last error: {last}")]
    SinkFailures { count: usize, last: String },
}

pub type LoggingResult<T> = Result<T, LoggingError>;
