//! Configuration error types

use crate::sinks::SinkError;

/// Errors that can occur while loading, validating or applying configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid level: {0}")]
    InvalidLevel(String),

    #[error("Invalid sink: {0}")]
    InvalidSink(String),

    #[error("Failed to open sink: {0}")]
    Sink(#[from] SinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Other(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
