//! Loading and saving configuration files (YAML or JSON)
//!
//! The user-level file lives at `~/.config/polylog/config.yaml`; any path can
//! be loaded explicitly. Files ending in `.json` are read as JSON, everything
//! else as YAML.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::ConfigResult;
use super::settings::{LoggingConfig, SinkConfig};

/// Environment variable overriding the global level
pub const LEVEL_ENV: &str = "POLYLOG_LEVEL";

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

impl LoggingConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let config: LoggingConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: LoggingConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a host-supplied document: JSON when it starts with `{`, YAML otherwise
    pub fn parse(content: &str) -> ConfigResult<Self> {
        if content.trim_start().starts_with('{') {
            Self::from_json_str(content)
        } else {
            Self::from_yaml_str(content)
        }
    }

    /// Load config from a file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        if is_json(path) {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Load the user-level file, falling back to defaults when it is missing
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save config to file
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self)?
        };
        fs::write(path, content)?;
        Ok(())
    }

    /// User-level config path (~/.config/polylog/config.yaml)
    pub fn default_path() -> PathBuf {
        // Use XDG config directory (~/.config on Linux, ~/Library/Application Support on macOS)
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        config_dir.join("polylog").join("config.yaml")
    }

    /// Config used when a host passes none: the user-level file if present,
    /// then `POLYLOG_LEVEL`
    pub fn load_user() -> ConfigResult<Self> {
        Self::load_or_default(Self::default_path())?.with_env_overrides()
    }

    /// Apply `POLYLOG_LEVEL` from the process environment
    pub fn with_env_overrides(self) -> ConfigResult<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production)
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Self> {
        if let Some(level) = lookup(LEVEL_ENV) {
            if !level.trim().is_empty() {
                self.level = level.parse()?;
            }
        }
        Ok(self)
    }
}

impl SinkConfig {
    /// Parse one sink definition (JSON or YAML), as hosts pass to `add_sink`
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let sink: SinkConfig = if content.trim_start().starts_with('{') {
            serde_json::from_str(content)?
        } else {
            serde_yaml::from_str(content)?
        };
        sink.validate()?;
        Ok(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::types::Severity;
    use tempfile::tempdir;

    #[test]
    fn test_yaml_roundtrip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("polylog").join("config.yaml");

        let config = LoggingConfig::default()
            .with_level(Severity::Debug)
            .with_sinks(vec![SinkConfig::console(), SinkConfig::file("/tmp/app.log")]);
        config.save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("level: debug"));
        assert!(content.contains("type: file"));

        let loaded = LoggingConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"level": "error", "context": "svc"}"#).unwrap();

        let config = LoggingConfig::load(&path).unwrap();
        assert_eq!(config.level, Severity::Error);
        assert_eq!(config.context, "svc");
        assert_eq!(config.sinks, vec![SinkConfig::console()]);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let config = LoggingConfig::load_or_default(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, LoggingConfig::default());
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        assert!(matches!(
            LoggingConfig::from_yaml_str("level: [unclosed"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(LoggingConfig::from_yaml_str("level: shouting").is_err());
        assert!(matches!(
            SinkConfig::parse("type: [memory"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_validation_runs_on_parse() {
        let yaml = "sinks:\n  - type: network\n    address: ''\n";
        assert!(matches!(
            LoggingConfig::from_yaml_str(yaml),
            Err(ConfigError::InvalidSink(_))
        ));
    }

    #[test]
    fn test_env_override() {
        let config = LoggingConfig::default()
            .with_overrides_from(|key| (key == LEVEL_ENV).then(|| "trace".to_string()))
            .unwrap();
        assert_eq!(config.level, Severity::Trace);

        let result = LoggingConfig::default()
            .with_overrides_from(|_| Some("nonsense".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidLevel(_))));

        let untouched = LoggingConfig::default().with_overrides_from(|_| None).unwrap();
        assert_eq!(untouched.level, Severity::Info);
    }

    #[test]
    fn test_parse_detects_format() {
        let json = LoggingConfig::parse(r#"  {"level": "warn"}"#).unwrap();
        assert_eq!(json.level, Severity::Warn);
        let yaml = LoggingConfig::parse("level: fatal\ncontext: yaml").unwrap();
        assert_eq!(yaml.level, Severity::Fatal);
        assert!(matches!(
            LoggingConfig::parse(r#"{"level": 9}"#),
            Err(ConfigError::Serialization(_))
        ));
    }

    #[test]
    fn test_sink_definition() {
        let sink = SinkConfig::parse(r#"{"type": "memory", "capacity": 3, "level": "warn"}"#).unwrap();
        assert_eq!(sink.level(), Some(Severity::Warn));
        let sink = SinkConfig::parse("type: file\npath: app.log").unwrap();
        assert_eq!(sink, SinkConfig::file("app.log"));
        assert!(SinkConfig::parse(r#"{"type": "memory", "capacity": 0}"#).is_err());
    }

    #[test]
    fn test_load_or_default_reads_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "level: debug\ncontext: user\n").unwrap();

        let config = LoggingConfig::load_or_default(&path).unwrap();
        assert_eq!(config.level, Severity::Debug);
        assert_eq!(config.context, "user");
    }

    #[test]
    fn test_default_path() {
        let path = LoggingConfig::default_path();
        assert!(path.ends_with("polylog/config.yaml"));
    }
}
