#![deny(unsafe_code)]

//! Configuration loading and validation for ScriptDesk.
//!
//! Loads TOML configuration files and validates them. [`AppConfig`] is the
//! central configuration structure shared by the runner registry, the
//! pointer device, and the CLI.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Runner registry configuration.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Pointer device configuration.
    #[serde(default)]
    pub pointer: PointerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Runner registry configuration.
///
/// ## TOML Example
///
/// ```toml
/// [registry]
/// candidates = ["python", "text"]
/// warmup_timeout_secs = 30
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Engine kinds in canonical priority order. The first one discovered
    /// becomes the default runner.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,

    /// Per-engine warm-up timeout in seconds (0 = wait indefinitely).
    #[serde(default)]
    pub warmup_timeout_secs: u64,
}

impl RegistryConfig {
    /// The warm-up timeout, or `None` when warm-ups may run indefinitely.
    pub fn warmup_timeout(&self) -> Option<Duration> {
        (self.warmup_timeout_secs > 0).then(|| Duration::from_secs(self.warmup_timeout_secs))
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            warmup_timeout_secs: 0,
        }
    }
}

fn default_candidates() -> Vec<String> {
    ["jython", "python", "jruby", "text"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Pointer device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointerConfig {
    /// Per-axis tolerance (in pixels) when comparing a requested pointer
    /// position against the one the platform reports back.
    #[serde(default = "default_position_delta")]
    pub position_delta: i32,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            position_delta: default_position_delta(),
        }
    }
}

fn default_position_delta() -> i32 {
    5
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.candidates.is_empty() {
            return Err(ConfigError::Validation(
                "registry.candidates must name at least one engine kind".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for (i, kind) in self.registry.candidates.iter().enumerate() {
            if kind.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "registry.candidates[{i}] must not be empty"
                )));
            }
            if !seen.insert(kind.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "registry.candidates[{i}] duplicates engine kind {kind:?}"
                )));
            }
        }

        if self.pointer.position_delta < 0 {
            return Err(ConfigError::Validation(format!(
                "pointer.position_delta must be non-negative, got {}",
                self.pointer.position_delta
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(
            config.registry.candidates,
            vec!["jython", "python", "jruby", "text"]
        );
        assert_eq!(config.registry.warmup_timeout(), None);
        assert_eq!(config.pointer.position_delta, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.registry.candidates.len(), 4);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [registry]
            candidates = ["python", "text"]
            warmup_timeout_secs = 30

            [pointer]
            position_delta = 2

            [logging]
            level = "debug"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.registry.candidates, vec!["python", "text"]);
        assert_eq!(
            config.registry.warmup_timeout(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(config.pointer.position_delta, 2);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_empty_candidates() {
        let toml = r#"
            [registry]
            candidates = []
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_blank_candidate() {
        let toml = r#"
            [registry]
            candidates = ["python", "  "]
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_duplicate_candidate() {
        let toml = r#"
            [registry]
            candidates = ["python", "text", "python"]
        "#;
        let err = AppConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("duplicates"));
    }

    #[test]
    fn test_validation_rejects_negative_delta() {
        let toml = r#"
            [pointer]
            position_delta = -1
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_level() {
        let toml = r#"
            [logging]
            level = "chatty"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scriptdesk.toml");
        tokio::fs::write(
            &path,
            b"[registry]\ncandidates = [\"text\"]\n\n[pointer]\nposition_delta = 0\n",
        )
        .await
        .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.registry.candidates, vec!["text"]);
        assert_eq!(config.pointer.position_delta, 0);
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = AppConfig::load(Path::new("/nonexistent/file.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[").await.unwrap();

        let result = AppConfig::load(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
