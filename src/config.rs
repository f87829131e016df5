//! Reasoner configuration, loaded from TOML.
//!
//! ```toml
//! max_iterations = 32
//! answer_timeout_ms = 5000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Result type for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Limits applied to a resolution session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReasonerConfig {
    /// Iterations to run before giving up on reaching a fixpoint (default: 64).
    pub max_iterations: u32,
    /// How long to wait for any single response from the root resolver.
    /// Unset means wait indefinitely.
    pub answer_timeout_ms: Option<u64>,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 64,
            answer_timeout_ms: None,
        }
    }
}

impl ReasonerConfig {
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Toml {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Toml {
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                message: "max_iterations must be at least 1".into(),
            });
        }
        if self.answer_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                message: "answer_timeout_ms must be positive when set".into(),
            });
        }
        Ok(())
    }

    pub fn answer_timeout(&self) -> Option<Duration> {
        self.answer_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let config = ReasonerConfig::from_toml_str("answer_timeout_ms = 250").unwrap();
        assert_eq!(config.max_iterations, 64);
        assert_eq!(config.answer_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ReasonerConfig::from_toml_str("max_iteration = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn zero_iterations_is_invalid() {
        let err = ReasonerConfig::from_toml_str("max_iterations = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reasoner.toml");
        let config = ReasonerConfig {
            max_iterations: 5,
            answer_timeout_ms: Some(1000),
        };
        config.save(&path).unwrap();
        assert_eq!(ReasonerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ReasonerConfig::load(Path::new("/nonexistent/reasoner.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/reasoner.toml"));
    }
}
