//! Rule and engine settings.
//!
//! Read from `.pointer-spacing.json`, looked up from the analysed
//! directory upwards. Every field is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostic::Severity;

/// File name searched for by [`Config::discover`].
pub const CONFIG_FILE_NAME: &str = ".pointer-spacing.json";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings of the spacing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleConfig {
    pub enabled: bool,
    pub severity: Severity,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: Severity::Warning,
        }
    }
}

/// Engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Process files in parallel.
    pub parallel: bool,
    /// Worker threads, 0 = one per CPU.
    pub jobs: usize,
    /// Upper bound on analyse-and-fix rounds per document.
    pub max_fix_passes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            jobs: 0,
            max_fix_passes: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub rule: RuleConfig,
    pub engine: EngineConfig,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Nearest configuration file in `dir` or one of its ancestors.
    #[must_use]
    pub fn find(dir: &Path) -> Option<PathBuf> {
        dir.ancestors()
            .map(|d| d.join(CONFIG_FILE_NAME))
            .find(|p| p.is_file())
    }

    /// Load the nearest configuration file, or the defaults when there
    /// is none.
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        match Self::find(dir) {
            Some(path) => Self::load(&path),
            None => {
                log::debug!("no {CONFIG_FILE_NAME} above {}, using defaults", dir.display());
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_fix_passes == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_fix_passes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        let config = Config::from_json("{}").expect("parse failed");
        assert_eq!(config, Config::default());
        assert!(config.rule.enabled);
        assert_eq!(config.engine.max_fix_passes, 3);
    }

    #[test]
    fn partial_sections() {
        let config =
            Config::from_json(r#"{"rule": {"severity": "error"}, "engine": {"jobs": 2}}"#)
                .expect("parse failed");
        assert_eq!(config.rule.severity, Severity::Error);
        assert!(config.rule.enabled);
        assert_eq!(config.engine.jobs, 2);
        assert!(config.engine.parallel);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            Config::from_json(r#"{"rule": {"enable": false}}"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn zero_passes_is_invalid() {
        let err = Config::from_json(r#"{"engine": {"max_fix_passes": 0}}"#)
            .expect_err("should be invalid");
        assert_eq!(
            err.to_string(),
            "invalid configuration: engine.max_fix_passes must be at least 1"
        );
    }
}
