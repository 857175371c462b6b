//! Engine configuration.
//!
//! Loaded from TOML by the hosting process. Every field has a default so an
//! empty document is a valid configuration.

use crate::{ConfigError, ResourceId, DEFAULT_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_DAILY_WINDOW_SECS: u64 = 86_400;

/// Configuration for the quest engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    /// Maximum number of quests an agent may hold at once. `None` is unlimited.
    pub max_active_quests: Option<usize>,
    /// Length of the window that `daily_limit` counts completions in.
    pub daily_window_secs: u64,
    /// Namespace given to identifiers written without one.
    pub default_namespace: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_active_quests: None,
            daily_window_secs: DEFAULT_DAILY_WINDOW_SECS,
            default_namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - max_active_quests, when set, is at least 1
    /// - daily_window_secs > 0
    /// - default_namespace is a legal identifier namespace
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_active_quests == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_active_quests".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1, omit for unlimited".to_string(),
            });
        }

        if self.daily_window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "daily_window_secs".to_string(),
                value: "0".to_string(),
                reason: "daily_window_secs must be positive".to_string(),
            });
        }

        if ResourceId::new(&self.default_namespace, "probe").is_err() {
            return Err(ConfigError::InvalidValue {
                field: "default_namespace".to_string(),
                value: self.default_namespace.clone(),
                reason: "must match [a-z0-9_.-]+".to_string(),
            });
        }

        Ok(())
    }

    pub fn daily_window(&self) -> Duration {
        Duration::from_secs(self.daily_window_secs)
    }
}
