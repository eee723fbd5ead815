//! World settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for a `World`.
///
/// Every field has a default, so a settings file only needs to mention what
/// it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// The number of reactive sweep iterations allowed before the world
    /// decides the systems will never settle, which is fatal.
    pub max_sweep_iterations: usize,

    /// Record per-system timing counters.
    pub diagnostics: bool,

    /// The number of samples each counter averages over.
    pub counter_samples: usize,
}

impl Default for WorldSettings {
    fn default() -> Self {
        WorldSettings {
            max_sweep_iterations: 64,
            diagnostics: false,
            counter_samples: 60,
        }
    }
}

impl WorldSettings {
    /// Parse settings from a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<WorldSettings, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<WorldSettings, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        WorldSettings::from_toml_str(&contents)
    }

    /// Serialize these settings as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
