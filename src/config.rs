//! Engine configuration with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Explicit config file (TOML), when the embedding application passes one
//! 3. Environment variables: `CARDTREE_*` prefix

use std::path::Path;

use config::{Config, Environment};
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// Unified configuration for the tree hierarchy engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Fail tree builds when a relationship value references a card that no
    /// longer exists, instead of degrading to the next resolvable ancestor.
    pub strict_unresolved: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            strict_unresolved: false,
        }
    }
}

/// Raw settings for intermediate parsing (fields are Option to detect "not
/// specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub strict_unresolved: Option<bool>,
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `config_file` - Optional TOML file supplied by the embedding
    ///   application
    pub fn load(config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Merge the explicit config file
        if let Some(path) = config_file {
            if path.exists() {
                let raw = load_raw_settings(path)?;
                current = current.merge_with(&raw);
            }
        }

        // 3. Apply environment variables (explicit override)
        current = Self::apply_env_overrides(current)?;

        Ok(current)
    }

    /// Merge overlay config onto self (base): overlay wins if Some.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            strict_unresolved: overlay.strict_unresolved.unwrap_or(self.strict_unresolved),
        }
    }

    /// Apply CARDTREE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let builder =
            Config::builder().add_source(Environment::with_prefix("CARDTREE").separator("__"));

        let config = builder.build().map_err(|e| ApplicationError::Config {
            message: e.to_string(),
        })?;

        if let Ok(val) = config.get_bool("strict_unresolved") {
            settings.strict_unresolved = val;
        }

        Ok(settings)
    }
}
