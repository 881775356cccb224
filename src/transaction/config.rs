//! Coordinator configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::policy::PoisonPolicy;

/// Coordinator configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Name attached to every log event from this coordinator.
    pub name: String,
    /// How commits inside a poisoned nesting are reported.
    pub poison_policy: PoisonPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            poison_policy: PoisonPolicy::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Create a configuration with the given connection name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the poison policy.
    pub fn poison_policy(mut self, policy: PoisonPolicy) -> Self {
        self.poison_policy = policy;
        self
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }
}
