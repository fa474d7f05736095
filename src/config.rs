//! Planner configuration.
//!
//! Defaults suit most callers. Services embedding the planner can load it from
//! a TOML file with [`PlannerConfig::load`]. Unknown keys are rejected and
//! missing keys fall back to their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default limit on criterion nesting.
pub const DEFAULT_MAX_CRITERIA_DEPTH: usize = 256;

/// Planner inputs that influence push-down decisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerConfig {
    /// Deepest criterion tree accepted by the planner.
    pub max_criteria_depth: usize,
    /// Whether fully persisted orders move into the persisted query.
    pub push_down_orders: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_criteria_depth: DEFAULT_MAX_CRITERIA_DEPTH,
            push_down_orders: true,
        }
    }
}

impl PlannerConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: None,
            source,
        })
    }

    /// Reads and parses a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }
}

/// Failures raised while loading a [`PlannerConfig`].
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read planner config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse planner config{}: {source}", display_path(.path))]
    Parse {
        path: Option<PathBuf>,
        source: toml::de::Error,
    },
    #[error("failed to serialize planner config: {source}")]
    Serialize { source: toml::ser::Error },
}

impl ConfigError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "ConfigRead",
            ConfigError::Parse { .. } => "ConfigParse",
            ConfigError::Serialize { .. } => "ConfigSerialize",
        }
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" {}", p.display()))
        .unwrap_or_default()
}
