// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 citree contributors

//! Run configuration
//!
//! Read from `.citree.toml` in the script directory. Every field is
//! optional:
//!
//! ```toml
//! inherit_env = true
//! temp_prefix = "citree-"
//!
//! [env]
//! CARGO_TERM_COLOR = "always"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::context::Environment;
use crate::errors::{CitreeError, CitreeResult};

/// Name of the configuration file
pub const CONFIG_FILE: &str = ".citree.toml";

/// Settings for a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunConfig {
    /// Directory the pipeline runs from; relative paths resolve against
    /// the directory holding the config file
    pub script_dir: PathBuf,

    /// Seed the root environment from the process environment
    pub inherit_env: bool,

    /// Extra variables, applied after the inherited ones
    pub env: BTreeMap<String, String>,

    /// Prefix of the run's temp directory
    pub temp_prefix: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            script_dir: PathBuf::from("."),
            inherit_env: true,
            env: BTreeMap::new(),
            temp_prefix: default_temp_prefix(),
        }
    }
}

fn default_temp_prefix() -> String {
    "citree-".to_string()
}

impl RunConfig {
    /// Load `.citree.toml` from `dir`, falling back to defaults when absent
    pub fn load(dir: &Path) -> CitreeResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let mut config = if path.is_file() {
            let content = std::fs::read_to_string(&path)?;
            Self::from_toml(&content).map_err(|message| CitreeError::InvalidConfig {
                path: path.clone(),
                message,
            })?
        } else {
            Self::default()
        };

        if config.script_dir.is_relative() {
            config.script_dir = dir.join(&config.script_dir);
        }
        if config.temp_prefix.is_empty() {
            config.temp_prefix = default_temp_prefix();
        }

        tracing::debug!(
            script_dir = %config.script_dir.display(),
            from_file = path.is_file(),
            "loaded configuration"
        );

        Ok(config)
    }

    /// Parse a configuration document
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Environment of the root context
    pub fn root_environment(&self) -> Environment {
        let mut env = if self.inherit_env {
            Environment::from_process()
        } else {
            Environment::new()
        };
        for (key, value) in &self.env {
            env.set(key.clone(), value.clone());
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let config = RunConfig::load(dir.path()).unwrap();

        assert!(config.inherit_env);
        assert_eq!(config.temp_prefix, "citree-");
        assert_eq!(config.script_dir, dir.path().join("."));
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
inherit_env = false
script_dir = "project"

[env]
CHANNEL = "nightly"
"#,
        )
        .unwrap();

        let config = RunConfig::load(dir.path()).unwrap();
        assert!(!config.inherit_env);
        assert_eq!(config.script_dir, dir.path().join("project"));

        let env = config.root_environment();
        assert_eq!(env.get("channel"), Some("nightly"));
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn test_invalid_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "inherit_env = \"maybe\"").unwrap();

        let err = RunConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, CitreeError::InvalidConfig { .. }));
    }
}
