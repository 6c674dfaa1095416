//! Host configuration.
//!
//! Defaults, environment variable names and the TOML-backed [`HostConfig`]
//! live here so the CLI and embedders agree on them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PluginError, Result};
use crate::policy::AllowPolicy;

/// Environment variable names.
pub mod env_vars {
    pub const PLUGIN_DIR: &str = "PLUGHOST_PLUGIN_DIR";
    pub const STORAGE_DIR: &str = "PLUGHOST_STORAGE_DIR";
    pub const ALLOW: &str = "PLUGHOST_ALLOW";
    pub const LOG_JSON: &str = "PLUGHOST_LOG_JSON";
}

/// Default values.
pub mod defaults {
    /// Plugin directory below the home directory.
    pub const PLUGIN_DIR: &str = ".plughost/plugins";
    /// Storage directory below the plugin directory.
    pub const STORAGE_SUBDIR: &str = "data";
    pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Default plugin directory: `~/.plughost/plugins`.
pub fn default_plugin_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(defaults::PLUGIN_DIR))
        .unwrap_or_else(|| PathBuf::from(defaults::PLUGIN_DIR))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directory scanned for plugin libraries.
    pub plugin_dir: PathBuf,
    /// Directory handed to plugins for their own files.
    pub storage_dir: Option<PathBuf>,
    /// Which plugins may be initialized.
    pub allow: AllowPolicy,
    /// Version string passed to every plugin's initialise entry point.
    pub host_version: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            plugin_dir: default_plugin_dir(),
            storage_dir: None,
            allow: AllowPolicy::All,
            host_version: defaults::HOST_VERSION.to_string(),
        }
    }
}

impl HostConfig {
    /// Read a TOML file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| PluginError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| PluginError::Config(e.to_string()))
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(env_vars::PLUGIN_DIR) {
            self.plugin_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(env_vars::STORAGE_DIR) {
            self.storage_dir = Some(PathBuf::from(dir));
        }
        if let Some(allow) = lookup(env_vars::ALLOW) {
            self.allow = AllowPolicy::parse(&allow);
        }
        self
    }

    /// Storage directory, defaulting to `<plugin_dir>/data`.
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(|| self.plugin_dir.join(defaults::STORAGE_SUBDIR))
    }
}
