//! Shell configuration.
//!
//! Loaded from TOML with every section defaulted, so an empty or partial file
//! is valid. Resolution order:
//!
//! 1. explicit path (`--config`)
//! 2. `ROSH_CONFIG` environment variable
//! 3. `<config dir>/rosh/config.toml`
//! 4. built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoshError};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "ROSH_CONFIG";

/// Effective configuration of the shell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoshConfig {
    pub shell: ShellConfig,
    pub tools: ToolsConfig,
    pub command: CommandConfig,
}

/// Interactive loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// History file; `None` disables persistent history.
    pub history_file: Option<PathBuf>,
    /// Maximum number of history entries kept.
    pub history_size: usize,
    /// Appended to the hostname (and namespace) to form the prompt.
    pub prompt_suffix: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            history_file: dirs::home_dir().map(|h| h.join(".rosh_history")),
            history_size: 1000,
            prompt_suffix: "> ".to_string(),
        }
    }
}

/// Executable overrides. Unset tools are looked up on `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ip: Option<PathBuf>,
    pub bridge: Option<PathBuf>,
    pub ethtool: Option<PathBuf>,
}

/// Per-command settings, serialized as `[command.<name>]` tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub ifstatecli: IfstatecliConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IfstatecliConfig {
    /// Passed as `-c <file>` when non-empty.
    pub config_file: String,
    pub quiet: bool,
    pub soft_schema: bool,
    pub verbose: bool,
}

impl IfstatecliConfig {
    /// Leading `ifstatecli` arguments derived from the settings.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if !self.config_file.is_empty() {
            args.push("-c".to_string());
            args.push(self.config_file.clone());
        }
        if self.quiet {
            args.push("-q".to_string());
        }
        if self.soft_schema {
            args.push("-s".to_string());
        }
        if self.verbose {
            args.push("-v".to_string());
        }
        args
    }
}

impl RoshConfig {
    /// Load the configuration following the resolution order.
    ///
    /// An explicitly named file must exist; the default location may not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(env_path) = std::env::var(CONFIG_ENV)
            && !env_path.is_empty()
        {
            return Self::from_file(Path::new(&env_path));
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                log::debug!("no config file found, using defaults");
                Ok(Self::default())
            },
        }
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RoshError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&text)?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// `<config dir>/rosh/config.toml`, if a config dir exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("rosh").join("config.toml"))
    }
}
