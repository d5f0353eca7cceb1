//! Configuration for dssobj
//!
//! This module provides the core configuration:
//! - Type-safe config struct via serde
//! - TOML file format
//! - Auto-generation of a default config
//! - Manual reload capability
//!
//! # Example
//!
//! ```ignore
//! use dssobj_core::{CoreConfig, DssContext};
//!
//! let config = CoreConfig::load().unwrap_or_default();
//! dssobj_core::logging::init(&config);
//! let ctx = DssContext::with_config(config)?;
//! ```

mod loader;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::flags::{JsonFlags, SetterFlags};

pub use loader::{core_config_path, CONFIG_ENV, CONFIG_FILE_NAME};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Could not determine where the config file lives
    #[error("Config directory not available - could not resolve working directory")]
    NoConfigDirectory,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Core configuration.
///
/// Loaded from `$DSSOBJ_CONFIG` or `./dssobj.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    /// Setter flag bits applied by [`CoreConfig::setter_flags`]
    pub default_setter_flags: u32,

    /// Wrap single writes in an implicit edit session
    pub implicit_edit: bool,

    /// JSON option bits applied by [`CoreConfig::json_flags`]
    pub json_flags: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            default_setter_flags: 0,
            implicit_edit: true,
            json_flags: 0,
        }
    }
}

impl CoreConfig {
    /// Default setter flags (unknown bits are dropped)
    pub fn setter_flags(&self) -> SetterFlags {
        SetterFlags::from_bits_truncate(self.default_setter_flags)
    }

    /// Default JSON options (unknown bits are dropped)
    pub fn json_flags(&self) -> JsonFlags {
        JsonFlags::from_bits_truncate(self.json_flags)
    }

    /// Load core config from file, creating default if missing.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&core_config_path()?)
    }

    /// Load config from an explicit path, creating default if missing.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::debug!("Loaded core config from {:?}", path);
            Ok(config)
        } else {
            let default = Self::default();
            default.save_to(path)?;
            tracing::info!("Created default core config at {:?}", path);
            Ok(default)
        }
    }

    /// Save core config to file.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&core_config_path()?)
    }

    /// Save config to an explicit path.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved core config to {:?}", path);
        Ok(())
    }

    /// Reload core config from file.
    pub fn reload(&mut self) -> ConfigResult<()> {
        let path = core_config_path()?;
        self.reload_from(&path)
    }

    /// Reload config from an explicit path.
    pub fn reload_from(&mut self, path: &Path) -> ConfigResult<()> {
        let content = std::fs::read_to_string(path)?;
        *self = toml::from_str(&content)?;
        tracing::debug!("Reloaded core config from {:?}", path);
        Ok(())
    }
}
