//! Engine configuration
//!
//! A single TOML file controls the engine's tunables:
//! - debounce window for refresh/update buffers
//! - executor pool size
//! - default group reinstated on users left without one
//! - priority step for prefixes/suffixes assigned through `set_option`
//!
//! # Example
//!
//! ```ignore
//! use ctxperms_core::config::{core_config_path, CoreConfig};
//!
//! let config = CoreConfig::load(&core_config_path()?)?;
//! println!("Debounce: {:?}", config.debounce());
//! ```

mod loader;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use loader::{base_dir, core_config_path, HOME_ENV};

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
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Core engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    /// Group every user falls back to when left without one
    pub default_group: String,

    /// Quiet period before a buffered refresh runs, in milliseconds
    pub update_debounce_ms: u64,

    /// Background executor threads
    pub worker_threads: usize,

    /// Added to the highest existing priority when assigning a prefix/suffix
    pub chat_meta_priority_step: i32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            default_group: "default".to_string(),
            update_debounce_ms: 1000,
            worker_threads: 2,
            chat_meta_priority_step: 10,
        }
    }
}

impl CoreConfig {
    /// Load config from file, creating default if missing.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::debug!("Loaded core config from {:?}", path);
            Ok(config)
        } else {
            let default = Self::default();
            default.save(path)?;
            tracing::info!("Created default core config at {:?}", path);
            Ok(default)
        }
    }

    /// Save config to file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved core config to {:?}", path);
        Ok(())
    }

    /// Reload config from file.
    pub fn reload(&mut self, path: &Path) -> ConfigResult<()> {
        let content = std::fs::read_to_string(path)?;
        *self = toml::from_str(&content)?;
        tracing::debug!("Reloaded core config from {:?}", path);
        Ok(())
    }

    /// Debounce window as a duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.update_debounce_ms)
    }
}
