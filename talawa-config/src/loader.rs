//! Configuration loading and environment variable handling

use crate::domains::TalawaConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "TALAWA".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<TalawaConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: TalawaConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<TalawaConfig> {
        let mut config = TalawaConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<TalawaConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn apply_env_overrides(&self, config: &mut TalawaConfig) -> ConfigResult<()> {
        self.apply_plugin_overrides(&mut config.plugins)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    fn apply_plugin_overrides(
        &self,
        config: &mut crate::domains::plugins::PluginConfig,
    ) -> ConfigResult<()> {
        // Colon-separated, like PATH
        if let Ok(dirs) = self.get_env_var("PLUGIN_DIR") {
            config.plugin_dirs = dirs
                .split(':')
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
                .collect();
        }

        if let Ok(base) = self.get_env_var("PLUGIN_MODULE_BASE") {
            config.module_base_path = base;
        }

        if let Ok(verbose) = self.get_env_var("VERBOSE_PLUGIN_ERRORS") {
            config.verbose_errors = verbose.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid VERBOSE_PLUGIN_ERRORS: {}", e))
            })?;
        }

        if let Ok(auto) = self.get_env_var("AUTO_INITIALIZE") {
            config.auto_initialize = auto
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid AUTO_INITIALIZE: {}", e)))?;
        }

        if let Ok(size) = self.get_env_var("PLUGIN_EVENT_BUFFER") {
            config.event_buffer_size = size.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid PLUGIN_EVENT_BUFFER: {}", e))
            })?;
        }

        Ok(())
    }

    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
