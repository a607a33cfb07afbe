//! Plugin system configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Plugin system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Directories scanned for plugin manifests
    pub plugin_dirs: Vec<PathBuf>,

    /// Base path plugin entry modules are resolved under (`<base>/<pluginId>/index.ts`)
    pub module_base_path: String,

    /// Show raw load error messages in route error panels
    #[serde(default = "crate::domains::utils::default_false")]
    pub verbose_errors: bool,

    /// Run startup discovery when the manager is built
    #[serde(default = "crate::domains::utils::default_true")]
    pub auto_initialize: bool,

    /// Capacity of the lifecycle event broadcast channel
    pub event_buffer_size: usize,

    /// Compute SHA-256 checksums of discovered manifests
    #[serde(default = "crate::domains::utils::default_false")]
    pub calculate_checksums: bool,

    /// Maximum directory depth for manifest discovery
    pub max_discovery_depth: usize,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            plugin_dirs: vec![PathBuf::from("./plugins")],
            module_base_path: "/plugins".to_string(),
            verbose_errors: false,
            auto_initialize: true,
            event_buffer_size: 256,
            calculate_checksums: false,
            max_discovery_depth: 3,
        }
    }
}

impl PluginConfig {
    /// Configuration suited to local development: raw error detail shown
    pub fn development() -> Self {
        Self {
            verbose_errors: true,
            ..Default::default()
        }
    }
}

impl Validatable for PluginConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.module_base_path, "module_base_path", self.domain_name())?;
        validate_positive(self.event_buffer_size, "event_buffer_size", self.domain_name())?;
        validate_positive(self.max_discovery_depth, "max_discovery_depth", self.domain_name())?;

        if !self.module_base_path.starts_with('/') {
            return Err(self.validation_error("module_base_path must start with '/'"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "plugins"
    }
}
