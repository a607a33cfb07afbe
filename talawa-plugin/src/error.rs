//! Plugin system error types

use thiserror::Error;

/// Plugin system result type
pub type PluginResult<T> = Result<T, PluginError>;

/// Plugin system errors
#[derive(Error, Debug)]
pub enum PluginError {
    /// Plugin not found
    #[error("Plugin '{plugin_id}' not found")]
    PluginNotFound { plugin_id: String },

    /// Plugin identifier failed validation
    #[error("Invalid plugin ID provided: '{plugin_id}'")]
    InvalidPluginId { plugin_id: String },

    /// Status value not accepted for the requested transition
    #[error("Invalid status value: {status}")]
    InvalidStatus { status: String },

    /// Invalid plugin manifest
    #[error("Invalid plugin manifest: {reason}")]
    InvalidManifest { reason: String },

    /// Manifest could not be located
    #[error("Manifest not found for plugin '{plugin_id}'")]
    ManifestNotFound { plugin_id: String },

    /// Neither the named nor the default export exists
    #[error("Component '{component}' not found in plugin '{plugin_id}'")]
    ComponentNotFound { component: String, plugin_id: String },

    /// Module import failed
    #[error("Failed to load module for plugin '{plugin_id}': {reason}")]
    ModuleLoadFailed { plugin_id: String, reason: String },

    /// Component render failed
    #[error("Component '{component}' failed to render: {reason}")]
    RenderFailed { component: String, reason: String },

    /// Persistence backend failure
    #[error("Plugin backend error: {0}")]
    Backend(String),

    /// Component or extension registry failure
    #[error("Registry error: {0}")]
    Registry(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("Plugin system error: {0}")]
    Generic(String),
}

impl PluginError {
    /// Create a new generic plugin error
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic(message.into())
    }

    /// Create a new module load error
    pub fn module_load_failed(plugin_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModuleLoadFailed {
            plugin_id: plugin_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a new render error
    pub fn render_failed(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RenderFailed {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Create a new backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Message recorded on a plugin entry that failed to load.
    ///
    /// Falls back to `Unknown error` when the failure carries no text.
    pub fn load_failure_message(&self) -> String {
        let message = match self {
            Self::ManifestNotFound { .. } => "Manifest not found".to_string(),
            Self::Generic(message) | Self::Backend(message) | Self::Registry(message) => {
                message.clone()
            }
            other => other.to_string(),
        };

        if message.trim().is_empty() {
            "Unknown error".to_string()
        } else {
            message
        }
    }
}
