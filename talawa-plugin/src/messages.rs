//! User-facing strings rendered by the plugin surfaces
//!
//! Hosts with a translation catalogue replace the English defaults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    /// Placeholder while a plugin route is loading
    pub loading_plugin: String,
    /// Empty state of an injector slot
    pub injector_empty: String,
    /// Shown in place of a route without an owning plugin
    pub missing_plugin_id: String,
    pub plugin_error_title: String,
    /// Prefix of the failed component line
    pub failed_to_load_component: String,
    /// Prefix of the plugin line
    pub plugin_label: String,
    /// Replaces raw error text when verbose errors are off
    pub contact_support: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            loading_plugin: "Loading plugin...".to_string(),
            injector_empty: "Plugin not found or disabled".to_string(),
            missing_plugin_id: "Plugin ID is missing for route".to_string(),
            plugin_error_title: "Plugin Error".to_string(),
            failed_to_load_component: "Failed to load component:".to_string(),
            plugin_label: "Plugin:".to_string(),
            contact_support: "Please contact support if this problem persists.".to_string(),
        }
    }
}

impl Messages {
    pub fn failed_component_line(&self, component: &str) -> String {
        format!("{} {}", self.failed_to_load_component, component)
    }

    pub fn plugin_line(&self, plugin_id: &str) -> String {
        format!("{} {}", self.plugin_label, plugin_id)
    }
}
