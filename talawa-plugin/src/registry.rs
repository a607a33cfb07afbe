//! Component registry: `(plugin_id, export_name) -> component`

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::PluginResult;
use crate::view::ComponentRef;

/// Synchronous component lookup used by injectors
pub trait ComponentLookup: Send + Sync {
    /// Find a registered export.
    ///
    /// Returns `Ok(None)` for an unknown plugin, a missing or empty export
    /// name, or an export that was never registered. `Err` is reserved for
    /// internal failures.
    fn get_plugin_component(
        &self,
        plugin_id: &str,
        export_name: Option<&str>,
    ) -> PluginResult<Option<ComponentRef>>;
}

/// Exports of one plugin
pub type ComponentMap = HashMap<String, ComponentRef>;

/// Registry of components copied out of loaded plugin modules
#[derive(Default)]
pub struct ComponentRegistry {
    plugins: RwLock<HashMap<String, ComponentMap>>,
}

impl ComponentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the exports of a plugin
    pub fn register_plugin_components(&self, plugin_id: &str, components: ComponentMap) {
        let count = components.len();
        self.plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(plugin_id.to_string(), components);

        tracing::info!(
            target: "plugin_registry",
            plugin_id = %plugin_id,
            components = count,
            "Plugin components registered"
        );
    }

    /// Remove a plugin's exports; returns whether it was registered
    pub fn unregister_plugin_components(&self, plugin_id: &str) -> bool {
        let removed = self
            .plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(plugin_id)
            .is_some();

        if removed {
            tracing::info!(
                target: "plugin_registry",
                plugin_id = %plugin_id,
                "Plugin components unregistered"
            );
        }
        removed
    }

    pub fn is_plugin_registered(&self, plugin_id: &str) -> bool {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(plugin_id)
    }

    /// All exports of a plugin, if registered
    pub fn get_plugin_components(&self, plugin_id: &str) -> Option<ComponentMap> {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(plugin_id)
            .cloned()
    }

    /// Ids of registered plugins, sorted
    pub fn registered_plugins(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn clear(&self) {
        self.plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ComponentLookup for ComponentRegistry {
    fn get_plugin_component(
        &self,
        plugin_id: &str,
        export_name: Option<&str>,
    ) -> PluginResult<Option<ComponentRef>> {
        let Some(export_name) = export_name.filter(|name| !name.is_empty()) else {
            return Ok(None);
        };

        Ok(self
            .plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(plugin_id)
            .and_then(|components| components.get(export_name))
            .cloned())
    }
}
