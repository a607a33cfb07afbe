//! Plugin lifecycle: load, unload and status transitions

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

use crate::discovery::PluginIndex;
use crate::error::{PluginError, PluginResult};
use crate::events::{EventBus, PluginEvent};
use crate::extension_registry::ExtensionRegistry;
use crate::loader::{module_path, ManifestSource, ModuleLoader, PluginLifecycleHooks};
use crate::manifest::{is_valid_plugin_id, PluginManifest};
use crate::registry::{ComponentMap, ComponentRegistry};
use crate::types::PluginStatus;
use crate::view::ComponentRef;

/// A plugin known to the lifecycle manager
#[derive(Debug, Clone)]
pub struct LoadedPlugin {
    pub id: String,
    pub manifest: PluginManifest,
    pub components: ComponentMap,
    pub status: PluginStatus,
    pub error_message: Option<String>,
    pub loaded_at: DateTime<Utc>,
    pub lifecycle_hooks: Option<Arc<dyn PluginLifecycleHooks>>,
}

impl LoadedPlugin {
    fn failed(id: &str, message: String) -> Self {
        Self {
            id: id.to_string(),
            manifest: PluginManifest {
                name: id.to_string(),
                plugin_id: id.to_string(),
                ..Default::default()
            },
            components: ComponentMap::new(),
            status: PluginStatus::Error,
            error_message: Some(message),
            loaded_at: Utc::now(),
            lifecycle_hooks: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PluginStatus::Active
    }
}

/// Plugin summary handed to views
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSummary {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub status: PluginStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub components: Vec<String>,
    pub loaded_at: DateTime<Utc>,
}

impl From<&LoadedPlugin> for PluginSummary {
    fn from(plugin: &LoadedPlugin) -> Self {
        let mut components: Vec<String> = plugin.components.keys().cloned().collect();
        components.sort();
        Self {
            id: plugin.id.clone(),
            name: plugin.manifest.name.clone(),
            version: plugin.manifest.version.clone(),
            description: plugin.manifest.description.clone(),
            status: plugin.status,
            error_message: plugin.error_message.clone(),
            components,
            loaded_at: plugin.loaded_at,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Callback {
    Install,
    Activate,
    Deactivate,
    Uninstall,
}

impl Callback {
    fn name(self) -> &'static str {
        match self {
            Self::Install => "onInstall",
            Self::Activate => "onActivate",
            Self::Deactivate => "onDeactivate",
            Self::Uninstall => "onUninstall",
        }
    }
}

/// Owns the set of loaded plugins and drives their transitions
pub struct LifecycleManager {
    manifests: Arc<dyn ManifestSource>,
    modules: Arc<dyn ModuleLoader>,
    index: Arc<PluginIndex>,
    extensions: Arc<ExtensionRegistry>,
    components: Arc<ComponentRegistry>,
    events: Arc<EventBus>,
    module_base_path: String,
    plugins: RwLock<Vec<LoadedPlugin>>,
}

impl LifecycleManager {
    pub fn new(
        manifests: Arc<dyn ManifestSource>,
        modules: Arc<dyn ModuleLoader>,
        index: Arc<PluginIndex>,
        extensions: Arc<ExtensionRegistry>,
        components: Arc<ComponentRegistry>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            manifests,
            modules,
            index,
            extensions,
            components,
            events,
            module_base_path: "/plugins".to_string(),
            plugins: RwLock::new(Vec::new()),
        }
    }

    /// Base path used when logging module locations
    pub fn with_module_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.module_base_path = base_path.into();
        self
    }

    /// Load a plugin and, when the backend marks it activated, register its
    /// extension points and components.
    ///
    /// A failed load is recorded as an `Error` entry and reported through
    /// `plugin:error` followed by `plugin:status-changed`.
    pub async fn load_plugin(&self, plugin_id: &str) -> PluginResult<()> {
        if !is_valid_plugin_id(plugin_id) {
            tracing::error!(target: "plugin_lifecycle", plugin_id = %plugin_id, "Invalid plugin ID provided");
            return Err(PluginError::InvalidPluginId {
                plugin_id: plugin_id.to_string(),
            });
        }
        let plugin_id = plugin_id.trim();

        match self.prepare_plugin(plugin_id).await {
            Ok(plugin) => {
                if plugin.is_active() {
                    self.register_plugin(&plugin);
                }

                tracing::info!(
                    target: "plugin_lifecycle",
                    plugin_id = %plugin_id,
                    status = %plugin.status,
                    "Plugin loaded"
                );
                self.store(plugin);
                self.events.emit(PluginEvent::loaded(plugin_id));
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    target: "plugin_lifecycle",
                    plugin_id = %plugin_id,
                    error = %e,
                    "Failed to load plugin {}",
                    plugin_id
                );

                let message = e.load_failure_message();
                self.unregister_plugin(plugin_id);
                self.store(LoadedPlugin::failed(plugin_id, message.clone()));
                self.events.emit(PluginEvent::error(plugin_id, message));
                self.events
                    .emit(PluginEvent::status_changed(plugin_id, PluginStatus::Error));
                Err(e)
            }
        }
    }

    async fn prepare_plugin(&self, plugin_id: &str) -> PluginResult<LoadedPlugin> {
        let manifest = self.manifests.load_manifest(plugin_id).await?;

        tracing::debug!(
            target: "plugin_lifecycle",
            plugin_id = %plugin_id,
            module = %module_path(&self.module_base_path, plugin_id, &manifest.main),
            "Loading plugin components"
        );
        let module = self.modules.import(plugin_id).await.map_err(|e| {
            tracing::error!(
                target: "plugin_lifecycle",
                plugin_id = %plugin_id,
                error = %e,
                "Failed to load components for plugin {}",
                plugin_id
            );
            e
        })?;

        self.index.sync_plugin(plugin_id).await;

        let status = if self.index.is_plugin_activated(plugin_id) {
            PluginStatus::Active
        } else {
            PluginStatus::Inactive
        };

        Ok(LoadedPlugin {
            id: plugin_id.to_string(),
            manifest,
            components: module.components(),
            status,
            error_message: None,
            loaded_at: Utc::now(),
            lifecycle_hooks: module.lifecycle_hooks(),
        })
    }

    /// Install a plugin whose files are in place: load it unless it is
    /// already loaded, run `on_install` and emit `plugin:installed`.
    pub async fn install_plugin(&self, plugin_id: &str) -> PluginResult<()> {
        let plugin = match self.get_loaded_plugin(plugin_id) {
            Some(plugin) if plugin.status != PluginStatus::Error => plugin,
            _ => {
                if let Err(e) = self.load_plugin(plugin_id).await {
                    tracing::error!(
                        target: "plugin_lifecycle",
                        plugin_id = %plugin_id,
                        error = %e,
                        "Failed to install plugin {}",
                        plugin_id
                    );
                    return Err(e);
                }
                self.get_loaded_plugin(plugin_id)
                    .ok_or_else(|| PluginError::PluginNotFound {
                        plugin_id: plugin_id.to_string(),
                    })?
            }
        };

        self.run_callback(&plugin, Callback::Install).await;

        tracing::info!(target: "plugin_lifecycle", plugin_id = %plugin.id, "Plugin installed");
        self.events.emit(PluginEvent::installed(&plugin.id));
        Ok(())
    }

    /// Run `on_uninstall`, then unload the plugin
    pub async fn uninstall_plugin(&self, plugin_id: &str) -> PluginResult<()> {
        if let Some(plugin) = self.get_loaded_plugin(plugin_id) {
            self.run_callback(&plugin, Callback::Uninstall).await;
        }
        self.unload_plugin(plugin_id).await
    }

    async fn run_callback(&self, plugin: &LoadedPlugin, callback: Callback) {
        let Some(hooks) = plugin.lifecycle_hooks.as_ref() else {
            return;
        };

        let result = match callback {
            Callback::Install => hooks.on_install(&plugin.id).await,
            Callback::Activate => hooks.on_activate(&plugin.id).await,
            Callback::Deactivate => hooks.on_deactivate(&plugin.id).await,
            Callback::Uninstall => hooks.on_uninstall(&plugin.id).await,
        };

        if let Err(e) = result {
            tracing::error!(
                target: "plugin_lifecycle",
                plugin_id = %plugin.id,
                error = %e,
                "Error calling {} for plugin {}",
                callback.name(),
                plugin.id
            );
        }
    }

    /// Unload a plugin: drop its contributions, its backend record and its files
    pub async fn unload_plugin(&self, plugin_id: &str) -> PluginResult<()> {
        if !is_valid_plugin_id(plugin_id) {
            tracing::error!(target: "plugin_lifecycle", "Invalid plugin ID provided for unloading");
            return Err(PluginError::InvalidPluginId {
                plugin_id: plugin_id.to_string(),
            });
        }
        let plugin_id = plugin_id.trim();

        if self.get_loaded_plugin(plugin_id).is_none() {
            tracing::warn!(target: "plugin_lifecycle", "Plugin {} not found for unloading", plugin_id);
            return Err(PluginError::PluginNotFound {
                plugin_id: plugin_id.to_string(),
            });
        }

        if let Err(e) = self.index.remove_plugin(plugin_id).await {
            tracing::error!(
                target: "plugin_lifecycle",
                plugin_id = %plugin_id,
                error = %e,
                "Failed to unload plugin {}",
                plugin_id
            );
            return Err(e);
        }

        self.unregister_plugin(plugin_id);

        if let Err(e) = self.index.delete_plugin_files(plugin_id).await {
            tracing::warn!(
                target: "plugin_lifecycle",
                plugin_id = %plugin_id,
                error = %e,
                "Failed to delete plugin directory for {}",
                plugin_id
            );
        }

        self.plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|plugin| plugin.id != plugin_id);

        tracing::info!(target: "plugin_lifecycle", plugin_id = %plugin_id, "Plugin unloaded");
        self.events.emit(PluginEvent::unloaded(plugin_id));
        Ok(())
    }

    /// Switch a loaded plugin between `Active` and `Inactive`
    pub async fn toggle_plugin_status(&self, plugin_id: &str, status: PluginStatus) -> PluginResult<()> {
        if !is_valid_plugin_id(plugin_id) {
            tracing::error!(target: "plugin_lifecycle", "Invalid plugin ID provided for status toggle");
            return Err(PluginError::InvalidPluginId {
                plugin_id: plugin_id.to_string(),
            });
        }
        if status == PluginStatus::Error {
            tracing::error!(target: "plugin_lifecycle", "Invalid status value: {}", status);
            return Err(PluginError::InvalidStatus {
                status: status.to_string(),
            });
        }
        let plugin_id = plugin_id.trim();

        let Some(plugin) = self.get_loaded_plugin(plugin_id) else {
            tracing::error!(target: "plugin_lifecycle", "Plugin {} not found", plugin_id);
            return Err(PluginError::PluginNotFound {
                plugin_id: plugin_id.to_string(),
            });
        };
        if plugin.status == PluginStatus::Error {
            return Err(PluginError::InvalidStatus {
                status: plugin.status.to_string(),
            });
        }

        if let Err(e) = self.index.update_plugin_status(plugin_id, status).await {
            tracing::error!(
                target: "plugin_lifecycle",
                plugin_id = %plugin_id,
                error = %e,
                "Failed to toggle plugin status for {}",
                plugin_id
            );
            return Err(e);
        }

        match status {
            PluginStatus::Active => {
                self.run_callback(&plugin, Callback::Activate).await;
                self.register_plugin(&plugin);
            }
            _ => {
                self.run_callback(&plugin, Callback::Deactivate).await;
                self.unregister_plugin(plugin_id);
            }
        }

        if let Some(entry) = self
            .plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .iter_mut()
            .find(|p| p.id == plugin_id)
        {
            entry.status = status;
        }

        tracing::info!(target: "plugin_lifecycle", plugin_id = %plugin_id, status = %status, "Plugin status changed");
        self.events.emit(PluginEvent::status_changed(plugin_id, status));
        Ok(())
    }

    fn register_plugin(&self, plugin: &LoadedPlugin) {
        self.extensions
            .register_extension_points(&plugin.id, &plugin.manifest);
        if plugin.components.is_empty() {
            tracing::warn!(target: "plugin_lifecycle", plugin_id = %plugin.id, "No components found for plugin");
        }
        self.components
            .register_plugin_components(&plugin.id, plugin.components.clone());
    }

    fn unregister_plugin(&self, plugin_id: &str) {
        self.extensions.unregister_extension_points(plugin_id);
        self.components.unregister_plugin_components(plugin_id);
    }

    fn store(&self, plugin: LoadedPlugin) {
        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        match plugins.iter_mut().find(|p| p.id == plugin.id) {
            Some(existing) => *existing = plugin,
            None => plugins.push(plugin),
        }
    }

    /// Loaded plugins, in load order
    pub fn get_loaded_plugins(&self) -> Vec<LoadedPlugin> {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_loaded_plugin(&self, plugin_id: &str) -> Option<LoadedPlugin> {
        if !is_valid_plugin_id(plugin_id) {
            return None;
        }
        let plugin_id = plugin_id.trim();
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|p| p.id == plugin_id)
            .cloned()
    }

    /// A component export of an active plugin
    pub fn get_plugin_component(&self, plugin_id: &str, component: &str) -> Option<ComponentRef> {
        if component.is_empty() {
            return None;
        }
        self.get_loaded_plugin(plugin_id)
            .filter(LoadedPlugin::is_active)
            .and_then(|plugin| plugin.components.get(component).cloned())
    }

    /// Number of plugins, error entries included
    pub fn get_plugin_count(&self) -> usize {
        self.plugins.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn get_active_plugin_count(&self) -> usize {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|p| p.is_active())
            .count()
    }

    pub fn is_loaded(&self, plugin_id: &str) -> bool {
        self.get_loaded_plugin(plugin_id).is_some()
    }
}
