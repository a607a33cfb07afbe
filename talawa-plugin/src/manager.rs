//! Plugin manager: the single source of truth queried by hooks and views
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use talawa_config::PluginConfig;
use tokio::sync::{broadcast, Mutex};

use crate::backend::PluginBackend;
use crate::discovery::{DiscoveryConfig, PluginDiscovery, PluginIndex};
use crate::error::PluginResult;
use crate::events::{EventBus, Listener, ListenerId, PluginEvent};
use crate::extension::ExtensionPoint;
use crate::extension_registry::ExtensionRegistry;
use crate::lifecycle::{LifecycleManager, LoadedPlugin, PluginSummary};
use crate::loader::{
    CompositeManifestSource, DiscoveredManifestSource, FilesystemManifestSource, ManifestSource, ModuleLoader,
    StaticPluginLoader,
};
use crate::registry::{ComponentLookup, ComponentRegistry};
use crate::types::{ExtensionPointType, PluginEventKind, PluginStatus};
use crate::view::ComponentRef;

/// Read surface of the plugin manager consumed by hooks
pub trait PluginHost: Send + Sync {
    /// True once startup discovery has completed
    fn is_system_initialized(&self) -> bool;

    /// Snapshot of the entries registered under exactly `ty`
    fn get_extension_points(&self, ty: ExtensionPointType) -> Vec<ExtensionPoint>;

    fn get_loaded_plugins(&self) -> Vec<PluginSummary>;

    /// Subscribe to a lifecycle event
    fn on(&self, event: PluginEventKind, listener: Listener) -> ListenerId;

    /// Unsubscribe; returns whether the listener was registered
    fn off(&self, event: PluginEventKind, id: ListenerId) -> bool;
}

/// Plugin manager for orchestrating plugin lifecycle
pub struct PluginManager {
    config: PluginConfig,
    events: Arc<EventBus>,
    extensions: Arc<ExtensionRegistry>,
    components: Arc<ComponentRegistry>,
    index: Arc<PluginIndex>,
    modules: Arc<dyn ModuleLoader>,
    lifecycle: LifecycleManager,
    discovery: PluginDiscovery,
    discovered: Arc<DiscoveredManifestSource>,
    initialized: AtomicBool,
    init_lock: Mutex<()>,
}

impl PluginManager {
    /// Load the installed plugin index and every installed plugin, then
    /// announce `plugins:initialized`. Runs once; later calls only warn.
    pub async fn initialize_plugin_system(&self) -> PluginResult<()> {
        let _guard = self.init_lock.lock().await;
        if self.is_system_initialized() {
            tracing::warn!(target: "plugin_manager", "Plugin system is already initialized");
            return Ok(());
        }

        tracing::info!(target: "plugin_manager", "Initializing plugin system");

        let plugin_ids = self.index.discover_plugins().await;
        let loaded = self.load_all(&plugin_ids).await;

        self.initialized.store(true, Ordering::SeqCst);
        tracing::info!(
            target: "plugin_manager",
            discovered = plugin_ids.len(),
            loaded = loaded.len(),
            "Plugin system initialized"
        );
        self.events.emit(PluginEvent::initialized());
        Ok(())
    }

    async fn load_all(&self, plugin_ids: &[String]) -> Vec<String> {
        let results = join_all(plugin_ids.iter().map(|id| self.lifecycle.load_plugin(id))).await;

        plugin_ids
            .iter()
            .zip(results)
            .filter_map(|(id, result)| match result {
                Ok(()) => Some(id.clone()),
                Err(e) => {
                    tracing::warn!(
                        target: "plugin_manager",
                        plugin_id = %id,
                        error = %e,
                        "Plugin failed to load during discovery"
                    );
                    None
                }
            })
            .collect()
    }

    /// Re-run backend and filesystem discovery and load plugins not seen yet.
    ///
    /// Plugins found on disk load from the manifest discovery read, so their
    /// directory may sit anywhere within the discovery depth. Returns the ids
    /// that were newly loaded.
    pub async fn refresh_plugin_discovery(&self) -> PluginResult<Vec<String>> {
        let mut candidates = self.index.discover_plugins().await;
        for discovered in self.discovery.discover_plugins().await? {
            let plugin_id = discovered.manifest.plugin_id.clone();
            if self.lifecycle.is_loaded(&plugin_id) {
                continue;
            }
            tracing::debug!(
                target: "plugin_manager",
                plugin_id = %plugin_id,
                source = ?discovered.source_path,
                "Recording discovered manifest"
            );
            self.discovered.record(discovered.manifest);
            if !candidates.contains(&plugin_id) {
                candidates.push(plugin_id);
            }
        }

        let fresh: Vec<String> = candidates
            .into_iter()
            .filter(|id| !self.lifecycle.is_loaded(id))
            .collect();

        tracing::info!(target: "plugin_manager", candidates = fresh.len(), "Refreshing plugin discovery");
        Ok(self.load_all(&fresh).await)
    }

    pub async fn load_plugin(&self, plugin_id: &str) -> PluginResult<()> {
        self.lifecycle.load_plugin(plugin_id).await
    }

    pub async fn unload_plugin(&self, plugin_id: &str) -> PluginResult<()> {
        self.lifecycle.unload_plugin(plugin_id).await
    }

    /// Install a plugin whose files are already in place
    pub async fn install_plugin(&self, plugin_id: &str) -> PluginResult<()> {
        self.lifecycle.install_plugin(plugin_id).await
    }

    pub async fn uninstall_plugin(&self, plugin_id: &str) -> PluginResult<()> {
        self.lifecycle.uninstall_plugin(plugin_id).await
    }

    pub async fn activate_plugin(&self, plugin_id: &str) -> PluginResult<()> {
        self.toggle_plugin_status(plugin_id, PluginStatus::Active).await
    }

    pub async fn deactivate_plugin(&self, plugin_id: &str) -> PluginResult<()> {
        self.toggle_plugin_status(plugin_id, PluginStatus::Inactive).await
    }

    pub async fn toggle_plugin_status(&self, plugin_id: &str, status: PluginStatus) -> PluginResult<()> {
        self.lifecycle.toggle_plugin_status(plugin_id, status).await
    }

    pub fn get_loaded_plugin(&self, plugin_id: &str) -> Option<LoadedPlugin> {
        self.lifecycle.get_loaded_plugin(plugin_id)
    }

    pub fn get_plugin_count(&self) -> usize {
        self.lifecycle.get_plugin_count()
    }

    pub fn get_active_plugin_count(&self) -> usize {
        self.lifecycle.get_active_plugin_count()
    }

    /// Receive lifecycle events asynchronously
    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn component_registry(&self) -> &Arc<ComponentRegistry> {
        &self.components
    }

    pub fn extension_registry(&self) -> &Arc<ExtensionRegistry> {
        &self.extensions
    }

    pub fn plugin_index(&self) -> &Arc<PluginIndex> {
        &self.index
    }

    /// Loader used for plugin entry modules
    pub fn module_loader(&self) -> &Arc<dyn ModuleLoader> {
        &self.modules
    }
}

impl PluginHost for PluginManager {
    fn is_system_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn get_extension_points(&self, ty: ExtensionPointType) -> Vec<ExtensionPoint> {
        self.extensions.get_extension_points(ty)
    }

    fn get_loaded_plugins(&self) -> Vec<PluginSummary> {
        self.lifecycle
            .get_loaded_plugins()
            .iter()
            .map(PluginSummary::from)
            .collect()
    }

    fn on(&self, event: PluginEventKind, listener: Listener) -> ListenerId {
        self.events.on(event, listener)
    }

    fn off(&self, event: PluginEventKind, id: ListenerId) -> bool {
        self.events.off(event, id)
    }
}

impl ComponentLookup for PluginManager {
    /// Registry first, then the exports of active loaded plugins
    fn get_plugin_component(
        &self,
        plugin_id: &str,
        export_name: Option<&str>,
    ) -> PluginResult<Option<ComponentRef>> {
        if let Some(component) = self.components.get_plugin_component(plugin_id, export_name)? {
            return Ok(Some(component));
        }
        Ok(export_name.and_then(|name| self.lifecycle.get_plugin_component(plugin_id, name)))
    }
}

/// Plugin manager builder for fluent construction
pub struct PluginManagerBuilder {
    config: PluginConfig,
    manifests: Option<Arc<dyn ManifestSource>>,
    modules: Option<Arc<dyn ModuleLoader>>,
    static_loader: Option<Arc<StaticPluginLoader>>,
    backend: Option<Arc<dyn PluginBackend>>,
}

impl PluginManagerBuilder {
    /// Create a new plugin manager builder
    pub fn new() -> Self {
        Self {
            config: PluginConfig::default(),
            manifests: None,
            modules: None,
            static_loader: None,
            backend: None,
        }
    }

    /// Set plugin system configuration
    pub fn with_config(mut self, config: PluginConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_manifest_source(mut self, source: Arc<dyn ManifestSource>) -> Self {
        self.manifests = Some(source);
        self
    }

    pub fn with_module_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.modules = Some(loader);
        self
    }

    /// Use compiled-in plugins for both manifests and modules.
    ///
    /// Configured plugin directories are still consulted for manifests the
    /// static loader does not know.
    pub fn with_static_loader(mut self, loader: StaticPluginLoader) -> Self {
        self.static_loader = Some(Arc::new(loader));
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn PluginBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Build the plugin manager
    pub fn build(self) -> PluginManager {
        let static_loader = self.static_loader;
        let discovered = Arc::new(DiscoveredManifestSource::new());

        // Manifests recorded by discovery are consulted first
        let mut composite = CompositeManifestSource::new().with_source(discovered.clone());
        match self.manifests {
            Some(source) => composite.add_source(source),
            None => {
                if let Some(loader) = &static_loader {
                    composite.add_source(loader.clone());
                }
                for dir in &self.config.plugin_dirs {
                    composite.add_source(Arc::new(FilesystemManifestSource::new(dir)));
                }
            }
        }
        let manifests: Arc<dyn ManifestSource> = Arc::new(composite);
        let modules: Arc<dyn ModuleLoader> = match (self.modules, static_loader) {
            (Some(modules), _) => modules,
            (None, Some(loader)) => loader,
            (None, None) => Arc::new(StaticPluginLoader::new()),
        };

        let events = Arc::new(EventBus::new(self.config.event_buffer_size));
        let extensions = Arc::new(ExtensionRegistry::new());
        let components = Arc::new(ComponentRegistry::new());
        let index = Arc::new(PluginIndex::new(self.backend));

        let lifecycle = LifecycleManager::new(
            manifests,
            modules.clone(),
            index.clone(),
            extensions.clone(),
            components.clone(),
            events.clone(),
        )
        .with_module_base_path(self.config.module_base_path.clone());
        let discovery = PluginDiscovery::new(DiscoveryConfig::from(&self.config));

        PluginManager {
            config: self.config,
            events,
            extensions,
            components,
            index,
            modules,
            lifecycle,
            discovery,
            discovered,
            initialized: AtomicBool::new(false),
            init_lock: Mutex::new(()),
        }
    }

    /// Build the manager and run startup discovery when `auto_initialize` is set
    pub async fn start(self) -> PluginResult<Arc<PluginManager>> {
        let manager = Arc::new(self.build());
        if manager.config.auto_initialize {
            manager.initialize_plugin_system().await?;
        }
        Ok(manager)
    }
}

impl Default for PluginManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
