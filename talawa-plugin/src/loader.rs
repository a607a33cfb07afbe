//! Plugin module and manifest loading
//!
//! A plugin module is a table of named component exports plus an optional
//! default export. [`ModuleLoader`] imports modules by plugin id and
//! [`ManifestSource`] supplies manifests. Plugins compiled into the binary
//! go through [`StaticPluginLoader`], which implements both.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{PluginError, PluginResult};
use crate::manifest::{normalize_main_file, PluginManifest};
use crate::registry::ComponentMap;
use crate::view::ComponentRef;

/// Export name of the default component
pub const DEFAULT_EXPORT: &str = "default";

/// Callbacks a plugin runs around its lifecycle transitions.
///
/// Every callback defaults to a no-op. Failures are logged by the lifecycle
/// manager and never abort the transition.
#[async_trait]
pub trait PluginLifecycleHooks: Send + Sync + fmt::Debug {
    async fn on_install(&self, _plugin_id: &str) -> PluginResult<()> {
        Ok(())
    }

    async fn on_activate(&self, _plugin_id: &str) -> PluginResult<()> {
        Ok(())
    }

    async fn on_deactivate(&self, _plugin_id: &str) -> PluginResult<()> {
        Ok(())
    }

    async fn on_uninstall(&self, _plugin_id: &str) -> PluginResult<()> {
        Ok(())
    }
}

/// Entry module of a plugin
#[derive(Clone, Default)]
pub struct PluginModule {
    exports: HashMap<String, ComponentRef>,
    default: Option<ComponentRef>,
    lifecycle_hooks: Option<Arc<dyn PluginLifecycleHooks>>,
}

impl fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.exports.keys().collect();
        names.sort();
        f.debug_struct("PluginModule")
            .field("exports", &names)
            .field("has_default", &self.default.is_some())
            .field("lifecycle_hooks", &self.lifecycle_hooks)
            .finish()
    }
}

impl PluginModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named export
    pub fn with_export(mut self, name: impl Into<String>, component: ComponentRef) -> Self {
        self.exports.insert(name.into(), component);
        self
    }

    /// Set the default export
    pub fn with_default(mut self, component: ComponentRef) -> Self {
        self.default = Some(component);
        self
    }

    /// Attach lifecycle callbacks
    pub fn with_lifecycle_hooks(mut self, hooks: Arc<dyn PluginLifecycleHooks>) -> Self {
        self.lifecycle_hooks = Some(hooks);
        self
    }

    pub fn lifecycle_hooks(&self) -> Option<Arc<dyn PluginLifecycleHooks>> {
        self.lifecycle_hooks.clone()
    }

    pub fn named(&self, name: &str) -> Option<ComponentRef> {
        self.exports.get(name).cloned()
    }

    pub fn default_export(&self) -> Option<ComponentRef> {
        self.default.clone()
    }

    /// Resolve `component`: the named export first, then the default export
    pub fn resolve(&self, component: &str, plugin_id: &str) -> PluginResult<ComponentRef> {
        self.named(component)
            .or_else(|| self.default_export())
            .ok_or_else(|| PluginError::ComponentNotFound {
                component: component.to_string(),
                plugin_id: plugin_id.to_string(),
            })
    }

    /// Every export as a component map; the default export is keyed `default`
    pub fn components(&self) -> ComponentMap {
        let mut components = self.exports.clone();
        if let Some(default) = &self.default {
            components
                .entry(DEFAULT_EXPORT.to_string())
                .or_insert_with(|| Arc::clone(default));
        }
        components
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty() && self.default.is_none()
    }
}

/// Imports plugin entry modules
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Import the entry module of `plugin_id`
    async fn import(&self, plugin_id: &str) -> PluginResult<PluginModule>;

    /// Get loader name/type
    fn loader_type(&self) -> &'static str;
}

/// Supplies plugin manifests
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Load and validate the manifest of `plugin_id`
    async fn load_manifest(&self, plugin_id: &str) -> PluginResult<PluginManifest>;

    /// Check if the source knows the plugin
    fn can_load(&self, plugin_id: &str) -> bool;

    /// Get source name/type
    fn source_type(&self) -> &'static str;
}

/// Path of a plugin entry module under `base_path`
pub fn module_path(base_path: &str, plugin_id: &str, main: &str) -> String {
    format!(
        "{}/{}/{}",
        base_path.trim_end_matches('/'),
        plugin_id,
        normalize_main_file(main)
    )
}

/// Builds a fresh module on every import
pub type ModuleFactory = Arc<dyn Fn() -> PluginResult<PluginModule> + Send + Sync>;

struct StaticBundle {
    manifest: Option<PluginManifest>,
    factory: ModuleFactory,
}

/// Loader for plugins compiled into the binary
#[derive(Default)]
pub struct StaticPluginLoader {
    bundles: HashMap<String, StaticBundle>,
}

impl StaticPluginLoader {
    /// Create a new static plugin loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module factory for `plugin_id`
    pub fn add_factory(&mut self, plugin_id: impl Into<String>, factory: ModuleFactory) {
        let plugin_id = plugin_id.into();
        let manifest = self.bundles.remove(&plugin_id).and_then(|b| b.manifest);
        self.bundles
            .insert(plugin_id, StaticBundle { manifest, factory });
    }

    /// Register a prebuilt module for `plugin_id`
    pub fn add_module(&mut self, plugin_id: impl Into<String>, module: PluginModule) {
        self.add_factory(plugin_id, Arc::new(move || Ok(module.clone())));
    }

    /// Register a manifest together with its module
    pub fn add_bundle(&mut self, manifest: PluginManifest, module: PluginModule) {
        let plugin_id = manifest.plugin_id.clone();
        self.add_module(plugin_id.clone(), module);
        if let Some(bundle) = self.bundles.get_mut(&plugin_id) {
            bundle.manifest = Some(manifest);
        }
    }

    /// Builder-style [`add_bundle`](Self::add_bundle)
    pub fn with_bundle(mut self, manifest: PluginManifest, module: PluginModule) -> Self {
        self.add_bundle(manifest, module);
        self
    }

    /// Builder-style [`add_module`](Self::add_module)
    pub fn with_module(mut self, plugin_id: impl Into<String>, module: PluginModule) -> Self {
        self.add_module(plugin_id, module);
        self
    }

    /// Ids of compiled-in plugins, sorted
    pub fn plugin_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.bundles.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl ModuleLoader for StaticPluginLoader {
    async fn import(&self, plugin_id: &str) -> PluginResult<PluginModule> {
        let bundle = self
            .bundles
            .get(plugin_id)
            .ok_or_else(|| PluginError::module_load_failed(plugin_id, "no module registered"))?;

        tracing::debug!(target: "plugin_loader", plugin_id = %plugin_id, "Importing static plugin module");
        (bundle.factory)()
    }

    fn loader_type(&self) -> &'static str {
        "static"
    }
}

#[async_trait]
impl ManifestSource for StaticPluginLoader {
    async fn load_manifest(&self, plugin_id: &str) -> PluginResult<PluginManifest> {
        let manifest = self
            .bundles
            .get(plugin_id)
            .and_then(|bundle| bundle.manifest.clone())
            .ok_or_else(|| PluginError::ManifestNotFound {
                plugin_id: plugin_id.to_string(),
            })?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn can_load(&self, plugin_id: &str) -> bool {
        self.bundles
            .get(plugin_id)
            .is_some_and(|bundle| bundle.manifest.is_some())
    }

    fn source_type(&self) -> &'static str {
        "static"
    }
}

/// Reads `<root>/<plugin_id>/manifest.json`
#[derive(Debug, Clone)]
pub struct FilesystemManifestSource {
    root: PathBuf,
}

impl FilesystemManifestSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn manifest_path(&self, plugin_id: &str) -> PathBuf {
        self.root.join(plugin_id).join("manifest.json")
    }
}

#[async_trait]
impl ManifestSource for FilesystemManifestSource {
    async fn load_manifest(&self, plugin_id: &str) -> PluginResult<PluginManifest> {
        let path = self.manifest_path(plugin_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PluginError::ManifestNotFound {
                    plugin_id: plugin_id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let manifest: PluginManifest = serde_json::from_str(&content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn can_load(&self, plugin_id: &str) -> bool {
        self.manifest_path(plugin_id).is_file()
    }

    fn source_type(&self) -> &'static str {
        "filesystem"
    }
}

/// Manifests recorded by a discovery walk, keyed by plugin id.
///
/// Serves plugins whose manifest lives anywhere under a plugin directory,
/// not only at `<root>/<plugin_id>/manifest.json`.
#[derive(Default)]
pub struct DiscoveredManifestSource {
    manifests: RwLock<HashMap<String, PluginManifest>>,
}

impl DiscoveredManifestSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a discovered manifest, replacing any earlier one for the id
    pub fn record(&self, manifest: PluginManifest) {
        self.manifests
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(manifest.plugin_id.clone(), manifest);
    }

    pub fn len(&self) -> usize {
        self.manifests.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ManifestSource for DiscoveredManifestSource {
    async fn load_manifest(&self, plugin_id: &str) -> PluginResult<PluginManifest> {
        let manifest = self
            .manifests
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(plugin_id)
            .cloned()
            .ok_or_else(|| PluginError::ManifestNotFound {
                plugin_id: plugin_id.to_string(),
            })?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn can_load(&self, plugin_id: &str) -> bool {
        self.manifests
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(plugin_id)
    }

    fn source_type(&self) -> &'static str {
        "discovered"
    }
}

/// Tries each manifest source in order
#[derive(Default)]
pub struct CompositeManifestSource {
    sources: Vec<Arc<dyn ManifestSource>>,
}

impl CompositeManifestSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, source: Arc<dyn ManifestSource>) {
        self.sources.push(source);
    }

    pub fn with_source(mut self, source: Arc<dyn ManifestSource>) -> Self {
        self.add_source(source);
        self
    }
}

#[async_trait]
impl ManifestSource for CompositeManifestSource {
    async fn load_manifest(&self, plugin_id: &str) -> PluginResult<PluginManifest> {
        for source in &self.sources {
            if source.can_load(plugin_id) {
                match source.load_manifest(plugin_id).await {
                    Ok(manifest) => return Ok(manifest),
                    Err(e) => {
                        tracing::debug!(
                            target: "plugin_loader",
                            source_type = source.source_type(),
                            plugin_id = %plugin_id,
                            error = %e,
                            "Manifest loading failed with source, trying next"
                        );
                    }
                }
            }
        }

        Err(PluginError::ManifestNotFound {
            plugin_id: plugin_id.to_string(),
        })
    }

    fn can_load(&self, plugin_id: &str) -> bool {
        self.sources.iter().any(|source| source.can_load(plugin_id))
    }

    fn source_type(&self) -> &'static str {
        "composite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{text_component, Props};
    use serde_json::json;
    use tempfile::TempDir;

    fn manifest(plugin_id: &str) -> PluginManifest {
        serde_json::from_value(json!({
            "name": "Test Plugin",
            "pluginId": plugin_id,
            "version": "1.0.0",
            "description": "A test plugin",
            "author": "Test Author",
            "main": "index"
        }))
        .unwrap()
    }

    fn render(component: &ComponentRef) -> String {
        component.render(&Props::new()).unwrap().text_content()
    }

    #[test]
    fn test_resolution_prefers_named_export() {
        let module = PluginModule::new()
            .with_export("Comp", text_component("Comp", "named"))
            .with_default(text_component("default", "fallback"));

        assert_eq!(render(&module.resolve("Comp", "p1").unwrap()), "named");
        assert_eq!(render(&module.resolve("Other", "p1").unwrap()), "fallback");
        assert_eq!(module.components().len(), 2);
    }

    #[test]
    fn test_resolution_without_any_export() {
        let err = PluginModule::new().resolve("Missing", "p2").unwrap_err();
        assert_eq!(err.to_string(), "Component 'Missing' not found in plugin 'p2'");
    }

    #[test]
    fn test_module_path() {
        assert_eq!(module_path("/plugins", "p1", "index.ts"), "/plugins/p1/index.ts");
        assert_eq!(module_path("/plugins/", "p1", "index"), "/plugins/p1/index.js");
    }

    #[tokio::test]
    async fn test_static_loader() {
        let loader = StaticPluginLoader::new()
            .with_bundle(manifest("testPlugin"), PluginModule::new().with_export("A", text_component("A", "a")))
            .with_module("moduleOnly", PluginModule::new());

        assert_eq!(loader.plugin_ids(), vec!["moduleOnly", "testPlugin"]);
        assert!(loader.import("testPlugin").await.unwrap().named("A").is_some());
        assert!(matches!(
            loader.import("unknown").await,
            Err(PluginError::ModuleLoadFailed { .. })
        ));

        assert!(ManifestSource::can_load(&loader, "testPlugin"));
        assert!(!ManifestSource::can_load(&loader, "moduleOnly"));
        assert_eq!(loader.load_manifest("testPlugin").await.unwrap().plugin_id, "testPlugin");
        assert!(matches!(
            loader.load_manifest("moduleOnly").await,
            Err(PluginError::ManifestNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_filesystem_manifest_source() {
        let temp_dir = TempDir::new().unwrap();
        let plugin_dir = temp_dir.path().join("testPlugin");
        std::fs::create_dir_all(&plugin_dir).unwrap();
        std::fs::write(
            plugin_dir.join("manifest.json"),
            serde_json::to_string(&manifest("testPlugin")).unwrap(),
        )
        .unwrap();

        let broken_dir = temp_dir.path().join("broken");
        std::fs::create_dir_all(&broken_dir).unwrap();
        std::fs::write(broken_dir.join("manifest.json"), "{ not json").unwrap();

        let invalid_dir = temp_dir.path().join("invalid");
        std::fs::create_dir_all(&invalid_dir).unwrap();
        std::fs::write(invalid_dir.join("manifest.json"), r#"{"name": "", "pluginId": "invalid", "version": "1.0.0", "description": "d", "author": "a", "main": "index.js"}"#).unwrap();

        let source = FilesystemManifestSource::new(temp_dir.path());
        assert!(source.can_load("testPlugin"));
        assert_eq!(source.load_manifest("testPlugin").await.unwrap().main_file(), "index.js");

        assert!(matches!(
            source.load_manifest("missing").await,
            Err(PluginError::ManifestNotFound { .. })
        ));
        assert!(matches!(
            source.load_manifest("broken").await,
            Err(PluginError::Serialization(_))
        ));
        assert!(matches!(
            source.load_manifest("invalid").await,
            Err(PluginError::InvalidManifest { .. })
        ));
    }

    #[derive(Debug)]
    struct NoopHooks;

    impl PluginLifecycleHooks for NoopHooks {}

    #[tokio::test]
    async fn test_lifecycle_hooks_default_to_noops() {
        let module = PluginModule::new().with_lifecycle_hooks(Arc::new(NoopHooks));
        let hooks = module.lifecycle_hooks().unwrap();

        assert!(hooks.on_install("p1").await.is_ok());
        assert!(hooks.on_uninstall("p1").await.is_ok());
        // Callbacks are not exports
        assert!(module.is_empty());
        assert!(module.clone().lifecycle_hooks().is_some());
        assert!(PluginModule::new().lifecycle_hooks().is_none());
    }

    #[tokio::test]
    async fn test_discovered_source() {
        let source = DiscoveredManifestSource::new();
        assert!(source.is_empty());
        assert!(!source.can_load("vendorPlugin"));

        source.record(manifest("vendorPlugin"));
        assert_eq!(source.len(), 1);
        assert!(source.can_load("vendorPlugin"));
        assert_eq!(source.load_manifest("vendorPlugin").await.unwrap().plugin_id, "vendorPlugin");
        assert!(matches!(
            source.load_manifest("other").await,
            Err(PluginError::ManifestNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_composite_source_falls_through() {
        let temp_dir = TempDir::new().unwrap();
        let plugin_dir = temp_dir.path().join("diskPlugin");
        std::fs::create_dir_all(&plugin_dir).unwrap();
        std::fs::write(
            plugin_dir.join("manifest.json"),
            serde_json::to_string(&manifest("diskPlugin")).unwrap(),
        )
        .unwrap();

        let composite = CompositeManifestSource::new()
            .with_source(Arc::new(StaticPluginLoader::new().with_bundle(manifest("staticPlugin"), PluginModule::new())))
            .with_source(Arc::new(FilesystemManifestSource::new(temp_dir.path())));

        assert!(composite.load_manifest("staticPlugin").await.is_ok());
        assert!(composite.load_manifest("diskPlugin").await.is_ok());
        assert!(composite.load_manifest("nowhere").await.is_err());
    }
}
