//! Plugin discovery
//!
//! Two sources feed the plugin system: the backend's index of installed
//! plugins ([`PluginIndex`]) and manifests found on disk
//! ([`PluginDiscovery`]).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use talawa_config::PluginConfig;
use walkdir::WalkDir;

use crate::backend::{PluginBackend, PluginRecord};
use crate::error::PluginResult;
use crate::manifest::PluginManifest;
use crate::types::PluginStatus;

/// Manifest file name looked for during discovery
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Discovered plugin information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredPlugin {
    /// Plugin manifest
    pub manifest: PluginManifest,
    /// Manifest path
    pub source_path: PathBuf,
    /// Discovery timestamp
    pub discovered_at: chrono::DateTime<chrono::Utc>,
    /// Manifest size in bytes
    pub size_bytes: u64,
    /// File checksums for integrity verification
    pub checksums: HashMap<String, String>,
}

impl DiscoveredPlugin {
    /// Create a new discovered plugin
    pub fn new(manifest: PluginManifest, source_path: PathBuf) -> Self {
        Self {
            manifest,
            source_path,
            discovered_at: chrono::Utc::now(),
            size_bytes: 0,
            checksums: HashMap::new(),
        }
    }

    /// Set manifest size
    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    /// Add checksum
    pub fn with_checksum(mut self, algorithm: impl Into<String>, checksum: impl Into<String>) -> Self {
        self.checksums.insert(algorithm.into(), checksum.into());
        self
    }

    /// Unique identifier for discovery, `pluginId:version`
    pub fn discovery_id(&self) -> String {
        format!("{}:{}", self.manifest.plugin_id, self.manifest.version)
    }

    /// Directory holding the plugin
    pub fn plugin_dir(&self) -> Option<&Path> {
        self.source_path.parent()
    }
}

/// Filesystem discovery configuration
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Paths to search for plugins
    pub search_paths: Vec<PathBuf>,
    /// Maximum search depth
    pub max_depth: usize,
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to calculate checksums
    pub calculate_checksums: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::from(&PluginConfig::default())
    }
}

impl From<&PluginConfig> for DiscoveryConfig {
    fn from(config: &PluginConfig) -> Self {
        Self {
            search_paths: config.plugin_dirs.clone(),
            max_depth: config.max_discovery_depth,
            follow_symlinks: false,
            calculate_checksums: config.calculate_checksums,
        }
    }
}

/// Finds plugin manifests on disk
pub struct PluginDiscovery {
    config: DiscoveryConfig,
}

impl PluginDiscovery {
    /// Create a new plugin discovery service
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Discover plugins in configured search paths, deduplicated by `pluginId:version`
    pub async fn discover_plugins(&self) -> PluginResult<Vec<DiscoveredPlugin>> {
        let mut discovered = Vec::new();

        for search_path in &self.config.search_paths {
            if !search_path.exists() {
                tracing::debug!(
                    target: "plugin_discovery",
                    path = ?search_path,
                    "Search path does not exist, skipping"
                );
                continue;
            }

            discovered.extend(self.discover_in_path(search_path).await?);
        }

        Ok(deduplicate_plugins(discovered))
    }

    /// Discover plugins in a specific path
    pub async fn discover_in_path(&self, path: &Path) -> PluginResult<Vec<DiscoveredPlugin>> {
        tracing::info!(target: "plugin_discovery", path = ?path, "Starting plugin discovery");

        // Walk synchronously, then read manifests without holding the iterator
        let mut manifests: Vec<PathBuf> = WalkDir::new(path)
            .max_depth(self.config.max_depth)
            .follow_links(self.config.follow_symlinks)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.file_name() == MANIFEST_FILE_NAME)
            .map(|entry| entry.into_path())
            .collect();
        manifests.sort();

        let mut discovered = Vec::new();
        for manifest_path in manifests {
            match self.discover_plugin_from_file(&manifest_path).await {
                Ok(plugin) => discovered.push(plugin),
                Err(e) => {
                    tracing::warn!(
                        target: "plugin_discovery",
                        file = ?manifest_path,
                        error = %e,
                        "Failed to discover plugin from file"
                    );
                }
            }
        }

        tracing::info!(
            target: "plugin_discovery",
            path = ?path,
            count = discovered.len(),
            "Plugin discovery completed"
        );

        Ok(discovered)
    }

    async fn discover_plugin_from_file(&self, path: &Path) -> PluginResult<DiscoveredPlugin> {
        let content = tokio::fs::read(path).await?;
        let manifest: PluginManifest = serde_json::from_slice(&content)?;
        manifest.validate()?;

        let mut discovered =
            DiscoveredPlugin::new(manifest, path.to_path_buf()).with_size(content.len() as u64);

        if self.config.calculate_checksums {
            discovered = discovered.with_checksum("sha256", calculate_checksum(&content));
        }

        Ok(discovered)
    }

    /// Get discovery configuration
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }
}

fn calculate_checksum(content: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Keep the first plugin found for each `pluginId:version`
fn deduplicate_plugins(plugins: Vec<DiscoveredPlugin>) -> Vec<DiscoveredPlugin> {
    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut unique = Vec::new();

    for plugin in plugins {
        let key = plugin.discovery_id();
        if let Some(original_path) = seen.get(&key) {
            tracing::warn!(
                target: "plugin_discovery",
                plugin_id = %plugin.manifest.plugin_id,
                version = %plugin.manifest.version,
                duplicate_path = ?plugin.source_path,
                original_path = ?original_path,
                "Duplicate plugin discovered, keeping first found"
            );
            continue;
        }
        seen.insert(key, plugin.source_path.clone());
        unique.push(plugin);
    }

    unique
}

/// Local copy of the backend's installed-plugin index
#[derive(Default)]
pub struct PluginIndex {
    backend: RwLock<Option<Arc<dyn PluginBackend>>>,
    records: RwLock<Vec<PluginRecord>>,
}

impl PluginIndex {
    pub fn new(backend: Option<Arc<dyn PluginBackend>>) -> Self {
        Self {
            backend: RwLock::new(backend),
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn set_backend(&self, backend: Arc<dyn PluginBackend>) {
        *self.backend.write().unwrap_or_else(PoisonError::into_inner) = Some(backend);
    }

    pub fn has_backend(&self) -> bool {
        self.backend().is_some()
    }

    fn backend(&self) -> Option<Arc<dyn PluginBackend>> {
        self.backend
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current index snapshot
    pub fn plugin_index(&self) -> Vec<PluginRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_plugin_index(&self, records: Vec<PluginRecord>) {
        *self.records.write().unwrap_or_else(PoisonError::into_inner) = records;
    }

    pub fn find_plugin(&self, plugin_id: &str) -> Option<PluginRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|record| record.plugin_id == plugin_id)
            .cloned()
    }

    /// Whether the backend marks the plugin activated; unknown plugins are not
    pub fn is_plugin_activated(&self, plugin_id: &str) -> bool {
        self.find_plugin(plugin_id)
            .is_some_and(|record| record.is_activated)
    }

    /// Refresh the index from the backend and return the installed plugin ids.
    ///
    /// Failures are logged and yield an empty list.
    pub async fn discover_plugins(&self) -> Vec<String> {
        let Some(backend) = self.backend() else {
            tracing::warn!(target: "plugin_discovery", "No backend available for plugin discovery");
            return Vec::new();
        };

        match backend.list_plugins().await {
            Ok(records) => {
                let mut seen = HashSet::new();
                let ids = records
                    .iter()
                    .filter(|record| seen.insert(record.plugin_id.clone()))
                    .map(|record| record.plugin_id.clone())
                    .collect();
                self.set_plugin_index(records);
                ids
            }
            Err(e) => {
                tracing::error!(target: "plugin_discovery", error = %e, "Backend discovery failed");
                Vec::new()
            }
        }
    }

    /// Reload the index from the backend; failures are logged and the index kept
    pub async fn load_plugin_index(&self) {
        let Some(backend) = self.backend() else {
            return;
        };

        match backend.list_plugins().await {
            Ok(records) => self.set_plugin_index(records),
            Err(e) => {
                tracing::error!(
                    target: "plugin_discovery",
                    error = %e,
                    "Failed to load plugin index from backend"
                );
            }
        }
    }

    /// Make sure the backend has a record for `plugin_id`; failures are only warned
    pub async fn sync_plugin(&self, plugin_id: &str) {
        let Some(backend) = self.backend() else {
            return;
        };
        if self.find_plugin(plugin_id).is_some() {
            return;
        }

        match backend.create_plugin(plugin_id).await {
            Ok(_) => self.load_plugin_index().await,
            Err(e) => {
                tracing::warn!(
                    target: "plugin_discovery",
                    plugin_id = %plugin_id,
                    error = %e,
                    "Failed to sync plugin with backend"
                );
            }
        }
    }

    /// Delete the backend record of `plugin_id`
    pub async fn remove_plugin(&self, plugin_id: &str) -> PluginResult<()> {
        let Some(backend) = self.backend() else {
            return Ok(());
        };
        let Some(record) = self.find_plugin(plugin_id) else {
            return Ok(());
        };

        backend.delete_plugin(&record.id).await?;
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|r| r.plugin_id != plugin_id);
        Ok(())
    }

    /// Persist a status change, creating the record first when it is missing
    pub async fn update_plugin_status(&self, plugin_id: &str, status: PluginStatus) -> PluginResult<()> {
        let Some(backend) = self.backend() else {
            return Ok(());
        };

        let record = match self.find_plugin(plugin_id) {
            Some(record) => record,
            None => match backend.create_plugin(plugin_id).await? {
                Some(record) => record,
                None => {
                    tracing::warn!(
                        target: "plugin_discovery",
                        plugin_id = %plugin_id,
                        "Backend declined to create plugin record"
                    );
                    return Ok(());
                }
            },
        };

        backend
            .update_plugin_status(&record.id, status == PluginStatus::Active)
            .await?;
        self.load_plugin_index().await;
        Ok(())
    }

    /// Delete installed files of `plugin_id`
    pub async fn delete_plugin_files(&self, plugin_id: &str) -> PluginResult<()> {
        match self.backend() {
            Some(backend) => backend.delete_plugin_files(plugin_id).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendOperation, InMemoryPluginBackend};
    use serde_json::json;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, plugin_id: &str, version: &str) {
        std::fs::create_dir_all(dir).unwrap();
        let manifest = json!({
            "name": plugin_id,
            "pluginId": plugin_id,
            "version": version,
            "description": "A test plugin",
            "author": "Test Author",
            "main": "index.js"
        });
        std::fs::write(dir.join(MANIFEST_FILE_NAME), manifest.to_string()).unwrap();
    }

    fn discovery_for(paths: Vec<PathBuf>, checksums: bool) -> PluginDiscovery {
        PluginDiscovery::new(DiscoveryConfig {
            search_paths: paths,
            max_depth: 3,
            follow_symlinks: false,
            calculate_checksums: checksums,
        })
    }

    #[tokio::test]
    async fn test_filesystem_discovery() {
        let temp_dir = TempDir::new().unwrap();
        write_manifest(&temp_dir.path().join("alpha"), "alpha", "1.0.0");
        write_manifest(&temp_dir.path().join("beta"), "beta", "0.2.0");
        std::fs::create_dir_all(temp_dir.path().join("broken")).unwrap();
        std::fs::write(temp_dir.path().join("broken").join(MANIFEST_FILE_NAME), "{}").unwrap();

        let discovery = discovery_for(vec![temp_dir.path().to_path_buf(), PathBuf::from("/nonexistent/plugins")], true);
        let plugins = discovery.discover_plugins().await.unwrap();

        assert_eq!(plugins.len(), 2);
        assert_eq!(plugins[0].discovery_id(), "alpha:1.0.0");
        assert_eq!(plugins[0].checksums.get("sha256").map(String::len), Some(64));
        assert!(plugins[0].size_bytes > 0);
        assert_eq!(plugins[1].plugin_dir(), Some(temp_dir.path().join("beta").as_path()));
    }

    #[tokio::test]
    async fn test_discovery_deduplicates_across_paths() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_manifest(&first.path().join("alpha"), "alpha", "1.0.0");
        write_manifest(&second.path().join("alpha"), "alpha", "1.0.0");
        write_manifest(&second.path().join("alpha2"), "alpha", "2.0.0");

        let discovery = discovery_for(vec![first.path().to_path_buf(), second.path().to_path_buf()], false);
        let plugins = discovery.discover_plugins().await.unwrap();

        assert_eq!(plugins.len(), 2);
        assert!(plugins[0].source_path.starts_with(first.path()));
        assert!(plugins.iter().all(|p| p.checksums.is_empty()));
    }

    #[test]
    fn test_config_from_plugin_config() {
        let config = DiscoveryConfig::from(&PluginConfig::default());
        assert_eq!(config.search_paths, vec![PathBuf::from("./plugins")]);
        assert_eq!(config.max_depth, 3);
        assert!(!config.calculate_checksums);
    }

    #[tokio::test]
    async fn test_index_without_backend() {
        let index = PluginIndex::default();
        assert!(index.discover_plugins().await.is_empty());
        index.sync_plugin("testPlugin").await;
        assert!(index.plugin_index().is_empty());
        assert!(index.update_plugin_status("testPlugin", PluginStatus::Active).await.is_ok());

        index.set_plugin_index(vec![PluginRecord::new("1", "testPlugin")]);
        index.remove_plugin("testPlugin").await.unwrap();
        assert_eq!(index.plugin_index().len(), 1);
    }

    #[tokio::test]
    async fn test_index_discovery_deduplicates() {
        let record = PluginRecord::new("1", "testPlugin").activated(true);
        let backend = Arc::new(InMemoryPluginBackend::with_records(vec![record.clone(), record]));
        let index = PluginIndex::new(Some(backend));

        assert_eq!(index.discover_plugins().await, vec!["testPlugin"]);
        assert!(index.is_plugin_activated("testPlugin"));
        assert!(!index.is_plugin_activated("other"));
    }

    #[tokio::test]
    async fn test_index_backend_failure() {
        let backend = Arc::new(InMemoryPluginBackend::new());
        backend.fail_on(BackendOperation::List);
        let index = PluginIndex::new(Some(backend));
        assert!(index.discover_plugins().await.is_empty());
    }

    #[tokio::test]
    async fn test_sync_creates_missing_record_once() {
        let backend = Arc::new(InMemoryPluginBackend::new());
        let index = PluginIndex::new(Some(backend.clone()));

        index.sync_plugin("testPlugin").await;
        index.sync_plugin("testPlugin").await;

        assert_eq!(backend.records().len(), 1);
        assert_eq!(index.find_plugin("testPlugin").map(|r| r.is_activated), Some(false));
    }

    #[tokio::test]
    async fn test_status_update_creates_then_updates() {
        let backend = Arc::new(InMemoryPluginBackend::new());
        let index = PluginIndex::new(Some(backend.clone()));

        index.update_plugin_status("newPlugin", PluginStatus::Active).await.unwrap();
        assert!(index.is_plugin_activated("newPlugin"));

        index.update_plugin_status("newPlugin", PluginStatus::Inactive).await.unwrap();
        assert!(!index.is_plugin_activated("newPlugin"));
    }

    #[tokio::test]
    async fn test_remove_plugin() {
        let backend = Arc::new(InMemoryPluginBackend::with_records(vec![PluginRecord::new("1", "testPlugin")]));
        let index = PluginIndex::new(Some(backend.clone()));
        index.load_plugin_index().await;

        backend.fail_on(BackendOperation::Delete);
        assert!(index.remove_plugin("testPlugin").await.is_err());
        assert!(index.find_plugin("testPlugin").is_some());

        backend.recover(BackendOperation::Delete);
        index.remove_plugin("testPlugin").await.unwrap();
        assert!(index.plugin_index().is_empty());
        assert!(backend.records().is_empty());

        // Unknown plugins are ignored
        index.remove_plugin("nonExistent").await.unwrap();
    }
}
