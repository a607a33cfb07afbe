//! Per-type storage of the extension points contributed by active plugins

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::extension::ExtensionPoint;
use crate::manifest::PluginManifest;
use crate::types::ExtensionPointType;

/// Extension points grouped by type
pub type ExtensionSnapshot = HashMap<ExtensionPointType, Vec<ExtensionPoint>>;

/// Registry of extension points keyed by [`ExtensionPointType`]
pub struct ExtensionRegistry {
    points: RwLock<ExtensionSnapshot>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionRegistry {
    /// Create a registry with an empty list for every type
    pub fn new() -> Self {
        let points = ExtensionPointType::ALL
            .iter()
            .map(|ty| (*ty, Vec::new()))
            .collect();
        Self {
            points: RwLock::new(points),
        }
    }

    /// Register the extension points a manifest declares, owned by `plugin_id`.
    ///
    /// Entries previously registered for the plugin are removed first, so
    /// re-registration never duplicates.
    pub fn register_extension_points(&self, plugin_id: &str, manifest: &PluginManifest) {
        let mut points = self.points.write().unwrap_or_else(PoisonError::into_inner);
        Self::remove_plugin(&mut points, plugin_id);

        let mut registered = 0;
        for ty in ExtensionPointType::ALL {
            let entries = manifest.extension_points.entries(ty);
            if entries.is_empty() {
                continue;
            }
            let bucket = points.entry(ty).or_default();
            for mut entry in entries {
                entry.set_plugin_id(plugin_id);
                bucket.push(entry);
                registered += 1;
            }
        }

        tracing::debug!(
            target: "plugin_registry",
            plugin_id = %plugin_id,
            extension_points = registered,
            "Extension points registered"
        );
    }

    /// Remove every extension point owned by `plugin_id`
    pub fn unregister_extension_points(&self, plugin_id: &str) {
        let mut points = self.points.write().unwrap_or_else(PoisonError::into_inner);
        Self::remove_plugin(&mut points, plugin_id);
    }

    fn remove_plugin(points: &mut ExtensionSnapshot, plugin_id: &str) {
        for bucket in points.values_mut() {
            bucket.retain(|entry| entry.plugin_id() != Some(plugin_id));
        }
    }

    /// Entries registered under exactly `ty`
    pub fn get_extension_points(&self, ty: ExtensionPointType) -> Vec<ExtensionPoint> {
        self.points
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ty)
            .cloned()
            .unwrap_or_default()
    }

    /// Copy of the whole registry
    pub fn snapshot(&self) -> ExtensionSnapshot {
        self.points
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        let mut points = self.points.write().unwrap_or_else(PoisonError::into_inner);
        for bucket in points.values_mut() {
            bucket.clear();
        }
    }
}
