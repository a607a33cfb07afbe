//! Plugin manifest format and plugin id rules

use serde::{Deserialize, Serialize};

use crate::error::{PluginError, PluginResult};
use crate::extension::{DrawerExtension, ExtensionPoint, InjectorExtension, RouteExtension};
use crate::types::ExtensionPointType;

/// Plugin manifest (`manifest.json`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    pub name: String,
    pub plugin_id: String,
    pub version: String,
    pub description: String,
    pub author: String,
    /// Entry module, relative to the plugin directory
    pub main: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub extension_points: ExtensionPoints,
}

/// Extension points declared by a manifest, one optional list per type key
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtensionPoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<RouteExtension>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawer: Option<Vec<DrawerExtension>>,
    #[serde(rename = "RA1", default, skip_serializing_if = "Option::is_none")]
    pub ra1: Option<Vec<RouteExtension>>,
    #[serde(rename = "RA2", default, skip_serializing_if = "Option::is_none")]
    pub ra2: Option<Vec<RouteExtension>>,
    #[serde(rename = "RU1", default, skip_serializing_if = "Option::is_none")]
    pub ru1: Option<Vec<RouteExtension>>,
    #[serde(rename = "RU2", default, skip_serializing_if = "Option::is_none")]
    pub ru2: Option<Vec<RouteExtension>>,
    #[serde(rename = "DA1", default, skip_serializing_if = "Option::is_none")]
    pub da1: Option<Vec<DrawerExtension>>,
    #[serde(rename = "DA2", default, skip_serializing_if = "Option::is_none")]
    pub da2: Option<Vec<DrawerExtension>>,
    #[serde(rename = "DU1", default, skip_serializing_if = "Option::is_none")]
    pub du1: Option<Vec<DrawerExtension>>,
    #[serde(rename = "DU2", default, skip_serializing_if = "Option::is_none")]
    pub du2: Option<Vec<DrawerExtension>>,
    #[serde(rename = "G1", default, skip_serializing_if = "Option::is_none")]
    pub g1: Option<Vec<InjectorExtension>>,
    #[serde(rename = "G2", default, skip_serializing_if = "Option::is_none")]
    pub g2: Option<Vec<InjectorExtension>>,
    #[serde(rename = "G3", default, skip_serializing_if = "Option::is_none")]
    pub g3: Option<Vec<InjectorExtension>>,
    #[serde(rename = "G4", default, skip_serializing_if = "Option::is_none")]
    pub g4: Option<Vec<InjectorExtension>>,
}

fn to_points<T: Clone + Into<ExtensionPoint>>(list: &Option<Vec<T>>) -> Vec<ExtensionPoint> {
    list.iter().flatten().cloned().map(Into::into).collect()
}

impl ExtensionPoints {
    /// Records declared under one type
    pub fn entries(&self, ty: ExtensionPointType) -> Vec<ExtensionPoint> {
        match ty {
            ExtensionPointType::Routes => to_points(&self.routes),
            ExtensionPointType::Drawer => to_points(&self.drawer),
            ExtensionPointType::RouteAdminGlobal => to_points(&self.ra1),
            ExtensionPointType::RouteAdminOrg => to_points(&self.ra2),
            ExtensionPointType::RouteUserOrg => to_points(&self.ru1),
            ExtensionPointType::RouteUserGlobal => to_points(&self.ru2),
            ExtensionPointType::DrawerAdminGlobal => to_points(&self.da1),
            ExtensionPointType::DrawerAdminOrg => to_points(&self.da2),
            ExtensionPointType::DrawerUserOrg => to_points(&self.du1),
            ExtensionPointType::DrawerUserGlobal => to_points(&self.du2),
            ExtensionPointType::InjectorG1 => to_points(&self.g1),
            ExtensionPointType::InjectorG2 => to_points(&self.g2),
            ExtensionPointType::InjectorG3 => to_points(&self.g3),
            ExtensionPointType::InjectorG4 => to_points(&self.g4),
        }
    }

    /// Whether nothing is declared under any type
    pub fn is_empty(&self) -> bool {
        ExtensionPointType::ALL
            .iter()
            .all(|ty| self.entries(*ty).is_empty())
    }
}

impl PluginManifest {
    /// Validate required fields and the version string
    pub fn validate(&self) -> PluginResult<()> {
        let required = [
            ("name", &self.name),
            ("pluginId", &self.plugin_id),
            ("version", &self.version),
            ("description", &self.description),
            ("author", &self.author),
            ("main", &self.main),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(PluginError::InvalidManifest {
                    reason: format!("missing required field '{}'", field),
                });
            }
        }

        semver::Version::parse(&self.version).map_err(|e| PluginError::InvalidManifest {
            reason: format!("invalid version '{}': {}", self.version, e),
        })?;

        Ok(())
    }

    /// Entry module with a loadable extension
    pub fn main_file(&self) -> String {
        normalize_main_file(&self.main)
    }
}

/// Keep `.js`, `.ts` and `.tsx` entry files, append `.js` to anything else
pub fn normalize_main_file(main: &str) -> String {
    if [".js", ".ts", ".tsx"].iter().any(|ext| main.ends_with(ext)) {
        main.to_string()
    } else {
        format!("{}.js", main)
    }
}

/// Plugin ids accepted by lifecycle operations.
///
/// The trimmed id must start with an ASCII letter and continue with ASCII
/// letters, digits or `_`.
pub fn is_valid_plugin_id(plugin_id: &str) -> bool {
    let trimmed = plugin_id.trim();
    let mut chars = trimmed.chars();

    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
