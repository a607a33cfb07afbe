//! Extension point records
//!
//! Each record kind carries only the fields its slot needs. The owning
//! plugin id is optional everywhere: manifests usually omit it and the
//! extension registry stamps it in on registration.

use serde::{Deserialize, Serialize};

use crate::types::ExtensionKind;

/// Route contributed by a plugin
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteExtension {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_id: Option<String>,
    /// URL pattern
    pub path: String,
    /// Name of the export to render
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Match the full path only
    #[serde(default)]
    pub exact: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl RouteExtension {
    pub fn new(path: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            component: Some(component.into()),
            ..Default::default()
        }
    }

    pub fn with_plugin_id(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = Some(plugin_id.into());
        self
    }
}

/// Navigation drawer entry contributed by a plugin
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawerExtension {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_id: Option<String>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Target path
    pub path: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl DrawerExtension {
    pub fn new(label: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Inline injection contributed by a plugin
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectorExtension {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_id: Option<String>,
    /// Name of the export to render
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl InjectorExtension {
    pub fn new(injector: impl Into<String>) -> Self {
        Self {
            injector: Some(injector.into()),
            ..Default::default()
        }
    }

    pub fn with_plugin_id(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = Some(plugin_id.into());
        self
    }
}

/// Any extension point record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExtensionPoint {
    Route(RouteExtension),
    Drawer(DrawerExtension),
    Injector(InjectorExtension),
}

impl ExtensionPoint {
    pub fn kind(&self) -> ExtensionKind {
        match self {
            Self::Route(_) => ExtensionKind::Route,
            Self::Drawer(_) => ExtensionKind::Drawer,
            Self::Injector(_) => ExtensionKind::Injector,
        }
    }

    /// Owning plugin id, if recorded
    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            Self::Route(route) => route.plugin_id.as_deref(),
            Self::Drawer(drawer) => drawer.plugin_id.as_deref(),
            Self::Injector(injector) => injector.plugin_id.as_deref(),
        }
    }

    /// Record the owning plugin id
    pub fn set_plugin_id(&mut self, plugin_id: &str) {
        let slot = match self {
            Self::Route(route) => &mut route.plugin_id,
            Self::Drawer(drawer) => &mut drawer.plugin_id,
            Self::Injector(injector) => &mut injector.plugin_id,
        };
        *slot = Some(plugin_id.to_string());
    }

    pub fn as_route(&self) -> Option<&RouteExtension> {
        match self {
            Self::Route(route) => Some(route),
            _ => None,
        }
    }

    pub fn as_drawer(&self) -> Option<&DrawerExtension> {
        match self {
            Self::Drawer(drawer) => Some(drawer),
            _ => None,
        }
    }

    pub fn as_injector(&self) -> Option<&InjectorExtension> {
        match self {
            Self::Injector(injector) => Some(injector),
            _ => None,
        }
    }
}

impl From<RouteExtension> for ExtensionPoint {
    fn from(route: RouteExtension) -> Self {
        Self::Route(route)
    }
}

impl From<DrawerExtension> for ExtensionPoint {
    fn from(drawer: DrawerExtension) -> Self {
        Self::Drawer(drawer)
    }
}

impl From<InjectorExtension> for ExtensionPoint {
    fn from(injector: InjectorExtension) -> Self {
        Self::Injector(injector)
    }
}
