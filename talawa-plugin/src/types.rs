//! Extension point, status and event type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PluginError;

/// Where in the host UI an extension may appear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExtensionPointType {
    /// Route, admin, global
    #[serde(rename = "RA1")]
    RouteAdminGlobal,
    /// Route, admin, organization
    #[serde(rename = "RA2")]
    RouteAdminOrg,
    /// Route, user, organization
    #[serde(rename = "RU1")]
    RouteUserOrg,
    /// Route, user, global
    #[serde(rename = "RU2")]
    RouteUserGlobal,
    /// Drawer, admin, global
    #[serde(rename = "DA1")]
    DrawerAdminGlobal,
    /// Drawer, admin, organization
    #[serde(rename = "DA2")]
    DrawerAdminOrg,
    /// Drawer, user, organization
    #[serde(rename = "DU1")]
    DrawerUserOrg,
    /// Drawer, user, global
    #[serde(rename = "DU2")]
    DrawerUserGlobal,
    #[serde(rename = "G1")]
    InjectorG1,
    #[serde(rename = "G2")]
    InjectorG2,
    #[serde(rename = "G3")]
    InjectorG3,
    #[serde(rename = "G4")]
    InjectorG4,
    /// Legacy route bucket
    #[serde(rename = "routes")]
    Routes,
    /// Legacy drawer bucket
    #[serde(rename = "drawer")]
    Drawer,
}

/// Shape of the records stored under an extension point type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionKind {
    Route,
    Drawer,
    Injector,
}

impl ExtensionPointType {
    /// Every extension point type, in registry order
    pub const ALL: [ExtensionPointType; 14] = [
        Self::Routes,
        Self::Drawer,
        Self::RouteAdminGlobal,
        Self::RouteAdminOrg,
        Self::RouteUserOrg,
        Self::RouteUserGlobal,
        Self::DrawerAdminGlobal,
        Self::DrawerAdminOrg,
        Self::DrawerUserOrg,
        Self::DrawerUserGlobal,
        Self::InjectorG1,
        Self::InjectorG2,
        Self::InjectorG3,
        Self::InjectorG4,
    ];

    /// Stable string key
    pub fn as_key(&self) -> &'static str {
        match self {
            Self::RouteAdminGlobal => "RA1",
            Self::RouteAdminOrg => "RA2",
            Self::RouteUserOrg => "RU1",
            Self::RouteUserGlobal => "RU2",
            Self::DrawerAdminGlobal => "DA1",
            Self::DrawerAdminOrg => "DA2",
            Self::DrawerUserOrg => "DU1",
            Self::DrawerUserGlobal => "DU2",
            Self::InjectorG1 => "G1",
            Self::InjectorG2 => "G2",
            Self::InjectorG3 => "G3",
            Self::InjectorG4 => "G4",
            Self::Routes => "routes",
            Self::Drawer => "drawer",
        }
    }

    /// Record shape for this type
    pub fn kind(&self) -> ExtensionKind {
        match self {
            Self::RouteAdminGlobal
            | Self::RouteAdminOrg
            | Self::RouteUserOrg
            | Self::RouteUserGlobal
            | Self::Routes => ExtensionKind::Route,
            Self::DrawerAdminGlobal
            | Self::DrawerAdminOrg
            | Self::DrawerUserOrg
            | Self::DrawerUserGlobal
            | Self::Drawer => ExtensionKind::Drawer,
            Self::InjectorG1 | Self::InjectorG2 | Self::InjectorG3 | Self::InjectorG4 => {
                ExtensionKind::Injector
            }
        }
    }

    /// Route slot for an `(is_admin, is_org)` pairing
    pub fn route_for(is_admin: bool, is_org: bool) -> Self {
        match (is_admin, is_org) {
            (true, false) => Self::RouteAdminGlobal,
            (true, true) => Self::RouteAdminOrg,
            (false, true) => Self::RouteUserOrg,
            (false, false) => Self::RouteUserGlobal,
        }
    }

    /// Drawer slot for an `(is_admin, is_org)` pairing
    pub fn drawer_for(is_admin: bool, is_org: bool) -> Self {
        match (is_admin, is_org) {
            (true, false) => Self::DrawerAdminGlobal,
            (true, true) => Self::DrawerAdminOrg,
            (false, true) => Self::DrawerUserOrg,
            (false, false) => Self::DrawerUserGlobal,
        }
    }
}

impl fmt::Display for ExtensionPointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

impl FromStr for ExtensionPointType {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|ty| ty.as_key() == s)
            .ok_or_else(|| PluginError::generic(format!("Unknown extension point type: {}", s)))
    }
}

/// Inline injector slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InjectorSlot {
    #[default]
    G1,
    G2,
    G3,
    G4,
}

impl InjectorSlot {
    /// Extension point type backing this slot
    pub fn extension_type(&self) -> ExtensionPointType {
        match self {
            Self::G1 => ExtensionPointType::InjectorG1,
            Self::G2 => ExtensionPointType::InjectorG2,
            Self::G3 => ExtensionPointType::InjectorG3,
            Self::G4 => ExtensionPointType::InjectorG4,
        }
    }
}

impl fmt::Display for InjectorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension_type().as_key())
    }
}

/// Plugin status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    /// Plugin is loaded and contributes extensions
    Active,
    /// Plugin is loaded but contributes nothing
    Inactive,
    /// Plugin failed to load
    Error,
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl FromStr for PluginStatus {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "error" => Ok(Self::Error),
            _ => Err(PluginError::InvalidStatus {
                status: s.to_string(),
            }),
        }
    }
}

/// Lifecycle event names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginEventKind {
    #[serde(rename = "plugin:loaded")]
    Loaded,
    #[serde(rename = "plugin:unloaded")]
    Unloaded,
    #[serde(rename = "plugin:status-changed")]
    StatusChanged,
    #[serde(rename = "plugins:initialized")]
    Initialized,
    #[serde(rename = "plugin:error")]
    Error,
    #[serde(rename = "plugin:installed")]
    Installed,
}

impl PluginEventKind {
    /// The four events that invalidate extension point snapshots
    pub const LIFECYCLE: [PluginEventKind; 4] = [
        Self::Loaded,
        Self::Unloaded,
        Self::StatusChanged,
        Self::Initialized,
    ];

    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "plugin:loaded",
            Self::Unloaded => "plugin:unloaded",
            Self::StatusChanged => "plugin:status-changed",
            Self::Initialized => "plugins:initialized",
            Self::Error => "plugin:error",
            Self::Installed => "plugin:installed",
        }
    }
}

impl fmt::Display for PluginEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_point_type_keys() {
        for ty in ExtensionPointType::ALL {
            assert_eq!(ty.as_key().parse::<ExtensionPointType>().unwrap(), ty);
        }
        assert!("RA5".parse::<ExtensionPointType>().is_err());

        let json = serde_json::to_string(&ExtensionPointType::DrawerUserOrg).unwrap();
        assert_eq!(json, "\"DU1\"");
    }

    #[test]
    fn test_decision_table() {
        assert_eq!(ExtensionPointType::route_for(true, false), ExtensionPointType::RouteAdminGlobal);
        assert_eq!(ExtensionPointType::route_for(true, true), ExtensionPointType::RouteAdminOrg);
        assert_eq!(ExtensionPointType::route_for(false, true), ExtensionPointType::RouteUserOrg);
        assert_eq!(ExtensionPointType::route_for(false, false), ExtensionPointType::RouteUserGlobal);

        assert_eq!(ExtensionPointType::drawer_for(true, false).as_key(), "DA1");
        assert_eq!(ExtensionPointType::drawer_for(true, true).as_key(), "DA2");
        assert_eq!(ExtensionPointType::drawer_for(false, true).as_key(), "DU1");
        assert_eq!(ExtensionPointType::drawer_for(false, false).as_key(), "DU2");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(ExtensionPointType::Routes.kind(), ExtensionKind::Route);
        assert_eq!(ExtensionPointType::Drawer.kind(), ExtensionKind::Drawer);
        assert_eq!(ExtensionPointType::InjectorG3.kind(), ExtensionKind::Injector);
        assert_eq!(InjectorSlot::default().extension_type(), ExtensionPointType::InjectorG1);
    }

    #[test]
    fn test_plugin_status_parse() {
        assert_eq!("active".parse::<PluginStatus>().unwrap(), PluginStatus::Active);
        assert_eq!(PluginStatus::Inactive.to_string(), "inactive");
        assert!(matches!(
            "paused".parse::<PluginStatus>(),
            Err(PluginError::InvalidStatus { .. })
        ));
    }

    #[test]
    fn test_event_names() {
        assert_eq!(PluginEventKind::StatusChanged.as_str(), "plugin:status-changed");
        assert_eq!(PluginEventKind::Initialized.to_string(), "plugins:initialized");
        assert!(!PluginEventKind::LIFECYCLE.contains(&PluginEventKind::Error));
        assert!(!PluginEventKind::LIFECYCLE.contains(&PluginEventKind::Installed));
        assert_eq!(
            serde_json::to_string(&PluginEventKind::Installed).unwrap(),
            "\"plugin:installed\""
        );
    }
}
