//! Plugin extension points for the Talawa admin portal
//!
//! Plugins contribute routes, drawer entries and inline injectors. The
//! [`PluginManager`] loads plugins, keeps the per-type extension point lists
//! and announces lifecycle events; hooks turn those events into fresh
//! snapshots, and [`PluginRoutes`] / [`PluginInjector`] render them with
//! per-entry failure containment.

pub mod backend;
pub mod discovery;
pub mod error;
pub mod events;
pub mod extension;
pub mod extension_registry;
pub mod hooks;
pub mod injector;
pub mod lifecycle;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod messages;
pub mod registry;
pub mod routes;
pub mod types;
pub mod view;

#[cfg(test)]
mod testing;

// Re-export main types
pub use backend::{InMemoryPluginBackend, PluginBackend, PluginRecord};
pub use discovery::{DiscoveredPlugin, DiscoveryConfig, PluginDiscovery, PluginIndex};
pub use error::{PluginError, PluginResult};
pub use events::{EventBus, Listener, ListenerId, PluginEvent};
pub use extension::{DrawerExtension, ExtensionPoint, InjectorExtension, RouteExtension};
pub use extension_registry::ExtensionRegistry;
pub use hooks::{loaded_plugins, plugin_drawer_items, plugin_injectors, plugin_routes, use_extension_points, ExtensionHook};
pub use injector::{render_injectors, InjectorFailure, InjectorRender, PluginInjector, PluginInjectorProps};
pub use lifecycle::{LifecycleManager, LoadedPlugin, PluginSummary};
pub use loader::{
    CompositeManifestSource, DiscoveredManifestSource, FilesystemManifestSource, ManifestSource, ModuleLoader,
    PluginLifecycleHooks, PluginModule, StaticPluginLoader,
};
pub use manager::{PluginHost, PluginManager, PluginManagerBuilder};
pub use manifest::{ExtensionPoints, PluginManifest};
pub use messages::Messages;
pub use registry::{ComponentLookup, ComponentRegistry};
pub use routes::{PluginRouteSlot, PluginRoutes, PluginRoutesProps, RouteState, RouteTable};
pub use types::{ExtensionKind, ExtensionPointType, InjectorSlot, PluginEventKind, PluginStatus};
pub use view::{component_fn, text_component, Component, ComponentRef, Element, Props};

/// Plugin system version
pub const PLUGIN_SYSTEM_VERSION: &str = env!("CARGO_PKG_VERSION");
