//! Plugin lifecycle e2e tests
//!
//! Drives a manager built from compiled-in plugins and an in-memory backend
//! through startup, activation, deactivation and uninstall, checking what the
//! mounted hooks observe at each step.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use talawa_config::{ConfigLoader, PluginConfig};
use talawa_plugin::backend::BackendOperation;
use talawa_plugin::{
    loaded_plugins, plugin_drawer_items, plugin_injectors, plugin_routes, text_component, ComponentLookup,
    ExtensionPointType, InMemoryPluginBackend, InjectorSlot, PluginError, PluginEventKind, PluginHost,
    PluginLifecycleHooks, PluginManager, PluginManagerBuilder, PluginManifest, PluginModule, PluginRecord,
    PluginResult, PluginStatus, StaticPluginLoader,
};

fn manifest(plugin_id: &str, extension_points: serde_json::Value) -> PluginManifest {
    serde_json::from_value(json!({
        "name": format!("{} plugin", plugin_id),
        "pluginId": plugin_id,
        "version": "1.2.0",
        "description": "Integration test plugin",
        "author": "Talawa Contributors",
        "main": "index.ts",
        "extensionPoints": extension_points
    }))
    .expect("test manifest is valid")
}

fn static_plugins() -> StaticPluginLoader {
    let summary = manifest(
        "summary",
        json!({
            "RA1": [{"path": "/admin/summary", "component": "SummaryPage"}],
            "DA1": [{"label": "Summary", "path": "/admin/summary", "icon": "chart"}],
            "G1": [{"injector": "SummaryBanner", "description": "Dashboard banner"}]
        }),
    );
    let donations = manifest(
        "donations",
        json!({
            "RU1": [{"path": "/user/donate/:orgId", "component": "DonatePage"}],
            "DU1": [{"label": "Donate", "path": "/user/donate"}],
            "G1": [{"injector": "DonateButton"}]
        }),
    );

    let mut loader = StaticPluginLoader::new()
        .with_bundle(
            summary,
            PluginModule::new()
                .with_export("SummaryPage", text_component("SummaryPage", "Summary page"))
                .with_export("SummaryBanner", text_component("SummaryBanner", "Summary banner")),
        )
        .with_bundle(
            donations,
            PluginModule::new()
                .with_export("DonatePage", text_component("DonatePage", "Donate page"))
                .with_export("DonateButton", text_component("DonateButton", "Donate now")),
        );

    // Manifest whose bundle fails at import
    loader.add_bundle(manifest("broken", json!({})), PluginModule::new());
    loader.add_factory(
        "broken",
        Arc::new(|| -> PluginResult<PluginModule> {
            Err(PluginError::module_load_failed("broken", "bundle is corrupt"))
        }),
    );
    loader
}

fn test_config() -> PluginConfig {
    PluginConfig {
        plugin_dirs: Vec::new(),
        ..PluginConfig::default()
    }
}

fn seeded_backend() -> Arc<InMemoryPluginBackend> {
    Arc::new(InMemoryPluginBackend::with_records(vec![
        PluginRecord::new("1", "summary").activated(true),
        PluginRecord::new("2", "donations"),
    ]))
}

fn build_manager(backend: Arc<InMemoryPluginBackend>) -> Arc<PluginManager> {
    Arc::new(
        PluginManagerBuilder::new()
            .with_config(test_config())
            .with_static_loader(static_plugins())
            .with_backend(backend)
            .build(),
    )
}

#[tokio::test]
async fn test_hooks_follow_plugin_lifecycle() -> Result<()> {
    let _ = talawa_logging::init_simple_tracing("debug");

    let backend = seeded_backend();
    let manager = build_manager(backend.clone());

    // Mounted before startup: nothing until plugins:initialized
    let admin_routes = plugin_routes(manager.clone(), &[], true, Some(false));
    let user_drawer = plugin_drawer_items(manager.clone(), &[], false, Some(true));
    let banners = plugin_injectors(manager.clone(), Some(InjectorSlot::G1));
    let plugins = loaded_plugins(manager.clone());
    assert!(admin_routes.current().is_empty());
    assert!(plugins.current().is_empty());

    manager.initialize_plugin_system().await?;

    assert_eq!(admin_routes.current().len(), 1);
    assert_eq!(admin_routes.current()[0].plugin_id(), Some("summary"));
    assert!(user_drawer.current().is_empty());
    assert_eq!(banners.current().len(), 1);
    assert_eq!(plugins.current().len(), 2);

    manager.activate_plugin("donations").await?;
    assert_eq!(user_drawer.current().len(), 1);
    assert_eq!(banners.current().len(), 2);
    assert!(backend
        .records()
        .iter()
        .all(|record| record.is_activated));

    manager.deactivate_plugin("summary").await?;
    assert!(admin_routes.current().is_empty());
    assert_eq!(banners.current().len(), 1);
    assert_eq!(
        manager.get_loaded_plugin("summary").map(|p| p.status),
        Some(PluginStatus::Inactive)
    );

    manager.uninstall_plugin("donations").await?;
    assert!(user_drawer.current().is_empty());
    assert!(banners.current().is_empty());
    assert_eq!(plugins.current().len(), 1);
    assert_eq!(backend.deleted_files(), vec!["donations"]);

    Ok(())
}

#[tokio::test]
async fn test_failed_plugin_is_recorded_and_contained() -> Result<()> {
    let backend = seeded_backend();
    let manager = build_manager(backend);
    manager.initialize_plugin_system().await?;
    let mut events = manager.subscribe();

    let result = manager.install_plugin("broken").await;
    assert!(result.is_err());

    let broken = manager
        .get_loaded_plugin("broken")
        .expect("failed plugins are recorded");
    assert_eq!(broken.status, PluginStatus::Error);
    assert!(broken.error_message.is_some());
    assert!(manager.get_plugin_component("broken", Some("default"))?.is_none());

    let event = events.recv().await?;
    assert_eq!(event.kind, PluginEventKind::Error);
    assert_eq!(event.plugin_id.as_deref(), Some("broken"));
    let event = events.recv().await?;
    assert_eq!(event.kind, PluginEventKind::StatusChanged);
    assert_eq!(event.status, Some(PluginStatus::Error));

    // Error plugins count as loaded but never as active
    assert_eq!(manager.get_plugin_count(), 3);
    assert_eq!(manager.get_active_plugin_count(), 1);

    // Toggling an errored plugin is refused
    assert!(manager.activate_plugin("broken").await.is_err());
    assert_eq!(
        manager
            .get_extension_points(ExtensionPointType::RouteAdminGlobal)
            .len(),
        1
    );

    Ok(())
}

#[tokio::test]
async fn test_unload_failure_keeps_plugin() -> Result<()> {
    let backend = seeded_backend();
    let manager = build_manager(backend.clone());
    manager.initialize_plugin_system().await?;

    backend.fail_on(BackendOperation::Delete);
    assert!(manager.unload_plugin("summary").await.is_err());
    assert!(manager.get_loaded_plugin("summary").is_some());
    assert_eq!(
        manager
            .get_extension_points(ExtensionPointType::RouteAdminGlobal)
            .len(),
        1
    );

    backend.recover(BackendOperation::Delete);
    backend.fail_on(BackendOperation::DeleteFiles);
    manager.unload_plugin("summary").await?;
    assert!(manager.get_loaded_plugin("summary").is_none());
    assert!(manager
        .get_extension_points(ExtensionPointType::RouteAdminGlobal)
        .is_empty());

    Ok(())
}

#[tokio::test]
async fn test_unmounted_hooks_release_listeners() -> Result<()> {
    let manager = build_manager(seeded_backend());
    manager.initialize_plugin_system().await?;

    assert_eq!(manager.events().listener_count(PluginEventKind::Loaded), 0);
    {
        let _routes = plugin_routes(manager.clone(), &[], false, None);
        let _plugins = loaded_plugins(manager.clone());
        assert_eq!(manager.events().listener_count(PluginEventKind::Loaded), 2);
        assert_eq!(manager.events().listener_count(PluginEventKind::Initialized), 1);
    }

    for kind in PluginEventKind::LIFECYCLE {
        assert_eq!(manager.events().listener_count(kind), 0);
    }

    Ok(())
}

#[tokio::test]
async fn test_filesystem_plugins_from_config_file() -> Result<()> {
    let temp_dir = tempfile::TempDir::new()?;
    let plugins_dir = temp_dir.path().join("plugins");
    let plugin_dir = plugins_dir.join("events_calendar");
    std::fs::create_dir_all(&plugin_dir)?;
    std::fs::write(
        plugin_dir.join("manifest.json"),
        serde_json::to_string_pretty(&manifest(
            "events_calendar",
            json!({"RA2": [{"path": "/admin/orgs/:orgId/calendar", "component": "Calendar"}]}),
        ))?,
    )?;

    let config_path = temp_dir.path().join("talawa.yaml");
    std::fs::write(
        &config_path,
        format!(
            "plugins:\n  plugin_dirs:\n    - {}\n  verbose_errors: true\n  auto_initialize: true\n",
            plugins_dir.display()
        ),
    )?;
    let config = ConfigLoader::new().from_file(&config_path)?;

    let backend = Arc::new(InMemoryPluginBackend::with_records(vec![
        PluginRecord::new("1", "events_calendar").activated(true),
    ]));
    let modules = StaticPluginLoader::new().with_module(
        "events_calendar",
        PluginModule::new().with_export("Calendar", text_component("Calendar", "Calendar")),
    );
    let manager = PluginManagerBuilder::new()
        .with_config(config.plugins)
        .with_static_loader(modules)
        .with_backend(backend)
        .start()
        .await?;

    assert!(manager.is_system_initialized());
    assert!(manager.config().verbose_errors);
    let org_routes = manager.get_extension_points(ExtensionPointType::RouteAdminOrg);
    assert_eq!(org_routes.len(), 1);
    assert_eq!(org_routes[0].plugin_id(), Some("events_calendar"));

    // Everything on disk is already loaded
    assert!(manager.refresh_plugin_discovery().await?.is_empty());

    Ok(())
}

/// Counts activations and fails on uninstall
#[derive(Debug, Default)]
struct AuditHooks {
    activations: AtomicUsize,
}

#[async_trait]
impl PluginLifecycleHooks for AuditHooks {
    async fn on_activate(&self, _plugin_id: &str) -> PluginResult<()> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_uninstall(&self, plugin_id: &str) -> PluginResult<()> {
        Err(PluginError::generic(format!("{} refused to clean up", plugin_id)))
    }
}

#[tokio::test]
async fn test_install_runs_lifecycle_callbacks() -> Result<()> {
    let hooks = Arc::new(AuditHooks::default());
    let loader = StaticPluginLoader::new().with_bundle(
        manifest("audit", json!({"G3": [{"injector": "AuditTrail"}]})),
        PluginModule::new()
            .with_export("AuditTrail", text_component("AuditTrail", "Audit trail"))
            .with_lifecycle_hooks(hooks.clone()),
    );
    let manager = PluginManagerBuilder::new()
        .with_config(test_config())
        .with_static_loader(loader)
        .with_backend(Arc::new(InMemoryPluginBackend::new()))
        .start()
        .await?;
    let mut events = manager.subscribe();

    manager.install_plugin("audit").await?;
    let kinds: Vec<PluginEventKind> = vec![events.recv().await?.kind, events.recv().await?.kind];
    assert_eq!(kinds, vec![PluginEventKind::Loaded, PluginEventKind::Installed]);

    manager.activate_plugin("audit").await?;
    assert_eq!(hooks.activations.load(Ordering::SeqCst), 1);
    assert_eq!(
        manager
            .get_extension_points(ExtensionPointType::InjectorG3)
            .len(),
        1
    );

    // A failing uninstall callback does not keep the plugin around
    manager.uninstall_plugin("audit").await?;
    assert!(manager.get_loaded_plugin("audit").is_none());
    assert!(manager
        .get_extension_points(ExtensionPointType::InjectorG3)
        .is_empty());

    Ok(())
}
