//! Plugin routes
//!
//! Each route contributed for the current scope becomes a slot whose
//! component is imported asynchronously. A slot starts `Pending`, then ends
//! `Resolved` or `Failed`; there is no retry. Remounting builds fresh slots.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tokio::task::JoinHandle;

use crate::error::{PluginError, PluginResult};
use crate::extension::{ExtensionPoint, RouteExtension};
use crate::hooks::{plugin_routes, ExtensionHook};
use crate::loader::ModuleLoader;
use crate::manager::{PluginHost, PluginManager};
use crate::messages::Messages;
use crate::view::{ComponentRef, Element, Props};

pub const ERROR_PANEL_TEST_ID: &str = "plugin-error-panel";
pub const MISSING_ID_TEST_ID: &str = "plugin-missing-id";
pub const FALLBACK_TEST_ID: &str = "plugin-loading";

/// Caller-facing route properties
#[derive(Debug, Clone, Default)]
pub struct PluginRoutesProps {
    /// Passed to the route hook; filtering by permission is left to callers
    pub user_permissions: Vec<String>,
    pub is_admin: bool,
    /// Shown while a route is loading
    pub fallback: Option<Element>,
    /// Show raw error text in the error panel
    pub verbose_errors: bool,
}

/// Load state of one route
#[derive(Debug, Clone)]
pub enum RouteState {
    Pending,
    Resolved(ComponentRef),
    /// Route record carries no plugin id
    MissingPluginId,
    Failed { message: String },
}

impl RouteState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::MissingPluginId)
    }
}

/// One routed entry
#[derive(Debug)]
pub struct PluginRouteSlot {
    /// `"{plugin_id}-{path}"`
    pub key: String,
    pub path: String,
    pub exact: bool,
    plugin_id: Option<String>,
    component: String,
    state: Arc<RwLock<RouteState>>,
}

impl PluginRouteSlot {
    /// Slot for the route at `index` of the snapshot
    fn new(index: usize, route: &RouteExtension) -> Self {
        let plugin_id = route.plugin_id.clone().filter(|id| !id.trim().is_empty());
        let (key, state) = match &plugin_id {
            Some(id) => (format!("{}-{}", id, route.path), RouteState::Pending),
            None => (format!("missing-{}", index), RouteState::MissingPluginId),
        };

        Self {
            key,
            path: route.path.clone(),
            exact: route.exact,
            plugin_id,
            component: route.component.clone().unwrap_or_default(),
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn plugin_id(&self) -> Option<&str> {
        self.plugin_id.as_deref()
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn state(&self) -> RouteState {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Render the slot; `fallback` stands in while the import is pending
    pub fn render(&self, fallback: &Element, verbose_errors: bool, messages: &Messages) -> Element {
        let plugin_id = self.plugin_id.as_deref().unwrap_or_default();
        match self.state() {
            RouteState::Pending => fallback.clone(),
            RouteState::MissingPluginId => {
                Element::div_text(messages.missing_plugin_id.as_str()).with_attr("data-testid", MISSING_ID_TEST_ID)
            }
            RouteState::Failed { message } => {
                error_panel(&self.component, plugin_id, &message, verbose_errors, messages)
            }
            RouteState::Resolved(component) => match component.render(&Props::new()) {
                Ok(element) => element,
                Err(e) => {
                    log_load_failure(&self.component, plugin_id, &e);
                    error_panel(&self.component, plugin_id, &e.to_string(), verbose_errors, messages)
                }
            },
        }
    }

    fn loader_job(&self) -> Option<(String, String, Weak<RwLock<RouteState>>)> {
        let plugin_id = self.plugin_id.clone()?;
        self.state().is_pending().then(|| {
            (plugin_id, self.component.clone(), Arc::downgrade(&self.state))
        })
    }
}

fn log_load_failure(component: &str, plugin_id: &str, error: &PluginError) {
    tracing::error!(
        target: "plugin_routes",
        plugin_id = %plugin_id,
        component = %component,
        error = %error,
        "Failed to load plugin component '{}' from '{}': {}",
        component,
        plugin_id,
        error
    );
}

/// Inline error panel for a failed route
pub fn error_panel(
    component: &str,
    plugin_id: &str,
    message: &str,
    verbose_errors: bool,
    messages: &Messages,
) -> Element {
    let detail = if verbose_errors {
        message.to_string()
    } else {
        messages.contact_support.clone()
    };
    let style: BTreeMap<String, String> = [
        ("padding", "20px"),
        ("border", "1px solid #ff6b6b"),
        ("border-radius", "4px"),
        ("background-color", "#ffe0e0"),
        ("color", "#d63031"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    Element::node("div")
        .with_style(style)
        .with_attr("data-testid", ERROR_PANEL_TEST_ID)
        .with_children([
            Element::node("h3").with_child(Element::text(messages.plugin_error_title.as_str())),
            Element::node("p").with_child(Element::text(messages.failed_component_line(component))),
            Element::node("p").with_child(Element::text(messages.plugin_line(plugin_id))),
            Element::node("p").with_child(Element::text(detail)),
        ])
}

/// Import a plugin and resolve `component`: named export, then default
pub async fn load_component(
    loader: &dyn ModuleLoader,
    plugin_id: &str,
    component: &str,
) -> PluginResult<ComponentRef> {
    let module = loader.import(plugin_id).await?;
    module.resolve(component, plugin_id)
}

/// Import one component and store the outcome in its slot.
///
/// Returns false when the slot was dropped before the import finished.
async fn load_into(
    loader: Arc<dyn ModuleLoader>,
    plugin_id: String,
    component: String,
    state: Weak<RwLock<RouteState>>,
) -> bool {
    let next = match load_component(loader.as_ref(), &plugin_id, &component).await {
        Ok(resolved) => RouteState::Resolved(resolved),
        Err(e) => {
            log_load_failure(&component, &plugin_id, &e);
            RouteState::Failed { message: e.to_string() }
        }
    };

    // Unmounted while loading
    let Some(state) = state.upgrade() else {
        tracing::debug!(target: "plugin_routes", plugin_id = %plugin_id, "Discarding load result for unmounted route");
        return false;
    };
    *state.write().unwrap_or_else(PoisonError::into_inner) = next;
    true
}

/// Ordered route slots with path matching
#[derive(Debug, Default)]
pub struct RouteTable {
    slots: Vec<PluginRouteSlot>,
}

impl RouteTable {
    /// Slots for the route entries of a snapshot; other entry kinds are ignored
    pub fn from_points(points: &[ExtensionPoint]) -> Self {
        Self {
            slots: points
                .iter()
                .filter_map(ExtensionPoint::as_route)
                .enumerate()
                .map(|(index, route)| PluginRouteSlot::new(index, route))
                .collect(),
        }
    }

    pub fn slots(&self) -> &[PluginRouteSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&PluginRouteSlot> {
        self.slots.iter().find(|slot| slot.key == key)
    }

    /// First slot whose pattern matches `path`, in list order
    pub fn match_path(&self, path: &str) -> Option<&PluginRouteSlot> {
        self.slots
            .iter()
            .find(|slot| path_matches(&slot.path, path, slot.exact))
    }
}

/// Match `path` against a pattern with `:param` segments and a `*` tail
pub fn path_matches(pattern: &str, path: &str, exact: bool) -> bool {
    let mut actual = path.split('/').filter(|s| !s.is_empty());

    for expected in pattern.split('/').filter(|s| !s.is_empty()) {
        if expected == "*" {
            return true;
        }
        match actual.next() {
            Some(segment) if expected.starts_with(':') || expected == segment => {}
            _ => return false,
        }
    }

    !exact || actual.next().is_none()
}

/// Mounted route set for one user scope
pub struct PluginRoutes {
    hook: ExtensionHook<ExtensionPoint>,
    loader: Arc<dyn ModuleLoader>,
    props: PluginRoutesProps,
    messages: Messages,
    routes: Vec<ExtensionPoint>,
    table: RouteTable,
}

impl PluginRoutes {
    /// Mount and build slots for the current route snapshot. Imports start
    /// with [`load`](Self::load) or [`spawn_loads`](Self::spawn_loads).
    pub fn mount(host: Arc<dyn PluginHost>, loader: Arc<dyn ModuleLoader>, props: PluginRoutesProps) -> Self {
        let hook = plugin_routes(host, &props.user_permissions, props.is_admin, None);
        let routes = hook.current();
        let table = RouteTable::from_points(&routes);

        Self {
            hook,
            loader,
            props,
            messages: Messages::default(),
            routes,
            table,
        }
    }

    /// Mount against a manager; `verbose_errors` follows its configuration
    pub fn for_manager(manager: Arc<PluginManager>, mut props: PluginRoutesProps) -> Self {
        props.verbose_errors = manager.config().verbose_errors;
        let loader = manager.module_loader().clone();
        Self::mount(manager, loader, props)
    }

    pub fn with_messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Rebuild the slots when the route snapshot changed since the last build.
    ///
    /// Returns whether a rebuild happened; rebuilt slots are pending again.
    pub fn sync(&mut self) -> bool {
        let routes = self.hook.current();
        if routes == self.routes {
            return false;
        }
        self.table = RouteTable::from_points(&routes);
        self.routes = routes;
        true
    }

    fn jobs(&self) -> Vec<(String, String, Weak<RwLock<RouteState>>)> {
        self.table.slots.iter().filter_map(PluginRouteSlot::loader_job).collect()
    }

    /// Import every pending route concurrently and wait for all of them
    pub async fn load(&self) {
        let loads = self
            .jobs()
            .into_iter()
            .map(|(plugin_id, component, state)| load_into(self.loader.clone(), plugin_id, component, state));
        join_all(loads).await;
    }

    /// Start every pending import on the runtime without waiting.
    ///
    /// Each handle yields whether its result reached a mounted slot.
    pub fn spawn_loads(&self) -> Vec<JoinHandle<bool>> {
        self.jobs()
            .into_iter()
            .map(|(plugin_id, component, state)| {
                tokio::spawn(load_into(self.loader.clone(), plugin_id, component, state))
            })
            .collect()
    }

    fn fallback(&self) -> Element {
        self.props.fallback.clone().unwrap_or_else(|| {
            Element::div_text(self.messages.loading_plugin.as_str()).with_attr("data-testid", FALLBACK_TEST_ID)
        })
    }

    /// Render every slot as a keyed route node
    pub fn render(&self) -> Element {
        let fallback = self.fallback();
        Element::node("routes").with_children(self.table.slots.iter().map(|slot| {
            Element::node("route")
                .with_key(slot.key.clone())
                .with_attr("path", slot.path.clone())
                .with_child(slot.render(&fallback, self.props.verbose_errors, &self.messages))
        }))
    }

    /// Render the slot matching `path`, if any
    pub fn render_path(&self, path: &str) -> Option<Element> {
        let fallback = self.fallback();
        self.table
            .match_path(path)
            .map(|slot| slot.render(&fallback, self.props.verbose_errors, &self.messages))
    }
}
