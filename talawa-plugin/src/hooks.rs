//! Reactive views over the plugin manager
//!
//! A hook is a mounted subscription: it holds the latest snapshot of one
//! manager query and re-derives it whenever a lifecycle event fires. Events
//! carry no delta, so every event triggers a full re-query. Dropping the hook
//! unmounts it and removes every listener it registered.

use std::sync::{Arc, Weak};
use tokio::sync::watch;

use crate::events::{ListenerId, PluginEvent};
use crate::extension::ExtensionPoint;
use crate::lifecycle::PluginSummary;
use crate::manager::PluginHost;
use crate::types::{ExtensionPointType, InjectorSlot, PluginEventKind};

type Query<T> = Box<dyn Fn(&dyn PluginHost) -> Vec<T> + Send + Sync>;

/// Events that change the loaded plugin list
const PLUGIN_SET_EVENTS: [PluginEventKind; 3] = [
    PluginEventKind::Loaded,
    PluginEventKind::Unloaded,
    PluginEventKind::StatusChanged,
];

struct HookState<T> {
    host: Arc<dyn PluginHost>,
    query: Query<T>,
    /// Skip re-queries until the manager finished startup discovery
    gated: bool,
    value: watch::Sender<Vec<T>>,
}

impl<T> HookState<T> {
    fn rederive(&self) {
        if self.gated && !self.host.is_system_initialized() {
            return;
        }
        let next = (self.query)(self.host.as_ref());
        self.value.send_replace(next);
    }
}

/// A mounted hook over one manager query
pub struct ExtensionHook<T> {
    state: Arc<HookState<T>>,
    subscriptions: Vec<(PluginEventKind, ListenerId)>,
}

impl<T> ExtensionHook<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn mount(host: Arc<dyn PluginHost>, query: Query<T>, gated: bool, events: &[PluginEventKind]) -> Self {
        let (value, _) = watch::channel(Vec::new());
        let state = Arc::new(HookState {
            host,
            query,
            gated,
            value,
        });
        state.rederive();

        let subscriptions = events
            .iter()
            .map(|&kind| {
                let weak: Weak<HookState<T>> = Arc::downgrade(&state);
                let id = state.host.on(
                    kind,
                    Arc::new(move |_: &PluginEvent| {
                        if let Some(state) = weak.upgrade() {
                            state.rederive();
                        }
                    }),
                );
                (kind, id)
            })
            .collect();

        Self { state, subscriptions }
    }

    /// Latest snapshot; empty until the first successful derivation
    pub fn current(&self) -> Vec<T> {
        self.state.value.borrow().clone()
    }

    /// Receiver notified on every re-derivation
    pub fn changes(&self) -> watch::Receiver<Vec<T>> {
        self.state.value.subscribe()
    }

    /// Re-derive now, as an event would
    pub fn refresh(&self) {
        self.state.rederive();
    }
}

impl<T> Drop for ExtensionHook<T> {
    fn drop(&mut self) {
        for (kind, id) in self.subscriptions.drain(..) {
            self.state.host.off(kind, id);
        }
    }
}

/// Extension points of one type, re-derived on every lifecycle event
pub fn use_extension_points(host: Arc<dyn PluginHost>, ty: ExtensionPointType) -> ExtensionHook<ExtensionPoint> {
    ExtensionHook::mount(
        host,
        Box::new(move |host: &dyn PluginHost| host.get_extension_points(ty)),
        true,
        &PluginEventKind::LIFECYCLE,
    )
}

/// Drawer entries for the current user and scope.
///
/// `permissions` is accepted for callers that filter entries themselves.
pub fn plugin_drawer_items(
    host: Arc<dyn PluginHost>,
    _permissions: &[String],
    is_admin: bool,
    is_org: Option<bool>,
) -> ExtensionHook<ExtensionPoint> {
    use_extension_points(host, ExtensionPointType::drawer_for(is_admin, is_org.unwrap_or(false)))
}

/// Route entries for the current user and scope
pub fn plugin_routes(
    host: Arc<dyn PluginHost>,
    _permissions: &[String],
    is_admin: bool,
    is_org: Option<bool>,
) -> ExtensionHook<ExtensionPoint> {
    use_extension_points(host, ExtensionPointType::route_for(is_admin, is_org.unwrap_or(false)))
}

/// Injector entries for a slot, `G1` when none is given
pub fn plugin_injectors(host: Arc<dyn PluginHost>, slot: Option<InjectorSlot>) -> ExtensionHook<ExtensionPoint> {
    use_extension_points(host, slot.unwrap_or_default().extension_type())
}

/// Loaded plugin list. Meaningful before startup completes, so never gated.
pub fn loaded_plugins(host: Arc<dyn PluginHost>) -> ExtensionHook<PluginSummary> {
    ExtensionHook::mount(
        host,
        Box::new(|host: &dyn PluginHost| host.get_loaded_plugins()),
        false,
        &PLUGIN_SET_EVENTS,
    )
}
