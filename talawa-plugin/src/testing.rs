//! In-crate test doubles

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::events::{EventBus, Listener, ListenerId, PluginEvent};
use crate::extension::ExtensionPoint;
use crate::lifecycle::PluginSummary;
use crate::manager::PluginHost;
use crate::types::{ExtensionPointType, PluginEventKind};

/// Host whose snapshots are seeded by the test and whose calls are counted
#[derive(Default)]
pub(crate) struct MockHost {
    initialized: AtomicBool,
    points: RwLock<HashMap<ExtensionPointType, Vec<ExtensionPoint>>>,
    plugins: RwLock<Vec<PluginSummary>>,
    queried: Mutex<Vec<ExtensionPointType>>,
    events: EventBus,
    on_calls: AtomicUsize,
    off_calls: AtomicUsize,
}

impl MockHost {
    pub(crate) fn new(initialized: bool) -> Arc<Self> {
        let host = Self::default();
        host.initialized.store(initialized, Ordering::SeqCst);
        Arc::new(host)
    }

    pub(crate) fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::SeqCst);
    }

    pub(crate) fn seed(&self, ty: ExtensionPointType, points: Vec<ExtensionPoint>) {
        self.points.write().unwrap().insert(ty, points);
    }

    pub(crate) fn seed_plugins(&self, plugins: Vec<PluginSummary>) {
        *self.plugins.write().unwrap() = plugins;
    }

    pub(crate) fn queried(&self) -> Vec<ExtensionPointType> {
        self.queried.lock().unwrap().clone()
    }

    pub(crate) fn on_calls(&self) -> usize {
        self.on_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn off_calls(&self) -> usize {
        self.off_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn listener_count(&self, kind: PluginEventKind) -> usize {
        self.events.listener_count(kind)
    }

    pub(crate) fn emit(&self, kind: PluginEventKind) {
        self.events.emit(PluginEvent::new(kind));
    }
}

impl PluginHost for MockHost {
    fn is_system_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn get_extension_points(&self, ty: ExtensionPointType) -> Vec<ExtensionPoint> {
        self.queried.lock().unwrap().push(ty);
        self.points.read().unwrap().get(&ty).cloned().unwrap_or_default()
    }

    fn get_loaded_plugins(&self) -> Vec<PluginSummary> {
        self.plugins.read().unwrap().clone()
    }

    fn on(&self, event: PluginEventKind, listener: Listener) -> ListenerId {
        self.on_calls.fetch_add(1, Ordering::SeqCst);
        self.events.on(event, listener)
    }

    fn off(&self, event: PluginEventKind, id: ListenerId) -> bool {
        self.off_calls.fetch_add(1, Ordering::SeqCst);
        self.events.off(event, id)
    }
}
