//! Lifecycle event bus
//!
//! Synchronous listeners registered with [`EventBus::on`] are the refetch
//! triggers the hooks rely on. Every event is also broadcast on a tokio
//! channel for async consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, error};
use uuid::Uuid;

use crate::types::{PluginEventKind, PluginStatus};

/// Lifecycle event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEvent {
    pub kind: PluginEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PluginStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PluginEvent {
    pub fn new(kind: PluginEventKind) -> Self {
        Self {
            kind,
            plugin_id: None,
            status: None,
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn loaded(plugin_id: &str) -> Self {
        Self::new(PluginEventKind::Loaded).with_plugin(plugin_id)
    }

    pub fn unloaded(plugin_id: &str) -> Self {
        Self::new(PluginEventKind::Unloaded).with_plugin(plugin_id)
    }

    pub fn status_changed(plugin_id: &str, status: PluginStatus) -> Self {
        let mut event = Self::new(PluginEventKind::StatusChanged).with_plugin(plugin_id);
        event.status = Some(status);
        event
    }

    pub fn initialized() -> Self {
        Self::new(PluginEventKind::Initialized)
    }

    pub fn installed(plugin_id: &str) -> Self {
        Self::new(PluginEventKind::Installed).with_plugin(plugin_id)
    }

    pub fn error(plugin_id: &str, message: impl Into<String>) -> Self {
        let mut event = Self::new(PluginEventKind::Error).with_plugin(plugin_id);
        event.message = Some(message.into());
        event
    }

    fn with_plugin(mut self, plugin_id: &str) -> Self {
        self.plugin_id = Some(plugin_id.to_string());
        self
    }
}

/// Synchronous event listener
pub type Listener = Arc<dyn Fn(&PluginEvent) + Send + Sync>;

/// Handle returned by [`EventBus::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Default capacity of the broadcast channel
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Lifecycle event bus
pub struct EventBus {
    listeners: RwLock<HashMap<PluginEventKind, Vec<(ListenerId, Listener)>>>,
    sender: broadcast::Sender<PluginEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl EventBus {
    /// Create a bus whose broadcast channel holds `buffer_size` events
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size.max(1));
        Self {
            listeners: RwLock::new(HashMap::new()),
            sender,
        }
    }

    /// Register a listener
    pub fn on(&self, kind: PluginEventKind, listener: Listener) -> ListenerId {
        let id = ListenerId::new();
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, listener));
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn off(&self, kind: PluginEventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = listeners.get_mut(&kind) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        let removed = entries.len() != before;

        if entries.is_empty() {
            listeners.remove(&kind);
        }
        removed
    }

    /// Deliver an event; returns the number of listeners invoked.
    ///
    /// Listeners run after the table lock is released, so they may call
    /// `on`/`off` themselves. A panicking listener is logged and skipped.
    pub fn emit(&self, event: PluginEvent) -> usize {
        let snapshot: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.kind)
            .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        for listener in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                error!(
                    target: "plugin_events",
                    event = %event.kind,
                    "Error in event listener for {}",
                    event.kind
                );
            }
        }

        match self.sender.send(event) {
            Ok(subscriber_count) => {
                debug!(target: "plugin_events", "Broadcasted event to {} subscribers", subscriber_count);
            }
            Err(_) => {
                debug!(target: "plugin_events", "No subscribers for plugin events");
            }
        }

        snapshot.len()
    }

    /// Receive every subsequent event asynchronously
    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.sender.subscribe()
    }

    /// Number of listeners for one event
    pub fn listener_count(&self, kind: PluginEventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Events with at least one listener
    pub fn events(&self) -> Vec<PluginEventKind> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Drop every listener
    pub fn clear(&self) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
