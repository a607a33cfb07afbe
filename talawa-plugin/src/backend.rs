//! Persistence backend for installed plugin records
//!
//! The admin portal stores which plugins are installed and activated in its
//! API server. [`PluginBackend`] is the seam to that service;
//! [`InMemoryPluginBackend`] keeps records in process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::error::{PluginError, PluginResult};

/// Installed plugin record as stored by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRecord {
    /// Backend record id
    pub id: String,
    pub plugin_id: String,
    pub is_activated: bool,
    pub is_installed: bool,
    pub backup: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PluginRecord {
    pub fn new(id: impl Into<String>, plugin_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            plugin_id: plugin_id.into(),
            is_activated: false,
            is_installed: true,
            backup: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn activated(mut self, is_activated: bool) -> Self {
        self.is_activated = is_activated;
        self
    }
}

/// Plugin persistence operations
#[async_trait]
pub trait PluginBackend: Send + Sync {
    /// All installed plugin records
    async fn list_plugins(&self) -> PluginResult<Vec<PluginRecord>>;

    /// Create a record for `plugin_id`; `None` when the backend declined
    async fn create_plugin(&self, plugin_id: &str) -> PluginResult<Option<PluginRecord>>;

    /// Set the activation flag of record `id`
    async fn update_plugin_status(&self, id: &str, is_activated: bool) -> PluginResult<()>;

    /// Delete record `id`
    async fn delete_plugin(&self, id: &str) -> PluginResult<()>;

    /// Delete the installed files of `plugin_id`
    async fn delete_plugin_files(&self, plugin_id: &str) -> PluginResult<()>;
}

/// Operations an [`InMemoryPluginBackend`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOperation {
    List,
    Create,
    UpdateStatus,
    Delete,
    DeleteFiles,
}

/// In-process plugin backend
#[derive(Default)]
pub struct InMemoryPluginBackend {
    records: RwLock<Vec<PluginRecord>>,
    deleted_files: RwLock<Vec<String>>,
    failing: RwLock<HashSet<BackendOperation>>,
    next_id: AtomicU64,
}

impl InMemoryPluginBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend seeded with records
    pub fn with_records(records: Vec<PluginRecord>) -> Self {
        let next_id = records.len() as u64;
        Self {
            records: RwLock::new(records),
            next_id: AtomicU64::new(next_id),
            ..Default::default()
        }
    }

    /// Make `operation` fail until [`recover`](Self::recover) is called
    pub fn fail_on(&self, operation: BackendOperation) {
        self.failing
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(operation);
    }

    pub fn recover(&self, operation: BackendOperation) {
        self.failing
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&operation);
    }

    /// Current records
    pub fn records(&self) -> Vec<PluginRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Plugin ids whose files were deleted, in order
    pub fn deleted_files(&self) -> Vec<String> {
        self.deleted_files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check(&self, operation: BackendOperation) -> PluginResult<()> {
        if self
            .failing
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&operation)
        {
            return Err(PluginError::backend(format!("{:?} operation failed", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl PluginBackend for InMemoryPluginBackend {
    async fn list_plugins(&self) -> PluginResult<Vec<PluginRecord>> {
        self.check(BackendOperation::List)?;
        Ok(self.records())
    }

    async fn create_plugin(&self, plugin_id: &str) -> PluginResult<Option<PluginRecord>> {
        self.check(BackendOperation::Create)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = PluginRecord::new(id.to_string(), plugin_id);
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(Some(record))
    }

    async fn update_plugin_status(&self, id: &str, is_activated: bool) -> PluginResult<()> {
        self.check(BackendOperation::UpdateStatus)?;
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PluginError::backend(format!("No plugin record with id {}", id)))?;
        record.is_activated = is_activated;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_plugin(&self, id: &str) -> PluginResult<()> {
        self.check(BackendOperation::Delete)?;
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|r| r.id != id);
        Ok(())
    }

    async fn delete_plugin_files(&self, plugin_id: &str) -> PluginResult<()> {
        self.check(BackendOperation::DeleteFiles)?;
        self.deleted_files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(plugin_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_crud() {
        let backend = InMemoryPluginBackend::with_records(vec![PluginRecord::new("1", "testPlugin").activated(true)]);

        let created = backend.create_plugin("newPlugin").await.unwrap().unwrap();
        assert_eq!(created.id, "2");
        assert!(!created.is_activated);
        assert!(created.is_installed);

        backend.update_plugin_status("2", true).await.unwrap();
        assert!(backend.list_plugins().await.unwrap().iter().all(|r| r.is_activated));
        assert!(backend.update_plugin_status("99", true).await.is_err());

        backend.delete_plugin("1").await.unwrap();
        assert_eq!(backend.records().len(), 1);

        backend.delete_plugin_files("testPlugin").await.unwrap();
        assert_eq!(backend.deleted_files(), vec!["testPlugin"]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let backend = InMemoryPluginBackend::new();
        backend.fail_on(BackendOperation::List);
        assert!(matches!(backend.list_plugins().await, Err(PluginError::Backend(_))));

        backend.recover(BackendOperation::List);
        assert!(backend.list_plugins().await.unwrap().is_empty());
    }
}
