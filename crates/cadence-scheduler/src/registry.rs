//! Notification registry: which backend handles belong to which entity.
//!
//! Every mutation is written through to persistence before it becomes
//! visible; if the write fails the in-memory state is left as it was.
//! An entity with no handles has no entry at all.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use cadence_core::{CadenceError, Result};

use crate::request::{EntityKey, NotificationHandle};

/// Logical registry content: entity → ordered, duplicate-free handles.
pub type RegistryMap = BTreeMap<EntityKey, Vec<NotificationHandle>>;

/// Storage collaborator for the registry.
#[async_trait]
pub trait RegistryPersistence: Send + Sync {
    async fn load_registry(&self) -> Result<RegistryMap>;

    async fn save_registry(&self, registry: &RegistryMap) -> Result<()>;
}

pub struct NotificationRegistry {
    entries: Mutex<RegistryMap>,
    persistence: Arc<dyn RegistryPersistence>,
}

impl NotificationRegistry {
    /// An empty registry that writes through to `persistence`.
    pub fn new(persistence: Arc<dyn RegistryPersistence>) -> Self {
        Self {
            entries: Mutex::new(RegistryMap::new()),
            persistence,
        }
    }

    /// Hydrate from persistence.
    pub async fn load(persistence: Arc<dyn RegistryPersistence>) -> Result<Self> {
        let stored = persistence.load_registry().await.map_err(into_registry_error)?;
        let entries = normalize(stored);
        tracing::info!("📒 Notification registry loaded: {} entities", entries.len());
        Ok(Self {
            entries: Mutex::new(entries),
            persistence,
        })
    }

    /// Record `handle` for `key`. Registering a handle that is already
    /// present is a no-op; a handle held by another entity moves to `key`.
    pub async fn register(&self, key: &EntityKey, handle: NotificationHandle) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|handles| handles.contains(&handle)) {
            return Ok(());
        }

        let mut next = entries.clone();
        next.retain(|other, handles| {
            if other != key {
                handles.retain(|h| h != &handle);
            }
            !handles.is_empty()
        });
        next.entry(key.clone()).or_default().push(handle);

        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    /// Handles outstanding for `key`; empty when there is no entry.
    pub async fn list_handles(&self, key: &EntityKey) -> Vec<NotificationHandle> {
        self.entries
            .lock()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn contains(&self, key: &EntityKey) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    /// Drop the entry for `key`. Returns whether an entry existed; clearing an
    /// absent entry does nothing and never fails.
    pub async fn clear(&self, key: &EntityKey) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(key) {
            return Ok(false);
        }
        let mut next = entries.clone();
        next.remove(key);

        self.persist(&next).await?;
        *entries = next;
        Ok(true)
    }

    /// Every entity with outstanding handles.
    pub async fn entities(&self) -> Vec<EntityKey> {
        self.entries.lock().await.keys().cloned().collect()
    }

    /// Copy of the whole registry.
    pub async fn snapshot(&self) -> RegistryMap {
        self.entries.lock().await.clone()
    }

    async fn persist(&self, next: &RegistryMap) -> Result<()> {
        match self.persistence.save_registry(next).await {
            Ok(()) => {
                tracing::debug!("💾 Registry saved ({} entities)", next.len());
                Ok(())
            }
            Err(e) => {
                tracing::error!("❌ Registry persistence failed: {e}");
                Err(into_registry_error(e))
            }
        }
    }
}

/// Drop empty entries and duplicate handles, keeping each handle under the
/// first entity that lists it.
fn normalize(stored: RegistryMap) -> RegistryMap {
    let mut seen = HashSet::new();
    let mut entries = RegistryMap::new();
    for (key, handles) in stored {
        let mut kept = Vec::with_capacity(handles.len());
        for handle in handles {
            if seen.insert(handle.clone()) {
                kept.push(handle);
            } else {
                tracing::warn!("⚠️ Dropping duplicate registry handle {handle} under {key}");
            }
        }
        if !kept.is_empty() {
            entries.insert(key, kept);
        }
    }
    entries
}

fn into_registry_error(err: CadenceError) -> CadenceError {
    match err {
        CadenceError::RegistryPersistence(_) => err,
        other => CadenceError::registry(other.to_string()),
    }
}
