//! File-based store: settings and registry as JSON documents.
//! Human-readable, one file each, only touched when something changes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cadence_core::{CadenceError, Result};

use crate::registry::{RegistryMap, RegistryPersistence};
use crate::request::{EntityKey, EntityKind, NotificationHandle};
use crate::settings::{NotificationSettings, SettingsPersistence};

const SETTINGS_FILE: &str = "settings.json";
const REGISTRY_FILE: &str = "registry.json";

/// One registry entry as it appears in `registry.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryRecord {
    kind: EntityKind,
    id: String,
    handles: Vec<NotificationHandle>,
}

/// JSON documents under a data directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Store rooted at `dir`; the directory is created on first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    fn registry_path(&self) -> PathBuf {
        self.dir.join(REGISTRY_FILE)
    }

    /// Read a file, `None` if it does not exist.
    async fn read_optional(path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CadenceError::storage(format!("read {}: {e}", path.display()))),
        }
    }

    /// Write through a sibling temp file so a crash never leaves half a document.
    async fn write_atomic(&self, path: &Path, json: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CadenceError::storage(format!("create {}: {e}", self.dir.display())))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| CadenceError::storage(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| CadenceError::storage(format!("rename {}: {e}", path.display())))?;
        Ok(())
    }
}

#[async_trait]
impl SettingsPersistence for JsonFileStore {
    async fn load_settings(&self) -> Result<Option<NotificationSettings>> {
        let path = self.settings_path();
        let Some(raw) = Self::read_optional(&path).await? else {
            return Ok(None);
        };
        let settings = serde_json::from_str(&raw)
            .map_err(|e| CadenceError::storage(format!("parse {}: {e}", path.display())))?;
        Ok(Some(settings))
    }

    async fn save_settings(&self, settings: &NotificationSettings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings)?;
        let path = self.settings_path();
        self.write_atomic(&path, &json).await?;
        tracing::debug!("💾 Saved settings to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl RegistryPersistence for JsonFileStore {
    async fn load_registry(&self) -> Result<RegistryMap> {
        let path = self.registry_path();
        let Some(raw) = Self::read_optional(&path).await? else {
            return Ok(RegistryMap::new());
        };
        let records: Vec<RegistryRecord> = serde_json::from_str(&raw)
            .map_err(|e| CadenceError::registry(format!("parse {}: {e}", path.display())))?;

        let mut map = RegistryMap::new();
        for record in records {
            map.entry(EntityKey::new(record.kind, record.id))
                .or_default()
                .extend(record.handles);
        }
        Ok(map)
    }

    async fn save_registry(&self, registry: &RegistryMap) -> Result<()> {
        let records: Vec<RegistryRecord> = registry
            .iter()
            .map(|(key, handles)| RegistryRecord {
                kind: key.kind,
                id: key.id.clone(),
                handles: handles.clone(),
            })
            .collect();
        let json = serde_json::to_string_pretty(&records)?;
        let path = self.registry_path();
        self.write_atomic(&path, &json)
            .await
            .map_err(|e| CadenceError::registry(e.to_string()))?;
        tracing::debug!("💾 Saved {} registry entries to {}", records.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_files_mean_nothing_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data"));
        assert!(store.load_settings().await.unwrap().is_none());
        assert!(store.load_registry().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let mut settings = NotificationSettings::default();
        settings.quiet_hours.enabled = true;
        settings.quiet_hours.start = "12:00".into();
        store.save_settings(&settings).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap();
        assert!(raw.contains("\"quietHours\""));
        assert_eq!(store.load_settings().await.unwrap(), Some(settings));
    }

    #[tokio::test]
    async fn test_registry_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let mut map = RegistryMap::new();
        map.insert(
            EntityKey::task("t1"),
            vec![NotificationHandle::new("a"), NotificationHandle::new("b")],
        );
        map.insert(EntityKey::goal("g1"), vec![NotificationHandle::new("c")]);
        store.save_registry(&map).await.unwrap();

        let reopened = JsonFileStore::new(dir.path());
        assert_eq!(reopened.load_registry().await.unwrap(), map);
        assert!(!dir.path().join("registry.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{not json").unwrap();
        std::fs::write(dir.path().join(REGISTRY_FILE), "[1, 2]").unwrap();
        let store = JsonFileStore::new(dir.path());

        assert!(matches!(
            store.load_settings().await,
            Err(CadenceError::StorageUnavailable(_))
        ));
        assert!(matches!(
            store.load_registry().await,
            Err(CadenceError::RegistryPersistence(_))
        ));
    }
}
