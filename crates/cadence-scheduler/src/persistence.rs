//! SQLite-backed persistence for notification settings and the registry.
//! Alternative to the JSON file store for hosts that already keep app data in SQLite.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use cadence_core::{CadenceError, Result};

use crate::registry::{RegistryMap, RegistryPersistence};
use crate::request::{EntityKey, EntityKind, NotificationHandle};
use crate::settings::{NotificationSettings, SettingsPersistence};

/// SQLite store for settings (one JSON row) and registry (one row per handle).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| CadenceError::storage(format!("DB open: {e}")))?;
        Self::with_connection(conn)
    }

    /// Private in-memory database, gone when the store is dropped.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CadenceError::storage(format!("DB open: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Create tables if missing.
    fn migrate(&self) -> Result<()> {
        self.lock()?
            .execute_batch(
                "
            -- Notification settings, a single camelCase JSON document
            CREATE TABLE IF NOT EXISTS notification_settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Registry: handles per entity, in registration order
            CREATE TABLE IF NOT EXISTS notification_registry (
                kind TEXT NOT NULL,              -- 'event', 'goal', 'task'
                entity_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                handle TEXT NOT NULL UNIQUE,
                PRIMARY KEY (kind, entity_id, position)
            );
         ",
            )
            .map_err(|e| CadenceError::storage(format!("Migration: {e}")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CadenceError::storage(format!("DB lock poisoned: {e}")))
    }
}

#[async_trait]
impl SettingsPersistence for SqliteStore {
    async fn load_settings(&self) -> Result<Option<NotificationSettings>> {
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row("SELECT body FROM notification_settings WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| CadenceError::storage(format!("Load settings: {e}")))?;

        body.map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| CadenceError::storage(format!("Parse settings: {e}")))
        })
        .transpose()
    }

    async fn save_settings(&self, settings: &NotificationSettings) -> Result<()> {
        let body = serde_json::to_string(settings)?;
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO notification_settings (id, body, updated_at)
                 VALUES (1, ?1, ?2)",
                rusqlite::params![body, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(|e| CadenceError::storage(format!("Save settings: {e}")))?;
        tracing::debug!("💾 Saved settings to SQLite");
        Ok(())
    }
}

#[async_trait]
impl RegistryPersistence for SqliteStore {
    async fn load_registry(&self) -> Result<RegistryMap> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT kind, entity_id, handle FROM notification_registry
                 ORDER BY kind, entity_id, position",
            )
            .map_err(|e| CadenceError::registry(format!("Load registry: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| CadenceError::registry(format!("Load registry: {e}")))?;

        let mut map = RegistryMap::new();
        for row in rows {
            let (kind, entity_id, handle) =
                row.map_err(|e| CadenceError::registry(format!("Load registry: {e}")))?;
            let kind: EntityKind = kind
                .parse()
                .map_err(|e: CadenceError| CadenceError::registry(e.to_string()))?;
            map.entry(EntityKey::new(kind, entity_id))
                .or_default()
                .push(NotificationHandle::new(handle));
        }
        Ok(map)
    }

    async fn save_registry(&self, registry: &RegistryMap) -> Result<()> {
        let mut conn = self.lock().map_err(|e| CadenceError::registry(e.to_string()))?;
        let tx = conn
            .transaction()
            .map_err(|e| CadenceError::registry(format!("Begin: {e}")))?;
        tx.execute("DELETE FROM notification_registry", [])
            .map_err(|e| CadenceError::registry(format!("Clear registry: {e}")))?;
        {
            let mut insert = tx
                .prepare(
                    "INSERT INTO notification_registry (kind, entity_id, position, handle)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(|e| CadenceError::registry(format!("Save registry: {e}")))?;
            for (key, handles) in registry {
                for (position, handle) in handles.iter().enumerate() {
                    insert
                        .execute(rusqlite::params![
                            key.kind.as_str(),
                            key.id,
                            position as i64,
                            handle.as_str(),
                        ])
                        .map_err(|e| CadenceError::registry(format!("Save registry: {e}")))?;
                }
            }
        }
        tx.commit()
            .map_err(|e| CadenceError::registry(format!("Commit: {e}")))?;
        tracing::debug!("💾 Saved {} registry entries to SQLite", registry.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(raw: &str) -> NotificationHandle {
        NotificationHandle::new(raw)
    }

    #[tokio::test]
    async fn test_open_and_migrate() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load_settings().await.unwrap().is_none());
        assert!(store.load_registry().await.unwrap().is_empty());
        // Migrating twice is harmless.
        store.migrate().unwrap();
    }

    #[tokio::test]
    async fn test_settings_replace_single_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut settings = NotificationSettings::default();
        store.save_settings(&settings).await.unwrap();
        settings.priority_filters.show_urgent_only = true;
        store.save_settings(&settings).await.unwrap();

        assert_eq!(store.load_settings().await.unwrap(), Some(settings));
        let rows: i64 = store
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM notification_settings", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_registry_keeps_handle_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut map = RegistryMap::new();
        map.insert(EntityKey::event("e1"), vec![h("z"), h("a"), h("m")]);
        map.insert(EntityKey::task("t1"), vec![h("b")]);
        store.save_registry(&map).await.unwrap();
        assert_eq!(store.load_registry().await.unwrap(), map);

        map.remove(&EntityKey::event("e1"));
        store.save_registry(&map).await.unwrap();
        assert_eq!(store.load_registry().await.unwrap(), map);
    }

    #[tokio::test]
    async fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cadence.db");
        let mut map = RegistryMap::new();
        map.insert(EntityKey::goal("g1"), vec![h("goal_g1_progress_daily")]);
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_registry(&map).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_registry().await.unwrap(), map);
    }
}
