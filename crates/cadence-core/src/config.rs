//! Cadence configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CadenceError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CadenceConfig {
    /// Directory holding settings and registry state. `~` is expanded.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub store: StoreKind,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub reminders: ReminderDefaults,
}

fn default_data_dir() -> String { "~/.cadence".into() }

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store: StoreKind::default(),
            backend: BackendKind::default(),
            reminders: ReminderDefaults::default(),
        }
    }
}

impl CadenceConfig {
    /// Load config from the default path (~/.cadence/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CadenceError::config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CadenceError::config(format!("Failed to parse config: {e}")))?;
        config.reminders.validate()?;
        Ok(config)
    }

    /// Save config to the given path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| CadenceError::config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Cadence home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cadence")
    }

    /// Data directory with `~` and environment variables expanded.
    pub fn data_path(&self) -> PathBuf {
        match shellexpand::full(&self.data_dir) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(e) => {
                tracing::warn!("⚠️ Could not expand data_dir '{}': {e}", self.data_dir);
                PathBuf::from(&self.data_dir)
            }
        }
    }
}

/// Where settings and the registry are persisted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// `settings.json` + `registry.json` in the data directory.
    #[default]
    Json,
    /// `cadence.db` in the data directory.
    Sqlite,
}

/// Which notification backend is wired in at startup.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Writes every dispatch to the log.
    #[default]
    Log,
    /// Keeps dispatches in process memory.
    Memory,
}

/// Defaults for the convenience reminder constructors. The event lead time
/// is a user setting (`eventReminders.defaultMinutesBefore`), not config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderDefaults {
    #[serde(default = "default_daily_progress_hour")]
    pub daily_progress_hour: u32,
    #[serde(default)]
    pub daily_progress_minute: u32,
    /// 0 = Sunday .. 6 = Saturday.
    #[serde(default = "default_weekly_review_weekday")]
    pub weekly_review_weekday: u32,
    #[serde(default = "default_weekly_review_hour")]
    pub weekly_review_hour: u32,
    #[serde(default)]
    pub weekly_review_minute: u32,
    /// Delay used when a goal is already past its end date.
    #[serde(default = "default_overdue_grace_minutes")]
    pub overdue_grace_minutes: u32,
}

fn default_daily_progress_hour() -> u32 { 18 }
fn default_weekly_review_weekday() -> u32 { 1 }
fn default_weekly_review_hour() -> u32 { 9 }
fn default_overdue_grace_minutes() -> u32 { 5 }

impl Default for ReminderDefaults {
    fn default() -> Self {
        Self {
            daily_progress_hour: default_daily_progress_hour(),
            daily_progress_minute: 0,
            weekly_review_weekday: default_weekly_review_weekday(),
            weekly_review_hour: default_weekly_review_hour(),
            weekly_review_minute: 0,
            overdue_grace_minutes: default_overdue_grace_minutes(),
        }
    }
}

impl ReminderDefaults {
    fn validate(&self) -> Result<()> {
        if self.daily_progress_hour > 23 || self.daily_progress_minute > 59 {
            return Err(CadenceError::config("reminders.daily_progress time out of range"));
        }
        if self.weekly_review_weekday > 6 {
            return Err(CadenceError::config("reminders.weekly_review_weekday must be 0-6"));
        }
        if self.weekly_review_hour > 23 || self.weekly_review_minute > 59 {
            return Err(CadenceError::config("reminders.weekly_review time out of range"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: CadenceConfig = toml::from_str("").unwrap();
        assert_eq!(config, CadenceConfig::default());
        assert_eq!(config.store, StoreKind::Json);
        assert_eq!(config.backend, BackendKind::Log);
        assert_eq!(config.reminders.overdue_grace_minutes, 5);
    }

    #[test]
    fn test_partial_toml() {
        let raw = r#"
data_dir = "/tmp/cadence"
store = "sqlite"

[reminders]
daily_progress_hour = 20
"#;
        let config: CadenceConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.store, StoreKind::Sqlite);
        assert_eq!(config.backend, BackendKind::Log);
        assert_eq!(config.reminders.daily_progress_hour, 20);
        assert_eq!(config.reminders.weekly_review_hour, 9);
        assert_eq!(config.data_path(), PathBuf::from("/tmp/cadence"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = CadenceConfig::default();
        config.backend = BackendKind::Memory;
        config.save_to(&path).unwrap();
        assert_eq!(CadenceConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_rejects_out_of_range_weekday() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[reminders]\nweekly_review_weekday = 7\n").unwrap();
        let err = CadenceConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, CadenceError::Config(_)));
    }
}
