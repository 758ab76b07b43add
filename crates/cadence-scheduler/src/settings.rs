//! Notification settings and the store that serves them to the engine.
//!
//! Settings are loaded once, read many times, and replaced as a whole. Readers
//! get an `Arc` snapshot; the lock is only held for the pointer swap, never
//! across I/O, so a slow save never blocks scheduling.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cadence_core::{CadenceError, Result};

use crate::request::Category;

/// Full notification configuration. Serialized as camelCase JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub priority_filters: PriorityFilters,
    pub quiet_hours: QuietHours,
    pub event_reminders: EventReminders,
    pub goal_reminders: GoalReminders,
    pub task_reminders: TaskReminders,
    pub sound: SoundSettings,
    pub custom_messages: CustomMessages,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriorityFilters {
    pub show_low: bool,
    pub show_medium: bool,
    pub show_high: bool,
    /// Only Urgent reminders get through while set.
    pub show_urgent_only: bool,
}

impl Default for PriorityFilters {
    fn default() -> Self {
        Self {
            show_low: true,
            show_medium: true,
            show_high: true,
            show_urgent_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuietHours {
    pub enabled: bool,
    /// Zero-padded 24h "HH:MM", inclusive.
    pub start: String,
    /// Zero-padded 24h "HH:MM", inclusive.
    pub end: String,
    pub weekends_only: bool,
    /// Let Urgent reminders through quiet hours.
    pub allow_urgent: bool,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: "22:00".into(),
            end: "07:00".into(),
            weekends_only: false,
            allow_urgent: false,
        }
    }
}

impl QuietHours {
    /// Whether `hhmm` (zero-padded) lies in `[start, end]`.
    pub fn contains(&self, hhmm: &str) -> bool {
        self.start.as_str() <= hhmm && hhmm <= self.end.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventReminders {
    pub enabled: bool,
    pub default_minutes_before: u32,
    pub allow_multiple: bool,
}

impl Default for EventReminders {
    fn default() -> Self {
        Self {
            enabled: true,
            default_minutes_before: 15,
            allow_multiple: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoalReminders {
    pub enabled: bool,
    pub daily_progress: bool,
    pub weekly_review: bool,
    pub overdue_alerts: bool,
    pub achievement_celebrations: bool,
}

impl Default for GoalReminders {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_progress: true,
            weekly_review: true,
            overdue_alerts: true,
            achievement_celebrations: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskReminders {
    pub enabled: bool,
    pub due_date_alerts: bool,
    pub start_date_alerts: bool,
    pub overdue_alerts: bool,
}

impl Default for TaskReminders {
    fn default() -> Self {
        Self {
            enabled: true,
            due_date_alerts: true,
            start_date_alerts: true,
            overdue_alerts: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VibrationPattern {
    Short,
    Long,
    #[default]
    Custom,
}

impl VibrationPattern {
    pub fn millis(&self) -> u32 {
        match self {
            VibrationPattern::Short => 200,
            VibrationPattern::Long => 500,
            VibrationPattern::Custom => 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoundSettings {
    pub enabled: bool,
    pub vibration: bool,
    pub vibration_pattern: VibrationPattern,
    pub default_sound: String,
    pub custom_sounds: CustomSounds,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            vibration: true,
            vibration_pattern: VibrationPattern::default(),
            default_sound: "default".into(),
            custom_sounds: CustomSounds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomSounds {
    pub events: String,
    pub goals: String,
    pub tasks: String,
    pub achievements: String,
}

impl Default for CustomSounds {
    fn default() -> Self {
        Self {
            events: "default".into(),
            goals: "achievement".into(),
            tasks: "reminder".into(),
            achievements: "celebration".into(),
        }
    }
}

impl SoundSettings {
    /// Sound to play for `category`, `None` when sound is off.
    pub fn sound_for(&self, category: Category) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let sounds = &self.custom_sounds;
        let name = match category {
            Category::EventReminder => &sounds.events,
            Category::GoalProgress | Category::GoalReview | Category::GoalOverdue => &sounds.goals,
            Category::GoalAchievement => &sounds.achievements,
            Category::TaskDue | Category::TaskStart | Category::TaskOverdue => &sounds.tasks,
        };
        let name = if name.is_empty() { &self.default_sound } else { name };
        Some(name.clone())
    }

    /// Vibration length in milliseconds, `None` when vibration is off.
    pub fn vibration_ms(&self) -> Option<u32> {
        self.vibration.then(|| self.vibration_pattern.millis())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomMessages {
    pub enabled: bool,
    pub templates: BTreeMap<Category, String>,
}

impl CustomMessages {
    /// The user's template for `category`, if custom messages are on and one is set.
    pub fn template_for(&self, category: Category) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.templates
            .get(&category)
            .map(String::as_str)
            .filter(|t| !t.trim().is_empty())
    }
}

impl NotificationSettings {
    /// Master toggle for the category's group plus its fine-grained toggle.
    pub fn category_enabled(&self, category: Category) -> bool {
        let goals = &self.goal_reminders;
        let tasks = &self.task_reminders;
        match category {
            Category::EventReminder => self.event_reminders.enabled,
            Category::GoalProgress => goals.enabled && goals.daily_progress,
            Category::GoalReview => goals.enabled && goals.weekly_review,
            Category::GoalOverdue => goals.enabled && goals.overdue_alerts,
            Category::GoalAchievement => goals.enabled && goals.achievement_celebrations,
            Category::TaskDue => tasks.enabled && tasks.due_date_alerts,
            Category::TaskStart => tasks.enabled && tasks.start_date_alerts,
            Category::TaskOverdue => tasks.enabled && tasks.overdue_alerts,
        }
    }

    /// Reject values the suppression policy cannot compare safely.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("quietHours.start", &self.quiet_hours.start),
            ("quietHours.end", &self.quiet_hours.end),
        ] {
            if !is_hhmm(value) {
                return Err(CadenceError::settings(format!(
                    "{field} must be zero-padded HH:MM, got '{value}'"
                )));
            }
        }
        Ok(())
    }
}

fn is_hhmm(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let hour = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
    let minute = (bytes[3] - b'0') * 10 + (bytes[4] - b'0');
    hour <= 23 && minute <= 59
}

/// Storage collaborator for settings.
#[async_trait]
pub trait SettingsPersistence: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    async fn load_settings(&self) -> Result<Option<NotificationSettings>>;

    async fn save_settings(&self, settings: &NotificationSettings) -> Result<()>;
}

/// Holds the live settings and persists replacements.
pub struct SettingsStore {
    current: RwLock<Arc<NotificationSettings>>,
    persistence: Arc<dyn SettingsPersistence>,
    /// Serializes `replace` so the saved value and the live value agree.
    write_gate: tokio::sync::Mutex<()>,
}

impl SettingsStore {
    /// A store serving the permissive defaults until [`SettingsStore::load`] runs.
    pub fn new(persistence: Arc<dyn SettingsPersistence>) -> Self {
        Self {
            current: RwLock::new(Arc::new(NotificationSettings::default())),
            persistence,
            write_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Load persisted settings. Missing settings keep the defaults.
    pub async fn load(&self) -> Result<Arc<NotificationSettings>> {
        let loaded = self
            .persistence
            .load_settings()
            .await
            .map_err(into_storage_error)?;

        match loaded {
            Some(settings) => {
                settings.validate()?;
                let settings = Arc::new(settings);
                self.swap(Arc::clone(&settings));
                tracing::info!("📋 Notification settings loaded");
                Ok(settings)
            }
            None => {
                tracing::debug!("No saved notification settings, using defaults");
                Ok(self.current())
            }
        }
    }

    /// Snapshot of the live settings.
    pub fn current(&self) -> Arc<NotificationSettings> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    /// Persist `settings` and make it live. Nothing changes if saving fails.
    pub async fn replace(&self, settings: NotificationSettings) -> Result<()> {
        settings.validate()?;
        let _gate = self.write_gate.lock().await;
        self.persistence
            .save_settings(&settings)
            .await
            .map_err(into_storage_error)?;
        self.swap(Arc::new(settings));
        tracing::info!("✅ Notification settings updated");
        Ok(())
    }

    fn swap(&self, settings: Arc<NotificationSettings>) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = settings;
    }
}

fn into_storage_error(err: CadenceError) -> CadenceError {
    match err {
        CadenceError::StorageUnavailable(_) => err,
        other => CadenceError::storage(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemSettings {
        saved: Mutex<Option<NotificationSettings>>,
        fail: bool,
    }

    #[async_trait]
    impl SettingsPersistence for MemSettings {
        async fn load_settings(&self) -> Result<Option<NotificationSettings>> {
            if self.fail {
                return Err(CadenceError::Io(std::io::Error::other("unreadable")));
            }
            Ok(self.saved.lock().unwrap().clone())
        }

        async fn save_settings(&self, settings: &NotificationSettings) -> Result<()> {
            if self.fail {
                return Err(CadenceError::storage("read-only"));
            }
            *self.saved.lock().unwrap() = Some(settings.clone());
            Ok(())
        }
    }

    #[test]
    fn test_defaults_are_permissive() {
        let s = NotificationSettings::default();
        assert!(s.priority_filters.show_low && s.priority_filters.show_medium && s.priority_filters.show_high);
        assert!(!s.priority_filters.show_urgent_only);
        assert!(!s.quiet_hours.enabled);
        assert!(Category::ALL.iter().all(|c| s.category_enabled(*c)));
    }

    #[test]
    fn test_fine_toggles() {
        let mut s = NotificationSettings::default();
        s.goal_reminders.daily_progress = false;
        assert!(!s.category_enabled(Category::GoalProgress));
        assert!(s.category_enabled(Category::GoalOverdue));
        s.goal_reminders.enabled = false;
        assert!(!s.category_enabled(Category::GoalOverdue));
        assert!(s.category_enabled(Category::TaskDue));
    }

    #[test]
    fn test_validate_quiet_hours_format() {
        let mut s = NotificationSettings::default();
        assert!(s.validate().is_ok());
        s.quiet_hours.start = "9:00".into();
        assert!(matches!(s.validate(), Err(CadenceError::InvalidSettings(_))));
        s.quiet_hours.start = "24:00".into();
        assert!(s.validate().is_err());
        s.quiet_hours.start = "23:59".into();
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_sound_resolution() {
        let mut s = SoundSettings::default();
        assert_eq!(s.sound_for(Category::GoalAchievement).as_deref(), Some("celebration"));
        assert_eq!(s.sound_for(Category::TaskDue).as_deref(), Some("reminder"));
        assert_eq!(s.vibration_ms(), Some(300));
        s.custom_sounds.events.clear();
        assert_eq!(s.sound_for(Category::EventReminder).as_deref(), Some("default"));
        s.enabled = false;
        s.vibration = false;
        assert_eq!(s.sound_for(Category::EventReminder), None);
        assert_eq!(s.vibration_ms(), None);
    }

    #[test]
    fn test_every_category_maps_to_its_custom_sound() {
        let s = SoundSettings {
            custom_sounds: CustomSounds {
                events: "bell".into(),
                goals: "chime".into(),
                tasks: "tick".into(),
                achievements: "fanfare".into(),
            },
            ..SoundSettings::default()
        };
        for category in Category::ALL {
            let expected = match category.channel() {
                "events" => "bell",
                "goals" => "chime",
                "tasks" => "tick",
                _ => "fanfare",
            };
            assert_eq!(s.sound_for(category).as_deref(), Some(expected), "{category:?}");
        }
    }

    #[test]
    fn test_json_shape_is_camel_case_and_partial() {
        let raw = r#"{"priorityFilters":{"showLow":false},"quietHours":{"enabled":true,"start":"12:00","end":"14:00"},
            "customMessages":{"enabled":true,"templates":{"taskDue":"Due: {{title}}"}}}"#;
        let s: NotificationSettings = serde_json::from_str(raw).unwrap();
        assert!(!s.priority_filters.show_low);
        assert!(s.priority_filters.show_medium);
        assert!(s.quiet_hours.enabled);
        assert_eq!(s.custom_messages.template_for(Category::TaskDue), Some("Due: {{title}}"));
        assert!(s.task_reminders.enabled);
    }

    #[tokio::test]
    async fn test_current_before_load_is_default() {
        let store = SettingsStore::new(Arc::new(MemSettings::default()));
        assert_eq!(*store.current(), NotificationSettings::default());
        // Nothing saved yet: load keeps the defaults.
        assert_eq!(*store.load().await.unwrap(), NotificationSettings::default());
    }

    #[tokio::test]
    async fn test_replace_persists_and_swaps() {
        let backing = Arc::new(MemSettings::default());
        let store = SettingsStore::new(backing.clone());
        let before = store.current();

        let mut next = NotificationSettings::default();
        next.quiet_hours.enabled = true;
        store.replace(next.clone()).await.unwrap();

        assert_eq!(*store.current(), next);
        assert_eq!(backing.saved.lock().unwrap().clone(), Some(next.clone()));
        // Earlier snapshots are untouched.
        assert!(!before.quiet_hours.enabled);

        let reloaded = SettingsStore::new(backing);
        assert_eq!(*reloaded.load().await.unwrap(), next);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_old_settings() {
        let store = SettingsStore::new(Arc::new(MemSettings {
            fail: true,
            ..Default::default()
        }));
        let mut next = NotificationSettings::default();
        next.sound.enabled = false;
        let err = store.replace(next).await.unwrap_err();
        assert!(matches!(err, CadenceError::StorageUnavailable(_)));
        assert!(store.current().sound.enabled);
    }

    #[tokio::test]
    async fn test_load_failure_is_storage_unavailable() {
        let store = SettingsStore::new(Arc::new(MemSettings {
            fail: true,
            ..Default::default()
        }));
        assert!(matches!(store.load().await, Err(CadenceError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn test_invalid_replace_rejected_before_save() {
        let backing = Arc::new(MemSettings::default());
        let store = SettingsStore::new(backing.clone());
        let mut next = NotificationSettings::default();
        next.quiet_hours.end = "7pm".into();
        assert!(matches!(store.replace(next).await, Err(CadenceError::InvalidSettings(_))));
        assert!(backing.saved.lock().unwrap().is_none());
    }
}
