//! Request definitions: what callers hand the engine when they want a reminder.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use cadence_core::{CadenceError, Result};

use crate::compose;
use crate::recurrence::RecurrencePattern;

/// The kind of planning object a reminder belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Event,
    Goal,
    Task,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Event => "event",
            EntityKind::Goal => "goal",
            EntityKind::Task => "task",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "event" => Ok(EntityKind::Event),
            "goal" => Ok(EntityKind::Goal),
            "task" => Ok(EntityKind::Task),
            other => Err(CadenceError::request(format!("unknown entity kind '{other}'"))),
        }
    }
}

/// Registry key: one planning object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn event(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Event, id)
    }

    pub fn goal(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Goal, id)
    }

    pub fn task(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Task, id)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// What a reminder is about. Each category belongs to one entity group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    EventReminder,
    GoalProgress,
    GoalReview,
    GoalOverdue,
    GoalAchievement,
    TaskDue,
    TaskStart,
    TaskOverdue,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::EventReminder,
        Category::GoalProgress,
        Category::GoalReview,
        Category::GoalOverdue,
        Category::GoalAchievement,
        Category::TaskDue,
        Category::TaskStart,
        Category::TaskOverdue,
    ];

    /// The entity group whose master toggle gates this category.
    pub fn group(&self) -> EntityKind {
        match self {
            Category::EventReminder => EntityKind::Event,
            Category::GoalProgress
            | Category::GoalReview
            | Category::GoalOverdue
            | Category::GoalAchievement => EntityKind::Goal,
            Category::TaskDue | Category::TaskStart | Category::TaskOverdue => EntityKind::Task,
        }
    }

    /// Backend channel the notification is posted on.
    pub fn channel(&self) -> &'static str {
        match self {
            Category::EventReminder => "events",
            Category::GoalAchievement => "achievements",
            Category::GoalProgress | Category::GoalReview | Category::GoalOverdue => "goals",
            Category::TaskDue | Category::TaskStart | Category::TaskOverdue => "tasks",
        }
    }
}

/// Reminder priority, as set on the planning object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl std::str::FromStr for Priority {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(CadenceError::request(format!("unknown priority '{other}'"))),
        }
    }
}

/// Opaque identifier handed back by a notification backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationHandle(String);

impl NotificationHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// When the reminder fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timing {
    /// Fire once at an absolute instant.
    At(DateTime<Utc>),
    /// Fire on a daily/weekly cadence; the backend re-arms it.
    Recurring(RecurrencePattern),
}

/// A reminder the caller wants scheduled. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub entity: EntityKey,
    pub category: Category,
    pub priority: Priority,
    /// Values substituted into the message template (`{{key}}`).
    pub payload: BTreeMap<String, String>,
    pub timing: Timing,
    /// Makes the notification id deterministic: `{kind}_{id}_{dedupe_key}`.
    pub dedupe_key: Option<String>,
}

impl NotificationRequest {
    /// One-shot request firing at `at`.
    pub fn one_shot(
        entity: EntityKey,
        category: Category,
        priority: Priority,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity,
            category,
            priority,
            payload: BTreeMap::new(),
            timing: Timing::At(at),
            dedupe_key: None,
        }
    }

    /// Recurring request following `pattern`.
    pub fn recurring(
        entity: EntityKey,
        category: Category,
        priority: Priority,
        pattern: RecurrencePattern,
    ) -> Self {
        Self {
            entity,
            category,
            priority,
            payload: BTreeMap::new(),
            timing: Timing::Recurring(pattern),
            dedupe_key: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn with_dedupe_key(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }

    /// Notification id the engine hands the backend for this request.
    pub fn notification_id(&self) -> String {
        let suffix = match &self.dedupe_key {
            Some(key) => key.clone(),
            None => uuid::Uuid::new_v4().simple().to_string(),
        };
        format!("{}_{}_{}", self.entity.kind, self.entity.id, suffix)
    }

    // ─── Planning-app reminders ───────────────────────────────

    /// Event reminder `minutes_before` the event starts.
    pub fn event_reminder(
        event_id: &str,
        title: &str,
        starts_at: DateTime<Utc>,
        minutes_before: u32,
        priority: Priority,
    ) -> Self {
        let at = starts_at - Duration::minutes(i64::from(minutes_before));
        Self::one_shot(EntityKey::event(event_id), Category::EventReminder, priority, at)
            .with_field("title", title)
            .with_field("time", compose::time_until_text(minutes_before))
            .with_dedupe_key(minutes_before.to_string())
    }

    /// Daily "update your progress" nudge.
    pub fn goal_daily_progress(goal_id: &str, title: &str, hour: u32, minute: u32) -> Result<Self> {
        let pattern = RecurrencePattern::daily(hour, minute)?;
        Ok(
            Self::recurring(EntityKey::goal(goal_id), Category::GoalProgress, Priority::Medium, pattern)
                .with_field("title", title)
                .with_dedupe_key("progress_daily"),
        )
    }

    /// Weekly goal review on `weekday` (0 = Sunday).
    pub fn goal_weekly_review(
        goal_id: &str,
        title: &str,
        weekday: u32,
        hour: u32,
        minute: u32,
    ) -> Result<Self> {
        let pattern = RecurrencePattern::weekly(weekday, hour, minute)?;
        Ok(
            Self::recurring(EntityKey::goal(goal_id), Category::GoalReview, Priority::Medium, pattern)
                .with_field("title", title)
                .with_dedupe_key("review_weekly"),
        )
    }

    /// Overdue alert at the goal's end date, or `grace` from `now` if that
    /// date has already passed.
    pub fn goal_overdue(
        goal_id: &str,
        title: &str,
        due_at: DateTime<Utc>,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> Self {
        let at = if due_at > now { due_at } else { now + grace };
        Self::one_shot(EntityKey::goal(goal_id), Category::GoalOverdue, Priority::High, at)
            .with_field("title", title)
            .with_dedupe_key("overdue_once")
    }

    pub fn goal_achievement(goal_id: &str, title: &str, at: DateTime<Utc>) -> Self {
        Self::one_shot(EntityKey::goal(goal_id), Category::GoalAchievement, Priority::High, at)
            .with_field("title", title)
    }

    pub fn task_due(task_id: &str, title: &str, due_at: DateTime<Utc>, priority: Priority) -> Self {
        Self::one_shot(EntityKey::task(task_id), Category::TaskDue, priority, due_at)
            .with_field("title", title)
            .with_field("dueDate", due_at.format("%Y-%m-%d").to_string())
    }

    /// Overdue alert for a task, same timing rule as [`Self::goal_overdue`].
    pub fn task_overdue(
        task_id: &str,
        title: &str,
        due_at: DateTime<Utc>,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> Self {
        let at = if due_at > now { due_at } else { now + grace };
        Self::one_shot(EntityKey::task(task_id), Category::TaskOverdue, Priority::High, at)
            .with_field("title", title)
            .with_dedupe_key("overdue_once")
    }

    pub fn task_start(
        task_id: &str,
        title: &str,
        starts_at: DateTime<Utc>,
        priority: Priority,
    ) -> Self {
        Self::one_shot(EntityKey::task(task_id), Category::TaskStart, priority, starts_at)
            .with_field("title", title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_every_category_has_group_and_channel() {
        for category in Category::ALL {
            assert!(!category.channel().is_empty());
        }
        assert_eq!(Category::GoalReview.group(), EntityKind::Goal);
        assert_eq!(Category::TaskStart.group(), EntityKind::Task);
        assert_eq!(Category::GoalAchievement.channel(), "achievements");
    }

    #[test]
    fn test_event_reminder_fire_time_and_payload() {
        let starts = Utc.with_ymd_and_hms(2026, 5, 4, 14, 0, 0).unwrap();
        let req = NotificationRequest::event_reminder("e1", "Shoot intro", starts, 90, Priority::High);
        assert_eq!(req.timing, Timing::At(Utc.with_ymd_and_hms(2026, 5, 4, 12, 30, 0).unwrap()));
        assert_eq!(req.payload["time"], "1 hour");
        assert_eq!(req.notification_id(), "event_e1_90");
    }

    #[test]
    fn test_random_ids_are_unique_per_call() {
        let at = Utc.with_ymd_and_hms(2026, 5, 4, 14, 0, 0).unwrap();
        let req = NotificationRequest::task_due("t1", "Edit", at, Priority::Low);
        let a = req.notification_id();
        let b = req.notification_id();
        assert!(a.starts_with("task_t1_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_goal_overdue_uses_grace_when_past() {
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 14, 0, 0).unwrap();
        let past = now - Duration::days(2);
        let req = NotificationRequest::goal_overdue("g1", "Launch", past, now, Duration::minutes(5));
        assert_eq!(req.timing, Timing::At(now + Duration::minutes(5)));

        let future = now + Duration::days(1);
        let req = NotificationRequest::goal_overdue("g1", "Launch", future, now, Duration::minutes(5));
        assert_eq!(req.timing, Timing::At(future));
    }

    #[test]
    fn test_task_overdue_is_high_priority_and_deduped() {
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 14, 0, 0).unwrap();
        let due = now - Duration::hours(3);
        let req = NotificationRequest::task_overdue("t9", "Render", due, now, Duration::minutes(5));
        assert_eq!(req.category, Category::TaskOverdue);
        assert_eq!(req.priority, Priority::High);
        assert_eq!(req.timing, Timing::At(now + Duration::minutes(5)));
        assert_eq!(req.payload["title"], "Render");
        assert_eq!(req.notification_id(), "task_t9_overdue_once");
    }

    #[test]
    fn test_recurring_timing_from_json_is_range_checked() {
        let bad = r#"{"Recurring":{"kind":"weekly","weekday":9,"hour":25,"minute":99}}"#;
        assert!(serde_json::from_str::<Timing>(bad).is_err());
        let good = r#"{"Recurring":{"kind":"weekly","weekday":2,"hour":9,"minute":0}}"#;
        let timing: Timing = serde_json::from_str(good).unwrap();
        assert_eq!(timing, Timing::Recurring(RecurrencePattern::weekly(2, 9, 0).unwrap()));
    }

    #[test]
    fn test_invalid_weekly_review_is_rejected() {
        let err = NotificationRequest::goal_weekly_review("g1", "Launch", 7, 9, 0).unwrap_err();
        assert!(matches!(err, CadenceError::InvalidRecurrence(_)));
    }

    #[test]
    fn test_entity_kind_parse() {
        assert_eq!("Goal".parse::<EntityKind>().unwrap(), EntityKind::Goal);
        assert!("habit".parse::<EntityKind>().is_err());
        assert_eq!("URGENT".parse::<Priority>().unwrap(), Priority::Urgent);
        assert!("critical".parse::<Priority>().is_err());
    }
}
