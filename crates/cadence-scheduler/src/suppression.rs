//! Suppression policy: decides whether a reminder may be shown at all.
//!
//! Gates run in order and the first one that trips wins:
//! category toggles, then priority filters, then quiet hours.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::request::{Category, Priority};
use crate::settings::NotificationSettings;

/// Why a reminder was not scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    CategoryDisabled,
    PriorityFiltered,
    QuietHours,
}

impl std::fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuppressReason::CategoryDisabled => write!(f, "category disabled"),
            SuppressReason::PriorityFiltered => write!(f, "priority filtered"),
            SuppressReason::QuietHours => write!(f, "quiet hours"),
        }
    }
}

/// Evaluate all gates, returning the first that trips.
pub fn evaluate<Tz: TimeZone>(
    category: Category,
    priority: Priority,
    settings: &NotificationSettings,
    now: &DateTime<Tz>,
) -> Option<SuppressReason> {
    if !settings.category_enabled(category) {
        return Some(SuppressReason::CategoryDisabled);
    }
    if !priority_passes(priority, settings) {
        return Some(SuppressReason::PriorityFiltered);
    }
    if in_quiet_hours(priority, settings, now) {
        return Some(SuppressReason::QuietHours);
    }
    None
}

/// `true` when the reminder must not be scheduled.
pub fn should_suppress<Tz: TimeZone>(
    category: Category,
    priority: Priority,
    settings: &NotificationSettings,
    now: &DateTime<Tz>,
) -> bool {
    evaluate(category, priority, settings, now).is_some()
}

fn priority_passes(priority: Priority, settings: &NotificationSettings) -> bool {
    let filters = &settings.priority_filters;
    if filters.show_urgent_only {
        return priority == Priority::Urgent;
    }
    match priority {
        Priority::Low => filters.show_low,
        Priority::Medium => filters.show_medium,
        Priority::High => filters.show_high,
        Priority::Urgent => true,
    }
}

fn in_quiet_hours<Tz: TimeZone>(
    priority: Priority,
    settings: &NotificationSettings,
    now: &DateTime<Tz>,
) -> bool {
    let quiet = &settings.quiet_hours;
    if !quiet.enabled {
        return false;
    }
    if quiet.allow_urgent && priority == Priority::Urgent {
        return false;
    }
    let is_weekend = matches!(now.weekday(), Weekday::Sat | Weekday::Sun);
    if quiet.weekends_only && !is_weekend {
        return false;
    }
    let hhmm = format!("{:02}:{:02}", now.hour(), now.minute());
    quiet.contains(&hhmm)
}
