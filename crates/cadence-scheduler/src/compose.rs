//! Message composition: `{{key}}` templates rendered against a request payload.

use std::collections::BTreeMap;

use crate::request::Category;
use crate::settings::NotificationSettings;

/// Replace every `{{key}}` whose key is in `payload`.
///
/// Placeholders without a payload entry stay as they are, and substituted
/// values are never scanned again.
pub fn compose(template: &str, payload: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let key = &after_open[..end];
                // An unclosed `{{` is plain text; rescan from the inner one.
                if let Some(inner) = key.find("{{") {
                    out.push_str("{{");
                    out.push_str(&after_open[..inner]);
                    rest = &after_open[inner..];
                    continue;
                }
                match payload.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after_open[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Human "time until" text for an event reminder lead time.
pub fn time_until_text(minutes: u32) -> String {
    let (n, unit) = if minutes < 60 {
        (minutes, "minute")
    } else if minutes < 1440 {
        (minutes / 60, "hour")
    } else {
        (minutes / 1440, "day")
    };
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// Title shown for a category.
pub fn default_title(category: Category) -> &'static str {
    match category {
        Category::EventReminder => "📅 Upcoming event",
        Category::GoalProgress => "🎯 Daily progress",
        Category::GoalReview => "📅 Weekly review",
        Category::GoalOverdue => "⚠️ Goal overdue",
        Category::GoalAchievement => "🎉 Goal reached!",
        Category::TaskDue => "📋 Task due",
        Category::TaskStart => "▶️ Task to start",
        Category::TaskOverdue => "🔴 Task overdue",
    }
}

/// Body template used when custom messages are off or not configured.
pub fn default_template(category: Category) -> &'static str {
    match category {
        Category::EventReminder => "Reminder: {{title}} in {{time}}",
        Category::GoalProgress => "Don't forget to update: {{title}}",
        Category::GoalReview => "Take stock of: {{title}}",
        Category::GoalOverdue => "Goal \"{{title}}\" needs your attention",
        Category::GoalAchievement => "Congratulations! You reached: {{title}}",
        Category::TaskDue => "Task \"{{title}}\" is due today",
        Category::TaskStart => "Time to start: {{title}}",
        Category::TaskOverdue => "Task \"{{title}}\" is overdue",
    }
}

/// Rendered title and body for one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub title: String,
    pub body: String,
}

/// Render the message for `category`, preferring the user's custom template.
pub fn render(
    category: Category,
    payload: &BTreeMap<String, String>,
    settings: &NotificationSettings,
) -> Message {
    let template = settings
        .custom_messages
        .template_for(category)
        .unwrap_or_else(|| default_template(category));
    Message {
        title: default_title(category).to_string(),
        body: compose(template, payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_simple_substitution() {
        assert_eq!(compose("Hi {{name}}", &payload(&[("name", "Ada")])), "Hi Ada");
    }

    #[test]
    fn test_missing_key_left_intact() {
        assert_eq!(compose("Hi {{name}}", &BTreeMap::new()), "Hi {{name}}");
    }

    #[test]
    fn test_every_occurrence_replaced() {
        let out = compose("{{a}}-{{b}}-{{a}}", &payload(&[("a", "1"), ("b", "2")]));
        assert_eq!(out, "1-2-1");
    }

    #[test]
    fn test_no_recursive_substitution() {
        let out = compose("{{a}} {{b}}", &payload(&[("a", "{{b}}"), ("b", "x")]));
        assert_eq!(out, "{{b}} x");
    }

    #[test]
    fn test_unclosed_placeholder_kept() {
        assert_eq!(compose("Hi {{name", &payload(&[("name", "Ada")])), "Hi {{name");
    }

    #[test]
    fn test_stray_open_braces_do_not_swallow_next_placeholder() {
        let data = payload(&[("name", "Ada")]);
        assert_eq!(compose("Hi {{ oops {{name}}", &data), "Hi {{ oops Ada");
        assert_eq!(compose("{{{{name}}", &data), "{{Ada");
        assert_eq!(compose("{{a {{b {{name}} {{c", &data), "{{a {{b Ada {{c");
    }

    #[test]
    fn test_time_until_text() {
        assert_eq!(time_until_text(1), "1 minute");
        assert_eq!(time_until_text(15), "15 minutes");
        assert_eq!(time_until_text(60), "1 hour");
        assert_eq!(time_until_text(150), "2 hours");
        assert_eq!(time_until_text(1440), "1 day");
        assert_eq!(time_until_text(4000), "2 days");
    }

    #[test]
    fn test_render_prefers_custom_template() {
        let mut settings = NotificationSettings::default();
        let data = payload(&[("title", "Vlog #12"), ("time", "15 minutes")]);

        let msg = render(Category::EventReminder, &data, &settings);
        assert_eq!(msg.body, "Reminder: Vlog #12 in 15 minutes");

        settings
            .custom_messages
            .templates
            .insert(Category::EventReminder, "{{title}} starts in {{time}}!".into());
        // Templates are ignored until custom messages are switched on.
        assert_eq!(render(Category::EventReminder, &data, &settings).body, "Reminder: Vlog #12 in 15 minutes");

        settings.custom_messages.enabled = true;
        let msg = render(Category::EventReminder, &data, &settings);
        assert_eq!(msg.body, "Vlog #12 starts in 15 minutes!");
        assert_eq!(msg.title, default_title(Category::EventReminder));

        // Categories without a template fall back to the default.
        let msg = render(Category::TaskDue, &data, &settings);
        assert_eq!(msg.body, "Task \"Vlog #12\" is due today");
    }
}
