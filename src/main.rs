//! # Cadence CLI
//!
//! Operator tool around the reminder engine: preview fire times, render
//! message templates, inspect settings and the notification registry.
//!
//! Usage:
//!   cadence next daily 18:00                 # Next daily occurrence
//!   cadence next weekly 1 09:00              # Next Monday 09:00
//!   cadence compose "Hi {{name}}" name=Ada   # Render a template
//!   cadence remind progress g1 "Grow channel" # Daily progress nudge at the configured time
//!   cadence settings show                    # Print live settings as JSON
//!   cadence registry list task t1            # Handles for one entity
//!   cadence registry cancel goal g1          # Cancel everything for one entity
//!   cadence backend list                     # What the backend has armed

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cadence_core::CadenceConfig;
use cadence_scheduler::{
    ArmedNotification, Clock, EntityKind, NotificationRequest, Priority, RecurrencePattern,
    ScheduleOutcome, SchedulingEngine, SystemClock, compose, next_fire_instant,
};

#[derive(Parser)]
#[command(name = "cadence", version, about = "⏰ Cadence — reminders for events, goals and tasks")]
struct Cli {
    /// Config file (default: ~/.cadence/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show when a recurring reminder fires next
    Next {
        #[command(subcommand)]
        pattern: NextPattern,
    },
    /// Render a `{{key}}` template
    Compose {
        template: String,
        /// Payload entries as key=value
        fields: Vec<String>,
    },
    /// Schedule a planning-app reminder through the configured backend
    Remind {
        #[command(subcommand)]
        reminder: Reminder,
    },
    /// Notification settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Notification registry
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },
    /// Notification backend
    Backend {
        #[command(subcommand)]
        action: BackendAction,
    },
}

#[derive(Subcommand)]
enum NextPattern {
    Daily {
        /// HH:MM
        time: String,
    },
    Weekly {
        /// 0 = Sunday … 6 = Saturday, or a day name
        weekday: String,
        /// HH:MM
        time: String,
    },
}

#[derive(Subcommand)]
enum Reminder {
    /// Reminder ahead of an event start (RFC 3339)
    Event {
        id: String,
        title: String,
        starts_at: String,
        /// Lead time; defaults to eventReminders.defaultMinutesBefore
        #[arg(long)]
        minutes: Option<u32>,
        #[arg(long, default_value = "medium")]
        priority: Priority,
    },
    /// Daily goal progress nudge at reminders.daily_progress_*
    Progress { id: String, title: String },
    /// Weekly goal review at reminders.weekly_review_*
    Review { id: String, title: String },
    /// Goal overdue alert at its end date (RFC 3339)
    Overdue { id: String, title: String, due_at: String },
    /// Task due alert (RFC 3339)
    TaskDue {
        id: String,
        title: String,
        due_at: String,
        #[arg(long, default_value = "medium")]
        priority: Priority,
    },
    /// Task overdue alert at its due date (RFC 3339)
    TaskOverdue { id: String, title: String, due_at: String },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the live settings as JSON
    Show,
    /// Write default settings if none are saved yet
    Init,
}

#[derive(Subcommand)]
enum RegistryAction {
    /// List outstanding handles, for one entity or all
    List { kind: Option<EntityKind>, id: Option<String> },
    /// Cancel every notification of one entity
    Cancel { kind: EntityKind, id: String },
}

#[derive(Subcommand)]
enum BackendAction {
    /// List notifications the backend has armed
    List {
        /// Print JSON instead of one line per notification
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "cadence=debug,cadence_scheduler=debug,cadence_core=debug"
    } else {
        "cadence=info,cadence_scheduler=info,cadence_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => CadenceConfig::load_from(path)?,
        None => CadenceConfig::load()?,
    };

    match cli.command {
        Command::Next { pattern } => {
            let pattern = match pattern {
                NextPattern::Daily { time } => {
                    let (hour, minute) = parse_hhmm(&time)?;
                    RecurrencePattern::daily(hour, minute)?
                }
                NextPattern::Weekly { weekday, time } => {
                    let (hour, minute) = parse_hhmm(&time)?;
                    RecurrencePattern::weekly(parse_weekday(&weekday)?, hour, minute)?
                }
            };
            let now = SystemClock.now();
            let next = next_fire_instant(&pattern, &now);
            println!("{pattern}: {}", next.format("%A %Y-%m-%d %H:%M %Z"));
        }
        Command::Compose { template, fields } => {
            let payload = parse_fields(&fields)?;
            println!("{}", compose::compose(&template, &payload));
        }
        Command::Remind { reminder } => {
            let engine = SchedulingEngine::open(&config).await?;
            let defaults = &config.reminders;
            let request = match reminder {
                Reminder::Event {
                    id,
                    title,
                    starts_at,
                    minutes,
                    priority,
                } => NotificationRequest::event_reminder(
                    &id,
                    &title,
                    parse_instant(&starts_at)?,
                    minutes.unwrap_or_else(|| engine.event_lead_minutes()),
                    priority,
                ),
                Reminder::Progress { id, title } => NotificationRequest::goal_daily_progress(
                    &id,
                    &title,
                    defaults.daily_progress_hour,
                    defaults.daily_progress_minute,
                )?,
                Reminder::Review { id, title } => NotificationRequest::goal_weekly_review(
                    &id,
                    &title,
                    defaults.weekly_review_weekday,
                    defaults.weekly_review_hour,
                    defaults.weekly_review_minute,
                )?,
                Reminder::Overdue { id, title, due_at } => NotificationRequest::goal_overdue(
                    &id,
                    &title,
                    parse_instant(&due_at)?,
                    Utc::now(),
                    Duration::minutes(i64::from(defaults.overdue_grace_minutes)),
                ),
                Reminder::TaskDue {
                    id,
                    title,
                    due_at,
                    priority,
                } => NotificationRequest::task_due(&id, &title, parse_instant(&due_at)?, priority),
                Reminder::TaskOverdue { id, title, due_at } => NotificationRequest::task_overdue(
                    &id,
                    &title,
                    parse_instant(&due_at)?,
                    Utc::now(),
                    Duration::minutes(i64::from(defaults.overdue_grace_minutes)),
                ),
            };
            match engine.schedule(request).await? {
                ScheduleOutcome::Scheduled(handle) => println!("📅 Scheduled {handle}"),
                ScheduleOutcome::Suppressed(reason) => println!("🔕 Suppressed: {reason}"),
                ScheduleOutcome::PastDue => println!("⏭️ Fire time already passed, nothing scheduled"),
                ScheduleOutcome::BackendUnavailable(msg) => println!("⚠️ Backend unavailable: {msg}"),
            }
        }
        Command::Settings { action } => {
            let engine = SchedulingEngine::open(&config).await?;
            match action {
                SettingsAction::Show => {
                    let settings = engine.settings().current();
                    println!("{}", serde_json::to_string_pretty(settings.as_ref())?);
                }
                SettingsAction::Init => {
                    let settings = engine.settings().current();
                    engine.settings().replace(settings.as_ref().clone()).await?;
                    println!("✅ Settings written to {}", config.data_path().display());
                }
            }
        }
        Command::Registry { action } => {
            let engine = SchedulingEngine::open(&config).await?;
            match action {
                RegistryAction::List { kind, id } => match (kind, id) {
                    (Some(kind), Some(id)) => {
                        for handle in engine.list_handles(kind, &id).await {
                            println!("{handle}");
                        }
                    }
                    (None, None) => {
                        for (key, handles) in engine.registry().snapshot().await {
                            let handles: Vec<&str> = handles.iter().map(|h| h.as_str()).collect();
                            println!("{key}  {}", handles.join(", "));
                        }
                    }
                    _ => bail!("give both KIND and ID, or neither"),
                },
                RegistryAction::Cancel { kind, id } => {
                    let report = engine.cancel_all_for_entity(kind, &id).await?;
                    println!("🗑️ Cancelled {} notifications for {kind}:{id}", report.cancelled.len());
                    for (handle, reason) in &report.failures {
                        println!("⚠️ {handle}: {reason}");
                    }
                }
            }
        }
        Command::Backend { action } => {
            let engine = SchedulingEngine::open(&config).await?;
            match action {
                BackendAction::List { json } => {
                    let armed = engine.backend().list_scheduled().await?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&armed)?);
                    } else if armed.is_empty() {
                        println!("No notifications armed on the {} backend", engine.backend().name());
                    } else {
                        for notification in &armed {
                            println!("{}", describe_armed(notification));
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

fn describe_armed(armed: &ArmedNotification) -> String {
    let dispatch = &armed.dispatch;
    let cadence = match &armed.recurrence {
        Some(pattern) => format!(" ({pattern})"),
        None => String::new(),
    };
    format!(
        "{}  [{}] {}  {}{cadence}",
        armed.handle,
        dispatch.channel,
        dispatch.fire_at.to_rfc3339(),
        dispatch.body
    )
}

fn parse_hhmm(raw: &str) -> Result<(u32, u32)> {
    let (hour, minute) = raw
        .split_once(':')
        .with_context(|| format!("expected HH:MM, got '{raw}'"))?;
    let hour = hour.parse().with_context(|| format!("bad hour in '{raw}'"))?;
    let minute = minute.parse().with_context(|| format!("bad minute in '{raw}'"))?;
    Ok((hour, minute))
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("expected an RFC 3339 timestamp, got '{raw}'"))?;
    Ok(parsed.with_timezone(&Utc))
}

fn parse_weekday(raw: &str) -> Result<u32> {
    if let Ok(n) = raw.parse::<u32>() {
        return Ok(n);
    }
    const NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];
    let lower = raw.to_ascii_lowercase();
    NAMES
        .iter()
        .position(|name| lower.starts_with(name))
        .map(|i| i as u32)
        .with_context(|| format!("unknown weekday '{raw}'"))
}

fn parse_fields(fields: &[String]) -> Result<BTreeMap<String, String>> {
    fields
        .iter()
        .map(|field| {
            field
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .with_context(|| format!("expected key=value, got '{field}'"))
        })
        .collect()
}
