//! Recurrence patterns and next-fire computation.
//! Supports daily and weekly reminders at a fixed wall-clock time.
//!
//! All arithmetic is done in calendar units of the caller's time zone, so a
//! daily 09:00 reminder stays at 09:00 across DST changes.

use chrono::{
    DateTime, Datelike, Days, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike,
};
use serde::{Deserialize, Serialize};

use cadence_core::{CadenceError, Result};

/// A validated daily/weekly cadence. Construct with [`RecurrencePattern::daily`]
/// or [`RecurrencePattern::weekly`]; the fields are private so every value
/// in circulation has passed the range checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPattern", into = "RawPattern")]
pub struct RecurrencePattern {
    repeat: Repeat,
    time: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Repeat {
    Daily,
    /// 0 = Sunday .. 6 = Saturday.
    Weekly(u32),
}

impl RecurrencePattern {
    pub fn daily(hour: u32, minute: u32) -> Result<Self> {
        Ok(Self {
            repeat: Repeat::Daily,
            time: check_time(hour, minute)?,
        })
    }

    pub fn weekly(weekday: u32, hour: u32, minute: u32) -> Result<Self> {
        if weekday > 6 {
            return Err(CadenceError::recurrence(format!(
                "weekday {weekday} out of range (0=Sunday..6=Saturday)"
            )));
        }
        Ok(Self {
            repeat: Repeat::Weekly(weekday),
            time: check_time(hour, minute)?,
        })
    }

    pub fn hour(&self) -> u32 {
        self.time.hour()
    }

    pub fn minute(&self) -> u32 {
        self.time.minute()
    }

    /// `None` for daily patterns.
    pub fn weekday(&self) -> Option<u32> {
        match self.repeat {
            Repeat::Daily => None,
            Repeat::Weekly(weekday) => Some(weekday),
        }
    }
}

impl std::fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (hour, minute) = (self.hour(), self.minute());
        match self.repeat {
            Repeat::Daily => write!(f, "daily at {hour:02}:{minute:02}"),
            Repeat::Weekly(weekday) => write!(f, "weekly on day {weekday} at {hour:02}:{minute:02}"),
        }
    }
}

fn check_time(hour: u32, minute: u32) -> Result<NaiveTime> {
    if hour > 23 {
        return Err(CadenceError::recurrence(format!("hour {hour} out of range (0-23)")));
    }
    if minute > 59 {
        return Err(CadenceError::recurrence(format!("minute {minute} out of range (0-59)")));
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| CadenceError::recurrence(format!("invalid time {hour}:{minute}")))
}

/// Wire shape; deserialization is funnelled through the validating constructors.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum RawPattern {
    Daily { hour: u32, minute: u32 },
    Weekly { weekday: u32, hour: u32, minute: u32 },
}

impl TryFrom<RawPattern> for RecurrencePattern {
    type Error = CadenceError;

    fn try_from(raw: RawPattern) -> Result<Self> {
        match raw {
            RawPattern::Daily { hour, minute } => Self::daily(hour, minute),
            RawPattern::Weekly {
                weekday,
                hour,
                minute,
            } => Self::weekly(weekday, hour, minute),
        }
    }
}

impl From<RecurrencePattern> for RawPattern {
    fn from(pattern: RecurrencePattern) -> Self {
        let (hour, minute) = (pattern.hour(), pattern.minute());
        match pattern.repeat {
            Repeat::Daily => RawPattern::Daily { hour, minute },
            Repeat::Weekly(weekday) => RawPattern::Weekly {
                weekday,
                hour,
                minute,
            },
        }
    }
}

/// Compute the first instant strictly after `now` that matches `pattern`,
/// in `now`'s time zone.
pub fn next_fire_instant<Tz: TimeZone>(pattern: &RecurrencePattern, now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let time = pattern.time;

    let day_offset = match pattern.repeat {
        Repeat::Daily => {
            if resolve_local(&tz, today, time) <= *now {
                1
            } else {
                0
            }
        }
        Repeat::Weekly(weekday) => {
            let current = now.weekday().num_days_from_sunday();
            let delta = (weekday + 7 - current) % 7;
            if delta == 0 && resolve_local(&tz, today, time) <= *now {
                7
            } else {
                delta
            }
        }
    };

    let date = today
        .checked_add_days(Days::new(u64::from(day_offset)))
        .unwrap_or(today);
    resolve_local(&tz, date, time)
}

/// Map a wall-clock date/time to an instant. Ambiguous times (clocks going
/// back) take the earlier instant; times inside a gap (clocks going forward)
/// move to the first wall time that exists.
fn resolve_local<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Tz> {
    let mut naive = NaiveDateTime::new(date, time);
    // Real-world gaps are at most a few hours.
    for _ in 0..(24 * 60) {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => return dt,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => naive += Duration::minutes(1),
        }
    }
    tz.from_utc_datetime(&NaiveDateTime::new(date, time))
}
