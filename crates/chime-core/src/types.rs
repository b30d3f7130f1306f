use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{AlarmError, Result};
use crate::notification::NotificationConfig;

/// Stable alarm identity; doubles as the request handle given to the backend.
pub type AlarmId = i32;

/// Day of the week, numbered Sunday = 1 … Saturday = 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeekDay {
    Sunday = 1,
    Monday = 2,
    Tuesday = 3,
    Wednesday = 4,
    Thursday = 5,
    Friday = 6,
    Saturday = 7,
}

impl WeekDay {
    pub const ALL: [WeekDay; 7] = [
        WeekDay::Sunday,
        WeekDay::Monday,
        WeekDay::Tuesday,
        WeekDay::Wednesday,
        WeekDay::Thursday,
        WeekDay::Friday,
        WeekDay::Saturday,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            WeekDay::Sunday => "SUNDAY",
            WeekDay::Monday => "MONDAY",
            WeekDay::Tuesday => "TUESDAY",
            WeekDay::Wednesday => "WEDNESDAY",
            WeekDay::Thursday => "THURSDAY",
            WeekDay::Friday => "FRIDAY",
            WeekDay::Saturday => "SATURDAY",
        }
    }
}

impl From<Weekday> for WeekDay {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Sun => WeekDay::Sunday,
            Weekday::Mon => WeekDay::Monday,
            Weekday::Tue => WeekDay::Tuesday,
            Weekday::Wed => WeekDay::Wednesday,
            Weekday::Thu => WeekDay::Thursday,
            Weekday::Fri => WeekDay::Friday,
            Weekday::Sat => WeekDay::Saturday,
        }
    }
}

impl From<WeekDay> for Weekday {
    fn from(day: WeekDay) -> Self {
        match day {
            WeekDay::Sunday => Weekday::Sun,
            WeekDay::Monday => Weekday::Mon,
            WeekDay::Tuesday => Weekday::Tue,
            WeekDay::Wednesday => Weekday::Wed,
            WeekDay::Thursday => Weekday::Thu,
            WeekDay::Friday => Weekday::Fri,
            WeekDay::Saturday => Weekday::Sat,
        }
    }
}

impl fmt::Display for WeekDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for WeekDay {
    type Err = String;

    /// Accepts stored names (`"MONDAY"`) as well as short forms (`"mon"`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sunday" | "sun" => Ok(WeekDay::Sunday),
            "monday" | "mon" => Ok(WeekDay::Monday),
            "tuesday" | "tue" => Ok(WeekDay::Tuesday),
            "wednesday" | "wed" => Ok(WeekDay::Wednesday),
            "thursday" | "thu" => Ok(WeekDay::Thursday),
            "friday" | "fri" => Ok(WeekDay::Friday),
            "saturday" | "sat" => Ok(WeekDay::Saturday),
            other => Err(format!("unknown weekday: {other}")),
        }
    }
}

/// Recurrence days of an alarm. Empty means one-shot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekDaySet(BTreeSet<WeekDay>);

impl WeekDaySet {
    pub fn one_shot() -> Self {
        Self::default()
    }

    pub fn every_day() -> Self {
        WeekDay::ALL.into_iter().collect()
    }

    pub fn is_one_shot(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, day: WeekDay) -> bool {
        self.0.contains(&day)
    }

    pub fn insert(&mut self, day: WeekDay) -> bool {
        self.0.insert(day)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Days in Sunday-first order.
    pub fn iter(&self) -> impl Iterator<Item = WeekDay> + '_ {
        self.0.iter().copied()
    }

    /// Parse a comma separated list such as `"mon,wed,fri"`.
    pub fn parse_list(s: &str) -> std::result::Result<Self, String> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromIterator<WeekDay> for WeekDaySet {
    fn from_iter<I: IntoIterator<Item = WeekDay>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[WeekDay; N]> for WeekDaySet {
    fn from(days: [WeekDay; N]) -> Self {
        days.into_iter().collect()
    }
}

/// Target wall-clock time of an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millis: u16,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8, second: u8, millis: u16) -> Self {
        Self {
            hour,
            minute,
            second,
            millis,
        }
    }

    pub fn hm(hour: u8, minute: u8) -> Self {
        Self::new(hour, minute, 0, 0)
    }

    pub fn to_naive(self) -> Result<NaiveTime> {
        NaiveTime::from_hms_milli_opt(
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
            self.millis as u32,
        )
        .filter(|_| self.millis < 1000 && self.second < 60)
        .ok_or(AlarmError::InvalidTime {
            hour: self.hour,
            minute: self.minute,
            second: self.second,
            millis: self.millis,
        })
    }

    pub fn validate(self) -> Result<Self> {
        self.to_naive().map(|_| self)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}.{:03}",
            self.hour, self.minute, self.second, self.millis
        )
    }
}

/// The persisted unit of scheduling state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmDefinition {
    pub id: AlarmId,
    pub hour: u8,
    pub minute: u8,
    #[serde(default)]
    pub second: u8,
    #[serde(default)]
    pub millis: u16,
    pub weekdays: WeekDaySet,
    pub is_active: bool,
    /// Advisory cache of the last computed trigger (epoch millis).
    #[serde(default)]
    pub next_trigger_time: Option<i64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub notification_config: Option<NotificationConfig>,
}

impl AlarmDefinition {
    /// An active alarm with no metadata and no notification.
    pub fn new(id: AlarmId, time: TimeOfDay, weekdays: WeekDaySet) -> Self {
        Self {
            id,
            hour: time.hour,
            minute: time.minute,
            second: time.second,
            millis: time.millis,
            weekdays,
            is_active: true,
            next_trigger_time: None,
            metadata: BTreeMap::new(),
            notification_config: None,
        }
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay::new(self.hour, self.minute, self.second, self.millis)
    }

    pub fn set_time_of_day(&mut self, time: TimeOfDay) {
        self.hour = time.hour;
        self.minute = time.minute;
        self.second = time.second;
        self.millis = time.millis;
    }

    pub fn is_one_shot(&self) -> bool {
        self.weekdays.is_one_shot()
    }

    /// A notification is only presented when both channel and content exist.
    pub fn should_notify(&self) -> bool {
        self.notification_config
            .as_ref()
            .is_some_and(|c| c.channel.is_some() && c.notification.is_some())
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_notification(mut self, config: NotificationConfig) -> Self {
        self.notification_config = Some(config);
        self
    }
}
