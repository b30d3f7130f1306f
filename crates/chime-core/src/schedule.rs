//! Next-trigger computation for one-shot and weekly repeating alarms.

use std::sync::Arc;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    Offset, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::clock::{Clock, SystemClock};
use crate::error::{AlarmError, Result};
use crate::types::{TimeOfDay, WeekDaySet};

/// Computes the next epoch-millisecond trigger for an alarm.
pub trait AlarmTimeCalculator: Send + Sync {
    fn next_trigger_millis(&self, time: TimeOfDay, weekdays: &WeekDaySet) -> Result<i64>;
}

/// Zone in which the alarm's wall-clock time is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Zone {
    /// The system zone, resolved at computation time.
    #[default]
    Local,
    Named(Tz),
    Fixed(FixedOffset),
}

impl Zone {
    /// `None` or an empty string selects the system zone.
    pub fn from_name(name: Option<&str>) -> Result<Self> {
        match name.map(str::trim) {
            None | Some("") => Ok(Zone::Local),
            Some(name) => name
                .parse::<Tz>()
                .map(Zone::Named)
                .map_err(|e| AlarmError::Config(format!("unknown timezone {name:?}: {e}"))),
        }
    }
}

/// Calculator used unless the embedding app supplies its own.
#[derive(Clone)]
pub struct DefaultAlarmTimeCalculator {
    zone: Zone,
    clock: Arc<dyn Clock>,
}

impl DefaultAlarmTimeCalculator {
    pub fn new(zone: Zone, clock: Arc<dyn Clock>) -> Self {
        Self { zone, clock }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }
}

impl Default for DefaultAlarmTimeCalculator {
    fn default() -> Self {
        Self::new(Zone::Local, Arc::new(SystemClock))
    }
}

impl AlarmTimeCalculator for DefaultAlarmTimeCalculator {
    fn next_trigger_millis(&self, time: TimeOfDay, weekdays: &WeekDaySet) -> Result<i64> {
        let now = self.clock.now();
        let next = match self.zone {
            Zone::Local => compute_next_trigger(&chrono::Local, now, time, weekdays)?,
            Zone::Named(tz) => compute_next_trigger(&tz, now, time, weekdays)?,
            Zone::Fixed(offset) => compute_next_trigger(&offset, now, time, weekdays)?,
        };
        Ok(next.timestamp_millis())
    }
}

/// First instant strictly after `now` matching `time` (and `weekdays`, if any).
///
/// One-shot: today at `time` if still ahead, otherwise tomorrow.
/// Repeating: scan today plus the next six days for an allowed day whose slot
/// is still ahead; failing that, keep walking from day seven until an allowed
/// day comes up. The walk never restarts from today.
pub fn compute_next_trigger<Z: TimeZone>(
    zone: &Z,
    now: DateTime<Utc>,
    time: TimeOfDay,
    weekdays: &WeekDaySet,
) -> Result<DateTime<Utc>> {
    let target = time.to_naive()?;
    let today = now.with_timezone(zone).date_naive();

    let date = if weekdays.is_one_shot() {
        next_date_one_shot(zone, today, target, now)
    } else {
        next_date_repeating(zone, today, target, now, weekdays)
    };

    Ok(resolve_local(zone, date.and_time(target)))
}

fn next_date_one_shot<Z: TimeZone>(
    zone: &Z,
    today: NaiveDate,
    target: NaiveTime,
    now: DateTime<Utc>,
) -> NaiveDate {
    if resolve_local(zone, today.and_time(target)) > now {
        today
    } else {
        today + Duration::days(1)
    }
}

fn next_date_repeating<Z: TimeZone>(
    zone: &Z,
    today: NaiveDate,
    target: NaiveTime,
    now: DateTime<Utc>,
    weekdays: &WeekDaySet,
) -> NaiveDate {
    let mut date = today;
    for _ in 0..7 {
        if weekdays.contains(date.weekday().into())
            && resolve_local(zone, date.and_time(target)) > now
        {
            return date;
        }
        date += Duration::days(1);
    }

    // `date` is now today + 7; carry on from there.
    while !weekdays.contains(date.weekday().into()) {
        date += Duration::days(1);
    }
    date
}

/// Map a wall-clock time in `zone` to an instant.
///
/// Ambiguous times (clocks going back) take the earlier instant. Times inside
/// a gap (clocks going forward) are shifted later by the length of the gap.
pub fn resolve_local<Z: TimeZone>(zone: &Z, local: NaiveDateTime) -> DateTime<Utc> {
    match zone.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            // interpret with the offset in force before the transition
            let before = zone
                .offset_from_utc_datetime(&(local - Duration::days(1)))
                .fix()
                .local_minus_utc();
            (local - Duration::seconds(before as i64)).and_utc()
        }
    }
}
