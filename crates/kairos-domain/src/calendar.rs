//! Calendar arithmetic for absolute time
//!
//! Absolute instants are milliseconds since the Unix epoch. Day, month and year
//! arithmetic happens on local wall-clock time in a [`CalendarZone`], so "one
//! day" across a daylight-saving transition is 23 or 25 hours and "one month"
//! depends on the month being crossed. Zone rules are explicit here rather than
//! read from the host.

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};

/// Milliseconds in one second
pub const MILLIS_PER_SECOND: i64 = 1_000;
/// Milliseconds in one minute
pub const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
/// Milliseconds in one hour
pub const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
/// Milliseconds in one nominal (24 hour) day
pub const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

/// Rules for turning absolute instants into local calendar time
///
/// # Examples
///
/// ```
/// use kairos_domain::calendar::{self, CalendarZone};
///
/// let zone = CalendarZone::US_EASTERN;
/// let midnight = calendar::local_millis(zone, 2007, 3, 11, 0, 0).unwrap();
/// let next = calendar::local_millis(zone, 2007, 3, 12, 0, 0).unwrap();
///
/// // Spring forward: the local day is only 23 hours long
/// assert_eq!(next - midnight, 23 * calendar::MILLIS_PER_HOUR);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalendarZone {
    /// Coordinated universal time
    #[default]
    Utc,

    /// A constant offset from UTC
    Fixed {
        /// Minutes east of UTC
        offset_minutes: i32,
    },

    /// United States daylight-saving schedule on top of a standard offset
    UsDaylight {
        /// Standard-time minutes east of UTC (e.g. -300 for Eastern)
        standard_offset_minutes: i32,
    },
}

impl CalendarZone {
    /// US Eastern time (EST/EDT)
    pub const US_EASTERN: CalendarZone = CalendarZone::UsDaylight { standard_offset_minutes: -300 };
    /// US Central time (CST/CDT)
    pub const US_CENTRAL: CalendarZone = CalendarZone::UsDaylight { standard_offset_minutes: -360 };
    /// US Mountain time (MST/MDT)
    pub const US_MOUNTAIN: CalendarZone = CalendarZone::UsDaylight { standard_offset_minutes: -420 };
    /// US Pacific time (PST/PDT)
    pub const US_PACIFIC: CalendarZone = CalendarZone::UsDaylight { standard_offset_minutes: -480 };

    /// Offset from UTC in effect at an instant, in milliseconds
    pub fn offset_millis(&self, instant: i64) -> i64 {
        match *self {
            CalendarZone::Utc => 0,
            CalendarZone::Fixed { offset_minutes } => i64::from(offset_minutes) * MILLIS_PER_MINUTE,
            CalendarZone::UsDaylight { standard_offset_minutes } => {
                let standard = i64::from(standard_offset_minutes) * MILLIS_PER_MINUTE;
                if self.is_daylight_time(instant) {
                    standard + MILLIS_PER_HOUR
                } else {
                    standard
                }
            }
        }
    }

    /// Whether daylight-saving time is in effect at an instant
    pub fn is_daylight_time(&self, instant: i64) -> bool {
        let CalendarZone::UsDaylight { standard_offset_minutes } = *self else {
            return false;
        };
        let standard = i64::from(standard_offset_minutes) * MILLIS_PER_MINUTE;
        let Some(local_standard) = instant.checked_add(standard).and_then(naive_from_millis) else {
            return false;
        };
        let Some((start, end)) = daylight_window(local_standard.year()) else {
            return false;
        };

        // Transitions happen at 02:00 wall-clock time: 02:00 standard time in
        // spring, 02:00 daylight time (01:00 standard) in autumn.
        let (Some(begins), Some(ends)) = (start.and_hms_opt(2, 0, 0), end.and_hms_opt(1, 0, 0)) else {
            return false;
        };
        local_standard >= begins && local_standard < ends
    }

    /// Local wall-clock time of an instant
    pub fn to_local(&self, instant: i64) -> Option<NaiveDateTime> {
        naive_from_millis(instant.checked_add(self.offset_millis(instant))?)
    }

    /// Instant of a local wall-clock time
    ///
    /// Times skipped by a spring-forward transition resolve forward by the
    /// length of the gap; times repeated by a fall-back transition resolve to
    /// the earlier (daylight) instant.
    pub fn from_local(&self, local: NaiveDateTime) -> Option<i64> {
        let wall = millis_from_naive(local);
        match *self {
            CalendarZone::Utc => Some(wall),
            CalendarZone::Fixed { offset_minutes } => {
                wall.checked_sub(i64::from(offset_minutes) * MILLIS_PER_MINUTE)
            }
            CalendarZone::UsDaylight { standard_offset_minutes } => {
                let standard_guess = wall.checked_sub(i64::from(standard_offset_minutes) * MILLIS_PER_MINUTE)?;
                let daylight_guess = standard_guess.checked_sub(MILLIS_PER_HOUR)?;
                if self.is_daylight_time(daylight_guess) {
                    Some(daylight_guess)
                } else {
                    Some(standard_guess)
                }
            }
        }
    }
}

/// Convenience constructor for an instant from local calendar fields
pub fn local_millis(zone: CalendarZone, year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<i64> {
    let local = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    zone.from_local(local)
}

/// Add whole local days, keeping the wall-clock time
pub fn add_days(zone: CalendarZone, instant: i64, days: i64) -> Option<i64> {
    let local = zone.to_local(instant)?;
    let shifted = if days >= 0 {
        local.checked_add_days(Days::new(days.unsigned_abs()))?
    } else {
        local.checked_sub_days(Days::new(days.unsigned_abs()))?
    };
    zone.from_local(shifted)
}

/// Add whole calendar months, clamping to the end of shorter months
pub fn add_months(zone: CalendarZone, instant: i64, months: i64) -> Option<i64> {
    let local = zone.to_local(instant)?;
    let count = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    let shifted = if months >= 0 {
        local.checked_add_months(count)?
    } else {
        local.checked_sub_months(count)?
    };
    zone.from_local(shifted)
}

/// Start of the local day containing an instant
pub fn start_of_day(zone: CalendarZone, instant: i64) -> Option<i64> {
    let date = zone.to_local(instant)?.date();
    zone.from_local(date.and_hms_opt(0, 0, 0)?)
}

/// Start of the local day following the one containing an instant
pub fn start_of_next_day(zone: CalendarZone, instant: i64) -> Option<i64> {
    let date = zone.to_local(instant)?.date().succ_opt()?;
    zone.from_local(date.and_hms_opt(0, 0, 0)?)
}

/// Start of the local month containing an instant
pub fn start_of_month(zone: CalendarZone, instant: i64) -> Option<i64> {
    let local = zone.to_local(instant)?;
    let first = NaiveDate::from_ymd_opt(local.year(), local.month(), 1)?;
    zone.from_local(first.and_hms_opt(0, 0, 0)?)
}

/// Start of the local month following the one containing an instant
pub fn start_of_next_month(zone: CalendarZone, instant: i64) -> Option<i64> {
    let local = zone.to_local(instant)?;
    let first = NaiveDate::from_ymd_opt(local.year(), local.month(), 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    zone.from_local(next.and_hms_opt(0, 0, 0)?)
}

/// Start of the local year containing an instant
pub fn start_of_year(zone: CalendarZone, instant: i64) -> Option<i64> {
    let year = zone.to_local(instant)?.year();
    zone.from_local(NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?)
}

/// Start of the local year following the one containing an instant
pub fn start_of_next_year(zone: CalendarZone, instant: i64) -> Option<i64> {
    let year = zone.to_local(instant)?.year().checked_add(1)?;
    zone.from_local(NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?)
}

/// Floor an instant to a fixed-length tick of local time
///
/// Used for second, minute and hour ticks. The offset in effect at the
/// instant is kept, so an hour tick never straddles a transition.
pub fn floor_fixed(zone: CalendarZone, instant: i64, tick_millis: i64) -> Option<i64> {
    let offset = zone.offset_millis(instant);
    let local = instant.checked_add(offset)?;
    local.div_euclid(tick_millis).checked_mul(tick_millis)?.checked_sub(offset)
}

/// Daylight-saving start and end dates for a year, if the schedule applies
fn daylight_window(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    match year {
        y if y >= 2007 => Some((
            NaiveDate::from_weekday_of_month_opt(year, 3, Weekday::Sun, 2)?,
            NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Sun, 1)?,
        )),
        1987..=2006 => Some((
            NaiveDate::from_weekday_of_month_opt(year, 4, Weekday::Sun, 1)?,
            last_sunday(year, 10)?,
        )),
        1967..=1986 => Some((last_sunday(year, 4)?, last_sunday(year, 10)?)),
        _ => None,
    }
}

fn last_sunday(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = NaiveDate::from_ymd_opt(year, month, 1)?.checked_add_months(Months::new(1))?;
    let last = first_of_next.pred_opt()?;
    last.checked_sub_days(Days::new(u64::from(last.weekday().num_days_from_sunday())))
}

fn epoch() -> NaiveDateTime {
    NaiveDateTime::UNIX_EPOCH
}

fn naive_from_millis(millis: i64) -> Option<NaiveDateTime> {
    epoch().checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

fn millis_from_naive(naive: NaiveDateTime) -> i64 {
    naive.signed_duration_since(epoch()).num_milliseconds()
}
