//! Units and granularities
//!
//! A [`Unit`] is a signed duration multiplier; a [`Granularity`] is the
//! resolution a timestamp was recorded at. Both belong to a [`TimeSystem`]:
//! absolute calendar time or relative time measured from an arbitrary origin
//! (e.g. hours since admission). Values from different systems never compare.

use crate::calendar::{self, CalendarZone, MILLIS_PER_DAY, MILLIS_PER_HOUR, MILLIS_PER_MINUTE, MILLIS_PER_SECOND};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The time axis a unit or granularity measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSystem {
    /// Calendar time: milliseconds since the Unix epoch, read in a zone
    Absolute,
    /// Synthetic time: milliseconds since an arbitrary origin
    Relative,
}

/// Calendar-aware units of absolute time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsoluteUnit {
    /// One millisecond
    Millisecond,
    /// One second
    Second,
    /// One minute
    Minute,
    /// One elapsed hour
    Hour,
    /// One local calendar day (23, 24 or 25 hours)
    Day,
    /// One calendar month
    Month,
    /// One calendar year
    Year,
}

impl AbsoluteUnit {
    /// Length in milliseconds for units that never vary
    pub fn fixed_millis(&self) -> Option<i64> {
        match self {
            AbsoluteUnit::Millisecond => Some(1),
            AbsoluteUnit::Second => Some(MILLIS_PER_SECOND),
            AbsoluteUnit::Minute => Some(MILLIS_PER_MINUTE),
            AbsoluteUnit::Hour => Some(MILLIS_PER_HOUR),
            AbsoluteUnit::Day | AbsoluteUnit::Month | AbsoluteUnit::Year => None,
        }
    }

    /// Average length in milliseconds, used only to seed calendar stepping
    fn nominal_millis(&self) -> i64 {
        match self {
            AbsoluteUnit::Day => MILLIS_PER_DAY,
            // Mean Gregorian month and year
            AbsoluteUnit::Month => 2_629_746_000,
            AbsoluteUnit::Year => 31_556_952_000,
            fixed => fixed.fixed_millis().unwrap_or(1),
        }
    }

    fn add(&self, zone: CalendarZone, instant: i64, count: i64) -> Option<i64> {
        match self {
            AbsoluteUnit::Day => calendar::add_days(zone, instant, count),
            AbsoluteUnit::Month => calendar::add_months(zone, instant, count),
            AbsoluteUnit::Year => calendar::add_months(zone, instant, count.checked_mul(12)?),
            fixed => instant.checked_add(count.checked_mul(fixed.fixed_millis()?)?),
        }
    }

    fn units_between(&self, zone: CalendarZone, from: i64, to: i64) -> Option<i64> {
        if let Some(length) = self.fixed_millis() {
            return Some(to.checked_sub(from)? / length);
        }

        // Seed with the nominal length, then walk the calendar until
        // `from + n` is the last step not past `to`.
        let mut n = to.checked_sub(from)? / self.nominal_millis();
        if to >= from {
            while n > 0 && self.add(zone, from, n)? > to {
                n -= 1;
            }
            while self.add(zone, from, n + 1)? <= to {
                n += 1;
            }
        } else {
            while n < 0 && self.add(zone, from, n)? < to {
                n += 1;
            }
            while self.add(zone, from, n - 1)? >= to {
                n -= 1;
            }
        }
        Some(n)
    }

    fn earliest(&self, zone: CalendarZone, instant: i64) -> Option<i64> {
        match self {
            AbsoluteUnit::Millisecond => Some(instant),
            AbsoluteUnit::Day => calendar::start_of_day(zone, instant),
            AbsoluteUnit::Month => calendar::start_of_month(zone, instant),
            AbsoluteUnit::Year => calendar::start_of_year(zone, instant),
            fixed => calendar::floor_fixed(zone, instant, fixed.fixed_millis()?),
        }
    }

    fn latest(&self, zone: CalendarZone, instant: i64) -> Option<i64> {
        let next = match self {
            AbsoluteUnit::Millisecond => return Some(instant),
            AbsoluteUnit::Day => calendar::start_of_next_day(zone, instant)?,
            AbsoluteUnit::Month => calendar::start_of_next_month(zone, instant)?,
            AbsoluteUnit::Year => calendar::start_of_next_year(zone, instant)?,
            fixed => calendar::floor_fixed(zone, instant, fixed.fixed_millis()?)?
                .checked_add(fixed.fixed_millis()?)?,
        };
        next.checked_sub(1)
    }
}

/// Fixed-length units of relative time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeUnit {
    /// One millisecond
    Millisecond,
    /// One second
    Second,
    /// One minute
    Minute,
    /// One hour
    Hour,
    /// Twenty-four hours
    Day,
}

impl RelativeUnit {
    /// Length in milliseconds
    pub fn millis(&self) -> i64 {
        match self {
            RelativeUnit::Millisecond => 1,
            RelativeUnit::Second => MILLIS_PER_SECOND,
            RelativeUnit::Minute => MILLIS_PER_MINUTE,
            RelativeUnit::Hour => MILLIS_PER_HOUR,
            RelativeUnit::Day => MILLIS_PER_DAY,
        }
    }
}

/// A signed duration multiplier in one time system
///
/// # Examples
///
/// ```
/// use kairos_domain::{CalendarZone, Unit};
/// use kairos_domain::calendar::local_millis;
///
/// let jan_1 = local_millis(CalendarZone::Utc, 2007, 1, 1, 0, 0).unwrap();
/// let jan_31 = local_millis(CalendarZone::Utc, 2007, 1, 31, 0, 0).unwrap();
/// let mar_3 = local_millis(CalendarZone::Utc, 2007, 3, 3, 0, 0).unwrap();
///
/// // Thirty days is less than a month in January...
/// assert_eq!(Unit::MONTH.units_between(jan_1, jan_31, CalendarZone::Utc), Some(0));
/// // ...but more than one after crossing February
/// let feb_1 = local_millis(CalendarZone::Utc, 2007, 2, 1, 0, 0).unwrap();
/// assert_eq!(Unit::MONTH.units_between(feb_1, mar_3, CalendarZone::Utc), Some(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "system", content = "unit", rename_all = "snake_case")]
pub enum Unit {
    /// A unit of absolute calendar time
    Absolute(AbsoluteUnit),
    /// A unit of relative time
    Relative(RelativeUnit),
}

impl Unit {
    /// Absolute millisecond
    pub const MILLISECOND: Unit = Unit::Absolute(AbsoluteUnit::Millisecond);
    /// Absolute second
    pub const SECOND: Unit = Unit::Absolute(AbsoluteUnit::Second);
    /// Absolute minute
    pub const MINUTE: Unit = Unit::Absolute(AbsoluteUnit::Minute);
    /// Absolute hour
    pub const HOUR: Unit = Unit::Absolute(AbsoluteUnit::Hour);
    /// Local calendar day
    pub const DAY: Unit = Unit::Absolute(AbsoluteUnit::Day);
    /// Calendar month
    pub const MONTH: Unit = Unit::Absolute(AbsoluteUnit::Month);
    /// Calendar year
    pub const YEAR: Unit = Unit::Absolute(AbsoluteUnit::Year);
    /// Relative millisecond
    pub const RELATIVE_MILLISECOND: Unit = Unit::Relative(RelativeUnit::Millisecond);
    /// Relative minute
    pub const RELATIVE_MINUTE: Unit = Unit::Relative(RelativeUnit::Minute);
    /// Relative hour
    pub const RELATIVE_HOUR: Unit = Unit::Relative(RelativeUnit::Hour);
    /// Relative day
    pub const RELATIVE_DAY: Unit = Unit::Relative(RelativeUnit::Day);

    /// The time system this unit measures
    pub fn system(&self) -> TimeSystem {
        match self {
            Unit::Absolute(_) => TimeSystem::Absolute,
            Unit::Relative(_) => TimeSystem::Relative,
        }
    }

    /// Move an instant by `count` units (negative counts move backwards)
    ///
    /// Returns `None` on overflow or when the calendar cannot represent the
    /// result.
    pub fn add(&self, instant: i64, count: i64, zone: CalendarZone) -> Option<i64> {
        match self {
            Unit::Absolute(unit) => unit.add(zone, instant, count),
            Unit::Relative(unit) => instant.checked_add(count.checked_mul(unit.millis())?),
        }
    }

    /// Signed count of whole units elapsed from `from` to `to`
    ///
    /// The count is truncated toward zero: it is the largest `n` with
    /// `add(from, n) <= to` when `to` is later, and symmetrically when it is
    /// earlier.
    pub fn units_between(&self, from: i64, to: i64, zone: CalendarZone) -> Option<i64> {
        match self {
            Unit::Absolute(unit) => unit.units_between(zone, from, to),
            Unit::Relative(unit) => Some(to.checked_sub(from)? / unit.millis()),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Absolute(unit) => write!(f, "{:?}", unit),
            Unit::Relative(unit) => write!(f, "relative {:?}", unit),
        }
    }
}

/// The resolution a timestamp was recorded at
///
/// A timestamp recorded at day granularity could be any instant of that
/// local day; [`Granularity::earliest`] and [`Granularity::latest`] give the
/// bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Granularity(Unit);

impl Granularity {
    /// Millisecond precision
    pub const MILLISECOND: Granularity = Granularity(Unit::MILLISECOND);
    /// Second precision
    pub const SECOND: Granularity = Granularity(Unit::SECOND);
    /// Minute precision
    pub const MINUTE: Granularity = Granularity(Unit::MINUTE);
    /// Hour precision
    pub const HOUR: Granularity = Granularity(Unit::HOUR);
    /// Local day precision
    pub const DAY: Granularity = Granularity(Unit::DAY);
    /// Calendar month precision
    pub const MONTH: Granularity = Granularity(Unit::MONTH);
    /// Calendar year precision
    pub const YEAR: Granularity = Granularity(Unit::YEAR);
    /// Relative millisecond precision
    pub const RELATIVE_MILLISECOND: Granularity = Granularity(Unit::RELATIVE_MILLISECOND);
    /// Relative minute precision
    pub const RELATIVE_MINUTE: Granularity = Granularity(Unit::RELATIVE_MINUTE);
    /// Relative hour precision
    pub const RELATIVE_HOUR: Granularity = Granularity(Unit::RELATIVE_HOUR);
    /// Relative day precision
    pub const RELATIVE_DAY: Granularity = Granularity(Unit::RELATIVE_DAY);

    /// Granularity whose tick is one of the given unit
    pub fn of(unit: Unit) -> Self {
        Self(unit)
    }

    /// The unit matching this granularity's tick
    pub fn corresponding_unit(&self) -> Unit {
        self.0
    }

    /// The time system of this granularity
    pub fn system(&self) -> TimeSystem {
        self.0.system()
    }

    /// Earliest instant consistent with a timestamp recorded at this granularity
    pub fn earliest(&self, instant: i64, zone: CalendarZone) -> Option<i64> {
        match self.0 {
            Unit::Absolute(unit) => unit.earliest(zone, instant),
            Unit::Relative(unit) => instant.div_euclid(unit.millis()).checked_mul(unit.millis()),
        }
    }

    /// Latest instant consistent with a timestamp recorded at this granularity
    pub fn latest(&self, instant: i64, zone: CalendarZone) -> Option<i64> {
        match self.0 {
            Unit::Absolute(unit) => unit.latest(zone, instant),
            Unit::Relative(unit) => self
                .earliest(instant, zone)?
                .checked_add(unit.millis())?
                .checked_sub(1),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::local_millis;

    fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> i64 {
        local_millis(CalendarZone::Utc, year, month, day, hour, minute).unwrap()
    }

    fn eastern(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> i64 {
        local_millis(CalendarZone::US_EASTERN, year, month, day, hour, minute).unwrap()
    }

    #[test]
    fn test_fixed_units_truncate_toward_zero() {
        let a = utc(2007, 1, 1, 1, 0);
        let b = a + 90 * MILLIS_PER_MINUTE;
        assert_eq!(Unit::HOUR.units_between(a, b, CalendarZone::Utc), Some(1));
        assert_eq!(Unit::HOUR.units_between(b, a, CalendarZone::Utc), Some(-1));
        assert_eq!(Unit::MINUTE.units_between(a, b, CalendarZone::Utc), Some(90));
    }

    #[test]
    fn test_day_across_spring_forward() {
        let zone = CalendarZone::US_EASTERN;
        let sat = eastern(2007, 3, 10, 0, 0);
        let sun = eastern(2007, 3, 11, 0, 0);
        let mon = eastern(2007, 3, 12, 0, 0);

        assert_eq!(Unit::DAY.units_between(sun, mon, zone), Some(1));
        assert_eq!(Unit::HOUR.units_between(sun, mon, zone), Some(23));
        assert_eq!(Unit::DAY.units_between(sat, mon, zone), Some(2));
        assert_eq!(Unit::DAY.units_between(mon, sat, zone), Some(-2));
    }

    #[test]
    fn test_day_across_fall_back() {
        let zone = CalendarZone::US_EASTERN;
        let sun = eastern(2007, 11, 4, 0, 0);
        let mon = eastern(2007, 11, 5, 0, 0);
        assert_eq!(Unit::DAY.units_between(sun, mon, zone), Some(1));
        assert_eq!(Unit::HOUR.units_between(sun, mon, zone), Some(25));
        // 24 elapsed hours is not yet a whole local day on a 25-hour day
        assert_eq!(Unit::DAY.units_between(sun, sun + 24 * MILLIS_PER_HOUR, zone), Some(0));
    }

    #[test]
    fn test_month_depends_on_month_length() {
        let zone = CalendarZone::Utc;
        assert_eq!(Unit::MONTH.units_between(utc(2007, 1, 15, 0, 0), utc(2007, 2, 15, 0, 0), zone), Some(1));
        assert_eq!(Unit::MONTH.units_between(utc(2007, 1, 15, 0, 0), utc(2007, 2, 14, 0, 0), zone), Some(0));
        // 28 days is a month from February 1st but not from January 1st
        assert_eq!(Unit::MONTH.units_between(utc(2007, 2, 1, 0, 0), utc(2007, 3, 1, 0, 0), zone), Some(1));
        assert_eq!(Unit::MONTH.units_between(utc(2007, 1, 1, 0, 0), utc(2007, 1, 29, 0, 0), zone), Some(0));
        assert_eq!(Unit::MONTH.units_between(utc(2007, 3, 1, 0, 0), utc(2007, 1, 1, 0, 0), zone), Some(-2));
    }

    #[test]
    fn test_years() {
        let zone = CalendarZone::Utc;
        assert_eq!(Unit::YEAR.units_between(utc(2000, 2, 29, 0, 0), utc(2001, 2, 28, 0, 0), zone), Some(1));
        assert_eq!(Unit::YEAR.units_between(utc(1990, 6, 1, 0, 0), utc(2007, 5, 31, 0, 0), zone), Some(16));
    }

    #[test]
    fn test_relative_units() {
        let start = 0;
        let finish = 36 * MILLIS_PER_HOUR;
        assert_eq!(Unit::RELATIVE_DAY.units_between(start, finish, CalendarZone::Utc), Some(1));
        assert_eq!(Unit::RELATIVE_HOUR.add(start, -2, CalendarZone::Utc), Some(-2 * MILLIS_PER_HOUR));
    }

    #[test]
    fn test_day_granularity_bounds() {
        let zone = CalendarZone::US_EASTERN;
        let instant = eastern(2007, 3, 11, 23, 59);
        assert_eq!(Granularity::DAY.earliest(instant, zone), Some(eastern(2007, 3, 11, 0, 0)));
        assert_eq!(Granularity::DAY.latest(instant, zone), Some(eastern(2007, 3, 12, 0, 0) - 1));
    }

    #[test]
    fn test_minute_and_month_granularity_bounds() {
        let zone = CalendarZone::Utc;
        let instant = utc(2007, 2, 10, 8, 30) + 12_345;
        assert_eq!(Granularity::MINUTE.earliest(instant, zone), Some(utc(2007, 2, 10, 8, 30)));
        assert_eq!(Granularity::MINUTE.latest(instant, zone), Some(utc(2007, 2, 10, 8, 31) - 1));
        assert_eq!(Granularity::MONTH.earliest(instant, zone), Some(utc(2007, 2, 1, 0, 0)));
        assert_eq!(Granularity::MONTH.latest(instant, zone), Some(utc(2007, 3, 1, 0, 0) - 1));
    }

    #[test]
    fn test_relative_granularity_handles_negative_positions() {
        let g = Granularity::RELATIVE_HOUR;
        assert_eq!(g.earliest(-1, CalendarZone::Utc), Some(-MILLIS_PER_HOUR));
        assert_eq!(g.latest(-1, CalendarZone::Utc), Some(-1));
        assert_eq!(g.system(), TimeSystem::Relative);
    }
}
