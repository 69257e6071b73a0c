//! Intervals with bounded uncertainty on start and finish

use crate::calendar::CalendarZone;
use crate::granularity::{Granularity, Unit};
use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One end of an interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The start of an interval
    Start,
    /// The finish of an interval
    Finish,
}

/// Earliest and latest possible instant of one end of an interval
///
/// `None` means unbounded in that direction.
pub type Bounds = (Option<i64>, Option<i64>);

/// An immutable time span with independent uncertainty on start and finish
///
/// Invariants (checked whenever both values are present):
/// `minimum_start <= maximum_start <= maximum_finish`,
/// `minimum_start <= minimum_finish <= maximum_finish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    minimum_start: Option<i64>,
    maximum_start: Option<i64>,
    minimum_finish: Option<i64>,
    maximum_finish: Option<i64>,
    granularity: Granularity,
    zone: CalendarZone,
}

impl Interval {
    /// Point interval for a timestamp recorded at a granularity
    ///
    /// # Examples
    ///
    /// ```
    /// use kairos_domain::{CalendarZone, Granularity, Interval};
    /// use kairos_domain::calendar::local_millis;
    ///
    /// let noon = local_millis(CalendarZone::Utc, 2007, 1, 1, 12, 0).unwrap();
    /// let interval = Interval::at(noon, Granularity::DAY, CalendarZone::Utc).unwrap();
    ///
    /// assert_eq!(interval.minimum_start(), local_millis(CalendarZone::Utc, 2007, 1, 1, 0, 0));
    /// assert_eq!(interval.maximum_finish(), local_millis(CalendarZone::Utc, 2007, 1, 2, 0, 0).map(|t| t - 1));
    /// assert!(interval.is_point());
    /// ```
    pub fn at(timestamp: i64, granularity: Granularity, zone: CalendarZone) -> Result<Self, DomainError> {
        let (earliest, latest) = resolve(timestamp, granularity, zone)?;
        Self::from_bounds(
            Some(earliest),
            Some(latest),
            Some(earliest),
            Some(latest),
            granularity,
            zone,
        )
    }

    /// Interval between two timestamps recorded at a granularity
    pub fn between(
        start: i64,
        finish: i64,
        granularity: Granularity,
        zone: CalendarZone,
    ) -> Result<Self, DomainError> {
        if finish < start {
            return Err(DomainError::InvalidInterval(format!(
                "finish {} precedes start {}",
                finish, start
            )));
        }
        let (min_start, max_start) = resolve(start, granularity, zone)?;
        let (min_finish, max_finish) = resolve(finish, granularity, zone)?;
        Self::from_bounds(
            Some(min_start),
            Some(max_start),
            Some(min_finish),
            Some(max_finish),
            granularity,
            zone,
        )
    }

    /// Interval from explicit bounds, validated against the invariants
    pub fn from_bounds(
        minimum_start: Option<i64>,
        maximum_start: Option<i64>,
        minimum_finish: Option<i64>,
        maximum_finish: Option<i64>,
        granularity: Granularity,
        zone: CalendarZone,
    ) -> Result<Self, DomainError> {
        let ordered = [
            (minimum_start, maximum_start, "minimum start exceeds maximum start"),
            (maximum_start, maximum_finish, "maximum start exceeds maximum finish"),
            (minimum_start, minimum_finish, "minimum start exceeds minimum finish"),
            (minimum_finish, maximum_finish, "minimum finish exceeds maximum finish"),
        ];
        for (lower, upper, message) in ordered {
            if let (Some(lower), Some(upper)) = (lower, upper) {
                if lower > upper {
                    return Err(DomainError::InvalidInterval(format!("{} ({} > {})", message, lower, upper)));
                }
            }
        }

        Ok(Self {
            minimum_start,
            maximum_start,
            minimum_finish,
            maximum_finish,
            granularity,
            zone,
        })
    }

    /// Earliest possible start
    pub fn minimum_start(&self) -> Option<i64> {
        self.minimum_start
    }

    /// Latest possible start
    pub fn maximum_start(&self) -> Option<i64> {
        self.maximum_start
    }

    /// Earliest possible finish
    pub fn minimum_finish(&self) -> Option<i64> {
        self.minimum_finish
    }

    /// Latest possible finish
    pub fn maximum_finish(&self) -> Option<i64> {
        self.maximum_finish
    }

    /// Granularity the bounds were computed at
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Calendar zone the bounds were computed in
    pub fn zone(&self) -> CalendarZone {
        self.zone
    }

    /// Bounds of one end
    pub fn endpoint(&self, side: Side) -> Bounds {
        match side {
            Side::Start => (self.minimum_start, self.maximum_start),
            Side::Finish => (self.minimum_finish, self.maximum_finish),
        }
    }

    /// Whether start and finish share the same bounds
    pub fn is_point(&self) -> bool {
        self.minimum_start == self.minimum_finish && self.maximum_start == self.maximum_finish
    }

    /// Shortest possible length in whole units (never negative)
    ///
    /// Returns `None` when the unit belongs to another time system.
    pub fn minimum_length(&self, unit: Unit) -> Option<i64> {
        if unit.system() != self.granularity.system() {
            return None;
        }
        match (self.maximum_start, self.minimum_finish) {
            (Some(start), Some(finish)) => Some(unit.units_between(start, finish, self.zone)?.max(0)),
            _ => Some(0),
        }
    }

    /// Longest possible length in whole units
    ///
    /// Returns `None` when the interval is unbounded or the unit belongs to
    /// another time system.
    pub fn maximum_length(&self, unit: Unit) -> Option<i64> {
        if unit.system() != self.granularity.system() {
            return None;
        }
        unit.units_between(self.minimum_start?, self.maximum_finish?, self.zone)
    }

    /// Whether the interval can last at least `count` units
    pub fn is_at_least(&self, count: i64, unit: Unit) -> bool {
        if unit.system() != self.granularity.system() {
            return false;
        }
        match self.maximum_length(unit) {
            Some(length) => length >= count,
            // Unbounded intervals can be arbitrarily long
            None => self.minimum_start.is_none() || self.maximum_finish.is_none(),
        }
    }

    /// Whether the interval can last at most `count` units
    pub fn is_at_most(&self, count: i64, unit: Unit) -> bool {
        match self.minimum_length(unit) {
            Some(length) => length <= count,
            None => false,
        }
    }

    /// Smallest interval containing both `self` and `other`
    ///
    /// The granularity and zone of `self` are kept.
    pub fn span(&self, other: &Interval) -> Result<Interval, DomainError> {
        Interval::from_bounds(
            min_unbounded_low(self.minimum_start, other.minimum_start),
            min_unbounded_low(self.maximum_start, other.maximum_start),
            max_unbounded_high(self.minimum_finish, other.minimum_finish),
            max_unbounded_high(self.maximum_finish, other.maximum_finish),
            self.granularity,
            self.zone,
        )
    }

    /// Chronological ordering: by start bounds, then finish bounds
    ///
    /// Unbounded starts sort first and unbounded finishes sort last.
    pub fn chronological_cmp(&self, other: &Interval) -> Ordering {
        let low = |v: Option<i64>| v.unwrap_or(i64::MIN);
        let high = |v: Option<i64>| v.unwrap_or(i64::MAX);
        low(self.minimum_start)
            .cmp(&low(other.minimum_start))
            .then(low(self.maximum_start).cmp(&low(other.maximum_start)))
            .then(high(self.minimum_finish).cmp(&high(other.minimum_finish)))
            .then(high(self.maximum_finish).cmp(&high(other.maximum_finish)))
    }
}

fn resolve(timestamp: i64, granularity: Granularity, zone: CalendarZone) -> Result<(i64, i64), DomainError> {
    let earliest = granularity.earliest(timestamp, zone);
    let latest = granularity.latest(timestamp, zone);
    match (earliest, latest) {
        (Some(earliest), Some(latest)) => Ok((earliest, latest)),
        _ => Err(DomainError::CalendarOverflow(format!(
            "timestamp {} at {} granularity",
            timestamp, granularity
        ))),
    }
}

fn min_unbounded_low(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    Some(a?.min(b?))
}

fn max_unbounded_high(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    Some(a?.max(b?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{local_millis, MILLIS_PER_HOUR, MILLIS_PER_MINUTE};

    fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> i64 {
        local_millis(CalendarZone::Utc, year, month, day, hour, minute).unwrap()
    }

    #[test]
    fn test_point_interval_at_millisecond() {
        let t = utc(2007, 1, 1, 1, 0);
        let interval = Interval::at(t, Granularity::MILLISECOND, CalendarZone::Utc).unwrap();
        assert_eq!(interval.endpoint(Side::Start), (Some(t), Some(t)));
        assert_eq!(interval.endpoint(Side::Finish), (Some(t), Some(t)));
        assert!(interval.is_point());
    }

    #[test]
    fn test_between_rejects_reversed_timestamps() {
        let t = utc(2007, 1, 1, 1, 0);
        let result = Interval::between(t, t - 1, Granularity::MILLISECOND, CalendarZone::Utc);
        assert!(matches!(result, Err(DomainError::InvalidInterval(_))));
    }

    #[test]
    fn test_from_bounds_validates_invariants() {
        let g = Granularity::MILLISECOND;
        assert!(Interval::from_bounds(Some(10), Some(5), Some(20), Some(30), g, CalendarZone::Utc).is_err());
        assert!(Interval::from_bounds(Some(10), Some(40), Some(20), Some(30), g, CalendarZone::Utc).is_err());
        assert!(Interval::from_bounds(Some(10), Some(15), Some(5), Some(30), g, CalendarZone::Utc).is_err());
        // Overlapping uncertainty between start and finish is allowed
        assert!(Interval::from_bounds(Some(10), Some(25), Some(20), Some(30), g, CalendarZone::Utc).is_ok());
        assert!(Interval::from_bounds(None, None, Some(20), None, g, CalendarZone::Utc).is_ok());
    }

    #[test]
    fn test_lengths() {
        let start = utc(2007, 1, 1, 1, 0);
        let finish = start + 3 * MILLIS_PER_HOUR;
        let interval = Interval::between(start, finish, Granularity::MINUTE, CalendarZone::Utc).unwrap();
        assert_eq!(interval.minimum_length(Unit::MINUTE), Some(179));
        assert_eq!(interval.maximum_length(Unit::MINUTE), Some(180));
        assert!(interval.is_at_least(3, Unit::HOUR));
        assert!(interval.is_at_most(2, Unit::HOUR));
        assert!(!interval.is_at_least(4, Unit::HOUR));
    }

    #[test]
    fn test_length_in_other_time_system_is_unmeasurable() {
        let interval = Interval::at(0, Granularity::RELATIVE_HOUR, CalendarZone::Utc).unwrap();
        assert_eq!(interval.maximum_length(Unit::HOUR), None);
        assert!(!interval.is_at_least(0, Unit::HOUR));
        assert!(!interval.is_at_most(10, Unit::DAY));
        assert!(interval.is_at_most(1, Unit::RELATIVE_HOUR));
    }

    #[test]
    fn test_span_and_ordering() {
        let g = Granularity::MILLISECOND;
        let a = Interval::between(0, 10 * MILLIS_PER_MINUTE, g, CalendarZone::Utc).unwrap();
        let b = Interval::between(5 * MILLIS_PER_MINUTE, 20 * MILLIS_PER_MINUTE, g, CalendarZone::Utc).unwrap();
        let span = a.span(&b).unwrap();
        assert_eq!(span.minimum_start(), Some(0));
        assert_eq!(span.maximum_finish(), Some(20 * MILLIS_PER_MINUTE));
        assert_eq!(a.chronological_cmp(&b), Ordering::Less);
        assert_eq!(b.chronological_cmp(&a), Ordering::Greater);
        assert_eq!(a.chronological_cmp(&a), Ordering::Equal);
    }
}
