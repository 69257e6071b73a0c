//! Temporal relations between two intervals
//!
//! A [`Relation`] bounds the signed distance between chosen endpoints of two
//! intervals, and optionally the duration of each interval. Distances are
//! counted in whole units using calendar arithmetic, so a bound of "1 month"
//! or "1 day" means the calendar's month or local day, not a fixed number of
//! milliseconds.
//!
//! Under uncertainty a bound is satisfied when it *can* be satisfied: a
//! minimum distance is tested against the largest possible distance
//! (earliest first endpoint to latest second endpoint), a maximum distance
//! against the smallest possible one.

use crate::granularity::{TimeSystem, Unit};
use crate::interval::{Bounds, Interval, Side};
use serde::{Deserialize, Serialize};

/// A signed count of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bound {
    /// How many units
    pub count: i64,
    /// Which unit
    pub unit: Unit,
}

impl Bound {
    /// Create a new bound
    pub fn new(count: i64, unit: Unit) -> Self {
        Self { count, unit }
    }
}

/// Which endpoint of the first interval is measured to which endpoint of the second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoints {
    /// First start to second start
    StartStart,
    /// First start to second finish
    StartFinish,
    /// First finish to second start
    FinishStart,
    /// First finish to second finish
    FinishFinish,
}

impl Endpoints {
    /// All four pairings
    pub const ALL: [Endpoints; 4] = [
        Endpoints::StartStart,
        Endpoints::StartFinish,
        Endpoints::FinishStart,
        Endpoints::FinishFinish,
    ];

    /// The sides measured on the first and second interval
    pub fn sides(&self) -> (Side, Side) {
        match self {
            Endpoints::StartStart => (Side::Start, Side::Start),
            Endpoints::StartFinish => (Side::Start, Side::Finish),
            Endpoints::FinishStart => (Side::Finish, Side::Start),
            Endpoints::FinishFinish => (Side::Finish, Side::Finish),
        }
    }
}

/// Optional minimum and maximum of one measured distance or duration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistanceConstraint {
    /// Smallest allowed value, inclusive
    pub min: Option<Bound>,
    /// Largest allowed value, inclusive
    pub max: Option<Bound>,
}

impl DistanceConstraint {
    /// Whether min and max contradict each other when both use one unit
    fn is_contradictory(&self) -> bool {
        matches!((self.min, self.max), (Some(min), Some(max)) if min.unit == max.unit && min.count > max.count)
    }

    fn bounds(&self) -> impl Iterator<Item = &Bound> {
        self.min.iter().chain(self.max.iter())
    }
}

/// A declarative temporal constraint between two intervals
///
/// # Examples
///
/// ```
/// use kairos_domain::{Bound, CalendarZone, Endpoints, Granularity, Interval, Relation, Unit};
/// use kairos_domain::calendar::local_millis;
///
/// let zone = CalendarZone::Utc;
/// let one_am = Interval::at(local_millis(zone, 2007, 1, 1, 1, 0).unwrap(), Granularity::MINUTE, zone).unwrap();
/// let two_am = Interval::at(local_millis(zone, 2007, 1, 1, 2, 0).unwrap(), Granularity::MINUTE, zone).unwrap();
///
/// let one_hour = Relation::new().between(
///     Endpoints::StartStart,
///     Some(Bound::new(1, Unit::HOUR)),
///     Some(Bound::new(1, Unit::HOUR)),
/// );
/// assert!(one_hour.has_relation(&one_am, &two_am));
///
/// let two_hours = Relation::new().between(
///     Endpoints::StartStart,
///     Some(Bound::new(2, Unit::HOUR)),
///     Some(Bound::new(2, Unit::HOUR)),
/// );
/// assert!(!two_hours.has_relation(&one_am, &two_am));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    starts: DistanceConstraint,
    start_finish: DistanceConstraint,
    finish_start: DistanceConstraint,
    finishes: DistanceConstraint,
    first_duration: DistanceConstraint,
    second_duration: DistanceConstraint,
}

impl Relation {
    /// An unconstrained relation (holds for any two intervals)
    pub fn new() -> Self {
        Self::default()
    }

    /// Require at least `bound` between the chosen endpoints
    pub fn with_min(mut self, endpoints: Endpoints, bound: Bound) -> Self {
        self.constraint_mut(endpoints).min = Some(bound);
        self
    }

    /// Allow at most `bound` between the chosen endpoints
    pub fn with_max(mut self, endpoints: Endpoints, bound: Bound) -> Self {
        self.constraint_mut(endpoints).max = Some(bound);
        self
    }

    /// Set both limits for the chosen endpoints
    pub fn between(mut self, endpoints: Endpoints, min: Option<Bound>, max: Option<Bound>) -> Self {
        *self.constraint_mut(endpoints) = DistanceConstraint { min, max };
        self
    }

    /// Constrain the duration of the first interval
    pub fn with_first_duration(mut self, min: Option<Bound>, max: Option<Bound>) -> Self {
        self.first_duration = DistanceConstraint { min, max };
        self
    }

    /// Constrain the duration of the second interval
    pub fn with_second_duration(mut self, min: Option<Bound>, max: Option<Bound>) -> Self {
        self.second_duration = DistanceConstraint { min, max };
        self
    }

    /// The constraint on one endpoint pairing
    pub fn constraint(&self, endpoints: Endpoints) -> &DistanceConstraint {
        match endpoints {
            Endpoints::StartStart => &self.starts,
            Endpoints::StartFinish => &self.start_finish,
            Endpoints::FinishStart => &self.finish_start,
            Endpoints::FinishFinish => &self.finishes,
        }
    }

    fn constraint_mut(&mut self, endpoints: Endpoints) -> &mut DistanceConstraint {
        match endpoints {
            Endpoints::StartStart => &mut self.starts,
            Endpoints::StartFinish => &mut self.start_finish,
            Endpoints::FinishStart => &mut self.finish_start,
            Endpoints::FinishFinish => &mut self.finishes,
        }
    }

    /// The constraint on the first interval's duration
    pub fn first_duration(&self) -> &DistanceConstraint {
        &self.first_duration
    }

    /// The constraint on the second interval's duration
    pub fn second_duration(&self) -> &DistanceConstraint {
        &self.second_duration
    }

    /// False when some minimum exceeds its maximum in the same unit
    ///
    /// Such relations are accepted at construction and never hold.
    pub fn is_well_formed(&self) -> bool {
        !self.all_constraints().any(|c| c.is_contradictory())
    }

    fn all_constraints(&self) -> impl Iterator<Item = &DistanceConstraint> {
        [
            &self.starts,
            &self.start_finish,
            &self.finish_start,
            &self.finishes,
            &self.first_duration,
            &self.second_duration,
        ]
        .into_iter()
    }

    /// Units referenced by any bound of this relation
    pub fn units(&self) -> impl Iterator<Item = Unit> + '_ {
        self.all_constraints().flat_map(|c| c.bounds()).map(|b| b.unit)
    }

    /// Whether the two intervals satisfy every declared bound
    ///
    /// Absent bounds and unbounded endpoints never fail. Bounds in a unit of
    /// another time system than either interval's granularity fail.
    pub fn has_relation(&self, first: &Interval, second: &Interval) -> bool {
        if !self.is_well_formed() {
            tracing::trace!("relation has contradictory bounds; treating as unsatisfied");
            return false;
        }

        let systems = [first.granularity().system(), second.granularity().system()];
        if self.units().any(|unit| !same_system(unit.system(), systems)) {
            tracing::trace!("relation unit does not share the intervals' time system");
            return false;
        }

        let zone = first.zone();
        let distances_hold = Endpoints::ALL.iter().all(|endpoints| {
            let (first_side, second_side) = endpoints.sides();
            distance_holds(
                self.constraint(*endpoints),
                first.endpoint(first_side),
                second.endpoint(second_side),
                zone,
            )
        });

        distances_hold
            && duration_holds(&self.first_duration, first)
            && duration_holds(&self.second_duration, second)
    }
}

fn same_system(unit: TimeSystem, systems: [TimeSystem; 2]) -> bool {
    systems.iter().all(|s| *s == unit)
}

fn distance_holds(
    constraint: &DistanceConstraint,
    (from_earliest, from_latest): Bounds,
    (to_earliest, to_latest): Bounds,
    zone: crate::CalendarZone,
) -> bool {
    if let (Some(min), Some(from), Some(to)) = (constraint.min, from_earliest, to_latest) {
        match min.unit.units_between(from, to, zone) {
            Some(largest) if largest >= min.count => {}
            _ => return false,
        }
    }
    if let (Some(max), Some(from), Some(to)) = (constraint.max, from_latest, to_earliest) {
        match max.unit.units_between(from, to, zone) {
            Some(smallest) if smallest <= max.count => {}
            _ => return false,
        }
    }
    true
}

fn duration_holds(constraint: &DistanceConstraint, interval: &Interval) -> bool {
    let at_least = constraint.min.is_none_or(|min| interval.is_at_least(min.count, min.unit));
    let at_most = constraint.max.is_none_or(|max| interval.is_at_most(max.count, max.unit));
    at_least && at_most
}
