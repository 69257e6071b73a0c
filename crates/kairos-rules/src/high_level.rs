//! High-level abstraction matcher: N-ary temporal patterns

use crate::low_level::span;
use crate::rule::{sorted_facts, Activation, FactIndex};
use kairos_domain::{
    AbstractionKind, Bounds, HighLevelDefinition, Interval, OffsetAnchor, Proposition, TemporalPatternOffset,
    UniqueId,
};

/// One instance per valid assignment of propositions to components
///
/// An assignment is valid when each component's predicate holds, every
/// declared relation holds, and no proposition fills two components.
pub(crate) fn matches(definition: &HighLevelDefinition, facts: &dyn FactIndex) -> Vec<Activation> {
    let candidates: Vec<Vec<&Proposition>> = definition
        .components()
        .iter()
        .map(|component| sorted_facts(facts, [component.proposition_id()], |p| component.matches(p)))
        .collect();
    if candidates.is_empty() || candidates.iter().any(Vec::is_empty) {
        return Vec::new();
    }

    let mut found = Vec::new();
    let mut assignment = Vec::with_capacity(candidates.len());
    search(definition, &candidates, &mut assignment, &mut found);
    found
}

fn search<'a>(
    definition: &HighLevelDefinition,
    candidates: &[Vec<&'a Proposition>],
    assignment: &mut Vec<&'a Proposition>,
    found: &mut Vec<Activation>,
) {
    let index = assignment.len();
    if index == candidates.len() {
        if let Some(activation) = instance(definition, assignment) {
            found.push(activation);
        }
        return;
    }

    for &candidate in &candidates[index] {
        if assignment.iter().any(|p| p.unique_id() == candidate.unique_id()) {
            continue;
        }
        assignment.push(candidate);
        if relations_hold(definition, assignment) {
            search(definition, candidates, assignment, found);
        }
        assignment.pop();
    }
}

/// Check the relations that the newest component completes
fn relations_hold(definition: &HighLevelDefinition, assignment: &[&Proposition]) -> bool {
    let newest = assignment.len() - 1;
    definition
        .relations()
        .iter()
        .filter(|r| r.first.max(r.second) == newest)
        .all(|r| match (assignment[r.first].interval(), assignment[r.second].interval()) {
            (Some(first), Some(second)) => r.relation.has_relation(first, second),
            _ => false,
        })
}

fn instance(definition: &HighLevelDefinition, assignment: &[&Proposition]) -> Option<Activation> {
    let interval = match definition.offset() {
        Some(offset) => offset_interval(offset, assignment)?,
        None => span(assignment)?,
    };
    let sources: Vec<UniqueId> = assignment.iter().map(|p| p.unique_id().clone()).collect();
    let unique_id = UniqueId::derived(AbstractionKind::HighLevel.as_str(), definition.id(), &sources);
    Some(Activation::derived(Proposition::abstraction(
        definition.id().clone(),
        unique_id,
        None,
        interval,
        AbstractionKind::HighLevel,
        sources,
    )))
}

/// Interval whose ends are taken from anchored components, shifted
fn offset_interval(offset: &TemporalPatternOffset, assignment: &[&Proposition]) -> Option<Interval> {
    let anchored = assignment.get(offset.start.component)?.interval()?;
    let (minimum_start, maximum_start) = anchor_bounds(&offset.start, assignment)?;
    let (minimum_finish, maximum_finish) = anchor_bounds(&offset.finish, assignment)?;
    match Interval::from_bounds(
        minimum_start,
        maximum_start,
        minimum_finish,
        maximum_finish,
        anchored.granularity(),
        anchored.zone(),
    ) {
        Ok(interval) => Some(interval),
        Err(e) => {
            tracing::trace!("offset interval rejected: {}", e);
            None
        }
    }
}

fn anchor_bounds(anchor: &OffsetAnchor, assignment: &[&Proposition]) -> Option<Bounds> {
    let interval = assignment.get(anchor.component)?.interval()?;
    let (earliest, latest) = interval.endpoint(anchor.side);
    match anchor.shift {
        None => Some((earliest, latest)),
        Some(shift) => {
            let shifted = |instant: Option<i64>| match instant {
                Some(t) => shift.unit.add(t, shift.count, interval.zone()).map(Some),
                None => Some(None),
            };
            Some((shifted(earliest)?, shifted(latest)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::testing::{event, Facts};
    use kairos_domain::{Bound, Endpoints, Relation, Side, Unit};

    fn before() -> Relation {
        Relation::new().with_min(Endpoints::FinishStart, Bound::new(0, Unit::MINUTE))
    }

    fn locals(activation: &Activation) -> Vec<&str> {
        activation.sources.iter().map(|s| s.local()).collect()
    }

    #[test]
    fn test_join_respects_relations() {
        let definition = HighLevelDefinition::new("FEVER_THEN_ANTIBIOTIC")
            .with_component("FEVER")
            .with_component("ANTIBIOTIC")
            .with_relation(0, 1, before());
        let facts = Facts::default()
            .with(event("FEVER", "f1", 0, 10))
            .with(event("ANTIBIOTIC", "a0", -20, -10))
            .with(event("ANTIBIOTIC", "a1", 30, 40));

        let found = matches(&definition, &facts);
        assert_eq!(found.len(), 1);
        assert_eq!(locals(&found[0]), vec!["f1", "a1"]);
        let interval = found[0].proposition.interval().unwrap();
        assert_eq!(interval.minimum_start(), Some(0));
        assert_eq!(interval.maximum_finish(), Some(40 * 60_000));
    }

    #[test]
    fn test_no_proposition_fills_two_roles() {
        let definition = HighLevelDefinition::new("TWO_FEVERS").with_component("FEVER").with_component("FEVER");
        let one = Facts::default().with(event("FEVER", "f1", 0, 10));
        assert!(matches(&definition, &one).is_empty());

        let two = one.with(event("FEVER", "f2", 20, 30));
        let found = matches(&definition, &two);
        // Both orders satisfy an unconstrained pattern
        assert_eq!(found.len(), 2);
        assert_ne!(found[0].proposition.unique_id(), found[1].proposition.unique_id());
    }

    #[test]
    fn test_missing_component_yields_nothing() {
        let definition = HighLevelDefinition::new("P").with_component("A").with_component("B");
        let facts = Facts::default().with(event("A", "a", 0, 1));
        assert!(matches(&definition, &facts).is_empty());
    }

    #[test]
    fn test_offset_interval() {
        let offset = TemporalPatternOffset {
            start: OffsetAnchor::new(0, Side::Finish),
            finish: OffsetAnchor::new(1, Side::Start).shifted(Bound::new(1, Unit::HOUR)),
        };
        let definition = HighLevelDefinition::new("WINDOW")
            .with_component("A")
            .with_component("B")
            .with_offset(offset);
        let facts = Facts::default().with(event("A", "a", 0, 10)).with(event("B", "b", 30, 40));

        let found = matches(&definition, &facts);
        let interval = found[0].proposition.interval().unwrap();
        assert_eq!(interval.minimum_start(), Some(10 * 60_000));
        assert_eq!(interval.minimum_finish(), Some(90 * 60_000));
    }

    #[test]
    fn test_inverted_offset_is_skipped() {
        let offset = TemporalPatternOffset {
            start: OffsetAnchor::new(1, Side::Finish),
            finish: OffsetAnchor::new(0, Side::Start),
        };
        let definition = HighLevelDefinition::new("BACKWARDS")
            .with_component("A")
            .with_component("B")
            .with_offset(offset);
        let facts = Facts::default().with(event("A", "a", 0, 10)).with(event("B", "b", 30, 40));
        assert!(matches(&definition, &facts).is_empty());
    }
}
