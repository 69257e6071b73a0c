//! Pair abstraction matcher

use crate::rule::{sorted_facts, Activation, FactIndex};
use kairos_domain::{AbstractionKind, PairDefinition, Proposition, UniqueId};

/// Pair each left with its earliest-starting valid right
///
/// When the right side is optional, a left without a partner yields a
/// partial instance covering the left alone.
pub(crate) fn matches(definition: &PairDefinition, facts: &dyn FactIndex) -> Vec<Activation> {
    let lefts = sorted_facts(facts, [definition.left().proposition_id()], |p| definition.left().matches(p));
    let rights = sorted_facts(facts, [definition.right().proposition_id()], |p| definition.right().matches(p));

    lefts
        .into_iter()
        .filter_map(|left| {
            let partner = rights
                .iter()
                .copied()
                .filter(|right| right.unique_id() != left.unique_id())
                .find(|right| match (left.interval(), right.interval()) {
                    (Some(l), Some(r)) => definition.relation().has_relation(l, r),
                    _ => false,
                });
            match partner {
                Some(right) => instance(definition, &[left, right]),
                None if !definition.second_required() => instance(definition, &[left]),
                None => None,
            }
        })
        .collect()
}

fn instance(definition: &PairDefinition, members: &[&Proposition]) -> Option<Activation> {
    let interval = crate::low_level::span(members)?;
    let sources: Vec<UniqueId> = members.iter().map(|p| p.unique_id().clone()).collect();
    let unique_id = UniqueId::derived(AbstractionKind::Pair.as_str(), definition.id(), &sources);
    Some(Activation::derived(Proposition::abstraction(
        definition.id().clone(),
        unique_id,
        None,
        interval,
        AbstractionKind::Pair,
        sources,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::testing::{event, Facts};
    use kairos_domain::{Bound, Endpoints, Relation, Unit};

    fn within_a_day_after() -> Relation {
        Relation::new()
            .with_min(Endpoints::FinishStart, Bound::new(0, Unit::MINUTE))
            .with_max(Endpoints::FinishStart, Bound::new(1, Unit::DAY))
    }

    fn locals(activation: &Activation) -> Vec<&str> {
        activation.sources.iter().map(|s| s.local()).collect()
    }

    #[test]
    fn test_left_pairs_with_earliest_valid_right() {
        let definition = PairDefinition::new("ADMIT_THEN_LAB", "ADMIT", "LAB", within_a_day_after());
        let facts = Facts::default()
            .with(event("ADMIT", "admit", 100, 110))
            .with(event("LAB", "before", 50, 60))
            .with(event("LAB", "second", 300, 301))
            .with(event("LAB", "first", 200, 201));

        let found = matches(&definition, &facts);
        assert_eq!(found.len(), 1);
        assert_eq!(locals(&found[0]), vec!["admit", "first"]);
    }

    #[test]
    fn test_required_second_drops_lone_left() {
        let definition = PairDefinition::new("ADMIT_THEN_LAB", "ADMIT", "LAB", within_a_day_after());
        let facts = Facts::default().with(event("ADMIT", "admit", 0, 10));
        assert!(matches(&definition, &facts).is_empty());
    }

    #[test]
    fn test_optional_second_yields_partial_instance() {
        let definition =
            PairDefinition::new("ADMIT_THEN_LAB", "ADMIT", "LAB", within_a_day_after()).with_second_optional();
        let facts = Facts::default()
            .with(event("ADMIT", "admit", 0, 10))
            .with(event("LAB", "too_late", 3000, 3001));

        let found = matches(&definition, &facts);
        assert_eq!(found.len(), 1);
        assert_eq!(locals(&found[0]), vec!["admit"]);
        let interval = found[0].proposition.interval().unwrap();
        assert_eq!(interval.maximum_finish(), Some(10 * 60_000));
    }

    #[test]
    fn test_same_id_pairs_never_use_one_fact_twice() {
        let definition = PairDefinition::new("REPEAT", "LAB", "LAB", Relation::new());
        let facts = Facts::default().with(event("LAB", "only", 0, 1));
        assert!(matches(&definition, &facts).is_empty());
    }
}
