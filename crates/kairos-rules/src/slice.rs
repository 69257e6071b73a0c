//! Slice abstraction matcher

use crate::low_level::span;
use crate::rule::{sorted_facts, Activation, FactIndex};
use kairos_domain::{AbstractionKind, Proposition, SliceDefinition, SliceOrder, UniqueId};

/// Instances for the kept index range of the sorted sources
pub(crate) fn matches(definition: &SliceDefinition, facts: &dyn FactIndex) -> Vec<Activation> {
    let sources = definition.sources();
    let mut sorted = sorted_facts(
        facts,
        sources.iter().map(|s| s.proposition_id()),
        |p| sources.iter().any(|s| s.matches(p)),
    );
    if definition.order() == SliceOrder::Descending {
        sorted.reverse();
    }

    let kept = &sorted[definition.resolve_range(sorted.len())];
    if kept.is_empty() {
        return Vec::new();
    }

    if definition.merged_interval() {
        return instance(definition, kept, None).into_iter().collect();
    }
    kept.iter()
        .filter_map(|p| instance(definition, std::slice::from_ref(p), p.value().cloned()))
        .collect()
}

fn instance(
    definition: &SliceDefinition,
    members: &[&Proposition],
    value: Option<kairos_domain::Value>,
) -> Option<Activation> {
    let interval = span(members)?;
    let sources: Vec<UniqueId> = members.iter().map(|p| p.unique_id().clone()).collect();
    let unique_id = UniqueId::derived(AbstractionKind::Slice.as_str(), definition.id(), &sources);
    Some(Activation::derived(Proposition::abstraction(
        definition.id().clone(),
        unique_id,
        value,
        interval,
        AbstractionKind::Slice,
        sources,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::testing::{event, reading, Facts};

    fn visits() -> Facts {
        (0..5).fold(Facts::default(), |facts, i| {
            facts.with(event("VISIT", &format!("v{}", i), i * 100, i * 100 + 10))
        })
    }

    fn locals(found: &[Activation]) -> Vec<&str> {
        found.iter().flat_map(|a| a.sources.iter().map(|s| s.local())).collect()
    }

    #[test]
    fn test_first_two() {
        let definition = SliceDefinition::new("FIRST_TWO").with_source("VISIT").with_range(0, Some(2));
        assert_eq!(locals(&matches(&definition, &visits())), vec!["v0", "v1"]);
    }

    #[test]
    fn test_negative_indices_count_from_end() {
        let definition = SliceDefinition::new("LAST").with_source("VISIT").with_range(-1, None);
        assert_eq!(locals(&matches(&definition, &visits())), vec!["v4"]);

        let middle = SliceDefinition::new("MIDDLE").with_source("VISIT").with_range(1, Some(-1));
        assert_eq!(locals(&matches(&middle, &visits())), vec!["v1", "v2", "v3"]);
    }

    #[test]
    fn test_descending_order() {
        let definition = SliceDefinition::new("LATEST_TWO")
            .with_source("VISIT")
            .with_range(0, Some(2))
            .with_order(SliceOrder::Descending);
        assert_eq!(locals(&matches(&definition, &visits())), vec!["v4", "v3"]);
    }

    #[test]
    fn test_inner_range_in_both_orders() {
        let ascending = SliceDefinition::new("SECOND_AND_THIRD").with_source("VISIT").with_range(1, Some(3));
        assert_eq!(locals(&matches(&ascending, &visits())), vec!["v1", "v2"]);

        let descending = SliceDefinition::new("SECOND_AND_THIRD_LATEST")
            .with_source("VISIT")
            .with_range(1, Some(3))
            .with_order(SliceOrder::Descending);
        assert_eq!(locals(&matches(&descending, &visits())), vec!["v3", "v2"]);
    }

    #[test]
    fn test_merged_interval() {
        let definition = SliceDefinition::new("FIRST_THREE")
            .with_source("VISIT")
            .with_range(0, Some(3))
            .with_merged_interval();
        let found = matches(&definition, &visits());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sources.len(), 3);
        let interval = found[0].proposition.interval().unwrap();
        assert_eq!(interval.minimum_start(), Some(0));
        assert_eq!(interval.maximum_finish(), Some(210 * 60_000));
    }

    #[test]
    fn test_range_beyond_data_is_empty() {
        let definition = SliceDefinition::new("SIXTH").with_source("VISIT").with_range(5, Some(6));
        assert!(matches(&definition, &visits()).is_empty());
    }

    #[test]
    fn test_sources_of_several_ids_are_interleaved() {
        let definition = SliceDefinition::new("FIRST_MEASUREMENT")
            .with_source("GLUCOSE")
            .with_source("INSULIN")
            .with_range(0, Some(1));
        let facts = Facts::default()
            .with(reading("GLUCOSE", "g", 50, 120.0))
            .with(reading("INSULIN", "i", 10, 4.0));
        let found = matches(&definition, &facts);
        assert_eq!(locals(&found), vec!["i"]);
        assert_eq!(found[0].proposition.value(), Some(&kairos_domain::Value::Number(4.0)));
    }
}
