//! Low-level abstraction matcher: runs of classified values

use crate::rule::{sorted_facts, Activation, FactIndex};
use kairos_domain::{
    AbstractionKind, ClassificationId, ClassifierError, Interval, LowLevelDefinition, Proposition, UniqueId, Value,
};

/// One maximal run of consecutive values sharing a classification
struct Run {
    classification: ClassificationId,
    start: usize,
    end: usize,
}

/// Instances for every qualifying run of the definition's source values
///
/// Windows of `min_values` consecutive values are classified; consecutive
/// windows with the same classification extend one run as long as the gap
/// function admits each new value. A run that reaches `max_values` is closed
/// and the next run starts after it.
pub(crate) fn matches(definition: &LowLevelDefinition, facts: &dyn FactIndex) -> Result<Vec<Activation>, ClassifierError> {
    let values = sorted_facts(facts, definition.sources(), Proposition::is_primitive_parameter);
    let width = definition.min_values();
    if values.len() < width {
        return Ok(Vec::new());
    }

    let mut runs = Vec::new();
    let mut current: Option<Run> = None;
    let mut resume_at = 0;

    for start in 0..=values.len() - width {
        if start < resume_at {
            continue;
        }
        let window = &values[start..start + width];
        let classification = classify_window(definition, window)?;

        let extends = match (&current, &classification) {
            (Some(run), Some(class)) => {
                run.classification == *class
                    && start + width == run.end + 1
                    && gap_allows(definition, values[run.end - 1], values[run.end])
            }
            _ => false,
        };

        if extends {
            if let Some(run) = current.as_mut() {
                run.end += 1;
            }
        } else {
            runs.extend(current.take());
            current = classification.map(|classification| Run { classification, start, end: start + width });
        }

        if let Some(max) = definition.max_values() {
            if current.as_ref().is_some_and(|run| run.end - run.start >= max) {
                if let Some(run) = current.take() {
                    resume_at = run.end;
                    runs.push(run);
                }
            }
        }
    }
    runs.extend(current);

    Ok(runs
        .into_iter()
        .filter_map(|run| instance(definition, &values[run.start..run.end], run.classification))
        .collect())
}

fn classify_window(
    definition: &LowLevelDefinition,
    window: &[&Proposition],
) -> Result<Option<ClassificationId>, ClassifierError> {
    if !window.windows(2).all(|pair| gap_allows(definition, pair[0], pair[1])) {
        return Ok(None);
    }
    let values: Option<Vec<&Value>> = window.iter().map(|p| p.value()).collect();
    match values {
        Some(values) => definition.classifier().classify(&values),
        None => Ok(None),
    }
}

fn gap_allows(definition: &LowLevelDefinition, first: &Proposition, second: &Proposition) -> bool {
    match (first.interval(), second.interval()) {
        (Some(a), Some(b)) => definition.gap().allows(a, b),
        _ => false,
    }
}

fn instance(
    definition: &LowLevelDefinition,
    run: &[&Proposition],
    classification: ClassificationId,
) -> Option<Activation> {
    let interval = span(run)?;
    if !definition.duration_allows(&interval) {
        tracing::trace!(definition = %definition.id(), "run outside duration bounds");
        return None;
    }

    let sources: Vec<UniqueId> = run.iter().map(|p| p.unique_id().clone()).collect();
    let unique_id = UniqueId::derived(AbstractionKind::LowLevel.as_str(), definition.id(), &sources);
    Some(Activation::derived(Proposition::abstraction(
        definition.id().clone(),
        unique_id,
        Some(Value::Nominal(classification.as_str().to_string())),
        interval,
        AbstractionKind::LowLevel,
        sources,
    )))
}

/// Smallest interval covering every proposition
pub(crate) fn span(propositions: &[&Proposition]) -> Option<Interval> {
    let mut intervals = propositions.iter().filter_map(|p| p.interval());
    let first = *intervals.next()?;
    intervals.try_fold(first, |acc, next| acc.span(next).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::testing::{reading, Facts};
    use kairos_domain::{Bound, GapFunction, ThresholdClassifier, ThresholdLimit, Unit};
    use std::sync::Arc;

    fn glucose_states() -> LowLevelDefinition {
        let classifier = ThresholdClassifier::new("glucose")
            .with_band("NORMAL", None, Some(ThresholdLimit::exclusive(180.0)))
            .with_band("HIGH", Some(ThresholdLimit::inclusive(180.0)), None);
        LowLevelDefinition::new("GLUCOSE_STATE", Arc::new(classifier)).with_source("GLUCOSE")
    }

    fn facts(readings: &[(i64, f64)]) -> Facts {
        readings
            .iter()
            .enumerate()
            .fold(Facts::default(), |facts, (i, (minute, value))| {
                facts.with(reading("GLUCOSE", &format!("g{}", i), *minute, *value))
            })
    }

    fn summary(activations: &[Activation]) -> Vec<(String, usize)> {
        activations
            .iter()
            .map(|a| (a.proposition.value().map(|v| v.to_string()).unwrap_or_default(), a.sources.len()))
            .collect()
    }

    #[test]
    fn test_consecutive_values_merge_into_runs() {
        let found = matches(&glucose_states(), &facts(&[(0, 200.0), (60, 210.0), (120, 100.0), (180, 190.0)])).unwrap();
        assert_eq!(
            summary(&found),
            vec![("HIGH".to_string(), 2), ("NORMAL".to_string(), 1), ("HIGH".to_string(), 1)]
        );
        assert_eq!(found[0].proposition.interval().unwrap().minimum_start(), Some(0));
        assert_eq!(found[0].proposition.interval().unwrap().maximum_finish(), Some(60 * 60_000));
    }

    #[test]
    fn test_gap_boundary() {
        let definition = glucose_states().with_gap(GapFunction::max_gap(Bound::new(60, Unit::MINUTE)));
        let within = matches(&definition, &facts(&[(0, 200.0), (60, 200.0)])).unwrap();
        assert_eq!(summary(&within), vec![("HIGH".to_string(), 2)]);

        let beyond = matches(&definition, &facts(&[(0, 200.0), (61, 200.0)])).unwrap();
        assert_eq!(summary(&beyond), vec![("HIGH".to_string(), 1), ("HIGH".to_string(), 1)]);
    }

    #[test]
    fn test_min_values_is_window_width() {
        let definition = glucose_states().with_min_values(2);
        let found = matches(
            &definition,
            &facts(&[(0, 200.0), (10, 200.0), (20, 100.0), (30, 200.0), (40, 200.0), (50, 200.0)]),
        )
        .unwrap();
        assert_eq!(summary(&found), vec![("HIGH".to_string(), 2), ("HIGH".to_string(), 3)]);

        let lonely = matches(&definition, &facts(&[(0, 200.0), (10, 100.0)])).unwrap();
        assert!(lonely.is_empty());
    }

    #[test]
    fn test_max_values_closes_runs() {
        let definition = glucose_states().with_max_values(2);
        let found = matches(&definition, &facts(&[(0, 200.0), (10, 200.0), (20, 200.0)])).unwrap();
        assert_eq!(summary(&found), vec![("HIGH".to_string(), 2), ("HIGH".to_string(), 1)]);
    }

    #[test]
    fn test_duration_filter() {
        let definition = glucose_states().with_duration(Some(Bound::new(30, Unit::MINUTE)), None);
        let found = matches(&definition, &facts(&[(0, 200.0), (40, 200.0), (50, 100.0)])).unwrap();
        assert_eq!(summary(&found), vec![("HIGH".to_string(), 2)]);
    }

    #[test]
    fn test_classifier_errors_propagate() {
        let facts = Facts::default().with(Proposition::primitive_parameter(
            "GLUCOSE".into(),
            UniqueId::new(kairos_domain::SourceId::new("test"), "bad"),
            Value::from("n/a"),
            crate::rule::testing::minutes(0, 0),
        ));
        assert!(matches(&glucose_states(), &facts).is_err());
    }

    #[test]
    fn test_matching_is_deterministic() {
        let facts = facts(&[(30, 200.0), (0, 200.0), (15, 200.0)]);
        let first = matches(&glucose_states(), &facts).unwrap();
        let second = matches(&glucose_states(), &facts).unwrap();
        assert_eq!(first, second);
        let locals: Vec<&str> = first[0].sources.iter().map(|s| s.local()).collect();
        assert_eq!(locals, vec!["g1", "g2", "g0"]);
    }
}
