//! Compiled rules: guarded, prioritised matchers over working memory

use crate::{high_level, is_a, low_level, pair, slice};
use kairos_domain::{AbstractionDefinition, ClassifierError, Proposition, PropositionId, UniqueId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Read access to a key's facts, as seen by rules
pub trait FactIndex {
    /// Facts of one proposition id, in insertion order
    fn facts_for(&self, id: &PropositionId) -> &[Proposition];

    /// Whether a fact with this unique id is present
    fn contains(&self, unique_id: &UniqueId) -> bool;
}

/// A proposition a rule wants to add, with the facts it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    /// The new proposition
    pub proposition: Proposition,
    /// Unique ids it was derived from, recorded as provenance
    pub sources: Vec<UniqueId>,
}

impl Activation {
    /// Activation for a derived abstraction instance
    pub fn derived(proposition: Proposition) -> Self {
        let sources = proposition.derived_from().to_vec();
        Self { proposition, sources }
    }
}

/// Child → transitive ancestors for every is-a link in a rule set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IsAIndex {
    ancestors: BTreeMap<PropositionId, BTreeSet<PropositionId>>,
}

impl IsAIndex {
    /// Build the transitive index from direct parent → children links
    pub fn from_links<'a>(links: impl IntoIterator<Item = (&'a PropositionId, &'a [PropositionId])>) -> Self {
        let mut parents: BTreeMap<&PropositionId, Vec<&PropositionId>> = BTreeMap::new();
        for (parent, children) in links {
            for child in children {
                parents.entry(child).or_default().push(parent);
            }
        }

        let mut ancestors = BTreeMap::new();
        for child in parents.keys() {
            let mut seen = BTreeSet::new();
            let mut pending = parents.get(child).cloned().unwrap_or_default();
            while let Some(parent) = pending.pop() {
                if parent != *child && seen.insert(parent.clone()) {
                    pending.extend(parents.get(parent).into_iter().flatten().copied());
                }
            }
            ancestors.insert((*child).clone(), seen);
        }
        Self { ancestors }
    }

    /// Transitive ancestors of an id
    pub fn ancestors_of(&self, id: &PropositionId) -> impl Iterator<Item = &PropositionId> {
        self.ancestors.get(id).into_iter().flatten()
    }

    /// Ids with at least one ancestor
    pub fn children(&self) -> impl Iterator<Item = &PropositionId> {
        self.ancestors.keys()
    }

    /// Whether there are no is-a links
    pub fn is_empty(&self) -> bool {
        self.ancestors.is_empty()
    }
}

/// What a compiled rule does when it fires
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// Derive instances of an abstraction definition
    Abstraction(AbstractionDefinition),
    /// Copy facts to every is-a ancestor
    IsA(IsAIndex),
}

/// One rule of a compiled rule set
#[derive(Debug, Clone)]
pub struct CompiledRule {
    name: String,
    kind: RuleKind,
    level: u32,
    salience: u32,
    inputs: Vec<PropositionId>,
}

impl CompiledRule {
    /// Name given to the global is-a rule
    pub const IS_A: &'static str = "is-a";

    pub(crate) fn abstraction(definition: AbstractionDefinition, level: u32, salience: u32) -> Self {
        let inputs = definition.abstracted_from().into_iter().cloned().collect();
        Self {
            name: definition.id().to_string(),
            kind: RuleKind::Abstraction(definition),
            level,
            salience,
            inputs,
        }
    }

    pub(crate) fn is_a(index: IsAIndex, salience: u32) -> Self {
        let inputs = index.children().cloned().collect();
        Self {
            name: Self::IS_A.to_string(),
            kind: RuleKind::IsA(index),
            level: 0,
            salience,
            inputs,
        }
    }

    /// Definition id, or [`CompiledRule::IS_A`]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// What the rule does
    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Dependency level of the produced definition
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Firing priority; higher fires first
    pub fn salience(&self) -> u32 {
        self.salience
    }

    /// Proposition ids whose facts this rule reads
    pub fn inputs(&self) -> &[PropositionId] {
        &self.inputs
    }

    /// Every proposition this rule would add to `facts`
    ///
    /// The guard drops any activation whose unique id is already present, so a
    /// source tuple produces at most one instance however often the rule is
    /// evaluated.
    pub fn activations(&self, facts: &dyn FactIndex) -> Result<Vec<Activation>, ClassifierError> {
        let candidates = match &self.kind {
            RuleKind::Abstraction(AbstractionDefinition::LowLevel(d)) => low_level::matches(d, facts)?,
            RuleKind::Abstraction(AbstractionDefinition::HighLevel(d)) => high_level::matches(d, facts),
            RuleKind::Abstraction(AbstractionDefinition::Pair(d)) => pair::matches(d, facts),
            RuleKind::Abstraction(AbstractionDefinition::Slice(d)) => slice::matches(d, facts),
            RuleKind::IsA(index) => is_a::matches(index, facts),
        };

        let mut seen = BTreeSet::new();
        Ok(candidates
            .into_iter()
            .filter(|a| !facts.contains(a.proposition.unique_id()))
            .filter(|a| seen.insert(a.proposition.unique_id().clone()))
            .collect())
    }
}

impl fmt::Display for CompiledRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RuleKind::Abstraction(d) => write!(f, "{} [{}, level {}, salience {}]", self.name, d.kind(), self.level, self.salience),
            RuleKind::IsA(_) => write!(f, "{} [salience {}]", self.name, self.salience),
        }
    }
}

/// Facts of several ids that satisfy `keep`, sorted chronologically then by unique id
///
/// Non-temporal facts are skipped. An is-a copy and its original count once.
pub(crate) fn sorted_facts<'a>(
    facts: &'a dyn FactIndex,
    ids: impl IntoIterator<Item = &'a PropositionId>,
    keep: impl Fn(&Proposition) -> bool,
) -> Vec<&'a Proposition> {
    let mut ids: Vec<&PropositionId> = ids.into_iter().collect();
    ids.sort();
    ids.dedup();

    let mut seen = BTreeSet::new();
    let mut selected: Vec<&Proposition> = ids
        .into_iter()
        .flat_map(|id| facts.facts_for(id))
        .filter(|p| p.interval().is_some() && keep(p))
        .filter(|p| seen.insert(p.root()))
        .collect();
    selected.sort_by(|a, b| chronological(a, b));
    selected
}

pub(crate) fn chronological(a: &Proposition, b: &Proposition) -> std::cmp::Ordering {
    match (a.interval(), b.interval()) {
        (Some(x), Some(y)) => x.chronological_cmp(y),
        _ => std::cmp::Ordering::Equal,
    }
    .then_with(|| a.unique_id().cmp(b.unique_id()))
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory fact index for matcher tests

    use super::FactIndex;
    use kairos_domain::calendar::MILLIS_PER_MINUTE;
    use kairos_domain::{CalendarZone, Granularity, Interval, Proposition, PropositionId, SourceId, UniqueId, Value};
    use std::collections::{BTreeMap, BTreeSet};

    #[derive(Debug, Default)]
    pub struct Facts {
        by_id: BTreeMap<PropositionId, Vec<Proposition>>,
        unique: BTreeSet<UniqueId>,
    }

    impl Facts {
        pub fn insert(&mut self, proposition: Proposition) {
            self.unique.insert(proposition.unique_id().clone());
            self.by_id.entry(proposition.id().clone()).or_default().push(proposition);
        }

        pub fn with(mut self, proposition: Proposition) -> Self {
            self.insert(proposition);
            self
        }
    }

    impl FactIndex for Facts {
        fn facts_for(&self, id: &PropositionId) -> &[Proposition] {
            self.by_id.get(id).map(Vec::as_slice).unwrap_or(&[])
        }

        fn contains(&self, unique_id: &UniqueId) -> bool {
            self.unique.contains(unique_id)
        }
    }

    pub fn minutes(start: i64, finish: i64) -> Interval {
        Interval::between(
            start * MILLIS_PER_MINUTE,
            finish * MILLIS_PER_MINUTE,
            Granularity::MILLISECOND,
            CalendarZone::Utc,
        )
        .unwrap()
    }

    pub fn reading(id: &str, local: &str, minute: i64, value: f64) -> Proposition {
        Proposition::primitive_parameter(
            PropositionId::new(id),
            UniqueId::new(SourceId::new("test"), local),
            Value::Number(value),
            minutes(minute, minute),
        )
    }

    pub fn event(id: &str, local: &str, start: i64, finish: i64) -> Proposition {
        Proposition::event(PropositionId::new(id), UniqueId::new(SourceId::new("test"), local), minutes(start, finish))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use kairos_domain::{PairDefinition, Relation};

    #[test]
    fn test_is_a_index_is_transitive() {
        let lab = PropositionId::new("LAB");
        let glucose = PropositionId::new("GLUCOSE");
        let serum = PropositionId::new("GLUCOSE_SERUM");
        let lab_children = vec![glucose.clone()];
        let glucose_children = vec![serum.clone()];
        let index = IsAIndex::from_links(vec![
            (&lab, lab_children.as_slice()),
            (&glucose, glucose_children.as_slice()),
        ]);

        let ancestors: Vec<&PropositionId> = index.ancestors_of(&serum).collect();
        assert_eq!(ancestors, vec![&glucose, &lab]);
        assert_eq!(index.ancestors_of(&lab).count(), 0);
    }

    #[test]
    fn test_guard_drops_present_instances() {
        let definition = AbstractionDefinition::Pair(PairDefinition::new("AFTER", "A", "B", Relation::new()));
        let rule = CompiledRule::abstraction(definition, 1, 1);
        let mut facts = Facts::default().with(event("A", "a", 0, 1)).with(event("B", "b", 2, 3));

        let first = rule.activations(&facts).unwrap();
        assert_eq!(first.len(), 1);
        facts.insert(first[0].proposition.clone());
        assert!(rule.activations(&facts).unwrap().is_empty());
    }

    #[test]
    fn test_sorted_facts_are_chronological_and_deduplicated() {
        let facts = Facts::default()
            .with(event("A", "late", 10, 11))
            .with(event("A", "early", 0, 1))
            .with(event("B", "middle", 5, 6));
        let a = PropositionId::new("A");
        let b = PropositionId::new("B");
        let sorted = sorted_facts(&facts, [&a, &b, &a], |_| true);
        let locals: Vec<&str> = sorted.iter().map(|p| p.unique_id().local()).collect();
        assert_eq!(locals, vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_sorted_facts_count_is_a_copies_once() {
        let original = reading("GLUCOSE_SERUM", "g1", 0, 100.0);
        let copy = original.copy_as(&PropositionId::new("GLUCOSE"));
        let facts = Facts::default().with(original).with(copy).with(reading("GLUCOSE", "g2", 5, 110.0));

        let glucose = PropositionId::new("GLUCOSE");
        let serum = PropositionId::new("GLUCOSE_SERUM");
        let sorted = sorted_facts(&facts, [&glucose, &serum], |_| true);
        let roots: Vec<&str> = sorted.iter().map(|p| p.root().local()).collect();
        assert_eq!(roots, vec!["g1", "g2"]);
    }
}
