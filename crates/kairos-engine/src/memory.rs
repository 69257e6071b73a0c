//! Per-key working memory indexed by proposition id

use kairos_domain::{Proposition, PropositionId, UniqueId};
use kairos_rules::FactIndex;
use std::collections::{BTreeMap, BTreeSet};

/// Facts of one key
///
/// Facts are only ever added. Every insertion advances a logical clock and
/// stamps the fact's proposition id with it, so a rule can tell whether any
/// of its inputs changed since it was last evaluated.
#[derive(Debug, Clone, Default)]
pub struct WorkingMemory {
    by_id: BTreeMap<PropositionId, Vec<Proposition>>,
    unique: BTreeSet<UniqueId>,
    versions: BTreeMap<PropositionId, u64>,
    clock: u64,
}

impl WorkingMemory {
    /// Create an empty working memory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fact; returns false when its unique id is already present
    pub fn insert(&mut self, proposition: Proposition) -> bool {
        if !self.unique.insert(proposition.unique_id().clone()) {
            return false;
        }
        self.clock += 1;
        self.versions.insert(proposition.id().clone(), self.clock);
        self.by_id.entry(proposition.id().clone()).or_default().push(proposition);
        true
    }

    /// Clock value of the last insertion for an id, 0 if none
    pub fn version(&self, id: &PropositionId) -> u64 {
        self.versions.get(id).copied().unwrap_or(0)
    }

    /// Clock value of the last insertion overall
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Whether any of `ids` changed after clock value `since`
    pub fn changed_since(&self, ids: &[PropositionId], since: u64) -> bool {
        ids.iter().any(|id| self.version(id) > since)
    }

    /// Number of facts
    pub fn len(&self) -> usize {
        self.unique.len()
    }

    /// Whether there are no facts
    pub fn is_empty(&self) -> bool {
        self.unique.is_empty()
    }

    /// Every fact, grouped by proposition id in id order
    pub fn iter(&self) -> impl Iterator<Item = &Proposition> {
        self.by_id.values().flatten()
    }

    /// Consume into every fact, grouped by proposition id
    pub fn into_propositions(self) -> Vec<Proposition> {
        self.by_id.into_values().flatten().collect()
    }
}

impl FactIndex for WorkingMemory {
    fn facts_for(&self, id: &PropositionId) -> &[Proposition] {
        self.by_id.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn contains(&self, unique_id: &UniqueId) -> bool {
        self.unique.contains(unique_id)
    }
}
