//! Provenance between source and derived propositions

use crate::proposition::UniqueId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Bipartite provenance map for one key
///
/// `forward` maps a source to what was derived from it; `backward` maps a
/// derived proposition to its sources. Both keep insertion order per entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationGraph {
    forward: BTreeMap<UniqueId, Vec<UniqueId>>,
    backward: BTreeMap<UniqueId, Vec<UniqueId>>,
}

impl DerivationGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `derived` was produced from `sources`
    ///
    /// Recording the same edge twice is a no-op.
    pub fn record(&mut self, derived: &UniqueId, sources: &[UniqueId]) {
        for source in sources {
            push_unique(self.forward.entry(source.clone()).or_default(), derived);
            push_unique(self.backward.entry(derived.clone()).or_default(), source);
        }
    }

    /// Propositions derived directly from `source`
    pub fn derived_from(&self, source: &UniqueId) -> &[UniqueId] {
        self.forward.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct sources of `derived`
    pub fn sources_of(&self, derived: &UniqueId) -> &[UniqueId] {
        self.backward.get(derived).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every proposition `derived` depends on, directly or not
    pub fn transitive_sources(&self, derived: &UniqueId) -> BTreeSet<UniqueId> {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<&UniqueId> = self.sources_of(derived).iter().collect();
        while let Some(next) = pending.pop() {
            if seen.insert(next.clone()) {
                pending.extend(self.sources_of(next));
            }
        }
        seen
    }

    /// Every proposition derived from `source`, directly or not
    pub fn transitive_derivations(&self, source: &UniqueId) -> BTreeSet<UniqueId> {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<&UniqueId> = self.derived_from(source).iter().collect();
        while let Some(next) = pending.pop() {
            if seen.insert(next.clone()) {
                pending.extend(self.derived_from(next));
            }
        }
        seen
    }

    /// Number of derived propositions with recorded sources
    pub fn len(&self) -> usize {
        self.backward.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.backward.is_empty()
    }

    /// Number of source-to-derived edges
    pub fn edge_count(&self) -> usize {
        self.backward.values().map(Vec::len).sum()
    }
}

fn push_unique(entries: &mut Vec<UniqueId>, id: &UniqueId) {
    if !entries.contains(id) {
        entries.push(id.clone());
    }
}
