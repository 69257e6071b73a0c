//! Memoised knowledge-source lookups

use crate::CompileError;
use kairos_domain::{Definition, KnowledgeSource, PropositionId};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

/// Cache of definitions read from a knowledge source
///
/// Not-found answers are cached too. The cache is only ever invalidated as a
/// whole.
#[derive(Debug, Default)]
pub struct DefinitionCache {
    entries: BTreeMap<PropositionId, Option<Arc<Definition>>>,
    lookups: u64,
    hits: u64,
}

impl DefinitionCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// The definition of `id`, reading the source on a miss
    pub fn get_or_load<K: KnowledgeSource>(
        &mut self,
        source: &K,
        id: &PropositionId,
    ) -> Result<Option<Arc<Definition>>, CompileError>
    where
        K::Error: Display,
    {
        self.lookups += 1;
        if let Some(entry) = self.entries.get(id) {
            self.hits += 1;
            return Ok(entry.clone());
        }

        let loaded = source
            .definition_for(id)
            .map_err(|e| CompileError::KnowledgeSource(format!("reading '{}': {}", id, e)))?
            .map(Arc::new);
        self.entries.insert(id.clone(), loaded.clone());
        Ok(loaded)
    }

    /// Drop every cached answer
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    /// Number of cached answers, found or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total lookups and how many were answered from the cache
    pub fn stats(&self) -> (u64, u64) {
        (self.lookups, self.hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryKnowledgeSource;
    use kairos_domain::{PropositionDefinition, ValueType};
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingSource {
        inner: InMemoryKnowledgeSource,
        reads: Cell<usize>,
    }

    impl KnowledgeSource for CountingSource {
        type Error = std::convert::Infallible;

        fn definition_for(&self, id: &PropositionId) -> Result<Option<Definition>, Self::Error> {
            self.reads.set(self.reads.get() + 1);
            self.inner.definition_for(id)
        }
    }

    struct BrokenSource;

    impl KnowledgeSource for BrokenSource {
        type Error = String;

        fn definition_for(&self, _id: &PropositionId) -> Result<Option<Definition>, Self::Error> {
            Err("connection refused".to_string())
        }
    }

    #[test]
    fn test_hits_and_misses_are_memoised() {
        let source = CountingSource {
            inner: InMemoryKnowledgeSource::new()
                .with_definition(PropositionDefinition::primitive_parameter("GLUCOSE", ValueType::Numerical)),
            reads: Cell::new(0),
        };
        let mut cache = DefinitionCache::new();
        let glucose = PropositionId::new("GLUCOSE");
        let missing = PropositionId::new("MISSING");

        assert!(cache.get_or_load(&source, &glucose).unwrap().is_some());
        assert!(cache.get_or_load(&source, &glucose).unwrap().is_some());
        assert!(cache.get_or_load(&source, &missing).unwrap().is_none());
        assert!(cache.get_or_load(&source, &missing).unwrap().is_none());

        assert_eq!(source.reads.get(), 2);
        assert_eq!(cache.stats(), (4, 2));
        assert_eq!(cache.len(), 2);

        cache.invalidate();
        assert!(cache.is_empty());
        cache.get_or_load(&source, &glucose).unwrap();
        assert_eq!(source.reads.get(), 3);
    }

    #[test]
    fn test_source_errors_are_reported() {
        let mut cache = DefinitionCache::new();
        let err = cache.get_or_load(&BrokenSource, &PropositionId::new("X")).unwrap_err();
        assert!(matches!(err, CompileError::KnowledgeSource(ref msg) if msg.contains("connection refused")));
        assert!(cache.is_empty());
    }
}
