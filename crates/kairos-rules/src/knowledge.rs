//! In-memory knowledge source

use kairos_domain::{Definition, KnowledgeSource, PropositionId};
use std::collections::BTreeMap;
use std::convert::Infallible;

/// Knowledge source backed by a map of definitions
///
/// # Examples
///
/// ```
/// use kairos_domain::{KnowledgeSource, PropositionDefinition, PropositionId, ValueType};
/// use kairos_rules::InMemoryKnowledgeSource;
///
/// let knowledge = InMemoryKnowledgeSource::new()
///     .with_definition(PropositionDefinition::primitive_parameter("GLUCOSE", ValueType::Numerical));
///
/// assert!(knowledge.definition_for(&PropositionId::new("GLUCOSE")).unwrap().is_some());
/// assert!(knowledge.definition_for(&PropositionId::new("HBA1C")).unwrap().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryKnowledgeSource {
    definitions: BTreeMap<PropositionId, Definition>,
}

impl InMemoryKnowledgeSource {
    /// Create an empty knowledge source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition, replacing any previous one with the same id
    pub fn with_definition(mut self, definition: impl Into<Definition>) -> Self {
        self.insert(definition);
        self
    }

    /// Add a definition, returning the one it replaced
    pub fn insert(&mut self, definition: impl Into<Definition>) -> Option<Definition> {
        let definition = definition.into();
        self.definitions.insert(definition.id().clone(), definition)
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether there are no definitions
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Every defined id
    pub fn ids(&self) -> impl Iterator<Item = &PropositionId> {
        self.definitions.keys()
    }
}

impl KnowledgeSource for InMemoryKnowledgeSource {
    type Error = Infallible;

    fn definition_for(&self, id: &PropositionId) -> Result<Option<Definition>, Self::Error> {
        Ok(self.definitions.get(id).cloned())
    }
}
