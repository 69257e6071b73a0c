//! Trait definitions for external collaborators
//!
//! These traits define the boundaries between the temporal abstraction core
//! and whatever supplies definitions and data. Backends live outside the
//! core crates; in-memory implementations are provided for tests and
//! embedding.

use crate::definition::Definition;
use crate::proposition::{KeyId, Proposition, PropositionId};

/// Trait for looking up proposition and abstraction definitions
///
/// Implemented by knowledge-base adapters (and `kairos-rules`'
/// `InMemoryKnowledgeSource`).
pub trait KnowledgeSource {
    /// Error type for lookups
    type Error;

    /// Definition of an id, or `None` when the id is unknown
    fn definition_for(&self, id: &PropositionId) -> Result<Option<Definition>, Self::Error>;
}

/// Trait for reading primitive propositions per key
///
/// Implemented by data adapters (and `kairos-engine`'s `InMemoryDataSource`).
pub trait DataSource {
    /// Error type for reads
    type Error;

    /// Every key with data
    fn keys(&self) -> Result<Vec<KeyId>, Self::Error>;

    /// Primitive propositions of one key
    fn propositions_for(&self, key: &KeyId) -> Result<Vec<Proposition>, Self::Error>;
}
