//! Error types for definition resolution and rule compilation

use kairos_domain::{PropositionId, ValueType};
use thiserror::Error;

/// A problem with one definition, fatal for it and its dependents
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// No definition exists for a referenced id
    #[error("Unknown proposition '{id}'{}", referenced_suffix(.referenced_by))]
    UnknownProposition {
        /// The missing id
        id: PropositionId,
        /// The definition that referenced it, if any
        referenced_by: Option<PropositionId>,
    },

    /// A low-level definition reads something that is not a primitive parameter
    #[error("Invalid source '{source_id}' for '{id}': {reason}")]
    InvalidSource {
        /// The offending definition
        id: PropositionId,
        /// The source it cannot read
        source_id: PropositionId,
        /// Why the source is rejected
        reason: String,
    },

    /// Sources of a low-level definition disagree on their value type
    #[error("Inconsistent value types for '{id}': {expected:?} and {found:?}")]
    InconsistentValueType {
        /// The offending definition
        id: PropositionId,
        /// Type of the first source
        expected: ValueType,
        /// Type of a later source
        found: ValueType,
    },

    /// The definition is its own is-a ancestor
    #[error("Cycle through inverse_is_a at '{0}'")]
    IsACycle(PropositionId),

    /// The definition transitively depends on itself
    #[error("Dependency cycle at '{0}'")]
    DependencyCycle(PropositionId),

    /// Component indices or other structure are invalid
    #[error("Malformed definition '{id}': {reason}")]
    Malformed {
        /// The offending definition
        id: PropositionId,
        /// What is wrong
        reason: String,
    },

    /// Something the definition needs failed to compile
    #[error("Definition '{id}' depends on failed definition '{dependency}'")]
    DependencyFailed {
        /// The skipped definition
        id: PropositionId,
        /// The failed dependency
        dependency: PropositionId,
    },
}

fn referenced_suffix(referenced_by: &Option<PropositionId>) -> String {
    referenced_by
        .as_ref()
        .map(|r| format!(" (referenced by '{}')", r))
        .unwrap_or_default()
}

impl DefinitionError {
    /// The definition this error is fatal for
    pub fn definition_id(&self) -> &PropositionId {
        match self {
            DefinitionError::UnknownProposition { referenced_by: Some(id), .. } => id,
            DefinitionError::UnknownProposition { id, referenced_by: None } => id,
            DefinitionError::InvalidSource { id, .. }
            | DefinitionError::InconsistentValueType { id, .. }
            | DefinitionError::Malformed { id, .. }
            | DefinitionError::DependencyFailed { id, .. } => id,
            DefinitionError::IsACycle(id) | DefinitionError::DependencyCycle(id) => id,
        }
    }
}

/// Errors that abort a compilation as a whole
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The knowledge source could not be read
    #[error("Knowledge source error: {0}")]
    KnowledgeSource(String),

    /// Strict mode and at least one definition failed to resolve
    #[error("{} definition(s) failed to resolve; first: {}", .0.len(), .0.first().map(|e| e.to_string()).unwrap_or_default())]
    Definitions(Vec<DefinitionError>),
}
