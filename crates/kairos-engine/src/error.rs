//! Error types for key evaluation

use kairos_rules::CompileError;
use thiserror::Error;

/// Errors that can occur while compiling or evaluating
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Rule compilation failed as a whole
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// A classifier failed while evaluating a key; the key has no result
    #[error("Classifier error for key '{key}' in '{definition}': {message}")]
    Classifier {
        /// The key being evaluated
        key: String,
        /// The low-level definition whose classifier failed
        definition: String,
        /// The classifier's message
        message: String,
    },

    /// The data source could not be read
    #[error("Data source error: {0}")]
    DataSource(String),

    /// Evaluation was requested without a current rule set
    #[error("Engine not initialized: {0}")]
    NotInitialized(String),

    /// A key session was driven out of order
    #[error("Invalid session transition: {0}")]
    InvalidTransition(String),

    /// The firing limit for one key was reached before a fixed point
    #[error("Key '{key}' exceeded {limit} rule firings")]
    FiringLimit {
        /// The key being evaluated
        key: String,
        /// The configured limit
        limit: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker error (tokio runtime issues)
    #[error("Worker error: {0}")]
    Worker(String),
}
