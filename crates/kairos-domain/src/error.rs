//! Error types for the domain layer

use thiserror::Error;

/// Errors raised while building domain values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Interval bounds violate the ordering invariants
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    /// A timestamp or offset fell outside the representable calendar
    #[error("Calendar overflow: {0}")]
    CalendarOverflow(String),
}

/// Errors raised by value-classification plug-ins
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    /// The classifier cannot interpret a value in its window
    #[error("Classifier '{classifier}' cannot classify value {value}")]
    UnsupportedValue {
        /// Name of the classifier
        classifier: String,
        /// Rendering of the offending value
        value: String,
    },

    /// Any other plug-in failure
    #[error("Classifier '{classifier}' failed: {message}")]
    Failed {
        /// Name of the classifier
        classifier: String,
        /// Failure description
        message: String,
    },
}
