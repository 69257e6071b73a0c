//! Kairos Domain Layer
//!
//! This crate contains the temporal value model and the declarative pieces of
//! the Kairos temporal abstraction engine. It does no I/O and defines the
//! trait interfaces that the rule and engine layers depend upon.
//!
//! ## Key Concepts
//!
//! - **Granularity / Unit**: calendar-aware ticks and signed durations
//! - **Interval**: a time span with bounded uncertainty on start and finish
//! - **Relation**: a declarative temporal constraint between two intervals
//! - **Proposition**: a typed fact with identity and optional temporal extent
//! - **Abstraction definition**: a pattern describing how to derive facts
//! - **Derivation graph**: provenance between source and derived facts
//!
//! ## Calendar arithmetic
//!
//! Absolute timestamps are epoch milliseconds interpreted in an explicit
//! [`CalendarZone`]. Days follow the local calendar, so a day across the
//! spring-forward transition lasts 23 hours; months and years step calendar
//! fields with end-of-month clamping.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod calendar;
pub mod classifier;
pub mod definition;
pub mod derivation;
mod error;
pub mod granularity;
pub mod interval;
pub mod proposition;
pub mod relation;
pub mod traits;
pub mod value;

// Re-exports for convenience
pub use calendar::CalendarZone;
pub use classifier::{ThresholdBand, ThresholdClassifier, ThresholdLimit, Trend, TrendClassifier};
pub use definition::{
    AbstractionDefinition, AbstractionKind, ClassificationId, Classifier, ComponentRelation, Definition, GapFunction,
    HighLevelDefinition, LowLevelDefinition, OffsetAnchor, PairDefinition, PrimitiveKind, PropertyConstraint,
    PropositionDefinition, SliceDefinition, SliceOrder, TemporalExtendedPropositionDefinition, TemporalPatternOffset,
};
pub use derivation::DerivationGraph;
pub use error::{ClassifierError, DomainError};
pub use granularity::{AbsoluteUnit, Granularity, RelativeUnit, TimeSystem, Unit};
pub use interval::{Bounds, Interval, Side};
pub use proposition::{KeyId, Proposition, PropositionId, PropositionKind, SourceId, UniqueId};
pub use relation::{Bound, DistanceConstraint, Endpoints, Relation};
pub use traits::{DataSource, KnowledgeSource};
pub use value::{InequalityComparator, Value, ValueComparator, ValueConstraint, ValueType};
