//! Proposition module - the typed facts the engine reasons over
//!
//! A proposition is identified by the pair of its [`PropositionId`] (what kind
//! of fact it is) and its [`UniqueId`] (which concrete fact it is). Facts from
//! a data source carry the source's own unique ids; facts produced by the
//! engine get content-addressed ids so that deriving the same thing twice
//! yields the same identity.

use crate::definition::AbstractionKind;
use crate::interval::Interval;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Namespace for name-based derived unique ids
const DERIVED_NAMESPACE: uuid::Uuid = uuid::Uuid::from_u128(0x6b61_6972_6f73_4d00_8000_0000_0000_0001);

/// Identifier of a kind of proposition, e.g. `GLUCOSE` or `HYPERGLYCEMIA`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropositionId(String);

impl PropositionId {
    /// Create a new proposition id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PropositionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Tag naming the system a proposition came from
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Tag used for propositions created by the engine
    pub const DERIVED: &'static str = "derived";

    /// Create a new source tag
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The tag for engine-derived propositions
    pub fn derived() -> Self {
        Self::new(Self::DERIVED)
    }

    /// Whether this is the engine's own tag
    pub fn is_derived(&self) -> bool {
        self.0 == Self::DERIVED
    }

    /// The tag as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one concrete proposition
///
/// # Examples
///
/// ```
/// use kairos_domain::{PropositionId, SourceId, UniqueId};
///
/// let a = UniqueId::new(SourceId::new("lab"), "row-1");
/// let b = UniqueId::new(SourceId::new("lab"), "row-2");
/// let high = PropositionId::new("HIGH_GLUCOSE");
///
/// // Deriving from the same tuple always gives the same identity
/// assert_eq!(
///     UniqueId::derived("low_level", &high, &[a.clone(), b.clone()]),
///     UniqueId::derived("low_level", &high, &[a.clone(), b.clone()]),
/// );
/// assert_ne!(
///     UniqueId::derived("low_level", &high, &[a.clone(), b.clone()]),
///     UniqueId::derived("low_level", &high, &[b, a]),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UniqueId {
    source: SourceId,
    local: String,
}

impl UniqueId {
    /// Create a unique id local to a source system
    pub fn new(source: SourceId, local: impl Into<String>) -> Self {
        Self { source, local: local.into() }
    }

    /// Content-addressed id for a proposition derived by a rule
    ///
    /// Hashes the origin tag, the produced definition id and the ordered
    /// source tuple into a name-based UUID.
    pub fn derived(origin: &str, definition: &PropositionId, sources: &[UniqueId]) -> Self {
        let mut name = Vec::with_capacity(64 + sources.len() * 32);
        name.extend_from_slice(origin.as_bytes());
        name.push(0x1f);
        name.extend_from_slice(definition.as_str().as_bytes());
        for source in sources {
            name.push(0x1e);
            name.extend_from_slice(source.source.as_str().as_bytes());
            name.push(0x1f);
            name.extend_from_slice(source.local.as_bytes());
        }
        let uuid = uuid::Uuid::new_v5(&DERIVED_NAMESPACE, &name);
        Self::new(SourceId::derived(), uuid.to_string())
    }

    /// The source system tag
    pub fn source(&self) -> &SourceId {
        &self.source
    }

    /// The id within the source system
    pub fn local(&self) -> &str {
        &self.local
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.local)
    }
}

/// Identifier of a tracked entity (e.g. a patient)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Create a new key id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for KeyId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The four kinds of proposition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropositionKind {
    /// A timestamped measurement
    PrimitiveParameter {
        /// Measured value
        value: Value,
        /// Interval of the timestamp at its granularity
        interval: Interval,
    },

    /// Something that happened over an interval
    Event {
        /// When it happened
        interval: Interval,
    },

    /// A fact without temporal extent
    Constant,

    /// An instance produced by an abstraction definition
    Abstraction {
        /// Classification or other value, if any
        value: Option<Value>,
        /// Interval covered by the instance
        interval: Interval,
        /// Kind of definition that produced it
        origin: AbstractionKind,
        /// Unique ids of the propositions it was derived from
        derived_from: Vec<UniqueId>,
    },
}

/// A fact with identity and optional temporal extent
///
/// Propositions are immutable once created; `with_*` builders consume and
/// return a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposition {
    id: PropositionId,
    unique_id: UniqueId,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    references: BTreeMap<String, Vec<UniqueId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    copy_of: Option<UniqueId>,
    #[serde(flatten)]
    kind: PropositionKind,
}

impl Proposition {
    fn with_kind(id: PropositionId, unique_id: UniqueId, kind: PropositionKind) -> Self {
        Self {
            id,
            unique_id,
            properties: BTreeMap::new(),
            references: BTreeMap::new(),
            copy_of: None,
            kind,
        }
    }

    /// A timestamped measurement
    pub fn primitive_parameter(id: PropositionId, unique_id: UniqueId, value: Value, interval: Interval) -> Self {
        Self::with_kind(id, unique_id, PropositionKind::PrimitiveParameter { value, interval })
    }

    /// An event over an interval
    pub fn event(id: PropositionId, unique_id: UniqueId, interval: Interval) -> Self {
        Self::with_kind(id, unique_id, PropositionKind::Event { interval })
    }

    /// A fact without temporal extent
    pub fn constant(id: PropositionId, unique_id: UniqueId) -> Self {
        Self::with_kind(id, unique_id, PropositionKind::Constant)
    }

    /// An abstraction instance
    pub fn abstraction(
        id: PropositionId,
        unique_id: UniqueId,
        value: Option<Value>,
        interval: Interval,
        origin: AbstractionKind,
        derived_from: Vec<UniqueId>,
    ) -> Self {
        Self::with_kind(
            id,
            unique_id,
            PropositionKind::Abstraction { value, interval, origin, derived_from },
        )
    }

    /// Copy this fact as an instance of an ancestor proposition id
    ///
    /// The copy's unique id is derived from the ancestor and the original
    /// (non-copied) fact, so copying along different is-a paths converges on
    /// one identity.
    pub fn copy_as(&self, ancestor: &PropositionId) -> Self {
        let root = self.root().clone();
        Self {
            id: ancestor.clone(),
            unique_id: UniqueId::derived("is_a", ancestor, std::slice::from_ref(&root)),
            properties: self.properties.clone(),
            references: self.references.clone(),
            copy_of: Some(root),
            kind: self.kind.clone(),
        }
    }

    /// Add a property
    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Add a reference to another proposition
    pub fn with_reference(mut self, name: impl Into<String>, target: UniqueId) -> Self {
        self.references.entry(name.into()).or_default().push(target);
        self
    }

    /// The proposition id
    pub fn id(&self) -> &PropositionId {
        &self.id
    }

    /// The unique id
    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    /// The source system tag
    pub fn source(&self) -> &SourceId {
        self.unique_id.source()
    }

    /// The fact this was copied from along an is-a link, if any
    pub fn copy_of(&self) -> Option<&UniqueId> {
        self.copy_of.as_ref()
    }

    /// The original fact behind any chain of is-a copies
    pub fn root(&self) -> &UniqueId {
        self.copy_of.as_ref().unwrap_or(&self.unique_id)
    }

    /// The variant data
    pub fn kind(&self) -> &PropositionKind {
        &self.kind
    }

    /// Interval for temporal propositions
    pub fn interval(&self) -> Option<&Interval> {
        match &self.kind {
            PropositionKind::PrimitiveParameter { interval, .. }
            | PropositionKind::Event { interval }
            | PropositionKind::Abstraction { interval, .. } => Some(interval),
            PropositionKind::Constant => None,
        }
    }

    /// Value of parameters and valued abstractions
    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            PropositionKind::PrimitiveParameter { value, .. } => Some(value),
            PropositionKind::Abstraction { value, .. } => value.as_ref(),
            _ => None,
        }
    }

    /// Unique ids this abstraction was derived from (empty otherwise)
    pub fn derived_from(&self) -> &[UniqueId] {
        match &self.kind {
            PropositionKind::Abstraction { derived_from, .. } => derived_from,
            _ => &[],
        }
    }

    /// A named property
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// All properties
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Targets of a named reference
    pub fn references(&self, name: &str) -> &[UniqueId] {
        self.references.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether this is a primitive parameter
    pub fn is_primitive_parameter(&self) -> bool {
        matches!(self.kind, PropositionKind::PrimitiveParameter { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CalendarZone, Granularity};

    fn lab(local: &str) -> UniqueId {
        UniqueId::new(SourceId::new("lab"), local)
    }

    fn glucose(local: &str, value: f64) -> Proposition {
        let interval = Interval::at(1_167_613_200_000, Granularity::MINUTE, CalendarZone::Utc).unwrap();
        Proposition::primitive_parameter(PropositionId::new("GLUCOSE_SERUM"), lab(local), Value::Number(value), interval)
    }

    #[test]
    fn test_derived_ids_are_content_addressed() {
        let definition = PropositionId::new("HIGH");
        let first = UniqueId::derived("low_level", &definition, &[lab("1"), lab("2")]);
        assert_eq!(first, UniqueId::derived("low_level", &definition, &[lab("1"), lab("2")]));
        assert_ne!(first, UniqueId::derived("low_level", &definition, &[lab("1")]));
        assert_ne!(first, UniqueId::derived("pair", &definition, &[lab("1"), lab("2")]));
        assert_ne!(first, UniqueId::derived("low_level", &PropositionId::new("LOW"), &[lab("1"), lab("2")]));
        assert!(first.source().is_derived());
    }

    #[test]
    fn test_tuple_boundaries_are_unambiguous() {
        let definition = PropositionId::new("X");
        let joined = UniqueId::new(SourceId::new("a"), "bc");
        let split = UniqueId::new(SourceId::new("ab"), "c");
        assert_ne!(
            UniqueId::derived("pair", &definition, &[joined]),
            UniqueId::derived("pair", &definition, &[split])
        );
    }

    #[test]
    fn test_accessors() {
        let p = glucose("1", 120.0).with_property("unit", "mg/dL".into());
        assert_eq!(p.value(), Some(&Value::Number(120.0)));
        assert!(p.interval().is_some());
        assert!(p.is_primitive_parameter());
        assert_eq!(p.property("unit"), Some(&Value::from("mg/dL")));
        assert!(p.derived_from().is_empty());
        assert_eq!(p.source().as_str(), "lab");

        let constant = Proposition::constant(PropositionId::new("SEX"), lab("c"));
        assert!(constant.interval().is_none());
        assert!(constant.value().is_none());
    }

    #[test]
    fn test_copies_converge_on_one_identity() {
        let original = glucose("1", 120.0);
        let glucose_any = PropositionId::new("GLUCOSE");
        let lab_result = PropositionId::new("LAB_RESULT");

        let direct = original.copy_as(&lab_result);
        let via_parent = original.copy_as(&glucose_any).copy_as(&lab_result);
        assert_eq!(direct.unique_id(), via_parent.unique_id());
        assert_eq!(via_parent.root(), original.unique_id());
        assert_eq!(via_parent.value(), original.value());
        assert_eq!(via_parent.id(), &lab_result);
    }

    #[test]
    fn test_references() {
        let target = lab("encounter-1");
        let p = glucose("1", 90.0).with_reference("encounter", target.clone());
        assert_eq!(p.references("encounter"), &[target]);
        assert!(p.references("missing").is_empty());
    }

    #[test]
    fn test_serde_roundtrip() {
        let p = glucose("1", 95.0).with_property("unit", "mg/dL".into());
        let json = serde_json::to_string(&p).unwrap();
        let back: Proposition = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
