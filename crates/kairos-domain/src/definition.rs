//! Abstraction definitions and proposition definitions
//!
//! Definitions are the read-only inputs of the rule compiler. An
//! [`AbstractionDefinition`] describes how to derive new propositions from
//! existing ones; a [`PropositionDefinition`] describes a proposition id that
//! a data source supplies. Both may name `inverse_is_a` children whose
//! instances also count as instances of the parent.

use crate::interval::{Interval, Side};
use crate::proposition::{Proposition, PropositionId};
use crate::relation::{Bound, Endpoints, Relation};
use crate::value::{Value, ValueConstraint, ValueType};
use crate::ClassifierError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The four kinds of abstraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstractionKind {
    /// Runs of classified primitive values
    LowLevel,
    /// N-ary temporal pattern over components
    HighLevel,
    /// Left/right sequential pair
    Pair,
    /// Index range over sorted sources
    Slice,
}

impl AbstractionKind {
    /// Short tag used in derived unique ids and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            AbstractionKind::LowLevel => "low_level",
            AbstractionKind::HighLevel => "high_level",
            AbstractionKind::Pair => "pair",
            AbstractionKind::Slice => "slice",
        }
    }
}

impl fmt::Display for AbstractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constraint on a named property of a candidate proposition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyConstraint {
    /// Property name
    pub name: String,
    /// Constraint on its value
    pub constraint: ValueConstraint,
}

impl PropertyConstraint {
    /// Create a new property constraint
    pub fn new(name: impl Into<String>, constraint: ValueConstraint) -> Self {
        Self { name: name.into(), constraint }
    }

    /// Missing properties never match
    pub fn matches(&self, proposition: &Proposition) -> bool {
        proposition
            .property(&self.name)
            .is_some_and(|value| self.constraint.matches(value))
    }
}

/// Match predicate on a temporal proposition
///
/// # Examples
///
/// ```
/// use kairos_domain::{Bound, TemporalExtendedPropositionDefinition, Unit, Value, ValueConstraint};
///
/// let long_high = TemporalExtendedPropositionDefinition::new("GLUCOSE_STATE")
///     .with_value(ValueConstraint::equal_to(Value::from("HIGH")))
///     .with_min_length(Bound::new(2, Unit::HOUR));
/// assert_eq!(long_high.proposition_id().as_str(), "GLUCOSE_STATE");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalExtendedPropositionDefinition {
    proposition_id: PropositionId,
    #[serde(default)]
    value: Option<ValueConstraint>,
    #[serde(default)]
    min_length: Option<Bound>,
    #[serde(default)]
    max_length: Option<Bound>,
    #[serde(default)]
    properties: Vec<PropertyConstraint>,
}

impl TemporalExtendedPropositionDefinition {
    /// Match any instance of a proposition id
    pub fn new(proposition_id: impl Into<PropositionId>) -> Self {
        Self {
            proposition_id: proposition_id.into(),
            value: None,
            min_length: None,
            max_length: None,
            properties: Vec::new(),
        }
    }

    /// Require the value to satisfy a constraint
    pub fn with_value(mut self, constraint: ValueConstraint) -> Self {
        self.value = Some(constraint);
        self
    }

    /// Require the interval to be able to last at least this long
    pub fn with_min_length(mut self, bound: Bound) -> Self {
        self.min_length = Some(bound);
        self
    }

    /// Require the interval to be able to last at most this long
    pub fn with_max_length(mut self, bound: Bound) -> Self {
        self.max_length = Some(bound);
        self
    }

    /// Require a property to satisfy a constraint
    pub fn with_property(mut self, constraint: PropertyConstraint) -> Self {
        self.properties.push(constraint);
        self
    }

    /// The matched proposition id
    pub fn proposition_id(&self) -> &PropositionId {
        &self.proposition_id
    }

    /// Whether a proposition satisfies every part of the predicate
    pub fn matches(&self, proposition: &Proposition) -> bool {
        if proposition.id() != &self.proposition_id {
            return false;
        }
        if let Some(constraint) = &self.value {
            if !proposition.value().is_some_and(|v| constraint.matches(v)) {
                return false;
            }
        }
        if self.min_length.is_some() || self.max_length.is_some() {
            let Some(interval) = proposition.interval() else {
                return false;
            };
            if !length_within(interval, self.min_length, self.max_length) {
                return false;
            }
        }
        self.properties.iter().all(|p| p.matches(proposition))
    }
}

impl From<&str> for TemporalExtendedPropositionDefinition {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

fn length_within(interval: &Interval, min: Option<Bound>, max: Option<Bound>) -> bool {
    min.is_none_or(|b| interval.is_at_least(b.count, b.unit)) && max.is_none_or(|b| interval.is_at_most(b.count, b.unit))
}

/// Policy bounding the gap between consecutive values of one low-level run
///
/// The gap is measured from one value's finish to the next value's start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GapFunction {
    /// Any gap is allowed
    #[default]
    Unbounded,
    /// The gap must lie within the given bounds (inclusive)
    Bounded {
        /// Smallest allowed gap
        min_gap: Option<Bound>,
        /// Largest allowed gap
        max_gap: Option<Bound>,
    },
}

impl GapFunction {
    /// At most `bound` between values
    pub fn max_gap(bound: Bound) -> Self {
        GapFunction::Bounded { min_gap: None, max_gap: Some(bound) }
    }

    /// Whether `second` may follow `first` in one run
    pub fn allows(&self, first: &Interval, second: &Interval) -> bool {
        match self {
            GapFunction::Unbounded => true,
            GapFunction::Bounded { min_gap, max_gap } => Relation::new()
                .between(Endpoints::FinishStart, *min_gap, *max_gap)
                .has_relation(first, second),
        }
    }
}

/// Label produced by a classifier for a window of values
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationId(String);

impl ClassificationId {
    /// Create a new classification id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClassificationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for ClassificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Plug-in deciding the classification of a window of values
///
/// Returning `Ok(None)` means the window does not classify; an error aborts
/// evaluation of the key it happened on.
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Classify a window of consecutive values
    fn classify(&self, window: &[&Value]) -> Result<Option<ClassificationId>, ClassifierError>;
}

/// Abstraction over runs of classified primitive values
#[derive(Debug, Clone)]
pub struct LowLevelDefinition {
    id: PropositionId,
    display_name: String,
    sources: Vec<PropositionId>,
    classifier: Arc<dyn Classifier>,
    gap: GapFunction,
    min_values: usize,
    max_values: Option<usize>,
    min_duration: Option<Bound>,
    max_duration: Option<Bound>,
    inverse_is_a: Vec<PropositionId>,
}

impl LowLevelDefinition {
    /// Create a definition with one value per window and no gap limit
    pub fn new(id: impl Into<PropositionId>, classifier: Arc<dyn Classifier>) -> Self {
        let id = id.into();
        Self {
            display_name: id.to_string(),
            id,
            sources: Vec::new(),
            classifier,
            gap: GapFunction::Unbounded,
            min_values: 1,
            max_values: None,
            min_duration: None,
            max_duration: None,
            inverse_is_a: Vec::new(),
        }
    }

    /// Add a primitive parameter source
    pub fn with_source(mut self, source: impl Into<PropositionId>) -> Self {
        self.sources.push(source.into());
        self
    }

    /// Set the gap function
    pub fn with_gap(mut self, gap: GapFunction) -> Self {
        self.gap = gap;
        self
    }

    /// Window width and minimum run length (at least 1)
    pub fn with_min_values(mut self, min_values: usize) -> Self {
        self.min_values = min_values.max(1);
        self
    }

    /// Runs reaching this many values are closed
    pub fn with_max_values(mut self, max_values: usize) -> Self {
        self.max_values = Some(max_values);
        self
    }

    /// Constrain the duration of emitted runs
    pub fn with_duration(mut self, min: Option<Bound>, max: Option<Bound>) -> Self {
        self.min_duration = min;
        self.max_duration = max;
        self
    }

    /// Human-readable name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Add an is-a child
    pub fn with_inverse_is_a(mut self, child: impl Into<PropositionId>) -> Self {
        self.inverse_is_a.push(child.into());
        self
    }

    /// The defined proposition id
    pub fn id(&self) -> &PropositionId {
        &self.id
    }

    /// Human-readable name
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Primitive parameter sources
    pub fn sources(&self) -> &[PropositionId] {
        &self.sources
    }

    /// The classifier plug-in
    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    /// The gap function
    pub fn gap(&self) -> &GapFunction {
        &self.gap
    }

    /// Window width and minimum run length
    pub fn min_values(&self) -> usize {
        self.min_values
    }

    /// Maximum run length
    pub fn max_values(&self) -> Option<usize> {
        self.max_values
    }

    /// Whether a run's interval satisfies the duration constraint
    pub fn duration_allows(&self, interval: &Interval) -> bool {
        length_within(interval, self.min_duration, self.max_duration)
    }
}

/// A declared relation between two components of a high-level definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRelation {
    /// Index of the first component
    pub first: usize,
    /// Index of the second component
    pub second: usize,
    /// Relation that must hold from first to second
    pub relation: Relation,
}

/// One end of a derived interval, anchored on a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetAnchor {
    /// Index of the anchoring component
    pub component: usize,
    /// Which end of the component
    pub side: Side,
    /// Signed shift applied to the anchor
    #[serde(default)]
    pub shift: Option<Bound>,
}

impl OffsetAnchor {
    /// Anchor without a shift
    pub fn new(component: usize, side: Side) -> Self {
        Self { component, side, shift: None }
    }

    /// Shift the anchor by a signed count of a unit
    pub fn shifted(mut self, shift: Bound) -> Self {
        self.shift = Some(shift);
        self
    }
}

/// How a high-level instance's interval is computed from its components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalPatternOffset {
    /// Anchor of the start
    pub start: OffsetAnchor,
    /// Anchor of the finish
    pub finish: OffsetAnchor,
}

/// N-ary temporal pattern over components
#[derive(Debug, Clone, PartialEq)]
pub struct HighLevelDefinition {
    id: PropositionId,
    display_name: String,
    components: Vec<TemporalExtendedPropositionDefinition>,
    relations: Vec<ComponentRelation>,
    offset: Option<TemporalPatternOffset>,
    inverse_is_a: Vec<PropositionId>,
}

impl HighLevelDefinition {
    /// Create an empty pattern
    pub fn new(id: impl Into<PropositionId>) -> Self {
        let id = id.into();
        Self {
            display_name: id.to_string(),
            id,
            components: Vec::new(),
            relations: Vec::new(),
            offset: None,
            inverse_is_a: Vec::new(),
        }
    }

    /// Add a component; its index is its position
    pub fn with_component(mut self, component: impl Into<TemporalExtendedPropositionDefinition>) -> Self {
        self.components.push(component.into());
        self
    }

    /// Require a relation between two components
    pub fn with_relation(mut self, first: usize, second: usize, relation: Relation) -> Self {
        self.relations.push(ComponentRelation { first, second, relation });
        self
    }

    /// Compute instance intervals from anchors instead of the component span
    pub fn with_offset(mut self, offset: TemporalPatternOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Human-readable name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Add an is-a child
    pub fn with_inverse_is_a(mut self, child: impl Into<PropositionId>) -> Self {
        self.inverse_is_a.push(child.into());
        self
    }

    /// The defined proposition id
    pub fn id(&self) -> &PropositionId {
        &self.id
    }

    /// Human-readable name
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Components in index order
    pub fn components(&self) -> &[TemporalExtendedPropositionDefinition] {
        &self.components
    }

    /// Declared relations
    pub fn relations(&self) -> &[ComponentRelation] {
        &self.relations
    }

    /// Interval offset, if configured
    pub fn offset(&self) -> Option<&TemporalPatternOffset> {
        self.offset.as_ref()
    }
}

/// Left/right sequential pair
#[derive(Debug, Clone, PartialEq)]
pub struct PairDefinition {
    id: PropositionId,
    display_name: String,
    left: TemporalExtendedPropositionDefinition,
    right: TemporalExtendedPropositionDefinition,
    relation: Relation,
    second_required: bool,
    inverse_is_a: Vec<PropositionId>,
}

impl PairDefinition {
    /// Pair each left with a right satisfying the relation
    pub fn new(
        id: impl Into<PropositionId>,
        left: impl Into<TemporalExtendedPropositionDefinition>,
        right: impl Into<TemporalExtendedPropositionDefinition>,
        relation: Relation,
    ) -> Self {
        let id = id.into();
        Self {
            display_name: id.to_string(),
            id,
            left: left.into(),
            right: right.into(),
            relation,
            second_required: true,
            inverse_is_a: Vec::new(),
        }
    }

    /// Let a lone left produce a partial instance
    pub fn with_second_optional(mut self) -> Self {
        self.second_required = false;
        self
    }

    /// Human-readable name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Add an is-a child
    pub fn with_inverse_is_a(mut self, child: impl Into<PropositionId>) -> Self {
        self.inverse_is_a.push(child.into());
        self
    }

    /// The defined proposition id
    pub fn id(&self) -> &PropositionId {
        &self.id
    }

    /// Human-readable name
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The left predicate
    pub fn left(&self) -> &TemporalExtendedPropositionDefinition {
        &self.left
    }

    /// The right predicate
    pub fn right(&self) -> &TemporalExtendedPropositionDefinition {
        &self.right
    }

    /// Relation from left to right
    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    /// Whether a left needs a right to produce an instance
    pub fn second_required(&self) -> bool {
        self.second_required
    }
}

/// Sort direction of a slice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceOrder {
    /// Earliest first
    #[default]
    Ascending,
    /// Latest first
    Descending,
}

/// Index range over chronologically sorted sources
///
/// `min_index` is inclusive and `max_index` exclusive; negative indices count
/// from the end.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceDefinition {
    id: PropositionId,
    display_name: String,
    sources: Vec<TemporalExtendedPropositionDefinition>,
    min_index: i64,
    max_index: Option<i64>,
    order: SliceOrder,
    merged_interval: bool,
    inverse_is_a: Vec<PropositionId>,
}

impl SliceDefinition {
    /// Keep every source instance
    pub fn new(id: impl Into<PropositionId>) -> Self {
        let id = id.into();
        Self {
            display_name: id.to_string(),
            id,
            sources: Vec::new(),
            min_index: 0,
            max_index: None,
            order: SliceOrder::Ascending,
            merged_interval: false,
            inverse_is_a: Vec::new(),
        }
    }

    /// Add a source predicate
    pub fn with_source(mut self, source: impl Into<TemporalExtendedPropositionDefinition>) -> Self {
        self.sources.push(source.into());
        self
    }

    /// Keep `[min_index, max_index)`; `None` means to the end
    pub fn with_range(mut self, min_index: i64, max_index: Option<i64>) -> Self {
        self.min_index = min_index;
        self.max_index = max_index;
        self
    }

    /// Set the sort direction
    pub fn with_order(mut self, order: SliceOrder) -> Self {
        self.order = order;
        self
    }

    /// Emit one instance spanning the kept group
    pub fn with_merged_interval(mut self) -> Self {
        self.merged_interval = true;
        self
    }

    /// Human-readable name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Add an is-a child
    pub fn with_inverse_is_a(mut self, child: impl Into<PropositionId>) -> Self {
        self.inverse_is_a.push(child.into());
        self
    }

    /// The defined proposition id
    pub fn id(&self) -> &PropositionId {
        &self.id
    }

    /// Human-readable name
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Source predicates
    pub fn sources(&self) -> &[TemporalExtendedPropositionDefinition] {
        &self.sources
    }

    /// Sort direction
    pub fn order(&self) -> SliceOrder {
        self.order
    }

    /// Whether the kept group is merged into one instance
    pub fn merged_interval(&self) -> bool {
        self.merged_interval
    }

    /// The kept index range `[start, end)` for `len` sorted elements
    ///
    /// # Examples
    ///
    /// ```
    /// use kairos_domain::SliceDefinition;
    ///
    /// let last_two = SliceDefinition::new("LAST_TWO").with_range(-2, None);
    /// assert_eq!(last_two.resolve_range(5), 3..5);
    /// assert_eq!(last_two.resolve_range(1), 0..1);
    /// ```
    pub fn resolve_range(&self, len: usize) -> std::ops::Range<usize> {
        let resolve = |index: i64| -> usize {
            let len = len as i64;
            let absolute = if index < 0 { len + index } else { index };
            absolute.clamp(0, len) as usize
        };
        let start = resolve(self.min_index);
        let end = self.max_index.map_or(len, resolve);
        start..end.max(start)
    }
}

/// Any of the four abstraction definitions
#[derive(Debug, Clone)]
pub enum AbstractionDefinition {
    /// Runs of classified values
    LowLevel(LowLevelDefinition),
    /// N-ary temporal pattern
    HighLevel(HighLevelDefinition),
    /// Sequential pair
    Pair(PairDefinition),
    /// Index range
    Slice(SliceDefinition),
}

impl AbstractionDefinition {
    /// The defined proposition id
    pub fn id(&self) -> &PropositionId {
        match self {
            AbstractionDefinition::LowLevel(d) => &d.id,
            AbstractionDefinition::HighLevel(d) => &d.id,
            AbstractionDefinition::Pair(d) => &d.id,
            AbstractionDefinition::Slice(d) => &d.id,
        }
    }

    /// Which kind of abstraction this is
    pub fn kind(&self) -> AbstractionKind {
        match self {
            AbstractionDefinition::LowLevel(_) => AbstractionKind::LowLevel,
            AbstractionDefinition::HighLevel(_) => AbstractionKind::HighLevel,
            AbstractionDefinition::Pair(_) => AbstractionKind::Pair,
            AbstractionDefinition::Slice(_) => AbstractionKind::Slice,
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &str {
        match self {
            AbstractionDefinition::LowLevel(d) => &d.display_name,
            AbstractionDefinition::HighLevel(d) => &d.display_name,
            AbstractionDefinition::Pair(d) => &d.display_name,
            AbstractionDefinition::Slice(d) => &d.display_name,
        }
    }

    /// Proposition ids this definition reads, without duplicates
    pub fn abstracted_from(&self) -> Vec<&PropositionId> {
        let ids: Vec<&PropositionId> = match self {
            AbstractionDefinition::LowLevel(d) => d.sources.iter().collect(),
            AbstractionDefinition::HighLevel(d) => d.components.iter().map(|c| c.proposition_id()).collect(),
            AbstractionDefinition::Pair(d) => vec![d.left.proposition_id(), d.right.proposition_id()],
            AbstractionDefinition::Slice(d) => d.sources.iter().map(|c| c.proposition_id()).collect(),
        };
        let mut unique = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        unique
    }

    /// Is-a children
    pub fn inverse_is_a(&self) -> &[PropositionId] {
        match self {
            AbstractionDefinition::LowLevel(d) => &d.inverse_is_a,
            AbstractionDefinition::HighLevel(d) => &d.inverse_is_a,
            AbstractionDefinition::Pair(d) => &d.inverse_is_a,
            AbstractionDefinition::Slice(d) => &d.inverse_is_a,
        }
    }

    /// Relations whose bounds contradict themselves
    pub fn malformed_relations(&self) -> Vec<&Relation> {
        match self {
            AbstractionDefinition::HighLevel(d) => d
                .relations
                .iter()
                .map(|r| &r.relation)
                .filter(|r| !r.is_well_formed())
                .collect(),
            AbstractionDefinition::Pair(d) if !d.relation.is_well_formed() => vec![&d.relation],
            _ => Vec::new(),
        }
    }
}

/// What a data source supplies for a primitive proposition id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrimitiveKind {
    /// Timestamped values of one type
    PrimitiveParameter {
        /// Type of the measured values
        value_type: ValueType,
    },
    /// Interval events
    Event,
    /// Atemporal facts
    Constant,
}

/// Definition of a proposition id supplied by a data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropositionDefinition {
    id: PropositionId,
    display_name: String,
    kind: PrimitiveKind,
    #[serde(default)]
    inverse_is_a: Vec<PropositionId>,
}

impl PropositionDefinition {
    /// A primitive parameter id with its value type
    pub fn primitive_parameter(id: impl Into<PropositionId>, value_type: ValueType) -> Self {
        Self::new(id, PrimitiveKind::PrimitiveParameter { value_type })
    }

    /// An event id
    pub fn event(id: impl Into<PropositionId>) -> Self {
        Self::new(id, PrimitiveKind::Event)
    }

    /// A constant id
    pub fn constant(id: impl Into<PropositionId>) -> Self {
        Self::new(id, PrimitiveKind::Constant)
    }

    fn new(id: impl Into<PropositionId>, kind: PrimitiveKind) -> Self {
        let id = id.into();
        Self {
            display_name: id.to_string(),
            id,
            kind,
            inverse_is_a: Vec::new(),
        }
    }

    /// Human-readable name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Add an is-a child
    pub fn with_inverse_is_a(mut self, child: impl Into<PropositionId>) -> Self {
        self.inverse_is_a.push(child.into());
        self
    }

    /// The defined id
    pub fn id(&self) -> &PropositionId {
        &self.id
    }

    /// What the data source supplies
    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    /// Value type of primitive parameters
    pub fn value_type(&self) -> Option<ValueType> {
        match self.kind {
            PrimitiveKind::PrimitiveParameter { value_type } => Some(value_type),
            _ => None,
        }
    }
}

/// Anything a knowledge source can define
#[derive(Debug, Clone)]
pub enum Definition {
    /// A data-source proposition id
    Primitive(PropositionDefinition),
    /// A derived proposition id
    Abstraction(AbstractionDefinition),
}

impl Definition {
    /// The defined id
    pub fn id(&self) -> &PropositionId {
        match self {
            Definition::Primitive(d) => d.id(),
            Definition::Abstraction(d) => d.id(),
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &str {
        match self {
            Definition::Primitive(d) => &d.display_name,
            Definition::Abstraction(d) => d.display_name(),
        }
    }

    /// Is-a children
    pub fn inverse_is_a(&self) -> &[PropositionId] {
        match self {
            Definition::Primitive(d) => &d.inverse_is_a,
            Definition::Abstraction(d) => d.inverse_is_a(),
        }
    }

    /// Ids this definition is abstracted from (empty for primitives)
    pub fn abstracted_from(&self) -> Vec<&PropositionId> {
        match self {
            Definition::Primitive(_) => Vec::new(),
            Definition::Abstraction(d) => d.abstracted_from(),
        }
    }

    /// The abstraction definition, if this is one
    pub fn as_abstraction(&self) -> Option<&AbstractionDefinition> {
        match self {
            Definition::Abstraction(d) => Some(d),
            Definition::Primitive(_) => None,
        }
    }

    /// The primitive definition, if this is one
    pub fn as_primitive(&self) -> Option<&PropositionDefinition> {
        match self {
            Definition::Primitive(d) => Some(d),
            Definition::Abstraction(_) => None,
        }
    }
}

impl From<PropositionDefinition> for Definition {
    fn from(d: PropositionDefinition) -> Self {
        Definition::Primitive(d)
    }
}

impl From<LowLevelDefinition> for Definition {
    fn from(d: LowLevelDefinition) -> Self {
        Definition::Abstraction(AbstractionDefinition::LowLevel(d))
    }
}

impl From<HighLevelDefinition> for Definition {
    fn from(d: HighLevelDefinition) -> Self {
        Definition::Abstraction(AbstractionDefinition::HighLevel(d))
    }
}

impl From<PairDefinition> for Definition {
    fn from(d: PairDefinition) -> Self {
        Definition::Abstraction(AbstractionDefinition::Pair(d))
    }
}

impl From<SliceDefinition> for Definition {
    fn from(d: SliceDefinition) -> Self {
        Definition::Abstraction(AbstractionDefinition::Slice(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::MILLIS_PER_MINUTE;
    use crate::classifier::{ThresholdClassifier, ThresholdLimit};
    use crate::{CalendarZone, Granularity, SourceId, UniqueId, Unit, ValueComparator};

    fn at(minutes: i64) -> Interval {
        Interval::at(minutes * MILLIS_PER_MINUTE, Granularity::MILLISECOND, CalendarZone::Utc).unwrap()
    }

    fn state(value: &str, start: i64, finish: i64) -> Proposition {
        let interval = Interval::between(
            start * MILLIS_PER_MINUTE,
            finish * MILLIS_PER_MINUTE,
            Granularity::MILLISECOND,
            CalendarZone::Utc,
        )
        .unwrap();
        Proposition::abstraction(
            PropositionId::new("STATE"),
            UniqueId::new(SourceId::new("test"), value),
            Some(Value::from(value)),
            interval,
            AbstractionKind::LowLevel,
            Vec::new(),
        )
    }

    #[test]
    fn test_gap_function_boundary() {
        let gap = GapFunction::max_gap(Bound::new(60, Unit::MINUTE));
        assert!(gap.allows(&at(0), &at(60)));
        assert!(!gap.allows(&at(0), &at(61)));
        assert!(GapFunction::Unbounded.allows(&at(0), &at(1_000_000)));
    }

    #[test]
    fn test_gap_function_minimum() {
        let gap = GapFunction::Bounded { min_gap: Some(Bound::new(10, Unit::MINUTE)), max_gap: None };
        assert!(!gap.allows(&at(0), &at(5)));
        assert!(gap.allows(&at(0), &at(10)));
    }

    #[test]
    fn test_tepd_matches_value_and_length() {
        let high_for_an_hour = TemporalExtendedPropositionDefinition::new("STATE")
            .with_value(ValueConstraint::equal_to("HIGH".into()))
            .with_min_length(Bound::new(60, Unit::MINUTE));
        assert!(high_for_an_hour.matches(&state("HIGH", 0, 90)));
        assert!(!high_for_an_hour.matches(&state("HIGH", 0, 30)));
        assert!(!high_for_an_hour.matches(&state("LOW", 0, 90)));

        let short = TemporalExtendedPropositionDefinition::new("STATE").with_max_length(Bound::new(30, Unit::MINUTE));
        assert!(short.matches(&state("LOW", 0, 30)));
        assert!(!short.matches(&state("LOW", 0, 31)));
    }

    #[test]
    fn test_tepd_property_constraints() {
        let from_icu = TemporalExtendedPropositionDefinition::new("STATE").with_property(PropertyConstraint::new(
            "ward",
            ValueConstraint::new(ValueComparator::Equal, "ICU".into()),
        ));
        let icu = state("HIGH", 0, 10).with_property("ward", "ICU".into());
        assert!(from_icu.matches(&icu));
        assert!(!from_icu.matches(&state("HIGH", 0, 10)));
    }

    #[test]
    fn test_abstracted_from_is_deduplicated() {
        let pattern = HighLevelDefinition::new("TWO_HIGHS")
            .with_component("STATE")
            .with_component("STATE")
            .with_component("OTHER");
        let definition: Definition = pattern.into();
        let ids: Vec<&str> = definition.abstracted_from().iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["STATE", "OTHER"]);
    }

    #[test]
    fn test_slice_range_resolution() {
        let first_two = SliceDefinition::new("S").with_range(0, Some(2));
        assert_eq!(first_two.resolve_range(5), 0..2);
        assert_eq!(first_two.resolve_range(1), 0..1);

        let all_but_last = SliceDefinition::new("S").with_range(0, Some(-1));
        assert_eq!(all_but_last.resolve_range(4), 0..3);

        let inverted = SliceDefinition::new("S").with_range(3, Some(1));
        assert!(inverted.resolve_range(5).is_empty());

        let beyond = SliceDefinition::new("S").with_range(7, None);
        assert!(beyond.resolve_range(5).is_empty());
    }

    #[test]
    fn test_definition_accessors() {
        let classifier = Arc::new(ThresholdClassifier::new("glucose").with_band("HIGH", Some(ThresholdLimit::inclusive(180.0)), None));
        let high: Definition = LowLevelDefinition::new("HIGH_GLUCOSE", classifier)
            .with_source("GLUCOSE")
            .with_min_values(0)
            .into();
        let abstraction = high.as_abstraction().unwrap();
        assert_eq!(abstraction.kind(), AbstractionKind::LowLevel);
        assert_eq!(high.display_name(), "HIGH_GLUCOSE");
        match abstraction {
            AbstractionDefinition::LowLevel(d) => assert_eq!(d.min_values(), 1),
            other => panic!("unexpected definition {:?}", other),
        }

        let glucose: Definition = PropositionDefinition::primitive_parameter("GLUCOSE", ValueType::Numerical)
            .with_inverse_is_a("GLUCOSE_SERUM")
            .into();
        assert!(glucose.abstracted_from().is_empty());
        assert_eq!(glucose.inverse_is_a(), &[PropositionId::new("GLUCOSE_SERUM")]);
        assert_eq!(glucose.as_primitive().and_then(|p| p.value_type()), Some(ValueType::Numerical));
    }

    #[test]
    fn test_malformed_relations_are_reported() {
        let bad = Relation::new().between(
            Endpoints::StartStart,
            Some(Bound::new(3, Unit::HOUR)),
            Some(Bound::new(1, Unit::HOUR)),
        );
        let pair = AbstractionDefinition::Pair(PairDefinition::new("P", "A", "B", bad));
        assert_eq!(pair.malformed_relations().len(), 1);
    }
}
