//! Rule compiler: abstraction definitions to guarded, prioritised rules

use crate::rule::{CompiledRule, IsAIndex};
use crate::{CompileError, DefinitionCache, DefinitionError};
use kairos_domain::{
    AbstractionDefinition, AbstractionKind, Definition, KnowledgeSource, PrimitiveKind, PropositionId, ValueType,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of compiling the definitions behind a set of requested ids
///
/// Immutable once built and shared between key evaluations. Rules are sorted
/// by descending salience, then by name.
#[derive(Debug, Clone)]
pub struct CompiledRuleSet {
    generation: u64,
    rules: Vec<CompiledRule>,
    definitions: BTreeMap<PropositionId, Arc<Definition>>,
    levels: BTreeMap<PropositionId, u32>,
    requested: Vec<PropositionId>,
    diagnostics: Vec<DefinitionError>,
}

impl CompiledRuleSet {
    /// Generation of the compiler that produced this set
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Rules in firing-priority order
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// A rule by name
    pub fn rule(&self, name: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.name() == name)
    }

    /// A successfully resolved definition
    pub fn definition(&self, id: &PropositionId) -> Option<&Definition> {
        self.definitions.get(id).map(Arc::as_ref)
    }

    /// Every successfully resolved definition id
    pub fn definition_ids(&self) -> impl Iterator<Item = &PropositionId> {
        self.definitions.keys()
    }

    /// Dependency level of a resolved definition
    pub fn level(&self, id: &PropositionId) -> Option<u32> {
        self.levels.get(id).copied()
    }

    /// Requested ids that compiled successfully
    pub fn requested(&self) -> &[PropositionId] {
        &self.requested
    }

    /// Whether an id was requested and compiled
    pub fn is_requested(&self, id: &PropositionId) -> bool {
        self.requested.contains(id)
    }

    /// Per-definition errors; the affected definitions have no rules
    pub fn diagnostics(&self) -> &[DefinitionError] {
        &self.diagnostics
    }
}

/// Compiles definitions from a knowledge source into rule sets
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use kairos_domain::{LowLevelDefinition, PropositionDefinition, PropositionId, ThresholdClassifier, ThresholdLimit, ValueType};
/// use kairos_rules::{InMemoryKnowledgeSource, RuleCompiler};
///
/// let high = ThresholdClassifier::new("glucose").with_band("HIGH", Some(ThresholdLimit::inclusive(180.0)), None);
/// let knowledge = InMemoryKnowledgeSource::new()
///     .with_definition(PropositionDefinition::primitive_parameter("GLUCOSE", ValueType::Numerical))
///     .with_definition(LowLevelDefinition::new("HIGH_GLUCOSE", Arc::new(high)).with_source("GLUCOSE"));
///
/// let mut compiler = RuleCompiler::new();
/// let rules = compiler.compile(&knowledge, &[PropositionId::new("HIGH_GLUCOSE")]).unwrap();
///
/// assert_eq!(rules.rules().len(), 1);
/// assert_eq!(rules.level(&PropositionId::new("HIGH_GLUCOSE")), Some(1));
/// assert!(rules.diagnostics().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct RuleCompiler {
    cache: DefinitionCache,
    generation: u64,
    strict: bool,
}

impl RuleCompiler {
    /// Create a compiler that skips failing definitions
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the whole compilation on any definition error
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Current generation; bumped by every invalidation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The definition cache
    pub fn cache(&self) -> &DefinitionCache {
        &self.cache
    }

    /// Drop cached definitions; rule sets of older generations are stale
    pub fn invalidate(&mut self) {
        self.cache.invalidate();
        self.generation += 1;
        debug!("Definition cache invalidated, generation {}", self.generation);
    }

    /// Compile the rules needed to derive `requested`
    pub fn compile<K: KnowledgeSource>(
        &mut self,
        source: &K,
        requested: &[PropositionId],
    ) -> Result<CompiledRuleSet, CompileError>
    where
        K::Error: Display,
    {
        let resolution = self.resolve(source, requested)?;
        let mut diagnostics = resolution.unknown;
        diagnostics.extend(validate(&resolution.definitions));
        diagnostics.extend(find_cycles(&resolution.definitions));

        let mut failed: BTreeSet<PropositionId> = diagnostics.iter().map(|e| e.definition_id().clone()).collect();
        diagnostics.extend(propagate_failures(&resolution.definitions, &mut failed));

        for error in &diagnostics {
            warn!("Skipping definition: {}", error);
        }
        if self.strict && !diagnostics.is_empty() {
            return Err(CompileError::Definitions(diagnostics));
        }

        let definitions: BTreeMap<PropositionId, Arc<Definition>> = resolution
            .definitions
            .into_iter()
            .filter(|(id, _)| !failed.contains(id))
            .collect();
        let levels = levels(&definitions);
        let rules = build_rules(&definitions, &levels);

        let requested: Vec<PropositionId> = requested
            .iter()
            .filter(|id| definitions.contains_key(*id))
            .cloned()
            .collect();

        info!(
            "Compiled {} rules for {} requested propositions (generation {}, {} definitions skipped)",
            rules.len(),
            requested.len(),
            self.generation,
            failed.len()
        );

        Ok(CompiledRuleSet {
            generation: self.generation,
            rules,
            definitions,
            levels,
            requested,
            diagnostics,
        })
    }

    /// Transitive closure of `requested` through abstracted_from and inverse_is_a
    fn resolve<K: KnowledgeSource>(&mut self, source: &K, requested: &[PropositionId]) -> Result<Resolution, CompileError>
    where
        K::Error: Display,
    {
        let mut definitions = BTreeMap::new();
        let mut unknown = Vec::new();
        let mut reported = BTreeSet::new();
        let mut queue: VecDeque<(PropositionId, Option<PropositionId>)> =
            requested.iter().map(|id| (id.clone(), None)).collect();

        while let Some((id, referenced_by)) = queue.pop_front() {
            if definitions.contains_key(&id) {
                continue;
            }
            match self.cache.get_or_load(source, &id)? {
                Some(definition) => {
                    for next in definition.abstracted_from().into_iter().chain(definition.inverse_is_a()) {
                        queue.push_back((next.clone(), Some(id.clone())));
                    }
                    definitions.insert(id, definition);
                }
                None => {
                    if reported.insert((id.clone(), referenced_by.clone())) {
                        unknown.push(DefinitionError::UnknownProposition { id, referenced_by });
                    }
                }
            }
        }
        Ok(Resolution { definitions, unknown })
    }
}

struct Resolution {
    definitions: BTreeMap<PropositionId, Arc<Definition>>,
    unknown: Vec<DefinitionError>,
}

/// Structural checks that need the resolved neighbourhood of a definition
fn validate(definitions: &BTreeMap<PropositionId, Arc<Definition>>) -> Vec<DefinitionError> {
    let mut errors = Vec::new();
    for definition in definitions.values().filter_map(|d| d.as_abstraction()) {
        if let Some(error) = validate_abstraction(definition, definitions) {
            errors.push(error);
        }
        for relation in definition.malformed_relations() {
            warn!(
                "Definition '{}' has a relation whose minimum exceeds its maximum; it never holds: {:?}",
                definition.id(),
                relation
            );
        }
    }
    errors
}

fn validate_abstraction(
    definition: &AbstractionDefinition,
    definitions: &BTreeMap<PropositionId, Arc<Definition>>,
) -> Option<DefinitionError> {
    let id = definition.id();
    let malformed = |reason: String| Some(DefinitionError::Malformed { id: id.clone(), reason });

    match definition {
        AbstractionDefinition::LowLevel(d) => {
            if d.sources().is_empty() {
                return malformed("low-level definition has no sources".to_string());
            }
            if d.max_values().is_some_and(|max| max < d.min_values()) {
                return malformed("max_values is smaller than min_values".to_string());
            }
            let mut shared: Option<ValueType> = None;
            for source_id in d.sources() {
                // Unknown sources are reported during resolution
                let Some(source) = definitions.get(source_id) else { continue };
                let value_type = match source.as_primitive().map(|p| p.kind()) {
                    Some(PrimitiveKind::PrimitiveParameter { value_type }) => value_type,
                    _ => {
                        return Some(DefinitionError::InvalidSource {
                            id: id.clone(),
                            source_id: source_id.clone(),
                            reason: "low-level sources must be primitive parameters".to_string(),
                        })
                    }
                };
                match shared {
                    None => shared = Some(value_type),
                    Some(expected) if expected != value_type => {
                        return Some(DefinitionError::InconsistentValueType {
                            id: id.clone(),
                            expected,
                            found: value_type,
                        })
                    }
                    Some(_) => {}
                }
            }
            None
        }
        AbstractionDefinition::HighLevel(d) => {
            let count = d.components().len();
            if count == 0 {
                return malformed("high-level definition has no components".to_string());
            }
            if let Some(r) = d.relations().iter().find(|r| r.first >= count || r.second >= count || r.first == r.second) {
                return malformed(format!("relation {} -> {} does not name two distinct components", r.first, r.second));
            }
            if let Some(offset) = d.offset() {
                if offset.start.component >= count || offset.finish.component >= count {
                    return malformed("temporal offset names a missing component".to_string());
                }
            }
            None
        }
        AbstractionDefinition::Slice(d) if d.sources().is_empty() => {
            malformed("slice definition has no sources".to_string())
        }
        AbstractionDefinition::Pair(_) | AbstractionDefinition::Slice(_) => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    AbstractedFrom,
    IsA,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

fn dependencies(definition: &Definition) -> impl Iterator<Item = (&PropositionId, Edge)> {
    definition
        .abstracted_from()
        .into_iter()
        .map(|id| (id, Edge::AbstractedFrom))
        .chain(definition.inverse_is_a().iter().map(|id| (id, Edge::IsA)))
}

/// Report every definition on a dependency cycle
///
/// Cycles made only of is-a links are reported as such; any other cycle would
/// let evaluation derive without end.
fn find_cycles(definitions: &BTreeMap<PropositionId, Arc<Definition>>) -> Vec<DefinitionError> {
    struct Search<'a> {
        definitions: &'a BTreeMap<PropositionId, Arc<Definition>>,
        marks: BTreeMap<&'a PropositionId, Mark>,
        path: Vec<(&'a PropositionId, Option<Edge>)>,
        reported: BTreeSet<&'a PropositionId>,
        errors: Vec<DefinitionError>,
    }

    impl<'a> Search<'a> {
        fn visit(&mut self, id: &'a PropositionId, via: Option<Edge>) {
            self.marks.insert(id, Mark::Visiting);
            self.path.push((id, via));
            let definitions = self.definitions;
            if let Some(definition) = definitions.get(id) {
                for (next, edge) in dependencies(definition) {
                    let mark = self.marks.get(next).copied();
                    match mark {
                        Some(Mark::Visiting) => self.report(next, edge),
                        Some(Mark::Done) => {}
                        None => self.visit(next, Some(edge)),
                    }
                }
            }
            self.path.pop();
            self.marks.insert(id, Mark::Done);
        }

        fn report(&mut self, entry: &'a PropositionId, closing: Edge) {
            let Some(position) = self.path.iter().position(|(id, _)| *id == entry) else {
                return;
            };
            let cycle = &self.path[position..];
            let only_is_a = closing == Edge::IsA && cycle[1..].iter().all(|(_, via)| *via == Some(Edge::IsA));
            let members: Vec<&'a PropositionId> = cycle.iter().map(|(id, _)| *id).collect();
            for id in members {
                if self.reported.insert(id) {
                    self.errors.push(if only_is_a {
                        DefinitionError::IsACycle(id.clone())
                    } else {
                        DefinitionError::DependencyCycle(id.clone())
                    });
                }
            }
        }
    }

    let mut search = Search {
        definitions,
        marks: BTreeMap::new(),
        path: Vec::new(),
        reported: BTreeSet::new(),
        errors: Vec::new(),
    };
    for id in definitions.keys() {
        if !search.marks.contains_key(id) {
            search.visit(id, None);
        }
    }
    search.errors
}

/// Fail every definition that depends on a failed one, to a fixed point
fn propagate_failures(
    definitions: &BTreeMap<PropositionId, Arc<Definition>>,
    failed: &mut BTreeSet<PropositionId>,
) -> Vec<DefinitionError> {
    let mut errors = Vec::new();
    loop {
        let newly_failed: Vec<DefinitionError> = definitions
            .iter()
            .filter(|(id, _)| !failed.contains(*id))
            .filter_map(|(id, definition)| {
                dependencies(definition)
                    .find(|(dependency, _)| failed.contains(*dependency) || !definitions.contains_key(*dependency))
                    .map(|(dependency, _)| DefinitionError::DependencyFailed {
                        id: id.clone(),
                        dependency: dependency.clone(),
                    })
            })
            .collect();
        if newly_failed.is_empty() {
            return errors;
        }
        for error in newly_failed {
            failed.insert(error.definition_id().clone());
            errors.push(error);
        }
    }
}

/// Dependency level of every valid definition
///
/// Primitives are level 0, an abstraction is one above its deepest source,
/// and an ancestor is at least as deep as each of its children.
fn levels(definitions: &BTreeMap<PropositionId, Arc<Definition>>) -> BTreeMap<PropositionId, u32> {
    fn level_of(
        id: &PropositionId,
        definitions: &BTreeMap<PropositionId, Arc<Definition>>,
        memo: &mut BTreeMap<PropositionId, u32>,
    ) -> u32 {
        if let Some(level) = memo.get(id) {
            return *level;
        }
        let Some(definition) = definitions.get(id) else { return 0 };
        let from_sources = definition
            .as_abstraction()
            .map(|d| {
                1 + d
                    .abstracted_from()
                    .into_iter()
                    .map(|source| level_of(source, definitions, memo))
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        let from_children = definition
            .inverse_is_a()
            .iter()
            .map(|child| level_of(child, definitions, memo))
            .max()
            .unwrap_or(0);
        let level = from_sources.max(from_children);
        memo.insert(id.clone(), level);
        level
    }

    let mut memo = BTreeMap::new();
    for id in definitions.keys() {
        level_of(id, definitions, &mut memo);
    }
    memo
}

/// Priority of an abstraction rule; shallower levels fire first, and within a
/// level low-level and high-level rules fire before pair and slice rules
fn salience(level: u32, kind: AbstractionKind, max_level: u32) -> u32 {
    let tier = match kind {
        AbstractionKind::LowLevel | AbstractionKind::HighLevel => 1,
        AbstractionKind::Pair | AbstractionKind::Slice => 0,
    };
    (max_level - level.min(max_level)) * 2 + tier + 1
}

fn build_rules(
    definitions: &BTreeMap<PropositionId, Arc<Definition>>,
    levels: &BTreeMap<PropositionId, u32>,
) -> Vec<CompiledRule> {
    let max_level = levels.values().copied().max().unwrap_or(0);
    let mut rules: Vec<CompiledRule> = definitions
        .iter()
        .filter_map(|(id, definition)| {
            let abstraction = definition.as_abstraction()?;
            let level = levels.get(id).copied().unwrap_or(0);
            Some(CompiledRule::abstraction(
                abstraction.clone(),
                level,
                salience(level, abstraction.kind(), max_level),
            ))
        })
        .collect();

    let links = definitions
        .iter()
        .filter(|(_, d)| !d.inverse_is_a().is_empty())
        .map(|(id, d)| (id, d.inverse_is_a()));
    let index = IsAIndex::from_links(links);
    if !index.is_empty() {
        rules.push(CompiledRule::is_a(index, (max_level + 1) * 2 + 1));
    }

    rules.sort_by(|a, b| b.salience().cmp(&a.salience()).then_with(|| a.name().cmp(b.name())));
    rules
}
