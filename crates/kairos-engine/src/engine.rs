//! Engine facade: compile once, evaluate keys

use crate::{EngineConfig, EngineError, EvaluationMetrics, ExecutionStrategy, FixedPointStrategy, KeyResult, KeySession, KeyWorker};
use kairos_domain::{DataSource, KeyId, KnowledgeSource, Proposition, PropositionId};
use kairos_rules::{CompiledRuleSet, RuleCompiler};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info};

/// Temporal abstraction engine
///
/// Compiles the rules for a set of requested proposition ids once, then
/// evaluates keys against the shared rule set. Recompiling needs `&mut self`,
/// so it cannot race an evaluation borrowed from the same engine.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use kairos_domain::{
///     CalendarZone, Granularity, Interval, KeyId, LowLevelDefinition, Proposition, PropositionDefinition,
///     PropositionId, SourceId, ThresholdClassifier, ThresholdLimit, UniqueId, Value, ValueType,
/// };
/// use kairos_engine::{Engine, EngineConfig};
/// use kairos_rules::InMemoryKnowledgeSource;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let high = ThresholdClassifier::new("glucose").with_band("HIGH", Some(ThresholdLimit::inclusive(180.0)), None);
/// let knowledge = InMemoryKnowledgeSource::new()
///     .with_definition(PropositionDefinition::primitive_parameter("GLUCOSE", ValueType::Numerical))
///     .with_definition(LowLevelDefinition::new("HIGH_GLUCOSE", Arc::new(high)).with_source("GLUCOSE"));
///
/// let requested = [PropositionId::new("HIGH_GLUCOSE")];
/// let mut engine = Engine::new(EngineConfig::default())?;
/// engine.initialize(&knowledge, &requested)?;
///
/// let reading = Proposition::primitive_parameter(
///     PropositionId::new("GLUCOSE"),
///     UniqueId::new(SourceId::new("lab"), "g1"),
///     Value::Number(240.0),
///     Interval::at(0, Granularity::MINUTE, CalendarZone::Utc)?,
/// );
/// let result = engine.execute(KeyId::new("patient-1"), &requested, vec![reading])?;
/// assert_eq!(result.requested().count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    compiler: RuleCompiler,
    rules: Option<Arc<CompiledRuleSet>>,
    initialized_for: BTreeSet<PropositionId>,
    strategy: Arc<FixedPointStrategy>,
    metrics: EvaluationMetrics,
}

impl Engine {
    /// Create an engine, validating the configuration
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::Config)?;
        let strategy = FixedPointStrategy::new().with_max_firings(config.max_firings_per_key);
        Ok(Self {
            compiler: RuleCompiler::new().with_strict(config.strict_definitions),
            config,
            rules: None,
            initialized_for: BTreeSet::new(),
            strategy: Arc::new(strategy),
            metrics: EvaluationMetrics::new(),
        })
    }

    /// The configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Accumulated metrics of every key evaluated by this engine
    pub fn metrics(&self) -> &EvaluationMetrics {
        &self.metrics
    }

    /// Reset metrics counters
    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    /// The current rule set, if initialized and not invalidated
    pub fn rules(&self) -> Option<&Arc<CompiledRuleSet>> {
        self.rules.as_ref()
    }

    /// Compile the rules needed for `proposition_ids`
    ///
    /// A current rule set compiled for the same ids is reused.
    pub fn initialize<K>(
        &mut self,
        knowledge: &K,
        proposition_ids: &[PropositionId],
    ) -> Result<Arc<CompiledRuleSet>, EngineError>
    where
        K: KnowledgeSource,
        K::Error: Display,
    {
        let wanted: BTreeSet<PropositionId> = proposition_ids.iter().cloned().collect();
        if let Some(rules) = &self.rules {
            if rules.generation() == self.compiler.generation() && wanted == self.initialized_for {
                debug!("Reusing compiled rules (generation {})", rules.generation());
                return Ok(Arc::clone(rules));
            }
        }

        let rules = Arc::new(self.compiler.compile(knowledge, proposition_ids)?);
        info!(
            "Engine initialized for {} proposition ids: {} rules, {} skipped definitions",
            wanted.len(),
            rules.rules().len(),
            rules.diagnostics().len()
        );
        self.rules = Some(Arc::clone(&rules));
        self.initialized_for = wanted;
        Ok(rules)
    }

    /// Evaluate one key's facts to a fixed point
    ///
    /// `proposition_ids` selects the result's requested view and must have
    /// been passed to [`Engine::initialize`].
    pub fn execute(
        &mut self,
        key: KeyId,
        proposition_ids: &[PropositionId],
        facts: Vec<Proposition>,
    ) -> Result<KeyResult, EngineError> {
        let rules = self.current_rules()?;
        if let Some(missing) = proposition_ids.iter().find(|id| !self.initialized_for.contains(*id)) {
            return Err(EngineError::NotInitialized(format!(
                "'{}' was not requested at initialization",
                missing
            )));
        }

        let outcome = KeySession::evaluate(&rules, self.strategy.as_ref(), &self.config, key, facts, proposition_ids);
        match &outcome {
            Ok(result) => self.metrics.merge(result.metrics()),
            Err(_) => self.metrics.record_key(false),
        }
        outcome
    }

    /// Read one key from a data source and evaluate it
    pub fn execute_from<D>(
        &mut self,
        source: &D,
        key: KeyId,
        proposition_ids: &[PropositionId],
    ) -> Result<KeyResult, EngineError>
    where
        D: DataSource,
        D::Error: Display,
    {
        let facts = source
            .propositions_for(&key)
            .map_err(|e| EngineError::DataSource(format!("key '{}': {}", key, e)))?;
        self.execute(key, proposition_ids, facts)
    }

    /// A worker evaluating keys in parallel against the current rule set
    pub fn worker(&self) -> Result<KeyWorker, EngineError> {
        let rules = self.current_rules()?;
        Ok(KeyWorker::new(rules, Arc::clone(&self.strategy) as Arc<dyn ExecutionStrategy>, self.config.clone()))
    }

    /// Drop cached definitions; the engine must be re-initialized
    pub fn invalidate(&mut self) {
        self.compiler.invalidate();
        self.rules = None;
        self.initialized_for.clear();
    }

    /// Release compiled state
    pub fn cleanup(&mut self) {
        self.invalidate();
        debug!("Engine cleaned up");
    }

    fn current_rules(&self) -> Result<Arc<CompiledRuleSet>, EngineError> {
        match &self.rules {
            Some(rules) if rules.generation() == self.compiler.generation() => Ok(Arc::clone(rules)),
            Some(rules) => Err(EngineError::NotInitialized(format!(
                "rules of generation {} are stale (current generation {})",
                rules.generation(),
                self.compiler.generation()
            ))),
            None => Err(EngineError::NotInitialized("no rules compiled".to_string())),
        }
    }
}
