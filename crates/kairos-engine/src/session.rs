//! Per-key evaluation session and its result

use crate::{EngineConfig, EngineError, EvaluationMetrics, ExecutionStrategy, WorkingMemory};
use kairos_domain::{CalendarZone, DerivationGraph, KeyId, Proposition, PropositionId};
use kairos_rules::CompiledRuleSet;
use std::fmt;
use tracing::{info, warn};

/// Lifecycle of a [`KeySession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no facts yet
    Idle,
    /// Primitive facts are in working memory
    Loaded,
    /// Rules are being fired
    Firing,
    /// A fixed point was reached
    Done,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Loaded => "loaded",
            SessionState::Firing => "firing",
            SessionState::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Evaluation state of one key
///
/// Moves `Idle → Loaded → Firing → Done`. A session is self-contained;
/// dropping it discards the key's work.
#[derive(Debug)]
pub struct KeySession {
    key: KeyId,
    state: SessionState,
    memory: WorkingMemory,
    derivations: Option<DerivationGraph>,
    metrics: EvaluationMetrics,
    zone: CalendarZone,
}

impl KeySession {
    /// Create an idle session
    pub fn new(key: KeyId, config: &EngineConfig) -> Self {
        Self {
            key,
            state: SessionState::Idle,
            memory: WorkingMemory::new(),
            derivations: config.record_derivations.then(DerivationGraph::new),
            metrics: EvaluationMetrics::new(),
            zone: config.calendar_zone,
        }
    }

    /// Evaluate one key: load, fire to a fixed point, finish
    pub fn evaluate(
        rules: &CompiledRuleSet,
        strategy: &dyn ExecutionStrategy,
        config: &EngineConfig,
        key: KeyId,
        facts: Vec<Proposition>,
        requested: &[PropositionId],
    ) -> Result<KeyResult, EngineError> {
        let mut session = Self::new(key, config);
        session.load(facts)?;
        session.fire(rules, strategy)?;
        session.finish(requested)
    }

    /// The key
    pub fn key(&self) -> &KeyId {
        &self.key
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Working memory
    pub fn memory(&self) -> &WorkingMemory {
        &self.memory
    }

    /// Insert primitive facts; returns how many were new
    pub fn load(&mut self, facts: impl IntoIterator<Item = Proposition>) -> Result<usize, EngineError> {
        self.expect_state(SessionState::Idle, "load")?;

        let mut loaded = 0;
        let mut foreign_zone = 0;
        for fact in facts {
            if fact.interval().is_some_and(|i| i.zone() != self.zone) {
                foreign_zone += 1;
            }
            if self.memory.insert(fact) {
                loaded += 1;
            }
        }
        if foreign_zone > 0 {
            warn!(
                "Key '{}' has {} facts outside calendar zone {:?}; distances use each relation's first interval's zone",
                self.key, foreign_zone, self.zone
            );
        }

        self.metrics.record_loaded(loaded);
        self.state = SessionState::Loaded;
        Ok(loaded)
    }

    /// Fire rules to a fixed point
    pub fn fire(&mut self, rules: &CompiledRuleSet, strategy: &dyn ExecutionStrategy) -> Result<(), EngineError> {
        self.expect_state(SessionState::Loaded, "fire")?;
        self.state = SessionState::Firing;
        strategy.evaluate(&self.key, rules, &mut self.memory, self.derivations.as_mut(), &mut self.metrics)?;
        self.state = SessionState::Done;
        Ok(())
    }

    /// Consume a finished session into its result
    pub fn finish(mut self, requested: &[PropositionId]) -> Result<KeyResult, EngineError> {
        self.expect_state(SessionState::Done, "finish")?;
        self.metrics.record_key(true);
        info!(
            "Key '{}' evaluated: {} propositions ({} derived)",
            self.key,
            self.memory.len(),
            self.metrics.total_derived()
        );
        Ok(KeyResult {
            key: self.key,
            propositions: self.memory.into_propositions(),
            derivations: self.derivations.unwrap_or_default(),
            requested: requested.to_vec(),
            metrics: self.metrics,
        })
    }

    fn expect_state(&self, expected: SessionState, operation: &str) -> Result<(), EngineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition(format!(
                "cannot {} key '{}' while {}",
                operation, self.key, self.state
            )))
        }
    }
}

/// Everything known about one key after evaluation
#[derive(Debug, Clone)]
pub struct KeyResult {
    key: KeyId,
    propositions: Vec<Proposition>,
    derivations: DerivationGraph,
    requested: Vec<PropositionId>,
    metrics: EvaluationMetrics,
}

impl KeyResult {
    /// The key
    pub fn key(&self) -> &KeyId {
        &self.key
    }

    /// Every proposition, primitive and derived
    pub fn propositions(&self) -> &[Proposition] {
        &self.propositions
    }

    /// Provenance of derived propositions; empty when not recorded
    pub fn derivations(&self) -> &DerivationGraph {
        &self.derivations
    }

    /// The ids the caller asked for
    pub fn requested_ids(&self) -> &[PropositionId] {
        &self.requested
    }

    /// Propositions of the requested ids
    pub fn requested(&self) -> impl Iterator<Item = &Proposition> {
        self.propositions.iter().filter(move |p| self.requested.contains(p.id()))
    }

    /// Propositions of one id
    pub fn propositions_of<'a>(&'a self, id: &'a PropositionId) -> impl Iterator<Item = &'a Proposition> + 'a {
        self.propositions.iter().filter(move |p| p.id() == id)
    }

    /// Metrics for this key
    pub fn metrics(&self) -> &EvaluationMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedPointStrategy;
    use kairos_domain::{Granularity, Interval, SourceId, UniqueId};
    use kairos_rules::{InMemoryKnowledgeSource, RuleCompiler};

    fn event(id: &str, local: &str, zone: CalendarZone) -> Proposition {
        Proposition::event(
            PropositionId::new(id),
            UniqueId::new(SourceId::new("test"), local),
            Interval::at(0, Granularity::MILLISECOND, zone).unwrap(),
        )
    }

    fn empty_rules() -> CompiledRuleSet {
        RuleCompiler::new().compile(&InMemoryKnowledgeSource::new(), &[]).unwrap()
    }

    #[test]
    fn test_state_machine() {
        let config = EngineConfig::default();
        let rules = empty_rules();
        let strategy = FixedPointStrategy::new();
        let mut session = KeySession::new(KeyId::new("k1"), &config);
        assert_eq!(session.state(), SessionState::Idle);

        assert!(session.fire(&rules, &strategy).is_err());
        assert_eq!(session.load(vec![event("A", "a", CalendarZone::Utc)]).unwrap(), 1);
        assert_eq!(session.state(), SessionState::Loaded);
        assert!(matches!(session.load(Vec::new()), Err(EngineError::InvalidTransition(_))));

        session.fire(&rules, &strategy).unwrap();
        assert_eq!(session.state(), SessionState::Done);

        let result = session.finish(&[PropositionId::new("A")]).unwrap();
        assert_eq!(result.requested().count(), 1);
        assert_eq!(result.metrics().keys_evaluated, 1);
    }

    #[test]
    fn test_unfinished_session_cannot_finish() {
        let session = KeySession::new(KeyId::new("k1"), &EngineConfig::default());
        assert!(matches!(session.finish(&[]), Err(EngineError::InvalidTransition(_))));
    }

    #[test]
    fn test_duplicate_facts_load_once() {
        let mut session = KeySession::new(KeyId::new("k1"), &EngineConfig::default());
        let facts = vec![
            event("A", "a", CalendarZone::Utc),
            event("A", "a", CalendarZone::Utc),
            event("A", "b", CalendarZone::US_EASTERN),
        ];
        assert_eq!(session.load(facts).unwrap(), 2);
        assert_eq!(session.memory().len(), 2);
    }

    #[test]
    fn test_derivations_can_be_disabled() {
        let mut config = EngineConfig::default();
        config.record_derivations = false;
        let session = KeySession::new(KeyId::new("k1"), &config);
        assert!(session.derivations.is_none());
    }
}
