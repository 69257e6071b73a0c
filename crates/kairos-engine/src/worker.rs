//! Parallel evaluation of every key of a data source

use crate::{EngineConfig, EngineError, EvaluationMetrics, ExecutionStrategy, KeyResult, KeySession};
use kairos_domain::{DataSource, KeyId};
use kairos_rules::CompiledRuleSet;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Outcome of a worker run
///
/// Each key succeeds or fails on its own; a failing key never hides the
/// results of the others.
#[derive(Debug, Default)]
pub struct WorkerReport {
    /// Result or error per key
    pub results: BTreeMap<KeyId, Result<KeyResult, EngineError>>,
    /// Metrics merged over all keys
    pub metrics: EvaluationMetrics,
}

impl WorkerReport {
    fn record(&mut self, key: KeyId, outcome: Result<KeyResult, EngineError>) {
        match &outcome {
            Ok(result) => self.metrics.merge(result.metrics()),
            Err(e) => {
                tracing::warn!("Key '{}' failed: {}", key, e);
                self.metrics.record_key(false);
            }
        }
        self.results.insert(key, outcome);
    }

    /// Results of the keys that succeeded
    pub fn succeeded(&self) -> impl Iterator<Item = &KeyResult> {
        self.results.values().filter_map(|r| r.as_ref().ok())
    }

    /// Errors of the keys that failed
    pub fn failed(&self) -> impl Iterator<Item = (&KeyId, &EngineError)> {
        self.results.iter().filter_map(|(key, r)| r.as_ref().err().map(|e| (key, e)))
    }

    /// The outcome for one key
    pub fn get(&self, key: &KeyId) -> Option<&Result<KeyResult, EngineError>> {
        self.results.get(key)
    }
}

/// Evaluates keys concurrently on tokio's blocking pool
///
/// Every key shares one compiled rule set. At most
/// `max_concurrent_keys` keys are in flight at a time.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use kairos_domain::PropositionId;
/// use kairos_engine::{Engine, EngineConfig, InMemoryDataSource};
/// use kairos_rules::InMemoryKnowledgeSource;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let knowledge = InMemoryKnowledgeSource::new();
///     let source = Arc::new(InMemoryDataSource::new());
///
///     let mut engine = Engine::new(EngineConfig::default())?;
///     engine.initialize(&knowledge, &[PropositionId::new("HIGH_GLUCOSE")])?;
///
///     let report = engine.worker()?.run(source).await?;
///     println!("{}", report.metrics.summary());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct KeyWorker {
    rules: Arc<CompiledRuleSet>,
    strategy: Arc<dyn ExecutionStrategy>,
    config: EngineConfig,
}

impl KeyWorker {
    /// Create a worker over a compiled rule set
    pub fn new(rules: Arc<CompiledRuleSet>, strategy: Arc<dyn ExecutionStrategy>, config: EngineConfig) -> Self {
        Self { rules, strategy, config }
    }

    /// Evaluate every key of `source`
    ///
    /// # Errors
    ///
    /// Returns an error only if the key list cannot be read or the worker
    /// cannot schedule work; per-key failures are in the report.
    pub async fn run<D>(&self, source: Arc<D>) -> Result<WorkerReport, EngineError>
    where
        D: DataSource + Send + Sync + 'static,
        D::Error: Display,
    {
        let keys = source.keys().map_err(|e| EngineError::DataSource(e.to_string()))?;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_keys));

        tracing::info!(
            "Key worker started: {} keys, up to {} concurrently",
            keys.len(),
            self.config.max_concurrent_keys
        );

        let mut handles = Vec::with_capacity(keys.len());
        for key in keys {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| EngineError::Worker(e.to_string()))?;
            let source = Arc::clone(&source);
            let rules = Arc::clone(&self.rules);
            let strategy = Arc::clone(&self.strategy);
            let config = self.config.clone();
            let task_key = key.clone();

            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let facts = source
                    .propositions_for(&task_key)
                    .map_err(|e| EngineError::DataSource(format!("key '{}': {}", task_key, e)))?;
                KeySession::evaluate(&rules, strategy.as_ref(), &config, task_key, facts, rules.requested())
            });
            handles.push((key, handle));
        }

        let mut report = WorkerReport::default();
        for (key, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(EngineError::Worker(format!("key '{}': {}", key, e))),
            };
            report.record(key, outcome);
        }

        tracing::info!("Key worker finished. Metrics:\n{}", report.metrics.summary());
        Ok(report)
    }
}
