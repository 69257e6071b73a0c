//! Execution strategies: how a key's rules are driven to completion

use crate::{EngineError, EvaluationMetrics, WorkingMemory};
use kairos_domain::{DerivationGraph, KeyId};
use kairos_rules::CompiledRuleSet;
use std::fmt;
use tracing::{debug, trace};

/// Drives a compiled rule set over one key's working memory
pub trait ExecutionStrategy: Send + Sync + fmt::Debug {
    /// Evaluate until no rule has an activation
    ///
    /// Provenance is recorded in `derivations` when present.
    fn evaluate(
        &self,
        key: &KeyId,
        rules: &CompiledRuleSet,
        memory: &mut WorkingMemory,
        derivations: Option<&mut DerivationGraph>,
        metrics: &mut EvaluationMetrics,
    ) -> Result<(), EngineError>;
}

/// Salience-ordered forward chaining to a fixed point
///
/// Each pass walks the rules in salience order and fires the first one whose
/// inputs changed since it was last evaluated and that has at least one
/// activation; the pass then restarts from the top. A pass that fires nothing
/// ends evaluation. Every firing adds at least one new unique id, so the loop
/// terminates.
#[derive(Debug, Clone, Default)]
pub struct FixedPointStrategy {
    max_firings: Option<usize>,
}

impl FixedPointStrategy {
    /// Create a strategy without a firing limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail a key that needs more than `limit` firings
    pub fn with_max_firings(mut self, limit: Option<usize>) -> Self {
        self.max_firings = limit;
        self
    }
}

impl ExecutionStrategy for FixedPointStrategy {
    fn evaluate(
        &self,
        key: &KeyId,
        rules: &CompiledRuleSet,
        memory: &mut WorkingMemory,
        mut derivations: Option<&mut DerivationGraph>,
        metrics: &mut EvaluationMetrics,
    ) -> Result<(), EngineError> {
        // Clock value at which each rule was last evaluated; 0 = never
        let mut evaluated_at = vec![0u64; rules.rules().len()];
        let mut firings = 0usize;

        loop {
            metrics.record_iteration();
            let mut fired = false;

            for (index, rule) in rules.rules().iter().enumerate() {
                if !memory.changed_since(rule.inputs(), evaluated_at[index]) {
                    continue;
                }
                evaluated_at[index] = memory.clock();

                let activations = rule.activations(&*memory).map_err(|e| EngineError::Classifier {
                    key: key.to_string(),
                    definition: rule.name().to_string(),
                    message: e.to_string(),
                })?;
                if activations.is_empty() {
                    trace!("Rule '{}' has no activations for key '{}'", rule.name(), key);
                    continue;
                }

                let mut added = 0;
                for activation in activations {
                    let unique_id = activation.proposition.unique_id().clone();
                    if memory.insert(activation.proposition) {
                        added += 1;
                        if let Some(graph) = derivations.as_deref_mut() {
                            graph.record(&unique_id, &activation.sources);
                        }
                    }
                }
                metrics.record_firing(rule.name(), added);
                debug!("Fired '{}' for key '{}': {} propositions", rule.name(), key, added);

                firings += 1;
                if let Some(limit) = self.max_firings {
                    if firings > limit {
                        return Err(EngineError::FiringLimit {
                            key: key.to_string(),
                            limit,
                        });
                    }
                }
                fired = true;
                break;
            }

            if !fired {
                return Ok(());
            }
        }
    }
}
