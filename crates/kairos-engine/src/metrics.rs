//! Metrics collection for key evaluation

use std::collections::BTreeMap;

/// Metrics collected while evaluating keys
///
/// Per-key metrics are merged into engine- or worker-wide totals with
/// [`EvaluationMetrics::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationMetrics {
    /// Keys evaluated to a fixed point
    pub keys_evaluated: usize,

    /// Keys whose evaluation failed
    pub keys_failed: usize,

    /// Primitive propositions loaded into working memory
    pub propositions_loaded: usize,

    /// Rule firings per rule name
    pub firings: BTreeMap<String, usize>,

    /// Propositions derived per rule name
    pub derived: BTreeMap<String, usize>,

    /// Passes over the rule agenda, including the final quiescent pass
    pub iterations: usize,
}

impl EvaluationMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one firing of a rule that added `count` propositions
    pub fn record_firing(&mut self, rule: &str, count: usize) {
        *self.firings.entry(rule.to_string()).or_insert(0) += 1;
        *self.derived.entry(rule.to_string()).or_insert(0) += count;
    }

    /// Record one pass over the agenda
    pub fn record_iteration(&mut self) {
        self.iterations += 1;
    }

    /// Record propositions loaded for a key
    pub fn record_loaded(&mut self, count: usize) {
        self.propositions_loaded += count;
    }

    /// Record the outcome of one key
    pub fn record_key(&mut self, succeeded: bool) {
        if succeeded {
            self.keys_evaluated += 1;
        } else {
            self.keys_failed += 1;
        }
    }

    /// Total firings across all rules
    pub fn total_firings(&self) -> usize {
        self.firings.values().sum()
    }

    /// Total derived propositions across all rules
    pub fn total_derived(&self) -> usize {
        self.derived.values().sum()
    }

    /// Add another set of metrics into this one
    pub fn merge(&mut self, other: &EvaluationMetrics) {
        self.keys_evaluated += other.keys_evaluated;
        self.keys_failed += other.keys_failed;
        self.propositions_loaded += other.propositions_loaded;
        self.iterations += other.iterations;
        for (rule, count) in &other.firings {
            *self.firings.entry(rule.clone()).or_insert(0) += count;
        }
        for (rule, count) in &other.derived {
            *self.derived.entry(rule.clone()).or_insert(0) += count;
        }
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Evaluation Metrics Summary".to_string(),
            "==========================".to_string(),
            format!("Keys evaluated: {}", self.keys_evaluated),
            format!("Keys failed: {}", self.keys_failed),
            format!("Propositions loaded: {}", self.propositions_loaded),
            format!("Agenda passes: {}", self.iterations),
            String::new(),
        ];

        if !self.firings.is_empty() {
            lines.push("Firings by rule (derived):".to_string());
            for (rule, count) in &self.firings {
                let derived = self.derived.get(rule).copied().unwrap_or(0);
                lines.push(format!("  {}: {} ({})", rule, count, derived));
            }
            lines.push(format!("  Total: {} ({})", self.total_firings(), self.total_derived()));
        }

        lines.join("\n")
    }
}
