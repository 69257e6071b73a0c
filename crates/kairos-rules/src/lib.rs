//! Kairos Rule Layer
//!
//! Compiles abstraction definitions read from a knowledge source into
//! guarded, prioritised rules.
//!
//! The rule layer provides:
//! - Definition resolution with memoisation ([`DefinitionCache`])
//! - Validation of definitions and their dependencies ([`DefinitionError`])
//! - Stratified rule ordering so that consumers fire after their inputs settle
//! - Matchers for low-level, high-level, pair and slice abstractions, plus
//!   the global is-a copy rule
//!
//! Every rule is guarded: an activation whose derived unique id is already in
//! working memory is dropped, so evaluation reaches a fixed point.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cache;
mod compiler;
mod error;
mod high_level;
mod is_a;
mod knowledge;
mod low_level;
mod pair;
mod rule;
mod slice;

pub use cache::DefinitionCache;
pub use compiler::{CompiledRuleSet, RuleCompiler};
pub use error::{CompileError, DefinitionError};
pub use knowledge::InMemoryKnowledgeSource;
pub use rule::{Activation, CompiledRule, FactIndex, IsAIndex, RuleKind};
