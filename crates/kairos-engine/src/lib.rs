//! Kairos Engine
//!
//! Forward-chaining evaluation of compiled abstraction rules, one key at a
//! time or many keys in parallel.
//!
//! # Overview
//!
//! The engine is responsible for:
//! - **Initialization**: compiling (or reusing) the rules for the requested proposition ids
//! - **Evaluation**: loading a key's primitive facts into working memory and firing
//!   rules in salience order until no rule has an activation
//! - **Provenance**: recording which facts each derived proposition came from
//! - **Parallelism**: evaluating every key of a data source on tokio's blocking pool
//! - **Metrics collection**: firings and derivations per rule
//!
//! # Usage
//!
//! ## One key
//!
//! ```no_run
//! use kairos_domain::{KeyId, PropositionId};
//! use kairos_engine::{Engine, EngineConfig};
//! use kairos_rules::InMemoryKnowledgeSource;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let knowledge = InMemoryKnowledgeSource::new();
//! let requested = [PropositionId::new("HIGH_GLUCOSE")];
//!
//! let mut engine = Engine::new(EngineConfig::default())?;
//! engine.initialize(&knowledge, &requested)?;
//! let result = engine.execute(KeyId::new("patient-1"), &requested, Vec::new())?;
//! for proposition in result.requested() {
//!     println!("{:?}", proposition);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Presets
//!
//! ```
//! use kairos_engine::EngineConfig;
//!
//! // Default: parallel, skip bad definitions
//! let config = EngineConfig::default();
//!
//! // Sequential: one key at a time
//! let config = EngineConfig::sequential();
//!
//! // Strict: reject bad definitions, bound firings per key
//! let config = EngineConfig::strict();
//! ```
//!
//! # Configuration
//!
//! The engine can be configured via TOML:
//!
//! ```toml
//! max_concurrent_keys = 8
//! record_derivations = true
//! strict_definitions = false
//!
//! [calendar_zone]
//! type = "us_daylight"
//! standard_offset_minutes = -300
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod engine;
mod error;
mod memory;
mod metrics;
mod session;
mod source;
mod strategy;
mod worker;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::EngineError;
pub use memory::WorkingMemory;
pub use metrics::EvaluationMetrics;
pub use session::{KeyResult, KeySession, SessionState};
pub use source::InMemoryDataSource;
pub use strategy::{ExecutionStrategy, FixedPointStrategy};
pub use worker::{KeyWorker, WorkerReport};
