//! Policy Evaluator
//!
//! Loads a route's policy configuration, compiles it into prepared queries,
//! and evaluates requests against them.
//!
//! ```no_run
//! use authz_core::{Context, PolicyInput};
//! use authz_evaluator::{PolicyConfig, PolicyEvaluator};
//! use authz_rules::MemoryStore;
//! use std::sync::Arc;
//!
//! # fn main() -> authz_core::Result<()> {
//! let config = PolicyConfig::from_file("policy.yaml")?;
//! let ctx = Context::background();
//! let evaluator = PolicyEvaluator::new(&ctx, &config, Arc::new(MemoryStore::new()))?;
//! let output = evaluator.evaluate(&ctx, &PolicyInput::default())?;
//! println!("allowed: {}", output.is_allowed());
//! # Ok(())
//! # }
//! ```

pub mod compiler;
pub mod config;
pub mod evaluator;
pub mod telemetry;

pub use compiler::{CompiledScript, ProgramCompiler, Script, BASE_ORIGIN, RESULT_QUERY};
pub use config::{Fragment, PolicyConfig, SubPolicy};
pub use evaluator::PolicyEvaluator;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::compiler::ProgramCompiler;
    pub use crate::config::PolicyConfig;
    pub use crate::evaluator::PolicyEvaluator;
}
