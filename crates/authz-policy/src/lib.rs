//! Policy Language
//!
//! Translates declarative policies into rule programs.
//!
//! A policy is a list of `allow`/`deny` rules built from pluggable criteria
//! combined with `and`, `or`, `not`, and `nor`. The `Generator` lowers a
//! policy into a rule-language `Module` in the `pomerium.policy` package,
//! exposing `allow` and `deny` values for the evaluator to read.

pub mod criteria;
pub mod criterion;
pub mod generator;
pub mod ppl;

pub use criterion::{Criterion, CriterionRegistry, RuleScope};
pub use generator::{Generator, PACKAGE};
pub use ppl::{Combinator, Condition, Policy, PolicyRule};

use authz_core::Result;

/// Render the rule-language source for a policy using the built-in criteria
pub fn generate_rules_from_policy(policy: &Policy) -> Result<String> {
    let module = Generator::with_default_criteria().generate(policy)?;
    Ok(module.to_string())
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::criterion::{Criterion, CriterionRegistry, RuleScope};
    pub use crate::generator::Generator;
    pub use crate::ppl::{Condition, Policy, PolicyRule};
}
