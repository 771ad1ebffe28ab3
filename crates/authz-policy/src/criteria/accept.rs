use authz_core::Result;
use authz_rules::{Rule, Term};
use serde_json::Value;

use super::no_sub_path;
use crate::criterion::{Criterion, RuleScope};

/// Always holds
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptCriterion;

impl Criterion for AcceptCriterion {
    fn names(&self) -> &[&'static str] {
        &["accept"]
    }

    fn generate(&self, scope: &mut RuleScope<'_>, sub_path: Option<&str>, _data: &Value) -> Result<Rule> {
        no_sub_path("accept", sub_path)?;
        Ok(scope.new_rule("accept").with_value(Term::Bool(true)))
    }
}
