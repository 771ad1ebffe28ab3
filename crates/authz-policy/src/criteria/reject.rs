use authz_core::Result;
use authz_rules::{Rule, Term};
use serde_json::Value;

use super::no_sub_path;
use crate::criterion::{Criterion, RuleScope};

/// Never holds
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectCriterion;

impl Criterion for RejectCriterion {
    fn names(&self) -> &[&'static str] {
        &["reject"]
    }

    fn generate(&self, scope: &mut RuleScope<'_>, sub_path: Option<&str>, _data: &Value) -> Result<Rule> {
        no_sub_path("reject", sub_path)?;
        Ok(scope.new_rule("reject").with_value(Term::Bool(false)))
    }
}
