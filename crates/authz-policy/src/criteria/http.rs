//! Request line criteria

use authz_core::Result;
use authz_rules::{Expr, Rule, Term};
use serde_json::Value;

use super::{no_sub_path, string_matcher};
use crate::criterion::{Criterion, RuleScope};

/// Matches the request method, case-insensitively
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpMethodCriterion;

impl Criterion for HttpMethodCriterion {
    fn names(&self) -> &[&'static str] {
        &["http_method"]
    }

    fn generate(&self, scope: &mut RuleScope<'_>, sub_path: Option<&str>, data: &Value) -> Result<Rule> {
        no_sub_path("http_method", sub_path)?;
        let method = string_matcher("http_method", data)?.to_uppercase();

        let mut rule = scope.new_rule("http_method");
        rule.push(Expr::eq(
            Term::call("upper", vec![Term::input(["http", "method"])]),
            Term::string(method),
        ));
        Ok(rule)
    }
}

/// Matches the request path exactly
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpPathCriterion;

impl Criterion for HttpPathCriterion {
    fn names(&self) -> &[&'static str] {
        &["http_path"]
    }

    fn generate(&self, scope: &mut RuleScope<'_>, sub_path: Option<&str>, data: &Value) -> Result<Rule> {
        no_sub_path("http_path", sub_path)?;
        let path = string_matcher("http_path", data)?;

        let mut rule = scope.new_rule("http_path");
        rule.push(Expr::eq(Term::input(["http", "path"]), Term::string(path)));
        Ok(rule)
    }
}
