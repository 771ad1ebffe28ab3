use authz_core::Result;
use authz_rules::{Expr, Rule, Term};
use serde_json::Value;

use super::no_sub_path;
use crate::criterion::{Criterion, RuleScope};

/// HTTP status reported when a client certificate fails validation
pub const INVALID_CLIENT_CERTIFICATE_STATUS: i64 = 495;

/// Holds when the client certificate did not validate, producing a
/// `[status, message]` denial value
#[derive(Debug, Clone, Copy, Default)]
pub struct InvalidClientCertificateCriterion;

impl Criterion for InvalidClientCertificateCriterion {
    fn names(&self) -> &[&'static str] {
        &["invalid_client_certificate"]
    }

    fn generate(&self, scope: &mut RuleScope<'_>, sub_path: Option<&str>, _data: &Value) -> Result<Rule> {
        no_sub_path("invalid_client_certificate", sub_path)?;

        let mut rule = scope.new_rule("invalid_client_certificate").with_value(Term::Array(vec![
            Term::int(INVALID_CLIENT_CERTIFICATE_STATUS),
            Term::string("invalid client certificate"),
        ]));
        rule.push(Expr::not(Term::input(["is_valid_client_certificate"])));
        Ok(rule)
    }
}
