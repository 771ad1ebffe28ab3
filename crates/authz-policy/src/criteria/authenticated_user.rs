use authz_core::Result;
use authz_rules::{Expr, Ref, Rule, Term};
use serde_json::Value;

use super::no_sub_path;
use crate::criterion::{Criterion, RuleScope};

/// Holds when the request's session is known to the data store and belongs
/// to a user.
///
/// Sessions are read from `data.sessions[<id>]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthenticatedUserCriterion;

impl Criterion for AuthenticatedUserCriterion {
    fn names(&self) -> &[&'static str] {
        &["authenticated_user"]
    }

    fn generate(&self, scope: &mut RuleScope<'_>, sub_path: Option<&str>, _data: &Value) -> Result<Rule> {
        no_sub_path("authenticated_user", sub_path)?;

        let mut lookup = scope.new_rule("get_session").with_args(["id"]).with_value(Term::var("s"));
        lookup.push(Expr::assign(
            "s",
            Term::Ref(Ref {
                head: "data".to_string(),
                path: vec![Term::string("sessions"), Term::var("id")],
            }),
        ));
        let lookup_name = lookup.name().to_string();
        scope.add(lookup);

        let mut rule = scope.new_rule("authenticated_user").with_value(Term::Bool(true));
        rule.push(Expr::assign(
            "session",
            Term::call(lookup_name, vec![Term::input(["session", "id"])]),
        ));
        rule.push(Expr::ne(Term::reference("session", ["user_id"]), Term::string("")));
        Ok(rule)
    }
}
