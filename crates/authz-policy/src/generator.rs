//! Policy to rule-program generation
//!
//! Each policy rule becomes a head rule named after its action. The head
//! takes its value from the first non-empty combinator and holds only when
//! every non-empty combinator holds:
//!
//! ```text
//! allow = v {
//!     v := and_0
//!     and_0
//!     or_0
//! }
//! ```
//!
//! Combinators lower to helper rules:
//! - `and`: one rule conjoining every criterion, valued by the first
//! - `or`: one definition per criterion under a shared name
//! - `not`: one rule negating every criterion
//! - `nor`: the negation of an `or` helper
//!
//! A policy rule with no conditions at all emits no head rule.

use authz_core::{Error, Result};
use authz_rules::{is_identifier, is_keyword, Expr, Location, Module, Rule, Term};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::criterion::{Criterion, CriterionRegistry, RuleScope};
use crate::ppl::{Combinator, Condition, Policy, PolicyRule};

/// Package every generated program lives in
pub const PACKAGE: &str = "pomerium.policy";

/// Head variable carrying a rule's value
const VALUE_VAR: &str = "v";

/// Generates rule programs from policies.
///
/// Rule names are unique across every program one generator produces.
#[derive(Debug, Clone)]
pub struct Generator {
    ids: HashMap<String, usize>,
    criteria: CriterionRegistry,
}

impl Generator {
    /// A generator with the given criteria
    pub fn new(criteria: CriterionRegistry) -> Self {
        Self {
            ids: HashMap::new(),
            criteria,
        }
    }

    /// A generator with every built-in criterion
    pub fn with_default_criteria() -> Self {
        Self::new(CriterionRegistry::with_defaults())
    }

    /// Register an additional criterion
    pub fn register(&mut self, criterion: Arc<dyn Criterion>) {
        self.criteria.register(criterion);
    }

    /// A fresh `<base>_<n>` rule
    pub fn new_rule(&mut self, base: &str) -> Rule {
        RuleScope::new(&mut self.ids, &mut Vec::new()).new_rule(base)
    }

    /// Generate the rule program for a policy.
    ///
    /// The program seeds `allow` and `deny` with `false` defaults. Rules are
    /// ordered by arity, preserving emission order within an arity, and
    /// numbered from row 1.
    pub fn generate(&mut self, policy: &Policy) -> Result<Module> {
        let mut rules = vec![
            Rule::default_value("allow", Term::Bool(false)),
            Rule::default_value("deny", Term::Bool(false)),
        ];

        {
            let mut lowering = Lowering {
                scope: RuleScope::new(&mut self.ids, &mut rules),
                criteria: &self.criteria,
                action: "",
            };
            for rule in &policy.rules {
                lowering.policy_rule(rule)?;
            }
        }

        let mut module = Module::new(PACKAGE);
        module.rules = order_by_arity(rules);
        for (index, rule) in module.rules.iter_mut().enumerate() {
            rule.location = Some(Location { row: index + 1, col: 1 });
        }

        debug!(rules = module.rules.len(), "Generated rule program");
        Ok(module)
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::with_default_criteria()
    }
}

/// Bucket rules by arity; emission order is kept within each bucket
fn order_by_arity(rules: Vec<Rule>) -> Vec<Rule> {
    let mut buckets: BTreeMap<usize, Vec<Rule>> = BTreeMap::new();
    for rule in rules {
        buckets.entry(rule.arity()).or_default().push(rule);
    }
    buckets.into_values().flatten().collect()
}

struct Lowering<'g> {
    scope: RuleScope<'g>,
    criteria: &'g CriterionRegistry,
    /// Action of the policy rule being lowered, for diagnostics
    action: &'g str,
}

impl<'g> Lowering<'g> {
    fn policy_rule(&mut self, rule: &'g PolicyRule) -> Result<()> {
        if !is_identifier(&rule.action) || is_keyword(&rule.action) {
            return Err(Error::invalid_policy(format!("invalid rule action '{}'", rule.action)));
        }
        self.action = &rule.action;

        let mut head = Rule::new(rule.action.as_str()).with_value(Term::var(VALUE_VAR));
        for (combinator, conditions) in rule.combinators() {
            if conditions.is_empty() {
                continue;
            }
            let name = self.combinator(combinator, conditions)?;
            if head.body.is_empty() {
                head.push(Expr::assign(VALUE_VAR, Term::var(name.as_str())));
            }
            head.push(Expr::Term(Term::var(name)));
        }

        if head.body.is_empty() {
            debug!(action = %rule.action, "Skipping policy rule without conditions");
        } else {
            self.scope.add(head);
        }
        Ok(())
    }

    /// Lower one combinator list, returning the name of its rule
    fn combinator(&mut self, combinator: Combinator, conditions: &[Condition]) -> Result<String> {
        if conditions.is_empty() {
            return Err(Error::invalid_policy(format!(
                "empty '{}' group in '{}' rule",
                combinator.keyword(),
                self.action
            )));
        }

        match combinator {
            Combinator::And => {
                let names = self.conditions(conditions)?;
                let mut rule = self.scope.new_rule("and").with_value(Term::var(VALUE_VAR));
                rule.push(Expr::assign(VALUE_VAR, Term::var(names[0].as_str())));
                for name in names {
                    rule.push(Expr::Term(Term::var(name)));
                }
                Ok(self.add(rule))
            }
            Combinator::Or => {
                let names = self.conditions(conditions)?;
                let or = self.scope.next_name("or");
                for name in names {
                    let mut rule = Rule::new(or.as_str()).with_value(Term::var(VALUE_VAR));
                    rule.push(Expr::assign(VALUE_VAR, Term::var(name)));
                    rule.push(Expr::Term(Term::var(VALUE_VAR)));
                    self.scope.add(rule);
                }
                Ok(or)
            }
            Combinator::Not => {
                let names = self.conditions(conditions)?;
                let mut rule = self.scope.new_rule("not");
                for name in names {
                    rule.push(Expr::not(Term::var(name)));
                }
                Ok(self.add(rule))
            }
            Combinator::Nor => {
                let or = self.combinator(Combinator::Or, conditions)?;
                let mut rule = self.scope.new_rule("nor");
                rule.push(Expr::not(Term::var(or)));
                Ok(self.add(rule))
            }
        }
    }

    fn conditions(&mut self, conditions: &[Condition]) -> Result<Vec<String>> {
        conditions.iter().map(|condition| self.condition(condition)).collect()
    }

    fn condition(&mut self, condition: &Condition) -> Result<String> {
        match condition {
            Condition::Criterion { name, sub_path, data } => {
                let criteria = self.criteria;
                let criterion = criteria.get(name).ok_or_else(|| Error::UnknownCriterion {
                    name: name.clone(),
                    action: self.action.to_string(),
                })?;
                let rule = criterion.generate(&mut self.scope, sub_path.as_deref(), data)?;
                Ok(self.add(rule))
            }
            Condition::And(conditions) => self.combinator(Combinator::And, conditions),
            Condition::Or(conditions) => self.combinator(Combinator::Or, conditions),
            Condition::Not(conditions) => self.combinator(Combinator::Not, conditions),
            Condition::Nor(conditions) => self.combinator(Combinator::Nor, conditions),
        }
    }

    fn add(&mut self, rule: Rule) -> String {
        let name = rule.name().to_string();
        self.scope.add(rule);
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn accept() -> Condition {
        Condition::criterion("accept", json!(true))
    }

    fn reject() -> Condition {
        Condition::criterion("reject", json!(true))
    }

    fn generate(policy: &Policy) -> Module {
        Generator::with_default_criteria().generate(policy).unwrap()
    }

    #[test]
    fn test_empty_policy_has_only_defaults() {
        let module = generate(&Policy::default());
        assert_eq!(module.to_string(), "package pomerium.policy\n\ndefault allow = false\n\ndefault deny = false\n");
    }

    #[test]
    fn test_and_rule() {
        let policy = Policy::new(vec![PolicyRule::new("allow").with_and(vec![accept(), reject()])]);
        let module = generate(&policy);

        let expected = "package pomerium.policy

default allow = false

default deny = false

accept_0 = true

reject_0 = false

and_0 = v {
\tv := accept_0
\taccept_0
\treject_0
}

allow = v {
\tv := and_0
\tand_0
}
";
        assert_eq!(module.to_string(), expected);
    }

    #[test]
    fn test_or_rule_has_one_definition_per_criterion() {
        let policy = Policy::new(vec![PolicyRule::new("allow").with_or(vec![accept(), reject()])]);
        let module = generate(&policy);

        let ors: Vec<String> = module.rules_named("or_0").map(|r| r.to_string()).collect();
        assert_eq!(
            ors,
            vec![
                "or_0 = v {\n\tv := accept_0\n\tv\n}".to_string(),
                "or_0 = v {\n\tv := reject_0\n\tv\n}".to_string(),
            ]
        );
    }

    #[test]
    fn test_not_and_nor_rules() {
        let policy = Policy::new(vec![PolicyRule::new("allow")
            .with_not(vec![reject()])
            .with_nor(vec![reject()])]);
        let module = generate(&policy);
        let source = module.to_string();

        assert!(source.contains("not_0 {\n\tnot reject_0\n}"));
        assert!(source.contains("nor_0 {\n\tnot or_0\n}"));
        assert!(source.contains("allow = v {\n\tv := not_0\n\tnot_0\n\tnor_0\n}"));
    }

    #[test]
    fn test_combinators_processed_in_order() {
        let policy = Policy::new(vec![PolicyRule::new("deny")
            .with_or(vec![accept()])
            .with_and(vec![accept()])]);
        let module = generate(&policy);
        let head = module.rules_named("deny").find(|r| !r.default).unwrap();
        assert_eq!(head.to_string(), "deny = v {\n\tv := and_0\n\tand_0\n\tor_0\n}");
    }

    #[test]
    fn test_empty_policy_rule_emits_no_head() {
        let module = generate(&Policy::new(vec![PolicyRule::new("allow"), PolicyRule::new("deny")]));
        assert_eq!(module, generate(&Policy::default()));
    }

    #[test]
    fn test_repeated_criterion_gets_distinct_names() {
        let policy = Policy::new(vec![PolicyRule::new("allow").with_and(vec![accept(), accept()])]);
        let module = generate(&policy);

        let accepts: Vec<String> = module
            .rules
            .iter()
            .map(|r| r.name().to_string())
            .filter(|name| name.starts_with("accept_"))
            .collect();
        assert_eq!(accepts, vec!["accept_0", "accept_1"]);

        let and = module.rules_named("and_0").next().unwrap();
        assert_eq!(and.to_string(), "and_0 = v {\n\tv := accept_0\n\taccept_0\n\taccept_1\n}");
    }

    #[test]
    fn test_nested_groups() {
        let policy = Policy::new(vec![PolicyRule::new("allow").with_and(vec![
            Condition::Or(vec![reject(), accept()]),
            Condition::Not(vec![reject()]),
        ])]);
        let module = generate(&policy);
        let and = module.rules_named("and_0").next().unwrap();
        assert_eq!(and.to_string(), "and_0 = v {\n\tv := or_0\n\tor_0\n\tnot_0\n}");
    }

    #[test]
    fn test_helpers_follow_value_rules_and_locations_are_sequential() {
        let policy = Policy::new(vec![
            PolicyRule::new("allow").with_and(vec![Condition::criterion("authenticated_user", json!(true))]),
            PolicyRule::new("deny").with_or(vec![reject()]),
        ]);
        let module = generate(&policy);

        let first_helper = module.rules.iter().position(|r| r.arity() > 0).unwrap();
        assert!(module.rules[first_helper..].iter().all(|r| r.arity() > 0));
        assert_eq!(module.rules.last().unwrap().name(), "get_session_0");

        for (index, rule) in module.rules.iter().enumerate() {
            assert_eq!(rule.location, Some(Location { row: index + 1, col: 1 }));
        }
    }

    #[test]
    fn test_names_unique_across_runs() {
        let policy = Policy::new(vec![PolicyRule::new("allow").with_and(vec![accept()])]);
        let mut generator = Generator::with_default_criteria();
        generator.generate(&policy).unwrap();
        let second = generator.generate(&policy).unwrap();
        assert!(second.rules_named("and_1").next().is_some());
        assert!(second.rules_named("accept_1").next().is_some());
    }

    #[test]
    fn test_unknown_criterion_identifies_rule() {
        let policy = Policy::new(vec![PolicyRule::new("deny").with_or(vec![Condition::criterion("ip_blocked", json!(true))])]);
        let err = Generator::with_default_criteria().generate(&policy).unwrap_err();
        match err {
            Error::UnknownCriterion { name, action } => {
                assert_eq!(name, "ip_blocked");
                assert_eq!(action, "deny");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_actions_and_empty_groups_fail() {
        let mut generator = Generator::with_default_criteria();
        assert!(generator.generate(&Policy::new(vec![PolicyRule::new("not allowed")])).is_err());
        assert!(generator.generate(&Policy::new(vec![PolicyRule::new("package")])).is_err());
        let empty_group = PolicyRule::new("allow").with_and(vec![Condition::Or(vec![])]);
        assert!(generator.generate(&Policy::new(vec![empty_group])).is_err());
    }

    #[test]
    fn test_new_rule_advances_shared_counter() {
        let mut generator = Generator::with_default_criteria();
        assert_eq!(generator.new_rule("accept").name(), "accept_0");
        let module = generator
            .generate(&Policy::new(vec![PolicyRule::new("allow").with_and(vec![accept()])]))
            .unwrap();
        assert!(module.rules_named("accept_1").next().is_some());
    }
}
