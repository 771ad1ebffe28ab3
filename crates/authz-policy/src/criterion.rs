//! Pluggable criteria
//!
//! A criterion turns one `name: data` entry of a policy into a rule whose
//! value is the criterion's result. Criteria are looked up by name in a
//! `CriterionRegistry` owned by the generator.

use authz_core::Result;
use authz_rules::Rule;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A named boolean-producing unit of policy
pub trait Criterion: Send + Sync {
    /// Names this criterion answers to
    fn names(&self) -> &[&'static str];

    /// Build the rule for one invocation.
    ///
    /// Names must come from [`RuleScope::new_rule`]. Helper rules go through
    /// [`RuleScope::add`]; the returned rule is added by the caller.
    fn generate(&self, scope: &mut RuleScope<'_>, sub_path: Option<&str>, data: &Value) -> Result<Rule>;
}

/// Rule naming and collection for one generation run
pub struct RuleScope<'g> {
    ids: &'g mut HashMap<String, usize>,
    rules: &'g mut Vec<Rule>,
}

impl<'g> RuleScope<'g> {
    pub(crate) fn new(ids: &'g mut HashMap<String, usize>, rules: &'g mut Vec<Rule>) -> Self {
        Self { ids, rules }
    }

    /// A fresh `<base>_<n>` name, unique within this generator
    pub fn next_name(&mut self, base: &str) -> String {
        let counter = self.ids.entry(base.to_string()).or_insert(0);
        let name = format!("{base}_{counter}");
        *counter += 1;
        name
    }

    /// An empty rule with a fresh name
    pub fn new_rule(&mut self, base: &str) -> Rule {
        Rule::new(self.next_name(base))
    }

    /// Add a rule to the program
    pub fn add(&mut self, rule: Rule) {
        self.rules.push(rule);
    }
}

/// Criteria indexed by name
#[derive(Clone, Default)]
pub struct CriterionRegistry {
    criteria: HashMap<String, Arc<dyn Criterion>>,
}

impl CriterionRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in criterion
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for criterion in crate::criteria::builtin() {
            registry.register(criterion);
        }
        registry
    }

    /// Register a criterion under each of its names, replacing earlier ones
    pub fn register(&mut self, criterion: Arc<dyn Criterion>) {
        for name in criterion.names() {
            debug!(criterion = %name, "Registered criterion");
            self.criteria.insert((*name).to_string(), Arc::clone(&criterion));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Criterion>> {
        self.criteria.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.criteria.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.criteria.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

impl std::fmt::Debug for CriterionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CriterionRegistry").field("names", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz_rules::Term;

    struct Always;

    impl Criterion for Always {
        fn names(&self) -> &[&'static str] {
            &["always", "always_true"]
        }

        fn generate(&self, scope: &mut RuleScope<'_>, _sub_path: Option<&str>, _data: &Value) -> Result<Rule> {
            Ok(scope.new_rule("always").with_value(Term::Bool(true)))
        }
    }

    #[test]
    fn test_names_are_unique_per_base() {
        let mut ids = HashMap::new();
        let mut rules = Vec::new();
        let mut scope = RuleScope::new(&mut ids, &mut rules);

        assert_eq!(scope.next_name("and"), "and_0");
        assert_eq!(scope.next_name("and"), "and_1");
        assert_eq!(scope.next_name("or"), "or_0");
        assert_eq!(scope.new_rule("and").name(), "and_2");
    }

    #[test]
    fn test_register_under_every_name() {
        let mut registry = CriterionRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(Always));
        assert_eq!(registry.names(), vec!["always", "always_true"]);
        assert!(registry.contains("always_true"));
        assert!(registry.get("never").is_none());
    }

    #[test]
    fn test_defaults_include_builtins() {
        let registry = CriterionRegistry::with_defaults();
        for name in ["accept", "reject", "http_method", "http_path", "invalid_client_certificate", "authenticated_user"] {
            assert!(registry.contains(name), "missing {name}");
        }
    }
}
