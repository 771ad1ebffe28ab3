//! Route policy configuration

use authz_core::{Error, Result};
use authz_policy::{Condition, Policy, PolicyRule};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// The configured policy of one route
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyConfig {
    /// Allow every request, authenticated or not
    #[serde(default)]
    pub allow_public_unauthenticated_access: bool,

    /// Allow any request carrying a user session
    #[serde(default)]
    pub allow_any_authenticated_user: bool,

    /// Allow requests using one of these HTTP methods
    #[serde(default)]
    pub allowed_methods: Vec<String>,

    /// Explicit policy rules, applied after the derived ones
    #[serde(default)]
    pub policy: Policy,

    /// Raw rule-language overrides
    #[serde(default)]
    pub sub_policies: Vec<SubPolicy>,
}

/// A named group of rule-language override fragments
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubPolicy {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Rule-language sources; empty entries are skipped
    #[serde(default)]
    pub rego: Vec<String>,
}

/// One override fragment and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment<'c> {
    pub origin: String,
    pub source: &'c str,
}

impl PolicyConfig {
    /// Parse a configuration from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_yaml(&content)
    }

    fn validate(&self) -> Result<()> {
        if let Some(method) = self.allowed_methods.iter().find(|m| m.trim().is_empty()) {
            return Err(Error::config(format!("invalid allowed method '{method}'")));
        }
        for sub_policy in &self.sub_policies {
            if sub_policy.id.is_empty() {
                return Err(Error::config("sub policy without an id"));
            }
        }
        Ok(())
    }

    /// The complete policy this configuration describes.
    ///
    /// Derived rules come first: public access, then any authenticated
    /// user, then allowed methods, then the explicit rules.
    pub fn to_ppl(&self) -> Policy {
        let mut policy = Policy::default();

        if self.allow_public_unauthenticated_access {
            policy
                .rules
                .push(PolicyRule::new("allow").with_or(vec![Condition::criterion("accept", Value::Bool(true))]));
        }
        if self.allow_any_authenticated_user {
            policy.rules.push(
                PolicyRule::new("allow")
                    .with_or(vec![Condition::criterion("authenticated_user", Value::Bool(true))]),
            );
        }
        if !self.allowed_methods.is_empty() {
            let methods = self
                .allowed_methods
                .iter()
                .map(|method| Condition::criterion("http_method", Value::String(method.clone())))
                .collect();
            policy.rules.push(PolicyRule::new("allow").with_or(methods));
        }

        policy.extend(self.policy.clone());
        policy
    }

    /// Every non-empty override fragment, in configuration order
    pub fn fragments(&self) -> Vec<Fragment<'_>> {
        self.sub_policies
            .iter()
            .flat_map(|sub_policy| {
                sub_policy
                    .rego
                    .iter()
                    .enumerate()
                    .filter(|(_, source)| !source.is_empty())
                    .map(move |(i, source)| Fragment {
                        origin: format!("sub-policy '{}' fragment {i}", sub_policy.id),
                        source: source.as_str(),
                    })
            })
            .collect()
    }
}
