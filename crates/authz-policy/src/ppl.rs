//! Policy language syntax tree
//!
//! A policy is an ordered list of rules, each an action plus up to four
//! combinator lists. The structured form deserializes from YAML or JSON:
//!
//! ```yaml
//! - allow:
//!     or:
//!       - accept: true
//!       - http_method: GET
//! - deny:
//!     and:
//!       - invalid_client_certificate: true
//!       - not:
//!           - http_path: /healthz
//! ```

use authz_core::{Error, Result};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// An ordered sequence of policy rules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Policy {
    pub rules: Vec<PolicyRule>,
}

/// One action and the conditions under which it applies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyRule {
    pub action: String,
    pub and: Vec<Condition>,
    pub or: Vec<Condition>,
    pub not: Vec<Condition>,
    pub nor: Vec<Condition>,
}

/// The four ways a list of conditions combines into one result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
    Not,
    Nor,
}

/// A criterion invocation or a nested boolean group
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// A named criterion with its configuration payload
    Criterion {
        name: String,
        sub_path: Option<String>,
        data: Value,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Vec<Condition>),
    Nor(Vec<Condition>),
}

impl Combinator {
    pub const ALL: [Combinator; 4] = [Self::And, Self::Or, Self::Not, Self::Nor];

    /// The keyword naming this combinator, also the base of its rule names
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Nor => "nor",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.keyword() == keyword)
    }
}

impl Policy {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    /// Parse the structured form from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(&value)
    }

    /// Parse the structured form from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Build a policy from a generic document: a list of rules, a single
    /// rule, or nothing
    pub fn from_value(value: &Value) -> Result<Self> {
        let rules = match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items.iter().map(parse_rule).collect::<Result<_>>()?,
            Value::Object(_) => vec![parse_rule(value)?],
            other => return Err(Error::invalid_policy(format!("expected a list of rules, found {other}"))),
        };
        Ok(Self { rules })
    }

    /// Append the rules of another policy
    pub fn extend(&mut self, other: Policy) {
        self.rules.extend(other.rules);
    }
}

impl<'de> Deserialize<'de> for Policy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

impl PolicyRule {
    /// A rule with the given action and no conditions
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn with_and(mut self, conditions: Vec<Condition>) -> Self {
        self.and = conditions;
        self
    }

    pub fn with_or(mut self, conditions: Vec<Condition>) -> Self {
        self.or = conditions;
        self
    }

    pub fn with_not(mut self, conditions: Vec<Condition>) -> Self {
        self.not = conditions;
        self
    }

    pub fn with_nor(mut self, conditions: Vec<Condition>) -> Self {
        self.nor = conditions;
        self
    }

    /// Every combinator list, in processing order
    pub fn combinators(&self) -> [(Combinator, &[Condition]); 4] {
        [
            (Combinator::And, self.and.as_slice()),
            (Combinator::Or, self.or.as_slice()),
            (Combinator::Not, self.not.as_slice()),
            (Combinator::Nor, self.nor.as_slice()),
        ]
    }

    fn list_mut(&mut self, combinator: Combinator) -> &mut Vec<Condition> {
        match combinator {
            Combinator::And => &mut self.and,
            Combinator::Or => &mut self.or,
            Combinator::Not => &mut self.not,
            Combinator::Nor => &mut self.nor,
        }
    }
}

impl Condition {
    /// A criterion invocation; `name/sub_path` keys are split
    pub fn criterion(key: &str, data: Value) -> Self {
        let (name, sub_path) = match key.split_once('/') {
            Some((name, sub_path)) => (name.to_string(), Some(sub_path.to_string())),
            None => (key.to_string(), None),
        };
        Self::Criterion { name, sub_path, data }
    }

    /// A nested group
    pub fn group(combinator: Combinator, conditions: Vec<Condition>) -> Self {
        match combinator {
            Combinator::And => Self::And(conditions),
            Combinator::Or => Self::Or(conditions),
            Combinator::Not => Self::Not(conditions),
            Combinator::Nor => Self::Nor(conditions),
        }
    }
}

fn single_entry<'v>(value: &'v Value, what: &str) -> Result<(&'v String, &'v Value)> {
    let map: &Map<String, Value> = value
        .as_object()
        .ok_or_else(|| Error::invalid_policy(format!("expected a {what} object, found {value}")))?;
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Ok(entry),
        _ => Err(Error::invalid_policy(format!(
            "a {what} must have exactly one key, found {}",
            map.len()
        ))),
    }
}

fn parse_rule(value: &Value) -> Result<PolicyRule> {
    let (action, body) = single_entry(value, "rule")?;
    let mut rule = PolicyRule::new(action.clone());

    match body {
        Value::Null => {}
        Value::Object(lists) => {
            for (keyword, conditions) in lists {
                let combinator = Combinator::from_keyword(keyword).ok_or_else(|| {
                    Error::invalid_policy(format!("unknown combinator '{keyword}' in '{action}' rule"))
                })?;
                *rule.list_mut(combinator) = parse_conditions(conditions)?;
            }
        }
        other => {
            return Err(Error::invalid_policy(format!(
                "'{action}' rule must map combinators to criteria, found {other}"
            )))
        }
    }

    Ok(rule)
}

fn parse_conditions(value: &Value) -> Result<Vec<Condition>> {
    match value {
        Value::Array(items) => items.iter().map(parse_condition).collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(Error::invalid_policy(format!("expected a list of criteria, found {other}"))),
    }
}

fn parse_condition(value: &Value) -> Result<Condition> {
    let (key, data) = single_entry(value, "criterion")?;
    match Combinator::from_keyword(key) {
        Some(combinator) => Ok(Condition::group(combinator, parse_conditions(data)?)),
        None => Ok(Condition::criterion(key, data.clone())),
    }
}
