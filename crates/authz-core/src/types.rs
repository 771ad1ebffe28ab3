//! Request snapshot and verdict types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The input document handed to every policy query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyInput {
    /// The HTTP request being authorized
    #[serde(default)]
    pub http: RequestHttp,

    /// The session attached to the request
    #[serde(default)]
    pub session: RequestSession,

    /// Whether the client presented a certificate that passed verification
    #[serde(default)]
    pub is_valid_client_certificate: bool,
}

/// The HTTP portion of a request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestHttp {
    #[serde(default)]
    pub method: String,

    #[serde(default)]
    pub path: String,

    /// Request headers, canonicalized by the serving layer
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// The session portion of a request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSession {
    /// Session identifier, empty for unauthenticated requests
    #[serde(default)]
    pub id: String,
}

impl PolicyInput {
    /// Render the input as the generic document the rule engine consumes
    pub fn to_document(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// The verdict of evaluating a policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOutput {
    pub allow: bool,
    pub deny: Option<Denial>,
}

/// A denial overrides an otherwise-allowed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    /// HTTP-like status code
    pub status: i64,

    /// Message returned to the client
    pub message: String,
}

impl Denial {
    /// Create a new denial
    pub fn new(status: i64, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl PolicyOutput {
    /// Create an output with no allow and no denial
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the output of a later query into this one.
    ///
    /// Access is allowed if either output allows it. A denial present in
    /// `other` replaces any earlier denial; an absent one keeps the earlier.
    pub fn merge(&self, other: &PolicyOutput) -> PolicyOutput {
        PolicyOutput {
            allow: self.allow || other.allow,
            deny: other.deny.clone().or_else(|| self.deny.clone()),
        }
    }

    /// Whether the request may proceed: allowed and not denied
    pub fn is_allowed(&self) -> bool {
        self.allow && self.deny.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(allow: bool, deny: Option<Denial>) -> PolicyOutput {
        PolicyOutput { allow, deny }
    }

    #[test]
    fn test_merge_keeps_earlier_denial_when_later_is_absent() {
        let d1 = Denial::new(403, "blocked");
        let merged = PolicyOutput::new()
            .merge(&output(false, None))
            .merge(&output(true, Some(d1.clone())))
            .merge(&output(false, None));

        assert_eq!(merged, output(true, Some(d1)));
    }

    #[test]
    fn test_merge_latest_denial_wins() {
        let d1 = Denial::new(403, "first");
        let d2 = Denial::new(401, "second");

        let merged = output(false, Some(d1.clone())).merge(&output(false, Some(d2.clone())));
        assert_eq!(merged.deny, Some(d2.clone()));

        let merged = output(false, Some(d2)).merge(&output(false, Some(d1.clone())));
        assert_eq!(merged.deny, Some(d1));
    }

    #[test]
    fn test_is_allowed_requires_no_denial() {
        assert!(output(true, None).is_allowed());
        assert!(!output(true, Some(Denial::new(403, "no"))).is_allowed());
        assert!(!output(false, None).is_allowed());
    }

    #[test]
    fn test_input_document_shape() {
        let mut input = PolicyInput::default();
        input.http.method = "GET".to_string();
        input.is_valid_client_certificate = true;

        let doc = input.to_document().unwrap();
        assert_eq!(doc["http"]["method"], "GET");
        assert_eq!(doc["session"]["id"], "");
        assert_eq!(doc["is_valid_client_certificate"], true);
    }
}
