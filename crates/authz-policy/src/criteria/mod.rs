//! Built-in criteria

mod accept;
mod authenticated_user;
mod client_certificate;
mod http;
mod reject;

pub use accept::AcceptCriterion;
pub use authenticated_user::AuthenticatedUserCriterion;
pub use client_certificate::InvalidClientCertificateCriterion;
pub use http::{HttpMethodCriterion, HttpPathCriterion};
pub use reject::RejectCriterion;

use authz_core::{Error, Result};
use serde_json::Value;
use std::sync::Arc;

use crate::criterion::Criterion;

/// Every built-in criterion
pub fn builtin() -> Vec<Arc<dyn Criterion>> {
    vec![
        Arc::new(AcceptCriterion),
        Arc::new(RejectCriterion),
        Arc::new(HttpMethodCriterion),
        Arc::new(HttpPathCriterion),
        Arc::new(InvalidClientCertificateCriterion),
        Arc::new(AuthenticatedUserCriterion),
    ]
}

fn no_sub_path(name: &str, sub_path: Option<&str>) -> Result<()> {
    match sub_path {
        Some(sub_path) => Err(Error::invalid_criterion(
            name,
            format!("unexpected sub path '{sub_path}'"),
        )),
        None => Ok(()),
    }
}

/// A string payload, given bare or as `{is: "..."}`
fn string_matcher<'v>(name: &str, data: &'v Value) -> Result<&'v str> {
    let value = match data {
        Value::Object(map) => {
            if let Some(key) = map.keys().find(|key| key.as_str() != "is") {
                return Err(Error::invalid_criterion(name, format!("unsupported operator '{key}'")));
            }
            map.get("is")
        }
        other => Some(other),
    };

    value
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_criterion(name, format!("expected a string or {{is: string}}, found {data}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_matcher_forms() {
        assert_eq!(string_matcher("http_path", &json!("/a")).unwrap(), "/a");
        assert_eq!(string_matcher("http_path", &json!({"is": "/b"})).unwrap(), "/b");
        assert!(string_matcher("http_path", &json!({"starts_with": "/"})).is_err());
        assert!(string_matcher("http_path", &json!({})).is_err());
        assert!(string_matcher("http_path", &json!(7)).is_err());
    }

    #[test]
    fn test_no_sub_path() {
        assert!(no_sub_path("accept", None).is_ok());
        let err = no_sub_path("accept", Some("x")).unwrap_err();
        assert!(err.to_string().contains("accept"));
    }
}
