//! Rule engine integration tests

use authz_core::{Context, Error, Phase};
use authz_rules::{Engine, MemoryStore, PrepareRequest, PreparedQuery, RuleEngine};
use serde_json::{json, Value};
use std::sync::Arc;
use std::thread;
use tokio_util::sync::CancellationToken;

const QUERY: &str = "result = data.pomerium.policy";

const SOURCE: &str = r#"
package pomerium.policy

import future.keywords.in

default allow = false
default deny = false

role = "admin" {
    input.session.id == "root"
} else = "guest" {
    true
}

limits := {"admin": 100, "guest": 10}

quota = limits[role]

allow { role == "admin" }
allow { is_member(input.session.id, "ops") }

allow {
    some i
    data.users[input.session.id].groups[i] == "oncall"
}

allow {
    "internal" in data.users[input.session.id].tags
}

deny = [403, "suspended"] {
    user := data.users[input.session.id]
    user.suspended
}

deny = [400, "invalid session id"] {
    not regex.match("^[a-z]*$", input.session.id)
}

is_member(id, group) = true {
    data.users[id].groups[_] == group
}
"#;

fn prepare_source(source: &str, store: Arc<MemoryStore>) -> Result<Arc<dyn PreparedQuery>, Error> {
    RuleEngine::new().prepare(
        &Context::background(),
        PrepareRequest::new("pomerium.policy", source, QUERY).with_store(store),
    )
}

fn prepare(store: Arc<MemoryStore>) -> Arc<dyn PreparedQuery> {
    prepare_source(SOURCE, store).unwrap()
}

fn users() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::from_value(json!({
        "users": {
            "alice": {"groups": ["ops"], "suspended": false},
            "bob": {"groups": ["dev"], "suspended": true},
            "dave": {"groups": ["dev", "oncall"]},
            "erin": {"groups": [], "tags": ["internal"]},
        }
    })))
}

fn result(query: &dyn PreparedQuery, session: &str) -> Value {
    let results = query
        .eval(&Context::background(), &json!({"session": {"id": session}}))
        .unwrap();
    results[0].get("result").cloned().unwrap()
}

#[test]
fn test_handwritten_policy() {
    let query = prepare(users());

    let root = result(query.as_ref(), "root");
    assert_eq!(root["allow"], json!(true));
    assert_eq!(root["deny"], json!(false));
    assert_eq!(root["role"], json!("admin"));
    assert_eq!(root["quota"], json!(100));

    let alice = result(query.as_ref(), "alice");
    assert_eq!(alice["allow"], json!(true));
    assert_eq!(alice["role"], json!("guest"));
    assert_eq!(alice["quota"], json!(10));

    let bob = result(query.as_ref(), "bob");
    assert_eq!(bob["allow"], json!(false));
    assert_eq!(bob["deny"], json!([403, "suspended"]));

    assert_eq!(result(query.as_ref(), "dave")["allow"], json!(true));
    assert_eq!(result(query.as_ref(), "erin")["allow"], json!(true));
    assert_eq!(result(query.as_ref(), "nobody")["allow"], json!(false));
    assert_eq!(result(query.as_ref(), "Mallory")["deny"], json!([400, "invalid session id"]));
}

#[test]
fn test_shared_query_across_threads() {
    let query = prepare(users());

    let handles: Vec<_> = ["root", "alice", "bob", "nobody"]
        .into_iter()
        .cycle()
        .take(16)
        .map(|session| {
            let query = Arc::clone(&query);
            thread::spawn(move || (session, result(query.as_ref(), session)["allow"].clone()))
        })
        .collect();

    for handle in handles {
        let (session, allow) = handle.join().unwrap();
        let expected = matches!(session, "root" | "alice");
        assert_eq!(allow, json!(expected), "session {session}");
    }
}

#[test]
fn test_store_updates_are_visible() {
    let store = users();
    let query = prepare(Arc::clone(&store));
    assert_eq!(result(query.as_ref(), "carol")["allow"], json!(false));

    store.put(&["users", "carol"], json!({"groups": ["ops"]}));
    assert_eq!(result(query.as_ref(), "carol")["allow"], json!(true));
}

#[test]
fn test_cancellation() {
    let query = prepare(users());
    let token = CancellationToken::new();
    let ctx = Context::background().with_cancellation(token.clone());
    token.cancel();

    let err = query.eval(&ctx, &json!({})).unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[test]
fn test_conflicting_rule_values_fail_evaluation() {
    let source = r#"
package pomerium.policy

deny = [403, "a"] { input.x }
deny = [401, "b"] { input.x }
"#;
    let query = prepare_source(source, Arc::new(MemoryStore::new())).unwrap();

    let results = query.eval(&Context::background(), &json!({"x": false})).unwrap();
    assert!(results.iter().all(|r| r.get("result").and_then(|v| v.get("deny")).is_none()));

    let err = query.eval(&Context::background(), &json!({"x": true})).unwrap_err();
    assert_eq!(err.phase(), Phase::Evaluation);
}

#[test]
fn test_agreeing_definitions_are_not_a_conflict() {
    let source = "package pomerium.policy\ndeny = [403, \"a\"] { input.x }\ndeny = [403, \"a\"] { true }\n";
    let query = prepare_source(source, Arc::new(MemoryStore::new())).unwrap();
    let results = query.eval(&Context::background(), &json!({"x": true})).unwrap();
    assert_eq!(results[0].get("result"), Some(&json!({"deny": [403, "a"]})));
}

#[test]
fn test_unconditional_conflict_fails_to_prepare() {
    let source = "package pomerium.policy\ndeny = [403, \"a\"] { true }\ndeny = [401, \"b\"] { true }\n";
    let err = prepare_source(source, Arc::new(MemoryStore::new())).unwrap_err();
    assert_eq!(err.phase(), Phase::Construction);
}

#[test]
fn test_unbound_head_value_fails_to_prepare() {
    let err = prepare_source("package pomerium.policy\nallow = tru\n", Arc::new(MemoryStore::new())).unwrap_err();
    assert_eq!(err.phase(), Phase::Construction);
    assert!(matches!(err, Error::Compile(_)), "unexpected error: {err}");
}
