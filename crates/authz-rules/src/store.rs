//! Reference data consulted by rules through `data.*`

use parking_lot::RwLock;
use serde_json::{Map, Value};

/// Read-only view of externally populated reference data.
///
/// The engine never writes through this trait. Implementations are shared
/// across every compiled script and every concurrent evaluation, so they do
/// their own synchronization.
pub trait DataStore: Send + Sync {
    /// Look up the document at `path`, `None` when undefined
    fn get(&self, path: &[String]) -> Option<Value>;
}

/// An in-memory document tree
#[derive(Debug)]
pub struct MemoryStore {
    root: RwLock<Value>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Object(Map::new())),
        }
    }

    /// Create a store holding `root`
    pub fn from_value(root: Value) -> Self {
        Self {
            root: RwLock::new(root),
        }
    }

    /// Replace the document at `path`, creating intermediate objects
    pub fn put(&self, path: &[&str], value: Value) {
        let mut root = self.root.write();
        let mut node = &mut *root;
        for segment in path {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            node = match node {
                Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
                _ => unreachable!("node was just made an object"),
            };
        }
        *node = value;
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore for MemoryStore {
    fn get(&self, path: &[String]) -> Option<Value> {
        let root = self.root.read();
        let mut node = &*root;
        for segment in path {
            node = match node {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(node.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_put_and_get() {
        let store = MemoryStore::new();
        store.put(&["sessions", "s1"], json!({"user_id": "u1"}));

        assert_eq!(store.get(&path(&["sessions", "s1", "user_id"])), Some(json!("u1")));
        assert_eq!(store.get(&path(&["sessions", "missing"])), None);
        assert_eq!(store.get(&[]), Some(json!({"sessions": {"s1": {"user_id": "u1"}}})));
    }

    #[test]
    fn test_array_segments() {
        let store = MemoryStore::from_value(json!({"blocked": ["10.0.0.1", "10.0.0.2"]}));
        assert_eq!(store.get(&path(&["blocked", "1"])), Some(json!("10.0.0.2")));
        assert_eq!(store.get(&path(&["blocked", "x"])), None);
    }
}
