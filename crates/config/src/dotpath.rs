//! Dot-path get/set/unset and deep JSON merge over `serde_json::Value`
//! (spec §4.10). Operates on the JSON tree; `api.rs` round-trips it through
//! the typed `TenantConfig` for schema validation.

use serde_json::{Map, Value};

use crate::error::{ConfigError, Result};

fn split(path: &str) -> Result<Vec<&str>> {
    if path.trim().is_empty() {
        return Err(ConfigError::InvalidPath(path.to_string()));
    }
    Ok(path.split('.').collect())
}

pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = split(path).ok()?;
    let mut cur = root;
    for seg in segments {
        cur = cur.as_object()?.get(seg)?;
    }
    Some(cur)
}

/// Type-infer a `set` literal: `true`/`false`, integer, float, a `{...}`/
/// `[...]` JSON subtree, or (falling through) a bare string.
pub fn infer_literal(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed == "true" {
        return Value::Bool(true);
    }
    if trimmed == "false" {
        return Value::Bool(false);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::from(f);
    }
    if (trimmed.starts_with('{') && trimmed.ends_with('}')) || (trimmed.starts_with('[') && trimmed.ends_with(']')) {
        if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
            return v;
        }
    }
    Value::String(raw.to_string())
}

pub fn set(root: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments = split(path)?;
    let mut cur = root;
    let (last, parents) = segments.split_last().expect("split guarantees at least one segment");
    for seg in parents {
        if !cur.is_object() {
            *cur = Value::Object(Map::new());
        }
        let obj = cur.as_object_mut().expect("just coerced to object above");
        cur = obj.entry(*seg).or_insert_with(|| Value::Object(Map::new()));
    }
    if !cur.is_object() {
        *cur = Value::Object(Map::new());
    }
    cur.as_object_mut()
        .expect("just coerced to object above")
        .insert((*last).to_string(), value);
    Ok(())
}

pub fn unset(root: &mut Value, path: &str) -> Result<()> {
    let segments = split(path)?;
    let (last, parents) = segments.split_last().expect("split guarantees at least one segment");
    let mut cur = root;
    for seg in parents {
        match cur.as_object_mut().and_then(|o| o.get_mut(*seg)) {
            Some(next) => cur = next,
            None => return Ok(()),
        }
    }
    if let Some(obj) = cur.as_object_mut() {
        obj.remove(*last);
    }
    Ok(())
}

/// Deep JSON merge: objects merge key-wise (recursively); any other value
/// (including arrays) replaces the base value outright.
pub fn merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge(existing, patch_value),
                    None => {
                        base_map.insert(key, patch_value);
                    }
                }
            }
        }
        (base_slot, patch_value) => {
            *base_slot = patch_value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_walks_nested_path() {
        let v = json!({"caps": {"maxConcurrentCallsTenant": 20}});
        assert_eq!(get(&v, "caps.maxConcurrentCallsTenant"), Some(&json!(20)));
    }

    #[test]
    fn get_missing_path_is_none() {
        let v = json!({"caps": {}});
        assert_eq!(get(&v, "caps.nope"), None);
    }

    #[test]
    fn infer_literal_covers_each_scalar_kind() {
        assert_eq!(infer_literal("true"), json!(true));
        assert_eq!(infer_literal("false"), json!(false));
        assert_eq!(infer_literal("42"), json!(42));
        assert_eq!(infer_literal("3.5"), json!(3.5));
        assert_eq!(infer_literal("hello"), json!("hello"));
        assert_eq!(infer_literal(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(infer_literal("[1,2]"), json!([1, 2]));
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut v = json!({});
        set(&mut v, "caps.maxConcurrentCallsTenant", json!(25)).unwrap();
        assert_eq!(get(&v, "caps.maxConcurrentCallsTenant"), Some(&json!(25)));
    }

    #[test]
    fn unset_removes_a_leaf() {
        let mut v = json!({"caps": {"maxConcurrentCallsTenant": 20}});
        unset(&mut v, "caps.maxConcurrentCallsTenant").unwrap();
        assert_eq!(get(&v, "caps.maxConcurrentCallsTenant"), None);
    }

    #[test]
    fn unset_on_missing_path_is_a_no_op() {
        let mut v = json!({"caps": {}});
        unset(&mut v, "caps.whoops.nested").unwrap();
    }

    #[test]
    fn merge_is_deep_for_objects_and_replaces_otherwise() {
        let mut base = json!({"caps": {"a": 1, "b": 2}, "dids": ["+1"]});
        let patch = json!({"caps": {"b": 20, "c": 3}, "dids": ["+2", "+3"]});
        merge(&mut base, patch);
        assert_eq!(base, json!({"caps": {"a": 1, "b": 20, "c": 3}, "dids": ["+2", "+3"]}));
    }
}
