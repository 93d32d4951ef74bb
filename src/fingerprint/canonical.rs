//! JSON canonicalization for fingerprinting
//!
//! Recursively sorts object keys so that semantically equal schemas hash
//! identically regardless of the key order a server happened to emit.
//! Array order is meaningful in JSON Schema (e.g. `required`, `enum`
//! as authored) and is preserved.

use std::collections::BTreeMap;

use serde_json::Value;

/// Return a copy of `value` with every object's keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(obj) => {
            let sorted: BTreeMap<String, Value> = obj
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Compact serialization of the canonical form.
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&canonicalize(value)).unwrap_or_default()
}
