//! Sensitive-field redaction.
//!
//! [`redact`] walks an arbitrary JSON value and replaces the value of every
//! mapping entry whose key belongs to the sensitive set with a fixed mask
//! token.  The transform is pure: the input is never mutated and the output
//! keeps the shape of the input everywhere except at masked leaves.  Log
//! context passes through here before any sink sees it.

use std::collections::HashSet;

use serde_json::{Map, Value};

/// Token substituted for the value of a sensitive key.
pub const MASK: &str = "****";

/// Field names masked unless overridden through `SENSITIVE_FIELDS`.
pub const DEFAULT_SENSITIVE_FIELDS: &[&str] = &[
    "tg_token",
    "open_ai_key",
    "open_ai_assistant_key",
    "manager_tg_id",
    "notify_token",
];

/// The default sensitive-key set as an owned `HashSet`.
pub fn default_sensitive_set() -> HashSet<String> {
    DEFAULT_SENSITIVE_FIELDS
        .iter()
        .map(|name| (*name).to_string())
        .collect()
}

/// Deep-copy `value`, masking every mapping entry whose key is in
/// `sensitive`.  Sequence order and length are preserved; scalars and null
/// pass through unchanged.
pub fn redact(value: &Value, sensitive: &HashSet<String>) -> Value {
    match value {
        Value::Object(map) => Value::Object(redact_map(map, sensitive)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| redact(item, sensitive)).collect())
        }
        other => other.clone(),
    }
}

/// Mapping form of [`redact`] for callers that already hold a JSON object.
pub fn redact_map(map: &Map<String, Value>, sensitive: &HashSet<String>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| {
            if sensitive.contains(key) {
                (key.clone(), Value::String(MASK.to_string()))
            } else {
                (key.clone(), redact(value, sensitive))
            }
        })
        .collect()
}
