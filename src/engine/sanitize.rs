//! Context sanitization.
//!
//! Sensitive-looking keys and string values are replaced with a fixed
//! redaction marker before an entry ever reaches a backend. The
//! replacement is irreversible and happens exactly once, at write time;
//! no read path re-applies or bypasses it.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// Marker written in place of a redacted key or value.
pub const REDACTION_MARKER: &str = "[REDACTED]";

lazy_static! {
    static ref SENSITIVE: Regex = Regex::new(
        r"(?i)password|passwd|secret|api[_-]?key|auth[_-]?key|private[_-]?key|access[_-]?token|token|key|bearer|authorization|cookie|session"
    )
    .expect("sensitive-info pattern must compile");
}

/// True when a key or value looks like it carries credentials.
pub fn contains_sensitive_info(value: &str) -> bool {
    SENSITIVE.is_match(value)
}

/// Recursively redact a context map.
///
/// A sensitive key loses its value; a sensitive string value is replaced
/// wherever it appears; nested maps and arrays are walked; other scalars
/// pass through unchanged. Idempotent: the marker itself never matches.
pub fn sanitize_context(context: Map<String, Value>) -> Map<String, Value> {
    context
        .into_iter()
        .map(|(key, value)| {
            if contains_sensitive_info(&key) {
                (key, Value::String(REDACTION_MARKER.to_string()))
            } else {
                let sanitized = sanitize_value(value);
                (key, sanitized)
            }
        })
        .collect()
}

fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => {
            if contains_sensitive_info(&s) {
                Value::String(REDACTION_MARKER.to_string())
            } else {
                Value::String(s)
            }
        }
        Value::Object(map) => Value::Object(sanitize_context(map)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        other => other,
    }
}

/// Convert an arbitrary serializable value into a context value.
///
/// Payloads that cannot be represented as JSON are replaced with a
/// type-tagged placeholder string instead of failing the log call.
pub fn context_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|_| {
        Value::String(format!("[unserializable: {}]", std::any::type_name::<T>()))
    })
}
