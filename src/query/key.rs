//! Deterministic cache keys for collection queries.
//!
//! The same logical query always yields the same key, whatever order its
//! filter properties were inserted in.

use serde_json::Value;

use crate::query::spec::QuerySpec;

/// Cache key for `spec` against `collection`: `<collection>:<canonical json>`.
pub fn query_cache_key(collection: &str, spec: &QuerySpec) -> String {
    // QuerySpec holds only strings, maps and integers, which always serialize
    let value = serde_json::to_value(spec).unwrap_or(Value::Null);
    format!("{collection}:{}", canonical_json(&value))
}

/// Prefix shared by every query key of `collection`.
pub fn collection_prefix(collection: &str) -> String {
    format!("{collection}:")
}

/// JSON text with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(field, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
