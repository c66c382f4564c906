//! Deterministic cache keys.
//!
//! Arguments are rendered as canonical JSON (object keys sorted at every
//! depth) before hashing, so keyword-argument order never changes the key.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Key for the result of `function` called with `args`.
pub fn cache_key(function: &str, args: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(args, &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(function.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical.as_bytes());
    format!("{}:{:x}", function, hasher.finalize())
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
                out.push_str(&Value::from(key.as_str()).to_string());
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
