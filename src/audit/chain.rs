//! Hash chain engine
//!
//! Produces the canonical serialization of an audit entry and the SHA-256
//! digest that links it to its predecessor.

use chrono::SecondsFormat;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::audit::entry::AuditEntry;

/// Length of a hex encoded entry hash
pub const HASH_HEX_LEN: usize = 64;

/// All hashed fields of an entry. `entry_hash` is deliberately absent.
pub fn canonical_value(entry: &AuditEntry) -> Value {
    json!({
        "entry_id": entry.entry_id,
        "timestamp": entry.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        "pipeline_id": entry.pipeline_id,
        "pipeline_name": entry.pipeline_name,
        "stage": entry.stage,
        "action": entry.action.as_str(),
        "level": entry.level.as_str(),
        "user_id": entry.user_id,
        "user_role": entry.user_role,
        "client_ip": entry.client_ip,
        "resource_type": entry.resource_type,
        "resource_id": entry.resource_id,
        "details": entry.details,
        "record_count": entry.record_count,
        "input_hash": entry.input_hash,
        "output_hash": entry.output_hash,
        "duration_ms": entry.duration_ms,
        "previous_hash": entry.previous_hash,
    })
}

/// Compact JSON with object keys sorted at every depth
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
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

/// Canonical string that the entry hash is computed over
pub fn canonical_string(entry: &AuditEntry) -> String {
    canonical_json(&canonical_value(entry))
}

pub fn compute_entry_hash(entry: &AuditEntry) -> String {
    sha256_hex(canonical_string(entry).as_bytes())
}

/// Lowercase hex SHA-256 of arbitrary bytes
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Content hash for record payloads passed as `input_hash` / `output_hash`
pub fn content_hash<T: serde::Serialize>(payload: &T) -> crate::error::Result<String> {
    let value = serde_json::to_value(payload)?;
    Ok(sha256_hex(canonical_json(&value).as_bytes()))
}
