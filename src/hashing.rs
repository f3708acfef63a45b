//! Hashing System - SHA-256 for Artifacts and Batch Reports
//!
//! Provides deterministic, reproducible hashes so a batch can be audited
//! against the layout and data it was produced from.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_value(v)))
                    .collect(),
            )
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Hash of a serialized report or manifest.
pub fn compute_manifest_hash<T: Serialize>(manifest: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(manifest)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// job_hash = sha256(layout_id : layout_version : canonical(fields) : canonical(rows) : engine_version)
pub fn compute_job_hash(
    layout_id: &str,
    layout_version: &str,
    fields: &impl Serialize,
    rows: &impl Serialize,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let combined = format!(
        "{}:{}:{}:{}:{}",
        layout_id,
        layout_version,
        canonical_json(fields)?,
        canonical_json(rows)?,
        engine_version
    );
    Ok(sha256_hex(combined.as_bytes()))
}
