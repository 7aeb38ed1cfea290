//! Deterministic, order-independent content hashing over plaintext.
//!
//! The hash is a commitment computed purely client-side: the server can
//! compare it against the hash it stored without ever seeing content.
//! Identical multisets hash identically regardless of insertion order,
//! and any single field change anywhere changes the hash.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use inkvault_common::{Error, Identified, Result};

/// Compute the content hash of a plaintext collection.
///
/// Items are sorted by identity (lexicographic), each serialized with
/// object keys sorted recursively, joined with a separator, SHA-256
/// hashed, and base64 encoded.
pub fn compute_content_hash<T>(items: &[T]) -> Result<String>
where
    T: Identified + Serialize,
{
    let mut canonical: Vec<(String, String)> = items
        .iter()
        .map(|item| {
            let value =
                serde_json::to_value(item).map_err(|e| Error::Serialization(e.to_string()))?;
            Ok((item.ident(), canonical_json(&value)))
        })
        .collect::<Result<_>>()?;
    canonical.sort();

    let joined = canonical
        .iter()
        .map(|(_, json)| json.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    Ok(BASE64.encode(hasher.finalize()))
}

/// Hash a set of strings: sorted, joined, SHA-256, base64.
///
/// Structural sibling of [`compute_content_hash`] for flat records such
/// as the credentials blob.
pub fn hash_sorted_strings(parts: &[String]) -> String {
    let mut sorted: Vec<&str> = parts.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(sorted.join("\n").as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Compare two hashes in constant time.
pub fn verify_content_hash(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Render a JSON value with object keys sorted recursively.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields = keys
                .iter()
                .map(|k| format!("{}:{}", Value::String((*k).clone()), canonical_json(&map[*k])))
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{}}}", fields)
        }
        Value::Array(items) => {
            let rendered = items
                .iter()
                .map(canonical_json)
                .collect::<Vec<_>>()
                .join(",");
            format!("[{}]", rendered)
        }
        scalar => scalar.to_string(),
    }
}
