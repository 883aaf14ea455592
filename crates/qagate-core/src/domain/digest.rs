//! Canonical JSON and SHA256 digests for request fingerprints.
//!
//! Object keys are sorted recursively and the result is serialized compactly,
//! so two values that differ only in key order share a digest.

use sha2::{Digest, Sha256};

use super::error::{QaError, Result};

fn canonicalize(value: &serde_json::Value) -> Result<serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), canonicalize(v)?);
                }
            }
            Ok(serde_json::Value::Object(sorted))
        }
        serde_json::Value::Array(items) => Ok(serde_json::Value::Array(
            items.iter().map(canonicalize).collect::<Result<Vec<_>>>()?,
        )),
        serde_json::Value::Number(n) => {
            if n.as_f64().is_some_and(|f| !f.is_finite()) {
                return Err(QaError::Internal(
                    "non-finite number in digest input".to_string(),
                ));
            }
            Ok(value.clone())
        }
        other => Ok(other.clone()),
    }
}

/// Compact canonical JSON text.
pub fn canonical_json(value: &serde_json::Value) -> Result<String> {
    Ok(serde_json::to_string(&canonicalize(value)?)?)
}

/// SHA256 hex digest of the canonical JSON form.
pub fn compute_digest(value: &serde_json::Value) -> Result<String> {
    let canonical = canonical_json(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_order_does_not_change_digest() {
        let a = serde_json::json!({ "mode": "fast", "dimensions": ["lint"], "nested": { "b": 1, "a": 2 } });
        let b = serde_json::json!({ "nested": { "a": 2, "b": 1 }, "dimensions": ["lint"], "mode": "fast" });
        assert_eq!(compute_digest(&a).unwrap(), compute_digest(&b).unwrap());
    }

    #[test]
    fn test_array_order_is_significant() {
        let a = serde_json::json!({ "tools": ["eslint", "ruff"] });
        let b = serde_json::json!({ "tools": ["ruff", "eslint"] });
        assert_ne!(compute_digest(&a).unwrap(), compute_digest(&b).unwrap());
    }

    #[test]
    fn test_digest_is_sha256_hex() {
        let digest = compute_digest(&serde_json::json!({ "mode": "dod" })).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_canonical_json_is_compact() {
        let text = canonical_json(&serde_json::json!({ "b": [1, 2], "a": null })).unwrap();
        assert_eq!(text, r#"{"a":null,"b":[1,2]}"#);
    }
}
