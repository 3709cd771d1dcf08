//! Target fingerprints.
//!
//! A fingerprint is the SHA-256 of a target's export map in compact JSON.
//! The export covers kind, tag, keys, attributes and host, and map entries
//! serialize sorted, so equal targets share a fingerprint across processes.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::value::ConfigMap;

/// Prepended to every digest; bump when the export encoding changes.
const FINGERPRINT_VERSION: &[u8] = b"kiln-target/1\0";

/// Lowercase hex SHA-256 of an export map.
///
/// Fails if the map has no JSON form, which happens for map attributes
/// keyed by arrays, maps or targets.
pub fn fingerprint_export(export: &ConfigMap) -> Result<String> {
    let json = serde_json::to_vec(export)?;
    let digest = Sha256::new()
        .chain_update(FINGERPRINT_VERSION)
        .chain_update(&json)
        .finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        // Writing to a String cannot fail.
        let _ = write!(hex, "{byte:02x}");
    }
    Ok(hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn export(entries: Vec<(&str, Value)>) -> ConfigMap {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn stable_lowercase_hex() {
        let a = fingerprint_export(&export(vec![("kind", Value::from("llvm"))])).unwrap();
        let b = fingerprint_export(&export(vec![("kind", Value::from("llvm"))])).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, fingerprint_export(&export(vec![("kind", Value::from("c"))])).unwrap());
    }

    #[test]
    fn map_entry_order_is_irrelevant() {
        let a = export(vec![("limits", Value::map([("threads", 8), ("blocks", 2)]))]);
        let b = export(vec![("limits", Value::map([("blocks", 2), ("threads", 8)]))]);
        assert_eq!(fingerprint_export(&a).unwrap(), fingerprint_export(&b).unwrap());
    }

    #[test]
    fn compound_map_keys_fail() {
        let key = Value::from(vec![1, 2]);
        let bad = export(vec![("m", Value::Map(vec![(key, Value::Int(2))]))]);
        assert!(fingerprint_export(&bad).is_err());
    }
}
