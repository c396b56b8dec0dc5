//! Version hashing.
//!
//! The canonical encoding is compact JSON of the typed bundle. Object keys
//! come out sorted because `serde_json::Map` is backed by `BTreeMap` (the
//! `preserve_order` feature is not enabled), and inputs always use their
//! explicit `literal`/`answer`/`variable` form.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::bundle::Bundle;

const HASH_PREFIX: &str = "sha256-";

/// Canonical bytes of a bundle.
pub fn canonical_bytes(bundle: &Bundle) -> Vec<u8> {
    canonical_json(&bundle.to_json())
}

fn canonical_json(value: &serde_json::Value) -> Vec<u8> {
    // Serializing a Value cannot fail.
    serde_json::to_vec(value).unwrap_or_default()
}

fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{}{}", HASH_PREFIX, BASE64.encode(digest))
}

/// Whole-bundle version hash, `sha256-<base64>`.
///
/// Covers every field, metadata included.
pub fn hash(bundle: &Bundle) -> String {
    fingerprint(&canonical_bytes(bundle))
}

/// Fingerprint of the `variables` map only.
///
/// Unchanged by metadata edits; not used as the version identity.
pub fn structural_hash(bundle: &Bundle) -> String {
    let variables = serde_json::json!({ "variables": bundle.to_json().get("variables") });
    fingerprint(&canonical_json(&variables))
}
