//! Fingerprint engine - content-addressed hashes for tool definitions
//!
//! A fingerprint is the SHA-256 of the canonicalized (name, description,
//! schema) triple, rendered as lowercase hex. Alongside the hash, two cheap
//! metrics are captured for human-readable change summaries: description
//! character length and the top-level schema field count.

mod canonical;

pub use canonical::{canonical_json, canonicalize};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::definition::Definition;

/// Pinned fingerprint for one tool definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintEntry {
    /// SHA-256 over the canonicalized definition, lowercase hex.
    pub hash: String,
    /// Character length of the description at pin time.
    pub description_length: usize,
    /// Top-level key count of the schema (0 when not an object).
    pub field_count: usize,
    /// When this fingerprint was pinned.
    pub pinned_at: DateTime<Utc>,
}

/// Computes fingerprints from tool definitions.
pub struct FingerprintEngine;

impl FingerprintEngine {
    /// Hash a (name, description, schema) triple.
    ///
    /// Deterministic and independent of the schema's original key order;
    /// any change to the name, the description text, or any schema value
    /// changes the hash.
    pub fn hash(name: &str, description: &str, schema: &Value) -> String {
        let canonical = canonical_json(&json!({
            "name": name,
            "description": description,
            "schema": schema,
        }));
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Fingerprint a definition, pinning it at the current time.
    pub fn entry(def: &Definition) -> FingerprintEntry {
        let description = def.description_text();
        FingerprintEntry {
            hash: Self::hash(&def.name, description, &def.schema),
            description_length: description.chars().count(),
            field_count: def.schema.as_object().map(|o| o.len()).unwrap_or(0),
            pinned_at: Utc::now(),
        }
    }
}
