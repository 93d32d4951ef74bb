//! Trust manifest - persisted fingerprint baselines
//!
//! The manifest maps collection name -> tool name -> pinned fingerprint.
//! It is stored as pretty-printed UTF-8 JSON and versioned; a legacy
//! single-collection shape is upgraded transparently on load.

mod backup;
mod store;

pub use backup::{BackupError, BackupManager, BackupRecord, RollbackOutcome, BACKUP_RETENTION};
pub use store::{ManifestStore, StoreError, MANIFEST_FILE};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fingerprint::FingerprintEntry;

/// Current on-disk format version.
pub const MANIFEST_FORMAT_VERSION: u32 = 2;

/// Schema tag carried by the current multi-collection shape.
pub const MULTI_COLLECTION_TAG: &str = "multi-collection";

/// Pinned fingerprints for one collection of tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionManifestEntry {
    /// When this collection was last pinned as a whole.
    pub pinned_at: DateTime<Utc>,
    /// Tool name -> pinned fingerprint. Names are unique by construction.
    pub entries: BTreeMap<String, FingerprintEntry>,
}

impl CollectionManifestEntry {
    pub fn new(entries: BTreeMap<String, FingerprintEntry>) -> Self {
        Self {
            pinned_at: Utc::now(),
            entries,
        }
    }
}

/// The persisted trust baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub format_version: u32,
    pub schema_tag: String,
    pub collections: BTreeMap<String, CollectionManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::empty()
    }
}

impl Manifest {
    /// An empty manifest in the current format.
    pub fn empty() -> Self {
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            schema_tag: MULTI_COLLECTION_TAG.to_string(),
            collections: BTreeMap::new(),
        }
    }
}

/// Legacy single-collection shape: a bare collection name plus a flat tool
/// map, no schema tag. Read-only; upgraded on load.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct LegacyManifest {
    collection: String,
    #[allow(dead_code)]
    format_version: u32,
    pinned_at: DateTime<Utc>,
    entries: BTreeMap<String, FingerprintEntry>,
}

impl LegacyManifest {
    fn upgrade(self) -> Manifest {
        let mut collections = BTreeMap::new();
        collections.insert(
            self.collection,
            CollectionManifestEntry {
                pinned_at: self.pinned_at,
                entries: self.entries,
            },
        );
        Manifest {
            format_version: MANIFEST_FORMAT_VERSION,
            schema_tag: MULTI_COLLECTION_TAG.to_string(),
            collections,
        }
    }
}

/// Outcome of decoding an on-disk manifest value.
#[derive(Debug)]
pub(crate) enum DecodedManifest {
    /// Already in the current shape.
    Current(Manifest),
    /// Was in the legacy shape; must be re-persisted.
    Upgraded(Manifest),
}

/// Tagged decode: strict current shape first, then the strict legacy shape,
/// else rejected. Avoids false-positive migrations on malformed input.
pub(crate) fn decode_manifest(value: Value) -> Option<DecodedManifest> {
    if let Ok(manifest) = serde_json::from_value::<Manifest>(value.clone()) {
        if manifest.schema_tag == MULTI_COLLECTION_TAG {
            return Some(DecodedManifest::Current(manifest));
        }
    }
    if let Ok(legacy) = serde_json::from_value::<LegacyManifest>(value) {
        return Some(DecodedManifest::Upgraded(legacy.upgrade()));
    }
    None
}
