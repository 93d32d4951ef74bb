//! Diff result types
//!
//! Set-wise classification of current tool definitions against the pinned
//! baseline: added, removed, changed, and an unchanged count.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Detail for one tool whose fingerprint no longer matches the baseline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedItem {
    pub name: String,
    pub old_hash: String,
    pub new_hash: String,
    /// Description length at pin time.
    pub old_len: usize,
    /// Description length now.
    pub new_len: usize,
    /// When the old fingerprint was pinned.
    pub old_pinned_at: DateTime<Utc>,
}

/// Read-only comparison of current definitions against the baseline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub collection_name: String,
    /// Present now, absent from the baseline.
    pub added: Vec<String>,
    /// Pinned in the baseline, absent now.
    pub removed: Vec<String>,
    /// Present in both with differing fingerprints.
    pub changed: Vec<ChangedItem>,
    /// Present in both with matching fingerprints.
    pub unchanged_count: usize,
    pub manifest_exists: bool,
    pub collection_exists: bool,
}

impl DiffResult {
    /// True when nothing was added, removed, or changed.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}
