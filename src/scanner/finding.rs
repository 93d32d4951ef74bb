//! Scan findings and result structures
//!
//! Defines the severity model and the per-tool / per-server result shapes
//! produced by the description scanner.

use serde::{Deserialize, Serialize};

/// Severity of a detection rule and of the findings it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    /// Parse a severity from its lowercase name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(Severity::Info),
            "warning" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Overall status of a scanned tool or server.
///
/// Worst-of precedence: critical > warning > clean. Info findings are
/// reported but never elevate the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Clean,
    Warning,
    Critical,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Clean => "clean",
            ScanStatus::Warning => "warning",
            ScanStatus::Critical => "critical",
        }
    }

    /// Status implied by a set of findings.
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut status = ScanStatus::Clean;
        for finding in findings {
            let implied = match finding.severity {
                Severity::Critical => ScanStatus::Critical,
                Severity::Warning => ScanStatus::Warning,
                Severity::Info => ScanStatus::Clean,
            };
            if implied > status {
                status = implied;
            }
        }
        status
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single pattern match flagged during scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Rule that produced this finding.
    pub rule_id: String,
    /// Severity inherited from the rule.
    pub severity: Severity,
    /// The exact text that matched.
    pub matched_text: String,
    /// Byte offset of the match within the scanned description.
    pub offset: usize,
}

/// Scan result for a single tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemScanResult {
    pub item_name: String,
    pub status: ScanStatus,
    pub findings: Vec<Finding>,
}

impl ItemScanResult {
    pub fn is_clean(&self) -> bool {
        self.status == ScanStatus::Clean
    }
}

/// Scan result for a whole server's tool set.
///
/// Only non-clean tools are enumerated; clean tools are implied by
/// `item_count` minus the enumerated count, keeping large clean servers
/// compact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionScanResult {
    pub collection_name: String,
    pub item_count: usize,
    pub status: ScanStatus,
    pub results: Vec<ItemScanResult>,
}
