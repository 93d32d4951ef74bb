//! Description scanning - injection detection for tool descriptions
//!
//! Pattern-based detection of prompt injection in untrusted tool metadata,
//! with operator-extensible rules and allowlist suppression.

mod allowlist;
mod engine;
mod finding;
mod patterns;

pub use allowlist::Allowlist;
pub use engine::{Scanner, ScannerConfig};
pub use finding::{CollectionScanResult, Finding, ItemScanResult, ScanStatus, Severity};
pub use patterns::{DetectionRule, PatternError, PatternRegistry, ENCODED_PAYLOAD_RULE_ID};
