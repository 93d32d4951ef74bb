//! Description Scanner
//!
//! Evaluates tool descriptions against the active detection rule set with
//! allowlist suppression. All configuration is injected at construction;
//! the scanner holds no process-wide mutable state, so concurrent embedders
//! can build independent scanners without cross-call interference.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use regex::Regex;

use crate::definition::Definition;

use super::allowlist::Allowlist;
use super::finding::{CollectionScanResult, Finding, ItemScanResult, ScanStatus, Severity};
use super::patterns::{PatternRegistry, ENCODED_PAYLOAD_RULE_ID};

/// Minimum length of a base64 run worth decoding.
const BASE64_MIN_RUN: &str = r"[A-Za-z0-9+/]{24,}={0,2}";

/// Explicit scanner configuration.
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    pub rules: PatternRegistry,
    pub allowlist: Allowlist,
}

/// Pattern-based scanner over untrusted description text.
#[derive(Debug)]
pub struct Scanner {
    rules: PatternRegistry,
    allowlist: Allowlist,
    base64_run: Option<Regex>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(ScannerConfig::default())
    }
}

impl Scanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            rules: config.rules,
            allowlist: config.allowlist,
            base64_run: Regex::new(BASE64_MIN_RUN).ok(),
        }
    }

    /// Scan one tool description.
    ///
    /// Every rule is applied across the whole text; each non-overlapping
    /// match becomes a finding unless the allowlist suppresses it. Never
    /// fails: all active patterns were validated at load time.
    pub fn scan(&self, name: &str, text: &str) -> ItemScanResult {
        let mut findings = Vec::new();

        for rule in self.rules.rules() {
            for m in rule.regex().find_iter(text) {
                if self.allowlist.suppresses(m.as_str()) {
                    continue;
                }
                findings.push(Finding {
                    rule_id: rule.id.clone(),
                    severity: rule.severity,
                    matched_text: m.as_str().to_string(),
                    offset: m.start(),
                });
            }
        }

        findings.extend(self.sweep_encoded(text));

        let status = ScanStatus::from_findings(&findings);
        ItemScanResult {
            item_name: name.to_string(),
            status,
            findings,
        }
    }

    /// Scan a server's full tool set.
    ///
    /// Tools are scanned in input order; only non-clean tools are enumerated
    /// in the result.
    pub fn scan_collection(
        &self,
        items: &[Definition],
        collection_name: &str,
    ) -> CollectionScanResult {
        let mut status = ScanStatus::Clean;
        let mut results = Vec::new();

        for item in items {
            let result = self.scan(&item.name, item.description_text());
            if result.status > status {
                status = result.status;
            }
            if !result.is_clean() {
                results.push(result);
            }
        }

        CollectionScanResult {
            collection_name: collection_name.to_string(),
            item_count: items.len(),
            status,
            results,
        }
    }

    /// Decode plausible base64 runs and re-check them against the critical
    /// rules. Catches payloads hidden from the plaintext patterns.
    fn sweep_encoded(&self, text: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        let Some(run_regex) = &self.base64_run else {
            return findings;
        };

        for run in run_regex.find_iter(text) {
            let Ok(decoded) = BASE64.decode(run.as_str()) else {
                continue;
            };
            let Ok(decoded_text) = String::from_utf8(decoded) else {
                continue;
            };

            let hit = self
                .rules
                .rules()
                .iter()
                .filter(|r| r.severity == Severity::Critical)
                .any(|r| r.regex().is_match(&decoded_text));

            if hit && !self.allowlist.suppresses(run.as_str()) {
                findings.push(Finding {
                    rule_id: ENCODED_PAYLOAD_RULE_ID.to_string(),
                    severity: Severity::Critical,
                    matched_text: run.as_str().to_string(),
                    offset: run.start(),
                });
            }
        }

        findings
    }
}
