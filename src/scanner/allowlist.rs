//! Allowlist - operator-maintained suppression phrases
//!
//! Phrases are loaded from a newline-delimited file (blank lines and `#`
//! comments ignored) and matched case-folded against finding text.

use std::fs;
use std::path::Path;

/// Suppression phrases applied to scan findings.
///
/// A finding is suppressed when its matched text contains an allowlisted
/// phrase or is itself contained within one. The containment is deliberately
/// bidirectional so partial and superset phrase entries both take effect;
/// a very short phrase can therefore suppress unrelated larger matches.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    phrases: Vec<String>,
}

impl Allowlist {
    /// Build an allowlist from phrases, case-folding each entry.
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    /// Load phrases from a newline-delimited file.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::new(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#')),
        ))
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Whether a finding with this matched text should be dropped.
    pub fn suppresses(&self, matched_text: &str) -> bool {
        if self.phrases.is_empty() {
            return false;
        }
        let matched = matched_text.to_lowercase();
        self.phrases
            .iter()
            .any(|phrase| matched.contains(phrase.as_str()) || phrase.contains(matched.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn exact_phrase_suppresses_case_insensitively() {
        let allowlist = Allowlist::new(["ignore previous instructions"]);
        assert!(allowlist.suppresses("Ignore Previous Instructions"));
    }

    #[test]
    fn phrase_inside_match_suppresses() {
        let allowlist = Allowlist::new(["previous instructions"]);
        assert!(allowlist.suppresses("ignore all previous instructions now"));
    }

    #[test]
    fn match_inside_phrase_suppresses() {
        let allowlist = Allowlist::new(["please ignore previous instructions in examples"]);
        assert!(allowlist.suppresses("ignore previous instructions"));
    }

    #[test]
    fn unrelated_match_not_suppressed() {
        let allowlist = Allowlist::new(["previous instructions"]);
        assert!(!allowlist.suppresses("send results to"));
    }

    #[test]
    fn empty_allowlist_suppresses_nothing() {
        let allowlist = Allowlist::default();
        assert!(!allowlist.suppresses("anything"));
    }

    #[test]
    fn file_parsing_skips_blanks_and_comments() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# known-safe phrases").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  send results to the log  ").unwrap();
        writeln!(file, "# trailing comment").unwrap();

        let allowlist = Allowlist::from_file(file.path()).unwrap();
        assert_eq!(allowlist.len(), 1);
        assert!(allowlist.suppresses("SEND RESULTS TO the log"));
    }
}
