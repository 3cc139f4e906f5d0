//! Rule-driven field extraction from MARC records.
//!
//! A rule file is a JSON array of [`Rule`]s. Each rule groups [`RuleField`]s
//! under a logical label such as `title` or `subjects`:
//!
//! ```json
//! [
//!   {"label": "title", "array": false,
//!    "fields": [{"tag": "245", "subfields": "abfgknps", "bytes": "", "kind": ""}]},
//!   {"label": "languages", "array": true,
//!    "fields": [{"tag": "008", "subfields": "", "bytes": "35:3", "kind": ""}]}
//! ]
//! ```
//!
//! Rules are loaded once before a run and never change afterwards.

use crate::error::{IngestError, Result};
use crate::marc::MarcRecord;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::warn;

const BUNDLED_RULES: &str = include_str!("../config/marc_rules.json");

/// A named group of field specifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Logical record attribute this rule fills.
    pub label: String,
    /// Whether the attribute holds many values.
    #[serde(default)]
    pub array: bool,
    /// Source fields, applied in order.
    #[serde(default)]
    pub fields: Vec<RuleField>,
}

/// One source tag to read for a [`Rule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleField {
    /// MARC tag, e.g. `245` or `008`.
    pub tag: String,
    /// Subfield codes to keep, in source order. Empty keeps all of them.
    #[serde(default)]
    pub subfields: String,
    /// Optional `offset:length` window applied after subfields are joined.
    #[serde(default)]
    pub bytes: String,
    /// Role attached to values from this field (contributors, related items).
    #[serde(default)]
    pub kind: String,
}

/// A parsed `offset:length` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteWindow {
    /// First byte kept.
    pub offset: usize,
    /// Number of bytes kept.
    pub length: usize,
}

impl ByteWindow {
    /// Parse `"35:3"` style windows. An empty spec means no window.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] when the spec is not two integers
    /// separated by a colon.
    pub fn parse(spec: &str) -> Result<Option<Self>> {
        if spec.trim().is_empty() {
            return Ok(None);
        }
        let invalid = || IngestError::Config(format!("Invalid byte window '{spec}'"));
        let (offset, length) = spec.split_once(':').ok_or_else(invalid)?;
        Ok(Some(ByteWindow {
            offset: offset.trim().parse().map_err(|_| invalid())?,
            length: length.trim().parse().map_err(|_| invalid())?,
        }))
    }

    /// Cut the window out of `value`.
    ///
    /// A window running past the end of the value is clamped. `None` means
    /// the window starts beyond the value and nothing can be kept.
    #[must_use]
    pub fn apply(&self, value: &str) -> Option<String> {
        let bytes = value.as_bytes();
        if self.offset >= bytes.len() {
            return None;
        }
        let end = self.offset.saturating_add(self.length).min(bytes.len());
        Some(String::from_utf8_lossy(&bytes[self.offset..end]).to_string())
    }
}

impl RuleField {
    /// Extract one value per matching field instance.
    ///
    /// Matching subfield values are joined with a single space before the
    /// byte window is applied. A window that does not fit yields a clamped
    /// value (or nothing) and a warning, never a failure.
    #[must_use]
    pub fn filter(&self, record: &MarcRecord) -> Vec<String> {
        let window = match ByteWindow::parse(&self.bytes) {
            Ok(window) => window,
            Err(e) => {
                warn!(tag = %self.tag, error = %e, "ignoring rule field");
                return Vec::new();
            },
        };

        let mut values = Vec::new();
        for parts in record.select(&self.tag, &self.subfields) {
            let joined = parts.join(" ");
            let Some(window) = window else {
                values.push(joined);
                continue;
            };
            if joined.len() < window.offset.saturating_add(window.length) {
                warn!(
                    identifier = %record.control_number(),
                    tag = %self.tag,
                    bytes = %self.bytes,
                    length = joined.len(),
                    "byte window exceeds field value"
                );
            }
            if let Some(cut) = window.apply(&joined) {
                values.push(cut);
            }
        }
        values
    }
}

impl Rule {
    /// Apply every field of the rule, dropping repeated values.
    #[must_use]
    pub fn extract(&self, record: &MarcRecord) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        for field in &self.fields {
            for value in field.filter(record) {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
        values
    }
}

/// An ordered, immutable collection of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Build a rule set from already parsed rules.
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        RuleSet { rules }
    }

    /// The rule file compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled file does not parse.
    pub fn bundled() -> Result<Self> {
        Self::from_reader(BUNDLED_RULES.as_bytes())
    }

    /// Parse rules from a JSON reader.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if the document is not a valid rule
    /// list or a byte window is malformed.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let rules: Vec<Rule> = serde_json::from_reader(reader)
            .map_err(|e| IngestError::Config(format!("Could not parse rule file: {e}")))?;
        for rule in &rules {
            for field in &rule.fields {
                ByteWindow::parse(&field.bytes)?;
            }
        }
        Ok(RuleSet { rules })
    }

    /// Load rules from a file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if the file cannot be opened or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            IngestError::Config(format!("Could not open rule file {}: {e}", path.display()))
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Look up the first rule with the given label.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::RuleNotFound`] when no rule carries the label.
    pub fn get(&self, label: &str) -> Result<&Rule> {
        self.rules
            .iter()
            .find(|rule| rule.label == label)
            .ok_or_else(|| IngestError::RuleNotFound(label.to_string()))
    }

    /// Check that every label is defined.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] naming all missing labels.
    pub fn require(&self, labels: &[&str]) -> Result<()> {
        let missing: Vec<&str> = labels
            .iter()
            .copied()
            .filter(|label| self.get(label).is_err())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(IngestError::Config(format!(
                "Rule file is missing labels: {}",
                missing.join(", ")
            )))
        }
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marc::{Field, Leader};

    fn record() -> MarcRecord {
        let mut record = MarcRecord::new(Leader::default());
        record.add_control_field("001".to_string(), "42".to_string());
        record.add_control_field(
            "008".to_string(),
            "080101s2008    nyu           000 0 eng d".to_string(),
        );
        record.add_field(
            Field::builder("245", '1', '0')
                .subfield('a', "Spice it up!")
                .subfield('c', "ignored")
                .subfield('b', "the best of Paquito D'Rivera.")
                .build(),
        );
        record.add_field(Field::builder("650", ' ', '0').subfield('a', "Jazz.").build());
        record.add_field(Field::builder("650", ' ', '7').subfield('a', "Jazz.").build());
        record
    }

    fn field(tag: &str, subfields: &str, bytes: &str) -> RuleField {
        RuleField {
            tag: tag.to_string(),
            subfields: subfields.to_string(),
            bytes: bytes.to_string(),
            kind: String::new(),
        }
    }

    #[test]
    fn test_byte_window_parse() {
        assert_eq!(ByteWindow::parse("").unwrap(), None);
        assert_eq!(
            ByteWindow::parse("35:3").unwrap(),
            Some(ByteWindow { offset: 35, length: 3 })
        );
        assert!(ByteWindow::parse("35").is_err());
        assert!(ByteWindow::parse("a:b").is_err());
    }

    #[test]
    fn test_byte_window_clamps() {
        let window = ByteWindow { offset: 2, length: 10 };
        assert_eq!(window.apply("abcd"), Some("cd".to_string()));
        assert_eq!(window.apply("ab"), None);
    }

    #[test]
    fn test_filter_joins_subfields() {
        let values = field("245", "abfgknps", "").filter(&record());
        assert_eq!(values, vec!["Spice it up! the best of Paquito D'Rivera.".to_string()]);
    }

    #[test]
    fn test_filter_applies_byte_window() {
        let rec = record();
        assert_eq!(field("008", "", "35:3").filter(&rec), vec!["eng".to_string()]);
        assert_eq!(field("008", "", "7:4").filter(&rec), vec!["2008".to_string()]);
    }

    #[test]
    fn test_filter_window_past_end_is_dropped() {
        assert!(field("008", "", "60:3").filter(&record()).is_empty());
    }

    #[test]
    fn test_extract_dedupes_values() {
        let rule = Rule {
            label: "subjects".to_string(),
            array: true,
            fields: vec![field("650", "a", ""), field("651", "a", "")],
        };
        assert_eq!(rule.extract(&record()), vec!["Jazz.".to_string()]);
    }

    #[test]
    fn test_get_and_require() {
        let rules = RuleSet::new(vec![Rule {
            label: "title".to_string(),
            array: false,
            fields: vec![field("245", "a", "")],
        }]);
        assert!(rules.get("title").is_ok());
        assert!(matches!(
            rules.get("summary"),
            Err(IngestError::RuleNotFound(label)) if label == "summary"
        ));
        assert!(rules.require(&["title"]).is_ok());
        let err = rules.require(&["title", "summary", "notes"]).unwrap_err();
        assert!(err.to_string().contains("summary, notes"));
    }

    #[test]
    fn test_bundled_rules_parse() {
        let rules = RuleSet::bundled().unwrap();
        assert!(!rules.is_empty());
        assert!(rules.get("title").is_ok());
        assert!(rules.get("oclc_number").is_ok());
    }

    #[test]
    fn test_from_reader_rejects_bad_window() {
        let json = r#"[{"label": "x", "fields": [{"tag": "008", "bytes": "oops"}]}]"#;
        assert!(RuleSet::from_reader(json.as_bytes()).is_err());
    }
}
