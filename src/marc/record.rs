//! Raw MARC bibliographic record structures.
//!
//! - [`MarcRecord`]: a decoded ISO 2709 record
//! - [`Field`]: variable data fields (010+)
//! - [`Subfield`]: named data elements within fields
//!
//! These are the input side of the MARC mapping; nothing here knows about the
//! normalized [`crate::record::Record`].

use crate::marc::leader::Leader;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A MARC bibliographic record
///
/// Fields are stored in insertion order using `IndexMap`, grouped by tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarcRecord {
    /// Record leader (24 bytes)
    pub leader: Leader,
    /// Control fields (000-009) - tag -> value, preserves insertion order
    pub control_fields: IndexMap<String, String>,
    /// Data fields (010+) - tag -> fields, preserves insertion order
    pub fields: IndexMap<String, Vec<Field>>,
}

/// A data field in a MARC record (fields 010 and higher)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field tag (3 digits)
    pub tag: String,
    /// First indicator
    pub indicator1: char,
    /// Second indicator
    pub indicator2: char,
    /// Subfields, stored inline for the common case of 4 or fewer
    pub subfields: SmallVec<[Subfield; 4]>,
}

/// A subfield within a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Subfield value
    pub value: String,
}

/// Whether a tag names a control field (001-009).
#[must_use]
pub fn is_control_tag(tag: &str) -> bool {
    tag.len() == 3 && tag.starts_with("00") && tag.chars().all(|c| c.is_ascii_digit())
}

impl MarcRecord {
    /// Create a new MARC record with the given leader
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        MarcRecord {
            leader,
            control_fields: IndexMap::new(),
            fields: IndexMap::new(),
        }
    }

    /// Add a control field (000-009)
    pub fn add_control_field(&mut self, tag: String, value: String) {
        self.control_fields.insert(tag, value);
    }

    /// Get a control field value
    #[must_use]
    pub fn get_control_field(&self, tag: &str) -> Option<&str> {
        self.control_fields.get(tag).map(String::as_str)
    }

    /// The control number (001), or an empty string when absent.
    #[must_use]
    pub fn control_number(&self) -> &str {
        self.get_control_field("001").unwrap_or_default()
    }

    /// Add a data field
    pub fn add_field(&mut self, field: Field) {
        self.fields
            .entry(field.tag.clone())
            .or_default()
            .push(field);
    }

    /// Iterate over fields matching a specific tag
    pub fn fields_by_tag(&self, tag: &str) -> impl Iterator<Item = &Field> {
        self.fields.get(tag).map(|v| v.iter()).into_iter().flatten()
    }

    /// Select values by tag and subfield codes.
    ///
    /// Returns one entry per field instance: for a control field the whole
    /// value, for a data field the values of the subfields whose code is in
    /// `codes`, in the order they appear in the field. An empty `codes`
    /// selects every subfield.
    #[must_use]
    pub fn select(&self, tag: &str, codes: &str) -> Vec<Vec<&str>> {
        if is_control_tag(tag) {
            return self
                .get_control_field(tag)
                .map(|value| vec![vec![value]])
                .unwrap_or_default();
        }

        self.fields_by_tag(tag)
            .map(|field| {
                field
                    .subfields()
                    .filter(|sf| codes.is_empty() || codes.contains(sf.code))
                    .map(|sf| sf.value.as_str())
                    .collect::<Vec<_>>()
            })
            .filter(|values| !values.is_empty())
            .collect()
    }
}

impl Field {
    /// Create a new data field
    #[must_use]
    pub fn new(tag: String, indicator1: char, indicator2: char) -> Self {
        Field {
            tag,
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        }
    }

    /// Create a builder for constructing fields fluently
    ///
    /// # Examples
    ///
    /// ```
    /// use biblio_ingest::marc::Field;
    ///
    /// let field = Field::builder("245", '1', '0')
    ///     .subfield('a', "The Great Gatsby")
    ///     .subfield('c', "F. Scott Fitzgerald")
    ///     .build();
    /// assert_eq!(field.get_subfield('c'), Some("F. Scott Fitzgerald"));
    /// ```
    #[must_use]
    pub fn builder(tag: &str, indicator1: char, indicator2: char) -> FieldBuilder {
        FieldBuilder {
            field: Field::new(tag.to_string(), indicator1, indicator2),
        }
    }

    /// Add a subfield
    pub fn add_subfield(&mut self, code: char, value: String) {
        self.subfields.push(Subfield { code, value });
    }

    /// Get first value for a subfield code
    #[must_use]
    pub fn get_subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// First value for a subfield code, or an empty string.
    #[must_use]
    pub fn subfield_or_empty(&self, code: char) -> &str {
        self.get_subfield(code).unwrap_or_default()
    }

    /// Iterate over all subfields
    pub fn subfields(&self) -> impl Iterator<Item = &Subfield> {
        self.subfields.iter()
    }
}

/// Builder for [`Field`]
#[derive(Debug)]
pub struct FieldBuilder {
    field: Field,
}

impl FieldBuilder {
    /// Add a subfield
    #[must_use]
    pub fn subfield(mut self, code: char, value: &str) -> Self {
        self.field.add_subfield(code, value.to_string());
        self
    }

    /// Build the field
    #[must_use]
    pub fn build(self) -> Field {
        self.field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MarcRecord {
        let mut record = MarcRecord::new(Leader::default());
        record.add_control_field("001".to_string(), "990026671500206761".to_string());
        record.add_field(
            Field::builder("245", '1', '0')
                .subfield('a', "Spice it up!")
                .subfield('c', "Paquito")
                .subfield('b', "the best of Paquito D'Rivera.")
                .build(),
        );
        record.add_field(Field::builder("650", ' ', '0').subfield('a', "Jazz.").build());
        record.add_field(
            Field::builder("650", ' ', '0')
                .subfield('x', "History")
                .build(),
        );
        record
    }

    #[test]
    fn test_control_number() {
        assert_eq!(sample().control_number(), "990026671500206761");
        assert_eq!(MarcRecord::new(Leader::default()).control_number(), "");
    }

    #[test]
    fn test_select_preserves_subfield_order() {
        let record = sample();
        let selected = record.select("245", "ab");
        assert_eq!(
            selected,
            vec![vec!["Spice it up!", "the best of Paquito D'Rivera."]]
        );
    }

    #[test]
    fn test_select_skips_fields_without_matching_subfields() {
        let record = sample();
        assert_eq!(record.select("650", "a"), vec![vec!["Jazz."]]);
        assert_eq!(record.select("650", "").len(), 2);
        assert!(record.select("700", "a").is_empty());
    }

    #[test]
    fn test_select_control_field() {
        let record = sample();
        assert_eq!(record.select("001", ""), vec![vec!["990026671500206761"]]);
        assert!(record.select("008", "").is_empty());
    }

    #[test]
    fn test_is_control_tag() {
        assert!(is_control_tag("001"));
        assert!(is_control_tag("008"));
        assert!(!is_control_tag("010"));
        assert!(!is_control_tag("LDR"));
    }
}
