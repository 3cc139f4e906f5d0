//! The normalized record every source format is mapped into.
//!
//! A [`Record`] is built in one mapping call from one source record and is
//! self-contained. It serializes to a flat JSON object; every attribute except
//! `source`, `source_link` and `title` is omitted when empty, and the same
//! shape deserializes back (the JSON generator re-ingests prior exports).

use serde::{Deserialize, Serialize};

/// A normalized bibliographic or archival record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    /// Source system identifier, also the search-engine document id.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub identifier: String,
    /// Stable name of the source system.
    pub source: String,
    /// Resolvable link back to the record in its source system.
    pub source_link: String,
    /// Title proper.
    pub title: String,
    /// Variant and uniform titles.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternate_titles: Vec<String>,
    /// People and organizations responsible for the work.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contributors: Vec<Contributor>,
    /// Subject headings.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
    /// International Standard Book Numbers.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub isbns: Vec<String>,
    /// International Standard Serial Numbers.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issns: Vec<String>,
    /// Digital Object Identifiers.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dois: Vec<String>,
    /// OCLC numbers with the system prefix stripped.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub oclcs: Vec<String>,
    /// Library of Congress Control Number.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub lccn: String,
    /// Country of publication, translated from its code.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub country_of_publication: String,
    /// Languages of the material, translated from their codes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    /// Publication or creation date as given by the source.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub publication_date: String,
    /// Broad kind of material, such as "Text" or "Archival collection".
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    /// Classification numbers.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub call_numbers: Vec<String>,
    /// Edition statement.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub edition: String,
    /// Publication statements.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imprint: Vec<String>,
    /// Extent and physical details.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub physical_description: String,
    /// Current and former frequencies of a serial.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub publication_frequency: Vec<String>,
    /// Dates or sequential designation of a serial.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub numbering: String,
    /// General notes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    /// Formatted contents notes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contents: Vec<String>,
    /// Abstracts and summaries.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub summary: Vec<String>,
    /// Physical formats, collected from holdings.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<String>,
    /// "Fiction" or "Nonfiction", for books.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub literary_form: String,
    /// Places associated with the work.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_place: Vec<String>,
    /// Bibliographies the work is cited in.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub in_bibliography: Vec<String>,
    /// Series and linked works.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_items: Vec<RelatedItem>,
    /// Online copies and related resources.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    /// Physical copies and where they are kept.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub holdings: Vec<Holding>,
    /// Preferred citation.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub citation: String,
}

/// A creator or contributor, classified by a mapper-specific kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contributor {
    /// Role, for example "author" or "Creator".
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Name or heading.
    pub value: String,
}

impl Contributor {
    /// Create a contributor of the given kind.
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Contributor {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// A related work, such as a preceding title or a host item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelatedItem {
    /// Relation, for example "Series" or "Preceding title".
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Titles or headings of the related work.
    pub value: Vec<String>,
}

/// An online access point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Link {
    /// Link type, for example "Digital object".
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Link label.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Target address.
    pub url: String,
    /// Access restrictions on the target.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub restrictions: String,
}

/// Where a physical copy can be found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Holding {
    /// Library or storage location.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub location: String,
    /// Collection within the location.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub collection: String,
    /// Shelf call number.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub call_number: String,
    /// Summary of the volumes held.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub summary: String,
    /// Public notes.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
    /// Physical format of the copy.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub format: String,
}

/// Drop entries that are empty or whitespace only, keeping order.
#[must_use]
pub fn skip_empty(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .filter(|value| !value.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_record_keeps_mandatory_keys() {
        let value = serde_json::to_value(Record::default()).unwrap();
        assert_eq!(
            value,
            json!({"source": "", "source_link": "", "title": ""})
        );
    }

    #[test]
    fn test_populated_fields_serialize() {
        let record = Record {
            identifier: "990026671500206761".to_string(),
            title: "Spice it up!".to_string(),
            contributors: vec![Contributor::new("author", "D'Rivera, Paquito, 1948-")],
            links: vec![Link {
                kind: "unknown".to_string(),
                url: "http://example.com".to_string(),
                ..Link::default()
            }],
            ..Record::default()
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["identifier"], "990026671500206761");
        assert_eq!(value["contributors"][0]["kind"], "author");
        assert_eq!(value["links"][0], json!({"kind": "unknown", "url": "http://example.com"}));
        assert!(value.get("holdings").is_none());
    }

    #[test]
    fn test_partial_json_deserializes() {
        let record: Record = serde_json::from_str(r#"{"title": "A"}"#).unwrap();
        assert_eq!(record.title, "A");
        assert!(record.source.is_empty());
    }

    #[test]
    fn test_skip_empty() {
        let values = vec!["a".to_string(), " ".to_string(), String::new(), "b".to_string()];
        assert_eq!(skip_empty(values), vec!["a".to_string(), "b".to_string()]);
    }
}
