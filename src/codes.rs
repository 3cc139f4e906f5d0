//! Code tables used while mapping MARC records.
//!
//! - [`CodeList`]: MARC language and country code lists, loaded from XML
//! - [`HoldingsLookup`]: location, collection and format codes found in
//!   holdings fields, with [`MitHoldings`] as the built-in table

use crate::error::{IngestError, Result};
use crate::xml::XmlRecords;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::io::BufRead;

const BUNDLED_LANGUAGES: &str = include_str!("../config/languages.xml");
const BUNDLED_COUNTRIES: &str = include_str!("../config/countries.xml");

/// A code to display-name table.
///
/// Built from any XML document in which each entry is an element holding
/// `code` and `name` children:
///
/// ```xml
/// <languages>
///   <language><name>Abkhaz</name><code>abk</code></language>
/// </languages>
/// ```
#[derive(Debug, Clone, Default)]
pub struct CodeList {
    names: HashMap<String, String>,
}

impl CodeList {
    /// Read every `entry` element from an XML stream.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if the document is malformed.
    pub fn from_reader(reader: impl BufRead, entry: &str) -> Result<Self> {
        let mut names = HashMap::new();
        for node in XmlRecords::new(reader, entry) {
            let node = node.map_err(|e| {
                IngestError::Config(format!("Could not read {entry} code list: {e}"))
            })?;
            let code = node.text_at(&["code"]);
            let name = node.text_at(&["name"]);
            if !code.is_empty() {
                names.insert(code, name);
            }
        }
        Ok(CodeList { names })
    }

    /// The MARC language code list compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled list does not parse.
    pub fn languages() -> Result<Self> {
        Self::from_reader(BUNDLED_LANGUAGES.as_bytes(), "language")
    }

    /// The MARC country code list compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled list does not parse.
    pub fn countries() -> Result<Self> {
        Self::from_reader(BUNDLED_COUNTRIES.as_bytes(), "country")
    }

    /// Display name for a code, if known.
    #[must_use]
    pub fn name(&self, code: &str) -> Option<&str> {
        self.names
            .get(code)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Translate a single code. Unknown codes are returned unchanged.
    #[must_use]
    pub fn translate(&self, code: &str) -> String {
        self.name(code).unwrap_or(code).to_string()
    }

    /// Translate codes element by element, preserving order and length.
    #[must_use]
    pub fn translate_all(&self, codes: &[String]) -> Vec<String> {
        codes.iter().map(|code| self.translate(code)).collect()
    }

    /// Number of known codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(String, String)> for CodeList {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        CodeList {
            names: iter.into_iter().collect(),
        }
    }
}

/// Location name for online-only holdings; these never carry a format.
pub const INTERNET_RESOURCE: &str = "Internet Resource";

/// Resolves the codes found in holdings fields.
pub trait HoldingsLookup: Send + Sync {
    /// Library name for a location code.
    fn location(&self, code: &str) -> String;

    /// Collection name for a collection code. Some collections are named
    /// differently depending on the location code they sit in.
    fn collection(&self, code: &str, location_code: &str) -> String;

    /// Physical format for an item, given the already resolved location name.
    fn format(&self, location: &str, code: &str) -> String;
}

lazy_static! {
    static ref LOCATIONS: HashMap<&'static str, &'static str> = [
        ("HUM", "Hayden Library"),
        ("RBR", "Hayden Library"),
        ("SCI", "Hayden Library"),
        ("MIT50", "MIT Administrative Library"),
        ("ARC", "Institute Archives"),
        ("ACQ", "Institute Archives"),
        ("ENG", "Barker Library"),
        ("CAT", "Cataloging and Metadata Services"),
        ("DEW", "Dewey Library"),
        ("DIR", "Director's Office"),
        ("DOC", "Document Services"),
        ("ILB", "Interlibrary Borrowing"),
        ("LSA", "Library Storage Annex"),
        ("NET", INTERNET_RESOURCE),
        ("MUS", "Lewis Music Library"),
        ("PHY", "Physics Department Reading Room"),
        ("RTC", "Rotch Library"),
        ("RVC", "Rotch Visual Collections"),
        ("SPC", "Space Cntr: Ask library staff"),
        ("OFFIC", "Office delivery"),
    ]
    .into_iter()
    .collect();

    static ref COLLECTIONS: HashMap<&'static str, &'static str> = [
        ("STACK", "Stacks"),
        ("ATLCS", "Atlas Case"),
        ("AUDBK", "Audiobooks"),
        ("JRNAL", "Journal Collection"),
        ("BRWS", "Browsery"),
        ("CNSUS", "Census Collection"),
        ("CIRCD", "Service Desk"),
        ("DETEC", "Detective Fiction Collection"),
        ("EJ", "Electronic Journal"),
        ("GIS", "GIS Collection"),
        ("GOV", "Government Documents"),
        ("GRNVL", "Graphic Novel Collection"),
        ("HDCBX", "Harvard Depository Boxed Items"),
        ("ICPSR", "ICPSR Codebooks"),
        ("IMPLS", "Impulse Borrowing Display"),
        ("LSA4", "Journal Collection"),
        ("OVRSZ", "Oversize Materials"),
        ("LMTED", "Limited Access Collection"),
        ("MAPRM", "Map Room"),
        ("MFORM", "Microforms"),
        ("MEDIA", "Media"),
        ("NCIP", "BLC ILB Item"),
        ("NEWBK", "Science New Books Display"),
        ("NOLN1", "Noncirculating Collection 1"),
        ("NOLN2", "Noncirculating Collection 2"),
        ("NOLN3", "Noncirculating Collection 3"),
        ("OCC", "Off Campus Collection"),
        ("OCCBX", "Off Campus Collection Boxed Items"),
        ("OFFCT", "Offsite Cataloging"),
        ("PAMPH", "Pamphlet Collection"),
        ("PRECT", "Pre-cataloged Collection"),
        ("REF", "Reference Collection"),
        ("RSERV", "Reserve Stacks"),
        ("SWING", "Basement Grammar Books"),
        ("TRAVL", "Travel Collection"),
        ("UNCAT", "Uncataloged Materials - see Librarian"),
        ("UNKNW", "Problems Materials - see Librarian"),
        ("WSTM", "Women in Science, Technology, and Medicine"),
    ]
    .into_iter()
    .collect();

    static ref FORMATS: HashMap<&'static str, &'static str> = [
        ("BOOKS", "Print volume"),
        ("REGULAR", "Print volume"),
        ("ATLAS", "Atlas"),
        ("AUDIO", "Audio tape"),
        ("AUDTAPE", "Audio tape"),
        ("CD", "Compact disc"),
        ("CDROM", "CD-ROM"),
        ("DSKETTE", "Diskette"),
        ("DVD", "DVD-ROM"),
        ("FICHE", "Microfiche"),
        ("FOLIO", "Oversized print volume"),
        ("OVRSIZE", "Oversized print volume"),
        ("MAP", "Map sheet"),
        ("MFILM", "Microfilm"),
        ("RECORD", "Audio record"),
        ("SCORE", "Musical score"),
        ("SMALL", "Undersized print volume"),
        ("VDISC", "Videodisc"),
        ("VHS", "VHS"),
    ]
    .into_iter()
    .collect();
}

// Collections whose name depends on the location code.
fn located_collection(code: &str, location_code: &str) -> Option<&'static str> {
    match (code, location_code) {
        ("JRNAL", "HUM") => Some("Humanities Journals"),
        ("JRNAL", "SCI") => Some("Science Journals"),
        ("PRECT", "HUM") => Some("Humanities Pre-cataloged Collection"),
        ("PRECT", "SCI") => Some("Science Pre-cataloged Collection"),
        _ => None,
    }
}

/// Default format for physical items with an unknown format code.
pub const DEFAULT_FORMAT: &str = "Print volume";

/// The MIT Libraries location, collection and format tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct MitHoldings;

impl HoldingsLookup for MitHoldings {
    fn location(&self, code: &str) -> String {
        LOCATIONS.get(code).map_or_else(|| code.to_string(), |name| (*name).to_string())
    }

    fn collection(&self, code: &str, location_code: &str) -> String {
        located_collection(code, location_code)
            .or_else(|| COLLECTIONS.get(code).copied())
            .map_or_else(|| code.to_string(), str::to_string)
    }

    fn format(&self, location: &str, code: &str) -> String {
        if location == INTERNET_RESOURCE {
            return String::new();
        }
        FORMATS.get(code).copied().unwrap_or(DEFAULT_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_passes_unknown_codes_through() {
        let list: CodeList = [("abk".to_string(), "Abkhaz".to_string())].into_iter().collect();
        let translated = list.translate_all(&["abk".to_string(), String::new()]);
        assert_eq!(translated, vec!["Abkhaz".to_string(), String::new()]);
        assert_eq!(list.translate("zzz"), "zzz");
    }

    #[test]
    fn test_code_list_from_xml() {
        let xml = r#"<codelist><languages>
            <language><name>English</name><code>eng</code></language>
            <language><name>French</name><code>fre</code></language>
            <language><name>Orphan</name></language>
        </languages></codelist>"#;
        let list = CodeList::from_reader(xml.as_bytes(), "language").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.name("fre"), Some("French"));
    }

    #[test]
    fn test_bundled_lists() {
        let languages = CodeList::languages().unwrap();
        assert_eq!(languages.translate("eng"), "English");
        let countries = CodeList::countries().unwrap();
        assert_eq!(countries.translate("nyu"), "New York (State)");
    }

    #[test]
    fn test_locations() {
        let lookup = MitHoldings;
        assert_eq!(lookup.location("HUM"), "Hayden Library");
        assert_eq!(lookup.location("ENG"), "Barker Library");
        assert_eq!(lookup.location("XYZ"), "XYZ");
    }

    #[test]
    fn test_collections_depend_on_location() {
        let lookup = MitHoldings;
        assert_eq!(lookup.collection("JRNAL", "HUM"), "Humanities Journals");
        assert_eq!(lookup.collection("JRNAL", "SCI"), "Science Journals");
        assert_eq!(lookup.collection("JRNAL", "ENG"), "Journal Collection");
        assert_eq!(lookup.collection("GRNVL", "HUM"), "Graphic Novel Collection");
        assert_eq!(lookup.collection("NOPE", "HUM"), "NOPE");
    }

    #[test]
    fn test_formats() {
        let lookup = MitHoldings;
        assert_eq!(lookup.format("Hayden Library", "DVD"), "DVD-ROM");
        assert_eq!(lookup.format("Hayden Library", ""), DEFAULT_FORMAT);
        assert_eq!(lookup.format(INTERNET_RESOURCE, "DVD"), "");
    }
}
