//! MARC 21 bibliographic records to normalized records.
//!
//! [`MarcMapper`] holds the rule table, the code lists and the holdings
//! lookup, and maps one raw record at a time. [`MarcGenerator`] drives it over
//! a binary MARC stream.

use crate::codes::{CodeList, HoldingsLookup, MitHoldings};
use crate::error::{IngestError, Result};
use crate::generate::GenerateStats;
use crate::marc::{Field, MarcReader, MarcRecord};
use crate::pipeline::{Generator, RecordSink};
use crate::record::{Contributor, Holding, Link, Record, RelatedItem};
use crate::rules::RuleSet;
use std::io::Read;

/// Source name for catalog records.
pub const SOURCE: &str = "MIT Alma";

/// Discovery link, completed by the control number.
pub const SOURCE_LINK_BASE: &str =
    "https://mit.primo.exlibrisgroup.com/discovery/fulldisplay?vid=01MIT_INST:MIT&docid=alma";

/// Required length of the 008 fixed-length data elements.
pub const FIXED_FIELD_LENGTH: usize = 40;

/// Rule labels the mapper reads.
pub const RULE_LABELS: &[&str] = &[
    "title",
    "alternate_titles",
    "contributors",
    "related_place",
    "related_items",
    "in_bibliography",
    "subjects",
    "isbns",
    "issns",
    "dois",
    "oclc_number",
    "lccn",
    "place_of_publication",
    "languages",
    "call_numbers",
    "edition",
    "imprint",
    "physical_description",
    "publication_frequency",
    "publication_date",
    "numbering",
    "notes",
    "contents",
    "summary",
    "literary_form",
];

const OCLC_MARKER: &str = "OCoLC";
const OCLC_PREFIX: &str = "(OCoLC)";
const PRIMARY_HOLDINGS: &str = "852";
const SECONDARY_HOLDINGS: &str = "866";
const SECONDARY_FORMAT: &str = "Print volume";

/// Maps raw MARC records using a rule table and code lists.
pub struct MarcMapper {
    rules: RuleSet,
    languages: CodeList,
    countries: CodeList,
    holdings: Box<dyn HoldingsLookup>,
}

impl std::fmt::Debug for MarcMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarcMapper")
            .field("rules", &self.rules.len())
            .field("languages", &self.languages.len())
            .field("countries", &self.countries.len())
            .finish_non_exhaustive()
    }
}

impl MarcMapper {
    /// Create a mapper with the built-in holdings tables.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if the rule table lacks any label in
    /// [`RULE_LABELS`].
    pub fn new(rules: RuleSet, languages: CodeList, countries: CodeList) -> Result<Self> {
        rules.require(RULE_LABELS)?;
        Ok(MarcMapper {
            rules,
            languages,
            countries,
            holdings: Box::new(MitHoldings),
        })
    }

    /// A mapper using the rule table and code lists compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if a bundled table does not load.
    pub fn bundled() -> Result<Self> {
        Self::new(RuleSet::bundled()?, CodeList::languages()?, CodeList::countries()?)
    }

    /// Swap the holdings lookup tables.
    #[must_use]
    pub fn with_holdings(mut self, holdings: impl HoldingsLookup + 'static) -> Self {
        self.holdings = Box::new(holdings);
        self
    }

    fn values(&self, record: &MarcRecord, label: &str) -> Result<Vec<String>> {
        Ok(self.rules.get(label)?.extract(record))
    }

    fn first(&self, record: &MarcRecord, label: &str) -> Result<String> {
        Ok(self.values(record, label)?.into_iter().next().unwrap_or_default())
    }

    /// Map one raw record.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Skipped`] for deleted records, unknown record
    /// statuses, a malformed 008 and records without a title. A rule missing
    /// from the table gives [`IngestError::RuleNotFound`].
    pub fn map(&self, marc: &MarcRecord) -> Result<Record> {
        let id = marc.control_number();
        validate(marc)?;

        let mut record = Record {
            identifier: id.to_string(),
            source: SOURCE.to_string(),
            source_link: format!("{SOURCE_LINK_BASE}{id}"),
            ..Record::default()
        };

        record.title = self.first(marc, "title")?;
        if record.title.is_empty() {
            return Err(IngestError::skipped(id, "record has no title"));
        }

        record.oclcs = clean_oclcs(self.values(marc, "oclc_number")?);
        record.lccn = self.first(marc, "lccn")?.trim().to_string();
        record.alternate_titles = self.values(marc, "alternate_titles")?;
        record.contributors = self.contributors(marc)?;
        record.related_place = self.values(marc, "related_place")?;
        record.related_items = self.related_items(marc)?;
        record.in_bibliography = self.values(marc, "in_bibliography")?;
        record.subjects = self.values(marc, "subjects")?;
        record.isbns = self.values(marc, "isbns")?;
        record.issns = self.values(marc, "issns")?;
        record.dois = self.values(marc, "dois")?;

        if let Some(place) = self.values(marc, "place_of_publication")?.first() {
            record.country_of_publication = self
                .countries
                .translate(place.trim_matches(|c| c == ' ' || c == '|'));
        }
        record.languages = self
            .languages
            .translate_all(&self.values(marc, "languages")?);

        record.call_numbers = self.values(marc, "call_numbers")?;
        record.edition = self.first(marc, "edition")?;
        record.imprint = self.values(marc, "imprint")?;
        record.physical_description = self.first(marc, "physical_description")?;
        record.publication_frequency = self.values(marc, "publication_frequency")?;
        record.publication_date = self.first(marc, "publication_date")?;
        record.numbering = self.first(marc, "numbering")?;
        record.notes = self.values(marc, "notes")?;
        record.contents = self.values(marc, "contents")?;
        record.summary = self.values(marc, "summary")?;
        record.content_type = content_type(marc.leader.record_type).to_string();
        record.literary_form = literary_form(&self.values(marc, "literary_form")?).to_string();
        record.links = links(marc);
        record.holdings = self.holdings(marc);
        for holding in &record.holdings {
            if !holding.format.is_empty() && !record.format.contains(&holding.format) {
                record.format.push(holding.format.clone());
            }
        }

        Ok(record)
    }

    /// One contributor per matching field, kind taken from the rule field.
    fn contributors(&self, marc: &MarcRecord) -> Result<Vec<Contributor>> {
        let rule = self.rules.get("contributors")?;
        Ok(rule
            .fields
            .iter()
            .flat_map(|field| {
                field
                    .filter(marc)
                    .into_iter()
                    .filter(|value| !value.is_empty())
                    .map(move |value| Contributor::new(field.kind.clone(), value))
            })
            .collect())
    }

    /// One related item per rule field with any match.
    fn related_items(&self, marc: &MarcRecord) -> Result<Vec<RelatedItem>> {
        let rule = self.rules.get("related_items")?;
        Ok(rule
            .fields
            .iter()
            .filter_map(|field| {
                let value = field.filter(marc);
                (!value.is_empty()).then(|| RelatedItem {
                    kind: field.kind.clone(),
                    value,
                })
            })
            .collect())
    }

    /// Holdings from 852, each summary extended by the first 866 summary.
    /// Without any 852 the 866 fields stand in as holdings.
    fn holdings(&self, marc: &MarcRecord) -> Vec<Holding> {
        let secondary: Vec<Holding> = marc
            .fields_by_tag(SECONDARY_HOLDINGS)
            .map(|field| {
                let mut holding = self.holding(field);
                holding.format = SECONDARY_FORMAT.to_string();
                holding
            })
            .collect();

        let mut primary: Vec<Holding> = marc
            .fields_by_tag(PRIMARY_HOLDINGS)
            .map(|field| {
                let mut holding = self.holding(field);
                holding.format = self
                    .holdings
                    .format(&holding.location, field.subfield_or_empty('k'));
                holding
            })
            .collect();

        if primary.is_empty() {
            return secondary;
        }
        if let Some(extra) = secondary.first() {
            for holding in &mut primary {
                holding.summary = format!("{} {}", holding.summary, extra.summary);
            }
        }
        primary
    }

    fn holding(&self, field: &Field) -> Holding {
        let location_code = field.subfield_or_empty('b');
        Holding {
            location: self.holdings.location(location_code),
            collection: self
                .holdings
                .collection(field.subfield_or_empty('c'), location_code),
            call_number: field.subfield_or_empty('h').to_string(),
            summary: field.subfield_or_empty('a').to_string(),
            notes: field.subfield_or_empty('z').to_string(),
            format: String::new(),
        }
    }
}

/// Reject records the index must not receive.
fn validate(marc: &MarcRecord) -> Result<()> {
    let id = marc.control_number();
    if marc.leader.is_deleted() {
        return Err(IngestError::skipped(id, "record has been deleted"));
    }
    if marc.leader.accepted_status().is_none() {
        return Err(IngestError::skipped(
            id,
            format!("illegal record status '{}'", marc.leader.record_status),
        ));
    }
    if let Some(fixed) = marc.get_control_field("008") {
        let length = fixed.chars().count();
        if !fixed.is_empty() && length != FIXED_FIELD_LENGTH {
            return Err(IngestError::skipped(
                id,
                format!("illegal 008 field length of {length} characters: '{fixed}'"),
            ));
        }
    }
    Ok(())
}

/// Keep OCLC system numbers only, without their prefix.
#[must_use]
pub fn clean_oclcs(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .filter(|value| value.contains(OCLC_MARKER))
        .map(|value| value.replacen(OCLC_PREFIX, "", 1))
        .collect()
}

/// Content type from leader position 6.
#[must_use]
pub fn content_type(record_type: char) -> &'static str {
    match record_type {
        'c' | 'd' => "Musical score",
        'e' | 'f' => "Cartographic material",
        'g' => "Moving image",
        'i' | 'j' => "Sound recording",
        'k' => "Still image",
        'm' => "Computer file",
        'o' => "Kit",
        'p' => "Mixed materials",
        'r' => "Object",
        _ => "Text",
    }
}

/// Literary form from 008/33.
#[must_use]
pub fn literary_form(values: &[String]) -> &'static str {
    match values.first().map(String::as_str) {
        None => "",
        Some("0" | "s" | "e") => "nonfiction",
        Some(_) => "fiction",
    }
}

/// Online access points from 856 fields with a resource relationship.
fn links(marc: &MarcRecord) -> Vec<Link> {
    marc.fields_by_tag("856")
        .filter(|field| field.indicator1 == '4' && matches!(field.indicator2, '0' | '1'))
        .map(|field| {
            let kind = field.subfield_or_empty('3');
            Link {
                kind: if kind.is_empty() { "unknown" } else { kind }.to_string(),
                url: field.subfield_or_empty('u').to_string(),
                text: field.subfield_or_empty('y').to_string(),
                restrictions: field.subfield_or_empty('z').to_string(),
            }
        })
        .collect()
}

/// Streams normalized records out of binary MARC.
#[derive(Debug)]
pub struct MarcGenerator<R: Read> {
    reader: MarcReader<R>,
    mapper: MarcMapper,
}

impl<R: Read> MarcGenerator<R> {
    /// Read MARC from `reader` and map it with `mapper`.
    pub fn new(reader: R, mapper: MarcMapper) -> Self {
        MarcGenerator {
            reader: MarcReader::new(reader),
            mapper,
        }
    }
}

impl<R: Read + Send> Generator for MarcGenerator<R> {
    fn generate(&mut self, sink: &RecordSink) -> Result<()> {
        let mut stats = GenerateStats::default();
        loop {
            let mapped = match self.reader.read_record() {
                Ok(Some(marc)) => self.mapper.map(&marc),
                Ok(None) => break,
                Err(e) => Err(e),
            };
            stats.handle(sink, mapped)?;
        }
        stats.log("marc");
        Ok(())
    }
}
