//! DSpace items harvested over OAI-PMH as METS packages.
//!
//! Descriptive metadata sits in the MODS section of each package, at
//! `metadata/mets/dmdSec/mdWrap/xmlData/mods`.

use crate::error::{IngestError, Result};
use crate::generate::{after_prefix, generate_xml, normalize_space, oai_identifier};
use crate::pipeline::{Generator, RecordSink};
use crate::record::{skip_empty, Contributor, Link, Record};
use crate::xml::XmlNode;
use std::io::BufRead;

/// Source name for repository items.
pub const SOURCE: &str = "DSpace@MIT";

/// Handle resolver the item handle is appended to.
pub const SOURCE_LINK_BASE: &str = "https://hdl.handle.net/";

const HANDLE_PREFIX: &str = "dspace.mit.edu:";
const URI_LINK: &str = "Digital object URI";
const MODS_PATH: [&str; 6] = ["metadata", "mets", "dmdSec", "mdWrap", "xmlData", "mods"];

/// Streams normalized records out of a DSpace METS harvest.
#[derive(Debug)]
pub struct DspaceGenerator<R: BufRead> {
    reader: Option<R>,
}

impl<R: BufRead> DspaceGenerator<R> {
    /// Read a harvest from `reader`.
    pub fn new(reader: R) -> Self {
        DspaceGenerator {
            reader: Some(reader),
        }
    }
}

impl<R: BufRead + Send> Generator for DspaceGenerator<R> {
    fn generate(&mut self, sink: &RecordSink) -> Result<()> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| IngestError::Pipeline("DSpace input already consumed".to_string()))?;
        generate_xml(reader, "dspace", sink, map)?;
        Ok(())
    }
}

/// Map one OAI `record` element.
///
/// # Errors
///
/// Returns [`IngestError::Skipped`] for deleted records, records without a
/// MODS section and header identifiers without a handle.
pub fn map(node: &XmlNode) -> Result<Record> {
    let header = oai_identifier(node);
    if node.first(&["header"]).and_then(|h| h.attr("status")) == Some("deleted") {
        return Err(IngestError::skipped(header, "record has been deleted"));
    }
    let handle = after_prefix(&header, HANDLE_PREFIX)?;
    let mods = node
        .first(&MODS_PATH)
        .ok_or_else(|| IngestError::skipped(&header, "record has no MODS section"))?;

    let mut record = Record {
        identifier: header.replace('/', "-"),
        source: SOURCE.to_string(),
        source_link: format!("{SOURCE_LINK_BASE}{handle}"),
        title: mods.text_at(&["titleInfo", "title"]),
        content_type: mods.text_at(&["genre"]),
        contributors: contributors(mods),
        languages: skip_empty(
            mods.path(&["language", "languageTerm"])
                .into_iter()
                .map(|term| term.text().trim().to_string())
                .collect(),
        ),
        publication_date: mods.text_at(&["originInfo", "dateIssued"]),
        subjects: skip_empty(
            mods.path(&["subject", "topic"])
                .into_iter()
                .map(|topic| topic.text().trim().to_string())
                .collect(),
        ),
        summary: skip_empty(
            mods.children_named("abstract")
                .map(|summary| normalize_space(&summary.inner_text()))
                .collect(),
        ),
        ..Record::default()
    };

    for identifier in mods.children_named("identifier") {
        let value = identifier.text().trim().to_string();
        if value.is_empty() {
            continue;
        }
        match identifier.attr_or_empty("type") {
            "citation" => record.citation = value,
            "doi" => record.dois.push(value),
            "isbn" => record.isbns.push(value),
            "issn" => record.issns.push(value),
            "oclc" => record.oclcs.push(value),
            "uri" => record.links.push(Link {
                kind: URI_LINK.to_string(),
                text: URI_LINK.to_string(),
                url: value,
                restrictions: String::new(),
            }),
            _ => {},
        }
    }
    Ok(record)
}

fn contributors(mods: &XmlNode) -> Vec<Contributor> {
    mods.children_named("name")
        .filter_map(|name| {
            let value = name.text_at(&["namePart"]);
            if value.is_empty() {
                return None;
            }
            Some(Contributor::new(name.text_at(&["role", "roleTerm"]), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_element;

    const ITEM: &str = r#"<record>
      <header><identifier>oai:dspace.mit.edu:1721.1/128382</identifier></header>
      <metadata><mets:mets xmlns:mets="http://www.loc.gov/METS/"><mets:dmdSec><mets:mdWrap>
        <mets:xmlData><mods:mods xmlns:mods="http://www.loc.gov/mods/v3">
          <mods:name><mods:namePart>Shields, Jack</mods:namePart>
            <mods:role><mods:roleTerm type="text">advisor</mods:roleTerm></mods:role></mods:name>
          <mods:name><mods:namePart/></mods:name>
          <mods:identifier type="uri">https://hdl.handle.net/1721.1/128382</mods:identifier>
          <mods:identifier type="doi">10.1000/182</mods:identifier>
          <mods:identifier type="citation">Shields, J. (2020).</mods:identifier>
          <mods:abstract>  A study
             of things.  </mods:abstract>
          <mods:abstract/>
          <mods:originInfo><mods:dateIssued>2020</mods:dateIssued></mods:originInfo>
          <mods:genre>Thesis</mods:genre>
          <mods:language><mods:languageTerm>en_US</mods:languageTerm></mods:language>
          <mods:subject><mods:topic>Physics.</mods:topic></mods:subject>
          <mods:titleInfo><mods:title>Thermal things</mods:title></mods:titleInfo>
        </mods:mods></mets:xmlData>
      </mets:mdWrap></mets:dmdSec></mets:mets></metadata></record>"#;

    #[test]
    fn test_map_item() {
        let record = map(&parse_element(ITEM.as_bytes(), "record").unwrap()).unwrap();
        assert_eq!(record.identifier, "oai:dspace.mit.edu:1721.1-128382");
        assert_eq!(record.source_link, "https://hdl.handle.net/1721.1/128382");
        assert_eq!(record.title, "Thermal things");
        assert_eq!(record.content_type, "Thesis");
        assert_eq!(record.contributors, vec![Contributor::new("advisor", "Shields, Jack")]);
        assert_eq!(record.summary, vec!["A study of things.".to_string()]);
        assert_eq!(record.dois, vec!["10.1000/182".to_string()]);
        assert_eq!(record.citation, "Shields, J. (2020).");
        assert_eq!(record.links[0].kind, "Digital object URI");
        assert_eq!(record.languages, vec!["en_US".to_string()]);
        assert_eq!(record.subjects, vec!["Physics.".to_string()]);
        assert_eq!(record.publication_date, "2020");
    }

    #[test]
    fn test_foreign_identifier_is_skipped() {
        let xml = ITEM.replace("oai:dspace.mit.edu:", "oai:elsewhere:");
        let err = map(&parse_element(xml.as_bytes(), "record").unwrap()).unwrap_err();
        assert!(matches!(err, IngestError::Skipped { .. }));
    }
}
