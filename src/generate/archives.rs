//! Finding aids harvested from ArchivesSpace over OAI-PMH.
//!
//! The harvest comes in one of two dialects, selected with [`Dialect`]:
//! full EAD documents, or MODS descriptions of the same collections. Both
//! share the OAI header, the identifier scheme and the source link.

use crate::codes::CodeList;
use crate::error::{IngestError, Result};
use crate::generate::{after_prefix, generate_xml, normalize_space, oai_identifier};
use crate::pipeline::{Generator, RecordSink};
use crate::record::{skip_empty, Contributor, Holding, Link, Record};
use crate::xml::XmlNode;
use std::collections::HashMap;
use std::io::{BufRead, Read};

/// Source name for archival records.
pub const SOURCE: &str = "MIT ArchivesSpace";

/// Public interface the header identifier path is appended to.
pub const SOURCE_LINK_BASE: &str = "https://archivesspace.mit.edu";

/// Prefix of local identifiers.
pub const IDENTIFIER_PREFIX: &str = "MIT:archivesspace:";

const OAI_PREFIX: &str = "oai:mit/";
const LINK_KIND: &str = "Digital object";

const BUNDLED_RELATORS: &str = include_str!("../../config/aspace_relators.json");

/// Metadata format of an archives harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// Encoded Archival Description.
    #[default]
    Ead,
    /// Metadata Object Description Schema.
    Mods,
}

/// Relator code to role label table.
///
/// # Errors
///
/// Returns [`IngestError::Config`] if the document is not a JSON object of
/// strings.
pub fn load_relators(reader: impl Read) -> Result<HashMap<String, String>> {
    serde_json::from_reader(reader)
        .map_err(|e| IngestError::Config(format!("Could not parse relator table: {e}")))
}

/// Streams normalized records out of an archives harvest.
#[derive(Debug)]
pub struct ArchivesGenerator<R: BufRead> {
    reader: Option<R>,
    dialect: Dialect,
    relators: HashMap<String, String>,
    languages: CodeList,
}

impl<R: BufRead> ArchivesGenerator<R> {
    /// Read a harvest in the given dialect, using the bundled code tables.
    ///
    /// # Errors
    ///
    /// Returns an error if a bundled table does not load.
    pub fn new(reader: R, dialect: Dialect) -> Result<Self> {
        Ok(ArchivesGenerator {
            reader: Some(reader),
            dialect,
            relators: load_relators(BUNDLED_RELATORS.as_bytes())?,
            languages: CodeList::languages()?,
        })
    }

    /// Replace the relator table.
    #[must_use]
    pub fn with_relators(mut self, relators: HashMap<String, String>) -> Self {
        self.relators = relators;
        self
    }

    /// Map one OAI `record` element.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Skipped`] for deleted or empty records and for
    /// header identifiers outside the ArchivesSpace namespace.
    pub fn map(&self, node: &XmlNode) -> Result<Record> {
        let header = oai_identifier(node);
        if node.first(&["header"]).and_then(|h| h.attr("status")) == Some("deleted") {
            return Err(IngestError::skipped(header, "record has been deleted"));
        }
        let link = after_prefix(&header, OAI_PREFIX)?;
        let mut record = match self.dialect {
            Dialect::Ead => {
                let ead = node
                    .first(&["metadata", "ead"])
                    .ok_or_else(|| IngestError::skipped(&header, "record has no EAD document"))?;
                map_ead(ead, &self.relators)
            },
            Dialect::Mods => {
                let mods = node
                    .first(&["metadata", "mods"])
                    .ok_or_else(|| IngestError::skipped(&header, "record has no MODS document"))?;
                map_mods(mods, &self.languages)
            },
        };
        if record.identifier.is_empty() {
            record.identifier = local_identifier(link.trim_start_matches('/'));
        }
        record.source = SOURCE.to_string();
        record.source_link = format!("{SOURCE_LINK_BASE}{link}");
        Ok(record)
    }
}

impl<R: BufRead + Send> Generator for ArchivesGenerator<R> {
    fn generate(&mut self, sink: &RecordSink) -> Result<()> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| IngestError::Pipeline("Archives input already consumed".to_string()))?;
        let source = match self.dialect {
            Dialect::Ead => "archives",
            Dialect::Mods => "mods",
        };
        generate_xml(reader, source, sink, |node| self.map(node))?;
        Ok(())
    }
}

fn local_identifier(id: &str) -> String {
    format!("{IDENTIFIER_PREFIX}{}", id.trim().replace(' ', "."))
}

/// Whitespace-normalized text of every node, blanks dropped.
fn texts<'a>(nodes: impl IntoIterator<Item = &'a XmlNode>) -> Vec<String> {
    skip_empty(
        nodes
            .into_iter()
            .map(|node| normalize_space(&node.inner_text()))
            .collect(),
    )
}

fn text(node: Option<&XmlNode>) -> String {
    node.map(|n| normalize_space(&n.inner_text())).unwrap_or_default()
}

fn map_ead(ead: &XmlNode, relators: &HashMap<String, String>) -> Record {
    let empty = XmlNode::default();
    let archdesc = ead.child("archdesc").unwrap_or(&empty);
    let did = archdesc.child("did").unwrap_or(&empty);

    let unitid = did.text_at(&["unitid"]);
    let mut record = Record {
        identifier: if unitid.is_empty() {
            String::new()
        } else {
            local_identifier(&unitid)
        },
        title: text(did.child("unittitle")),
        citation: text(archdesc.first(&["prefercite", "p"])),
        content_type: format!("Archival {}", archdesc.attr_or_empty("level")),
        contributors: ead_contributors(did, relators),
        languages: ead_languages(did),
        links: ead_links(archdesc),
        notes: ead_notes(archdesc),
        physical_description: ead_extents(did),
        publication_date: texts(did.children_named("unitdate")).join(","),
        subjects: ead_subjects(archdesc),
        summary: texts(did.children_named("abstract")),
        ..Record::default()
    };

    let location = text(did.child("physloc"));
    if !location.is_empty() {
        record.holdings.push(Holding {
            location,
            ..Holding::default()
        });
    }
    record
}

fn ead_contributors(did: &XmlNode, relators: &HashMap<String, String>) -> Vec<Contributor> {
    const NAMES: [(&str, &str); 3] = [
        ("corpname", "Organization"),
        ("famname", "Family"),
        ("persname", "Person"),
    ];

    did.children_named("origination")
        .filter_map(|origination| {
            let (name, name_type) = NAMES.iter().find_map(|(element, name_type)| {
                origination
                    .child(element)
                    .filter(|name| !name.inner_text().trim().is_empty())
                    .map(|name| (name, *name_type))
            })?;
            let kind = name
                .attr("role")
                .and_then(|role| relators.get(role))
                .map(String::as_str)
                .or_else(|| origination.attr("label").filter(|label| !label.is_empty()))
                .unwrap_or(name_type);
            Some(Contributor::new(kind, normalize_space(&name.inner_text())))
        })
        .collect()
}

fn ead_languages(did: &XmlNode) -> Vec<String> {
    let mut languages = Vec::new();
    for material in did.children_named("langmaterial") {
        languages.push(normalize_space(&material.text()));
        languages.extend(texts(material.children_named("language")));
    }
    skip_empty(languages)
}

/// Digital objects anywhere in the container list, HTTP links only.
fn ead_links(archdesc: &XmlNode) -> Vec<Link> {
    archdesc
        .children_named("dsc")
        .flat_map(|dsc| dsc.descendants("dao"))
        .filter_map(|dao| {
            let url = dao.attr_or_empty("href").trim();
            url.starts_with("http").then(|| Link {
                kind: LINK_KIND.to_string(),
                text: text(dao.first(&["daodesc", "p"])),
                url: url.to_string(),
                restrictions: String::new(),
            })
        })
        .collect()
}

fn ead_notes(archdesc: &XmlNode) -> Vec<String> {
    let mut notes = Vec::new();
    for note in archdesc
        .children_named("accessrestrict")
        .chain(archdesc.children_named("userestrict"))
    {
        let head = text(note.child("head"));
        let body = texts(note.children_named("p")).join(" ");
        notes.push(format!("{head}: {body}"));
    }
    for history in archdesc.children_named("bioghist") {
        let paragraphs = texts(history.children_named("p"));
        if paragraphs.is_empty() {
            continue;
        }
        let mut note = vec![text(history.child("head"))];
        note.extend(paragraphs);
        notes.push(note.join("\n"));
    }
    notes
}

fn ead_extents(did: &XmlNode) -> String {
    did.path(&["physdesc", "extent"])
        .into_iter()
        .map(|extent| {
            normalize_space(&extent.inner_text())
                .trim_matches(|c| c == '(' || c == ')')
                .to_string()
        })
        .filter(|extent| !extent.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

fn ead_subjects(archdesc: &XmlNode) -> Vec<String> {
    const FACETS: [&str; 6] = ["subject", "corpname", "famname", "geogname", "title", "persname"];

    let Some(access) = archdesc.child("controlaccess") else {
        return Vec::new();
    };
    FACETS
        .iter()
        .flat_map(|facet| texts(access.children_named(facet)))
        .collect()
}

fn map_mods(mods: &XmlNode, languages: &CodeList) -> Record {
    let mut titles = mods.children_named("titleInfo");
    let title = text(titles.next().and_then(|info| info.child("title")));
    let alternate_titles = texts(titles.filter_map(|info| info.child("title")));

    let identifier = mods.text_at(&["identifier"]);
    let mut record = Record {
        identifier: if identifier.is_empty() {
            String::new()
        } else {
            local_identifier(&identifier)
        },
        title,
        alternate_titles,
        content_type: text(mods.child("typeOfResource")),
        contributors: mods_contributors(mods),
        subjects: mods_subjects(mods),
        languages: mods_languages(mods, languages),
        physical_description: texts(mods.path(&["physicalDescription", "extent"])).join("; "),
        notes: texts(mods.children_named("note")),
        summary: texts(mods.children_named("abstract")),
        publication_date: mods_dates(mods),
        links: mods_links(mods),
        ..Record::default()
    };
    for location in texts(mods.path(&["location", "physicalLocation"])) {
        record.holdings.push(Holding {
            location,
            ..Holding::default()
        });
    }
    record
}

fn mods_contributors(mods: &XmlNode) -> Vec<Contributor> {
    mods.children_named("name")
        .filter_map(|name| {
            let value = texts(name.children_named("namePart")).join(" ");
            if value.is_empty() {
                return None;
            }
            let role = text(name.first(&["role", "roleTerm"]));
            let kind = if role.is_empty() {
                match name.attr_or_empty("type") {
                    "personal" => "Person",
                    "corporate" => "Organization",
                    "family" => "Family",
                    _ => "Creator",
                }
                .to_string()
            } else {
                role
            };
            Some(Contributor::new(kind, value))
        })
        .collect()
}

fn mods_subjects(mods: &XmlNode) -> Vec<String> {
    let mut subjects: Vec<String> = Vec::new();
    for subject in mods.children_named("subject") {
        for facet in subject.children() {
            let value = match facet.name.as_str() {
                "topic" | "geographic" | "temporal" | "genre" => text(Some(facet)),
                "name" => texts(facet.children_named("namePart")).join(" "),
                _ => continue,
            };
            if !value.is_empty() && !subjects.contains(&value) {
                subjects.push(value);
            }
        }
    }
    subjects
}

fn mods_languages(mods: &XmlNode, languages: &CodeList) -> Vec<String> {
    mods.path(&["language", "languageTerm"])
        .into_iter()
        .map(|term| {
            let value = normalize_space(&term.inner_text());
            if term.attr("type") == Some("code") {
                languages.translate(&value)
            } else {
                value
            }
        })
        .filter(|value| !value.is_empty())
        .collect()
}

fn mods_dates(mods: &XmlNode) -> String {
    let Some(origin) = mods.child("originInfo") else {
        return String::new();
    };
    let dates: Vec<String> = origin
        .children()
        .filter(|node| matches!(node.name.as_str(), "dateCreated" | "dateIssued"))
        .map(|node| normalize_space(&node.inner_text()))
        .filter(|date| !date.is_empty())
        .collect();
    dates.join(",")
}

fn mods_links(mods: &XmlNode) -> Vec<Link> {
    mods.path(&["location", "url"])
        .into_iter()
        .filter_map(|url| {
            let href = url.inner_text().trim().to_string();
            href.starts_with("http").then(|| Link {
                kind: LINK_KIND.to_string(),
                text: url.attr_or_empty("displayLabel").to_string(),
                url: href,
                restrictions: String::new(),
            })
        })
        .collect()
}
