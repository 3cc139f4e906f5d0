//! Streaming XML record splitting.
//!
//! Large harvest files hold thousands of records under one root element.
//! [`XmlRecords`] walks the token stream and yields each element with a given
//! local name as an owned [`XmlNode`] tree, so only one record is held in
//! memory at a time. Namespace prefixes are dropped everywhere: elements and
//! attributes are addressed by local name only.
//!
//! # Examples
//!
//! ```
//! use biblio_ingest::xml::XmlRecords;
//!
//! let doc = r#"<list><record id="1"><title>A</title></record><record id="2"/></list>"#;
//! let records: Vec<_> = XmlRecords::new(doc.as_bytes(), "record")
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(records.len(), 2);
//! assert_eq!(records[0].attr("id"), Some("1"));
//! assert_eq!(records[0].child("title").unwrap().text(), "A");
//! ```

use crate::error::{IngestError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt;
use std::io::BufRead;

/// Content of an element, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlContent {
    /// A child element.
    Element(XmlNode),
    /// Character data (text or CDATA), already unescaped.
    Text(String),
}

/// An owned XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    /// Local element name.
    pub name: String,
    /// Attributes as `(local name, value)` pairs.
    pub attributes: Vec<(String, String)>,
    /// Mixed content.
    pub content: Vec<XmlContent>,
}

impl XmlNode {
    /// Create an empty element.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        XmlNode {
            name: name.into(),
            ..XmlNode::default()
        }
    }

    /// Attribute value by local name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value, or an empty string.
    #[must_use]
    pub fn attr_or_empty(&self, name: &str) -> &str {
        self.attr(name).unwrap_or_default()
    }

    /// Child elements in document order.
    pub fn children(&self) -> impl Iterator<Item = &XmlNode> {
        self.content.iter().filter_map(|c| match c {
            XmlContent::Element(node) => Some(node),
            XmlContent::Text(_) => None,
        })
    }

    /// Child elements with a given local name.
    pub fn children_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a XmlNode> {
        let name = name.to_owned();
        self.children().filter(move |node| node.name == name)
    }

    /// First child element with a given local name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children_named(name).next()
    }

    /// All elements reached by following `path` from this node.
    ///
    /// Every step fans out over all matching children, so
    /// `path(&["did", "origination"])` returns each `origination` under each
    /// `did`.
    #[must_use]
    pub fn path(&self, path: &[&str]) -> Vec<&XmlNode> {
        let mut current = vec![self];
        for step in path {
            current = current
                .into_iter()
                .flat_map(|node| node.children_named(step))
                .collect();
        }
        current
    }

    /// First element reached by following `path`.
    #[must_use]
    pub fn first(&self, path: &[&str]) -> Option<&XmlNode> {
        self.path(path).into_iter().next()
    }

    /// Direct character data of this element, untrimmed.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                XmlContent::Text(text) => Some(text.as_str()),
                XmlContent::Element(_) => None,
            })
            .collect()
    }

    /// All character data below this element, in document order.
    #[must_use]
    pub fn inner_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for c in &self.content {
            match c {
                XmlContent::Text(text) => out.push_str(text),
                XmlContent::Element(node) => node.collect_text(out),
            }
        }
    }

    /// Trimmed direct text of the first element at `path`, or empty.
    #[must_use]
    pub fn text_at(&self, path: &[&str]) -> String {
        self.first(path)
            .map(|node| node.text().trim().to_string())
            .unwrap_or_default()
    }

    /// Every descendant element with a given local name, depth first.
    #[must_use]
    pub fn descendants(&self, name: &str) -> Vec<&XmlNode> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlNode>) {
        for child in self.children() {
            if child.name == name {
                found.push(child);
            }
            child.collect_descendants(name, found);
        }
    }
}

/// Iterator over every element with a given local name in an XML stream.
///
/// Elements of that name nested inside a yielded element stay part of it.
/// An element whose content cannot be decoded is read to its end tag and
/// yielded as [`IngestError::Skipped`]; iteration then continues. After any
/// other stream error the iterator yields the error once and then ends.
pub struct XmlRecords<R: BufRead> {
    reader: Reader<R>,
    element: String,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> fmt::Debug for XmlRecords<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlRecords")
            .field("element", &self.element)
            .field("position", &self.reader.buffer_position())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<R: BufRead> XmlRecords<R> {
    /// Split `source` on elements named `element`.
    pub fn new(source: R, element: &str) -> Self {
        XmlRecords {
            reader: Reader::from_reader(source),
            element: element.to_string(),
            buf: Vec::new(),
            done: false,
        }
    }

    fn next_record(&mut self) -> Result<Option<XmlNode>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(start) if start.local_name().as_ref() == self.element.as_bytes() => {
                    return match start_node(&start) {
                        Ok(node) => read_subtree(&mut self.reader, node).map(Some),
                        Err(e) => Err(skip_damaged(&mut self.reader, &[], 1, &e)),
                    };
                },
                Event::Empty(start) if start.local_name().as_ref() == self.element.as_bytes() => {
                    return start_node(&start)
                        .map(Some)
                        .map_err(|e| IngestError::skipped("", damage_reason(&e)));
                },
                Event::Eof => return Ok(None),
                _ => {},
            }
        }
    }
}

impl<R: BufRead> Iterator for XmlRecords<R> {
    type Item = Result<XmlNode>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(node)) => Some(Ok(node)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(e) => {
                self.done = !e.is_record_level();
                Some(Err(e))
            },
        }
    }
}

/// Parse the first element named `element` from a complete document.
///
/// # Errors
///
/// Returns an XML error for malformed input, or [`IngestError::InvalidRecord`]
/// when no such element exists.
pub fn parse_element(source: impl BufRead, element: &str) -> Result<XmlNode> {
    XmlRecords::new(source, element)
        .next()
        .unwrap_or_else(|| Err(IngestError::InvalidRecord(format!("No <{element}> element found"))))
}

fn start_node(start: &BytesStart<'_>) -> Result<XmlNode> {
    let mut node = XmlNode::new(String::from_utf8_lossy(start.local_name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
        let value = attr.unescape_value()?.to_string();
        node.attributes.push((key, value));
    }
    Ok(node)
}

fn read_subtree<R: BufRead>(reader: &mut Reader<R>, root: XmlNode) -> Result<XmlNode> {
    let mut stack = vec![root];
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            // The reader has already closed the mismatched element.
            Err(e @ quick_xml::Error::EndEventMismatch { .. }) => {
                let depth = stack.len() - 1;
                return Err(skip_damaged(reader, &stack, depth, &IngestError::from(e)));
            },
            Err(e) => return Err(e.into()),
        };
        match event {
            Event::Start(start) => match start_node(&start) {
                Ok(node) => stack.push(node),
                Err(e) => {
                    let depth = stack.len() + 1;
                    return Err(skip_damaged(reader, &stack, depth, &e));
                },
            },
            Event::Empty(start) => match start_node(&start) {
                Ok(node) => push_content(&mut stack, XmlContent::Element(node)),
                Err(e) => {
                    let depth = stack.len();
                    return Err(skip_damaged(reader, &stack, depth, &e));
                },
            },
            Event::Text(text) => match text.unescape() {
                Ok(text) => push_content(&mut stack, XmlContent::Text(text.to_string())),
                Err(e) => {
                    let depth = stack.len();
                    return Err(skip_damaged(reader, &stack, depth, &IngestError::from(e)));
                },
            },
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).to_string();
                push_content(&mut stack, XmlContent::Text(text));
            },
            Event::End(_) => {
                let Some(done) = stack.pop() else {
                    return Err(IngestError::InvalidRecord("Unbalanced XML element".to_string()));
                };
                match stack.last_mut() {
                    Some(parent) => parent.content.push(XmlContent::Element(done)),
                    None => return Ok(done),
                }
            },
            Event::Eof => return Err(truncated()),
            _ => {},
        }
    }
}

/// Read past the rest of a record that failed to decode.
///
/// `depth` counts the elements still open, the record itself included. On
/// success the reader sits just after the record's end tag and the damage is
/// reported as a skip; a stream that ends or breaks first is fatal.
fn skip_damaged<R: BufRead>(
    reader: &mut Reader<R>,
    stack: &[XmlNode],
    mut depth: usize,
    cause: &IngestError,
) -> IngestError {
    let mut buf = Vec::new();
    while depth > 0 {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) | Err(quick_xml::Error::EndEventMismatch { .. }) => depth -= 1,
            Ok(Event::Eof) => return truncated(),
            Ok(_) => {},
            Err(e) => return e.into(),
        }
    }
    let id = stack
        .first()
        .map(|record| record.text_at(&["header", "identifier"]))
        .unwrap_or_default();
    IngestError::skipped(id, damage_reason(cause))
}

fn damage_reason(cause: &IngestError) -> String {
    format!("undecodable XML: {cause}")
}

fn truncated() -> IngestError {
    IngestError::Xml(quick_xml::Error::UnexpectedEof("inside a record".to_string()))
}

fn push_content(stack: &mut [XmlNode], content: XmlContent) {
    if let Some(parent) = stack.last_mut() {
        parent.content.push(content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <ListRecords>
    <record>
      <header><identifier>oai:mit//repositories/2/resources/1</identifier></header>
      <metadata>
        <ead:ead xmlns:ead="urn:isbn:1-931666-22-9" xmlns:xlink="http://www.w3.org/1999/xlink">
          <ead:dao xlink:href="http://example.com/a">x</ead:dao>
          <ead:p>Mixed <ead:emph>inner</ead:emph> text &amp; more</ead:p>
        </ead:ead>
      </metadata>
    </record>
    <record><header><identifier>second</identifier></header></record>
  </ListRecords>
</OAI-PMH>"#;

    fn records() -> Vec<XmlNode> {
        XmlRecords::new(DOC.as_bytes(), "record")
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_splits_records() {
        let records = records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text_at(&["header", "identifier"]), "second");
    }

    #[test]
    fn test_prefixes_are_stripped() {
        let records = records();
        let ead = records[0].first(&["metadata", "ead"]).unwrap();
        let dao = ead.child("dao").unwrap();
        assert_eq!(dao.attr("href"), Some("http://example.com/a"));
    }

    #[test]
    fn test_inner_text_keeps_mixed_content() {
        let records = records();
        let p = &records[0].descendants("p")[0];
        assert_eq!(p.inner_text(), "Mixed inner text & more");
        assert_eq!(p.text(), "Mixed  text & more");
    }

    #[test]
    fn test_path_fans_out() {
        let node = parse_element(
            "<a><b><c>1</c><c>2</c></b><b><c>3</c></b></a>".as_bytes(),
            "a",
        )
        .unwrap();
        let values: Vec<String> = node.path(&["b", "c"]).iter().map(|n| n.text()).collect();
        assert_eq!(values, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_lookups_outlive_the_name() {
        let node = parse_element("<a><b><c>1</c></b></a>".as_bytes(), "a").unwrap();
        let (child, path) = {
            let steps = vec!["b".to_string(), "c".to_string()];
            let steps: Vec<&str> = steps.iter().map(String::as_str).collect();
            (node.child(steps[0]), node.path(&steps))
        };
        assert_eq!(child.map(|b| b.name.as_str()), Some("b"));
        assert_eq!(path[0].text(), "1");
    }

    #[test]
    fn test_records_debug() {
        let records = XmlRecords::new("<a/>".as_bytes(), "record");
        assert!(format!("{records:?}").starts_with("XmlRecords"));
    }

    #[test]
    fn test_truncated_stream_is_error() {
        let mut iter = XmlRecords::new("<list><record><title>A</title>".as_bytes(), "record");
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_damaged_record_is_skipped() {
        let doc = "<list>\
            <record><header><identifier>1</identifier></header><t>A</t></record>\
            <record><header><identifier>2</identifier></header><t>bad &nbsp; <b>x</b></t></record>\
            <record><header><identifier>3</identifier></header><t>B</t></record>\
            </list>";
        let results: Vec<_> = XmlRecords::new(doc.as_bytes(), "record").collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().text_at(&["t"]), "A");
        match &results[1] {
            Err(IngestError::Skipped { id, .. }) => assert_eq!(id, "2"),
            other => panic!("expected a skipped record, got {other:?}"),
        }
        assert_eq!(results[2].as_ref().unwrap().text_at(&["t"]), "B");
    }

    #[test]
    fn test_mismatched_end_tag_is_skipped() {
        let doc = "<list><record><a><b>x</B></a></record><record><a>ok</a></record></list>";
        let results: Vec<_> = XmlRecords::new(doc.as_bytes(), "record").collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].as_ref().is_err_and(IngestError::is_record_level));
        assert_eq!(results[1].as_ref().unwrap().text_at(&["a"]), "ok");
    }

    #[test]
    fn test_damaged_record_at_end_of_stream_is_fatal() {
        let doc = "<list><record><t>&nbsp;</t>";
        let mut iter = XmlRecords::new(doc.as_bytes(), "record");
        assert!(iter.next().unwrap().is_err_and(|e| !e.is_record_level()));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_missing_element() {
        assert!(parse_element("<list/>".as_bytes(), "record").is_err());
    }
}
