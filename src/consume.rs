//! Terminal pipeline stages.
//!
//! - [`IndexConsumer`]: queues each record on a search index bulk session
//! - [`JsonConsumer`]: writes one pretty-printed JSON array
//! - [`TitleConsumer`]: writes one title per line
//! - [`SilentConsumer`]: drains and discards

use crate::error::Result;
use crate::index::Indexer;
use crate::pipeline::{Consumer, RecordStream};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::io::Write;
use std::sync::Arc;

/// Adds records to a search index.
///
/// Requires the indexer's bulk session to be open for the whole run.
#[derive(Clone)]
pub struct IndexConsumer {
    indexer: Arc<dyn Indexer>,
    index: String,
    rtype: String,
}

impl std::fmt::Debug for IndexConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexConsumer")
            .field("index", &self.index)
            .field("rtype", &self.rtype)
            .finish_non_exhaustive()
    }
}

impl IndexConsumer {
    /// Create a consumer adding to `index` with document type `rtype`.
    pub fn new(
        indexer: Arc<dyn Indexer>,
        index: impl Into<String>,
        rtype: impl Into<String>,
    ) -> Self {
        IndexConsumer {
            indexer,
            index: index.into(),
            rtype: rtype.into(),
        }
    }

    /// Target index name.
    #[must_use]
    pub fn index(&self) -> &str {
        &self.index
    }
}

impl Consumer for IndexConsumer {
    fn consume(&mut self, records: &mut RecordStream) -> Result<()> {
        for record in records {
            self.indexer.add(&record, &self.index, &self.rtype)?;
        }
        Ok(())
    }
}

/// Serializes the record stream as a single JSON array.
///
/// The brackets are written even when no record arrives, so the output is
/// always a valid document.
#[derive(Debug)]
pub struct JsonConsumer<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonConsumer<W> {
    /// Write to `out`.
    pub fn new(out: W) -> Self {
        JsonConsumer { out }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Consumer for JsonConsumer<W> {
    fn consume(&mut self, records: &mut RecordStream) -> Result<()> {
        writeln!(self.out, "[")?;
        for (i, record) in records.enumerate() {
            if i > 0 {
                writeln!(self.out, ",")?;
            }
            let formatter = PrettyFormatter::with_indent(b"    ");
            let mut ser = Serializer::with_formatter(&mut self.out, formatter);
            record.serialize(&mut ser)?;
            writeln!(self.out)?;
        }
        writeln!(self.out, "]")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Writes each record's title on its own line.
#[derive(Debug)]
pub struct TitleConsumer<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TitleConsumer<W> {
    /// Write to `out`.
    pub fn new(out: W) -> Self {
        TitleConsumer { out }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Consumer for TitleConsumer<W> {
    fn consume(&mut self, records: &mut RecordStream) -> Result<()> {
        for record in records {
            writeln!(self.out, "{}", record.title)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Drains the stream without side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentConsumer;

impl Consumer for SilentConsumer {
    fn consume(&mut self, records: &mut RecordStream) -> Result<()> {
        records.for_each(drop);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use serde_json::Value;

    fn titled(titles: &[&str]) -> RecordStream {
        titles
            .iter()
            .map(|title| Record {
                title: (*title).to_string(),
                ..Record::default()
            })
            .collect()
    }

    #[test]
    fn test_json_round_trip_keeps_order() {
        let mut consumer = JsonConsumer::new(Vec::new());
        consumer.consume(&mut titled(&["A", "B"])).unwrap();
        let out = consumer.into_inner();
        let records: Vec<Record> = serde_json::from_slice(&out).unwrap();
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn test_json_empty_stream_is_empty_array() {
        let mut consumer = JsonConsumer::new(Vec::new());
        consumer.consume(&mut titled(&[])).unwrap();
        let value: Value = serde_json::from_slice(&consumer.into_inner()).unwrap();
        assert_eq!(value, Value::Array(vec![]));
    }

    #[test]
    fn test_json_is_indented() {
        let mut consumer = JsonConsumer::new(Vec::new());
        consumer.consume(&mut titled(&["A"])).unwrap();
        let text = String::from_utf8(consumer.into_inner()).unwrap();
        assert!(text.starts_with("[\n{\n    \""));
        assert!(text.ends_with("}\n]\n"));
    }

    #[test]
    fn test_title_consumer() {
        let mut consumer = TitleConsumer::new(Vec::new());
        consumer.consume(&mut titled(&["Bar", "Gaz"])).unwrap();
        assert_eq!(String::from_utf8(consumer.into_inner()).unwrap(), "Bar\nGaz\n");
    }

    #[test]
    fn test_silent_consumer_drains() {
        let mut stream = titled(&["a", "b", "c"]);
        SilentConsumer.consume(&mut stream).unwrap();
        assert_eq!(stream.delivered(), 3);
    }
}
