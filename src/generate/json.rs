//! Re-ingest of normalized records exported as a JSON array.
//!
//! The array is streamed element by element, so an export of any size is
//! never held in memory whole. Unlike the other formats there is no
//! per-record recovery: malformed JSON ends the run.

use crate::error::{IngestError, Result};
use crate::generate::GenerateStats;
use crate::pipeline::{Generator, RecordSink};
use crate::record::Record;
use serde::de::{self, Deserializer as _, SeqAccess, Visitor};
use std::fmt;
use std::io::Read;

/// Streams records out of a JSON array.
#[derive(Debug)]
pub struct JsonGenerator<R: Read> {
    reader: Option<R>,
}

impl<R: Read> JsonGenerator<R> {
    /// Read an array from `reader`.
    pub fn new(reader: R) -> Self {
        JsonGenerator {
            reader: Some(reader),
        }
    }
}

impl<R: Read + Send> Generator for JsonGenerator<R> {
    fn generate(&mut self, sink: &RecordSink) -> Result<()> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| IngestError::Pipeline("JSON input already consumed".to_string()))?;

        let mut visitor = RecordArray {
            sink,
            stats: GenerateStats::default(),
            halted: None,
        };
        let mut de = serde_json::Deserializer::from_reader(reader);
        let streamed = (&mut de).deserialize_seq(&mut visitor);
        // A send failure surfaces as a custom serde error; report the cause.
        if let Some(e) = visitor.halted.take() {
            return Err(e);
        }
        streamed?;
        de.end()?;
        visitor.stats.log("json");
        Ok(())
    }
}

struct RecordArray<'a> {
    sink: &'a RecordSink,
    stats: GenerateStats,
    halted: Option<IngestError>,
}

impl<'de> Visitor<'de> for &mut RecordArray<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of records")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<(), A::Error> {
        while let Some(record) = seq.next_element::<Record>()? {
            if let Err(e) = self.stats.handle(self.sink, Ok(record)) {
                self.halted = Some(e);
                return Err(de::Error::custom("record stream closed"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consume::TitleConsumer;
    use crate::pipeline::{Consumer, Pipeline, RecordStream};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Titles(Arc<Mutex<Vec<String>>>);

    impl Consumer for Titles {
        fn consume(&mut self, records: &mut RecordStream) -> Result<()> {
            for record in records {
                self.0.lock().unwrap().push(record.title);
            }
            Ok(())
        }
    }

    #[test]
    fn test_streams_records_in_order() {
        let input = r#"[{"title": "Bar", "source": "x"}, {"title": "Gaz", "subjects": ["a"]}]"#;
        let titles = Titles::default();
        let report = Pipeline::new(JsonGenerator::new(input.as_bytes()), titles.clone())
            .run()
            .wait()
            .unwrap();
        assert_eq!(report.consumed, 2);
        assert_eq!(*titles.0.lock().unwrap(), vec!["Bar".to_string(), "Gaz".to_string()]);
    }

    #[test]
    fn test_malformed_json_is_fatal() {
        let input = r#"[{"title": "Bar"}, {"title": "#;
        let result = Pipeline::new(
            JsonGenerator::new(input.as_bytes()),
            TitleConsumer::new(Vec::new()),
        )
        .run()
        .wait();
        assert!(matches!(result, Err(IngestError::Json(_))));
    }

    #[test]
    fn test_non_array_is_fatal() {
        let result = Pipeline::new(
            JsonGenerator::new(&br#"{"title": "Bar"}"#[..]),
            TitleConsumer::new(Vec::new()),
        )
        .run()
        .wait();
        assert!(result.is_err());
    }
}
