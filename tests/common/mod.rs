//! Common test helpers shared across the integration suite.

#![allow(dead_code)]

use biblio_ingest::error::{IngestError, Result};
use biblio_ingest::index::{AliasInfo, IndexInfo, Indexer, PingInfo};
use biblio_ingest::marc::{Field, Leader, MarcRecord, MarcWriter};
use biblio_ingest::pipeline::{Consumer, RecordStream};
use biblio_ingest::Record;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// An 008 for a 1993 English-language book published in Massachusetts.
pub const FIXED_FIELD: &str = "930506s1993    mau           000 0 eng d";

/// A minimal accepted book record with a control number and title.
pub fn book(id: &str, title: &str) -> MarcRecord {
    let mut record = MarcRecord::new(Leader::default());
    record.add_control_field("001".to_string(), id.to_string());
    record.add_control_field("008".to_string(), FIXED_FIELD.to_string());
    record.add_field(Field::builder("245", '1', '0').subfield('a', title).build());
    record
}

/// Serialize records as binary MARC.
pub fn marc_bytes(records: &[MarcRecord]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut writer = MarcWriter::new(&mut buffer);
        for record in records {
            writer.write_record(record).expect("write MARC fixture");
        }
    }
    buffer
}

/// Path of a file under `tests/data`.
pub fn data_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

/// A consumer that keeps every record it sees.
#[derive(Clone, Default)]
pub struct Collect(pub Arc<Mutex<Vec<Record>>>);

impl Collect {
    pub fn records(&self) -> Vec<Record> {
        self.0.lock().unwrap().clone()
    }
}

impl Consumer for Collect {
    fn consume(&mut self, records: &mut RecordStream) -> Result<()> {
        for record in records {
            self.0.lock().unwrap().push(record);
        }
        Ok(())
    }
}

/// A writer whose contents stay readable after it is moved into a stage.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Calls observed by [`FakeIndexer`].
#[derive(Debug, Default)]
pub struct IndexerLog {
    pub created: Vec<String>,
    pub added: Vec<(String, String, String)>,
    pub starts: usize,
    pub stops: usize,
    pub promoted: Vec<(String, Option<String>)>,
}

/// In-memory stand-in for the search engine.
#[derive(Debug, Default)]
pub struct FakeIndexer {
    pub current: Option<String>,
    pub fail_stop: bool,
    pub log: Mutex<IndexerLog>,
}

impl FakeIndexer {
    pub fn with_current(index: &str) -> Self {
        FakeIndexer {
            current: Some(index.to_string()),
            ..FakeIndexer::default()
        }
    }
}

impl Indexer for FakeIndexer {
    fn current(&self, _prefix: &str) -> Result<Option<String>> {
        Ok(self.current.clone())
    }

    fn create(&self, index: &str) -> Result<()> {
        self.log.lock().unwrap().created.push(index.to_string());
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.log.lock().unwrap().starts += 1;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.log.lock().unwrap().stops += 1;
        if self.fail_stop {
            return Err(IngestError::Index("flush failed".to_string()));
        }
        Ok(())
    }

    fn add(&self, record: &Record, index: &str, rtype: &str) -> Result<()> {
        self.log.lock().unwrap().added.push((
            record.identifier.clone(),
            index.to_string(),
            rtype.to_string(),
        ));
        Ok(())
    }

    fn promote(&self, index: &str, prefix: Option<&str>) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .promoted
            .push((index.to_string(), prefix.map(str::to_string)));
        Ok(())
    }

    fn delete(&self, _index: &str) -> Result<()> {
        Ok(())
    }

    fn reindex(&self, _source: &str, _destination: &str) -> Result<u64> {
        Ok(0)
    }

    fn indexes(&self) -> Result<Vec<IndexInfo>> {
        Ok(Vec::new())
    }

    fn aliases(&self) -> Result<Vec<AliasInfo>> {
        Ok(Vec::new())
    }

    fn ping(&self) -> Result<PingInfo> {
        Ok(PingInfo::default())
    }
}
