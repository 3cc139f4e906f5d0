//! Writing MARC records to ISO 2709 binary format.
//!
//! Ingest never writes MARC; the writer exists so fixtures can be built in
//! memory for tests and for replaying hand-made records.
//!
//! # Examples
//!
//! ```
//! use biblio_ingest::marc::{Field, Leader, MarcReader, MarcRecord, MarcWriter};
//! use std::io::Cursor;
//!
//! let mut record = MarcRecord::new(Leader::default());
//! record.add_field(Field::builder("245", '1', '0').subfield('a', "Title").build());
//!
//! let mut buffer = Vec::new();
//! MarcWriter::new(&mut buffer).write_record(&record)?;
//!
//! let read = MarcReader::new(Cursor::new(buffer)).read_record()?.unwrap();
//! assert_eq!(read.fields_by_tag("245").count(), 1);
//! # Ok::<(), biblio_ingest::IngestError>(())
//! ```

use crate::error::{IngestError, Result};
use crate::marc::reader::{FIELD_TERMINATOR, RECORD_TERMINATOR, SUBFIELD_DELIMITER};
use crate::marc::record::{is_control_tag, MarcRecord};
use std::io::Write;

/// Writer for ISO 2709 binary MARC format.
#[derive(Debug)]
pub struct MarcWriter<W: Write> {
    writer: W,
    records_written: usize,
}

impl<W: Write> MarcWriter<W> {
    /// Create a new MARC writer.
    pub fn new(writer: W) -> Self {
        MarcWriter {
            writer,
            records_written: 0,
        }
    }

    /// Write a single MARC record.
    ///
    /// The leader's record length and base address are recomputed; every
    /// other leader position is written as given.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is too large for the ISO 2709 length
    /// fields or an I/O error occurs during writing.
    pub fn write_record(&mut self, record: &MarcRecord) -> Result<()> {
        let mut data_area = Vec::new();
        let mut directory = Vec::new();

        for (tag, value) in &record.control_fields {
            if is_control_tag(tag) {
                let mut field_data = value.as_bytes().to_vec();
                field_data.push(FIELD_TERMINATOR);
                push_entry(&mut directory, tag, field_data.len(), data_area.len())?;
                data_area.extend_from_slice(&field_data);
            }
        }

        for (tag, fields) in &record.fields {
            for field in fields {
                let mut field_data = vec![field.indicator1 as u8, field.indicator2 as u8];
                for subfield in &field.subfields {
                    field_data.push(SUBFIELD_DELIMITER);
                    field_data.push(subfield.code as u8);
                    field_data.extend_from_slice(subfield.value.as_bytes());
                }
                field_data.push(FIELD_TERMINATOR);

                push_entry(&mut directory, tag, field_data.len(), data_area.len())?;
                data_area.extend_from_slice(&field_data);
            }
        }

        directory.push(FIELD_TERMINATOR);

        let base_address = 24 + directory.len();
        let record_length = base_address + data_area.len() + 1;
        if record_length > 99_999 {
            return Err(IngestError::InvalidRecord(format!(
                "Record length {record_length} exceeds the 5-digit limit"
            )));
        }

        let mut leader = record.leader.clone();
        leader.record_length = u32::try_from(record_length)
            .map_err(|_| IngestError::InvalidRecord("Record length overflow".to_string()))?;
        leader.data_base_address = u32::try_from(base_address)
            .map_err(|_| IngestError::InvalidRecord("Base address overflow".to_string()))?;

        self.writer.write_all(&leader.as_bytes()?)?;
        self.writer.write_all(&directory)?;
        self.writer.write_all(&data_area)?;
        self.writer.write_all(&[RECORD_TERMINATOR])?;

        self.records_written += 1;
        Ok(())
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }
}

fn push_entry(directory: &mut Vec<u8>, tag: &str, length: usize, start: usize) -> Result<()> {
    if tag.len() != 3 || length > 9_999 {
        return Err(IngestError::InvalidField(format!(
            "Tag {tag} cannot be encoded (length {length})"
        )));
    }
    directory.extend_from_slice(tag.as_bytes());
    directory.extend_from_slice(format!("{length:04}").as_bytes());
    directory.extend_from_slice(format!("{start:05}").as_bytes());
    Ok(())
}
