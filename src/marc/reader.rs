//! Reading MARC records from binary streams.
//!
//! [`MarcReader`] reads ISO 2709 records one at a time from any source that
//! implements [`std::io::Read`].
//!
//! Errors come in two kinds. A record whose bytes were consumed but could not
//! be decoded yields a record-level error (see
//! [`IngestError::is_record_level`]) and the reader stays positioned at the
//! next record, so callers can log and keep going. An I/O failure or a record
//! cut off by end of input is a stream-level error; the reader cannot continue.
//!
//! # Examples
//!
//! ```
//! use biblio_ingest::marc::MarcReader;
//! use std::io::Cursor;
//!
//! let mut reader = MarcReader::new(Cursor::new(Vec::new()));
//! assert!(reader.read_record().unwrap().is_none());
//! ```

use crate::error::{IngestError, Result};
use crate::marc::leader::Leader;
use crate::marc::record::{is_control_tag, Field, MarcRecord};
use std::io::{BufRead, BufReader, Read};

pub(crate) const FIELD_TERMINATOR: u8 = 0x1E;
pub(crate) const SUBFIELD_DELIMITER: u8 = 0x1F;
pub(crate) const RECORD_TERMINATOR: u8 = 0x1D;

/// Reader for ISO 2709 binary MARC format.
#[derive(Debug)]
pub struct MarcReader<R: Read> {
    reader: BufReader<R>,
    records_read: usize,
}

impl<R: Read> MarcReader<R> {
    /// Create a new MARC reader.
    pub fn new(reader: R) -> Self {
        MarcReader {
            reader: BufReader::new(reader),
            records_read: 0,
        }
    }

    /// Number of records whose bytes have been consumed, decodable or not.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Read a single MARC record.
    ///
    /// Returns `Ok(Some(record))` if a record was successfully read, `Ok(None)` if EOF
    /// was reached, or `Err` if a parsing error occurred.
    ///
    /// # Errors
    ///
    /// Returns a record-level error if the record is malformed, and an
    /// [`IngestError::Io`] error if the stream itself fails or ends inside a
    /// record.
    pub fn read_record(&mut self) -> Result<Option<MarcRecord>> {
        let mut leader_bytes = [0u8; 24];
        match self.reader.read_exact(&mut leader_bytes) {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            },
            Err(e) => return Err(IngestError::Io(e)),
        }

        let leader = match Leader::from_bytes(&leader_bytes)
            .and_then(|leader| leader.validate_for_reading().map(|()| leader))
        {
            Ok(leader) => leader,
            Err(e) => {
                // The record length can't be trusted, resync on the terminator.
                self.skip_to_record_terminator(&leader_bytes)?;
                self.records_read += 1;
                return Err(e);
            },
        };

        let mut record_data = vec![0u8; leader.record_length as usize - 24];
        self.reader.read_exact(&mut record_data)?;
        self.records_read += 1;

        parse_record(leader, &record_data).map(Some)
    }

    fn skip_to_record_terminator(&mut self, consumed: &[u8]) -> Result<()> {
        if consumed.contains(&RECORD_TERMINATOR) {
            return Ok(());
        }
        let mut discarded = Vec::new();
        self.reader.read_until(RECORD_TERMINATOR, &mut discarded)?;
        Ok(())
    }
}

impl<R: Read> Iterator for MarcReader<R> {
    type Item = Result<MarcRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Decode the directory and data area that follow a leader.
fn parse_record(leader: Leader, record_data: &[u8]) -> Result<MarcRecord> {
    let base_address = leader.data_base_address as usize;
    let directory = &record_data[..base_address - 24];
    let data = &record_data[base_address - 24..];

    let mut record = MarcRecord::new(leader);

    // Directory entries are 12 bytes each: tag(3) + length(4) + start position(5)
    let mut pos = 0;
    while pos < directory.len() {
        if directory[pos] == FIELD_TERMINATOR {
            break;
        }

        if pos + 12 > directory.len() {
            return Err(IngestError::InvalidRecord(
                "Incomplete directory entry".to_string(),
            ));
        }

        let entry = &directory[pos..pos + 12];
        let tag = String::from_utf8_lossy(&entry[0..3]).to_string();
        let field_length = parse_digits(&entry[3..7])?;
        let start_position = parse_digits(&entry[7..12])?;
        pos += 12;

        let end_position = start_position + field_length;
        if end_position > data.len() {
            return Err(IngestError::InvalidRecord(format!(
                "Field {tag} exceeds data area"
            )));
        }

        let field_data = &data[start_position..end_position];
        if is_control_tag(&tag) {
            let value = field_data
                .strip_suffix(&[FIELD_TERMINATOR])
                .unwrap_or(field_data);
            record.add_control_field(tag, String::from_utf8_lossy(value).to_string());
        } else {
            let field = parse_data_field(field_data, &tag)
                .map_err(|e| IngestError::InvalidField(format!("Tag {tag}: {e}")))?;
            record.add_field(field);
        }
    }

    Ok(record)
}

/// Parse a data field from raw bytes
fn parse_data_field(data: &[u8], tag: &str) -> Result<Field> {
    if data.len() < 2 {
        return Err(IngestError::InvalidField(
            "Data field too short (needs indicators)".to_string(),
        ));
    }

    let mut field = Field::new(tag.to_string(), data[0] as char, data[1] as char);

    let subfield_data = &data[2..];
    let mut current = 0;

    while current < subfield_data.len() {
        match subfield_data[current] {
            FIELD_TERMINATOR => break,
            SUBFIELD_DELIMITER => {
                current += 1;
                if current >= subfield_data.len() {
                    break;
                }

                let code = subfield_data[current] as char;
                current += 1;

                let rest = &subfield_data[current..];
                let len = memchr::memchr2(SUBFIELD_DELIMITER, FIELD_TERMINATOR, rest)
                    .unwrap_or(rest.len());

                field.add_subfield(code, String::from_utf8_lossy(&rest[..len]).to_string());
                current += len;
            },
            _ => {
                return Err(IngestError::InvalidField(
                    "Expected subfield delimiter".to_string(),
                ));
            },
        }
    }

    Ok(field)
}

/// Parse an ASCII number from a directory entry
fn parse_digits(bytes: &[u8]) -> Result<usize> {
    bytes.iter().try_fold(0usize, |acc, &byte| {
        if byte.is_ascii_digit() {
            Ok(acc * 10 + (byte - b'0') as usize)
        } else {
            Err(IngestError::InvalidRecord(format!(
                "Invalid numeric field: expected digits, got byte {}",
                byte as char
            )))
        }
    })
}
