//! One [`Generator`](crate::pipeline::Generator) per source format.
//!
//! - [`marc`]: binary MARC 21 bibliographic records
//! - [`archives`]: OAI-PMH harvests of finding aids (EAD or MODS)
//! - [`dspace`]: OAI-PMH harvests of DSpace METS records
//! - [`json`]: arrays of already normalized records
//!
//! Every generator follows the same error policy. A record that cannot be
//! mapped is logged and skipped, and the run goes on. Input that cannot be
//! decoded any further ends the run with an error.

pub mod archives;
pub mod dspace;
pub mod json;
pub mod marc;

pub use archives::{ArchivesGenerator, Dialect};
pub use dspace::DspaceGenerator;
pub use json::JsonGenerator;
pub use marc::{MarcGenerator, MarcMapper};

use crate::error::{IngestError, Result};
use crate::pipeline::RecordSink;
use crate::record::Record;
use crate::xml::{XmlNode, XmlRecords};
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;
use tracing::{info, warn};

/// Input formats understood by the ingester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Binary MARC 21 from the library catalog.
    Marc,
    /// EAD finding aids harvested over OAI-PMH.
    Archives,
    /// MODS finding aids harvested over OAI-PMH.
    Mods,
    /// METS records harvested from DSpace.
    Dspace,
    /// Normalized records as JSON.
    Json,
}

impl FromStr for SourceFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "marc" | "aleph" | "alma" => Ok(SourceFormat::Marc),
            "archives" | "aspace" => Ok(SourceFormat::Archives),
            "mods" => Ok(SourceFormat::Mods),
            "dspace" => Ok(SourceFormat::Dspace),
            "json" | "mario" => Ok(SourceFormat::Json),
            other => Err(IngestError::Config(format!("Unknown source data '{other}'"))),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::Marc => "marc",
            SourceFormat::Archives => "archives",
            SourceFormat::Mods => "mods",
            SourceFormat::Dspace => "dspace",
            SourceFormat::Json => "json",
        };
        f.write_str(name)
    }
}

/// Running totals kept by a generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateStats {
    /// Source records read.
    pub total: usize,
    /// Source records skipped.
    pub errors: usize,
}

impl GenerateStats {
    /// Record the outcome of mapping one source record.
    ///
    /// Mapped records are sent on; record-level failures are logged and
    /// counted. Any other failure is returned.
    pub(crate) fn handle(&mut self, sink: &RecordSink, mapped: Result<Record>) -> Result<()> {
        self.total += 1;
        match mapped {
            Ok(record) => sink.send(record),
            Err(e) if e.is_record_level() => {
                self.errors += 1;
                warn!(error = %e, "skipping record");
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    pub(crate) fn log(&self, source: &str) {
        info!(
            source,
            total = self.total,
            errors = self.errors,
            "finished reading input"
        );
    }
}

/// Split an OAI-PMH harvest on `record` elements and map each one.
///
/// A record whose XML cannot be decoded counts as skipped, like one that
/// cannot be mapped.
pub(crate) fn generate_xml<R: BufRead>(
    reader: R,
    source: &str,
    sink: &RecordSink,
    mut map: impl FnMut(&XmlNode) -> Result<Record>,
) -> Result<GenerateStats> {
    let mut stats = GenerateStats::default();
    for node in XmlRecords::new(reader, "record") {
        stats.handle(sink, node.and_then(|node| map(&node)))?;
    }
    stats.log(source);
    Ok(stats)
}

/// Header identifier of an OAI-PMH record.
pub(crate) fn oai_identifier(record: &XmlNode) -> String {
    record.text_at(&["header", "identifier"])
}

/// The part of `identifier` after `prefix`, or a skip error naming the record.
pub(crate) fn after_prefix<'a>(identifier: &'a str, prefix: &str) -> Result<&'a str> {
    identifier
        .split_once(prefix)
        .map(|(_, rest)| rest)
        .ok_or_else(|| {
            IngestError::skipped(
                identifier,
                format!("header identifier does not contain '{prefix}'"),
            )
        })
}

/// Collapse runs of whitespace to single spaces and trim.
pub(crate) fn normalize_space(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
