//! One ingest run, from an input stream to a configured sink.
//!
//! [`Ingester::configure`] picks the generator for the source format and the
//! consumer for the output, creating the target index when records go to the
//! search engine. [`Ingester::ingest`] runs the pipeline and reports how many
//! records reached the consumer.
//!
//! Search index naming: a full load writes to a fresh index named after the
//! prefix and the UTC start time (`alma-2024-03-01t12-00-00z`). A daily update
//! file, recognised by [`UPDATE_MARKER`] in its name, is added to the prefix's
//! current index instead and is never promoted.

use crate::codes::CodeList;
use crate::consume::{IndexConsumer, JsonConsumer, SilentConsumer, TitleConsumer};
use crate::error::{IngestError, Result};
use crate::generate::{
    ArchivesGenerator, Dialect, DspaceGenerator, JsonGenerator, MarcGenerator, MarcMapper,
    SourceFormat,
};
use crate::index::Indexer;
use crate::pipeline::{Consumer, Generator, Pipeline};
use crate::rules::RuleSet;
use crate::transform::Counter;
use chrono::{DateTime, Utc};
use std::fmt;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

/// Filename marker of daily catalog update files.
pub const UPDATE_MARKER: &str = "mit01_edsu1";

/// Document type sent with every indexed record.
pub const RECORD_TYPE: &str = "_doc";

/// Where an ingest run sends its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsumerKind {
    /// Bulk indexing into the search engine.
    #[default]
    Es,
    /// A JSON array on the output writer.
    Json,
    /// Titles, one per line, on the output writer.
    Title,
    /// Nowhere.
    Silent,
}

impl FromStr for ConsumerKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "es" => Ok(ConsumerKind::Es),
            "json" => Ok(ConsumerKind::Json),
            "title" => Ok(ConsumerKind::Title),
            "silent" => Ok(ConsumerKind::Silent),
            other => Err(IngestError::Config(format!("Unknown consumer '{other}'"))),
        }
    }
}

impl fmt::Display for ConsumerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsumerKind::Es => "es",
            ConsumerKind::Json => "json",
            ConsumerKind::Title => "title",
            ConsumerKind::Silent => "silent",
        };
        f.write_str(name)
    }
}

/// Settings for one ingest run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Input location as given by the user; checked for [`UPDATE_MARKER`].
    pub filename: String,
    /// Input format.
    pub source: SourceFormat,
    /// Output sink.
    pub consumer: ConsumerKind,
    /// Explicit target index. When unset one is chosen from the prefix.
    pub index: Option<String>,
    /// Index name prefix identifying the source.
    pub prefix: String,
    /// Link the index to the primary alias after a successful run.
    pub promote: bool,
    /// MARC rule file replacing the bundled one.
    pub rules: Option<PathBuf>,
}

impl IngestConfig {
    /// Defaults for `source`: search engine output, no promotion, the
    /// source's usual index prefix.
    pub fn new(filename: impl Into<String>, source: SourceFormat) -> Self {
        IngestConfig {
            filename: filename.into(),
            source,
            consumer: ConsumerKind::default(),
            index: None,
            prefix: default_prefix(source).to_string(),
            promote: false,
            rules: None,
        }
    }

    fn is_update(&self) -> bool {
        self.filename.contains(UPDATE_MARKER)
    }
}

/// Usual index prefix of a source format.
#[must_use]
pub fn default_prefix(source: SourceFormat) -> &'static str {
    match source {
        SourceFormat::Marc => "alma",
        SourceFormat::Archives | SourceFormat::Mods => "aspace",
        SourceFormat::Dspace => "dspace",
        SourceFormat::Json => "mario",
    }
}

/// Name of a fresh index for `prefix` created at `now`.
#[must_use]
pub fn new_index_name(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{prefix}-{}", now.format("%Y-%m-%dt%H-%M-%Sz"))
}

/// A configured ingest run.
pub struct Ingester {
    config: IngestConfig,
    generator: Box<dyn Generator>,
    consumer: Box<dyn Consumer>,
    indexer: Option<Arc<dyn Indexer>>,
}

impl fmt::Debug for Ingester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ingester")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Ingester {
    /// Build the generator and consumer for a run.
    ///
    /// `out` receives the JSON and title consumers' output. `indexer` is
    /// required for [`ConsumerKind::Es`] and ignored otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] when a configuration file cannot be
    /// loaded, when no indexer is given for search engine output, or when an
    /// update file has no current index to go to. Index creation failures are
    /// passed through.
    pub fn configure(
        mut config: IngestConfig,
        stream: Box<dyn BufRead + Send>,
        indexer: Option<Arc<dyn Indexer>>,
        out: Box<dyn Write + Send>,
    ) -> Result<Self> {
        let generator: Box<dyn Generator> = match config.source {
            SourceFormat::Marc => {
                let rules = match &config.rules {
                    Some(path) => RuleSet::from_path(path)?,
                    None => RuleSet::bundled()?,
                };
                let mapper =
                    MarcMapper::new(rules, CodeList::languages()?, CodeList::countries()?)?;
                Box::new(MarcGenerator::new(stream, mapper))
            },
            SourceFormat::Archives => Box::new(ArchivesGenerator::new(stream, Dialect::Ead)?),
            SourceFormat::Mods => Box::new(ArchivesGenerator::new(stream, Dialect::Mods)?),
            SourceFormat::Dspace => Box::new(DspaceGenerator::new(stream)),
            SourceFormat::Json => Box::new(JsonGenerator::new(stream)),
        };

        let consumer: Box<dyn Consumer> = match config.consumer {
            ConsumerKind::Es => {
                let client = indexer.clone().ok_or_else(|| {
                    IngestError::Config("Search engine output needs an index client".to_string())
                })?;
                let index = match config.index.clone() {
                    Some(index) => index,
                    None if config.is_update() => {
                        info!(filename = %config.filename, "update file detected");
                        let current = client.current(&config.prefix)?.ok_or_else(|| {
                            IngestError::Config(
                                "Could not determine current index to update".to_string(),
                            )
                        })?;
                        info!(index = %current, "using existing index");
                        config.promote = false;
                        current
                    },
                    None => new_index_name(&config.prefix, Utc::now()),
                };
                client.create(&index)?;
                info!(
                    index = %index,
                    prefix = %config.prefix,
                    promote = config.promote,
                    "configured search index consumer"
                );
                config.index = Some(index.clone());
                Box::new(IndexConsumer::new(client, index, RECORD_TYPE))
            },
            ConsumerKind::Json => Box::new(JsonConsumer::new(out)),
            ConsumerKind::Title => Box::new(TitleConsumer::new(out)),
            ConsumerKind::Silent => Box::new(SilentConsumer),
        };

        Ok(Ingester {
            config,
            generator,
            consumer,
            indexer,
        })
    }

    /// The resolved configuration, including the chosen index.
    #[must_use]
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run the pipeline and return the number of records ingested.
    ///
    /// For search engine output the bulk session is opened before the run
    /// and closed after it, whether or not the run succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error of the run, then of closing the bulk
    /// session, then of promotion.
    pub fn ingest(self) -> Result<usize> {
        let Ingester {
            config,
            generator,
            consumer,
            indexer,
        } = self;

        let session = match config.consumer {
            ConsumerKind::Es => indexer,
            _ => None,
        };
        if let Some(indexer) = &session {
            indexer.start()?;
        }

        let counter = Counter::new();
        let count = counter.handle();
        let mut pipeline = Pipeline::new(generator, consumer);
        pipeline.next(counter);
        let mut outcome = pipeline.run().wait().map(|_| ());

        if let Some(indexer) = &session {
            if let Err(e) = indexer.stop() {
                if outcome.is_ok() {
                    outcome = Err(e);
                } else {
                    error!(error = %e, "could not close bulk session");
                }
            }
        }
        outcome?;

        if let (true, Some(indexer), Some(index)) = (config.promote, &session, &config.index) {
            info!(index = %index, "promoting index");
            indexer.promote(index, Some(&config.prefix))?;
        }

        let ingested = count.get();
        info!(ingested, "ingest finished");
        Ok(ingested)
    }
}
