#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Library layout
//!
//! Records flow through a [`Pipeline`]: a generator maps one source format
//! into normalized [`Record`]s, transformers pass them along, and a consumer
//! writes them out.
//!
//! ```
//! use biblio_ingest::consume::JsonConsumer;
//! use biblio_ingest::generate::JsonGenerator;
//! use biblio_ingest::Pipeline;
//!
//! let input = r#"[{"title": "Spice it up!"}]"#;
//! let report = Pipeline::new(JsonGenerator::new(input.as_bytes()), JsonConsumer::new(Vec::new()))
//!     .run()
//!     .wait()
//!     .unwrap();
//! assert_eq!(report.consumed, 1);
//! ```
//!
//! ## Modules
//!
//! - [`marc`]: ISO 2709 reader and writer
//! - [`record`]: the normalized record
//! - [`rules`]: MARC field extraction rules
//! - [`codes`]: language, country and holdings code tables
//! - [`xml`]: streaming XML record splitter
//! - [`pipeline`]: stage traits and the threaded runner
//! - [`generate`]: one generator per source format
//! - [`transform`]: pass-through stages
//! - [`consume`]: output stages
//! - [`index`]: search engine client
//! - [`storage`]: local and S3 input
//! - [`ingest`]: a configured end-to-end run
//! - [`logging`]: subscriber setup

pub mod codes;
pub mod consume;
pub mod error;
pub mod generate;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod marc;
pub mod pipeline;
pub mod record;
pub mod rules;
pub mod storage;
pub mod transform;
pub mod xml;

pub use error::{IngestError, Result};
pub use generate::SourceFormat;
pub use index::{ElasticClient, Indexer};
pub use ingest::{ConsumerKind, IngestConfig, Ingester};
pub use pipeline::{
    Completion, Consumer, Generator, Pipeline, RecordSink, RecordStream, RunReport, Transformer,
};
pub use record::{Contributor, Holding, Link, Record, RelatedItem};
