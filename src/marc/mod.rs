//! ISO 2709 (binary MARC 21) input layer.
//!
//! - [`leader`]: the 24-byte record header
//! - [`record`]: raw record, field and subfield structures
//! - [`reader`]: streaming record reader
//! - [`writer`]: record writer, used to build fixtures

pub mod leader;
pub mod reader;
pub mod record;
pub mod writer;

pub use leader::Leader;
pub use reader::MarcReader;
pub use record::{Field, FieldBuilder, MarcRecord, Subfield};
pub use writer::MarcWriter;
