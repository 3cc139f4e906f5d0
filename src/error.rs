//! Error types for ingest operations.
//!
//! This module provides the [`IngestError`] type for all library operations
//! and the [`Result`] convenience type.

use thiserror::Error;

/// Error type for all ingest operations.
///
/// Per-record variants ([`IngestError::InvalidRecord`], [`IngestError::Skipped`],
/// [`IngestError::RuleNotFound`]) are recoverable: generators log them and move
/// on to the next record. The remaining variants end a run.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Error indicating an invalid or malformed MARC record.
    #[error("Invalid MARC record: {0}")]
    InvalidRecord(String),

    /// Error indicating an invalid leader (24-byte header).
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// Error indicating an invalid field structure.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// A source record was rejected by mandatory-field validation.
    #[error("Record {id} skipped: {reason}")]
    Skipped {
        /// Source identifier, empty when the record has none.
        id: String,
        /// Human readable rejection reason.
        reason: String,
    },

    /// An extraction rule was requested that the rule file does not define.
    #[error("No rule found for label '{0}'")]
    RuleNotFound(String),

    /// Missing or unusable configuration (rule file, code list, CLI options).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The search engine reported a failure.
    #[error("Index error: {0}")]
    Index(String),

    /// Object storage retrieval failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A pipeline stage failed or panicked.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The XML token stream could not be read.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// HTTP transport error talking to the search engine.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Shorthand for a [`IngestError::Skipped`] error.
    pub fn skipped(id: impl Into<String>, reason: impl Into<String>) -> Self {
        IngestError::Skipped {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error only affects a single source record.
    #[must_use]
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            IngestError::InvalidRecord(_)
                | IngestError::InvalidLeader(_)
                | IngestError::InvalidField(_)
                | IngestError::Skipped { .. }
                | IngestError::RuleNotFound(_)
        )
    }
}

/// Convenience type alias for [`std::result::Result`] with [`IngestError`].
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_level_classification() {
        assert!(IngestError::skipped("123", "no title").is_record_level());
        assert!(IngestError::RuleNotFound("title".to_string()).is_record_level());
        assert!(IngestError::InvalidLeader("short".to_string()).is_record_level());
        assert!(!IngestError::Config("missing".to_string()).is_record_level());
        assert!(!IngestError::Pipeline("panic".to_string()).is_record_level());
    }

    #[test]
    fn test_skipped_display() {
        let err = IngestError::skipped("990026671500206761", "record has no title");
        assert_eq!(
            err.to_string(),
            "Record 990026671500206761 skipped: record has no title"
        );
    }
}
