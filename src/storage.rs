//! Input locations.
//!
//! An ingest reads from a local path or from an `s3://bucket/key` URL. S3
//! objects are streamed into an anonymous temporary file and read back from
//! disk, so memory use does not grow with the object; credentials and region
//! come from the standard AWS environment.

use crate::error::{IngestError, Result};
use aws_sdk_s3::primitives::ByteStream;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, Write};
use tracing::{debug, info};

/// Where an input file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A local file path.
    File(String),
    /// An object in S3.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },
}

impl Location {
    /// Classify a location string.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Storage`] for an `s3://` URL without a bucket
    /// or key.
    pub fn parse(location: &str) -> Result<Self> {
        let Some(rest) = location.strip_prefix("s3://") else {
            return Ok(Location::File(location.to_string()));
        };
        match rest.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(Location::S3 {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            _ => Err(IngestError::Storage(format!(
                "Expected s3://bucket/key, got '{location}'"
            ))),
        }
    }
}

/// Open a location for buffered reading.
///
/// # Errors
///
/// Returns [`IngestError::Io`] when a local file cannot be opened and
/// [`IngestError::Storage`] when an S3 object cannot be fetched.
pub fn open(location: &str) -> Result<Box<dyn BufRead + Send>> {
    match Location::parse(location)? {
        Location::File(path) => {
            debug!(path = %path, "opening local input");
            Ok(Box::new(BufReader::new(File::open(path)?)))
        },
        Location::S3 { bucket, key } => {
            let (file, bytes) = fetch_s3(&bucket, &key)?;
            info!(bucket = %bucket, key = %key, bytes, "downloaded input from S3");
            Ok(Box::new(BufReader::new(file)))
        },
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

fn fetch_s3(bucket: &str, key: &str) -> Result<(File, u64)> {
    runtime()?.block_on(async {
        let config = aws_config::load_from_env().await;
        let client = aws_sdk_s3::Client::new(&config);
        let response = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                IngestError::Storage(format!("Failed to download s3://{bucket}/{key}: {e}"))
            })?;
        spool(response.body).await
    })
}

/// Copy a response body into a temporary file, rewound for reading.
async fn spool(mut body: ByteStream) -> Result<(File, u64)> {
    let mut file = tempfile::tempfile()?;
    while let Some(chunk) = body
        .try_next()
        .await
        .map_err(|e| IngestError::Storage(format!("Failed to read S3 response body: {e}")))?
    {
        file.write_all(&chunk)?;
    }
    let bytes = file.stream_position()?;
    file.rewind()?;
    Ok((file, bytes))
}
