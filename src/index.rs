//! Search index collaborator.
//!
//! [`Indexer`] is everything the ingester and the CLI need from a search
//! engine. [`ElasticClient`] implements it against the Elasticsearch REST API.
//!
//! Index names follow `{prefix}-{timestamp}`; the prefix identifies the source
//! (e.g. `aleph`, `aspace`). At most one index per prefix is linked to the
//! primary alias at a time, and that index is the prefix's *current* index.

use crate::error::{IngestError, Result};
use crate::record::Record;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// Alias under which production indexes are searched.
pub const PRIMARY_ALIAS: &str = "timdex-prod";

/// Documents buffered before a bulk request is sent.
pub const BULK_SIZE: usize = 500;

/// Request timeout for the search engine.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

const RECORD_MAPPINGS: &str = include_str!("../config/es_record_mappings.json");

/// One row of the index listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Index name.
    pub index: String,
    /// Document count.
    #[serde(rename = "docs.count", default)]
    pub docs_count: Option<String>,
    /// Cluster health of the index.
    #[serde(default)]
    pub health: Option<String>,
    /// `open` or `close`.
    #[serde(default)]
    pub status: Option<String>,
    /// Index UUID.
    #[serde(default)]
    pub uuid: Option<String>,
    /// Human readable store size.
    #[serde(rename = "store.size", default)]
    pub store_size: Option<String>,
}

/// One row of the alias listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasInfo {
    /// Alias name.
    pub alias: String,
    /// Index the alias points to.
    pub index: String,
}

/// Basic cluster information.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PingInfo {
    /// Node name.
    #[serde(default)]
    pub name: String,
    /// Cluster name.
    #[serde(default)]
    pub cluster_name: String,
    /// Engine version number.
    #[serde(default)]
    pub version: String,
}

/// Search engine operations used by ingest and index maintenance.
///
/// All methods take `&self` so one client can be shared between the ingester
/// (bulk session lifecycle) and the index consumer (adding documents).
pub trait Indexer: Send + Sync {
    /// The index of `prefix` currently linked to the primary alias.
    ///
    /// # Errors
    ///
    /// Fails when more than one index of the prefix holds the alias.
    fn current(&self, prefix: &str) -> Result<Option<String>>;

    /// Create an index with the record mappings unless it already exists.
    ///
    /// # Errors
    ///
    /// Fails when the engine rejects the request.
    fn create(&self, index: &str) -> Result<()>;

    /// Open a bulk session. Documents passed to [`Indexer::add`] are buffered.
    ///
    /// # Errors
    ///
    /// Fails when the session cannot be opened.
    fn start(&self) -> Result<()>;

    /// Flush outstanding documents and close the bulk session.
    ///
    /// # Errors
    ///
    /// Fails when the final flush fails.
    fn stop(&self) -> Result<()>;

    /// Queue a record for indexing under its identifier, replacing any
    /// existing document with that id.
    ///
    /// # Errors
    ///
    /// Fails when no session is open or a triggered flush fails.
    fn add(&self, record: &Record, index: &str, rtype: &str) -> Result<()>;

    /// Link `index` to the primary alias and unlink the previous current
    /// index of the same prefix, atomically. The prefix defaults to the index
    /// name up to its first `-`.
    ///
    /// # Errors
    ///
    /// Fails when the current index cannot be determined or the alias update
    /// is rejected.
    fn promote(&self, index: &str, prefix: Option<&str>) -> Result<()>;

    /// Delete an index.
    ///
    /// # Errors
    ///
    /// Fails when the engine rejects the request.
    fn delete(&self, index: &str) -> Result<()>;

    /// Copy every document of `source` into `destination`, returning the
    /// number of documents copied.
    ///
    /// # Errors
    ///
    /// Fails when the engine rejects the request.
    fn reindex(&self, source: &str, destination: &str) -> Result<u64>;

    /// List indexes.
    ///
    /// # Errors
    ///
    /// Fails when the engine cannot be queried.
    fn indexes(&self) -> Result<Vec<IndexInfo>>;

    /// List aliases.
    ///
    /// # Errors
    ///
    /// Fails when the engine cannot be queried.
    fn aliases(&self) -> Result<Vec<AliasInfo>>;

    /// Basic cluster information, also a reachability check.
    ///
    /// # Errors
    ///
    /// Fails when the engine cannot be reached.
    fn ping(&self) -> Result<PingInfo>;
}

/// Prefix part of an index name.
#[must_use]
pub fn index_prefix(index: &str) -> &str {
    index.split('-').next().unwrap_or(index)
}

#[derive(Debug, Default)]
struct BulkBuffer {
    body: String,
    pending: usize,
    sent: usize,
}

/// Elasticsearch client over the REST API.
#[derive(Debug)]
pub struct ElasticClient {
    client: Client,
    base_url: String,
    mappings: String,
    bulk: Mutex<Option<BulkBuffer>>,
}

impl ElasticClient {
    /// Create a client for the cluster at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(ElasticClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            mappings: RECORD_MAPPINGS.to_string(),
            bulk: Mutex::new(None),
        })
    }

    /// Replace the mappings document used by [`Indexer::create`].
    #[must_use]
    pub fn with_mappings(mut self, mappings: String) -> Self {
        self.mappings = mappings;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<BulkBuffer>>> {
        self.bulk
            .lock()
            .map_err(|_| IngestError::Index("Bulk buffer lock poisoned".to_string()))
    }

    fn flush(&self, buffer: &mut BulkBuffer) -> Result<()> {
        if buffer.pending == 0 {
            return Ok(());
        }
        let body = std::mem::take(&mut buffer.body);
        let count = buffer.pending;
        buffer.pending = 0;

        let response = self
            .client
            .post(self.url("_bulk"))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()?;
        let result: Value = check(response)?.json()?;
        bulk_failures(&result)?;

        buffer.sent += count;
        debug!(documents = count, total = buffer.sent, "bulk request sent");
        Ok(())
    }
}

/// Turn a non-success response into an [`IngestError::Index`].
fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(IngestError::Index(format!("{status}: {body}")))
}

/// Collect per-item failures from a bulk response.
fn bulk_failures(result: &Value) -> Result<()> {
    if !result["errors"].as_bool().unwrap_or(false) {
        return Ok(());
    }
    let failures: Vec<String> = result["items"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(|item| {
            let action = item.get("index")?;
            let error = action.get("error")?;
            Some(format!(
                "{}: {}",
                action["_id"].as_str().unwrap_or_default(),
                error["reason"].as_str().unwrap_or("unknown error")
            ))
        })
        .collect();
    Err(IngestError::Index(format!(
        "{} documents failed to index: {}",
        failures.len(),
        failures.iter().take(5).cloned().collect::<Vec<_>>().join("; ")
    )))
}

/// Index names holding the primary alias, from a `_alias` response.
fn aliased_indexes(result: &Value) -> Vec<String> {
    result
        .as_object()
        .map(|indexes| {
            indexes
                .iter()
                .filter(|(_, body)| body["aliases"].get(PRIMARY_ALIAS).is_some())
                .map(|(name, _)| name.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Append one bulk `index` action and its document.
fn push_action(body: &mut String, record: &Record, index: &str, rtype: &str) -> Result<()> {
    let mut action = json!({ "_index": index, "_id": record.identifier });
    if !rtype.is_empty() && rtype != "_doc" {
        action["_type"] = Value::String(rtype.to_string());
    }
    let _ = writeln!(body, "{}", json!({ "index": action }));
    let _ = writeln!(body, "{}", serde_json::to_string(record)?);
    Ok(())
}

const INDEX_LISTING: &str =
    "_cat/indices?format=json&h=index,docs.count,health,status,uuid,store.size";

impl Indexer for ElasticClient {
    fn current(&self, prefix: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.url(&format!("{prefix}*/_alias/{PRIMARY_ALIAS}")))
            .send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let result: Value = check(response)?.json()?;
        let mut indexes = aliased_indexes(&result);
        match indexes.len() {
            0 => Ok(None),
            1 => Ok(indexes.pop()),
            _ => Err(IngestError::Index(format!(
                "Could not determine current index for prefix '{prefix}': {}",
                indexes.join(", ")
            ))),
        }
    }

    fn create(&self, index: &str) -> Result<()> {
        let exists = self.client.head(self.url(index)).send()?;
        if exists.status().is_success() {
            debug!(index, "index already exists");
            return Ok(());
        }
        let response = self
            .client
            .put(self.url(index))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(self.mappings.clone())
            .send()?;
        check(response)?;
        info!(index, "created index");
        Ok(())
    }

    fn start(&self) -> Result<()> {
        *self.lock()? = Some(BulkBuffer::default());
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let Some(mut buffer) = self.lock()?.take() else {
            return Ok(());
        };
        self.flush(&mut buffer)?;
        info!(documents = buffer.sent, "bulk session closed");
        Ok(())
    }

    fn add(&self, record: &Record, index: &str, rtype: &str) -> Result<()> {
        let mut guard = self.lock()?;
        let buffer = guard
            .as_mut()
            .ok_or_else(|| IngestError::Index("Bulk session not started".to_string()))?;
        push_action(&mut buffer.body, record, index, rtype)?;
        buffer.pending += 1;
        if buffer.pending >= BULK_SIZE {
            self.flush(buffer)?;
        }
        Ok(())
    }

    fn promote(&self, index: &str, prefix: Option<&str>) -> Result<()> {
        let prefix = prefix.unwrap_or_else(|| index_prefix(index));
        let mut actions = vec![json!({ "add": { "index": index, "alias": PRIMARY_ALIAS } })];
        if let Some(current) = self.current(prefix)? {
            if current != index {
                actions.push(json!({ "remove": { "index": current, "alias": PRIMARY_ALIAS } }));
            }
        }
        let response = self
            .client
            .post(self.url("_aliases"))
            .json(&json!({ "actions": actions }))
            .send()?;
        check(response)?;
        info!(index, prefix, alias = PRIMARY_ALIAS, "promoted index");
        Ok(())
    }

    fn delete(&self, index: &str) -> Result<()> {
        check(self.client.delete(self.url(index)).send()?)?;
        info!(index, "deleted index");
        Ok(())
    }

    fn reindex(&self, source: &str, destination: &str) -> Result<u64> {
        let response = self
            .client
            .post(self.url("_reindex?wait_for_completion=true"))
            .json(&json!({ "source": { "index": source }, "dest": { "index": destination } }))
            .send()?;
        let result: Value = check(response)?.json()?;
        Ok(result["total"].as_u64().unwrap_or_default())
    }

    fn indexes(&self) -> Result<Vec<IndexInfo>> {
        let response = self
            .client
            .get(self.url(INDEX_LISTING))
            .send()?;
        Ok(check(response)?.json()?)
    }

    fn aliases(&self) -> Result<Vec<AliasInfo>> {
        let response = self.client.get(self.url("_cat/aliases?format=json")).send()?;
        Ok(check(response)?.json()?)
    }

    fn ping(&self) -> Result<PingInfo> {
        let result: Value = check(self.client.get(self.url("")).send()?)?.json()?;
        Ok(PingInfo {
            name: result["name"].as_str().unwrap_or_default().to_string(),
            cluster_name: result["cluster_name"].as_str().unwrap_or_default().to_string(),
            version: result["version"]["number"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_prefix() {
        assert_eq!(index_prefix("aleph-2019-01-01t00-00-00z"), "aleph");
        assert_eq!(index_prefix("aspace"), "aspace");
    }

    #[test]
    fn test_aliased_indexes() {
        let result = json!({
            "aleph-1": { "aliases": { "timdex-prod": {} } },
            "aleph-2": { "aliases": { "other": {} } }
        });
        assert_eq!(aliased_indexes(&result), vec!["aleph-1".to_string()]);
        assert!(aliased_indexes(&json!({})).is_empty());
    }

    #[test]
    fn test_push_action() {
        let record = Record {
            identifier: "001".to_string(),
            title: "A".to_string(),
            ..Record::default()
        };
        let mut body = String::new();
        push_action(&mut body, &record, "aleph-1", "_doc").unwrap();
        push_action(&mut body, &record, "aleph-1", "Record").unwrap();
        let lines: Vec<Value> = body
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], json!({"index": {"_index": "aleph-1", "_id": "001"}}));
        assert_eq!(lines[1]["title"], "A");
        assert_eq!(lines[2]["index"]["_type"], "Record");
    }

    #[test]
    fn test_bulk_failures() {
        assert!(bulk_failures(&json!({"errors": false, "items": []})).is_ok());
        let result = json!({
            "errors": true,
            "items": [
                {"index": {"_id": "1", "status": 201}},
                {"index": {"_id": "2", "status": 400, "error": {"reason": "mapper_parsing_exception"}}}
            ]
        });
        let err = bulk_failures(&result).unwrap_err();
        assert!(err.to_string().contains("2: mapper_parsing_exception"));
    }

    #[test]
    fn test_add_requires_session() {
        let client = ElasticClient::new("http://127.0.0.1:9200").unwrap();
        assert!(client.add(&Record::default(), "x", "_doc").is_err());
        client.start().unwrap();
        client.add(&Record::default(), "x", "_doc").unwrap();
        assert_eq!(client.lock().unwrap().as_ref().unwrap().pending, 1);
    }

    #[test]
    fn test_bundled_mappings_are_json() {
        let mappings: Value = serde_json::from_str(RECORD_MAPPINGS).unwrap();
        assert!(mappings["mappings"]["properties"]["title"].is_object());
    }
}
