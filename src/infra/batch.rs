//! Batch write utilities
//!
//! Collects the write instructions produced by projection handlers and
//! submits them to a [`DocumentStore`]:
//! - Plain and routed upserts
//! - Guarded script upserts (conditional on a position field)
//! - Chunked bulk submission with per-document outcome accounting

use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::{DocumentFailure, ExporterError, Result};
use super::traits::DocumentStore;

/// Default number of write requests per bulk call
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Store-side update script
///
/// `source` is the script text for stores that execute scripts; `guard_field`
/// and `params` carry the same semantics in structured form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScript {
    pub source: String,
    pub guard_field: String,
    pub params: Map<String, Value>,
}

/// One document write
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    pub index: String,
    pub id: String,
    /// Full document, used when the document does not exist yet
    pub document: Map<String, Value>,
    /// Fields applied to an existing document (plain upsert)
    pub fields: Map<String, Value>,
    pub routing: Option<String>,
    pub script: Option<UpdateScript>,
}

/// What the store did with one write request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    Created,
    Updated,
    /// Guard rejected the update; the stored document is unchanged
    Noop,
    Failed(String),
}

/// Per-request answer of a bulk call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    pub index: String,
    pub id: String,
    pub status: WriteStatus,
}

/// Write instructions collected for one exported batch
#[derive(Debug, Default, Clone)]
pub struct BatchRequest {
    requests: Vec<WriteRequest>,
}

impl BatchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert replacing `fields` on an existing document
    pub fn upsert<T: Serialize>(
        &mut self,
        index: &str,
        id: &str,
        entity: &T,
        fields: Map<String, Value>,
    ) -> Result<()> {
        self.push(index, id, entity, fields, None, None)
    }

    /// Upsert of a child document stored next to its parent
    pub fn upsert_with_routing<T: Serialize>(
        &mut self,
        index: &str,
        id: &str,
        entity: &T,
        fields: Map<String, Value>,
        routing: &str,
    ) -> Result<()> {
        self.push(index, id, entity, fields, Some(routing.to_string()), None)
    }

    /// Upsert whose update branch runs `script` on the stored document
    pub fn upsert_with_script<T: Serialize>(
        &mut self,
        index: &str,
        id: &str,
        entity: &T,
        script: UpdateScript,
    ) -> Result<()> {
        self.push(index, id, entity, Map::new(), None, Some(script))
    }

    pub fn upsert_with_script_and_routing<T: Serialize>(
        &mut self,
        index: &str,
        id: &str,
        entity: &T,
        script: UpdateScript,
        routing: &str,
    ) -> Result<()> {
        self.push(
            index,
            id,
            entity,
            Map::new(),
            Some(routing.to_string()),
            Some(script),
        )
    }

    fn push<T: Serialize>(
        &mut self,
        index: &str,
        id: &str,
        entity: &T,
        fields: Map<String, Value>,
        routing: Option<String>,
        script: Option<UpdateScript>,
    ) -> Result<()> {
        let document = match serde_json::to_value(entity)? {
            Value::Object(map) => map,
            other => {
                return Err(ExporterError::InvalidRecord(format!(
                    "document {}/{} serialized to a non-object: {}",
                    index, id, other
                )))
            }
        };

        self.requests.push(WriteRequest {
            index: index.to_string(),
            id: id.to_string(),
            document,
            fields,
            routing,
            script,
        });
        Ok(())
    }

    pub fn requests(&self) -> &[WriteRequest] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Submit all requests in chunks of `chunk_size`
    ///
    /// Never fails as a whole: a rejected bulk call marks every request of
    /// its chunk as failed and the remaining chunks are still submitted.
    pub async fn execute(self, store: &dyn DocumentStore, chunk_size: usize) -> BatchStats {
        let started = Instant::now();
        let mut stats = BatchStats {
            batch_id: Uuid::new_v4(),
            ..Default::default()
        };

        for chunk in chunked(&self.requests, chunk_size.max(1)) {
            stats.processed += chunk.len();
            let expected: Vec<(String, String)> = chunk
                .iter()
                .map(|r| (r.index.clone(), r.id.clone()))
                .collect();

            match store.bulk(chunk).await {
                Ok(results) => {
                    for result in &results {
                        stats.record(result);
                    }
                    // Requests the store never answered count as failed
                    for (index, id) in expected.into_iter().skip(results.len()) {
                        stats.fail(index, id, "no response from store".to_string());
                    }
                }
                Err(e) => {
                    warn!(
                        batch_id = %stats.batch_id,
                        documents = expected.len(),
                        error = %e,
                        "Bulk request failed"
                    );
                    let reason = e.to_string();
                    for (index, id) in expected {
                        stats.fail(index, id, reason.clone());
                    }
                }
            }
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        debug!(
            batch_id = %stats.batch_id,
            processed = stats.processed,
            failed = stats.failed(),
            duration_ms = stats.duration_ms,
            "Batch executed"
        );
        stats
    }
}

/// Process items in chunks to respect bulk size limits
pub fn chunked<T: Clone>(items: &[T], chunk_size: usize) -> impl Iterator<Item = Vec<T>> + '_ {
    items.chunks(chunk_size).map(|chunk| chunk.to_vec())
}

/// Statistics for one executed batch
#[derive(Debug, Default, Clone)]
pub struct BatchStats {
    pub batch_id: Uuid,
    /// Number of requests submitted
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    /// Requests rejected by a position guard
    pub noop: usize,
    pub failures: Vec<DocumentFailure>,
    /// Processing time in milliseconds
    pub duration_ms: u64,
}

impl BatchStats {
    fn record(&mut self, result: &WriteResult) {
        match &result.status {
            WriteStatus::Created => self.created += 1,
            WriteStatus::Updated => self.updated += 1,
            WriteStatus::Noop => self.noop += 1,
            WriteStatus::Failed(reason) => {
                self.fail(result.index.clone(), result.id.clone(), reason.clone())
            }
        }
    }

    fn fail(&mut self, index: String, id: String, reason: String) {
        self.failures.push(DocumentFailure { index, id, reason });
    }

    pub fn succeeded(&self) -> usize {
        self.created + self.updated + self.noop
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            return 1.0;
        }
        self.succeeded() as f64 / self.processed as f64
    }
}
