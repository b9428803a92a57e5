//! In-memory document store
//!
//! Implements the store contract the exporter relies on, including routed
//! writes and the guarded-merge script semantics, so projections can be
//! exercised end to end without an external search cluster.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::batch::{WriteRequest, WriteResult, WriteStatus};
use super::traits::DocumentStore;
use super::Result;

#[derive(Debug, Clone)]
struct StoredDocument {
    source: Map<String, Value>,
    routing: Option<String>,
}

type DocumentKey = (String, String);

/// In-memory document store keyed by (index, id)
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<DocumentKey, StoredDocument>>,
    rejected: RwLock<HashSet<DocumentKey>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            rejected: RwLock::new(HashSet::new()),
        }
    }

    /// Make every future write to (index, id) fail
    pub async fn reject_writes_to(&self, index: &str, id: &str) {
        self.rejected
            .write()
            .await
            .insert((index.to_string(), id.to_string()));
    }

    pub async fn get(&self, index: &str, id: &str) -> Option<Value> {
        let documents = self.documents.read().await;
        documents
            .get(&(index.to_string(), id.to_string()))
            .map(|doc| Value::Object(doc.source.clone()))
    }

    pub async fn routing(&self, index: &str, id: &str) -> Option<String> {
        let documents = self.documents.read().await;
        documents
            .get(&(index.to_string(), id.to_string()))
            .and_then(|doc| doc.routing.clone())
    }

    /// All documents of an index, ordered by id
    pub async fn documents(&self, index: &str) -> Vec<(String, Value)> {
        let documents = self.documents.read().await;
        let mut found: Vec<(String, Value)> = documents
            .iter()
            .filter(|((i, _), _)| i == index)
            .map(|((_, id), doc)| (id.clone(), Value::Object(doc.source.clone())))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        found
    }

    /// Every stored document, ordered by (index, id)
    pub async fn snapshot(&self) -> Vec<(String, String, Value)> {
        let documents = self.documents.read().await;
        let mut all: Vec<(String, String, Value)> = documents
            .iter()
            .map(|((index, id), doc)| (index.clone(), id.clone(), Value::Object(doc.source.clone())))
            .collect();
        all.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        all
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn apply(existing: &mut StoredDocument, request: WriteRequest) -> WriteStatus {
        if let (Some(stored), Some(incoming)) = (&existing.routing, &request.routing) {
            if stored != incoming {
                return WriteStatus::Failed(format!(
                    "routing mismatch: stored {}, requested {}",
                    stored, incoming
                ));
            }
        }

        match request.script {
            Some(script) => {
                let Some(incoming) = script.params.get(&script.guard_field).and_then(Value::as_i64)
                else {
                    return WriteStatus::Failed(format!(
                        "script parameter {} missing",
                        script.guard_field
                    ));
                };
                let stored = existing
                    .source
                    .get(&script.guard_field)
                    .and_then(Value::as_i64);

                match stored {
                    Some(stored) if stored >= incoming => WriteStatus::Noop,
                    _ => {
                        existing.source.extend(script.params);
                        WriteStatus::Updated
                    }
                }
            }
            None => {
                existing.source.extend(request.fields);
                WriteStatus::Updated
            }
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn bulk(&self, requests: Vec<WriteRequest>) -> Result<Vec<WriteResult>> {
        let rejected = self.rejected.read().await;
        let mut documents = self.documents.write().await;
        let mut results = Vec::with_capacity(requests.len());

        for request in requests {
            let key = (request.index.clone(), request.id.clone());
            let status = if rejected.contains(&key) {
                WriteStatus::Failed("document rejected by store".to_string())
            } else {
                match documents.get_mut(&key) {
                    Some(existing) => Self::apply(existing, request),
                    None => {
                        documents.insert(
                            key.clone(),
                            StoredDocument {
                                source: request.document,
                                routing: request.routing,
                            },
                        );
                        WriteStatus::Created
                    }
                }
            };

            results.push(WriteResult {
                index: key.0,
                id: key.1,
                status,
            });
        }

        Ok(results)
    }
}
