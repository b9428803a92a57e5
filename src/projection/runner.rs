//! Projection runner
//!
//! Drives one delivered chunk of records through the projection:
//! materialize, flush into a bulk request, submit it to the document store
//! and account for the outcome.
//!
//! # Failure Model
//!
//! Mapping failures drop only the affected documents (unless the
//! configuration asks to reject the whole batch). Persistence failures are
//! reported per document. Nothing is retried here; redelivering the same
//! records is always safe because every write is idempotent.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{EntityMaterializer, HandlerRegistry, HierarchyLookup, OperationCompletionSink};
use crate::config::ExporterConfig;
use crate::domain::Record;
use crate::infra::{
    BatchRequest, DocumentFailure, DocumentStore, ExporterError, MappingFailure, Result,
};
use crate::metrics::{metric_names, timed, MetricsRegistry};

/// Running totals across exported batches
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportStats {
    pub batches_exported: u64,
    pub records_processed: u64,
    /// Records no handler was interested in
    pub records_skipped: u64,
    pub documents_written: u64,
    /// Writes the store turned into no-ops
    pub documents_unchanged: u64,
    pub documents_failed: u64,
    pub mapping_failures: u64,
    /// Highest record position fully exported, per partition
    pub last_exported_position: BTreeMap<i32, i64>,
}

/// Result of exporting one batch of records
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub batch_id: Uuid,
    pub records: usize,
    /// Documents created or updated
    pub documents_written: usize,
    pub documents_unchanged: usize,
    pub mapping_failures: Vec<MappingFailure>,
    pub persistence_failures: Vec<DocumentFailure>,
    pub duration_ms: u64,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.mapping_failures.is_empty() && self.persistence_failures.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.mapping_failures.len() + self.persistence_failures.len()
    }

    /// Turn any failure into [`ExporterError::BatchIncomplete`]
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            return Ok(self);
        }
        Err(ExporterError::BatchIncomplete {
            failed: self.failed(),
            total: self.failed() + self.documents_written + self.documents_unchanged,
        })
    }
}

/// Exports record batches into a document store
pub struct ProjectionRunner {
    config: ExporterConfig,
    registry: Arc<HandlerRegistry>,
    store: Arc<dyn DocumentStore>,
    metrics: Option<Arc<MetricsRegistry>>,
    stats: RwLock<ExportStats>,
}

impl ProjectionRunner {
    pub fn new(
        config: ExporterConfig,
        registry: Arc<HandlerRegistry>,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            store,
            metrics: None,
            stats: RwLock::new(ExportStats::default()),
        })
    }

    /// Runner with every built-in handler
    pub fn standard(
        config: ExporterConfig,
        store: Arc<dyn DocumentStore>,
        hierarchy: Arc<dyn HierarchyLookup>,
        operations: Arc<dyn OperationCompletionSink>,
    ) -> Result<Self> {
        let registry = HandlerRegistry::standard(&config, hierarchy, operations);
        Self::new(config, Arc::new(registry), store)
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub async fn stats(&self) -> ExportStats {
        self.stats.read().await.clone()
    }

    /// Export one batch of records
    ///
    /// Fails as a whole only when a mapping failure occurs and
    /// `continue_on_mapping_error` is off; nothing is written in that case.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn export_batch(&self, records: &[Record]) -> Result<BatchOutcome> {
        let started = Instant::now();

        let mut materializer = EntityMaterializer::new(&self.registry);
        materializer.apply_all(records);
        let materialized = materializer.stats();

        let mut batch = BatchRequest::new();
        let mapping_failures = materializer.flush(&mut batch);
        if let Some(metrics) = &self.metrics {
            metrics
                .observe_histogram(
                    metric_names::MAPPING_LATENCY,
                    started.elapsed().as_secs_f64(),
                )
                .await;
        }

        if !self.config.continue_on_mapping_error {
            if let Some(first) = mapping_failures.first() {
                warn!(
                    failures = mapping_failures.len(),
                    "Rejecting batch with mapping failures"
                );
                self.record_rejection(records.len(), mapping_failures.len()).await;
                return Err(ExporterError::Mapping(first.clone()));
            }
        }

        debug!(
            mapped = materialized.records_mapped,
            skipped = materialized.records_skipped,
            writes = batch.len(),
            "Batch materialized"
        );

        let write = batch.execute(self.store.as_ref(), self.config.bulk_chunk_size);
        let executed = match &self.metrics {
            Some(metrics) => timed(metrics, metric_names::BULK_LATENCY, write).await,
            None => write.await,
        };

        let outcome = BatchOutcome {
            batch_id: executed.batch_id,
            records: records.len(),
            documents_written: executed.created + executed.updated,
            documents_unchanged: executed.noop,
            mapping_failures,
            persistence_failures: executed.failures,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        self.record_outcome(records, materialized.records_skipped, &outcome)
            .await;

        if outcome.is_complete() {
            info!(
                batch_id = %outcome.batch_id,
                records = outcome.records,
                written = outcome.documents_written,
                unchanged = outcome.documents_unchanged,
                duration_ms = outcome.duration_ms,
                "Batch exported"
            );
        } else {
            warn!(
                batch_id = %outcome.batch_id,
                records = outcome.records,
                written = outcome.documents_written,
                mapping_failures = outcome.mapping_failures.len(),
                persistence_failures = outcome.persistence_failures.len(),
                "Batch exported with failures"
            );
        }

        Ok(outcome)
    }

    async fn record_rejection(&self, records: usize, failures: usize) {
        {
            let mut stats = self.stats.write().await;
            stats.mapping_failures += failures as u64;
        }
        if let Some(metrics) = &self.metrics {
            metrics
                .add_counter(metric_names::RECORDS_RECEIVED, records as u64)
                .await;
            metrics
                .add_counter(metric_names::MAPPING_FAILURES, failures as u64)
                .await;
        }
    }

    async fn record_outcome(&self, records: &[Record], skipped: usize, outcome: &BatchOutcome) {
        let last_position = {
            let mut stats = self.stats.write().await;
            stats.batches_exported += 1;
            stats.records_processed += records.len() as u64;
            stats.records_skipped += skipped as u64;
            stats.documents_written += outcome.documents_written as u64;
            stats.documents_unchanged += outcome.documents_unchanged as u64;
            stats.documents_failed += outcome.persistence_failures.len() as u64;
            stats.mapping_failures += outcome.mapping_failures.len() as u64;

            // A partition only advances once its writes are all acknowledged
            if outcome.persistence_failures.is_empty() {
                for record in records {
                    let position = stats
                        .last_exported_position
                        .entry(record.partition_id)
                        .or_insert(record.position);
                    *position = (*position).max(record.position);
                }
            }
            stats.last_exported_position.values().copied().max()
        };

        let Some(metrics) = &self.metrics else {
            return;
        };
        metrics.inc_counter(metric_names::BATCHES_EXPORTED).await;
        metrics
            .add_counter(metric_names::RECORDS_RECEIVED, records.len() as u64)
            .await;
        metrics
            .add_counter(metric_names::RECORDS_SKIPPED, skipped as u64)
            .await;
        metrics
            .add_counter(
                metric_names::DOCUMENTS_WRITTEN,
                outcome.documents_written as u64,
            )
            .await;
        metrics
            .add_counter(
                metric_names::DOCUMENTS_UNCHANGED,
                outcome.documents_unchanged as u64,
            )
            .await;
        metrics
            .add_counter(
                metric_names::DOCUMENTS_FAILED,
                outcome.persistence_failures.len() as u64,
            )
            .await;
        metrics
            .add_counter(
                metric_names::MAPPING_FAILURES,
                outcome.mapping_failures.len() as u64,
            )
            .await;
        if let Some(position) = last_position {
            metrics
                .set_gauge(metric_names::LAST_EXPORTED_POSITION, position.max(0) as u64)
                .await;
        }
    }
}
