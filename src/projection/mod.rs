//! Projection engine for the workflow exporter
//!
//! Maps engine records onto denormalized search documents:
//! - One [`ProjectionHandler`] per (record kind, document) pair
//! - A closed [`Handler`] set dispatched through the [`HandlerRegistry`]
//! - Per-batch accumulation in the [`EntityMaterializer`]
//! - Idempotent write plans (plain or position-guarded) via [`UpsertPlan`]
//!
//! # Conflict Handling
//!
//! Records arrive at least once and possibly out of order across
//! partitions. Every kind that contributes to a document owns a position
//! field on it; updates for that kind are applied only while its position
//! advances, both inside the batch accumulator and in the store.

pub mod handlers;
mod ids;
mod materializer;
mod registry;
mod runner;
mod upsert;

#[cfg(test)]
pub(crate) mod fixtures;

pub use ids::*;
pub use materializer::*;
pub use registry::*;
pub use runner::*;
pub use upsert::*;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, RwLock};

#[cfg(test)]
use mockall::automock;
use serde::Serialize;

use crate::domain::{OperationType, Record, ValueType};
use crate::infra::{BatchRequest, Result};

/// Mapping contract between one record kind and one document type
///
/// `generate_ids` and `update_entity` must be pure: the same record applied
/// to the same entity always yields the same entity, with no wall-clock
/// reads and no external state beyond constructor dependencies.
pub trait ProjectionHandler {
    type Entity: Serialize + fmt::Debug;

    /// Name used in logs and mapping failures
    fn name(&self) -> &'static str;

    fn handled_kind(&self) -> ValueType;

    /// Whether this record concerns the handler at all
    fn handles_event(&self, record: &Record) -> bool;

    /// Target document ids; empty when the record maps to nothing
    fn generate_ids(&self, record: &Record) -> Vec<String>;

    fn create_new_entity(&self, id: &str) -> Self::Entity;

    /// Apply one record to the accumulator, in place
    fn update_entity(&self, record: &Record, entity: &mut Self::Entity) -> Result<()>;

    /// Emit the write for the accumulated entity
    fn flush(&self, entity: &Self::Entity, batch: &mut BatchRequest) -> Result<()>;

    fn index_name(&self) -> &str;
}

// ============================================================================
// Collaborators
// ============================================================================

/// Resolves the ancestry path of a flow node instance
#[cfg_attr(test, automock)]
pub trait HierarchyLookup: Send + Sync {
    /// Tree path such as `PI_1/FN_task/FNI_2`, if known
    fn tree_path(&self, process_instance_key: i64, flow_node_instance_key: i64) -> Option<String>;
}

/// Hierarchy lookup that knows nothing; callers fall back to defaults
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHierarchy;

impl HierarchyLookup for NoHierarchy {
    fn tree_path(&self, _process_instance_key: i64, _flow_node_instance_key: i64) -> Option<String> {
        None
    }
}

/// Hierarchy lookup backed by a fixed map of known paths
#[derive(Debug, Default)]
pub struct StaticHierarchy {
    paths: RwLock<HashMap<(i64, i64), String>>,
}

impl StaticHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, process_instance_key: i64, flow_node_instance_key: i64, path: &str) {
        let mut paths = self.paths.write().unwrap_or_else(|e| e.into_inner());
        paths.insert((process_instance_key, flow_node_instance_key), path.to_string());
    }
}

impl HierarchyLookup for StaticHierarchy {
    fn tree_path(&self, process_instance_key: i64, flow_node_instance_key: i64) -> Option<String> {
        let paths = self.paths.read().unwrap_or_else(|e| e.into_inner());
        paths
            .get(&(process_instance_key, flow_node_instance_key))
            .cloned()
    }
}

/// A user operation that a projected write brought to completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationCompletion {
    pub operation: OperationType,
    pub process_instance_key: i64,
    /// Key of the incident or variable scope the operation targeted
    pub target_key: i64,
}

/// Receives operation completions at flush time
#[cfg_attr(test, automock)]
pub trait OperationCompletionSink: Send + Sync {
    fn complete(&self, completion: OperationCompletion);
}

/// Sink that discards completions
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOperationSink;

impl OperationCompletionSink for NoopOperationSink {
    fn complete(&self, _completion: OperationCompletion) {}
}

/// Sink that keeps completions in memory
#[derive(Debug, Default)]
pub struct RecordingOperationSink {
    completed: Mutex<Vec<OperationCompletion>>,
}

impl RecordingOperationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completions(&self) -> Vec<OperationCompletion> {
        self.completed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl OperationCompletionSink for RecordingOperationSink {
    fn complete(&self, completion: OperationCompletion) {
        tracing::debug!(
            operation = %completion.operation,
            process_instance_key = completion.process_instance_key,
            target_key = completion.target_key,
            "Operation completed"
        );
        self.completed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(completion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_hierarchy() {
        let hierarchy = StaticHierarchy::new();
        hierarchy.insert(1, 2, "PI_1/FN_a/FNI_2");

        assert_eq!(hierarchy.tree_path(1, 2).as_deref(), Some("PI_1/FN_a/FNI_2"));
        assert_eq!(hierarchy.tree_path(1, 3), None);
        assert_eq!(NoHierarchy.tree_path(1, 2), None);
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingOperationSink::new();
        sink.complete(OperationCompletion {
            operation: OperationType::ResolveIncident,
            process_instance_key: 1,
            target_key: 9,
        });
        assert_eq!(sink.completions().len(), 1);
        assert_eq!(sink.completions()[0].target_key, 9);
    }
}
