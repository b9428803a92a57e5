//! Workflow Exporter Library
//!
//! Projects the record stream of a workflow engine into denormalized,
//! query-optimized documents in a search store. Records arrive in batches,
//! at least once and possibly out of order across partitions; every write
//! is idempotent and guarded by per-kind record positions so that
//! redelivery and reordering converge on the same documents.
//!
//! ## Modules
//!
//! - [`domain`] - Engine records and projected documents
//! - [`projection`] - Handlers, registry, materializer and batch runner
//! - [`infra`] - Errors, the document store seam and bulk execution
//! - [`config`] - Exporter configuration
//! - [`metrics`] - In-process metrics
//! - [`telemetry`] - Logging setup

pub mod config;
pub mod domain;
pub mod infra;
pub mod metrics;
pub mod projection;
pub mod telemetry;

// Re-export commonly used types
pub use config::ExporterConfig;
pub use domain::{Intent, Record, RecordValue, ValueType};
pub use infra::{
    BatchRequest, DocumentStore, ExporterError, InMemoryDocumentStore, MappingFailure, Result,
};
pub use projection::{
    BatchOutcome, EntityMaterializer, ExportStats, HandlerRegistry, HierarchyLookup,
    OperationCompletionSink, ProjectionHandler, ProjectionRunner,
};
