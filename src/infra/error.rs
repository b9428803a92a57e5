//! Error types for the workflow exporter

use thiserror::Error;

use crate::domain::ValueType;

/// A handler could not map a record onto its document
///
/// Only the affected (handler, document) pair is dropped from the batch.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{handler} failed to map {kind} record {key} at position {position} onto document {id}: {message}")]
pub struct MappingFailure {
    pub handler: String,
    pub id: String,
    pub kind: ValueType,
    pub key: i64,
    pub position: i64,
    pub message: String,
}

/// The store rejected or never acknowledged a single document write
#[derive(Error, Debug, Clone, PartialEq)]
#[error("write to {index}/{id} failed: {reason}")]
pub struct DocumentFailure {
    pub index: String,
    pub id: String,
    pub reason: String,
}

/// Errors that can occur in the exporter
#[derive(Error, Debug)]
pub enum ExporterError {
    /// Record content a handler cannot interpret
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Mapping failure with full record context
    #[error(transparent)]
    Mapping(#[from] MappingFailure),

    /// Whole bulk request failed (transport, timeout)
    #[error("document store error: {0}")]
    Store(String),

    /// Some writes of a batch did not succeed
    #[error("batch incomplete: {failed} of {total} operations failed")]
    BatchIncomplete { failed: usize, total: usize },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for exporter operations
pub type Result<T> = std::result::Result<T, ExporterError>;
