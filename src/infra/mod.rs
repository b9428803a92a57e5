//! Infrastructure layer for the workflow exporter
//!
//! Contains:
//! - Error types
//! - The document store seam (bulk writes)
//! - Batch request assembly and chunked execution
//! - An in-memory document store

mod batch;
mod error;
mod memory;
mod traits;

pub use batch::{
    chunked, BatchRequest, BatchStats, UpdateScript, WriteRequest, WriteResult, WriteStatus,
    DEFAULT_CHUNK_SIZE,
};
pub use error::*;
pub use memory::InMemoryDocumentStore;
pub use traits::*;
