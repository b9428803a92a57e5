//! Trait definitions for the exporter's storage seam

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::batch::{WriteRequest, WriteResult};
use super::Result;

/// Search/document store receiving projected documents.
///
/// Each single-document write is atomic; a bulk call is not transactional.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Execute a slice of write requests
    ///
    /// Returns one result per request, in request order. An `Err` means the
    /// whole call failed and none of the requests can be assumed applied.
    async fn bulk(&self, requests: Vec<WriteRequest>) -> Result<Vec<WriteResult>>;
}
