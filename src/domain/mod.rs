//! Domain models for the workflow exporter
//!
//! - [`Record`] and its typed payloads, as delivered by the engine
//! - Projected documents written to the search store
//! - Lifecycle states and shared enums

mod documents;
mod record;
mod types;

pub use documents::*;
pub use record::*;
pub use types::*;
