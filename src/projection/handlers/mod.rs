//! Record-to-document handlers
//!
//! Each handler maps one record kind onto one document type. Several
//! handlers may write the same document; each then owns a distinct position
//! field and a disjoint set of fields on it.
//!
//! # Documents
//!
//! - **List view**: process instance, flow node and variable summary rows
//! - **Flow node instances**: per-element detail rows
//! - **Incidents**: one row per incident
//! - **Events**: audit row per element instance
//! - **Decision instances**: one row per evaluated decision
//! - **User tasks**: one row per user task
//! - **Usage metrics**: one row per started root process instance

mod decision;
mod event;
mod flow_node;
mod incident;
mod list_view;
mod metric;
mod user_task;

pub use decision::DecisionInstanceHandler;
pub use event::{EventFromIncidentHandler, EventFromJobHandler, EventFromProcessInstanceHandler};
pub use flow_node::{FlowNodeInstanceFromIncidentHandler, FlowNodeInstanceHandler};
pub use incident::IncidentHandler;
pub use list_view::{
    ListViewFlowNodeFromIncidentHandler, ListViewFlowNodeFromJobHandler, ListViewFlowNodeHandler,
    ListViewProcessInstanceHandler, ListViewVariableHandler,
};
pub use metric::MetricFromProcessInstanceHandler;
pub use user_task::UserTaskHandler;

use chrono::{DateTime, Utc};

use crate::domain::Record;
use crate::infra::{ExporterError, Result};

fn record_date(record: &Record) -> Result<DateTime<Utc>> {
    record.date_time().ok_or_else(|| {
        ExporterError::InvalidRecord(format!("timestamp {} is out of range", record.timestamp))
    })
}

fn unexpected_payload(handler: &str, record: &Record) -> ExporterError {
    ExporterError::InvalidRecord(format!(
        "{} cannot map a {} payload",
        handler,
        record.value_type()
    ))
}

/// Process instance the record belongs to; routed documents cannot be written without it
fn owning_process_instance(handler: &str, record: &Record) -> Result<i64> {
    record.process_instance_key().ok_or_else(|| {
        ExporterError::InvalidRecord(format!(
            "{} requires a process instance key on {} record {}",
            handler,
            record.value_type(),
            record.key
        ))
    })
}

/// Engine keys use `-1` (or `0`) for "none"
fn known_key(key: i64) -> Option<i64> {
    (key > 0).then_some(key)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
