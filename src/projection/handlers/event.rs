//! Audit event rows
//!
//! One row per element instance, keyed `"{processInstanceKey}_{elementInstanceKey}"`.
//! Lifecycle, incident and job records each keep their own section and
//! position guard on the row.

use chrono::{DateTime, Utc};

use super::{known_key, owning_process_instance, record_date, unexpected_payload};
use crate::domain::{
    Event, EventDetail, EventSourceType, IncidentEventDetail, Intent, JobEventDetail, Record,
    RecordValue, ValueType,
};
use crate::infra::{BatchRequest, Result};
use crate::projection::{advance_position, composite_id, routing_key, ProjectionHandler, UpsertPlan};

/// Fields derived from the row id itself; every kind writes the same values
const IDENTITY_FIELDS: [&str; 5] = [
    "key",
    "partitionId",
    "processInstanceKey",
    "flowNodeInstanceKey",
    "tenantId",
];

/// Element metadata owned by the lifecycle kind; other kinds only seed it on insert
const DEFINITION_FIELDS: [&str; 3] = ["processDefinitionKey", "bpmnProcessId", "flowNodeId"];

struct ElementRef<'a> {
    process_instance_key: i64,
    process_definition_key: i64,
    bpmn_process_id: &'a str,
    element_id: &'a str,
    element_instance_key: i64,
}

fn set_identity(entity: &mut Event, record: &Record, element: ElementRef<'_>) {
    entity.key = element.element_instance_key;
    entity.partition_id = record.partition_id;
    entity.process_instance_key = element.process_instance_key;
    entity.process_definition_key = element.process_definition_key;
    entity.bpmn_process_id = element.bpmn_process_id.to_string();
    entity.flow_node_id = element.element_id.to_string();
    entity.flow_node_instance_key = element.element_instance_key;
    entity.tenant_id = record.tenant_id.clone();
}

// ============================================================================
// Element lifecycle
// ============================================================================

pub struct EventFromProcessInstanceHandler {
    index: String,
}

impl EventFromProcessInstanceHandler {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
        }
    }
}

impl ProjectionHandler for EventFromProcessInstanceHandler {
    type Entity = Event;

    fn name(&self) -> &'static str {
        "event-from-process-instance"
    }

    fn handled_kind(&self) -> ValueType {
        ValueType::ProcessInstance
    }

    fn handles_event(&self, record: &Record) -> bool {
        matches!(&record.value, RecordValue::ProcessInstance(v) if !v.is_process())
            && record.intent.is_element_lifecycle()
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        match &record.value {
            RecordValue::ProcessInstance(v) => vec![composite_id(v.process_instance_key, record.key)],
            _ => vec![],
        }
    }

    fn create_new_entity(&self, id: &str) -> Event {
        Event::new(id)
    }

    fn update_entity(&self, record: &Record, entity: &mut Event) -> Result<()> {
        let RecordValue::ProcessInstance(value) = &record.value else {
            return Err(unexpected_payload(self.name(), record));
        };
        owning_process_instance(self.name(), record)?;
        if !advance_position(&mut entity.position, record.position) {
            return Ok(());
        }

        set_identity(
            entity,
            record,
            ElementRef {
                process_instance_key: value.process_instance_key,
                process_definition_key: value.process_definition_key,
                bpmn_process_id: &value.bpmn_process_id,
                element_id: &value.element_id,
                element_instance_key: record.key,
            },
        );
        entity.process_instance_event = Some(EventDetail {
            event_source_type: EventSourceType::ProcessInstance,
            event_type: record.intent.as_str().to_string(),
            date_time: Some(record_date(record)?),
        });
        Ok(())
    }

    fn flush(&self, entity: &Event, batch: &mut BatchRequest) -> Result<()> {
        UpsertPlan::new(&self.index, &entity.id, entity)?
            .routed(routing_key(entity.process_instance_key))
            .guarded_by("position")
            .set(&IDENTITY_FIELDS)
            .set(&DEFINITION_FIELDS)
            .set(&["processInstanceEvent"])
            .submit(batch)
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}

// ============================================================================
// Incidents
// ============================================================================

pub struct EventFromIncidentHandler {
    index: String,
}

impl EventFromIncidentHandler {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
        }
    }
}

impl ProjectionHandler for EventFromIncidentHandler {
    type Entity = Event;

    fn name(&self) -> &'static str {
        "event-from-incident"
    }

    fn handled_kind(&self) -> ValueType {
        ValueType::Incident
    }

    fn handles_event(&self, record: &Record) -> bool {
        matches!(
            &record.value,
            RecordValue::Incident(v) if v.element_instance_key > 0 && v.process_instance_key > 0
        ) && matches!(record.intent, Intent::Created | Intent::Resolved)
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        match &record.value {
            RecordValue::Incident(v) => {
                vec![composite_id(v.process_instance_key, v.element_instance_key)]
            }
            _ => vec![],
        }
    }

    fn create_new_entity(&self, id: &str) -> Event {
        Event::new(id)
    }

    fn update_entity(&self, record: &Record, entity: &mut Event) -> Result<()> {
        let RecordValue::Incident(value) = &record.value else {
            return Err(unexpected_payload(self.name(), record));
        };
        owning_process_instance(self.name(), record)?;
        if !advance_position(&mut entity.position_incident, record.position) {
            return Ok(());
        }

        set_identity(
            entity,
            record,
            ElementRef {
                process_instance_key: value.process_instance_key,
                process_definition_key: value.process_definition_key,
                bpmn_process_id: &value.bpmn_process_id,
                element_id: &value.element_id,
                element_instance_key: value.element_instance_key,
            },
        );
        entity.incident_event = Some(IncidentEventDetail {
            event_source_type: EventSourceType::Incident,
            event_type: record.intent.as_str().to_string(),
            date_time: Some(record_date(record)?),
            incident_key: record.key,
            incident_error_type: value.error_type.clone(),
            incident_error_message: value.error_message.clone(),
        });
        Ok(())
    }

    fn flush(&self, entity: &Event, batch: &mut BatchRequest) -> Result<()> {
        UpsertPlan::new(&self.index, &entity.id, entity)?
            .routed(routing_key(entity.process_instance_key))
            .guarded_by("positionIncident")
            .set(&IDENTITY_FIELDS)
            .set(&["incidentEvent"])
            .submit(batch)
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}

// ============================================================================
// Jobs
// ============================================================================

pub struct EventFromJobHandler {
    index: String,
}

impl EventFromJobHandler {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
        }
    }
}

impl ProjectionHandler for EventFromJobHandler {
    type Entity = Event;

    fn name(&self) -> &'static str {
        "event-from-job"
    }

    fn handled_kind(&self) -> ValueType {
        ValueType::Job
    }

    fn handles_event(&self, record: &Record) -> bool {
        matches!(
            &record.value,
            RecordValue::Job(v) if v.element_instance_key > 0 && v.process_instance_key > 0
        ) && matches!(
            record.intent,
            Intent::Created
                | Intent::Completed
                | Intent::Failed
                | Intent::TimedOut
                | Intent::RetriesUpdated
                | Intent::Canceled
                | Intent::ErrorThrown
        )
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        match &record.value {
            RecordValue::Job(v) => vec![composite_id(v.process_instance_key, v.element_instance_key)],
            _ => vec![],
        }
    }

    fn create_new_entity(&self, id: &str) -> Event {
        Event::new(id)
    }

    fn update_entity(&self, record: &Record, entity: &mut Event) -> Result<()> {
        let RecordValue::Job(value) = &record.value else {
            return Err(unexpected_payload(self.name(), record));
        };
        owning_process_instance(self.name(), record)?;
        if !advance_position(&mut entity.position_job, record.position) {
            return Ok(());
        }

        set_identity(
            entity,
            record,
            ElementRef {
                process_instance_key: value.process_instance_key,
                process_definition_key: value.process_definition_key,
                bpmn_process_id: &value.bpmn_process_id,
                element_id: &value.element_id,
                element_instance_key: value.element_instance_key,
            },
        );

        let deadline = known_key(value.deadline).and_then(DateTime::<Utc>::from_timestamp_millis);
        entity.job_event = Some(JobEventDetail {
            event_source_type: EventSourceType::Job,
            event_type: record.intent.as_str().to_string(),
            date_time: Some(record_date(record)?),
            job_key: record.key,
            job_type: value.job_type.clone(),
            job_worker: value.worker.clone(),
            job_retries: value.retries,
            job_deadline: deadline,
            job_custom_headers: value.custom_headers.clone(),
        });
        Ok(())
    }

    fn flush(&self, entity: &Event, batch: &mut BatchRequest) -> Result<()> {
        UpsertPlan::new(&self.index, &entity.id, entity)?
            .routed(routing_key(entity.process_instance_key))
            .guarded_by("positionJob")
            .set(&IDENTITY_FIELDS)
            .set(&["jobEvent"])
            .submit(batch)
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}
