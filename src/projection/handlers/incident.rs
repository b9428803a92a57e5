//! Incident rows

use std::sync::Arc;

use super::{known_key, owning_process_instance, record_date, unexpected_payload};
use crate::domain::{Incident, IncidentState, Intent, OperationType, Record, RecordValue, ValueType};
use crate::infra::{BatchRequest, Result};
use crate::projection::{
    advance_position, default_tree_path, routing_key, HierarchyLookup, OperationCompletion,
    OperationCompletionSink, ProjectionHandler, UpsertPlan,
};

pub struct IncidentHandler {
    index: String,
    hierarchy: Arc<dyn HierarchyLookup>,
    operations: Arc<dyn OperationCompletionSink>,
}

impl IncidentHandler {
    pub fn new(
        index: impl Into<String>,
        hierarchy: Arc<dyn HierarchyLookup>,
        operations: Arc<dyn OperationCompletionSink>,
    ) -> Self {
        Self {
            index: index.into(),
            hierarchy,
            operations,
        }
    }
}

impl ProjectionHandler for IncidentHandler {
    type Entity = Incident;

    fn name(&self) -> &'static str {
        "incident"
    }

    fn handled_kind(&self) -> ValueType {
        ValueType::Incident
    }

    fn handles_event(&self, record: &Record) -> bool {
        matches!(record.value, RecordValue::Incident(_))
            && matches!(
                record.intent,
                Intent::Created | Intent::Resolved | Intent::Migrated
            )
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        vec![record.key.to_string()]
    }

    fn create_new_entity(&self, id: &str) -> Incident {
        Incident::new(id)
    }

    fn update_entity(&self, record: &Record, entity: &mut Incident) -> Result<()> {
        let RecordValue::Incident(value) = &record.value else {
            return Err(unexpected_payload(self.name(), record));
        };
        owning_process_instance(self.name(), record)?;
        if !advance_position(&mut entity.position, record.position) {
            return Ok(());
        }

        entity.key = record.key;
        entity.partition_id = record.partition_id;
        entity.error_type = value.error_type.clone();
        entity.error_message = value.error_message.clone();
        entity.flow_node_id = value.element_id.clone();
        entity.flow_node_instance_key = value.element_instance_key;
        entity.job_key = known_key(value.job_key);
        entity.process_instance_key = value.process_instance_key;
        entity.process_definition_key = value.process_definition_key;
        entity.bpmn_process_id = value.bpmn_process_id.clone();
        entity.tenant_id = record.tenant_id.clone();
        entity.tree_path = Some(
            self.hierarchy
                .tree_path(value.process_instance_key, value.element_instance_key)
                .unwrap_or_else(|| {
                    default_tree_path(
                        value.process_instance_key,
                        &value.element_id,
                        value.element_instance_key,
                    )
                }),
        );

        match record.intent {
            Intent::Resolved => entity.state = Some(IncidentState::Resolved),
            Intent::Created => {
                entity.state = Some(IncidentState::Active);
                if entity.creation_time.is_none() {
                    entity.creation_time = Some(record_date(record)?);
                }
            }
            _ => entity.state = Some(IncidentState::Active),
        }
        Ok(())
    }

    fn flush(&self, entity: &Incident, batch: &mut BatchRequest) -> Result<()> {
        UpsertPlan::new(&self.index, &entity.id, entity)?
            .routed(routing_key(entity.process_instance_key))
            .guarded_by("position")
            .set(&[
                "key",
                "partitionId",
                "state",
                "errorType",
                "errorMessage",
                "flowNodeId",
                "flowNodeInstanceKey",
                "jobKey",
                "processInstanceKey",
                "processDefinitionKey",
                "bpmnProcessId",
                "treePath",
                "tenantId",
            ])
            .set_if_present(&["creationTime"])
            .submit(batch)?;

        if entity.state == Some(IncidentState::Resolved) {
            self.operations.complete(OperationCompletion {
                operation: OperationType::ResolveIncident,
                process_instance_key: entity.process_instance_key,
                target_key: entity.key,
            });
        }
        Ok(())
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}
