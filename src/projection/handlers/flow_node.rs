//! Flow node instance detail rows

use std::sync::Arc;

use super::{owning_process_instance, record_date, unexpected_payload};
use crate::domain::{FlowNodeInstance, FlowNodeState, Intent, Record, RecordValue, ValueType};
use crate::infra::{BatchRequest, Result};
use crate::projection::{
    advance_position, routing_key, tree_level, HierarchyLookup, ProjectionHandler, UpsertPlan,
};

pub struct FlowNodeInstanceHandler {
    index: String,
    hierarchy: Arc<dyn HierarchyLookup>,
}

impl FlowNodeInstanceHandler {
    pub fn new(index: impl Into<String>, hierarchy: Arc<dyn HierarchyLookup>) -> Self {
        Self {
            index: index.into(),
            hierarchy,
        }
    }
}

impl ProjectionHandler for FlowNodeInstanceHandler {
    type Entity = FlowNodeInstance;

    fn name(&self) -> &'static str {
        "flow-node-instance"
    }

    fn handled_kind(&self) -> ValueType {
        ValueType::ProcessInstance
    }

    fn handles_event(&self, record: &Record) -> bool {
        matches!(&record.value, RecordValue::ProcessInstance(v) if !v.is_process())
            && record.intent.is_element_lifecycle()
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        vec![record.key.to_string()]
    }

    fn create_new_entity(&self, id: &str) -> FlowNodeInstance {
        FlowNodeInstance::new(id)
    }

    fn update_entity(&self, record: &Record, entity: &mut FlowNodeInstance) -> Result<()> {
        let RecordValue::ProcessInstance(value) = &record.value else {
            return Err(unexpected_payload(self.name(), record));
        };
        owning_process_instance(self.name(), record)?;
        if !advance_position(&mut entity.position, record.position) {
            return Ok(());
        }

        entity.key = record.key;
        entity.partition_id = record.partition_id;
        entity.flow_node_id = value.element_id.clone();
        entity.flow_node_type = Some(value.bpmn_element_type);
        entity.process_instance_key = value.process_instance_key;
        entity.process_definition_key = value.process_definition_key;
        entity.bpmn_process_id = value.bpmn_process_id.clone();
        entity.tenant_id = record.tenant_id.clone();

        // Unknown ancestry stays null until hierarchy enrichment catches up
        if let Some(path) = self.hierarchy.tree_path(value.process_instance_key, record.key) {
            entity.level = Some(tree_level(&path));
            entity.tree_path = Some(path);
        }

        match record.intent {
            Intent::ElementActivating => {
                entity.state = Some(FlowNodeState::Active);
                entity.start_date = Some(record_date(record)?);
            }
            Intent::ElementCompleted => {
                entity.state = Some(FlowNodeState::Completed);
                entity.end_date = Some(record_date(record)?);
            }
            Intent::ElementTerminated => {
                entity.state = Some(FlowNodeState::Terminated);
                entity.end_date = Some(record_date(record)?);
            }
            Intent::ElementMigrated => {}
            _ => entity.state = Some(FlowNodeState::Active),
        }
        Ok(())
    }

    fn flush(&self, entity: &FlowNodeInstance, batch: &mut BatchRequest) -> Result<()> {
        UpsertPlan::new(&self.index, &entity.id, entity)?
            .routed(routing_key(entity.process_instance_key))
            .guarded_by("position")
            .set(&[
                "key",
                "partitionId",
                "flowNodeId",
                "flowNodeType",
                "processInstanceKey",
                "processDefinitionKey",
                "bpmnProcessId",
                "tenantId",
            ])
            .set_if_present(&["state", "startDate", "endDate", "treePath", "level"])
            .submit(batch)
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}

/// Marks detail rows that currently have an incident
pub struct FlowNodeInstanceFromIncidentHandler {
    index: String,
}

impl FlowNodeInstanceFromIncidentHandler {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
        }
    }
}

impl ProjectionHandler for FlowNodeInstanceFromIncidentHandler {
    type Entity = FlowNodeInstance;

    fn name(&self) -> &'static str {
        "flow-node-instance-from-incident"
    }

    fn handled_kind(&self) -> ValueType {
        ValueType::Incident
    }

    fn handles_event(&self, record: &Record) -> bool {
        matches!(&record.value, RecordValue::Incident(v) if v.element_instance_key > 0)
            && matches!(record.intent, Intent::Created | Intent::Resolved)
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        match &record.value {
            RecordValue::Incident(v) => vec![v.element_instance_key.to_string()],
            _ => vec![],
        }
    }

    fn create_new_entity(&self, id: &str) -> FlowNodeInstance {
        FlowNodeInstance::new(id)
    }

    fn update_entity(&self, record: &Record, entity: &mut FlowNodeInstance) -> Result<()> {
        let RecordValue::Incident(value) = &record.value else {
            return Err(unexpected_payload(self.name(), record));
        };
        owning_process_instance(self.name(), record)?;
        if !advance_position(&mut entity.position_incident, record.position) {
            return Ok(());
        }

        entity.key = value.element_instance_key;
        entity.partition_id = record.partition_id;
        entity.flow_node_id = value.element_id.clone();
        entity.process_instance_key = value.process_instance_key;
        entity.process_definition_key = value.process_definition_key;
        entity.bpmn_process_id = value.bpmn_process_id.clone();
        entity.tenant_id = record.tenant_id.clone();

        let active = record.intent == Intent::Created;
        entity.incident = active;
        entity.incident_key = active.then_some(record.key);
        Ok(())
    }

    fn flush(&self, entity: &FlowNodeInstance, batch: &mut BatchRequest) -> Result<()> {
        UpsertPlan::new(&self.index, &entity.id, entity)?
            .routed(routing_key(entity.process_instance_key))
            .guarded_by("positionIncident")
            .set(&["incident", "incidentKey"])
            .submit(batch)
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}
