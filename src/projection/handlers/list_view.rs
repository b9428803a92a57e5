//! List view handlers
//!
//! The list view holds process instance rows, flow node rows (children of
//! their process instance) and variable rows. A flow node row is written by
//! three kinds: element lifecycle (`position`), incidents
//! (`positionIncident`) and jobs (`positionJob`).

use std::sync::Arc;

use super::{known_key, owning_process_instance, record_date, unexpected_payload};
use crate::domain::{
    FlowNodeState, Intent, JoinRelation, ListViewFlowNode, ListViewProcessInstance,
    ListViewVariable, OperationType, ProcessInstanceState, Record, RecordValue, ValueType,
};
use crate::infra::{BatchRequest, Result};
use crate::projection::{
    advance_position, composite_id, routing_key, OperationCompletion, OperationCompletionSink,
    ProjectionHandler, UpsertPlan,
};

fn is_tracked_lifecycle(intent: Intent) -> bool {
    matches!(
        intent,
        Intent::ElementActivating
            | Intent::ElementActivated
            | Intent::ElementCompleted
            | Intent::ElementTerminated
            | Intent::ElementMigrated
    )
}

// ============================================================================
// Process instances
// ============================================================================

pub struct ListViewProcessInstanceHandler {
    index: String,
    operations: Arc<dyn OperationCompletionSink>,
}

impl ListViewProcessInstanceHandler {
    pub fn new(index: impl Into<String>, operations: Arc<dyn OperationCompletionSink>) -> Self {
        Self {
            index: index.into(),
            operations,
        }
    }
}

impl ProjectionHandler for ListViewProcessInstanceHandler {
    type Entity = ListViewProcessInstance;

    fn name(&self) -> &'static str {
        "list-view-process-instance"
    }

    fn handled_kind(&self) -> ValueType {
        ValueType::ProcessInstance
    }

    fn handles_event(&self, record: &Record) -> bool {
        matches!(&record.value, RecordValue::ProcessInstance(v) if v.is_process())
            && is_tracked_lifecycle(record.intent)
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        match &record.value {
            RecordValue::ProcessInstance(v) => vec![v.process_instance_key.to_string()],
            _ => vec![],
        }
    }

    fn create_new_entity(&self, id: &str) -> ListViewProcessInstance {
        ListViewProcessInstance::new(id)
    }

    fn update_entity(&self, record: &Record, entity: &mut ListViewProcessInstance) -> Result<()> {
        let RecordValue::ProcessInstance(value) = &record.value else {
            return Err(unexpected_payload(self.name(), record));
        };
        owning_process_instance(self.name(), record)?;
        if !advance_position(&mut entity.position, record.position) {
            return Ok(());
        }

        entity.key = value.process_instance_key;
        entity.partition_id = record.partition_id;
        entity.process_instance_key = value.process_instance_key;
        entity.process_definition_key = value.process_definition_key;
        entity.bpmn_process_id = value.bpmn_process_id.clone();
        entity.process_version = value.version;
        entity.tenant_id = record.tenant_id.clone();
        entity.parent_process_instance_key = known_key(value.parent_process_instance_key);
        entity.parent_flow_node_instance_key = known_key(value.parent_element_instance_key);

        match record.intent {
            Intent::ElementActivating => {
                entity.state = Some(ProcessInstanceState::Active);
                entity.start_date = Some(record_date(record)?);
            }
            Intent::ElementCompleted => {
                entity.state = Some(ProcessInstanceState::Completed);
                entity.end_date = Some(record_date(record)?);
            }
            Intent::ElementTerminated => {
                entity.state = Some(ProcessInstanceState::Canceled);
                entity.end_date = Some(record_date(record)?);
            }
            Intent::ElementMigrated => {}
            _ => entity.state = Some(ProcessInstanceState::Active),
        }
        Ok(())
    }

    fn flush(&self, entity: &ListViewProcessInstance, batch: &mut BatchRequest) -> Result<()> {
        UpsertPlan::new(&self.index, &entity.id, entity)?
            .routed(routing_key(entity.process_instance_key))
            .guarded_by("position")
            .set(&[
                "key",
                "partitionId",
                "processInstanceKey",
                "processDefinitionKey",
                "bpmnProcessId",
                "processVersion",
                "parentProcessInstanceKey",
                "parentFlowNodeInstanceKey",
                "tenantId",
                "joinRelation",
            ])
            .set_if_present(&["state", "startDate", "endDate"])
            .submit(batch)?;

        if entity.state == Some(ProcessInstanceState::Canceled) {
            self.operations.complete(OperationCompletion {
                operation: OperationType::CancelProcessInstance,
                process_instance_key: entity.process_instance_key,
                target_key: entity.process_instance_key,
            });
        }
        Ok(())
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}

// ============================================================================
// Flow nodes: element lifecycle
// ============================================================================

pub struct ListViewFlowNodeHandler {
    index: String,
}

impl ListViewFlowNodeHandler {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
        }
    }
}

impl ProjectionHandler for ListViewFlowNodeHandler {
    type Entity = ListViewFlowNode;

    fn name(&self) -> &'static str {
        "list-view-flow-node"
    }

    fn handled_kind(&self) -> ValueType {
        ValueType::ProcessInstance
    }

    fn handles_event(&self, record: &Record) -> bool {
        matches!(&record.value, RecordValue::ProcessInstance(v) if !v.is_process())
            && is_tracked_lifecycle(record.intent)
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        vec![record.key.to_string()]
    }

    fn create_new_entity(&self, id: &str) -> ListViewFlowNode {
        ListViewFlowNode::new(id)
    }

    fn update_entity(&self, record: &Record, entity: &mut ListViewFlowNode) -> Result<()> {
        let RecordValue::ProcessInstance(value) = &record.value else {
            return Err(unexpected_payload(self.name(), record));
        };
        owning_process_instance(self.name(), record)?;
        if !advance_position(&mut entity.position, record.position) {
            return Ok(());
        }

        entity.key = record.key;
        entity.partition_id = record.partition_id;
        entity.process_instance_key = value.process_instance_key;
        entity.activity_id = value.element_id.clone();
        entity.activity_type = Some(value.bpmn_element_type);
        entity.tenant_id = record.tenant_id.clone();
        entity.join_relation = JoinRelation::child(JoinRelation::ACTIVITY, value.process_instance_key);

        match record.intent {
            Intent::ElementCompleted => entity.activity_state = Some(FlowNodeState::Completed),
            Intent::ElementTerminated => entity.activity_state = Some(FlowNodeState::Terminated),
            Intent::ElementMigrated => {}
            _ => entity.activity_state = Some(FlowNodeState::Active),
        }
        Ok(())
    }

    fn flush(&self, entity: &ListViewFlowNode, batch: &mut BatchRequest) -> Result<()> {
        UpsertPlan::new(&self.index, &entity.id, entity)?
            .routed(routing_key(entity.process_instance_key))
            .guarded_by("position")
            .set(&[
                "key",
                "partitionId",
                "processInstanceKey",
                "activityId",
                "activityType",
                "tenantId",
                "joinRelation",
            ])
            .set_if_present(&["activityState"])
            .submit(batch)
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}

// ============================================================================
// Flow nodes: incidents
// ============================================================================

pub struct ListViewFlowNodeFromIncidentHandler {
    index: String,
}

impl ListViewFlowNodeFromIncidentHandler {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
        }
    }
}

impl ProjectionHandler for ListViewFlowNodeFromIncidentHandler {
    type Entity = ListViewFlowNode;

    fn name(&self) -> &'static str {
        "list-view-flow-node-from-incident"
    }

    fn handled_kind(&self) -> ValueType {
        ValueType::Incident
    }

    fn handles_event(&self, record: &Record) -> bool {
        matches!(&record.value, RecordValue::Incident(v) if v.element_instance_key > 0)
            && matches!(
                record.intent,
                Intent::Created | Intent::Resolved | Intent::Migrated
            )
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        match &record.value {
            RecordValue::Incident(v) => vec![v.element_instance_key.to_string()],
            _ => vec![],
        }
    }

    fn create_new_entity(&self, id: &str) -> ListViewFlowNode {
        ListViewFlowNode::new(id)
    }

    fn update_entity(&self, record: &Record, entity: &mut ListViewFlowNode) -> Result<()> {
        let RecordValue::Incident(value) = &record.value else {
            return Err(unexpected_payload(self.name(), record));
        };
        owning_process_instance(self.name(), record)?;
        if !advance_position(&mut entity.position_incident, record.position) {
            return Ok(());
        }

        entity.key = value.element_instance_key;
        entity.partition_id = record.partition_id;
        entity.process_instance_key = value.process_instance_key;
        entity.activity_id = value.element_id.clone();
        entity.tenant_id = record.tenant_id.clone();
        entity.join_relation = JoinRelation::child(JoinRelation::ACTIVITY, value.process_instance_key);

        if record.intent == Intent::Resolved {
            entity.incident_key = None;
            entity.error_message = None;
        } else {
            entity.incident_key = Some(record.key);
            entity.error_message = Some(value.error_message.clone());
        }
        Ok(())
    }

    fn flush(&self, entity: &ListViewFlowNode, batch: &mut BatchRequest) -> Result<()> {
        UpsertPlan::new(&self.index, &entity.id, entity)?
            .routed(routing_key(entity.process_instance_key))
            .guarded_by("positionIncident")
            .set(&["incidentKey", "errorMessage"])
            .submit(batch)
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}

// ============================================================================
// Flow nodes: jobs
// ============================================================================

pub struct ListViewFlowNodeFromJobHandler {
    index: String,
}

impl ListViewFlowNodeFromJobHandler {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
        }
    }
}

impl ProjectionHandler for ListViewFlowNodeFromJobHandler {
    type Entity = ListViewFlowNode;

    fn name(&self) -> &'static str {
        "list-view-flow-node-from-job"
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
                | Intent::Migrated
        )
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        match &record.value {
            RecordValue::Job(v) => vec![v.element_instance_key.to_string()],
            _ => vec![],
        }
    }

    fn create_new_entity(&self, id: &str) -> ListViewFlowNode {
        ListViewFlowNode::new(id)
    }

    fn update_entity(&self, record: &Record, entity: &mut ListViewFlowNode) -> Result<()> {
        let RecordValue::Job(value) = &record.value else {
            return Err(unexpected_payload(self.name(), record));
        };
        owning_process_instance(self.name(), record)?;
        if !advance_position(&mut entity.position_job, record.position) {
            return Ok(());
        }

        entity.key = value.element_instance_key;
        entity.partition_id = record.partition_id;
        entity.process_instance_key = value.process_instance_key;
        entity.activity_id = value.element_id.clone();
        entity.tenant_id = record.tenant_id.clone();
        entity.join_relation = JoinRelation::child(JoinRelation::ACTIVITY, value.process_instance_key);
        entity.job_failed_with_retries_left = record.intent == Intent::Failed && value.retries > 0;
        Ok(())
    }

    fn flush(&self, entity: &ListViewFlowNode, batch: &mut BatchRequest) -> Result<()> {
        UpsertPlan::new(&self.index, &entity.id, entity)?
            .routed(routing_key(entity.process_instance_key))
            .guarded_by("positionJob")
            .set(&["jobFailedWithRetriesLeft"])
            .submit(batch)
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}

// ============================================================================
// Variables
// ============================================================================

pub struct ListViewVariableHandler {
    index: String,
    operations: Arc<dyn OperationCompletionSink>,
}

impl ListViewVariableHandler {
    pub fn new(index: impl Into<String>, operations: Arc<dyn OperationCompletionSink>) -> Self {
        Self {
            index: index.into(),
            operations,
        }
    }
}

impl ProjectionHandler for ListViewVariableHandler {
    type Entity = ListViewVariable;

    fn name(&self) -> &'static str {
        "list-view-variable"
    }

    fn handled_kind(&self) -> ValueType {
        ValueType::Variable
    }

    fn handles_event(&self, record: &Record) -> bool {
        matches!(&record.value, RecordValue::Variable(v) if v.process_instance_key > 0)
            && matches!(
                record.intent,
                Intent::Created | Intent::Updated | Intent::Migrated
            )
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        match &record.value {
            RecordValue::Variable(v) => vec![composite_id(v.scope_key, &v.name)],
            _ => vec![],
        }
    }

    fn create_new_entity(&self, id: &str) -> ListViewVariable {
        ListViewVariable::new(id)
    }

    fn update_entity(&self, record: &Record, entity: &mut ListViewVariable) -> Result<()> {
        let RecordValue::Variable(value) = &record.value else {
            return Err(unexpected_payload(self.name(), record));
        };
        owning_process_instance(self.name(), record)?;
        if !advance_position(&mut entity.position, record.position) {
            return Ok(());
        }

        entity.key = record.key;
        entity.partition_id = record.partition_id;
        entity.name = value.name.clone();
        entity.value = value.value.clone();
        entity.scope_key = value.scope_key;
        entity.process_instance_key = value.process_instance_key;
        entity.tenant_id = record.tenant_id.clone();
        entity.join_relation = JoinRelation::child(JoinRelation::VARIABLE, value.scope_key);
        entity.updated |= record.intent == Intent::Updated;
        Ok(())
    }

    fn flush(&self, entity: &ListViewVariable, batch: &mut BatchRequest) -> Result<()> {
        UpsertPlan::new(&self.index, &entity.id, entity)?
            .routed(routing_key(entity.process_instance_key))
            .guarded_by("position")
            .set(&[
                "key",
                "partitionId",
                "name",
                "value",
                "scopeKey",
                "processInstanceKey",
                "tenantId",
                "joinRelation",
            ])
            .submit(batch)?;

        if entity.updated {
            self.operations.complete(OperationCompletion {
                operation: OperationType::UpdateVariable,
                process_instance_key: entity.process_instance_key,
                target_key: entity.scope_key,
            });
        }
        Ok(())
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}
