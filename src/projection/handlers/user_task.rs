//! User task rows
//!
//! Unlike the other handlers, a user task flush writes only the fields the
//! batch's records actually touched: the accumulator records them in
//! [`UserTask::touched`] as it goes.

use super::{non_empty, owning_process_instance, record_date, unexpected_payload};
use crate::domain::{
    Intent, JoinRelation, Record, RecordValue, TaskState, UserTask, UserTaskRecordValue, ValueType,
};
use crate::infra::{BatchRequest, ExporterError, Result};
use crate::projection::{advance_position, routing_key, ProjectionHandler, UpsertPlan};

const CREATION_FIELDS: [&str; 21] = [
    "key",
    "partitionId",
    "flowNodeBpmnId",
    "flowNodeInstanceId",
    "bpmnProcessId",
    "processDefinitionId",
    "processDefinitionVersion",
    "processInstanceId",
    "assignee",
    "candidateUsers",
    "candidateGroups",
    "dueDate",
    "followUpDate",
    "priority",
    "formKey",
    "externalFormReference",
    "customHeaders",
    "action",
    "creationTime",
    "tenantId",
    "join",
];

pub struct UserTaskHandler {
    index: String,
}

impl UserTaskHandler {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
        }
    }

    fn apply_creation(record: &Record, value: &UserTaskRecordValue, entity: &mut UserTask) -> Result<()> {
        entity.key = record.key;
        entity.partition_id = record.partition_id;
        entity.flow_node_bpmn_id = value.element_id.clone();
        entity.flow_node_instance_id = value.element_instance_key.to_string();
        entity.bpmn_process_id = value.bpmn_process_id.clone();
        entity.process_definition_id = value.process_definition_key.to_string();
        entity.process_definition_version = value.process_definition_version;
        entity.assignee = non_empty(&value.assignee);
        entity.candidate_users = value.candidate_users_list.clone();
        entity.candidate_groups = value.candidate_groups_list.clone();
        entity.due_date = non_empty(&value.due_date);
        entity.follow_up_date = non_empty(&value.follow_up_date);
        entity.priority = value.priority;
        entity.form_key = (value.form_key > 0).then(|| value.form_key.to_string());
        entity.external_form_reference = non_empty(&value.external_form_reference);
        entity.custom_headers = value.custom_headers.clone();
        entity.action = non_empty(&value.action);
        entity.tenant_id = record.tenant_id.clone();
        if entity.creation_time.is_none() {
            entity.creation_time = Some(record_date(record)?);
        }
        entity.touched.extend(CREATION_FIELDS);
        Ok(())
    }

    /// Copy one changed attribute from the payload, returning the document field it maps to
    fn apply_attribute(attribute: &str, value: &UserTaskRecordValue, entity: &mut UserTask) -> Option<&'static str> {
        match attribute {
            "assignee" => {
                entity.assignee = non_empty(&value.assignee);
                Some("assignee")
            }
            "candidateUsersList" | "candidateUsers" => {
                entity.candidate_users = value.candidate_users_list.clone();
                Some("candidateUsers")
            }
            "candidateGroupsList" | "candidateGroups" => {
                entity.candidate_groups = value.candidate_groups_list.clone();
                Some("candidateGroups")
            }
            "dueDate" => {
                entity.due_date = non_empty(&value.due_date);
                Some("dueDate")
            }
            "followUpDate" => {
                entity.follow_up_date = non_empty(&value.follow_up_date);
                Some("followUpDate")
            }
            "priority" => {
                entity.priority = value.priority;
                Some("priority")
            }
            _ => None,
        }
    }

    fn apply_changed_attributes(value: &UserTaskRecordValue, entity: &mut UserTask) {
        for attribute in &value.changed_attributes {
            if let Some(field) = Self::apply_attribute(attribute, value, entity) {
                entity.touched.insert(field);
            }
            if !entity.changed_attributes.contains(attribute) {
                entity.changed_attributes.push(attribute.clone());
            }
        }
        if !value.changed_attributes.is_empty() {
            entity.touched.insert("changedAttributes");
        }
    }
}

impl ProjectionHandler for UserTaskHandler {
    type Entity = UserTask;

    fn name(&self) -> &'static str {
        "user-task"
    }

    fn handled_kind(&self) -> ValueType {
        ValueType::UserTask
    }

    fn handles_event(&self, record: &Record) -> bool {
        matches!(&record.value, RecordValue::UserTask(v) if v.element_instance_key > 0)
            && (TaskState::for_intent(record.intent).is_some()
                || matches!(record.intent, Intent::Migrated | Intent::Corrected))
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        match &record.value {
            RecordValue::UserTask(v) => vec![v.element_instance_key.to_string()],
            _ => vec![],
        }
    }

    fn create_new_entity(&self, id: &str) -> UserTask {
        UserTask::new(id)
    }

    fn update_entity(&self, record: &Record, entity: &mut UserTask) -> Result<()> {
        let RecordValue::UserTask(value) = &record.value else {
            return Err(unexpected_payload(self.name(), record));
        };
        let process_instance_key = owning_process_instance(self.name(), record)?;
        if !advance_position(&mut entity.position, record.position) {
            return Ok(());
        }

        // Every write is routed by the owning process instance, whatever the intent
        entity.process_instance_id = process_instance_key.to_string();
        entity.join = JoinRelation::child(JoinRelation::TASK, process_instance_key);

        match record.intent {
            Intent::Creating | Intent::Created => Self::apply_creation(record, value, entity)?,
            Intent::Assigned => {
                entity.assignee = non_empty(&value.assignee);
                entity.touched.insert("assignee");
                if !entity.changed_attributes.iter().any(|a| a == "assignee") {
                    entity.changed_attributes.push("assignee".to_string());
                }
                entity.touched.insert("changedAttributes");
            }
            Intent::Updated | Intent::Corrected => Self::apply_changed_attributes(value, entity),
            Intent::Completed | Intent::Canceled => {
                Self::apply_changed_attributes(value, entity);
                entity.completion_time = Some(record_date(record)?);
                entity.touched.insert("completionTime");
            }
            Intent::Migrated => {
                entity.process_definition_id = value.process_definition_key.to_string();
                entity.process_definition_version = value.process_definition_version;
                entity.bpmn_process_id = value.bpmn_process_id.clone();
                entity.flow_node_bpmn_id = value.element_id.clone();
                entity.touched.extend([
                    "processDefinitionId",
                    "processDefinitionVersion",
                    "bpmnProcessId",
                    "flowNodeBpmnId",
                ]);
            }
            _ => {}
        }

        if let Some(state) = TaskState::for_intent(record.intent) {
            entity.state = Some(state);
            entity.touched.insert("state");
        }
        Ok(())
    }

    fn flush(&self, entity: &UserTask, batch: &mut BatchRequest) -> Result<()> {
        let fields: Vec<&str> = entity.touched.iter().copied().collect();
        let Some(process_instance_key) = entity.join.parent else {
            return Err(ExporterError::InvalidRecord(format!(
                "user task {} has no process instance to route by",
                entity.id
            )));
        };

        UpsertPlan::new(&self.index, &entity.id, entity)?
            .routed(routing_key(process_instance_key))
            .guarded_by("position")
            .set(&fields)
            .submit(batch)
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}
