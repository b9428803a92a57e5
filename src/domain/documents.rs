//! Projected documents
//!
//! Each struct is the full shape of one document in the search store.
//! Optional fields serialize as `null` so that a creation write always
//! carries the complete document. Fields marked `#[serde(skip)]` are
//! flush-time metadata that ride along on the in-batch accumulator and are
//! never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::types::{
    BpmnElementType, DecisionInstanceState, EventSourceType, FlowNodeState, IncidentState,
    JoinRelation, ProcessInstanceState, TaskState,
};

// ============================================================================
// List view
// ============================================================================

/// Process-level summary row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListViewProcessInstance {
    pub id: String,
    pub key: i64,
    pub partition_id: i32,
    pub process_instance_key: i64,
    pub process_definition_key: i64,
    pub bpmn_process_id: String,
    pub process_version: i32,
    pub state: Option<ProcessInstanceState>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub parent_process_instance_key: Option<i64>,
    pub parent_flow_node_instance_key: Option<i64>,
    pub tenant_id: String,
    pub join_relation: JoinRelation,
    pub position: Option<i64>,
}

impl ListViewProcessInstance {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            key: 0,
            partition_id: 0,
            process_instance_key: 0,
            process_definition_key: 0,
            bpmn_process_id: String::new(),
            process_version: 0,
            state: None,
            start_date: None,
            end_date: None,
            parent_process_instance_key: None,
            parent_flow_node_instance_key: None,
            tenant_id: String::new(),
            join_relation: JoinRelation::root(JoinRelation::PROCESS_INSTANCE),
            position: None,
        }
    }
}

/// Per-element summary row, shared by lifecycle, incident and job records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListViewFlowNode {
    pub id: String,
    pub key: i64,
    pub partition_id: i32,
    pub process_instance_key: i64,
    pub activity_id: String,
    pub activity_type: Option<BpmnElementType>,
    pub activity_state: Option<FlowNodeState>,
    pub incident_key: Option<i64>,
    pub error_message: Option<String>,
    pub job_failed_with_retries_left: bool,
    pub tenant_id: String,
    pub join_relation: JoinRelation,
    pub position: Option<i64>,
    pub position_incident: Option<i64>,
    pub position_job: Option<i64>,
}

impl ListViewFlowNode {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            key: 0,
            partition_id: 0,
            process_instance_key: 0,
            activity_id: String::new(),
            activity_type: None,
            activity_state: None,
            incident_key: None,
            error_message: None,
            job_failed_with_retries_left: false,
            tenant_id: String::new(),
            join_relation: JoinRelation::root(JoinRelation::ACTIVITY),
            position: None,
            position_incident: None,
            position_job: None,
        }
    }
}

/// Variable row on the list view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListViewVariable {
    pub id: String,
    pub key: i64,
    pub partition_id: i32,
    pub name: String,
    pub value: String,
    pub scope_key: i64,
    pub process_instance_key: i64,
    pub tenant_id: String,
    pub join_relation: JoinRelation,
    pub position: Option<i64>,
    /// An UPDATED record was applied in this batch
    #[serde(skip)]
    pub updated: bool,
}

impl ListViewVariable {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            key: 0,
            partition_id: 0,
            name: String::new(),
            value: String::new(),
            scope_key: 0,
            process_instance_key: 0,
            tenant_id: String::new(),
            join_relation: JoinRelation::root(JoinRelation::VARIABLE),
            position: None,
            updated: false,
        }
    }
}

// ============================================================================
// Flow node instances and incidents
// ============================================================================

/// Per-element detail row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNodeInstance {
    pub id: String,
    pub key: i64,
    pub partition_id: i32,
    pub flow_node_id: String,
    pub flow_node_type: Option<BpmnElementType>,
    pub state: Option<FlowNodeState>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub process_instance_key: i64,
    pub process_definition_key: i64,
    pub bpmn_process_id: String,
    /// Filled by hierarchy enrichment; `null` until then
    pub tree_path: Option<String>,
    pub level: Option<i32>,
    pub incident_key: Option<i64>,
    pub incident: bool,
    pub tenant_id: String,
    pub position: Option<i64>,
    pub position_incident: Option<i64>,
}

impl FlowNodeInstance {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            key: 0,
            partition_id: 0,
            flow_node_id: String::new(),
            flow_node_type: None,
            state: None,
            start_date: None,
            end_date: None,
            process_instance_key: 0,
            process_definition_key: 0,
            bpmn_process_id: String::new(),
            tree_path: None,
            level: None,
            incident_key: None,
            incident: false,
            tenant_id: String::new(),
            position: None,
            position_incident: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub key: i64,
    pub partition_id: i32,
    pub state: Option<IncidentState>,
    pub error_type: String,
    pub error_message: String,
    pub flow_node_id: String,
    pub flow_node_instance_key: i64,
    pub job_key: Option<i64>,
    pub process_instance_key: i64,
    pub process_definition_key: i64,
    pub bpmn_process_id: String,
    pub creation_time: Option<DateTime<Utc>>,
    pub tree_path: Option<String>,
    pub tenant_id: String,
    pub position: Option<i64>,
}

impl Incident {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            key: 0,
            partition_id: 0,
            state: None,
            error_type: String::new(),
            error_message: String::new(),
            flow_node_id: String::new(),
            flow_node_instance_key: 0,
            job_key: None,
            process_instance_key: 0,
            process_definition_key: 0,
            bpmn_process_id: String::new(),
            creation_time: None,
            tree_path: None,
            tenant_id: String::new(),
            position: None,
        }
    }
}

// ============================================================================
// Audit events
// ============================================================================

/// Audit row for one element instance
///
/// Lifecycle, incident and job records each own a section of the row and a
/// position guard; the identity fields are identical whichever kind wrote
/// them first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub key: i64,
    pub partition_id: i32,
    pub process_instance_key: i64,
    pub process_definition_key: i64,
    pub bpmn_process_id: String,
    pub flow_node_id: String,
    pub flow_node_instance_key: i64,
    pub tenant_id: String,
    pub process_instance_event: Option<EventDetail>,
    pub incident_event: Option<IncidentEventDetail>,
    pub job_event: Option<JobEventDetail>,
    pub position: Option<i64>,
    pub position_incident: Option<i64>,
    pub position_job: Option<i64>,
}

impl Event {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            key: 0,
            partition_id: 0,
            process_instance_key: 0,
            process_definition_key: 0,
            bpmn_process_id: String::new(),
            flow_node_id: String::new(),
            flow_node_instance_key: 0,
            tenant_id: String::new(),
            process_instance_event: None,
            incident_event: None,
            job_event: None,
            position: None,
            position_incident: None,
            position_job: None,
        }
    }
}

/// Latest lifecycle transition seen for the element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    pub event_source_type: EventSourceType,
    pub event_type: String,
    pub date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentEventDetail {
    pub event_source_type: EventSourceType,
    pub event_type: String,
    pub date_time: Option<DateTime<Utc>>,
    pub incident_key: i64,
    pub incident_error_type: String,
    pub incident_error_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEventDetail {
    pub event_source_type: EventSourceType,
    pub event_type: String,
    pub date_time: Option<DateTime<Utc>>,
    pub job_key: i64,
    pub job_type: String,
    pub job_worker: String,
    pub job_retries: i32,
    pub job_deadline: Option<DateTime<Utc>>,
    pub job_custom_headers: BTreeMap<String, String>,
}

// ============================================================================
// Decisions
// ============================================================================

/// One evaluated decision of a decision-evaluation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionInstance {
    pub id: String,
    pub key: i64,
    pub partition_id: i32,
    /// 1-based position of this decision in the evaluation chain
    pub execution_index: i32,
    pub state: Option<DecisionInstanceState>,
    pub evaluation_date: Option<DateTime<Utc>>,
    pub evaluation_failure: Option<String>,
    pub decision_id: String,
    pub decision_definition_id: String,
    pub decision_name: String,
    pub decision_version: i32,
    pub decision_type: String,
    pub decision_requirements_key: i64,
    pub decision_requirements_id: String,
    pub root_decision_id: String,
    pub result: String,
    pub evaluated_inputs: Vec<DecisionInstanceInput>,
    pub evaluated_outputs: Vec<DecisionInstanceOutput>,
    pub process_definition_key: i64,
    pub process_instance_key: i64,
    pub bpmn_process_id: String,
    pub element_id: String,
    pub element_instance_key: i64,
    pub tenant_id: String,
    pub position: i64,
}

impl DecisionInstance {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            key: 0,
            partition_id: 0,
            execution_index: 0,
            state: None,
            evaluation_date: None,
            evaluation_failure: None,
            decision_id: String::new(),
            decision_definition_id: String::new(),
            decision_name: String::new(),
            decision_version: 0,
            decision_type: String::new(),
            decision_requirements_key: 0,
            decision_requirements_id: String::new(),
            root_decision_id: String::new(),
            result: String::new(),
            evaluated_inputs: Vec::new(),
            evaluated_outputs: Vec::new(),
            process_definition_key: 0,
            process_instance_key: 0,
            bpmn_process_id: String::new(),
            element_id: String::new(),
            element_instance_key: 0,
            tenant_id: String::new(),
            position: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionInstanceInput {
    pub id: String,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionInstanceOutput {
    pub id: String,
    pub name: String,
    pub value: String,
    pub rule_id: String,
    pub rule_index: i32,
}

// ============================================================================
// User tasks
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTask {
    pub id: String,
    pub key: i64,
    pub partition_id: i32,
    pub state: Option<TaskState>,
    pub flow_node_bpmn_id: String,
    pub flow_node_instance_id: String,
    pub bpmn_process_id: String,
    pub process_definition_id: String,
    pub process_definition_version: i32,
    pub process_instance_id: String,
    pub assignee: Option<String>,
    pub candidate_users: Vec<String>,
    pub candidate_groups: Vec<String>,
    pub due_date: Option<String>,
    pub follow_up_date: Option<String>,
    pub priority: i32,
    pub form_key: Option<String>,
    pub external_form_reference: Option<String>,
    pub custom_headers: BTreeMap<String, String>,
    pub action: Option<String>,
    pub changed_attributes: Vec<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub completion_time: Option<DateTime<Utc>>,
    pub tenant_id: String,
    pub join: JoinRelation,
    pub position: Option<i64>,
    /// Document fields touched by the records applied in this batch
    #[serde(skip)]
    pub touched: BTreeSet<&'static str>,
}

impl UserTask {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            key: 0,
            partition_id: 0,
            state: None,
            flow_node_bpmn_id: String::new(),
            flow_node_instance_id: String::new(),
            bpmn_process_id: String::new(),
            process_definition_id: String::new(),
            process_definition_version: 0,
            process_instance_id: String::new(),
            assignee: None,
            candidate_users: Vec::new(),
            candidate_groups: Vec::new(),
            due_date: None,
            follow_up_date: None,
            priority: 0,
            form_key: None,
            external_form_reference: None,
            custom_headers: BTreeMap::new(),
            action: None,
            changed_attributes: Vec::new(),
            creation_time: None,
            completion_time: None,
            tenant_id: String::new(),
            join: JoinRelation::root(JoinRelation::TASK),
            position: None,
            touched: BTreeSet::new(),
        }
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Usage metric row, written once per started root process instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetric {
    pub id: String,
    pub event: String,
    pub value: String,
    pub event_time: Option<DateTime<Utc>>,
    pub partition_id: i32,
    pub tenant_id: String,
}

impl UsageMetric {
    pub const PROCESS_INSTANCE_STARTED: &'static str = "EVENT_PROCESS_INSTANCE_STARTED";

    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            event: Self::PROCESS_INSTANCE_STARTED.to_string(),
            value: String::new(),
            event_time: None,
            partition_id: 0,
            tenant_id: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_serialize_as_null() {
        let row = serde_json::to_value(ListViewFlowNode::new("12")).unwrap();
        assert!(row.get("errorMessage").unwrap().is_null());
        assert!(row.get("positionIncident").unwrap().is_null());
        assert_eq!(row["jobFailedWithRetriesLeft"], serde_json::json!(false));
    }

    #[test]
    fn test_flush_metadata_is_not_persisted() {
        let mut task = UserTask::new("5");
        task.touched.insert("assignee");
        let doc = serde_json::to_value(&task).unwrap();
        assert!(doc.get("touched").is_none());

        let mut variable = ListViewVariable::new("1_x");
        variable.updated = true;
        let doc = serde_json::to_value(&variable).unwrap();
        assert!(doc.get("updated").is_none());
    }
}
